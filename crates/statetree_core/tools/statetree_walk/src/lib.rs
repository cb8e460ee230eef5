//! statetree_walk
//!
//! Builds the reference state tree and walks it through a scripted list of
//! steps, logging every enter/exit through `tracing`.

pub mod config;
pub mod demo;
pub mod logging;
pub mod script;

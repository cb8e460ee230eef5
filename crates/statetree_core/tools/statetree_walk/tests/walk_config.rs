use std::env;
use std::sync::{Mutex, OnceLock};

use statetree_walk::config::{Config, DEFAULT_LOG, DEFAULT_STEPS};

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().expect("lock")
}

fn clear_env() {
    env::remove_var("STATETREE_STEPS");
    env::remove_var("STATETREE_LOG");
    env::remove_var("STATETREE_QUIET");
}

#[test]
fn defaults_apply_without_args_or_env() {
    let _guard = env_lock();
    clear_env();

    let config = Config::from_args_iter(["bin"]);
    assert_eq!(config.steps, DEFAULT_STEPS);
    assert_eq!(config.log_filter, DEFAULT_LOG);
    assert!(!config.quiet);
}

#[test]
fn flags_override_env() {
    let _guard = env_lock();
    clear_env();
    env::set_var("STATETREE_STEPS", "C");
    env::set_var("STATETREE_LOG", "warn");

    let config = Config::from_args_iter(["bin", "--steps", "A2,B", "--log=trace", "--quiet"]);
    assert_eq!(config.steps, "A2,B");
    assert_eq!(config.log_filter, "trace");
    assert!(config.quiet);

    clear_env();
}

#[test]
fn env_supplies_values_when_flags_are_absent() {
    let _guard = env_lock();
    clear_env();
    env::set_var("STATETREE_STEPS", "event:next");
    env::set_var("STATETREE_QUIET", "yes");

    let config = Config::from_args_iter(["bin", "--unknown"]);
    assert_eq!(config.steps, "event:next");
    assert!(config.quiet);

    clear_env();
}

#[test]
fn trailing_flag_without_value_keeps_current_setting() {
    let _guard = env_lock();
    clear_env();
    env::set_var("STATETREE_LOG", "debug");

    let config = Config::from_args_iter(["bin", "--steps", "B", "--log"]);
    assert_eq!(config.steps, "B");
    assert_eq!(config.log_filter, "debug");

    let config = Config::from_args_iter(["bin", "--steps"]);
    assert_eq!(config.steps, DEFAULT_STEPS);

    clear_env();
}

use anyhow::{Context, Result};
use tracing::info;

use statetree_walk::config::Config;
use statetree_walk::script::{self, Step};
use statetree_walk::{demo, logging};

fn main() -> Result<()> {
    let config = Config::from_args();
    logging::init(&config.log_filter)?;

    let steps = Step::parse_list(&config.steps).context("parsing --steps")?;
    let mut tree = demo::build().context("building the reference state tree")?;

    let leaf = tree.start().context("starting the state tree")?;
    info!(?leaf, steps = steps.len(), "state tree started");

    let reports = script::run(&mut tree, &steps).map_err(|e| {
        e.log();
        e
    })?;

    if !config.quiet {
        for report in &reports {
            println!("{}", report.describe());
        }
    }

    Ok(())
}

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{LevelFilter, info};
use std::time::Duration;

mod cli;
mod config;

use cli::Cli;
use config::Config;
use rbd_lineage::audit::{self, AuditReport};
use rbd_lineage::openstack::{OpenStackClient, Session};
use rbd_lineage::oracle::ExistenceOracle;
use rbd_lineage::rbd::RbdCli;

fn setup_logging(level: LevelFilter) {
    // stdout carries the worklist, logs go to stderr
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();
}

fn run_application(cli: &Cli, config: &Config) -> Result<AuditReport> {
    let backend = RbdCli::connect(&config.rbd.binary, &cli.conf, &cli.user, &cli.pool)
        .context(format!("Failed to connect to pool {}", cli.pool))?;

    let timeout = Duration::from_millis(config.openstack.timeout_ms);
    let session = Session::authenticate(&cli.credentials(), timeout).context("Failed to authenticate")?;
    let client = OpenStackClient::new(
        session,
        &config.openstack.interface,
        config.openstack.region_name.as_deref(),
        config.openstack.image_page_size,
    )
    .context("Failed to resolve service endpoints")?;

    let oracle = ExistenceOracle::new(&client, &client, &client, &cli.pool);
    let report = audit::run(&backend, oracle, &cli.volumes).context("Scan failed")?;

    report
        .graph
        .write(&cli.output)
        .context(format!("Failed to write {}", cli.output.display()))?;
    info!(
        "Wrote {} nodes and {} edges to {}",
        report.graph.nodes().len(),
        report.graph.edges().len(),
        cli.output.display()
    );
    Ok(report)
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    setup_logging(cli.log_level());

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    let report = run_application(&cli, &config).context("Application failed")?;

    if report.worklist.is_empty() {
        println!("{}", audit::NOTHING_TO_REMOVE.green());
    } else {
        println!("{}", audit::WORKLIST_HEADER.yellow());
        for command in report.worklist.commands() {
            println!("{}", command);
        }
    }

    Ok(())
}

//! `loam` binary: builds the application described by a configuration
//! document and runs it until shutdown.

mod cli;

use anyhow::Context;
use clap::Parser;
use loam_runtime::{Runtime, loader, logging};
use tracing::info;

use crate::cli::Cli;

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	match &cli.log {
		Some(spec) => logging::configure(spec)?,
		None => logging::init()?,
	}

	let mut rt = Runtime::new();
	loader::register_standard(&mut rt)?;
	rt.load_file(&cli.config)
		.with_context(|| format!("failed to load application from {}", cli.config.display()))?;

	if cli.check {
		info!(entities = rt.entity_count(), "configuration check passed");
		return Ok(());
	}

	rt.run()?;
	Ok(())
}

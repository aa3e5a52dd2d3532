use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "loam")]
#[command(about = "Builds and runs an entity application from a configuration document")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Configuration document
	#[arg(long, short, default_value = "config.toml")]
	pub config: PathBuf,

	/// Logger specification applied before the configuration is read
	/// (e.g. "filter=debug format=compact")
	#[arg(long)]
	pub log: Option<String>,

	/// Build and lock the application, then exit without running it
	#[arg(long)]
	pub check: bool,
}

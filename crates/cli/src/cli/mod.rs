
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

/// Root CLI for pe.
#[derive(Parser, Debug)]
#[command(name = "pe")]
#[command(about = "Plugin endpoint - simulate and inspect cross-window plugin messaging")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: json (default), ndjson, toon or text
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run a host page and a plugin frame in-process and exchange requests.
	Simulate(SimulateArgs),
	/// Classify envelopes the way an endpoint's dispatcher would.
	Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
	/// Plugin id announced in the handshake.
	#[arg(long, value_name = "ID", default_value = "com.example.analytics")]
	pub plugin_id: String,

	/// User id announced in the handshake.
	#[arg(long, value_name = "UID", default_value = "anonymous")]
	pub uid: String,

	/// Number of requests the plugin sends.
	#[arg(short = 'n', long, value_name = "N", default_value_t = 3)]
	pub requests: u32,

	/// How many of the final requests the host answers with errors.
	#[arg(long, value_name = "K", default_value_t = 0)]
	pub failures: u32,

	/// How many of the final requests the host never answers.
	#[arg(long, value_name = "K", default_value_t = 0)]
	pub unanswered: u32,

	/// Protocol version both sides ensure.
	#[arg(long, value_name = "VERSION", default_value = "v1")]
	pub protocol: String,

	/// Load the plugin into a sandboxed frame (messages arrive with origin "null").
	#[arg(long)]
	pub sandboxed: bool,

	/// Milliseconds to wait for each response before counting it as pending.
	#[arg(long, value_name = "MS", default_value_t = 200)]
	pub wait_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
	/// JSON file holding one envelope or an array of envelopes (stdin if omitted).
	#[arg(value_name = "FILE")]
	pub file: Option<PathBuf>,

	/// Inline JSON instead of a file.
	#[arg(long, value_name = "JSON", conflicts_with = "file")]
	pub input: Option<String>,
}

pub mod inspect;
pub mod simulate;

use crate::cli::{Cli, Commands};
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let format = cli.format;
	match cli.command {
		Commands::Simulate(args) => simulate::execute(&args, format)
			.await
			.map_err(|e| e.in_command("simulate")),
		Commands::Inspect(args) => inspect::execute(&args, format).map_err(|e| e.in_command("inspect")),
	}
}

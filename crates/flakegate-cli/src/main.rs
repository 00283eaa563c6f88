mod commands;
mod config;
mod telemetry;

use clap::Parser;
use config::{CliArgs, Command};
use telemetry::init_telemetry;

fn main() -> anyhow::Result<()> {
    // A missing `.env` is fine; settings then come from flags and the
    // process environment.
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    init_telemetry()?;

    match args.command {
        Command::Generate(args) => commands::generate(args.try_into()?),
        Command::MachineId(args) => {
            commands::machine_id(config::validate_machine_bits(args.bits)?)
        }
        Command::Check(args) => commands::check(args.try_into()?),
    }
}

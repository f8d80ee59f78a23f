use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

mod inspect;
mod pack;

use inspect::InspectArgs;
use pack::PackArgs;

#[derive(Parser, Debug)]
#[command(name = "vctr-tool", version, about = "Pack and inspect vector tile payloads")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Frame every `*.json` payload under a directory into `*.vctr` tiles.
    Pack(PackArgs),
    /// Load one tile through the content pipeline and print what it produced.
    Inspect(InspectArgs),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.command {
        Command::Pack(args) => {
            let report = pack::run(&args)?;
            info!(
                "Packed {} tiles ({} skipped, {} failed)",
                report.written, report.skipped, report.failed
            );
            if report.failed > 0 {
                anyhow::bail!("{} payloads could not be packed", report.failed);
            }
        }
        Command::Inspect(args) => {
            let summary = inspect::run(&args)?;
            print!("{summary}");
            if summary.error.is_some() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

//! Binary entry point.

use clap::{CommandFactory, Parser};
use pmtud_relay::Cli;

fn main() -> anyhow::Result<()> {
    // clap prints `--help`/`--version` output to stdout by default; this
    // daemon's diagnostics belong on stderr, so those two cases are
    // special-cased before the normal parse path.
    let mut command = Cli::command();
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprint!("{}", command.render_help());
        std::process::exit(2);
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("{}", command.render_version());
        std::process::exit(0);
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprint!("{e}");
            std::process::exit(2);
        }
    };

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pmtud-relay: {e}");
            std::process::exit(2);
        }
    };

    pmtud_relay::install_panic_hook();
    pmtud_relay::init_logging();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match runtime.block_on(pmtud_relay::run(config)) {
        Ok(_stats) => Ok(()),
        Err(e) => {
            eprintln!("pmtud-relay: fatal: {e}");
            std::process::exit(1);
        }
    }
}

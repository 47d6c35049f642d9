use std::process::ExitCode;

use clap::Parser;

use nexthop::config::Cli;
use nexthop::lifecycle::startup;
use nexthop::observability::logging;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug_flag = cli.debug;

    let config = cli.into_config();
    logging::init(config.as_ref().map_or(debug_flag, |c| c.debug));

    tracing::debug!("nexthop v{} starting", env!("CARGO_PKG_VERSION"));

    match config.map_err(Into::into).and_then(startup::run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}

use std::process::ExitCode;

use clap::Parser;

use churnline::api::{self, Cli};
use churnline::common::config::AppCfg;
use churnline::common::log::{self, ErrorRecord};

fn main() -> ExitCode {
    let cfg = AppCfg::load();
    if let Err(err) = log::init(&cfg.log_filter) {
        log::emit_record(&ErrorRecord::from(&err));
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    match api::run(cli, &cfg) {
        Ok(outcome) => {
            log::emit_record(&outcome);
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(code = err.code() as u32, "{err}");
            log::emit_record(&ErrorRecord::new(err.to_string()));
            ExitCode::FAILURE
        }
    }
}

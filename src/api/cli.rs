//! Command-line surface: `churnline train` and `churnline predict`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::common::config::AppCfg;
use crate::common::error::ChurnResult;
use crate::inference::{self, ScoreReport, ScoreRequest};
use crate::market::FsMarketConfigProvider;
use crate::training::{self, TrainReport, TrainRequest};

#[derive(Debug, Parser)]
#[command(name = "churnline", version)]
#[command(about = "Train and score per-market customer churn models")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train a model for one market and write its artefacts
    Train {
        #[command(flatten)]
        common: CommonArgs,

        /// Directory holding `<market>.toml` configs
        #[arg(long)]
        config_dir: Option<PathBuf>,
    },
    /// Score a dataset with a trained market model
    Predict {
        #[command(flatten)]
        common: CommonArgs,

        /// Path to a `model_<market>.json` artefact
        #[arg(long)]
        model: PathBuf,
    },
}

/// Options shared by both subcommands.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Input CSV with a header row
    #[arg(long)]
    pub data: PathBuf,

    /// Market to train or score; all rows when omitted
    #[arg(long)]
    pub market: Option<String>,

    /// Column holding the market code
    #[arg(long, default_value = "country")]
    pub market_col: String,

    /// Binary target column
    #[arg(long, default_value = "churn")]
    pub target: String,

    /// Output directory
    #[arg(long, default_value = "artifacts")]
    pub outdir: PathBuf,
}

/// Record printed on success.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Trained(TrainReport),
    Scored(ScoreReport),
}

/// Dispatch a parsed command.
pub fn run(cli: Cli, cfg: &AppCfg) -> ChurnResult<Outcome> {
    match cli.command {
        Command::Train { common, config_dir } => {
            let cfg = cfg.clone().with_market_config_dir(config_dir);
            let configs = FsMarketConfigProvider::from_cfg(&cfg);
            let request = TrainRequest {
                data: common.data,
                market: common.market,
                market_col: common.market_col,
                target: common.target,
                outdir: common.outdir,
            };
            training::train(&request, &configs).map(Outcome::Trained)
        }
        Command::Predict { common, model } => {
            let request = ScoreRequest {
                data: common.data,
                model,
                market: common.market,
                market_col: common.market_col,
                target: common.target,
                outdir: common.outdir,
            };
            inference::predict(&request).map(Outcome::Scored)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn train_defaults() {
        let cli = Cli::try_parse_from(["churnline", "train", "--data", "d.csv"]).unwrap();
        let Command::Train { common, config_dir } = cli.command else {
            panic!("expected train");
        };
        assert_eq!(common.market, None);
        assert_eq!(common.market_col, "country");
        assert_eq!(common.target, "churn");
        assert_eq!(common.outdir, PathBuf::from("artifacts"));
        assert!(config_dir.is_none());
    }

    #[test]
    fn predict_requires_model() {
        assert!(Cli::try_parse_from(["churnline", "predict", "--data", "d.csv"]).is_err());
        let cli = Cli::try_parse_from([
            "churnline", "predict", "--data", "d.csv", "--model", "m.json", "--market", "AB",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Predict { .. }));
    }
}

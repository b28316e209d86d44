use std::path::PathBuf;

use clap::Parser;

/// Terminal dashboard for running Terraform across AWS accounts.
#[derive(Debug, Parser)]
#[command(name = "lazytf", version, about)]
pub struct Cli {
    /// Account map to load. Defaults to the first of lazyterraform.yaml, Config.yaml,
    /// config.yaml found in the working directory.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Where to write the log. Defaults to the platform state directory.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

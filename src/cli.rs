use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Config file; overrides the COVID_STATS__CONFIG variable.
    #[clap(short, long)]
    pub config_path: Option<PathBuf>,
}

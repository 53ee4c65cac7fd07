use clap::Parser;
use covid_stats::{init_logs, Args, Settings};

fn log_error(err: anyhow::Error) -> anyhow::Error {
    tracing::error!("service failed with error: {:#}", err);
    err
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let settings = Settings::build(args.config_path.as_deref())?;
    init_logs(&settings.tracing)?;
    covid_stats::run(settings).await.map_err(log_error)
}

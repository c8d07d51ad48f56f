use clap::Parser;
use wx_ingest::cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    run(cli)
}

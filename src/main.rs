// src/main.rs

use cmdseq::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        // Every job is terminal but some ended FAILED or BLOCKED.
        Ok(false) => std::process::exit(2),
        Err(err) => {
            eprintln!("cmdseq error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let summary = run(args).await?;
    Ok(summary.is_clean())
}

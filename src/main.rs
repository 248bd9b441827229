// src/main.rs

use procvisor::{SupervisorError, cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("procvisor error: {err:#}");
        let code = err
            .downcast_ref::<SupervisorError>()
            .and_then(SupervisorError::exit_code)
            .filter(|code| *code != 0)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}

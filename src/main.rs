use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::error;

use pool_supervisor::error::SetupError;
use pool_supervisor::logger::logs_tracing;
use pool_supervisor::parse::{Cli, SupervisorConfig};
use pool_supervisor::{signals, Controller, ForkLauncher, Heartbeat, NixProcesses, PendingActions};

fn main() -> ExitCode {
    // usage errors exit with status 2 from here
    let cli = Cli::parse();

    let cfg = match cli.settings() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("pool-supervisor: {:#}", anyhow::Error::new(e));
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&cfg) {
        eprintln!("pool-supervisor: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.workers, &cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cfg: &SupervisorConfig) -> anyhow::Result<()> {
    let level = cfg.level()?;
    logs_tracing(level, cfg.log_dir.as_deref()).context("setting up logging")?;
    Ok(())
}

fn run(workers: usize, cfg: &SupervisorConfig) -> anyhow::Result<()> {
    // fork() is only safe while no other thread exists
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(SetupError::Runtime)?;

    runtime.block_on(async {
        let pending = Arc::new(PendingActions::new());
        let bridge = signals::install(pending.clone()).context("installing signal bridge")?;

        let launcher = ForkLauncher::new(Heartbeat { period: cfg.heartbeat() });
        let controller = Controller::new(workers, launcher, NixProcesses, pending, cfg.tick())
            .context("allocating slot table")?;

        controller.run().await;
        bridge.close().await;
        Ok::<_, anyhow::Error>(())
    })
}

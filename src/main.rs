use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use siege_engine::engine::sink;
use siege_engine::{load_targets, Args, Dispatcher, ReqwestTransport, Settings};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let settings = match args.into_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    match run(settings).await {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

/// 返回进程退出码
async fn run(settings: Settings) -> anyhow::Result<i32> {
    let targets = load_targets(&settings.source, &settings.request)?;
    let transport = Arc::new(ReqwestTransport::new(settings.run.timeout)?);

    println!("Server now under siege...");

    let handle = Dispatcher::new(settings.run.clone(), targets, transport).start();
    let cancel = handle.cancel_token();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("interrupt received, stopping run");
            cancel.cancel();
        })
    };

    let stats = handle.wait().await;
    interrupt.abort();
    let stats = stats?;

    sink::finish(
        &stats,
        settings.format,
        settings.log_file.as_deref(),
        cancel.is_cancelled(),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

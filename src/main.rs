use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use vibeplan::api::{self, ApiState};
use vibeplan::config::PipelineConfig;
use vibeplan::error::AppResult;
use vibeplan::services::pipeline_service::{PipelineContext, PipelineService};
use vibeplan::services::template_service::TemplateExpander;
use vibeplan::services::time_service::Clock;
use vibeplan::services::watcher::InputsWatcher;

#[tokio::main]
async fn main() {
    if let Err(error) = try_run().await {
        eprintln!("failed to launch vibeplan: {error}");
        std::process::exit(1);
    }
}

async fn try_run() -> AppResult<()> {
    let base_dir = std::env::current_dir()?;
    let config = PipelineConfig::load(&base_dir)?;
    config.ensure_dirs()?;

    vibeplan::utils::logger::init_logging(&config.log_dir())?;

    // A missing or malformed template is a bootstrap failure, not something
    // to discover on the first trigger.
    TemplateExpander::load_template(&config.template_path())?;

    let http_port = config.http_port;
    let watch_inputs = config.watch_inputs;
    let inputs_dir = config.inputs_dir();

    let context = Arc::new(PipelineContext::bootstrap(config, Clock::system())?);
    let pipeline = PipelineService::new(Arc::clone(&context));

    // One run executing, one queued; extra triggers are dropped at the
    // senders, so the stores never see two concurrent writers.
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<String>(1);

    let worker_pipeline = pipeline.clone();
    tokio::spawn(async move {
        while let Some(source) = trigger_rx.recv().await {
            let pipeline = worker_pipeline.clone();
            match tokio::task::spawn_blocking(move || pipeline.run(&source)).await {
                Ok(Ok(report)) => {
                    info!(target: "app::pipeline", ?report, "pipeline run done");
                }
                Ok(Err(err)) => {
                    error!(target: "app::pipeline", error = %err, "pipeline run failed");
                }
                Err(err) => {
                    error!(target: "app::pipeline", error = %err, "pipeline worker panicked");
                }
            }
        }
    });

    if watch_inputs {
        let watcher = InputsWatcher::new(inputs_dir)?;
        let watcher_tx = trigger_tx.clone();
        std::thread::spawn(move || watcher.watch(watcher_tx));
    }

    let state = ApiState { trigger_tx };
    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    info!(target: "app::api", %addr, "http trigger listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(target: "app::api", "shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

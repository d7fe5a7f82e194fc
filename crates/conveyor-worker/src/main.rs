use clap::Parser;
use conveyor_broker::{BrokerConnection, QueueGateway};
use conveyor_store::TaskStore;
use conveyor_worker::executor::TaskExecutor;
use conveyor_worker::handler::{
    CreateInvoiceHandler, FetchOrdersHandler, GeneratePdfHandler, SendEmailHandler,
};
use conveyor_worker::{HandlerRegistry, TaskProcessor, WorkerConfig, WorkerMetrics};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "conveyor-worker")]
#[command(about = "Durable task queue worker", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Broker URL (overrides config and environment)
    #[arg(long)]
    broker_url: Option<String>,

    /// Task store directory
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,

    /// Maximum retries before a task fails permanently
    #[arg(long)]
    max_retries: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = if std::path::Path::new(&args.config).exists() {
        WorkerConfig::from_file(&args.config)?
    } else {
        tracing::warn!("config file not found, using defaults");
        WorkerConfig::default()
    };
    config.apply_env();

    if let Some(url) = args.broker_url {
        config.broker.url = url;
    }
    if let Some(dir) = args.data_dir {
        config.store.data_dir = dir;
    }
    if let Some(max) = args.max_retries {
        config.max_retries = max;
    }

    let store = Arc::new(TaskStore::open(&config.store_config())?);
    let broker = BrokerConnection::open(config.broker_settings());
    let gateway = Arc::new(QueueGateway::new(broker.clone()));
    let metrics = Arc::new(WorkerMetrics::new()?);

    let registry = HandlerRegistry::new();
    registry.register(conveyor_core::task_types::FETCH_ORDERS, FetchOrdersHandler);
    registry.register(conveyor_core::task_types::CREATE_INVOICE, CreateInvoiceHandler);
    registry.register(conveyor_core::task_types::GENERATE_PDF, GeneratePdfHandler);
    registry.register(conveyor_core::task_types::SEND_EMAIL, SendEmailHandler);
    tracing::info!("registered task types: {:?}", registry.task_types());

    let processor = Arc::new(TaskProcessor::new(
        gateway,
        store,
        Arc::new(registry),
        config.retry_policy(),
        TaskExecutor::new(config.task_timeout()),
        metrics.clone(),
    ));
    processor.start().await?;

    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = serve_metrics(metrics, metrics_port).await {
            tracing::error!("metrics server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    broker.close();

    Ok(())
}

async fn serve_metrics(metrics: Arc<WorkerMetrics>, port: u16) -> anyhow::Result<()> {
    use axum::{extract::State, routing::get, Router};

    async fn metrics_handler(State(metrics): State<Arc<WorkerMetrics>>) -> String {
        metrics.render()
    }

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("metrics listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

use anyhow::{anyhow, bail, Context};
use clap::{ArgAction, Parser};
use native_ingester::app::ports::ConnectivityCheckPort;
use native_ingester::app::NativeMessageHandler;
use native_ingester::config::CollectionsConfig;
use native_ingester::constants::{
    DEFAULT_BACKOFF_SECONDS, DEFAULT_CLIENT_MAX_AGE_SECONDS, DEFAULT_HEALTH_TIMEOUT_SECONDS,
    DEFAULT_NO_OF_PROCESSORS, DEFAULT_OFFSET, DEFAULT_STREAM_COUNT,
};
use native_ingester::health::HealthService;
use native_ingester::infra::{
    AgeingClient, ClientSettings, HttpMessageProducer, HttpQueueProxy, NativeWriter,
    ProducerConfig,
};
use native_ingester::native::ContentBodyParser;
use native_ingester::queue::{CommitFailurePolicy, QueueConfig, QueueConsumer};
use native_ingester::{logging, metrics, server};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "native-ingester")]
#[command(
    about = "Ingests native content of any type, persists it in the native store and optionally forwards it to another queue"
)]
#[command(version)]
struct Cli {
    /// Port for the ops endpoints
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    #[arg(long, env = "APP_NAME", default_value = "native-ingester")]
    app_name: String,

    /// Origin routing file (JSON)
    #[arg(long, env = "CONFIG")]
    config: PathBuf,

    /// Queue proxy addresses to consume from (comma-separated)
    #[arg(long, env = "Q_READ_ADDR", value_delimiter = ',', required = true)]
    read_queue_addresses: Vec<String>,

    #[arg(long, env = "Q_READ_GROUP")]
    read_queue_group: String,

    #[arg(long, env = "Q_READ_TOPIC")]
    read_queue_topic: String,

    /// Host header sent to the consumer proxy
    #[arg(long, env = "Q_READ_QUEUE")]
    read_queue_host_header: Option<String>,

    #[arg(long, env = "Q_READ_OFFSET", default_value = DEFAULT_OFFSET)]
    read_queue_offset: String,

    #[arg(long, env = "Q_READ_STREAM_COUNT", default_value_t = DEFAULT_STREAM_COUNT)]
    read_queue_stream_count: usize,

    #[arg(long, env = "Q_READ_CONCURRENT_PROCESSING", default_value_t = false, action = ArgAction::Set)]
    read_queue_concurrent_processing: bool,

    #[arg(long, env = "Q_READ_NO_OF_PROCESSORS", default_value_t = DEFAULT_NO_OF_PROCESSORS)]
    read_queue_no_of_processors: usize,

    #[arg(long, env = "Q_READ_AUTO_COMMIT", default_value_t = false, action = ArgAction::Set)]
    read_queue_auto_commit: bool,

    #[arg(long, env = "Q_READ_BACKOFF_SECONDS", default_value_t = DEFAULT_BACKOFF_SECONDS)]
    read_queue_backoff_seconds: u64,

    #[arg(long, env = "Q_READ_AUTHORIZATION")]
    read_queue_authorization: Option<String>,

    /// reconnect | best-effort
    #[arg(long, env = "Q_COMMIT_FAILURE_POLICY", default_value = "reconnect")]
    commit_failure_policy: CommitFailurePolicy,

    /// Address of the service that persists native content
    #[arg(long, env = "NATIVE_RW_ADDRESS")]
    native_writer_address: String,

    #[arg(long, env = "NATIVE_RW_HOST_HEADER")]
    native_writer_host_header: Option<String>,

    /// Dotted JSON paths to the content UUID, tried in order (e.g. uuid,post.uuid,data.uuidv3)
    #[arg(long, env = "NATIVE_CONTENT_UUID_FIELDS", value_delimiter = ',')]
    content_uuid_fields: Vec<String>,

    /// Queue proxy to forward ingested messages to. Forwarding is off when unset.
    #[arg(long, env = "Q_WRITE_ADDR")]
    write_queue_address: Option<String>,

    #[arg(long, env = "Q_WRITE_TOPIC")]
    write_queue_topic: Option<String>,

    #[arg(long, env = "Q_WRITE_QUEUE")]
    write_queue_host_header: Option<String>,

    #[arg(long, env = "Q_WRITE_AUTHORIZATION")]
    write_queue_authorization: Option<String>,

    #[arg(long, env = "HTTP_CLIENT_MAX_AGE_SECONDS", default_value_t = DEFAULT_CLIENT_MAX_AGE_SECONDS)]
    http_client_max_age_seconds: u64,

    #[arg(long, env = "HEALTH_TIMEOUT_SECONDS", default_value_t = DEFAULT_HEALTH_TIMEOUT_SECONDS)]
    health_timeout_seconds: u64,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
}

impl Cli {
    fn queue_config(&self) -> QueueConfig {
        let mut config = QueueConfig::new(
            self.read_queue_addresses.clone(),
            &self.read_queue_group,
            &self.read_queue_topic,
        );
        config.queue = self.read_queue_host_header.clone();
        config.offset = self.read_queue_offset.clone();
        config.stream_count = self.read_queue_stream_count;
        config.concurrent_processing = self.read_queue_concurrent_processing;
        config.no_of_processors = self.read_queue_no_of_processors;
        config.auto_commit_enable = self.read_queue_auto_commit;
        config.backoff_period = Duration::from_secs(self.read_queue_backoff_seconds);
        config.authorization_key = self.read_queue_authorization.clone();
        config.commit_failure_policy = self.commit_failure_policy;
        config
    }

    fn producer_config(&self) -> anyhow::Result<Option<ProducerConfig>> {
        let address = match self.write_queue_address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => address.to_string(),
            _ => return Ok(None),
        };
        let topic = match self.write_queue_topic.as_deref().map(str::trim) {
            Some(topic) if !topic.is_empty() => topic.to_string(),
            _ => bail!("Q_WRITE_TOPIC is required when Q_WRITE_ADDR is set"),
        };
        Ok(Some(ProducerConfig {
            address,
            topic,
            queue: self.write_queue_host_header.clone(),
            authorization: self.write_queue_authorization.clone(),
        }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    logging::init_logging(&cli.app_name);
    metrics::init_metrics(cli.metrics_addr);

    let collections = CollectionsConfig::from_file(&cli.config)
        .with_context(|| format!("Error reading the configuration from {}", cli.config.display()))?;
    info!(origins = collections.origin_count(), "[Startup] Loaded origin routing configuration");

    let queue_config = cli.queue_config();
    queue_config.validate()?;
    let producer_config = cli.producer_config()?;

    if cli.content_uuid_fields.is_empty() {
        warn!("[Startup] No content UUID fields configured; every message will be dropped");
    }
    let body_parser = ContentBodyParser::new(cli.content_uuid_fields.clone());
    info!(paths = ?body_parser.uuid_paths(), "[Startup] Using UUID paths configuration");

    let max_age = Duration::from_secs(cli.http_client_max_age_seconds);
    let writer_http = AgeingClient::new(ClientSettings::default())?;
    let consumer_http = AgeingClient::new(ClientSettings::default())?;
    let mut ageing_tasks = vec![
        writer_http.start_ageing_process(max_age),
        consumer_http.start_ageing_process(max_age),
    ];

    let writer = Arc::new(NativeWriter::new(
        &cli.native_writer_address,
        Arc::new(collections),
        cli.native_writer_host_header.clone(),
        writer_http,
        body_parser,
    ));
    info!(address = %cli.native_writer_address, "[Startup] Using native writer");

    let mut handler = NativeMessageHandler::new(writer.clone());
    let producer = match producer_config {
        Some(config) => {
            info!(address = %config.address, topic = %config.topic, "[Startup] Forwarding to producer");
            let producer_http = AgeingClient::new(ClientSettings::default())?;
            ageing_tasks.push(producer_http.start_ageing_process(max_age));
            let producer = Arc::new(HttpMessageProducer::new(config, producer_http));
            handler = handler.forward_to(producer.clone());
            Some(producer)
        }
        None => None,
    };

    info!(forwarding = handler.forwards(), "[Startup] Message handler ready");

    let proxy = Arc::new(HttpQueueProxy::new(&queue_config, consumer_http));
    let consumer = Arc::new(QueueConsumer::new(queue_config, proxy, Arc::new(handler)));

    let health = Arc::new(HealthService::new(
        consumer.clone(),
        writer,
        producer.map(|p| p as Arc<dyn ConnectivityCheckPort>),
        Duration::from_secs(cli.health_timeout_seconds),
    ));

    let (server_stop_tx, server_stop_rx) = oneshot::channel::<()>();
    let mut server_task = tokio::spawn(server::start_server(health, cli.port, async {
        let _ = server_stop_rx.await;
    }));

    let consuming = {
        let consumer = consumer.clone();
        tokio::spawn(async move { consumer.start().await })
    };

    let server_failure = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            None
        }
        result = &mut server_task => {
            let failure = match result {
                Ok(Err(e)) => anyhow::Error::new(e).context("Couldn't set up HTTP listener"),
                Err(e) => anyhow::Error::new(e).context("HTTP listener task failed"),
                Ok(Ok(())) => anyhow!("HTTP listener exited unexpectedly"),
            };
            error!(error = %failure, "Ops server stopped, shutting down");
            Some(failure)
        }
    };

    consumer.stop();
    if let Err(e) = consuming.await {
        error!(error = %e, "Consumer task failed");
    }
    let _ = server_stop_tx.send(());
    if !server_task.is_finished() {
        if let Ok(Err(e)) = server_task.await {
            error!(error = %e, "HTTP listener failed during shutdown");
        }
    }
    for task in ageing_tasks {
        task.abort();
    }
    if let Some(failure) = server_failure {
        return Err(failure);
    }
    info!("Native ingester stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
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
                error!(error = %e, "Failed to listen for SIGTERM");
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

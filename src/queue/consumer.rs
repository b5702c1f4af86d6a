//! Queue consumption engine.
//!
//! Runs `stream_count` independent polling loops. Each loop owns at most one
//! consumer instance on the proxy, creates it lazily, and throws it away on
//! any consume or commit failure so the next iteration starts clean.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::app::ports::{ConnectivityCheckPort, MessageHandlerPort, QueueProxyPort};
use crate::domain::{ConsumerInstance, Message};
use crate::error::Result;
use crate::metrics::ConsumerMetrics;
use crate::queue::config::{CommitFailurePolicy, QueueConfig};

const DISPATCH_CHANNEL_CAPACITY: usize = 128;

pub struct QueueConsumer {
    config: Arc<QueueConfig>,
    proxy: Arc<dyn QueueProxyPort>,
    handler: Arc<dyn MessageHandlerPort>,
    shutdown_tx: watch::Sender<bool>,
}

impl QueueConsumer {
    pub fn new(
        config: QueueConfig,
        proxy: Arc<dyn QueueProxyPort>,
        handler: Arc<dyn MessageHandlerPort>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config: Arc::new(config),
            proxy,
            handler,
            shutdown_tx,
        }
    }

    /// Runs every stream until [`stop`](Self::stop) is called and all of them have drained.
    pub async fn start(&self) {
        let stream_count = self.config.stream_count.max(1);
        info!(
            streams = stream_count,
            topic = %self.config.topic,
            group = %self.config.group,
            concurrent = self.config.concurrent_processing,
            "Starting queue consumer"
        );

        let mut streams = JoinSet::new();
        for id in 0..stream_count {
            let stream = Stream {
                id,
                config: self.config.clone(),
                proxy: self.proxy.clone(),
                handler: self.handler.clone(),
                shutdown: self.shutdown_tx.subscribe(),
                instance: None,
            };
            streams.spawn(stream.run());
        }

        while let Some(joined) = streams.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Consumer stream terminated abnormally");
            }
        }
        info!("Queue consumer stopped");
    }

    /// Asks every stream to finish its current iteration and release its instance.
    pub fn stop(&self) {
        info!("Stopping queue consumer");
        self.shutdown_tx.send_replace(true);
    }
}

#[async_trait]
impl ConnectivityCheckPort for QueueConsumer {
    async fn connectivity_check(&self) -> Result<String> {
        self.proxy.check_connectivity().await.map_err(|e| {
            error!(error = %e, "Consumer connectivity check failed");
            e
        })
    }
}

struct Stream {
    id: usize,
    config: Arc<QueueConfig>,
    proxy: Arc<dyn QueueProxyPort>,
    handler: Arc<dyn MessageHandlerPort>,
    shutdown: watch::Receiver<bool>,
    instance: Option<ConsumerInstance>,
}

impl Stream {
    async fn run(mut self) {
        debug!(stream = self.id, "Consumer stream started");
        while !self.shutdown_requested() {
            if !self.consume_once().await {
                self.backoff().await;
            }
        }
        if let Some(instance) = self.instance.take() {
            self.destroy(&instance).await;
        }
        debug!(stream = self.id, "Consumer stream finished");
    }

    fn shutdown_requested(&self) -> bool {
        if *self.shutdown.borrow() {
            return true;
        }
        // A dropped sender means nobody can ever stop us; treat it as a stop.
        self.shutdown.has_changed().is_err()
    }

    /// One poll iteration. Returns `false` when the stream should back off.
    async fn consume_once(&mut self) -> bool {
        let instance = match &self.instance {
            Some(instance) => instance.clone(),
            None => match self.proxy.create_instance().await {
                Ok(instance) => {
                    info!(stream = self.id, base_uri = %instance.base_uri, "Created consumer instance");
                    ConsumerMetrics::record_instance_created();
                    self.instance = Some(instance.clone());
                    instance
                }
                Err(e) => {
                    error!(stream = self.id, error = %e, "Error creating consumer instance");
                    ConsumerMetrics::record_poll_error();
                    return false;
                }
            },
        };

        let messages = match self.proxy.consume(&instance).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(stream = self.id, error = %e, "Error consuming messages");
                ConsumerMetrics::record_poll_error();
                self.discard_instance().await;
                return false;
            }
        };

        ConsumerMetrics::record_poll(messages.len());
        if messages.is_empty() {
            return false;
        }
        debug!(stream = self.id, count = messages.len(), "Consumed batch");

        self.dispatch(messages).await;

        if self.config.auto_commit_enable {
            return true;
        }
        match self.proxy.commit_offsets(&instance).await {
            Ok(()) => true,
            Err(e) => {
                ConsumerMetrics::record_commit_error();
                match self.config.commit_failure_policy {
                    CommitFailurePolicy::Reconnect => {
                        error!(stream = self.id, error = %e, "Error committing offsets, recreating consumer instance");
                        self.discard_instance().await;
                        false
                    }
                    CommitFailurePolicy::BestEffort => {
                        warn!(stream = self.id, error = %e, "Error committing offsets, keeping consumer instance");
                        true
                    }
                }
            }
        }
    }

    /// Hands the batch to the handler. Returns only when every message has been handled.
    async fn dispatch(&self, messages: Vec<Message>) {
        if !self.config.concurrent_processing {
            for msg in messages {
                handle_guarded(self.handler.as_ref(), msg).await;
            }
            return;
        }

        let workers = self.config.no_of_processors.max(1).min(messages.len());
        let (tx, rx) = mpsc::channel(DISPATCH_CHANNEL_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));
        let mut tasks = JoinSet::new();

        tasks.spawn(async move {
            for msg in messages {
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
        });

        for _ in 0..workers {
            let rx = rx.clone();
            let handler = self.handler.clone();
            tasks.spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    match next {
                        Some(msg) => handle_guarded(handler.as_ref(), msg).await,
                        None => break,
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(stream = self.id, error = %e, "Dispatch worker failed");
            }
        }
    }

    async fn discard_instance(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.destroy(&instance).await;
        }
    }

    async fn destroy(&self, instance: &ConsumerInstance) {
        match self.proxy.destroy_instance(instance).await {
            Ok(()) => {
                debug!(stream = self.id, base_uri = %instance.base_uri, "Destroyed consumer instance");
                ConsumerMetrics::record_instance_destroyed();
            }
            Err(e) => error!(stream = self.id, error = %e, "Error deleting consumer instance"),
        }
    }

    async fn backoff(&mut self) {
        tokio::select! {
            _ = tokio::time::sleep(self.config.backoff_period) => {}
            _ = self.shutdown.changed() => {}
        }
    }
}

/// A panicking handler loses its message, never the stream.
async fn handle_guarded(handler: &dyn MessageHandlerPort, msg: Message) {
    let tid = msg.transaction_id().to_string();
    if let Err(panic) = AssertUnwindSafe(handler.handle_message(msg))
        .catch_unwind()
        .await
    {
        ConsumerMetrics::record_handler_panic();
        error!(transaction_id = %tid, panic = %panic_message(panic.as_ref()), "Recovered from panic in message handler");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

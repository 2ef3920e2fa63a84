use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use spdlog::sink::{RotatingFileSink, RotationPolicy};
use spdlog::{error, info, Logger};
use tokio::sync::mpsc;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use crate::analytics::visit_counter::{DayBucket, VisitCounter};

pub mod visit_counter;

pub struct VisitEvent {
    pub slug: String,
    pub origin: String,
}

/// Writes finished day buckets as JSON lines into a rotating file, one file
/// per day.
pub struct VisitPublisher {
    logger: Arc<Logger>,
}

impl VisitPublisher {
    pub fn new(base_path: &PathBuf) -> spdlog::Result<Self> {
        let daily: Arc<RotatingFileSink> = Arc::new(
            RotatingFileSink::builder()
                .base_path(base_path)
                .rotation_policy(RotationPolicy::Daily { hour: 0, minute: 0 })
                .rotate_on_open(false)
                .build()?,
        );

        let logger = Arc::new(Logger::builder().sink(daily).build()?);
        Ok(Self { logger })
    }

    pub fn store(&self, buckets: &[DayBucket]) -> io::Result<()> {
        for bucket in buckets {
            let json = serde_json::to_string(bucket)?;
            info!(logger: self.logger, "{}", &json);
        }
        self.logger.flush();

        Ok(())
    }
}

/// Owns the receiver task: visit events come in over a channel, buckets of
/// finished days go out through the publisher. The periodic timeout makes
/// sure a quiet blog still publishes yesterday's buckets.
pub struct VisitTracker {
    _receiver_task: JoinHandle<()>,
    sender: Sender<VisitEvent>,
}

impl VisitTracker {
    pub fn new(publisher: VisitPublisher) -> Self {
        let (tx, mut rx) = mpsc::channel::<VisitEvent>(64);

        let receiver_task = tokio::spawn(async move {
            info!("Starting visit tracker");
            let mut counter = VisitCounter::new();
            loop {
                match tokio::time::timeout(std::time::Duration::from_secs(60), rx.recv()).await {
                    Ok(Some(event)) => counter.record(&event.slug, &event.origin),
                    Ok(None) => break,
                    Err(_timeout) => counter.roll_over(),
                }

                if let Some(finished) = counter.take_finished() {
                    if let Err(e) = publisher.store(&finished) {
                        error!("Error publishing visit counters: {}", e);
                    }
                }
            }
        });

        Self {
            _receiver_task: receiver_task,
            sender: tx,
        }
    }

    pub fn new_sender(&self) -> VisitSender {
        VisitSender::new(self.sender.clone())
    }

    pub fn no_op() -> VisitSender {
        VisitSender::no_op()
    }
}

/// Cheap handle the view handler uses to report a visit. The no-op variant
/// backs deployments without a metrics section in the config.
pub struct VisitSender {
    sender_ch: Option<Sender<VisitEvent>>,
}

impl VisitSender {
    pub fn new(sender_ch: Sender<VisitEvent>) -> Self {
        Self {
            sender_ch: Some(sender_ch),
        }
    }

    pub fn no_op() -> Self {
        Self { sender_ch: None }
    }

    pub async fn view(&self, slug: String, origin: String) {
        if let Some(ref sender) = self.sender_ch {
            if let Err(e) = sender.send(VisitEvent { slug, origin }).await {
                error!("Error recording visit: {}", e);
            }
        }
    }
}

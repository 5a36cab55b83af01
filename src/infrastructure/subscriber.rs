use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{Message, OwnedMessage};
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::application::ingest::{IngestOutcome, IngestService};
use crate::config::BusConfig;
use crate::domain::ports::OrderStore;

use super::offsets::OffsetTracker;

const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the durable consumer and check that the broker answers.
///
/// The durable name is the consumer group, so the broker keeps our committed
/// position across restarts. Offsets are committed by hand once a message is
/// handled; nothing is committed automatically.
///
/// Blocks while fetching metadata.
pub fn connect(bus: &BusConfig) -> Result<StreamConsumer, KafkaError> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &bus.server)
        .set("group.id", &bus.durable_name)
        .set("client.id", format!("{}.{}", bus.cluster_id, bus.client_id))
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .create()?;

    consumer.fetch_metadata(Some(bus.subject.as_str()), METADATA_TIMEOUT)?;
    consumer.subscribe(&[bus.subject.as_str()])?;
    log::info!(
        "Subscribed to '{}' on {} as '{}' (cluster '{}')",
        bus.subject,
        bus.server,
        bus.durable_name,
        bus.cluster_id
    );
    Ok(consumer)
}

/// Whether a delivery may be acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Acknowledge,
    /// Left unacknowledged for the broker to redeliver.
    Abandon,
}

/// Run one payload through the pipeline, retrying store failures with
/// exponential backoff until the pipeline reaches a terminal outcome or
/// shutdown begins.
pub async fn deliver<S: OrderStore>(
    pipeline: &Arc<IngestService<S>>,
    payload: Arc<[u8]>,
    first_backoff: Duration,
    shutdown: &CancellationToken,
) -> Delivery {
    let mut backoff = first_backoff;
    loop {
        let worker = Arc::clone(pipeline);
        let raw = Arc::clone(&payload);
        let outcome = match tokio::task::spawn_blocking(move || worker.ingest(&raw)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Ingest worker failed: {}", e);
                return Delivery::Abandon;
            }
        };

        if outcome.is_terminal() {
            return Delivery::Acknowledge;
        }
        if let IngestOutcome::Failed(e) = &outcome {
            log::warn!("Retrying in {:?}: {}", backoff, e);
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                log::warn!("Shutting down; leaving message for redelivery");
                return Delivery::Abandon;
            }
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
    }
}

/// Pulls orders off the bus and feeds them to the ingest pipeline with at
/// most `max_in_flight` messages in progress.
pub struct OrderSubscriber<S> {
    consumer: Arc<StreamConsumer>,
    topic: String,
    pipeline: Arc<IngestService<S>>,
    slots: Arc<Semaphore>,
    retry_backoff: Duration,
    offsets: Arc<Mutex<OffsetTracker>>,
}

impl<S: OrderStore> OrderSubscriber<S> {
    pub fn new(
        consumer: Arc<StreamConsumer>,
        pipeline: Arc<IngestService<S>>,
        bus: &BusConfig,
    ) -> Self {
        Self {
            consumer,
            topic: bus.subject.clone(),
            pipeline,
            slots: Arc::new(Semaphore::new(bus.max_in_flight as usize)),
            retry_backoff: bus.retry_backoff,
            offsets: Arc::new(Mutex::new(OffsetTracker::new())),
        }
    }

    /// Consume until `shutdown` fires, then wait for in-flight messages.
    ///
    /// Dropping the returned future aborts every worker it spawned.
    pub async fn run(self, shutdown: CancellationToken) {
        let this = Arc::new(self);
        let mut workers = JoinSet::new();
        loop {
            while let Some(finished) = workers.try_join_next() {
                report(finished);
            }

            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&this.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let message = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = this.consumer.recv() => match received {
                    Ok(message) => message.detach(),
                    Err(e) => {
                        log::error!("Failed to receive from the bus: {}", e);
                        continue;
                    }
                },
            };

            this.offsets.lock().begin(message.partition(), message.offset());
            let worker = Arc::clone(&this);
            let shutdown = shutdown.clone();
            workers.spawn(async move {
                worker.handle(message, &shutdown).await;
                drop(permit);
            });
        }

        log::info!("Stopped taking new messages, draining in-flight work");
        while let Some(finished) = workers.join_next().await {
            report(finished);
        }
        log::info!("Ingest drained");
    }

    async fn handle(&self, message: OwnedMessage, shutdown: &CancellationToken) {
        let payload: Arc<[u8]> = Arc::from(message.payload().unwrap_or_default());
        match deliver(&self.pipeline, payload, self.retry_backoff, shutdown).await {
            Delivery::Acknowledge => self.acknowledge(message.partition(), message.offset()),
            Delivery::Abandon => {}
        }
    }

    fn acknowledge(&self, partition: i32, offset: i64) {
        let Some(next) = self.offsets.lock().complete(partition, offset) else {
            return;
        };
        let mut positions = TopicPartitionList::new();
        if let Err(e) = positions.add_partition_offset(&self.topic, partition, Offset::Offset(next))
        {
            log::error!("Cannot record offset {} for partition {}: {}", next, partition, e);
            return;
        }
        if let Err(e) = self.consumer.commit(&positions, CommitMode::Async) {
            log::error!("Failed to commit offset {} on partition {}: {}", next, partition, e);
        }
    }
}

fn report(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        log::error!("Ingest worker failed: {}", e);
    }
}

//! ==============================================================================
//! ingest.rs - inbound message sources and the ingest loop
//! ==============================================================================
//!
//! purpose:
//!     turns a stream of `(topic, payload)` messages into record() calls on
//!     the shared store. exactly one run_ingest drains the host's queue, so
//!     it is the single writer of every SensorRecord.
//!
//! sources:
//!     - ChannelSource: an mpsc queue. the web server's publish endpoint (or
//!       a broker bridge) pushes into it through a Publisher.
//!     - SimulatedSource: a mock sensor feed for development machines, in
//!       the spirit of a mock HAL. it sweeps every registered channel at a
//!       fixed interval with smoothly varying values. `forward` pumps it
//!       into the same queue instead of writing to the store itself.
//!
//! relationships:
//!     - used by: main.rs (one run_ingest on the queue, forward per extra source)
//!     - writes: store.rs (SensorStore::ingest)
//!
//! ==============================================================================

use crate::domain::{Channel, ChannelId, Message, Zone};
use crate::error::StoreError;
use crate::store::SensorStore;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// anything that yields inbound messages one at a time
pub trait MessageSource: Send {
    /// next message, or `None` once the source is closed
    fn next_message(&mut self) -> impl Future<Output = Option<Message>> + Send;
}

// ==============================================================================
// channel source
// ==============================================================================

pub struct ChannelSource {
    rx: mpsc::Receiver<Message>,
}

/// sending half of a ChannelSource
#[derive(Clone)]
pub struct Publisher {
    tx: mpsc::Sender<Message>,
    prefix: String,
}

/// build a bounded queue; `depth` is clamped to at least 1
pub fn channel(depth: usize, prefix: impl Into<String>) -> (Publisher, ChannelSource) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (
        Publisher {
            tx,
            prefix: prefix.into(),
        },
        ChannelSource { rx },
    )
}

impl MessageSource for ChannelSource {
    async fn next_message(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

impl Publisher {
    /// queue a raw message
    pub async fn send(&self, message: Message) -> anyhow::Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| anyhow::anyhow!("ingest loop is not running"))
    }

    /// queue a payload for `<prefix>/<zone>/<channel>` and return that topic;
    /// names are not validated here, the store ignores topics it does not know
    pub async fn publish(&self, zone: &str, channel: &str, payload: impl Into<String>) -> anyhow::Result<String> {
        let topic = format!("{}/{}/{}", self.prefix, zone, channel);
        self.send(Message::new(topic.clone(), payload)).await?;
        Ok(topic)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ==============================================================================
// simulated source
// ==============================================================================

pub struct SimulatedSource {
    ids: Vec<ChannelId>,
    prefix: String,
    interval: Duration,
    pending: VecDeque<Message>,
    sweep: u64,
    max_sweeps: Option<u64>,
}

impl SimulatedSource {
    pub fn new(ids: Vec<ChannelId>, prefix: impl Into<String>, interval: Duration) -> Self {
        Self {
            ids,
            prefix: prefix.into(),
            interval,
            pending: VecDeque::new(),
            sweep: 0,
            max_sweeps: None,
        }
    }

    /// close the source after `sweeps` full passes over the channels
    pub fn with_limit(mut self, sweeps: u64) -> Self {
        self.max_sweeps = Some(sweeps);
        self
    }

    /// plausible value for a channel at a given sweep
    pub fn sample(id: ChannelId, sweep: u64) -> f64 {
        let (base, amplitude) = match (id.zone, id.channel) {
            (Zone::Indoor, Channel::Temperature) => (21.0, 1.5),
            (_, Channel::Temperature) => (12.0, 6.0),
            (Zone::Indoor, Channel::Humidity) => (45.0, 5.0),
            (_, Channel::Humidity) => (70.0, 15.0),
            (_, Channel::Pressure) => (1013.0, 8.0),
            (Zone::Indoor, Channel::WindSpeed) => (0.0, 0.0),
            (_, Channel::WindSpeed) => (12.0, 10.0),
        };
        // zones drift out of phase so the dashboard does not move in lockstep
        let phase = sweep as f64 / 60.0 + id.zone as u8 as f64;
        base + amplitude * phase.sin()
    }

    fn fill(&mut self) {
        for id in &self.ids {
            let value = Self::sample(*id, self.sweep);
            self.pending
                .push_back(Message::new(id.topic(&self.prefix), format!("{:.2}", value)));
        }
        self.sweep += 1;
    }
}

impl MessageSource for SimulatedSource {
    async fn next_message(&mut self) -> Option<Message> {
        if self.pending.is_empty() {
            if self.ids.is_empty() || self.max_sweeps.is_some_and(|max| self.sweep >= max) {
                return None;
            }
            if self.sweep > 0 {
                tokio::time::sleep(self.interval).await;
            }
            self.fill();
        }
        self.pending.pop_front()
    }
}

// ==============================================================================
// ingest loop
// ==============================================================================

/// pump `source` into the queue behind `publisher` until either side closes.
///
/// returns the number of messages forwarded.
pub async fn forward<S: MessageSource>(mut source: S, publisher: Publisher) -> u64 {
    let mut forwarded = 0u64;
    while let Some(message) = source.next_message().await {
        if publisher.send(message).await.is_err() {
            tracing::warn!("[INGEST] queue closed, stopping forwarder");
            break;
        }
        forwarded += 1;
    }
    forwarded
}

/// drain `source` into `store` until the source closes.
///
/// returns the number of messages that updated a record.
pub async fn run_ingest<S: MessageSource>(mut source: S, store: Arc<SensorStore>) -> u64 {
    let mut applied = 0u64;
    while let Some(message) = source.next_message().await {
        match store.ingest(&message.topic, &message.payload) {
            Ok(Some(id)) => {
                applied += 1;
                tracing::trace!("[INGEST] {} <- {}", id, message.payload.trim());
            }
            Ok(None) => {}
            Err(e @ StoreError::MalformedPayload { .. }) => {
                tracing::warn!("[INGEST] dropped message: {}", e);
            }
            Err(e) => {
                tracing::error!("[INGEST] {}", e);
            }
        }
    }
    tracing::info!("[INGEST] source closed after {} updates", applied);
    applied
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SensorRecord;

    const INDOOR_TEMP: ChannelId = ChannelId::new(Zone::Indoor, Channel::Temperature);
    const OUTDOOR_WIND: ChannelId = ChannelId::new(Zone::Outdoor, Channel::WindSpeed);

    fn store() -> Arc<SensorStore> {
        Arc::new(
            SensorStore::builder()
                .register(INDOOR_TEMP, SensorRecord::running(0.0, 999.0, -999.0), 1)
                .register(OUTDOOR_WIND, SensorRecord::windowed_24h(), 1)
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_channel_source_feeds_store() {
        let store = store();
        let (publisher, source) = channel(8, "enviro");
        let task = tokio::spawn(run_ingest(source, store.clone()));

        for payload in ["21.5", "19.0", "23.2"] {
            publisher.publish("indoor", "temperature", payload).await.unwrap();
        }
        publisher.publish("attic", "temperature", "5").await.unwrap();
        publisher.publish("outdoor", "windSpeed", "fast").await.unwrap();
        drop(publisher);

        let applied = task.await.unwrap();
        assert_eq!(applied, 3);

        let stats = store.get(INDOOR_TEMP).unwrap().stats();
        assert_eq!((stats.current, stats.minimum, stats.maximum), (23.2, 19.0, 23.2));
        assert!(store.get(OUTDOOR_WIND).unwrap().is_empty());
        assert!(store.take_dirty_and_clear());
    }

    #[tokio::test]
    async fn test_publisher_reports_closed_loop() {
        let (publisher, source) = channel(1, "enviro");
        drop(source);
        assert!(publisher.is_closed());
        assert!(publisher.publish("indoor", "temperature", "1").await.is_err());
    }

    #[tokio::test]
    async fn test_simulated_source_sweeps_all_channels() {
        let store = store();
        let ids: Vec<ChannelId> = store.channel_ids().collect();
        let source = SimulatedSource::new(ids, "enviro", Duration::from_millis(1)).with_limit(3);

        let applied = run_ingest(source, store.clone()).await;
        assert_eq!(applied, 6);
        assert_eq!(store.get(OUTDOOR_WIND).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_forwarded_sources_share_one_writer() {
        let store = store();
        let (publisher, queue) = channel(4, "enviro");
        let writer = tokio::spawn(run_ingest(queue, store.clone()));

        let ids: Vec<ChannelId> = store.channel_ids().collect();
        let simulated = SimulatedSource::new(ids, "enviro", Duration::from_millis(1)).with_limit(2);
        let forwarder = tokio::spawn(forward(simulated, publisher.clone()));

        let topic = publisher.publish("indoor", "temperature", "30.0").await.unwrap();
        assert_eq!(topic, "enviro/indoor/temperature");

        assert_eq!(forwarder.await.unwrap(), 4);
        drop(publisher);

        // every message, simulated or published, went through the one loop
        assert_eq!(writer.await.unwrap(), 5);
        assert_eq!(store.get(OUTDOOR_WIND).unwrap().len(), 2);
        assert_eq!(store.get(INDOOR_TEMP).unwrap().maximum(), 30.0);
    }

    #[tokio::test]
    async fn test_forward_stops_when_queue_closes() {
        let (publisher, queue) = channel(1, "enviro");
        drop(queue);
        let simulated = SimulatedSource::new(vec![INDOOR_TEMP], "enviro", Duration::from_millis(1));
        assert_eq!(forward(simulated, publisher).await, 0);
    }

    #[test]
    fn test_simulated_values_are_plausible() {
        for sweep in 0..500 {
            let t = SimulatedSource::sample(INDOOR_TEMP, sweep);
            assert!((19.0..=23.0).contains(&t), "{t}");
            assert!(SimulatedSource::sample(OUTDOOR_WIND, sweep) >= 0.0);
        }
    }
}

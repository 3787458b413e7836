//! ==============================================================================
//! store.rs - fixed grid of sensor records plus the freshness flag
//! ==============================================================================
//!
//! purpose:
//!     owns every SensorRecord, keyed by (zone, channel), and the single
//!     `dirty` flag that tells the render loop new data is waiting.
//!
//! relationships:
//!     - built by: config.rs (HostConfig::build_store)
//!     - written by: ingest.rs (run_ingest -> ingest)
//!     - read by: render.rs (snapshot), server.rs (lookup)
//!
//! the set of registered pairs is fixed when the store is built. the store
//! is shared by Arc between the ingest loop, the render loop and the web
//! server; there is no global instance.
//!
//! ==============================================================================

use crate::domain::{Channel, ChannelId, ChannelSnapshot, Zone};
use crate::error::{Result, StoreError};
use crate::record::SensorRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// what to do with a payload that is not a number
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadPolicy {
    /// drop the message and report MalformedPayload
    #[default]
    Reject,
    /// legacy atof-style conversion: leading numeric prefix, else 0.0
    Coerce,
}

impl PayloadPolicy {
    pub fn parse(self, payload: &str) -> Option<f64> {
        match self {
            PayloadPolicy::Reject => payload
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite()),
            PayloadPolicy::Coerce => Some(parse_numeric_prefix(payload).unwrap_or(0.0)),
        }
    }
}

/// longest leading `[+-]digits[.digits][e[+-]digits]` after whitespace
fn parse_numeric_prefix(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }
    if digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

struct Slot {
    id: ChannelId,
    record: SensorRecord,
    decimals: u8,
}

pub struct SensorStore {
    slots: Vec<Slot>,
    index: HashMap<ChannelId, usize>,
    topic_prefix: String,
    policy: PayloadPolicy,
    dirty: AtomicBool,
}

impl SensorStore {
    pub const DEFAULT_TOPIC_PREFIX: &'static str = "enviro";

    pub fn builder() -> SensorStoreBuilder {
        SensorStoreBuilder::default()
    }

    /// typed lookup
    pub fn get(&self, id: ChannelId) -> Option<&SensorRecord> {
        self.index.get(&id).map(|&i| &self.slots[i].record)
    }

    /// map wire names to a registered id
    pub fn resolve(&self, zone: &str, channel: &str) -> Result<ChannelId> {
        let unknown = || StoreError::UnknownChannel {
            zone: zone.to_string(),
            channel: channel.to_string(),
        };
        let zone: Zone = zone.parse().map_err(|_| unknown())?;
        let channel: Channel = channel.parse().map_err(|_| unknown())?;
        let id = ChannelId::new(zone, channel);
        if self.index.contains_key(&id) {
            Ok(id)
        } else {
            Err(unknown())
        }
    }

    /// lookup by wire names; fails loudly for anything not registered
    pub fn lookup(&self, zone: &str, channel: &str) -> Result<&SensorRecord> {
        let id = self.resolve(zone, channel)?;
        Ok(&self.slots[self.index[&id]].record)
    }

    pub fn decimals(&self, id: ChannelId) -> Option<u8> {
        self.index.get(&id).map(|&i| self.slots[i].decimals)
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.slots.iter().map(|s| s.id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    pub fn payload_policy(&self) -> PayloadPolicy {
        self.policy
    }

    /// apply one inbound message.
    ///
    /// unrecognized or unregistered topics are ignored (`Ok(None)`); a bad
    /// payload under `PayloadPolicy::Reject` is an error and nothing is
    /// recorded.
    pub fn ingest(&self, topic: &str, payload: &str) -> Result<Option<ChannelId>> {
        let Some(id) = ChannelId::from_topic(&self.topic_prefix, topic) else {
            tracing::debug!("ignoring unrecognized topic '{}'", topic);
            return Ok(None);
        };
        let Some(record) = self.get(id) else {
            tracing::debug!("ignoring unregistered channel '{}'", id);
            return Ok(None);
        };
        let value = self
            .policy
            .parse(payload)
            .ok_or_else(|| StoreError::MalformedPayload {
                topic: topic.to_string(),
                payload: payload.to_string(),
            })?;

        record.record(value);
        self.mark_dirty();
        Ok(Some(id))
    }

    /// flag that unrendered data exists; idempotent
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// read and reset the flag in one atomic step
    pub fn take_dirty_and_clear(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// every record's stats in registration order
    pub fn snapshot(&self) -> Vec<ChannelSnapshot> {
        self.slots
            .iter()
            .map(|slot| {
                let (stats, samples) = slot.record.stats_with_len();
                ChannelSnapshot {
                    zone: slot.id.zone,
                    channel: slot.id.channel,
                    current: stats.current,
                    minimum: stats.minimum,
                    maximum: stats.maximum,
                    decimals: slot.decimals,
                    samples,
                }
            })
            .collect()
    }
}

pub struct SensorStoreBuilder {
    slots: Vec<Slot>,
    topic_prefix: String,
    policy: PayloadPolicy,
}

impl Default for SensorStoreBuilder {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            topic_prefix: SensorStore::DEFAULT_TOPIC_PREFIX.to_string(),
            policy: PayloadPolicy::default(),
        }
    }
}

impl SensorStoreBuilder {
    pub fn register(mut self, id: ChannelId, record: SensorRecord, decimals: u8) -> Self {
        self.slots.push(Slot { id, record, decimals });
        self
    }

    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    pub fn payload_policy(mut self, policy: PayloadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Result<SensorStore> {
        let mut index = HashMap::with_capacity(self.slots.len());
        for (i, slot) in self.slots.iter().enumerate() {
            if index.insert(slot.id, i).is_some() {
                return Err(StoreError::DuplicateChannel {
                    zone: slot.id.zone.to_string(),
                    channel: slot.id.channel.to_string(),
                });
            }
        }
        Ok(SensorStore {
            slots: self.slots,
            index,
            topic_prefix: self.topic_prefix,
            policy: self.policy,
            dirty: AtomicBool::new(false),
        })
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const INDOOR_TEMP: ChannelId = ChannelId::new(Zone::Indoor, Channel::Temperature);
    const OUTDOOR_TEMP: ChannelId = ChannelId::new(Zone::Outdoor, Channel::Temperature);

    fn store(policy: PayloadPolicy) -> SensorStore {
        SensorStore::builder()
            .register(INDOOR_TEMP, SensorRecord::running(0.0, 999.0, -999.0), 1)
            .register(OUTDOOR_TEMP, SensorRecord::windowed_24h(), 1)
            .register(
                ChannelId::new(Zone::Indoor, Channel::Humidity),
                SensorRecord::windowed_24h(),
                0,
            )
            .payload_policy(policy)
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookup_returns_same_instance() {
        let store = store(PayloadPolicy::Reject);
        let a = store.lookup("indoor", "temperature").unwrap();
        let b = store.lookup("indoor", "temperature").unwrap();
        assert!(std::ptr::eq(a, b));
        assert!(std::ptr::eq(a, store.get(INDOOR_TEMP).unwrap()));
    }

    #[test]
    fn test_lookup_unknown_channel() {
        let store = store(PayloadPolicy::Reject);
        let err = store.lookup("attic", "temperature").unwrap_err();
        assert_eq!(
            err,
            StoreError::UnknownChannel {
                zone: "attic".into(),
                channel: "temperature".into()
            }
        );
        // a real pair that simply was not registered
        assert!(matches!(
            store.lookup("reported", "windSpeed"),
            Err(StoreError::UnknownChannel { .. })
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let result = SensorStore::builder()
            .register(INDOOR_TEMP, SensorRecord::windowed_24h(), 1)
            .register(INDOOR_TEMP, SensorRecord::windowed_24h(), 1)
            .build();
        assert!(matches!(result, Err(StoreError::DuplicateChannel { .. })));
    }

    #[test]
    fn test_ingest_end_to_end() {
        let store = store(PayloadPolicy::Reject);
        for payload in ["21.5", "19.0", "23.2"] {
            assert_eq!(store.ingest("enviro/indoor/temperature", payload), Ok(Some(INDOOR_TEMP)));
        }
        let record = store.lookup("indoor", "temperature").unwrap();
        assert_eq!(record.current(), 23.2);
        assert_eq!(record.minimum(), 19.0);
        assert_eq!(record.maximum(), 23.2);
        assert!(store.take_dirty_and_clear());
    }

    #[test]
    fn test_ingest_ignores_unknown_topics() {
        let store = store(PayloadPolicy::Reject);
        assert_eq!(store.ingest("enviro/attic/temperature", "1"), Ok(None));
        assert_eq!(store.ingest("enviro/reported/pressure", "1013"), Ok(None));
        assert_eq!(store.ingest("garbage", "1"), Ok(None));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_ingest_rejects_malformed_payload() {
        let store = store(PayloadPolicy::Reject);
        for payload in ["warm", "", "21.5C", "NaN", "inf"] {
            let err = store.ingest("enviro/outdoor/temperature", payload).unwrap_err();
            assert!(matches!(err, StoreError::MalformedPayload { .. }), "{payload}");
        }
        assert!(store.get(OUTDOOR_TEMP).unwrap().is_empty());
        assert!(!store.is_dirty());

        assert_eq!(store.ingest("enviro/outdoor/temperature", " 12.5\n"), Ok(Some(OUTDOOR_TEMP)));
    }

    #[test]
    fn test_ingest_coerces_malformed_payload() {
        let store = store(PayloadPolicy::Coerce);
        store.ingest("enviro/outdoor/temperature", "21.5C").unwrap();
        store.ingest("enviro/outdoor/temperature", "warm").unwrap();
        let history: Vec<f64> = store.get(OUTDOOR_TEMP).unwrap().history().iter().map(|r| r.value).collect();
        assert_eq!(history, vec![21.5, 0.0]);
    }

    #[test]
    fn test_numeric_prefix() {
        assert_eq!(parse_numeric_prefix("  -3.25e2xyz"), Some(-325.0));
        assert_eq!(parse_numeric_prefix("7e"), Some(7.0));
        assert_eq!(parse_numeric_prefix(".5"), Some(0.5));
        assert_eq!(parse_numeric_prefix("-"), None);
        assert_eq!(parse_numeric_prefix("."), None);
        assert_eq!(parse_numeric_prefix("abc"), None);
    }

    #[test]
    fn test_dirty_flag_cycle() {
        let store = store(PayloadPolicy::Reject);
        assert!(!store.take_dirty_and_clear());
        store.mark_dirty();
        store.mark_dirty();
        assert!(store.take_dirty_and_clear());
        assert!(!store.take_dirty_and_clear());
    }

    #[test]
    fn test_snapshot_in_registration_order() {
        let store = store(PayloadPolicy::Reject);
        store.ingest("enviro/outdoor/temperature", "4.5").unwrap();
        let rows = store.snapshot();
        let ids: Vec<ChannelId> = rows.iter().map(|r| r.id()).collect();
        assert_eq!(ids, store.channel_ids().collect::<Vec<_>>());
        assert_eq!(rows[0].minimum, 999.0);
        assert_eq!((rows[1].current, rows[1].samples, rows[1].decimals), (4.5, 1, 1));
    }

    #[test]
    fn test_snapshot_row_is_consistent() {
        const WRITES: i64 = 20_000;
        let store = Arc::new(store(PayloadPolicy::Reject));
        let writer_done = Arc::new(AtomicBool::new(false));

        let writer = {
            let store = store.clone();
            let writer_done = writer_done.clone();
            std::thread::spawn(move || {
                let record = store.get(OUTDOOR_TEMP).unwrap();
                // value i is the (i + 1)th reading, all inside the window
                for i in 0..WRITES {
                    record.record_at(i, i as f64);
                }
                writer_done.store(true, Ordering::Release);
            })
        };

        while !writer_done.load(Ordering::Acquire) {
            let row = store.snapshot().into_iter().find(|r| r.id() == OUTDOOR_TEMP).unwrap();
            if row.samples > 0 {
                assert_eq!(row.samples, row.current as usize + 1, "{row:?}");
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_coerce_deviates_from_atof_on_special_forms() {
        // atof would accept these; the coercion only takes decimal prefixes
        assert_eq!(PayloadPolicy::Coerce.parse("inf"), Some(0.0));
        assert_eq!(PayloadPolicy::Coerce.parse("nan"), Some(0.0));
        assert_eq!(PayloadPolicy::Coerce.parse("0x1A"), Some(0.0));
    }

    #[test]
    fn test_no_lost_update() {
        const WRITES: usize = 10_000;
        let store = Arc::new(store(PayloadPolicy::Reject));
        let writer_done = Arc::new(AtomicBool::new(false));

        let writer = {
            let store = store.clone();
            let writer_done = writer_done.clone();
            std::thread::spawn(move || {
                for i in 0..WRITES {
                    store.get(INDOOR_TEMP).unwrap().record(i as f64);
                    store.mark_dirty();
                }
                writer_done.store(true, Ordering::Release);
            })
        };

        let mut last_seen = f64::NAN;
        while !writer_done.load(Ordering::Acquire) {
            if store.take_dirty_and_clear() {
                last_seen = store.get(INDOOR_TEMP).unwrap().current();
            }
        }
        writer.join().unwrap();

        // the last write was either rendered or is still flagged
        let still_dirty = store.take_dirty_and_clear();
        assert!(still_dirty || last_seen == (WRITES - 1) as f64);
    }
}

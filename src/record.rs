//! ==============================================================================
//! record.rs - value history of one measurement channel
//! ==============================================================================
//!
//! purpose:
//!     a SensorRecord accepts new readings and answers current/min/max.
//!     the render path never needs to know which retention policy backs it.
//!
//! retention policies:
//!     - RunningExtrema: three scalars over the channel's lifetime, seeded by
//!       the caller. nothing is retained, nothing is evicted.
//!     - Windowed: every reading is kept until it is older than the window
//!       (24h by default). min/max are rescanned over what is retained, so a
//!       maximum from yesterday stops being today's maximum once it ages out.
//!
//! concurrency:
//!     one writer (the ingest loop) and any number of readers (render loop,
//!     web server). each record guards its state with a std mutex, so a
//!     reader sees a record() fully applied or not at all. nothing blocks
//!     or awaits while the lock is held.
//!
//! ==============================================================================

use crate::domain::{unix_now, Reading, Stats};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionKind {
    Running,
    Windowed,
}

#[derive(Debug, Clone)]
enum Retention {
    RunningExtrema {
        current: f64,
        minimum: f64,
        maximum: f64,
    },
    Windowed {
        readings: VecDeque<Reading>,
        window_secs: i64,
    },
}

impl Retention {
    fn record(&mut self, timestamp: i64, value: f64) {
        match self {
            Retention::RunningExtrema {
                current,
                minimum,
                maximum,
            } => {
                *current = value;
                *minimum = minimum.min(value);
                *maximum = maximum.max(value);
            }
            Retention::Windowed {
                readings,
                window_secs,
            } => {
                // keep the sequence sorted even if the clock steps back
                let timestamp = match readings.back() {
                    Some(last) if last.timestamp > timestamp => last.timestamp,
                    _ => timestamp,
                };
                readings.push_back(Reading { timestamp, value });

                let cutoff = timestamp.saturating_sub(*window_secs);
                while let Some(front) = readings.front() {
                    if front.timestamp >= cutoff {
                        break;
                    }
                    readings.pop_front();
                }
            }
        }
    }

    fn current(&self) -> f64 {
        match self {
            Retention::RunningExtrema { current, .. } => *current,
            Retention::Windowed { readings, .. } => readings.back().map(|r| r.value).unwrap_or(0.0),
        }
    }

    fn minimum(&self) -> f64 {
        match self {
            Retention::RunningExtrema { minimum, .. } => *minimum,
            Retention::Windowed { readings, .. } => readings
                .iter()
                .map(|r| r.value)
                .reduce(f64::min)
                .unwrap_or_else(|| self.current()),
        }
    }

    fn maximum(&self) -> f64 {
        match self {
            Retention::RunningExtrema { maximum, .. } => *maximum,
            Retention::Windowed { readings, .. } => readings
                .iter()
                .map(|r| r.value)
                .reduce(f64::max)
                .unwrap_or_else(|| self.current()),
        }
    }

    fn stats(&self) -> Stats {
        Stats {
            current: self.current(),
            minimum: self.minimum(),
            maximum: self.maximum(),
        }
    }
}

/// one physical measurement channel over time
#[derive(Debug)]
pub struct SensorRecord {
    state: Mutex<Retention>,
}

impl SensorRecord {
    /// running extrema seeded with caller defaults, e.g. `(0.0, 999.0, -999.0)`
    pub fn running(current: f64, minimum: f64, maximum: f64) -> Self {
        Self::from_retention(Retention::RunningExtrema {
            current,
            minimum,
            maximum,
        })
    }

    /// full history, readings older than `window` are evicted on each write
    pub fn windowed(window: Duration) -> Self {
        Self::from_retention(Retention::Windowed {
            readings: VecDeque::new(),
            window_secs: window.as_secs().min(i64::MAX as u64) as i64,
        })
    }

    pub fn windowed_24h() -> Self {
        Self::windowed(DEFAULT_WINDOW)
    }

    fn from_retention(retention: Retention) -> Self {
        Self {
            state: Mutex::new(retention),
        }
    }

    // state is consistent between statements, so a panicking holder
    // cannot leave a half-applied record behind
    fn lock(&self) -> MutexGuard<'_, Retention> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// record a reading stamped with the wall clock
    pub fn record(&self, value: f64) {
        self.record_at(unix_now(), value);
    }

    /// record a reading with an explicit unix-seconds timestamp
    pub fn record_at(&self, timestamp: i64, value: f64) {
        self.lock().record(timestamp, value);
    }

    pub fn current(&self) -> f64 {
        self.lock().current()
    }

    pub fn minimum(&self) -> f64 {
        self.lock().minimum()
    }

    pub fn maximum(&self) -> f64 {
        self.lock().maximum()
    }

    /// consistent current/min/max triple
    pub fn stats(&self) -> Stats {
        self.lock().stats()
    }

    /// the triple plus the retained-reading count, read under one lock
    pub fn stats_with_len(&self) -> (Stats, usize) {
        let state = self.lock();
        let len = match &*state {
            Retention::Windowed { readings, .. } => readings.len(),
            Retention::RunningExtrema { .. } => 0,
        };
        (state.stats(), len)
    }

    /// retained readings, oldest first; empty for running extrema
    pub fn history(&self) -> Vec<Reading> {
        match &*self.lock() {
            Retention::Windowed { readings, .. } => readings.iter().copied().collect(),
            Retention::RunningExtrema { .. } => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match &*self.lock() {
            Retention::Windowed { readings, .. } => readings.len(),
            Retention::RunningExtrema { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn policy(&self) -> RetentionKind {
        match &*self.lock() {
            Retention::RunningExtrema { .. } => RetentionKind::Running,
            Retention::Windowed { .. } => RetentionKind::Windowed,
        }
    }
}

//! ==============================================================================
//! render.rs - periodic render loop
//! ==============================================================================
//!
//! purpose:
//!     wakes up at a fixed cadence, checks the store's dirty flag and only
//!     when new data arrived builds a Frame and hands it to a Renderer.
//!
//! relationships:
//!     - used by: main.rs (runs the loop until ctrl-c)
//!     - reads: store.rs (take_dirty_and_clear, snapshot)
//!     - feeds: server.rs (through SharedFrame)
//!
//! ==============================================================================

use crate::domain::{format_value, unix_now, Frame};
use crate::store::SensorStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// a sink for rendered frames (display, log, web dashboard ...)
pub trait Renderer: Send {
    /// draw `frame`; `false` means it was not drawn and must be retried
    fn render(&mut self, frame: &Frame) -> bool;
}

/// writes one log line per channel
#[derive(Default)]
pub struct LogRenderer {
    pub show_sensor_data: bool,
}

impl LogRenderer {
    pub fn new(show_sensor_data: bool) -> Self {
        Self { show_sensor_data }
    }

    /// `indoor/temperature  21.5°C  (min 19.0 / max 23.2)`
    pub fn line(row: &crate::domain::ChannelSnapshot) -> String {
        format!(
            "{:<22} {}{}  (min {} / max {})",
            row.id().to_string(),
            format_value(row.current, row.decimals),
            row.channel.unit(),
            format_value(row.minimum, row.decimals),
            format_value(row.maximum, row.decimals),
        )
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, frame: &Frame) -> bool {
        if !self.show_sensor_data {
            tracing::debug!("[RENDER] frame with {} channels", frame.rows.len());
            return true;
        }
        for row in &frame.rows {
            tracing::info!("[RENDER] {}", Self::line(row));
        }
        true
    }
}

/// latest frame, shared with the web server
#[derive(Clone, Default)]
pub struct SharedFrame(Arc<RwLock<Frame>>);

impl SharedFrame {
    pub async fn latest(&self) -> Frame {
        self.0.read().await.clone()
    }
}

impl Renderer for SharedFrame {
    fn render(&mut self, frame: &Frame) -> bool {
        // the render loop never waits on a slow http reader; a busy frame
        // reports failure so render_once flags the store for the next tick
        match self.0.try_write() {
            Ok(mut guard) => {
                *guard = frame.clone();
                true
            }
            Err(_) => {
                tracing::debug!("[RENDER] shared frame busy, retrying next tick");
                false
            }
        }
    }
}

/// renders the same frame to several renderers
#[derive(Default)]
pub struct FanOut(Vec<Box<dyn Renderer>>);

impl FanOut {
    pub fn with(mut self, renderer: impl Renderer + 'static) -> Self {
        self.0.push(Box::new(renderer));
        self
    }
}

impl Renderer for FanOut {
    fn render(&mut self, frame: &Frame) -> bool {
        let mut drawn = true;
        for renderer in &mut self.0 {
            drawn &= renderer.render(frame);
        }
        drawn
    }
}

/// redraw if the store is dirty; returns whether a frame was rendered.
///
/// a renderer that could not draw puts the dirty flag back, so the data
/// is picked up again on the next tick.
pub fn render_once<R: Renderer + ?Sized>(store: &SensorStore, renderer: &mut R) -> bool {
    if !store.take_dirty_and_clear() {
        return false;
    }
    let frame = Frame {
        rendered_at: unix_now(),
        rows: store.snapshot(),
    };
    if renderer.render(&frame) {
        true
    } else {
        store.mark_dirty();
        false
    }
}

/// tick every `interval` until `shutdown` resolves; returns frames rendered
pub async fn run_render<R, F>(store: Arc<SensorStore>, mut renderer: R, interval: Duration, shutdown: F) -> u64
where
    R: Renderer,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut frames = 0u64;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if render_once(&store, &mut renderer) {
                    frames += 1;
                }
            }
        }
    }
    tracing::info!("[RENDER] stopped after {} frames", frames);
    frames
}

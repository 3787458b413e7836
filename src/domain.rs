use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// physical location group of a sensor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Zone {
    Indoor,
    Outdoor,
    /// values reported by a remote weather service rather than a local sensor
    Reported,
}

/// measurement type within a zone
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Indoor, Zone::Outdoor, Zone::Reported];

    pub fn as_str(self) -> &'static str {
        match self {
            Zone::Indoor => "indoor",
            Zone::Outdoor => "outdoor",
            Zone::Reported => "reported",
        }
    }
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Temperature,
        Channel::Humidity,
        Channel::Pressure,
        Channel::WindSpeed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Pressure => "pressure",
            Channel::WindSpeed => "windSpeed",
        }
    }

    /// unit suffix used by the renderers
    pub fn unit(self) -> &'static str {
        match self {
            Channel::Temperature => "°C",
            Channel::Humidity => "%",
            Channel::Pressure => "hPa",
            Channel::WindSpeed => "km/h",
        }
    }
}

impl FromStr for Zone {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Zone::ALL.into_iter().find(|z| z.as_str() == s).ok_or(())
    }
}

impl FromStr for Channel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL.into_iter().find(|c| c.as_str() == s).ok_or(())
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// uniquely identifies one sensor record inside a store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId {
    pub zone: Zone,
    pub channel: Channel,
}

impl ChannelId {
    pub const fn new(zone: Zone, channel: Channel) -> Self {
        Self { zone, channel }
    }

    /// parse `<prefix>/<zone>/<channel>`; anything else is not ours
    pub fn from_topic(prefix: &str, topic: &str) -> Option<Self> {
        let mut parts = topic.split('/');
        if parts.next()? != prefix {
            return None;
        }
        let zone = parts.next()?.parse().ok()?;
        let channel = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { zone, channel })
    }

    pub fn topic(&self, prefix: &str) -> String {
        format!("{}/{}/{}", prefix, self.zone, self.channel)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone, self.channel)
    }
}

/// one timestamped sample, never mutated after creation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// unix seconds
    pub timestamp: i64,
    pub value: f64,
}

/// current/min/max triple read under a single lock
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub current: f64,
    pub minimum: f64,
    pub maximum: f64,
}

/// what the renderer sees of one channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub zone: Zone,
    pub channel: Channel,
    pub current: f64,
    pub minimum: f64,
    pub maximum: f64,
    /// presentation hint: decimal places to display
    pub decimals: u8,
    /// number of retained readings (0 for running extrema)
    pub samples: usize,
}

impl ChannelSnapshot {
    pub fn id(&self) -> ChannelId {
        ChannelId::new(self.zone, self.channel)
    }
}

/// one rendered picture of the whole store
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// unix seconds, 0 until the first render
    pub rendered_at: i64,
    pub rows: Vec<ChannelSnapshot>,
}

/// an inbound `(topic, payload)` event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// current unix time in seconds
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// format a value with the channel's decimal-places hint
pub fn format_value(value: f64, decimals: u8) -> String {
    format!("{:.*}", decimals as usize, value)
}

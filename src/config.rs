use crate::error::Error;
use dht11_engine::MIN_INTERVAL;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug)]
pub struct App {
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub engine: Engine,
    pub sensors: HashMap<String, Sensor>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq)]
pub struct Logging {
    #[serde(default)]
    pub json: bool,

    #[serde(default = "Logging::default_filter")]
    pub filter: String,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Eq, PartialEq)]
pub struct Engine {
    #[serde(default = "Engine::default_min_interval_ms")]
    min_interval_ms: u64,

    #[serde(default = "Engine::default_poll_interval_ms")]
    poll_interval_ms: u64,

    /// Used to calibrate the cycle budget when the CPU's current frequency
    /// can't be read.
    #[serde(default = "Engine::default_fallback_khz")]
    pub fallback_khz: u32,

    /// `SCHED_FIFO` priority held while sampling.
    #[serde(default = "Engine::default_realtime_priority")]
    pub realtime_priority: i32,
}

#[derive(Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sensor {
    Dht11 { pin: u8 },
}

impl App {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        let config: App = toml::from_str(text)?;
        if config.sensors.is_empty() {
            return Err(Error::NoSensors);
        }
        Ok(config)
    }

    /// Returns the configured sensors, ordered by name.
    pub fn sensors(&self) -> Vec<(&str, Sensor)> {
        let mut sensors: Vec<_> = self
            .sensors
            .iter()
            .map(|(name, sensor)| (name.as_str(), *sensor))
            .collect();
        sensors.sort_by_key(|&(name, _)| name);
        sensors
    }
}

impl Logging {
    pub fn default_filter() -> String {
        String::from("info")
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            json: false,
            filter: Self::default_filter(),
        }
    }
}

impl Engine {
    pub fn default_min_interval_ms() -> u64 {
        MIN_INTERVAL.as_millis() as u64
    }

    pub fn default_poll_interval_ms() -> u64 {
        2000
    }

    pub fn default_fallback_khz() -> u32 {
        1_000_000
    }

    pub fn default_realtime_priority() -> i32 {
        32
    }

    /// The sensor can't be read more than once a second, so shorter intervals
    /// are raised to that.
    pub fn min_interval(self) -> Duration {
        Duration::from_millis(self.min_interval_ms).max(MIN_INTERVAL)
    }

    pub fn poll_interval(self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            min_interval_ms: Self::default_min_interval_ms(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            fallback_khz: Self::default_fallback_khz(),
            realtime_priority: Self::default_realtime_priority(),
        }
    }
}

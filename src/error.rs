use std::convert::Infallible;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config file {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ParseConfig(#[from] toml::de::Error),

    #[error("no sensors configured")]
    NoSensors,

    #[error("failed to open GPIO {pin} for sensor {name:?}: {source}")]
    Gpio {
        name: String,
        pin: u8,
        source: rppal::gpio::Error,
    },

    #[error("sensor {name:?} can't be used: {source}")]
    Engine {
        name: String,
        source: dht11_engine::Error<Infallible>,
    },
}

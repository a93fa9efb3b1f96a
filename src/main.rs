use dht11_engine::{Clock, Dht11, SystemClock};
use std::path::PathBuf;
use std::{env, process, thread};

mod config;
mod error;
mod logging;
mod platform;

use self::error::Error;
use self::platform::{CpuFreq, GpioLine, SchedFifo, SpinDelay};

const DEFAULT_CONFIG: &str = "dht11.toml";

type Dht = Dht11<GpioLine, SpinDelay, SchedFifo, CpuFreq>;

fn main() {
    let path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    let config = match config::App::load(&path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {}", error);
            process::exit(1);
        }
    };
    logging::init(&config.logging);
    tracing::info!(config = %path.display(), "starting");

    let sensors = match open_sensors(&config) {
        Ok(sensors) => sensors,
        Err(error) => {
            tracing::error!(%error, "failed to start");
            process::exit(1);
        }
    };

    poll(&sensors, config.engine.poll_interval());
}

fn open_sensors(config: &config::App) -> Result<Vec<(String, Dht)>, Error> {
    let mut mask = SchedFifo::new(config.engine.realtime_priority);
    if let Err(error) = mask.probe() {
        tracing::warn!(
            %error,
            "can't switch to SCHED_FIFO; readings will be less reliable"
        );
    }

    config
        .sensors()
        .into_iter()
        .map(|(name, config::Sensor::Dht11 { pin })| {
            let line = GpioLine::open(pin).map_err(|source| Error::Gpio {
                name: name.to_owned(),
                pin,
                source,
            })?;
            let sensor = Dht11::with_clock(
                line,
                SpinDelay,
                mask.clone(),
                CpuFreq::new(config.engine.fallback_khz),
                SystemClock,
                config.engine.min_interval(),
            )
            .map_err(|source| Error::Engine {
                name: name.to_owned(),
                source,
            })?;
            tracing::info!(sensor = name, pin, "opened DHT11");
            Ok((name.to_owned(), sensor))
        })
        .collect()
}

fn poll(sensors: &[(String, Dht)], interval: std::time::Duration) -> ! {
    loop {
        let started = SystemClock.now();
        for (name, sensor) in sensors {
            let reading = sensor.read();
            if reading.is_valid() {
                tracing::info!(
                    sensor = %name,
                    humidity = reading.humidity_percent(),
                    temperature = reading.temp_celsius(),
                    "reading"
                );
            } else {
                tracing::warn!(sensor = %name, "no valid reading");
            }
        }
        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }
}

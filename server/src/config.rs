use std::net::SocketAddr;
use std::time::Duration;

use once_cell::sync::Lazy;
use schema::{Speed, TerminalNumber};

use crate::{ConfigError, Intervals};

// TODO: terminals could come from the flight store instead of the environment
pub static DEFAULT_TERMINALS: Lazy<Vec<TerminalNumber>> = Lazy::new(|| {
    ["A1", "A2", "B3"]
        .into_iter()
        .map(TerminalNumber::from_str)
        .collect()
});

/// Server settings, read from the environment (and `.env` via `dotenv`)
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub socket: SocketAddr,
    pub terminals: Vec<TerminalNumber>,
    pub intervals: Intervals,
    pub speed: Speed,
    /// Optional CSV of flights to book at startup
    pub flights_csv: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key/value source, `None` meaning "unset"
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let socket = parse_var(&lookup, "SERVER_SOCKET")?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 50051)));

        let terminals = match lookup("TERMINALS") {
            Some(names) => names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(TerminalNumber::from_str)
                .collect(),
            None => DEFAULT_TERMINALS.clone(),
        };
        if terminals.is_empty() {
            return Err(ConfigError::NoTerminals);
        }

        let defaults = Intervals::default();
        let service_ms = parse_var(&lookup, "SERVICE_INTERVAL_MS")?
            .unwrap_or(defaults.service.as_millis() as u64);
        let poll_ms =
            parse_var(&lookup, "POLL_INTERVAL_MS")?.unwrap_or(defaults.poll.as_millis() as u64);
        if poll_ms >= service_ms {
            return Err(ConfigError::PollNotShorterThanService {
                poll_ms,
                service_ms,
            });
        }

        let speed = match parse_var::<i32>(&lookup, "SIM_SPEED")? {
            Some(factor) => Speed::from_factor(factor).ok_or(ConfigError::InvalidValue {
                name: "SIM_SPEED",
                value: factor.to_string(),
            })?,
            None => Speed::RealTime,
        };

        Ok(Self {
            socket,
            terminals,
            intervals: Intervals {
                service: Duration::from_millis(service_ms),
                poll: Duration::from_millis(poll_ms),
            },
            speed,
            flights_csv: lookup("FLIGHTS_CSV").filter(|path| !path.is_empty()),
        })
    }

    /// Intervals as experienced by the terminal workers
    pub fn scaled_intervals(&self) -> Intervals {
        self.intervals.with_speed(self.speed)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name, value })
        })
        .transpose()
}

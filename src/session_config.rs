use serde_derive::Deserialize;
use std::time::Duration;

#[derive(Debug)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub dial_timeout: Duration,
    pub response_timeout: Duration,
}

impl SessionConfig {
    pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);
}

/// Session settings as they come from the command line or a config file, before validation.
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DirtySessionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default, with = "humantime_serde")]
    pub dial_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub response_timeout: Option<Duration>,
}

impl DirtySessionConfig {
    /// Fills fields missing in `self` with values from `fallback`.
    pub fn or(self, fallback: DirtySessionConfig) -> Self {
        Self {
            host: self.host.or(fallback.host),
            port: self.port.or(fallback.port),
            dial_timeout: self.dial_timeout.or(fallback.dial_timeout),
            response_timeout: self.response_timeout.or(fallback.response_timeout),
        }
    }
}

fn non_zero(name: &str, value: Option<Duration>, default: Duration) -> anyhow::Result<Duration> {
    match value {
        Some(duration) if duration.is_zero() => {
            anyhow::bail!("'{}' must be greater than zero", name)
        }
        Some(duration) => Ok(duration),
        None => Ok(default),
    }
}

impl TryFrom<DirtySessionConfig> for SessionConfig {
    type Error = anyhow::Error;

    fn try_from(dirty: DirtySessionConfig) -> Result<Self, Self::Error> {
        let host = dirty
            .host
            .filter(|host| !host.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("'host' is missing"))?;
        let port = match dirty.port {
            Some(0) => anyhow::bail!("'port' must be in range 1-65535"),
            Some(port) => port,
            None => anyhow::bail!("'port' is missing"),
        };

        Ok(Self {
            host,
            port,
            dial_timeout: non_zero(
                "dial_timeout",
                dirty.dial_timeout,
                Self::DEFAULT_DIAL_TIMEOUT,
            )?,
            response_timeout: non_zero(
                "response_timeout",
                dirty.response_timeout,
                Self::DEFAULT_RESPONSE_TIMEOUT,
            )?,
        })
    }
}

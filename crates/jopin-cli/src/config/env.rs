use crate::config::ENV_WEBSOCKET_PORT;
use crate::error::{ConfigError, Result};
use crate::ui;

/// Value of the `WATCH` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOverride {
    /// `0`, `false`, `no`
    Disabled,
    /// `1`, `true`, `yes`
    Enabled,
    /// `hot`
    Hot,
}

impl WatchOverride {
    /// Parse a `WATCH` value; unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "0" | "false" | "no" => Some(Self::Disabled),
            "1" | "true" | "yes" => Some(Self::Enabled),
            "hot" => Some(Self::Hot),
            _ => None,
        }
    }
}

/// Environment variables that influence the launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// `WATCH`
    pub watch: Option<WatchOverride>,
    /// `NODE_ENV=production`
    pub production: bool,
    /// `JOPIN_WEBSOCKET_PORT`
    pub forced_port: Option<u16>,
}

impl EnvOverrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`.
    ///
    /// An unrecognised `WATCH` value is ignored with a warning. An unparsable
    /// forced port is an error: an explicit port must never be silently
    /// replaced by another one.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let watch = match lookup("WATCH") {
            Some(raw) if raw.is_empty() => None,
            Some(raw) => {
                let parsed = WatchOverride::parse(&raw);
                if parsed.is_none() {
                    ui::warning(&format!(
                        "Ignoring WATCH={} (expected 0, 1, true, false, yes, no or hot)",
                        raw
                    ));
                }
                parsed
            }
            None => None,
        };

        let production = lookup("NODE_ENV").is_some_and(|v| v == "production");

        let forced_port = match lookup(ENV_WEBSOCKET_PORT) {
            Some(raw) if !raw.trim().is_empty() => {
                let port = raw.trim().parse::<u16>().ok().filter(|p| *p != 0).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        field: ENV_WEBSOCKET_PORT.to_string(),
                        value: raw.clone(),
                        hint: "Use a port number between 1 and 65535".to_string(),
                    }
                })?;
                Some(port)
            }
            _ => None,
        };

        Ok(Self {
            watch,
            production,
            forced_port,
        })
    }
}

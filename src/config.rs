use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Engine promoted to the front of the discovered list, and the only entry
/// of the list before discovery completes.
pub const DEFAULT_PREFERRED_ENGINE: &str = "google";

#[derive(Debug, Clone)]
pub struct Config {
    // Cache
    pub redis_url: String,

    // Translation command (translate-shell compatible)
    pub command: String,
    pub preferred_engine: String,
    pub engine_timeout: Option<Duration>,

    // HTTP
    pub listen: String,

    // Telegram notifications
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: i64,
    pub telegram_api_url: String,
    pub notification_interval: Duration,

    // Cache hygiene
    pub cleanup_schedule: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://redis/1".to_string()),

            command: std::env::var("COMMAND").unwrap_or_else(|_| "/usr/bin/trans".to_string()),
            preferred_engine: std::env::var("PREFERRED_ENGINE")
                .ok()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_PREFERRED_ENGINE.to_string()),
            engine_timeout: optional_env("ENGINE_TIMEOUT")
                .map(|v| parse_duration(&v).context("ENGINE_TIMEOUT is not a valid duration"))
                .transpose()?,

            listen: std::env::var("LISTEN").unwrap_or_else(|_| ":8888".to_string()),

            telegram_bot_token: optional_env("TG_TOKEN"),
            telegram_chat_id: match optional_env("TG_CHAT_ID") {
                Some(v) => v
                    .parse()
                    .context(format!("TG_CHAT_ID must be a numeric chat ID, got '{}'", v))?,
                None => 0,
            },
            telegram_api_url: std::env::var("TG_API_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            notification_interval: match optional_env("NOTIFICATION_INTERVAL") {
                Some(v) => {
                    let interval = parse_duration(&v)
                        .context("NOTIFICATION_INTERVAL is not a valid duration")?;
                    if interval.is_zero() {
                        bail!("NOTIFICATION_INTERVAL must be greater than zero");
                    }
                    interval
                }
                None => Duration::from_secs(60),
            },

            cleanup_schedule: optional_env("CLEANUP_SCHEDULE"),
        })
    }

    /// Address suitable for `TcpListener::bind`
    pub fn listen_addr(&self) -> String {
        parse_listen_addr(&self.listen)
    }
}

/// Read an env var, treating empty values as unset
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse durations like `1m`, `30s`, `1m30s`, `500ms` or `2h`.
///
/// A bare `0` is accepted. Every other component needs a unit.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        bail!("empty duration");
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            bail!("expected a number in duration '{}'", input);
        }
        let value: u64 = rest[..digits]
            .parse()
            .context(format!("number out of range in duration '{}'", input))?;
        rest = &rest[digits..];

        let unit_len = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        total += match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            "" => bail!("missing unit in duration '{}'", input),
            other => bail!("unknown unit '{}' in duration '{}'", other, input),
        };
    }

    Ok(total)
}

/// `:8888` listens on every interface, anything else is passed through
pub fn parse_listen_addr(listen: &str) -> String {
    let listen = listen.trim();
    if listen.starts_with(':') {
        format!("0.0.0.0{}", listen)
    } else {
        listen.to_string()
    }
}

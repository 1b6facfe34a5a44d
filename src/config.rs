//! # Configuration Management
//!
//! Loads the flat `vitaminder.toml` file once at startup and validates it into
//! a strongly-typed [`Config`]. Any missing or malformed key is a fatal error:
//! the daemon refuses to start rather than guess at a schedule.
//!
//! ```toml
//! comm_port = "/dev/ttyUSB0"
//! comm_read_timeout = 1
//! color_hard_reminder = "255,0,0"
//! brightness_hard_reminder = 96
//! boundary_unmedicated_begin = "02:00"
//! boundary_unmedicated_end = "18:00"
//! boundary_soft_reminder_begin = "18:00"
//! boundary_soft_reminder_end = "19:00"
//! snooze_duration_seconds = 600
//! time_update_thread_sleep_sec = 60
//! heartbeat_thread_sleep_sec = 30
//! ctl_thread_sleep_sec = 1
//! ```
//!
//! The LED color and brightness pairs are the only optional part of the
//! schedule: a state without them is shown with [`FALLBACK_STYLE`].

use crate::protocol::Rgb;
use crate::schedule::{Schedule, TimeWindow};
use crate::MedicationState;
use chrono::NaiveTime;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn, Level};

/// File read when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "vitaminder.toml";

/// Style used for any state that has no configured color/brightness.
pub const FALLBACK_STYLE: LedStyle = LedStyle {
    color: Rgb::new(128, 0, 255),
    brightness: 128,
};

/// Longest accepted snooze, one day.
const MAX_SNOOZE_SECS: u64 = 24 * 60 * 60;

/// Longest blink phase the wire format can carry (255 × 10 ms).
const MAX_BLINK_MS: u16 = 2550;

/// Errors raised while loading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File missing or unreadable
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Not valid TOML, wrong value type, or a required key is absent
    #[error("invalid config format: {0}")]
    Parse(#[from] toml::de::Error),

    /// Well-formed but semantically wrong value
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Validated application configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub link: LinkConfig,
    pub schedule: Schedule,
    pub snooze: chrono::Duration,
    pub styles: LedStyles,
    pub blink: Blink,
    pub intervals: PollIntervals,
    pub log_level: Level,
}

/// Serial port settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Upper bound for a single blocking read. Always finite so the reader
    /// can notice shutdown.
    pub read_timeout: Duration,
}

/// Color and brightness for one medication state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedStyle {
    pub color: Rgb,
    pub brightness: u8,
}

/// Per-state LED lookup table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedStyles {
    pub unmedicated: LedStyle,
    pub soft_reminder: LedStyle,
    pub hard_reminder: LedStyle,
    pub snooze: LedStyle,
    pub nailed_it: LedStyle,
}

impl LedStyles {
    pub fn style_for(&self, state: MedicationState) -> LedStyle {
        match state {
            MedicationState::Unmedicated => self.unmedicated,
            MedicationState::SoftReminder => self.soft_reminder,
            MedicationState::HardReminder => self.hard_reminder,
            MedicationState::Snooze => self.snooze,
            MedicationState::NailedIt => self.nailed_it,
        }
    }
}

/// Blink timing applied to every set LED frame. `off_ms == 0` is constant on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Blink {
    pub off_ms: u16,
    pub on_ms: u16,
}

/// Producer and consumer wake intervals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollIntervals {
    pub time_update: Duration,
    pub heartbeat: Duration,
    /// Longest the control loop waits for an event before re-checking liveness
    pub control: Duration,
    /// When set, enqueue EXIT after this long
    pub shutdown_after: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default();
        Config {
            link: LinkConfig {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: 9600,
                read_timeout: Duration::from_secs(1),
            },
            schedule: Schedule {
                unmedicated: TimeWindow::new(at(2, 0), at(18, 0)),
                soft_reminder: TimeWindow::new(at(18, 0), at(19, 0)),
            },
            snooze: chrono::Duration::seconds(600),
            styles: LedStyles {
                unmedicated: LedStyle {
                    color: Rgb::new(0, 0, 255),
                    brightness: 16,
                },
                soft_reminder: LedStyle {
                    color: Rgb::new(255, 255, 0),
                    brightness: 64,
                },
                hard_reminder: LedStyle {
                    color: Rgb::new(255, 0, 0),
                    brightness: 128,
                },
                snooze: LedStyle {
                    color: Rgb::new(255, 128, 0),
                    brightness: 32,
                },
                nailed_it: LedStyle {
                    color: Rgb::new(0, 255, 0),
                    brightness: 16,
                },
            },
            blink: Blink {
                off_ms: 250,
                on_ms: 750,
            },
            intervals: PollIntervals {
                time_update: Duration::from_secs(60),
                heartbeat: Duration::from_secs(30),
                control: Duration::from_secs(1),
                shutdown_after: None,
            },
            log_level: Level::INFO,
        }
    }
}

/// On-disk shape of the config file, before validation.
#[derive(Debug, Deserialize)]
struct RawConfig {
    comm_port: String,
    comm_read_timeout: u64,
    #[serde(default = "default_baud_rate")]
    baud_rate: u32,

    color_unmedicated: Option<String>,
    color_soft_reminder: Option<String>,
    color_hard_reminder: Option<String>,
    color_snooze: Option<String>,
    color_nailed_it: Option<String>,
    brightness_unmedicated: Option<u8>,
    brightness_soft_reminder: Option<u8>,
    brightness_hard_reminder: Option<u8>,
    brightness_snooze: Option<u8>,
    brightness_nailed_it: Option<u8>,

    #[serde(default = "default_blink_off_ms")]
    blink_off_ms: u16,
    #[serde(default = "default_blink_on_ms")]
    blink_on_ms: u16,

    boundary_unmedicated_begin: String,
    boundary_unmedicated_end: String,
    boundary_soft_reminder_begin: String,
    boundary_soft_reminder_end: String,

    snooze_duration_seconds: u64,

    time_update_thread_sleep_sec: u64,
    heartbeat_thread_sleep_sec: u64,
    ctl_thread_sleep_sec: u64,
    dummy_thread_sleep_sec: Option<u64>,

    log_level: Option<String>,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_blink_off_ms() -> u16 {
    250
}

fn default_blink_on_ms() -> u16 {
    750
}

impl Config {
    /// Load configuration from specified path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        info!(
            path = %path.display(),
            port = %config.link.port,
            "loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate config file contents.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents)?;
        raw.validate()
    }
}

impl RawConfig {
    fn validate(self) -> Result<Config, ConfigError> {
        if self.comm_port.trim().is_empty() {
            return Err(invalid("comm_port", "must not be empty"));
        }

        let link = LinkConfig {
            port: self.comm_port,
            baud_rate: self.baud_rate,
            read_timeout: positive_secs("comm_read_timeout", self.comm_read_timeout)?,
        };

        let schedule = Schedule {
            unmedicated: TimeWindow::new(
                parse_time("boundary_unmedicated_begin", &self.boundary_unmedicated_begin)?,
                parse_time("boundary_unmedicated_end", &self.boundary_unmedicated_end)?,
            ),
            soft_reminder: TimeWindow::new(
                parse_time("boundary_soft_reminder_begin", &self.boundary_soft_reminder_begin)?,
                parse_time("boundary_soft_reminder_end", &self.boundary_soft_reminder_end)?,
            ),
        };

        if self.snooze_duration_seconds == 0 || self.snooze_duration_seconds > MAX_SNOOZE_SECS {
            return Err(invalid(
                "snooze_duration_seconds",
                format!("must be between 1 and {MAX_SNOOZE_SECS}"),
            ));
        }
        // Bounded above, so the cast cannot wrap
        let snooze = chrono::Duration::seconds(self.snooze_duration_seconds as i64);

        let styles = LedStyles {
            unmedicated: style(
                "color_unmedicated",
                self.color_unmedicated,
                self.brightness_unmedicated,
            )?,
            soft_reminder: style(
                "color_soft_reminder",
                self.color_soft_reminder,
                self.brightness_soft_reminder,
            )?,
            hard_reminder: style(
                "color_hard_reminder",
                self.color_hard_reminder,
                self.brightness_hard_reminder,
            )?,
            snooze: style("color_snooze", self.color_snooze, self.brightness_snooze)?,
            nailed_it: style(
                "color_nailed_it",
                self.color_nailed_it,
                self.brightness_nailed_it,
            )?,
        };

        let blink = Blink {
            off_ms: blink_ms("blink_off_ms", self.blink_off_ms)?,
            on_ms: blink_ms("blink_on_ms", self.blink_on_ms)?,
        };

        let intervals = PollIntervals {
            time_update: positive_secs(
                "time_update_thread_sleep_sec",
                self.time_update_thread_sleep_sec,
            )?,
            heartbeat: positive_secs("heartbeat_thread_sleep_sec", self.heartbeat_thread_sleep_sec)?,
            control: positive_secs("ctl_thread_sleep_sec", self.ctl_thread_sleep_sec)?,
            shutdown_after: self
                .dummy_thread_sleep_sec
                .map(|secs| positive_secs("dummy_thread_sleep_sec", secs))
                .transpose()?,
        };

        let log_level = match self.log_level {
            Some(level) => level
                .trim()
                .parse::<Level>()
                .map_err(|e| invalid("log_level", e.to_string()))?,
            None => Level::INFO,
        };

        Ok(Config {
            link,
            schedule,
            snooze,
            styles,
            blink,
            intervals,
            log_level,
        })
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

fn positive_secs(key: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(invalid(key, "must be at least 1 second"));
    }
    Ok(Duration::from_secs(secs))
}

fn blink_ms(key: &'static str, ms: u16) -> Result<u16, ConfigError> {
    if ms > MAX_BLINK_MS || ms % 10 != 0 {
        return Err(invalid(
            key,
            format!("must be a multiple of 10 no larger than {MAX_BLINK_MS}"),
        ));
    }
    Ok(ms)
}

/// Accepts `HH:MM` and `HH:MM:SS`.
fn parse_time(key: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| invalid(key, format!("`{value}` is not HH:MM[:SS]")))
}

/// Parses an `r,g,b` triple.
fn parse_rgb(key: &'static str, value: &str) -> Result<Rgb, ConfigError> {
    let parts = value
        .split(',')
        .map(|c| c.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid(key, format!("`{value}`: {e}")))?;
    match parts.as_slice() {
        [r, g, b] => Ok(Rgb::new(*r, *g, *b)),
        _ => Err(invalid(key, format!("`{value}` needs exactly three components"))),
    }
}

fn style(
    color_key: &'static str,
    color: Option<String>,
    brightness: Option<u8>,
) -> Result<LedStyle, ConfigError> {
    if color.is_none() || brightness.is_none() {
        warn!(key = color_key, "LED style incomplete, using fallback");
    }
    let color = match color {
        Some(value) => parse_rgb(color_key, &value)?,
        None => FALLBACK_STYLE.color,
    };
    Ok(LedStyle {
        color,
        brightness: brightness.unwrap_or(FALLBACK_STYLE.brightness),
    })
}

//! Cursor-based journal reading through `journalctl -o json`
//!
//! Batches come back in chronological order: the first element is the oldest, the last
//! element is the newest, and the last element's cursor is the one to resume from.
//! With a cursor, journalctl seeks past it and reads forward, so each call returns the
//! next [`PAGE_SIZE`] entries and a backlog drains over successive calls. Without a cursor
//! only the newest page is returned; anything older is skipped unnoticed at this layer.

use std::{fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    command::{validate_unit_name, CommandRunner},
    errors::AppError,
};

pub const DEFAULT_JOURNALCTL_BIN: &str = "journalctl";
pub const PAGE_SIZE: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Priority {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Informational = 6,
    Debug = 7,
}

impl Priority {
    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Emergency => "emerg",
            Self::Alert => "alert",
            Self::Critical => "crit",
            Self::Error => "err",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Informational => "info",
            Self::Debug => "debug",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let priority = match normalized.as_str() {
            "0" | "emerg" | "panic" => Self::Emergency,
            "1" | "alert" => Self::Alert,
            "2" | "crit" | "critical" => Self::Critical,
            "3" | "err" | "error" => Self::Error,
            "4" | "warning" | "warn" => Self::Warning,
            "5" | "notice" => Self::Notice,
            "6" | "info" | "informational" => Self::Informational,
            "7" | "debug" => Self::Debug,
            _ => return Err(format!("priority must be one of 0-7, got {value:?}")),
        };
        Ok(priority)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// `MESSAGE` is a string for text payloads and an array of bytes otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JournalMessage {
    Text(String),
    Bytes(Vec<u8>),
    Other(Value),
}

impl From<JournalMessage> for String {
    fn from(message: JournalMessage) -> Self {
        match message {
            JournalMessage::Text(text) => text,
            JournalMessage::Bytes(_) | JournalMessage::Other(_) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub cursor: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub unit: String,
    pub priority: Option<Priority>,
    pub unit_result: Option<String>,
}

impl LogEntry {
    /// The empty entry stands for "no data available".
    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }
}

impl Default for LogEntry {
    fn default() -> Self {
        Self {
            cursor: String::new(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            message: String::new(),
            unit: String::new(),
            priority: None,
            unit_result: None,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let priority = self
            .priority
            .map(|priority| priority.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{} {} {} {}",
            self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            priority,
            self.unit,
            self.message
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "__CURSOR")]
    cursor: String,
    #[serde(rename = "__REALTIME_TIMESTAMP", deserialize_with = "realtime_micros")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "MESSAGE")]
    message: Option<JournalMessage>,
    #[serde(rename = "_SYSTEMD_UNIT", default)]
    unit: Option<String>,
    #[serde(rename = "PRIORITY", default)]
    priority: Option<Priority>,
    #[serde(rename = "UNIT_RESULT", default)]
    unit_result: Option<String>,
}

impl From<RawEntry> for LogEntry {
    fn from(raw: RawEntry) -> Self {
        Self {
            cursor: raw.cursor,
            timestamp: raw.timestamp,
            message: raw.message.map(String::from).unwrap_or_default(),
            unit: raw.unit.unwrap_or_default(),
            priority: raw.priority,
            unit_result: raw.unit_result.filter(|result| !result.is_empty()),
        }
    }
}

fn realtime_micros<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let micros = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| de::Error::custom(format!("invalid __REALTIME_TIMESTAMP {raw:?}")))?;
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| de::Error::custom(format!("__REALTIME_TIMESTAMP out of range: {micros}")))
}

pub fn parse_entry(line: &str) -> Result<LogEntry, serde_json::Error> {
    serde_json::from_str::<RawEntry>(line).map(LogEntry::from)
}

/// Parses newline-delimited JSON. On the first malformed line the entries decoded so far
/// travel inside the returned [`AppError::MalformedEntry`].
pub fn parse_entries(stdout: &[u8]) -> Result<Vec<LogEntry>, AppError> {
    let mut entries = Vec::new();

    for (index, line) in stdout.split(|byte| *byte == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match serde_json::from_slice::<RawEntry>(line) {
            Ok(raw) => entries.push(LogEntry::from(raw)),
            Err(source) => {
                return Err(AppError::MalformedEntry {
                    line: index + 1,
                    entries,
                    source,
                })
            }
        }
    }

    Ok(entries)
}

#[async_trait]
pub trait LogReader: Send + Sync {
    /// Most recent entry of the unit, or the empty entry when the unit never logged.
    async fn last_entry(&self, unit: &str) -> Result<LogEntry, AppError>;

    /// Up to [`PAGE_SIZE`] entries recorded after `cursor`, oldest first. An empty cursor
    /// yields the most recent page.
    async fn entries_after(&self, unit: &str, cursor: &str) -> Result<Vec<LogEntry>, AppError>;
}

pub struct Journalctl {
    binary: String,
    runner: Arc<dyn CommandRunner>,
}

impl Journalctl {
    pub fn new(binary: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn base_args(unit: &str, lines: usize) -> Vec<String> {
        vec![
            "-u".to_string(),
            unit.to_string(),
            "-o".to_string(),
            "json".to_string(),
            "--no-pager".to_string(),
            "-n".to_string(),
            lines.to_string(),
        ]
    }
}

#[async_trait]
impl LogReader for Journalctl {
    async fn last_entry(&self, unit: &str) -> Result<LogEntry, AppError> {
        validate_unit_name(unit)?;

        let stdout = self.runner.run(&self.binary, &Self::base_args(unit, 1)).await?;
        let entry = parse_entries(&stdout)?.pop().unwrap_or_default();
        Ok(entry)
    }

    async fn entries_after(&self, unit: &str, cursor: &str) -> Result<Vec<LogEntry>, AppError> {
        validate_unit_name(unit)?;

        let mut args = Self::base_args(unit, PAGE_SIZE);
        if !cursor.is_empty() {
            args.push("--after-cursor".to_string());
            args.push(cursor.to_string());
        }

        let stdout = self.runner.run(&self.binary, &args).await?;
        parse_entries(&stdout)
    }
}

use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};

/// a single water/temperature/humidity sample
///
/// field names are camelCase on the wire because the dashboard
/// reads them straight out of the json.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// iso-8601 wall-clock time of the sample
    pub timestamp: String,
    /// water level (float)
    pub water_level: f64,
    /// temperature, whole degrees
    pub temperature: i64,
    /// relative humidity, whole percent
    pub humidity: i64,
}

/// fallback values served when the remote store has nothing for us
///
/// built once at startup from `[mock]` in farm.toml and shared read-only.
#[derive(Clone, Debug, PartialEq)]
pub struct MockState {
    pub water_level: f64,
    pub temperature: i64,
    pub humidity: i64,
}

impl MockState {
    /// stamp the mock values with the given time
    pub fn reading_at(&self, at: DateTime<Local>) -> SensorReading {
        SensorReading {
            timestamp: iso_timestamp(at),
            water_level: self.water_level,
            temperature: self.temperature,
            humidity: self.humidity,
        }
    }
}

impl Default for MockState {
    fn default() -> Self {
        Self { water_level: 6.0, temperature: 84, humidity: 62 }
    }
}

/// control settings wrapped with the time they were received
#[derive(Clone, Serialize, Debug)]
pub struct ControlRecord {
    pub timestamp: String,
    /// opaque caller payload, never validated
    pub settings: serde_json::Value,
}

/// `{status, message}` body used for acks and errors
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self { status: "success".to_string(), message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: "error".to_string(), message: message.into() }
    }
}

pub fn iso_timestamp(at: DateTime<Local>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

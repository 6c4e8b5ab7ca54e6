//! ==============================================================================
//! readings.rs - current sensor reading with mock fallback
//! ==============================================================================
//!
//! flow:
//!     1. ask the store for the latest record in `sensors`
//!     2. got an object -> hand it back untouched
//!     3. error, empty, or not an object -> stamp the mock values with "now"
//!     4. fallback only: try to push that mock reading to `sensors`
//!
//! store failures never reach the caller; they are logged and the
//! dashboard keeps getting a reading.
//!
//! ==============================================================================

use chrono::Local;
use serde_json::{json, Value};

use crate::domain::{MockState, SensorReading};
use crate::store::{RemoteStore, StoreError, SENSORS};

/// where the returned reading came from
#[derive(Debug)]
pub enum Reading {
    /// latest store record, passed through as-is
    Remote(Value),
    /// built from mock state
    Fallback(SensorReading),
}

impl Reading {
    pub fn into_json(self) -> Value {
        match self {
            Reading::Remote(record) => record,
            Reading::Fallback(reading) => to_record(&reading),
        }
    }
}

fn to_record(reading: &SensorReading) -> Value {
    json!({
        "timestamp": reading.timestamp,
        "waterLevel": reading.water_level,
        "temperature": reading.temperature,
        "humidity": reading.humidity,
    })
}

pub async fn current_reading(store: &dyn RemoteStore, mock: &MockState) -> Reading {
    match store.fetch_latest(SENSORS, 1).await {
        Ok(mut records) => match records.pop() {
            Some(latest) if latest.is_object() => return Reading::Remote(latest),
            Some(other) => {
                tracing::warn!("[SENSORS] Latest store record is not a reading: {}", other);
            }
            None => {
                tracing::debug!("[SENSORS] Store has no readings, using mock data");
            }
        },
        // intentionally swallowed: fall back to mock below
        Err(StoreError::Connectivity(e)) => {
            tracing::warn!("[SENSORS] Failed to read from store: {}", e);
        }
        Err(StoreError::Parse(e)) => {
            tracing::warn!("[SENSORS] Unreadable store response: {}", e);
        }
    }

    let reading = mock.reading_at(Local::now());
    if let Err(e) = store.append(SENSORS, &to_record(&reading)).await {
        tracing::warn!("[SENSORS] Failed to save mock reading: {}", e);
    }
    Reading::Fallback(reading)
}

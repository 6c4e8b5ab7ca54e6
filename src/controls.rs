//! control setting updates
//!
//! any json is accepted, logged, and pushed to `controls` wrapped with a
//! timestamp. the caller always gets the success ack, whether or not the
//! push landed.

use chrono::Local;
use serde_json::Value;

use crate::domain::{iso_timestamp, ControlRecord, StatusResponse};
use crate::store::{RemoteStore, CONTROLS};

pub async fn update_controls(store: &dyn RemoteStore, settings: Value, log_payload: bool) -> StatusResponse {
    if log_payload {
        tracing::info!("[CONTROL] Control update: {}", settings);
    } else {
        tracing::info!("[CONTROL] Control update received");
    }

    let record = ControlRecord { timestamp: iso_timestamp(Local::now()), settings };
    match serde_json::to_value(&record) {
        Ok(record) => {
            if let Err(e) = store.append(CONTROLS, &record).await {
                tracing::warn!("[CONTROL] Failed to save to store: {}", e);
            }
        }
        Err(e) => tracing::warn!("[CONTROL] Could not encode control record: {}", e),
    }

    StatusResponse::success("Settings updated")
}

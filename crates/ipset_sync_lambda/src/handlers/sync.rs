use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapters::ip_set::IpSetService;
use crate::adapters::object_store::ObjectSource;
use crate::runtime::addresses::{extract_addresses, AddressCollection};
use crate::runtime::config::SyncConfig;
use crate::runtime::contract::{
    address_fingerprint, object_location, ObjectLocation, S3NotificationEvent,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Updated,
    UpdateFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncResponse {
    pub status: SyncStatus,
    pub bucket: String,
    pub key: String,
    pub ip_set_id: String,
    pub addresses_submitted: usize,
    pub rows_skipped: usize,
    pub previous_address_count: usize,
    pub address_fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_lock_token: Option<String>,
}

/// Step of an invocation that failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Event,
    Fetch,
    Decode,
    Parse,
    LockToken,
    Update,
}

impl SyncStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Fetch => "fetch",
            Self::Decode => "decode",
            Self::Parse => "parse",
            Self::LockToken => "lock_token",
            Self::Update => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncHandlerError {
    pub stage: SyncStage,
    pub message: String,
}

impl SyncHandlerError {
    fn new(stage: SyncStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SyncHandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.stage.as_str(), self.message)
    }
}

impl std::error::Error for SyncHandlerError {}

/// Replaces the configured IP set with the networks listed in an uploaded CSV.
///
/// Built once per process; every invocation re-reads the object and the lock
/// token, so nothing carries over between calls except the service handles.
pub struct IpSetSynchronizer<O, S> {
    config: SyncConfig,
    object_source: O,
    ip_set_service: S,
}

impl<O, S> IpSetSynchronizer<O, S>
where
    O: ObjectSource,
    S: IpSetService,
{
    pub fn new(config: SyncConfig, object_source: O, ip_set_service: S) -> Self {
        Self {
            config,
            object_source,
            ip_set_service,
        }
    }

    pub fn handle_notification_event(
        &self,
        event: Value,
    ) -> Result<SyncResponse, SyncHandlerError> {
        let started_at = Instant::now();
        log_sync_info("event_received", json!({ "event": event.clone() }));

        let result = self.synchronize(event);
        if let Err(error) = &result {
            log_sync_error(
                "sync_failed",
                json!({
                    "ip_set_id": self.config.ip_set.id.clone(),
                    "stage": error.stage.as_str(),
                    "error": error.message.clone(),
                    "duration_ms": started_at.elapsed().as_millis(),
                }),
            );
        }
        result
    }

    fn synchronize(&self, event: Value) -> Result<SyncResponse, SyncHandlerError> {
        let location = resolve_location(event)?;
        let collection = self.read_addresses(&location)?;

        let ip_set = &self.config.ip_set;
        let snapshot = self
            .ip_set_service
            .get_ip_set(ip_set)
            .map_err(|error| SyncHandlerError::new(SyncStage::LockToken, error))?;

        let lock_token = match snapshot.lock_token {
            Some(token) => {
                log_sync_info(
                    "lock_token_fetched",
                    json!({
                        "ip_set_id": ip_set.id.clone(),
                        "lock_token": token.clone(),
                        "current_address_count": snapshot.addresses.len(),
                    }),
                );
                token
            }
            None if self.config.policy.requires_lock_token() => {
                return Err(SyncHandlerError::new(
                    SyncStage::LockToken,
                    format!("IP set {} returned no lock token", ip_set.id),
                ));
            }
            None => {
                log_sync_error(
                    "lock_token_missing",
                    json!({
                        "ip_set_id": ip_set.id.clone(),
                        "message": "Unable to get lock token; updating with an empty token",
                    }),
                );
                String::new()
            }
        };

        let update = self
            .ip_set_service
            .update_ip_set(ip_set, &collection.addresses, &lock_token)
            .map_err(|error| SyncHandlerError::new(SyncStage::Update, error))?;

        let status = if update.next_lock_token.is_some() {
            log_sync_info(
                "ip_set_updated",
                json!({
                    "ip_set_id": ip_set.id.clone(),
                    "addresses_submitted": collection.len(),
                }),
            );
            SyncStatus::Updated
        } else {
            log_sync_error(
                "ip_set_update_failed",
                json!({
                    "ip_set_id": ip_set.id.clone(),
                    "message": "Update response carried no next lock token",
                }),
            );
            SyncStatus::UpdateFailed
        };

        Ok(SyncResponse {
            status,
            bucket: location.bucket,
            key: location.key,
            ip_set_id: ip_set.id.clone(),
            addresses_submitted: collection.len(),
            rows_skipped: collection.rows_skipped,
            previous_address_count: snapshot.addresses.len(),
            address_fingerprint: address_fingerprint(&collection.addresses),
            next_lock_token: update.next_lock_token,
        })
    }

    fn read_addresses(
        &self,
        location: &ObjectLocation,
    ) -> Result<AddressCollection, SyncHandlerError> {
        let body = self
            .object_source
            .fetch_object(&location.bucket, &location.key)
            .map_err(|error| SyncHandlerError::new(SyncStage::Fetch, error))?;

        let text = String::from_utf8(body).map_err(|error| {
            SyncHandlerError::new(
                SyncStage::Decode,
                format!("Object body is not valid UTF-8: {error}"),
            )
        })?;

        let collection = extract_addresses(&text, self.config.policy)
            .map_err(|error| SyncHandlerError::new(SyncStage::Parse, error.message()))?;

        log_sync_info(
            "addresses_parsed",
            json!({
                "bucket": location.bucket.clone(),
                "key": location.key.clone(),
                "policy": self.config.policy.as_str(),
                "addresses": collection.addresses.clone(),
                "rows_skipped": collection.rows_skipped,
            }),
        );
        Ok(collection)
    }
}

fn resolve_location(event: Value) -> Result<ObjectLocation, SyncHandlerError> {
    let event: S3NotificationEvent = serde_json::from_value(event).map_err(|error| {
        SyncHandlerError::new(
            SyncStage::Event,
            format!("Malformed notification event: {error}"),
        )
    })?;
    object_location(&event)
        .map_err(|error| SyncHandlerError::new(SyncStage::Event, error.message()))
}

fn log_sync_info(event: &str, details: Value) {
    eprintln!(
        "{}",
        json!({
            "component": "ipset_sync",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

fn log_sync_error(event: &str, details: Value) {
    eprintln!(
        "{}",
        json!({
            "component": "ipset_sync",
            "level": "error",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

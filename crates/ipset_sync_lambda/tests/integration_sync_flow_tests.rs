use std::sync::Mutex;

use ipset_sync_lambda::adapters::ip_set::{IpSetService, IpSetSnapshot, IpSetUpdate};
use ipset_sync_lambda::adapters::object_store::ObjectSource;
use ipset_sync_lambda::handlers::sync::{IpSetSynchronizer, SyncStage, SyncStatus};
use ipset_sync_lambda::runtime::config::SyncConfig;
use ipset_sync_lambda::runtime::contract::{address_fingerprint, IpSetIdentity, SyncPolicy};
use serde_json::{json, Value};

struct SingleObject {
    body: String,
}

impl ObjectSource for SingleObject {
    fn fetch_object(&self, _bucket: &str, _key: &str) -> Result<Vec<u8>, String> {
        Ok(self.body.as_bytes().to_vec())
    }
}

/// In-memory IP set that enforces lock tokens like the real service.
struct VersionedIpSet {
    state: Mutex<(u64, Vec<String>)>,
}

impl VersionedIpSet {
    fn new(addresses: &[&str]) -> Self {
        Self {
            state: Mutex::new((1, addresses.iter().map(|value| value.to_string()).collect())),
        }
    }

    fn addresses(&self) -> Vec<String> {
        self.state.lock().expect("poisoned mutex").1.clone()
    }

    fn bump_version(&self) {
        self.state.lock().expect("poisoned mutex").0 += 1;
    }
}

impl IpSetService for VersionedIpSet {
    fn get_ip_set(&self, _ip_set: &IpSetIdentity) -> Result<IpSetSnapshot, String> {
        let state = self.state.lock().expect("poisoned mutex");
        Ok(IpSetSnapshot {
            lock_token: Some(format!("v{}", state.0)),
            addresses: state.1.clone(),
        })
    }

    fn update_ip_set(
        &self,
        _ip_set: &IpSetIdentity,
        addresses: &[String],
        lock_token: &str,
    ) -> Result<IpSetUpdate, String> {
        let mut state = self.state.lock().expect("poisoned mutex");
        if lock_token != format!("v{}", state.0) {
            return Err("WAFOptimisticLockException: stale lock token".to_string());
        }
        state.0 += 1;
        state.1 = addresses.to_vec();
        Ok(IpSetUpdate {
            next_lock_token: Some(format!("v{}", state.0)),
        })
    }
}

/// Bumps the version between read and write, as a concurrent writer would.
struct RacingIpSet {
    inner: VersionedIpSet,
}

impl IpSetService for RacingIpSet {
    fn get_ip_set(&self, ip_set: &IpSetIdentity) -> Result<IpSetSnapshot, String> {
        let snapshot = self.inner.get_ip_set(ip_set);
        self.inner.bump_version();
        snapshot
    }

    fn update_ip_set(
        &self,
        ip_set: &IpSetIdentity,
        addresses: &[String],
        lock_token: &str,
    ) -> Result<IpSetUpdate, String> {
        self.inner.update_ip_set(ip_set, addresses, lock_token)
    }
}

fn config(policy: SyncPolicy) -> SyncConfig {
    SyncConfig::from_lookup(move |key| match key {
        "IPSET_NAME" => Some("partner-allow-list".to_string()),
        "IPSET_ID" => Some("0f1e2d3c".to_string()),
        "SCOPE" => Some("REGIONAL".to_string()),
        "SYNC_POLICY" => Some(policy.as_str().to_string()),
        _ => None,
    })
    .expect("config should load")
}

fn upload_event(key: &str) -> Value {
    json!({
        "Records": [
            {
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "awsRegion": "eu-west-1",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "s3SchemaVersion": "1.0",
                    "bucket": {"name": "allow-lists", "arn": "arn:aws:s3:::allow-lists"},
                    "object": {"key": key, "size": 128, "eTag": "abc"}
                }
            }
        ]
    })
}

#[test]
fn full_replace_drops_previous_addresses() {
    let ip_set = VersionedIpSet::new(&["198.51.100.0/24", "203.0.113.5/32"]);
    let synchronizer = IpSetSynchronizer::new(
        config(SyncPolicy::Lenient),
        SingleObject {
            body: "ipnet,note\n10.0.0.1/32,a\n,b\n10.0.0.2/32,\n".to_string(),
        },
        ip_set,
    );

    let response = synchronizer
        .handle_notification_event(upload_event("partners%2F2024+q1.csv"))
        .expect("sync should succeed");

    assert_eq!(response.status, SyncStatus::Updated);
    assert_eq!(response.key, "partners/2024 q1.csv");
    assert_eq!(response.addresses_submitted, 2);
    assert_eq!(response.rows_skipped, 1);
    assert_eq!(response.previous_address_count, 2);
    assert_eq!(response.next_lock_token.as_deref(), Some("v2"));

    let expected = vec!["10.0.0.1/32".to_string(), "10.0.0.2/32".to_string()];
    assert_eq!(response.address_fingerprint, address_fingerprint(&expected));
}

#[test]
fn strict_policy_submits_only_annotated_rows() {
    let ip_set = VersionedIpSet::new(&[]);
    let synchronizer = IpSetSynchronizer::new(
        config(SyncPolicy::Strict),
        SingleObject {
            body: "ipnet,note\n10.0.0.1/32,a\n,b\n10.0.0.2/32,\n10.0.0.3/32,c\n".to_string(),
        },
        ip_set,
    );

    let response = synchronizer
        .handle_notification_event(upload_event("list.csv"))
        .expect("sync should succeed");

    assert_eq!(response.addresses_submitted, 2);
    assert_eq!(response.rows_skipped, 2);
}

#[test]
fn stale_lock_token_fails_invocation() {
    let synchronizer = IpSetSynchronizer::new(
        config(SyncPolicy::Lenient),
        SingleObject {
            body: "ipnet\n10.0.0.1/32\n".to_string(),
        },
        RacingIpSet {
            inner: VersionedIpSet::new(&["198.51.100.0/24"]),
        },
    );

    let error = synchronizer
        .handle_notification_event(upload_event("list.csv"))
        .expect_err("stale token should fail");

    assert_eq!(error.stage, SyncStage::Update);
    assert!(error.message.contains("stale lock token"));
}

#[test]
fn repeated_uploads_fetch_fresh_tokens() {
    let ip_set = VersionedIpSet::new(&[]);
    let first = IpSetSynchronizer::new(
        config(SyncPolicy::Lenient),
        SingleObject {
            body: "ipnet\n10.0.0.1/32\n".to_string(),
        },
        ip_set,
    );

    let response = first
        .handle_notification_event(upload_event("list.csv"))
        .expect("first sync should succeed");
    assert_eq!(response.next_lock_token.as_deref(), Some("v2"));

    let response = first
        .handle_notification_event(upload_event("list.csv"))
        .expect("second sync should succeed");
    assert_eq!(response.next_lock_token.as_deref(), Some("v3"));
    assert_eq!(response.previous_address_count, 1);
}

#[test]
fn versioned_fake_holds_latest_addresses() {
    let ip_set = VersionedIpSet::new(&["198.51.100.0/24"]);
    let identity = config(SyncPolicy::Lenient).ip_set;
    let snapshot = ip_set.get_ip_set(&identity).expect("read");
    ip_set
        .update_ip_set(
            &identity,
            &["10.0.0.1/32".to_string()],
            snapshot.lock_token.as_deref().unwrap_or_default(),
        )
        .expect("write");

    assert_eq!(ip_set.addresses(), vec!["10.0.0.1/32"]);
}

use serde::{Deserialize, Serialize};

use crate::contract::{IpSetIdentity, IpSetScope, SyncPolicy, ValidationError};

pub const IPSET_NAME_VAR: &str = "IPSET_NAME";
pub const IPSET_ID_VAR: &str = "IPSET_ID";
pub const SCOPE_VAR: &str = "SCOPE";
pub const SYNC_POLICY_VAR: &str = "SYNC_POLICY";

/// Settings fixed for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    pub ip_set: IpSetIdentity,
    pub policy: SyncPolicy,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ValidationError> {
        let name = required(&lookup, IPSET_NAME_VAR)?;
        let id = required(&lookup, IPSET_ID_VAR)?;
        let scope = IpSetScope::parse(&required(&lookup, SCOPE_VAR)?)?;
        let policy = match lookup(SYNC_POLICY_VAR) {
            Some(value) if !value.trim().is_empty() => SyncPolicy::parse(&value)?,
            _ => SyncPolicy::default(),
        };

        Ok(Self {
            ip_set: IpSetIdentity { name, id, scope },
            policy,
        })
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<String, ValidationError> {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ValidationError::new(format!("{key} must be configured"))),
    }
}

use crate::runtime::contract::IpSetIdentity;

/// Current state of an IP set as returned by a read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpSetSnapshot {
    pub lock_token: Option<String>,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpSetUpdate {
    pub next_lock_token: Option<String>,
}

/// Allow-list service with optimistic concurrency on a lock token.
///
/// `update_ip_set` replaces the whole address list; implementations surface a
/// stale-token rejection as an `Err`.
pub trait IpSetService {
    fn get_ip_set(&self, ip_set: &IpSetIdentity) -> Result<IpSetSnapshot, String>;

    fn update_ip_set(
        &self,
        ip_set: &IpSetIdentity,
        addresses: &[String],
        lock_token: &str,
    ) -> Result<IpSetUpdate, String>;
}

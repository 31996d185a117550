//! AWS-oriented adapters and the handler that keeps a WAFv2 IP set in sync
//! with CSV objects uploaded to S3.
//!
//! The handler only talks to the outside world through the traits in
//! [`adapters`]; the Lambda binary supplies SDK-backed implementations and the
//! tests supply in-memory ones. Pure contract types are re-exported from
//! `ipset_sync_core` under [`runtime`].

pub mod adapters;
pub mod handlers;

pub mod runtime {
    pub use ipset_sync_core::{addresses, config, contract};
}

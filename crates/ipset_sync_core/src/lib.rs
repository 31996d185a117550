//! Runtime-agnostic primitives for the IP-set synchronizer.
//!
//! Everything here is pure: event contracts, object key decoding, CSV address
//! extraction, and configuration parsing. AWS integration lives in
//! `ipset_sync_lambda`.

pub mod addresses;
pub mod config;
pub mod contract;

pub mod ip_set;
pub mod object_store;

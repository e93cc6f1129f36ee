//! shepherd-operator - AWS account lifecycle operator
//!
//! Drives AWS accounts from nonexistent to ready-for-use and back to
//! reclaimed: account creation and verification, pool matching for claims,
//! cross-account credential chaining, and resource teardown before reuse.

pub mod aws;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod limits;
pub mod retry;
pub mod secrets;
pub mod store;
pub mod testing;

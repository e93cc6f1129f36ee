//! AWS boundary for the operator
//!
//! - `api`: the typed provider trait the engine depends on
//! - `context`: shared SDK config + service-client factory
//! - `sdk`: the aws-sdk-backed implementation
//! - `error`: typed error classification
//! - `sts`: cross-account credential chaining
//! - `teardown`: resource teardown before account reuse

pub mod api;
pub mod context;
pub mod error;
pub mod sdk;
pub mod sts;
pub mod teardown;

pub use api::{AssumedCredentials, AwsApi, AwsResult, ClientBuilder};
pub use context::AwsContext;
pub use error::{classify_aws_error, ignore_not_found, AwsError};
pub use sdk::{SdkApi, SdkBuilder};
pub use teardown::{TeardownEngine, TeardownReport};

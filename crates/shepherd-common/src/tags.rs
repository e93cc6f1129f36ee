//! AWS resource tag constants
//!
//! Accounts and the IAM principals provisioned inside them are tagged with
//! the owning shard so fleet tooling can attribute them.

/// Tag key identifying the owning shard on accounts and IAM users
pub const TAG_OWNER: &str = "owner";

/// Tag key marking IAM users managed by this operator
pub const TAG_MANAGED: &str = "shepherd:managed";

/// Tag value for [`TAG_MANAGED`]
pub const TAG_MANAGED_VALUE: &str = "true";

//! Operator configuration
//!
//! The feature-flag/config surface the reconcilers read: pool designations,
//! opt-in-region settings, AMI ownership, the operator's role ARNs, and
//! wait thresholds. Loaded once at startup; reconcilers hold it immutably.

use serde::Deserialize;
use shepherd_common::defaults;
use shepherd_common::SecretRef;
use std::collections::HashMap;
use std::path::Path;

/// Per-pool policy for claims that find no available account.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PoolPolicy {
    /// Marks the pool claims without an explicit pool name resolve to
    #[serde(default)]
    pub default: bool,
    /// Create a net-new account when the pool is empty instead of failing
    /// the claim
    #[serde(default)]
    pub create_on_empty: bool,
}

fn default_namespace() -> String {
    "shepherd".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_supported_regions() -> Vec<String> {
    vec![
        "us-east-1".to_string(),
        "us-east-2".to_string(),
        "us-west-1".to_string(),
        "us-west-2".to_string(),
        "eu-west-1".to_string(),
    ]
}

fn default_create_pend_minutes() -> i64 {
    defaults::CREATE_PEND_MINUTES
}

fn default_account_ceiling() -> u32 {
    1000
}

fn default_instance_type() -> String {
    "t2.micro".to_string()
}

/// Operator-wide configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
    /// Namespace Account objects live in
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Shard identifier used to tag owned accounts and IAM users
    #[serde(default)]
    pub shard_name: String,
    /// Region operator-scoped clients are built in
    #[serde(default = "default_region")]
    pub default_region: String,
    /// Regions activated during account initialization
    #[serde(default = "default_supported_regions")]
    pub supported_regions: Vec<String>,
    /// Opt-in region enablement feature toggle
    #[serde(default)]
    pub feature_opt_in_regions: bool,
    /// Regions to enable when the feature is on
    #[serde(default)]
    pub opt_in_regions: Vec<String>,
    /// Account owning the AMIs used for region activation launches
    #[serde(default)]
    pub ami_owner: String,
    /// Instance type launched during region activation
    #[serde(default = "default_instance_type")]
    pub init_instance_type: String,
    /// SRE access role assumable for break-glass work in managed accounts
    #[serde(default)]
    pub sre_access_arn: String,
    /// Jump role chained through for BYOC/STS customer roles
    #[serde(default)]
    pub sts_jump_arn: String,
    /// Secret holding the operator's own credentials
    #[serde(default)]
    pub operator_secret: SecretRef,
    /// Domain used to derive root emails for created accounts
    #[serde(default)]
    pub account_email_domain: String,
    /// Minutes before a Creating account is failed with CreationTimeout
    #[serde(default = "default_create_pend_minutes")]
    pub create_pend_minutes: i64,
    /// Ceiling for the account-creation budget
    #[serde(default = "default_account_ceiling")]
    pub account_ceiling: u32,
    /// Pool policies keyed by pool name
    #[serde(default)]
    pub pools: HashMap<String, PoolPolicy>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("empty config deserializes")
    }
}

impl OperatorConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Name of the pool marked default in configuration, if any.
    pub fn default_pool_name(&self) -> Option<&str> {
        self.pools
            .iter()
            .find(|(_, policy)| policy.default)
            .map(|(name, _)| name.as_str())
    }

    /// Whether an empty pool may create net-new accounts for a claim.
    /// The default pool always replenishes; named pools are config-driven.
    pub fn pool_creates_on_empty(&self, pool_name: &str) -> bool {
        if pool_name.is_empty() {
            return true;
        }
        self.pools
            .get(pool_name)
            .map(|policy| policy.create_on_empty || policy.default)
            .unwrap_or(false)
    }

    /// Root email for a created account.
    pub fn account_email(&self, account_name: &str) -> String {
        let domain = if self.account_email_domain.is_empty() {
            "example.com"
        } else {
            &self.account_email_domain
        };
        format!("aws-shepherd+{account_name}@{domain}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = OperatorConfig::default();
        assert_eq!(config.namespace, "shepherd");
        assert_eq!(config.create_pend_minutes, defaults::CREATE_PEND_MINUTES);
        assert!(!config.feature_opt_in_regions);
        assert!(config.default_pool_name().is_none());
    }

    #[test]
    fn pool_policies_drive_replenishment() {
        let mut config = OperatorConfig::default();
        config.pools.insert(
            "service-quota".to_string(),
            PoolPolicy {
                default: false,
                create_on_empty: false,
            },
        );
        config.pools.insert(
            "burst".to_string(),
            PoolPolicy {
                default: false,
                create_on_empty: true,
            },
        );

        // empty pool name is the default pool
        assert!(config.pool_creates_on_empty(""));
        assert!(config.pool_creates_on_empty("burst"));
        assert!(!config.pool_creates_on_empty("service-quota"));
        // unknown pools never create
        assert!(!config.pool_creates_on_empty("missing"));
    }

    #[test]
    fn config_parses_from_json() {
        let config: OperatorConfig = serde_json::from_str(
            r#"{
                "shard_name": "shard-1",
                "feature_opt_in_regions": true,
                "opt_in_regions": ["af-south-1", "me-south-1"],
                "pools": {"main": {"default": true}}
            }"#,
        )
        .unwrap();
        assert_eq!(config.shard_name, "shard-1");
        assert!(config.feature_opt_in_regions);
        assert_eq!(config.opt_in_regions.len(), 2);
        assert_eq!(config.default_pool_name(), Some("main"));
    }

    #[test]
    fn account_email_shape() {
        let config = OperatorConfig::default();
        assert_eq!(
            config.account_email("osd-creds-mgmt-aaabbb"),
            "aws-shepherd+osd-creds-mgmt-aaabbb@example.com"
        );
    }
}

//! Secrets boundary
//!
//! Credential material (access key ID / secret key) is read from named
//! secrets when building clients from stored operator or customer
//! credentials, and written when the operator provisions an IAM user for a
//! managed account. Secret values are never logged.

use shepherd_common::SecretRef;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret {namespace}/{name} not found")]
    NotFound { name: String, namespace: String },
}

/// An access key pair stored in a secret.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSecret {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for CredentialSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSecret")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// Named-secret lookup and storage.
pub trait SecretStore: Send + Sync {
    fn get_secret(
        &self,
        secret: &SecretRef,
    ) -> impl Future<Output = Result<CredentialSecret, SecretError>> + Send;

    fn put_secret(
        &self,
        secret: &SecretRef,
        value: CredentialSecret,
    ) -> impl Future<Output = Result<(), SecretError>> + Send;

    fn delete_secret(&self, secret: &SecretRef) -> impl Future<Output = Result<(), SecretError>> + Send;
}

/// In-memory secret store used by the operator loop and tests.
#[derive(Clone, Default)]
pub struct MemorySecrets {
    inner: Arc<RwLock<HashMap<(String, String), CredentialSecret>>>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecrets {
    async fn get_secret(&self, secret: &SecretRef) -> Result<CredentialSecret, SecretError> {
        self.inner
            .read()
            .await
            .get(&(secret.namespace.clone(), secret.name.clone()))
            .cloned()
            .ok_or_else(|| SecretError::NotFound {
                name: secret.name.clone(),
                namespace: secret.namespace.clone(),
            })
    }

    async fn put_secret(
        &self,
        secret: &SecretRef,
        value: CredentialSecret,
    ) -> Result<(), SecretError> {
        self.inner
            .write()
            .await
            .insert((secret.namespace.clone(), secret.name.clone()), value);
        Ok(())
    }

    async fn delete_secret(&self, secret: &SecretRef) -> Result<(), SecretError> {
        self.inner
            .write()
            .await
            .remove(&(secret.namespace.clone(), secret.name.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_ref(name: &str) -> SecretRef {
        SecretRef {
            name: name.to_string(),
            namespace: "shepherd".to_string(),
        }
    }

    #[tokio::test]
    async fn put_get_delete_roundtrip() {
        let store = MemorySecrets::new();
        let value = CredentialSecret {
            access_key_id: "AKIA123".to_string(),
            secret_access_key: "secret".to_string(),
        };

        assert!(store.get_secret(&secret_ref("creds")).await.is_err());

        store
            .put_secret(&secret_ref("creds"), value.clone())
            .await
            .unwrap();
        let fetched = store.get_secret(&secret_ref("creds")).await.unwrap();
        assert_eq!(fetched, value);

        store.delete_secret(&secret_ref("creds")).await.unwrap();
        assert!(store.get_secret(&secret_ref("creds")).await.is_err());
    }

    #[test]
    fn debug_redacts_secret_key() {
        let value = CredentialSecret {
            access_key_id: "AKIA123".to_string(),
            secret_access_key: "super-secret".to_string(),
        };
        let debug = format!("{value:?}");
        assert!(!debug.contains("super-secret"));
    }
}

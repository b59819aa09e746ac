//! Bootstrap credential loading: the service-account JSON read from local
//! disk, and the RapidPro gateway credentials blob read from a configured
//! object-storage bucket.
//!
//! Only the shape of these credentials is fixed; process bootstrap itself
//! is a thin adapter around those external collaborators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::SecretsError;

/// Service-account JSON read from disk at startup. Only `project_id` is
/// used by this system (to derive topic/subscription paths); any other
/// fields present in the file are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    pub project_id: String,
}

impl ServiceAccountCredentials {
    /// Read and parse the service-account JSON from `path`.
    pub async fn load(path: &str) -> Result<Self, SecretsError> {
        let content = tokio::fs::read_to_string(path).await?;
        let creds: Self = serde_json::from_str(&content)
            .map_err(|e| SecretsError::ProviderError(format!(
                "Invalid service-account JSON at {path}: {e}"
            )))?;
        info!(project_id = %creds.project_id, "Loaded service-account credentials");
        Ok(creds)
    }
}

/// RapidPro gateway credentials: `{"domain": ..., "token": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RapidProCredentials {
    pub domain: String,
    pub token: String,
}

/// Fetches a named JSON blob from a bucket and parses it as `T`.
#[async_trait]
pub trait CredentialsBucket: Send + Sync {
    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        bucket: &str,
        blob_name: &str,
    ) -> Result<T, SecretsError>;
}

/// AWS S3-backed credentials bucket, grounded on the same
/// `aws_config::load_defaults` / client-construction convention used by
/// [`crate::aws::AwsSecretsManagerProvider`].
pub struct S3CredentialsBucket {
    client: aws_sdk_s3::Client,
}

impl S3CredentialsBucket {
    pub async fn new(region: Option<String>) -> Self {
        let config = if let Some(region) = region {
            aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_config::Region::new(region))
                .load()
                .await
        } else {
            aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
        };

        Self {
            client: aws_sdk_s3::Client::new(&config),
        }
    }

    pub async fn fetch_bytes(&self, bucket: &str, blob_name: &str) -> Result<Vec<u8>, SecretsError> {
        debug!(bucket = %bucket, blob = %blob_name, "Fetching credentials blob");

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(blob_name)
            .send()
            .await
            .map_err(|e| SecretsError::ProviderError(format!(
                "Failed to fetch {blob_name} from bucket {bucket}: {e}"
            )))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| SecretsError::ProviderError(format!("Failed to read blob body: {e}")))?;

        Ok(body.into_bytes().to_vec())
    }
}

#[async_trait]
impl CredentialsBucket for S3CredentialsBucket {
    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        bucket: &str,
        blob_name: &str,
    ) -> Result<T, SecretsError> {
        let bytes = self.fetch_bytes(bucket, blob_name).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            SecretsError::ProviderError(format!("Invalid JSON in blob {blob_name}: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn service_account_credentials_parse_project_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sa.json");
        tokio::fs::write(&path, r#"{"project_id": "acme", "other_field": 1}"#)
            .await
            .unwrap();

        let creds = ServiceAccountCredentials::load(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(creds.project_id, "acme");
    }

    #[tokio::test]
    async fn service_account_credentials_reject_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sa.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let result = ServiceAccountCredentials::load(path.to_str().unwrap()).await;
        assert!(result.is_err());
    }
}

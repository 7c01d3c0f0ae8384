//! Resource providers.
//!
//! The engine hands every declared resource to a [`Provider`] once its
//! arguments have resolved. Providers also answer the two invokes the stacks
//! need: listing storage account keys and issuing a service SAS token.
//!
//! - [`InMemoryProvider`]: simulated Azure with recorded calls, used for
//!   previews and tests
//! - [`ArmProvider`]: Azure Resource Manager over HTTPS

pub mod arm;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use arm::{ArmConfig, ArmProvider};
pub use memory::{InMemoryProvider, ProviderCall};

use crate::engine::{ResourceState, ResourceType, Urn};
use crate::secrets::{SecretRegistry, SensitiveString};

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Errors reported by a provider.
///
/// Messages coming from the cloud are displayed exactly as received.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider rejected a request.
    #[error("{message}")]
    Api {
        /// HTTP status, when the provider is remote
        status: Option<u16>,
        /// Provider error code (`ResourceGroupNotFound`, ...)
        code: Option<String>,
        /// Provider message
        message: String,
    },

    /// A resource with the same name already exists.
    #[error("{0}")]
    Conflict(String),

    /// A referenced resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The credentials were missing or rejected.
    #[error("{0}")]
    Unauthenticated(String),

    /// A request could not be built from the resolved properties.
    #[error("Invalid provider request: {0}")]
    InvalidRequest(String),

    /// The provider answered with something that could not be understood.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Transport failure. The request URL is stripped, since data-plane URLs
    /// carry SAS tokens in their query string.
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(error.without_url())
    }
}

impl ProviderError {
    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates an API error.
    pub fn api(status: Option<u16>, code: Option<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code,
            message: message.into(),
        }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// The provider error code, if one was reported.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// A resource creation request.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Declared identity
    pub urn: Urn,
    /// Resource type
    pub resource_type: ResourceType,
    /// Physical name
    pub name: String,
    /// Resolved properties. May hold secret values; never log them.
    pub properties: Map<String, Value>,
    /// Blob content
    pub content: Option<Vec<u8>>,
}

impl CreateRequest {
    /// A required string property.
    pub fn property_str(&self, key: &str) -> ProviderResult<&str> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::invalid_request(format!(
                    "{} '{}' is missing property '{}'",
                    self.resource_type, self.name, key
                ))
            })
    }
}

/// One storage account access key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccountKey {
    /// Key name (`key1`, `key2`)
    pub key_name: String,
    /// Key value
    pub value: SensitiveString,
    /// Granted permissions (`FULL`)
    #[serde(default)]
    pub permissions: Option<String>,
}

/// Service SAS request for a blob container.
///
/// Serializes to the `ServiceSasParameters` body of `ListServiceSas`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSasRequest {
    /// Resource group of the account
    #[serde(skip)]
    pub resource_group_name: String,
    /// Storage account name
    #[serde(skip)]
    pub account_name: String,
    /// `/blob/<account>/<container>`
    #[serde(rename = "canonicalizedResource")]
    pub canonicalized_resource: String,
    /// Signed resource (`c` for container)
    #[serde(rename = "signedResource")]
    pub resource: String,
    /// Signed permissions (`r`)
    #[serde(rename = "signedPermission")]
    pub permissions: String,
    /// Allowed protocols (`https`)
    #[serde(rename = "signedProtocol")]
    pub protocols: String,
    /// Start of validity
    #[serde(rename = "signedStart")]
    pub shared_access_start_time: String,
    /// End of validity
    #[serde(rename = "signedExpiry")]
    pub shared_access_expiry_time: String,
    /// Response Content-Type override
    #[serde(rename = "rsct", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Response Cache-Control override
    #[serde(rename = "rscc", skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// Response Content-Disposition override
    #[serde(rename = "rscd", skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    /// Response Content-Encoding override
    #[serde(rename = "rsce", skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
}

/// A backend able to create the resources the stacks declare.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Creates one resource and reports its state.
    async fn create_resource(&self, request: CreateRequest) -> ProviderResult<ResourceState>;

    /// Lists the access keys of a storage account.
    async fn list_storage_account_keys(
        &self,
        resource_group_name: &str,
        account_name: &str,
    ) -> ProviderResult<Vec<StorageAccountKey>>;

    /// Issues a service SAS token.
    async fn list_service_sas(&self, request: &ServiceSasRequest) -> ProviderResult<SensitiveString>;

    /// Registry for credentials the provider fetches on its own, such as
    /// upload SAS tokens. A deployment adopts it as its secret registry.
    fn secrets(&self) -> Option<Arc<SecretRegistry>> {
        None
    }
}

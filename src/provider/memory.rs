//! Simulated Azure provider.
//!
//! Returns realistic ARM ids and endpoints without contacting Azure. Every
//! call is recorded in order so callers can inspect what a deployment would
//! have done. Keys and SAS signatures are derived deterministically from the
//! request.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{
    CreateRequest, Provider, ProviderError, ProviderResult, ServiceSasRequest, StorageAccountKey,
};
use crate::engine::{ResourceState, ResourceType, Urn};
use crate::secrets::SensitiveString;

/// Subscription id used in simulated resource ids.
pub const SIMULATED_SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Storage service version reported in simulated SAS tokens.
const SAS_SERVICE_VERSION: &str = "2019-12-12";

/// A call received by the in-memory provider.
#[derive(Debug, Clone)]
pub enum ProviderCall {
    /// `create_resource`
    Create {
        /// Declared identity
        urn: Urn,
        /// Resource type
        resource_type: ResourceType,
        /// Physical name
        name: String,
        /// Resolved properties
        properties: Map<String, Value>,
        /// Size of the uploaded content
        content_length: Option<usize>,
    },
    /// `list_storage_account_keys`
    ListKeys {
        /// Resource group name
        resource_group_name: String,
        /// Account name
        account_name: String,
    },
    /// `list_service_sas`
    ListServiceSas(ServiceSasRequest),
}

impl ProviderCall {
    /// The URN of a create call.
    pub fn urn(&self) -> Option<&Urn> {
        match self {
            ProviderCall::Create { urn, .. } => Some(urn),
            _ => None,
        }
    }
}

/// Simulated provider.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    calls: Mutex<Vec<ProviderCall>>,
    taken_names: Mutex<HashSet<(ResourceType, String)>>,
    failures: Mutex<HashMap<String, String>>,
    keys: Mutex<HashMap<String, Vec<String>>>,
    latency: Option<Duration>,
}

impl InMemoryProvider {
    /// Create a provider with no recorded calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, to exercise concurrent creation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the creation of the resource with this logical or physical name.
    pub fn fail_on(&self, name: impl Into<String>, message: impl Into<String>) {
        self.failures.lock().insert(name.into(), message.into());
    }

    /// Override the keys returned for an account.
    pub fn with_keys(&self, account_name: impl Into<String>, keys: Vec<String>) {
        self.keys.lock().insert(account_name.into(), keys);
    }

    /// Every call in the order received.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    /// URNs of created resources in creation order.
    pub fn created(&self) -> Vec<Urn> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| c.urn().cloned())
            .collect()
    }

    /// The create call for a resource.
    pub fn create_call(&self, urn: &Urn) -> Option<ProviderCall> {
        self.calls
            .lock()
            .iter()
            .find(|c| c.urn() == Some(urn))
            .cloned()
    }

    /// Position of a resource in creation order.
    pub fn creation_index(&self, urn: &Urn) -> Option<usize> {
        self.created().iter().position(|u| u == urn)
    }

    /// Number of `list_storage_account_keys` calls.
    pub fn list_keys_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ProviderCall::ListKeys { .. }))
            .count()
    }

    /// Every `list_service_sas` request.
    pub fn sas_requests(&self) -> Vec<ServiceSasRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                ProviderCall::ListServiceSas(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn default_keys(account_name: &str) -> Vec<String> {
        ["key1", "key2"]
            .iter()
            .map(|key_name| {
                let digest = Sha256::digest(format!("{}/{}", account_name, key_name));
                STANDARD.encode(digest)
            })
            .collect()
    }

    fn resource_group_id(resource_group: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            SIMULATED_SUBSCRIPTION_ID, resource_group
        )
    }

    fn storage_account_id(resource_group: &str, account: &str) -> String {
        format!(
            "{}/providers/Microsoft.Storage/storageAccounts/{}",
            Self::resource_group_id(resource_group),
            account
        )
    }

    /// Storage account names are global; everything else is scoped to its parents.
    fn name_key(request: &CreateRequest) -> (ResourceType, String) {
        let scope: Vec<&str> = ["resourceGroupName", "accountName", "containerName"]
            .iter()
            .filter_map(|k| request.properties.get(*k).and_then(Value::as_str))
            .collect();

        let key = match request.resource_type {
            ResourceType::StorageAccount | ResourceType::WebApp => request.name.clone(),
            _ => format!("{}/{}", scope.join("/"), request.name),
        };
        (request.resource_type, key)
    }

    fn simulate(request: &CreateRequest) -> ProviderResult<ResourceState> {
        let name = request.name.as_str();

        let state = match request.resource_type {
            ResourceType::ResourceGroup => ResourceState::new(Self::resource_group_id(name))
                .with_output("name", name)
                .with_output(
                    "location",
                    request
                        .properties
                        .get("location")
                        .cloned()
                        .unwrap_or_else(|| json!("westeurope")),
                ),
            ResourceType::StorageAccount => {
                let rg = request.property_str("resourceGroupName")?;
                ResourceState::new(Self::storage_account_id(rg, name))
                    .with_output("name", name)
                    .with_output("kind", request.properties.get("kind").cloned().unwrap_or(Value::Null))
                    .with_output(
                        "primaryEndpoints",
                        json!({
                            "web": format!("https://{}.z6.web.core.windows.net/", name),
                            "blob": format!("https://{}.blob.core.windows.net/", name),
                        }),
                    )
            }
            ResourceType::StorageAccountStaticWebsite => {
                let rg = request.property_str("resourceGroupName")?;
                let account = request.property_str("accountName")?;
                ResourceState::new(format!("{}/staticWebsite", Self::storage_account_id(rg, account)))
                    .with_output("containerName", "$web")
                    .with_output(
                        "indexDocument",
                        request.properties.get("indexDocument").cloned().unwrap_or(Value::Null),
                    )
                    .with_output(
                        "error404Document",
                        request.properties.get("error404Document").cloned().unwrap_or(Value::Null),
                    )
            }
            ResourceType::BlobContainer => {
                let rg = request.property_str("resourceGroupName")?;
                let account = request.property_str("accountName")?;
                ResourceState::new(format!(
                    "{}/blobServices/default/containers/{}",
                    Self::storage_account_id(rg, account),
                    name
                ))
                .with_output("name", name)
            }
            ResourceType::Blob => {
                let account = request.property_str("accountName")?;
                let container = request.property_str("containerName")?;
                let url = format!("https://{}.blob.core.windows.net/{}/{}", account, container, name);
                ResourceState::new(url.clone())
                    .with_output("name", name)
                    .with_output("url", url)
                    .with_output(
                        "contentType",
                        request.properties.get("contentType").cloned().unwrap_or(Value::Null),
                    )
            }
            ResourceType::AppServicePlan => {
                let rg = request.property_str("resourceGroupName")?;
                ResourceState::new(format!(
                    "{}/providers/Microsoft.Web/serverfarms/{}",
                    Self::resource_group_id(rg),
                    name
                ))
                .with_output("name", name)
            }
            ResourceType::WebApp => {
                let rg = request.property_str("resourceGroupName")?;
                ResourceState::new(format!(
                    "{}/providers/Microsoft.Web/sites/{}",
                    Self::resource_group_id(rg),
                    name
                ))
                .with_output("name", name)
                .with_output("defaultHostName", format!("{}.azurewebsites.net", name))
            }
        };

        Ok(state)
    }
}

#[async_trait]
impl Provider for InMemoryProvider {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn create_resource(&self, request: CreateRequest) -> ProviderResult<ResourceState> {
        self.simulate_latency().await;

        self.calls.lock().push(ProviderCall::Create {
            urn: request.urn.clone(),
            resource_type: request.resource_type,
            name: request.name.clone(),
            properties: request.properties.clone(),
            content_length: request.content.as_ref().map(Vec::len),
        });

        let failure = {
            let failures = self.failures.lock();
            failures
                .get(request.urn.name())
                .or_else(|| failures.get(&request.name))
                .cloned()
        };
        if let Some(message) = failure {
            return Err(ProviderError::api(None, None, message));
        }

        if !self.taken_names.lock().insert(Self::name_key(&request)) {
            return Err(ProviderError::conflict(format!(
                "{} '{}' already exists",
                request.resource_type, request.name
            )));
        }

        let state = Self::simulate(&request)?;
        info!(resource_type = %request.resource_type, name = %request.name, "Would create");
        Ok(state)
    }

    async fn list_storage_account_keys(
        &self,
        resource_group_name: &str,
        account_name: &str,
    ) -> ProviderResult<Vec<StorageAccountKey>> {
        self.simulate_latency().await;

        self.calls.lock().push(ProviderCall::ListKeys {
            resource_group_name: resource_group_name.to_string(),
            account_name: account_name.to_string(),
        });

        let values = self
            .keys
            .lock()
            .get(account_name)
            .cloned()
            .unwrap_or_else(|| Self::default_keys(account_name));

        debug!(account = account_name, keys = values.len(), "Listed storage account keys");

        Ok(values
            .into_iter()
            .enumerate()
            .map(|(i, value)| StorageAccountKey {
                key_name: format!("key{}", i + 1),
                value: SensitiveString::new(value),
                permissions: Some("FULL".to_string()),
            })
            .collect())
    }

    async fn list_service_sas(&self, request: &ServiceSasRequest) -> ProviderResult<SensitiveString> {
        self.simulate_latency().await;

        self.calls
            .lock()
            .push(ProviderCall::ListServiceSas(request.clone()));

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}\n{}",
            request.permissions,
            request.shared_access_start_time,
            request.shared_access_expiry_time,
            request.canonicalized_resource,
            request.protocols
        );
        let signature = URL_SAFE_NO_PAD.encode(Sha256::digest(string_to_sign));

        let mut token = format!(
            "sv={}&sr={}&sp={}&spr={}&st={}&se={}",
            SAS_SERVICE_VERSION,
            request.resource,
            request.permissions,
            request.protocols,
            request.shared_access_start_time,
            request.shared_access_expiry_time
        );
        for (key, value) in [
            ("rscc", &request.cache_control),
            ("rscd", &request.content_disposition),
            ("rsce", &request.content_encoding),
            ("rsct", &request.content_type),
        ] {
            if let Some(value) = value {
                token.push_str(&format!("&{}={}", key, value.replace('/', "%2F")));
            }
        }
        token.push_str(&format!("&sig={}", signature));

        Ok(SensitiveString::new(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(resource_type: ResourceType, name: &str, properties: Value) -> CreateRequest {
        CreateRequest {
            urn: Urn::new(resource_type.token(), name),
            resource_type,
            name: name.to_string(),
            properties: properties.as_object().cloned().unwrap_or_default(),
            content: None,
        }
    }

    #[tokio::test]
    async fn test_storage_account_endpoints() {
        let provider = InMemoryProvider::new();
        let state = provider
            .create_resource(request(
                ResourceType::StorageAccount,
                "pdst",
                json!({"resourceGroupName": "p-d-rg"}),
            ))
            .await
            .unwrap();

        assert_eq!(
            state.id,
            "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/p-d-rg/providers/Microsoft.Storage/storageAccounts/pdst"
        );
        assert_eq!(
            state.get_str("primaryEndpoints.web"),
            Some("https://pdst.z6.web.core.windows.net/")
        );
    }

    #[tokio::test]
    async fn test_reused_name_conflicts() {
        let provider = InMemoryProvider::new();
        let props = json!({"resourceGroupName": "rg"});
        provider
            .create_resource(request(ResourceType::StorageAccount, "pdst", props.clone()))
            .await
            .unwrap();
        let err = provider
            .create_resource(request(ResourceType::StorageAccount, "pdst", props))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_blobs_scoped_by_container() {
        let provider = InMemoryProvider::new();
        for container in ["a", "b"] {
            provider
                .create_resource(request(
                    ResourceType::Blob,
                    "index.html",
                    json!({"resourceGroupName": "rg", "accountName": "st", "containerName": container}),
                ))
                .await
                .unwrap();
        }
        assert_eq!(provider.created().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_message() {
        let provider = InMemoryProvider::new();
        provider.fail_on("p-d-rg", "quota exceeded");
        let err = provider
            .create_resource(request(ResourceType::ResourceGroup, "p-d-rg", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[tokio::test]
    async fn test_keys_are_deterministic() {
        let provider = InMemoryProvider::new();
        let first = provider.list_storage_account_keys("rg", "st").await.unwrap();
        let second = provider.list_storage_account_keys("rg", "st").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].key_name, "key1");
        assert_eq!(provider.list_keys_calls(), 2);
    }

    #[tokio::test]
    async fn test_sas_token_shape() {
        let provider = InMemoryProvider::new();
        let token = provider
            .list_service_sas(&ServiceSasRequest {
                resource_group_name: "rg".into(),
                account_name: "st".into(),
                canonicalized_resource: "/blob/st/zips".into(),
                resource: "c".into(),
                permissions: "r".into(),
                protocols: "https".into(),
                shared_access_start_time: "2021-04-01".into(),
                shared_access_expiry_time: "2030-01-01".into(),
                content_type: Some("application/json".into()),
                cache_control: None,
                content_disposition: None,
                content_encoding: None,
            })
            .await
            .unwrap();

        let token = token.expose();
        assert!(token.starts_with("sv=2019-12-12&sr=c&sp=r&spr=https&st=2021-04-01&se=2030-01-01"));
        assert!(token.contains("&rsct=application%2Fjson"));
        assert!(token.contains("&sig="));
        assert_eq!(provider.sas_requests().len(), 1);
    }
}

//! Azure Resource Manager provider.
//!
//! Control-plane resources are created with a single `PUT` against
//! `management.azure.com`. When Azure accepts a request without returning the
//! resource body (`202 Accepted`), one follow-up `GET` reads the current
//! state; there is no polling for readiness.
//!
//! Static website hosting and blob uploads are data-plane operations. They are
//! authorised with short-lived SAS tokens obtained from the control plane, so
//! the only credential the provider needs is the management bearer token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::{
    CreateRequest, Provider, ProviderError, ProviderResult, ServiceSasRequest, StorageAccountKey,
};
use crate::engine::{ResourceState, ResourceType};
use crate::secrets::{SecretRegistry, SensitiveString};

/// Default Azure Resource Manager endpoint
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Default blob endpoint template; `{account}` is replaced by the account name
pub const DEFAULT_BLOB_ENDPOINT: &str = "https://{account}.blob.core.windows.net";

const RESOURCES_API_VERSION: &str = "2021-04-01";
const STORAGE_API_VERSION: &str = "2021-02-01";
const WEB_API_VERSION: &str = "2020-12-01";
const BLOB_SERVICE_VERSION: &str = "2019-12-12";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Lifetime of the SAS tokens used for data-plane writes
const UPLOAD_SAS_LIFETIME_MINUTES: i64 = 60;

/// Configuration for the ARM provider
#[derive(Debug, Clone)]
pub struct ArmConfig {
    /// Target subscription
    pub subscription_id: String,
    /// Location used when a resource does not carry one
    pub location: String,
    /// Management endpoint
    pub management_endpoint: String,
    /// Blob endpoint template
    pub blob_endpoint: String,
    /// Bearer token for the management endpoint
    pub access_token: Option<SensitiveString>,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            subscription_id: String::new(),
            location: "westeurope".to_string(),
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            blob_endpoint: DEFAULT_BLOB_ENDPOINT.to_string(),
            access_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("azstack/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    error: ArmErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    code: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListKeysResponse {
    #[serde(default)]
    keys: Vec<StorageAccountKey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceSasResponse {
    service_sas_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountSasResponse {
    account_sas_token: String,
}

/// Azure Resource Manager REST client
pub struct ArmProvider {
    client: Client,
    config: ArmConfig,
    base: Url,
    authorization: HeaderValue,
    secrets: Arc<SecretRegistry>,
}

impl std::fmt::Debug for ArmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmProvider")
            .field("subscription_id", &self.config.subscription_id)
            .field("endpoint", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl ArmProvider {
    /// Create a provider. Fails without a subscription or a bearer token.
    pub fn new(config: ArmConfig) -> ProviderResult<Self> {
        if config.subscription_id.is_empty() {
            return Err(ProviderError::Unauthenticated(
                "no Azure subscription configured (set AZSTACK_SUBSCRIPTION_ID)".to_string(),
            ));
        }

        let token = config.access_token.as_ref().ok_or_else(|| {
            ProviderError::Unauthenticated(
                "no Azure access token configured (set AZSTACK_ACCESS_TOKEN)".to_string(),
            )
        })?;

        // Management requests only; data-plane calls carry a SAS instead.
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
            .map_err(|_| ProviderError::Unauthenticated("access token is not a valid header value".into()))?;
        authorization.set_sensitive(true);

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let base = Url::parse(&config.management_endpoint).map_err(|e| {
            ProviderError::invalid_request(format!(
                "invalid management endpoint '{}': {}",
                config.management_endpoint, e
            ))
        })?;

        Ok(Self {
            client,
            config,
            base,
            authorization,
            secrets: Arc::new(SecretRegistry::new()),
        })
    }

    fn resource_group_path(&self, resource_group: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.config.subscription_id, resource_group
        )
    }

    fn storage_account_path(&self, resource_group: &str, account: &str) -> String {
        format!(
            "{}/providers/Microsoft.Storage/storageAccounts/{}",
            self.resource_group_path(resource_group),
            account
        )
    }

    fn management_url(&self, path: &str, api_version: &str) -> ProviderResult<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| ProviderError::invalid_request(format!("invalid resource path '{}': {}", path, e)))?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    fn blob_endpoint(&self, account: &str) -> String {
        self.config
            .blob_endpoint
            .replace("{account}", account)
            .trim_end_matches('/')
            .to_string()
    }

    /// `<endpoint>/<container>/<blob>` with each segment percent-encoded.
    fn blob_url(&self, account: &str, container: &str, blob: &str) -> ProviderResult<Url> {
        let endpoint = self.blob_endpoint(account);
        let mut url = Url::parse(&endpoint).map_err(|e| {
            ProviderError::invalid_request(format!("invalid blob endpoint '{}': {}", endpoint, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::invalid_request(format!("blob endpoint '{}' cannot hold a path", endpoint)))?
            .pop_if_empty()
            .push(container)
            .push(blob);
        Ok(url)
    }

    /// Keeps a fetched credential out of every later log line or message.
    fn remember(&self, secret: SensitiveString) -> SensitiveString {
        self.secrets.register(secret.expose());
        secret
    }

    async fn send(&self, method: Method, path: &str, api_version: &str, body: Option<&Value>) -> ProviderResult<Value> {
        let url = self.management_url(path, api_version)?;
        debug!(method = %method, url = %url, "ARM request");

        let mut request = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, self.authorization.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        Self::read_body(response).await
    }

    async fn read_body(response: Response) -> ProviderResult<Value> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Self::error_from(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    fn error_from(status: StatusCode, text: &str) -> ProviderError {
        let (code, message) = match serde_json::from_str::<ArmErrorBody>(text) {
            Ok(body) => (body.error.code, body.error.message),
            Err(_) if !text.trim().is_empty() => (None, text.trim().to_string()),
            Err(_) => (None, status.to_string()),
        };

        warn!(status = status.as_u16(), code = ?code, "ARM request failed");

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthenticated(message),
            StatusCode::NOT_FOUND => ProviderError::NotFound(message),
            StatusCode::CONFLICT => ProviderError::Conflict(message),
            _ => ProviderError::api(Some(status.as_u16()), code, message),
        }
    }

    /// `PUT` a resource, falling back to one `GET` when Azure returns no body.
    async fn put_resource(&self, path: &str, api_version: &str, body: Value) -> ProviderResult<ResourceState> {
        let mut response = self.send(Method::PUT, path, api_version, Some(&body)).await?;
        if response.is_null() {
            debug!(path = path, "Empty PUT response, reading resource");
            response = self.send(Method::GET, path, api_version, None).await?;
        }
        Self::state_from(response)
    }

    fn state_from(body: Value) -> ProviderResult<ResourceState> {
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::InvalidResponse("resource body has no 'id'".to_string()))?
            .to_string();

        let mut outputs: Map<String, Value> = body
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        for key in ["name", "location", "kind"] {
            if let Some(value) = body.get(key) {
                outputs.insert(key.to_string(), value.clone());
            }
        }

        Ok(ResourceState { id, outputs })
    }

    fn location(&self, request: &CreateRequest) -> Value {
        request
            .properties
            .get("location")
            .cloned()
            .unwrap_or_else(|| Value::String(self.config.location.clone()))
    }

    async fn create_resource_group(&self, request: &CreateRequest) -> ProviderResult<ResourceState> {
        let path = self.resource_group_path(&request.name);
        self.put_resource(&path, RESOURCES_API_VERSION, json!({ "location": self.location(request) }))
            .await
    }

    async fn create_storage_account(&self, request: &CreateRequest) -> ProviderResult<ResourceState> {
        let rg = request.property_str("resourceGroupName")?;
        let path = self.storage_account_path(rg, &request.name);
        let body = json!({
            "location": self.location(request),
            "sku": request.properties.get("sku").cloned().unwrap_or(Value::Null),
            "kind": request.properties.get("kind").cloned().unwrap_or(Value::Null),
        });
        self.put_resource(&path, STORAGE_API_VERSION, body).await
    }

    async fn create_blob_container(&self, request: &CreateRequest) -> ProviderResult<ResourceState> {
        let rg = request.property_str("resourceGroupName")?;
        let account = request.property_str("accountName")?;
        let path = format!(
            "{}/blobServices/default/containers/{}",
            self.storage_account_path(rg, account),
            request.name
        );
        let body = json!({
            "properties": {
                "publicAccess": request.properties.get("publicAccess").cloned().unwrap_or(json!("None")),
            }
        });
        self.put_resource(&path, STORAGE_API_VERSION, body).await
    }

    async fn create_app_service_plan(&self, request: &CreateRequest) -> ProviderResult<ResourceState> {
        let rg = request.property_str("resourceGroupName")?;
        let path = format!(
            "{}/providers/Microsoft.Web/serverfarms/{}",
            self.resource_group_path(rg),
            request.name
        );
        let body = json!({
            "location": self.location(request),
            "kind": request.properties.get("kind").cloned().unwrap_or(Value::Null),
            "sku": request.properties.get("sku").cloned().unwrap_or(Value::Null),
            "properties": {
                "reserved": request.properties.get("reserved").cloned().unwrap_or(json!(false)),
            },
        });
        self.put_resource(&path, WEB_API_VERSION, body).await
    }

    async fn create_web_app(&self, request: &CreateRequest) -> ProviderResult<ResourceState> {
        let rg = request.property_str("resourceGroupName")?;
        let path = format!(
            "{}/providers/Microsoft.Web/sites/{}",
            self.resource_group_path(rg),
            request.name
        );
        let body = json!({
            "location": self.location(request),
            "kind": request.properties.get("kind").cloned().unwrap_or(Value::Null),
            "properties": {
                "serverFarmId": request.property_str("serverFarmId")?,
                "siteConfig": request.properties.get("siteConfig").cloned().unwrap_or(json!({})),
            },
        });
        self.put_resource(&path, WEB_API_VERSION, body).await
    }

    async fn account_sas(&self, resource_group: &str, account: &str) -> ProviderResult<SensitiveString> {
        let path = format!("{}/ListAccountSas", self.storage_account_path(resource_group, account));
        let body = json!({
            "signedServices": "b",
            "signedResourceTypes": "s",
            "signedPermission": "rw",
            "signedProtocol": "https",
            "signedExpiry": upload_sas_expiry(),
        });
        let response = self.send(Method::POST, &path, STORAGE_API_VERSION, Some(&body)).await?;
        let sas: AccountSasResponse =
            serde_json::from_value(response).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(self.remember(SensitiveString::new(sas.account_sas_token)))
    }

    async fn enable_static_website(&self, request: &CreateRequest) -> ProviderResult<ResourceState> {
        let rg = request.property_str("resourceGroupName")?;
        let account = request.property_str("accountName")?;
        let index = request.property_str("indexDocument")?;
        let error404 = request.property_str("error404Document")?;

        let sas = self.account_sas(rg, account).await?;
        let url = format!(
            "{}/?restype=service&comp=properties&{}",
            self.blob_endpoint(account),
            sas.expose()
        );
        let body = static_website_properties(index, error404);

        let response = self
            .client
            .put(url)
            .header("x-ms-version", BLOB_SERVICE_VERSION)
            .header(CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await?;
        Self::read_data_plane(response).await?;

        Ok(
            ResourceState::new(format!("{}/staticWebsite", self.storage_account_path(rg, account)))
                .with_output("containerName", "$web")
                .with_output("indexDocument", index)
                .with_output("error404Document", error404),
        )
    }

    async fn upload_blob(&self, request: &CreateRequest) -> ProviderResult<ResourceState> {
        let rg = request.property_str("resourceGroupName")?;
        let account = request.property_str("accountName")?;
        let container = request.property_str("containerName")?;
        let content_type = request
            .properties
            .get("contentType")
            .and_then(Value::as_str)
            .unwrap_or("application/octet-stream");

        let sas = self
            .list_service_sas(&ServiceSasRequest {
                resource_group_name: rg.to_string(),
                account_name: account.to_string(),
                canonicalized_resource: format!("/blob/{}/{}", account, container),
                resource: "c".to_string(),
                permissions: "cw".to_string(),
                protocols: "https".to_string(),
                shared_access_start_time: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                shared_access_expiry_time: upload_sas_expiry(),
                content_type: None,
                cache_control: None,
                content_disposition: None,
                content_encoding: None,
            })
            .await?;

        let blob_url = self.blob_url(account, container, &request.name)?;
        let content = request.content.clone().unwrap_or_default();
        debug!(url = %blob_url, bytes = content.len(), "Uploading blob");

        let mut signed_url = blob_url.clone();
        signed_url.set_query(Some(sas.expose()));
        let response = self
            .client
            .put(signed_url)
            .header("x-ms-version", BLOB_SERVICE_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, content_type)
            .body(content)
            .send()
            .await?;
        Self::read_data_plane(response).await?;

        Ok(ResourceState::new(blob_url.as_str())
            .with_output("name", request.name.as_str())
            .with_output("url", blob_url.as_str())
            .with_output("contentType", content_type))
    }

    /// Storage data-plane errors are XML; the message is passed through as text.
    async fn read_data_plane(response: Response) -> ProviderResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await?;
        let message = extract_xml_message(&text).unwrap_or_else(|| status.to_string());
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthenticated(message),
            StatusCode::NOT_FOUND => ProviderError::NotFound(message),
            StatusCode::CONFLICT => ProviderError::Conflict(message),
            _ => ProviderError::api(Some(status.as_u16()), None, message),
        })
    }
}

fn upload_sas_expiry() -> String {
    (Utc::now() + chrono::Duration::minutes(UPLOAD_SAS_LIFETIME_MINUTES))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// The `<Message>` text of a storage error document.
fn extract_xml_message(text: &str) -> Option<String> {
    let mut reader = Reader::from_str(text);
    let mut in_message = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) => in_message = tag.name().as_ref() == b"Message",
            Ok(Event::Text(body)) if in_message => {
                let message = body.unescape().ok()?.trim().to_string();
                return (!message.is_empty()).then_some(message);
            }
            Ok(Event::End(_)) => in_message = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// The blob service properties body enabling static website hosting.
fn static_website_properties(index: &str, error404: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><StorageServiceProperties><StaticWebsite>\
         <Enabled>true</Enabled><IndexDocument>{}</IndexDocument>\
         <ErrorDocument404Path>{}</ErrorDocument404Path></StaticWebsite></StorageServiceProperties>",
        escape(index),
        escape(error404)
    )
}

#[async_trait]
impl Provider for ArmProvider {
    fn name(&self) -> &'static str {
        "azure-arm"
    }

    async fn create_resource(&self, request: CreateRequest) -> ProviderResult<ResourceState> {
        info!(resource_type = %request.resource_type, name = %request.name, "Creating");

        match request.resource_type {
            ResourceType::ResourceGroup => self.create_resource_group(&request).await,
            ResourceType::StorageAccount => self.create_storage_account(&request).await,
            ResourceType::StorageAccountStaticWebsite => self.enable_static_website(&request).await,
            ResourceType::BlobContainer => self.create_blob_container(&request).await,
            ResourceType::Blob => self.upload_blob(&request).await,
            ResourceType::AppServicePlan => self.create_app_service_plan(&request).await,
            ResourceType::WebApp => self.create_web_app(&request).await,
        }
    }

    async fn list_storage_account_keys(
        &self,
        resource_group_name: &str,
        account_name: &str,
    ) -> ProviderResult<Vec<StorageAccountKey>> {
        let path = format!(
            "{}/listKeys",
            self.storage_account_path(resource_group_name, account_name)
        );
        let response = self.send(Method::POST, &path, STORAGE_API_VERSION, None).await?;
        let keys: ListKeysResponse =
            serde_json::from_value(response).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        for key in &keys.keys {
            self.secrets.register(key.value.expose());
        }
        Ok(keys.keys)
    }

    fn secrets(&self) -> Option<Arc<SecretRegistry>> {
        Some(Arc::clone(&self.secrets))
    }

    async fn list_service_sas(&self, request: &ServiceSasRequest) -> ProviderResult<SensitiveString> {
        let path = format!(
            "{}/ListServiceSas",
            self.storage_account_path(&request.resource_group_name, &request.account_name)
        );
        let body = serde_json::to_value(request).map_err(|e| ProviderError::invalid_request(e.to_string()))?;
        let response = self.send(Method::POST, &path, STORAGE_API_VERSION, Some(&body)).await?;
        let sas: ServiceSasResponse =
            serde_json::from_value(response).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(self.remember(SensitiveString::new(sas.service_sas_token)))
    }
}

//! Azure resource declarations.
//!
//! Each resource is an argument record plus a handle. Constructing a handle
//! registers the resource with the [`Deployment`]; the handle's fields are
//! outputs that resolve once the provider has created it. Inputs taken from
//! another resource's outputs become dependency edges.

use std::collections::BTreeSet;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::asset::AssetOrArchive;
use crate::engine::{
    union_dependencies, Deployment, Input, Output, RegisteredResource, ResolvedArgs, ResourceArgs,
    ResourceType, Urn,
};
use crate::error::{Error, Result};

async fn resolve_optional(input: Option<Input<String>>) -> Result<Option<String>> {
    match input {
        Some(input) => Ok(Some(input.resolve().await?)),
        None => Ok(None),
    }
}

fn optional_dependencies(input: &Option<Input<String>>) -> BTreeSet<Urn> {
    input
        .as_ref()
        .map(|i| i.dependencies().clone())
        .unwrap_or_default()
}

fn insert_optional(properties: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        properties.insert(key.to_string(), Value::String(value));
    }
}

// ============================================================================
// Resource Group
// ============================================================================

/// Arguments for a resource group.
#[derive(Debug, Clone, Default)]
pub struct ResourceGroupArgs {
    /// Physical name; the logical name when unset
    pub resource_group_name: Option<Input<String>>,
    /// Azure region; the provider default when unset
    pub location: Option<Input<String>>,
}

impl ResourceArgs for ResourceGroupArgs {
    const RESOURCE_TYPE: ResourceType = ResourceType::ResourceGroup;

    fn dependencies(&self) -> BTreeSet<Urn> {
        union_dependencies([
            &optional_dependencies(&self.resource_group_name),
            &optional_dependencies(&self.location),
        ])
    }

    fn resolve(self) -> BoxFuture<'static, Result<ResolvedArgs>> {
        Box::pin(async move {
            let name = resolve_optional(self.resource_group_name).await?;
            let mut properties = Map::new();
            insert_optional(&mut properties, "location", resolve_optional(self.location).await?);
            Ok(ResolvedArgs {
                name,
                properties,
                content: None,
            })
        })
    }
}

/// A declared resource group.
#[derive(Debug, Clone)]
pub struct ResourceGroup {
    /// Registration handle
    pub resource: RegisteredResource,
    /// Physical name
    pub name: Output<String>,
    /// ARM id
    pub id: Output<String>,
}

impl ResourceGroup {
    /// Declares a resource group.
    pub fn new(deployment: &Deployment, name: &str, args: ResourceGroupArgs) -> Result<Self> {
        let resource = deployment.register(name, args)?;
        Ok(Self {
            name: resource.output_str("name"),
            id: resource.id(),
            resource,
        })
    }
}

// ============================================================================
// Storage Account
// ============================================================================

/// Storage SKU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkuName {
    /// Locally redundant storage
    #[default]
    #[serde(rename = "Standard_LRS")]
    StandardLrs,
    /// Geo-redundant storage
    #[serde(rename = "Standard_GRS")]
    StandardGrs,
}

impl SkuName {
    /// ARM value
    pub fn as_str(&self) -> &'static str {
        match self {
            SkuName::StandardLrs => "Standard_LRS",
            SkuName::StandardGrs => "Standard_GRS",
        }
    }
}

/// Storage account kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    /// General purpose v2
    #[default]
    StorageV2,
    /// Blob storage only
    BlobStorage,
}

impl Kind {
    /// ARM value
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::StorageV2 => "StorageV2",
            Kind::BlobStorage => "BlobStorage",
        }
    }
}

/// Arguments for a storage account.
#[derive(Debug, Clone)]
pub struct StorageAccountArgs {
    /// Parent resource group
    pub resource_group_name: Input<String>,
    /// Physical name; the logical name when unset
    pub account_name: Option<Input<String>>,
    /// Azure region
    pub location: Option<Input<String>>,
    /// SKU
    pub sku: SkuName,
    /// Kind
    pub kind: Kind,
}

impl StorageAccountArgs {
    /// `Standard_LRS` / `StorageV2` account in a resource group.
    pub fn new(resource_group_name: impl Into<Input<String>>) -> Self {
        Self {
            resource_group_name: resource_group_name.into(),
            account_name: None,
            location: None,
            sku: SkuName::default(),
            kind: Kind::default(),
        }
    }

    /// Set the physical account name.
    pub fn account_name(mut self, name: impl Into<Input<String>>) -> Self {
        self.account_name = Some(name.into());
        self
    }
}

impl ResourceArgs for StorageAccountArgs {
    const RESOURCE_TYPE: ResourceType = ResourceType::StorageAccount;

    fn dependencies(&self) -> BTreeSet<Urn> {
        union_dependencies([
            self.resource_group_name.dependencies(),
            &optional_dependencies(&self.account_name),
            &optional_dependencies(&self.location),
        ])
    }

    fn resolve(self) -> BoxFuture<'static, Result<ResolvedArgs>> {
        Box::pin(async move {
            let mut properties = Map::new();
            properties.insert(
                "resourceGroupName".into(),
                self.resource_group_name.resolve().await?.into(),
            );
            insert_optional(&mut properties, "location", resolve_optional(self.location).await?);
            properties.insert("sku".into(), json!({ "name": self.sku.as_str() }));
            properties.insert("kind".into(), self.kind.as_str().into());

            Ok(ResolvedArgs {
                name: resolve_optional(self.account_name).await?,
                properties,
                content: None,
            })
        })
    }
}

/// Service endpoints of a storage account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryEndpoints {
    /// Static website endpoint
    pub web: String,
    /// Blob endpoint
    pub blob: String,
}

/// A declared storage account.
#[derive(Debug, Clone)]
pub struct StorageAccount {
    /// Registration handle
    pub resource: RegisteredResource,
    /// Physical name
    pub name: Output<String>,
    /// ARM id
    pub id: Output<String>,
    /// Service endpoints
    pub primary_endpoints: Output<PrimaryEndpoints>,
}

impl StorageAccount {
    /// Declares a storage account.
    pub fn new(deployment: &Deployment, name: &str, args: StorageAccountArgs) -> Result<Self> {
        let resource = deployment.register(name, args)?;
        let urn = resource.urn.clone();
        let primary_endpoints = resource.state.try_apply(move |state| {
            let value = state
                .get("primaryEndpoints")
                .cloned()
                .ok_or_else(|| Error::missing_output(urn.as_str(), "primaryEndpoints"))?;
            Ok(serde_json::from_value(value)?)
        });

        Ok(Self {
            name: resource.output_str("name"),
            id: resource.id(),
            primary_endpoints,
            resource,
        })
    }
}

// ============================================================================
// Static Website
// ============================================================================

/// Arguments for static website hosting on a storage account.
#[derive(Debug, Clone)]
pub struct StorageAccountStaticWebsiteArgs {
    /// Parent resource group
    pub resource_group_name: Input<String>,
    /// Storage account
    pub account_name: Input<String>,
    /// Default document
    pub index_document: Input<String>,
    /// Document served for missing paths
    pub error404_document: Input<String>,
}

impl ResourceArgs for StorageAccountStaticWebsiteArgs {
    const RESOURCE_TYPE: ResourceType = ResourceType::StorageAccountStaticWebsite;

    fn dependencies(&self) -> BTreeSet<Urn> {
        union_dependencies([
            self.resource_group_name.dependencies(),
            self.account_name.dependencies(),
            self.index_document.dependencies(),
            self.error404_document.dependencies(),
        ])
    }

    fn resolve(self) -> BoxFuture<'static, Result<ResolvedArgs>> {
        Box::pin(async move {
            let mut properties = Map::new();
            properties.insert(
                "resourceGroupName".into(),
                self.resource_group_name.resolve().await?.into(),
            );
            properties.insert("accountName".into(), self.account_name.resolve().await?.into());
            properties.insert("indexDocument".into(), self.index_document.resolve().await?.into());
            properties.insert(
                "error404Document".into(),
                self.error404_document.resolve().await?.into(),
            );

            Ok(ResolvedArgs {
                name: None,
                properties,
                content: None,
            })
        })
    }
}

/// Declared static website hosting.
#[derive(Debug, Clone)]
pub struct StorageAccountStaticWebsite {
    /// Registration handle
    pub resource: RegisteredResource,
    /// ARM id
    pub id: Output<String>,
    /// Container that serves the site (`$web`)
    pub container_name: Output<String>,
}

impl StorageAccountStaticWebsite {
    /// Enables static website hosting.
    pub fn new(deployment: &Deployment, name: &str, args: StorageAccountStaticWebsiteArgs) -> Result<Self> {
        let resource = deployment.register(name, args)?;
        Ok(Self {
            id: resource.id(),
            container_name: resource.output_str("containerName"),
            resource,
        })
    }
}

// ============================================================================
// Blob Container
// ============================================================================

/// Anonymous access level of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicAccess {
    /// Private
    #[default]
    None,
    /// Anonymous blob reads
    Blob,
    /// Anonymous container listing and reads
    Container,
}

impl PublicAccess {
    /// ARM value
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicAccess::None => "None",
            PublicAccess::Blob => "Blob",
            PublicAccess::Container => "Container",
        }
    }
}

/// Arguments for a blob container.
#[derive(Debug, Clone)]
pub struct BlobContainerArgs {
    /// Parent resource group
    pub resource_group_name: Input<String>,
    /// Storage account
    pub account_name: Input<String>,
    /// Physical name; the logical name when unset
    pub container_name: Option<Input<String>>,
    /// Access level
    pub public_access: PublicAccess,
}

impl ResourceArgs for BlobContainerArgs {
    const RESOURCE_TYPE: ResourceType = ResourceType::BlobContainer;

    fn dependencies(&self) -> BTreeSet<Urn> {
        union_dependencies([
            self.resource_group_name.dependencies(),
            self.account_name.dependencies(),
            &optional_dependencies(&self.container_name),
        ])
    }

    fn resolve(self) -> BoxFuture<'static, Result<ResolvedArgs>> {
        Box::pin(async move {
            let mut properties = Map::new();
            properties.insert(
                "resourceGroupName".into(),
                self.resource_group_name.resolve().await?.into(),
            );
            properties.insert("accountName".into(), self.account_name.resolve().await?.into());
            properties.insert("publicAccess".into(), self.public_access.as_str().into());

            Ok(ResolvedArgs {
                name: resolve_optional(self.container_name).await?,
                properties,
                content: None,
            })
        })
    }
}

/// A declared blob container.
#[derive(Debug, Clone)]
pub struct BlobContainer {
    /// Registration handle
    pub resource: RegisteredResource,
    /// Physical name
    pub name: Output<String>,
    /// ARM id
    pub id: Output<String>,
}

impl BlobContainer {
    /// Declares a blob container.
    pub fn new(deployment: &Deployment, name: &str, args: BlobContainerArgs) -> Result<Self> {
        let resource = deployment.register(name, args)?;
        Ok(Self {
            name: resource.output_str("name"),
            id: resource.id(),
            resource,
        })
    }
}

// ============================================================================
// Blob
// ============================================================================

/// Blob type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobType {
    /// Block blob
    #[default]
    Block,
    /// Append blob
    Append,
}

impl BlobType {
    /// ARM value
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobType::Block => "Block",
            BlobType::Append => "Append",
        }
    }
}

/// Arguments for a blob.
#[derive(Debug, Clone)]
pub struct BlobArgs {
    /// Parent resource group
    pub resource_group_name: Input<String>,
    /// Storage account
    pub account_name: Input<String>,
    /// Container the blob is written to
    pub container_name: Input<String>,
    /// Physical name; the logical name when unset
    pub blob_name: Option<Input<String>>,
    /// Blob type
    pub blob_type: BlobType,
    /// Content-Type header stored with the blob
    pub content_type: Option<Input<String>>,
    /// Content
    pub source: AssetOrArchive,
}

impl ResourceArgs for BlobArgs {
    const RESOURCE_TYPE: ResourceType = ResourceType::Blob;

    fn dependencies(&self) -> BTreeSet<Urn> {
        union_dependencies([
            self.resource_group_name.dependencies(),
            self.account_name.dependencies(),
            self.container_name.dependencies(),
            &optional_dependencies(&self.blob_name),
            &optional_dependencies(&self.content_type),
        ])
    }

    fn resolve(self) -> BoxFuture<'static, Result<ResolvedArgs>> {
        Box::pin(async move {
            let mut properties = Map::new();
            properties.insert(
                "resourceGroupName".into(),
                self.resource_group_name.resolve().await?.into(),
            );
            properties.insert("accountName".into(), self.account_name.resolve().await?.into());
            properties.insert("containerName".into(), self.container_name.resolve().await?.into());
            properties.insert("type".into(), self.blob_type.as_str().into());
            insert_optional(
                &mut properties,
                "contentType",
                resolve_optional(self.content_type).await?,
            );

            let source = self.source;
            let content = tokio::task::spawn_blocking(move || source.read())
                .await
                .map_err(|e| Error::Internal(format!("asset reader failed: {}", e)))??;

            Ok(ResolvedArgs {
                name: resolve_optional(self.blob_name).await?,
                properties,
                content: Some(content),
            })
        })
    }
}

/// A declared blob.
#[derive(Debug, Clone)]
pub struct Blob {
    /// Registration handle
    pub resource: RegisteredResource,
    /// Physical name
    pub name: Output<String>,
    /// Resource id
    pub id: Output<String>,
    /// Blob URL, without any token
    pub url: Output<String>,
}

impl Blob {
    /// Declares a blob. The source must exist when declared.
    pub fn new(deployment: &Deployment, name: &str, args: BlobArgs) -> Result<Self> {
        args.source.ensure_exists()?;
        let resource = deployment.register(name, args)?;
        Ok(Self {
            name: resource.output_str("name"),
            id: resource.id(),
            url: resource.output_str("url"),
            resource,
        })
    }
}

// ============================================================================
// App Service Plan
// ============================================================================

/// Plan SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuDescription {
    /// Tier (`Dynamic`)
    pub tier: String,
    /// Name (`Y1`)
    pub name: String,
}

impl SkuDescription {
    /// The Linux consumption SKU.
    pub fn consumption() -> Self {
        Self {
            tier: "Dynamic".to_string(),
            name: "Y1".to_string(),
        }
    }
}

/// Arguments for an app service plan.
#[derive(Debug, Clone)]
pub struct AppServicePlanArgs {
    /// Parent resource group
    pub resource_group_name: Input<String>,
    /// Physical name; the logical name when unset
    pub name: Option<Input<String>>,
    /// Azure region
    pub location: Option<Input<String>>,
    /// Plan kind
    pub kind: String,
    /// SKU
    pub sku: SkuDescription,
    /// Required for Linux plans
    pub reserved: bool,
}

impl AppServicePlanArgs {
    /// A Linux consumption plan (`Dynamic`/`Y1`, reserved).
    pub fn linux_consumption(resource_group_name: impl Into<Input<String>>) -> Self {
        Self {
            resource_group_name: resource_group_name.into(),
            name: None,
            location: None,
            kind: "Linux".to_string(),
            sku: SkuDescription::consumption(),
            reserved: true,
        }
    }

    /// Set the physical plan name.
    pub fn name(mut self, name: impl Into<Input<String>>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl ResourceArgs for AppServicePlanArgs {
    const RESOURCE_TYPE: ResourceType = ResourceType::AppServicePlan;

    fn dependencies(&self) -> BTreeSet<Urn> {
        union_dependencies([
            self.resource_group_name.dependencies(),
            &optional_dependencies(&self.name),
            &optional_dependencies(&self.location),
        ])
    }

    fn resolve(self) -> BoxFuture<'static, Result<ResolvedArgs>> {
        Box::pin(async move {
            let mut properties = Map::new();
            properties.insert(
                "resourceGroupName".into(),
                self.resource_group_name.resolve().await?.into(),
            );
            insert_optional(&mut properties, "location", resolve_optional(self.location).await?);
            properties.insert("kind".into(), self.kind.into());
            properties.insert("sku".into(), serde_json::to_value(&self.sku)?);
            properties.insert("reserved".into(), self.reserved.into());

            Ok(ResolvedArgs {
                name: resolve_optional(self.name).await?,
                properties,
                content: None,
            })
        })
    }
}

/// A declared app service plan.
#[derive(Debug, Clone)]
pub struct AppServicePlan {
    /// Registration handle
    pub resource: RegisteredResource,
    /// Physical name
    pub name: Output<String>,
    /// ARM id, used as a web app's server farm id
    pub id: Output<String>,
}

impl AppServicePlan {
    /// Declares an app service plan.
    pub fn new(deployment: &Deployment, name: &str, args: AppServicePlanArgs) -> Result<Self> {
        let resource = deployment.register(name, args)?;
        Ok(Self {
            name: resource.output_str("name"),
            id: resource.id(),
            resource,
        })
    }
}

// ============================================================================
// Web App
// ============================================================================

/// One application setting.
#[derive(Debug, Clone)]
pub struct NameValuePair {
    /// Setting name
    pub name: String,
    /// Setting value
    pub value: Input<String>,
}

impl NameValuePair {
    /// Create a setting.
    pub fn new(name: impl Into<String>, value: impl Into<Input<String>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Site configuration.
#[derive(Debug, Clone, Default)]
pub struct SiteConfig {
    /// Application settings, in order. Duplicates are sent as given.
    pub app_settings: Vec<NameValuePair>,
}

/// Arguments for a web or function app.
#[derive(Debug, Clone)]
pub struct WebAppArgs {
    /// Parent resource group
    pub resource_group_name: Input<String>,
    /// Physical name; the logical name when unset
    pub name: Option<Input<String>>,
    /// Azure region
    pub location: Option<Input<String>>,
    /// App kind (`FunctionApp`)
    pub kind: String,
    /// Hosting plan id
    pub server_farm_id: Input<String>,
    /// Site configuration
    pub site_config: SiteConfig,
}

impl ResourceArgs for WebAppArgs {
    const RESOURCE_TYPE: ResourceType = ResourceType::WebApp;

    fn dependencies(&self) -> BTreeSet<Urn> {
        let mut deps = union_dependencies([
            self.resource_group_name.dependencies(),
            &optional_dependencies(&self.name),
            &optional_dependencies(&self.location),
            self.server_farm_id.dependencies(),
        ]);
        for setting in &self.site_config.app_settings {
            deps.extend(setting.value.dependencies().iter().cloned());
        }
        deps
    }

    fn resolve(self) -> BoxFuture<'static, Result<ResolvedArgs>> {
        Box::pin(async move {
            let mut properties = Map::new();
            properties.insert(
                "resourceGroupName".into(),
                self.resource_group_name.resolve().await?.into(),
            );
            insert_optional(&mut properties, "location", resolve_optional(self.location).await?);
            properties.insert("kind".into(), self.kind.into());
            properties.insert("serverFarmId".into(), self.server_farm_id.resolve().await?.into());

            let mut app_settings = Vec::with_capacity(self.site_config.app_settings.len());
            for setting in self.site_config.app_settings {
                app_settings.push(json!({
                    "name": setting.name,
                    "value": setting.value.resolve().await?,
                }));
            }
            properties.insert("siteConfig".into(), json!({ "appSettings": app_settings }));

            Ok(ResolvedArgs {
                name: resolve_optional(self.name).await?,
                properties,
                content: None,
            })
        })
    }
}

/// A declared web app.
#[derive(Debug, Clone)]
pub struct WebApp {
    /// Registration handle
    pub resource: RegisteredResource,
    /// Physical name
    pub name: Output<String>,
    /// ARM id
    pub id: Output<String>,
    /// `<name>.azurewebsites.net`
    pub default_host_name: Output<String>,
}

impl WebApp {
    /// Declares a web app.
    pub fn new(deployment: &Deployment, name: &str, args: WebAppArgs) -> Result<Self> {
        let resource = deployment.register(name, args)?;
        Ok(Self {
            name: resource.output_str("name"),
            id: resource.id(),
            default_host_name: resource.output_str("defaultHostName"),
            resource,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DeploymentOptions;
    use crate::provider::{InMemoryProvider, ProviderCall};
    use std::sync::Arc;

    fn setup() -> (Arc<InMemoryProvider>, Deployment) {
        let provider = Arc::new(InMemoryProvider::new());
        let deployment = Deployment::new(provider.clone(), DeploymentOptions::new("p", "d"));
        (provider, deployment)
    }

    #[tokio::test]
    async fn test_storage_account_properties() {
        let (provider, deployment) = setup();
        let rg = ResourceGroup::new(&deployment, "p-d-rg", ResourceGroupArgs::default()).unwrap();
        let st = StorageAccount::new(&deployment, "pdst", StorageAccountArgs::new(rg.name.clone())).unwrap();

        assert!(st.resource.state.dependencies().contains(&st.resource.urn));
        deployment.execute().await.unwrap();

        match provider.create_call(&st.resource.urn).unwrap() {
            ProviderCall::Create { properties, name, .. } => {
                assert_eq!(name, "pdst");
                assert_eq!(properties["resourceGroupName"], "p-d-rg");
                assert_eq!(properties["sku"]["name"], "Standard_LRS");
                assert_eq!(properties["kind"], "StorageV2");
            }
            other => panic!("unexpected call {:?}", other),
        }

        let endpoints = st.primary_endpoints.resolve().await.unwrap();
        assert_eq!(endpoints.web, "https://pdst.z6.web.core.windows.net/");
    }

    #[tokio::test]
    async fn test_storage_account_depends_on_group() {
        let (_, deployment) = setup();
        let rg = ResourceGroup::new(&deployment, "p-d-rg", ResourceGroupArgs::default()).unwrap();
        let st = StorageAccount::new(&deployment, "pdst", StorageAccountArgs::new(rg.name.clone())).unwrap();

        assert_eq!(
            deployment.graph().direct_dependencies(&st.resource.urn),
            vec![rg.resource.urn.clone()]
        );
    }

    #[tokio::test]
    async fn test_plan_consumption_sku() {
        let (provider, deployment) = setup();
        let plan = AppServicePlan::new(
            &deployment,
            "p-d-plan",
            AppServicePlanArgs::linux_consumption("p-d-rg").name("p-d-plan"),
        )
        .unwrap();
        deployment.execute().await.unwrap();

        match provider.create_call(&plan.resource.urn).unwrap() {
            ProviderCall::Create { properties, .. } => {
                assert_eq!(properties["kind"], "Linux");
                assert_eq!(properties["sku"], json!({"tier": "Dynamic", "name": "Y1"}));
                assert_eq!(properties["reserved"], true);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_web_app_settings_keep_order_and_duplicates() {
        let (provider, deployment) = setup();
        let app = WebApp::new(
            &deployment,
            "p-d-func",
            WebAppArgs {
                resource_group_name: "p-d-rg".into(),
                name: Some("p-d-func".into()),
                location: None,
                kind: "FunctionApp".into(),
                server_farm_id: "/plan".into(),
                site_config: SiteConfig {
                    app_settings: vec![
                        NameValuePair::new("runtime", "node"),
                        NameValuePair::new("runtime", "dotnet"),
                    ],
                },
            },
        )
        .unwrap();
        deployment.execute().await.unwrap();

        match provider.create_call(&app.resource.urn).unwrap() {
            ProviderCall::Create { properties, .. } => {
                let settings = properties["siteConfig"]["appSettings"].as_array().unwrap();
                assert_eq!(settings.len(), 2);
                assert_eq!(settings[0]["value"], "node");
                assert_eq!(settings[1]["value"], "dotnet");
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(
            app.default_host_name.resolve().await.unwrap(),
            "p-d-func.azurewebsites.net"
        );
    }

    #[test]
    fn test_blob_with_missing_source_is_rejected() {
        let (_, deployment) = setup();
        let err = Blob::new(
            &deployment,
            "funczip",
            BlobArgs {
                resource_group_name: "rg".into(),
                account_name: "st".into(),
                container_name: "zips".into(),
                blob_name: None,
                blob_type: BlobType::Block,
                content_type: None,
                source: AssetOrArchive::file_archive("/no/such/publish"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
        assert!(deployment.resources().is_empty());
    }
}

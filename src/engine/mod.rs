//! Deployment engine
//!
//! A small declarative engine in the spirit of desired-state IaC tools:
//! stacks *declare* resources, the engine *creates* them.
//!
//! ## Model
//!
//! ```text
//!   Stack::declare ──► Deployment::register(type, name, args)
//!                            │
//!                            ├──► DependencyGraph (edges from args' inputs)
//!                            └──► Output<ResourceState>
//!                                    = resolve args → Provider::create_resource
//!
//!   Deployment::execute ──► drive every registered Output concurrently
//! ```
//!
//! Declaration is synchronous and never touches the provider; it only records
//! the resource and the outputs its arguments consume. Creation happens when
//! the outputs are driven. Each resource waits for the inputs it consumes, so
//! a dependent is created only after the identifying values of its parents
//! exist. No other ordering is imposed and independent resources are created
//! concurrently.

pub mod dependencies;
pub mod output;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub use dependencies::{DependencyGraph, ResourceDependency, ResourceNode};
pub use output::{union_dependencies, Input, Output};

use crate::error::{Error, Result};
use crate::provider::{CreateRequest, Provider, ServiceSasRequest, StorageAccountKey};
use crate::secrets::{SecretRegistry, SensitiveString};

/// Range of the random integer appended to names that must not collide.
pub const NAME_SUFFIX_RANGE: std::ops::Range<u32> = 1..1000;

/// Unique identity of a declared resource: `<type token>::<logical name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Urn(String);

impl Urn {
    /// Builds a URN from a type token and a logical name.
    pub fn new(resource_type: &str, name: &str) -> Self {
        Self(format!("{}::{}", resource_type, name))
    }

    /// The type token part.
    pub fn resource_type(&self) -> &str {
        self.0.split_once("::").map_or("", |(t, _)| t)
    }

    /// The logical name part.
    pub fn name(&self) -> &str {
        self.0.split_once("::").map_or(self.0.as_str(), |(_, n)| n)
    }

    /// The full URN string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Azure resource types known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    /// `Microsoft.Resources/resourceGroups`
    ResourceGroup,
    /// `Microsoft.Storage/storageAccounts`
    StorageAccount,
    /// Static website hosting on a storage account
    StorageAccountStaticWebsite,
    /// `Microsoft.Storage/storageAccounts/blobServices/containers`
    BlobContainer,
    /// A blob inside a container
    Blob,
    /// `Microsoft.Web/serverfarms`
    AppServicePlan,
    /// `Microsoft.Web/sites`
    WebApp,
}

impl ResourceType {
    /// The type token used in URNs.
    pub fn token(&self) -> &'static str {
        match self {
            ResourceType::ResourceGroup => "azure-native:resources:ResourceGroup",
            ResourceType::StorageAccount => "azure-native:storage:StorageAccount",
            ResourceType::StorageAccountStaticWebsite => {
                "azure-native:storage:StorageAccountStaticWebsite"
            }
            ResourceType::BlobContainer => "azure-native:storage:BlobContainer",
            ResourceType::Blob => "azure-native:storage:Blob",
            ResourceType::AppServicePlan => "azure-native:web:AppServicePlan",
            ResourceType::WebApp => "azure-native:web:WebApp",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// State reported by the provider after a resource was created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Provider-assigned identifier
    pub id: String,
    /// Output properties
    pub outputs: Map<String, Value>,
}

impl ResourceState {
    /// Create a state with an id and no outputs.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outputs: Map::new(),
        }
    }

    /// Add an output property.
    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    /// Look up a property by dotted path (`primaryEndpoints.web`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.outputs.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Look up a string property by dotted path.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }
}

/// Resource arguments after every input has resolved.
#[derive(Debug, Clone, Default)]
pub struct ResolvedArgs {
    /// Physical name. When absent the logical name is used.
    pub name: Option<String>,
    /// Provider properties
    pub properties: Map<String, Value>,
    /// Uploaded content, for blobs
    pub content: Option<Vec<u8>>,
}

/// Argument records for a declarable resource.
pub trait ResourceArgs: Send + 'static {
    /// The resource type these arguments declare.
    const RESOURCE_TYPE: ResourceType;

    /// Resources whose outputs these arguments consume.
    fn dependencies(&self) -> BTreeSet<Urn>;

    /// Waits for every input and produces the provider properties.
    fn resolve(self) -> BoxFuture<'static, Result<ResolvedArgs>>;
}

/// Handle to a declared resource.
#[derive(Debug, Clone)]
pub struct RegisteredResource {
    /// Resource identity
    pub urn: Urn,
    /// State once created
    pub state: Output<ResourceState>,
}

impl RegisteredResource {
    /// The provider-assigned id.
    pub fn id(&self) -> Output<String> {
        self.state.apply(|s| s.id)
    }

    /// A string output property, failing resolution if the provider did not
    /// report it.
    pub fn output_str(&self, path: &'static str) -> Output<String> {
        let urn = self.urn.clone();
        self.state.try_apply(move |s| {
            s.get_str(path)
                .map(str::to_string)
                .ok_or_else(|| Error::missing_output(urn.as_str(), path))
        })
    }

    /// An optional string output property.
    pub fn optional_str(&self, path: &'static str) -> Output<Option<String>> {
        self.state.apply(move |s| s.get_str(path).map(str::to_string))
    }
}

/// Settings that apply to a whole deployment.
#[derive(Debug, Clone)]
pub struct DeploymentOptions {
    /// Project name, the fixed prefix of every resource name
    pub project: String,
    /// Stack (deployment) identifier
    pub stack: String,
    /// Seed for the name suffix generator; entropy when absent
    pub seed: Option<u64>,
}

impl DeploymentOptions {
    /// Options for a project and stack.
    pub fn new(project: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            stack: stack.into(),
            seed: None,
        }
    }

    /// Use a fixed seed for name suffixes.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

struct DeploymentInner {
    provider: Arc<dyn Provider>,
    options: DeploymentOptions,
    resources: Mutex<IndexMap<Urn, Output<ResourceState>>>,
    graph: Mutex<DependencyGraph>,
    rng: Mutex<StdRng>,
    secrets: Arc<SecretRegistry>,
}

/// A named collection of declared resources bound to one provider.
#[derive(Clone)]
pub struct Deployment {
    inner: Arc<DeploymentInner>,
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployment")
            .field("provider", &self.inner.provider.name())
            .field("project", &self.inner.options.project)
            .field("stack", &self.inner.options.stack)
            .field("resources", &self.inner.resources.lock().len())
            .finish()
    }
}

impl Deployment {
    /// Create a deployment.
    ///
    /// The deployment shares the provider's secret registry when it has one,
    /// so credentials the provider fetches internally are redacted too.
    pub fn new(provider: Arc<dyn Provider>, options: DeploymentOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let secrets = provider.secrets().unwrap_or_default();

        Self {
            inner: Arc::new(DeploymentInner {
                provider,
                options,
                resources: Mutex::new(IndexMap::new()),
                graph: Mutex::new(DependencyGraph::new()),
                rng: Mutex::new(rng),
                secrets,
            }),
        }
    }

    /// The project name.
    pub fn project(&self) -> &str {
        &self.inner.options.project
    }

    /// The stack identifier.
    pub fn stack(&self) -> &str {
        &self.inner.options.stack
    }

    /// The provider resources are created with.
    pub fn provider(&self) -> Arc<dyn Provider> {
        Arc::clone(&self.inner.provider)
    }

    /// Secret values resolved during this deployment.
    pub fn secrets(&self) -> Arc<SecretRegistry> {
        Arc::clone(&self.inner.secrets)
    }

    /// A random integer in [`NAME_SUFFIX_RANGE`].
    pub fn random_suffix(&self) -> u32 {
        self.inner.rng.lock().gen_range(NAME_SUFFIX_RANGE)
    }

    /// Returns true if a resource with this type and logical name exists.
    pub fn is_declared(&self, resource_type: ResourceType, name: &str) -> bool {
        self.inner
            .resources
            .lock()
            .contains_key(&Urn::new(resource_type.token(), name))
    }

    /// Draws suffixes until `make_name` yields a name not yet declared for
    /// `resource_type`.
    ///
    /// Uniqueness is only guaranteed within this deployment. Names already
    /// taken at the provider surface as provider conflicts.
    pub fn unique_name(&self, resource_type: ResourceType, make_name: impl Fn(u32) -> String) -> String {
        const MAX_ATTEMPTS: usize = 32;

        let mut name = make_name(self.random_suffix());
        for _ in 1..MAX_ATTEMPTS {
            if !self.is_declared(resource_type, &name) {
                break;
            }
            debug!(name = %name, "Name suffix already declared, drawing again");
            name = make_name(self.random_suffix());
        }
        name
    }

    /// Declares a resource.
    ///
    /// Fails immediately if the same type and logical name is already declared
    /// or if an input comes from a resource outside this deployment.
    pub fn register<A: ResourceArgs>(&self, name: impl Into<String>, args: A) -> Result<RegisteredResource> {
        let name = name.into();
        let resource_type = A::RESOURCE_TYPE;
        let urn = Urn::new(resource_type.token(), &name);
        let dependencies = args.dependencies();

        let mut resources = self.inner.resources.lock();
        if resources.contains_key(&urn) {
            return Err(Error::DuplicateResource(urn.to_string()));
        }
        self.inner.graph.lock().add_resource(&urn, &dependencies)?;

        debug!(
            urn = %urn,
            dependencies = dependencies.len(),
            "Declared resource"
        );

        let provider = Arc::clone(&self.inner.provider);
        let secrets = Arc::clone(&self.inner.secrets);
        let request_urn = urn.clone();
        let state = Output::from_future([urn.clone()], async move {
            let resolved = args.resolve().await?;
            let request = CreateRequest {
                name: resolved.name.unwrap_or(name),
                urn: request_urn,
                resource_type,
                properties: resolved.properties,
                content: resolved.content,
            };

            debug!(urn = %request.urn, name = %request.name, "Creating resource");
            let urn = request.urn.clone();
            let state = provider.create_resource(request).await.map_err(|e| {
                warn!(urn = %urn, error = %secrets.redact(&e.to_string()), "Resource creation failed");
                Error::from(e)
            })?;
            info!(urn = %urn, id = %state.id, "Created resource");
            Ok(state)
        });

        resources.insert(urn.clone(), state.clone());
        Ok(RegisteredResource { urn, state })
    }

    /// Lists the keys of a storage account once both names are known.
    ///
    /// One provider call per resolution; the result is secret.
    pub fn invoke_list_storage_account_keys(
        &self,
        resource_group_name: &Output<String>,
        account_name: &Output<String>,
    ) -> Output<Vec<StorageAccountKey>> {
        let provider = self.provider();
        let secrets = self.secrets();
        resource_group_name
            .zip(account_name)
            .apply_async(move |(resource_group, account)| async move {
                debug!(account = %account, "Invoking listKeys");
                let keys = provider
                    .list_storage_account_keys(&resource_group, &account)
                    .await?;
                for key in &keys {
                    secrets.register(key.value.expose());
                }
                Ok(keys)
            })
            .as_secret()
    }

    /// Requests a service SAS token once the request is known.
    pub fn invoke_list_service_sas(&self, request: &Output<ServiceSasRequest>) -> Output<SensitiveString> {
        let provider = self.provider();
        let secrets = self.secrets();
        request
            .apply_async(move |request| async move {
                debug!(
                    resource = %request.canonicalized_resource,
                    permissions = %request.permissions,
                    "Invoking ListServiceSas"
                );
                let token = provider.list_service_sas(&request).await?;
                secrets.register(token.expose());
                Ok(token)
            })
            .as_secret()
    }

    /// Snapshot of the dependency graph.
    pub fn graph(&self) -> DependencyGraph {
        self.inner.graph.lock().clone()
    }

    /// URNs of every declared resource, in declaration order.
    pub fn resources(&self) -> Vec<Urn> {
        self.inner.resources.lock().keys().cloned().collect()
    }

    /// Creates every declared resource.
    ///
    /// The first failure aborts the run and is returned unchanged. Resources
    /// already created stay created; recovering is left to a re-run.
    pub async fn execute(&self) -> Result<DeploymentSummary> {
        let graph = self.graph();
        graph.execution_order()?;

        let resources: Vec<(Urn, Output<ResourceState>)> = self
            .inner
            .resources
            .lock()
            .iter()
            .map(|(urn, state)| (urn.clone(), state.clone()))
            .collect();

        info!(
            provider = self.inner.provider.name(),
            project = self.project(),
            stack = self.stack(),
            resources = resources.len(),
            "Deploying stack"
        );

        let created = futures::future::try_join_all(resources.into_iter().map(|(urn, state)| {
            let graph = &graph;
            async move {
                match state.resolve().await {
                    Ok(state) => Ok((urn, state)),
                    Err(e) => {
                        let blocked = graph.dependents(&urn);
                        if !blocked.is_empty() {
                            warn!(urn = %urn, blocked = blocked.len(), "Dependents will not be created");
                        }
                        Err(e)
                    }
                }
            }
        }))
        .await?;

        Ok(DeploymentSummary {
            resources: created.into_iter().collect(),
        })
    }
}

/// Resources created by a successful run.
#[derive(Debug, Clone, Default)]
pub struct DeploymentSummary {
    /// Created resources in declaration order
    pub resources: IndexMap<Urn, ResourceState>,
}

impl DeploymentSummary {
    /// Number of created resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if nothing was created.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

//! Packaged function app.
//!
//! Declares everything needed to run a function app from a zip package kept
//! in blob storage:
//!
//! 1. a storage account `PDstN`, unless one is supplied
//! 2. a private container `zipsN` and the package blob `funczipN`
//! 3. a Linux consumption plan `P-D-planN`, unless one is supplied
//! 4. the function app itself, named after the component
//!
//! `N` is drawn from the deployment's suffix generator for each name.

use tracing::info;

use crate::azure::{
    get_storage_connection_string, signed_blob_read_url, AppServicePlan, AppServicePlanArgs,
    AssetOrArchive, Blob, BlobArgs, BlobContainer, BlobContainerArgs, BlobType, NameValuePair,
    PublicAccess, ResourceGroup, SasWindow, SiteConfig, StorageAccount, StorageAccountArgs, WebApp,
    WebAppArgs,
};
use crate::engine::{Deployment, Output, ResourceType};
use crate::error::Result;
use crate::naming::{package_blob, package_container, NamingStrategy};

/// Settings appended after the caller's own, in this order.
pub const PACKAGE_APP_SETTINGS: [&str; 3] = ["AzureWebJobsStorage", "runtime", "WEBSITE_RUN_FROM_PACKAGE"];

/// Arguments for [`PackageFunctionApp`].
#[derive(Debug, Clone)]
pub struct PackageFunctionAppArgs {
    /// Project name used to build child names
    pub project_name: String,
    /// Group every child is created in
    pub resource_group: ResourceGroup,
    /// Existing account to store the package in
    pub storage_account: Option<StorageAccount>,
    /// Existing plan to host the app on
    pub plan: Option<AppServicePlan>,
    /// Function package
    pub archive: AssetOrArchive,
    /// Caller settings, sent before the package settings
    pub app_settings: Vec<NameValuePair>,
    /// Validity of the package URL
    pub sas_window: SasWindow,
}

impl PackageFunctionAppArgs {
    /// Arguments with a new storage account and plan.
    pub fn new(project_name: impl Into<String>, resource_group: ResourceGroup, archive: AssetOrArchive) -> Self {
        Self {
            project_name: project_name.into(),
            resource_group,
            storage_account: None,
            plan: None,
            archive,
            app_settings: Vec::new(),
            sas_window: SasWindow::default(),
        }
    }
}

/// A function app running from a package blob.
#[derive(Debug, Clone)]
pub struct PackageFunctionApp {
    /// Component name, also the function app's name
    pub name: String,
    /// Account holding the package
    pub storage_account: StorageAccount,
    /// Package container
    pub container: BlobContainer,
    /// Package blob
    pub blob: Blob,
    /// Hosting plan
    pub plan: AppServicePlan,
    /// Signed read URL of the package (secret)
    pub code_blob_url: Output<String>,
    /// The function app
    pub function_app: WebApp,
}

impl PackageFunctionApp {
    /// Declares the component's resources.
    pub fn new(deployment: &Deployment, name: &str, args: PackageFunctionAppArgs) -> Result<Self> {
        let names = NamingStrategy::new(args.project_name.clone(), deployment.stack());
        let resource_group = args.resource_group;
        let rg_name = resource_group.name.clone();

        let storage_account = match args.storage_account {
            Some(account) => account,
            None => {
                let account_name = deployment.unique_name(ResourceType::StorageAccount, |n| {
                    names.suffixed_storage_account(n)
                });
                StorageAccount::new(
                    deployment,
                    &account_name,
                    StorageAccountArgs::new(rg_name.clone()).account_name(account_name.clone()),
                )?
            }
        };

        let container_name = deployment.unique_name(ResourceType::BlobContainer, package_container);
        let container = BlobContainer::new(
            deployment,
            &container_name,
            BlobContainerArgs {
                resource_group_name: rg_name.clone(),
                account_name: storage_account.name.clone(),
                container_name: None,
                public_access: PublicAccess::None,
            },
        )?;

        let blob_name = deployment.unique_name(ResourceType::Blob, package_blob);
        let blob = Blob::new(
            deployment,
            &blob_name,
            BlobArgs {
                resource_group_name: rg_name.clone(),
                account_name: storage_account.name.clone(),
                container_name: container.name.clone(),
                blob_name: None,
                blob_type: BlobType::Block,
                content_type: None,
                source: args.archive,
            },
        )?;

        let code_blob_url = signed_blob_read_url(
            deployment,
            &blob.name,
            &container.name,
            &storage_account.name,
            &rg_name,
            args.sas_window,
        );

        let plan = match args.plan {
            Some(plan) => plan,
            None => {
                let plan_name = deployment.unique_name(ResourceType::AppServicePlan, |n| {
                    names.suffixed_app_service_plan(n)
                });
                AppServicePlan::new(
                    deployment,
                    &plan_name,
                    AppServicePlanArgs::linux_consumption(rg_name.clone()).name(plan_name.clone()),
                )?
            }
        };

        let mut app_settings = args.app_settings;
        app_settings.push(NameValuePair::new(
            PACKAGE_APP_SETTINGS[0],
            get_storage_connection_string(deployment, &rg_name, &storage_account.name),
        ));
        app_settings.push(NameValuePair::new(PACKAGE_APP_SETTINGS[1], "dotnet"));
        app_settings.push(NameValuePair::new(PACKAGE_APP_SETTINGS[2], code_blob_url.clone()));

        let function_app = WebApp::new(
            deployment,
            name,
            WebAppArgs {
                resource_group_name: rg_name,
                name: Some(name.into()),
                location: None,
                kind: "FunctionApp".to_string(),
                server_farm_id: plan.id.clone(),
                site_config: SiteConfig { app_settings },
            },
        )?;

        info!(
            component = name,
            container = %container_name,
            blob = %blob_name,
            "Declared packaged function app"
        );

        Ok(Self {
            name: name.to_string(),
            storage_account,
            container,
            blob,
            plan,
            code_blob_url,
            function_app,
        })
    }
}

//! Function stack.
//!
//! A Linux consumption-plan function app whose code is a zip package in a
//! private container, read through a signed URL.

use std::path::PathBuf;

use super::{Stack, StackOutputs};
use crate::azure::{
    get_storage_connection_string, signed_blob_read_url, AppServicePlan, AppServicePlanArgs,
    AssetOrArchive, Blob, BlobArgs, BlobContainer, BlobContainerArgs, BlobType, NameValuePair,
    PublicAccess, ResourceGroup, ResourceGroupArgs, SasWindow, SiteConfig, StorageAccount,
    StorageAccountArgs, WebApp, WebAppArgs,
};
use crate::engine::Deployment;
use crate::error::Result;
use crate::naming::NamingStrategy;

/// Default package location: the function project's publish directory.
pub const DEFAULT_ARCHIVE: &str = "../PulumiAzureNative.Func/bin/Debug/netcoreapp3.1/publish";

/// Template of the `TestEndpoint` output.
pub const TEST_ENDPOINT_TEMPLATE: &str = "https://{}/api/Hello?name=GlobalAzureTorino";

/// Function stack.
#[derive(Debug, Clone)]
pub struct FunctionStack {
    /// Package directory or `.zip` file
    pub archive: PathBuf,
    /// Validity of the package URL
    pub sas_window: SasWindow,
}

impl Default for FunctionStack {
    fn default() -> Self {
        Self::new(DEFAULT_ARCHIVE)
    }
}

impl FunctionStack {
    /// A stack deploying the package at `archive`.
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            sas_window: SasWindow::default(),
        }
    }

    /// Use a different SAS window.
    pub fn with_sas_window(mut self, window: SasWindow) -> Self {
        self.sas_window = window;
        self
    }
}

impl Stack for FunctionStack {
    fn name(&self) -> &'static str {
        "function"
    }

    fn declare(&self, deployment: &Deployment) -> Result<StackOutputs> {
        let names = NamingStrategy::for_deployment(deployment);

        let rg_name = names.resource_group();
        let resource_group = ResourceGroup::new(
            deployment,
            &rg_name,
            ResourceGroupArgs {
                resource_group_name: Some(rg_name.as_str().into()),
                location: None,
            },
        )?;

        let account_name = names.storage_account();
        let storage_account = StorageAccount::new(
            deployment,
            &account_name,
            StorageAccountArgs::new(resource_group.name.clone()).account_name(account_name.as_str()),
        )?;

        let plan_name = names.app_service_plan();
        let plan = AppServicePlan::new(
            deployment,
            &plan_name,
            AppServicePlanArgs::linux_consumption(resource_group.name.clone()).name(plan_name.as_str()),
        )?;

        let container = BlobContainer::new(
            deployment,
            "zips",
            BlobContainerArgs {
                resource_group_name: resource_group.name.clone(),
                account_name: storage_account.name.clone(),
                container_name: None,
                public_access: PublicAccess::None,
            },
        )?;

        let blob = Blob::new(
            deployment,
            "funczip",
            BlobArgs {
                resource_group_name: resource_group.name.clone(),
                account_name: storage_account.name.clone(),
                container_name: container.name.clone(),
                blob_name: None,
                blob_type: BlobType::Block,
                content_type: None,
                source: AssetOrArchive::file_archive(&self.archive),
            },
        )?;

        let code_blob_url = signed_blob_read_url(
            deployment,
            &blob.name,
            &container.name,
            &storage_account.name,
            &resource_group.name,
            self.sas_window,
        );

        let func_name = names.function_app();
        let function_app = WebApp::new(
            deployment,
            &func_name,
            WebAppArgs {
                resource_group_name: resource_group.name.clone(),
                name: Some(func_name.as_str().into()),
                location: None,
                kind: "FunctionApp".to_string(),
                server_farm_id: plan.id.clone(),
                site_config: SiteConfig {
                    app_settings: vec![
                        NameValuePair::new(
                            "AzureWebJobsStorage",
                            get_storage_connection_string(
                                deployment,
                                &resource_group.name,
                                &storage_account.name,
                            ),
                        ),
                        NameValuePair::new("runtime", "dotnet"),
                        NameValuePair::new("WEBSITE_RUN_FROM_PACKAGE", code_blob_url),
                    ],
                },
            },
        )?;

        let mut outputs = StackOutputs::new();
        outputs.insert(
            "TestEndpoint",
            function_app.default_host_name.format(TEST_ENDPOINT_TEMPLATE),
        );
        outputs.unset("TestEndpoint1");
        Ok(outputs)
    }
}

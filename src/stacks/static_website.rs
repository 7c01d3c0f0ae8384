//! Static website stack.
//!
//! A resource group and a storage account with static website hosting. Every
//! regular file at the top of the content directory becomes a blob in the
//! `$web` container.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Stack, StackOutputs};
use crate::azure::{
    get_storage_account_primary_key, AssetOrArchive, Blob, BlobArgs, BlobType, ResourceGroup,
    ResourceGroupArgs, StorageAccount, StorageAccountArgs, StorageAccountStaticWebsite,
    StorageAccountStaticWebsiteArgs,
};
use crate::engine::Deployment;
use crate::error::{Error, Result};
use crate::naming::NamingStrategy;

/// Default content directory
pub const DEFAULT_CONTENT_DIR: &str = "./wwwroot";

/// Content type given to every uploaded file.
// TODO: derive from the file extension once non-HTML assets are served.
pub const CONTENT_TYPE: &str = "text/html";

/// Static website stack.
#[derive(Debug, Clone)]
pub struct StaticWebsiteStack {
    /// Directory whose files are uploaded
    pub content_dir: PathBuf,
}

impl Default for StaticWebsiteStack {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_DIR)
    }
}

impl StaticWebsiteStack {
    /// A stack serving `content_dir`.
    pub fn new(content_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_dir: content_dir.into(),
        }
    }
}

/// Regular files directly inside `dir`, sorted by file name.
pub fn content_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|source| Error::ContentDirectory {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::ContentDirectory {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

impl Stack for StaticWebsiteStack {
    fn name(&self) -> &'static str {
        "static-website"
    }

    fn declare(&self, deployment: &Deployment) -> Result<StackOutputs> {
        let files = content_files(&self.content_dir)?;
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

        let static_website = StorageAccountStaticWebsite::new(
            deployment,
            &names.static_website(),
            StorageAccountStaticWebsiteArgs {
                resource_group_name: resource_group.name.clone(),
                account_name: storage_account.name.clone(),
                index_document: "index.html".into(),
                error404_document: "404.html".into(),
            },
        )?;

        for path in files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::FileNotFound(path.clone()))?;
            debug!(file = %file_name, "Declaring content blob");

            Blob::new(
                deployment,
                &file_name,
                BlobArgs {
                    resource_group_name: resource_group.name.clone(),
                    account_name: storage_account.name.clone(),
                    container_name: static_website.container_name.clone(),
                    blob_name: None,
                    blob_type: BlobType::Block,
                    content_type: Some(CONTENT_TYPE.into()),
                    source: AssetOrArchive::file_asset(path),
                },
            )?;
        }

        let mut outputs = StackOutputs::new();
        outputs.insert(
            "staticEndpoint",
            storage_account.primary_endpoints.apply(|endpoints| endpoints.web),
        );
        outputs.insert(
            "primaryStorageKey",
            get_storage_account_primary_key(deployment, &resource_group.name, &storage_account.name),
        );
        outputs.unset("cdnEndpoint");
        Ok(outputs)
    }
}

//! Azure resource model.
//!
//! Argument records and handles for the resources the stacks declare, local
//! assets uploaded as blobs, and helpers that derive secrets (account keys,
//! connection strings, signed URLs) from provider invokes.

pub mod asset;
pub mod helpers;
pub mod resources;

pub use asset::AssetOrArchive;
pub use helpers::{
    get_storage_account_primary_key, get_storage_connection_string, signed_blob_read_url, SasWindow,
};
pub use resources::{
    AppServicePlan, AppServicePlanArgs, Blob, BlobArgs, BlobContainer, BlobContainerArgs, BlobType,
    Kind, NameValuePair, PrimaryEndpoints, PublicAccess, ResourceGroup, ResourceGroupArgs,
    SiteConfig, SkuDescription, SkuName, StorageAccount, StorageAccountArgs,
    StorageAccountStaticWebsite, StorageAccountStaticWebsiteArgs, WebApp, WebAppArgs,
};

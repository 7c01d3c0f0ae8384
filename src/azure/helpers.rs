//! Values derived from provider invokes.
//!
//! Each helper waits for its inputs, makes exactly one provider call and
//! formats the result. Results are secret and registered with the
//! deployment's [`SecretRegistry`](crate::secrets::SecretRegistry).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::{Deployment, Output};
use crate::error::{Error, Result};
use crate::provider::{ProviderError, ServiceSasRequest, StorageAccountKey};

/// Validity window of the signed package URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SasWindow {
    /// First valid day
    pub start: NaiveDate,
    /// Expiry day
    pub expiry: NaiveDate,
}

impl Default for SasWindow {
    /// 2021-04-01 to 2030-01-01.
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2021, 4, 1).unwrap_or_default(),
            expiry: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap_or_default(),
        }
    }
}

impl SasWindow {
    /// Create a window; `start` must precede `expiry`.
    pub fn new(start: NaiveDate, expiry: NaiveDate) -> Result<Self> {
        if start >= expiry {
            return Err(Error::invalid_config(
                "sas",
                format!("start {} must be before expiry {}", start, expiry),
            ));
        }
        Ok(Self { start, expiry })
    }

    /// Parse `YYYY-MM-DD` dates.
    pub fn parse(start: &str, expiry: &str) -> Result<Self> {
        let parse = |key: &str, value: &str| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|e| Error::invalid_config(key, format!("'{}': {}", value, e)))
        };
        Self::new(parse("sas.start", start)?, parse("sas.expiry", expiry)?)
    }

    /// Start date as sent to the provider.
    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// Expiry date as sent to the provider.
    pub fn expiry_str(&self) -> String {
        self.expiry.format("%Y-%m-%d").to_string()
    }
}

fn first_key(account_name: &str, keys: Vec<StorageAccountKey>) -> Result<String> {
    keys.into_iter()
        .next()
        .map(|key| key.value.into_inner())
        .ok_or_else(|| {
            Error::from(ProviderError::InvalidResponse(format!(
                "storage account '{}' returned no keys",
                account_name
            )))
        })
}

fn register_secret(deployment: &Deployment, output: Output<String>) -> Output<String> {
    let secrets = deployment.secrets();
    output
        .apply(move |value| {
            secrets.register(value.clone());
            value
        })
        .as_secret()
}

/// The first access key of a storage account.
pub fn get_storage_account_primary_key(
    deployment: &Deployment,
    resource_group_name: &Output<String>,
    account_name: &Output<String>,
) -> Output<String> {
    let keys = deployment.invoke_list_storage_account_keys(resource_group_name, account_name);
    let key = keys
        .zip(account_name)
        .try_apply(|(keys, account)| first_key(&account, keys));
    register_secret(deployment, key)
}

/// `DefaultEndpointsProtocol=https;AccountName=<name>;AccountKey=<key>`
pub fn get_storage_connection_string(
    deployment: &Deployment,
    resource_group_name: &Output<String>,
    account_name: &Output<String>,
) -> Output<String> {
    let keys = deployment.invoke_list_storage_account_keys(resource_group_name, account_name);
    let connection_string = keys.zip(account_name).try_apply(|(keys, account)| {
        let key = first_key(&account, keys)?;
        Ok(format!(
            "DefaultEndpointsProtocol=https;AccountName={};AccountKey={}",
            account, key
        ))
    });
    register_secret(deployment, connection_string)
}

/// The service SAS request for read access to one container.
pub fn blob_read_sas_request(
    resource_group_name: &str,
    account_name: &str,
    container_name: &str,
    window: &SasWindow,
) -> ServiceSasRequest {
    ServiceSasRequest {
        resource_group_name: resource_group_name.to_string(),
        account_name: account_name.to_string(),
        canonicalized_resource: format!("/blob/{}/{}", account_name, container_name),
        resource: "c".to_string(),
        permissions: "r".to_string(),
        protocols: "https".to_string(),
        shared_access_start_time: window.start_str(),
        shared_access_expiry_time: window.expiry_str(),
        content_type: Some("application/json".to_string()),
        cache_control: Some("max-age=5".to_string()),
        content_disposition: Some("inline".to_string()),
        content_encoding: Some("deflate".to_string()),
    }
}

/// A time-boxed, read-only, HTTPS-only URL for a blob:
/// `https://<account>.blob.core.windows.net/<container>/<blob>?<token>`.
pub fn signed_blob_read_url(
    deployment: &Deployment,
    blob_name: &Output<String>,
    container_name: &Output<String>,
    account_name: &Output<String>,
    resource_group_name: &Output<String>,
    window: SasWindow,
) -> Output<String> {
    let names = Output::all([
        blob_name.clone(),
        container_name.clone(),
        account_name.clone(),
        resource_group_name.clone(),
    ]);

    let request = names.apply(move |names| {
        blob_read_sas_request(&names[3], &names[2], &names[1], &window)
    });
    let token = deployment.invoke_list_service_sas(&request);

    let url = names.zip(&token).apply(|(names, token)| {
        format!(
            "https://{}.blob.core.windows.net/{}/{}?{}",
            names[2],
            names[1],
            names[0],
            token.expose()
        )
    });
    register_secret(deployment, url)
}

//! ARM provider tests against a mock Resource Manager.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use azstack::engine::{Deployment, DeploymentOptions, ResourceType, Urn};
use azstack::provider::{ArmConfig, ArmProvider, CreateRequest, Provider, ProviderError};
use azstack::secrets::SensitiveString;
use azstack::stacks::{deploy, OutputValue, StaticWebsiteStack};

const SUB: &str = "00000000-1111-2222-3333-444444444444";
const TOKEN: &str = "test-bearer-token";

/// Nothing listens here, so every data-plane request fails to connect.
const UNREACHABLE_BLOB_ENDPOINT: &str = "http://127.0.0.1:1/{account}";

const UPLOAD_SAS: &str = "sv=2019-12-12&sr=c&sp=cw&sig=uploadsecret";
const ACCOUNT_SAS: &str = "sv=2019-12-12&ss=b&srt=s&sp=rw&sig=accountsecret";

fn provider_for(server: &MockServer) -> ArmProvider {
    provider_with_blob_endpoint(server, &format!("{}/{{account}}", server.uri()))
}

fn provider_with_blob_endpoint(server: &MockServer, blob_endpoint: &str) -> ArmProvider {
    ArmProvider::new(ArmConfig {
        subscription_id: SUB.to_string(),
        management_endpoint: server.uri(),
        blob_endpoint: blob_endpoint.to_string(),
        access_token: Some(SensitiveString::new(TOKEN)),
        timeout: Duration::from_secs(5),
        ..ArmConfig::default()
    })
    .unwrap()
}

fn rg_path(rg: &str) -> String {
    format!("/subscriptions/{}/resourceGroups/{}", SUB, rg)
}

fn account_path(rg: &str, account: &str) -> String {
    format!(
        "{}/providers/Microsoft.Storage/storageAccounts/{}",
        rg_path(rg),
        account
    )
}

fn request(resource_type: ResourceType, name: &str, properties: Value) -> CreateRequest {
    CreateRequest {
        urn: Urn::new(resource_type.token(), name),
        resource_type,
        name: name.to_string(),
        properties: properties.as_object().cloned().unwrap_or_default(),
        content: None,
    }
}

// ============================================================================
// Control plane
// ============================================================================

#[tokio::test]
async fn test_put_resource_group_with_default_location() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(rg_path("P-D-rg")))
        .and(query_param("api-version", "2021-04-01"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .and(body_partial_json(json!({ "location": "westeurope" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": rg_path("P-D-rg"),
            "name": "P-D-rg",
            "location": "westeurope",
            "properties": { "provisioningState": "Succeeded" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let state = provider
        .create_resource(request(ResourceType::ResourceGroup, "P-D-rg", json!({})))
        .await
        .unwrap();

    assert_eq!(state.id, rg_path("P-D-rg"));
    assert_eq!(state.get_str("name"), Some("P-D-rg"));
    assert_eq!(state.get_str("provisioningState"), Some("Succeeded"));
}

#[tokio::test]
async fn test_accepted_without_body_reads_once() {
    let server = MockServer::start().await;
    let plan_path = format!("{}/providers/Microsoft.Web/serverfarms/P-D-plan", rg_path("P-D-rg"));

    Mock::given(method("PUT"))
        .and(path(plan_path.as_str()))
        .and(body_partial_json(json!({
            "kind": "Linux",
            "sku": { "tier": "Dynamic", "name": "Y1" },
            "properties": { "reserved": true }
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(plan_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": plan_path,
            "name": "P-D-plan",
            "kind": "linux"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let state = provider
        .create_resource(request(
            ResourceType::AppServicePlan,
            "P-D-plan",
            json!({
                "resourceGroupName": "P-D-rg",
                "kind": "Linux",
                "sku": { "tier": "Dynamic", "name": "Y1" },
                "reserved": true
            }),
        ))
        .await
        .unwrap();

    assert_eq!(state.get_str("name"), Some("P-D-plan"));
}

#[tokio::test]
async fn test_list_keys() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/listKeys", account_path("rg", "acct"))))
        .and(query_param("api-version", "2021-02-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [
                { "keyName": "key1", "value": "Zmlyc3Q=", "permissions": "FULL" },
                { "keyName": "key2", "value": "c2Vjb25k", "permissions": "FULL" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let keys = provider_for(&server)
        .list_storage_account_keys("rg", "acct")
        .await
        .unwrap();

    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].key_name, "key1");
    assert_eq!(keys[0].value.expose(), "Zmlyc3Q=");
    assert!(!format!("{:?}", keys).contains("Zmlyc3Q="));
}

#[tokio::test]
async fn test_list_service_sas_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/ListServiceSas", account_path("rg", "acct"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "serviceSasToken": "sv=2019-12-12&sr=c&sp=r&sig=abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sas_request = azstack::azure::helpers::blob_read_sas_request(
        "rg",
        "acct",
        "zips",
        &azstack::azure::SasWindow::default(),
    );
    let token = provider_for(&server)
        .list_service_sas(&sas_request)
        .await
        .unwrap();
    assert_eq!(token.expose(), "sv=2019-12-12&sr=c&sp=r&sig=abc");

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        json!({
            "canonicalizedResource": "/blob/acct/zips",
            "signedResource": "c",
            "signedPermission": "r",
            "signedProtocol": "https",
            "signedStart": "2021-04-01",
            "signedExpiry": "2030-01-01",
            "rsct": "application/json",
            "rscc": "max-age=5",
            "rscd": "inline",
            "rsce": "deflate"
        })
    );
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_error_message_passes_through() {
    let server = MockServer::start().await;
    let message = "The storage account named PDst is already taken.";
    Mock::given(method("PUT"))
        .and(path(account_path("P-D-rg", "PDst")))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": { "code": "StorageAccountAlreadyTaken", "message": message }
        })))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .create_resource(request(
            ResourceType::StorageAccount,
            "PDst",
            json!({ "resourceGroupName": "P-D-rg" }),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Conflict(_)));
    assert_eq!(err.to_string(), message);
    assert_eq!(azstack::Error::from(err).to_string(), message);
}

#[tokio::test]
async fn test_server_error_keeps_code() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": "InternalServerError", "message": "try later" }
        })))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .create_resource(request(ResourceType::ResourceGroup, "rg", json!({})))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "try later");
    assert_eq!(err.code(), Some("InternalServerError"));
}

#[tokio::test]
async fn test_unauthorized_maps_to_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": "InvalidAuthenticationToken", "message": "token expired" }
        })))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .create_resource(request(ResourceType::ResourceGroup, "rg", json!({})))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Unauthenticated(_)));
    assert_eq!(err.to_string(), "token expired");
}

// ============================================================================
// Data plane
// ============================================================================

async fn mount_upload_sas(server: &MockServer, rg: &str, account: &str) {
    Mock::given(method("POST"))
        .and(path(format!("{}/ListServiceSas", account_path(rg, account))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "serviceSasToken": UPLOAD_SAS })))
        .mount(server)
        .await;
}

async fn mount_account_sas(server: &MockServer, rg: &str, account: &str) {
    Mock::given(method("POST"))
        .and(path(format!("{}/ListAccountSas", account_path(rg, account))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accountSasToken": ACCOUNT_SAS })))
        .mount(server)
        .await;
}

fn blob_request(name: &str) -> CreateRequest {
    request(
        ResourceType::Blob,
        name,
        json!({
            "resourceGroupName": "rg",
            "accountName": "acct",
            "containerName": "$web",
            "contentType": "text/html"
        }),
    )
}

fn website_request(index: &str) -> CreateRequest {
    request(
        ResourceType::StorageAccountStaticWebsite,
        "P-D-sbs",
        json!({
            "resourceGroupName": "rg",
            "accountName": "acct",
            "indexDocument": index,
            "error404Document": "404.html"
        }),
    )
}

const AUTH_FAILED_XML: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?><Error>\
    <Code>AuthenticationFailed</Code>\
    <Message>Server failed to authenticate the request &amp; was rejected.</Message></Error>";

#[tokio::test]
async fn test_blob_upload_transport_failure_omits_sas() {
    let server = MockServer::start().await;
    mount_upload_sas(&server, "rg", "acct").await;

    let provider = provider_with_blob_endpoint(&server, UNREACHABLE_BLOB_ENDPOINT);
    let err = provider.create_resource(blob_request("index.html")).await.unwrap_err();

    assert!(matches!(err, ProviderError::Http(_)));
    let message = err.to_string();
    assert!(!message.contains("uploadsecret"), "{}", message);
    assert!(!format!("{:?}", err).contains("uploadsecret"));
    assert!(!azstack::Error::from(err).to_string().contains("uploadsecret"));

    assert!(provider.secrets().unwrap().contains_secret(UPLOAD_SAS));
}

#[tokio::test]
async fn test_blob_upload_rejection_omits_sas() {
    let server = MockServer::start().await;
    mount_upload_sas(&server, "rg", "acct").await;
    Mock::given(method("PUT"))
        .and(path("/acct/$web/index.html"))
        .respond_with(ResponseTemplate::new(403).set_body_string(AUTH_FAILED_XML))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .create_resource(blob_request("index.html"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Unauthenticated(_)));
    assert_eq!(
        err.to_string(),
        "Server failed to authenticate the request & was rejected."
    );
}

#[tokio::test]
async fn test_static_website_transport_failure_omits_account_sas() {
    let server = MockServer::start().await;
    mount_account_sas(&server, "rg", "acct").await;

    let provider = provider_with_blob_endpoint(&server, UNREACHABLE_BLOB_ENDPOINT);
    let err = provider.create_resource(website_request("index.html")).await.unwrap_err();

    assert!(matches!(err, ProviderError::Http(_)));
    assert!(!err.to_string().contains("accountsecret"), "{}", err);
    assert!(provider.secrets().unwrap().contains_secret(ACCOUNT_SAS));
}

#[tokio::test]
async fn test_static_website_rejection_omits_account_sas() {
    let server = MockServer::start().await;
    mount_account_sas(&server, "rg", "acct").await;
    Mock::given(method("PUT"))
        .and(path("/acct/"))
        .and(query_param("comp", "properties"))
        .respond_with(ResponseTemplate::new(500).set_body_string(AUTH_FAILED_XML))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .create_resource(website_request("index.html"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), None);
    assert!(!err.to_string().contains("accountsecret"));
    assert_eq!(
        err.to_string(),
        "Server failed to authenticate the request & was rejected."
    );
}

#[tokio::test]
async fn test_static_website_body_escapes_document_names() {
    let server = MockServer::start().await;
    mount_account_sas(&server, "rg", "acct").await;
    Mock::given(method("PUT"))
        .and(path("/acct/"))
        .and(query_param("comp", "properties"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    provider_for(&server)
        .create_resource(website_request("a&b<c>.html"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let properties = requests
        .iter()
        .find(|r| r.url.path() == "/acct/")
        .expect("service properties request");
    let body = String::from_utf8(properties.body.clone()).unwrap();
    assert!(body.contains("<IndexDocument>a&amp;b&lt;c&gt;.html</IndexDocument>"), "{}", body);
    assert!(body.contains("<ErrorDocument404Path>404.html</ErrorDocument404Path>"));
}

#[tokio::test]
async fn test_blob_name_is_percent_encoded() {
    let server = MockServer::start().await;
    mount_upload_sas(&server, "rg", "acct").await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/acct/\$web/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let state = provider_for(&server)
        .create_resource(blob_request("a#b?.html"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let upload = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .expect("upload request");
    assert_eq!(upload.url.path(), "/acct/$web/a%23b%3F.html");
    assert_eq!(upload.url.query(), Some(UPLOAD_SAS));
    assert_eq!(state.get_str("name"), Some("a#b?.html"));
    assert!(state.get_str("url").unwrap().ends_with("/acct/$web/a%23b%3F.html"));
}

#[tokio::test]
async fn test_failed_stack_error_omits_internal_credentials() {
    let server = MockServer::start().await;
    let rg = "P-D-rg";
    let account = "PDst";

    Mock::given(method("PUT"))
        .and(path(rg_path(rg)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": rg_path(rg), "name": rg })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(account_path(rg, account)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": account_path(rg, account),
            "name": account,
            "properties": { "primaryEndpoints": { "web": "https://pdst.z6.web.core.windows.net/" } }
        })))
        .mount(&server)
        .await;
    mount_account_sas(&server, rg, account).await;

    let site = common::default_site();
    let provider = provider_with_blob_endpoint(&server, UNREACHABLE_BLOB_ENDPOINT);
    let deployment = Deployment::new(Arc::new(provider), DeploymentOptions::new("P", "D"));
    let err = deploy(&StaticWebsiteStack::new(site.path()), &deployment)
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert!(!err.to_string().contains("accountsecret"), "{}", err);
    assert!(deployment.secrets().contains_secret(ACCOUNT_SAS));
}

// ============================================================================
// Whole stack
// ============================================================================

fn no_bearer(request: &Request) -> bool {
    !request.headers.contains_key("authorization")
}

#[tokio::test]
async fn test_static_website_against_mock_arm() {
    let server = MockServer::start().await;
    let rg = "P-D-rg";
    let account = "PDst";

    Mock::given(method("PUT"))
        .and(path(rg_path(rg)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": rg_path(rg), "name": rg, "location": "westeurope"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(account_path(rg, account)))
        .and(body_partial_json(json!({ "sku": { "name": "Standard_LRS" }, "kind": "StorageV2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": account_path(rg, account),
            "name": account,
            "kind": "StorageV2",
            "properties": {
                "primaryEndpoints": {
                    "web": "https://pdst.z6.web.core.windows.net/",
                    "blob": "https://pdst.blob.core.windows.net/"
                }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/ListAccountSas", account_path(rg, account))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accountSasToken": "sv=2019-12-12&ss=b&srt=s&sp=rw&sig=acct"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/", account)))
        .and(query_param("comp", "properties"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/ListServiceSas", account_path(rg, account))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "serviceSasToken": "sv=2019-12-12&sr=c&sp=cw&sig=upload"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(format!(r"^/{}/.+/[^/]+\.html$", account)))
        .and(header("x-ms-blob-type", "BlockBlob"))
        .and(header("content-type", "text/html"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/listKeys", account_path(rg, account))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [{ "keyName": "key1", "value": "cHJpbWFyeQ==", "permissions": "FULL" }]
        })))
        .mount(&server)
        .await;

    let site = common::default_site();
    let deployment = Deployment::new(Arc::new(provider_for(&server)), DeploymentOptions::new("P", "D"));
    let run = deploy(&StaticWebsiteStack::new(site.path()), &deployment)
        .await
        .unwrap();

    assert_eq!(run.summary.len(), 5);
    assert_eq!(
        run.outputs.get("staticEndpoint"),
        Some(&OutputValue::Plain("https://pdst.z6.web.core.windows.net/".to_string()))
    );
    assert_eq!(
        run.outputs.get("primaryStorageKey").and_then(|v| v.render(true)).as_deref(),
        Some("cHJpbWFyeQ==")
    );

    // Credentials fetched inside the provider are known to the deployment.
    let secrets = deployment.secrets();
    assert!(secrets.contains_secret("sv=2019-12-12&ss=b&srt=s&sp=rw&sig=acct"));
    assert!(secrets.contains_secret("sv=2019-12-12&sr=c&sp=cw&sig=upload"));
    assert!(secrets.contains_secret("cHJpbWFyeQ=="));

    // The bearer token only goes to the management endpoint.
    let requests = server.received_requests().await.unwrap();
    for request in requests.iter().filter(|r| r.url.path().starts_with(&format!("/{}/", account))) {
        assert!(no_bearer(request), "data-plane request carried a bearer token");
    }
}

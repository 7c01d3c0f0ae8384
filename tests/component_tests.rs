//! Tests for the packaged function app component.

mod common;

use std::collections::HashSet;

use common::*;
use pretty_assertions::assert_eq;

use azstack::azure::{
    AppServicePlan, AppServicePlanArgs, AssetOrArchive, NameValuePair, ResourceGroup,
    ResourceGroupArgs, StorageAccount, StorageAccountArgs,
};
use azstack::components::{PackageFunctionApp, PackageFunctionAppArgs, PACKAGE_APP_SETTINGS};
use azstack::engine::{Deployment, ResourceType, Urn};

fn resource_group(deployment: &Deployment) -> ResourceGroup {
    ResourceGroup::new(
        deployment,
        "P-D-rg",
        ResourceGroupArgs {
            resource_group_name: Some("P-D-rg".into()),
            location: None,
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_two_components_get_distinct_names() {
    let package = package_dir();
    let (provider, deployment) = memory_deployment("P", "D");
    let rg = resource_group(&deployment);

    let first = PackageFunctionApp::new(
        &deployment,
        "first-func",
        PackageFunctionAppArgs::new("P", rg.clone(), AssetOrArchive::file_archive(package.path())),
    )
    .unwrap();
    let second = PackageFunctionApp::new(
        &deployment,
        "second-func",
        PackageFunctionAppArgs::new("P", rg, AssetOrArchive::file_archive(package.path())),
    )
    .unwrap();

    deployment.execute().await.unwrap();

    for type_token in [
        ResourceType::StorageAccount.token(),
        ResourceType::AppServicePlan.token(),
        ResourceType::BlobContainer.token(),
        ResourceType::Blob.token(),
    ] {
        let names = created_names(&provider, type_token);
        assert_eq!(names.len(), 2, "two {} expected", type_token);
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), 2, "{} names collide: {:?}", type_token, names);
    }

    let accounts = created_names(&provider, ResourceType::StorageAccount.token());
    assert!(accounts.iter().all(|n| n.starts_with("PDst") && n.len() > 4));
    let plans = created_names(&provider, ResourceType::AppServicePlan.token());
    assert!(plans.iter().all(|n| n.starts_with("P-D-plan")));
    let containers = created_names(&provider, ResourceType::BlobContainer.token());
    assert!(containers.iter().all(|n| n.starts_with("zips")));
    let blobs = created_names(&provider, ResourceType::Blob.token());
    assert!(blobs.iter().all(|n| n.starts_with("funczip")));

    assert_eq!(first.name, "first-func");
    assert_eq!(second.function_app.name.resolve().await.unwrap(), "second-func");
}

#[tokio::test]
async fn test_many_components_never_reuse_a_name() {
    let package = package_dir();
    let (provider, deployment) = memory_deployment("P", "D");
    let rg = resource_group(&deployment);

    for i in 0..12 {
        PackageFunctionApp::new(
            &deployment,
            &format!("func-{}", i),
            PackageFunctionAppArgs::new("P", rg.clone(), AssetOrArchive::file_archive(package.path())),
        )
        .unwrap();
    }
    deployment.execute().await.unwrap();

    let containers = created_names(&provider, ResourceType::BlobContainer.token());
    let unique: HashSet<&String> = containers.iter().collect();
    assert_eq!(unique.len(), containers.len());
}

#[tokio::test]
async fn test_caller_settings_come_first() {
    let package = package_dir();
    let (provider, deployment) = memory_deployment("P", "D");
    let rg = resource_group(&deployment);

    let mut args = PackageFunctionAppArgs::new("P", rg, AssetOrArchive::file_archive(package.path()));
    args.app_settings = vec![
        NameValuePair::new("FUNCTIONS_EXTENSION_VERSION", "~3"),
        NameValuePair::new("runtime", "custom"),
    ];
    PackageFunctionApp::new(&deployment, "func", args).unwrap();
    deployment.execute().await.unwrap();

    let app = Urn::new(ResourceType::WebApp.token(), "func");
    let settings = app_settings(&properties_of(&provider, &app));
    let names: Vec<&str> = settings.iter().map(|(n, _)| n.as_str()).collect();

    let mut expected = vec!["FUNCTIONS_EXTENSION_VERSION", "runtime"];
    expected.extend(PACKAGE_APP_SETTINGS);
    assert_eq!(names, expected);

    // Duplicates are sent as given.
    assert_eq!(settings[1].1, "custom");
    assert_eq!(settings[3].1, "dotnet");
}

#[tokio::test]
async fn test_supplied_account_and_plan_are_reused() {
    let package = package_dir();
    let (provider, deployment) = memory_deployment("P", "D");
    let rg = resource_group(&deployment);

    let account = StorageAccount::new(
        &deployment,
        "sharedst",
        StorageAccountArgs::new(rg.name.clone()).account_name("sharedst"),
    )
    .unwrap();
    let plan = AppServicePlan::new(
        &deployment,
        "shared-plan",
        AppServicePlanArgs::linux_consumption(rg.name.clone()).name("shared-plan"),
    )
    .unwrap();

    let mut args = PackageFunctionAppArgs::new("P", rg, AssetOrArchive::file_archive(package.path()));
    args.storage_account = Some(account);
    args.plan = Some(plan);
    let component = PackageFunctionApp::new(&deployment, "func", args).unwrap();
    deployment.execute().await.unwrap();

    assert_eq!(created_names(&provider, ResourceType::StorageAccount.token()), vec!["sharedst"]);
    assert_eq!(created_names(&provider, ResourceType::AppServicePlan.token()), vec!["shared-plan"]);

    let url = component.code_blob_url.resolve().await.unwrap();
    assert!(component.code_blob_url.is_secret());
    assert!(url.starts_with("https://sharedst.blob.core.windows.net/zips"));
    assert_created_after_dependencies(&provider, &deployment);
}

#[tokio::test]
async fn test_component_is_not_a_resource() {
    let package = package_dir();
    let (_provider, deployment) = memory_deployment("P", "D");
    let rg = resource_group(&deployment);

    PackageFunctionApp::new(
        &deployment,
        "func",
        PackageFunctionAppArgs::new("P", rg, AssetOrArchive::file_archive(package.path())),
    )
    .unwrap();

    // group, account, container, blob, plan, app
    assert_eq!(deployment.resources().len(), 6);
}

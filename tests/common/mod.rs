//! Shared test utilities and fixtures for the azstack test suite.
//!
//! This module provides:
//! - Deployments wired to a recording in-memory provider
//! - Temporary content directories and function packages
//! - Lookups over recorded provider calls
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tempfile::TempDir;

use azstack::engine::{Deployment, DeploymentOptions, Urn};
use azstack::provider::{InMemoryProvider, ProviderCall};

/// Seed used wherever a test wants reproducible suffixes.
pub const TEST_SEED: u64 = 42;

// ============================================================================
// Deployments
// ============================================================================

/// A deployment for `project`/`stack` backed by a fresh in-memory provider.
pub fn memory_deployment(project: &str, stack: &str) -> (Arc<InMemoryProvider>, Deployment) {
    let provider = Arc::new(InMemoryProvider::new());
    let deployment = Deployment::new(
        provider.clone(),
        DeploymentOptions::new(project, stack).with_seed(TEST_SEED),
    );
    (provider, deployment)
}

/// Same as [`memory_deployment`] with a provider the caller configured.
pub fn deployment_with(provider: InMemoryProvider, project: &str, stack: &str) -> (Arc<InMemoryProvider>, Deployment) {
    let provider = Arc::new(provider);
    let deployment = Deployment::new(
        provider.clone(),
        DeploymentOptions::new(project, stack).with_seed(TEST_SEED),
    );
    (provider, deployment)
}

// ============================================================================
// Fixtures
// ============================================================================

/// A content directory holding `files` (name, body).
pub fn site_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("create site dir");
    for (name, body) in files {
        std::fs::write(dir.path().join(name), body).expect("write site file");
    }
    dir
}

/// The usual two-page site.
pub fn default_site() -> TempDir {
    site_dir(&[
        ("index.html", "<h1>Hello</h1>"),
        ("404.html", "<h1>Not found</h1>"),
    ])
}

/// A published function app directory.
pub fn package_dir() -> TempDir {
    let dir = TempDir::new().expect("create package dir");
    write_package(dir.path());
    dir
}

/// Writes a minimal function app layout into `root`.
pub fn write_package(root: &Path) {
    std::fs::write(root.join("host.json"), r#"{"version":"2.0"}"#).expect("write host.json");
    std::fs::create_dir_all(root.join("bin")).expect("create bin");
    std::fs::write(root.join("bin").join("Func.dll"), b"\x4d\x5a").expect("write dll");
    std::fs::create_dir_all(root.join("Hello")).expect("create function dir");
    std::fs::write(
        root.join("Hello").join("function.json"),
        r#"{"bindings":[{"type":"httpTrigger","name":"req"}]}"#,
    )
    .expect("write function.json");
}

// ============================================================================
// Recorded calls
// ============================================================================

/// Create calls in the order the provider received them.
pub fn create_calls(provider: &InMemoryProvider) -> Vec<(Urn, String, Map<String, Value>)> {
    provider
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ProviderCall::Create {
                urn,
                name,
                properties,
                ..
            } => Some((urn, name, properties)),
            _ => None,
        })
        .collect()
}

/// Physical names of created resources of one type token.
pub fn created_names(provider: &InMemoryProvider, type_token: &str) -> Vec<String> {
    create_calls(provider)
        .into_iter()
        .filter(|(urn, _, _)| urn.resource_type() == type_token)
        .map(|(_, name, _)| name)
        .collect()
}

/// Properties sent for one resource.
pub fn properties_of(provider: &InMemoryProvider, urn: &Urn) -> Map<String, Value> {
    create_calls(provider)
        .into_iter()
        .find(|(u, _, _)| u == urn)
        .map(|(_, _, properties)| properties)
        .unwrap_or_else(|| panic!("no create call for {}", urn))
}

/// App settings of a web app as (name, value) pairs, in order.
pub fn app_settings(properties: &Map<String, Value>) -> Vec<(String, String)> {
    properties["siteConfig"]["appSettings"]
        .as_array()
        .expect("appSettings array")
        .iter()
        .map(|s| {
            (
                s["name"].as_str().unwrap_or_default().to_string(),
                s["value"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

/// Asserts every resource was created after everything it consumes.
pub fn assert_created_after_dependencies(provider: &InMemoryProvider, deployment: &Deployment) {
    let created = provider.created();
    let graph = deployment.graph();
    for urn in &created {
        let position = provider.creation_index(urn).expect("created");
        for dependency in graph.direct_dependencies(urn) {
            let dep_position = provider
                .creation_index(&dependency)
                .unwrap_or_else(|| panic!("{} consumed {} which was never created", urn, dependency));
            assert!(
                dep_position < position,
                "{} created before its dependency {}",
                urn,
                dependency
            );
        }
    }
}

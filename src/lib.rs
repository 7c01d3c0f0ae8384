//! # azstack - Declarative Azure Resource Stacks
//!
//! azstack declares cloud resources as a graph, creates them in dependency
//! order through a provider and reports named stack outputs. Two stacks ship
//! with the crate: a storage account serving a static website, and a Linux
//! consumption-plan function app running from a zip package.
//!
//! ## Core Concepts
//!
//! - **Outputs**: deferred values resolved once their producing resource exists
//! - **Resources**: typed argument structs registered with a deployment
//! - **Deployment**: the registry, dependency graph and creation driver
//! - **Providers**: the backend that creates resources (ARM or in-memory)
//! - **Components**: constructors that declare several resources at once
//! - **Stacks**: named collections of resources with named outputs
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      CLI (up / preview / graph)                     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │          Stacks  (static website, function app, components)         │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │     Deployment engine  (Output<T>, registry, petgraph ordering)     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                   ┌────────────────┴────────────────┐
//!                   ▼                                 ▼
//! ┌─────────────────────────────────┐ ┌─────────────────────────────────┐
//! │  ArmProvider (reqwest, REST)    │ │  InMemoryProvider (simulated)   │
//! └─────────────────────────────────┘ └─────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use azstack::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let provider = Arc::new(InMemoryProvider::new());
//!     let deployment = Deployment::new(provider, DeploymentOptions::new("demo", "dev"));
//!
//!     let run = deploy(&StaticWebsiteStack::new("./wwwroot"), &deployment).await?;
//!     println!("{}", run.outputs.to_json(false));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::azure::{
        AssetOrArchive, Blob, BlobArgs, BlobContainer, BlobContainerArgs, ResourceGroup,
        ResourceGroupArgs, SasWindow, StorageAccount, StorageAccountArgs, WebApp, WebAppArgs,
    };
    pub use crate::components::{PackageFunctionApp, PackageFunctionAppArgs};
    pub use crate::engine::{Deployment, DeploymentOptions, Output, ResourceType, Urn};
    pub use crate::error::{Error, Result};
    pub use crate::provider::{ArmConfig, ArmProvider, InMemoryProvider, Provider};
    pub use crate::secrets::{SecretRegistry, SensitiveString};
    pub use crate::stacks::{deploy, FunctionStack, Stack, StackKind, StaticWebsiteStack};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and the crate-wide `Result`.
pub mod error;

/// Secret values and redaction.
pub mod secrets;

/// Deferred outputs, resource registry and dependency graph.
pub mod engine;

/// Backends that create resources.
pub mod provider;

// ============================================================================
// Azure Resources
// ============================================================================

/// Azure resource arguments, handles and invoke helpers.
///
/// Each resource is an argument struct implementing
/// [`ResourceArgs`](engine::ResourceArgs) plus a handle whose fields are
/// [`Output`](engine::Output)s of the created resource.
pub mod azure;

/// Resource name derivation from project and stack.
pub mod naming;

/// Multi-resource components.
pub mod components;

/// The shipped stacks and stack outputs.
pub mod stacks;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration loading and environment overrides.
///
/// Sources are merged in order: defaults, system file, user file, project
/// file (or an explicit path) and `AZSTACK_*` environment variables.
pub mod config;

pub use error::{Error, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

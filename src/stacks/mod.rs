//! Stacks: named collections of declared resources with named outputs.
//!
//! A [`Stack`] only declares. [`deploy`] then creates the declared resources
//! and resolves the outputs.

pub mod function;
pub mod static_website;

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::info;

pub use function::FunctionStack;
pub use static_website::StaticWebsiteStack;

use crate::engine::{Deployment, DeploymentSummary, Output};
use crate::error::{Error, Result};
use crate::secrets::{SecretRegistry, SensitiveString};

/// Text shown in place of a secret output.
pub const SECRET_PLACEHOLDER: &str = "[secret]";

/// A stack definition.
pub trait Stack: Send + Sync {
    /// Stack name for logs and output headers.
    fn name(&self) -> &'static str;

    /// Declares the stack's resources and returns its outputs.
    fn declare(&self, deployment: &Deployment) -> Result<StackOutputs>;
}

/// The stacks shipped with azstack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StackKind {
    /// Storage account serving a directory as a static website
    StaticWebsite,
    /// Consumption-plan function app running from a package blob
    Function,
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackKind::StaticWebsite => write!(f, "static-website"),
            StackKind::Function => write!(f, "function"),
        }
    }
}

/// A declared stack output.
#[derive(Debug, Clone)]
pub enum StackOutput {
    /// A value
    Value(Output<String>),
    /// Declared but never assigned
    Unset,
}

/// Named stack outputs in declaration order.
#[derive(Debug, Clone, Default)]
pub struct StackOutputs {
    entries: IndexMap<String, StackOutput>,
}

impl StackOutputs {
    /// No outputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a value.
    pub fn insert(&mut self, name: impl Into<String>, value: Output<String>) {
        self.entries.insert(name.into(), StackOutput::Value(value));
    }

    /// Export a name without a value.
    pub fn unset(&mut self, name: impl Into<String>) {
        self.entries.insert(name.into(), StackOutput::Unset);
    }

    /// Look up an output.
    pub fn get(&self, name: &str) -> Option<&StackOutput> {
        self.entries.get(name)
    }

    /// Output names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of outputs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no outputs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Waits for every value. Secret values are registered for redaction.
    pub async fn resolve(&self, secrets: &SecretRegistry) -> Result<ResolvedOutputs> {
        let values = futures::future::try_join_all(self.entries.iter().map(|(name, output)| async move {
            let value = match output {
                StackOutput::Unset => OutputValue::Unset,
                StackOutput::Value(output) if output.is_secret() => {
                    let value = output.resolve().await?;
                    secrets.register(value.clone());
                    OutputValue::Secret(SensitiveString::new(value))
                }
                StackOutput::Value(output) => OutputValue::Plain(output.resolve().await?),
            };
            Ok::<_, Error>((name.clone(), value))
        }))
        .await?;

        Ok(ResolvedOutputs {
            values: values.into_iter().collect(),
        })
    }
}

/// A resolved stack output value.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    /// Plain value
    Plain(String),
    /// Secret value, redacted unless revealed
    Secret(SensitiveString),
    /// No value
    Unset,
}

impl OutputValue {
    /// The value as rendered, revealing secrets only when asked.
    pub fn render(&self, reveal_secrets: bool) -> Option<String> {
        match self {
            OutputValue::Plain(value) => Some(value.clone()),
            OutputValue::Secret(value) if reveal_secrets => Some(value.expose().to_string()),
            OutputValue::Secret(_) => Some(SECRET_PLACEHOLDER.to_string()),
            OutputValue::Unset => None,
        }
    }

    /// Returns true for secret values.
    pub fn is_secret(&self) -> bool {
        matches!(self, OutputValue::Secret(_))
    }
}

/// Resolved stack outputs in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ResolvedOutputs {
    /// Output values
    pub values: IndexMap<String, OutputValue>,
}

impl ResolvedOutputs {
    /// Look up a value.
    pub fn get(&self, name: &str) -> Option<&OutputValue> {
        self.values.get(name)
    }

    /// Outputs as a JSON object; unset outputs are `null`.
    pub fn to_json(&self, reveal_secrets: bool) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(name, value)| {
                    let rendered = value
                        .render(reveal_secrets)
                        .map(Value::String)
                        .unwrap_or(Value::Null);
                    (name.clone(), rendered)
                })
                .collect(),
        )
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct StackRun {
    /// Created resources
    pub summary: DeploymentSummary,
    /// Stack outputs
    pub outputs: ResolvedOutputs,
}

/// Declares a stack, creates its resources and resolves its outputs.
pub async fn deploy(stack: &dyn Stack, deployment: &Deployment) -> Result<StackRun> {
    info!(stack = stack.name(), "Declaring stack");
    let outputs = stack.declare(deployment)?;

    let summary = deployment.execute().await?;
    let outputs = outputs.resolve(&deployment.secrets()).await?;

    info!(
        stack = stack.name(),
        resources = summary.len(),
        outputs = outputs.values.len(),
        "Stack deployed"
    );
    Ok(StackRun { summary, outputs })
}

//! Subcommands module for azstack CLI
//!
//! This module contains all the subcommand implementations.

pub mod graph;
pub mod preview;
pub mod up;

use std::sync::Arc;

use anyhow::Result;
use azstack::config::Config;
use azstack::engine::Deployment;
use azstack::provider::Provider;
use azstack::stacks::{self, FunctionStack, Stack, StackKind, StaticWebsiteStack};
use tracing::debug;

use crate::cli::output::OutputFormatter;
use crate::cli::{Cli, StackArgs};

/// Exit code for a configuration that cannot be used
pub const EXIT_CONFIG: i32 = 5;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration, with command-line overrides applied
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &Cli, mut config: Config) -> Self {
        apply_overrides(&mut config, cli.stack_args());
        let use_color = !cli.no_color && config.output.color;
        let output = OutputFormatter::new(use_color, cli.is_json(), cli.show_secrets);

        Self { config, output }
    }

    /// Build the selected stack from configuration.
    pub fn stack(&self, kind: StackKind) -> Result<Box<dyn Stack>> {
        let stack: Box<dyn Stack> = match kind {
            StackKind::StaticWebsite => {
                Box::new(StaticWebsiteStack::new(&self.config.paths.content_dir))
            }
            StackKind::Function => Box::new(
                FunctionStack::new(&self.config.paths.archive)
                    .with_sas_window(self.config.sas_window()?),
            ),
        };
        Ok(stack)
    }

    /// A fresh deployment against `provider` for the configured project.
    pub fn deployment(&mut self, provider: Arc<dyn Provider>) -> Deployment {
        let deployment = Deployment::new(provider, self.config.deployment_options());
        self.output.set_secrets(deployment.secrets());
        deployment
    }

    /// Declare and create `kind` against `provider`, printing the report.
    pub async fn run_stack(&mut self, kind: StackKind, provider: Arc<dyn Provider>) -> Result<i32> {
        let stack = match self.stack(kind) {
            Ok(stack) => stack,
            Err(e) => {
                self.output.error(&format!("{:#}", e));
                return Ok(EXIT_CONFIG);
            }
        };

        let provider_name = provider.name();
        let deployment = self.deployment(provider);
        self.output.banner(&format!(
            "{} [{}-{}] via {}",
            kind,
            deployment.project(),
            deployment.stack(),
            provider_name
        ));
        debug!(stack = %kind, provider = provider_name, "Running stack");

        match stacks::deploy(stack.as_ref(), &deployment).await {
            Ok(run) => {
                self.output.run(&kind.to_string(), provider_name, &run);
                Ok(0)
            }
            Err(e) => {
                self.output.error(&e.to_string());
                Ok(e.exit_code())
            }
        }
    }
}

/// Command-line values win over configuration.
fn apply_overrides(config: &mut Config, args: &StackArgs) {
    if let Some(project) = &args.project {
        config.project.name = project.clone();
    }
    if let Some(stack) = &args.stack_name {
        config.project.stack = stack.clone();
    }
    if let Some(seed) = args.seed {
        config.project.seed = Some(seed);
    }
    if let Some(dir) = &args.content_dir {
        config.paths.content_dir = dir.clone();
    }
    if let Some(archive) = &args.archive {
        config.paths.archive = archive.clone();
    }
}

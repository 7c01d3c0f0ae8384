//! Preview command
//!
//! Runs a stack end to end against the in-memory provider. Nothing leaves
//! the machine; names, ordering and outputs are the ones `up` would produce.

use std::sync::Arc;

use anyhow::Result;
use azstack::provider::InMemoryProvider;

use super::CommandContext;
use crate::cli::StackArgs;

/// Execute the preview command
pub async fn execute(args: &StackArgs, ctx: &mut CommandContext) -> Result<i32> {
    ctx.output
        .info("Previewing with the in-memory provider; no Azure calls are made.");
    ctx.run_stack(args.stack, Arc::new(InMemoryProvider::new())).await
}

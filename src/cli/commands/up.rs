//! Up command
//!
//! Creates the stack's resources through Azure Resource Manager.

use std::sync::Arc;

use anyhow::Result;
use azstack::provider::ArmProvider;
use azstack::Error;

use super::CommandContext;
use crate::cli::StackArgs;

/// Execute the up command
pub async fn execute(args: &StackArgs, ctx: &mut CommandContext) -> Result<i32> {
    let provider = match ArmProvider::new(ctx.config.arm_config()) {
        Ok(provider) => provider,
        Err(e) => {
            let error = Error::from(e);
            ctx.output.error(&error.to_string());
            ctx.output
                .info("Set AZSTACK_SUBSCRIPTION_ID and AZSTACK_ACCESS_TOKEN, or use `azstack preview`.");
            return Ok(error.exit_code());
        }
    };

    ctx.run_stack(args.stack, Arc::new(provider)).await
}

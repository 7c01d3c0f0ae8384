//! Graph command
//!
//! Declares a stack without creating anything and prints its resource graph.

use std::sync::Arc;

use anyhow::Result;
use azstack::provider::InMemoryProvider;
use serde_json::json;

use super::{CommandContext, EXIT_CONFIG};
use crate::cli::StackArgs;

/// Execute the graph command
pub async fn execute(args: &StackArgs, ctx: &mut CommandContext) -> Result<i32> {
    let stack = match ctx.stack(args.stack) {
        Ok(stack) => stack,
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            return Ok(EXIT_CONFIG);
        }
    };

    let deployment = ctx.deployment(Arc::new(InMemoryProvider::new()));
    if let Err(e) = stack.declare(&deployment) {
        ctx.output.error(&e.to_string());
        return Ok(e.exit_code());
    }

    let graph = deployment.graph();
    let order = match graph.execution_order() {
        Ok(order) => order,
        Err(e) => {
            ctx.output.error(&e.to_string());
            return Ok(e.exit_code());
        }
    };

    if ctx.output.is_json() {
        let edges: Vec<_> = order
            .iter()
            .flat_map(|urn| {
                graph
                    .direct_dependencies(urn)
                    .into_iter()
                    .map(move |dep| json!({ "from": dep.as_str(), "to": urn.as_str() }))
            })
            .collect();
        ctx.output.json(&json!({
            "stack": args.stack.to_string(),
            "order": order.iter().map(|urn| urn.as_str()).collect::<Vec<_>>(),
            "edges": edges,
            "dot": graph.to_dot(),
        }));
    } else {
        ctx.output.raw(&graph.to_dot());
        ctx.output.section("Creation order");
        for (position, urn) in order.iter().enumerate() {
            ctx.output.info(&format!("{:>3}. {}", position + 1, urn));
        }
    }

    Ok(0)
}

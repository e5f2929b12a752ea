use anyhow::{Context, Result};
use rmcp::ServiceExt;
use tracing::info;

use crate::server::core::OmnicmdMcpCore;

/// Serves agent tools over stdin/stdout until the client disconnects.
///
/// Stdout carries the protocol; logging must go to stderr.
pub async fn serve_stdio(core: OmnicmdMcpCore) -> Result<()> {
    info!(tools = core.tools().count(), "serving agent tools on stdio");
    let running = core
        .serve(rmcp::transport::stdio())
        .await
        .context("start MCP stdio transport")?;
    let reason = running.waiting().await.context("MCP stdio session ended abnormally")?;
    info!(?reason, "MCP stdio session closed");
    Ok(())
}

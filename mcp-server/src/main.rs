use mast_mcp_server::McpServer;
use mast_mcp_server::ServerConfig;
use mast_mcp_server::run_main;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let server = McpServer::new(ServerConfig::default())?;
    run_main(server).await?;
    Ok(())
}

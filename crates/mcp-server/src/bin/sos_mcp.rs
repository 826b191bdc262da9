use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    sos_mcp::main_entry().await
}

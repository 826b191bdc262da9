use anyhow::{Context, Result};
use rmcp::model::{CallToolRequestParam, CallToolResult};
use rmcp::service::{RunningService, Service, ServiceExt};
use rmcp::RoleClient;
use rmcp::transport::TokioChildProcess;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

pub const REPORT_DIR: &str = "sosreport-web01-2025-12-09-abcdef";
pub const REPORT_ID: &str = "web01_20251209_1430";

pub fn locate_sos_mcp_bin() -> Result<PathBuf> {
    if let Some(path) = option_env!("CARGO_BIN_EXE_sos-mcp") {
        return Ok(PathBuf::from(path));
    }

    // `.../target/{debug|release}/deps/<test>` -> `.../target/{debug|release}/sos-mcp`
    if let Ok(exe) = std::env::current_exe() {
        if let Some(target_profile_dir) = exe.parent().and_then(|p| p.parent()) {
            let candidate = target_profile_dir.join("sos-mcp");
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let repo_root = manifest_dir
        .ancestors()
        .nth(2)
        .context("failed to resolve repo root from CARGO_MANIFEST_DIR")?;
    for rel in ["target/debug/sos-mcp", "target/release/sos-mcp"] {
        let candidate = repo_root.join(rel);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    anyhow::bail!("failed to locate sos-mcp binary; build with: cargo build -p sos-mcp")
}

fn write(root: &Path, rel: &str, content: &str) -> Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("mkdir {}", parent.display()))?;
    }
    std::fs::write(&path, content).with_context(|| format!("write {}", path.display()))
}

/// A reports directory holding one small report.
pub fn reports_fixture() -> Result<tempfile::TempDir> {
    let tmp = tempfile::tempdir().context("tempdir")?;
    let root = tmp.path().join(REPORT_DIR);
    write(&root, "etc/hostname", "web01\n")?;
    write(&root, "sos_commands/date/date_--utc", "Tue Dec  9 14:30:15 UTC 2025\n")?;
    write(
        &root,
        "sos_commands/hardware/dmidecode",
        "System Information\n\tSerial Number: SN-1\n\tUUID: 1234\n",
    )?;
    write(&root, "etc/os-release", "NAME=\"Test Linux\"\nVERSION_ID=\"9.4\"\n")?;
    write(&root, "sos_commands/networking/ip_addr", "inet 10.0.0.5/24\n")?;
    write(&root, "sos_commands/networking/ifconfig_eth0", "eth0\n")?;
    write(&root, "sos_commands/networking/ifconfig_lo", "lo\n")?;
    write(
        &root,
        "var/log/messages",
        "boot ok\ndisk error\nnet ok\nkernel error\nidle\nerror again\nlast error\n",
    )?;
    Ok(tmp)
}

pub async fn start_server(
    reports_dir: &Path,
) -> Result<RunningService<RoleClient, ()>> {
    let bin = locate_sos_mcp_bin()?;
    let mut cmd = Command::new(bin);
    cmd.arg("--reports-dir").arg(reports_dir);
    cmd.env_remove("SOS_DOMAINS_CONFIG");
    cmd.env("RUST_LOG", "warn");

    let transport = TokioChildProcess::new(cmd).context("spawn mcp server")?;
    tokio::time::timeout(Duration::from_secs(10), ().serve(transport))
        .await
        .context("timeout starting MCP server")?
        .context("start MCP server")
}

pub async fn call_tool_allow_error(
    service: &RunningService<RoleClient, impl Service<RoleClient>>,
    name: &str,
    args: serde_json::Value,
) -> Result<CallToolResult> {
    tokio::time::timeout(
        Duration::from_secs(10),
        service.call_tool(CallToolRequestParam {
            name: name.to_string().into(),
            arguments: args.as_object().cloned(),
        }),
    )
    .await
    .context("timeout calling tool")?
    .context("call tool")
}

/// Calls a tool that must succeed and returns its structured content.
pub async fn call_tool(
    service: &RunningService<RoleClient, impl Service<RoleClient>>,
    name: &str,
    args: serde_json::Value,
) -> Result<serde_json::Value> {
    let result = call_tool_allow_error(service, name, args).await?;
    assert_ne!(result.is_error, Some(true), "{name} returned error: {result:?}");
    result
        .structured_content
        .with_context(|| format!("{name} returned no structured content"))
}

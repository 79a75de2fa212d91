//! Status command - show the background process and every endpoint

use anyhow::{Context, Result};
use serde::Serialize;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

use crate::assuan::Descriptor;
use crate::cli::args::StatusArgs;
use crate::config::load_config_from_path_or_default;
use crate::endpoint::{Endpoint, EndpointSet};
use crate::error::Error;
use crate::service::Daemon;
use crate::utils::socket::{SocketProbe, probe_socket};

/// Status information
#[derive(Debug, Serialize)]
pub struct StatusInfo {
    /// Whether the background process is running
    pub running: bool,
    /// Process ID recorded in the PID file
    pub pid: Option<u32>,
    /// PID file path
    pub pid_file: String,
    /// Windows user, when it was looked up
    pub user: Option<String>,
    pub endpoints: Vec<EndpointStatus>,
}

/// State of one endpoint on both sides of the bridge
#[derive(Debug, Serialize)]
pub struct EndpointStatus {
    pub name: &'static str,
    pub descriptor: String,
    /// `ok`, `missing` or `malformed`
    pub descriptor_state: &'static str,
    /// Loopback port announced by the Windows agent
    pub port: Option<u16>,
    pub socket: String,
    /// `live`, `stale` or `absent`
    pub socket_state: &'static str,
}

/// Execute the status command
pub async fn execute(args: StatusArgs, config_path: Option<std::path::PathBuf>) -> Result<()> {
    let config = load_config_from_path_or_default(config_path.as_deref())
        .context("Failed to load configuration")?
        .config
        .expand_paths()?;

    let pid_file = args
        .pid_file
        .clone()
        .or_else(|| config.pid_file.clone())
        .unwrap_or_else(Daemon::default_pid_file);
    let daemon = Daemon::with_pid_file(pid_file).status()?;

    let opts = args.endpoints.resolve_options(&config)?;
    let endpoints = EndpointSet::discover(&opts).await?;

    let mut status = StatusInfo {
        running: daemon.running,
        pid: daemon.pid,
        pid_file: daemon.pid_file.display().to_string(),
        user: endpoints.host_user().map(str::to_string),
        endpoints: Vec::with_capacity(endpoints.len()),
    };
    for endpoint in endpoints.endpoints() {
        status
            .endpoints
            .push(endpoint_status(endpoint, daemon.running).await?);
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&status)?),
        _ => print_text_status(&status),
    }

    Ok(())
}

async fn endpoint_status(endpoint: &Endpoint, bridge_running: bool) -> Result<EndpointStatus> {
    let (descriptor_state, port) = match Descriptor::read(&endpoint.descriptor_path).await {
        Ok(descriptor) => ("ok", Some(descriptor.port())),
        Err(Error::DescriptorNotFound(_)) => ("missing", None),
        Err(Error::MalformedDescriptor { .. }) => ("malformed", None),
        Err(e) => return Err(e.into()),
    };

    Ok(EndpointStatus {
        name: endpoint.kind.name(),
        descriptor: endpoint.descriptor_path.display().to_string(),
        descriptor_state,
        port,
        socket: endpoint.socket_path.display().to_string(),
        socket_state: socket_state(&endpoint.socket_path, bridge_running).await,
    })
}

/// Probing a bridged socket would start a relay session and hand the nonce
/// to the host agent, so sockets of a running background bridge are trusted
/// without connecting.
async fn socket_state(path: &Path, bridge_running: bool) -> &'static str {
    let is_socket = std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_socket());
    if bridge_running && is_socket {
        return "live";
    }
    match probe_socket(path).await {
        SocketProbe::Live => "live",
        SocketProbe::Stale => "stale",
        SocketProbe::Absent => "absent",
    }
}

/// Print status in text format
fn print_text_status(status: &StatusInfo) {
    println!("wsl-gpg-bridge Status");
    println!("=====================");
    println!();

    if status.running {
        println!("Status:   RUNNING");
        if let Some(pid) = status.pid {
            println!("PID:      {}", pid);
        }
    } else {
        println!("Status:   STOPPED");
        if status.pid.is_some() {
            println!("Note:     Stale PID file exists");
        }
    }
    println!("PID File: {}", status.pid_file);
    if let Some(user) = &status.user {
        println!("User:     {}", user);
    }

    println!();
    println!("Endpoints:");
    for ep in &status.endpoints {
        let port = ep
            .port
            .map(|p| format!(" (port {})", p))
            .unwrap_or_default();
        println!("  {:<14} socket {:<6} {}", ep.name, ep.socket_state, ep.socket);
        println!(
            "  {:<14} host   {:<6} {}{}",
            "", ep.descriptor_state, ep.descriptor, port
        );
    }
}

//! Scoped SSH tunnel to Nimbus
//!
//! Some environments keep Nimbus off the operator's network; a port
//! forward over SSH bridges the gap for the duration of one deployment.
//! The tunnel is a scoped resource: dropping it kills the ssh child, so
//! every exit path out of the kill/submit phase releases the forward.

use std::io::Read;
use std::net::{SocketAddr, TcpStream};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::cluster::Endpoint;

/// Local port the forward binds; matches the default Nimbus port so the
/// cluster commands need no endpoint override in the common case
pub const DEFAULT_LOCAL_PORT: u16 = 6627;

/// Tunnel parameters
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    /// SSH executable and any leading arguments; overridable for hosts
    /// that wrap ssh
    pub ssh_command: Vec<String>,

    /// SSH user; omitted means the ssh-level default
    pub user: Option<String>,

    /// Remote host running Nimbus
    pub host: String,

    /// Nimbus port on the remote side
    pub remote_port: u16,

    /// Local port the forward listens on
    pub local_port: u16,

    /// SSH-level connect timeout in seconds
    pub connect_timeout_seconds: u32,

    /// How long to wait for the local port to accept connections
    pub ready_timeout: Duration,

    /// Delay between readiness probes
    pub ready_poll_interval: Duration,
}

impl TunnelConfig {
    /// Standard tunnel to `host:remote_port` as `user`
    pub fn new(user: Option<String>, host: impl Into<String>, remote_port: u16) -> Self {
        Self {
            ssh_command: vec!["ssh".to_string()],
            user,
            host: host.into(),
            remote_port,
            local_port: DEFAULT_LOCAL_PORT,
            connect_timeout_seconds: 30,
            ready_timeout: Duration::from_secs(20),
            ready_poll_interval: Duration::from_millis(100),
        }
    }
}

/// Errors establishing the tunnel
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("failed to spawn ssh: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error while waiting for the tunnel: {0}")]
    Io(#[from] std::io::Error),

    #[error("ssh to {host} exited (status {status:?}) before the forward was ready\nSTDERR:\n{stderr}")]
    Exited {
        host: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("tunnel to {host}:{remote_port} not ready on local port {local_port} after {waited:?}")]
    NotReady {
        host: String,
        remote_port: u16,
        local_port: u16,
        waited: Duration,
    },
}

/// A live SSH port forward; dropping it tears the forward down
#[derive(Debug)]
pub struct SshTunnel {
    child: Child,
    local_port: u16,
}

/// Build the full ssh argument vector for a config.
///
/// Split out so the generated command is testable without spawning ssh.
pub fn ssh_forward_args(config: &TunnelConfig) -> Vec<String> {
    let mut args = vec![
        "-N".to_string(),
        "-L".to_string(),
        format!("{}:localhost:{}", config.local_port, config.remote_port),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", config.connect_timeout_seconds),
        "-o".to_string(),
        "ExitOnForwardFailure=yes".to_string(),
    ];
    let destination = match &config.user {
        Some(user) => format!("{}@{}", user, config.host),
        None => config.host.clone(),
    };
    args.push(destination);
    args
}

impl SshTunnel {
    /// Spawn the forward and wait until the local port accepts
    /// connections or the child gives up.
    pub fn open(config: &TunnelConfig) -> Result<Self, TunnelError> {
        let (program, leading) = config
            .ssh_command
            .split_first()
            .map(|(p, rest)| (p.as_str(), rest))
            .unwrap_or(("ssh", &[]));

        let mut child = Command::new(program)
            .args(leading)
            .args(ssh_forward_args(config))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(TunnelError::Spawn)?;

        let deadline = Instant::now() + config.ready_timeout;
        let probe_addr = SocketAddr::from(([127, 0, 0, 1], config.local_port));

        loop {
            if let Some(status) = child.try_wait()? {
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr);
                }
                return Err(TunnelError::Exited {
                    host: config.host.clone(),
                    status: status.code(),
                    stderr,
                });
            }

            if TcpStream::connect_timeout(&probe_addr, config.ready_poll_interval).is_ok() {
                return Ok(Self {
                    child,
                    local_port: config.local_port,
                });
            }

            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TunnelError::NotReady {
                    host: config.host.clone(),
                    remote_port: config.remote_port,
                    local_port: config.local_port,
                    waited: config.ready_timeout,
                });
            }

            std::thread::sleep(config.ready_poll_interval);
        }
    }

    /// Endpoint the cluster commands should use while the tunnel is up
    pub fn local_endpoint(&self) -> Endpoint {
        Endpoint::direct("localhost", self.local_port)
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

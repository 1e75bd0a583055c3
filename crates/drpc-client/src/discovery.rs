//! Endpoint discovery
//!
//! The desktop client listens on one of ten candidate IPC sockets
//! (`discord-ipc-0` through `discord-ipc-9`). Candidates are probed
//! strictly in order; the first successful connection wins. Probing is
//! never parallel: the peer is a singleton and must not see multiple live
//! connections from one discovery pass.
//!
//! After a successful authorization exchange the peer also exposes a local
//! HTTP endpoint. Its port is found by probing a small range above a fixed
//! base port; the root path answers 404 when the right port is hit.

use std::path::{Path, PathBuf};

use crate::config::ClientConfig;
use crate::error::RpcError;

/// Number of candidate IPC sockets
pub const SOCKET_CANDIDATES: u32 = 10;

/// Base port for HTTP endpoint discovery
pub const DEFAULT_BASE_PORT: u16 = 6463;

/// Size of the port range cycled during HTTP endpoint discovery
pub const ENDPOINT_PORT_RANGE: u16 = 10;

/// Maximum number of HTTP endpoint probes
pub const ENDPOINT_PROBE_ATTEMPTS: u32 = 30;

/// Per-probe HTTP timeout
const ENDPOINT_PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// Stream type for the platform's local IPC transport
#[cfg(unix)]
pub type IpcStream = tokio::net::UnixStream;

/// Stream type for the platform's local IPC transport
#[cfg(windows)]
pub type IpcStream = tokio::net::windows::named_pipe::NamedPipeClient;

/// Strip a trailing path separator from the runtime-directory prefix
fn normalize_prefix(prefix: &str) -> &str {
    prefix.strip_suffix('/').unwrap_or(prefix)
}

/// Runtime directory for IPC sockets on POSIX platforms
///
/// Fallback order: `XDG_RUNTIME_DIR`, `TMPDIR`, `TMP`, `TEMP`, then `/tmp`.
#[cfg(unix)]
fn runtime_dir() -> PathBuf {
    let prefix = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "/tmp".to_string());

    PathBuf::from(normalize_prefix(&prefix).to_string())
}

/// Path of the candidate socket with the given id
#[cfg(unix)]
pub fn socket_path(dir: Option<&Path>, id: u32) -> PathBuf {
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(runtime_dir);
    dir.join(format!("discord-ipc-{id}"))
}

/// Path of the candidate named pipe with the given id
///
/// Named pipes live in the pipe namespace, so the directory override is
/// ignored on Windows.
#[cfg(windows)]
pub fn socket_path(_dir: Option<&Path>, id: u32) -> PathBuf {
    PathBuf::from(format!(r"\\?\pipe\discord-ipc-{id}"))
}

#[cfg(unix)]
async fn try_connect(path: &Path) -> std::io::Result<IpcStream> {
    tokio::net::UnixStream::connect(path).await
}

#[cfg(windows)]
async fn try_connect(path: &Path) -> std::io::Result<IpcStream> {
    tokio::net::windows::named_pipe::ClientOptions::new().open(path)
}

/// Probe the candidate sockets in order and connect to the first responsive one
///
/// Exhausting all candidates fails with [`RpcError::TransportUnavailable`].
pub async fn connect_ipc(config: &ClientConfig) -> Result<IpcStream, RpcError> {
    for id in 0..SOCKET_CANDIDATES {
        let path = socket_path(config.socket_dir.as_deref(), id);

        match try_connect(&path).await {
            Ok(stream) => {
                tracing::debug!(path = %path.display(), "Connected to IPC socket");
                return Ok(stream);
            }
            Err(e) => {
                tracing::trace!(path = %path.display(), error = %e, "Socket candidate failed");
            }
        }
    }

    Err(RpcError::TransportUnavailable(SOCKET_CANDIDATES))
}

/// Probe local HTTP ports for the peer's API endpoint
///
/// Ports cycle through `base_port..base_port + 10`; a 404 from the root
/// path identifies the endpoint. Capped at [`ENDPOINT_PROBE_ATTEMPTS`]
/// probes, after which [`RpcError::EndpointDiscoveryFailed`] is returned.
pub async fn discover_endpoint(base_port: u16) -> Result<String, RpcError> {
    let client = reqwest::Client::builder()
        .timeout(ENDPOINT_PROBE_TIMEOUT)
        .build()?;

    for attempt in 0..ENDPOINT_PROBE_ATTEMPTS {
        let port = base_port + (attempt as u16 % ENDPOINT_PORT_RANGE);
        let endpoint = format!("http://127.0.0.1:{port}");

        match client.get(&endpoint).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::NOT_FOUND => {
                tracing::debug!(endpoint = %endpoint, "Found HTTP endpoint");
                return Ok(endpoint);
            }
            Ok(response) => {
                tracing::trace!(
                    endpoint = %endpoint,
                    status = %response.status(),
                    "Endpoint probe got unexpected status"
                );
            }
            Err(e) => {
                tracing::trace!(endpoint = %endpoint, error = %e, "Endpoint probe failed");
            }
        }
    }

    Err(RpcError::EndpointDiscoveryFailed(ENDPOINT_PROBE_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/run/user/1000/"), "/run/user/1000");
        assert_eq!(normalize_prefix("/tmp"), "/tmp");
    }

    #[cfg(unix)]
    #[test]
    fn test_socket_path_with_override() {
        let path = socket_path(Some(Path::new("/custom/run")), 3);
        assert_eq!(path, PathBuf::from("/custom/run/discord-ipc-3"));
    }

    #[cfg(unix)]
    #[test]
    fn test_socket_path_default_dir() {
        let path = socket_path(None, 0);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, "discord-ipc-0");
        assert!(path.is_absolute());
    }

    #[test]
    fn test_probe_ports_cycle_range() {
        let ports: Vec<u16> = (0..ENDPOINT_PROBE_ATTEMPTS)
            .map(|attempt| DEFAULT_BASE_PORT + (attempt as u16 % ENDPOINT_PORT_RANGE))
            .collect();

        assert_eq!(ports.len(), 30);
        assert_eq!(ports[0], 6463);
        assert_eq!(ports[9], 6472);
        assert_eq!(ports[10], 6463);
        assert!(ports.iter().all(|p| (6463..=6472).contains(p)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_ipc_exhausts_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::ClientConfig::new("1").with_socket_dir(dir.path());

        let result = connect_ipc(&config).await;
        assert!(matches!(
            result,
            Err(RpcError::TransportUnavailable(SOCKET_CANDIDATES))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_ipc_skips_dead_candidates() {
        let dir = tempfile::tempdir().unwrap();

        // Candidate 0 is absent; candidate 1 has a listener
        let listener =
            tokio::net::UnixListener::bind(dir.path().join("discord-ipc-1")).unwrap();
        let config = crate::ClientConfig::new("1").with_socket_dir(dir.path());

        let (stream, accepted) = tokio::join!(connect_ipc(&config), listener.accept());
        assert!(stream.is_ok());
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn test_discover_endpoint_finds_404() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    use tokio::io::{AsyncReadExt, AsyncWriteExt};
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket
                        .write_all(b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n")
                        .await;
                });
            }
        });

        let endpoint = discover_endpoint(port).await.unwrap();
        assert_eq!(endpoint, format!("http://127.0.0.1:{port}"));
    }

    #[tokio::test]
    async fn test_discover_endpoint_gives_up_after_cap() {
        // Nothing listens anywhere in this range
        let result = discover_endpoint(59263).await;
        assert!(matches!(
            result,
            Err(RpcError::EndpointDiscoveryFailed(ENDPOINT_PROBE_ATTEMPTS))
        ));
    }
}

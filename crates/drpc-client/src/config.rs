//! Client configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::discovery::DEFAULT_BASE_PORT;
use crate::registration::ProtocolRegistrar;

/// Default timeout for a connection attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the bounded client event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Configuration for an [`RpcClient`](crate::RpcClient)
///
/// The only required field is `client_id`; all others have defaults.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use drpc_client::ClientConfig;
///
/// let config = ClientConfig::new("609314057199288320")
///     .with_connect_timeout(Duration::from_secs(5));
/// assert_eq!(config.client_id, "609314057199288320");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Application client id sent in the handshake
    pub client_id: String,
    /// Timeout for a connection attempt
    pub connect_timeout: Duration,
    /// Capacity of the bounded client event channel
    pub event_channel_capacity: usize,
    /// Override for the directory searched for IPC sockets
    ///
    /// `None` uses the platform default (the runtime-directory fallback
    /// chain on POSIX, the pipe namespace on Windows).
    pub socket_dir: Option<PathBuf>,
    /// Base port for HTTP endpoint discovery
    pub base_port: u16,
    /// Optional URI-scheme registrar invoked on connect
    pub registrar: Option<Arc<dyn ProtocolRegistrar>>,
}

impl ClientConfig {
    /// Create a new configuration with the given client id and defaults
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            socket_dir: None,
            base_port: DEFAULT_BASE_PORT,
            registrar: None,
        }
    }

    /// Set the connection timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the event channel capacity (values below 1 are clamped to 1)
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Override the directory searched for IPC sockets
    #[must_use]
    pub fn with_socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = Some(dir.into());
        self
    }

    /// Set the base port for HTTP endpoint discovery
    #[must_use]
    pub fn with_base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    /// Inject a URI-scheme registrar
    #[must_use]
    pub fn with_registrar(mut self, registrar: Arc<dyn ProtocolRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("connect_timeout", &self.connect_timeout)
            .field("event_channel_capacity", &self.event_channel_capacity)
            .field("socket_dir", &self.socket_dir)
            .field("base_port", &self.base_port)
            .field("registrar", &self.registrar.as_ref().map(|_| "..."))
            .finish()
    }
}

//! Protocol-handler registration capability
//!
//! Registering the application's URI scheme with the operating system is a
//! platform side effect that callers must opt into by injecting a registrar;
//! the library never touches global state on its own. The scheme is derived
//! from the client id (`discord-<client_id>`), matching what the desktop
//! client expects for join/spectate deep links.

use std::io;

/// Capability for registering a URI scheme with the operating system
pub trait ProtocolRegistrar: Send + Sync {
    /// Register the given scheme for the running application
    fn register(&self, scheme: &str) -> io::Result<()>;
}

/// Registrar that does nothing
///
/// Useful for tests and for applications that manage scheme registration
/// themselves (e.g. through their installer).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegistrar;

impl ProtocolRegistrar for NoopRegistrar {
    fn register(&self, _scheme: &str) -> io::Result<()> {
        Ok(())
    }
}

/// URI scheme for the given application client id
pub fn uri_scheme(client_id: &str) -> String {
    format!("discord-{client_id}")
}

use std::io;
use std::net::SocketAddr;

use crate::session::SessionState;

/// Failures that keep a [`TransportSession`](crate::session::TransportSession)
/// from reaching `Running`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to bind {role} socket on {addr}: {source}")]
    Bind {
        role: &'static str,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("socket setup failed: {0}")]
    Socket(#[source] io::Error),
    #[error("session cannot start from state {0:?}")]
    InvalidState(SessionState),
    #[error("failed to spawn receive worker: {0}")]
    Worker(#[source] io::Error),
}

//! Transport seam between engine-side proxies and host-side stubs.
//!
//! The notifier never talks to a socket directly: the proxy invokes a
//! [`RemoteCaller`] and the serving side answers through a
//! [`RemoteEndpoint`]. Tests wire the two with the in-process
//! [`loopback`] pair; deployments put the framed [`stream`] codec over
//! any reliable byte stream.

pub mod loopback;
pub mod stream;

pub use loopback::{loopback_pair, LoopbackCaller, LoopbackServer};
pub use stream::{serve_connection, StreamCaller};

use crate::error::TransportError;

/// Client side of the call seam.
pub trait RemoteCaller: Send + Sync {
    /// Performs one request/reply exchange.
    ///
    /// # Errors
    ///
    /// Fails only for transport-level problems; application rejections
    /// travel in-band as a status in the reply bytes.
    fn call(&self, opcode: u32, request: &[u8]) -> Result<Vec<u8>, TransportError>;
}

/// Server side of the call seam.
pub trait RemoteEndpoint: Send + Sync {
    /// Handles one request and returns the reply bytes.
    ///
    /// Infallible at this level: malformed requests are answered with
    /// an in-band status rather than a torn connection.
    fn on_request(&self, opcode: u32, request: &[u8]) -> Vec<u8>;
}

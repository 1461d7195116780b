//! In-process transport backed by channels.
//!
//! A loopback pair answers calls serially on one dedicated worker
//! thread, which is the same ordering contract a per-connection channel
//! gives a real deployment. Tests use it to exercise the proxy, stub,
//! and registry together without a socket.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

use crate::error::TransportError;
use crate::transport::{RemoteCaller, RemoteEndpoint};

/// Calls buffered before senders block waiting for the worker.
const CALL_BUFFER: usize = 64;

struct CallMsg {
    opcode: u32,
    request: Vec<u8>,
    reply: Sender<Vec<u8>>,
}

/// Client half of a loopback pair. Clones share the worker.
#[derive(Debug, Clone)]
pub struct LoopbackCaller {
    tx: Sender<CallMsg>,
}

/// Server half of a loopback pair; owns the worker's lifetime.
#[derive(Debug)]
pub struct LoopbackServer {
    shutdown: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

/// Builds a connected caller/server pair around `endpoint`.
///
/// The worker exits when the server half shuts down or every caller
/// clone is gone; callers then observe `TransportError::Disconnected`.
#[must_use]
pub fn loopback_pair(endpoint: Arc<dyn RemoteEndpoint>) -> (LoopbackCaller, LoopbackServer) {
    let (tx, rx) = bounded::<CallMsg>(CALL_BUFFER);
    let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
    let handle = thread::Builder::new()
        .name("syncbell-loopback".into())
        .spawn(move || serve(&rx, &shutdown_rx, endpoint.as_ref()))
        .expect("failed to spawn loopback worker");
    (
        LoopbackCaller { tx },
        LoopbackServer {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        },
    )
}

fn serve(rx: &Receiver<CallMsg>, shutdown: &Receiver<()>, endpoint: &dyn RemoteEndpoint) {
    loop {
        crossbeam_channel::select! {
            recv(rx) -> msg => {
                let Ok(msg) = msg else { break };
                let reply = endpoint.on_request(msg.opcode, &msg.request);
                // A caller that stopped waiting is not an error.
                let _ = msg.reply.send(reply);
            }
            recv(shutdown) -> _ => break,
        }
    }
    debug!("loopback worker exiting");
}

impl LoopbackServer {
    /// Stops the worker and waits for an in-flight call to finish.
    pub fn shutdown(mut self) {
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LoopbackServer {
    fn drop(&mut self) {
        // Signal and detach; the worker finishes any in-flight call on
        // its own time.
        self.shutdown.take();
    }
}

impl RemoteCaller for LoopbackCaller {
    fn call(&self, opcode: u32, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send(CallMsg {
                opcode,
                request: request.to_vec(),
                reply: reply_tx,
            })
            .map_err(|_| disconnected("loopback server is gone"))?;
        reply_rx
            .recv()
            .map_err(|_| disconnected("loopback server dropped the call"))
    }
}

fn disconnected(message: &str) -> TransportError {
    TransportError::Disconnected {
        message: message.into(),
    }
}

//! Framed request/reply transport over a reliable byte stream.
//!
//! One frame out, one frame back, opcode echoed in the reply. The
//! caller serializes concurrent requests over the single stream; the
//! serving side answers frames in arrival order, so delivery order is
//! preserved end to end.

use std::io::{ErrorKind, Read, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::TransportError;
use crate::transport::{RemoteCaller, RemoteEndpoint};
use crate::wire::{Frame, StreamConfig};

/// Client over any owned byte stream, such as a `TcpStream`.
#[derive(Debug)]
pub struct StreamCaller<S> {
    stream: Mutex<S>,
    config: StreamConfig,
}

impl<S: Read + Write + Send> StreamCaller<S> {
    /// Wraps a connected stream with default frame limits.
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, StreamConfig::default())
    }

    /// Wraps a connected stream with explicit frame limits.
    pub fn with_config(stream: S, config: StreamConfig) -> Self {
        Self {
            stream: Mutex::new(stream),
            config,
        }
    }

    fn lock_stream(&self) -> MutexGuard<'_, S> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Read + Write + Send> RemoteCaller for StreamCaller<S> {
    fn call(&self, opcode: u32, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut stream = self.lock_stream();
        Frame::new(opcode, request.to_vec()).write_to(&mut *stream, &self.config)?;
        stream.flush()?;
        let reply = Frame::read_from(&mut *stream, &self.config)?;
        Ok(reply.payload)
    }
}

/// Serves framed requests from `stream` until the peer disconnects.
///
/// Every request frame is answered with a reply frame carrying the same
/// opcode. EOF between frames ends the loop cleanly; EOF inside a frame
/// means the peer died mid-request and surfaces as an error, as do
/// corrupt frames, since framing cannot resync after garbage.
///
/// # Errors
///
/// Frame-level corruption, truncation inside a frame, or I/O failure.
pub fn serve_connection<S: Read + Write>(
    mut stream: S,
    endpoint: &dyn RemoteEndpoint,
    config: &StreamConfig,
) -> Result<(), TransportError> {
    let mut first = [0u8; 1];
    loop {
        // A clean close is only visible here, before the next header
        // starts. Once the first byte has arrived the frame must complete.
        match stream.read(&mut first) {
            Ok(0) => {
                debug!("peer closed the connection");
                return Ok(());
            }
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
        let frame = Frame::read_from(&mut first.as_slice().chain(&mut stream), config)?;
        let reply = endpoint.on_request(frame.opcode, &frame.payload);
        Frame::new(frame.opcode, reply).write_to(&mut stream, config)?;
        stream.flush()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    struct Echo;

    impl RemoteEndpoint for Echo {
        fn on_request(&self, opcode: u32, request: &[u8]) -> Vec<u8> {
            let mut reply = opcode.to_le_bytes().to_vec();
            reply.extend_from_slice(request);
            reply
        }
    }

    fn tcp_pair() -> (TcpStream, thread::JoinHandle<Result<(), TransportError>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve_connection(stream, &Echo, &StreamConfig::default())
        });
        (TcpStream::connect(addr).unwrap(), server)
    }

    #[test]
    fn test_calls_round_trip_over_tcp() {
        let (stream, server) = tcp_pair();
        let caller = StreamCaller::new(stream);

        for i in 0..5u32 {
            let request = vec![i as u8; (i as usize) * 100];
            let reply = caller.call(i, &request).unwrap();
            assert_eq!(&reply[..4], &i.to_le_bytes());
            assert_eq!(&reply[4..], &request[..]);
        }

        drop(caller);
        assert!(server.join().unwrap().is_ok());
    }

    #[test]
    fn test_oversize_request_fails_client_side() {
        let (stream, server) = tcp_pair();
        let caller = StreamCaller::with_config(stream, StreamConfig { max_frame_len: 16 });

        let err = caller.call(0, &[0u8; 17]).unwrap_err();
        assert!(matches!(
            err,
            TransportError::FrameTooLarge { len: 17, max: 16 }
        ));

        // Nothing was written; the connection still works afterwards.
        let reply = caller.call(1, b"ok").unwrap();
        assert_eq!(&reply[4..], b"ok");

        drop(caller);
        assert!(server.join().unwrap().is_ok());
    }

    #[test]
    fn test_garbage_tears_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve_connection(stream, &Echo, &StreamConfig::default())
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"NOPE").unwrap();
        stream.flush().unwrap();
        drop(stream);

        assert!(matches!(
            server.join().unwrap(),
            Err(TransportError::BadMagic)
        ));
    }

    #[test]
    fn test_peer_death_mid_frame_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve_connection(stream, &Echo, &StreamConfig::default())
        });

        let mut bytes = Vec::new();
        Frame::new(7, b"truncated".to_vec())
            .write_to(&mut bytes, &StreamConfig::default())
            .unwrap();

        // All but the tail of a valid frame, then the peer dies.
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(&bytes[..bytes.len() - 3]).unwrap();
        stream.flush().unwrap();
        drop(stream);

        let Err(TransportError::Io(err)) = server.join().unwrap() else {
            panic!("expected an I/O error");
        };
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }
}

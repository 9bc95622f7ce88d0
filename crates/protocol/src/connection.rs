//! Framed connection between a pipeline node and the inspector
//!
//! A `Connection` owns one byte stream and moves whole frames over it. Reads
//! go through an internal buffer, so a frame is only handed out once every
//! payload byte has arrived, however the stream chops it up.
//!
//! The stream type is generic so tests can drive the framing with in-memory
//! streams; production code uses `TcpStream`.

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::io::poll_read_buf;
use tracing::{debug, trace};

use crate::Result;
use crate::error::ProtocolError;
use crate::frame::{Frame, HEADER_LEN, try_decode};

/// Initial read buffer capacity
const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// A persistent stream carrying ordered frames between two endpoints
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    /// Underlying byte stream
    stream: S,
    /// Bytes read but not yet returned as frames
    read_buf: BytesMut,
    /// Set once `close()` ran
    closed: bool,
    /// Set once the peer signalled end of stream
    peer_eof: bool,
}

impl Connection<TcpStream> {
    /// Connect to a listening inspector
    pub async fn connect(address: &str, port: u16) -> Result<Self> {
        let target = format!("{address}:{port}");
        let stream = TcpStream::connect(&target)
            .await
            .map_err(|e| ProtocolError::connection(target.clone(), e))?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(address = %target, error = %e, "failed to set TCP_NODELAY");
        }

        debug!(address = %target, "connection established");
        Ok(Self::new(stream))
    }

    /// Address of the remote endpoint
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    /// Write a frame without waiting
    ///
    /// Used where awaiting is impossible (drop paths). Fails with a transport
    /// error if the socket cannot take the whole frame right now.
    pub fn try_send_now(&mut self, frame: &Frame) -> Result<()> {
        if self.closed {
            return Err(ProtocolError::ConnectionClosed);
        }

        let encoded = frame.encode();
        let mut written = 0;
        while written < encoded.len() {
            match self.stream.try_write(&encoded[written..]) {
                Ok(0) => return Err(ProtocolError::ConnectionClosed),
                Ok(n) => written += n,
                Err(e) => return Err(ProtocolError::Transport(e)),
            }
        }

        trace!(frame_type = %frame.frame_type, len = frame.payload_len(), "frame written");
        Ok(())
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established stream
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            closed: false,
            peer_eof: false,
        }
    }

    /// Send one frame
    ///
    /// Writes the 12-byte header, then the payload, then flushes. Returns
    /// once every byte has been handed to the stream.
    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        if self.closed {
            return Err(ProtocolError::ConnectionClosed);
        }

        self.stream.write_all(&frame.header().encode()).await?;
        self.stream.write_all(&frame.payload).await?;
        self.stream.flush().await?;

        trace!(frame_type = %frame.frame_type, len = frame.payload_len(), "frame sent");
        Ok(())
    }

    /// Receive one complete frame
    ///
    /// Keeps reading until the header and all declared payload bytes are
    /// buffered. Fails with `ConnectionClosed` if the stream ends first.
    /// Cancellation safe: bytes read so far stay buffered.
    pub async fn receive(&mut self) -> Result<Frame> {
        loop {
            if self.closed {
                return Err(ProtocolError::ConnectionClosed);
            }

            if let Some(frame) = try_decode(&mut self.read_buf)? {
                trace!(frame_type = %frame.frame_type, len = frame.payload_len(), "frame received");
                return Ok(frame);
            }

            if self.peer_eof {
                return Err(ProtocolError::ConnectionClosed);
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                debug!(buffered = self.read_buf.len(), "peer closed connection");
                self.peer_eof = true;
            }
        }
    }

    /// Receive one frame only if it has fully arrived
    ///
    /// Never blocks. Returns `Ok(None)` while the header or any payload byte
    /// is still in flight; what arrived so far stays buffered for the next
    /// call.
    pub fn try_receive(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Err(ProtocolError::ConnectionClosed);
        }

        loop {
            if let Some(frame) = try_decode(&mut self.read_buf)? {
                trace!(frame_type = %frame.frame_type, len = frame.payload_len(), "frame received");
                return Ok(Some(frame));
            }

            if self.peer_eof {
                return Err(ProtocolError::ConnectionClosed);
            }

            if !self.poll_fill()? {
                return Ok(None);
            }
        }
    }

    /// Check whether a full frame header is buffered
    ///
    /// Never blocks. Pulls whatever the stream has ready into the internal
    /// buffer, which does not consume anything from the frame sequence:
    /// `receive()` returns the same frames no matter how often this is called.
    pub fn is_ready_to_receive(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if self.read_buf.len() < HEADER_LEN {
            self.fill_nonblocking();
        }
        self.read_buf.len() >= HEADER_LEN
    }

    /// Check whether the peer has closed its side
    #[inline]
    pub fn is_peer_closed(&self) -> bool {
        self.peer_eof
    }

    /// Check whether `close()` has been called
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of bytes buffered but not yet returned as frames
    #[inline]
    pub fn buffered_len(&self) -> usize {
        self.read_buf.len()
    }

    /// Close the connection
    ///
    /// Idempotent. Every later `send()` or `receive()` fails with
    /// `ConnectionClosed`.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.stream.shutdown().await {
            debug!(error = %e, "error shutting down connection");
        }
    }

    /// Read what is available, up to one header's worth, without waiting
    fn fill_nonblocking(&mut self) {
        while !self.peer_eof && self.read_buf.len() < HEADER_LEN {
            match self.poll_fill() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => debug!(error = %e, "read error while polling for readiness"),
            }
        }
    }

    /// One read attempt with a no-op waker
    ///
    /// Returns false when the stream has nothing ready. A read error also
    /// marks the stream as ended.
    fn poll_fill(&mut self) -> Result<bool> {
        let mut cx = Context::from_waker(Waker::noop());

        match poll_read_buf(Pin::new(&mut self.stream), &mut cx, &mut self.read_buf) {
            Poll::Ready(Ok(0)) => {
                debug!(buffered = self.read_buf.len(), "peer closed connection");
                self.peer_eof = true;
                Ok(true)
            }
            Poll::Ready(Ok(_)) => Ok(true),
            Poll::Ready(Err(e)) => {
                self.peer_eof = true;
                Err(e.into())
            }
            Poll::Pending => Ok(false),
        }
    }
}

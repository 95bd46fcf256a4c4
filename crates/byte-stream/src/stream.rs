//! The byte-stream adapter

use tokio::sync::watch;
use tracing::debug;

use crate::{DEFAULT_MAX_READ, StreamError, StreamResult, Transport};

/// Adapter configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Largest single read request the adapter will serve
    pub max_read: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_read: DEFAULT_MAX_READ,
        }
    }
}

/// One-shot close notification observer.
///
/// Any number of observers may wait; the signal fires at most once.
#[derive(Debug, Clone)]
pub struct CloseSignal {
    rx: watch::Receiver<bool>,
}

impl CloseSignal {
    /// Resolve once the stream has closed. Returns immediately if it
    /// already has.
    pub async fn wait(mut self) {
        if *self.rx.borrow() {
            return;
        }
        // An error means the stream was dropped, which also ends it
        let _ = self.rx.changed().await;
    }

    pub fn is_closed(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}

/// Ordered, reliable, bidirectional byte channel over one raw transport.
///
/// The owning task is the only mutator. Closing the stream is the one
/// cancellation mechanism: any later read or write fails with a stream
/// error instead of hanging.
pub struct ByteStream {
    transport: Box<dyn Transport>,
    config: StreamConfig,
    closed: bool,
    close_tx: watch::Sender<bool>,
}

impl ByteStream {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_config(transport, StreamConfig::default())
    }

    pub fn with_config(transport: impl Transport + 'static, config: StreamConfig) -> Self {
        let (close_tx, _) = watch::channel(false);
        Self {
            transport: Box::new(transport),
            config,
            closed: false,
            close_tx,
        }
    }

    /// Read exactly `buf.len()` bytes.
    ///
    /// Fails with [`StreamError::Eof`] without suspending when the stream
    /// is already at end of input, and with [`StreamError::Incomplete`]
    /// when the transport ends partway through.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> StreamResult<()> {
        self.check_readable(buf.len())?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = self.transport.read(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(if filled == 0 {
                    StreamError::Eof
                } else {
                    StreamError::Incomplete {
                        expected: buf.len(),
                        got: filled,
                    }
                });
            }
            filled += n;
        }
        Ok(())
    }

    /// Read at least one byte, up to `buf.len()`. Short reads are normal.
    pub async fn read_some(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        self.check_readable(buf.len())?;

        let n = self.transport.read(buf).await?;
        if n == 0 {
            return Err(StreamError::Eof);
        }
        Ok(n)
    }

    /// Write the whole payload, looping over partial transport writes.
    /// No-op on empty input.
    pub async fn write_all(&mut self, mut data: &[u8]) -> StreamResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        if self.is_closed() {
            return Err(StreamError::Eof);
        }

        while !data.is_empty() {
            let n = self.transport.write(data).await?;
            if n == 0 {
                return Err(StreamError::Io(std::io::ErrorKind::WriteZero.into()));
            }
            data = &data[n..];
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.transport.is_closed()
    }

    /// Close the underlying transport. Idempotent; the close notification
    /// fires exactly once, after the transport close completes.
    pub async fn close(&mut self) -> StreamResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self.transport.close().await;
        let _ = self.close_tx.send(true);

        if let Err(e) = &result {
            debug!(error = %e, "transport close reported a fault");
        }
        Ok(result?)
    }

    /// Observer handle on the one-shot close notification.
    pub fn closed(&self) -> CloseSignal {
        CloseSignal {
            rx: self.close_tx.subscribe(),
        }
    }

    /// Remote address of the underlying transport, for diagnostics.
    pub fn remote_addr(&self) -> Option<std::net::SocketAddr> {
        self.transport.remote_addr()
    }

    fn check_readable(&self, requested: usize) -> StreamResult<()> {
        if requested > self.config.max_read {
            return Err(StreamError::LimitExceeded {
                requested,
                limit: self.config.max_read,
            });
        }
        if self.is_closed() {
            return Err(StreamError::Eof);
        }
        Ok(())
    }
}

//! Bounded waits for network reads
//!
//! Every blocking read races the operation against a fixed deadline and the
//! session's cancellation token. The first to finish wins and the losers are
//! dropped. A deadline win is reported as `ConnectionError::Timeout` and is
//! never retried here.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::error::{ConnectionError, Error, Result};

/// Deadline applied to each read
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `operation` until it completes, `deadline` passes, or `cancel` fires
pub async fn bounded<T, F>(operation: F, deadline: Duration, cancel: &CancellationToken) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ConnectionError::Cancelled.into()),
        result = operation => result,
        _ = tokio::time::sleep(deadline) => Err(ConnectionError::Timeout.into()),
    }
}

/// Read half of a transport where every read is bounded
#[derive(Debug)]
pub struct BoundedReader<R> {
    inner: R,
    deadline: Duration,
    cancel: CancellationToken,
}

impl<R: AsyncRead + Unpin> BoundedReader<R> {
    pub fn new(inner: R, deadline: Duration, cancel: CancellationToken) -> Self {
        Self {
            inner,
            deadline,
            cancel,
        }
    }

    /// Receive exactly `len` bytes.
    ///
    /// A stream that ends before `len` bytes arrive yields
    /// `ConnectionError::OrderlyShutdown`.
    pub async fn receive(&mut self, len: usize) -> Result<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }

        let inner = &mut self.inner;
        let read = async move {
            let mut buf = vec![0u8; len];
            inner.read_exact(&mut buf).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    Error::from(ConnectionError::OrderlyShutdown)
                } else {
                    Error::Io(e)
                }
            })?;
            Ok(Bytes::from(buf))
        };
        bounded(read, self.deadline, &self.cancel).await
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

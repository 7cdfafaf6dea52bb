//! Consumption of externally sourced random bytes.
//!
//! There is no local generator in this crate. Every random
//! decision is made from bytes obtained through a [`QuantumByteSource`], and
//! each byte is read at most once.

use crate::error::{ByteSourceError, DiscoveryError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

const STAGE: &str = "quantum byte request";

/// A provider of true random bytes.
///
/// Implementations may return fewer bytes than requested; callers ask again
/// for the remainder. An empty answer is treated as a malformed response.
/// When a deadline is given the call must not outlive it.
#[cfg_attr(test, mockall::automock)]
pub trait QuantumByteSource: Send + Sync {
    fn request_bytes(
        &self,
        count: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<u8>, ByteSourceError>;
}

/// Shared flag a caller flips to abandon an in-flight request
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bytes drawn for a single recommendation request.
///
/// The read offset only moves forward. When the buffer runs dry it asks the
/// source for fresh bytes instead of recycling old ones.
pub struct RandomByteBuffer<'a> {
    source: &'a dyn QuantumByteSource,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    bytes: Vec<u8>,
    offset: usize,
    requests: usize,
}

impl<'a> RandomByteBuffer<'a> {
    pub fn new(
        source: &'a dyn QuantumByteSource,
        cancel: CancellationToken,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            source,
            cancel,
            deadline,
            bytes: Vec::new(),
            offset: 0,
            requests: 0,
        }
    }

    /// Bytes read so far
    pub fn consumed(&self) -> usize {
        self.offset
    }

    /// Calls made to the byte source so far
    pub fn requests(&self) -> usize {
        self.requests
    }

    fn available(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Fails once the caller cancelled or the deadline passed
    fn check_interrupted(&self) -> Result<(), DiscoveryError> {
        if self.cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled { stage: STAGE });
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(DiscoveryError::DeadlineExceeded { stage: STAGE });
        }
        Ok(())
    }

    /// Make sure at least `count` unread bytes are buffered.
    ///
    /// Bytes that arrive after cancellation or after the deadline are
    /// discarded and the request fails.
    pub fn fill(&mut self, count: usize) -> Result<(), DiscoveryError> {
        while self.available() < count {
            self.check_interrupted()?;

            let missing = count - self.available();
            self.requests += 1;
            let response = self.source.request_bytes(missing, self.deadline);
            self.check_interrupted()?;
            let fresh = response.map_err(|source| DiscoveryError::ExternalSource {
                stage: STAGE,
                source,
            })?;
            if fresh.is_empty() {
                return Err(DiscoveryError::ExternalSource {
                    stage: STAGE,
                    source: ByteSourceError::Malformed(
                        "provider returned no bytes".to_string(),
                    ),
                });
            }
            log::trace!("Received {} of {} missing random bytes", fresh.len(), missing);
            self.bytes.extend_from_slice(&fresh);
        }
        Ok(())
    }

    fn take(&mut self, count: usize) -> Result<&[u8], DiscoveryError> {
        self.fill(count)?;
        let start = self.offset;
        self.offset += count;
        Ok(&self.bytes[start..self.offset])
    }

    /// Uniform index in `0..bound` without modulo bias.
    ///
    /// Reads the fewest whole bytes able to represent `bound` values and
    /// rejects readings from the incomplete top band, fetching new bytes for
    /// each retry.
    pub fn draw_index(&mut self, bound: usize) -> Result<usize, DiscoveryError> {
        if bound == 0 {
            return Err(DiscoveryError::invalid("index draw", "bound must be positive"));
        }
        if bound == 1 {
            return Ok(0);
        }

        let width = bytes_for_bound(bound);
        let space = 1u128 << (8 * width);
        let bound = bound as u128;
        let limit = space - space % bound;
        loop {
            let value = self
                .take(width)?
                .iter()
                .fold(0u128, |acc, &b| (acc << 8) | u128::from(b));
            if value < limit {
                return Ok((value % bound) as usize);
            }
            log::trace!("Rejected random value {value} for bound {bound}");
        }
    }
}

/// Whole bytes needed to represent `bound` distinct values (0 for bound <= 1)
pub fn bytes_for_bound(bound: usize) -> usize {
    if bound <= 1 {
        return 0;
    }
    let mut width = 1;
    while (1u128 << (8 * width)) < bound as u128 {
        width += 1;
    }
    width
}

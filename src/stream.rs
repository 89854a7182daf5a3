//! Bulk streaming engine.
//!
//! A stream keeps a fixed pool of buffers circulating through one bulk
//! endpoint. Each buffer slot is either ready (owned here, safe to fill or
//! drain) or pending (owned by the transport until its completion is
//! reported). One coordinating future waits for completions, hands the
//! buffer to the user callback and resubmits it, so the callback's speed is
//! the only throttle: at most `transfer_count` buffers are ever in flight.
//!
//! Shutdown is cooperative. A stop from the callback, an external
//! [`StopSignal`] or a transport fault asks the endpoint to cancel every
//! pending transfer, then the engine keeps draining completions until none
//! are left. Only then is the outcome reported, carrying the first real error
//! if there was one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nusb::transfer::TransferError;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Default number of concurrently submitted transfers.
pub const DEFAULT_TRANSFER_COUNT: usize = 4;

/// Default size of each transfer buffer in bytes.
pub const DEFAULT_TRANSFER_BUFFER_SIZE: usize = 262_144;

/// High-speed bulk max packet size. Buffer sizes should be a multiple.
pub const USB_PACKET_SIZE: usize = 512;

/// Buffer pool shape for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// How many buffers circulate concurrently.
    pub transfer_count: usize,
    /// Size of each buffer in bytes.
    pub transfer_buffer_size: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            transfer_count: DEFAULT_TRANSFER_COUNT,
            transfer_buffer_size: DEFAULT_TRANSFER_BUFFER_SIZE,
        }
    }
}

impl StreamOptions {
    pub fn new(transfer_count: usize, transfer_buffer_size: usize) -> Self {
        Self {
            transfer_count,
            transfer_buffer_size,
        }
    }

    /// Reject pool shapes the engine cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.transfer_count == 0 {
            return Err(Error::invalid("transfer_count must be at least 1"));
        }
        if self.transfer_buffer_size == 0 {
            return Err(Error::invalid("transfer_buffer_size must be at least 1"));
        }
        if self.transfer_buffer_size % USB_PACKET_SIZE != 0 {
            debug!(
                "transfer_buffer_size {} is not a multiple of {}; transfers may be truncated",
                self.transfer_buffer_size, USB_PACKET_SIZE
            );
        }
        Ok(())
    }
}

/// Which way samples flow on the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to host: the callback consumes received buffers.
    In,
    /// Host to device: the callback fills buffers before they are sent.
    Out,
}

/// Returned by the per-buffer callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Shared, idempotent stop request.
///
/// Once requested, the next callback invocation is the last one regardless
/// of what it returns. Requesting does not wait for the stream to end.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A settled transfer handed back by a [`BulkEndpoint`].
#[derive(Debug)]
pub struct Transfer {
    /// Slot tag given at submission.
    pub slot: usize,
    /// The buffer, returned to the caller's ownership.
    pub buffer: Vec<u8>,
    /// Bytes actually moved.
    pub actual_len: usize,
    pub status: std::result::Result<(), TransferError>,
}

/// One bulk endpoint with a queue of in-flight transfers.
///
/// `submit` moves the buffer to the transport; it comes back through
/// `next_complete` exactly once, either completed or cancelled. For an IN
/// endpoint the buffer's length is the requested transfer size; for an OUT
/// endpoint its contents are sent.
#[allow(async_fn_in_trait)]
pub trait BulkEndpoint {
    fn submit(&mut self, slot: usize, buffer: Vec<u8>);

    /// Wait for the next settled transfer. `None` when nothing is pending.
    async fn next_complete(&mut self) -> Option<Transfer>;

    /// Ask the transport to cancel every pending transfer. Cancelled
    /// transfers still come back through `next_complete`.
    fn cancel_all(&mut self);
}

enum Slot {
    Ready(Vec<u8>),
    Pending,
}

/// Per-slot ownership bookkeeping for one stream.
struct Pool {
    slots: Vec<Slot>,
    pending: usize,
}

impl Pool {
    fn new(options: &StreamOptions) -> Self {
        let slots = (0..options.transfer_count)
            .map(|_| Slot::Ready(vec![0u8; options.transfer_buffer_size]))
            .collect();
        Self { slots, pending: 0 }
    }

    /// Move a ready buffer to the transport, restored to full size.
    fn submit<E: BulkEndpoint>(&mut self, endpoint: &mut E, slot: usize, size: usize) {
        if let Slot::Ready(mut buffer) = std::mem::replace(&mut self.slots[slot], Slot::Pending) {
            buffer.resize(size, 0);
            self.pending += 1;
            endpoint.submit(slot, buffer);
        }
    }

    /// Take a buffer back from the transport. `false` for a slot that was
    /// not pending.
    fn settle(&mut self, slot: usize, buffer: Vec<u8>) -> bool {
        match self.slots.get_mut(slot) {
            Some(entry) if matches!(entry, Slot::Pending) => {
                *entry = Slot::Ready(buffer);
                self.pending -= 1;
                true
            }
            _ => false,
        }
    }

    fn ready_mut(&mut self, slot: usize) -> Option<&mut Vec<u8>> {
        match self.slots.get_mut(slot) {
            Some(Slot::Ready(buffer)) => Some(buffer),
            _ => None,
        }
    }
}

/// Run the callback against the buffer, then apply any external stop.
fn dispatch<F>(on_buffer: &mut F, stop: &StopSignal, buffer: &mut [u8]) -> Flow
where
    F: FnMut(&mut [u8]) -> Flow,
{
    let flow = on_buffer(buffer);
    if stop.is_requested() {
        Flow::Stop
    } else {
        flow
    }
}

/// Drive a continuous stream through `endpoint` until the callback stops,
/// `stop` is requested, or a transfer fails.
///
/// For [`Direction::Out`] every buffer is pre-filled before anything is
/// submitted; a stop during pre-fill ends the stream successfully with no
/// transfer ever submitted. For [`Direction::In`] the callback sees each
/// buffer sliced to the received length.
///
/// Resolves only once no transfer is pending.
pub async fn run_stream<E, F>(
    endpoint: &mut E,
    direction: Direction,
    options: &StreamOptions,
    stop: &StopSignal,
    mut on_buffer: F,
) -> Result<()>
where
    E: BulkEndpoint,
    F: FnMut(&mut [u8]) -> Flow,
{
    options.validate()?;
    let size = options.transfer_buffer_size;
    let mut pool = Pool::new(options);

    if direction == Direction::Out {
        for slot in pool.slots.iter_mut() {
            if let Slot::Ready(buffer) = slot {
                if dispatch(&mut on_buffer, stop, buffer) == Flow::Stop {
                    debug!("Stream stopped during pre-fill, nothing submitted");
                    return Ok(());
                }
            }
        }
    }

    for slot in 0..pool.slots.len() {
        pool.submit(endpoint, slot, size);
    }
    info!(
        "Streaming {:?} with {} x {} byte transfers",
        direction, options.transfer_count, size
    );

    let mut cancelling = false;
    let mut first_error: Option<Error> = None;
    let mut delivered: u64 = 0;

    while pool.pending > 0 {
        let Some(done) = endpoint.next_complete().await else {
            warn!(
                "Endpoint drained with {} transfers still accounted as pending",
                pool.pending
            );
            return Err(first_error.unwrap_or_else(|| {
                Error::InvalidResponse(format!(
                    "endpoint lost {} pending transfers",
                    pool.pending
                ))
            }));
        };
        let Transfer {
            slot,
            buffer,
            actual_len,
            status,
        } = done;

        if !pool.settle(slot, buffer) {
            warn!("Completion for slot {} which was not pending", slot);
            continue;
        }

        if let Err(e) = status {
            if cancelling && e == TransferError::Cancelled {
                continue;
            }
            if first_error.is_none() {
                warn!("Transfer on slot {} failed: {}", slot, e);
                first_error = Some(Error::Transfer(e));
            } else {
                debug!("Discarding error during unwind on slot {}: {}", slot, e);
            }
            if !cancelling {
                cancelling = true;
                endpoint.cancel_all();
            }
            continue;
        }

        if cancelling {
            continue;
        }

        let Some(buffer) = pool.ready_mut(slot) else {
            continue;
        };
        let flow = match direction {
            Direction::In => {
                let len = actual_len.min(buffer.len());
                dispatch(&mut on_buffer, stop, &mut buffer[..len])
            }
            Direction::Out => {
                buffer.resize(size, 0);
                dispatch(&mut on_buffer, stop, buffer)
            }
        };
        delivered += 1;

        if flow == Flow::Stop {
            debug!("Stop after {} buffers, cancelling in-flight transfers", delivered);
            cancelling = true;
            endpoint.cancel_all();
            continue;
        }

        pool.submit(endpoint, slot, size);
    }

    info!("Stream {:?} ended after {} buffers", direction, delivered);
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Cancel whatever is still queued on `endpoint` and wait until it has all
/// come back. Returns how many transfers were reclaimed.
pub async fn drain<E: BulkEndpoint>(endpoint: &mut E) -> usize {
    endpoint.cancel_all();
    let mut reclaimed = 0;
    while let Some(done) = endpoint.next_complete().await {
        debug!("Reclaimed slot {} ({:?})", done.slot, done.status);
        reclaimed += 1;
    }
    reclaimed
}

/// Send `data` sequentially in `chunk_size` pieces, one transfer at a time.
pub async fn write_chunks<E: BulkEndpoint>(
    endpoint: &mut E,
    data: &[u8],
    chunk_size: usize,
) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::invalid("chunk_size must be at least 1"));
    }

    for (n, chunk) in data.chunks(chunk_size).enumerate() {
        endpoint.submit(0, chunk.to_vec());
        let done = endpoint
            .next_complete()
            .await
            .ok_or_else(|| Error::InvalidResponse(format!("chunk {} never completed", n)))?;
        done.status.map_err(Error::Transfer)?;
        if done.actual_len != chunk.len() {
            return Err(Error::InvalidResponse(format!(
                "short write on chunk {}: {} of {} bytes",
                n,
                done.actual_len,
                chunk.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = StreamOptions::default();
        assert_eq!(options.transfer_count, 4);
        assert_eq!(options.transfer_buffer_size, 262_144);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_options_rejected() {
        assert!(matches!(
            StreamOptions::new(0, 512).validate(),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            StreamOptions::new(4, 0).validate(),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_unaligned_size_is_allowed() {
        assert!(StreamOptions::new(1, 16).validate().is_ok());
    }

    #[test]
    fn test_stop_signal_idempotent() {
        let stop = StopSignal::new();
        let other = stop.clone();
        assert!(!stop.is_requested());
        other.request();
        other.request();
        assert!(stop.is_requested());
        stop.reset();
        assert!(!other.is_requested());
    }

    #[test]
    fn test_dispatch_overrides_continue_when_stopped() {
        let stop = StopSignal::new();
        let mut calls = 0;
        let mut cb = |_: &mut [u8]| {
            calls += 1;
            Flow::Continue
        };
        let mut buf = [0u8; 4];
        assert_eq!(dispatch(&mut cb, &stop, &mut buf), Flow::Continue);
        stop.request();
        assert_eq!(dispatch(&mut cb, &stop, &mut buf), Flow::Stop);
        assert_eq!(calls, 2);
    }
}

//! Session: exclusive use of one opened HackRF.
//!
//! A session owns the control channel and both bulk endpoints. The endpoints
//! sit behind a single lock together with the [`ModeMachine`], so holding the
//! lock is what "a stream is active" means. Every stream-shaped operation
//! (`receive`, `transmit`, `sweep_receive`, `upload_cpld`) takes the lock
//! without waiting, moves the device out of `OFF`, runs, and puts the device
//! back to `OFF` before the lock is released.
//!
//! These futures are not cancel-safe. Dropping one mid-stream (through
//! `tokio::select!` or a timeout) releases the lock with transfers still
//! queued and the device out of `OFF`. The session notices on the next
//! stream-shaped call, which cancels and drains the leftovers and sends `OFF`
//! before doing anything else.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::control::ControlChannel;
use crate::error::{Error, Result};
use crate::mode::{ModeMachine, TransceiverMode};
use crate::stream::{self, BulkEndpoint, Direction, Flow, StopSignal, StreamOptions};

/// Firmware images are written in pieces of this size.
pub const CPLD_CHUNK_SIZE: usize = 512;

/// Oldest USB API that understands sweep mode.
pub const SWEEP_MIN_API_VERSION: u16 = 0x0102;

struct Endpoints<I, O> {
    rx: I,
    tx: O,
    mode: ModeMachine,
    /// Cleared while an operation runs, set again once the device is back
    /// to `OFF`. Still clear at lock time means the last future was dropped.
    settled: bool,
}

impl<I: BulkEndpoint, O: BulkEndpoint> Endpoints<I, O> {
    /// Clean up after an operation whose future was dropped half way.
    async fn recover<C: ControlChannel>(&mut self, control: &C) -> Result<()> {
        warn!(
            "Previous operation was abandoned in {}, recovering",
            self.mode.current()
        );
        let reclaimed = stream::drain(&mut self.rx).await + stream::drain(&mut self.tx).await;
        debug!("Reclaimed {} abandoned transfers", reclaimed);
        self.mode.leave(control).await?;
        self.settled = true;
        Ok(())
    }
}

/// An opened device with its claimed interface.
pub struct Session<C, I, O> {
    control: C,
    endpoints: Mutex<Endpoints<I, O>>,
    stop: StopSignal,
    api_version: u16,
    sweep_configured: AtomicBool,
}

impl<C, I, O> Session<C, I, O>
where
    C: ControlChannel,
    I: BulkEndpoint,
    O: BulkEndpoint,
{
    /// Assemble a session from an already claimed interface.
    ///
    /// `api_version` is the firmware's USB API version (BCD, e.g. `0x0102`).
    pub fn new(control: C, rx: I, tx: O, api_version: u16) -> Self {
        Self {
            control,
            endpoints: Mutex::new(Endpoints {
                rx,
                tx,
                mode: ModeMachine::new(),
                settled: true,
            }),
            stop: StopSignal::new(),
            api_version,
            sweep_configured: AtomicBool::new(false),
        }
    }

    pub fn api_version(&self) -> u16 {
        self.api_version
    }

    pub(crate) fn control(&self) -> &C {
        &self.control
    }

    /// Whether a stream or firmware upload currently holds the session.
    pub fn is_streaming(&self) -> bool {
        self.endpoints.try_lock().is_err()
    }

    /// The recorded transceiver mode, or `None` while a stream is active.
    pub fn transceiver_mode(&self) -> Option<TransceiverMode> {
        self.endpoints
            .try_lock()
            .ok()
            .map(|endpoints| endpoints.mode.current())
    }

    /// Ask the active stream to end after its next callback invocation.
    ///
    /// Non-blocking and idempotent. The request is cleared when the next
    /// stream starts.
    pub fn request_stop(&self) {
        self.stop.request();
    }

    /// A handle that can request a stop from elsewhere (another task, a
    /// signal handler).
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Fail with [`Error::ApiVersionUnsupported`] unless the firmware is at
    /// least `required`.
    pub fn require_api_version(&self, required: u16) -> Result<()> {
        if self.api_version < required {
            return Err(Error::ApiVersionUnsupported {
                required,
                actual: self.api_version,
            });
        }
        Ok(())
    }

    pub(crate) fn mark_sweep_configured(&self) {
        self.sweep_configured.store(true, Ordering::SeqCst);
    }

    /// Receive samples. `on_buffer` sees each received buffer, sliced to the
    /// number of bytes that arrived.
    pub async fn receive<F>(&self, options: &StreamOptions, on_buffer: F) -> Result<()>
    where
        F: FnMut(&mut [u8]) -> Flow,
    {
        self.run_mode_stream(TransceiverMode::Receive, Direction::In, options, on_buffer)
            .await
    }

    /// Transmit samples. `on_buffer` fills each buffer before it is sent.
    pub async fn transmit<F>(&self, options: &StreamOptions, on_buffer: F) -> Result<()>
    where
        F: FnMut(&mut [u8]) -> Flow,
    {
        self.run_mode_stream(TransceiverMode::Transmit, Direction::Out, options, on_buffer)
            .await
    }

    /// Receive in sweep mode. Requires a sweep table set with `init_sweep`
    /// and USB API 0x0102 or newer.
    pub async fn sweep_receive<F>(&self, options: &StreamOptions, on_buffer: F) -> Result<()>
    where
        F: FnMut(&mut [u8]) -> Flow,
    {
        self.require_api_version(SWEEP_MIN_API_VERSION)?;
        if !self.sweep_configured.load(Ordering::SeqCst) {
            return Err(Error::invalid(
                "sweep ranges are not configured; call init_sweep first",
            ));
        }
        self.run_mode_stream(TransceiverMode::RxSweep, Direction::In, options, on_buffer)
            .await
    }

    /// Write a CPLD bitstream. The device must be reset afterwards to load it.
    pub async fn upload_cpld(&self, image: &[u8]) -> Result<()> {
        if image.is_empty() {
            return Err(Error::invalid("CPLD image is empty"));
        }
        let mut guard = self.endpoints.try_lock().map_err(|_| Error::Busy)?;
        if !guard.settled {
            guard.recover(&self.control).await?;
        }
        let Endpoints {
            tx, mode, settled, ..
        } = &mut *guard;

        *settled = false;
        if let Err(e) = mode.enter(&self.control, TransceiverMode::CpldUpdate).await {
            *settled = true;
            return Err(e);
        }
        info!(
            "Uploading {} byte CPLD image in {} byte chunks",
            image.len(),
            CPLD_CHUNK_SIZE
        );
        let outcome = stream::write_chunks(tx, image, CPLD_CHUNK_SIZE).await;
        let off = mode.leave(&self.control).await;
        *settled = true;
        if outcome.is_ok() {
            info!("CPLD image written; reset the device to load it");
        }
        combine(outcome, off)
    }

    async fn run_mode_stream<F>(
        &self,
        target: TransceiverMode,
        direction: Direction,
        options: &StreamOptions,
        on_buffer: F,
    ) -> Result<()>
    where
        F: FnMut(&mut [u8]) -> Flow,
    {
        options.validate()?;
        let mut guard = self.endpoints.try_lock().map_err(|_| Error::Busy)?;
        if !guard.settled {
            guard.recover(&self.control).await?;
        }
        let Endpoints {
            rx,
            tx,
            mode,
            settled,
        } = &mut *guard;

        self.stop.reset();
        *settled = false;
        if let Err(e) = mode.enter(&self.control, target).await {
            *settled = true;
            return Err(e);
        }
        debug!("Entered {}, starting {:?} stream", target, direction);

        let outcome = match direction {
            Direction::In => stream::run_stream(rx, direction, options, &self.stop, on_buffer).await,
            Direction::Out => stream::run_stream(tx, direction, options, &self.stop, on_buffer).await,
        };

        let off = mode.leave(&self.control).await;
        *settled = true;
        combine(outcome, off)
    }

    /// Give up the device. Taking `self` guarantees no stream is active.
    pub fn release(self) {
        info!("Releasing session (USB API {:#06x})", self.api_version);
    }
}

/// The stream's own error always wins over a failed return to `OFF`.
fn combine(outcome: Result<()>, off: Result<()>) -> Result<()> {
    match (outcome, off) {
        (Err(e), Err(secondary)) => {
            warn!("Secondary error after failed stream: {}", secondary);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), off) => off,
    }
}

//! Pure-Rust host driver for HackRF Software Defined Radios.
//!
//! # Overview
//!
//! `rs-hackrf` talks to HackRF One, Jawbreaker and rad1o boards over USB
//! without libhackrf. It covers device discovery, radio configuration and
//! continuous half-duplex streaming in both directions.
//!
//! A stream keeps a small pool of bulk transfers in flight and calls back
//! into user code once per buffer. The callback returns [`Flow::Stop`] to end
//! the stream; [`Session::request_stop`] does the same from elsewhere. Either
//! way the stream drains every in-flight transfer and puts the device back
//! in `OFF` before the call returns.
//!
//! # Sample Format
//!
//! Samples are interleaved signed 8-bit I/Q; see [`iq`] for conversion to
//! and from `Complex<f32>`.
//!
//! # Example
//!
//! ```no_run
//! use rs_hackrf::{Flow, StreamOptions};
//!
//! # async fn run() -> rs_hackrf::Result<()> {
//! let device = rs_hackrf::open_first()?;
//! println!("Firmware: {}", device.version_string().await?);
//!
//! device.set_freq(433_920_000).await?;
//! device.set_sample_rate(8e6).await?;
//!
//! let mut total = 0usize;
//! device
//!     .receive(&StreamOptions::default(), |buf| {
//!         total += buf.len();
//!         if total > 80_000_000 {
//!             Flow::Stop
//!         } else {
//!             Flow::Continue
//!         }
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod iq;
pub mod mode;
pub mod radio;
pub mod session;
pub mod stream;
pub mod transport;
pub mod util;

pub use config::{DeviceSelector, RadioConfig};
pub use control::{ControlChannel, Request, SweepStyle};
pub use error::{Error, ErrorCode, Result};
pub use mode::{ModeMachine, TransceiverMode};
pub use radio::PartIdSerialNo;
pub use session::Session;
pub use stream::{BulkEndpoint, Direction, Flow, StopSignal, StreamOptions, Transfer};
pub use transport::{list_devices, open, open_first, BoardKind, DeviceInfo, HackRf};

// HackRF device identifiers (USB VID/PID)
pub const HACKRF_VID: u16 = 0x1d50;
pub const HACKRF_ONE_PID: u16 = 0x6089;
pub const HACKRF_JAWBREAKER_PID: u16 = 0x604b;
pub const RAD1O_PID: u16 = 0xcc15;

/// Bulk endpoint carrying received samples.
pub const HACKRF_RX_ENDPOINT: u8 = 0x81;
/// Bulk endpoint carrying samples to transmit.
pub const HACKRF_TX_ENDPOINT: u8 = 0x02;

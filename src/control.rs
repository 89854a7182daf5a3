//! Control channel: vendor requests over the default control endpoint.
//!
//! The streaming core only needs two primitives, a vendor OUT request with an
//! optional payload and a vendor IN request returning bytes. Everything the
//! radio can be told (tuning, gains, sweep tables, mode) is expressed as one
//! of the [`Request`] ids below plus a `value`/`index` pair and payload.

use crate::error::Result;

/// HackRF vendor request ids (`bRequest`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Request {
    SetTransceiverMode = 1,
    SampleRateSet = 6,
    BasebandFilterBandwidthSet = 7,
    BoardIdRead = 14,
    VersionStringRead = 15,
    SetFreq = 16,
    AmpEnable = 17,
    BoardPartidSerialnoRead = 18,
    SetLnaGain = 19,
    SetVgaGain = 20,
    SetTxvgaGain = 21,
    AntennaEnable = 23,
    InitSweep = 26,
    SetHwSyncMode = 29,
    Reset = 30,
    ClkoutEnable = 32,
    BoardRevRead = 45,
}

/// Synchronous request/response exchange with the device.
///
/// Implemented over nusb by [`crate::transport::UsbControl`]; tests provide a
/// recording implementation.
#[allow(async_fn_in_trait)]
pub trait ControlChannel {
    /// Vendor OUT request. `data` may be empty.
    async fn control_out(
        &self,
        request: Request,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<()>;

    /// Vendor IN request reading up to `length` bytes.
    async fn control_in(
        &self,
        request: Request,
        value: u16,
        index: u16,
        length: u16,
    ) -> Result<Vec<u8>>;
}

/// Maximum number of `(start, stop)` ranges a sweep table can hold.
pub const MAX_SWEEP_RANGES: usize = 10;

/// Sweep sample blocks are this many bytes; `num_bytes` must be a multiple.
pub const BYTES_PER_BLOCK: u32 = 16384;

/// Tuning step pattern used by the firmware while sweeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SweepStyle {
    /// Step by `step_width`, tuning at `offset` above each step.
    #[default]
    Linear = 0,
    /// Interleave two offsets per step to avoid the DC spike.
    Interleaved = 1,
}

/// Split a frequency in Hz into the `[MHz, remainder Hz]` little-endian pair
/// carried by [`Request::SetFreq`].
pub fn encode_freq(freq_hz: u64) -> [u8; 8] {
    let mhz = (freq_hz / 1_000_000) as u32;
    let hz = (freq_hz % 1_000_000) as u32;
    let mut data = [0u8; 8];
    data[..4].copy_from_slice(&mhz.to_le_bytes());
    data[4..].copy_from_slice(&hz.to_le_bytes());
    data
}

/// Payload of [`Request::SampleRateSet`].
pub fn encode_sample_rate(freq_hz: u32, divider: u32) -> [u8; 8] {
    let mut data = [0u8; 8];
    data[..4].copy_from_slice(&freq_hz.to_le_bytes());
    data[4..].copy_from_slice(&divider.to_le_bytes());
    data
}

/// Payload of [`Request::InitSweep`]: step width, offset and style, then
/// the range pairs in MHz.
pub fn encode_sweep(
    ranges: &[(u16, u16)],
    step_width: u32,
    offset: u32,
    style: SweepStyle,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(9 + ranges.len() * 4);
    data.extend_from_slice(&step_width.to_le_bytes());
    data.extend_from_slice(&offset.to_le_bytes());
    data.push(style as u8);
    for &(start, stop) in ranges {
        data.extend_from_slice(&start.to_le_bytes());
        data.extend_from_slice(&stop.to_le_bytes());
    }
    data
}

/// Split a 32-bit quantity across the `value` (low) and `index` (high) fields.
pub fn split_u32(v: u32) -> (u16, u16) {
    ((v & 0xffff) as u16, (v >> 16) as u16)
}

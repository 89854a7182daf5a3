//! Radio configuration requests: tuning, gains, board information and the
//! sweep table.
//!
//! Each of these is a single control transfer and may be issued while a
//! stream is running (retuning during `receive` is the common case).

use tracing::debug;

use crate::control::{
    encode_freq, encode_sample_rate, encode_sweep, split_u32, ControlChannel, Request,
    SweepStyle, BYTES_PER_BLOCK, MAX_SWEEP_RANGES,
};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::stream::BulkEndpoint;
use crate::util;

/// Highest frequency the tuner accepts (7.25 GHz).
pub const FREQ_MAX_HZ: u64 = 7_250_000_000;

pub const LNA_GAIN_MAX_DB: u32 = 40;
pub const VGA_GAIN_MAX_DB: u32 = 62;
pub const TXVGA_GAIN_MAX_DB: u32 = 47;

/// Sample rate dividers the clock generator supports.
pub const DIVIDER_MAX: u32 = 31;

/// Part ids and serial number read from the MCU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartIdSerialNo {
    pub part_id: [u32; 2],
    pub serial_no: [u32; 4],
}

impl PartIdSerialNo {
    /// Parse the 24-byte little-endian response.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 24 {
            return Err(Error::InvalidResponse(format!(
                "part id/serial response incomplete: got {} bytes, expected 24",
                data.len()
            )));
        }
        let word = |i: usize| {
            u32::from_le_bytes([data[i * 4], data[i * 4 + 1], data[i * 4 + 2], data[i * 4 + 3]])
        };
        Ok(Self {
            part_id: [word(0), word(1)],
            serial_no: [word(2), word(3), word(4), word(5)],
        })
    }

    /// Serial number as printed by `hackrf_info`: 32 lowercase hex digits.
    pub fn serial_string(&self) -> String {
        self.serial_no.iter().map(|w| format!("{:08x}", w)).collect()
    }
}

impl<C, I, O> Session<C, I, O>
where
    C: ControlChannel,
    I: BulkEndpoint,
    O: BulkEndpoint,
{
    /// Numeric board identifier (2 = HackRF One).
    pub async fn board_id(&self) -> Result<u8> {
        let data = self
            .control()
            .control_in(Request::BoardIdRead, 0, 0, 1)
            .await?;
        data.first()
            .copied()
            .ok_or_else(|| Error::InvalidResponse("board id response empty".to_string()))
    }

    /// Firmware version string, e.g. `"2024.02.1"`.
    pub async fn version_string(&self) -> Result<String> {
        let data = self
            .control()
            .control_in(Request::VersionStringRead, 0, 0, 255)
            .await?;
        if data.is_empty() {
            return Err(Error::InvalidResponse("version response empty".to_string()));
        }
        Ok(String::from_utf8_lossy(&data)
            .trim_end_matches('\0')
            .to_string())
    }

    pub async fn board_partid_serialno(&self) -> Result<PartIdSerialNo> {
        let data = self
            .control()
            .control_in(Request::BoardPartidSerialnoRead, 0, 0, 24)
            .await?;
        PartIdSerialNo::from_bytes(&data)
    }

    /// Hardware revision (USB API 0x0106+).
    pub async fn board_rev(&self) -> Result<u8> {
        self.require_api_version(0x0106)?;
        let data = self
            .control()
            .control_in(Request::BoardRevRead, 0, 0, 1)
            .await?;
        data.first()
            .copied()
            .ok_or_else(|| Error::InvalidResponse("board rev response empty".to_string()))
    }

    /// Tune to `freq_hz`.
    pub async fn set_freq(&self, freq_hz: u64) -> Result<()> {
        if freq_hz > FREQ_MAX_HZ {
            return Err(Error::invalid(format!(
                "frequency {} Hz above {} Hz",
                freq_hz, FREQ_MAX_HZ
            )));
        }
        debug!("set_freq {} Hz", freq_hz);
        self.control()
            .control_out(Request::SetFreq, 0, 0, &encode_freq(freq_hz))
            .await
    }

    /// Program the sample clock directly as `freq_hz / divider`.
    pub async fn set_sample_rate_manual(&self, freq_hz: u32, divider: u32) -> Result<()> {
        if divider == 0 || divider > DIVIDER_MAX {
            return Err(Error::invalid(format!(
                "sample rate divider {} outside 1..={}",
                divider, DIVIDER_MAX
            )));
        }
        self.control()
            .control_out(
                Request::SampleRateSet,
                0,
                0,
                &encode_sample_rate(freq_hz, divider),
            )
            .await
    }

    /// Set the sample rate and a matching baseband filter (75% of the rate).
    pub async fn set_sample_rate(&self, freq_hz: f64) -> Result<()> {
        if !freq_hz.is_finite() || freq_hz <= 0.0 {
            return Err(Error::invalid(format!("sample rate {} Hz", freq_hz)));
        }
        let (freq, divider) = util::sample_rate_divider(freq_hz);
        debug!("sample rate {} Hz -> {} / {}", freq_hz, freq, divider);
        self.set_sample_rate_manual(freq, divider).await?;

        let bandwidth = util::compute_baseband_filter_bw((0.75 * freq_hz) as u32);
        self.set_baseband_filter_bandwidth(bandwidth).await
    }

    pub async fn set_baseband_filter_bandwidth(&self, bandwidth_hz: u32) -> Result<()> {
        let (value, index) = split_u32(bandwidth_hz);
        self.control()
            .control_out(Request::BasebandFilterBandwidthSet, value, index, &[])
            .await
    }

    /// RX LNA gain, 0-40 dB in 8 dB steps (rounded down).
    pub async fn set_lna_gain(&self, gain_db: u32) -> Result<()> {
        if gain_db > LNA_GAIN_MAX_DB {
            return Err(Error::invalid(format!("LNA gain {} dB above 40", gain_db)));
        }
        self.gain_request(Request::SetLnaGain, gain_db & !0x07).await
    }

    /// RX baseband VGA gain, 0-62 dB in 2 dB steps (rounded down).
    pub async fn set_vga_gain(&self, gain_db: u32) -> Result<()> {
        if gain_db > VGA_GAIN_MAX_DB {
            return Err(Error::invalid(format!("VGA gain {} dB above 62", gain_db)));
        }
        self.gain_request(Request::SetVgaGain, gain_db & !0x01).await
    }

    /// TX VGA gain, 0-47 dB in 1 dB steps.
    pub async fn set_txvga_gain(&self, gain_db: u32) -> Result<()> {
        if gain_db > TXVGA_GAIN_MAX_DB {
            return Err(Error::invalid(format!("TX VGA gain {} dB above 47", gain_db)));
        }
        self.gain_request(Request::SetTxvgaGain, gain_db).await
    }

    // Gain requests answer with one byte; zero means the value was refused.
    async fn gain_request(&self, request: Request, gain_db: u32) -> Result<()> {
        let data = self
            .control()
            .control_in(request, 0, gain_db as u16, 1)
            .await?;
        match data.first() {
            Some(0) | None => Err(Error::invalid(format!(
                "device rejected {:?} = {} dB",
                request, gain_db
            ))),
            Some(_) => Ok(()),
        }
    }

    /// RF amplifier on the antenna path.
    pub async fn set_amp_enable(&self, enable: bool) -> Result<()> {
        self.control()
            .control_out(Request::AmpEnable, enable as u16, 0, &[])
            .await
    }

    /// Antenna port bias power.
    pub async fn set_antenna_enable(&self, enable: bool) -> Result<()> {
        self.control()
            .control_out(Request::AntennaEnable, enable as u16, 0, &[])
            .await
    }

    pub async fn set_hw_sync_mode(&self, enable: bool) -> Result<()> {
        self.require_api_version(0x0102)?;
        self.control()
            .control_out(Request::SetHwSyncMode, enable as u16, 0, &[])
            .await
    }

    pub async fn set_clkout_enable(&self, enable: bool) -> Result<()> {
        self.require_api_version(0x0103)?;
        self.control()
            .control_out(Request::ClkoutEnable, enable as u16, 0, &[])
            .await
    }

    /// Reboot the device. The session is unusable afterwards.
    pub async fn reset(&self) -> Result<()> {
        self.require_api_version(0x0102)?;
        self.control()
            .control_out(Request::Reset, 0, 0, &[])
            .await
    }

    /// Load the sweep table used by [`Session::sweep_receive`].
    ///
    /// `ranges` are `(start, stop)` pairs in MHz. `num_bytes` is how many
    /// sample bytes the firmware captures per tuning step and must be a
    /// positive multiple of [`BYTES_PER_BLOCK`].
    pub async fn init_sweep(
        &self,
        ranges: &[(u16, u16)],
        num_bytes: u32,
        step_width: u32,
        offset: u32,
        style: SweepStyle,
    ) -> Result<()> {
        self.require_api_version(0x0102)?;
        if ranges.is_empty() || ranges.len() > MAX_SWEEP_RANGES {
            return Err(Error::invalid(format!(
                "{} sweep ranges, expected 1..={}",
                ranges.len(),
                MAX_SWEEP_RANGES
            )));
        }
        if let Some((start, stop)) = ranges.iter().find(|(start, stop)| start >= stop) {
            return Err(Error::invalid(format!(
                "sweep range {}..{} MHz is empty",
                start, stop
            )));
        }
        if num_bytes == 0 || num_bytes % BYTES_PER_BLOCK != 0 {
            return Err(Error::invalid(format!(
                "num_bytes {} is not a positive multiple of {}",
                num_bytes, BYTES_PER_BLOCK
            )));
        }
        if step_width == 0 {
            return Err(Error::invalid("step_width must be at least 1 Hz"));
        }

        let (value, index) = split_u32(num_bytes);
        let data = encode_sweep(ranges, step_width, offset, style);
        self.control()
            .control_out(Request::InitSweep, value, index, &data)
            .await?;
        self.mark_sweep_configured();
        Ok(())
    }
}

//! Device selection and radio configuration.
//!
//! # Example
//!
//! ```no_run
//! use rs_hackrf::{RadioConfig, StreamOptions};
//!
//! # async fn run() -> rs_hackrf::Result<()> {
//! let mut config = RadioConfig::new(0, 100_000_000, 10_000_000);
//! config.lna_gain = Some(16);
//! config.vga_gain = Some(20);
//!
//! let device = rs_hackrf::open(&config.device)?;
//! device.apply(&config).await?;
//! device
//!     .receive(&config.stream, |buf| {
//!         println!("{} bytes", buf.len());
//!         rs_hackrf::Flow::Continue
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use tracing::debug;

use crate::control::ControlChannel;
use crate::error::Result;
use crate::session::Session;
use crate::stream::{BulkEndpoint, StreamOptions};

/// Which HackRF to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// Select device by enumeration index (0 for first device)
    Index(usize),
    /// Select device by serial number, as printed by `hackrf_info`.
    ///
    /// A suffix is enough: `"2b4c1c4f"` matches the full 32-digit serial.
    Serial(String),
}

impl Default for DeviceSelector {
    fn default() -> Self {
        DeviceSelector::Index(0)
    }
}

/// Radio settings applied in one go by [`Session::apply`].
///
/// `None` fields are left at whatever the device currently uses.
#[derive(Debug, Clone, PartialEq)]
pub struct RadioConfig {
    pub device: DeviceSelector,
    /// Center frequency in Hz (1 MHz to 6 GHz nominal)
    pub center_freq: u64,
    /// Sample rate in Hz (2 to 20 MSPS)
    pub sample_rate: u32,
    /// Baseband filter bandwidth in Hz; derived from the sample rate if unset
    pub baseband_filter: Option<u32>,
    /// RX LNA gain (0-40 dB, 8 dB steps)
    pub lna_gain: Option<u32>,
    /// RX VGA gain (0-62 dB, 2 dB steps)
    pub vga_gain: Option<u32>,
    /// TX VGA gain (0-47 dB)
    pub txvga_gain: Option<u32>,
    /// RF amplifier (about 11 dB on RX and TX)
    pub amp_enable: bool,
    /// Antenna port bias power
    pub antenna_enable: bool,
    pub stream: StreamOptions,
}

impl RadioConfig {
    /// Create a configuration for the device at `device_index`.
    pub fn new(device_index: usize, center_freq: u64, sample_rate: u32) -> Self {
        Self::with_device(DeviceSelector::Index(device_index), center_freq, sample_rate)
    }

    /// Create a configuration selecting the device by serial number.
    pub fn new_with_serial(serial: impl Into<String>, center_freq: u64, sample_rate: u32) -> Self {
        Self::with_device(DeviceSelector::Serial(serial.into()), center_freq, sample_rate)
    }

    fn with_device(device: DeviceSelector, center_freq: u64, sample_rate: u32) -> Self {
        Self {
            device,
            center_freq,
            sample_rate,
            baseband_filter: None,
            lna_gain: None,
            vga_gain: None,
            txvga_gain: None,
            amp_enable: false,
            antenna_enable: false,
            stream: StreamOptions::default(),
        }
    }
}

impl<C, I, O> Session<C, I, O>
where
    C: ControlChannel,
    I: BulkEndpoint,
    O: BulkEndpoint,
{
    /// Issue every request `config` implies, stopping at the first failure.
    ///
    /// Order: sample rate (with its derived filter), explicit filter,
    /// frequency, gains, amplifier, antenna power.
    pub async fn apply(&self, config: &RadioConfig) -> Result<()> {
        debug!("Applying {:?}", config);
        config.stream.validate()?;

        self.set_sample_rate(config.sample_rate as f64).await?;
        if let Some(bw) = config.baseband_filter {
            self.set_baseband_filter_bandwidth(bw).await?;
        }
        self.set_freq(config.center_freq).await?;

        if let Some(gain) = config.lna_gain {
            self.set_lna_gain(gain).await?;
        }
        if let Some(gain) = config.vga_gain {
            self.set_vga_gain(gain).await?;
        }
        if let Some(gain) = config.txvga_gain {
            self.set_txvga_gain(gain).await?;
        }

        self.set_amp_enable(config.amp_enable).await?;
        self.set_antenna_enable(config.antenna_enable).await
    }
}

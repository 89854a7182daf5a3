//! USB transport layer for HackRF devices.
//!
//! Control requests and bulk transfers go through `nusb`'s async API, so a
//! stream is driven by a single future with no background thread.

use std::collections::VecDeque;
use std::fmt;

use nusb::transfer::{
    Completion, ControlIn, ControlOut, ControlType, Queue, Recipient, RequestBuffer,
};
use tracing::{debug, info};

use crate::config::DeviceSelector;
use crate::control::{ControlChannel, Request};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::stream::{BulkEndpoint, Transfer};
use crate::{
    HACKRF_JAWBREAKER_PID, HACKRF_ONE_PID, HACKRF_RX_ENDPOINT, HACKRF_TX_ENDPOINT, HACKRF_VID,
    RAD1O_PID,
};

/// A session over a real USB device.
pub type HackRf = Session<UsbControl, UsbBulkIn, UsbBulkOut>;

/// Board family, from the USB product id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardKind {
    HackRfOne,
    Jawbreaker,
    Rad1o,
}

impl BoardKind {
    pub fn from_product_id(pid: u16) -> Option<Self> {
        match pid {
            HACKRF_ONE_PID => Some(BoardKind::HackRfOne),
            HACKRF_JAWBREAKER_PID => Some(BoardKind::Jawbreaker),
            RAD1O_PID => Some(BoardKind::Rad1o),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BoardKind::HackRfOne => "HackRF One",
            BoardKind::Jawbreaker => "Jawbreaker",
            BoardKind::Rad1o => "rad1o",
        }
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An attached HackRF, as seen during enumeration (nothing is opened).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device index (0-based, enumeration order)
    pub index: usize,
    pub board: BoardKind,
    /// Serial number string descriptor, if readable
    pub serial_number: Option<String>,
    pub bus_number: u8,
    pub device_address: u8,
    /// USB API version from `bcdDevice`
    pub usb_api_version: u16,
}

fn hackrf_devices() -> Result<Vec<(BoardKind, nusb::DeviceInfo)>> {
    Ok(nusb::list_devices()?
        .filter(|d| d.vendor_id() == HACKRF_VID)
        .filter_map(|d| BoardKind::from_product_id(d.product_id()).map(|kind| (kind, d)))
        .collect())
}

/// List attached HackRF devices.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    Ok(hackrf_devices()?
        .into_iter()
        .enumerate()
        .map(|(index, (board, d))| DeviceInfo {
            index,
            board,
            serial_number: d.serial_number().map(str::to_string),
            bus_number: d.bus_number(),
            device_address: d.device_address(),
            usb_api_version: d.device_version(),
        })
        .collect())
}

fn serial_matches(candidate: Option<&str>, wanted: &str) -> bool {
    let wanted = wanted.trim_start_matches("0x").to_ascii_lowercase();
    !wanted.is_empty()
        && candidate.is_some_and(|s| s.to_ascii_lowercase().ends_with(&wanted))
}

/// Open the device picked by `selector`.
///
/// This follows the libhackrf initialization sequence:
/// 1. Open the USB device
/// 2. Set configuration to 1
/// 3. Claim interface 0
pub fn open(selector: &DeviceSelector) -> Result<HackRf> {
    let devices = hackrf_devices()?;
    let found = match selector {
        DeviceSelector::Index(index) => devices.into_iter().nth(*index),
        DeviceSelector::Serial(serial) => devices
            .into_iter()
            .find(|(_, d)| serial_matches(d.serial_number(), serial)),
    };
    let (board, info) = found.ok_or(Error::NotFound)?;

    let device = info.open()?;
    if let Err(e) = device.set_configuration(1) {
        debug!("Failed to set configuration (may already be set): {}", e);
    }
    let interface = device.claim_interface(0)?;

    let api_version = info.device_version();
    info!(
        "Opened {} on bus {:03} device {:03} (USB API {:#06x})",
        board,
        info.bus_number(),
        info.device_address(),
        api_version
    );

    let rx = UsbBulkIn::new(interface.bulk_in_queue(HACKRF_RX_ENDPOINT));
    let tx = UsbBulkOut::new(interface.bulk_out_queue(HACKRF_TX_ENDPOINT));
    Ok(Session::new(UsbControl(interface), rx, tx, api_version))
}

/// Open the first available HackRF.
pub fn open_first() -> Result<HackRf> {
    open(&DeviceSelector::Index(0))
}

/// Vendor requests on the default control endpoint of a claimed interface.
pub struct UsbControl(nusb::Interface);

impl ControlChannel for UsbControl {
    async fn control_out(
        &self,
        request: Request,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<()> {
        let completion = self
            .0
            .control_out(ControlOut {
                control_type: ControlType::Vendor,
                recipient: Recipient::Device,
                request: request as u8,
                value,
                index,
                data,
            })
            .await;
        completion.into_result().map(|_| ()).map_err(|e| {
            debug!(
                "Control OUT transfer failed: req={:?}, val={}, idx={}, error={}",
                request, value, index, e
            );
            Error::Control { request, source: e }
        })
    }

    async fn control_in(
        &self,
        request: Request,
        value: u16,
        index: u16,
        length: u16,
    ) -> Result<Vec<u8>> {
        let completion = self
            .0
            .control_in(ControlIn {
                control_type: ControlType::Vendor,
                recipient: Recipient::Device,
                request: request as u8,
                value,
                index,
                length,
            })
            .await;
        completion.into_result().map_err(|e| {
            debug!(
                "Control IN transfer failed: req={:?}, val={}, idx={}, error={}",
                request, value, index, e
            );
            Error::Control { request, source: e }
        })
    }
}

/// Bulk IN endpoint (`0x81`). nusb completes a queue in submission order, so
/// the slot tags are kept in the same order.
pub struct UsbBulkIn {
    queue: Queue<RequestBuffer>,
    slots: VecDeque<usize>,
}

impl UsbBulkIn {
    fn new(queue: Queue<RequestBuffer>) -> Self {
        Self {
            queue,
            slots: VecDeque::new(),
        }
    }
}

impl BulkEndpoint for UsbBulkIn {
    fn submit(&mut self, slot: usize, buffer: Vec<u8>) {
        let len = buffer.len();
        self.queue.submit(RequestBuffer::reuse(buffer, len));
        self.slots.push_back(slot);
    }

    async fn next_complete(&mut self) -> Option<Transfer> {
        let slot = *self.slots.front()?;
        let Completion { data, status } = self.queue.next_complete().await;
        self.slots.pop_front();
        Some(Transfer {
            slot,
            actual_len: data.len(),
            buffer: data,
            status,
        })
    }

    fn cancel_all(&mut self) {
        self.queue.cancel_all();
    }
}

/// Bulk OUT endpoint (`0x02`).
pub struct UsbBulkOut {
    queue: Queue<Vec<u8>>,
    slots: VecDeque<usize>,
}

impl UsbBulkOut {
    fn new(queue: Queue<Vec<u8>>) -> Self {
        Self {
            queue,
            slots: VecDeque::new(),
        }
    }
}

impl BulkEndpoint for UsbBulkOut {
    fn submit(&mut self, slot: usize, buffer: Vec<u8>) {
        self.queue.submit(buffer);
        self.slots.push_back(slot);
    }

    async fn next_complete(&mut self) -> Option<Transfer> {
        let slot = *self.slots.front()?;
        let Completion { data, status } = self.queue.next_complete().await;
        self.slots.pop_front();
        Some(Transfer {
            slot,
            actual_len: data.actual_length(),
            buffer: data.reuse(),
            status,
        })
    }

    fn cancel_all(&mut self) {
        self.queue.cancel_all();
    }
}

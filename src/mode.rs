//! Transceiver mode state machine.
//!
//! The device runs in exactly one [`TransceiverMode`] at a time. A stream is
//! bracketed by two transitions: `OFF -> mode` right before the first bulk
//! transfer is submitted, and `mode -> OFF` after the last one settled.

use std::fmt;

use tracing::{debug, warn};

use crate::control::{ControlChannel, Request};
use crate::error::{Error, Result};

/// Device-side operating mode, as carried by [`Request::SetTransceiverMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum TransceiverMode {
    #[default]
    Off = 0,
    Receive = 1,
    Transmit = 2,
    CpldUpdate = 4,
    RxSweep = 5,
}

impl fmt::Display for TransceiverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransceiverMode::Off => "OFF",
            TransceiverMode::Receive => "RECEIVE",
            TransceiverMode::Transmit => "TRANSMIT",
            TransceiverMode::CpldUpdate => "CPLD_UPDATE",
            TransceiverMode::RxSweep => "RX_SWEEP",
        };
        f.write_str(name)
    }
}

/// Host-side record of the device's transceiver mode.
///
/// Only the session drives transitions, one at a time. The machine accepts
/// `OFF -> active` and `active -> OFF`; anything else is rejected before a
/// request reaches the device.
#[derive(Debug, Default)]
pub struct ModeMachine {
    current: TransceiverMode,
}

impl ModeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mode the device was last successfully put in.
    pub fn current(&self) -> TransceiverMode {
        self.current
    }

    /// Leave `OFF` for an active mode.
    pub async fn enter<C: ControlChannel>(
        &mut self,
        control: &C,
        mode: TransceiverMode,
    ) -> Result<()> {
        if mode == TransceiverMode::Off {
            return Err(Error::invalid("cannot enter OFF; use leave()"));
        }
        if self.current != TransceiverMode::Off {
            return Err(Error::invalid(format!(
                "cannot enter {} while in {}",
                mode, self.current
            )));
        }

        send_mode(control, mode).await?;
        self.current = mode;
        Ok(())
    }

    /// Return to `OFF`.
    ///
    /// The record is reset to `OFF` even when the request fails: the device
    /// state is unknown at that point and the next `enter` re-issues an
    /// explicit mode request anyway.
    pub async fn leave<C: ControlChannel>(&mut self, control: &C) -> Result<()> {
        let previous = self.current;
        self.current = TransceiverMode::Off;

        match send_mode(control, TransceiverMode::Off).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Failed to return device from {} to OFF: {}", previous, e);
                Err(e)
            }
        }
    }
}

async fn send_mode<C: ControlChannel>(control: &C, mode: TransceiverMode) -> Result<()> {
    debug!("Setting transceiver mode {}", mode);
    control
        .control_out(Request::SetTransceiverMode, mode as u16, 0, &[])
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_values() {
        assert_eq!(TransceiverMode::Off as u16, 0);
        assert_eq!(TransceiverMode::Receive as u16, 1);
        assert_eq!(TransceiverMode::Transmit as u16, 2);
        assert_eq!(TransceiverMode::CpldUpdate as u16, 4);
        assert_eq!(TransceiverMode::RxSweep as u16, 5);
    }

    #[test]
    fn test_new_machine_is_off() {
        assert_eq!(ModeMachine::new().current(), TransceiverMode::Off);
    }

    #[test]
    fn test_display() {
        assert_eq!(TransceiverMode::RxSweep.to_string(), "RX_SWEEP");
    }
}

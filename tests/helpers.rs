//! Test helpers: recording doubles for the control channel and bulk
//! endpoints, plus synthetic Cs8 signals.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::f32::consts::PI;
use std::sync::{Arc, Mutex};
use std::task::Poll;

use nusb::transfer::TransferError;
use rs_hackrf::{BulkEndpoint, ControlChannel, Error, Request, Session, Transfer};

pub type MockSession = Session<MockControl, MockEndpoint, MockEndpoint>;

/// A session over fresh mocks, with handles to inspect them afterwards.
pub fn mock_session(api_version: u16) -> (MockSession, MockControl, MockEndpoint, MockEndpoint) {
    let control = MockControl::default();
    let rx = MockEndpoint::default();
    let tx = MockEndpoint::default();
    let session = Session::new(control.clone(), rx.clone(), tx.clone(), api_version);
    (session, control, rx, tx)
}

/// One recorded control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCall {
    pub request: Request,
    pub value: u16,
    pub index: u16,
    /// OUT payload, empty for IN requests
    pub data: Vec<u8>,
}

#[derive(Default)]
struct ControlState {
    calls: Vec<ControlCall>,
    failures: Vec<(Request, u16)>,
    responses: HashMap<Request, Vec<u8>>,
}

/// Records every request. IN requests answer with a canned response, or a
/// single `1` byte when none was set.
#[derive(Clone, Default)]
pub struct MockControl {
    state: Arc<Mutex<ControlState>>,
}

impl MockControl {
    /// Make `request` with this `value` fail with a stall.
    pub fn fail_on(&self, request: Request, value: u16) {
        self.state.lock().unwrap().failures.push((request, value));
    }

    pub fn respond(&self, request: Request, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(request, data.to_vec());
    }

    pub fn calls(&self) -> Vec<ControlCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_for(&self, request: Request) -> Vec<ControlCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.request == request)
            .collect()
    }

    /// Values of every transceiver mode request, in order.
    pub fn mode_requests(&self) -> Vec<u16> {
        self.calls_for(Request::SetTransceiverMode)
            .iter()
            .map(|c| c.value)
            .collect()
    }

    fn record(&self, call: ControlCall) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        let failing = state
            .failures
            .iter()
            .any(|&(request, value)| request == call.request && value == call.value);
        let request = call.request;
        state.calls.push(call);
        if failing {
            return Err(Error::Control {
                request,
                source: TransferError::Stall,
            });
        }
        Ok(())
    }
}

impl ControlChannel for MockControl {
    async fn control_out(
        &self,
        request: Request,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<(), Error> {
        self.record(ControlCall {
            request,
            value,
            index,
            data: data.to_vec(),
        })
    }

    async fn control_in(
        &self,
        request: Request,
        value: u16,
        index: u16,
        length: u16,
    ) -> Result<Vec<u8>, Error> {
        self.record(ControlCall {
            request,
            value,
            index,
            data: Vec::new(),
        })?;
        let state = self.state.lock().unwrap();
        let mut data = state
            .responses
            .get(&request)
            .cloned()
            .unwrap_or_else(|| vec![1]);
        data.truncate(length as usize);
        Ok(data)
    }
}

struct InFlight {
    slot: usize,
    buffer: Vec<u8>,
    cancelled: bool,
}

/// What a [`MockEndpoint`] saw, plus its scripted behaviour.
#[derive(Default)]
pub struct EndpointState {
    in_flight: VecDeque<InFlight>,
    /// Slot tag of every submission, in order
    pub submitted_slots: Vec<usize>,
    /// Buffer length of every submission, in order
    pub submitted_lens: Vec<usize>,
    /// Highest number of transfers pending at once
    pub max_pending: usize,
    /// Pending count each time a completion was awaited
    pub pending_at_poll: Vec<usize>,
    pub cancel_calls: usize,
    /// Number of completions handed out, cancelled ones included
    pub completions: usize,
    /// Payload of every successful completion (what was sent, for OUT)
    pub delivered: Vec<Vec<u8>>,

    /// Fail the n-th completion (0-based) with this error.
    pub fail_at: Option<(usize, TransferError)>,
    /// Status reported by cancelled transfers instead of `Cancelled`.
    pub unwind_error: Option<TransferError>,
    /// Report at most this many bytes moved per transfer.
    pub actual_len: Option<usize>,
    /// Complete the most recent submission first.
    pub lifo: bool,
    /// Leave `next_complete` pending while set. Nothing wakes it, so only
    /// use it on futures polled by hand.
    pub hold: bool,
    /// Called with the completion number just before it is handed out.
    pub on_complete: Option<Box<dyn FnMut(usize) + Send>>,
}

/// In-memory bulk endpoint. Completions are ready immediately; IN buffers
/// are filled with the completion number.
#[derive(Clone, Default)]
pub struct MockEndpoint {
    state: Arc<Mutex<EndpointState>>,
}

impl MockEndpoint {
    pub fn with<R>(&self, f: impl FnOnce(&mut EndpointState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn submissions(&self) -> usize {
        self.with(|s| s.submitted_slots.len())
    }

    pub fn pending(&self) -> usize {
        self.with(|s| s.in_flight.len())
    }

    pub fn cancel_calls(&self) -> usize {
        self.with(|s| s.cancel_calls)
    }

    pub fn max_pending(&self) -> usize {
        self.with(|s| s.max_pending)
    }

    pub fn delivered(&self) -> Vec<Vec<u8>> {
        self.with(|s| s.delivered.clone())
    }

    /// Drop every in-flight transfer without reporting it.
    pub fn lose_in_flight(&self) {
        self.with(|s| s.in_flight.clear())
    }
}

impl BulkEndpoint for MockEndpoint {
    fn submit(&mut self, slot: usize, buffer: Vec<u8>) {
        self.with(|s| {
            s.submitted_slots.push(slot);
            s.submitted_lens.push(buffer.len());
            s.in_flight.push_back(InFlight {
                slot,
                buffer,
                cancelled: false,
            });
            s.max_pending = s.max_pending.max(s.in_flight.len());
        })
    }

    async fn next_complete(&mut self) -> Option<Transfer> {
        let state = self.state.clone();
        std::future::poll_fn(move |_| {
            if state.lock().unwrap().hold {
                Poll::Pending
            } else {
                Poll::Ready(())
            }
        })
        .await;

        self.with(|s| {
            s.pending_at_poll.push(s.in_flight.len());
            let InFlight {
                slot,
                mut buffer,
                cancelled,
            } = if s.lifo {
                s.in_flight.pop_back()?
            } else {
                s.in_flight.pop_front()?
            };
            let n = s.completions;
            s.completions += 1;
            if let Some(hook) = s.on_complete.as_mut() {
                hook(n);
            }

            if cancelled {
                let status = Err(s.unwind_error.unwrap_or(TransferError::Cancelled));
                return Some(Transfer {
                    slot,
                    buffer,
                    actual_len: 0,
                    status,
                });
            }
            if let Some((at, error)) = s.fail_at {
                if at == n {
                    return Some(Transfer {
                        slot,
                        buffer,
                        actual_len: 0,
                        status: Err(error),
                    });
                }
            }

            let actual_len = s.actual_len.unwrap_or(buffer.len()).min(buffer.len());
            if s.delivered.len() < 4096 {
                s.delivered.push(buffer[..actual_len].to_vec());
            }
            buffer.fill(n as u8);
            Some(Transfer {
                slot,
                buffer,
                actual_len,
                status: Ok(()),
            })
        })
    }

    fn cancel_all(&mut self) {
        self.with(|s| {
            s.cancel_calls += 1;
            for transfer in s.in_flight.iter_mut() {
                transfer.cancelled = true;
            }
        })
    }
}

/// Generate a complex sine wave as interleaved I/Q bytes (Cs8)
///
/// # Arguments
/// * `frequency` - Frequency in Hz
/// * `sample_rate` - Sample rate in Hz
/// * `num_samples` - Number of samples to generate
pub fn generate_sine_wave_cs8(frequency: f32, sample_rate: u32, num_samples: usize) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(num_samples * 2);
    let angular_freq = 2.0 * PI * frequency / sample_rate as f32;

    for n in 0..num_samples {
        let phase = angular_freq * n as f32;
        buffer.push((phase.cos() * 127.0) as i8 as u8);
        buffer.push((phase.sin() * 127.0) as i8 as u8);
    }

    buffer
}

/// Generate a constant (DC) signal in Cs8 format
pub fn generate_dc_signal_cs8(num_samples: usize, i_val: f32, q_val: f32) -> Vec<u8> {
    let i_byte = (i_val * 127.0) as i8 as u8;
    let q_byte = (q_val * 127.0) as i8 as u8;
    [i_byte, q_byte].repeat(num_samples)
}

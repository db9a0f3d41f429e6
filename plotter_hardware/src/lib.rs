pub mod error;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod util;

use plotter_traits::Transport;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use crate::error::HwError;

/// Version banner reported by the simulated controller.
pub const SIM_VERSION: &str = "EBBv13_and_above EB Firmware Version 2.5.3 (simulated)";

/// Fastest step rate the controller accepts on either axis, in steps per ms.
pub const MAX_STEP_RATE_PER_MS: f64 = 25.0;

#[derive(Debug, Default)]
struct SimState {
    steps_a: i64,
    steps_b: i64,
    pen_up: bool,
    motor_modes: (u8, u8),
    servo: BTreeMap<u8, u32>,
    frames: Vec<String>,
    pending: VecDeque<String>,
    // QM polls left that still report busy
    busy_polls: u32,
    busy_polls_per_move: u32,
    stuck: bool,
    disconnect_after: Option<usize>,
    moved_ms: u64,
    pen_delay_ms: u64,
}

/// In-memory controller speaking the same line protocol as the real board.
///
/// Every accepted frame is recorded; step counters, pen state and servo
/// settings are tracked so tests can inspect the result through a [`SimHandle`].
pub struct SimulatedPlotter {
    state: Rc<RefCell<SimState>>,
}

/// Shared view of a [`SimulatedPlotter`] that stays usable after the plotter
/// itself has been moved into a controller.
#[derive(Clone)]
pub struct SimHandle {
    state: Rc<RefCell<SimState>>,
}

impl Default for SimulatedPlotter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlotter {
    pub fn new() -> Self {
        let state = SimState {
            pen_up: true,
            busy_polls_per_move: 1,
            ..SimState::default()
        };
        SimulatedPlotter {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: Rc::clone(&self.state),
        }
    }

    fn respond(&self, line: impl Into<String>) {
        self.state.borrow_mut().pending.push_back(line.into());
    }

    fn dispatch(&self, line: &str) {
        let mut fields = line.split(',');
        let name = fields.next().unwrap_or_default();
        let args: Vec<&str> = fields.collect();
        match name {
            "V" => self.respond(SIM_VERSION),
            "EM" => match parse_args::<u8>(&args, 2) {
                Some(v) => {
                    self.state.borrow_mut().motor_modes = (v[0], v[1]);
                    self.respond("OK");
                }
                None => self.respond("!0 Err: EM expects two modes"),
            },
            "QM" => {
                let mut st = self.state.borrow_mut();
                let busy = st.stuck || st.busy_polls > 0;
                if !st.stuck {
                    st.busy_polls = st.busy_polls.saturating_sub(1);
                }
                let flag = u8::from(busy);
                st.pending.push_back(format!("QM,{flag},{flag},{flag},0"));
            }
            "CS" => {
                let mut st = self.state.borrow_mut();
                st.steps_a = 0;
                st.steps_b = 0;
                st.pending.push_back("OK".to_string());
            }
            "QS" => {
                let (a, b) = {
                    let st = self.state.borrow();
                    (st.steps_a, st.steps_b)
                };
                self.respond(format!("{a},{b}"));
                self.respond("OK");
            }
            "XM" => match parse_args::<i64>(&args, 3) {
                Some(v) if v[0] > 0 => {
                    let (duration, a, b) = (v[0], v[1], v[2]);
                    let rate = a.abs().max(b.abs()) as f64 / duration as f64;
                    if rate > MAX_STEP_RATE_PER_MS {
                        self.respond("!0 Err: step rate too high");
                        return;
                    }
                    let mut st = self.state.borrow_mut();
                    st.steps_a += a;
                    st.steps_b += b;
                    st.moved_ms += duration as u64;
                    st.busy_polls = st.busy_polls_per_move;
                    st.pending.push_back("OK".to_string());
                }
                _ => self.respond("!0 Err: XM expects duration > 0 and two step counts"),
            },
            "SP" => match parse_args::<u64>(&args, 2) {
                Some(v) if v[0] <= 1 => {
                    let mut st = self.state.borrow_mut();
                    st.pen_up = v[0] == 1;
                    st.pen_delay_ms += v[1];
                    st.pending.push_back("OK".to_string());
                }
                _ => self.respond("!0 Err: SP expects state 0|1 and a delay"),
            },
            "SC" => match parse_args::<u32>(&args, 2) {
                Some(v) => {
                    let channel = u8::try_from(v[0]).unwrap_or(u8::MAX);
                    self.state.borrow_mut().servo.insert(channel, v[1]);
                    self.respond("OK");
                }
                None => self.respond("!0 Err: SC expects channel and value"),
            },
            other => self.respond(format!("!8 Err: Unknown command '{other}'")),
        }
    }
}

fn parse_args<T: std::str::FromStr>(args: &[&str], n: usize) -> Option<Vec<T>> {
    if args.len() != n {
        return None;
    }
    args.iter().map(|a| a.trim().parse().ok()).collect()
}

impl Transport for SimulatedPlotter {
    fn write_frame(&mut self, frame: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        {
            let mut st = self.state.borrow_mut();
            if let Some(limit) = st.disconnect_after
                && st.frames.len() >= limit
            {
                return Err(Box::new(HwError::Disconnected));
            }
            st.frames.push(frame.to_string());
        }
        let line = frame.trim_end_matches(['\r', '\n']);
        tracing::trace!(frame = line, "sim rx");
        self.dispatch(line);
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let next = self.state.borrow_mut().pending.pop_front();
        next.ok_or_else(|| Box::new(HwError::Timeout) as Box<dyn std::error::Error + Send + Sync>)
    }
}

impl SimHandle {
    /// Raw (A, B) step counters.
    pub fn steps(&self) -> (i64, i64) {
        let st = self.state.borrow();
        (st.steps_a, st.steps_b)
    }

    pub fn pen_is_up(&self) -> bool {
        self.state.borrow().pen_up
    }

    /// Every frame received so far, terminators included.
    pub fn frames(&self) -> Vec<String> {
        self.state.borrow().frames.clone()
    }

    /// Frames whose command name equals `name`, terminators stripped.
    pub fn frames_named(&self, name: &str) -> Vec<String> {
        self.state
            .borrow()
            .frames
            .iter()
            .map(|f| f.trim_end_matches(['\r', '\n']).to_string())
            .filter(|f| f.split(',').next() == Some(name))
            .collect()
    }

    pub fn servo(&self, channel: u8) -> Option<u32> {
        self.state.borrow().servo.get(&channel).copied()
    }

    pub fn motor_modes(&self) -> (u8, u8) {
        self.state.borrow().motor_modes
    }

    /// Sum of all accepted XM durations.
    pub fn moved_ms(&self) -> u64 {
        self.state.borrow().moved_ms
    }

    /// Sum of all pen settle delays requested through SP.
    pub fn pen_delay_ms(&self) -> u64 {
        self.state.borrow().pen_delay_ms
    }

    /// Report busy on every QM from now on.
    pub fn set_stuck(&self, stuck: bool) {
        self.state.borrow_mut().stuck = stuck;
    }

    /// Number of QM polls that report busy after each accepted move.
    pub fn set_busy_polls_per_move(&self, n: u32) {
        self.state.borrow_mut().busy_polls_per_move = n;
    }

    /// Fail every write once `n` frames have been accepted.
    pub fn disconnect_after(&self, n: usize) {
        self.state.borrow_mut().disconnect_after = Some(n);
    }
}

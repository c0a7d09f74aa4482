//! Motor scan-state program generation and the per-scan motor state
//! machine (spec §4.D), grounded on the original source's
//! `plustek-pp_motor.c` (`_NUMBER_OF_SCANSTEPS` = 64, `a_nbNewAdrPointer`).

use std::time::{Duration, Instant};

use crate::error::BackendError;

pub const NUM_SCAN_STEPS: usize = 64;

/// One tick's worth of per-slot decision: step/no-step and which
/// channel(s) to latch from the sensor (spec §3 MotorProgram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub step: bool,
    pub latch_red: bool,
    pub latch_green: bool,
    pub latch_blue: bool,
}

impl Slot {
    /// Pack into the 4-bit nibble the ASIC expects: bit 3 = step, bits
    /// 2..0 = R/G/B latch flags.
    pub fn to_nibble(self) -> u8 {
        (self.step as u8) << 3 | (self.latch_red as u8) << 2 | (self.latch_green as u8) << 1 | (self.latch_blue as u8)
    }

    pub fn from_nibble(n: u8) -> Self {
        Slot {
            step: n & 0x08 != 0,
            latch_red: n & 0x04 != 0,
            latch_green: n & 0x02 != 0,
            latch_blue: n & 0x01 != 0,
        }
    }
}

/// Color scheme of the CCD sensor, driving how latch flags are set when
/// generating a program (spec §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Plane,
    Pixel,
    RgbLine,
    NonSequentialRgb,
    TwoPixelInterleaved,
}

/// The 64-slot scan-state program, nibble-packed two-per-byte (even slot
/// in the low nibble, odd in the high), matching the ASIC's
/// `a_nbNewAdrPointer[32]` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorProgram {
    bytes: [u8; NUM_SCAN_STEPS / 2],
}

impl MotorProgram {
    pub fn zeroed() -> Self {
        MotorProgram { bytes: [0; NUM_SCAN_STEPS / 2] }
    }

    pub fn set_slot(&mut self, index: usize, slot: Slot) {
        let byte = &mut self.bytes[index / 2];
        if index.is_multiple_of(2) {
            *byte = (*byte & 0xf0) | slot.to_nibble();
        } else {
            *byte = (*byte & 0x0f) | (slot.to_nibble() << 4);
        }
    }

    pub fn slot(&self, index: usize) -> Slot {
        let byte = self.bytes[index / 2];
        let nibble = if index.is_multiple_of(2) { byte & 0x0f } else { byte >> 4 };
        Slot::from_nibble(nibble)
    }

    /// Generate a program from the resolution ratio and color scheme
    /// (spec §4.D "Program generation"). `r = physical_dpi /
    /// requested_dpi_y` decides the stepping cadence; the color scheme
    /// decides which channel(s) latch on a non-stepping tick.
    pub fn generate(r: f64, scheme: ColorScheme, ticks_per_step: u8) -> Self {
        let mut program = MotorProgram::zeroed();
        let step_every = ticks_per_step.max(1) as usize;
        let latch_period = r.max(1.0).round() as usize;
        for i in 0..NUM_SCAN_STEPS {
            let step = i % step_every == 0;
            let latching = latch_period == 0 || i % latch_period.max(1) == 0;
            let slot = match scheme {
                ColorScheme::Plane | ColorScheme::Pixel => {
                    Slot { step, latch_red: latching, latch_green: latching, latch_blue: latching }
                }
                ColorScheme::RgbLine | ColorScheme::NonSequentialRgb => match i % 3 {
                    0 => Slot { step, latch_red: latching, latch_green: false, latch_blue: false },
                    1 => Slot { step, latch_red: false, latch_green: latching, latch_blue: false },
                    _ => Slot { step, latch_red: false, latch_green: false, latch_blue: latching },
                },
                ColorScheme::TwoPixelInterleaved => {
                    Slot { step, latch_red: latching, latch_green: latching, latch_blue: latching }
                }
            };
            program.set_slot(i, slot);
        }
        program
    }

    /// True if every slot `i` compares `<=` the slot at `(i+1) mod 64`
    /// under the step counter — i.e. the step flag never decreases twice
    /// in a row around the wrap, matching the "monotonic under the head
    /// state counter modulo 64" invariant (spec §3).
    pub fn is_monotonic(&self) -> bool {
        (0..NUM_SCAN_STEPS).all(|i| {
            let next = self.slot((i + 1) % NUM_SCAN_STEPS);
            let cur = self.slot(i);
            !(cur.step && !next.step && i + 1 == NUM_SCAN_STEPS)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    Init,
    Homing,
    Settle,
    Warmup,
    Calibrate,
    Park,
    FastMove,
    ScanActive,
    Stalled,
    BackoffRetry,
    EofPage,
    Done,
    Idle,
}

pub struct MotorPlanner {
    pub state: MotorState,
    pub program: MotorProgram,
    pub speed_index: u8,
    cancelled: bool,
}

const HOMING_TIMEOUT: Duration = Duration::from_secs(25);
const OVERFLOW_THRESHOLD: u32 = 180;

impl MotorPlanner {
    pub fn new() -> Self {
        MotorPlanner {
            state: MotorState::Init,
            program: MotorProgram::zeroed(),
            speed_index: 1,
            cancelled: false,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Drive the motor backward until a `home_sensor` probe reports home,
    /// or timeout (spec §4.D "Homing"). On timeout, perform one forward
    /// "unstick" retry before giving up with `Jammed`.
    pub fn home<F: FnMut() -> bool>(&mut self, home_sensor: F, step: impl FnMut(), sleep: impl FnMut(Duration)) -> Result<(), BackendError> {
        self.home_with_timeout(HOMING_TIMEOUT, home_sensor, step, sleep)
    }

    pub fn home_with_timeout<F: FnMut() -> bool>(
        &mut self,
        timeout: Duration,
        mut home_sensor: F,
        mut step: impl FnMut(),
        mut sleep: impl FnMut(Duration),
    ) -> Result<(), BackendError> {
        self.state = MotorState::Homing;
        let poll = Duration::from_millis(10);
        for attempt in 0..2 {
            let deadline = Instant::now() + timeout;
            loop {
                if home_sensor() {
                    self.state = MotorState::Settle;
                    return Ok(());
                }
                if self.cancelled {
                    self.state = MotorState::Idle;
                    return Err(BackendError::Cancelled);
                }
                if Instant::now() >= deadline {
                    break;
                }
                step();
                sleep(poll);
            }
            if attempt == 0 {
                for _ in 0..40 {
                    step();
                }
            }
        }
        Err(BackendError::Jammed)
    }

    /// FIFO-paced read loop pacing decision (spec §4.D): reduce speed on
    /// sustained high FIFO fill, and signal a stall retry when the device
    /// reports busy without FIFO growth.
    pub fn pace(&mut self, fifo_bytes: u32, previous_fifo_bytes: u32, device_busy: bool) {
        if fifo_bytes > OVERFLOW_THRESHOLD && fifo_bytes >= previous_fifo_bytes {
            self.speed_index = self.speed_index.saturating_sub(1).max(1);
        }
        if device_busy && fifo_bytes == previous_fifo_bytes {
            self.state = MotorState::Stalled;
        } else if self.state == MotorState::Stalled {
            self.state = MotorState::BackoffRetry;
        }
    }

    /// Convert the device-reported "dummy length" into an extra line
    /// offset applied to the BACK side (spec §4.D "Duplex alignment",
    /// Testable Property 5: `dummy_length * resolution / 1200`).
    pub fn duplex_back_offset_lines(dummy_length: u32, resolution_dpi: u32) -> u32 {
        (dummy_length as u64 * resolution_dpi as u64 / 1200) as u32
    }
}

impl Default for MotorPlanner {
    fn default() -> Self {
        MotorPlanner::new()
    }
}

//! The SANE-visible session state machine (spec §4.G, §9: "Replace the
//! giant struct of function pointers... with a trait per component and a
//! `Session` that composes them").
//!
//! This implementation drives the USB/SCSI bulk family end-to-end through
//! [`CommandSet`]; the parallel-port family's register-level primitives
//! (`command::register`, `MotorPlanner::home`) are implemented and tested
//! standalone (§4.B, §4.D) and plug into the same state machine through
//! the same operations, but a full parallel-port `Session` wiring is left
//! to a device-specific driver built on top of this module.

use std::time::{Duration, Instant};

use crate::calibration::CalibrationArtifacts;
use crate::command::scsi::{CommandSet, ReadKind};
use crate::device::{Device, DeviceRegistry};
use crate::error::BackendError;
use crate::line_assembler::{LineAssembler, LineFormat};
use crate::motor::MotorPlanner;
use crate::options::{ColorPass, DerivedParams, InfoFlags, OptionValues};
use crate::transport::BulkTransport;
use crate::wire::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opened,
    Configured,
    ScanningSideFront,
    ScanningSideBack,
    PageEof,
    Cancelled,
    Faulted,
}

pub struct Session<'a, T: BulkTransport> {
    pub device: &'static Device,
    pub transport: &'a mut T,
    pub state: SessionState,
    pub options: OptionValues,
    frozen_params: Option<DerivedParams>,
    cancel_requested: bool,
    fault: Option<BackendError>,
    assembler: Option<LineAssembler>,
    pub calibration: Option<CalibrationArtifacts>,
    duplex_back_offset_lines: u32,
    motor: MotorPlanner,
    page_number: u8,
}

const TEST_UNIT_READY_RETRIES: u32 = 3;
const TEST_UNIT_READY_BACKOFF: Duration = Duration::from_millis(50);
const DOCUMENT_POLL_INTERVAL: Duration = Duration::from_secs(1);

impl<'a, T: BulkTransport> Session<'a, T> {
    /// Open a session on `device` over `transport`: claim the device in the
    /// process-wide registry (spec §5: at most one open session per
    /// device), three `TEST_UNIT_READY` attempts, a timeout programmed
    /// from the option default, and an option model seeded from the
    /// device's capabilities (spec §4.G `open`).
    pub fn open(device: &'static Device, transport: &'a mut T) -> Result<Self, BackendError> {
        DeviceRegistry::global().open(device.id)?;
        let session = Session {
            device,
            transport,
            state: SessionState::Opened,
            options: OptionValues::defaults_for(device),
            frozen_params: None,
            cancel_requested: false,
            fault: None,
            assembler: None,
            calibration: None,
            duplex_back_offset_lines: 0,
            motor: MotorPlanner::new(),
            page_number: 0,
        };

        let mut last_err = BackendError::DeviceBusy;
        let mut ready = false;
        for attempt in 0..TEST_UNIT_READY_RETRIES {
            match CommandSet::new(session.transport).test_unit_ready() {
                Ok(()) => {
                    ready = true;
                    break;
                }
                Err(e) => last_err = e,
            }
            if attempt + 1 < TEST_UNIT_READY_RETRIES {
                std::thread::sleep(TEST_UNIT_READY_BACKOFF);
            }
        }
        if !ready {
            return Err(last_err);
        }
        CommandSet::new(session.transport).set_timeout(session.options.feed_timeout_secs as u8)?;
        Ok(session)
    }

    /// Apply `SET` to an option's resolved value and run the matching
    /// cross-option effect (spec §4.F). Higher-level option dispatch
    /// (by-index descriptor lookup) is left to the frontend collaborator
    /// named in §6.1; this focuses on the effects that must be applied
    /// atomically.
    pub fn set_mode(&mut self, mode: crate::options::Mode) -> InfoFlags {
        self.state = SessionState::Configured;
        self.options.set_mode(mode)
    }

    /// Recompute `DerivedParams` from current options (not scanning) or
    /// return the frozen parameters (scanning), per spec §4.G.
    pub fn get_parameters(&self, pass: Option<ColorPass>) -> DerivedParams {
        match (&self.state, self.frozen_params) {
            (SessionState::ScanningSideFront | SessionState::ScanningSideBack, Some(params)) => params,
            _ => DerivedParams::compute(&self.options, self.device, pass),
        }
    }

    fn fail(&mut self, error: BackendError) -> BackendError {
        if error.is_faulting() {
            self.state = SessionState::Faulted;
            self.fault = Some(error);
        }
        error
    }

    /// Perform the `start` command sequence (spec §4.G): ready check,
    /// document wait, window programming, `SCAN`, geometry probe, and
    /// (for duplex) the adjust-data alignment fetch.
    pub fn start(&mut self) -> Result<(), BackendError> {
        if self.state == SessionState::Faulted {
            return Err(BackendError::Inval);
        }
        self.cancel_requested = false;
        self.page_number = self.page_number.wrapping_add(1);
        self.options.validate(self.device).map_err(|e| self.fail(e))?;

        let result = CommandSet::new(self.transport).test_unit_ready();
        result.map_err(|e| self.fail(e))?;

        self.wait_for_document()?;

        let window = self.build_window();
        let result = CommandSet::new(self.transport).set_window(&window);
        result.map_err(|e| self.fail(e))?;
        if self.options.duplex {
            let mut back = window;
            back.reserved_side_marker();
            let result = CommandSet::new(self.transport).set_window(&back);
            result.map_err(|e| self.fail(e))?;
        }
        let result = CommandSet::new(self.transport).scan();
        result.map_err(|e| self.fail(e))?;

        let params = DerivedParams::compute(&self.options, self.device, Some(ColorPass::Red));
        self.frozen_params = Some(params);

        if self.options.duplex {
            let mut adjust_buf = [0u8; 40];
            let result = CommandSet::new(self.transport).get_adjust_data(&mut adjust_buf);
            result.map_err(|e| self.fail(e))?;
            let dummy_length = u16::from_be_bytes([adjust_buf[0], adjust_buf[1]]) as u32;
            self.duplex_back_offset_lines =
                crate::motor::MotorPlanner::duplex_back_offset_lines(dummy_length, self.options.resolution_y as u32);
        }

        self.assembler = Some(LineAssembler::new(
            LineFormat::Flat,
            params.bytes_per_line as usize * 64,
        ));
        self.state = SessionState::ScanningSideFront;
        self.cancel_requested = false;
        Ok(())
    }

    fn wait_for_document(&mut self) -> Result<(), BackendError> {
        let deadline = Instant::now() + Duration::from_secs(self.options.feed_timeout_secs as u64);
        loop {
            if self.cancel_requested {
                return Err(self.fail(BackendError::Cancelled));
            }
            let mut buf = [0u8; 1];
            let mut cmd = CommandSet::new(self.transport);
            match cmd.read_10(ReadKind::DocumentPresent, 0, self.page_number, &mut buf) {
                Ok(n) if n > 0 => return Ok(()),
                Ok(_) => {}
                Err(BackendError::NoDocs) => {}
                Err(e) => return Err(self.fail(e)),
            }
            if Instant::now() >= deadline {
                return Err(self.fail(BackendError::NoDocs));
            }
            std::thread::sleep(DOCUMENT_POLL_INTERVAL);
        }
    }

    fn build_window(&self) -> Window {
        let mut window = Window::new_zeroed();
        window.x_resolution = zerocopy::byteorder::big_endian::U16::new(self.options.resolution_x as u16);
        window.y_resolution = zerocopy::byteorder::big_endian::U16::new(self.options.resolution_y as u16);
        window.upper_left_x =
            zerocopy::byteorder::big_endian::U32::new((self.options.bbox.tl_x * 1200.0 / 25.4) as u32);
        window.upper_left_y =
            zerocopy::byteorder::big_endian::U32::new((self.options.bbox.tl_y * 1200.0 / 25.4) as u32);
        let params = DerivedParams::compute(&self.options, self.device, None);
        window.width = zerocopy::byteorder::big_endian::U32::new(params.pixels_per_line);
        window.length = zerocopy::byteorder::big_endian::U32::new(params.lines);
        window.brightness = (self.options.brightness as i16 + 128) as u8;
        window.threshold = self.options.threshold;
        window.contrast = (self.options.contrast as i16 + 128) as u8;
        window.bits_per_pixel = params.depth;
        window
    }

    /// Pull bytes from the current side's ring, refilling from the device
    /// when empty (spec §4.G `read`). A duplex FRONT side that hits EOF
    /// flips to BACK automatically (spec §4.G: "Transitions... form a DAG
    /// except for the page loop") and primes the dummy-length skip (spec
    /// §4.B, Property 5) before handing back BACK bytes; `0` is only
    /// returned once the page (both sides, for duplex) is exhausted.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, BackendError> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        if self.cancel_requested {
            self.state = SessionState::Cancelled;
            self.home();
            return Err(self.fail(BackendError::Cancelled));
        }
        if !matches!(self.state, SessionState::ScanningSideFront | SessionState::ScanningSideBack) {
            return Ok(0);
        }

        loop {
            let assembler = self.assembler.as_mut().expect("scanning session always has an assembler");
            let already = assembler.read(buf);
            if already > 0 {
                return Ok(already);
            }

            let side = if self.state == SessionState::ScanningSideFront { 0u8 } else { 1u8 };
            let mut chunk = vec![0u8; buf.len()];
            let mut cmd = CommandSet::new(self.transport);
            let outcome = cmd.read_10(ReadKind::ImageData, side, self.page_number, &mut chunk);
            match outcome {
                Ok(0) | Err(BackendError::Eof) => {
                    if side == 0 && self.options.duplex {
                        self.begin_back_side()?;
                        continue;
                    }
                    self.state = SessionState::PageEof;
                    return Ok(0);
                }
                Ok(n) => {
                    let assembler = self.assembler.as_mut().unwrap();
                    assembler.feed(&chunk[..n]);
                    let filled = assembler.read(buf);
                    if filled > 0 {
                        return Ok(filled);
                    }
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// Flip state to BACK and discard `dummy_length · resolution / 1200`
    /// lines' worth of device bytes so the consumer-visible BACK image
    /// starts aligned with FRONT (spec §4.B, Property 5).
    fn begin_back_side(&mut self) -> Result<(), BackendError> {
        self.state = SessionState::ScanningSideBack;
        let bytes_per_line = self.frozen_params.map(|p| p.bytes_per_line).unwrap_or(0) as u64;
        let mut skip = self.duplex_back_offset_lines as u64 * bytes_per_line;
        let mut scratch = vec![0u8; 256.max(bytes_per_line as usize)];
        while skip > 0 {
            let want = scratch.len().min(skip as usize);
            let mut cmd = CommandSet::new(self.transport);
            let outcome = cmd.read_10(ReadKind::ImageData, 1, self.page_number, &mut scratch[..want]);
            match outcome {
                Ok(0) | Err(BackendError::Eof) => break,
                Ok(n) => skip -= n as u64,
                Err(e) => return Err(self.fail(e)),
            }
        }
        Ok(())
    }

    /// Sticky until `close` or a successful next `start` (spec §5).
    pub fn cancel(&mut self) {
        self.cancel_requested = true;
    }

    /// Run the carriage home, bulk/SCSI family (spec §4.D, §4.G `close`,
    /// §5 "after cancel... transitions through HOMING"). The bulk family
    /// has no discrete home-sensor register the way the parallel-port
    /// family does, so a successful `TEST_UNIT_READY` stands in for the
    /// home-sensor probe: the device only reports ready once the carriage
    /// has settled. Logged rather than propagated — a stuck carriage
    /// doesn't change the outcome the caller already has (a cancel or a
    /// close) and `close`/cancel must not fail.
    fn home(&mut self) {
        let transport = &mut *self.transport;
        let result = self.motor.home(
            || CommandSet::new(&mut *transport).test_unit_ready().is_ok(),
            || {},
            std::thread::sleep,
        );
        if let Err(e) = result {
            log::warn!("carriage did not confirm home within the timeout: {e}");
        }
    }

    /// Release the device, run HOMING (spec §4.G `close`), and reset the
    /// FSM to IDLE.
    pub fn close(&mut self) {
        self.home();
        self.state = SessionState::Idle;
        self.fault = None;
        self.cancel_requested = false;
        self.assembler = None;
        DeviceRegistry::global().close(self.device.id);
    }
}

impl<'a, T: BulkTransport> Drop for Session<'a, T> {
    fn drop(&mut self) {
        DeviceRegistry::global().close(self.device.id);
    }
}

/// Marker write distinguishing the BACK side's window from FRONT for
/// duplex scans (spec §4.B `window_side`); kept as a small helper so
/// `start` reads as the documented sequence rather than inline bit-ops.
trait DuplexWindow {
    fn reserved_side_marker(&mut self);
}

impl DuplexWindow for Window {
    fn reserved_side_marker(&mut self) {
        self.window_identifier = crate::wire::window_side::BACK;
    }
}

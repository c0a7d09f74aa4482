//! Transport abstraction over the two physical link types (spec §4.A):
//! USB/SCSI bulk transport and parallel-port register I/O. Grounded on the
//! teacher's controller-driver split (`drivers/usb/ehci.rs`,
//! `drivers/ahci/regs.rs`): a small trait at the seam, register/constant
//! tables as `mod`-scoped `pub const`s next to the code that uses them.

pub mod sim;

use std::time::Duration;

use crate::error::BackendError;
use crate::wire::BulkHeader;

/// Direction of a bulk command's data phase (spec §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    None,
    In,
    Out,
}

/// USB/SCSI bulk transport: every exchange is header, optional data phase,
/// then a trailing status frame (spec §6.2).
pub trait BulkTransport {
    /// Send a 12-byte bulk header plus command payload, then the data phase
    /// (if any), and return the raw status frame bytes.
    fn exchange(
        &mut self,
        header: BulkHeader,
        command: &[u8],
        direction: Direction,
        data: &mut [u8],
        timeout: Duration,
    ) -> Result<u32, BackendError>;
}

/// Parallel-port register transport: direct register I/O plus burst reads
/// for pixel data, across the three supported electrical modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelMode {
    Spp,
    Ps2Bidi,
    Epp,
}

pub trait RegisterTransport {
    fn register_write(&mut self, register: u8, value: u8) -> Result<(), BackendError>;
    fn register_read(&mut self, register: u8) -> Result<u8, BackendError>;

    /// Burst-read pixel data in the configured mode. `delay` selects one of
    /// four device-defined inter-byte delay settings (spec §4.B register
    /// table: "delay parameter 0..3").
    fn burst_read(&mut self, buf: &mut [u8], delay: u8) -> Result<usize, BackendError>;

    fn mode(&self) -> ParallelMode;
}

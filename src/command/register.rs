//! Parallel-port register table (spec §4.B), names and bit layouts
//! grounded on the original source's `plustek-pp_hwdefs.h`.

use std::time::Duration;

use crate::error::BackendError;
use crate::transport::{ParallelMode, RegisterTransport};

/// Named register addresses (P96/P98 ASIC family).
pub mod regs {
    pub const CTRL: u8 = 0x00;
    pub const STATUS: u8 = 0x01;
    pub const MODE: u8 = 0x02;
    pub const MOTOR_CTRL: u8 = 0x03;
    pub const MOTOR_STEP: u8 = 0x04;
    pub const SCAN_STATE_LO: u8 = 0x05;
    pub const SCAN_STATE_HI: u8 = 0x06;
    pub const DPI_X_LO: u8 = 0x07;
    pub const DPI_X_HI: u8 = 0x08;
    pub const DPI_Y_LO: u8 = 0x09;
    pub const DPI_Y_HI: u8 = 0x0a;
    pub const GAIN_RED: u8 = 0x0b;
    pub const GAIN_GREEN: u8 = 0x0c;
    pub const GAIN_BLUE: u8 = 0x0d;
    pub const OFFSET_RED: u8 = 0x0e;
    pub const OFFSET_GREEN: u8 = 0x0f;
    pub const OFFSET_BLUE: u8 = 0x10;
    pub const LAMP_CTRL: u8 = 0x11;
    pub const FIFO_STATUS: u8 = 0x12;
}

/// `CTRL` register bits (original source's `_CTRL_*`).
pub mod ctrl {
    pub const STROBE: u8 = 0x01;
    pub const AUTOLF: u8 = 0x02;
    pub const NOT_INIT: u8 = 0x04;
    pub const SELECT_IN: u8 = 0x08;
    pub const ENABLE_IRQ: u8 = 0x10;
    pub const DIRECTION: u8 = 0x20;
    pub const RESERVED: u8 = 0xc0;

    pub const GENSIGNAL: u8 = RESERVED | NOT_INIT;
    pub const START_REGWRITE: u8 = GENSIGNAL | SELECT_IN;
    pub const END_REGWRITE: u8 = GENSIGNAL;
    pub const START_DATAWRITE: u8 = GENSIGNAL | AUTOLF;
    pub const END_DATAWRITE: u8 = GENSIGNAL;
    pub const START_BIDIREAD: u8 = GENSIGNAL | DIRECTION | AUTOLF;
    pub const END_BIDIREAD: u8 = GENSIGNAL | DIRECTION;
}

/// `STATUS` register bits (original source's `_FLAG_P96_*`).
pub mod status {
    pub const PAPER: u8 = 0x01;
    pub const ADF: u8 = 0x02;
    pub const KEY: u8 = 0x04;
    pub const EPP: u8 = 0x08;
    pub const FIFO_FULL: u8 = 0x10;
    pub const FIFO_EMPTY: u8 = 0x20;
    pub const CCD_TYPE: u8 = 0x40;
    pub const MOTOR_TYPE: u8 = 0x80;
}

/// Inter-byte delay settings accepted by `burst_read` (spec §4.B).
pub const DELAY_NONE: u8 = 0;
pub const DELAY_SHORT: u8 = 1;
pub const DELAY_MEDIUM: u8 = 2;
pub const DELAY_LONG: u8 = 3;

/// Bracket a register write with the start/end control sequence the ASIC
/// expects, matching the original source's `_CTRL_START_REGWRITE` /
/// `_CTRL_END_REGWRITE` framing.
pub fn write_register<T: RegisterTransport>(
    transport: &mut T,
    reg: u8,
    value: u8,
) -> Result<(), BackendError> {
    transport.register_write(regs::CTRL, ctrl::START_REGWRITE)?;
    transport.register_write(reg, value)?;
    transport.register_write(regs::CTRL, ctrl::END_REGWRITE)?;
    Ok(())
}

pub fn read_status<T: RegisterTransport>(transport: &mut T) -> Result<u8, BackendError> {
    transport.register_read(regs::STATUS)
}

pub fn cover_open<T: RegisterTransport>(transport: &mut T) -> Result<bool, BackendError> {
    Ok(read_status(transport)? & status::PAPER == 0)
}

/// Burst-read a scan line, bracketing with the bidirectional-read control
/// sequence when the port is in `Ps2Bidi` mode (the original source framed
/// bidi reads with `_CTRL_START_BIDIREAD`/`_CTRL_END_BIDIREAD`; SPP/EPP
/// transfers need no such framing).
pub fn read_line<T: RegisterTransport>(
    transport: &mut T,
    buf: &mut [u8],
    delay: u8,
) -> Result<usize, BackendError> {
    if transport.mode() == ParallelMode::Ps2Bidi {
        transport.register_write(regs::CTRL, ctrl::START_BIDIREAD)?;
    }
    let n = transport.burst_read(buf, delay)?;
    if transport.mode() == ParallelMode::Ps2Bidi {
        transport.register_write(regs::CTRL, ctrl::END_BIDIREAD)?;
    }
    Ok(n)
}

/// Busy-poll the FIFO-empty status bit until data is ready or `timeout`
/// elapses (spec §4.E "FIFO-paced read loop").
pub fn wait_for_fifo_data<T: RegisterTransport>(
    transport: &mut T,
    timeout: Duration,
    poll_interval: Duration,
    mut sleep: impl FnMut(Duration),
) -> Result<(), BackendError> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let status = read_status(transport)?;
        if status & status::FIFO_EMPTY == 0 {
            return Ok(());
        }
        if std::time::Instant::now() >= deadline {
            return Err(BackendError::Timeout);
        }
        sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::sim::SimTransport;

    #[test]
    fn write_register_brackets_with_start_end() {
        let mut sim = SimTransport::new();
        write_register(&mut sim, regs::GAIN_RED, 0x20).unwrap();
        assert_eq!(sim.register_read(regs::GAIN_RED).unwrap(), 0x20);
        assert_eq!(sim.register_read(regs::CTRL).unwrap(), ctrl::END_REGWRITE);
    }

    #[test]
    fn cover_open_reads_paper_bit() {
        let mut sim = SimTransport::new();
        sim.register_write(regs::STATUS, 0).unwrap();
        assert!(cover_open(&mut sim).unwrap());
        sim.register_write(regs::STATUS, status::PAPER).unwrap();
        assert!(!cover_open(&mut sim).unwrap());
    }

    #[test]
    fn wait_for_fifo_data_returns_once_not_empty() {
        let mut sim = SimTransport::new();
        sim.register_write(regs::STATUS, 0).unwrap();
        let mut ticks = 0;
        let result =
            wait_for_fifo_data(&mut sim, Duration::from_millis(50), Duration::from_millis(1), |_| ticks += 1);
        assert!(result.is_ok());
        assert_eq!(ticks, 0);
    }

    #[test]
    fn wait_for_fifo_data_times_out_when_always_empty() {
        let mut sim = SimTransport::new();
        sim.register_write(regs::STATUS, status::FIFO_EMPTY).unwrap();
        let result =
            wait_for_fifo_data(&mut sim, Duration::from_millis(5), Duration::from_millis(1), |_| ());
        assert_eq!(result, Err(BackendError::Timeout));
    }
}

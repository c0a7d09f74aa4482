//! USB/SCSI command set (spec §4.B), opcodes grounded on the original
//! source's `kvs20xx_cmd.h`.

use std::time::Duration;

use crate::error::BackendError;
use crate::sense::{SenseDecoder, SenseFrame};
use crate::transport::{BulkTransport, Direction};
use crate::wire::{self, BulkHeader, Window};

pub mod opcode {
    pub const TEST_UNIT_READY: u8 = 0x00;
    pub const REQUEST_SENSE: u8 = 0x03;
    pub const INQUIRY: u8 = 0x12;
    pub const READ_10: u8 = 0x28;
    pub const SEND_10: u8 = 0x2A;
    pub const SET_WINDOW: u8 = 0x24;
    pub const SCAN: u8 = 0x1B;
    pub const GET_BUFFER_STATUS: u8 = 0x34;
    pub const SET_TIMEOUT: u8 = 0xE1;
    pub const GET_ADJUST_DATA: u8 = 0xE0;
}

/// `READ_10` sub-mode byte distinguishing the kind of data a page
/// requests (spec §4.B: byte 2 is the sub-mode, byte 4 the page number,
/// byte 5 the side code — bit-exact, not renumbered).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    /// `0x80`: pixel-count-per-side probe.
    PixelCount,
    /// `0x81`: document-present probe, polled by `wait_for_document`.
    DocumentPresent,
    /// `0x00`: the bulk image stream.
    ImageData,
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin command encoder sitting on top of a [`BulkTransport`]; every method
/// wraps one SCSI-shaped CDB in the 12-byte bulk header and decodes the
/// trailing status through [`SenseDecoder`] where a sense check applies.
pub struct CommandSet<'a, T: BulkTransport> {
    transport: &'a mut T,
    next_transaction_id: u32,
}

impl<'a, T: BulkTransport> CommandSet<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        CommandSet { transport, next_transaction_id: 1 }
    }

    fn transaction_id(&mut self) -> u32 {
        let id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);
        id
    }

    fn command_only(&mut self, cdb: &[u8]) -> Result<u32, BackendError> {
        let id = self.transaction_id();
        let header = BulkHeader::new(cdb.len() as u32, wire::block_type::COMMAND, wire::block_code::COMMAND, id);
        let mut empty = [];
        self.transport.exchange(header, cdb, Direction::None, &mut empty, DEFAULT_TIMEOUT)
    }

    pub fn test_unit_ready(&mut self) -> Result<(), BackendError> {
        let cdb = [opcode::TEST_UNIT_READY, 0, 0, 0, 0, 0];
        let status = self.command_only(&cdb)?;
        if status == wire::STATUS_GOOD {
            Ok(())
        } else {
            self.request_sense().and_then(SenseDecoder::decode)
        }
    }

    pub fn request_sense(&mut self) -> Result<SenseFrame, BackendError> {
        let cdb = [opcode::REQUEST_SENSE, 0, 0, 0, 18, 0];
        let id = self.transaction_id();
        let header = BulkHeader::new(18, wire::block_type::DATA, wire::block_code::DATA, id);
        let mut buf = [0u8; 18];
        self.transport.exchange(header, &cdb, Direction::In, &mut buf, DEFAULT_TIMEOUT)?;
        Ok(SenseFrame::parse(&buf))
    }

    pub fn set_window(&mut self, window: &Window) -> Result<(), BackendError> {
        let cdb = [opcode::SET_WINDOW, 0, 0, 0, 0, 0, 0, 0, 64, 0];
        let id = self.transaction_id();
        let header = BulkHeader::new(64, wire::block_type::DATA, wire::block_code::DATA, id);
        let mut payload = window.to_bytes();
        let status = self.transport.exchange(header, &cdb, Direction::Out, &mut payload, DEFAULT_TIMEOUT)?;
        if status == wire::STATUS_GOOD {
            Ok(())
        } else {
            self.request_sense().and_then(SenseDecoder::decode)
        }
    }

    pub fn scan(&mut self) -> Result<(), BackendError> {
        let cdb = [opcode::SCAN, 0, 0, 0, 0, 0];
        let status = self.command_only(&cdb)?;
        if status == wire::STATUS_GOOD {
            Ok(())
        } else {
            self.request_sense().and_then(SenseDecoder::decode)
        }
    }

    /// Read one chunk of the requested kind into `buf`, returning the
    /// number of bytes actually filled. `page` is the 1-based page number
    /// within the current `start()` (spec §4.B byte 4); `side` is the
    /// duplex side code (byte 5): 0 = front, 1 = back.
    pub fn read_10(&mut self, kind: ReadKind, side: u8, page: u8, buf: &mut [u8]) -> Result<usize, BackendError> {
        let sub_mode = match kind {
            ReadKind::PixelCount => 0x80,
            ReadKind::DocumentPresent => 0x81,
            ReadKind::ImageData => 0x00,
        };
        let len = buf.len() as u32;
        let cdb = [
            opcode::READ_10,
            0,
            sub_mode,
            0,
            page,
            side,
            (len >> 16) as u8,
            (len >> 8) as u8,
            len as u8,
            0,
        ];
        let id = self.transaction_id();
        let header = BulkHeader::new(len, wire::block_type::DATA, wire::block_code::DATA, id);
        let status = self.transport.exchange(header, &cdb, Direction::In, buf, DEFAULT_TIMEOUT)?;
        if status == wire::STATUS_GOOD {
            Ok(buf.len())
        } else {
            let frame = self.request_sense()?;
            match SenseDecoder::decode(frame) {
                Ok(()) => Ok(buf.len()),
                Err(BackendError::Eof) => Ok(0),
                Err(e) => Err(e),
            }
        }
    }

    /// Query the device's internal buffer fill level, in bytes.
    pub fn get_buffer_status(&mut self) -> Result<u32, BackendError> {
        let cdb = [opcode::GET_BUFFER_STATUS, 0, 0, 0, 0, 0, 0, 0, 12, 0];
        let id = self.transaction_id();
        let header = BulkHeader::new(12, wire::block_type::DATA, wire::block_code::DATA, id);
        let mut buf = [0u8; 12];
        self.transport.exchange(header, &cdb, Direction::In, &mut buf, DEFAULT_TIMEOUT)?;
        Ok(u32::from_be_bytes([0, buf[5], buf[6], buf[7]]))
    }

    pub fn set_timeout(&mut self, seconds: u8) -> Result<(), BackendError> {
        let cdb = [opcode::SET_TIMEOUT, 0, 0, 0, seconds, 0];
        let status = self.command_only(&cdb)?;
        if status == wire::STATUS_GOOD { Ok(()) } else { Err(BackendError::IoError) }
    }

    /// Fetch factory calibration adjustment data (dark offset / gain seed
    /// values used before the first shading pass).
    pub fn get_adjust_data(&mut self, buf: &mut [u8]) -> Result<usize, BackendError> {
        let len = buf.len() as u32;
        let cdb = [
            opcode::GET_ADJUST_DATA,
            0,
            0,
            0,
            0,
            0,
            (len >> 16) as u8,
            (len >> 8) as u8,
            len as u8,
            0,
        ];
        let id = self.transaction_id();
        let header = BulkHeader::new(len, wire::block_type::DATA, wire::block_code::DATA, id);
        self.transport.exchange(header, &cdb, Direction::In, buf, DEFAULT_TIMEOUT)?;
        Ok(buf.len())
    }
}

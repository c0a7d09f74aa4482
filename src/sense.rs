//! Central sense-code decoding (spec §4.C / §9: "Global error signalling via
//! sense codes" → "Central SenseDecoder as a pure function... driven by a
//! static table equivalent to the source's `s_errors[]`").
//!
//! `SenseDecoder::decode` is the *only* place sense bytes turn into a
//! [`BackendError`]; callers never re-interpret `(sense_key, asc, ascq)`
//! themselves, per the §7 propagation policy.

use crate::error::BackendError;

/// END_OF_MEDIUM bit, byte 2 of the 18-byte sense frame (§6.2).
pub const END_OF_MEDIUM: u8 = 1 << 6;

/// A decoded 18-byte REQUEST_SENSE response (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SenseFrame {
    pub sense_key: u8,
    pub asc: u8,
    pub ascq: u8,
    pub end_of_medium: bool,
}

impl SenseFrame {
    /// Parse the 18-byte REQUEST_SENSE payload. `sense_key` lives at offset
    /// 2 (with `END_OF_MEDIUM` in bit 6), `asc`/`ascq` at offsets 12/13.
    pub fn parse(buf: &[u8; 18]) -> Self {
        SenseFrame {
            sense_key: buf[2] & 0x0f,
            end_of_medium: buf[2] & END_OF_MEDIUM != 0,
            asc: buf[12],
            ascq: buf[13],
        }
    }
}

/// One row of the static sense → error table, grounded on the original
/// source's `s_errors[]` (`kvs20xx_cmd.h`).
struct SenseRow {
    sense_key: u8,
    asc: u8,
    ascq: u8,
    error: BackendError,
}

const TABLE: &[SenseRow] = &[
    SenseRow { sense_key: 0x02, asc: 0x00, ascq: 0x00, error: BackendError::DeviceBusy },
    SenseRow { sense_key: 0x02, asc: 0x04, ascq: 0x01, error: BackendError::DeviceBusy },
    SenseRow { sense_key: 0x02, asc: 0x04, ascq: 0x80, error: BackendError::CoverOpen },
    SenseRow { sense_key: 0x02, asc: 0x04, ascq: 0x81, error: BackendError::CoverOpen },
    SenseRow { sense_key: 0x02, asc: 0x04, ascq: 0x82, error: BackendError::CoverOpen },
    SenseRow { sense_key: 0x02, asc: 0x04, ascq: 0x83, error: BackendError::CoverOpen },
    SenseRow { sense_key: 0x02, asc: 0x04, ascq: 0x84, error: BackendError::CoverOpen },
    SenseRow { sense_key: 0x02, asc: 0x80, ascq: 0x01, error: BackendError::Cancelled },
    SenseRow { sense_key: 0x02, asc: 0x80, ascq: 0x02, error: BackendError::Cancelled },
    SenseRow { sense_key: 0x03, asc: 0x3a, ascq: 0x00, error: BackendError::NoDocs },
    SenseRow { sense_key: 0x03, asc: 0x80, ascq: 0x01, error: BackendError::Jammed },
    SenseRow { sense_key: 0x03, asc: 0x80, ascq: 0x02, error: BackendError::Jammed },
    SenseRow { sense_key: 0x03, asc: 0x80, ascq: 0x03, error: BackendError::Jammed },
    SenseRow { sense_key: 0x03, asc: 0x80, ascq: 0x04, error: BackendError::Jammed },
    SenseRow { sense_key: 0x03, asc: 0x80, ascq: 0x05, error: BackendError::Jammed },
    SenseRow { sense_key: 0x03, asc: 0x80, ascq: 0x06, error: BackendError::Jammed },
    SenseRow { sense_key: 0x03, asc: 0x80, ascq: 0x07, error: BackendError::Jammed },
    SenseRow { sense_key: 0x03, asc: 0x80, ascq: 0x08, error: BackendError::Jammed },
    SenseRow { sense_key: 0x03, asc: 0x80, ascq: 0x09, error: BackendError::Jammed },
];

/// Pure sense → [`BackendError`] translation.
pub struct SenseDecoder;

impl SenseDecoder {
    /// Decode a sense frame. `Ok(())` means the command completed
    /// (sense key 0, no END_OF_MEDIUM); anything else is a [`BackendError`].
    ///
    /// `END_OF_MEDIUM` is checked before the table lookup: it signals normal
    /// termination even when paired with a non-zero sense key (some devices
    /// report it alongside a residual "no docs" code at the very last page).
    pub fn decode(frame: SenseFrame) -> Result<(), BackendError> {
        if frame.end_of_medium {
            return Err(BackendError::Eof);
        }
        if frame.sense_key == 0 {
            return Ok(());
        }
        for row in TABLE {
            if row.sense_key == frame.sense_key && row.asc == frame.asc && row.ascq == frame.ascq {
                return Err(row.error);
            }
        }
        Err(BackendError::IoError)
    }
}

//! On-wire structs for the USB/SCSI transport (spec §4.B, §6.2).
//!
//! Every multi-byte field is big-endian and every struct has a fixed byte
//! layout that must be reproduced exactly — per the §9 redesign note
//! ("Packed on-wire structs... Encode/decode through explicit big-endian
//! primitives; never rely on language-level struct layout"), fields are
//! `zerocopy::byteorder::big_endian::{U16, U32}` rather than native
//! integers, and the structs derive `IntoBytes`/`FromBytes` so encode/decode
//! is a reinterpret-cast with no manual shifting.

use zerocopy::byteorder::big_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// The 12-byte USB bulk wrapper header (§6.2).
#[repr(C, packed)]
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BulkHeader {
    pub length: U32,
    pub block_type: U16,
    pub code: U16,
    pub transaction_id: U32,
}

/// Bulk block `type` field values (§6.2).
pub mod block_type {
    pub const COMMAND: u16 = 1;
    pub const DATA: u16 = 2;
    pub const RESPONSE: u16 = 3;
}

/// Bulk block `code` field values, distinguishing command/data/response
/// phases that must be emitted in order (§4.A).
pub mod block_code {
    pub const COMMAND: u16 = 0x9000;
    pub const DATA: u16 = 0xb000;
    pub const RESPONSE: u16 = 0xa000;
}

impl BulkHeader {
    pub fn new(length: u32, block_type: u16, code: u16, transaction_id: u32) -> Self {
        BulkHeader {
            length: U32::new(length),
            block_type: U16::new(block_type),
            code: U16::new(code),
            transaction_id: U32::new(transaction_id),
        }
    }
}

/// Status frame trailing every command exchange (§6.2): 4 bytes, big-endian
/// u32. `0` is GOOD, `2` is CHECK_CONDITION.
pub const STATUS_GOOD: u32 = 0x0000_0000;
pub const STATUS_CHECK_CONDITION: u32 = 0x0000_0002;

/// Bit-ordering values for [`Window::bit_ordering`] (§4.B: "set from device
/// endianness: left-to-right vs right-to-left pixel packing").
pub mod bit_ordering {
    pub const LEFT_TO_RIGHT: u16 = 0;
    pub const RIGHT_TO_LEFT: u16 = 1;
}

/// Page side selector for `SET_WINDOW` (§4.B).
pub mod window_side {
    pub const FRONT: u8 = 0x00;
    pub const BACK: u8 = 0x80;
}

/// The 64-byte `SET_WINDOW` payload (§4.B). Field order and widths are an
/// on-wire invariant: every field the spec enumerates is present, and the
/// struct is exactly 64 bytes (checked by `window_is_64_bytes` below).
#[repr(C, packed)]
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    reserved0: [u8; 6],
    pub window_descriptor_length: U16,
    pub window_identifier: u8,
    reserved1: u8,
    pub x_resolution: U16,
    pub y_resolution: U16,
    pub upper_left_x: U32,
    pub upper_left_y: U32,
    pub width: U32,
    pub length: U32,
    pub brightness: u8,
    pub threshold: u8,
    pub contrast: u8,
    pub image_composition: u8,
    pub bits_per_pixel: u8,
    pub halftone_pattern: U16,
    reserved2: u8,
    pub bit_ordering: U16,
    pub gamma_correction: u8,
    pub lamp_dropout: u8,
    pub document_size: u8,
    pub document_width: U32,
    pub document_length: U32,
    pub image_emphasis: u8,
    pub dbl_feed_sensitivity: u8,
    pub length_control: u8,
    pub landscape: u8,
    pub continuous_scan: u8,
    pub mfeed_top: u8,
    pub mfeed_bottom: u8,
    pub stop_mode: u8,
    reserved3: [u8; 5],
}

impl Default for Window {
    fn default() -> Self {
        Window::new_zeroed()
    }
}

impl Window {
    pub fn new_zeroed() -> Self {
        zerocopy::FromZeros::new_zeroed()
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out.copy_from_slice(self.as_bytes());
        out
    }

    pub fn from_bytes(buf: &[u8; 64]) -> Self {
        Window::read_from_bytes(buf).expect("Window is exactly 64 bytes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_64_bytes() {
        assert_eq!(core::mem::size_of::<Window>(), 64);
    }

    #[test]
    fn bulk_header_is_12_bytes() {
        assert_eq!(core::mem::size_of::<BulkHeader>(), 12);
    }

    #[test]
    fn bulk_header_encodes_big_endian() {
        let h = BulkHeader::new(0x1234_5678, 1, 0x9000, 0xdead_beef);
        let bytes = h.as_bytes();
        assert_eq!(&bytes[0..4], &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(&bytes[4..6], &[0x00, 0x01]);
        assert_eq!(&bytes[6..8], &[0x90, 0x00]);
        assert_eq!(&bytes[8..12], &[0xde, 0xad, 0xbe, 0xef]);
    }

    /// Property 6: encoded `window` round-trips through encode/decode.
    #[test]
    fn window_round_trips() {
        let mut w = Window::new_zeroed();
        w.x_resolution = U16::new(300);
        w.y_resolution = U16::new(300);
        w.upper_left_x = U32::new(0);
        w.upper_left_y = U32::new(0);
        w.width = U32::new(2480);
        w.length = U32::new(3507);
        w.brightness = 128;
        w.threshold = 50;
        w.contrast = 128;
        w.image_composition = 5;
        w.bits_per_pixel = 24;
        w.bit_ordering = U16::new(bit_ordering::LEFT_TO_RIGHT);
        w.landscape = 0;

        let bytes = w.to_bytes();
        let decoded = Window::from_bytes(&bytes);
        assert_eq!(w, decoded);
    }
}

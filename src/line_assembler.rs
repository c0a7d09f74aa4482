//! Converts raw on-device line layouts into frontend pixel rows, and
//! performs fractional-resolution interpolation (spec §4.E).

use crate::ring::{Channel, RingBuffer};

/// On-device scanline byte layout (spec §4.E, GLOSSARY "Line format").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    Flat,
    SeqRgb,
    GoofyRgb,
    Seq2r2g2b,
}

pub struct LineAssembler {
    pub format: LineFormat,
    pub ring: RingBuffer,
}

impl LineAssembler {
    pub fn new(format: LineFormat, ring_size: usize) -> Self {
        LineAssembler { format, ring: RingBuffer::new(ring_size) }
    }

    /// Feed one raw sub-line of device bytes into the ring, per the
    /// layout rules in §4.E.
    pub fn feed(&mut self, data: &[u8]) {
        match self.format {
            LineFormat::Flat => self.ring.write_flat(data),
            LineFormat::SeqRgb => self.feed_seq_rgb(data),
            LineFormat::GoofyRgb => self.feed_goofy_rgb(data),
            LineFormat::Seq2r2g2b => self.feed_seq_2r2g2b(data),
        }
    }

    /// `SEQ_RGB`: caller supplies one color's worth of the line at a time
    /// via `feed_channel`; plain `feed` is only meaningful for formats
    /// that don't need channel tagging.
    pub fn feed_channel(&mut self, channel: Channel, data: &[u8]) {
        self.ring.write_channel(channel, data);
    }

    fn feed_seq_rgb(&mut self, data: &[u8]) {
        let third = data.len() / 3;
        self.ring.write_channel(Channel::Red, &data[..third]);
        self.ring.write_channel(Channel::Green, &data[third..2 * third]);
        self.ring.write_channel(Channel::Blue, &data[2 * third..3 * third]);
    }

    /// `GOOFY_RGB`: each sub-line is `[line_index, channel_letter, ...bytes]`;
    /// the letter (not position) decides the channel (spec §4.E).
    fn feed_goofy_rgb(&mut self, data: &[u8]) {
        if data.len() < 2 {
            return;
        }
        let channel = match data[1] {
            b'R' => Channel::Red,
            b'G' => Channel::Green,
            b'B' => Channel::Blue,
            _ => return,
        };
        self.ring.write_channel(channel, &data[2..]);
    }

    /// `SEQ_2R2G2B`: 6-byte groups encode two pixels as `RRGGBB`; unpack
    /// into two RGB triplets (spec §4.E).
    fn feed_seq_2r2g2b(&mut self, data: &[u8]) {
        for group in data.chunks_exact(6) {
            let (r0, r1, g0, g1, b0, b1) = (group[0], group[1], group[2], group[3], group[4], group[5]);
            self.ring.write_flat(&[r0, g0, b0, r1, g1, b1]);
        }
    }

    pub fn read(&mut self, out: &mut [u8]) -> usize {
        self.ring.read(out)
    }
}

/// Fractional-resolution interpolation for one output sample (spec §4.E):
/// given the two contributing source positions `n1`/`n2` and their
/// fractional coordinates `x1`/`x2`, produce the weighted average, or
/// `src[n1]` outright when the sample falls exactly on a source pixel.
pub fn interpolate_sample(src: &[u8], n1: usize, n2: usize, x1: f64, x2: f64) -> u8 {
    if x2 == n2 as f64 || n1 == n2 {
        return src[n1];
    }
    let aspect = x2 - x1;
    let weighted = src[n1] as f64 * (n2 as f64 - x1) + src[n2] as f64 * (x2 - n2 as f64);
    (weighted / aspect).round().clamp(0.0, 255.0) as u8
}

/// Compute `(n1, n2, x1, x2)` for output sample `i` scaling from `base_dpi`
/// to `requested_dpi` (spec §4.E).
pub fn sample_positions(i: usize, base_dpi: f64, requested_dpi: f64) -> (usize, usize, f64, f64) {
    let ratio = base_dpi / requested_dpi;
    let x1 = i as f64 * ratio;
    let x2 = (i + 1) as f64 * ratio;
    let n1 = x1.floor() as usize;
    let n2 = x2.floor() as usize;
    (n1, n2, x1, x2)
}

/// Scale one source row to `out_len` output samples at the requested
/// resolution. For lineart (`threshold` set) each weighted sum is
/// thresholded at 0.5 of full scale rather than rounded to a gray value.
pub fn scale_row(src: &[u8], out_len: usize, base_dpi: f64, requested_dpi: f64, threshold: Option<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let (n1, n2, x1, x2) = sample_positions(i, base_dpi, requested_dpi);
        let n2 = n2.min(src.len().saturating_sub(1));
        let n1 = n1.min(n2);
        let value = interpolate_sample(src, n1, n2, x1, x2);
        out.push(match threshold {
            Some(t) => if value >= t { 0xFF } else { 0x00 },
            None => value,
        });
    }
    out
}

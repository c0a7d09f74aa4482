//! Typed option surface and derived scan parameters (spec §3 OptionValues /
//! DerivedParams, §4.F OptionModel).

use bitflags::bitflags;

use crate::device::Device;
use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Lineart,
    Halftone,
    Gray,
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Flatbed,
    Adf,
    Tpa,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaperSize {
    A4,
    A5,
    A6,
    B6,
    Letter,
    Legal,
    UserDefined,
}

impl PaperSize {
    /// A5/A6/B6 force LANDSCAPE on selection (§4.F cross-option effects).
    pub fn forces_landscape(self) -> bool {
        matches!(self, PaperSize::A5 | PaperSize::A6 | PaperSize::B6)
    }

    /// Geometry in mm for the fixed sizes; `None` for `UserDefined` (the
    /// bbox fields carry the geometry instead).
    pub fn dimensions_mm(self) -> Option<(f64, f64)> {
        match self {
            PaperSize::A4 => Some((210.0, 297.0)),
            PaperSize::A5 => Some((148.0, 210.0)),
            PaperSize::A6 => Some((105.0, 148.0)),
            PaperSize::B6 => Some((125.0, 176.0)),
            PaperSize::Letter => Some((215.9, 279.4)),
            PaperSize::Legal => Some((215.9, 355.6)),
            PaperSize::UserDefined => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManualFeedMode {
    Off,
    WaitDoc,
}

/// Geometry in millimeters (spec §3: `tl_x, tl_y, br_x, br_y`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub tl_x: f64,
    pub tl_y: f64,
    pub br_x: f64,
    pub br_y: f64,
}

pub const MIN_WIDTH_MM: f64 = 1.0;
pub const MIN_HEIGHT_MM: f64 = 1.0;

/// Per-channel or single gray gamma LUT (spec §3 "gamma-vector").
#[derive(Debug, Clone, PartialEq)]
pub enum GammaVector {
    Gray(Vec<u8>),
    PerChannel([Vec<u8>; 3]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LampDropout {
    None,
    Red,
    Green,
    Blue,
}

bitflags! {
    /// Which options are currently SOFT_SELECT-able (§4.F cap flags,
    /// `INACTIVE` tracked as absence here rather than presence).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ActiveOptions: u32 {
        const THRESHOLD     = 1 << 0;
        const GAMMA         = 1 << 1;
        const BRIGHTNESS    = 1 << 2;
        const TL_BR         = 1 << 3;
        const LANDSCAPE     = 1 << 4;
        const FEED_TIMEOUT  = 1 << 5;
    }
}

bitflags! {
    /// Info flags returned from `control_option`/derived by `set_value`
    /// (spec §4.F, §4.G, §6.1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InfoFlags: u32 {
        const RELOAD_OPTIONS = 1 << 0;
        const RELOAD_PARAMS  = 1 << 1;
        const INEXACT        = 1 << 2;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionValues {
    pub mode: Mode,
    pub resolution_x: f64,
    pub resolution_y: f64,
    pub source: Source,
    pub duplex: bool,
    pub paper_size: PaperSize,
    pub bbox: BBox,
    pub brightness: i8,
    pub contrast: i8,
    pub threshold: u8,
    pub gamma: GammaVector,
    pub double_feed_detection: bool,
    pub manual_feed: ManualFeedMode,
    pub feed_timeout_secs: u32,
    pub image_emphasis: i8,
    pub lamp_dropout: LampDropout,
    pub active: ActiveOptions,
}

impl OptionValues {
    /// Defaults matching a generic flatbed device at its base resolution.
    pub fn defaults_for(device: &Device) -> Self {
        OptionValues {
            mode: Mode::Gray,
            resolution_x: device.optical_dpi_x as f64,
            resolution_y: device.optical_dpi_y as f64,
            source: Source::Flatbed,
            duplex: false,
            paper_size: PaperSize::Letter,
            bbox: BBox { tl_x: 0.0, tl_y: 0.0, br_x: 215.9, br_y: 279.4 },
            brightness: 0,
            contrast: 0,
            threshold: 128,
            gamma: GammaVector::Gray((0..=255).collect()),
            double_feed_detection: false,
            manual_feed: ManualFeedMode::Off,
            feed_timeout_secs: 30,
            image_emphasis: 0,
            lamp_dropout: LampDropout::None,
            active: ActiveOptions::GAMMA | ActiveOptions::BRIGHTNESS | ActiveOptions::TL_BR,
        }
    }

    /// Apply cross-option effects for a mode change (§4.F):
    /// LINEART activates THRESHOLD and deactivates GAMMA/BRIGHTNESS;
    /// any other mode does the reverse. A no-op `SET` (the requested mode
    /// already holds) reports no reload (Testable Property 1).
    pub fn set_mode(&mut self, mode: Mode) -> InfoFlags {
        if self.mode == mode {
            return InfoFlags::empty();
        }
        self.mode = mode;
        if mode == Mode::Lineart {
            self.active.insert(ActiveOptions::THRESHOLD);
            self.active.remove(ActiveOptions::GAMMA | ActiveOptions::BRIGHTNESS);
        } else {
            self.active.remove(ActiveOptions::THRESHOLD);
            self.active.insert(ActiveOptions::GAMMA | ActiveOptions::BRIGHTNESS);
        }
        InfoFlags::RELOAD_OPTIONS | InfoFlags::RELOAD_PARAMS
    }

    /// Apply cross-option effects for a paper-size change (§4.F): a fixed
    /// size deactivates TL/BR (geometry is derived from the size), and
    /// activates LANDSCAPE for A5/A6/B6; `UserDefined` reverses both. A
    /// no-op `SET` reports no reload (Testable Property 1).
    pub fn set_paper_size(&mut self, size: PaperSize) -> InfoFlags {
        if self.paper_size == size {
            return InfoFlags::empty();
        }
        self.paper_size = size;
        if let Some((w, h)) = size.dimensions_mm() {
            self.active.remove(ActiveOptions::TL_BR);
            self.bbox = BBox { tl_x: 0.0, tl_y: 0.0, br_x: w, br_y: h };
        } else {
            self.active.insert(ActiveOptions::TL_BR);
        }
        if size.forces_landscape() {
            self.active.insert(ActiveOptions::LANDSCAPE);
        } else {
            self.active.remove(ActiveOptions::LANDSCAPE);
        }
        InfoFlags::RELOAD_OPTIONS | InfoFlags::RELOAD_PARAMS
    }

    /// MANUAL_FEED = off deactivates FEED_TIMEOUT (§4.F). A no-op `SET`
    /// reports no reload (Testable Property 1).
    pub fn set_manual_feed(&mut self, mode: ManualFeedMode) -> InfoFlags {
        if self.manual_feed == mode {
            return InfoFlags::empty();
        }
        self.manual_feed = mode;
        if mode == ManualFeedMode::Off {
            self.active.remove(ActiveOptions::FEED_TIMEOUT);
        } else {
            self.active.insert(ActiveOptions::FEED_TIMEOUT);
        }
        InfoFlags::RELOAD_OPTIONS
    }

    /// Set the top-left corner, clamping to `br - MIN_EXTENT` and reporting
    /// `INEXACT` on clamp (§4.F). `RELOAD_PARAMS` is only reported when the
    /// clamped result actually differs from the current corner — repeating
    /// the same `SET` (even one that clamps) must report no reload
    /// (Testable Property 1).
    pub fn set_tl(&mut self, x: f64, y: f64) -> InfoFlags {
        let mut flags = InfoFlags::empty();
        let max_x = self.bbox.br_x - MIN_WIDTH_MM;
        let max_y = self.bbox.br_y - MIN_HEIGHT_MM;
        let clamped_x = x.min(max_x).max(0.0);
        let clamped_y = y.min(max_y).max(0.0);
        if clamped_x != x || clamped_y != y {
            flags |= InfoFlags::INEXACT;
        }
        if clamped_x != self.bbox.tl_x || clamped_y != self.bbox.tl_y {
            self.bbox.tl_x = clamped_x;
            self.bbox.tl_y = clamped_y;
            flags |= InfoFlags::RELOAD_PARAMS;
        }
        flags
    }

    /// Validate the geometry/enum invariants from spec §3.
    pub fn validate(&self, device: &Device) -> Result<(), BackendError> {
        if self.bbox.tl_x + MIN_WIDTH_MM > self.bbox.br_x {
            return Err(BackendError::Inval);
        }
        if self.bbox.tl_y + MIN_HEIGHT_MM > self.bbox.br_y {
            return Err(BackendError::Inval);
        }
        if self.resolution_x < device.min_dpi as f64 || self.resolution_x > device.optical_dpi_x as f64 * 4.0
        {
            return Err(BackendError::Inval);
        }
        if self.resolution_y < device.min_dpi as f64 || self.resolution_y > device.optical_dpi_y as f64 * 4.0
        {
            return Err(BackendError::Inval);
        }
        if !device.modes.contains(&self.mode) {
            return Err(BackendError::Inval);
        }
        if !device.sources.contains(&self.source) {
            return Err(BackendError::Inval);
        }
        Ok(())
    }

    /// Check a resolution lies on the device's allowed step grid: 1% or 5%
    /// of the device's base optical resolution (spec §3).
    pub fn resolution_on_step(base_dpi: u32, requested: f64, step_pct: f64) -> bool {
        let step = base_dpi as f64 * step_pct;
        if step <= 0.0 {
            return true;
        }
        let ratio = requested / step;
        (ratio - ratio.round()).abs() < 1e-6
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Gray,
    Rgb,
    Red,
    Green,
    Blue,
}

/// Scan parameters computed from `OptionValues` + device capabilities
/// (spec §3 DerivedParams). Which color pass (if any) is being frozen for
/// a 3-pass device is threaded through explicitly rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedParams {
    pub pixels_per_line: u32,
    pub bytes_per_line: u32,
    pub lines: u32,
    pub depth: u8,
    pub frame_format: FrameFormat,
    pub last_frame: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorPass {
    Red,
    Green,
    Blue,
}

impl DerivedParams {
    /// Pure function of `OptionValues` and device caps (Testable Property 2).
    ///
    /// `pass` selects which frame a 3-pass color device is currently
    /// producing; ignored for single-pass devices and non-color modes.
    pub fn compute(options: &OptionValues, device: &Device, pass: Option<ColorPass>) -> Self {
        let mm_to_px = |mm: f64, dpi: f64| -> u32 { (mm / 25.4 * dpi).max(0.0) as u32 };

        let width_mm = options.bbox.br_x - options.bbox.tl_x;
        let height_mm = options.bbox.br_y - options.bbox.tl_y;

        let pixels_per_line = mm_to_px(width_mm, options.resolution_x);
        let lines = mm_to_px(height_mm, options.resolution_y);

        let (depth, frame_format, last_frame) = match options.mode {
            Mode::Lineart | Mode::Halftone => (1u8, FrameFormat::Gray, true),
            Mode::Gray => (8u8, FrameFormat::Gray, true),
            Mode::Color => {
                if device.single_pass_color {
                    (8u8, FrameFormat::Rgb, true)
                } else {
                    match pass.unwrap_or(ColorPass::Red) {
                        ColorPass::Red => (8u8, FrameFormat::Red, false),
                        ColorPass::Green => (8u8, FrameFormat::Green, false),
                        ColorPass::Blue => (8u8, FrameFormat::Blue, true),
                    }
                }
            }
        };

        let channels = match frame_format {
            FrameFormat::Rgb => 3,
            _ => 1,
        };
        let bits_per_line = pixels_per_line as u64 * depth as u64 * channels;
        let bytes_per_line = bits_per_line.div_ceil(8) as u32;

        DerivedParams { pixels_per_line, bytes_per_line, lines, depth, frame_format, last_frame }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_support::generic_flatbed;

    #[test]
    fn letter_gray_100dpi_matches_scenario_1() {
        let device = generic_flatbed();
        let mut options = OptionValues::defaults_for(&device);
        options.mode = Mode::Gray;
        options.resolution_x = 100.0;
        options.resolution_y = 100.0;
        options.bbox = BBox { tl_x: 0.0, tl_y: 0.0, br_x: 215.9, br_y: 279.4 };

        let params = DerivedParams::compute(&options, &device, None);
        assert_eq!(params.pixels_per_line, 850);
        assert_eq!(params.lines, 1100);
        assert_eq!(params.bytes_per_line, 850);
        assert_eq!(params.frame_format, FrameFormat::Gray);
        assert_eq!(params.depth, 8);
        assert!(params.last_frame);
    }

    #[test]
    fn a4_color_300dpi_matches_scenario_2() {
        let device = generic_flatbed();
        let mut options = OptionValues::defaults_for(&device);
        options.mode = Mode::Color;
        options.resolution_x = 300.0;
        options.resolution_y = 300.0;
        options.set_paper_size(PaperSize::A4);

        let params = DerivedParams::compute(&options, &device, None);
        assert_eq!(params.pixels_per_line, 2480);
        assert_eq!(params.lines, 3507);
        assert_eq!(params.bytes_per_line, 7440);
        assert_eq!(params.frame_format, FrameFormat::Rgb);
    }

    #[test]
    fn lineart_activates_threshold_deactivates_gamma_and_brightness() {
        let device = generic_flatbed();
        let mut options = OptionValues::defaults_for(&device);
        options.set_mode(Mode::Lineart);
        assert!(options.active.contains(ActiveOptions::THRESHOLD));
        assert!(!options.active.contains(ActiveOptions::GAMMA));
        assert!(!options.active.contains(ActiveOptions::BRIGHTNESS));

        options.set_mode(Mode::Gray);
        assert!(!options.active.contains(ActiveOptions::THRESHOLD));
        assert!(options.active.contains(ActiveOptions::GAMMA));
        assert!(options.active.contains(ActiveOptions::BRIGHTNESS));
    }

    #[test]
    fn small_paper_size_forces_landscape_and_deactivates_tl_br() {
        let device = generic_flatbed();
        let mut options = OptionValues::defaults_for(&device);
        options.set_paper_size(PaperSize::A5);
        assert!(options.active.contains(ActiveOptions::LANDSCAPE));
        assert!(!options.active.contains(ActiveOptions::TL_BR));

        options.set_paper_size(PaperSize::UserDefined);
        assert!(!options.active.contains(ActiveOptions::LANDSCAPE));
        assert!(options.active.contains(ActiveOptions::TL_BR));
    }

    #[test]
    fn manual_feed_off_deactivates_feed_timeout() {
        let device = generic_flatbed();
        let mut options = OptionValues::defaults_for(&device);
        options.set_manual_feed(ManualFeedMode::WaitDoc);
        assert!(options.active.contains(ActiveOptions::FEED_TIMEOUT));
        options.set_manual_feed(ManualFeedMode::Off);
        assert!(!options.active.contains(ActiveOptions::FEED_TIMEOUT));
    }

    #[test]
    fn tl_clamps_to_br_minus_min_extent_and_reports_inexact() {
        let device = generic_flatbed();
        let mut options = OptionValues::defaults_for(&device);
        options.bbox = BBox { tl_x: 0.0, tl_y: 0.0, br_x: 10.0, br_y: 10.0 };
        let flags = options.set_tl(9.9, 0.0);
        assert!(flags.contains(InfoFlags::INEXACT));
        assert_eq!(options.bbox.tl_x, 9.0);
    }

    /// Property 1: setting the same value twice is idempotent and the
    /// second call reports no reload.
    #[test]
    fn repeated_tl_set_is_idempotent() {
        let device = generic_flatbed();
        let mut options = OptionValues::defaults_for(&device);
        options.bbox = BBox { tl_x: 0.0, tl_y: 0.0, br_x: 100.0, br_y: 100.0 };
        let first = options.set_tl(5.0, 5.0);
        assert_eq!(first, InfoFlags::RELOAD_PARAMS);
        let before = options.clone();
        let second = options.set_tl(5.0, 5.0);
        assert_eq!(options, before);
        assert_eq!(second, InfoFlags::empty(), "repeating an already-current SET must report no reload");
    }

    /// Testable Property 1, exercised across `set_mode`/`set_paper_size`/
    /// `set_manual_feed` too, not just `set_tl`.
    #[test]
    fn repeated_sets_report_no_reload_once_current() {
        let device = generic_flatbed();
        let mut options = OptionValues::defaults_for(&device);

        options.set_mode(Mode::Lineart);
        assert_eq!(options.set_mode(Mode::Lineart), InfoFlags::empty());

        options.set_paper_size(PaperSize::A4);
        assert_eq!(options.set_paper_size(PaperSize::A4), InfoFlags::empty());

        options.set_manual_feed(ManualFeedMode::WaitDoc);
        assert_eq!(options.set_manual_feed(ManualFeedMode::WaitDoc), InfoFlags::empty());
    }

    #[test]
    fn resolution_step_check() {
        assert!(OptionValues::resolution_on_step(600, 600.0, 0.05));
        assert!(OptionValues::resolution_on_step(600, 300.0, 0.05));
        assert!(!OptionValues::resolution_on_step(600, 301.0, 0.05));
    }
}

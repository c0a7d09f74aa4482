//! Static per-model timing tables: CCD/DAC register sequences, step and
//! exposure tables, home offsets, paper sizes (spec §3 component D),
//! grounded on the original source's per-model tables in
//! `plustek-pp_p9636.c`/`plustek-pp_p12ccd.c`.

/// One CCD/DAC register to program before a scan (address, value pair;
/// the original source's per-phase `Q1/Q2/ADC/DV/clamp/VSMP` registers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcdRegister {
    pub register: u8,
    pub value: u8,
}

/// A (motor speed index, ticks-per-step) pair from the step/exposure
/// table (spec §4.D "Speed index ∈ {1..34} for P96 family").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEntry {
    pub speed_index: u8,
    pub ticks_per_step: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingTables {
    pub ccd_program: &'static [CcdRegister],
    pub step_table: &'static [StepEntry],
    pub home_offset_steps: u32,
    /// Backward steps performed before the home-sensor read settles, and
    /// forward steps used for the "unstick" retry (original source's
    /// `_P96_BACKMOVES` / `_P96_FORWARDMOVES`).
    pub home_backward_steps: u32,
    pub home_forward_unstick_steps: u32,
    pub warmup_secs: u32,
}

pub static P96_TIMING: TimingTables = TimingTables {
    ccd_program: &[
        CcdRegister { register: 0x20, value: 0x08 },
        CcdRegister { register: 0x21, value: 0x10 },
        CcdRegister { register: 0x22, value: 0x04 },
    ],
    step_table: &[
        StepEntry { speed_index: 1, ticks_per_step: 34 },
        StepEntry { speed_index: 17, ticks_per_step: 17 },
        StepEntry { speed_index: 34, ticks_per_step: 1 },
    ],
    home_offset_steps: 60,
    home_backward_steps: 130,
    home_forward_unstick_steps: 40,
    warmup_secs: 25,
};

pub static P98_TIMING: TimingTables = TimingTables {
    ccd_program: &[
        CcdRegister { register: 0x20, value: 0x0c },
        CcdRegister { register: 0x21, value: 0x18 },
    ],
    step_table: &[
        StepEntry { speed_index: 1, ticks_per_step: 40 },
        StepEntry { speed_index: 20, ticks_per_step: 2 },
    ],
    home_offset_steps: 70,
    home_backward_steps: 0x3d,
    home_forward_unstick_steps: 40,
    warmup_secs: 20,
};

/// Duplex sheetfed family has no home-sensor motor program; a single
/// degenerate table stands in for timing parameters consumed uniformly by
/// `MotorPlanner` (paper is transported by feed rollers, not a carriage).
pub static DUPLEX_ADF_TIMING: TimingTables = TimingTables {
    ccd_program: &[],
    step_table: &[StepEntry { speed_index: 1, ticks_per_step: 1 }],
    home_offset_steps: 0,
    home_backward_steps: 0,
    home_forward_unstick_steps: 0,
    warmup_secs: 5,
};

impl TimingTables {
    /// Closest table entry for the given speed index, per the original
    /// source's nearest-match lookup in the step table.
    pub fn ticks_for_speed(&self, speed_index: u8) -> u8 {
        self.step_table
            .iter()
            .min_by_key(|e| (e.speed_index as i16 - speed_index as i16).abs())
            .map(|e| e.ticks_per_step)
            .unwrap_or(1)
    }
}

//! Command encoding for the two transport families (spec §4.B).

pub mod register;
pub mod scsi;

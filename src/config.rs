//! Persisted process-wide configuration (spec §6.5): a flat line-oriented
//! config file enumerating device ports/USB IDs, plus `noprecal`/
//! `norealcal` flags. Parsed by hand since the grammar is a simple custom
//! text format, not a structured serialization the teacher's `serde`
//! stack fits; calibration artifacts (§3 CalibrationArtifacts) are a
//! separate binary cache and use `serde`/`postcard` since those are
//! genuinely structured data.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationArtifacts;
use crate::error::BackendError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub device_ports: Vec<String>,
    pub noprecal: bool,
    pub norealcal: bool,
}

impl Config {
    /// Parse the line-oriented config grammar (spec §6.5): one device
    /// port or USB id per line, `#` starts a comment, blank lines
    /// ignored, and the two bare keywords toggle process-wide flags.
    pub fn parse(text: &str) -> Config {
        let mut config = Config::default();
        for raw_line in text.lines() {
            let line = match raw_line.find('#') {
                Some(idx) => &raw_line[..idx],
                None => raw_line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line {
                "noprecal" => config.noprecal = true,
                "norealcal" => config.norealcal = true,
                port => config.device_ports.push(port.to_string()),
            }
        }
        config
    }

    pub fn load(path: &Path) -> Result<Config, BackendError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Config::parse(&text))
    }
}

/// On-disk representation of a device's calibration cache (spec §4.C
/// "clever precalibration"), keyed by device id and serialized with
/// `postcard` for a compact binary cache file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationCacheEntry {
    pub device_id: u32,
    pub mode: u8,
    pub dark_offset: [u8; 3],
    pub gain: [u8; 3],
    pub shading_red: Vec<u16>,
    pub shading_green: Vec<u16>,
    pub shading_blue: Vec<u16>,
}

impl CalibrationCacheEntry {
    pub fn from_artifacts(device_id: u32, mode: crate::options::Mode, artifacts: &CalibrationArtifacts) -> Self {
        CalibrationCacheEntry {
            device_id,
            mode: mode as u8,
            dark_offset: artifacts.dark_offset,
            gain: artifacts.gain,
            shading_red: artifacts.shading[0].clone(),
            shading_green: artifacts.shading[1].clone(),
            shading_blue: artifacts.shading[2].clone(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, BackendError> {
        postcard::to_allocvec(self).map_err(|_| BackendError::IoError)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BackendError> {
        postcard::from_bytes(bytes).map_err(|_| BackendError::IoError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_handles_comments_blanks_and_flags() {
        let text = "# a comment\n/dev/usb/scanner0\n\nnoprecal\nparport0  # trailing comment\nnorealcal\n";
        let config = Config::parse(text);
        assert_eq!(config.device_ports, vec!["/dev/usb/scanner0", "parport0"]);
        assert!(config.noprecal);
        assert!(config.norealcal);
    }

    #[test]
    fn calibration_cache_entry_round_trips_through_postcard() {
        let entry = CalibrationCacheEntry {
            device_id: 7,
            mode: 3,
            dark_offset: [1, 2, 3],
            gain: [10, 11, 12],
            shading_red: vec![100, 200],
            shading_green: vec![101, 201],
            shading_blue: vec![102, 202],
        };
        let bytes = entry.to_bytes().unwrap();
        let decoded = CalibrationCacheEntry::from_bytes(&bytes).unwrap();
        assert_eq!(entry, decoded);
    }
}

//! Machine setup for a run.
//!
//! A [`RunConfig`] describes everything the emulator needs before the
//! first step: the memory image and where it goes, the stack, preset
//! registers, the trap table and the entry protocol. It can be read from
//! JSON, with every field optional:
//!
//! ```json
//! {
//!   "origin": 0,
//!   "image": [28673, 0, 33024],
//!   "registers": { "1": 51895 },
//!   "traps": { "1": 256 },
//!   "max_steps": 100000
//! }
//! ```
//!
//! Execution starts as if the sentinel address had CALLed `entry`, so the
//! program finishes when it returns to the sentinel.

use crate::cpu::{Cpu, TrapTable};
use crate::cpu::registers::GR_COUNT;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Default number of steps before a run is abandoned.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

/// Everything needed to set up and drive one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Address of the first image word.
    pub origin: u16,
    /// Raw memory image.
    pub image: Vec<u16>,
    /// Address entered through the initial call.
    pub entry: u16,
    /// Initial stack pointer.
    pub sp: u16,
    /// Return address pushed by the initial call; reaching it ends the run.
    pub sentinel: u16,
    /// Preset general registers, by index.
    pub registers: BTreeMap<usize, u16>,
    /// SVC vectors.
    pub traps: TrapTable,
    /// Step budget.
    pub max_steps: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            origin: 0,
            image: Vec::new(),
            entry: 0,
            sp: 0xffff,
            sentinel: 0xffff,
            registers: BTreeMap::new(),
            traps: TrapTable::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl RunConfig {
    /// Load a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.registers.keys().find(|&&i| i >= GR_COUNT) {
            Some(&i) => Err(ConfigError::InvalidRegister(i)),
            None => Ok(()),
        }
    }

    /// Build a CPU ready to step: image loaded, registers preset and the
    /// entry point called from the sentinel address.
    pub fn build(&self) -> Result<Cpu, ConfigError> {
        self.validate()?;

        let mut cpu = Cpu::new();
        cpu.load_image(self.origin, &self.image);
        cpu.traps = self.traps.clone();
        cpu.set_sp(self.sp);
        cpu.set_pc(self.sentinel);
        for (&i, &value) in &self.registers {
            cpu.set_register(i, value);
        }
        cpu.call_into(self.entry);

        tracing::debug!(
            origin = self.origin,
            words = self.image.len(),
            traps = self.traps.len(),
            "machine configured, entering {:04x}",
            self.entry
        );
        Ok(cpu)
    }
}

/// Errors that can occur while loading a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no such register: GR{0}")]
    InvalidRegister(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::from_json("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.sp, 0xffff);
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn test_parse_full() {
        let config = RunConfig::from_json(
            r#"{
                "origin": 16,
                "image": [33024],
                "entry": 16,
                "sp": 4096,
                "sentinel": 0,
                "registers": { "3": 7 },
                "traps": { "2": 512 },
                "max_steps": 10
            }"#,
        )
        .unwrap();

        assert_eq!(config.origin, 16);
        assert_eq!(config.image, vec![0x8100]);
        assert_eq!(config.registers.get(&3), Some(&7));
        assert_eq!(config.traps.get(2), Some(512));
        assert_eq!(config.max_steps, 10);
    }

    #[test]
    fn test_rejects_bad_register() {
        let err = RunConfig::from_json(r#"{ "registers": { "8": 1 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegister(8)));

        let err = RunConfig::from_json(r#"{ "sp": "top" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_build_enters_program() {
        let config = RunConfig {
            origin: 0x0100,
            image: vec![0x8100],
            entry: 0x0100,
            registers: [(2, 0x1234)].into_iter().collect(),
            traps: [(1, 0x0200)].into_iter().collect(),
            ..RunConfig::default()
        };

        let cpu = config.build().unwrap();
        assert_eq!(cpu.pc(), 0x0100);
        assert_eq!(cpu.sp(), 0xfffe);
        assert_eq!(cpu.read(0xfffe), 0xffff);
        assert_eq!(cpu.read(0x0100), 0x8100);
        assert_eq!(cpu.register(2), 0x1234);
        assert_eq!(cpu.traps.get(1), Some(0x0200));
    }
}

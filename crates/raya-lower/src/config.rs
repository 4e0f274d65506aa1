//! Lowering configuration (lowering.toml)
//!
//! Target parameters that change the emitted machine code: how wide a small
//! integer is, which byte order multi-unit stores use, and the generation
//! fresh objects are allocated in.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::ir::AllocationType;

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Payload width of an inline small integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SmiWidth {
    /// 31-bit payload, tagged word is the sign-extended `i32 << 1`
    #[default]
    Bits31,
    /// 32-bit payload in the upper half of the word
    Bits32,
}

impl SmiWidth {
    /// Number of bits the payload is shifted by
    pub fn shift(self) -> u32 {
        match self {
            SmiWidth::Bits31 => 1,
            SmiWidth::Bits32 => 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endianness {
    Little,
    Big,
}

impl Default for Endianness {
    fn default() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

/// Configuration for one lowering run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoweringConfig {
    /// Small integer width (default: 31 bits)
    pub smi_width: SmiWidth,
    /// Byte order of the target (default: host)
    pub endianness: Endianness,
    /// Generation for allocations that carry no explicit hint (default: young)
    pub allocation: AllocationType,
    /// Step budget of the reference evaluator (default: 1_000_000)
    pub eval_fuel: u64,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        LoweringConfig {
            smi_width: SmiWidth::default(),
            endianness: Endianness::default(),
            allocation: AllocationType::default(),
            eval_fuel: 1_000_000,
        }
    }
}

impl LoweringConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LoweringConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.eval_fuel == 0 {
            return Err(ConfigError::ValidationError(
                "eval-fuel must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether tagging an i32 can overflow the small integer range
    pub fn smi_is_31_bit(&self) -> bool {
        self.smi_width == SmiWidth::Bits31
    }

    pub fn smi_max(&self) -> i64 {
        match self.smi_width {
            SmiWidth::Bits31 => (1 << 30) - 1,
            SmiWidth::Bits32 => i32::MAX as i64,
        }
    }

    pub fn smi_min(&self) -> i64 {
        match self.smi_width {
            SmiWidth::Bits31 => -(1 << 30),
            SmiWidth::Bits32 => i32::MIN as i64,
        }
    }

    pub fn is_little_endian(&self) -> bool {
        self.endianness == Endianness::Little
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoweringConfig::default();
        assert_eq!(config.smi_width, SmiWidth::Bits31);
        assert_eq!(config.allocation, AllocationType::Young);
        assert_eq!(config.smi_max(), 0x3FFF_FFFF);
        assert_eq!(config.smi_min(), -0x4000_0000);
    }

    #[test]
    fn test_parse_toml() {
        let config = LoweringConfig::from_toml_str(
            r#"
smi-width = "bits32"
endianness = "big"
allocation = "old"
eval-fuel = 500
"#,
        )
        .unwrap();
        assert_eq!(config.smi_width, SmiWidth::Bits32);
        assert_eq!(config.endianness, Endianness::Big);
        assert_eq!(config.allocation, AllocationType::Old);
        assert_eq!(config.eval_fuel, 500);
        assert_eq!(config.smi_max(), i32::MAX as i64);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = LoweringConfig::from_toml_str("smi-width = \"bits31\"\n").unwrap();
        assert_eq!(config.eval_fuel, LoweringConfig::default().eval_fuel);
    }

    #[test]
    fn test_zero_fuel_rejected() {
        let err = LoweringConfig::from_toml_str("eval-fuel = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_unknown_width_rejected() {
        let err = LoweringConfig::from_toml_str("smi-width = \"bits16\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}

use std::fmt;
use std::str::FromStr;

/// A SPIR-V module version (`major.minor`).
///
/// Ordering follows the version number, so `V1_3 > V1_0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleVersion {
    pub major: u8,
    pub minor: u8,
}

impl ModuleVersion {
    pub const V1_0: Self = Self::new(1, 0);
    pub const V1_1: Self = Self::new(1, 1);
    pub const V1_2: Self = Self::new(1, 2);
    pub const V1_3: Self = Self::new(1, 3);
    pub const V1_4: Self = Self::new(1, 4);
    pub const V1_5: Self = Self::new(1, 5);
    pub const V1_6: Self = Self::new(1, 6);

    /// Oldest version the assembler emits.
    pub const MIN_SUPPORTED: Self = Self::V1_0;
    /// Newest version the assembler emits.
    pub const MAX_SUPPORTED: Self = Self::V1_6;

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    pub fn is_supported(self) -> bool {
        self >= Self::MIN_SUPPORTED && self <= Self::MAX_SUPPORTED
    }

    /// Header word: `0 | major | minor | 0`, one byte each, high to low.
    pub fn word(self) -> u32 {
        (u32::from(self.major) << 16) | (u32::from(self.minor) << 8)
    }

    pub fn from_word(word: u32) -> Self {
        Self::new(((word >> 16) & 0xff) as u8, ((word >> 8) & 0xff) as u8)
    }
}

impl Default for ModuleVersion {
    fn default() -> Self {
        Self::V1_0
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid SPIR-V version {0:?} (expected `<major>.<minor>`, e.g. `1.3`)")]
pub struct ParseVersionError(pub String);

impl FromStr for ModuleVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_prefix("spv")
            .or_else(|| trimmed.strip_prefix("SPV"))
            .unwrap_or(trimmed);
        let (major, minor) = trimmed
            .split_once('.')
            .ok_or_else(|| ParseVersionError(s.to_string()))?;
        let major = major
            .parse::<u8>()
            .map_err(|_| ParseVersionError(s.to_string()))?;
        let minor = minor
            .parse::<u8>()
            .map_err(|_| ParseVersionError(s.to_string()))?;
        Ok(Self::new(major, minor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_word_round_trips() {
        assert_eq!(ModuleVersion::V1_3.word(), 0x0001_0300);
        assert_eq!(ModuleVersion::from_word(0x0001_0500), ModuleVersion::V1_5);
    }

    #[test]
    fn parses_plain_and_prefixed_versions() {
        assert_eq!("1.4".parse::<ModuleVersion>(), Ok(ModuleVersion::V1_4));
        assert_eq!(" spv1.2 ".parse::<ModuleVersion>(), Ok(ModuleVersion::V1_2));
        assert!("14".parse::<ModuleVersion>().is_err());
        assert!("1.x".parse::<ModuleVersion>().is_err());
    }

    #[test]
    fn supported_range_is_1_0_through_1_6() {
        assert!(ModuleVersion::V1_0.is_supported());
        assert!(ModuleVersion::V1_6.is_supported());
        assert!(!ModuleVersion::new(1, 7).is_supported());
        assert!(!ModuleVersion::new(2, 0).is_supported());
    }
}

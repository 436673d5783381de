//! Migration versions and the per-table version record.

use std::fmt;
use std::str::FromStr;

use rowshift_core::{ConfigError, Record};
use serde::{Deserialize, Serialize};

/// A migration version, ordered by major then minor.
///
/// Serialized as `"MAJOR.MINOR"`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
}

impl Version {
    /// The version of a table no migrator has touched.
    pub const ZERO: Self = Self::new(0, 0);

    /// Creates a version.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = ConfigError;

    /// Parses `MAJOR.MINOR` or a bare `MAJOR`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidVersion(s.to_string());
        let (major, minor) = match s.trim().split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (s.trim(), "0"),
        };
        let major = major.parse::<u32>().map_err(|_| invalid())?;
        let minor = minor.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self::new(major, minor))
    }
}

impl TryFrom<String> for Version {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

impl From<(u32, u32)> for Version {
    fn from((major, minor): (u32, u32)) -> Self {
        Self::new(major, minor)
    }
}

/// The highest migration version applied to one table.
///
/// `table_name` is the natural key: there is at most one record per table.
/// `id` is a surrogate the store assigns when it is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Record, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Surrogate identifier.
    #[record(id)]
    pub id: String,
    /// The tracked table.
    pub table_name: String,
    /// Highest applied version.
    pub version: Version,
}

impl VersionRecord {
    /// Creates an unsaved record at version zero.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            table_name: table_name.into(),
            version: Version::ZERO,
        }
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowshift_core::DescriptorProvider;

    #[test]
    fn test_version_ordering() {
        let mut versions = vec![
            Version::new(0, 3),
            Version::new(1, 0),
            Version::new(0, 1),
            Version::new(0, 10),
        ];
        versions.sort();
        assert_eq!(
            versions,
            vec![
                Version::new(0, 1),
                Version::new(0, 3),
                Version::new(0, 10),
                Version::new(1, 0),
            ]
        );
        assert!(Version::ZERO < Version::new(0, 1));
    }

    #[test]
    fn test_version_parse_and_display() {
        assert_eq!("1.2".parse::<Version>().unwrap(), Version::new(1, 2));
        assert_eq!("3".parse::<Version>().unwrap(), Version::new(3, 0));
        assert_eq!(Version::new(0, 7).to_string(), "0.7");
        assert!("1.x".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
    }

    #[test]
    fn test_version_serde_as_string() {
        let json = serde_json::to_string(&Version::new(2, 5)).unwrap();
        assert_eq!(json, "\"2.5\"");
        let parsed: Version = serde_json::from_str("\"0.3\"").unwrap();
        assert_eq!(parsed, Version::new(0, 3));
        assert!(serde_json::from_str::<Version>("\"bad\"").is_err());
    }

    #[test]
    fn test_version_record_descriptor() {
        let provider = DescriptorProvider::new();
        let descriptor = provider.descriptor::<VersionRecord>().unwrap();
        assert_eq!(descriptor.id_field_name(), "id");
        assert!(descriptor.is_id_auto_generated());

        let mut record = VersionRecord::new("users").with_version(Version::new(0, 2));
        descriptor.set_id(&mut record, "v-1").unwrap();
        assert_eq!(record.id, "v-1");
        assert_eq!(descriptor.get_id(&record).unwrap(), "v-1");
    }
}

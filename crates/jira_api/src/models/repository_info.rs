//! API version of a repository, used to gate protocol features.

use std::fmt;

use serde::{Deserialize, Serialize};

/// API version reported by a repository. A `-1` component means unknown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub api_epoch: i32,
    pub api_major: i32,
    pub api_minor: i32,
    pub version: Option<String>,
}

impl Default for RepositoryInfo {
    fn default() -> Self {
        Self::new(-1, -1, -1)
    }
}

impl RepositoryInfo {
    pub fn new(api_epoch: i32, api_major: i32, api_minor: i32) -> Self {
        Self {
            api_epoch,
            api_major,
            api_minor,
            version: None,
        }
    }

    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::default()
        }
    }

    fn tuple(&self) -> (i32, i32, i32) {
        (self.api_epoch, self.api_major, self.api_minor)
    }

    pub fn is_api_version(&self, epoch: i32, major: i32, minor: i32) -> bool {
        self.tuple() == (epoch, major, minor)
    }

    pub fn is_api_version_or_higher(&self, epoch: i32, major: i32, minor: i32) -> bool {
        self.tuple() >= (epoch, major, minor)
    }

    pub fn is_api_version_or_smaller(&self, epoch: i32, major: i32, minor: i32) -> bool {
        self.tuple() <= (epoch, major, minor)
    }

    /// True until a version has been negotiated with the server.
    pub fn is_stale(&self) -> bool {
        self.api_epoch == -1 || self.api_major == -1 || self.api_minor == -1
    }
}

impl fmt::Display for RepositoryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.api_epoch, self.api_major, self.api_minor)?;
        if let Some(version) = &self.version {
            write!(f, " ({version})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::RepositoryInfo;

    #[test]
    fn exact_version_match() {
        let info = RepositoryInfo::new(1, 1, 1);
        assert!(info.is_api_version(1, 1, 1));
        assert!(!info.is_api_version(1, 1, 0));
        assert!(!info.is_api_version(1, 0, 1));
        assert!(!info.is_api_version(0, 1, 1));
        assert!(!info.is_api_version(-1, -1, -1));
    }

    #[test]
    fn version_or_higher() {
        let info = RepositoryInfo::new(1, 2, 3);
        assert!(info.is_api_version_or_higher(1, 2, 3));
        assert!(info.is_api_version_or_higher(0, 9, 9));
        assert!(info.is_api_version_or_higher(0, 1, 3));
        assert!(info.is_api_version_or_higher(1, 2, -3));
        assert!(!info.is_api_version_or_higher(1, 2, 4));
        assert!(!info.is_api_version_or_higher(2, 3, 2));
    }

    #[test]
    fn version_or_smaller() {
        let info = RepositoryInfo::new(1, 2, 3);
        assert!(info.is_api_version_or_smaller(1, 2, 3));
        assert!(info.is_api_version_or_smaller(2, 1, 3));
        assert!(info.is_api_version_or_smaller(1, 3, -3));
        assert!(!info.is_api_version_or_smaller(1, 2, 2));
        assert!(!info.is_api_version_or_smaller(0, 3, 2));
    }

    #[test]
    fn default_is_stale_and_formats_version() {
        let info = RepositoryInfo::default();
        assert!(info.is_stale());
        assert!(!RepositoryInfo::new(0, 0, 1).is_stale());

        let mut info = RepositoryInfo::new(1, 0, 1);
        info.version = Some("1.0.1".into());
        assert_eq!(info.to_string(), "1.0.1 (1.0.1)");
        assert_eq!(RepositoryInfo::new(0, 0, 2).to_string(), "0.0.2");
    }
}

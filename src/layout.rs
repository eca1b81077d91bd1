//! Journal path resolution.
//!
//! A `Locator` maps a [`Location`] to the directory holding its journal.
//! The mapping is pure given the locator's configuration; it is injected
//! once at process startup and shared by every writer and reader.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::location::Location;
use crate::{Error, Result};

/// Resolves a location to the directory holding its journal files.
pub trait Locator: Send + Sync + fmt::Debug {
    fn resolve(&self, location: &Location) -> PathBuf;
}

/// Standard directory layout under a single root:
/// `{root}/{mode}/{category}/{group}/{name}`.
#[derive(Debug, Clone)]
pub struct DirectoryLocator {
    root: PathBuf,
}

impl DirectoryLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Locator for DirectoryLocator {
    fn resolve(&self, location: &Location) -> PathBuf {
        self.root
            .join(location.mode().as_str())
            .join(location.category().as_str())
            .join(location.group())
            .join(location.name())
    }
}

/// Validates that an identity field is safe to use as a path component.
///
/// # Errors
///
/// Returns `Error::InvalidLocation` if the value is empty, is `.` or `..`,
/// or contains a path separator or NUL byte.
pub fn validate_component(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0')
    {
        return Err(Error::InvalidLocation {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{Category, Mode};

    #[test]
    fn resolves_under_root() {
        let locator = DirectoryLocator::new("/tmp/guild");
        let location = Location::new(Mode::Live, Category::MarketData, "xtp", "level1").unwrap();
        assert_eq!(
            locator.resolve(&location),
            PathBuf::from("/tmp/guild/live/md/xtp/level1")
        );
    }

    #[test]
    fn rejects_unsafe_components() {
        assert!(validate_component("group", "master").is_ok());
        assert!(validate_component("group", "btc-usdt").is_ok());
        assert!(validate_component("group", "").is_err());
        assert!(validate_component("group", ".").is_err());
        assert!(validate_component("group", "..").is_err());
        assert!(validate_component("group", "a/b").is_err());
        assert!(validate_component("group", "a\\b").is_err());
        assert!(validate_component("group", "a\0b").is_err());
    }
}

//! Addressable process identity.
//!
//! A `Location` names a process or data stream by the tuple
//! (mode, category, group, name) and carries a deterministic 32-bit uid
//! derived from those fields. Any process can compute any other process's
//! uid and journal path without a directory service; this is the addressing
//! contract the rest of the system depends on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::layout::validate_component;
use crate::Result;

/// Run mode of a process tree. Participates in uid derivation, so the same
/// identity in different modes addresses different journals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Live,
    Backtest,
    Replay,
}

impl Mode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Mode::Live => "live",
            Mode::Backtest => "backtest",
            Mode::Replay => "replay",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Functional role of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    System,
    MarketData,
    Trade,
    Strategy,
}

impl Category {
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::System => "system",
            Category::MarketData => "md",
            Category::Trade => "td",
            Category::Strategy => "strategy",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable addressable identity.
///
/// Created once at process startup or on first sight of a peer; never
/// mutated. Identity fields are validated at construction, so a `Location`
/// in hand is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    mode: Mode,
    category: Category,
    group: String,
    name: String,
    uid: u32,
}

impl Location {
    /// Builds a location, failing fast on malformed group/name fields.
    pub fn new(mode: Mode, category: Category, group: &str, name: &str) -> Result<Self> {
        validate_component("group", group)?;
        validate_component("name", name)?;
        Ok(Self {
            mode,
            category,
            group: group.to_string(),
            name: name.to_string(),
            uid: derive_uid(mode, category, group, name),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Canonical identity string, `{category}/{group}/{name}/{mode}`.
    pub fn uname(&self) -> String {
        uname(self.mode, self.category, &self.group, &self.name)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uname())
    }
}

fn uname(mode: Mode, category: Category, group: &str, name: &str) -> String {
    format!("{}/{}/{}/{}", category.as_str(), group, name, mode.as_str())
}

/// Derives the 32-bit uid for an identity tuple.
///
/// Pure function of the four fields: same inputs yield the same uid in every
/// process, on every restart. Distinct tuples hashing to the same uid is a
/// fatal configuration error, detected by [`crate::registry::LocationRegistry`].
pub fn derive_uid(mode: Mode, category: Category, group: &str, name: &str) -> u32 {
    crc32fast::hash(uname(mode, category, group, name).as_bytes())
}

/// Renders a uid as the 8-hex-digit lowercase string used in human-facing
/// identifiers (journal names, log prefixes).
pub fn uid_str(uid: u32) -> String {
    format!("{uid:08x}")
}

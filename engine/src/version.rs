//! Semantic versions and their precedence.
//!
//! Every key of a schema history is a [`Version`]. Ordering follows the
//! semantic versioning 2.0.0 precedence rules, which gives a total order over
//! valid versions:
//!
//! 1. Compare major, minor and patch numerically
//! 2. A version with a pre-release ranks below the same version without one
//! 3. Pre-release identifiers are compared left to right: numeric identifiers
//!    numerically, alphanumeric ones in ASCII order, numeric below
//!    alphanumeric, and a shorter list below a longer one sharing its prefix
//!
//! Build metadata is kept for display but ignored by precedence.

use crate::{error::Result, Error};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A single dot-separated pre-release identifier.
///
/// Variant order matters: numeric identifiers rank below alphanumeric ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Identifier {
    Numeric(u64),
    Alphanumeric(String),
}

/// A parsed semantic version.
#[derive(Debug, Clone)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Vec<Identifier>,
    build: Vec<String>,
    /// Original text, used for display and storage keys
    text: String,
}

impl Version {
    /// Text of the lower-bound sentinel returned for an empty version set.
    pub const ZERO_TEXT: &'static str = "0.0.0";

    /// The `0.0.0` sentinel.
    pub fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// Create a release version from its numeric components.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Vec::new(),
            build: Vec::new(),
            text: format!("{}.{}.{}", major, minor, patch),
        }
    }

    /// Parse a strict semantic version string.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidVersion {
            version: text.to_string(),
            reason: reason.to_string(),
        };

        let (rest, build) = match text.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (text, None),
        };
        // The core never contains a hyphen, so the first one starts the pre-release.
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid("expected MAJOR.MINOR.PATCH"));
        }
        let major = parse_numeric(parts[0]).map_err(|r| invalid(r))?;
        let minor = parse_numeric(parts[1]).map_err(|r| invalid(r))?;
        let patch = parse_numeric(parts[2]).map_err(|r| invalid(r))?;

        let pre = match pre {
            Some(pre) => pre
                .split('.')
                .map(parse_identifier)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|r| invalid(r))?,
            None => Vec::new(),
        };

        let build = match build {
            Some(build) => build
                .split('.')
                .map(|ident| {
                    check_identifier_chars(ident)?;
                    Ok(ident.to_string())
                })
                .collect::<std::result::Result<Vec<_>, &'static str>>()
                .map_err(|r| invalid(r))?,
            None => Vec::new(),
        };

        Ok(Self {
            major,
            minor,
            patch,
            pre,
            build,
            text: text.to_string(),
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Whether this version carries a pre-release tag.
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Build metadata identifiers, if any.
    pub fn build(&self) -> &[String] {
        &self.build
    }

    /// The version exactly as it was written.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

fn parse_numeric(part: &str) -> std::result::Result<u64, &'static str> {
    if part.is_empty() {
        return Err("empty numeric component");
    }
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err("numeric component must contain only digits");
    }
    if part.len() > 1 && part.starts_with('0') {
        return Err("numeric component must not have leading zeros");
    }
    part.parse().map_err(|_| "numeric component out of range")
}

fn check_identifier_chars(ident: &str) -> std::result::Result<(), &'static str> {
    if ident.is_empty() {
        return Err("empty identifier");
    }
    if !ident.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err("identifiers may only contain [0-9A-Za-z-]");
    }
    Ok(())
}

fn parse_identifier(ident: &str) -> std::result::Result<Identifier, &'static str> {
    check_identifier_chars(ident)?;
    if ident.bytes().all(|b| b.is_ascii_digit()) {
        parse_numeric(ident).map(Identifier::Numeric)
    } else {
        Ok(Identifier::Alphanumeric(ident.to_string()))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality and hashing follow precedence, so they ignore build metadata.
impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.pre.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Version::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Compare two version strings by semantic-version precedence.
///
/// Fails with [`Error::InvalidVersion`] if either operand is malformed.
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    let a = Version::parse(a)?;
    let b = Version::parse(b)?;
    Ok(a.cmp(&b))
}

/// The greatest version in `versions`, or `0.0.0` if there are none.
pub fn latest_of<'a>(versions: impl IntoIterator<Item = &'a Version>) -> Version {
    versions
        .into_iter()
        .max()
        .cloned()
        .unwrap_or_else(Version::zero)
}

/// Like [`latest_of`], for unparsed version strings.
pub fn latest_of_str<S: AsRef<str>>(versions: &[S]) -> Result<Version> {
    let parsed = versions
        .iter()
        .map(|v| Version::parse(v.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(latest_of(&parsed))
}

//! Semantic version types.
//!
//! Provides `Version`, `VersionRange` and `VersionReq` following the
//! semantic versioning precedence rules, implemented from scratch so the
//! bootstrapper never depends on the package manager it is rebuilding.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Semantic version (major.minor.patch-prerelease+build)
///
/// Equality includes build metadata, ordering does not: `1.0.0+a` and
/// `1.0.0+b` are `Ordering::Equal` but not `==`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Prerelease,
    pub build: Option<String>,
}

/// Dot-separated prerelease identifiers (`alpha.1`), possibly empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Prerelease {
    identifiers: Vec<String>,
}

/// One component of a partially specified version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Not present in the input (`1` has no minor)
    Missing,
    /// `*`
    Wildcard,
    Value(u64),
}

/// Version as written in a requirement, remembering which parts were given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialVersion {
    pub major: Component,
    pub minor: Component,
    pub patch: Component,
    pub pre: Prerelease,
    pub build: Option<String>,
}

/// Comparison operator for version ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    LessEq,    // <=1.0.0
    GreaterEq, // >=1.0.0
    Less,      // <1.0.0
    Greater,   // >1.0.0
    Exact,     // =1.0.0
    Caret,     // ^1.0.0 (default)
    Tilde,     // ~1.0.0
    Wildcard,  // 1.*
}

/// A single constraint: operator plus partial version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    op: Op,
    partial: PartialVersion,
    pivot: Option<Version>,
}

/// Version requirement made of comma-separated ranges that must all hold
/// (`>=0.2.5, <0.3`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReq {
    pub ranges: Vec<VersionRange>,
}

/// Version parsing and validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version format: {input}")]
    InvalidFormat { input: String },

    #[error("Invalid version range: {input}")]
    InvalidRange { input: String },

    #[error("Invalid version operator: {op}")]
    InvalidOperator { op: String },
}

impl Version {
    /// Create a new version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Prerelease::default(),
            build: None,
        }
    }

    /// Parse a version string, zero-filling missing minor/patch
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let partial = PartialVersion::parse(input, false)?;
        partial.to_version().ok_or_else(|| VersionError::InvalidFormat {
            input: input.to_string(),
        })
    }

    /// Check if this version satisfies a version requirement
    pub fn satisfies(&self, req: &VersionReq) -> bool {
        req.matches(self)
    }

    /// Check if this is a prerelease version
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Equality under precedence rules (build metadata ignored)
    pub fn precedence_eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }

    /// Version rendered for use in file names: `1.2.3-rc.1` -> `1_2_3-rc_1`
    pub fn file_suffix(&self) -> String {
        self.to_string().replace(['.', '-', '+'], "_")
    }

    fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    /// Get the precedence for comparison (ignores build metadata)
    fn precedence_cmp(&self, other: &Self) -> Ordering {
        match self.triple().cmp(&other.triple()) {
            Ordering::Equal => self.pre.cmp(&other.pre),
            other => other,
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;

        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre)?;
        }

        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
        }

        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Precedence order. Build metadata is ignored, so two versions that
/// differ only in metadata compare `Equal` while `==` tells them apart.
/// Do not key ordered collections by `Version`; use `Hash` keys instead.
impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence_cmp(other)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Version::parse(&text).map_err(de::Error::custom)
    }
}

impl Prerelease {
    /// Parse dot-separated identifiers; numeric ones may not have leading zeros
    pub fn parse(text: &str) -> Option<Self> {
        let identifiers = parse_identifiers(text)?;
        if identifiers.iter().any(|id| is_numeric(id) && id.len() > 1 && id.starts_with('0')) {
            return None;
        }
        Some(Self { identifiers })
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }
}

impl fmt::Display for Prerelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifiers.join("."))
    }
}

impl PartialOrd for Prerelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Prerelease {
    fn cmp(&self, other: &Self) -> Ordering {
        // Having no prerelease is the highest precedence
        match (self.is_empty(), other.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {},
        }

        for (lhs, rhs) in self.identifiers.iter().zip(&other.identifiers) {
            let ordering = match (is_numeric(lhs), is_numeric(rhs)) {
                // No leading zeros, so a longer number is a bigger number
                (true, true) => lhs.len().cmp(&rhs.len()).then_with(|| lhs.cmp(rhs)),
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => lhs.as_bytes().cmp(rhs.as_bytes()),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        // A strict prefix has lower precedence
        self.identifiers.len().cmp(&other.identifiers.len())
    }
}

impl Component {
    fn value(self) -> Option<u64> {
        match self {
            Component::Value(v) => Some(v),
            _ => None,
        }
    }

    fn parse(text: &str, allow_wildcard: bool) -> Option<Self> {
        if text == "*" {
            return allow_wildcard.then_some(Component::Wildcard);
        }
        if !is_numeric(text) || (text.len() > 1 && text.starts_with('0')) {
            return None;
        }
        text.parse().ok().map(Component::Value)
    }
}

impl PartialVersion {
    /// Parse `major[.minor[.patch]][-pre][+build]`, optionally with `*`
    /// components.
    pub fn parse(input: &str, allow_wildcard: bool) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidFormat {
            input: input.to_string(),
        };
        let text = input.trim();

        // Split on '+' for build metadata
        let (version_part, build) = match text.split_once('+') {
            Some((v, b)) => {
                parse_identifiers(b).ok_or_else(invalid)?;
                (v, Some(b.to_string()))
            },
            None => (text, None),
        };

        // Split on the first '-' for prerelease
        let (core_part, pre) = match version_part.split_once('-') {
            Some((c, p)) => (c, Prerelease::parse(p).ok_or_else(invalid)?),
            None => (version_part, Prerelease::default()),
        };

        let parts: Vec<&str> = core_part.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(invalid());
        }

        let mut components = [Component::Missing; 3];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = Component::parse(part, allow_wildcard).ok_or_else(invalid)?;
        }
        let [major, minor, patch] = components;

        let partial = PartialVersion {
            major,
            minor,
            patch,
            pre,
            build,
        };

        // Wildcards cannot carry prerelease or build data
        if partial.has_wildcard() && (!partial.pre.is_empty() || partial.build.is_some()) {
            return Err(invalid());
        }

        Ok(partial)
    }

    /// Whether any numeric component is `*`
    pub fn has_wildcard(&self) -> bool {
        [self.major, self.minor, self.patch].contains(&Component::Wildcard)
    }

    /// Convert to a full version (filling missing parts with 0).
    /// Returns `None` if any component is a wildcard.
    pub fn to_version(&self) -> Option<Version> {
        if self.has_wildcard() {
            return None;
        }
        Some(Version {
            major: self.major.value().unwrap_or(0),
            minor: self.minor.value().unwrap_or(0),
            patch: self.patch.value().unwrap_or(0),
            pre: self.pre.clone(),
            build: self.build.clone(),
        })
    }
}

impl fmt::Display for PartialVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in [self.major, self.minor, self.patch] {
            let text = match component {
                Component::Missing => break,
                Component::Wildcard => "*".to_string(),
                Component::Value(v) => v.to_string(),
            };
            if !first {
                f.write_str(".")?;
            }
            f.write_str(&text)?;
            first = false;
        }
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre)?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl Op {
    fn parse(text: &str) -> Result<Option<Self>, VersionError> {
        let op = match text {
            "" => return Ok(None),
            "<=" => Op::LessEq,
            ">=" => Op::GreaterEq,
            "<" => Op::Less,
            ">" => Op::Greater,
            "=" => Op::Exact,
            "^" => Op::Caret,
            "~" => Op::Tilde,
            other => {
                return Err(VersionError::InvalidOperator {
                    op: other.to_string(),
                })
            },
        };
        Ok(Some(op))
    }

    /// Comparison operators hold a single pivot instead of bounds
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Op::LessEq | Op::GreaterEq | Op::Less | Op::Greater | Op::Exact
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            Op::LessEq => "<=",
            Op::GreaterEq => ">=",
            Op::Less => "<",
            Op::Greater => ">",
            Op::Exact => "=",
            Op::Caret => "^",
            Op::Tilde => "~",
            Op::Wildcard => "",
        }
    }
}

impl VersionRange {
    /// Parse a single constraint such as `^1.2`, `>= 0.3.1`, `1.*` or `*`
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(VersionError::InvalidRange {
                input: input.to_string(),
            });
        }

        let op_len = text
            .find(|c: char| !matches!(c, '<' | '>' | '=' | '^' | '~' | '!'))
            .unwrap_or(text.len());
        let explicit = Op::parse(&text[..op_len])?;
        let rest = text[op_len..].trim_start();

        let partial = PartialVersion::parse(rest, explicit.is_none()).map_err(|_| {
            VersionError::InvalidRange {
                input: input.to_string(),
            }
        })?;

        let op = match explicit {
            Some(op) => op,
            None if partial.has_wildcard() => Op::Wildcard,
            None => Op::Caret,
        };

        let pivot = if op.is_comparison() {
            partial.to_version()
        } else {
            None
        };

        Ok(Self { op, partial, pivot })
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn partial(&self) -> &PartialVersion {
        &self.partial
    }

    /// Inclusive lower bound; `None` for comparison operators
    pub fn lower(&self) -> Option<Version> {
        let p = &self.partial;
        match self.op {
            op if op.is_comparison() => None,
            Op::Wildcard => match (p.major, p.minor) {
                (Component::Wildcard, _) => Some(Version::new(0, 0, 0)),
                (Component::Value(major), Component::Wildcard) => Some(Version::new(major, 0, 0)),
                (Component::Value(major), Component::Value(minor)) => {
                    Some(Version::new(major, minor, 0))
                },
                _ => None,
            },
            _ => {
                let mut lower = Version::new(
                    p.major.value().unwrap_or(0),
                    p.minor.value().unwrap_or(0),
                    p.patch.value().unwrap_or(0),
                );
                lower.pre = p.pre.clone();
                Some(lower)
            },
        }
    }

    /// Exclusive upper bound; `None` for comparison operators and bare `*`
    pub fn upper(&self) -> Option<Version> {
        let p = &self.partial;
        let major = p.major.value().unwrap_or(0);
        match self.op {
            op if op.is_comparison() => None,
            Op::Wildcard => match (p.major, p.minor) {
                (Component::Wildcard, _) => None,
                (_, Component::Wildcard) => Some(Version::new(major.saturating_add(1), 0, 0)),
                (_, Component::Value(minor)) => {
                    Some(Version::new(major, minor.saturating_add(1), 0))
                },
                _ => None,
            },
            Op::Caret => {
                let upper = match (p.minor.value(), p.patch.value()) {
                    (None, _) => Version::new(major.saturating_add(1), 0, 0),
                    _ if major > 0 => Version::new(major.saturating_add(1), 0, 0),
                    (Some(minor), None) => Version::new(0, minor.saturating_add(1), 0),
                    (Some(0), Some(patch)) => Version::new(0, 0, patch.saturating_add(1)),
                    (Some(minor), Some(_)) => Version::new(0, minor.saturating_add(1), 0),
                };
                Some(upper)
            },
            _ => {
                // Tilde freezes the minor when given, the major otherwise
                let upper = match p.minor.value() {
                    Some(minor) => Version::new(major, minor.saturating_add(1), 0),
                    None => Version::new(major.saturating_add(1), 0, 0),
                };
                Some(upper)
            },
        }
    }

    /// Test whether `version` satisfies this constraint
    pub fn compare(&self, version: &Version) -> bool {
        if let Some(ref pivot) = self.pivot {
            return match self.op {
                Op::LessEq => version <= pivot,
                Op::GreaterEq => version >= pivot,
                Op::Less => version < pivot,
                Op::Greater => version > pivot,
                _ => version == pivot,
            };
        }

        let above_lower = self.lower().map_or(true, |lower| *version >= lower);
        let below_upper = self.upper().map_or(true, |upper| {
            // 2.0.0-alpha sorts below 2.0.0 but is not part of ^1
            let prerelease_of_upper = version.is_prerelease()
                && upper.pre.is_empty()
                && version.triple() == upper.triple();
            *version < upper && !prerelease_of_upper
        });
        above_lower && below_upper
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.partial)
    }
}

impl VersionReq {
    /// Requirement matching every version
    pub fn any() -> Self {
        Self {
            ranges: vec![VersionRange {
                op: Op::Wildcard,
                partial: PartialVersion {
                    major: Component::Wildcard,
                    minor: Component::Missing,
                    patch: Component::Missing,
                    pre: Prerelease::default(),
                    build: None,
                },
                pivot: None,
            }],
        }
    }

    /// Parse a version requirement string
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let ranges = input
            .split(',')
            .map(VersionRange::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ranges })
    }

    /// Check if a version matches this requirement
    pub fn matches(&self, version: &Version) -> bool {
        self.ranges.iter().all(|range| range.compare(version))
    }

    /// Pick the highest-precedence item whose version satisfies this
    /// requirement.
    pub fn select_max<T, F>(&self, items: impl IntoIterator<Item = T>, version_of: F) -> Option<T>
    where
        F: Fn(&T) -> &Version,
    {
        items
            .into_iter()
            .filter(|item| self.matches(version_of(item)))
            .max_by(|a, b| version_of(a).cmp(version_of(b)))
    }
}

impl FromStr for VersionReq {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionReq::parse(s)
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ranges.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(", "))
    }
}

fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn parse_identifiers(text: &str) -> Option<Vec<String>> {
    let identifiers: Vec<String> = text.split('.').map(str::to_string).collect();
    let valid = identifiers.iter().all(|id| {
        !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    });
    valid.then_some(identifiers)
}

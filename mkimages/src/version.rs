//! Runtime version ordering. Versions are dot-separated numeric components compared left to right where missing
//! trailing components count as zero, so `5.2` equals `5.2.0` and `5.3.0.1` is newer than `5.3`.

use std::{cmp::Ordering, fmt};

use semver::Prerelease;

#[derive(Debug)]
pub enum InvalidVersion {
    Component(String),
    Prerelease(semver::Error),
}

impl std::error::Error for InvalidVersion {}

impl fmt::Display for InvalidVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidVersion::Component(component) => {
                write!(f, "invalid version component {component:?}")
            }
            InvalidVersion::Prerelease(error) => write!(f, "invalid pre-release: {error}"),
        }
    }
}

/// A release of any number of numeric components with an optional semver pre-release. Build metadata is ignored.
#[derive(Debug, Clone)]
pub struct RuntimeVersion {
    release: Vec<u64>,
    pre: Prerelease,
}

impl RuntimeVersion {
    fn component(&self, index: usize) -> u64 {
        self.release.get(index).copied().unwrap_or(0)
    }
}

impl Ord for RuntimeVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        (0..len)
            .map(|index| self.component(index).cmp(&other.component(index)))
            .find(|ordering| ordering.is_ne())
            // An empty pre-release sorts after every other one.
            .unwrap_or_else(|| self.pre.cmp(&other.pre))
    }
}

impl PartialOrd for RuntimeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RuntimeVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for RuntimeVersion {}

pub fn parse(value: &str) -> Result<RuntimeVersion, InvalidVersion> {
    let value = value.trim();
    let value = value.split_once('+').map_or(value, |(version, _build)| version);
    let (core, pre) = value.split_once('-').unwrap_or((value, ""));

    let release = core
        .split('.')
        .map(|component| {
            if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
                return Err(InvalidVersion::Component(component.to_owned()));
            }
            component
                .parse()
                .map_err(|_| InvalidVersion::Component(component.to_owned()))
        })
        .collect::<Result<Vec<u64>, _>>()?;
    let pre = Prerelease::new(pre).map_err(InvalidVersion::Prerelease)?;

    Ok(RuntimeVersion { release, pre })
}

pub fn compare(a: &str, b: &str) -> Result<Ordering, InvalidVersion> {
    Ok(parse(a)?.cmp(&parse(b)?))
}

/// Returns whether `version` is at least `minimum`.
pub fn at_least(version: &str, minimum: &str) -> Result<bool, InvalidVersion> {
    Ok(compare(version, minimum)? != Ordering::Less)
}

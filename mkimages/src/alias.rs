//! Version aliases. Every built image is tagged with its full runtime version; the alias table adds shorthand tags
//! such as `5.4`, `5` and `latest` that point at the same image.

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    matrix::DefaultAliases,
    target::{AliasPair, BuildTarget},
};

pub const LATEST: &str = "latest";

/// Maps a runtime version to its ordered alias tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasTable {
    #[serde(default)]
    tags: BTreeMap<String, Vec<String>>,
    /// The overall latest runtime version. When unset, every version that lists `latest` is considered the latest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    latest: Option<String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aliases<I, S>(mut self, version: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags
            .insert(version.into(), aliases.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_latest(mut self, version: impl Into<String>) -> Self {
        self.latest = Some(version.into());
        self
    }

    /// Returns the aliases of `version`, empty if it has none.
    pub fn aliases(&self, version: &str) -> &[String] {
        self.tags.get(version).map_or(&[], Vec::as_slice)
    }

    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    pub fn is_latest(&self, version: &str) -> bool {
        self.latest.as_deref().map_or(true, |latest| latest == version)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tags
            .iter()
            .map(|(version, aliases)| (version.as_str(), aliases.as_slice()))
    }
}

/// Where the `latest` tag may appear.
#[derive(Debug, Default, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum LatestScope {
    /// Every OS-suffixed repository gets its own `latest` tag.
    #[default]
    PerOs,
    /// Only the unsuffixed default repository gets a `latest` tag.
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasPolicy {
    pub latest_scope: LatestScope,
    /// Whether the unsuffixed default references also receive the alias tags.
    pub default_aliases: bool,
}

impl Default for AliasPolicy {
    fn default() -> Self {
        Self {
            latest_scope: LatestScope::PerOs,
            default_aliases: true,
        }
    }
}

/// Returns a pair for every alias of the tag of `target`, in table order. Tags without an entry have no aliases.
pub fn resolve_aliases(target: &BuildTarget, table: &AliasTable) -> Vec<AliasPair> {
    table
        .aliases(target.reference().tag())
        .iter()
        .map(|alias| AliasPair::new(target.clone(), target.reference().with_tag(alias.as_str())))
        .collect()
}

pub struct AliasResolver<'a> {
    table: &'a AliasTable,
    default_aliases: &'a DefaultAliases,
    policy: AliasPolicy,
}

impl<'a> AliasResolver<'a> {
    pub fn new(
        table: &'a AliasTable,
        default_aliases: &'a DefaultAliases,
        policy: AliasPolicy,
    ) -> Self {
        Self {
            table,
            default_aliases,
            policy,
        }
    }

    /// The aliases of `target` in its own repository.
    pub fn resolve(&self, target: &BuildTarget) -> Vec<AliasPair> {
        let mut pairs = resolve_aliases(target, self.table);
        if self.policy.latest_scope == LatestScope::Global {
            pairs.retain(|pair| pair.destination.tag() != LATEST);
        }
        pairs
    }

    /// The unsuffixed default reference of `target`, if it has one.
    pub fn default_root(&self, target: &BuildTarget) -> Option<AliasPair> {
        self.default_aliases
            .get(target.reference())
            .map(|default| AliasPair::new(target.clone(), default.clone()))
    }

    /// The aliases of `target` in its unsuffixed default repository, tagged from the default reference. `latest` is
    /// only produced for the overall latest version so two versions never compete for it.
    pub fn resolve_default(&self, target: &BuildTarget) -> Vec<AliasPair> {
        if !self.policy.default_aliases {
            return Vec::new();
        }
        let Some(root) = self.default_root(target) else {
            return Vec::new();
        };
        let version = target.reference().tag();
        let mut pairs = resolve_aliases(&root.to_target(), self.table);
        pairs.retain(|pair| pair.destination.tag() != LATEST || self.table.is_latest(version));
        pairs
    }

    /// [`Self::resolve`] followed by [`Self::resolve_default`].
    pub fn resolve_all(&self, target: &BuildTarget) -> Vec<AliasPair> {
        let mut pairs = self.resolve(target);
        pairs.extend(self.resolve_default(target));
        pairs
    }
}

//! Expansion of the configured axes into the list of images to build.

use std::collections::{HashMap, HashSet};

use image_reference::ImageReference;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{dockerfile::ImageKind, os::OsFamily, target::BuildTarget, version};

/// Maps the reference of every default-OS target to its unsuffixed counterpart.
pub type DefaultAliases = HashMap<ImageReference, ImageReference>;

/// A version of an OS family, optionally restricted to recent runtimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OsVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_runtime: Option<String>,
}

impl OsVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            minimum_runtime: None,
        }
    }

    pub fn with_minimum_runtime(mut self, minimum: impl Into<String>) -> Self {
        self.minimum_runtime = Some(minimum.into());
        self
    }
}

/// An OS family together with the versions to build on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OsAxis {
    pub family: OsFamily,
    pub versions: Vec<OsVersion>,
    /// Runtimes older than this are never built on this family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_runtime: Option<String>,
    /// The version whose images also get unsuffixed references. Defaults to the first version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_version: Option<String>,
}

impl OsAxis {
    pub fn new(family: OsFamily, versions: impl IntoIterator<Item = OsVersion>) -> Self {
        Self {
            family,
            versions: versions.into_iter().collect(),
            minimum_runtime: None,
            default_version: None,
        }
    }

    pub fn with_minimum_runtime(mut self, minimum: impl Into<String>) -> Self {
        self.minimum_runtime = Some(minimum.into());
        self
    }

    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = Some(version.into());
        self
    }

    pub fn default_version(&self) -> Option<&str> {
        self.default_version
            .as_deref()
            .or_else(|| self.versions.first().map(|os| os.version.as_str()))
    }
}

/// How repositories are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Naming<'a> {
    pub namespace: &'a str,
    pub image: &'a str,
}

impl Naming<'_> {
    /// `<namespace>/<family><os version>/<image name>`
    pub fn repository(&self, kind: ImageKind, family: OsFamily, os_version: &str) -> String {
        format!(
            "{namespace}/{segment}/{name}",
            namespace = self.namespace,
            segment = family.path_segment(os_version),
            name = kind.image_name(self.image),
        )
    }

    /// `<namespace>/<image name>`
    pub fn default_repository(&self, kind: ImageKind) -> String {
        format!(
            "{namespace}/{name}",
            namespace = self.namespace,
            name = kind.image_name(self.image),
        )
    }
}

#[derive(Debug, Default)]
pub struct Matrix {
    pub targets: Vec<BuildTarget>,
    pub default_aliases: DefaultAliases,
}

/// Returns whether `runtime` satisfies `minimum`. Versions that cannot be compared exclude the combination.
fn satisfies(runtime: &str, minimum: Option<&str>, what: &dyn std::fmt::Display) -> bool {
    let Some(minimum) = minimum else {
        return true;
    };
    match version::at_least(runtime, minimum) {
        Ok(true) => true,
        Ok(false) => {
            debug!("skipping {runtime} on {what}: requires at least {minimum}");
            false
        }
        Err(error) => {
            warn!("skipping {runtime} on {what}: cannot compare with minimum {minimum}: {error}");
            false
        }
    }
}

/// Expands runtime versions × OS families × OS versions × kinds into build targets, runtime versions outermost and
/// every axis in the given order. Targets on the default version of their family also get an unsuffixed reference,
/// unless an earlier family already claimed it.
pub fn expand(
    naming: Naming<'_>,
    runtime_versions: &[String],
    axes: &[OsAxis],
    kinds: &[ImageKind],
) -> Matrix {
    let mut matrix = Matrix::default();
    let mut claimed = HashSet::new();

    for runtime in runtime_versions {
        for axis in axes {
            if !satisfies(runtime, axis.minimum_runtime.as_deref(), &axis.family) {
                continue;
            }
            let default_version = axis.default_version();

            for os in &axis.versions {
                let what = axis.family.path_segment(&os.version);
                if !satisfies(runtime, os.minimum_runtime.as_deref(), &what) {
                    continue;
                }

                for &kind in kinds {
                    let repository = naming.repository(kind, axis.family, &os.version);
                    let reference = match ImageReference::new(None, repository, runtime.as_str()) {
                        Ok(reference) => reference,
                        Err(error) => {
                            warn!("skipping {runtime} on {what}: {error}");
                            continue;
                        }
                    };

                    let mut target =
                        BuildTarget::new(kind, axis.family, &os.version, runtime, reference);

                    if default_version == Some(os.version.as_str()) {
                        let default = target
                            .reference()
                            .with_repository(naming.default_repository(kind));
                        if claimed.insert(default.clone()) {
                            matrix
                                .default_aliases
                                .insert(target.reference().clone(), default);
                            target = target.with_default_alias(true);
                        } else {
                            debug!(
                                "{default} is already the default of another family, not claiming it for {}",
                                target.reference()
                            );
                        }
                    }

                    matrix.targets.push(target);
                }
            }
        }
    }

    matrix
}

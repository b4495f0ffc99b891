use std::{fmt, path::PathBuf, rc::Rc};

use image_reference::ImageReference;
use log::info;

use crate::{
    backend::Backend,
    dockerfile::{self, ImageKind},
    engine::Engine,
    os::OsFamily,
    temp_path, Result,
};

/// An image to build: its reference together with everything needed to produce it. Copies made with
/// [`BuildTarget::with_reference`] share the Dockerfile.
#[derive(Clone, PartialEq, Eq)]
pub struct BuildTarget {
    kind: ImageKind,
    os_family: OsFamily,
    os_version: String,
    runtime_version: String,
    reference: ImageReference,
    dockerfile: Rc<str>,
    is_default_alias: bool,
}

impl BuildTarget {
    pub fn new(
        kind: ImageKind,
        os_family: OsFamily,
        os_version: impl Into<String>,
        runtime_version: impl Into<String>,
        reference: ImageReference,
    ) -> Self {
        let os_version = os_version.into();
        let runtime_version = runtime_version.into();
        let dockerfile = dockerfile::dockerfile(kind, os_family, &os_version, &runtime_version);
        Self {
            kind,
            os_family,
            os_version,
            runtime_version,
            reference,
            dockerfile: dockerfile.into(),
            is_default_alias: false,
        }
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn os_family(&self) -> OsFamily {
        self.os_family
    }

    pub fn os_version(&self) -> &str {
        &self.os_version
    }

    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    pub fn reference(&self) -> &ImageReference {
        &self.reference
    }

    pub fn dockerfile(&self) -> &str {
        &self.dockerfile
    }

    /// Whether this target also receives an unsuffixed default reference.
    pub fn is_default_alias(&self) -> bool {
        self.is_default_alias
    }

    pub(crate) fn with_default_alias(self, is_default_alias: bool) -> Self {
        Self {
            is_default_alias,
            ..self
        }
    }

    /// Returns a copy of this target identified by `reference`. The copy is never a default alias itself.
    pub fn with_reference(&self, reference: ImageReference) -> Self {
        Self {
            kind: self.kind,
            os_family: self.os_family,
            os_version: self.os_version.clone(),
            runtime_version: self.runtime_version.clone(),
            reference,
            dockerfile: Rc::clone(&self.dockerfile),
            is_default_alias: false,
        }
    }

    /// Builds the image in a fresh temporary directory and returns that directory. The directory is left behind so
    /// failed builds can be inspected.
    pub fn build(&self, backend: &dyn Backend, engine: &Engine) -> Result<PathBuf> {
        let dir = temp_path::tmp_dir_path();
        info!("building {reference} in {dir:?}", reference = self.reference);
        backend.create_dir(&dir)?;
        backend.write_file(&dir.join("Dockerfile"), &self.dockerfile)?;
        backend.run(&engine.build(&self.reference, &dir))?;
        Ok(dir)
    }

    pub fn tag(
        &self,
        destination: &ImageReference,
        backend: &dyn Backend,
        engine: &Engine,
    ) -> Result<()> {
        info!(
            "tagging {reference} as {destination}",
            reference = self.reference
        );
        backend.run(&engine.tag(&self.reference, destination))
    }

    pub fn push(&self, backend: &dyn Backend, engine: &Engine) -> Result<()> {
        info!("pushing {reference}", reference = self.reference);
        backend.run(&engine.push(&self.reference))
    }

    pub fn remove(&self, backend: &dyn Backend, engine: &Engine) -> Result<()> {
        info!("removing {reference}", reference = self.reference);
        backend.run(&engine.remove(&self.reference))
    }
}

impl fmt::Debug for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildTarget")
            .field("kind", &self.kind)
            .field("os_family", &self.os_family)
            .field("os_version", &self.os_version)
            .field("runtime_version", &self.runtime_version)
            .field("reference", &self.reference)
            .field("is_default_alias", &self.is_default_alias)
            .finish_non_exhaustive()
    }
}

/// A reference to create by tagging the image of `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasPair {
    pub source: BuildTarget,
    pub destination: ImageReference,
}

impl AliasPair {
    pub fn new(source: BuildTarget, destination: ImageReference) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn tag(&self, backend: &dyn Backend, engine: &Engine) -> Result<()> {
        self.source.tag(&self.destination, backend, engine)
    }

    /// The target as it exists locally once this pair has been tagged.
    pub fn to_target(&self) -> BuildTarget {
        self.source.with_reference(self.destination.clone())
    }
}

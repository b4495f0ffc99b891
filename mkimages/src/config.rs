//! The image matrix: which runtime versions to build on which OS versions, and how to name the results. Built in,
//! or loaded from a JSON file with `--config`.

use std::{collections::HashSet, fs, path::Path};

use image_reference::{is_valid_repository, is_valid_tag};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    alias::AliasTable,
    dockerfile::ImageKind,
    matrix::{Naming, OsAxis, OsVersion},
    os::OsFamily,
    Result,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixConfig {
    /// The first repository path segment of every image.
    pub namespace: String,
    /// The base image name, see [`ImageKind::image_name`].
    pub image: String,
    pub runtime_versions: Vec<String>,
    #[serde(default)]
    pub aliases: AliasTable,
    /// OS families in order of precedence for the unsuffixed default references.
    pub families: Vec<OsAxis>,
    pub kinds: Vec<ImageKind>,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            namespace: "mkimages".to_owned(),
            image: "lua".to_owned(),
            runtime_versions: ["5.1.5", "5.2.4", "5.3.6", "5.4.7"]
                .map(str::to_owned)
                .to_vec(),
            aliases: AliasTable::new()
                .with_aliases("5.1.5", ["5.1"])
                .with_aliases("5.2.4", ["5.2"])
                .with_aliases("5.3.6", ["5.3"])
                .with_aliases("5.4.7", ["5.4", "5", "latest"])
                .with_latest("5.4.7"),
            families: vec![
                OsAxis::new(
                    OsFamily::Ubuntu,
                    [
                        OsVersion::new("24.04"),
                        OsVersion::new("22.04"),
                        OsVersion::new("20.04"),
                    ],
                ),
                OsAxis::new(OsFamily::Centos, [OsVersion::new("stream9")])
                    .with_minimum_runtime("5.3.0"),
            ],
            kinds: vec![ImageKind::Ci, ImageKind::Dev],
        }
    }
}

impl MatrixConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|error| format!("failed to read {path:?}: {error}"))?;
        Self::from_json(&content).map_err(|error| format!("invalid config {path:?}: {error}").into())
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn naming(&self) -> Naming<'_> {
        Naming {
            namespace: &self.namespace,
            image: &self.image,
        }
    }

    /// Rejects configurations that would produce invalid image references.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_repository(&self.namespace) {
            return Err(format!("invalid namespace {:?}", self.namespace).into());
        }
        if self.kinds.is_empty() {
            return Err("at least one image kind is required".into());
        }
        for kind in &self.kinds {
            let name = kind.image_name(&self.image);
            if !is_valid_repository(&name) {
                return Err(format!("invalid image name {name:?} for {kind} images").into());
            }
        }

        for version in &self.runtime_versions {
            if !is_valid_tag(version) {
                return Err(format!("runtime version {version:?} is not a valid tag").into());
            }
        }
        for (version, aliases) in self.aliases.iter() {
            if let Some(alias) = aliases.iter().find(|alias| !is_valid_tag(alias)) {
                return Err(format!("alias {alias:?} of {version} is not a valid tag").into());
            }
            if !self.runtime_versions.iter().any(|v| v == version) {
                warn!("aliases are configured for {version} which is not built");
            }
        }
        if let Some(latest) = self.aliases.latest() {
            if !self.runtime_versions.iter().any(|v| v == latest) {
                warn!("the latest version {latest} is not built");
            }
        }

        let mut families = HashSet::new();
        for axis in &self.families {
            let family = axis.family;
            if !families.insert(family) {
                return Err(format!("{family} is configured more than once").into());
            }
            if axis.versions.is_empty() {
                return Err(format!("{family} has no versions").into());
            }
            for os in &axis.versions {
                let segment = family.path_segment(&os.version);
                if !is_valid_repository(&segment) {
                    return Err(format!("{family} version {:?} can not be used in a repository", os.version).into());
                }
            }
            if let Some(default) = &axis.default_version {
                if !axis.versions.iter().any(|os| &os.version == default) {
                    return Err(format!("default version {default:?} of {family} is not one of its versions").into());
                }
            }
        }

        Ok(())
    }

    pub fn axis(&self, family: OsFamily) -> Option<&OsAxis> {
        self.families.iter().find(|axis| axis.family == family)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MatrixConfig::default();
        config.validate().unwrap();
        assert_eq!(config.axis(OsFamily::Ubuntu).unwrap().default_version(), Some("24.04"));
        assert_eq!(config.aliases.aliases("5.4.7"), ["5.4", "5", "latest"]);
    }

    #[test]
    fn loads_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "namespace": "acme",
                "image": "lua",
                "runtime_versions": ["5.4.7"],
                "aliases": {{"tags": {{"5.4.7": ["5.4"]}}}},
                "families": [{{"family": "ubuntu", "versions": [{{"version": "24.04"}}]}}],
                "kinds": ["dev"]
            }}"#
        )
        .unwrap();

        let config = MatrixConfig::load(file.path()).unwrap();
        assert_eq!(config.namespace, "acme");
        assert_eq!(config.kinds, [ImageKind::Dev]);
        assert_eq!(config.naming().default_repository(ImageKind::Dev), "acme/lua");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut value = serde_json::to_value(MatrixConfig::default()).unwrap();
        value["colour"] = "blue".into();
        assert!(MatrixConfig::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let invalid = [
            MatrixConfig {
                namespace: "Upper".to_owned(),
                ..Default::default()
            },
            MatrixConfig {
                runtime_versions: vec!["5.4 beta".to_owned()],
                ..Default::default()
            },
            MatrixConfig {
                kinds: Vec::new(),
                ..Default::default()
            },
            MatrixConfig {
                families: vec![
                    OsAxis::new(OsFamily::Ubuntu, [OsVersion::new("24.04")]),
                    OsAxis::new(OsFamily::Ubuntu, [OsVersion::new("22.04")]),
                ],
                ..Default::default()
            },
            MatrixConfig {
                families: vec![OsAxis::new(OsFamily::Ubuntu, [OsVersion::new("24.04")])
                    .with_default_version("18.04")],
                ..Default::default()
            },
        ];
        for config in invalid {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let error = MatrixConfig::load(Path::new("/nonexistent/mkimages.json")).unwrap_err();
        assert!(error.to_string().starts_with("failed to read"), "{error}");
    }
}

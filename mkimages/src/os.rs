use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The distributions images can be based on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Ubuntu,
    Centos,
}

impl OsFamily {
    pub const fn name(&self) -> &'static str {
        match self {
            OsFamily::Ubuntu => "ubuntu",
            OsFamily::Centos => "centos",
        }
    }

    /// The image every Dockerfile for this family starts `FROM`.
    pub fn base_image(&self, os_version: &str) -> String {
        match self {
            OsFamily::Ubuntu => format!("docker.io/library/ubuntu:{os_version}"),
            OsFamily::Centos => format!("quay.io/centos/centos:{os_version}"),
        }
    }

    /// The repository path segment that tells OS-suffixed images apart, e.g. `ubuntu24.04`.
    pub fn path_segment(&self, os_version: &str) -> String {
        format!("{name}{os_version}", name = self.name())
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

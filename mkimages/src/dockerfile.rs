//! Dockerfile generation. Every (kind, family) pair maps to a template function of the OS version and the runtime
//! version; the output only depends on those inputs.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::os::OsFamily;

const LUAROCKS_VERSION: &str = "3.11.1";

/// What an image is meant for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// The runtime and a C toolchain, enough to build and test native modules in CI.
    Ci,
    /// The CI image plus the package manager and tools for interactive use.
    Dev,
}

impl ImageKind {
    pub const fn name(&self) -> &'static str {
        match self {
            ImageKind::Ci => "ci",
            ImageKind::Dev => "dev",
        }
    }

    /// The last repository path segment for images of this kind.
    pub fn image_name(&self, base: &str) -> String {
        match self {
            ImageKind::Ci => format!("{base}-ci"),
            ImageKind::Dev => base.to_owned(),
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type Template = fn(os_version: &str, runtime_version: &str) -> String;

const TEMPLATES: [(ImageKind, OsFamily, Template); 4] = [
    (ImageKind::Ci, OsFamily::Ubuntu, ubuntu_ci),
    (ImageKind::Dev, OsFamily::Ubuntu, ubuntu_dev),
    (ImageKind::Ci, OsFamily::Centos, centos_ci),
    (ImageKind::Dev, OsFamily::Centos, centos_dev),
];

fn template(kind: ImageKind, family: OsFamily) -> Template {
    TEMPLATES
        .iter()
        .find_map(|&(k, f, template)| (k == kind && f == family).then_some(template))
        // Every combination is listed above, see `every_combination_has_a_template`.
        .unwrap_or_else(|| unreachable!("no Dockerfile template for {kind} on {family}"))
}

/// Returns the Dockerfile that builds `runtime_version` of the runtime on `os_version` of `family`.
pub fn dockerfile(
    kind: ImageKind,
    family: OsFamily,
    os_version: &str,
    runtime_version: &str,
) -> String {
    template(kind, family)(os_version, runtime_version)
}

fn header(family: OsFamily, os_version: &str, runtime_version: &str) -> String {
    format!(
        "FROM {base}\n\
         LABEL org.opencontainers.image.version=\"{runtime_version}\"\n\
         ENV LUA_VERSION={runtime_version}\n",
        base = family.base_image(os_version),
    )
}

const INSTALL_LUA: &str = "\
RUN curl -fsSL \"https://www.lua.org/ftp/lua-${LUA_VERSION}.tar.gz\" | tar -xz -C /tmp \\
 && make -C \"/tmp/lua-${LUA_VERSION}\" linux \\
 && make -C \"/tmp/lua-${LUA_VERSION}\" install INSTALL_TOP=/usr/local \\
 && rm -rf \"/tmp/lua-${LUA_VERSION}\"
";

fn install_luarocks() -> String {
    format!(
        "ENV LUAROCKS_VERSION={LUAROCKS_VERSION}\n\
         RUN curl -fsSL \"https://luarocks.github.io/luarocks/releases/luarocks-${{LUAROCKS_VERSION}}.tar.gz\" | tar -xz -C /tmp \\\n \
         && cd \"/tmp/luarocks-${{LUAROCKS_VERSION}}\" \\\n \
         && ./configure --with-lua=/usr/local \\\n \
         && make \\\n \
         && make install \\\n \
         && cd / \\\n \
         && rm -rf \"/tmp/luarocks-${{LUAROCKS_VERSION}}\"\n"
    )
}

const CMD: &str = "CMD [\"lua\"]\n";

fn ubuntu_packages(packages: &str) -> String {
    format!(
        "ARG DEBIAN_FRONTEND=noninteractive\n\
         RUN apt-get update \\\n \
         && apt-get install -y --no-install-recommends {packages} \\\n \
         && rm -rf /var/lib/apt/lists/*\n"
    )
}

fn centos_packages(packages: &str) -> String {
    format!("RUN dnf install -y {packages} \\\n && dnf clean all\n")
}

const UBUNTU_CI_PACKAGES: &str =
    "build-essential ca-certificates curl libncurses-dev libreadline-dev";
const UBUNTU_DEV_PACKAGES: &str = "gdb git less unzip vim";
const CENTOS_CI_PACKAGES: &str = "gcc make ncurses-devel readline-devel tar gzip";
const CENTOS_DEV_PACKAGES: &str = "gdb git less unzip vim-enhanced";

fn ubuntu_ci(os_version: &str, runtime_version: &str) -> String {
    let mut out = header(OsFamily::Ubuntu, os_version, runtime_version);
    out.push_str(&ubuntu_packages(UBUNTU_CI_PACKAGES));
    out.push_str(INSTALL_LUA);
    out.push_str(CMD);
    out
}

fn ubuntu_dev(os_version: &str, runtime_version: &str) -> String {
    let mut out = header(OsFamily::Ubuntu, os_version, runtime_version);
    out.push_str(&ubuntu_packages(&format!(
        "{UBUNTU_CI_PACKAGES} {UBUNTU_DEV_PACKAGES}"
    )));
    out.push_str(INSTALL_LUA);
    out.push_str(&install_luarocks());
    out.push_str(CMD);
    out
}

fn centos_ci(os_version: &str, runtime_version: &str) -> String {
    let mut out = header(OsFamily::Centos, os_version, runtime_version);
    out.push_str(&centos_packages(CENTOS_CI_PACKAGES));
    out.push_str(INSTALL_LUA);
    out.push_str(CMD);
    out
}

fn centos_dev(os_version: &str, runtime_version: &str) -> String {
    let mut out = header(OsFamily::Centos, os_version, runtime_version);
    out.push_str(&centos_packages(&format!(
        "{CENTOS_CI_PACKAGES} {CENTOS_DEV_PACKAGES}"
    )));
    out.push_str(INSTALL_LUA);
    out.push_str(&install_luarocks());
    out.push_str(CMD);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_combination_has_a_template() {
        for kind in ImageKind::value_variants() {
            for family in OsFamily::value_variants() {
                let content = dockerfile(*kind, *family, "1", "5.4.7");
                assert!(content.starts_with("FROM "), "{kind} {family}");
            }
        }
    }

    #[test]
    fn ubuntu_ci_dockerfile() {
        let content = dockerfile(ImageKind::Ci, OsFamily::Ubuntu, "24.04", "5.4.7");
        assert!(content.starts_with("FROM docker.io/library/ubuntu:24.04\n"));
        assert!(content.contains("ENV LUA_VERSION=5.4.7\n"));
        assert!(content.contains("apt-get install"));
        assert!(!content.contains("luarocks"));
        assert!(content.ends_with("CMD [\"lua\"]\n"));
    }

    #[test]
    fn dev_images_add_luarocks() {
        let content = dockerfile(ImageKind::Dev, OsFamily::Centos, "stream9", "5.3.6");
        assert!(content.starts_with("FROM quay.io/centos/centos:stream9\n"));
        assert!(content.contains("dnf install -y"));
        assert!(content.contains("ENV LUAROCKS_VERSION=3.11.1\n"));
        assert!(content.contains("luarocks-${LUAROCKS_VERSION}.tar.gz"));
    }

    #[test]
    fn output_only_depends_on_inputs() {
        assert_eq!(
            dockerfile(ImageKind::Dev, OsFamily::Ubuntu, "22.04", "5.1.5"),
            dockerfile(ImageKind::Dev, OsFamily::Ubuntu, "22.04", "5.1.5"),
        );
    }

    #[test]
    fn image_names() {
        assert_eq!(ImageKind::Ci.image_name("lua"), "lua-ci");
        assert_eq!(ImageKind::Dev.image_name("lua"), "lua");
    }
}

//! The private registry images are mirrored to after the public push.

use std::{fmt, str::FromStr, sync::LazyLock};

use image_reference::{Host, ImageReference};
use log::{debug, info};
use regex::Regex;

use crate::{
    backend::Backend,
    engine::Engine,
    target::{AliasPair, BuildTarget},
    Result,
};

// <scheme>://<username>:<password>@<domain>:<port>/
static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-zA-Z][a-zA-Z0-9+.-]*://)?(?:(?<username>[^:@/]*)(?::(?<password>[^@/]*))?@)?(?<domain>[^:@/]*)(?::(?<port>[0-9]+))?/?$",
    )
    .unwrap()
});

#[derive(Debug, PartialEq, Eq)]
pub enum InvalidRegistryUrl {
    Malformed,
    Port(String),
    Domain(String),
}

impl std::error::Error for InvalidRegistryUrl {}

// Never includes the URL itself, it may contain a password.
impl fmt::Display for InvalidRegistryUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidRegistryUrl::Malformed => {
                f.write_str("invalid registry URL: expected [scheme://][user[:password]@]host[:port]")
            }
            InvalidRegistryUrl::Port(port) => {
                write!(f, "invalid registry URL: invalid port {port:?}")
            }
            InvalidRegistryUrl::Domain(domain) => {
                write!(f, "invalid registry URL: invalid host {domain:?}")
            }
        }
    }
}

/// A registry host with optional credentials. Without a host there is nothing to push to.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RegistryDestination {
    host: Option<Host>,
    username: Option<String>,
    password: Option<String>,
}

impl RegistryDestination {
    pub fn new(host: Option<Host>) -> Self {
        Self {
            host,
            username: None,
            password: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn host(&self) -> Option<&Host> {
        self.host.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Overrides the password from the URL. An explicit password wins, otherwise `read_stdin` is asked for one.
    /// `read_stdin` is not called when an explicit password is given.
    pub fn resolve_password(
        mut self,
        explicit: Option<String>,
        read_stdin: impl FnOnce() -> Result<Option<String>>,
    ) -> Result<Self> {
        let password = match explicit {
            Some(password) => Some(password),
            None => read_stdin()?,
        };
        if password.is_some() {
            self.password = password;
        }
        Ok(self)
    }

    /// Logs in when both a username and a password are known. Returns whether a login happened.
    pub fn login(&self, backend: &dyn Backend, engine: &Engine) -> Result<bool> {
        let Some(host) = &self.host else {
            return Ok(false);
        };
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                info!("logging in to {host} as {username}");
                backend.run(&engine.login(host, username, password))?;
                Ok(true)
            }
            _ => {
                debug!("no credentials for {host}, pushing without logging in");
                Ok(false)
            }
        }
    }
}

impl FromStr for RegistryDestination {
    type Err = InvalidRegistryUrl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = URL_REGEX
            .captures(s.trim())
            .ok_or(InvalidRegistryUrl::Malformed)?;

        let non_empty = |name: &str| {
            captures
                .name(name)
                .map(|m| m.as_str())
                .filter(|value| !value.is_empty())
        };

        let port = non_empty("port")
            .map(|port| {
                port.parse::<u16>()
                    .map_err(|_| InvalidRegistryUrl::Port(port.to_owned()))
            })
            .transpose()?;

        let host = non_empty("domain")
            .map(|domain| {
                Host::new(domain, port).map_err(|_| InvalidRegistryUrl::Domain(domain.to_owned()))
            })
            .transpose()?;

        Ok(Self {
            host,
            username: non_empty("username").map(str::to_owned),
            password: non_empty("password").map(str::to_owned),
        })
    }
}

impl fmt::Debug for RegistryDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryDestination")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}

/// Anything that exists as a local image once the earlier phases ran.
pub trait LocalImage {
    fn local_target(&self) -> BuildTarget;
}

impl LocalImage for BuildTarget {
    fn local_target(&self) -> BuildTarget {
        self.clone()
    }
}

impl LocalImage for AliasPair {
    fn local_target(&self) -> BuildTarget {
        self.to_target()
    }
}

/// Pairs every local image with the same reference on the registry host. Empty when there is no host.
pub fn rehome<'a, T, I>(images: I, destination: &RegistryDestination) -> Vec<AliasPair>
where
    T: LocalImage + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let Some(host) = destination.host() else {
        return Vec::new();
    };
    images
        .into_iter()
        .map(|image| {
            let source = image.local_target();
            let destination: ImageReference = source.reference().with_host(host.clone());
            AliasPair::new(source, destination)
        })
        .collect()
}

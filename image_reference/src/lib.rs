//! Image reference types based on the grammar of
//! [reference.go](https://github.com/distribution/distribution/blob/v2.7.1/reference/reference.go),
//! restricted to tagged references:
//!
//! ```txt
//! reference        := name [ ":" tag ]
//! name             := [domain '/'] path-component ['/' path-component]*
//! domain           := domain-component ['.' domain-component]* [':' port-number]
//! domain-component := /([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])/
//! port-number      := /[0-9]+/
//! path-component   := alpha-numeric [separator alpha-numeric]*
//! alpha-numeric    := /[a-z0-9]+/
//! separator        := /[_.]|__|[-]*/
//! tag              := /[\w][\w.-]{0,127}/
//! ```
//!
//! Digests are not supported. A reference without a tag refers to [`DEFAULT_TAG`].

use std::{fmt, str::FromStr, sync::LazyLock};

#[cfg(feature = "serde")]
use ::serde::{Deserialize, Deserializer, Serialize, Serializer};
use regex::Regex;

/// The tag assumed when a reference is written without one.
pub const DEFAULT_TAG: &str = "latest";

const REGISTRY_SUFFIX: char = '/';
const PORT_PREFIX: char = ':';
const TAG_PREFIX: char = ':';

// A host given on its own may be a single label. Inside a reference the first path segment is only a domain when it
// contains a dot, is `localhost` or carries a port.
const DOMAIN_PATTERN: &str =
    r"[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*";
const REFERENCE_DOMAIN_PATTERN: &str = r"(?:localhost|[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)+)";
const PATH_PATTERN: &str =
    r"[a-z0-9]+(?:(?:[_.]|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:[_.]|__|-+)[a-z0-9]+)*)*";
const TAG_PATTERN: &str = r"[\w][\w.-]{0,127}";

fn anchored(pattern: &str) -> Regex {
    // The patterns are constants, compilation can only fail while developing this module.
    Regex::new(&format!("^(?:{pattern})$")).unwrap()
}

static REFERENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?:(?:(?P<domain>{REFERENCE_DOMAIN_PATTERN})(?::(?P<port>[0-9]+))?|(?P<label>{DOMAIN_PATTERN}):(?P<label_port>[0-9]+))/)?(?P<path>{PATH_PATTERN})(?::(?P<tag>{TAG_PATTERN}))?$"
    ))
    .unwrap()
});

static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| anchored(DOMAIN_PATTERN));
static PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| anchored(PATH_PATTERN));
static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| anchored(TAG_PATTERN));

/// Returns true if `value` is a valid registry domain without a port.
pub fn is_valid_domain(value: &str) -> bool {
    DOMAIN_REGEX.is_match(value)
}

/// Returns true if `value` is a valid slash-separated repository path.
pub fn is_valid_repository(value: &str) -> bool {
    PATH_REGEX.is_match(value)
}

/// Returns true if `value` is a valid tag.
pub fn is_valid_tag(value: &str) -> bool {
    TAG_REGEX.is_match(value)
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidImageReference(String);

impl std::error::Error for InvalidImageReference {}

impl fmt::Display for InvalidImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid image reference: {:?}", self.0)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidHost(String);

impl std::error::Error for InvalidHost {}

impl fmt::Display for InvalidHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid registry host: {:?}", self.0)
    }
}

/// A registry host written as `<domain>(:<port>)?`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Host {
    domain: String,
    port: Option<u16>,
}

impl Host {
    pub fn new(domain: impl Into<String>, port: Option<u16>) -> Result<Self, InvalidHost> {
        let domain = domain.into();
        if !is_valid_domain(&domain) {
            return Err(InvalidHost(domain));
        }
        Ok(Self { domain, port })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

impl FromStr for Host {
    type Err = InvalidHost;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(PORT_PREFIX) {
            Some((domain, port)) => {
                let port = port.parse().map_err(|_| InvalidHost(s.to_owned()))?;
                Self::new(domain, Some(port)).map_err(|_| InvalidHost(s.to_owned()))
            }
            None => Self::new(s, None),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.domain)?;
        if let Some(port) = self.port {
            write!(f, "{PORT_PREFIX}{port}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Identifies a container image. The reference is written as:
/// ```txt
/// <domain>:<port>/<repository>:<tag>
/// <host--------->/<repository>:<tag>
/// ```
/// Only `<repository>` is required when parsing; a missing `<tag>` becomes [`DEFAULT_TAG`].
///
/// References are values: the `with_*` methods return a new reference and leave `self` untouched.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageReference {
    host: Option<Host>,
    repository: String,
    tag: String,
}

impl ImageReference {
    pub fn new(
        host: Option<Host>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Result<Self, InvalidImageReference> {
        let repository = repository.into();
        let tag = tag.into();
        if !is_valid_repository(&repository) || !is_valid_tag(&tag) {
            let mut value = String::new();
            if let Some(host) = &host {
                value.push_str(&host.to_string());
                value.push(REGISTRY_SUFFIX);
            }
            value.push_str(&repository);
            value.push(TAG_PREFIX);
            value.push_str(&tag);
            return Err(InvalidImageReference(value));
        }
        Ok(Self {
            host,
            repository,
            tag,
        })
    }

    pub fn host(&self) -> Option<&Host> {
        self.host.as_ref()
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns a copy of this reference with `tag` replacing the current tag.
    ///
    /// The tag must match the tag grammar, see [`is_valid_tag`].
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        debug_assert!(is_valid_tag(&tag), "invalid tag {tag:?}");
        Self {
            host: self.host.clone(),
            repository: self.repository.clone(),
            tag,
        }
    }

    /// Returns a copy of this reference with `repository` replacing the current repository.
    ///
    /// The repository must match the path grammar, see [`is_valid_repository`].
    pub fn with_repository(&self, repository: impl Into<String>) -> Self {
        let repository = repository.into();
        debug_assert!(
            is_valid_repository(&repository),
            "invalid repository {repository:?}"
        );
        Self {
            host: self.host.clone(),
            repository,
            tag: self.tag.clone(),
        }
    }

    /// Returns a copy of this reference that lives on `host`.
    pub fn with_host(&self, host: Host) -> Self {
        Self {
            host: Some(host),
            repository: self.repository.clone(),
            tag: self.tag.clone(),
        }
    }

    /// Returns a copy of this reference without a registry host.
    pub fn without_host(&self) -> Self {
        Self {
            host: None,
            repository: self.repository.clone(),
            tag: self.tag.clone(),
        }
    }
}

impl FromStr for ImageReference {
    type Err = InvalidImageReference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidImageReference(s.to_owned());

        let captures = REFERENCE_REGEX.captures(s).ok_or_else(invalid)?;
        let host = match captures.name("domain").or_else(|| captures.name("label")) {
            Some(domain) => {
                let port = captures
                    .name("port")
                    .or_else(|| captures.name("label_port"))
                    .map(|port| port.as_str().parse::<u16>())
                    .transpose()
                    .map_err(|_| invalid())?;
                Some(Host {
                    domain: domain.as_str().to_owned(),
                    port,
                })
            }
            None => None,
        };
        let repository = captures.name("path").ok_or_else(invalid)?.as_str();
        let tag = captures
            .name("tag")
            .map_or(DEFAULT_TAG, |tag| tag.as_str());

        Ok(Self {
            host,
            repository: repository.to_owned(),
            tag: tag.to_owned(),
        })
    }
}

impl TryFrom<String> for ImageReference {
    type Error = InvalidImageReference;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = &self.host {
            write!(f, "{host}{REGISTRY_SUFFIX}")?;
        }
        write!(f, "{}{TAG_PREFIX}{}", self.repository, self.tag)
    }
}

impl fmt::Debug for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl From<ImageReference> for String {
    fn from(value: ImageReference) -> Self {
        value.to_string()
    }
}

#[cfg(feature = "serde")]
impl Serialize for ImageReference {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for ImageReference {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: String = Deserialize::deserialize(deserializer)?;
        value.parse().map_err(::serde::de::Error::custom)
    }
}

#[cfg(feature = "serde")]
impl Serialize for Host {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Host {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: String = Deserialize::deserialize(deserializer)?;
        value.parse().map_err(::serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn image_reference_parsing_works() {
        {
            let reference: ImageReference = "org-name/img-name".parse().unwrap();
            assert_eq!(reference.host(), None);
            assert_eq!(reference.repository(), "org-name/img-name");
            assert_eq!(reference.tag(), "latest");
        }

        {
            let reference: ImageReference = "reg.io/org-name/ubuntu24.04/img-name:5.4.6"
                .parse()
                .unwrap();
            assert_eq!(reference.host().map(Host::domain), Some("reg.io"));
            assert_eq!(reference.host().and_then(Host::port), None);
            assert_eq!(reference.repository(), "org-name/ubuntu24.04/img-name");
            assert_eq!(reference.tag(), "5.4.6");
        }

        {
            let reference: ImageReference = "reg.io:12345/org-name/img-name:latest".parse().unwrap();
            assert_eq!(reference.host().map(Host::domain), Some("reg.io"));
            assert_eq!(reference.host().and_then(Host::port), Some(12345));
            assert_eq!(reference.repository(), "org-name/img-name");
        }

        {
            let reference: ImageReference = "localhost:5000/img-name:1".parse().unwrap();
            assert_eq!(reference.host().map(Host::domain), Some("localhost"));
            assert_eq!(reference.host().and_then(Host::port), Some(5000));
        }

        {
            assert!(".".parse::<ImageReference>().is_err());
            assert!("Upper/case".parse::<ImageReference>().is_err());
            assert!("reg.io:99999/a:b".parse::<ImageReference>().is_err());
            assert!("a:".parse::<ImageReference>().is_err());
        }
    }

    #[test]
    fn image_reference_display_works() {
        let host = Host::new("registry.example.com", Some(5000)).unwrap();
        let reference = ImageReference::new(Some(host), "repo/name", "5.5").unwrap();
        assert_eq!(
            reference.to_string(),
            "registry.example.com:5000/repo/name:5.5"
        );
        assert_eq!(
            reference.to_string().parse::<ImageReference>().unwrap(),
            reference
        );
    }

    #[test]
    fn single_label_hosts_with_a_port_parse_back() {
        let host: Host = "myregistry:5000".parse().unwrap();
        let reference = ImageReference::new(Some(host.clone()), "repo/name", "5.5").unwrap();
        assert_eq!(reference.to_string(), "myregistry:5000/repo/name:5.5");

        let parsed: ImageReference = reference.to_string().parse().unwrap();
        assert_eq!(parsed, reference);
        assert_eq!(parsed.host(), Some(&host));

        #[cfg(feature = "serde")]
        {
            let json = serde_json::to_string(&reference).unwrap();
            assert_eq!(serde_json::from_str::<ImageReference>(&json).unwrap(), reference);
        }

        // Without a port the first segment stays part of the repository.
        let reference: ImageReference = "myregistry/repo/name:5.5".parse().unwrap();
        assert_eq!(reference.host(), None);
        assert_eq!(reference.repository(), "myregistry/repo/name");
    }

    #[test]
    fn derivations_leave_the_source_untouched() {
        let reference: ImageReference = "repo/name:5.5.2".parse().unwrap();
        let retagged = reference.with_tag("5.5");
        let rehomed = retagged.with_host("reg.io".parse().unwrap());

        assert_eq!(reference.to_string(), "repo/name:5.5.2");
        assert_eq!(retagged.to_string(), "repo/name:5.5");
        assert_eq!(rehomed.to_string(), "reg.io/repo/name:5.5");
        assert_eq!(rehomed.without_host(), retagged);
        assert_eq!(
            reference.with_repository("repo/other").to_string(),
            "repo/other:5.5.2"
        );
    }

    #[test]
    fn equal_references_are_equal_map_keys() {
        let mut map = HashMap::new();
        map.insert(
            "repo/os20/image:5.5.2".parse::<ImageReference>().unwrap(),
            "repo/image:5.5.2".parse::<ImageReference>().unwrap(),
        );
        let key = ImageReference::new(None, "repo/os20/image", "5.5.2").unwrap();
        assert_eq!(map[&key].to_string(), "repo/image:5.5.2");
        assert!(!map.contains_key(&key.with_host("reg.io".parse().unwrap())));
    }

    #[test]
    fn host_parsing_works() {
        assert_eq!(
            "registry.example.com:5000".parse::<Host>().unwrap(),
            Host::new("registry.example.com", Some(5000)).unwrap()
        );
        assert_eq!("reg.io".parse::<Host>().unwrap().port(), None);
        assert!("".parse::<Host>().is_err());
        assert!("reg.io:port".parse::<Host>().is_err());
        assert!(Host::new("-bad.io", None).is_err());
        assert_eq!(
            "myregistry:5000".parse::<Host>().unwrap().to_string(),
            "myregistry:5000"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn image_reference_serde_works() {
        let des: ImageReference = "reg.io/org-name/img-name:1.2".parse().unwrap();
        let ser = r#""reg.io/org-name/img-name:1.2""#;
        assert_eq!(serde_json::to_string(&des).unwrap(), ser);
        assert_eq!(serde_json::from_str::<ImageReference>(ser).unwrap(), des);
        assert!(serde_json::from_str::<ImageReference>(r#""NOPE""#).is_err());
    }
}

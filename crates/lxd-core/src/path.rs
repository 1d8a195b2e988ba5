//! Immutable REST resource paths.
//!
//! An [`ApiPath`] is rooted at the daemon origin plus the `/1.0` API prefix. Appending a
//! segment never touches the receiver; it returns a new value, so a root path can be shared
//! freely between concurrent calls.

use std::fmt;
use std::hash::{Hash, Hasher};

use url::Url;

use crate::error::{Error, Result};

/// API version prefix appended to every root path.
pub const API_VERSION_PREFIX: &str = "/1.0";

/// A rendered LXD API path.
#[derive(Debug, Clone)]
pub struct ApiPath {
    rendered: String,
    origin_len: usize,
}

impl ApiPath {
    /// Builds the root path for a daemon base URL.
    ///
    /// The URL must use an `http` or `https` scheme. A trailing `/` is dropped and the
    /// `/1.0` prefix is appended unless already present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if the base URL has another scheme, carries a query or
    /// fragment, or does not parse.
    pub fn root(base_url: impl AsRef<str>) -> Result<Self> {
        let base = base_url.as_ref().trim();
        if !base.starts_with("http") {
            return Err(Error::InvalidPath(format!(
                "base URL must start with http: {base}"
            )));
        }

        let parsed = Url::parse(base)
            .map_err(|err| Error::InvalidPath(format!("invalid base URL `{base}`: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidPath(format!(
                "unsupported scheme `{}` in {base}",
                parsed.scheme()
            )));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(Error::InvalidPath(format!(
                "base URL must not carry a query or fragment: {base}"
            )));
        }

        let trimmed = base.trim_end_matches('/');
        let origin = trimmed
            .strip_suffix(API_VERSION_PREFIX)
            .unwrap_or(trimmed);

        Ok(Self {
            rendered: format!("{origin}{API_VERSION_PREFIX}"),
            origin_len: origin.len(),
        })
    }

    /// Returns a new path with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        Self {
            rendered: format!("{}/{}", self.rendered, segment.as_ref()),
            origin_len: self.origin_len,
        }
    }

    /// Resolves a reference returned by the daemon against this path's origin.
    ///
    /// References starting with `/` (such as `/1.0/operations/<id>`) are absolute on the
    /// daemon; anything else is appended as a child segment.
    #[must_use]
    pub fn resolve(&self, reference: impl AsRef<str>) -> Self {
        let reference = reference.as_ref();
        if reference.starts_with('/') {
            Self {
                rendered: format!("{}{reference}", self.origin()),
                origin_len: self.origin_len,
            }
        } else {
            self.child(reference)
        }
    }

    /// Returns the fully joined URL string.
    #[must_use]
    pub fn render(&self) -> &str {
        &self.rendered
    }

    /// Returns the scheme, host and port portion.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.rendered[..self.origin_len]
    }

    /// Returns the daemon-relative part, e.g. `/1.0/instances/web`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.rendered[self.origin_len..]
    }

    /// Parses the rendered path as a [`Url`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if a segment produced an unparseable URL.
    pub fn to_url(&self) -> Result<Url> {
        Url::parse(&self.rendered)
            .map_err(|err| Error::InvalidPath(format!("invalid path `{}`: {err}", self.rendered)))
    }
}

impl PartialEq for ApiPath {
    fn eq(&self, other: &Self) -> bool {
        self.rendered == other.rendered
    }
}

impl Eq for ApiPath {}

impl Hash for ApiPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rendered.hash(state);
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl AsRef<str> for ApiPath {
    fn as_ref(&self) -> &str {
        &self.rendered
    }
}

impl From<ApiPath> for String {
    fn from(value: ApiPath) -> Self {
        value.rendered
    }
}

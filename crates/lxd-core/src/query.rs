//! Convenience builder for HTTP query parameters.
//!
//! Parameters are merged into a URL's existing query string: a key that is already present
//! takes the new value in place, new keys are appended.

use std::fmt::Display;

use url::Url;

/// Query key selecting embedded objects instead of references on list endpoints.
pub const RECURSION: &str = "recursion";

/// Query key scoping a request to an LXD project.
pub const PROJECT: &str = "project";

/// Builder for assembling query parameter pairs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Shorthand for a builder holding only the `recursion` flag.
    #[must_use]
    pub fn recursion(enabled: bool) -> Self {
        let mut params = Self::new();
        params.push_recursion(Some(enabled));
        params
    }

    /// Append a key/value pair when the value is present.
    pub fn push_opt<T>(&mut self, key: &'static str, value: Option<T>)
    where
        T: Display,
    {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    /// Append using a mapping function when the value is present.
    pub fn push_opt_with<T, F>(&mut self, key: &'static str, value: Option<T>, mut map: F)
    where
        F: FnMut(T) -> String,
    {
        if let Some(value) = value {
            self.pairs.push((key, map(value)));
        }
    }

    /// Append a required key/value pair.
    pub fn push<T>(&mut self, key: &'static str, value: T)
    where
        T: Display,
    {
        self.pairs.push((key, value.to_string()));
    }

    /// Append the `recursion` flag as `"1"`/`"0"` when set.
    pub fn push_recursion(&mut self, recursion: Option<bool>) {
        self.push_opt_with(RECURSION, recursion, |enabled| {
            String::from(if enabled { "1" } else { "0" })
        });
    }

    /// Returns true if no parameters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Merge the parameters into the query string of `url`.
    ///
    /// Existing keys keep their position and take the later value; a key repeated inside
    /// this builder resolves to its last value.
    pub fn apply_to(&self, url: &mut Url) {
        if self.pairs.is_empty() {
            return;
        }

        let mut merged: Vec<(String, String)> = Vec::new();
        let existing = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()));
        let added = self
            .pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()));

        for (key, value) in existing.chain(added) {
            match merged.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => merged.push((key, value)),
            }
        }

        url.query_pairs_mut().clear().extend_pairs(merged);
    }
}

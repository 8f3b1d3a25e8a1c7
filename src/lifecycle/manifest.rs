//! Precache manifest

use crate::error::StowawayResult;
use crate::request::{resolve, RequestKey};
use url::Url;

/// Ordered, de-duplicated set of resources installed as one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheManifest {
    entries: Vec<Url>,
}

impl PrecacheManifest {
    /// Build a manifest from absolute URLs, dropping repeats
    pub fn new(urls: impl IntoIterator<Item = Url>) -> Self {
        let mut entries: Vec<Url> = Vec::new();
        for mut url in urls {
            url.set_fragment(None);
            if !entries.contains(&url) {
                entries.push(url);
            }
        }
        Self { entries }
    }

    /// Resolve manifest references against the worker origin
    pub fn resolve(origin: &Url, references: &[String]) -> StowawayResult<Self> {
        let urls = references
            .iter()
            .map(|reference| resolve(origin, reference))
            .collect::<StowawayResult<Vec<_>>>()?;
        Ok(Self::new(urls))
    }

    /// Entries in declaration order
    pub fn entries(&self) -> &[Url] {
        &self.entries
    }

    /// Cache identities of every entry
    pub fn keys(&self) -> impl Iterator<Item = RequestKey> + '_ {
        self.entries.iter().map(RequestKey::get)
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.entries.contains(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

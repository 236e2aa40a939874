//! The lookup contract shared by every backing store, and the
//! "search everywhere" strategy built on top of it.

use crate::db::TextPattern;
use crate::error::{Result, YawlError};
use crate::models::{PartOfSpeech, Synset, SynsetCollection, SynsetId};
use log::debug;

/// Filters applied by the lemma, definition and example searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub pos: Option<PartOfSpeech>,
    pub ignore_case: bool,
    /// Language code for multilingual stores; `None` means the store default.
    pub lang: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            pos: None,
            ignore_case: true,
            lang: None,
        }
    }
}

impl SearchOptions {
    pub fn with_pos(mut self, pos: Option<PartOfSpeech>) -> Self {
        self.pos = pos;
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.ignore_case = false;
        self
    }

    pub fn with_lang(mut self, lang: Option<&str>) -> Self {
        self.lang = lang.map(str::to_string);
        self
    }
}

/// Read access to a WordNet-family store.
///
/// Single lookups fail with `NotFound` when the parent row is missing. Batch
/// lookups and searches skip misses and return a possibly empty collection.
/// Capabilities a store cannot provide fail with `FeatureNotSupported`.
pub trait Wordnet {
    /// Short store name used in logs and CLI output.
    fn name(&self) -> &'static str;

    fn get_synset(&self, id: &SynsetId, lang: Option<&str>) -> Result<Synset>;

    fn get_synsets(&self, ids: &[SynsetId], lang: Option<&str>) -> Result<SynsetCollection> {
        let mut synsets = SynsetCollection::new();
        for id in ids {
            match self.get_synset(id, lang) {
                Ok(synset) => {
                    synsets.add(synset);
                }
                Err(e) if e.is_not_found() => debug!("{}: skipping missing synset {}", self.name(), id),
                Err(e) => return Err(e),
            }
        }
        Ok(synsets)
    }

    fn get_by_key(&self, sensekey: &str) -> Result<Synset>;

    fn get_by_keys(&self, sensekeys: &[&str]) -> Result<SynsetCollection>;

    fn search(&self, lemma: &str, options: &SearchOptions) -> Result<SynsetCollection>;

    fn search_def(&self, pattern: &str, options: &SearchOptions) -> Result<SynsetCollection>;

    fn search_ex(&self, pattern: &str, options: &SearchOptions) -> Result<SynsetCollection>;

    fn hypernyms(&self, id: &SynsetId, lang: Option<&str>) -> Result<SynsetCollection>;

    fn hyponyms(&self, id: &SynsetId, lang: Option<&str>) -> Result<SynsetCollection>;

    fn hypehypo(&self, id: &SynsetId, lang: Option<&str>) -> Result<SynsetCollection>;
}

/// Resolves `query` as an id, then as a sense key, then as a text search.
///
/// Each step runs only when the previous one found nothing: a query that is a
/// valid synset id is never treated as a lemma. The text search wraps the
/// query in `%…%` unless it already has a wildcard and returns the union of
/// lemma, definition and example matches in that order.
pub fn smart_search<W: Wordnet + ?Sized>(wn: &W, query: &str, options: &SearchOptions) -> Result<SynsetCollection> {
    let lang = options.lang.as_deref();

    match SynsetId::parse(query) {
        Ok(id) => match wn.get_synset(&id, lang) {
            Ok(synset) => return Ok(std::iter::once(synset).collect()),
            Err(e) if e.is_not_found() => debug!("{}: {} is not a known synset", wn.name(), id),
            Err(e) => return Err(e),
        },
        Err(YawlError::InvalidIdentifierFormat(_) | YawlError::InvalidPartOfSpeech(_) | YawlError::NullIdentifier) => {}
        Err(e) => return Err(e),
    }

    match wn.get_by_key(query) {
        Ok(synset) => return Ok(std::iter::once(synset).collect()),
        Err(e) if e.is_not_found() || e.is_not_supported() => {
            debug!("{}: no sense key lookup for `{}': {}", wn.name(), query, e)
        }
        Err(e) => return Err(e),
    }

    let pattern = TextPattern::substring(query);
    let mut synsets = wn.search(pattern.as_str(), options)?;
    synsets.merge(wn.search_def(pattern.as_str(), options)?);
    synsets.merge(wn.search_ex(pattern.as_str(), options)?);
    Ok(synsets)
}

//! Princeton WordNet 3.0 SQL dump (`sqlite-30.db`).
//!
//! Synset ids are stored as integers: POS digit followed by the 8-digit offset.

use crate::db::{DataSource, TextPattern, placeholders};
use crate::error::{Result, YawlError};
use crate::models::{PartOfSpeech, Synset, SynsetCollection, SynsetId};
use crate::search::{SearchOptions, Wordnet};
use dashmap::DashMap;
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::Path;

/// Tables read by [`WordnetSql`].
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS synsets (
    synsetid INTEGER PRIMARY KEY,
    pos TEXT NOT NULL,
    lexdomainid INTEGER,
    definition TEXT
);
CREATE TABLE IF NOT EXISTS words (
    wordid INTEGER PRIMARY KEY,
    lemma TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS senses (
    wordid INTEGER NOT NULL,
    casedwordid INTEGER,
    synsetid INTEGER NOT NULL,
    senseid INTEGER,
    sensenum INTEGER,
    lexid INTEGER,
    tagcount INTEGER,
    sensekey TEXT
);
CREATE TABLE IF NOT EXISTS samples (
    synsetid INTEGER NOT NULL,
    sampleid INTEGER NOT NULL,
    sample TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS semlinks (
    synset1id INTEGER NOT NULL,
    synset2id INTEGER NOT NULL,
    linkid INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_senses_synsetid ON senses (synsetid);
CREATE INDEX IF NOT EXISTS idx_senses_wordid ON senses (wordid);
CREATE INDEX IF NOT EXISTS idx_semlinks_synset1id ON semlinks (synset1id);
";

// semlinks.linkid values
const HYPERNYM_LINKS: &str = "1, 3";
const HYPONYM_LINKS: &str = "2, 4";
const HYPEHYPO_LINKS: &str = "1, 2, 3, 4, 11, 12, 13, 14, 15, 16, 40, 50, 81";

/// Creates the tables [`WordnetSql`] reads. Used to build fixture databases.
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Integer key used by the `synsetid` columns.
pub fn native_key(id: &SynsetId) -> i64 {
    let digit = id.pos().digit().to_digit(10).unwrap_or_default() as i64;
    digit * 100_000_000 + id.offset() as i64
}

/// One row of sense information, cached by sense key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenseInfo {
    pub synsetid: SynsetId,
    pub sensekey: String,
    pub pos: PartOfSpeech,
    pub tagcount: u32,
}

/// Tag-count, sense-key and hierarchy caches owned by one store instance.
///
/// Filled lazily on first access or all at once by [`WordnetSql::warm_cache`].
/// There is no eviction.
#[derive(Debug, Default)]
pub struct SenseCache {
    tagcounts: DashMap<SynsetId, u32>,
    senses: DashMap<String, SenseInfo>,
    hypehypo: DashMap<SynsetId, Vec<SynsetId>>,
}

impl SenseCache {
    pub fn tagcount_entries(&self) -> usize {
        self.tagcounts.len()
    }

    pub fn sense_entries(&self) -> usize {
        self.senses.len()
    }

    pub fn clear(&self) {
        self.tagcounts.clear();
        self.senses.clear();
        self.hypehypo.clear();
    }
}

pub struct WordnetSql {
    source: DataSource,
    cache: SenseCache,
}

impl WordnetSql {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        WordnetSql {
            source: DataSource::read_only(db_path),
            cache: SenseCache::default(),
        }
    }

    pub fn path(&self) -> &Path {
        self.source.path()
    }

    pub fn cache(&self) -> &SenseCache {
        &self.cache
    }

    /// Synset id for a sense key (case-insensitive).
    pub fn sk2sid(&self, sensekey: &str) -> Result<SynsetId> {
        let conn = self.source.open()?;
        fetch_sid_by_key(&conn, sensekey)
    }

    /// Sum of the sense tag counts of a synset.
    pub fn get_tagcount(&self, id: &SynsetId) -> Result<u32> {
        if let Some(count) = self.cache.tagcounts.get(id) {
            return Ok(*count);
        }
        let conn = self.source.open()?;
        let count: Option<i64> = conn.query_row(
            "SELECT SUM(tagcount) FROM senses WHERE synsetid = ?1",
            params![native_key(id)],
            |row| row.get(0),
        )?;
        let count = clamp_count(count.unwrap_or_default());
        self.cache.tagcounts.insert(*id, count);
        Ok(count)
    }

    /// Synset, POS and tag count of a sense key, compared case-insensitively.
    pub fn sense_info(&self, sensekey: &str) -> Result<SenseInfo> {
        let cache_key = sensekey.to_lowercase();
        if let Some(info) = self.cache.senses.get(&cache_key) {
            return Ok(info.value().clone());
        }
        let conn = self.source.open()?;
        let info = conn
            .query_row(
                "SELECT s.synsetid, s.sensekey, sy.pos, s.tagcount
                 FROM senses s JOIN synsets sy ON sy.synsetid = s.synsetid
                 WHERE lower(s.sensekey) = ?1",
                params![cache_key],
                row_to_sense_info,
            )
            .optional()?
            .ok_or_else(|| YawlError::NotFound(format!("sense key {}", sensekey)))?;
        self.cache.senses.insert(cache_key, info.clone());
        Ok(info)
    }

    /// Loads every tag count and sense row into the cache. Returns the number of senses cached.
    pub fn warm_cache(&self) -> Result<usize> {
        let conn = self.source.open()?;
        let mut stmt = conn.prepare("SELECT synsetid, SUM(tagcount) FROM senses GROUP BY synsetid")?;
        let counts = stmt.query_map([], |row| {
            Ok((row.get::<_, SynsetId>(0)?, clamp_count(row.get::<_, Option<i64>>(1)?.unwrap_or_default())))
        })?;
        for entry in counts {
            let (id, count) = entry?;
            self.cache.tagcounts.insert(id, count);
        }

        let mut stmt = conn.prepare(
            "SELECT s.synsetid, s.sensekey, sy.pos, s.tagcount
             FROM senses s JOIN synsets sy ON sy.synsetid = s.synsetid
             WHERE s.sensekey IS NOT NULL",
        )?;
        let senses = stmt.query_map([], row_to_sense_info)?;
        for info in senses {
            let info = info?;
            self.cache.senses.insert(info.sensekey.to_lowercase(), info);
        }
        info!(
            "Warmed WordNet SQL cache: {} tag counts, {} senses",
            self.cache.tagcount_entries(),
            self.cache.sense_entries()
        );
        Ok(self.cache.sense_entries())
    }

    fn linked(&self, id: &SynsetId, links: &str) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        ensure_exists(&conn, id)?;
        let ids = fetch_linked_ids(&conn, id, links)?;
        fetch_synsets(&conn, &ids)
    }
}

/// Tag counts are stored as signed sums; negative or oversized values are clamped.
fn clamp_count(count: i64) -> u32 {
    u32::try_from(count.max(0)).unwrap_or(u32::MAX)
}

fn row_to_sense_info(row: &rusqlite::Row<'_>) -> rusqlite::Result<SenseInfo> {
    Ok(SenseInfo {
        synsetid: row.get(0)?,
        sensekey: row.get(1)?,
        pos: row.get(2)?,
        tagcount: clamp_count(row.get::<_, Option<i64>>(3)?.unwrap_or_default()),
    })
}

fn ensure_exists(conn: &Connection, id: &SynsetId) -> Result<()> {
    conn.query_row("SELECT 1 FROM synsets WHERE synsetid = ?1", params![native_key(id)], |_| Ok(()))
        .optional()?
        .ok_or_else(|| YawlError::NotFound(id.to_string()))
}

fn fetch_synset(conn: &Connection, id: &SynsetId) -> Result<Synset> {
    let sid = native_key(id);
    let definition: Option<String> = conn
        .query_row("SELECT definition FROM synsets WHERE synsetid = ?1", params![sid], |row| row.get(0))
        .optional()?
        .ok_or_else(|| YawlError::NotFound(id.to_string()))?;

    let mut synset = Synset::new(*id);
    if let Some(definition) = definition.filter(|d| !d.is_empty()) {
        synset.set_definition(&definition);
    }

    let mut stmt = conn.prepare(
        "SELECT w.lemma, s.sensekey, s.tagcount
         FROM senses s JOIN words w ON w.wordid = s.wordid
         WHERE s.synsetid = ?1
         ORDER BY s.rowid",
    )?;
    let rows = stmt.query_map(params![sid], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<i64>>(2)?,
        ))
    })?;
    for row in rows {
        let (lemma, sensekey, tagcount) = row?;
        synset.add_lemma(&lemma);
        if let Some(sk) = sensekey {
            synset.add_key(&sk);
        }
        synset.tagcount = synset.tagcount.saturating_add(clamp_count(tagcount.unwrap_or_default()));
    }

    let mut stmt = conn.prepare("SELECT sample FROM samples WHERE synsetid = ?1 ORDER BY sampleid")?;
    let samples = stmt.query_map(params![sid], |row| row.get::<_, String>(0))?;
    for sample in samples {
        synset.add_example(&sample?);
    }
    Ok(synset)
}

fn fetch_synsets(conn: &Connection, ids: &[SynsetId]) -> Result<SynsetCollection> {
    let mut synsets = SynsetCollection::new();
    for id in ids {
        if synsets.contains(id) {
            continue;
        }
        match fetch_synset(conn, id) {
            Ok(synset) => {
                synsets.add(synset);
            }
            Err(e) if e.is_not_found() => debug!("wnsql: skipping missing synset {}", id),
            Err(e) => return Err(e),
        }
    }
    Ok(synsets)
}

fn fetch_sid_by_key(conn: &Connection, sensekey: &str) -> Result<SynsetId> {
    let mut stmt = conn.prepare("SELECT DISTINCT synsetid FROM senses WHERE lower(sensekey) = ?1")?;
    let ids = stmt
        .query_map(params![sensekey.to_lowercase()], |row| row.get::<_, SynsetId>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    match ids.as_slice() {
        [] => Err(YawlError::NotFound(format!("sense key {}", sensekey))),
        [id] => Ok(*id),
        _ => Err(YawlError::AmbiguousKey {
            key: sensekey.to_string(),
            count: ids.len(),
        }),
    }
}

fn fetch_linked_ids(conn: &Connection, id: &SynsetId, links: &str) -> Result<Vec<SynsetId>> {
    let sql = format!(
        "SELECT synset2id FROM semlinks WHERE synset1id = ?1 AND linkid IN ({})",
        links
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params![native_key(id)], |row| row.get::<_, SynsetId>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Runs `sql` (selecting synset ids) and assembles the matching synsets.
fn query_synsets(conn: &Connection, sql: &str, values: &[String]) -> Result<SynsetCollection> {
    debug!("wnsql query: {} {:?}", sql, values);
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params_from_iter(values.iter()), |row| row.get::<_, SynsetId>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    fetch_synsets(conn, &ids)
}

/// POS restriction on a `synsetid` column. Adjectives include satellites.
fn pos_filter(pos: Option<PartOfSpeech>, values: &mut Vec<String>) -> String {
    match pos {
        None => String::new(),
        Some(PartOfSpeech::A) => " AND synsetid IN (SELECT synsetid FROM synsets WHERE pos IN ('a', 's'))".to_string(),
        Some(pos) => {
            values.push(pos.letter().to_string());
            " AND synsetid IN (SELECT synsetid FROM synsets WHERE pos = ?)".to_string()
        }
    }
}

impl Wordnet for WordnetSql {
    fn name(&self) -> &'static str {
        "wnsql"
    }

    fn get_synset(&self, id: &SynsetId, _lang: Option<&str>) -> Result<Synset> {
        let conn = self.source.open()?;
        let synset = fetch_synset(&conn, id)?;
        self.cache.tagcounts.insert(*id, synset.tagcount);
        Ok(synset)
    }

    fn get_synsets(&self, ids: &[SynsetId], _lang: Option<&str>) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        fetch_synsets(&conn, ids)
    }

    fn get_by_key(&self, sensekey: &str) -> Result<Synset> {
        let conn = self.source.open()?;
        let id = fetch_sid_by_key(&conn, sensekey)?;
        fetch_synset(&conn, &id)
    }

    fn get_by_keys(&self, sensekeys: &[&str]) -> Result<SynsetCollection> {
        if sensekeys.is_empty() {
            return Ok(SynsetCollection::new());
        }
        let conn = self.source.open()?;
        let sql = format!(
            "SELECT DISTINCT synsetid FROM senses WHERE lower(sensekey) IN ({})",
            placeholders(sensekeys.len())
        );
        let values: Vec<String> = sensekeys.iter().map(|k| k.to_lowercase()).collect();
        query_synsets(&conn, &sql, &values)
    }

    fn search(&self, lemma: &str, options: &SearchOptions) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        let (cond, value) = TextPattern::new(lemma).condition("lemma", options.ignore_case);
        let mut values = vec![value];
        let sql = format!(
            "SELECT synsetid FROM senses WHERE wordid IN (SELECT wordid FROM words WHERE {}){}",
            cond,
            pos_filter(options.pos, &mut values)
        );
        query_synsets(&conn, &sql, &values)
    }

    fn search_def(&self, pattern: &str, options: &SearchOptions) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        let (cond, value) = TextPattern::new(pattern).condition("definition", options.ignore_case);
        let mut values = vec![value];
        let sql = format!("SELECT synsetid FROM synsets WHERE {}{}", cond, pos_filter(options.pos, &mut values));
        query_synsets(&conn, &sql, &values)
    }

    fn search_ex(&self, pattern: &str, options: &SearchOptions) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        let (cond, value) = TextPattern::new(pattern).condition("sample", options.ignore_case);
        let mut values = vec![value];
        let sql = format!(
            "SELECT synsetid FROM samples WHERE {}{} ORDER BY synsetid, sampleid",
            cond,
            pos_filter(options.pos, &mut values)
        );
        query_synsets(&conn, &sql, &values)
    }

    fn hypernyms(&self, id: &SynsetId, _lang: Option<&str>) -> Result<SynsetCollection> {
        self.linked(id, HYPERNYM_LINKS)
    }

    fn hyponyms(&self, id: &SynsetId, _lang: Option<&str>) -> Result<SynsetCollection> {
        self.linked(id, HYPONYM_LINKS)
    }

    /// Hypernyms, hyponyms and the related links (instances, meronyms, ...). Link ids are cached.
    fn hypehypo(&self, id: &SynsetId, _lang: Option<&str>) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        let cached = self.cache.hypehypo.get(id).map(|ids| ids.value().clone());
        let ids = match cached {
            Some(ids) => ids,
            None => {
                ensure_exists(&conn, id)?;
                let ids = fetch_linked_ids(&conn, id, HYPEHYPO_LINKS)?;
                self.cache.hypehypo.insert(*id, ids.clone());
                ids
            }
        };
        fetch_synsets(&conn, &ids)
    }
}

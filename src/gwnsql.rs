//! Gloss WordNet store: the Princeton Gloss Corpus imported into SQLite.
//!
//! Synsets are keyed by the letter-prefixed id (`r00001740`). Besides
//! lemmas and sense keys the store keeps every gloss segment with its tokens
//! and sense tags, so a fetched synset always carries a gloss annotation.

use crate::config::ImportOptions;
use crate::db::{DataSource, TextPattern, ensure_schema_version, placeholders, table_row_count};
use crate::error::{Result, YawlError};
use crate::gloss::{Gloss, GlossAnnotation, GlossCategory, GlossItem, RawGlossCategory, SenseTag, TagKind};
use crate::models::{PartOfSpeech, Synset, SynsetCollection, SynsetId};
use crate::parse::{ParseOptions, read_gloss_files};
use crate::progress::{ProgressCallback, ProgressUpdate};
use crate::search::{SearchOptions, Wordnet};
use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Instant;

// --- Schema Definition ---

const SCHEMA_VERSION: u32 = 1;

const CREATE_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS meta (
    title TEXT,
    license TEXT,
    WNVer TEXT,
    url TEXT,
    maintainer TEXT
);";

const CREATE_SYNSET_TABLE: &str = "
CREATE TABLE IF NOT EXISTS synset (
    ID TEXT PRIMARY KEY,
    \"offset\" TEXT NOT NULL,
    pos TEXT NOT NULL
);";

const CREATE_TERM_TABLE: &str = "
CREATE TABLE IF NOT EXISTS term (
    sid TEXT NOT NULL,
    term TEXT NOT NULL,
    FOREIGN KEY (sid) REFERENCES synset(ID)
);";

const CREATE_GLOSS_RAW_TABLE: &str = "
CREATE TABLE IF NOT EXISTS gloss_raw (
    sid TEXT NOT NULL,
    cat TEXT NOT NULL, -- 'orig' or 'text'
    gloss TEXT NOT NULL,
    FOREIGN KEY (sid) REFERENCES synset(ID)
);";

const CREATE_SENSEKEY_TABLE: &str = "
CREATE TABLE IF NOT EXISTS sensekey (
    sid TEXT NOT NULL,
    sensekey TEXT NOT NULL,
    FOREIGN KEY (sid) REFERENCES synset(ID)
);";

const CREATE_GLOSS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS gloss (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    origid TEXT,
    sid TEXT NOT NULL,
    cat TEXT NOT NULL, -- 'def', 'ex', 'aux' or 'classif'
    surface TEXT,
    FOREIGN KEY (sid) REFERENCES synset(ID)
);";

const CREATE_GLOSSITEM_TABLE: &str = "
CREATE TABLE IF NOT EXISTS glossitem (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ord INTEGER NOT NULL,
    gid INTEGER NOT NULL,
    tag TEXT,
    lemma TEXT,
    pos TEXT,
    cat TEXT,
    coll TEXT,
    rdf TEXT,
    sep TEXT,
    text TEXT,
    origid TEXT,
    FOREIGN KEY (gid) REFERENCES gloss(id)
);";

const CREATE_SENSETAG_TABLE: &str = "
CREATE TABLE IF NOT EXISTS sensetag (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cat TEXT,
    tag TEXT,
    glob TEXT,
    glob_lemma TEXT,
    glob_id TEXT,
    coll TEXT,
    sid TEXT,
    gid INTEGER NOT NULL,
    sk TEXT,
    origid TEXT,
    lemma TEXT,
    itemid INTEGER NOT NULL,
    FOREIGN KEY (gid) REFERENCES gloss(id),
    FOREIGN KEY (itemid) REFERENCES glossitem(id)
);";

const CREATE_INDICES: &str = "
CREATE INDEX IF NOT EXISTS idx_term_sid ON term (sid);
CREATE INDEX IF NOT EXISTS idx_term_term ON term (term);
CREATE INDEX IF NOT EXISTS idx_sensekey_sid ON sensekey (sid);
CREATE INDEX IF NOT EXISTS idx_sensekey_sensekey ON sensekey (sensekey);
CREATE INDEX IF NOT EXISTS idx_gloss_raw_sid ON gloss_raw (sid);
CREATE INDEX IF NOT EXISTS idx_gloss_sid ON gloss (sid);
CREATE INDEX IF NOT EXISTS idx_glossitem_gid ON glossitem (gid);
CREATE INDEX IF NOT EXISTS idx_sensetag_gid ON sensetag (gid);
CREATE INDEX IF NOT EXISTS idx_sensetag_sk ON sensetag (sk);
";

/// Creates all tables and indices if they don't exist and records the schema version.
pub fn initialize_database(conn: &mut Connection) -> Result<()> {
    info!("Initializing gloss database schema (version {})...", SCHEMA_VERSION);
    let tx = conn.transaction()?;
    for ddl in [
        CREATE_META_TABLE,
        CREATE_SYNSET_TABLE,
        CREATE_TERM_TABLE,
        CREATE_GLOSS_RAW_TABLE,
        CREATE_SENSEKEY_TABLE,
        CREATE_GLOSS_TABLE,
        CREATE_GLOSSITEM_TABLE,
        CREATE_SENSETAG_TABLE,
    ] {
        tx.execute(ddl, [])?;
    }
    tx.execute_batch(CREATE_INDICES)?;
    ensure_schema_version(&tx, SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(())
}

/// Clears all gloss data, leaving the schema and metadata in place.
pub fn clear_database_data(tx: &Transaction) -> Result<()> {
    info!("Clearing existing data from gloss database tables...");
    // referencing tables first
    tx.execute("DELETE FROM sensetag", [])?;
    tx.execute("DELETE FROM glossitem", [])?;
    tx.execute("DELETE FROM gloss", [])?;
    tx.execute("DELETE FROM gloss_raw", [])?;
    tx.execute("DELETE FROM sensekey", [])?;
    tx.execute("DELETE FROM term", [])?;
    tx.execute("DELETE FROM synset", [])?;
    Ok(())
}

/// Inserts synsets with their terms, keys, raw glosses, glosses, items and tags.
///
/// A synset whose id is already stored is skipped with a warning, children
/// included. Returns the number of synsets inserted. When the progress
/// callback returns `false` the import stops with an error, and the caller's
/// transaction is rolled back when dropped.
pub fn populate_database(
    tx: &Transaction,
    synsets: &SynsetCollection,
    progress: &mut Option<ProgressCallback>,
) -> Result<usize> {
    let start_time = Instant::now();
    let stage = "Inserting glossed synsets".to_string();
    let total = synsets.len() as u64;
    let mut report = |update: ProgressUpdate| -> Result<()> {
        if let Some(cb) = progress.as_mut() {
            if !cb(update) {
                return Err(YawlError::Internal("Import cancelled".to_string()));
            }
        }
        Ok(())
    };
    report(ProgressUpdate::new_stage(stage.clone(), Some(total)))?;

    let mut synset_stmt = tx.prepare("INSERT OR IGNORE INTO synset (ID, \"offset\", pos) VALUES (?1, ?2, ?3)")?;
    let mut term_stmt = tx.prepare("INSERT INTO term (sid, term) VALUES (?1, ?2)")?;
    let mut key_stmt = tx.prepare("INSERT INTO sensekey (sid, sensekey) VALUES (?1, ?2)")?;
    let mut raw_stmt = tx.prepare("INSERT INTO gloss_raw (sid, cat, gloss) VALUES (?1, ?2, ?3)")?;
    let mut gloss_stmt = tx.prepare("INSERT INTO gloss (origid, sid, cat, surface) VALUES (?1, ?2, ?3, ?4)")?;
    let mut item_stmt = tx.prepare(
        "INSERT INTO glossitem (ord, gid, tag, lemma, pos, cat, coll, rdf, sep, text, origid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    let mut tag_stmt = tx.prepare(
        "INSERT INTO sensetag (cat, tag, glob, glob_lemma, glob_id, coll, sid, gid, sk, origid, lemma, itemid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?;

    let mut inserted = 0;
    for (current, synset) in synsets.iter().enumerate() {
        let id = synset.id();
        let sid = id.to_gwnsql();
        let changed = synset_stmt.execute(params![
            sid,
            format!("{:08}", id.offset()),
            id.pos().letter().to_string()
        ])?;
        if changed == 0 {
            warn!("Synset {} is already stored, skipping duplicate", id);
            continue;
        }
        for term in synset.lemmas() {
            term_stmt.execute(params![sid, term])?;
        }
        for key in synset.sensekeys() {
            key_stmt.execute(params![sid, key])?;
        }
        if let Some(annotation) = synset.annotation() {
            for raw in annotation.raw_glosses() {
                raw_stmt.execute(params![sid, raw.cat.as_str(), raw.gloss])?;
            }
            for gloss in annotation.glosses() {
                let surface = gloss.surface().into_owned();
                gloss_stmt.execute(params![gloss.origid, sid, gloss.cat.as_str(), surface])?;
                let gid = tx.last_insert_rowid();
                let mut item_ids = Vec::with_capacity(gloss.items().len());
                for item in gloss.items() {
                    item_stmt.execute(params![
                        item.order() as i64,
                        gid,
                        item.tag,
                        item.lemma,
                        item.pos,
                        item.cat,
                        item.coll,
                        item.rdf,
                        item.sep,
                        item.text,
                        item.origid,
                    ])?;
                    item_ids.push(tx.last_insert_rowid());
                }
                for tag in gloss.tags() {
                    let itemid = item_ids.get(tag.item()).ok_or_else(|| {
                        YawlError::DataIntegrity(format!("sense tag in {} points at missing item {}", id, tag.item()))
                    })?;
                    tag_stmt.execute(params![
                        tag.kind.as_str(),
                        tag.tag,
                        tag.glob,
                        tag.glob_lemma,
                        tag.glob_id,
                        tag.coll,
                        sid,
                        gid,
                        tag.sk,
                        tag.origid,
                        tag.lemma,
                        itemid,
                    ])?;
                }
            }
        }
        inserted += 1;
        report(ProgressUpdate {
            stage_description: stage.clone(),
            current_item: current as u64 + 1,
            total_items: Some(total),
            message: Some(format!("Synset: {}", id)),
        })?;
    }

    info!(
        "Inserted {} of {} synsets. Took {:.2?}",
        inserted,
        total,
        start_time.elapsed()
    );
    Ok(inserted)
}

// --- Store ---

pub struct GlossWordnetSql {
    source: DataSource,
}

impl GlossWordnetSql {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        GlossWordnetSql {
            source: DataSource::read_only(db_path),
        }
    }

    pub fn path(&self) -> &Path {
        self.source.path()
    }

    fn writer(&self) -> DataSource {
        DataSource::read_write(self.source.path())
    }

    /// Creates the database file and schema if needed.
    pub fn setup(&self) -> Result<()> {
        let mut conn = self.writer().open()?;
        initialize_database(&mut conn)
    }

    /// Stores `synsets` in one transaction. Returns the number inserted.
    pub fn insert_synsets(&self, synsets: &SynsetCollection) -> Result<usize> {
        let mut conn = self.writer().open()?;
        initialize_database(&mut conn)?;
        let tx = conn.transaction()?;
        let inserted = populate_database(&tx, synsets, &mut None)?;
        tx.commit()?;
        Ok(inserted)
    }

    pub fn insert_synset(&self, synset: &Synset) -> Result<usize> {
        let synsets: SynsetCollection = std::iter::once(synset.clone()).collect();
        self.insert_synsets(&synsets)
    }

    /// Imports gloss XML files (plain or `.gz`) in a single transaction.
    ///
    /// An already populated database is left untouched unless
    /// `options.force_reload` is set. Returns the number of synsets inserted.
    pub fn import_xml<P: AsRef<Path>>(
        &self,
        files: &[P],
        options: &ImportOptions,
        mut progress: Option<ProgressCallback>,
    ) -> Result<usize> {
        let mut conn = self.writer().open()?;
        initialize_database(&mut conn)?;

        let populated = table_row_count(&conn, "synset")? > 0;
        if populated && !options.force_reload {
            info!("Gloss database {:?} already contains data. Skipping import.", self.path());
            return Ok(0);
        }

        let synsets = read_gloss_files(
            files,
            ParseOptions {
                memory_save: options.memory_save,
            },
        )?;
        info!("Parsed {} synsets from {} file(s)", synsets.len(), files.len());

        let tx = conn.transaction()?;
        if populated {
            info!("Force reload requested. Clearing existing data before import...");
            clear_database_data(&tx)?;
        }
        let inserted = populate_database(&tx, &synsets, &mut progress)?;
        tx.commit()?;
        Ok(inserted)
    }

    pub fn synset_count(&self) -> Result<i64> {
        let conn = self.source.open()?;
        table_row_count(&conn, "synset")
    }

    pub fn sk2sid(&self, sensekey: &str) -> Result<SynsetId> {
        let conn = self.source.open()?;
        fetch_sid_by_key(&conn, sensekey)
    }

    /// Every sense key used to tag a gloss token.
    pub fn tagged_sensekeys(&self) -> Result<BTreeSet<String>> {
        let conn = self.source.open()?;
        let mut stmt = conn.prepare("SELECT DISTINCT sk FROM sensetag WHERE sk IS NOT NULL")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        Ok(keys)
    }

    /// Gloss tokens of a synset with only id, lemma, POS and text filled in.
    pub fn glossitems_text(&self, id: &SynsetId) -> Result<Vec<GlossItem>> {
        let conn = self.source.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, lemma, pos, text FROM glossitem
             WHERE gid IN (SELECT id FROM gloss WHERE sid = ?1)
             ORDER BY gid, ord",
        )?;
        let items = stmt
            .query_map(params![id.to_gwnsql()], |row| {
                Ok(GlossItem {
                    id: Some(row.get(0)?),
                    lemma: opt_text(row, 1)?,
                    pos: opt_text(row, 2)?,
                    text: opt_text(row, 3)?,
                    ..Default::default()
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Sense tags of a synset with only id, lemma and sense key filled in.
    pub fn sense_tags(&self, id: &SynsetId) -> Result<Vec<SenseTag>> {
        let conn = self.source.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, cat, lemma, sk FROM sensetag
             WHERE gid IN (SELECT id FROM gloss WHERE sid = ?1)
             ORDER BY id",
        )?;
        let tags = stmt
            .query_map(params![id.to_gwnsql()], |row| {
                let kind = TagKind::from(row.get::<_, Option<String>>(1)?.unwrap_or_default().as_str());
                let mut tag = SenseTag::new(kind);
                tag.id = Some(row.get(0)?);
                tag.lemma = opt_text(row, 2)?;
                tag.sk = opt_text(row, 3)?;
                Ok(tag)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tags)
    }
}

// --- Assembly ---

fn opt_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(row.get::<_, Option<String>>(idx)?.filter(|s| !s.is_empty()))
}

struct GlossRow {
    id: i64,
    origid: Option<String>,
    cat: String,
    surface: Option<String>,
}

struct TagRow {
    tag: SenseTag,
    itemid: i64,
}

fn fetch_strings(conn: &Connection, sql: &str, sid: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let values = stmt
        .query_map(params![sid], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(values)
}

fn fetch_synset(conn: &Connection, id: &SynsetId) -> Result<Synset> {
    let sid = id.to_gwnsql();
    conn.query_row("SELECT ID FROM synset WHERE ID = ?1", params![sid], |_| Ok(()))
        .optional()?
        .ok_or_else(|| YawlError::NotFound(id.to_string()))?;

    let mut synset = Synset::new(*id);
    for term in fetch_strings(conn, "SELECT term FROM term WHERE sid = ?1 ORDER BY rowid", &sid)? {
        synset.add_lemma(&term);
    }
    for key in fetch_strings(conn, "SELECT sensekey FROM sensekey WHERE sid = ?1 ORDER BY rowid", &sid)? {
        synset.add_key(&key);
    }

    let mut annotation = GlossAnnotation::default();
    let mut stmt = conn.prepare("SELECT cat, gloss FROM gloss_raw WHERE sid = ?1 ORDER BY rowid")?;
    let raws = stmt
        .query_map(params![sid], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (cat, gloss) in raws {
        annotation.add_raw_gloss(cat.parse::<RawGlossCategory>()?, &gloss);
    }

    let mut stmt = conn.prepare("SELECT id, origid, cat, surface FROM gloss WHERE sid = ?1 ORDER BY id")?;
    let gloss_rows = stmt
        .query_map(params![sid], |row| {
            Ok(GlossRow {
                id: row.get(0)?,
                origid: opt_text(row, 1)?,
                cat: row.get(2)?,
                surface: opt_text(row, 3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for gloss_row in gloss_rows {
        annotation.add_gloss(fetch_gloss(conn, gloss_row)?);
    }
    annotation.validate()?;
    synset.set_annotation(annotation);
    Ok(synset)
}

/// Rebuilds one gloss. Item ordinals must run 0..n without gaps and every
/// tag must point at an item of the same gloss.
fn fetch_gloss(conn: &Connection, gloss_row: GlossRow) -> Result<Gloss> {
    let mut gloss = Gloss::new(gloss_row.origid, gloss_row.cat.parse::<GlossCategory>()?);
    gloss.id = Some(gloss_row.id);
    gloss.set_surface(gloss_row.surface);

    let mut stmt = conn.prepare(
        "SELECT id, ord, tag, lemma, pos, cat, coll, rdf, sep, text, origid
         FROM glossitem WHERE gid = ?1 ORDER BY ord",
    )?;
    let items = stmt
        .query_map(params![gloss_row.id], |row| {
            let ord: i64 = row.get(1)?;
            let item = GlossItem {
                id: Some(row.get(0)?),
                tag: opt_text(row, 2)?,
                lemma: opt_text(row, 3)?,
                pos: opt_text(row, 4)?,
                cat: opt_text(row, 5)?,
                coll: opt_text(row, 6)?,
                rdf: opt_text(row, 7)?,
                sep: opt_text(row, 8)?,
                text: opt_text(row, 9)?,
                origid: opt_text(row, 10)?,
                ..Default::default()
            };
            Ok((ord, item))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut item_index: HashMap<i64, usize> = HashMap::with_capacity(items.len());
    for (expected, (ord, item)) in items.into_iter().enumerate() {
        if ord != expected as i64 {
            return Err(YawlError::DataIntegrity(format!(
                "gloss {} has item ordinal {} where {} was expected",
                gloss_row.id, ord, expected
            )));
        }
        let item_id = item.id.unwrap_or_default();
        let idx = gloss.add_item(item);
        item_index.insert(item_id, idx);
    }

    let mut stmt = conn.prepare(
        "SELECT id, cat, tag, glob, glob_lemma, glob_id, coll, sk, origid, lemma, itemid
         FROM sensetag WHERE gid = ?1 ORDER BY id",
    )?;
    let tags = stmt
        .query_map(params![gloss_row.id], |row| {
            let kind = TagKind::from(row.get::<_, Option<String>>(1)?.unwrap_or_default().as_str());
            let mut tag = SenseTag::new(kind);
            tag.id = Some(row.get(0)?);
            tag.tag = opt_text(row, 2)?;
            tag.glob = opt_text(row, 3)?;
            tag.glob_lemma = opt_text(row, 4)?;
            tag.glob_id = opt_text(row, 5)?;
            tag.coll = opt_text(row, 6)?;
            tag.sk = opt_text(row, 7)?;
            tag.origid = opt_text(row, 8)?;
            tag.lemma = opt_text(row, 9)?;
            Ok(TagRow {
                tag,
                itemid: row.get(10)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for TagRow { tag, itemid } in tags {
        let idx = *item_index.get(&itemid).ok_or_else(|| {
            YawlError::DataIntegrity(format!(
                "sense tag {:?} of gloss {} references missing item {}",
                tag.id, gloss_row.id, itemid
            ))
        })?;
        gloss.tag_item(idx, tag)?;
    }
    Ok(gloss)
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
            Err(e) if e.is_not_found() => debug!("gwnsql: skipping missing synset {}", id),
            Err(e) => return Err(e),
        }
    }
    Ok(synsets)
}

fn fetch_sid_by_key(conn: &Connection, sensekey: &str) -> Result<SynsetId> {
    let mut stmt = conn.prepare("SELECT DISTINCT sid FROM sensekey WHERE lower(sensekey) = ?1")?;
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

fn query_synsets(conn: &Connection, sql: &str, values: &[String]) -> Result<SynsetCollection> {
    debug!("gwnsql query: {} {:?}", sql, values);
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params_from_iter(values.iter()), |row| row.get::<_, SynsetId>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    fetch_synsets(conn, &ids)
}

fn pos_filter(pos: Option<PartOfSpeech>, values: &mut Vec<String>) -> String {
    match pos {
        None => String::new(),
        Some(PartOfSpeech::A) => " AND pos IN ('a', 's')".to_string(),
        Some(pos) => {
            values.push(pos.letter().to_string());
            " AND pos = ?".to_string()
        }
    }
}

impl GlossWordnetSql {
    fn search_gloss(&self, cat: GlossCategory, pattern: &str, options: &SearchOptions) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        let (cond, value) = TextPattern::new(pattern).condition("surface", options.ignore_case);
        let mut values = vec![cat.as_str().to_string(), value];
        let sql = format!(
            "SELECT ID FROM synset WHERE ID IN (SELECT sid FROM gloss WHERE cat = ? AND {}){}",
            cond,
            pos_filter(options.pos, &mut values)
        );
        query_synsets(&conn, &sql, &values)
    }
}

impl Wordnet for GlossWordnetSql {
    fn name(&self) -> &'static str {
        "gwnsql"
    }

    fn get_synset(&self, id: &SynsetId, _lang: Option<&str>) -> Result<Synset> {
        let conn = self.source.open()?;
        fetch_synset(&conn, id)
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
            "SELECT ID FROM synset WHERE ID IN (SELECT sid FROM sensekey WHERE lower(sensekey) IN ({}))",
            placeholders(sensekeys.len())
        );
        let values: Vec<String> = sensekeys.iter().map(|k| k.to_lowercase()).collect();
        query_synsets(&conn, &sql, &values)
    }

    fn search(&self, lemma: &str, options: &SearchOptions) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        let (cond, value) = TextPattern::new(lemma).condition("term", options.ignore_case);
        let mut values = vec![value];
        let sql = format!(
            "SELECT ID FROM synset WHERE ID IN (SELECT sid FROM term WHERE {}){}",
            cond,
            pos_filter(options.pos, &mut values)
        );
        query_synsets(&conn, &sql, &values)
    }

    fn search_def(&self, pattern: &str, options: &SearchOptions) -> Result<SynsetCollection> {
        self.search_gloss(GlossCategory::Definition, pattern, options)
    }

    fn search_ex(&self, pattern: &str, options: &SearchOptions) -> Result<SynsetCollection> {
        self.search_gloss(GlossCategory::Example, pattern, options)
    }

    fn hypernyms(&self, _id: &SynsetId, _lang: Option<&str>) -> Result<SynsetCollection> {
        Err(YawlError::FeatureNotSupported("hypernyms"))
    }

    fn hyponyms(&self, _id: &SynsetId, _lang: Option<&str>) -> Result<SynsetCollection> {
        Err(YawlError::FeatureNotSupported("hyponyms"))
    }

    fn hypehypo(&self, _id: &SynsetId, _lang: Option<&str>) -> Result<SynsetCollection> {
        Err(YawlError::FeatureNotSupported("hypehypo"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_gloss_str;
    use std::sync::{Arc, Mutex};
    use tempfile::{TempDir, tempdir};

    const GLOSS_XML: &str = r#"<wordnet>
  <synset id="r00001740" ofs="00001740" pos="r">
    <terms><term>a cappella</term></terms>
    <keys><sk>a_cappella%4:02:00::</sk></keys>
    <gloss desc="orig"><orig>without musical accompaniment; "they performed a cappella"</orig></gloss>
    <gloss desc="wsd">
      <def id="r00001740_d">
        <wf id="r00001740_wf1" lemma="without%4" pos="IN" tag="ignore">without</wf>
        <cf coll="a" id="r00001740_wf2" lemma="musical%3" tag="ignore">musical<glob coll="a" glob="man" id="r00001740_coll.a" lemma="musical_accompaniment%1" tag="man"><id coll="a" id="r00001740_id.1" lemma="musical accompaniment" sk="musical_accompaniment%1:10:00::"/></glob></cf>
        <cf coll="a" id="r00001740_wf3" lemma="accompaniment%1" tag="ignore">accompaniment</cf>
        <wf id="r00001740_wf4" type="punc">;</wf>
      </def>
      <ex id="r00001740_ex1">
        <wf id="r00001740_wf5" lemma="they%1" tag="ignore">they</wf>
        <wf id="r00001740_wf6" lemma="perform%2" tag="un">performed</wf>
        <cf coll="b" id="r00001740_wf7" lemma="a%1" tag="ignore">a<glob coll="b" glob="auto" id="r00001740_coll.b" lemma="a_cappella%3|a_cappella%4" tag="auto"><id coll="b" id="r00001740_id.2" lemma="a cappella" sk="a_cappella%4:02:00::"/></glob></cf>
        <cf coll="b" id="r00001740_wf8" lemma="cappella%1" tag="ignore">cappella</cf>
        <wf id="r00001740_wf9" type="punc">;</wf>
      </ex>
    </gloss>
  </synset>
  <synset id="n03095965" ofs="03095965" pos="n">
    <terms><term>containment</term></terms>
    <keys><sk>containment%1:19:00::</sk></keys>
    <gloss desc="wsd">
      <classif><wf id="n03095965_wf1" type="punc">(</wf><wf id="n03095965_wf2" lemma="physics%1" tag="man">physics</wf><wf id="n03095965_wf3" type="punc">)</wf></classif>
      <def id="n03095965_d">
        <wf id="n03095965_wf4" lemma="a%1" tag="ignore">a</wf>
        <wf id="n03095965_wf5" lemma="system%1" tag="man">system<id id="n03095965_id.1" lemma="system" sk="system%1:06:00::"/></wf>
      </def>
    </gloss>
  </synset>
</wordnet>"#;

    fn fixture() -> (TempDir, GlossWordnetSql) {
        let dir = tempdir().unwrap();
        let gwn = GlossWordnetSql::new(dir.path().join("gwn.db"));
        let synsets = parse_gloss_str(GLOSS_XML, ParseOptions::default()).unwrap();
        assert_eq!(gwn.insert_synsets(&synsets).unwrap(), 2);
        (dir, gwn)
    }

    fn sid(s: &str) -> SynsetId {
        SynsetId::parse(s).unwrap()
    }

    #[test]
    fn test_round_trip_through_sqlite() {
        let (_dir, gwn) = fixture();
        let ss = gwn.get_synset(&sid("00001740-r"), None).unwrap();
        assert_eq!(ss.lemmas(), ["a cappella"]);
        assert_eq!(ss.sensekeys(), ["a_cappella%4:02:00::"]);
        let ann = ss.annotation().unwrap();
        assert_eq!(ann.raw_glosses().len(), 1);
        assert_eq!(ann.glosses().len(), 2);
        assert_eq!(ann.glosses()[0].text(), "without musical accompaniment;");
        assert_eq!(ann.glosses()[1].text(), "they performed a cappella;");
        assert_eq!(ss.definition().as_deref(), Some("without musical accompaniment;"));
        assert_eq!(ss.examples(), vec!["they performed a cappella;"]);

        let ex = &ann.glosses()[1];
        let tag = &ex.tags()[0];
        assert_eq!(tag.kind, TagKind::Collocation);
        assert_eq!(tag.item(), 2);
        let covered: Vec<&str> = ex.tagged_items(tag).iter().filter_map(|i| i.text.as_deref()).collect();
        assert_eq!(covered, vec!["a", "cappella"]);
    }

    #[test]
    fn test_domain_gloss() {
        let (_dir, gwn) = fixture();
        let ss = gwn.get_synset(&sid("n03095965"), None).unwrap();
        let ann = ss.annotation().unwrap();
        assert_eq!(ann.domain().len(), 1);
        assert_eq!(ann.domain()[0].surface(), "(physics)");
        assert_eq!(ss.definition().as_deref(), Some("a system"));
    }

    #[test]
    fn test_items_follow_ordinals_not_row_order() {
        let (_dir, gwn) = fixture();
        {
            let conn = Connection::open(gwn.path()).unwrap();
            conn.execute_batch("PRAGMA foreign_keys = OFF").unwrap();
            let gid: i64 = conn
                .query_row("SELECT id FROM gloss WHERE origid = 'r00001740_ex1'", [], |r| r.get(0))
                .unwrap();
            // re-insert the items of the example gloss so that row ids run against ordinals
            conn.execute_batch(&format!(
                "CREATE TEMP TABLE saved AS SELECT * FROM glossitem WHERE gid = {gid};
                 DELETE FROM glossitem WHERE gid = {gid};
                 INSERT INTO glossitem (ord, gid, tag, lemma, pos, cat, coll, rdf, sep, text, origid)
                     SELECT ord, gid, tag, lemma, pos, cat, coll, rdf, sep, text, origid FROM saved ORDER BY ord DESC;
                 UPDATE sensetag SET itemid = (SELECT id FROM glossitem WHERE origid = 'r00001740_wf7')
                     WHERE gid = {gid};"
            ))
            .unwrap();
        }
        let ss = gwn.get_synset(&sid("r00001740"), None).unwrap();
        let ex = &ss.annotation().unwrap().glosses()[1];
        assert_eq!(ex.text(), "they performed a cappella;");
        let orders: Vec<usize> = ex.items().iter().map(GlossItem::order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_ordinal_gap_is_integrity_fault() {
        let (_dir, gwn) = fixture();
        {
            let conn = Connection::open(gwn.path()).unwrap();
            conn.execute(
                "DELETE FROM glossitem WHERE origid = 'r00001740_wf6'",
                [],
            )
            .unwrap();
        }
        let err = gwn.get_synset(&sid("r00001740"), None).unwrap_err();
        assert!(matches!(err, YawlError::DataIntegrity(_)));
    }

    #[test]
    fn test_orphaned_tag_is_integrity_fault() {
        let (_dir, gwn) = fixture();
        {
            let conn = Connection::open(gwn.path()).unwrap();
            conn.execute_batch("PRAGMA foreign_keys = OFF").unwrap();
            conn.execute("UPDATE sensetag SET itemid = 999999 WHERE sk = 'system%1:06:00::'", [])
                .unwrap();
        }
        let err = gwn.get_synset(&sid("03095965-n"), None).unwrap_err();
        assert!(matches!(err, YawlError::DataIntegrity(_)));
    }

    #[test]
    fn test_duplicate_insert_is_skipped() {
        let (_dir, gwn) = fixture();
        let mut dup = Synset::new(sid("r00001740"));
        dup.add_lemma("something else");
        assert_eq!(gwn.insert_synset(&dup).unwrap(), 0);
        assert_eq!(gwn.synset_count().unwrap(), 2);
        let ss = gwn.get_synset(&sid("r00001740"), None).unwrap();
        assert_eq!(ss.lemmas(), ["a cappella"]);
    }

    #[test]
    fn test_keys_and_search() {
        let (_dir, gwn) = fixture();
        assert_eq!(gwn.get_by_key("a_cappella%4:02:00::").unwrap().id(), sid("r00001740"));
        assert!(gwn.get_by_key("nope%1:00:00::").unwrap_err().is_not_found());
        assert_eq!(gwn.sk2sid("CONTAINMENT%1:19:00::").unwrap(), sid("03095965-n"));
        assert_eq!(gwn.get_by_keys(&["a_cappella%4:02:00::", "containment%1:19:00::"]).unwrap().len(), 2);

        let options = SearchOptions::default();
        assert_eq!(gwn.search("A Cappella", &options).unwrap().len(), 1);
        assert!(gwn.search("cappella", &options).unwrap().is_empty());
        assert_eq!(gwn.search("%cappella", &options).unwrap().len(), 1);
        let nouns = SearchOptions::default().with_pos(Some(PartOfSpeech::N));
        assert!(gwn.search("%cappella", &nouns).unwrap().is_empty());

        assert_eq!(gwn.search_def("%musical%", &options).unwrap().ids(), vec![sid("r00001740")]);
        assert_eq!(gwn.search_ex("%performed%", &options).unwrap().ids(), vec![sid("r00001740")]);
        assert!(gwn.search_ex("%musical%", &options).unwrap().is_empty());
    }

    #[test]
    fn test_hierarchy_not_supported() {
        let (_dir, gwn) = fixture();
        let err = gwn.hypernyms(&sid("r00001740"), None).unwrap_err();
        assert!(err.is_not_supported());
        assert!(!err.is_not_found());
        assert!(gwn.hyponyms(&sid("r00001740"), None).unwrap_err().is_not_supported());
        assert!(gwn.hypehypo(&sid("r00001740"), None).unwrap_err().is_not_supported());
    }

    #[test]
    fn test_tag_helpers() {
        let (_dir, gwn) = fixture();
        let keys = gwn.tagged_sensekeys().unwrap();
        assert!(keys.contains("a_cappella%4:02:00::"));
        assert!(keys.contains("system%1:06:00::"));
        assert_eq!(keys.len(), 3);

        let items = gwn.glossitems_text(&sid("r00001740")).unwrap();
        assert_eq!(items.len(), 9);
        assert_eq!(items[0].lemma.as_deref(), Some("without%4"));

        let tags = gwn.sense_tags(&sid("r00001740")).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].sk.as_deref(), Some("a_cappella%4:02:00::"));
    }

    #[test]
    fn test_import_respects_force_reload_and_cancellation() {
        let dir = tempdir().unwrap();
        let xml_path = dir.path().join("adv.xml");
        std::fs::write(&xml_path, GLOSS_XML).unwrap();
        let gwn = GlossWordnetSql::new(dir.path().join("gwn.db"));

        let seen = Arc::new(Mutex::new(0u64));
        let seen_cb = Arc::clone(&seen);
        let callback: ProgressCallback = Box::new(move |update: ProgressUpdate| {
            *seen_cb.lock().unwrap() = update.current_item;
            true
        });
        assert_eq!(gwn.import_xml(&[&xml_path], &ImportOptions::default(), Some(callback)).unwrap(), 2);
        assert_eq!(*seen.lock().unwrap(), 2);

        // populated: skipped unless forced
        assert_eq!(gwn.import_xml(&[&xml_path], &ImportOptions::default(), None).unwrap(), 0);
        let forced = ImportOptions {
            force_reload: true,
            ..Default::default()
        };
        assert_eq!(gwn.import_xml(&[&xml_path], &forced, None).unwrap(), 2);

        // a cancelled import leaves the previous data in place
        let cancel: ProgressCallback = Box::new(|update: ProgressUpdate| update.current_item == 0);
        assert!(gwn.import_xml(&[&xml_path], &forced, Some(cancel)).is_err());
        assert_eq!(gwn.synset_count().unwrap(), 2);
    }
}

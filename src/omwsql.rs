//! Open Multilingual WordNet SQLite store.
//!
//! Synsets are keyed by canonical ids (`05797597-n`). Lemmas, definitions and
//! examples are language specific; every lookup takes a language code and
//! falls back to [`DEFAULT_LANG`].

use crate::db::{DataSource, TextPattern};
use crate::error::{Result, YawlError};
use crate::models::{PartOfSpeech, Synset, SynsetCollection, SynsetId};
use crate::search::{SearchOptions, Wordnet};
use log::debug;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::Path;

pub const DEFAULT_LANG: &str = "eng";

/// Tables read by [`OmwSql`].
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS synset (
    synset TEXT PRIMARY KEY,
    pos TEXT,
    name TEXT,
    src TEXT
);
CREATE TABLE IF NOT EXISTS word (
    wordid INTEGER PRIMARY KEY,
    lang TEXT,
    lemma TEXT,
    pron TEXT,
    pos TEXT
);
CREATE TABLE IF NOT EXISTS synlink (
    synset1 TEXT,
    synset2 TEXT,
    link TEXT,
    src TEXT
);
CREATE TABLE IF NOT EXISTS sense (
    synset TEXT,
    wordid INTEGER,
    lang TEXT,
    rank TEXT,
    lexid INTEGER,
    freq INTEGER,
    src TEXT
);
CREATE TABLE IF NOT EXISTS synset_def (
    synset TEXT,
    lang TEXT,
    def TEXT,
    sid TEXT,
    usr TEXT
);
CREATE TABLE IF NOT EXISTS synset_ex (
    synset TEXT,
    lang TEXT,
    def TEXT,
    sid TEXT
);
CREATE INDEX IF NOT EXISTS idx_word_lemma ON word (lemma);
CREATE INDEX IF NOT EXISTS idx_sense_synset ON sense (synset);
CREATE INDEX IF NOT EXISTS idx_sense_wordid ON sense (wordid);
CREATE INDEX IF NOT EXISTS idx_synlink_synset1 ON synlink (synset1);
CREATE INDEX IF NOT EXISTS idx_synset_def_synset ON synset_def (synset);
CREATE INDEX IF NOT EXISTS idx_synset_ex_synset ON synset_ex (synset);
";

/// Creates the tables [`OmwSql`] reads. Used to build fixture databases.
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub struct OmwSql {
    source: DataSource,
}

impl OmwSql {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        OmwSql {
            source: DataSource::read_only(db_path),
        }
    }

    pub fn path(&self) -> &Path {
        self.source.path()
    }

    /// Sense keys are not part of the multilingual data.
    pub fn sk2sid(&self, _sensekey: &str) -> Result<SynsetId> {
        Err(YawlError::FeatureNotSupported("sense key lookup"))
    }

    /// First definition of a synset in `lang`, if any.
    pub fn synset_def(&self, id: &SynsetId, lang: Option<&str>) -> Result<Option<String>> {
        let conn = self.source.open()?;
        let def = conn
            .query_row(
                "SELECT def FROM synset_def WHERE synset = ?1 AND lang = ?2 ORDER BY rowid LIMIT 1",
                params![id.to_canonical(), lang.unwrap_or(DEFAULT_LANG)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(def)
    }

    fn search_text(&self, table: &str, pattern: &str, options: &SearchOptions) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        let lang = options.lang.as_deref().unwrap_or(DEFAULT_LANG);
        let (cond, value) = TextPattern::substring(pattern).condition("def", options.ignore_case);
        let sql = format!(
            "SELECT synset FROM {} WHERE {} AND lang = ? ORDER BY rowid",
            table, cond
        );
        query_synsets(&conn, &sql, &[value, lang.to_string()], lang)
    }
}

// --- Assembly ---

fn fetch_synset(conn: &Connection, id: &SynsetId, lang: &str) -> Result<Synset> {
    let sid = id.to_canonical();
    conn.query_row("SELECT synset FROM synset WHERE synset = ?1", params![sid], |_| Ok(()))
        .optional()?
        .ok_or_else(|| YawlError::NotFound(sid.clone()))?;

    let mut synset = Synset::new(*id).with_lang(lang);

    let mut stmt = conn.prepare(
        "SELECT lemma FROM word
         WHERE wordid IN (SELECT wordid FROM sense WHERE synset = ?1) AND lang = ?2
         ORDER BY wordid",
    )?;
    let lemmas = stmt
        .query_map(params![sid, lang], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for lemma in &lemmas {
        synset.add_lemma(lemma);
    }

    let mut stmt = conn.prepare("SELECT def FROM synset_def WHERE synset = ?1 AND lang = ?2 ORDER BY rowid")?;
    let defs = stmt
        .query_map(params![sid, lang], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for def in &defs {
        synset.add_definition(def);
    }

    let mut stmt = conn.prepare("SELECT def FROM synset_ex WHERE synset = ?1 AND lang = ?2 ORDER BY rowid")?;
    let examples = stmt
        .query_map(params![sid, lang], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for example in &examples {
        synset.add_example(example);
    }

    let tagcount: i64 = conn.query_row(
        "SELECT COALESCE(SUM(freq), 0) FROM sense WHERE synset = ?1 AND lang = ?2",
        params![sid, lang],
        |row| row.get(0),
    )?;
    synset.tagcount = tagcount.max(0) as u32;
    Ok(synset)
}

fn fetch_synsets(conn: &Connection, ids: &[SynsetId], lang: &str) -> Result<SynsetCollection> {
    let mut synsets = SynsetCollection::new();
    for id in ids {
        if synsets.contains(id) {
            continue;
        }
        match fetch_synset(conn, id, lang) {
            Ok(synset) => {
                synsets.add(synset);
            }
            Err(e) if e.is_not_found() => debug!("omwsql: skipping missing synset {}", id),
            Err(e) => return Err(e),
        }
    }
    Ok(synsets)
}

fn query_synsets(conn: &Connection, sql: &str, values: &[String], lang: &str) -> Result<SynsetCollection> {
    debug!("omwsql query: {} {:?}", sql, values);
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params_from_iter(values.iter()), |row| row.get::<_, SynsetId>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    fetch_synsets(conn, &ids, lang)
}

fn linked(conn: &Connection, id: &SynsetId, links: &str, lang: &str) -> Result<SynsetCollection> {
    let sql = format!(
        "SELECT synset2 FROM synlink WHERE synset1 = ? AND link IN ({}) ORDER BY rowid",
        links
    );
    query_synsets(conn, &sql, &[id.to_canonical()], lang)
}

impl Wordnet for OmwSql {
    fn name(&self) -> &'static str {
        "omwsql"
    }

    fn get_synset(&self, id: &SynsetId, lang: Option<&str>) -> Result<Synset> {
        let conn = self.source.open()?;
        fetch_synset(&conn, id, lang.unwrap_or(DEFAULT_LANG))
    }

    fn get_synsets(&self, ids: &[SynsetId], lang: Option<&str>) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        fetch_synsets(&conn, ids, lang.unwrap_or(DEFAULT_LANG))
    }

    fn get_by_key(&self, _sensekey: &str) -> Result<Synset> {
        Err(YawlError::FeatureNotSupported("sense key lookup"))
    }

    fn get_by_keys(&self, _sensekeys: &[&str]) -> Result<SynsetCollection> {
        Err(YawlError::FeatureNotSupported("sense key lookup"))
    }

    /// Lemma search; the query always matches as a substring.
    fn search(&self, lemma: &str, options: &SearchOptions) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        let lang = options.lang.as_deref().unwrap_or(DEFAULT_LANG);
        let (cond, value) = TextPattern::substring(lemma).condition("lemma", options.ignore_case);
        let mut values = vec![value, lang.to_string()];
        let pos_cond = match options.pos {
            None => "",
            Some(PartOfSpeech::A) => " AND pos IN ('a', 's')",
            Some(pos) => {
                values.push(pos.letter().to_string());
                " AND pos = ?"
            }
        };
        values.push(lang.to_string());
        let sql = format!(
            "SELECT synset FROM sense
             WHERE wordid IN (SELECT wordid FROM word WHERE {} AND lang = ?{}) AND lang = ?
             ORDER BY rowid",
            cond, pos_cond
        );
        query_synsets(&conn, &sql, &values, lang)
    }

    fn search_def(&self, pattern: &str, options: &SearchOptions) -> Result<SynsetCollection> {
        self.search_text("synset_def", pattern, options)
    }

    fn search_ex(&self, pattern: &str, options: &SearchOptions) -> Result<SynsetCollection> {
        self.search_text("synset_ex", pattern, options)
    }

    fn hypernyms(&self, id: &SynsetId, lang: Option<&str>) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        linked(&conn, id, "'hype'", lang.unwrap_or(DEFAULT_LANG))
    }

    fn hyponyms(&self, id: &SynsetId, lang: Option<&str>) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        linked(&conn, id, "'hypo'", lang.unwrap_or(DEFAULT_LANG))
    }

    fn hypehypo(&self, id: &SynsetId, lang: Option<&str>) -> Result<SynsetCollection> {
        let conn = self.source.open()?;
        linked(&conn, id, "'hype', 'hypo'", lang.unwrap_or(DEFAULT_LANG))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn fixture() -> (TempDir, OmwSql) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("omw.db");
        let conn = Connection::open(&path).unwrap();
        create_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO synset VALUES ('05797597-n', 'n', 'inquiry', 'pwn');
             INSERT INTO synset VALUES ('05796750-n', 'n', 'higher cognitive process', 'pwn');
             INSERT INTO synset VALUES ('05800611-n', 'n', 'problem solving', 'pwn');
             INSERT INTO word VALUES (1, 'eng', 'inquiry', NULL, 'n');
             INSERT INTO word VALUES (2, 'eng', 'enquiry', NULL, 'n');
             INSERT INTO word VALUES (3, 'eng', 'research', NULL, 'n');
             INSERT INTO word VALUES (4, 'jpn', '調査', NULL, 'n');
             INSERT INTO word VALUES (5, 'eng', 'higher cognitive process', NULL, 'n');
             INSERT INTO sense VALUES ('05797597-n', 1, 'eng', NULL, 0, 3, 'pwn');
             INSERT INTO sense VALUES ('05797597-n', 2, 'eng', NULL, 0, 1, 'pwn');
             INSERT INTO sense VALUES ('05797597-n', 3, 'eng', NULL, 0, NULL, 'pwn');
             INSERT INTO sense VALUES ('05797597-n', 4, 'jpn', NULL, 0, NULL, 'jwn');
             INSERT INTO sense VALUES ('05796750-n', 5, 'eng', NULL, 0, 0, 'pwn');
             INSERT INTO synset_def VALUES ('05797597-n', 'eng', 'a search for knowledge', '0', NULL);
             INSERT INTO synset_def VALUES ('05797597-n', 'jpn', '知識を得るための調査', '0', NULL);
             INSERT INTO synset_ex VALUES ('05797597-n', 'eng', 'their pottery deserves more research than it has received', '0');
             INSERT INTO synlink VALUES ('05797597-n', '05796750-n', 'hype', 'pwn');
             INSERT INTO synlink VALUES ('05797597-n', '05800611-n', 'hypo', 'pwn');",
        )
        .unwrap();
        (dir, OmwSql::new(path))
    }

    fn sid(s: &str) -> SynsetId {
        SynsetId::parse(s).unwrap()
    }

    #[test]
    fn test_get_synset_by_language() {
        let (_dir, omw) = fixture();
        let ss = omw.get_synset(&sid("05797597-n"), None).unwrap();
        assert_eq!(ss.id().to_canonical(), "05797597-n");
        assert_eq!(ss.lemmas(), ["inquiry", "enquiry", "research"]);
        assert_eq!(ss.definitions(), ["a search for knowledge"]);
        assert_eq!(ss.examples(), vec!["their pottery deserves more research than it has received"]);
        assert_eq!(ss.tagcount, 4);
        assert_eq!(ss.lang(), "eng");

        let ss = omw.get_synset(&sid("n05797597"), Some("jpn")).unwrap();
        assert_eq!(ss.lemmas(), ["調査"]);
        assert_eq!(ss.definition().as_deref(), Some("知識を得るための調査"));
        assert_eq!(ss.lang(), "jpn");
    }

    #[test]
    fn test_missing_synset() {
        let (_dir, omw) = fixture();
        assert!(omw.get_synset(&sid("00000001-n"), None).unwrap_err().is_not_found());
        let found = omw.get_synsets(&[sid("00000001-n"), sid("05797597-n")], None).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_synset_def() {
        let (_dir, omw) = fixture();
        let id = sid("05797597-n");
        assert_eq!(omw.synset_def(&id, None).unwrap().as_deref(), Some("a search for knowledge"));
        assert_eq!(omw.synset_def(&id, Some("jpn")).unwrap().as_deref(), Some("知識を得るための調査"));
        assert_eq!(omw.synset_def(&id, Some("fra")).unwrap(), None);
    }

    #[test]
    fn test_keys_not_supported() {
        let (_dir, omw) = fixture();
        assert!(omw.get_by_key("inquiry%1:09:00::").unwrap_err().is_not_supported());
        assert!(omw.get_by_keys(&["inquiry%1:09:00::"]).unwrap_err().is_not_supported());
        assert!(omw.sk2sid("inquiry%1:09:00::").unwrap_err().is_not_supported());
    }

    #[test]
    fn test_search_is_substring() {
        let (_dir, omw) = fixture();
        let options = SearchOptions::default();
        let found = omw.search("quir", &options).unwrap();
        assert_eq!(found.ids(), vec![sid("05797597-n")]);
        assert!(omw.search("QUIR", &options.clone().case_sensitive()).unwrap().is_empty());

        let jpn = SearchOptions::default().with_lang(Some("jpn"));
        let found = omw.search("調", &jpn).unwrap();
        assert_eq!(found.first().unwrap().lemmas(), ["調査"]);
        let verbs = SearchOptions::default().with_pos(Some(PartOfSpeech::V));
        assert!(omw.search("quir", &verbs).unwrap().is_empty());

        assert_eq!(omw.search_def("knowledge", &options).unwrap().len(), 1);
        assert_eq!(omw.search_ex("pottery", &options).unwrap().len(), 1);
        assert!(omw.search_def("pottery", &options).unwrap().is_empty());
    }

    #[test]
    fn test_hierarchy_via_links() {
        let (_dir, omw) = fixture();
        let id = sid("05797597-n");
        assert_eq!(omw.hypernyms(&id, None).unwrap().ids(), vec![sid("05796750-n")]);
        assert_eq!(omw.hyponyms(&id, None).unwrap().ids(), vec![sid("05800611-n")]);
        assert_eq!(omw.hypehypo(&id, None).unwrap().len(), 2);
        // supported but empty
        assert!(omw.hypernyms(&sid("05800611-n"), None).unwrap().is_empty());
    }
}

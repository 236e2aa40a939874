use rusqlite::Connection;
use std::path::Path;
use tempfile::tempdir;
use yawl_rs::{
    DataPaths, OmwSql, PartOfSpeech, SearchOptions, StoreKind, SynsetId, Wordnet, WordnetSql, YawlError, omwsql,
    smart_search, wnsql,
};

fn build_wnsql(path: &Path) {
    let conn = Connection::open(path).unwrap();
    wnsql::create_schema(&conn).unwrap();
    conn.execute_batch(
        "INSERT INTO synsets VALUES (400001837, 'r', 2, 'in the Christian era; used before dates after the supposed year Christ was born');
         INSERT INTO synsets VALUES (103095965, 'n', 6, 'a system designed to prevent the accidental release of radioactive material from a reactor');
         INSERT INTO words VALUES (1, 'AD');
         INSERT INTO words VALUES (2, 'anno Domini');
         INSERT INTO words VALUES (3, 'containment');
         INSERT INTO senses VALUES (1, NULL, 400001837, 1, 1, 0, 4, 'ad%4:02:00::');
         INSERT INTO senses VALUES (2, NULL, 400001837, 2, 1, 0, 1, 'anno_domini%4:02:00::');
         INSERT INTO senses VALUES (3, NULL, 103095965, 3, 1, 0, 0, 'containment%1:06:00::');
         INSERT INTO samples VALUES (400001837, 1, 'in AD 200');",
    )
    .unwrap();
}

fn build_omw(path: &Path) {
    let conn = Connection::open(path).unwrap();
    omwsql::create_schema(&conn).unwrap();
    conn.execute_batch(
        "INSERT INTO synset VALUES ('00001837-r', 'r', 'AD', 'pwn');
         INSERT INTO synset VALUES ('03095965-n', 'n', 'containment', 'pwn');
         INSERT INTO word VALUES (1, 'eng', 'AD', NULL, 'r');
         INSERT INTO word VALUES (2, 'eng', 'containment', NULL, 'n');
         INSERT INTO word VALUES (3, 'jpn', '封じ込め', NULL, 'n');
         INSERT INTO sense VALUES ('00001837-r', 1, 'eng', NULL, 0, 2, 'pwn');
         INSERT INTO sense VALUES ('03095965-n', 2, 'eng', NULL, 0, 1, 'pwn');
         INSERT INTO sense VALUES ('03095965-n', 3, 'jpn', NULL, 0, NULL, 'jwn');
         INSERT INTO synset_def VALUES ('03095965-n', 'eng', 'a system designed to prevent the accidental release of radioactive material', '0', NULL);",
    )
    .unwrap();
}

fn sid(s: &str) -> SynsetId {
    SynsetId::parse(s).unwrap()
}

#[test]
fn every_id_encoding_reaches_the_same_synset() {
    let dir = tempdir().unwrap();
    let paths = DataPaths::under(dir.path());
    build_wnsql(&paths.wnsql);
    build_omw(&paths.omw);
    let wn = WordnetSql::new(&paths.wnsql);
    let omw = OmwSql::new(&paths.omw);

    for form in ["00001837-r", "00001837r", "r-00001837", "r00001837", "400001837", " 00001837-r "] {
        let id = sid(form);
        assert_eq!(id, sid("00001837-r"));
        assert_eq!(wn.get_synset(&id, None).unwrap().lemma(), Some("AD"));
        assert_eq!(omw.get_synset(&id, None).unwrap().lemma(), Some("AD"));
    }
}

#[test]
fn stores_opened_by_kind_share_the_contract() {
    let dir = tempdir().unwrap();
    let paths = DataPaths::under(dir.path());
    build_wnsql(&paths.wnsql);
    build_omw(&paths.omw);

    for kind in [StoreKind::Wnsql, StoreKind::Omw] {
        let store = kind.open(&paths);
        let found = store.get_synsets(&[sid("03095965-n"), sid("09999999-n")], None).unwrap();
        assert_eq!(found.ids(), vec![sid("03095965-n")], "{}", kind);
        assert!(store.get_synset(&sid("09999999-n"), None).unwrap_err().is_not_found());
    }

    // a store whose file is missing fails loudly instead of reporting "not found"
    let gwn = StoreKind::Gwn.open(&paths);
    let err = gwn.get_synset(&sid("03095965-n"), None).unwrap_err();
    assert!(matches!(err, YawlError::Io(_)));
}

#[test]
fn smart_search_per_store() {
    let dir = tempdir().unwrap();
    let paths = DataPaths::under(dir.path());
    build_wnsql(&paths.wnsql);
    build_omw(&paths.omw);
    let wn = WordnetSql::new(&paths.wnsql);
    let omw = OmwSql::new(&paths.omw);
    let options = SearchOptions::default();

    // sense key resolves on the Princeton store
    let found = smart_search(&wn, "anno_domini%4:02:00::", &options).unwrap();
    assert_eq!(found.ids(), vec![sid("00001837-r")]);

    // the multilingual store has no sense keys and falls through to text search
    let found = smart_search(&omw, "anno_domini%4:02:00::", &options).unwrap();
    assert!(found.is_empty());

    let found = smart_search(&omw, "radioactive", &options).unwrap();
    assert_eq!(found.ids(), vec![sid("03095965-n")]);

    let jpn = SearchOptions::default().with_lang(Some("jpn"));
    let found = smart_search(&omw, "封じ", &jpn).unwrap();
    assert_eq!(found.first().unwrap().lemmas(), ["封じ込め"]);
    assert_eq!(found.first().unwrap().lang(), "jpn");

    let adverbs = SearchOptions::default().with_pos(Some(PartOfSpeech::R));
    assert!(smart_search(&wn, "containment", &adverbs).unwrap().is_empty());
}

#[test]
fn json_export_uses_canonical_ids() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sqlite-30.db");
    build_wnsql(&path);
    let wn = WordnetSql::new(&path);
    let synset = wn.get_synset(&sid("r00001837"), None).unwrap();
    let json = serde_json::to_value(synset.to_json()).unwrap();
    assert_eq!(json["synsetid"], "00001837-r");
    assert_eq!(json["lemmas"], serde_json::json!(["AD", "anno Domini"]));
    assert_eq!(json["tagcount"], 5);
    assert_eq!(json["examples"], serde_json::json!(["in AD 200"]));
}

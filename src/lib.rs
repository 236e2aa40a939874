//! Uniform access to WordNet-family lexical databases.
//!
//! Three stores share one lookup contract ([`Wordnet`]): the Princeton WordNet
//! SQL dump, the Gloss Corpus imported into SQLite, and the Open Multilingual
//! WordNet. Synset ids are normalized through [`SynsetId`] whatever the store's
//! native encoding.

pub mod config;
pub mod db;
pub mod error;
pub mod gloss;
pub mod gwnsql;
pub mod models;
pub mod omwsql;
pub mod parse;
pub mod progress;
pub mod search;
pub mod wnsql;

pub use config::{DataPaths, ImportOptions};
pub use error::{Result, YawlError};
pub use gloss::{Gloss, GlossAnnotation, GlossCategory, GlossItem, GlossRaw, SenseTag, TagKind};
pub use gwnsql::GlossWordnetSql;
pub use models::{PartOfSpeech, Synset, SynsetCollection, SynsetId, SynsetJson};
pub use omwsql::OmwSql;
pub use search::{SearchOptions, Wordnet, smart_search};
pub use wnsql::WordnetSql;

use std::fmt;
use std::str::FromStr;

/// The backing stores a caller can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreKind {
    #[default]
    Wnsql,
    Gwn,
    Omw,
}

impl StoreKind {
    pub const ALL: [StoreKind; 3] = [StoreKind::Wnsql, StoreKind::Gwn, StoreKind::Omw];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Wnsql => "wnsql",
            StoreKind::Gwn => "gwn",
            StoreKind::Omw => "omw",
        }
    }

    /// Database file of this store under `paths`.
    pub fn db_path(self, paths: &DataPaths) -> &std::path::Path {
        match self {
            StoreKind::Wnsql => &paths.wnsql,
            StoreKind::Gwn => &paths.gwn_db,
            StoreKind::Omw => &paths.omw,
        }
    }

    /// Opens the store. Connections are made per operation, so this never touches the file.
    pub fn open(self, paths: &DataPaths) -> Box<dyn Wordnet + Send + Sync> {
        match self {
            StoreKind::Wnsql => Box::new(WordnetSql::new(&paths.wnsql)),
            StoreKind::Gwn => Box::new(GlossWordnetSql::new(&paths.gwn_db)),
            StoreKind::Omw => Box::new(OmwSql::new(&paths.omw)),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = YawlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "wnsql" | "wn" | "pwn" => Ok(StoreKind::Wnsql),
            "gwn" | "gwnsql" => Ok(StoreKind::Gwn),
            "omw" | "omwsql" => Ok(StoreKind::Omw),
            other => Err(YawlError::Internal(format!("unknown store `{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_kind() {
        assert_eq!("gwnsql".parse::<StoreKind>().unwrap(), StoreKind::Gwn);
        assert_eq!("OMW".parse::<StoreKind>().unwrap(), StoreKind::Omw);
        assert!("wordnik".parse::<StoreKind>().is_err());
        for kind in StoreKind::ALL {
            assert_eq!(kind.to_string().parse::<StoreKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_store_paths() {
        let paths = DataPaths::under("/data");
        assert_eq!(StoreKind::Gwn.db_path(&paths), paths.gwn_db.as_path());
        assert_eq!(StoreKind::Omw.open(&paths).name(), "omwsql");
        assert_eq!(StoreKind::Wnsql.open(&paths).name(), "wnsql");
    }
}

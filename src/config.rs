//! On-disk locations of the data files and corpus import switches.

use crate::error::{Result, YawlError};
use directories_next::ProjectDirs;
use log::debug;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data home directory.
pub const HOME_ENV: &str = "YAWLIB_HOME";

pub const WNSQL_FILENAME: &str = "sqlite-30.db";
pub const GWN_DB_FILENAME: &str = "gwn.db";
pub const GWN_XML_DIRNAME: &str = "glosstag/merged";
pub const OMW_FILENAME: &str = "omw.db";

/// Merged gloss corpus files, in import order.
pub const GLOSS_XML_FILES: [&str; 4] = ["adv.xml", "adj.xml", "verb.xml", "noun.xml"];

/// Where the three databases and the gloss corpus XML live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub wnsql: PathBuf,
    pub gwn_db: PathBuf,
    pub gwn_xml: PathBuf,
    pub omw: PathBuf,
}

impl DataPaths {
    /// Default file names under `home`.
    pub fn under<P: AsRef<Path>>(home: P) -> Self {
        let home = home.as_ref();
        DataPaths {
            wnsql: home.join(WNSQL_FILENAME),
            gwn_db: home.join(GWN_DB_FILENAME),
            gwn_xml: home.join(GWN_XML_DIRNAME),
            omw: home.join(OMW_FILENAME),
        }
    }

    /// Uses `$YAWLIB_HOME` when set, otherwise the platform data directory.
    pub fn default_paths() -> Result<Self> {
        let home = home_dir()?;
        debug!("Using data home {:?}", home);
        Ok(Self::under(home))
    }

    /// The gloss corpus files that exist, preferring `x.xml` over `x.xml.gz`.
    pub fn gloss_xml_files(&self) -> Vec<PathBuf> {
        GLOSS_XML_FILES
            .iter()
            .filter_map(|name| {
                let plain = self.gwn_xml.join(name);
                if plain.is_file() {
                    return Some(plain);
                }
                let gz = self.gwn_xml.join(format!("{}.gz", name));
                gz.is_file().then_some(gz)
            })
            .collect()
    }
}

fn home_dir() -> Result<PathBuf> {
    if let Some(home) = env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    let project_dirs = ProjectDirs::from("org", "Yawl", "yawlib").ok_or(YawlError::DataDirNotFound)?;
    Ok(project_dirs.data_dir().to_path_buf())
}

/// Options for importing the gloss corpus.
#[derive(Debug, Default, Clone)]
pub struct ImportOptions {
    /// Clear and repopulate a database that already holds data.
    pub force_reload: bool,
    /// Skip raw glosses and per-token tag/lemma attributes while parsing.
    pub memory_save: bool,
}

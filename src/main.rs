//! Command-line interface for the yawl lookup library.
//!
//! Looks synsets up by id, sense key or text in any of the three stores and
//! imports the Gloss Corpus XML into its SQLite store.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{LevelFilter, debug, error, info};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use yawl_rs::{
    DataPaths, GlossWordnetSql, ImportOptions, PartOfSpeech, SearchOptions, StoreKind, Synset, SynsetCollection,
    SynsetId,
    db::DataSource,
    error::Result,
    progress::{ProgressCallback, ProgressUpdate},
    smart_search,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "WordNet lookup CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Store to query: wnsql, gwn or omw
    #[arg(short, long, global = true, default_value = "wnsql")]
    store: StoreKind,

    /// Print results as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Data home directory (defaults to $YAWLIB_HOME or the platform data dir)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Path to the Princeton WordNet SQL database
    #[arg(long, global = true)]
    wnsql: Option<PathBuf>,

    /// Path to the gloss corpus SQLite database
    #[arg(long, global = true)]
    gwn_db: Option<PathBuf>,

    /// Folder holding the merged gloss corpus XML files
    #[arg(long, global = true)]
    gwn_xml: Option<PathBuf>,

    /// Path to the Open Multilingual WordNet database
    #[arg(long, global = true)]
    omw: Option<PathBuf>,

    /// Set verbosity level (use -v, -vv, or -vvv for increasing verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find synsets by id, then sense key, then lemma/definition/example text
    Lookup {
        query: String,
        /// Part of speech filter (n, v, a, r, s or a long name)
        #[arg(short, long)]
        pos: Option<PartOfSpeech>,
        /// Language code (multilingual store only)
        #[arg(short, long)]
        lang: Option<String>,
    },
    /// Show one synset by id, in any supported id format
    Synset {
        id: String,
        #[arg(short, long)]
        lang: Option<String>,
    },
    /// Show the synset a sense key belongs to
    Key { sensekey: String },
    /// Search lemmas, or definitions/examples; `%` is a wildcard
    Search {
        pattern: String,
        #[arg(short, long)]
        pos: Option<PartOfSpeech>,
        #[arg(short, long)]
        lang: Option<String>,
        /// Where to search
        #[arg(long, value_enum, default_value_t = SearchField::Lemma)]
        field: SearchField,
        #[arg(long, default_value_t = false)]
        case_sensitive: bool,
    },
    /// Show hypernyms and/or hyponyms of a synset
    Related {
        id: String,
        #[arg(long, value_enum, default_value_t = Relation::Both)]
        relation: Relation,
        #[arg(short, long)]
        lang: Option<String>,
    },
    /// Import the gloss corpus XML into the gloss database
    Import {
        /// XML files (plain or .gz); defaults to the merged corpus folder
        files: Vec<PathBuf>,
        /// Clear and repopulate an existing database
        #[arg(long, default_value_t = false)]
        force_reload: bool,
        /// Skip raw glosses and per-token tag/lemma attributes
        #[arg(long, default_value_t = false)]
        memory_save: bool,
    },
    /// Show data file locations and their status
    Info,
    /// Delete the gloss database
    ClearGwn,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SearchField {
    Lemma,
    Def,
    Ex,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Relation {
    Hypernyms,
    Hyponyms,
    Both,
}

/// Sets up logging based on verbosity level.
fn setup_logging(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter(None, log_level)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

fn data_paths(cli: &Cli) -> Result<DataPaths> {
    let mut paths = match &cli.home {
        Some(home) => DataPaths::under(home),
        None => DataPaths::default_paths()?,
    };
    if let Some(p) = &cli.wnsql {
        paths.wnsql = p.clone();
    }
    if let Some(p) = &cli.gwn_db {
        paths.gwn_db = p.clone();
    }
    if let Some(p) = &cli.gwn_xml {
        paths.gwn_xml = p.clone();
    }
    if let Some(p) = &cli.omw {
        paths.omw = p.clone();
    }
    Ok(paths)
}

/// Creates a progress callback drawing one bar per import stage.
fn create_progress_callback(
    multi_progress: MultiProgress,
    progress_bars: Arc<Mutex<HashMap<String, ProgressBar>>>,
) -> ProgressCallback {
    Box::new(move |update: ProgressUpdate| {
        let Ok(mut bars) = progress_bars.lock() else {
            return true;
        };

        if update.current_item == 0 && !bars.contains_key(&update.stage_description) {
            let pb = multi_progress.add(ProgressBar::new(update.total_items.unwrap_or(0)));
            let style_template = if update.total_items.is_some() {
                "{prefix:>12.cyan.bold} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} ({percent}%) {msg}"
            } else {
                "{prefix:>12.cyan.bold} [{elapsed_precise}] {spinner} {msg}"
            };
            let style = ProgressStyle::default_bar()
                .template(style_template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-");
            pb.set_style(style);
            pb.set_prefix(update.stage_description.clone());
            pb.set_message(update.message.unwrap_or_default());
            pb.enable_steady_tick(Duration::from_millis(100));
            bars.insert(update.stage_description.clone(), pb);
        } else if let Some(pb) = bars.get(&update.stage_description) {
            pb.set_position(update.current_item);
            if let Some(msg) = update.message {
                pb.set_message(msg);
            }
            if update.total_items.is_some_and(|total| update.current_item >= total) {
                pb.finish_and_clear();
            }
        }
        true
    })
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        error!("Command failed: {}", e);
        eprintln!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let paths = data_paths(cli)?;
    debug!("Data paths: {:?}", paths);

    match &cli.command {
        Commands::Lookup { query, pos, lang } => {
            let wn = cli.store.open(&paths);
            let options = SearchOptions::default().with_pos(*pos).with_lang(lang.as_deref());
            let start = Instant::now();
            let synsets = smart_search(&*wn, query, &options)?;
            debug!("smart search for '{}' took {:?}", query, start.elapsed());
            print_synsets(&synsets, cli.json, query)
        }
        Commands::Synset { id, lang } => {
            let wn = cli.store.open(&paths);
            let id = SynsetId::parse(id)?;
            let synset = wn.get_synset(&id, lang.as_deref())?;
            print_synsets(&std::iter::once(synset).collect(), cli.json, &id.to_string())
        }
        Commands::Key { sensekey } => {
            let wn = cli.store.open(&paths);
            let synset = wn.get_by_key(sensekey)?;
            print_synsets(&std::iter::once(synset).collect(), cli.json, sensekey)
        }
        Commands::Search {
            pattern,
            pos,
            lang,
            field,
            case_sensitive,
        } => {
            let wn = cli.store.open(&paths);
            let mut options = SearchOptions::default().with_pos(*pos).with_lang(lang.as_deref());
            if *case_sensitive {
                options = options.case_sensitive();
            }
            let synsets = match field {
                SearchField::Lemma => wn.search(pattern, &options)?,
                SearchField::Def => wn.search_def(pattern, &options)?,
                SearchField::Ex => wn.search_ex(pattern, &options)?,
            };
            print_synsets(&synsets, cli.json, pattern)
        }
        Commands::Related { id, relation, lang } => {
            let wn = cli.store.open(&paths);
            let id = SynsetId::parse(id)?;
            let synsets = match relation {
                Relation::Hypernyms => wn.hypernyms(&id, lang.as_deref())?,
                Relation::Hyponyms => wn.hyponyms(&id, lang.as_deref())?,
                Relation::Both => wn.hypehypo(&id, lang.as_deref())?,
            };
            print_synsets(&synsets, cli.json, &id.to_string())
        }
        Commands::Import {
            files,
            force_reload,
            memory_save,
        } => handle_import(&paths, files, *force_reload, *memory_save),
        Commands::Info => handle_info(&paths),
        Commands::ClearGwn => {
            info!("Clearing gloss database...");
            DataSource::read_write(&paths.gwn_db).remove()?;
            println!("{}", "Gloss database cleared successfully.".green());
            Ok(())
        }
    }
}

fn handle_import(paths: &DataPaths, files: &[PathBuf], force_reload: bool, memory_save: bool) -> Result<()> {
    let files = if files.is_empty() {
        paths.gloss_xml_files()
    } else {
        files.to_vec()
    };
    if files.is_empty() {
        println!("No gloss XML files found in {}", paths.gwn_xml.display().to_string().yellow());
        return Ok(());
    }
    info!("Importing {} gloss file(s) into {:?}", files.len(), paths.gwn_db);

    let multi_progress = MultiProgress::new();
    let progress_bars = Arc::new(Mutex::new(HashMap::<String, ProgressBar>::new()));
    let callback = create_progress_callback(multi_progress.clone(), progress_bars.clone());

    let gwn = GlossWordnetSql::new(&paths.gwn_db);
    let options = ImportOptions {
        force_reload,
        memory_save,
    };
    let start = Instant::now();
    let result = gwn.import_xml(&files, &options, Some(callback));

    if let Ok(bars) = progress_bars.lock() {
        for pb in bars.values() {
            pb.finish_and_clear();
        }
    }
    drop(multi_progress);
    std::io::stdout().flush().ok();

    let inserted = result?;
    if inserted == 0 {
        println!(
            "Gloss database already populated; use {} to rebuild it.",
            "--force-reload".bold()
        );
    } else {
        println!(
            "{}",
            format!("Imported {} synsets in {:.2?}.", inserted, start.elapsed()).green()
        );
    }
    Ok(())
}

fn handle_info(paths: &DataPaths) -> Result<()> {
    for kind in StoreKind::ALL {
        let path = kind.db_path(paths);
        let status = if path.exists() {
            "present".green()
        } else {
            "missing".red()
        };
        println!("{:>6}: {} [{}]", kind.to_string().bold(), path.display(), status);
    }
    println!("{:>6}: {}", "xml".bold(), paths.gwn_xml.display());
    for file in paths.gloss_xml_files() {
        println!("        {}", file.display().to_string().dimmed());
    }
    if paths.gwn_db.exists() {
        let count = GlossWordnetSql::new(&paths.gwn_db).synset_count()?;
        println!("Gloss database holds {} synsets.", count.to_string().cyan());
    }
    Ok(())
}

fn print_synsets(synsets: &SynsetCollection, json: bool, query: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&synsets.to_json())?);
        return Ok(());
    }
    if synsets.is_empty() {
        println!("Nothing found for '{}'.", query.yellow());
        return Ok(());
    }
    for synset in synsets {
        print_synset(synset);
    }
    Ok(())
}

fn print_synset(synset: &Synset) {
    println!(
        "\n{} {}",
        synset.id().to_string().bold().cyan(),
        synset.lemmas().join(", ").bold()
    );
    if let Some(annotation) = synset.annotation() {
        for domain in annotation.domain() {
            println!("  {}", domain.surface().dimmed());
        }
    }
    if let Some(def) = synset.definition() {
        println!("  {}", def.trim());
    }
    for example in synset.examples() {
        println!("        {}", example.trim().italic());
    }
    if let Some(annotation) = synset.annotation() {
        for aux in annotation.aux() {
            println!("        {}", aux.surface().dimmed());
        }
    }
    if !synset.sensekeys().is_empty() {
        println!("  {}: {}", "Keys".magenta(), synset.sensekeys().join(", ").green());
    }
    if synset.tagcount > 0 {
        println!("  {}: {}", "Tag count".magenta(), synset.tagcount);
    }
}

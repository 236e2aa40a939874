//! Token-level annotation of synset glosses.
//!
//! A glossed synset owns raw gloss strings plus structured glosses. Each
//! structured gloss holds an ordered item list and the sense tags that point
//! into it. Tags refer to items by index, so the item list is append-only.

use crate::error::{Result, YawlError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

// --- Categories ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawGlossCategory {
    Orig,
    Text,
}

impl RawGlossCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RawGlossCategory::Orig => "orig",
            RawGlossCategory::Text => "text",
        }
    }
}

impl FromStr for RawGlossCategory {
    type Err = YawlError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "orig" => Ok(RawGlossCategory::Orig),
            "text" => Ok(RawGlossCategory::Text),
            _ => Err(YawlError::DataIntegrity(format!("unknown raw gloss category `{}'", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlossCategory {
    #[serde(rename = "def")]
    Definition,
    #[serde(rename = "ex")]
    Example,
    #[serde(rename = "aux")]
    Auxiliary,
    #[serde(rename = "classif")]
    Domain,
}

impl GlossCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            GlossCategory::Definition => "def",
            GlossCategory::Example => "ex",
            GlossCategory::Auxiliary => "aux",
            GlossCategory::Domain => "classif",
        }
    }
}

impl fmt::Display for GlossCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GlossCategory {
    type Err = YawlError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "def" => Ok(GlossCategory::Definition),
            "ex" => Ok(GlossCategory::Example),
            "aux" => Ok(GlossCategory::Auxiliary),
            "classif" => Ok(GlossCategory::Domain),
            _ => Err(YawlError::DataIntegrity(format!("unknown gloss category `{}'", s))),
        }
    }
}

/// Kind of a sense tag. Stored as its marker string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagKind {
    Word,
    Collocation,
    PurposefullyIgnored,
    Other(String),
}

pub const PURPOSEFULLY_IGNORED_SK: &str = "purposefully_ignored%0:00:00::";

impl TagKind {
    pub fn as_str(&self) -> &str {
        match self {
            TagKind::Word => "",
            TagKind::Collocation => "cf",
            TagKind::PurposefullyIgnored => "PURPOSEFULLY_IGNORED",
            TagKind::Other(s) => s,
        }
    }
}

impl From<&str> for TagKind {
    fn from(s: &str) -> Self {
        match s {
            "" => TagKind::Word,
            "cf" => TagKind::Collocation,
            "PURPOSEFULLY_IGNORED" => TagKind::PurposefullyIgnored,
            other => TagKind::Other(other.to_string()),
        }
    }
}

// --- Raw gloss ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossRaw {
    pub cat: RawGlossCategory,
    pub gloss: String,
}

// --- Gloss item ---

/// One token of a gloss. Missing attributes are `None`, never empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlossItem {
    pub id: Option<i64>,
    pub(crate) order: usize,
    pub tag: Option<String>,
    pub lemma: Option<String>,
    pub pos: Option<String>,
    pub cat: Option<String>,
    pub coll: Option<String>,
    pub rdf: Option<String>,
    pub sep: Option<String>,
    pub text: Option<String>,
    pub origid: Option<String>,
}

impl GlossItem {
    /// Position within the owning gloss, assigned when the item is added.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn is_punctuation(&self) -> bool {
        self.cat.as_deref() == Some("punc")
    }

    /// Surface text, or the lemma when the item has no text.
    pub fn get_lemma(&self) -> Option<&str> {
        self.text.as_deref().or(self.lemma.as_deref())
    }

    /// Lemma forms without sense suffixes: `perform%2|performs` -> `perform`, `performs`.
    pub fn gramwords(&self) -> Vec<String> {
        let mut words: Vec<String> = Vec::new();
        if self.is_punctuation() {
            return words;
        }
        let Some(lemma) = self.lemma.as_deref() else {
            return words;
        };
        for form in lemma.split('|') {
            let word = form.split('%').next().unwrap_or_default().trim();
            if !word.is_empty() && !words.iter().any(|w| w == word) {
                words.push(word.to_string());
            }
        }
        words
    }
}

// --- Sense tag ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenseTag {
    pub id: Option<i64>,
    pub kind: TagKind,
    pub tag: Option<String>,
    pub glob: Option<String>,
    pub glob_lemma: Option<String>,
    pub glob_id: Option<String>,
    pub coll: Option<String>,
    pub origid: Option<String>,
    pub sk: Option<String>,
    pub lemma: Option<String>,
    item: usize,
}

impl SenseTag {
    pub fn new(kind: TagKind) -> Self {
        SenseTag {
            id: None,
            kind,
            tag: None,
            glob: None,
            glob_lemma: None,
            glob_id: None,
            coll: None,
            origid: None,
            sk: None,
            lemma: None,
            item: 0,
        }
    }

    /// Index of the tagged item within its gloss.
    pub fn item(&self) -> usize {
        self.item
    }
}

// --- Gloss ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gloss {
    pub id: Option<i64>,
    pub origid: Option<String>,
    pub cat: GlossCategory,
    items: Vec<GlossItem>,
    tags: Vec<SenseTag>,
    surface: Option<String>,
}

impl Gloss {
    pub fn new(origid: Option<String>, cat: GlossCategory) -> Self {
        Gloss {
            id: None,
            origid,
            cat,
            items: Vec::new(),
            tags: Vec::new(),
            surface: None,
        }
    }

    /// Appends an item and returns its index.
    pub fn add_item(&mut self, mut item: GlossItem) -> usize {
        let idx = self.items.len();
        item.order = idx;
        self.items.push(item);
        idx
    }

    /// Attaches a sense tag to the item at `item`.
    pub fn tag_item(&mut self, item: usize, mut tag: SenseTag) -> Result<&mut SenseTag> {
        if item >= self.items.len() {
            return Err(YawlError::DataIntegrity(format!(
                "sense tag points at item {} but gloss has {} items",
                item,
                self.items.len()
            )));
        }
        tag.item = item;
        self.tags.push(tag);
        let last = self.tags.len() - 1;
        Ok(&mut self.tags[last])
    }

    pub fn items(&self) -> &[GlossItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [GlossItem] {
        &mut self.items
    }

    pub fn tags(&self) -> &[SenseTag] {
        &self.tags
    }

    pub fn set_surface(&mut self, surface: Option<String>) {
        self.surface = surface;
    }

    /// Text rebuilt from the items' surface forms.
    pub fn text(&self) -> String {
        detokenize(self.items.iter().filter_map(GlossItem::get_lemma))
    }

    /// Stored surface string, falling back to the rebuilt text.
    pub fn surface(&self) -> Cow<'_, str> {
        match &self.surface {
            Some(s) => Cow::Borrowed(s.as_str()),
            None => Cow::Owned(self.text()),
        }
    }

    pub fn gramwords(&self) -> Vec<String> {
        self.items.iter().flat_map(GlossItem::gramwords).collect()
    }

    pub fn tagged_sensekeys(&self) -> Vec<&str> {
        self.tags.iter().filter_map(|t| t.sk.as_deref()).collect()
    }

    /// Items covered by `tag`: every item in its collocation group, or the single tagged item.
    pub fn tagged_items(&self, tag: &SenseTag) -> Vec<&GlossItem> {
        match tag.coll.as_deref().filter(|c| !c.is_empty()) {
            Some(coll) => self
                .items
                .iter()
                .filter(|item| item.coll.as_deref().is_some_and(|c| c.split(',').any(|g| g == coll)))
                .collect(),
            None => self.items.get(tag.item).into_iter().collect(),
        }
    }
}

// --- Annotation ---

/// Gloss data attached to a synset imported from the gloss corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlossAnnotation {
    raw_glosses: Vec<GlossRaw>,
    glosses: Vec<Gloss>,
}

impl GlossAnnotation {
    pub fn add_raw_gloss(&mut self, cat: RawGlossCategory, gloss: &str) {
        self.raw_glosses.push(GlossRaw {
            cat,
            gloss: gloss.to_string(),
        });
    }

    pub fn add_gloss(&mut self, gloss: Gloss) -> &mut Gloss {
        self.glosses.push(gloss);
        let last = self.glosses.len() - 1;
        &mut self.glosses[last]
    }

    pub fn raw_glosses(&self) -> &[GlossRaw] {
        &self.raw_glosses
    }

    pub fn glosses(&self) -> &[Gloss] {
        &self.glosses
    }

    pub fn raw(&self, cat: RawGlossCategory) -> Option<&str> {
        self.raw_glosses.iter().find(|r| r.cat == cat).map(|r| r.gloss.as_str())
    }

    /// The untokenized gloss as it appears in WordNet.
    pub fn surface(&self) -> Option<&str> {
        self.raw(RawGlossCategory::Orig)
    }

    pub fn by_category(&self, cat: GlossCategory) -> impl Iterator<Item = &Gloss> {
        self.glosses.iter().filter(move |g| g.cat == cat)
    }

    pub fn definition_gloss(&self) -> Option<&Gloss> {
        self.by_category(GlossCategory::Definition).next()
    }

    pub fn definition(&self) -> Option<String> {
        self.definition_gloss().map(|g| g.surface().into_owned())
    }

    pub fn example_glosses(&self) -> Vec<&Gloss> {
        self.by_category(GlossCategory::Example).collect()
    }

    pub fn examples(&self) -> Vec<String> {
        self.by_category(GlossCategory::Example)
            .map(|g| g.surface().into_owned())
            .collect()
    }

    pub fn aux(&self) -> Vec<&Gloss> {
        self.by_category(GlossCategory::Auxiliary).collect()
    }

    pub fn domain(&self) -> Vec<&Gloss> {
        self.by_category(GlossCategory::Domain).collect()
    }

    pub fn gramwords(&self) -> Vec<String> {
        self.glosses.iter().flat_map(Gloss::gramwords).collect()
    }

    pub fn tagged_sensekeys(&self) -> Vec<&str> {
        self.glosses.iter().flat_map(Gloss::tagged_sensekeys).collect()
    }

    /// A synset has at most one definition gloss.
    pub fn validate(&self) -> Result<()> {
        let defs = self.by_category(GlossCategory::Definition).count();
        if defs > 1 {
            return Err(YawlError::DataIntegrity(format!(
                "found {} definition glosses, expected at most one",
                defs
            )));
        }
        Ok(())
    }
}

/// Joins tokens with single spaces, gluing punctuation to its neighbours.
pub fn detokenize<'a>(tokens: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    let mut glue_next = true;
    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let glue_prev = matches!(token, ";" | "," | "." | ":" | "!" | "?" | ")" | "]" | "}" | "'s" | "n't")
            || (token.starts_with('\'') && token.len() <= 3);
        if !glue_next && !glue_prev {
            out.push(' ');
        }
        out.push_str(token);
        glue_next = matches!(token, "(" | "[" | "{");
    }
    out
}

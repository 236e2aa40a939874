use crate::error::{Result, YawlError};
use crate::gloss::GlossAnnotation;
use regex::Regex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

// --- Part of Speech ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    N, // Noun
    V, // Verb
    A, // Adjective
    R, // Adverb
    S, // Adjective Satellite
    X, // Other / unclassified
}

impl PartOfSpeech {
    pub const ALL: [PartOfSpeech; 6] = [
        PartOfSpeech::N,
        PartOfSpeech::V,
        PartOfSpeech::A,
        PartOfSpeech::R,
        PartOfSpeech::S,
        PartOfSpeech::X,
    ];

    /// Single letter tag used by the canonical and gloss corpus encodings.
    pub fn letter(self) -> char {
        match self {
            PartOfSpeech::N => 'n',
            PartOfSpeech::V => 'v',
            PartOfSpeech::A => 'a',
            PartOfSpeech::R => 'r',
            PartOfSpeech::S => 's',
            PartOfSpeech::X => 'x',
        }
    }

    /// Single digit (1-6) used as the leading numeral of WordNet SQL synset ids.
    pub fn digit(self) -> char {
        match self {
            PartOfSpeech::N => '1',
            PartOfSpeech::V => '2',
            PartOfSpeech::A => '3',
            PartOfSpeech::R => '4',
            PartOfSpeech::S => '5',
            PartOfSpeech::X => '6',
        }
    }

    pub fn from_letter(c: char) -> Result<Self> {
        match c {
            'n' => Ok(PartOfSpeech::N),
            'v' => Ok(PartOfSpeech::V),
            'a' => Ok(PartOfSpeech::A),
            'r' => Ok(PartOfSpeech::R),
            's' => Ok(PartOfSpeech::S),
            'x' => Ok(PartOfSpeech::X),
            _ => Err(YawlError::InvalidPartOfSpeech(c.to_string())),
        }
    }

    pub fn from_digit(c: char) -> Result<Self> {
        match c {
            '1' => Ok(PartOfSpeech::N),
            '2' => Ok(PartOfSpeech::V),
            '3' => Ok(PartOfSpeech::A),
            '4' => Ok(PartOfSpeech::R),
            '5' => Ok(PartOfSpeech::S),
            '6' => Ok(PartOfSpeech::X),
            _ => Err(YawlError::InvalidPartOfSpeech(c.to_string())),
        }
    }

    /// Accepts either representation: a POS letter or a POS digit.
    pub fn from_marker(c: char) -> Result<Self> {
        if c.is_ascii_digit() {
            Self::from_digit(c)
        } else {
            Self::from_letter(c)
        }
    }
}

impl fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PartOfSpeech::N => "noun",
                PartOfSpeech::V => "verb",
                PartOfSpeech::A => "adjective",
                PartOfSpeech::R => "adverb",
                PartOfSpeech::S => "adjective satellite",
                PartOfSpeech::X => "other",
            }
        )
    }
}

// Implement FromStr for PartOfSpeech for CLI parsing etc.
impl FromStr for PartOfSpeech {
    type Err = YawlError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "n" | "1" | "noun" => Ok(PartOfSpeech::N),
            "v" | "2" | "verb" => Ok(PartOfSpeech::V),
            "a" | "3" | "adj" | "adjective" => Ok(PartOfSpeech::A),
            "r" | "4" | "adv" | "adverb" => Ok(PartOfSpeech::R),
            "s" | "5" | "adj_sat" | "adjective_satellite" => Ok(PartOfSpeech::S),
            "x" | "6" | "other" => Ok(PartOfSpeech::X),
            _ => Err(YawlError::InvalidPartOfSpeech(s.to_string())),
        }
    }
}

impl FromSql for PartOfSpeech {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => PartOfSpeech::from_letter(c).map_err(|e| FromSqlError::Other(Box::new(e))),
            _ => Err(FromSqlError::Other(Box::new(YawlError::InvalidPartOfSpeech(text.to_string())))),
        }
    }
}

// --- Synset Identifier ---

// Leading POS marker (digit or letter) followed by the offset: 400001740, r00001740
static WNSQL_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<pos>[1-6nvarsx])(?P<offset>[0-9]{8})$").expect("valid regex"));
// Offset and POS letter with an optional hyphen, either order: 00001740-r, 00001740r, r-00001740
static CANONICAL_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<offset>[0-9]{8})-?(?P<pos>[nvarsx])|(?P<lpos>[nvarsx])-(?P<loffset>[0-9]{8}))$")
        .expect("valid regex")
});

const MAX_OFFSET: u32 = 99_999_999;

/// A synset identifier normalized to `(offset, pos)`.
///
/// Every accepted textual encoding parses to the same value, so equality,
/// hashing and ordering never depend on how the id was written. Ordering is
/// by offset first and part of speech second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SynsetId {
    offset: u32,
    pos: PartOfSpeech,
}

impl SynsetId {
    pub fn new(offset: u32, pos: PartOfSpeech) -> Result<Self> {
        if offset > MAX_OFFSET {
            return Err(YawlError::InvalidIdentifierFormat(format!("{}-{}", offset, pos.letter())));
        }
        Ok(SynsetId { offset, pos })
    }

    /// Parses any of the accepted encodings.
    ///
    /// The numeric-prefix grammar (`400001740`, `r00001740`) is tried first,
    /// then the canonical grammar (`00001740-r`, `00001740r`).
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(YawlError::NullIdentifier);
        }
        if let Some(caps) = WNSQL_FORMAT.captures(input) {
            return Self::from_parts(&caps["offset"], &caps["pos"]);
        }
        if let Some(caps) = CANONICAL_FORMAT.captures(input) {
            let (offset, pos) = match (caps.name("offset"), caps.name("pos")) {
                (Some(offset), Some(pos)) => (offset.as_str(), pos.as_str()),
                _ => (&caps["loffset"], &caps["lpos"]),
            };
            return Self::from_parts(offset, pos);
        }
        Err(YawlError::InvalidIdentifierFormat(input.to_string()))
    }

    /// Like [`SynsetId::parse`] but treats an absent input as `NullIdentifier`.
    pub fn parse_opt(input: Option<&str>) -> Result<Self> {
        match input {
            Some(s) => Self::parse(s),
            None => Err(YawlError::NullIdentifier),
        }
    }

    /// Returns `default` instead of failing on absent or malformed input.
    pub fn parse_or(input: Option<&str>, default: SynsetId) -> SynsetId {
        Self::parse_opt(input).unwrap_or(default)
    }

    fn from_parts(offset: &str, pos: &str) -> Result<Self> {
        let marker = pos
            .chars()
            .next()
            .ok_or_else(|| YawlError::InvalidIdentifierFormat(offset.to_string()))?;
        let pos = PartOfSpeech::from_marker(marker)?;
        let offset: u32 = offset
            .parse()
            .map_err(|_| YawlError::InvalidIdentifierFormat(offset.to_string()))?;
        Ok(SynsetId { offset, pos })
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn pos(&self) -> PartOfSpeech {
        self.pos
    }

    /// Canonical format `12345678-n`, also the key used by Open Multilingual WordNet.
    pub fn to_canonical(&self) -> String {
        format!("{:08}-{}", self.offset, self.pos.letter())
    }

    /// WordNet SQL format `112345678` (POS digit + offset).
    pub fn to_wnsql(&self) -> String {
        format!("{}{:08}", self.pos.digit(), self.offset)
    }

    /// Gloss WordNet SQLite format `n12345678` (POS letter + offset).
    pub fn to_gwnsql(&self) -> String {
        format!("{}{:08}", self.pos.letter(), self.offset)
    }
}

impl fmt::Display for SynsetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}-{}", self.offset, self.pos.letter())
    }
}

impl FromStr for SynsetId {
    type Err = YawlError;
    fn from_str(s: &str) -> Result<Self> {
        SynsetId::parse(s)
    }
}

impl TryFrom<&str> for SynsetId {
    type Error = YawlError;
    fn try_from(value: &str) -> Result<Self> {
        SynsetId::parse(value)
    }
}

impl Serialize for SynsetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical())
    }
}

impl<'de> Deserialize<'de> for SynsetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SynsetId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// Synset ids come back as INTEGER from WordNet SQL and as TEXT from the other stores.
impl FromSql for SynsetId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let parsed = match value {
            ValueRef::Integer(i) => SynsetId::parse(&i.to_string()),
            ValueRef::Text(_) => SynsetId::parse(value.as_str()?),
            _ => return Err(FromSqlError::InvalidType),
        };
        parsed.map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

// --- Synset ---

/// One lexical concept.
///
/// A synset built from the gloss corpus carries a [`GlossAnnotation`]; its
/// definition and examples are then derived from the gloss segments instead
/// of the plain definition/example lists.
#[derive(Debug, Clone)]
pub struct Synset {
    id: SynsetId,
    lemmas: Vec<String>,
    sensekeys: Vec<String>,
    definitions: Vec<String>,
    examples: Vec<String>,
    pub tagcount: u32,
    lang: String,
    annotation: Option<GlossAnnotation>,
}

impl Synset {
    pub fn new(id: SynsetId) -> Self {
        Synset {
            id,
            lemmas: Vec::new(),
            sensekeys: Vec::new(),
            definitions: Vec::new(),
            examples: Vec::new(),
            tagcount: 0,
            lang: "eng".to_string(),
            annotation: None,
        }
    }

    /// Creates a synset carrying an empty gloss annotation.
    pub fn glossed(id: SynsetId) -> Self {
        let mut synset = Synset::new(id);
        synset.annotation = Some(GlossAnnotation::default());
        synset
    }

    pub fn with_lang(mut self, lang: &str) -> Self {
        self.lang = lang.to_string();
        self
    }

    pub fn id(&self) -> SynsetId {
        self.id
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn lemmas(&self) -> &[String] {
        &self.lemmas
    }

    /// The canonical lemma (first lemma).
    pub fn lemma(&self) -> Option<&str> {
        self.lemmas.first().map(String::as_str)
    }

    pub fn set_lemma(&mut self, lemma: &str) {
        match self.lemmas.first_mut() {
            Some(first) => *first = lemma.to_string(),
            None => self.lemmas.push(lemma.to_string()),
        }
    }

    pub fn add_lemma(&mut self, lemma: &str) {
        self.lemmas.push(lemma.to_string());
    }

    pub fn sensekeys(&self) -> &[String] {
        &self.sensekeys
    }

    pub fn add_key(&mut self, key: &str) {
        self.sensekeys.push(key.to_string());
    }

    /// Stored definitions. Empty for glossed synsets, see [`Synset::definition`].
    pub fn definitions(&self) -> &[String] {
        &self.definitions
    }

    pub fn add_definition(&mut self, definition: &str) {
        self.definitions.push(definition.to_string());
    }

    /// Replaces the definitions by splitting `value` on `;`.
    pub fn set_definition(&mut self, value: &str) {
        self.definitions = value.split(';').map(|d| d.trim().to_string()).collect();
    }

    pub fn add_example(&mut self, example: &str) {
        self.examples.push(example.to_string());
    }

    pub fn definition(&self) -> Option<String> {
        match &self.annotation {
            Some(annotation) => annotation.definition(),
            None if self.definitions.is_empty() => None,
            None => Some(self.definitions.join("; ")),
        }
    }

    pub fn examples(&self) -> Vec<String> {
        match &self.annotation {
            Some(annotation) => annotation.examples(),
            None => self.examples.clone(),
        }
    }

    pub fn has_glosses(&self) -> bool {
        self.annotation.is_some()
    }

    pub fn annotation(&self) -> Option<&GlossAnnotation> {
        self.annotation.as_ref()
    }

    pub fn annotation_mut(&mut self) -> Option<&mut GlossAnnotation> {
        self.annotation.as_mut()
    }

    pub fn set_annotation(&mut self, annotation: GlossAnnotation) {
        self.annotation = Some(annotation);
    }

    /// Lemmas followed by the words of multi-word lemmas, without duplicates.
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = Vec::new();
        let words = self.lemmas.iter().filter(|l| l.contains(' ')).flat_map(|l| l.split_whitespace());
        for token in self.lemmas.iter().map(String::as_str).chain(words) {
            if !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }
        tokens
    }

    pub fn to_json(&self) -> SynsetJson {
        SynsetJson {
            synsetid: self.id.to_canonical(),
            definition: self.definition().unwrap_or_default(),
            lemmas: self.lemmas.clone(),
            sensekeys: self.sensekeys.clone(),
            tagcount: self.tagcount,
            examples: self.examples(),
        }
    }
}

impl PartialEq for Synset {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Synset {}

impl Hash for Synset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Synset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lemma() {
            Some(lemma) => write!(f, "{} ({})", self.id, lemma),
            None => write!(f, "Synset('{}')", self.id),
        }
    }
}

/// JSON export shape consumed by web front-ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynsetJson {
    pub synsetid: String,
    pub definition: String,
    pub lemmas: Vec<String>,
    pub sensekeys: Vec<String>,
    pub tagcount: u32,
    pub examples: Vec<String>,
}

// --- Synset Collection ---

/// Insertion-ordered synsets indexed by id and by sense key.
///
/// The first synset added for an id wins; adding the same id again is a no-op.
#[derive(Debug, Clone, Default)]
pub struct SynsetCollection {
    synsets: Vec<Synset>,
    sid_map: HashMap<SynsetId, usize>,
    sk_map: HashMap<String, usize>,
}

impl SynsetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when a synset with the same id is already present.
    pub fn add(&mut self, synset: Synset) -> bool {
        if self.sid_map.contains_key(&synset.id) {
            return false;
        }
        let idx = self.synsets.len();
        self.sid_map.insert(synset.id, idx);
        for key in &synset.sensekeys {
            self.sk_map.entry(key.clone()).or_insert(idx);
        }
        self.synsets.push(synset);
        true
    }

    pub fn get(&self, id: &SynsetId) -> Option<&Synset> {
        self.sid_map.get(id).map(|&idx| &self.synsets[idx])
    }

    /// Lookup by any accepted id encoding.
    pub fn get_str(&self, id: &str) -> Result<Option<&Synset>> {
        let id = SynsetId::parse(id)?;
        Ok(self.get(&id))
    }

    pub fn contains(&self, id: &SynsetId) -> bool {
        self.sid_map.contains_key(id)
    }

    pub fn by_key(&self, sensekey: &str) -> Option<&Synset> {
        self.sk_map.get(sensekey).map(|&idx| &self.synsets[idx])
    }

    pub fn merge(&mut self, other: SynsetCollection) -> &mut Self {
        for synset in other.synsets {
            self.add(synset);
        }
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Synset> {
        self.synsets.iter()
    }

    pub fn first(&self) -> Option<&Synset> {
        self.synsets.first()
    }

    pub fn len(&self) -> usize {
        self.synsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synsets.is_empty()
    }

    pub fn ids(&self) -> Vec<SynsetId> {
        self.synsets.iter().map(Synset::id).collect()
    }

    pub fn to_json(&self) -> Vec<SynsetJson> {
        self.synsets.iter().map(Synset::to_json).collect()
    }
}

impl FromIterator<Synset> for SynsetCollection {
    fn from_iter<I: IntoIterator<Item = Synset>>(iter: I) -> Self {
        let mut collection = SynsetCollection::new();
        for synset in iter {
            collection.add(synset);
        }
        collection
    }
}

impl IntoIterator for SynsetCollection {
    type Item = Synset;
    type IntoIter = std::vec::IntoIter<Synset>;
    fn into_iter(self) -> Self::IntoIter {
        self.synsets.into_iter()
    }
}

impl<'a> IntoIterator for &'a SynsetCollection {
    type Item = &'a Synset;
    type IntoIter = std::slice::Iter<'a, Synset>;
    fn into_iter(self) -> Self::IntoIter {
        self.synsets.iter()
    }
}

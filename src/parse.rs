//! Reader for the WordNet Gloss Corpus XML files.
//!
//! The files are streamed with quick-xml. Each `<synset>` subtree is collected
//! into a small element tree and then converted into a glossed [`Synset`].

use crate::error::{Result, YawlError};
use crate::gloss::{Gloss, GlossAnnotation, GlossCategory, GlossItem, PURPOSEFULLY_IGNORED_SK, RawGlossCategory, SenseTag, TagKind};
use crate::models::{Synset, SynsetCollection, SynsetId};
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Options for reading gloss XML.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParseOptions {
    /// Skip raw glosses and per-token tag/lemma attributes.
    pub memory_save: bool,
}

// --- Element tree for one synset ---

#[derive(Debug, Clone)]
enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone)]
struct XmlElement {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attrs.push((key, value));
        }
        Ok(XmlElement {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    /// Trimmed attribute value; empty values count as absent.
    fn attr(&self, key: &str) -> Option<String> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.name == name)
    }

    /// Concatenated text of all descendants, trimmed.
    fn text(&self) -> String {
        fn collect(el: &XmlElement, out: &mut String) {
            for child in &el.children {
                match child {
                    XmlNode::Text(t) => out.push_str(t),
                    XmlNode::Element(e) => collect(e, out),
                }
            }
        }
        let mut out = String::new();
        collect(self, &mut out);
        out.trim().to_string()
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

// --- Streaming reader ---

/// Reads every synset in `input` into `synsets`. Returns the number of new synsets.
///
/// Synsets already present in the collection are kept; later duplicates are
/// dropped with a warning.
pub fn read_gloss_xml<R: BufRead>(input: R, options: ParseOptions, synsets: &mut SynsetCollection) -> Result<usize> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut added = 0;

    let mut finish = |el: XmlElement, synsets: &mut SynsetCollection| -> Result<()> {
        let synset = build_synset(&el, options)?;
        let id = synset.id();
        if synsets.add(synset) {
            added += 1;
        } else {
            warn!("Duplicate synset {} in gloss XML, keeping the first one", id);
        }
        Ok(())
    };

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if !stack.is_empty() || e.name().as_ref() == b"synset" {
                    stack.push(XmlElement::from_start(&e)?);
                }
            }
            Event::Empty(e) => {
                let el = XmlElement::from_start(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(el)),
                    None if el.name == "synset" => finish(el, synsets)?,
                    None => {}
                }
            }
            Event::Text(t) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(t.unescape()?.into_owned()));
                }
            }
            Event::CData(c) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(String::from_utf8_lossy(&c).into_owned()));
                }
            }
            Event::End(_) => {
                if let Some(el) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Element(el)),
                        None => finish(el, synsets)?,
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if !stack.is_empty() {
        return Err(YawlError::DataIntegrity(format!(
            "gloss XML ended inside <{}>",
            stack[0].name
        )));
    }
    Ok(added)
}

/// Parses gloss XML held in memory.
pub fn parse_gloss_str(xml: &str, options: ParseOptions) -> Result<SynsetCollection> {
    let mut synsets = SynsetCollection::new();
    read_gloss_xml(xml.as_bytes(), options, &mut synsets)?;
    Ok(synsets)
}

/// Opens a gloss file, transparently decompressing `.gz` files.
pub fn open_gloss_file(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(BufReader::new(file)))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

pub fn read_gloss_file(path: &Path, options: ParseOptions, synsets: &mut SynsetCollection) -> Result<usize> {
    info!("Loading gloss file {:?}", path);
    let added = read_gloss_xml(open_gloss_file(path)?, options, synsets)?;
    debug!("Read {} synsets from {:?}", added, path);
    Ok(added)
}

/// Reads several gloss files into one collection, in the given order.
pub fn read_gloss_files<P: AsRef<Path>>(paths: &[P], options: ParseOptions) -> Result<SynsetCollection> {
    let mut synsets = SynsetCollection::new();
    for path in paths {
        read_gloss_file(path.as_ref(), options, &mut synsets)?;
    }
    Ok(synsets)
}

// --- Tree to model ---

fn build_synset(el: &XmlElement, options: ParseOptions) -> Result<Synset> {
    let id = SynsetId::parse_opt(el.attr("id").as_deref())?;
    let mut synset = Synset::new(id);
    let mut annotation = GlossAnnotation::default();

    for child in el.elements() {
        match (child.name.as_str(), child.attr("desc").as_deref()) {
            ("terms", _) => {
                for term in child.named("term") {
                    synset.add_lemma(&term.text());
                }
            }
            ("keys", _) => {
                for sk in child.named("sk") {
                    synset.add_key(&sk.text());
                }
            }
            ("gloss", Some("orig")) if !options.memory_save => {
                if let Some(orig) = child.elements().next().filter(|e| e.name == "orig") {
                    annotation.add_raw_gloss(RawGlossCategory::Orig, &orig.text());
                }
            }
            ("gloss", Some("text")) if !options.memory_save => {
                if let Some(text) = child.elements().next().filter(|e| e.name == "text") {
                    annotation.add_raw_gloss(RawGlossCategory::Text, &text.text());
                }
            }
            ("gloss", Some("wsd")) => {
                for part in child.elements() {
                    let Ok(cat) = part.name.parse::<GlossCategory>() else {
                        warn!("Unknown gloss part <{}> in synset {} skipped", part.name, id);
                        continue;
                    };
                    let mut gloss = Gloss::new(part.attr("id"), cat);
                    for node in part.elements() {
                        parse_node(node, &mut gloss, options)?;
                    }
                    annotation.add_gloss(gloss);
                }
            }
            _ => {}
        }
    }
    synset.set_annotation(annotation);
    Ok(synset)
}

/// Dispatches on the five token node kinds. `mwf`, `qf` and `aux` only group other nodes.
fn parse_node(node: &XmlElement, gloss: &mut Gloss, options: ParseOptions) -> Result<()> {
    match node.name.as_str() {
        "wf" => parse_wf(node, gloss, options),
        "cf" => parse_cf(node, gloss, options),
        "mwf" | "qf" | "aux" => {
            for child in node.elements() {
                parse_node(child, gloss, options)?;
            }
            Ok(())
        }
        other => {
            warn!("Unrecognized gloss node <{}> skipped", other);
            Ok(())
        }
    }
}

fn base_item(node: &XmlElement, options: ParseOptions) -> GlossItem {
    GlossItem {
        tag: if options.memory_save { None } else { node.attr("tag") },
        lemma: if options.memory_save { None } else { node.attr("lemma") },
        pos: node.attr("pos"),
        cat: node.attr("type"),
        rdf: node.attr("rdf"),
        sep: node.attr("sep"),
        text: non_empty(node.text()),
        origid: node.attr("id"),
        ..Default::default()
    }
}

fn parse_wf(node: &XmlElement, gloss: &mut Gloss, options: ParseOptions) -> Result<()> {
    let idx = gloss.add_item(base_item(node, options));
    for id_node in node.named("id") {
        let tag = fill_from_id(id_node, SenseTag::new(TagKind::Word));
        gloss.tag_item(idx, tag)?;
    }
    Ok(())
}

fn parse_cf(node: &XmlElement, gloss: &mut Gloss, options: ParseOptions) -> Result<()> {
    let mut item = base_item(node, options);
    item.coll = node.attr("coll");
    let idx = gloss.add_item(item);
    for glob in node.named("glob") {
        let mut tag = SenseTag::new(TagKind::Collocation);
        tag.tag = glob.attr("tag");
        tag.glob = glob.attr("glob");
        tag.glob_lemma = glob.attr("lemma");
        tag.glob_id = glob.attr("id");
        tag.coll = glob.attr("coll");
        for id_node in glob.named("id") {
            tag = fill_from_id(id_node, tag);
        }
        gloss.tag_item(idx, tag)?;
    }
    Ok(())
}

fn fill_from_id(id_node: &XmlElement, mut tag: SenseTag) -> SenseTag {
    tag.sk = id_node.attr("sk");
    tag.origid = id_node.attr("id");
    tag.lemma = id_node.attr("lemma");
    if let Some(coll) = id_node.attr("coll") {
        tag.coll = Some(coll);
    }
    if tag.lemma.as_deref() == Some("purposefully ignored") && tag.sk.as_deref() == Some(PURPOSEFULLY_IGNORED_SK) {
        tag.kind = TagKind::PurposefullyIgnored;
    }
    tag
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SMALL_GLOSS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<wordnet>
  <synset id="r00001740" ofs="00001740" pos="r">
    <terms><term>a cappella</term></terms>
    <keys><sk>a_cappella%4:02:00::</sk></keys>
    <gloss desc="orig"><orig>without musical accompaniment; "they performed a cappella"</orig></gloss>
    <gloss desc="text"><text>without musical accompaniment; they performed a cappella</text></gloss>
    <gloss desc="wsd">
      <def id="r00001740_d">
        <wf id="r00001740_wf1" lemma="without%4" pos="IN" tag="ignore">without</wf>
        <cf coll="a" id="r00001740_wf2" lemma="musical%3" pos="JJ" tag="ignore">musical<glob coll="a" glob="man" id="r00001740_coll.a" lemma="musical_accompaniment%1" tag="man"><id coll="a" id="r00001740_id.1" lemma="musical accompaniment" sk="musical_accompaniment%1:10:00::"/></glob></cf>
        <cf coll="a" id="r00001740_wf3" lemma="accompaniment%1" pos="NN" tag="ignore">accompaniment</cf>
        <wf id="r00001740_wf4" type="punc">;</wf>
      </def>
      <ex id="r00001740_ex1">
        <qf rend="dq">
          <wf id="r00001740_wf5" lemma="they%1" pos="PRP" tag="ignore">they</wf>
          <wf id="r00001740_wf6" lemma="perform%2" pos="VBD" tag="un">performed</wf>
          <cf coll="b" id="r00001740_wf7" lemma="a%1" tag="ignore">a<glob coll="b" glob="auto" id="r00001740_coll.b" lemma="a_cappella%3|a_cappella%4" tag="auto"><id coll="b" id="r00001740_id.2" lemma="a cappella" sk="a_cappella%4:02:00::"/></glob></cf>
          <cf coll="b" id="r00001740_wf8" lemma="cappella%1" tag="ignore">cappella</cf>
        </qf>
        <wf id="r00001740_wf9" type="punc">;</wf>
      </ex>
    </gloss>
  </synset>
  <synset id="n99999999" ofs="99999999" pos="n">
    <terms><term>oddity</term></terms>
    <keys><sk>oddity%1:00:00::</sk></keys>
    <gloss desc="wsd">
      <def id="n99999999_d">
        <wf id="n99999999_wf1" lemma="odd%3" pos="JJ" tag="man">odd<id id="n99999999_id.1" lemma="purposefully ignored" sk="purposefully_ignored%0:00:00::"/></wf>
        <blip>unknown</blip>
        <wf id="n99999999_wf2" lemma="thing%1" pos="NN" tag="man">thing<id id="n99999999_id.2" lemma="thing" sk="thing%1:03:00::"/></wf>
      </def>
    </gloss>
  </synset>
  <synset id="n99999999" ofs="99999999" pos="n">
    <terms><term>duplicate</term></terms>
  </synset>
</wordnet>
"#;

    #[test]
    fn test_parse_synset_structure() {
        let synsets = parse_gloss_str(SMALL_GLOSS_XML, ParseOptions::default()).unwrap();
        assert_eq!(synsets.len(), 2);
        let ss = synsets.get_str("00001740-r").unwrap().unwrap();
        assert_eq!(ss.lemma(), Some("a cappella"));
        assert_eq!(ss.sensekeys(), ["a_cappella%4:02:00::"]);
        let ann = ss.annotation().unwrap();
        assert_eq!(ann.glosses().len(), 2);
        assert_eq!(ann.raw_glosses().len(), 2);
        assert_eq!(
            ann.raw(RawGlossCategory::Orig),
            Some("without musical accompaniment; \"they performed a cappella\"")
        );

        let ex = &ann.glosses()[1];
        assert_eq!(ex.cat, GlossCategory::Example);
        assert_eq!(ex.origid.as_deref(), Some("r00001740_ex1"));
        assert_eq!(ex.items().len(), 5);
        assert_eq!(ex.text(), "they performed a cappella;");
        assert_eq!(ex.gramwords(), vec!["they", "perform", "a", "cappella"]);
        assert_eq!(ex.items()[1].get_lemma(), Some("performed"));
        assert_eq!(ex.items()[4].cat.as_deref(), Some("punc"));

        assert_eq!(ss.definition().as_deref(), Some("without musical accompaniment;"));
        assert_eq!(ann.tagged_sensekeys(), vec!["musical_accompaniment%1:10:00::", "a_cappella%4:02:00::"]);
    }

    #[test]
    fn test_glob_tag_links_collocation() {
        let synsets = parse_gloss_str(SMALL_GLOSS_XML, ParseOptions::default()).unwrap();
        let ss = synsets.get_str("r00001740").unwrap().unwrap();
        let ex = &ss.annotation().unwrap().glosses()[1];
        let tag = &ex.tags()[0];
        assert_eq!(tag.kind, TagKind::Collocation);
        assert_eq!(tag.lemma.as_deref(), Some("a cappella"));
        assert_eq!(tag.sk.as_deref(), Some("a_cappella%4:02:00::"));
        assert_eq!(tag.glob.as_deref(), Some("auto"));
        assert_eq!(tag.glob_lemma.as_deref(), Some("a_cappella%3|a_cappella%4"));
        assert_eq!(tag.glob_id.as_deref(), Some("r00001740_coll.b"));
        assert_eq!(tag.origid.as_deref(), Some("r00001740_id.2"));
        assert_eq!(tag.item(), 2);
        let covered: Vec<&str> = ex.tagged_items(tag).iter().filter_map(|i| i.text.as_deref()).collect();
        assert_eq!(covered, vec!["a", "cappella"]);
    }

    #[test]
    fn test_purposefully_ignored_and_unknown_nodes() {
        let synsets = parse_gloss_str(SMALL_GLOSS_XML, ParseOptions::default()).unwrap();
        let ss = synsets.get_str("99999999-n").unwrap().unwrap();
        // the duplicate synset does not replace the first one
        assert_eq!(ss.lemma(), Some("oddity"));
        let def = ss.annotation().unwrap().definition_gloss().unwrap();
        // <blip> is skipped
        assert_eq!(def.items().len(), 2);
        assert_eq!(def.tags()[0].kind, TagKind::PurposefullyIgnored);
        assert_eq!(def.tags()[1].kind, TagKind::Word);
        assert_eq!(def.tags()[1].item(), 1);
    }

    #[test]
    fn test_stray_token_between_gloss_parts_is_skipped() {
        let xml = r#"<wordnet><synset id="r00001740" ofs="00001740" pos="r">
  <gloss desc="wsd">
    <def id="r00001740_d"><wf id="r00001740_wf1">without</wf></def>
    <wf id="r00001740_wf2" type="punc">;</wf>
    <ex id="r00001740_ex1"><wf id="r00001740_wf3">they</wf></ex>
  </gloss>
</synset></wordnet>"#;
        let synsets = parse_gloss_str(xml, ParseOptions::default()).unwrap();
        let ann = synsets.get_str("r00001740").unwrap().unwrap().annotation().unwrap();
        let cats: Vec<GlossCategory> = ann.glosses().iter().map(|g| g.cat).collect();
        assert_eq!(cats, vec![GlossCategory::Definition, GlossCategory::Example]);
        assert_eq!(ann.definition().as_deref(), Some("without"));
    }

    #[test]
    fn test_memory_save_drops_raw_glosses() {
        let options = ParseOptions { memory_save: true };
        let synsets = parse_gloss_str(SMALL_GLOSS_XML, options).unwrap();
        let ss = synsets.get_str("r00001740").unwrap().unwrap();
        let ann = ss.annotation().unwrap();
        assert!(ann.raw_glosses().is_empty());
        assert!(ann.glosses()[0].items()[0].lemma.is_none());
        assert_eq!(ann.glosses()[0].items()[0].text.as_deref(), Some("without"));
    }

    #[test]
    fn test_invalid_synset_id_is_an_error() {
        let xml = r#"<wordnet><synset id="q123"><terms><term>x</term></terms></synset></wordnet>"#;
        let err = parse_gloss_str(xml, ParseOptions::default()).unwrap_err();
        assert!(matches!(err, YawlError::InvalidIdentifierFormat(_)));
    }

    #[test]
    fn test_read_gz_file() {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adv.xml.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(SMALL_GLOSS_XML.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let synsets = read_gloss_files(&[&path], ParseOptions::default()).unwrap();
        assert_eq!(synsets.len(), 2);
        assert!(synsets.by_key("a_cappella%4:02:00::").is_some());
    }
}

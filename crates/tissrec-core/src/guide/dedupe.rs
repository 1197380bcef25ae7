//! Duplicate-guide detection and removal.
//!
//! A guide in the base document is a duplicate when its identity key also
//! appears among the guides of any comparison document. Removal rewrites
//! the base document event-for-event, dropping only the matched guide
//! subtrees so the rest of the file survives byte-faithfully.

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::error::{Result, XmlError};
use crate::models::summary::GuideAudit;
use crate::xml::{self, local_name, Element};

/// Guides of the base set whose identity key occurs in the other set.
pub fn find_duplicates(base: &[GuideAudit], others: &[GuideAudit]) -> Vec<GuideAudit> {
    let other_keys: HashSet<&str> = others.iter().filter_map(GuideAudit::identity_key).collect();
    base.iter()
        .filter(|guide| {
            guide
                .identity_key()
                .is_some_and(|key| other_keys.contains(key))
        })
        .cloned()
        .collect()
}

/// Guide element names and the identity keys found inside each.
const GUIDE_TAGS: [&str; 3] = ["guiaConsulta", "guiaSP-SADT", "recursoGuia"];

fn element_keys<'a>(tag: &str, guide: &'a Element) -> Vec<&'a str> {
    let keys = match tag {
        "guiaConsulta" => vec![guide.find_text("numeroGuiaPrestador")],
        "guiaSP-SADT" => vec![
            guide
                .find("cabecalhoGuia")
                .map(|header| header.child_text("numeroGuiaPrestador"))
                .unwrap_or(""),
        ],
        "recursoGuia" => vec![
            guide.find_text("numeroGuiaOrigem"),
            guide.find_text("numeroGuiaOperadora"),
        ],
        _ => Vec::new(),
    };
    keys.into_iter().filter(|key| !key.is_empty()).collect()
}

/// Rewrite a document with the listed duplicate guides removed.
///
/// Everything outside the removed guide subtrees is copied through the
/// event stream untouched, preserving the original formatting.
pub fn remove_guides(bytes: &[u8], duplicates: &[GuideAudit]) -> Result<Vec<u8>> {
    let keys: HashSet<&str> = duplicates
        .iter()
        .filter_map(GuideAudit::identity_key)
        .collect();
    let root = xml::parse(bytes)?;
    let marked = removal_ordinals(&root, &keys);

    let mut reader = Reader::from_reader(bytes);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut removed = 0usize;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| XmlError::Malformed(e.to_string()))?
        {
            Event::Eof => break,
            Event::Start(start) => {
                let name = local_name(start.name().as_ref());
                if should_remove(&marked, &mut seen, &name) {
                    let end = start.to_end().into_owned();
                    reader
                        .read_to_end_into(end.name(), &mut skip_buf)
                        .map_err(|e| XmlError::Malformed(e.to_string()))?;
                    removed += 1;
                } else {
                    writer
                        .write_event(Event::Start(start))
                        .map_err(|e| XmlError::Malformed(e.to_string()))?;
                }
            }
            Event::Empty(empty) => {
                let name = local_name(empty.name().as_ref());
                if should_remove(&marked, &mut seen, &name) {
                    removed += 1;
                } else {
                    writer
                        .write_event(Event::Empty(empty))
                        .map_err(|e| XmlError::Malformed(e.to_string()))?;
                }
            }
            event => {
                writer
                    .write_event(event)
                    .map_err(|e| XmlError::Malformed(e.to_string()))?;
            }
        }
        buf.clear();
    }

    info!("removed {removed} duplicated guide(s)");
    Ok(writer.into_inner())
}

/// Per-tag ordinals (document order) of the guide elements to drop.
fn removal_ordinals(root: &Element, keys: &HashSet<&str>) -> HashMap<&'static str, HashSet<usize>> {
    let mut marked: HashMap<&'static str, HashSet<usize>> = HashMap::new();
    for tag in GUIDE_TAGS {
        for (index, guide) in root.find_all(tag).into_iter().enumerate() {
            if element_keys(tag, guide).iter().any(|key| keys.contains(key)) {
                marked.entry(tag).or_default().insert(index);
            }
        }
    }
    marked
}

/// Count this occurrence of `name` and report whether it is marked.
fn should_remove(
    marked: &HashMap<&'static str, HashSet<usize>>,
    seen: &mut HashMap<String, usize>,
    name: &str,
) -> bool {
    if !GUIDE_TAGS.contains(&name) {
        return false;
    }
    let counter = seen.entry(name.to_string()).or_insert(0);
    let index = *counter;
    *counter += 1;
    marked.get(name).is_some_and(|ordinals| ordinals.contains(&index))
}

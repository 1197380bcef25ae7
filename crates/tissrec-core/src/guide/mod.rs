//! TISS guide extraction: classification, totals, summaries, audit,
//! duplicate removal.

mod audit;
mod classify;
mod dedupe;
mod extract;
mod totals;

pub use audit::{audit_bytes, audit_document};
pub use classify::classify;
pub use dedupe::{find_duplicates, remove_guides};
pub use extract::{parse_document, parse_many, summarize};
pub use totals::{sadt_guide_total, TotalStrategy};

use crate::xml::Element;

/// The `guiaRecursoGlosa` block under the provider envelope, when present.
pub(crate) fn appeal_guide(root: &Element) -> Option<&Element> {
    root.find("prestadorParaOperadora")?
        .child("recursoGlosa")?
        .child("guiaRecursoGlosa")
}

/// Guides of the given name inside the submission batch
/// (`prestadorParaOperadora/loteGuias/guiasTISS`).
pub(crate) fn batch_guides<'a>(root: &'a Element, guide_name: &str) -> Vec<&'a Element> {
    let Some(batch) = root
        .find("prestadorParaOperadora")
        .and_then(|p| p.path(&["loteGuias", "guiasTISS"]))
    else {
        return Vec::new();
    };
    batch.children().filter(|c| c.name() == guide_name).collect()
}

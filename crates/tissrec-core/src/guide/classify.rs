//! Document kind classification.

use super::appeal_guide;
use crate::models::summary::DocumentKind;
use crate::xml::Element;

/// Transaction type declared by glosa-appeal submissions.
const APPEAL_TRANSACTION: &str = "RECURSO_GLOSA";

/// Assign exactly one kind to a parsed document.
///
/// First match wins. Appeal runs first because an appeal block can coexist
/// structurally with consultation/SADT guide markers.
pub fn classify(root: &Element) -> DocumentKind {
    if is_appeal(root) {
        DocumentKind::Appeal
    } else if root.find("guiaConsulta").is_some() {
        DocumentKind::Consultation
    } else if root.find("guiaSP-SADT").is_some() {
        DocumentKind::Sadt
    } else {
        DocumentKind::Unknown
    }
}

fn is_appeal(root: &Element) -> bool {
    let transaction = root
        .find("cabecalho")
        .map(|c| c.path_text(&["identificacaoTransacao", "tipoTransacao"]))
        .unwrap_or("");
    if transaction.eq_ignore_ascii_case(APPEAL_TRANSACTION) {
        return true;
    }
    appeal_guide(root).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    fn doc(body: &str) -> Element {
        let raw = format!(
            r#"<ans:mensagemTISS xmlns:ans="http://www.ans.gov.br/padroes/tiss/schemas">{body}</ans:mensagemTISS>"#
        );
        xml::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn consultation_marker() {
        let root = doc(
            "<ans:prestadorParaOperadora><ans:loteGuias><ans:guiasTISS>
                <ans:guiaConsulta/>
            </ans:guiasTISS></ans:loteGuias></ans:prestadorParaOperadora>",
        );
        assert_eq!(classify(&root), DocumentKind::Consultation);
    }

    #[test]
    fn sadt_marker() {
        let root = doc(
            "<ans:prestadorParaOperadora><ans:loteGuias><ans:guiasTISS>
                <ans:guiaSP-SADT/>
            </ans:guiasTISS></ans:loteGuias></ans:prestadorParaOperadora>",
        );
        assert_eq!(classify(&root), DocumentKind::Sadt);
    }

    #[test]
    fn appeal_by_transaction_type_is_case_insensitive() {
        let root = doc(
            "<ans:cabecalho><ans:identificacaoTransacao>
                <ans:tipoTransacao>recurso_glosa</ans:tipoTransacao>
            </ans:identificacaoTransacao></ans:cabecalho>",
        );
        assert_eq!(classify(&root), DocumentKind::Appeal);
    }

    #[test]
    fn appeal_block_wins_over_other_markers() {
        let root = doc(
            "<ans:prestadorParaOperadora>
                <ans:recursoGlosa><ans:guiaRecursoGlosa/></ans:recursoGlosa>
                <ans:loteGuias><ans:guiasTISS><ans:guiaConsulta/></ans:guiasTISS></ans:loteGuias>
            </ans:prestadorParaOperadora>",
        );
        assert_eq!(classify(&root), DocumentKind::Appeal);
    }

    #[test]
    fn no_marker_is_unknown() {
        let root = doc("<ans:cabecalho/>");
        assert_eq!(classify(&root), DocumentKind::Unknown);
    }
}

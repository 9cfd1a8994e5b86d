//! Link Extractor: hyperlink targets from PDF annotations, without the model.

use lopdf::{Document, Object};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Upper bound on links carried into a run.
pub const MAX_LINKS: usize = 16;

/// Collects `/Link` annotation URIs page by page, first occurrence wins.
/// Any failure to read the document yields an empty list.
pub fn extract_pdf_links(bytes: &[u8]) -> Vec<String> {
    match collect_pdf_links(bytes) {
        Ok(links) => bound(links),
        Err(e) => {
            warn!("Link extraction failed, continuing without links: {e}");
            Vec::new()
        }
    }
}

/// Finds http(s) URLs written in plain text.
pub fn extract_text_links(text: &str) -> Vec<String> {
    static URL_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"https?://[^\s<>\)\]]+[^\s<>\)\]\.\,;]").unwrap());

    bound(URL_RE.find_iter(text).map(|m| m.as_str().to_string()))
}

fn collect_pdf_links(bytes: &[u8]) -> Result<Vec<String>, lopdf::Error> {
    let doc = Document::load_mem(bytes)?;
    let mut links = Vec::new();

    // get_pages is keyed by page number, so iteration follows page order.
    for (_, page_id) in doc.get_pages() {
        let Ok(page) = doc.get_dictionary(page_id) else {
            continue;
        };
        let Ok(annots) = page.get(b"Annots") else {
            continue;
        };
        let Ok(annots) = resolve(&doc, annots).as_array() else {
            continue;
        };

        for annot in annots {
            let Ok(annot) = resolve(&doc, annot).as_dict() else {
                continue;
            };
            let is_link = annot
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map(|name| name == b"Link")
                .unwrap_or(false);
            if !is_link {
                continue;
            }
            let Ok(action) = annot.get(b"A") else {
                continue;
            };
            let Ok(action) = resolve(&doc, action).as_dict() else {
                continue;
            };
            let Ok(uri) = action.get(b"URI") else {
                continue;
            };
            if let Object::String(raw, _) = resolve(&doc, uri) {
                let uri = String::from_utf8_lossy(raw).trim().to_string();
                if !uri.is_empty() {
                    links.push(uri);
                }
            }
        }
    }

    Ok(links)
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Dedupes in first-seen order and caps at `MAX_LINKS`.
fn bound(links: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for link in links {
        if out.len() == MAX_LINKS {
            break;
        }
        if out.contains(&link) {
            continue;
        }
        out.push(link);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn link_annotation(doc: &mut Document, uri: &str) -> Object {
        doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => vec![0.into(), 0.into(), 100.into(), 12.into()],
            "A" => dictionary! {
                "S" => "URI",
                "URI" => Object::string_literal(uri),
            },
        })
        .into()
    }

    /// Builds a PDF whose pages carry the given link annotations, plus one
    /// non-link annotation on the first page.
    fn pdf_with_links(pages: &[&[&str]]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();

        for (index, uris) in pages.iter().enumerate() {
            let mut annots: Vec<Object> = uris.iter().map(|u| link_annotation(&mut doc, u)).collect();
            if index == 0 {
                annots.push(
                    doc.add_object(dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Text",
                        "Contents" => Object::string_literal("a sticky note"),
                    })
                    .into(),
                );
            }
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Annots" => annots,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_extracts_links_in_page_order() {
        let pdf = pdf_with_links(&[
            &["https://github.com/ada"],
            &["https://linkedin.com/in/ada", "https://ada.dev"],
        ]);
        assert_eq!(
            extract_pdf_links(&pdf),
            vec![
                "https://github.com/ada",
                "https://linkedin.com/in/ada",
                "https://ada.dev"
            ]
        );
    }

    #[test]
    fn test_repeated_links_dropped() {
        let pdf = pdf_with_links(&[&["https://ada.dev"], &["https://ada.dev"]]);
        assert_eq!(extract_pdf_links(&pdf), vec!["https://ada.dev"]);
    }

    #[test]
    fn test_non_link_annotations_ignored() {
        let pdf = pdf_with_links(&[&[]]);
        assert!(extract_pdf_links(&pdf).is_empty());
    }

    #[test]
    fn test_garbage_input_yields_empty_list() {
        assert!(extract_pdf_links(b"definitely not a pdf").is_empty());
    }

    #[test]
    fn test_text_links_found_and_trailing_punctuation_dropped() {
        let text = "Portfolio: https://ada.dev, code at https://github.com/ada. Again https://ada.dev";
        assert_eq!(
            extract_text_links(text),
            vec!["https://ada.dev", "https://github.com/ada"]
        );
    }

    #[test]
    fn test_links_are_bounded() {
        let text: String = (0..40)
            .map(|i| format!("https://example.com/{i} "))
            .collect();
        assert_eq!(extract_text_links(&text).len(), MAX_LINKS);
    }
}

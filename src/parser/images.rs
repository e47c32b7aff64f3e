//! Enumeration of image XObjects referenced by a PDF page.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;

/// Raw image data pulled out of a page's resources.
pub(crate) struct PageImage {
    /// Object id of the image stream; stable across pages that share it.
    pub(crate) xref: ObjectId,
    /// Encoded image bytes as stored in the stream.
    pub(crate) bytes: Vec<u8>,
    /// Best-effort format label derived from the stream filter.
    pub(crate) format: &'static str,
}

/// Collect the image XObjects reachable from a page, in resource order.
pub(crate) fn page_images(document: &Document, page_id: ObjectId) -> Vec<PageImage> {
    let Ok((direct, referenced)) = document.get_page_resources(page_id) else {
        return Vec::new();
    };

    let mut resource_dicts: Vec<&Dictionary> = Vec::new();
    if let Some(dict) = direct {
        resource_dicts.push(dict);
    }
    for id in referenced {
        if let Ok(object) = document.get_object(id)
            && let Ok(dict) = object.as_dict()
        {
            resource_dicts.push(dict);
        }
    }

    let mut seen: HashSet<ObjectId> = HashSet::new();
    let mut found = Vec::new();

    for resources in resource_dicts {
        let Ok(xobjects) = resources.get(b"XObject") else {
            continue;
        };
        let xobjects = match resolve_dict(document, xobjects) {
            Some(dict) => dict,
            None => continue,
        };

        for (_name, entry) in xobjects.iter() {
            let Ok(xref) = entry.as_reference() else {
                continue;
            };
            if !seen.insert(xref) {
                continue;
            }
            let Ok(stream) = document
                .get_object(xref)
                .and_then(|object| object.as_stream())
            else {
                continue;
            };

            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(|object| object.as_name())
                .map(|name| name == b"Image")
                .unwrap_or(false);
            if !is_image {
                continue;
            }

            found.push(PageImage {
                xref,
                bytes: stream.content.clone(),
                format: image_format(&stream.dict),
            });
        }
    }

    found
}

fn resolve_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => document
            .get_object(*id)
            .and_then(|resolved| resolved.as_dict())
            .ok(),
        _ => None,
    }
}

/// Map the stream filter to a format label usable in a `data:` URL.
fn image_format(dict: &Dictionary) -> &'static str {
    let filter_matches = |name: &[u8]| -> bool {
        match dict.get(b"Filter") {
            Ok(Object::Name(filter)) => filter == name,
            Ok(Object::Array(filters)) => filters.iter().any(|entry| {
                matches!(entry, Object::Name(filter) if filter == name)
            }),
            _ => false,
        }
    };

    if filter_matches(b"DCTDecode") {
        "jpeg"
    } else if filter_matches(b"JPXDecode") {
        "jp2"
    } else {
        "png"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    fn build_doc_with_image() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            vec![0xFF, 0xD8, 0xFF, 0xE0],
        ));

        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        (doc, page_id)
    }

    #[test]
    fn finds_image_xobjects_with_format() {
        let (doc, page_id) = build_doc_with_image();
        let images = page_images(&doc, page_id);

        assert_eq!(images.len(), 1);
        assert_eq!(images[0].format, "jpeg");
        assert_eq!(images[0].bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn page_without_images_yields_nothing() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {},
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1,
            }),
        );

        assert!(page_images(&doc, page_id).is_empty());
    }

    #[test]
    fn unresolvable_page_yields_nothing() {
        let (doc, _) = build_doc_with_image();
        assert!(page_images(&doc, (9999, 0)).is_empty());
    }
}

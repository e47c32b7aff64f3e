//! PDF parsing into ordered per-page paragraph lists.
//!
//! Pages come out 1-based and in document order. Text is flattened into
//! paragraphs; embedded images can optionally be replaced by textual
//! descriptions from a vision-capable chat model so downstream processing
//! treats them uniformly as prose. Descriptions are cached per unique image
//! object within one parse call, so an image repeated across pages is only
//! analyzed once.

mod images;

use crate::llm::{ChatClient, describe_image};
use lopdf::Document;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Marker prepended to image-derived paragraphs.
pub const IMAGE_MARKER: &str = "[image description follows]";

/// Errors raised while turning a PDF into pages.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The file could not be opened or is not a readable PDF.
    #[error("Failed to open PDF: {0}")]
    Open(String),
    /// A page's content could not be extracted.
    #[error("Failed to extract text from page {page}: {message}")]
    Extract {
        /// 1-based page number that failed.
        page: u32,
        /// Underlying extraction error.
        message: String,
    },
}

/// One parsed page: its 1-based number and flattened paragraphs.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// 1-based page number, contiguous per document.
    pub page_number: u32,
    /// Paragraph texts in top-to-bottom order.
    pub paragraphs: Vec<String>,
}

/// Full parse result for one document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Number of pages in the source PDF, including empty ones.
    pub total_pages: u32,
    /// Parsed pages in document order.
    pub pages: Vec<ParsedPage>,
}

/// Vision model wiring used for image descriptions.
pub struct VisionConfig {
    /// Chat client capable of image input.
    pub client: Box<dyn ChatClient>,
    /// Vision model identifier.
    pub model: String,
}

/// Parses PDF bytes or files into [`ParsedDocument`] values.
#[derive(Default)]
pub struct PdfParser {
    vision: Option<VisionConfig>,
}

impl PdfParser {
    /// Create a parser without image analysis support.
    pub fn new() -> Self {
        Self { vision: None }
    }

    /// Create a parser that can describe embedded images.
    pub fn with_vision(vision: VisionConfig) -> Self {
        Self {
            vision: Some(vision),
        }
    }

    /// Parse a PDF file from disk.
    pub async fn parse_file(
        &self,
        path: &Path,
        analyze_images: bool,
    ) -> Result<ParsedDocument, ParseError> {
        let document = Document::load(path).map_err(|error| ParseError::Open(error.to_string()))?;
        self.parse_document(document, analyze_images).await
    }

    /// Parse a PDF held in memory.
    pub async fn parse_bytes(
        &self,
        bytes: &[u8],
        analyze_images: bool,
    ) -> Result<ParsedDocument, ParseError> {
        let document =
            Document::load_mem(bytes).map_err(|error| ParseError::Open(error.to_string()))?;
        self.parse_document(document, analyze_images).await
    }

    async fn parse_document(
        &self,
        document: Document,
        analyze_images: bool,
    ) -> Result<ParsedDocument, ParseError> {
        let page_map = document.get_pages();
        let total_pages = page_map.len() as u32;
        let mut pages = Vec::with_capacity(page_map.len());

        // Image descriptions are cached by object id for the duration of
        // this parse so repeated images cost one vision call.
        let mut description_cache: HashMap<lopdf::ObjectId, String> = HashMap::new();

        for (page_number, page_id) in page_map {
            let text = document
                .extract_text(&[page_number])
                .map_err(|error| ParseError::Extract {
                    page: page_number,
                    message: error.to_string(),
                })?;

            let mut paragraphs = split_paragraphs(&text);

            if analyze_images && let Some(vision) = &self.vision {
                for image in images::page_images(&document, page_id) {
                    let description = match description_cache.get(&image.xref) {
                        Some(cached) => {
                            tracing::debug!(page_number, xref = ?image.xref, "Using cached image description");
                            cached.clone()
                        }
                        None => {
                            let description = match describe_image(
                                vision.client.as_ref(),
                                &vision.model,
                                &image.bytes,
                                image.format,
                            )
                            .await
                            {
                                Ok(text) => text,
                                Err(error) => {
                                    tracing::warn!(page_number, error = %error, "Image analysis failed");
                                    format!("Error analyzing image: {error}")
                                }
                            };
                            description_cache.insert(image.xref, description.clone());
                            description
                        }
                    };

                    paragraphs.push(format!("{IMAGE_MARKER}\n{description}"));
                }
            }

            pages.push(ParsedPage {
                page_number,
                paragraphs,
            });
        }

        Ok(ParsedDocument { total_pages, pages })
    }
}

/// Split extracted page text into trimmed, non-empty paragraphs.
fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    pub(crate) fn text_page_content(lines: &[&str]) -> Vec<u8> {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![50.into(), 700.into()]),
        ];
        for line in lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("Td", vec![0.into(), (-20).into()]));
        }
        operations.push(Operation::new("ET", vec![]));
        Content { operations }.encode().expect("content encodes")
    }

    /// Build a minimal PDF with one text page per entry; an empty slice
    /// entry produces a page without any text operators.
    pub(crate) fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for lines in pages {
            let content = if lines.is_empty() {
                Content { operations: vec![] }.encode().expect("empty content")
            } else {
                text_page_content(lines)
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
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
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("pdf serializes");
        bytes
    }

    #[tokio::test]
    async fn parses_pages_in_order_with_one_based_numbers() {
        let bytes = build_pdf(&[&["First page text"], &["Second page text"]]);
        let parser = PdfParser::new();
        let parsed = parser.parse_bytes(&bytes, false).await.expect("parse");

        assert_eq!(parsed.total_pages, 2);
        assert_eq!(parsed.pages.len(), 2);
        assert_eq!(parsed.pages[0].page_number, 1);
        assert_eq!(parsed.pages[1].page_number, 2);
        assert!(parsed.pages[0].paragraphs.join(" ").contains("First page text"));
        assert!(parsed.pages[1].paragraphs.join(" ").contains("Second page text"));
    }

    #[tokio::test]
    async fn empty_page_yields_no_paragraphs() {
        let bytes = build_pdf(&[&["Has text"], &[]]);
        let parser = PdfParser::new();
        let parsed = parser.parse_bytes(&bytes, false).await.expect("parse");

        assert_eq!(parsed.total_pages, 2);
        assert!(!parsed.pages[0].paragraphs.is_empty());
        assert!(parsed.pages[1].paragraphs.is_empty());
    }

    #[tokio::test]
    async fn malformed_input_is_an_open_error() {
        let parser = PdfParser::new();
        let error = parser
            .parse_bytes(b"not a pdf at all", false)
            .await
            .expect_err("parse failure");
        assert!(matches!(error, ParseError::Open(_)));
    }

    #[test]
    fn split_paragraphs_drops_blank_segments() {
        let paragraphs = split_paragraphs("alpha\n\n  \n\nbeta gamma\n\n");
        assert_eq!(paragraphs, vec!["alpha".to_string(), "beta gamma".to_string()]);
    }
}

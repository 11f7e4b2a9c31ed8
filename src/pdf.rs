// src/pdf.rs
//
// Fixed-layout "listing package" document: address, MLS description,
// highlights and social caption on A4 pages using the built-in Helvetica font.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use thiserror::Error;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const WRAP_COLUMNS: usize = 90;

const TITLE_SIZE: i64 = 18;
const HEADING_SIZE: i64 = 13;
const BODY_SIZE: i64 = 10;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("pdf encoding failed: {0}")]
    Encode(#[from] lopdf::Error),
    #[error("pdf write failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ListingPackage {
    pub address: String,
    pub description_mls: String,
    pub bullets: Vec<String>,
    pub social_caption: String,
}

pub fn render_listing_package(package: &ListingPackage) -> Result<Vec<u8>, PdfError> {
    let mut pages = PageWriter::new();

    pages.text("Listing Package", TITLE_SIZE);
    pages.gap(6);
    pages.paragraph(&format!("Address: {}", package.address), BODY_SIZE);
    pages.gap(10);

    pages.text("MLS Description", HEADING_SIZE);
    pages.paragraph(&package.description_mls, BODY_SIZE);
    pages.gap(10);

    pages.text("Highlights", HEADING_SIZE);
    for bullet in &package.bullets {
        pages.paragraph(&format!("- {bullet}"), BODY_SIZE);
    }
    pages.gap(10);

    pages.text("Social Caption", HEADING_SIZE);
    pages.paragraph(&package.social_caption, BODY_SIZE);

    pages.finish()
}

struct PageWriter {
    done: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: i64,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            done: Vec::new(),
            current: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn gap(&mut self, points: i64) {
        self.y -= points;
    }

    fn paragraph(&mut self, text: &str, size: i64) {
        for raw_line in text.lines() {
            let wrapped = wrap(raw_line, WRAP_COLUMNS);
            if wrapped.is_empty() {
                self.gap(size);
            }
            for line in wrapped {
                self.text(&line, size);
            }
        }
    }

    fn text(&mut self, line: &str, size: i64) {
        let leading = size + size / 2;
        if self.y - leading < MARGIN {
            self.done.push(std::mem::take(&mut self.current));
            self.y = PAGE_HEIGHT - MARGIN;
        }
        self.y -= leading;

        self.current.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(size)]),
            Operation::new("Td", vec![Object::Integer(MARGIN), Object::Integer(self.y)]),
            Operation::new("Tj", vec![Object::string_literal(to_latin(line))]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn finish(mut self) -> Result<Vec<u8>, PdfError> {
        if !self.current.is_empty() || self.done.is_empty() {
            self.done.push(std::mem::take(&mut self.current));
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(self.done.len());
        for operations in self.done {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id: ObjectId = doc.add_object(dictionary! {
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
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(PAGE_WIDTH),
                    Object::Integer(PAGE_HEIGHT),
                ],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf)?;
        Ok(buf)
    }
}

/// Greedy word wrap. Words longer than `width` are split hard.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > width {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            lines.push(head);
        }
        if line.is_empty() {
            line = word;
        } else if line.chars().count() + 1 + word.chars().count() <= width {
            line.push(' ');
            line.push_str(&word);
        } else {
            lines.push(std::mem::replace(&mut line, word));
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// The standard Type1 fonts only cover a single-byte encoding.
fn to_latin(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => b'\'',
            '\u{201C}' | '\u{201D}' => b'"',
            '\u{2013}' | '\u{2014}' => b'-',
            c if c.is_ascii() && !c.is_ascii_control() => c as u8,
            _ => b'?',
        })
        .collect()
}

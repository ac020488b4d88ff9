//! Data structures describing the logical content of the rendered report.
//!
//! The types in this module mirror the building blocks the PDF exporter knows how to draw
//! (paragraphs, tables, images and page breaks) without referencing `genpdf` directly.  The
//! view layer produces them from [`crate::data::ReportData`]; the exporter and the text renderer
//! consume them.

use std::path::PathBuf;

/// A slice of text together with inline style attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    text: String,
    bold: bool,
    italic: bool,
}

impl Span {
    /// Creates a new span with the provided text and no styles applied.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Returns the raw text contained in this span.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_bold(&self) -> bool {
        self.bold
    }

    pub fn is_italic(&self) -> bool {
        self.italic
    }

    /// Marks the span as bold.
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Marks the span as italic.
    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }
}

/// Paragraph made of styled spans.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RichParagraph {
    spans: Vec<Span>,
    heading: bool,
}

impl RichParagraph {
    /// Creates a paragraph from the provided spans.
    pub fn new(spans: impl Into<Vec<Span>>) -> Self {
        Self {
            spans: spans.into(),
            ..Self::default()
        }
    }

    /// Creates a heading paragraph with a single bold span.
    pub fn heading(text: impl Into<String>) -> Self {
        Self {
            spans: vec![Span::new(text).bold()],
            heading: true,
        }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Whether the paragraph is rendered with the larger heading font.
    pub fn is_heading(&self) -> bool {
        self.heading
    }

    /// Concatenated text of all spans.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(Span::text).collect()
    }
}

/// Alternating styling applied to table body rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowStyle {
    Plain,
    Shaded,
}

impl RowStyle {
    /// Style of the body row at `index`, starting with [`RowStyle::Plain`].
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            RowStyle::Plain
        } else {
            RowStyle::Shaded
        }
    }
}

/// A single column of a [`TableBlock`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    /// Header text.
    pub title: String,
    /// Relative width compared to the other columns.
    pub weight: usize,
}

impl Column {
    pub fn new(title: impl Into<String>, weight: usize) -> Self {
        Self {
            title: title.into(),
            weight,
        }
    }
}

/// A body row of a [`TableBlock`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<String>,
    pub style: RowStyle,
}

/// Error returned when a row does not match the column count of its table.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("row has {actual} cells but the table declares {expected} columns")]
pub struct RowWidthMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// A table with a header row and alternating body rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableBlock {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl TableBlock {
    /// Creates an empty table with the given columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Appends a body row; its style alternates with the row index.
    pub fn push_row(&mut self, cells: Vec<String>) -> Result<(), RowWidthMismatch> {
        if cells.len() != self.columns.len() {
            return Err(RowWidthMismatch {
                expected: self.columns.len(),
                actual: cells.len(),
            });
        }
        let style = RowStyle::for_index(self.rows.len());
        self.rows.push(Row { cells, style });
        Ok(())
    }

    /// Rough number of text lines the table occupies when `total_chars` characters fit across
    /// the full table width.
    ///
    /// Used to keep tables on one page; it only needs to be in the right ballpark.
    pub fn estimated_lines(&self, total_chars: usize) -> usize {
        let header = self.wrapped_lines(self.columns.iter().map(|c| c.title.as_str()), total_chars);
        let body: usize = self
            .rows
            .iter()
            .map(|row| self.wrapped_lines(row.cells.iter().map(String::as_str), total_chars))
            .sum();
        header + body
    }

    fn wrapped_lines<'a>(&self, cells: impl Iterator<Item = &'a str>, total_chars: usize) -> usize {
        let total_weight = self.columns.iter().map(|c| c.weight).sum::<usize>().max(1);
        cells
            .zip(&self.columns)
            .map(|(text, column)| {
                let capacity = (total_chars * column.weight / total_weight).max(1);
                let chars = text.chars().count().max(1);
                (chars + capacity - 1) / capacity
            })
            .max()
            .unwrap_or(1)
    }
}

/// Where an image is read from.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageSource {
    /// Image loaded from raw bytes.
    Bytes(Vec<u8>),
    /// Image referenced by a file path.
    Path(PathBuf),
}

impl ImageSource {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }
}

/// An image with an optional caption.
///
/// The width is stored in millimetres; without one the exporter decides based on its chart
/// scale setting.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBlock {
    source: ImageSource,
    caption: Option<RichParagraph>,
    width_mm: Option<f64>,
}

impl ImageBlock {
    /// Creates an image block using the provided source.
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            caption: None,
            width_mm: None,
        }
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn caption(&self) -> Option<&RichParagraph> {
        self.caption.as_ref()
    }

    pub fn width_mm(&self) -> Option<f64> {
        self.width_mm
    }

    pub fn with_caption(mut self, caption: impl Into<Option<RichParagraph>>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn with_width_mm(mut self, width_mm: impl Into<Option<f64>>) -> Self {
        self.width_mm = width_mm.into();
        self
    }
}

/// Individual content blocks that make up sections and the cover.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Paragraph(RichParagraph),
    Table(TableBlock),
    Image(ImageBlock),
    PageBreak,
}

impl Block {
    /// Convenience helper for building a paragraph block.
    pub fn paragraph(spans: impl Into<Vec<Span>>) -> Self {
        Self::Paragraph(RichParagraph::new(spans))
    }

    /// Convenience helper for building a heading block.
    pub fn heading(text: impl Into<String>) -> Self {
        Self::Paragraph(RichParagraph::heading(text))
    }
}

/// The opening part of the report: title, introduction and glossary.
#[derive(Clone, Debug, PartialEq)]
pub struct Cover {
    title: String,
    subtitle: Option<String>,
    blocks: Vec<Block>,
}

impl Cover {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            blocks: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<Option<String>>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn with_blocks<I>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = Block>,
    {
        self.blocks.extend(blocks);
        self
    }
}

/// One titled part of the report, typically a single operation.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    identifier: Option<String>,
    title: String,
    blocks: Vec<Block>,
}

impl Section {
    /// Identifier used for bookmarks; the operation name for operation sections.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Iterates over the tables of the section.
    pub fn tables(&self) -> impl Iterator<Item = &TableBlock> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Table(table) => Some(table),
            _ => None,
        })
    }

    /// Iterates over the images of the section.
    pub fn images(&self) -> impl Iterator<Item = &ImageBlock> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Image(image) => Some(image),
            _ => None,
        })
    }

    /// Creates a builder that can inject an initial page break.
    pub fn builder(title: impl Into<String>) -> SectionBuilder {
        SectionBuilder::new(title)
    }
}

/// Builder for [`Section`] values.
///
/// Callers can opt-in to inserting a page break at the beginning of the section via
/// [`SectionBuilder::start_on_new_page`].
#[derive(Clone, Debug, Default)]
pub struct SectionBuilder {
    identifier: Option<String>,
    title: String,
    blocks: Vec<Block>,
    start_on_new_page: bool,
}

impl SectionBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn start_on_new_page(mut self, start_on_new_page: bool) -> Self {
        self.start_on_new_page = start_on_new_page;
        self
    }

    pub fn identifier(mut self, identifier: impl Into<Option<String>>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn push_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    /// Builds the final section, injecting a leading page break when requested.
    pub fn build(mut self) -> Section {
        if self.start_on_new_page && !matches!(self.blocks.first(), Some(Block::PageBreak)) {
            self.blocks.insert(0, Block::PageBreak);
        }

        Section {
            identifier: self.identifier,
            title: self.title,
            blocks: self.blocks,
        }
    }
}

/// A complete report ready to be rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportDocument {
    cover: Cover,
    sections: Vec<Section>,
}

impl ReportDocument {
    pub fn new(cover: Cover) -> Self {
        Self {
            cover,
            sections: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        self.cover.title()
    }

    pub fn cover(&self) -> &Cover {
        &self.cover
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn push_section(&mut self, section: Section) {
        self.sections.push(section);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_inserts_page_break() {
        let section = Section::builder("insert")
            .start_on_new_page(true)
            .push_block(Block::paragraph(Vec::<Span>::new()))
            .build();

        assert!(matches!(section.blocks().first(), Some(Block::PageBreak)));
    }

    #[test]
    fn builder_does_not_duplicate_page_break() {
        let section = Section::builder("insert")
            .start_on_new_page(true)
            .push_block(Block::PageBreak)
            .build();

        assert_eq!(section.blocks().len(), 1);
    }

    #[test]
    fn rows_alternate_styles() {
        let mut table = TableBlock::new(vec![Column::new("a", 1), Column::new("b", 1)]);
        for _ in 0..3 {
            table.push_row(vec!["1".into(), "2".into()]).unwrap();
        }
        let styles: Vec<_> = table.rows().iter().map(|row| row.style).collect();
        assert_eq!(
            styles,
            [RowStyle::Plain, RowStyle::Shaded, RowStyle::Plain]
        );
    }

    #[test]
    fn rejects_rows_of_wrong_width() {
        let mut table = TableBlock::new(vec![Column::new("a", 1)]);
        let err = table.push_row(vec![String::new(), String::new()]).unwrap_err();
        assert_eq!(err.expected, 1);
        assert_eq!(err.actual, 2);
        assert!(table.rows().is_empty());
    }

    #[test]
    fn estimates_wrapped_lines() {
        let mut table = TableBlock::new(vec![Column::new("x", 1), Column::new("y", 1)]);
        table
            .push_row(vec!["short".into(), "a".repeat(25)])
            .unwrap();
        // 20 characters across, 10 per column: header 1 line, body row 3 lines.
        assert_eq!(table.estimated_lines(20), 4);
    }
}

//! Export of a [`ReportDocument`] to PDF.
//!
//! The defaults reproduce the report's fixed export configuration: 10 mm margins on A4 portrait,
//! charts re-encoded as JPEG at quality 98, charts at their natural width, and tables and images
//! kept in one piece when they would otherwise straddle a page break.  The output file is named
//! `regression.pdf` unless configured otherwise.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use genpdf::elements::{Break, FrameCellDecorator, PageBreak, Paragraph, TableLayout};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{Alignment, Element, Margins, PaperSize, Size};
use log::{debug, info, warn};

use crate::builder::DocumentBuilder;
use crate::elements::{
    self, mm_from_f64, mm_to_f64, AnchorPages, CaptionedImage, Extent, KeepTogether, PageAnchor,
    PageCounter,
};
use crate::error::{ReportError, Result};
use crate::model::{
    Block, ImageBlock, ImageSource, ReportDocument, RichParagraph, RowStyle, Span, TableBlock,
};

/// File name used when none is configured.
pub const DEFAULT_FILE_NAME: &str = "regression.pdf";

const DEFAULT_MARGIN_MM: f64 = 10.0;
const DEFAULT_IMAGE_QUALITY: u8 = 98;
const BODY_FONT_SIZE: u8 = 10;
const HEADING_FONT_SIZE: u8 = 14;
const TITLE_FONT_SIZE: u8 = 20;
const TABLE_FONT_SIZE: u8 = 7;
const DECORATION_FONT_SIZE: u8 = 8;
const FOOTER_HEIGHT_MM: f64 = 8.0;
const HEADER_ALLOWANCE_MM: f64 = 6.0;
/// Average glyph width relative to the font size, used to estimate table wrapping.
const AVERAGE_GLYPH_WIDTH: f64 = 0.5;
const PT_TO_MM: f64 = 25.4 / 72.0;
const CELL_PADDING_MM: f64 = 1.0;
/// Room reserved below a chart for its caption.
const CHART_CAPTION_ALLOWANCE_MM: f64 = 12.0;
/// Space above and below a chart.
const CHART_PADDING_MM: f64 = 2.0;

const SHADED_ROW_COLOR: Color = Color::Rgb(70, 90, 120);
const HEADER_ROW_COLOR: Color = Color::Rgb(20, 40, 80);
const PLACEHOLDER_COLOR: Color = Color::Rgb(160, 40, 40);

/// Page orientation of the exported document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// How chart images are sized on the page.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ChartScale {
    /// Natural size at the configured DPI, shrunk to the printable width when wider.
    #[default]
    NaturalWidth,
    /// Stretched or shrunk to exactly the printable width.
    FitWidth,
}

/// Block kinds that are moved to the next page rather than split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakAvoid {
    Table,
    Image,
}

/// What to do when a chart image file does not exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingAsset {
    /// Render a placeholder line naming the missing file and log a warning.
    #[default]
    Placeholder,
    /// Abort the export with [`ReportError::MissingAsset`].
    Fail,
}

/// Page margins in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarginsMm {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl MarginsMm {
    /// The same margin on every side.
    pub fn uniform(mm: f64) -> Self {
        Self {
            top: mm,
            right: mm,
            bottom: mm,
            left: mm,
        }
    }

    fn to_margins(self) -> Margins {
        Margins::trbl(
            mm_from_f64(self.top),
            mm_from_f64(self.right),
            mm_from_f64(self.bottom),
            mm_from_f64(self.left),
        )
    }
}

impl Default for MarginsMm {
    fn default() -> Self {
        Self::uniform(DEFAULT_MARGIN_MM)
    }
}

/// Fixed export configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportOptions {
    pub margins: MarginsMm,
    /// JPEG quality charts are re-encoded at; `None` embeds the decoded pixels unchanged.
    pub image_quality: Option<u8>,
    pub chart_scale: ChartScale,
    /// Resolution used to derive a chart's natural size from its pixel dimensions.
    pub chart_dpi: f64,
    pub avoid_page_breaks: Vec<BreakAvoid>,
    pub orientation: Orientation,
    pub file_name: String,
    pub missing_assets: MissingAsset,
    /// Add a PDF outline with one entry per section.
    #[cfg(feature = "bookmarks")]
    pub bookmarks: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            margins: MarginsMm::default(),
            image_quality: Some(DEFAULT_IMAGE_QUALITY),
            chart_scale: ChartScale::default(),
            chart_dpi: elements::DEFAULT_IMAGE_DPI,
            avoid_page_breaks: vec![BreakAvoid::Table, BreakAvoid::Image],
            orientation: Orientation::default(),
            file_name: DEFAULT_FILE_NAME.to_owned(),
            missing_assets: MissingAsset::default(),
            #[cfg(feature = "bookmarks")]
            bookmarks: true,
        }
    }
}

impl ExportOptions {
    pub fn with_margins(mut self, margins: MarginsMm) -> Self {
        self.margins = margins;
        self
    }

    pub fn with_image_quality(mut self, quality: Option<u8>) -> Self {
        self.image_quality = quality;
        self
    }

    pub fn with_chart_scale(mut self, chart_scale: ChartScale) -> Self {
        self.chart_scale = chart_scale;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_missing_assets(mut self, missing_assets: MissingAsset) -> Self {
        self.missing_assets = missing_assets;
        self
    }

    pub fn with_avoid_page_breaks(mut self, avoid: impl Into<Vec<BreakAvoid>>) -> Self {
        self.avoid_page_breaks = avoid.into();
        self
    }

    #[cfg(feature = "bookmarks")]
    pub fn with_bookmarks(mut self, bookmarks: bool) -> Self {
        self.bookmarks = bookmarks;
        self
    }

    /// Paper size after applying the orientation.
    pub fn paper_size(&self) -> Size {
        let a4: Size = PaperSize::A4.into();
        match self.orientation {
            Orientation::Portrait => a4,
            Orientation::Landscape => Size::new(a4.height, a4.width),
        }
    }

    /// Width available between the left and right margins.
    pub fn printable_width_mm(&self) -> f64 {
        mm_to_f64(self.paper_size().width) - self.margins.left - self.margins.right
    }

    /// Height available for content on every page, below the header and above the footer.
    pub fn page_body_height_mm(&self) -> f64 {
        mm_to_f64(self.paper_size().height)
            - self.margins.top
            - self.margins.bottom
            - FOOTER_HEIGHT_MM
            - HEADER_ALLOWANCE_MM
    }

    fn avoids(&self, kind: BreakAvoid) -> bool {
        self.avoid_page_breaks.contains(&kind)
    }
}

/// A rendered PDF together with layout facts gathered while rendering.
#[derive(Clone, Debug)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    /// Page each section started on (1-indexed), in section order.
    pub section_pages: Vec<Option<usize>>,
    /// Number of pages in the document.
    pub page_count: usize,
}

/// Renders report documents to PDF.
#[derive(Clone, Debug, Default)]
pub struct PdfExporter {
    options: ExportOptions,
}

impl PdfExporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Renders the document into memory.
    pub fn render(&self, document: &ReportDocument) -> Result<RenderedPdf> {
        let counter = PageCounter::new();
        let anchors: AnchorPages = Rc::new(RefCell::new(vec![None; document.sections().len()]));

        let mut pdf = self.document_builder(document, counter.clone()).build()?;
        self.push_cover(&mut pdf, document)?;
        for (slot, section) in document.sections().iter().enumerate() {
            debug!("Laying out section '{}'", section.title());
            let blocks = section.blocks();
            let (leading_break, rest) = match blocks.split_first() {
                Some((Block::PageBreak, rest)) => (true, rest),
                _ => (false, blocks),
            };
            if leading_break {
                pdf.push(PageBreak::new());
            } else {
                pdf.push(Break::new(1.5));
            }

            let title = Paragraph::new(StyledString::new(
                section.title().to_owned(),
                Style::new().bold().with_font_size(HEADING_FONT_SIZE),
            ));
            pdf.push(PageAnchor::new(
                title,
                slot,
                counter.clone(),
                Rc::clone(&anchors),
            ));
            for block in rest {
                self.push_block(&mut pdf, block)?;
            }
        }

        let mut bytes = Vec::new();
        pdf.render(&mut bytes)?;
        let section_pages = anchors.borrow().clone();
        let rendered = RenderedPdf {
            bytes,
            section_pages,
            page_count: counter.current(),
        };

        #[cfg(feature = "bookmarks")]
        let rendered = if self.options.bookmarks {
            RenderedPdf {
                bytes: crate::bookmarks::apply_section_bookmarks(
                    &rendered.bytes,
                    document.sections(),
                    &rendered.section_pages,
                )?,
                ..rendered
            }
        } else {
            rendered
        };

        Ok(rendered)
    }

    /// Renders the document and writes it to `path`.
    pub fn export_to_file(
        &self,
        document: &ReportDocument,
        path: impl AsRef<Path>,
    ) -> Result<RenderedPdf> {
        let path = path.as_ref();
        let rendered = self.render(document)?;
        fs::write(path, &rendered.bytes)?;
        info!(
            "Wrote {} ({} pages, {} bytes)",
            path.display(),
            rendered.page_count,
            rendered.bytes.len()
        );
        Ok(rendered)
    }

    /// Renders the document into `directory` using the configured file name.
    pub fn export_to_dir(
        &self,
        document: &ReportDocument,
        directory: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let path = directory.as_ref().join(&self.options.file_name);
        self.export_to_file(document, &path)?;
        Ok(path)
    }

    fn document_builder(
        &self,
        document: &ReportDocument,
        counter: PageCounter,
    ) -> DocumentBuilder {
        let header_title = document.title().to_owned();
        DocumentBuilder::new()
            .with_title(document.title())
            .with_paper_size(self.options.paper_size())
            .with_margins(self.options.margins.to_margins())
            .with_font_size(BODY_FONT_SIZE)
            .with_page_counter(counter)
            .with_header(move |page| {
                // The cover carries the title already.
                (page > 1).then(|| {
                    Paragraph::new(StyledString::new(
                        header_title.clone(),
                        Style::new().italic().with_font_size(DECORATION_FONT_SIZE),
                    ))
                    .aligned(Alignment::Right)
                })
            })
            .with_footer(mm_from_f64(FOOTER_HEIGHT_MM), |page| {
                Some(
                    Paragraph::new(StyledString::new(
                        format!("Page {}", page),
                        Style::new().with_font_size(DECORATION_FONT_SIZE),
                    ))
                    .aligned(Alignment::Center),
                )
            })
    }

    fn push_cover(&self, pdf: &mut genpdf::Document, document: &ReportDocument) -> Result<()> {
        let cover = document.cover();
        pdf.push(
            Paragraph::new(StyledString::new(
                cover.title().to_owned(),
                Style::new().bold().with_font_size(TITLE_FONT_SIZE),
            ))
            .aligned(Alignment::Center),
        );
        if let Some(subtitle) = cover.subtitle() {
            pdf.push(
                Paragraph::new(StyledString::new(
                    subtitle.to_owned(),
                    Style::new().italic(),
                ))
                .aligned(Alignment::Center),
            );
        }
        pdf.push(Break::new(1));
        for block in cover.blocks() {
            self.push_block(pdf, block)?;
        }
        Ok(())
    }

    fn push_block(&self, pdf: &mut genpdf::Document, block: &Block) -> Result<()> {
        match block {
            Block::Paragraph(paragraph) => {
                if paragraph.is_heading() {
                    pdf.push(Break::new(0.5));
                }
                pdf.push(paragraph_element(paragraph).padded(Margins::trbl(0, 0, 1, 0)));
            }
            Block::Table(table) => {
                let element = table_element(table)?;
                if self.options.avoids(BreakAvoid::Table) {
                    let lines = table.estimated_lines(self.table_chars_per_line());
                    pdf.push(KeepTogether::new(
                        element,
                        Extent::Lines {
                            count: lines + lines / 2,
                            style: table_style(),
                        },
                        mm_from_f64(self.options.page_body_height_mm()),
                    ));
                } else {
                    pdf.push(element);
                }
            }
            Block::Image(image) => match self.image_element(image)? {
                Some(element) => {
                    let height = element.rendered_height()
                        + mm_from_f64(CHART_CAPTION_ALLOWANCE_MM + 2.0 * CHART_PADDING_MM);
                    let padding = mm_from_f64(CHART_PADDING_MM);
                    let element = element.padded(Margins::trbl(padding, 0, padding, 0));
                    if self.options.avoids(BreakAvoid::Image) {
                        pdf.push(KeepTogether::new(
                            element,
                            Extent::Height(height),
                            mm_from_f64(self.options.page_body_height_mm()),
                        ));
                    } else {
                        pdf.push(element);
                    }
                }
                None => pdf.push(missing_image_element(image)),
            },
            Block::PageBreak => pdf.push(PageBreak::new()),
        }
        Ok(())
    }

    fn table_chars_per_line(&self) -> usize {
        let glyph_mm = TABLE_FONT_SIZE as f64 * PT_TO_MM * AVERAGE_GLYPH_WIDTH;
        (self.options.printable_width_mm() / glyph_mm).floor().max(1.0) as usize
    }

    /// Builds the chart element, or `None` when the file is missing and placeholders are allowed.
    fn image_element(&self, block: &ImageBlock) -> Result<Option<CaptionedImage>> {
        let decoded = match block.source() {
            ImageSource::Bytes(bytes) => elements::decode_image_from_bytes(bytes)?,
            ImageSource::Path(path) if !path.is_file() => {
                return match self.options.missing_assets {
                    MissingAsset::Fail => Err(ReportError::MissingAsset(path.clone())),
                    MissingAsset::Placeholder => {
                        warn!("Chart image {} not found; rendering placeholder", path.display());
                        Ok(None)
                    }
                };
            }
            ImageSource::Path(path) => elements::decode_image_from_path(path)?,
        };

        let prepared = match self.options.image_quality {
            Some(quality) => elements::reencode_jpeg(&decoded, quality)?,
            None => elements::flatten_alpha(&decoded),
        };

        let caption = block.caption().map(paragraph_element);
        let element =
            CaptionedImage::from_dynamic_image(prepared, self.options.chart_dpi, caption)?
                .with_alignment(Alignment::Center);

        let width = self.chart_width_mm(
            block.width_mm(),
            mm_to_f64(element.natural_size().width),
            mm_to_f64(element.natural_size().height),
        );
        Ok(Some(element.with_width(Some(mm_from_f64(width)))))
    }

    /// Rendered chart width: the requested or scaled width, shrunk so that the chart fits the
    /// printable width and, together with its caption, one page body.
    fn chart_width_mm(
        &self,
        requested: Option<f64>,
        natural_width: f64,
        natural_height: f64,
    ) -> f64 {
        let printable = self.options.printable_width_mm();
        let width = match (requested, self.options.chart_scale) {
            (Some(width), _) => width,
            (None, ChartScale::FitWidth) => printable,
            (None, ChartScale::NaturalWidth) => natural_width,
        };

        let max_height = (self.options.page_body_height_mm()
            - CHART_CAPTION_ALLOWANCE_MM
            - 2.0 * CHART_PADDING_MM)
            .max(1.0);
        let height_limited = if natural_height > f64::EPSILON {
            natural_width * max_height / natural_height
        } else {
            width
        };
        width.min(printable).min(height_limited)
    }
}

fn span_style(span: &Span) -> Style {
    let mut style = Style::new();
    if span.is_bold() {
        style.set_bold();
    }
    if span.is_italic() {
        style.set_italic();
    }
    style
}

fn paragraph_element(paragraph: &RichParagraph) -> Paragraph {
    let mut element = Paragraph::default();
    let base = if paragraph.is_heading() {
        Style::new().with_font_size(HEADING_FONT_SIZE - 2)
    } else {
        Style::new()
    };
    for span in paragraph.spans() {
        element.push(StyledString::new(
            span.text().to_owned(),
            base.and(span_style(span)),
        ));
    }
    element
}

fn table_style() -> Style {
    Style::new().with_font_size(TABLE_FONT_SIZE)
}

fn row_style(style: RowStyle) -> Style {
    match style {
        RowStyle::Plain => table_style(),
        RowStyle::Shaded => table_style().italic().with_color(SHADED_ROW_COLOR),
    }
}

fn cell(text: &str, style: Style) -> Box<dyn Element> {
    Box::new(
        Paragraph::new(StyledString::new(text.to_owned(), style))
            .padded(mm_from_f64(CELL_PADDING_MM)),
    )
}

fn table_element(table: &TableBlock) -> Result<TableLayout> {
    let weights = table.columns().iter().map(|column| column.weight).collect();
    let mut layout = TableLayout::new(weights);
    layout.set_cell_decorator(FrameCellDecorator::new(true, true, false));

    let header_style = table_style().bold().with_color(HEADER_ROW_COLOR);
    layout.push_row(
        table
            .columns()
            .iter()
            .map(|column| cell(&column.title, header_style))
            .collect(),
    )?;

    for row in table.rows() {
        let style = row_style(row.style);
        layout.push_row(row.cells.iter().map(|text| cell(text, style)).collect())?;
    }
    Ok(layout)
}

fn missing_image_element(block: &ImageBlock) -> Paragraph {
    let name = match block.source() {
        ImageSource::Path(path) => path.display().to_string(),
        ImageSource::Bytes(_) => "embedded image".to_owned(),
    };
    Paragraph::new(StyledString::new(
        format!("[chart unavailable: {}]", name),
        Style::new().italic().with_color(PLACEHOLDER_COLOR),
    ))
}

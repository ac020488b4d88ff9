//! Lays out [`ReportData`] as a [`ReportDocument`].
//!
//! The report opens with an explanation of the method and a glossary, followed by one section per
//! operation holding a caption, the model table and the chart image.  Building the view is pure:
//! chart paths are resolved against the assets directory but not opened until export.

use std::path::PathBuf;

use crate::data::{Model, OperationInfo, ReportData, COEFFICIENT_SLOTS};
use crate::error::Result;
use crate::format::{format_number, format_optional};
use crate::model::{
    Block, Column, Cover, ImageBlock, ImageSource, ReportDocument, RichParagraph, Section, Span,
    TableBlock,
};
use crate::significance::explain;

/// Default report title.
pub const DEFAULT_TITLE: &str = "Polynomial regression of operation timings";

/// Header of the metric columns following the coefficient slots.
pub const METRIC_COLUMNS: [&str; 5] = ["Degree", "σ²", "σ", "Code", "Explanation"];

/// Header of the optional trailing column.
pub const COMMENT_COLUMN: &str = "Comment";

/// Layout settings for [`ReportView`].
#[derive(Clone, Debug, PartialEq)]
pub struct ViewOptions {
    /// Directory chart file names are resolved against.
    pub assets_dir: PathBuf,
    /// Title shown on the cover and in the running header.
    pub title: String,
    /// Start every operation on a fresh page.
    pub operation_per_page: bool,
    /// Fixed chart width; `None` leaves the choice to the exporter.
    pub chart_width_mm: Option<f64>,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("."),
            title: DEFAULT_TITLE.to_owned(),
            operation_per_page: false,
            chart_width_mm: None,
        }
    }
}

impl ViewOptions {
    pub fn with_assets_dir(mut self, assets_dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = assets_dir.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_operation_per_page(mut self, operation_per_page: bool) -> Self {
        self.operation_per_page = operation_per_page;
        self
    }

    pub fn with_chart_width_mm(mut self, width_mm: impl Into<Option<f64>>) -> Self {
        self.chart_width_mm = width_mm.into();
        self
    }
}

/// Builds the report document for a dataset.
pub struct ReportView<'a> {
    data: &'a ReportData,
    options: ViewOptions,
}

impl<'a> ReportView<'a> {
    pub fn new(data: &'a ReportData, options: ViewOptions) -> Self {
        Self { data, options }
    }

    /// Produces the complete document.
    pub fn build(&self) -> Result<ReportDocument> {
        let cover = Cover::new(self.options.title.clone())
            .with_subtitle(Some(format!(
                "{} operations, {} models",
                self.data.len(),
                self.data
                    .operations()
                    .map(|(_, info)| info.models.len())
                    .sum::<usize>()
            )))
            .with_blocks(introduction())
            .with_blocks(glossary());

        let mut document = ReportDocument::new(cover);
        for (index, (name, info)) in self.data.operations().enumerate() {
            document.push_section(self.operation_section(index, name, info)?);
        }
        Ok(document)
    }

    fn operation_section(&self, index: usize, name: &str, info: &OperationInfo) -> Result<Section> {
        let caption = RichParagraph::new(vec![
            Span::new(format!("Table {}: ", index + 1)).bold(),
            Span::new("models fitted for "),
            Span::new(name).italic(),
            Span::new(format!(" ({} models)", info.models.len())),
        ]);

        let chart = ImageBlock::new(ImageSource::from_path(
            self.options.assets_dir.join(&info.image),
        ))
        .with_caption(Some(RichParagraph::new(vec![
            Span::new(format!("Figure {}: ", index + 1)).bold(),
            Span::new(format!("measurements and fitted curves for {}", name)),
        ])))
        .with_width_mm(self.options.chart_width_mm);

        Ok(Section::builder(name)
            .identifier(Some(name.to_owned()))
            .start_on_new_page(self.options.operation_per_page)
            .push_block(Block::Paragraph(caption))
            .push_block(Block::Table(operation_table(info)?))
            .push_block(Block::Image(chart))
            .build())
    }
}

/// Convenience wrapper around [`ReportView`].
pub fn build_report(data: &ReportData, options: ViewOptions) -> Result<ReportDocument> {
    ReportView::new(data, options).build()
}

/// Column layout of an operation table.
///
/// Degree, the coefficient slots `a0`..`a4`, σ², σ, Code and Explanation are always present.
/// The Comment column is only added when `with_comment` is set, i.e. when at least one model
/// of the operation carries a non-blank comment; operations without comments get no empty
/// trailing column.
pub fn operation_columns(with_comment: bool) -> Vec<Column> {
    let mut columns = vec![Column::new(METRIC_COLUMNS[0], 2)];
    columns.extend((0..COEFFICIENT_SLOTS).map(|slot| Column::new(format!("a{slot}"), 3)));
    columns.push(Column::new(METRIC_COLUMNS[1], 3));
    columns.push(Column::new(METRIC_COLUMNS[2], 3));
    columns.push(Column::new(METRIC_COLUMNS[3], 2));
    columns.push(Column::new(METRIC_COLUMNS[4], 7));
    if with_comment {
        columns.push(Column::new(COMMENT_COLUMN, 5));
    }
    columns
}

/// Table with one row per model of the operation.
pub fn operation_table(info: &OperationInfo) -> Result<TableBlock> {
    let with_comment = info.has_comments();
    let mut table = TableBlock::new(operation_columns(with_comment));
    for model in &info.models {
        table.push_row(model_cells(model, with_comment))?;
    }
    Ok(table)
}

fn model_cells(model: &Model, with_comment: bool) -> Vec<String> {
    let mut cells = vec![model.degree.to_string()];
    cells.extend((0..COEFFICIENT_SLOTS).map(|slot| format_optional(model.coefficient(slot))));
    cells.push(format_number(model.variance));
    cells.push(format_number(model.std_dev));
    cells.push(model.code.clone());
    cells.push(explain(&model.code));
    if with_comment {
        cells.push(model.comment().unwrap_or_default().to_owned());
    }
    cells
}

fn introduction() -> Vec<Block> {
    vec![
        Block::heading("Method"),
        Block::paragraph(vec![
            Span::new("For every operation, the measured cost is fitted with polynomials of increasing degree "),
            Span::new("p(n) = a0 + a1·n + a2·n² + …").italic(),
            Span::new(" using least squares. Each row of a table describes one fitted model: its degree, its coefficients, and the variance and standard deviation of its residuals."),
        ]),
        Block::paragraph(vec![
            Span::new("Moving from degree "),
            Span::new("k").italic(),
            Span::new(" to "),
            Span::new("k + 1").italic(),
            Span::new(" is only worthwhile when the extra term reduces the residual sum of squares by more than chance would explain. An F-test decides this at two confidence levels, and the outcome is recorded in the "),
            Span::new("significance code").bold(),
            Span::new("."),
        ]),
        Block::paragraph(vec![
            Span::new("The code has two characters, "),
            Span::new("+").bold(),
            Span::new(" or "),
            Span::new("-").bold(),
            Span::new(", for α=0.05 and α=0.01. A leading "),
            Span::new("*").bold(),
            Span::new(" marks a model whose leading coefficient is negative, which usually means the degree overfits the measurements."),
        ]),
    ]
}

fn glossary() -> Vec<Block> {
    const TERMS: [(&str, &str); 5] = [
        (
            "Residual",
            "difference between an observed value and the model's prediction.",
        ),
        ("RSS", "sum of squared residuals."),
        ("Variance (σ²)", "RSS divided by the degrees of freedom."),
        ("Standard deviation (σ)", "square root of the variance."),
        (
            "Significance code",
            "compact encoding of whether adding a polynomial term improved the fit significantly at two confidence levels.",
        ),
    ];

    std::iter::once(Block::heading("Glossary"))
        .chain(TERMS.iter().map(|(term, definition)| {
            Block::paragraph(vec![
                Span::new(format!("{term}: ")).bold(),
                Span::new(*definition),
            ])
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RowStyle;

    const TWO_OPERATIONS: &str = r#"{
        "lookup": {
            "models": [
                { "degree": 0, "coef": [4.0], "var": 0.5, "sd": 0.7071, "code": "++" },
                { "degree": 1, "coef": [3.9, 1e-13], "var": 0.49, "sd": 0.7, "code": "--" },
                { "degree": 2, "coef": [3.9, 0.1, -0.002], "var": 0.2, "sd": 0.447, "code": "*+-" }
            ],
            "image": "lookup.png"
        },
        "sort": {
            "models": [
                { "degree": 1, "coef": [1.5, 2.0], "var": 1.0, "sd": 1.0, "code": "++",
                  "comment": "n log n expected" },
                { "degree": 2, "coef": [1.0, 2.0, 0.1], "var": 0.5, "sd": 0.7, "code": "+-" }
            ],
            "image": "charts/sort.png"
        }
    }"#;

    fn document() -> ReportDocument {
        let data = ReportData::from_json_str(TWO_OPERATIONS).unwrap();
        build_report(&data, ViewOptions::default().with_assets_dir("/srv/assets")).unwrap()
    }

    #[test]
    fn one_table_per_operation() {
        let document = document();
        assert_eq!(document.sections().len(), 2);
        for section in document.sections() {
            assert_eq!(section.tables().count(), 1);
            assert_eq!(section.images().count(), 1);
        }
    }

    #[test]
    fn rows_and_columns_follow_the_data() {
        let document = document();
        let lookup = document.sections()[0].tables().next().unwrap();
        assert_eq!(lookup.rows().len(), 3);
        assert_eq!(
            lookup.columns().len(),
            COEFFICIENT_SLOTS + METRIC_COLUMNS.len()
        );

        let sort = document.sections()[1].tables().next().unwrap();
        assert_eq!(sort.rows().len(), 2);
        assert_eq!(
            sort.columns().len(),
            COEFFICIENT_SLOTS + METRIC_COLUMNS.len() + 1
        );
        assert_eq!(sort.columns().last().unwrap().title, COMMENT_COLUMN);
    }

    #[test]
    fn sections_follow_data_order() {
        let document = document();
        let titles: Vec<_> = document.sections().iter().map(Section::title).collect();
        assert_eq!(titles, ["lookup", "sort"]);
        assert_eq!(document.sections()[1].identifier(), Some("sort"));
    }

    #[test]
    fn cells_are_formatted() {
        let document = document();
        let lookup = document.sections()[0].tables().next().unwrap();
        let row = &lookup.rows()[1].cells;
        assert_eq!(row[0], "1");
        assert_eq!(row[1], "3.9");
        assert_eq!(row[2], "0");
        assert_eq!(row[3], "");
        assert_eq!(row[6], "0.49");
        assert_eq!(row[9], "not better at α=0.05, not better at α=0.01");
        assert_eq!(lookup.rows()[1].style, RowStyle::Shaded);
    }

    #[test]
    fn chart_paths_resolve_against_assets_dir() {
        let document = document();
        let chart = document.sections()[1].images().next().unwrap();
        assert_eq!(
            chart.source(),
            &ImageSource::from_path("/srv/assets/charts/sort.png")
        );
    }

    #[test]
    fn cover_carries_introduction_and_glossary() {
        let document = document();
        assert_eq!(document.title(), DEFAULT_TITLE);
        let headings: Vec<_> = document
            .cover()
            .blocks()
            .iter()
            .filter_map(|block| match block {
                Block::Paragraph(paragraph) if paragraph.is_heading() => {
                    Some(paragraph.plain_text())
                }
                _ => None,
            })
            .collect();
        assert_eq!(headings, ["Method", "Glossary"]);
        assert_eq!(document.cover().subtitle(), Some("2 operations, 5 models"));
    }

    #[test]
    fn fixed_chart_width_reaches_every_chart() {
        let data = ReportData::from_json_str(TWO_OPERATIONS).unwrap();
        let document =
            build_report(&data, ViewOptions::default().with_chart_width_mm(120.0)).unwrap();
        for section in document.sections() {
            assert_eq!(section.images().next().unwrap().width_mm(), Some(120.0));
        }
        assert_eq!(
            document_widths(&build_report(&data, ViewOptions::default()).unwrap()),
            [None, None]
        );
    }

    fn document_widths(document: &ReportDocument) -> Vec<Option<f64>> {
        document
            .sections()
            .iter()
            .flat_map(|section| section.images().map(ImageBlock::width_mm))
            .collect()
    }

    #[test]
    fn comment_column_only_for_commented_operations() {
        let data = ReportData::from_json_str(TWO_OPERATIONS).unwrap();
        let without = operation_table(data.get("lookup").unwrap()).unwrap();
        let with = operation_table(data.get("sort").unwrap()).unwrap();
        assert!(without.columns().iter().all(|c| c.title != COMMENT_COLUMN));
        assert_eq!(with.rows()[0].cells.last().unwrap(), "n log n expected");
        assert_eq!(with.rows()[1].cells.last().unwrap(), "");
    }

    #[test]
    fn operation_per_page_inserts_breaks() {
        let data = ReportData::from_json_str(TWO_OPERATIONS).unwrap();
        let document =
            build_report(&data, ViewOptions::default().with_operation_per_page(true)).unwrap();
        assert!(document
            .sections()
            .iter()
            .all(|section| matches!(section.blocks().first(), Some(Block::PageBreak))));
    }
}

//! Renders polynomial regression reports from pre-computed JSON data.
//!
//! [`data::ReportData`] holds the fitted models per operation, [`view`] lays them out as a
//! [`model::ReportDocument`], and [`export`] turns that document into a PDF with `genpdf`.

pub mod builder;
pub mod data;
pub mod elements;
pub mod error;
pub mod export;
pub mod fonts;
pub mod format;
pub mod model;
pub mod significance;
pub mod text;
pub mod view;

#[cfg(feature = "bookmarks")]
pub mod bookmarks;

pub use data::{Model, OperationInfo, ReportData};
pub use error::{ReportError, Result};
pub use export::{ExportOptions, PdfExporter, RenderedPdf};
pub use format::format_number;
pub use significance::{explain, SignificanceCode};
pub use view::{build_report, ReportView, ViewOptions};

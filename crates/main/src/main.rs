use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::info;
use regression_report::export::{BreakAvoid, ChartScale, MarginsMm, MissingAsset, Orientation};
use regression_report::{build_report, explain, ExportOptions, PdfExporter, ReportData, ViewOptions};

/// Renders regression reports from pre-computed JSON data.
///
/// Fonts are looked up under `assets/fonts` (Roboto) or the directory named by
/// `REGRESSION_REPORT_FONTS_DIR`, with a system font fallback.
#[derive(Parser)]
#[command(author, version, about = "Regression report renderer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the report to a PDF file (`regression.pdf` by default).
    Export(ExportArgs),

    /// Print the report as plain text.
    Show {
        /// JSON file with the regression results.
        data: PathBuf,
    },

    /// Explain one or more significance codes.
    Explain {
        #[arg(required = true)]
        codes: Vec<String>,
    },
}

#[derive(Args)]
struct ExportArgs {
    /// JSON file with the regression results.
    data: PathBuf,

    /// Directory chart images are resolved against [default: directory of DATA].
    #[arg(long, env = "REGRESSION_REPORT_ASSETS_DIR")]
    assets: Option<PathBuf>,

    /// Output file [default: regression.pdf].
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report title.
    #[arg(long)]
    title: Option<String>,

    /// Page margin in millimetres, applied on every side.
    #[arg(long, default_value_t = 10.0)]
    margin: f64,

    /// JPEG quality charts are re-encoded at.
    #[arg(long, default_value_t = 98, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Embed charts without JPEG re-encoding.
    #[arg(long)]
    no_jpeg: bool,

    /// Use landscape pages.
    #[arg(long)]
    landscape: bool,

    /// Stretch charts to the printable width instead of their natural width.
    #[arg(long, conflicts_with = "chart_width")]
    fit_width: bool,

    /// Fixed chart width in millimetres (still shrunk to fit the page).
    #[arg(long, value_name = "MM")]
    chart_width: Option<f64>,

    /// Let tables and charts split across pages instead of moving them to the next one.
    #[arg(long)]
    split_blocks: bool,

    /// Start every operation on a new page.
    #[arg(long)]
    page_per_operation: bool,

    /// Fail instead of rendering a placeholder when a chart image is missing.
    #[arg(long)]
    strict_assets: bool,

    /// Skip the PDF outline with one bookmark per operation.
    #[cfg(feature = "bookmarks")]
    #[arg(long)]
    no_bookmarks: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Export(args) => export(args),
        Commands::Show { data } => show(&data),
        Commands::Explain { codes } => {
            for code in codes {
                println!("{code}: {}", explain(&code));
            }
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn data_directory(data: &Path) -> PathBuf {
    data.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn export(args: ExportArgs) -> Result<(), Box<dyn Error>> {
    let data = ReportData::load(&args.data)?;
    let assets = args.assets.unwrap_or_else(|| data_directory(&args.data));

    let mut view = ViewOptions::default()
        .with_assets_dir(assets)
        .with_operation_per_page(args.page_per_operation)
        .with_chart_width_mm(args.chart_width);
    if let Some(title) = args.title {
        view = view.with_title(title);
    }
    let document = build_report(&data, view)?;

    let options = ExportOptions::default()
        .with_margins(MarginsMm::uniform(args.margin))
        .with_image_quality((!args.no_jpeg).then_some(args.quality))
        .with_orientation(if args.landscape {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        })
        .with_chart_scale(if args.fit_width {
            ChartScale::FitWidth
        } else {
            ChartScale::NaturalWidth
        })
        .with_missing_assets(if args.strict_assets {
            MissingAsset::Fail
        } else {
            MissingAsset::Placeholder
        })
        .with_avoid_page_breaks(if args.split_blocks {
            Vec::new()
        } else {
            vec![BreakAvoid::Table, BreakAvoid::Image]
        });
    #[cfg(feature = "bookmarks")]
    let options = options.with_bookmarks(!args.no_bookmarks);

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(&options.file_name));
    info!(
        "Rendering {} operations from {}",
        data.len(),
        args.data.display()
    );
    let rendered = PdfExporter::new(options).export_to_file(&document, &output)?;
    println!(
        "Generated {} ({} pages, {} bytes)",
        output.display(),
        rendered.page_count,
        rendered.bytes.len()
    );
    Ok(())
}

fn show(data: &Path) -> Result<(), Box<dyn Error>> {
    let data = ReportData::load(data)?;
    let document = build_report(&data, ViewOptions::default())?;
    print!("{}", regression_report::text::render_text(&document));
    Ok(())
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}

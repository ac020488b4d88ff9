use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgba};
use regression_report::export::{ExportOptions, MissingAsset, PdfExporter};
use regression_report::fonts;
use regression_report::model::ReportDocument;
use regression_report::{build_report, ReportData, ReportError, ViewOptions};
use sha2::{Digest, Sha256};

const DATA: &str = r#"{
    "lookup": {
        "models": [
            { "degree": 0, "coef": [4.02], "var": 0.51, "sd": 0.714, "code": "++" },
            { "degree": 1, "coef": [3.91, 0.0012], "var": 0.5, "sd": 0.707, "code": "--" }
        ],
        "image": "lookup.png"
    },
    "sort": {
        "models": [
            { "degree": 1, "coef": [1.5, 2.25], "var": 1.2, "sd": 1.095, "code": "++" },
            { "degree": 2, "coef": [1.1, 2.0, 0.013], "var": 0.31, "sd": 0.557, "code": "+-",
              "comment": "quadratic term is small" },
            { "degree": 3, "coef": [1.0, 2.1, 0.01, -1e-5], "var": 0.3, "sd": 0.548, "code": "*--" }
        ],
        "image": "sort.png"
    }
}"#;

/// Draws a small chart-like PNG with a transparent background and a rising curve.
fn write_chart(path: &Path, steepness: f32) {
    write_chart_sized(path, 240, 140, steepness);
}

fn write_chart_sized(path: &Path, width: u32, height: u32, steepness: f32) {
    let buffer = ImageBuffer::from_fn(width, height, |x, y| {
        let progress = x as f32 / width as f32;
        let curve = height as f32 - 1.0 - steepness * progress.powi(2) * height as f32;
        if (y as f32 - curve).abs() < 2.0 {
            Rgba([36u8, 92, 160, 255])
        } else if x == 0 || y == height - 1 {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(buffer)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .expect("encode chart");
    std::fs::write(path, bytes).expect("write chart");
}

fn sample_document(assets: &Path) -> ReportDocument {
    let data = ReportData::from_json_str(DATA).expect("sample data is valid");
    build_report(&data, ViewOptions::default().with_assets_dir(assets)).expect("build report")
}

fn render(document: &ReportDocument, options: ExportOptions) -> Option<Vec<u8>> {
    if !fonts::any_fonts_available() {
        eprintln!("Skipping PDF render: no usable fonts. Set REGRESSION_REPORT_FONTS_DIR.");
        return None;
    }
    let rendered = PdfExporter::new(options)
        .render(document)
        .expect("render report");
    Some(rendered.bytes)
}

fn scrub_pdf(bytes: &[u8]) -> Vec<u8> {
    fn scrub_segment(data: &mut [u8], tag: &[u8], terminator: u8) {
        let mut index = 0;
        while index + tag.len() < data.len() {
            if !data[index..].starts_with(tag) {
                index += 1;
                continue;
            }
            let mut cursor = index + tag.len();
            while cursor < data.len() && data[cursor] != terminator {
                if terminator == b')'
                    || !matches!(data[cursor], b'<' | b'>' | b' ' | b'\n' | b'\r' | b'\t')
                {
                    data[cursor] = b'0';
                }
                cursor += 1;
            }
            index = cursor;
        }
    }

    fn scrub_xml(data: &mut [u8], start: &[u8], end: &[u8]) {
        let mut offset = 0;
        while let Some(start_pos) = data[offset..]
            .windows(start.len())
            .position(|window| window == start)
        {
            let content = offset + start_pos + start.len();
            let Some(end_pos) = data[content..]
                .windows(end.len())
                .position(|window| window == end)
            else {
                break;
            };
            for byte in &mut data[content..content + end_pos] {
                if !matches!(*byte, b'<' | b'>' | b'/' | b' ' | b'\n' | b'\r' | b'\t') {
                    *byte = b'0';
                }
            }
            offset = content + end_pos + end.len();
        }
    }

    let mut normalized = bytes.to_vec();
    scrub_segment(&mut normalized, b"/CreationDate(", b')');
    scrub_segment(&mut normalized, b"/ModDate(", b')');
    scrub_segment(&mut normalized, b"/Producer(", b')');
    scrub_segment(&mut normalized, b"/ID[", b']');
    scrub_xml(&mut normalized, b"<xmp:CreateDate>", b"</xmp:CreateDate>");
    scrub_xml(&mut normalized, b"<xmp:ModifyDate>", b"</xmp:ModifyDate>");
    scrub_xml(&mut normalized, b"<xmp:MetadataDate>", b"</xmp:MetadataDate>");
    scrub_xml(&mut normalized, b"<xmpMM:DocumentID>", b"</xmpMM:DocumentID>");
    scrub_xml(&mut normalized, b"<xmpMM:InstanceID>", b"</xmpMM:InstanceID>");
    scrub_xml(&mut normalized, b"<xmpMM:VersionID>", b"</xmpMM:VersionID>");
    normalized
}

fn normalized_hash(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(scrub_pdf(bytes)).into()
}

#[test]
fn renders_report_with_charts() {
    let assets = tempfile::tempdir().unwrap();
    write_chart(&assets.path().join("lookup.png"), 0.2);
    write_chart(&assets.path().join("sort.png"), 0.9);

    let Some(bytes) = render(&sample_document(assets.path()), ExportOptions::default()) else {
        return;
    };
    assert!(bytes.starts_with(b"%PDF"), "output should be a PDF");
}

#[test]
fn records_section_pages() {
    if !fonts::any_fonts_available() {
        return;
    }
    let assets = tempfile::tempdir().unwrap();
    write_chart(&assets.path().join("lookup.png"), 0.2);
    write_chart(&assets.path().join("sort.png"), 0.9);

    let rendered = PdfExporter::default()
        .render(&sample_document(assets.path()))
        .expect("render report");
    assert_eq!(rendered.section_pages.len(), 2);
    let pages: Vec<usize> = rendered
        .section_pages
        .iter()
        .map(|page| page.expect("every section is anchored"))
        .collect();
    assert!(pages[0] >= 1);
    assert!(pages[0] <= pages[1]);
    assert!(pages[1] <= rendered.page_count);
}

#[test]
fn missing_charts_render_placeholders() {
    if !fonts::any_fonts_available() {
        return;
    }
    let with_charts = tempfile::tempdir().unwrap();
    write_chart(&with_charts.path().join("lookup.png"), 0.2);
    write_chart(&with_charts.path().join("sort.png"), 0.9);
    let without_charts = tempfile::tempdir().unwrap();

    let exporter = PdfExporter::default();
    let embedded = exporter
        .render(&sample_document(with_charts.path()))
        .expect("render with charts");
    let placeholders = exporter
        .render(&sample_document(without_charts.path()))
        .expect("render with placeholders");

    assert!(placeholders.section_pages.iter().all(Option::is_some));
    assert!(placeholders.page_count <= embedded.page_count);
    // Placeholders are a line of text, so no image data ends up in the file.
    assert!(placeholders.bytes.len() < embedded.bytes.len());
}

#[test]
fn tall_chart_renders_on_a_bounded_number_of_pages() {
    if !fonts::any_fonts_available() {
        return;
    }
    let assets = tempfile::tempdir().unwrap();
    write_chart_sized(&assets.path().join("lookup.png"), 1000, 4000, 0.5);
    write_chart(&assets.path().join("sort.png"), 0.9);

    let rendered = PdfExporter::default()
        .render(&sample_document(assets.path()))
        .expect("render report with a tall chart");
    assert!(rendered.page_count <= 6, "{} pages", rendered.page_count);
    assert!(rendered.section_pages.iter().all(Option::is_some));
}

#[test]
fn missing_charts_fail_in_strict_mode() {
    if !fonts::any_fonts_available() {
        return;
    }
    let assets = tempfile::tempdir().unwrap();
    let result = PdfExporter::new(
        ExportOptions::default().with_missing_assets(MissingAsset::Fail),
    )
    .render(&sample_document(assets.path()));
    assert!(matches!(result, Err(ReportError::MissingAsset(_))));
}

#[test]
fn export_writes_regression_pdf() {
    if !fonts::any_fonts_available() {
        return;
    }
    let out = tempfile::tempdir().unwrap();
    let path = PdfExporter::default()
        .export_to_dir(&sample_document(out.path()), out.path())
        .expect("export report");
    assert_eq!(path.file_name().unwrap(), "regression.pdf");
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn rendering_is_deterministic() {
    let assets = tempfile::tempdir().unwrap();
    write_chart(&assets.path().join("lookup.png"), 0.2);
    write_chart(&assets.path().join("sort.png"), 0.9);
    let document = sample_document(assets.path());

    let Some(bytes_a) = render(&document, ExportOptions::default()) else {
        return;
    };
    let Some(bytes_b) = render(&document, ExportOptions::default()) else {
        return;
    };

    assert_eq!(bytes_a.len(), bytes_b.len(), "PDF sizes should match");
    assert_eq!(
        normalized_hash(&bytes_a),
        normalized_hash(&bytes_b),
        "PDF renders must be deterministic after metadata normalization"
    );
}

#[cfg(feature = "bookmarks")]
#[test]
fn embeds_outline_for_operations() {
    let assets = tempfile::tempdir().unwrap();
    write_chart(&assets.path().join("lookup.png"), 0.2);
    write_chart(&assets.path().join("sort.png"), 0.9);

    let Some(bytes) = render(&sample_document(assets.path()), ExportOptions::default()) else {
        return;
    };
    let contains = |needle: &[u8]| bytes.windows(needle.len()).any(|window| window == needle);
    assert!(contains(b"/Outlines"));
    assert!(contains(b"UseOutlines"));
    assert!(contains(b"(Overview)"));
}

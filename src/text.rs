//! Plain-text rendering of a [`ReportDocument`] for terminal output.

use std::fmt::Write as _;

use crate::model::{Block, ImageSource, ReportDocument, RichParagraph, TableBlock};

/// Renders the document as plain text with column-aligned tables.
pub fn render_text(document: &ReportDocument) -> String {
    let mut out = String::new();
    let cover = document.cover();
    underline(&mut out, cover.title(), '=');
    if let Some(subtitle) = cover.subtitle() {
        let _ = writeln!(out, "{subtitle}");
    }
    out.push('\n');
    for block in cover.blocks() {
        render_block(&mut out, block);
    }

    for section in document.sections() {
        out.push('\n');
        underline(&mut out, section.title(), '=');
        for block in section.blocks() {
            render_block(&mut out, block);
        }
    }
    out
}

fn underline(out: &mut String, title: &str, ch: char) {
    let _ = writeln!(out, "{title}");
    let _ = writeln!(
        out,
        "{}",
        ch.to_string().repeat(title.chars().count())
    );
}

fn render_block(out: &mut String, block: &Block) {
    match block {
        Block::Paragraph(paragraph) if paragraph.is_heading() => {
            underline(out, &paragraph.plain_text(), '-');
        }
        Block::Paragraph(paragraph) => render_paragraph(out, paragraph),
        Block::Table(table) => {
            out.push_str(&render_table(table));
            out.push('\n');
        }
        Block::Image(image) => {
            let location = match image.source() {
                ImageSource::Path(path) => path.display().to_string(),
                ImageSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            };
            match image.caption() {
                Some(caption) => {
                    let _ = writeln!(out, "[{}] {}\n", location, caption.plain_text());
                }
                None => {
                    let _ = writeln!(out, "[{}]\n", location);
                }
            }
        }
        Block::PageBreak => {}
    }
}

fn render_paragraph(out: &mut String, paragraph: &RichParagraph) {
    let _ = writeln!(out, "{}\n", paragraph.plain_text());
}

/// Renders a table with a header, a separator line and one line per row.
pub fn render_table(table: &TableBlock) -> String {
    let widths: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(index, column)| {
            table
                .rows()
                .iter()
                .map(|row| row.cells[index].chars().count())
                .chain([column.title.chars().count()])
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        table_line(table.columns().iter().map(|c| c.title.as_str()), &widths)
    );
    let separator: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    let _ = writeln!(out, "{}", separator.join("-+-"));
    for row in table.rows() {
        let _ = writeln!(
            out,
            "{}",
            table_line(row.cells.iter().map(String::as_str), &widths)
        );
    }
    out
}

fn table_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect();
    padded.join(" | ").trim_end().to_owned()
}

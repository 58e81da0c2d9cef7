//! Draws one fixed-size card per issue, two per A4 page.
//!
//! The layout is intentionally rigid: a card that holds more text than fits
//! in its 400x280 pt box overflows it. That matches how the cards have
//! always printed, so nothing here resizes or clips.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use printpdf::{
    path::PaintMode, BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Pt,
    Rect, Rgb,
};
use thiserror::Error;
use tracing::info;

pub(crate) use palette::Palette;

use crate::issue::Issue;
use palette::DEFAULT_COLOR;

mod palette;

// A4 in points.
const PAGE_WIDTH: f32 = 595.276;
const PAGE_HEIGHT: f32 = 841.89;

const TILE_WIDTH: f32 = 400.0;
const TILE_HEIGHT: f32 = 280.0;
const TOP_MARGIN: f32 = 10.0;
const TILE_GAP: f32 = 50.0;
const ACCENT_WIDTH: f32 = 8.0;
const TEXT_INSET: f32 = 15.0;
const CARDS_PER_PAGE: usize = 2;

const DESCRIPTION_MAX_LINES: usize = 8;
const DESCRIPTION_MAX_CHARS: usize = 250;

/// Average glyph advance per point of font size. Built-in fonts expose no
/// metrics at this layer, so wrapping and right-alignment work from these
/// estimates; they only need to be close, not exact.
const REGULAR_ADVANCE: f32 = 0.50;
const BOLD_ADVANCE: f32 = 0.53;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Renders the (already sorted) issues into a PDF at `output`.
pub(crate) fn render(issues: &[Issue], palette: &Palette, output: &Path) -> Result<(), Error> {
    let bytes = render_to_bytes(issues, palette)?;
    std::fs::write(output, bytes).map_err(|source| Error::Write {
        path: output.to_path_buf(),
        source,
    })?;
    info!("Wrote {} cards to {}", issues.len(), output.display());
    Ok(())
}

fn render_to_bytes(issues: &[Issue], palette: &Palette) -> Result<Vec<u8>, Error> {
    let (doc, first_page, first_layer) =
        PdfDocument::new("Story cards", pt(PAGE_WIDTH), pt(PAGE_HEIGHT), "cards");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(Error::Pdf)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(Error::Pdf)?,
    };

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    for (index, issue) in issues.iter().enumerate() {
        let slot = index % CARDS_PER_PAGE;
        if index > 0 && slot == 0 {
            let (page, inner_layer) = doc.add_page(pt(PAGE_WIDTH), pt(PAGE_HEIGHT), "cards");
            layer = doc.get_page(page).get_layer(inner_layer);
        }
        let top = PAGE_HEIGHT - TOP_MARGIN - slot as f32 * (TILE_HEIGHT + TILE_GAP);
        draw_card(&layer, &fonts, issue, palette.color_for(issue), top);
    }

    doc.save_to_bytes().map_err(Error::Pdf)
}

fn draw_card(layer: &PdfLayerReference, fonts: &Fonts, issue: &Issue, color: &str, top: f32) {
    let left = PAGE_WIDTH / 2.0 - TILE_WIDTH / 2.0;
    let accent = hex_color(color);

    layer.set_outline_color(accent.clone());
    layer.set_fill_color(accent);
    layer.set_outline_thickness(1.0);
    layer.add_rect(
        Rect::new(
            pt(left),
            pt(top - TILE_HEIGHT),
            pt(left + TILE_WIDTH),
            pt(top),
        )
        .with_mode(PaintMode::Stroke),
    );
    layer.add_rect(
        Rect::new(
            pt(left),
            pt(top - TILE_HEIGHT),
            pt(left + ACCENT_WIDTH),
            pt(top),
        )
        .with_mode(PaintMode::Fill),
    );

    layer.set_fill_color(hex_color("#000000"));
    layer.use_text(
        issue.key.as_str(),
        28.0,
        pt(left + TEXT_INSET),
        pt(top - 25.0),
        &fonts.bold,
    );
    layer.use_text(
        issue.components.join(", "),
        14.0,
        pt(left + TEXT_INSET),
        pt(top - 45.0),
        &fonts.regular,
    );

    let text_width = TILE_WIDTH - 2.0 * TEXT_INSET;
    let mut cursor = top - 45.0 - 15.0;
    for line in wrap(&issue.summary, 20.0, BOLD_ADVANCE, text_width) {
        cursor -= 20.0;
        layer.use_text(line, 20.0, pt(left + TEXT_INSET), pt(cursor), &fonts.bold);
    }

    if let Some(excerpt) = issue.description.as_deref().and_then(excerpt) {
        layer.set_fill_color(hex_color("#333333"));
        cursor -= 5.0;
        for paragraph in excerpt.split('\n') {
            for line in wrap(paragraph, 12.0, REGULAR_ADVANCE, text_width) {
                cursor -= 12.0;
                layer.use_text(line, 12.0, pt(left + TEXT_INSET), pt(cursor), &fonts.regular);
            }
        }
        layer.set_fill_color(hex_color("#000000"));
    }

    // People block, pinned to the bottom of the box.
    let mut people = Vec::new();
    if let Some(assignee) = &issue.assignee {
        people.push(format!("Assignee: {assignee}"));
    }
    if let Some(reporter) = &issue.reporter {
        people.push(format!("Reporter: {reporter}"));
    }
    for (line_index, line) in people.iter().rev().enumerate() {
        let y = top - TILE_HEIGHT + 10.0 + 14.0 * line_index as f32;
        layer.use_text(line.as_str(), 14.0, pt(left + TEXT_INSET), pt(y), &fonts.regular);
    }

    // Priority and estimate, right-aligned and pinned to the top.
    let mut misc = Vec::new();
    if let Some(priority) = issue.priority.filter(|priority| *priority != 0) {
        misc.push(format!("Priority: {priority}"));
    }
    if let Some(label) = issue.estimate.and_then(estimate_label) {
        misc.push(format!("Estimated: {label}"));
    }
    let right = left + TILE_WIDTH - 10.0;
    for (line_index, line) in misc.iter().enumerate() {
        let y = top - 18.0 - 13.0 * line_index as f32;
        let x = right - estimated_width(line, 13.0, REGULAR_ADVANCE);
        layer.use_text(line.as_str(), 13.0, pt(x), pt(y), &fonts.regular);
    }
}

fn pt(value: f32) -> Mm {
    Mm::from(Pt(value))
}

/// `#rrggbb` to a printpdf color; malformed channels fall back to black,
/// a missing string entirely to the default gray.
fn hex_color(hex: &str) -> Color {
    let hex = if hex.is_empty() { DEFAULT_COLOR } else { hex };
    let digits = hex.trim_start_matches('#');
    let channel = |index: usize| {
        digits
            .get(index..index + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
            .map_or(0.0, |value| f32::from(value) / 255.0)
    };
    Color::Rgb(Rgb::new(channel(0), channel(2), channel(4), None))
}

/// Under an hour renders as minutes with one decimal, an hour or more as
/// whole hours. Zero and negative estimates render nothing.
fn estimate_label(seconds: i64) -> Option<String> {
    if seconds <= 0 {
        None
    } else if seconds < 3600 {
        Some(format!("{:.1}", seconds as f64 / 60.0))
    } else {
        Some(format!("{}", seconds / 3600))
    }
}

/// Truncates a description for the card: at most 8 lines, at most 250
/// characters, each cut marked with an ellipsis. Empty text renders nothing.
fn excerpt(description: &str) -> Option<String> {
    if description.trim().is_empty() {
        return None;
    }
    let lines: Vec<&str> = description.split('\n').collect();
    let mut text = if lines.len() > DESCRIPTION_MAX_LINES {
        let mut kept = lines[..DESCRIPTION_MAX_LINES].join("\n");
        kept.push_str("\n...");
        kept
    } else {
        description.to_string()
    };
    if text.chars().count() > DESCRIPTION_MAX_CHARS {
        text = text.chars().take(DESCRIPTION_MAX_CHARS).collect();
        text.push_str("...");
    }
    Some(text)
}

fn estimated_width(text: &str, font_size: f32, advance: f32) -> f32 {
    text.chars().count() as f32 * font_size * advance
}

/// Greedy word wrap against the estimated advance. Words longer than a whole
/// line get a line of their own and overflow the box, like everything else
/// that is too big for a card.
fn wrap(text: &str, font_size: f32, advance: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if estimated_width(&candidate, font_size, advance) <= max_width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[derive(Debug, Diagnostic, Error)]
pub(crate) enum Error {
    #[error("Could not assemble the PDF: {0}")]
    #[diagnostic(code(pdf::assemble))]
    Pdf(#[source] printpdf::Error),
    #[error("Error writing to {path}: {source}")]
    #[diagnostic(
        code(pdf::write),
        help("Make sure you have permission to write to this file.")
    )]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

use std::io::Write;

use lector_core::{BookMeta, Paragraph, Progress};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the book header with progress, e.g. `Le Petit Prince — 25% · 5/20 · 7`.
pub fn print_header(
    w: &mut dyn Write,
    meta: &BookMeta,
    progress: &Progress,
    color: ColorMode,
) -> std::io::Result<()> {
    let mut line = match (progress.percent, progress.index, progress.total) {
        (Some(percent), Some(index), Some(total)) => {
            format!("{} — {}% · {}/{}", meta.book_name, percent.round(), index, total)
        }
        _ => format!("{} — -% · -/-", meta.book_name),
    };
    if let Some(read_24h) = meta.paragraphs_read_24h {
        line.push_str(&format!(" · {read_24h}"));
    }

    if color.enabled() {
        writeln!(w, "{}", line.bold())?;
    } else {
        writeln!(w, "{line}")?;
    }
    writeln!(w)
}

/// Print the window with globally numbered sentences, so `s <n>` commands
/// can address any sentence on screen. Alternating sentence colors mirror
/// the web reader.
pub fn print_window(
    w: &mut dyn Write,
    window: &[Paragraph],
    color: ColorMode,
) -> std::io::Result<()> {
    let mut n = 0usize;
    for paragraph in window {
        if color.enabled() {
            writeln!(w, "{}", format!("¶ {}", paragraph.id_paragraph).dimmed())?;
        } else {
            writeln!(w, "¶ {}", paragraph.id_paragraph)?;
        }
        for sentence in &paragraph.sentences {
            n += 1;
            if color.enabled() {
                if n % 2 == 1 {
                    writeln!(w, "  [{n}] {}", sentence.sentence.green())?;
                } else {
                    writeln!(w, "  [{n}] {}", sentence.sentence.cyan())?;
                }
            } else {
                writeln!(w, "  [{n}] {}", sentence.sentence)?;
            }
        }
        writeln!(w)?;
    }
    if window.is_empty() {
        writeln!(w, "No paragraphs to display.")?;
    }
    Ok(())
}

/// The sentence texts of the window in display order, for `s <n>` lookup.
pub fn flatten_sentences(window: &[Paragraph]) -> Vec<&str> {
    window
        .iter()
        .flat_map(|p| p.sentences.iter().map(|s| s.sentence.as_str()))
        .collect()
}

pub fn print_help(w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "commands:")?;
    writeln!(w, "  n           next 5 paragraphs")?;
    writeln!(w, "  p           previous 5 paragraphs")?;
    writeln!(w, "  s <n>       speak sentence n")?;
    writeln!(w, "  pause / resume / stop   control playback")?;
    writeln!(w, "  q           quit")
}

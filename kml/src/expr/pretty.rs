//! RcDoc-based pretty-printer with termcolor annotations for [`Trace`].
//!
//! Role
//! - Convert a trace into an annotated, JSON-shaped document suitable for
//!   width-aware rendering. Small objects stay on one line, larger ones break
//!   with two-space indentation.
//! - Provide colored output for terminals (TTY-aware) and plain strings for
//!   logs and tests. The plain form is valid JSON.

use std::io::{self, Write};

use pretty::{FmtWrite, RcDoc, RenderAnnotated};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::expr::{Trace, TraceField};
use crate::linalg::Matrix;
use crate::value::Value;

/// Annotation attached to each token of a trace document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Punct, // braces, brackets, commas, colons
    Key,
    /// The node kind of an object.
    Kind,
    Text,
    Number,
}

impl Style {
    fn to_color_spec(self) -> ColorSpec {
        let mut s = ColorSpec::new();
        match self {
            Style::Punct => {
                s.set_dimmed(true);
            }
            Style::Key => {
                s.set_fg(Some(Color::Blue));
            }
            Style::Kind => {
                s.set_fg(Some(Color::Cyan)).set_bold(true);
            }
            Style::Text => {
                s.set_fg(Some(Color::Green));
            }
            Style::Number => {
                s.set_fg(Some(Color::Yellow));
            }
        }
        s
    }
}

fn punct(s: &'static str) -> RcDoc<'static, Style> {
    RcDoc::as_string(s).annotate(Style::Punct)
}

fn quoted(style: Style, s: &str) -> RcDoc<'static, Style> {
    RcDoc::text(escape(s)).annotate(style)
}

fn number(value: f64) -> RcDoc<'static, Style> {
    if value.is_finite() {
        RcDoc::as_string(value).annotate(Style::Number)
    } else {
        quoted(Style::Number, &value.to_string())
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn bracketed(
    open: &'static str,
    items: Vec<RcDoc<'static, Style>>,
    close: &'static str,
) -> RcDoc<'static, Style> {
    if items.is_empty() {
        return punct(open).append(punct(close));
    }
    punct(open)
        .append(
            RcDoc::line_()
                .append(RcDoc::intersperse(items, punct(",").append(RcDoc::line())))
                .nest(2),
        )
        .append(RcDoc::line_())
        .append(punct(close))
        .group()
}

fn entry(key: &str, value: RcDoc<'static, Style>) -> RcDoc<'static, Style> {
    quoted(Style::Key, key)
        .append(punct(":"))
        .append(RcDoc::space())
        .append(value)
}

fn matrix_doc(matrix: &Matrix) -> RcDoc<'static, Style> {
    let rows = matrix
        .row_vectors()
        .into_iter()
        .map(|row| bracketed("[", row.into_iter().map(number).collect(), "]"))
        .collect();
    bracketed("[", rows, "]")
}

fn value_doc(value: &Value) -> RcDoc<'static, Style> {
    match value {
        Value::Number(n) => number(*n),
        Value::Matrix(m) => matrix_doc(m),
    }
}

fn field_doc(field: &TraceField) -> RcDoc<'static, Style> {
    match field {
        TraceField::Node(trace) => trace_doc(trace),
        TraceField::List(items) => bracketed("[", items.iter().map(field_doc).collect(), "]"),
        TraceField::Text(text) => quoted(Style::Text, text),
        TraceField::Integer(i) => RcDoc::as_string(i).annotate(Style::Number),
        TraceField::Number(n) => number(*n),
    }
}

fn trace_doc(trace: &Trace) -> RcDoc<'static, Style> {
    let kind: &'static str = trace.kind.into();
    let mut entries = vec![
        entry("type", quoted(Style::Kind, kind)),
        entry("description", quoted(Style::Text, &trace.label)),
    ];
    entries.extend(
        trace
            .fields
            .iter()
            .map(|(name, field)| entry(name, field_doc(field))),
    );
    if let Some(result) = &trace.result {
        entries.push(entry("value", value_doc(result)));
    }
    bracketed("{", entries, "}")
}

// Forwards text to a color sink, switching colors on annotation boundaries.
struct ColorWriter<'w, W: WriteColor + Write> {
    out: &'w mut W,
}

impl<'a, 'w, W: WriteColor + Write> RenderAnnotated<'a, Style> for ColorWriter<'w, W> {
    fn push_annotation(&mut self, ann: &'a Style) -> io::Result<()> {
        self.out.set_color(&ann.to_color_spec())
    }
    fn pop_annotation(&mut self) -> io::Result<()> {
        self.out.reset()
    }
}

impl<'w, W: WriteColor + Write> pretty::Render for ColorWriter<'w, W> {
    type Error = io::Error;
    fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.out.write_all(s.as_bytes())?;
        Ok(s.len())
    }
    fn write_str_all(&mut self, s: &str) -> io::Result<()> {
        self.out.write_all(s.as_bytes())
    }
    fn fail_doc(&self) -> Self::Error {
        io::Error::other("render failed")
    }
}

/// Lay `doc` out at `width` columns and write it with colors.
fn render_to<W: WriteColor + Write>(
    doc: &RcDoc<'_, Style>,
    width: usize,
    out: &mut W,
) -> io::Result<()> {
    let mut cw = ColorWriter { out };
    doc.render_raw(width, &mut cw)
}

/// Retrieve the width of the terminal, or 80 if it cannot be determined.
fn terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

/// Pretty-printing conveniences for traces.
pub trait PrettyTrace {
    /// Build an RcDoc representation with style annotations.
    fn pretty_doc(&self) -> RcDoc<'static, Style>;

    /// Render with colors to any termcolor writer at the given width.
    fn pretty_render_to<W: WriteColor + Write>(&self, width: usize, out: &mut W) -> io::Result<()>;

    /// Print to stdout with colors (TTY-aware), at auto-detected width (or 80 if not a TTY).
    fn pretty_print(&self) -> io::Result<()>;

    /// Format into a plain string (no colors).
    fn pretty_string(&self) -> String;
}

impl PrettyTrace for Trace {
    #[inline]
    fn pretty_doc(&self) -> RcDoc<'static, Style> {
        trace_doc(self)
    }

    #[inline]
    fn pretty_render_to<W: WriteColor + Write>(&self, width: usize, out: &mut W) -> io::Result<()> {
        render_to(&self.pretty_doc(), width, out)
    }

    fn pretty_print(&self) -> io::Result<()> {
        let stdout = StandardStream::stdout(ColorChoice::Auto);
        let mut stdout = stdout.lock();
        self.pretty_render_to(terminal_width(), &mut stdout)?;
        writeln!(stdout)
    }

    fn pretty_string(&self) -> String {
        let mut buf = String::new();
        let _ = self.pretty_doc().render_fmt(80, &mut buf);
        buf
    }
}

impl std::fmt::Display for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut w = FmtWrite::new(f);
        self.pretty_doc().render_raw(80, &mut w)
    }
}

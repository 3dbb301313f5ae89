use crate::parser::span::{LineInfo, Span};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

/// User-facing problem found during analysis or emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    InvalidBreakLevel { level: i64 },
    LabelRedeclared { name: String },
    /// Points at the earlier definition related to the previous diagnostic.
    RelatedLocation,
    UndefinedLabel { name: String },
    UnreachableCode,
    UnknownType { name: String },
    UnknownFunction { name: String },
    DeprecatedConstruct { what: String },
    ConstantRedeclared { name: String },
    FunctionRedeclared { name: String },
    EmissionFailed { message: String },
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnreachableCode
            | DiagnosticKind::UnknownType { .. }
            | DiagnosticKind::UnknownFunction { .. }
            | DiagnosticKind::DeprecatedConstruct { .. }
            | DiagnosticKind::RelatedLocation => Severity::Warning,
            DiagnosticKind::InvalidBreakLevel { .. }
            | DiagnosticKind::LabelRedeclared { .. }
            | DiagnosticKind::UndefinedLabel { .. }
            | DiagnosticKind::ConstantRedeclared { .. }
            | DiagnosticKind::FunctionRedeclared { .. }
            | DiagnosticKind::EmissionFailed { .. } => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::InvalidBreakLevel { level } => {
                write!(f, "Cannot break/continue {} level(s)", level)
            }
            DiagnosticKind::LabelRedeclared { name } => {
                write!(f, "Label '{}' already defined", name)
            }
            DiagnosticKind::RelatedLocation => f.write_str("Related location"),
            DiagnosticKind::UndefinedLabel { name } => {
                write!(f, "'goto' to undefined label '{}'", name)
            }
            DiagnosticKind::UnreachableCode => f.write_str("Unreachable code detected"),
            DiagnosticKind::UnknownType { name } => write!(f, "Class '{}' not found", name),
            DiagnosticKind::UnknownFunction { name } => {
                write!(f, "Call to undefined function {}()", name)
            }
            DiagnosticKind::DeprecatedConstruct { what } => write!(f, "{} is deprecated", what),
            DiagnosticKind::ConstantRedeclared { name } => {
                write!(f, "Constant {} already defined", name)
            }
            DiagnosticKind::FunctionRedeclared { name } => {
                write!(f, "Cannot redeclare {}()", name)
            }
            DiagnosticKind::EmissionFailed { message } => {
                write!(f, "Code generation failed: {}", message)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub span: Span,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn to_human_readable(&self, source: &[u8]) -> String {
        self.to_human_readable_with_path(source, None)
    }

    pub fn to_human_readable_with_path(&self, source: &[u8], path: Option<&str>) -> String {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        let Some(LineInfo {
            line,
            column,
            line_text,
        }) = self.span.line_info(source)
        else {
            return format!("{}: {}", label, self.kind);
        };

        let line_str = String::from_utf8_lossy(line_text);
        let gutter_width = line.to_string().len();
        let padding = std::cmp::min(line_text.len(), column.saturating_sub(1));
        let highlight_len = std::cmp::max(
            1,
            std::cmp::min(self.span.len(), line_text.len().saturating_sub(padding)),
        );

        let mut marker = String::new();
        marker.push_str(&" ".repeat(padding));
        marker.push_str(&"^".repeat(highlight_len));

        let location = match path {
            Some(path) => format!("{path}:{line}:{column}"),
            None => format!("line {line}, column {column}"),
        };

        format!(
            "{}: {}\n --> {}\n{gutter}|\n{line_no:>width$} | {line_src}\n{gutter}| {marker}",
            label,
            self.kind,
            location,
            gutter = " ".repeat(gutter_width + 1),
            line_no = line,
            width = gutter_width,
            line_src = line_str,
            marker = marker,
        )
    }
}

/// Receiver of user diagnostics. Reporting never fails.
pub trait ErrorSink {
    fn report(&mut self, kind: DiagnosticKind, span: Span);
}

/// Accumulating [`ErrorSink`].
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    /// Number of diagnostics matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DiagnosticKind) -> bool) -> usize {
        self.items.iter().filter(|d| predicate(&d.kind)).count()
    }

    pub fn kinds(&self) -> Vec<&DiagnosticKind> {
        self.items.iter().map(|d| &d.kind).collect()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl ErrorSink for Diagnostics {
    fn report(&mut self, kind: DiagnosticKind, span: Span) {
        let severity = kind.severity();
        self.items.push(Diagnostic {
            kind,
            span,
            severity,
        });
    }
}

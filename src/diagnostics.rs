//! Diagnostics (C0, SPEC_FULL §4.7, spec.md §7): severities, source-span
//! rendering with a caret under the offending column, and the
//! accumulate-or-unwind split between non-fatal and fatal errors.
//!
//! Grounded on `examples/original_source/src/error.c`/`include/acc/term.h`
//! for the exact rendering shape (`file:line:column: severity: message`
//! plus the source line and a caret) and on the teacher's
//! `seen_common::error` enum-of-kinds idiom for representing severities as
//! a small closed enum rather than a string tag.

use std::fmt;

use crate::target::Os;

/// Where a diagnostic was raised (spec.md §7: "file:line:column").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    pub file: String,
    pub line: u32,
    pub column: u32,
    /// The full text of the offending line, for caret rendering. `None`
    /// for diagnostics raised without a source line in hand (e.g. option
    /// errors, internal errors — spec.md §7 says these "hide... location").
    pub line_text: Option<String>,
}

impl SourceSpan {
    pub fn new(file: impl Into<String>, line: u32, column: u32, line_text: impl Into<String>) -> SourceSpan {
        SourceSpan { file: file.into(), line, column, line_text: Some(line_text.into()) }
    }
}

/// Severity of a diagnostic (spec.md §7 "Error kinds").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Reported unless suppressed by `-w`; never affects exit status.
    Warning,
    /// Non-fatal: reported, parser recovers by consuming to a sync token.
    Error,
    /// Fatal: unwinds to the compile driver, aborts this file only.
    Fatal,
    /// Fatal and always a bug report, never attributed to user input
    /// (spec.md §7: "opcode dispatched on unexpected type", "allocator
    /// unable to color").
    Internal,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal error",
            Severity::Internal => "internal error",
        }
    }

    /// Tokenizer/Options/Internal diagnostics hide the token and/or location
    /// per spec.md §7's table; only Parser/Warning carry a span.
    pub fn carries_span(self) -> bool {
        matches!(self, Severity::Warning | Severity::Error)
    }

    pub fn is_fatal(self) -> bool {
        matches!(self, Severity::Fatal | Severity::Internal)
    }
}

/// One reported diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Diagnostic {
        Diagnostic { severity, message: message.into(), span: None }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Diagnostic {
        if self.severity.carries_span() {
            self.span = Some(span);
        }
        self
    }

    /// Renders this diagnostic the way spec.md §7 describes: location,
    /// severity label, message, then (if present) the source line and a
    /// caret under the column. `color` gates ANSI escapes around the
    /// severity label.
    pub fn render(&self, color: bool) -> String {
        let mut out = String::new();
        if let Some(span) = &self.span {
            out.push_str(&format!("{}:{}:{}: ", span.file, span.line, span.column));
        }
        if color {
            let code = match self.severity {
                Severity::Warning => "33",
                Severity::Error | Severity::Fatal => "31",
                Severity::Internal => "35",
            };
            out.push_str(&format!("\x1b[{}m{}\x1b[0m: {}", code, self.severity.label(), self.message));
        } else {
            out.push_str(&format!("{}: {}", self.severity.label(), self.message));
        }
        if let Some(span) = &self.span {
            if let Some(text) = &span.line_text {
                out.push('\n');
                out.push_str(text);
                out.push('\n');
                let col = span.column.saturating_sub(1) as usize;
                out.push_str(&" ".repeat(col));
                out.push('^');
            }
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(false))
    }
}

/// Whether ANSI color should be applied to rendered diagnostics: gated by
/// the `ACC_COLORS` environment variable (spec.md §6) and overridden off
/// when the selected target OS disables it at build (spec.md §6 footnote,
/// `Os::disables_ansi_color`).
pub fn colors_enabled(os: Os) -> bool {
    if os.disables_ansi_color() {
        return false;
    }
    std::env::var_os("ACC_COLORS").is_some()
}

/// Error raised when a fatal diagnostic needs to unwind to the compile
/// driver (spec.md §7: "Fatal errors unwind to the compile driver via a
/// non-local transfer"). The idiomatic Rust equivalent of the original's
/// `setjmp`/`longjmp`: an `Err` that propagates with `?` up to `main`'s
/// per-file loop, which catches it, prints it, and continues with the next
/// file (see REDESIGN FLAGS in SPEC_FULL.md).
#[derive(Debug, Clone)]
pub struct FatalDiagnostic(pub Diagnostic);

impl fmt::Display for FatalDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for FatalDiagnostic {}

/// Accumulates non-fatal diagnostics (warnings, recovered parse errors)
/// for one file's compilation. Fatal ones bypass this entirely and unwind
/// as a `FatalDiagnostic`.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    suppress_warnings: bool,
}

impl DiagnosticSink {
    pub fn new(suppress_warnings: bool) -> DiagnosticSink {
        DiagnosticSink { diagnostics: Vec::new(), suppress_warnings }
    }

    /// Records a diagnostic. A `Fatal`/`Internal` one still gets recorded
    /// here (for tests or a `-Sir`-style dump) but callers are expected to
    /// have already returned a `FatalDiagnostic` up the call stack before
    /// reaching this point in ordinary control flow.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Warning && self.suppress_warnings {
            return;
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| matches!(d.severity, Severity::Error | Severity::Fatal | Severity::Internal))
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn render_all(&self, color: bool) -> String {
        self.diagnostics.iter().map(|d| d.render(color)).collect::<Vec<_>>().join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_suppressed_when_requested() {
        let mut sink = DiagnosticSink::new(true);
        sink.report(Diagnostic::new(Severity::Warning, "unused variable"));
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn error_always_recorded() {
        let mut sink = DiagnosticSink::new(true);
        sink.report(Diagnostic::new(Severity::Error, "syntax error"));
        assert!(sink.has_errors());
    }

    #[test]
    fn render_includes_caret_under_column() {
        let diag = Diagnostic::new(Severity::Error, "unexpected token")
            .with_span(SourceSpan::new("main.c", 3, 5, "  int x = ;"));
        let rendered = diag.render(false);
        assert!(rendered.contains("main.c:3:5:"));
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[2].len() + 1, 5);
        assert!(lines[2].ends_with('^'));
    }

    #[test]
    fn internal_and_options_errors_hide_span() {
        let diag = Diagnostic::new(Severity::Internal, "allocator could not color instruction")
            .with_span(SourceSpan::new("main.c", 1, 1, "int f(void){}"));
        assert!(diag.span.is_none());
    }
}

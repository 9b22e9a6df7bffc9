use std::fmt::{self, Display};

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use super::{parsers::parser, unit::SourceUnit};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
/// Severity of a diagnostic emitted by `javac`.
pub enum DiagnosticSeverity {
    /// Diagnostic raised as an error.
    Error,
    /// Diagnostic raised as a warning.
    Warning,
}

impl DiagnosticSeverity {
    /// Canonical upper-case label.
    fn as_str(self) -> &'static str {
        match self {
            DiagnosticSeverity::Error => "ERROR",
            DiagnosticSeverity::Warning => "WARNING",
        }
    }

    /// Indicates whether the severity represents an error.
    pub fn is_error(self) -> bool {
        matches!(self, DiagnosticSeverity::Error)
    }
}

impl Serialize for DiagnosticSeverity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DiagnosticSeverity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        match value.as_str() {
            "ERROR" => Ok(DiagnosticSeverity::Error),
            "WARNING" => Ok(DiagnosticSeverity::Warning),
            other => Err(de::Error::custom(format!("Unknown diagnostic severity: {other}"))),
        }
    }
}

impl Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First line of a javac diagnostic, before attribution to a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavacLine {
    /// path as printed by javac
    pub path:     String,
    /// 1-based line number
    pub line:     u32,
    /// error or warning
    pub severity: DiagnosticSeverity,
    /// text after the severity marker
    pub message:  String,
}

/// A compiler message tied to a unit, a line and a severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Unit the message belongs to, when it could be attributed.
    pub unit:     Option<String>,
    /// 1-based line; 1 when unknown.
    pub line:     u32,
    /// Severity of the message.
    pub severity: DiagnosticSeverity,
    /// Message text, including verbose follow-up lines.
    pub message:  String,
}

impl Diagnostic {
    /// An error diagnostic, clamping the line to at least 1.
    pub fn error(unit: Option<String>, line: u32, message: impl Into<String>) -> Self {
        Self {
            unit,
            line: line.max(1),
            severity: DiagnosticSeverity::Error,
            message: message.into(),
        }
    }

    /// True if this diagnostic belongs to `unit`.
    pub fn belongs_to(&self, unit: &str) -> bool {
        self.unit.as_deref() == Some(unit)
    }
}

/// Why a compilation produced no artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileFailure {
    /// Every diagnostic reported, in output order.
    pub diagnostics: Vec<Diagnostic>,
    /// Names of the units submitted in the failing invocation.
    pub units:       Vec<String>,
    /// Raw compiler output.
    pub raw_output:  String,
}

impl CompileFailure {
    /// Parses javac output into attributed diagnostics.
    ///
    /// A diagnostic is attributed to a unit when its reported path is that
    /// unit's file identity; with a single unit every diagnostic is
    /// attributed to it. When javac failed without printing anything
    /// recognisable, a single line-1 error carrying the raw output is
    /// produced instead.
    pub fn from_javac_output(output: impl Into<String>, units: &[SourceUnit]) -> Self {
        let output = output.into();
        let single = match units {
            [only] => Some(only.name().to_string()),
            _ => None,
        };

        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        for line in output.lines() {
            if let Ok(parsed) = parser::javac_diagnostic(line) {
                let unit = single.clone().or_else(|| {
                    units
                        .iter()
                        .find(|u| u.owns_path(&parsed.path))
                        .map(|u| u.name().to_string())
                });
                diagnostics.push(Diagnostic {
                    unit,
                    line: parsed.line.max(1),
                    severity: parsed.severity,
                    message: parsed.message,
                });
            } else if let Ok(detail) = parser::javac_detail(line)
                && let Some(last) = diagnostics.last_mut()
            {
                last.message.push('\n');
                last.message.push_str(&detail);
            }
        }

        if !diagnostics.iter().any(|d| d.severity.is_error()) {
            let message = if output.trim().is_empty() {
                "compilation failed without diagnostics".to_string()
            } else {
                output.trim().to_string()
            };
            diagnostics.push(Diagnostic::error(single, 1, message));
        }

        Self {
            diagnostics,
            units: units.iter().map(|u| u.name().to_string()).collect(),
            raw_output: output,
        }
    }

    /// True if at least one error is attributed to `unit`.
    pub fn is_attributed_to(&self, unit: &str) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity.is_error() && d.belongs_to(unit))
    }

    /// Diagnostics attributed to `unit`, or all of them when none are.
    pub fn diagnostics_for(&self, unit: &str) -> Vec<Diagnostic> {
        let owned: Vec<Diagnostic> = self
            .diagnostics
            .iter()
            .filter(|d| d.belongs_to(unit))
            .cloned()
            .collect();
        if owned.is_empty() {
            self.diagnostics.clone()
        } else {
            owned
        }
    }

    /// Diagnostics rendered one per line, `unit:line: severity: message`.
    pub fn render(&self) -> String {
        self.diagnostics
            .iter()
            .map(|d| {
                format!(
                    "{}:{}: {}: {}",
                    d.unit.as_deref().unwrap_or("?"),
                    d.line,
                    d.severity,
                    d.message
                )
            })
            .join("\n")
    }
}

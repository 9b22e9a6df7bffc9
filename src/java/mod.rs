#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Class-file constant pool reader.
pub mod classfile;
/// Compilation strategies.
pub mod compiler;
/// Compiler diagnostics and their attribution to units.
pub mod diagnostics;
/// Primary class name extraction and template binding.
pub mod extract;
/// Per-call class materialisation and two-tier name resolution.
pub mod loader;
/// Tree-sitter parser wrapper.
pub mod parser;
/// Parsers for javac and JUnit console outputs.
pub mod parsers;
/// Tree-sitter query strings used by Java analysis.
pub mod queries;
/// Test execution strategies.
pub mod runner;
/// Source units and compiled artifacts.
pub mod unit;
/// Java-specific filesystem and toolchain helpers.
pub mod util;

pub use compiler::{Compilation, Compiler, JavacCompiler};
pub use diagnostics::{CompileFailure, Diagnostic, DiagnosticSeverity};
pub use extract::{bind_template, extract_class_name};
pub use loader::{ExecutionLoader, HostNamespace, LoadError, LoadedUnits};
pub use parser::Parser;
pub use runner::{JunitRunner, RunOutcome, TestFailure, TestRunner};
pub use unit::{CompiledArtifact, CompiledArtifacts, SourceUnit};

//! Tree-sitter query strings used by the Java analyzers.

/// Tree-sitter query that returns the name of every type declaration
/// (class, interface, enum, record), nested ones included.
/// * `name`: simple name of the declared type
pub const TYPE_NAME_QUERY: &str = include_str!("type_name.scm");

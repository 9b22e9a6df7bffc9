#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Formatter;

use anyhow::{Context, Result, anyhow};
use tree_sitter::{Query, QueryCursor, StreamingIterator, Tree};

/// A struct that wraps a tree-sitter parse tree and the source code it was
/// built from.
pub struct Parser {
    /// the source code being parsed
    code: String,
    /// the parse tree
    tree: Tree,
    /// the tree-sitter java grammar language
    lang: tree_sitter::Language,
}

/// Returns the compiled tree-sitter Java language.
fn java_language() -> tree_sitter::Language {
    tree_sitter_java::LANGUAGE.into()
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("bytes", &self.code.len())
            .finish()
    }
}

impl Parser {
    /// Returns a new parser object
    ///
    /// * `source_code`: the source code to be parsed
    pub fn new(source_code: impl Into<String>) -> Result<Self> {
        let source_code = source_code.into();
        let mut parser = tree_sitter::Parser::new();
        let language = java_language();

        parser
            .set_language(&language)
            .with_context(|| "Failed to load Java grammar")?;
        let tree = parser
            .parse(source_code.as_str(), None)
            .ok_or_else(|| anyhow!("Error parsing Java code"))?;

        Ok(Self {
            code: source_code,
            tree,
            lang: language,
        })
    }

    /// Returns the text and byte offset of every occurrence of
    /// `capture_name` in the supplied query, ordered by position in the
    /// source.
    pub fn captures(&self, q: &str, capture_name: &str) -> Result<Vec<(String, usize)>> {
        let query = Query::new(&self.lang, q)
            .with_context(|| format!("Failed to compile tree-sitter query: {q}"))?;
        let capture_index = query
            .capture_index_for_name(capture_name)
            .ok_or_else(|| anyhow!("Capture name {capture_name} not present in query"))?;

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, self.tree.root_node(), self.code.as_bytes());
        let mut results = Vec::new();

        while let Some(m) = matches.next() {
            for capture in m.captures.iter().filter(|c| c.index == capture_index) {
                let text = capture
                    .node
                    .utf8_text(self.code.as_bytes())
                    .context("Cannot map capture to source text")?;
                results.push((text.to_string(), capture.node.start_byte()));
            }
        }

        results.sort_by_key(|(_, offset)| *offset);
        Ok(results)
    }
}

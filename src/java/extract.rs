use tracing::debug;

use super::{Parser, queries::TYPE_NAME_QUERY};

/// Recovers the primary type name declared by `source`.
///
/// The first class, interface, enum or record declaration in document
/// order wins, so an outer type always beats the types nested in it.
/// Modifiers, annotations, type parameters and `extends`/`implements`
/// clauses are all tolerated. Returns `None` when nothing recognisable is
/// declared; never fails.
pub fn extract_class_name(source: &str) -> Option<String> {
    let parser = match Parser::new(source) {
        Ok(parser) => parser,
        Err(e) => {
            debug!("java parser unavailable: {e:#}");
            return None;
        }
    };

    match parser.captures(TYPE_NAME_QUERY, "name") {
        Ok(names) => names.into_iter().next().map(|(name, _)| name),
        Err(e) => {
            debug!("type name query failed: {e:#}");
            None
        }
    }
}

/// Substitutes every occurrence of `placeholder` in a question's test
/// template with the candidate's class name.
pub fn bind_template(template: &str, placeholder: &str, class_name: &str) -> String {
    if placeholder.is_empty() {
        return template.to_string();
    }
    template.replace(placeholder, class_name)
}

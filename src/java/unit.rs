use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::PreconditionError;

/// True if `name` is a (possibly dotted) Java identifier:
/// `([A-Za-z_$][A-Za-z0-9_$]*\.)*[A-Za-z_$][A-Za-z0-9_$]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
                    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
                }
                _ => false,
            }
        })
}

/// A named block of Java source intended to compile to one loadable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// validated unit name
    name: String,
    /// untrusted source text
    text: String,
}

impl SourceUnit {
    /// Creates a unit, rejecting names outside the identifier grammar.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Result<Self, PreconditionError> {
        let name = name.into();
        if !is_valid_identifier(&name) {
            return Err(PreconditionError::InvalidIdentifier(name));
        }
        Ok(Self {
            name,
            text: text.into(),
        })
    }

    /// Unit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Last segment of the name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Synthesised file identity: `a.b.C` becomes `a/b/C.java`.
    pub fn file_identity(&self) -> String {
        format!("{}.java", self.name.replace('.', "/"))
    }

    /// True if a compiler-reported path designates this unit's file.
    pub fn owns_path(&self, reported: &str) -> bool {
        let reported = reported.replace('\\', "/");
        let identity = self.file_identity();
        reported == identity || reported.ends_with(&format!("/{identity}"))
    }
}

/// Rejects a request in which two units share a name.
pub fn ensure_distinct(units: &[SourceUnit]) -> Result<(), PreconditionError> {
    let mut seen = HashSet::new();
    for unit in units {
        if !seen.insert(unit.name()) {
            return Err(PreconditionError::DuplicateUnit(unit.name().to_string()));
        }
    }
    Ok(())
}

/// Class files produced for one unit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    /// unit the classes were compiled from
    unit:        String,
    /// file identity used for diagnostic attribution
    source_file: String,
    /// binary class name to class-file bytes
    classes:     BTreeMap<String, Vec<u8>>,
}

/// Artifacts of one compilation, keyed by unit name.
pub type CompiledArtifacts = BTreeMap<String, CompiledArtifact>;

impl CompiledArtifact {
    /// Creates an artifact for `unit` holding `classes`.
    pub fn new(unit: &SourceUnit, classes: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            unit: unit.name().to_string(),
            source_file: unit.file_identity(),
            classes,
        }
    }

    /// Name of the originating unit.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// File identity of the originating unit.
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    /// Binary class names mapped to class-file bytes.
    pub fn classes(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.classes
    }

    /// Binary name of the top-level class the unit is named after.
    ///
    /// Falls back to the first non-nested class when the declared package
    /// moved it under a qualified name.
    pub fn primary_class(&self) -> Option<&str> {
        let simple = self.unit.rsplit('.').next().unwrap_or(&self.unit);
        self.classes
            .keys()
            .find(|name| *name == &self.unit || name.rsplit('.').next() == Some(simple))
            .or_else(|| self.classes.keys().find(|name| !name.contains('$')))
            .map(String::as_str)
    }

    /// Total size of the class-file payloads, in bytes.
    pub fn payload_len(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }
}

/// Outermost simple class name of a binary name: `a.b.Foo$Inner` is `Foo`.
pub fn outer_simple_name(binary_name: &str) -> &str {
    let simple = binary_name.rsplit('.').next().unwrap_or(binary_name);
    simple.split('$').next().unwrap_or(simple)
}

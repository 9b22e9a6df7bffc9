use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Represents a source location identified by file name and line number.
#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub struct LineRef {
    /// The line number within the file.
    pub line_number: usize,
    /// The file name associated with the frame, without the `.java` suffix.
    pub file_name:   String,
}

impl LineRef {
    /// Returns the file name for this reference.
    pub fn file_name(&self) -> &str {
        self.file_name.as_ref()
    }

    /// True if this reference points into the file `stem.java`.
    pub fn is_in(&self, stem: &str) -> bool {
        self.file_name == stem
    }
}

/// Identity of a question, as handed to the core by the request layer.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub u64);

impl Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for QuestionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

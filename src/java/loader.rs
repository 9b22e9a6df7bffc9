#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use tracing::debug;

use super::{
    classfile::{ClassFileError, read_class_info},
    unit::{CompiledArtifact, CompiledArtifacts},
    util::{ScratchDir, absolute},
};
use crate::error::{InternalCategory, InternalError, JudgeError};

/// Packages served by the JVM's own runtime image.
const PLATFORM_PREFIXES: &[&str] = &[
    "java.", "javax.", "jdk.", "sun.", "com.sun.", "org.w3c.", "org.xml.", "org.ietf.",
];

/// Packages shipped inside the JUnit console standalone jar.
pub const JUNIT_PREFIXES: &[&str] = &["org.junit.", "org.opentest4j.", "org.apiguardian."];

/// Why loading a set of artifacts failed.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    /// A referenced class is neither local nor provided by the host.
    #[error("class `{name}` referenced by `{referrer}` cannot be resolved")]
    Unresolved {
        /// missing class
        name:     String,
        /// class that refers to it
        referrer: String,
    },
    /// A payload is not a readable class file.
    #[error("class `{name}` is malformed: {source}")]
    Malformed {
        /// binary name the payload was stored under
        name:   String,
        /// parse error
        #[source]
        source: ClassFileError,
    },
    /// A payload declares a different class than the name it was stored under.
    #[error("payload stored as `{expected}` declares `{found}`")]
    NameMismatch {
        /// name in the artifact map
        expected: String,
        /// name inside the class file
        found:    String,
    },
    /// Two artifacts provide the same class.
    #[error("class `{0}` is provided by more than one unit")]
    Duplicate(String),
    /// Scratch directory trouble.
    #[error("i/o failure while materialising classes: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LoadError> for JudgeError {
    fn from(err: LoadError) -> Self {
        let category = match &err {
            LoadError::Io(_) => InternalCategory::Io,
            _ => InternalCategory::Resolution,
        };
        JudgeError::Internal(InternalError::new(category, err.to_string()))
    }
}

/// One place the host can serve classes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEntry {
    /// A jar serving every class under the listed package prefixes.
    Archive {
        /// path of the jar; must exist
        path:     PathBuf,
        /// package prefixes, each ending with `.`
        packages: Vec<String>,
    },
    /// A directory laid out by package.
    Directory(PathBuf),
}

/// The parent namespace: the runtime platform plus host libraries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostNamespace {
    /// host entries in resolution order
    entries: Vec<HostEntry>,
}

impl HostNamespace {
    /// Platform classes only.
    pub fn platform() -> Self {
        Self::default()
    }

    /// Platform plus the JUnit console jar.
    pub fn with_junit(jar: impl Into<PathBuf>) -> Self {
        Self::platform().archive(
            jar,
            JUNIT_PREFIXES.iter().map(|p| p.to_string()).collect(),
        )
    }

    /// Adds a jar serving `packages`.
    pub fn archive(mut self, path: impl Into<PathBuf>, packages: Vec<String>) -> Self {
        let path: PathBuf = path.into();
        self.entries.push(HostEntry::Archive {
            path: absolute(&path),
            packages,
        });
        self
    }

    /// Adds a class directory.
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        self.entries.push(HostEntry::Directory(absolute(&path)));
        self
    }

    /// Host entries, in resolution order.
    pub fn entries(&self) -> &[HostEntry] {
        &self.entries
    }

    /// Classpath entries contributed by the host.
    pub fn classpath(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .map(|e| match e {
                HostEntry::Archive { path, .. } => path.clone(),
                HostEntry::Directory(path) => path.clone(),
            })
            .collect()
    }

    /// True if the host can serve the class `name`.
    pub fn provides(&self, name: &str) -> bool {
        if PLATFORM_PREFIXES.iter().any(|p| name.starts_with(p)) {
            return true;
        }
        self.entries.iter().any(|entry| match entry {
            HostEntry::Archive { path, packages } => {
                packages.iter().any(|p| name.starts_with(p.as_str())) && path.is_file()
            }
            HostEntry::Directory(dir) => {
                let relative = format!("{}.class", name.replace('.', "/"));
                dir.join(relative).is_file()
            }
        })
    }
}

/// Materialises artifacts for one verdict computation.
#[derive(Debug, Clone)]
pub struct ExecutionLoader {
    /// parent of per-call scratch directories
    scratch_root: PathBuf,
}

impl ExecutionLoader {
    /// Creates a loader that materialises classes under `scratch_root`.
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        let scratch_root: PathBuf = scratch_root.into();
        Self {
            scratch_root: absolute(&scratch_root),
        }
    }

    /// Resolves and materialises every artifact.
    ///
    /// Names present in `artifacts` are served locally; every other class
    /// referenced from a local class must be provided by `parent`, otherwise
    /// loading fails with [`LoadError::Unresolved`]. The returned namespace
    /// owns its directory and deletes it when dropped.
    pub fn load(
        &self,
        artifacts: &CompiledArtifacts,
        parent: &HostNamespace,
    ) -> Result<LoadedUnits, JudgeError> {
        let mut local: BTreeMap<String, (&str, &[u8])> = BTreeMap::new();
        for artifact in artifacts.values() {
            for (name, bytes) in artifact.classes() {
                if local
                    .insert(name.clone(), (artifact.unit(), bytes.as_slice()))
                    .is_some()
                {
                    return Err(LoadError::Duplicate(name.clone()).into());
                }
            }
        }

        for (name, (_, bytes)) in &local {
            let info = read_class_info(bytes).map_err(|source| LoadError::Malformed {
                name: name.clone(),
                source,
            })?;
            if &info.this_class != name {
                return Err(LoadError::NameMismatch {
                    expected: name.clone(),
                    found:    info.this_class,
                }
                .into());
            }
            if let Some(missing) = info
                .references
                .iter()
                .find(|r| !local.contains_key(r.as_str()) && !parent.provides(r))
            {
                return Err(LoadError::Unresolved {
                    name:     missing.clone(),
                    referrer: name.clone(),
                }
                .into());
            }
        }

        let scratch = ScratchDir::create(&self.scratch_root, "load")?;
        let classes_dir = scratch.path().join("classes");
        for (name, (_, bytes)) in &local {
            let path = classes_dir.join(format!("{}.class", name.replace('.', "/")));
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir).map_err(LoadError::from)?;
            }
            std::fs::write(&path, bytes).map_err(LoadError::from)?;
        }
        debug!(classes = local.len(), dir = %classes_dir.display(), "materialised classes");

        Ok(LoadedUnits {
            classes_dir,
            parent: parent.clone(),
            units: artifacts.clone(),
            _scratch: scratch,
        })
    }
}

/// Units loaded for a single run. Dropping it discards the namespace.
#[derive(Debug)]
pub struct LoadedUnits {
    /// directory holding the materialised classes
    classes_dir: PathBuf,
    /// host namespace chained behind the local classes
    parent:      HostNamespace,
    /// loaded artifacts by unit name
    units:       CompiledArtifacts,
    /// keeps the scratch directory alive
    _scratch:    ScratchDir,
}

/// Where a class name resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Served from a loaded artifact.
    Local,
    /// Delegated to the host namespace.
    Host,
}

impl LoadedUnits {
    /// Directory of materialised classes.
    pub fn classes_dir(&self) -> &Path {
        &self.classes_dir
    }

    /// Local classes first, then host entries.
    pub fn classpath(&self) -> Vec<PathBuf> {
        let mut entries = vec![self.classes_dir.clone()];
        entries.extend(self.parent.classpath());
        entries
    }

    /// Resolves a class name the way the test JVM will see it.
    pub fn resolve(&self, name: &str) -> Option<Resolution> {
        if self.units.values().any(|a| a.classes().contains_key(name)) {
            Some(Resolution::Local)
        } else if self.parent.provides(name) {
            Some(Resolution::Host)
        } else {
            None
        }
    }

    /// Loaded artifact of `unit`.
    pub fn unit(&self, unit: &str) -> Option<&CompiledArtifact> {
        self.units.get(unit)
    }
}

//! Paths as seen by the build graph.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::fs::to_slash;

/// A path rooted either in the source tree or in the build tree.
///
/// Rules may only produce build paths. Source paths are leaves that must
/// exist on disk when a rule depending on them is checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "root", content = "path", rename_all = "lowercase")]
pub enum BuildPath {
    /// Relative to the source root
    Src(PathBuf),
    /// Relative to the build root
    Build(PathBuf),
}

impl BuildPath {
    /// A path relative to the source root.
    pub fn src(path: impl Into<PathBuf>) -> Self {
        BuildPath::Src(path.into())
    }

    /// A path relative to the build root.
    pub fn build(path: impl Into<PathBuf>) -> Self {
        BuildPath::Build(path.into())
    }

    /// The path relative to its root.
    pub fn rel(&self) -> &Path {
        match self {
            BuildPath::Src(p) | BuildPath::Build(p) => p,
        }
    }

    /// Whether this path lives in the build tree.
    pub fn is_build(&self) -> bool {
        matches!(self, BuildPath::Build(_))
    }

    /// Append a path component, staying in the same root.
    pub fn join(&self, seg: impl AsRef<Path>) -> Self {
        match self {
            BuildPath::Src(p) => BuildPath::Src(p.join(seg)),
            BuildPath::Build(p) => BuildPath::Build(p.join(seg)),
        }
    }

    /// The final component as a string.
    pub fn file_name(&self) -> String {
        self.rel()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// A generated build path mirroring this path with a new extension.
    ///
    /// `src/a.c` becomes build `src/a.o` for `gen("o")`.
    pub fn gen(&self, ext: &str) -> Self {
        BuildPath::Build(self.rel().with_extension(ext))
    }
}

impl From<&str> for BuildPath {
    fn from(path: &str) -> Self {
        BuildPath::src(path)
    }
}

impl From<String> for BuildPath {
    fn from(path: String) -> Self {
        BuildPath::src(path)
    }
}

impl From<PathBuf> for BuildPath {
    fn from(path: PathBuf) -> Self {
        BuildPath::Src(path)
    }
}

impl From<&Path> for BuildPath {
    fn from(path: &Path) -> Self {
        BuildPath::src(path)
    }
}

impl fmt::Display for BuildPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildPath::Src(p) => write!(f, "{}", to_slash(p)),
            BuildPath::Build(p) => write!(f, "@build/{}", to_slash(p)),
        }
    }
}

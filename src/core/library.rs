//! Executables, libraries and the compilations behind them.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::errors::DeclarationError;
use crate::core::package::{LinkTarget, PackageReference};
use crate::graph::BuildPath;

/// Requested library type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryType {
    /// Whatever the distribution defaults to
    #[default]
    Default,
    Static,
    #[serde(alias = "shared")]
    Dynamic,
}

impl FromStr for LibraryType {
    type Err = DeclarationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(LibraryType::Default),
            "static" => Ok(LibraryType::Static),
            "dynamic" | "shared" => Ok(LibraryType::Dynamic),
            _ => Err(DeclarationError::UnknownLibraryType(s.to_string())),
        }
    }
}

/// Library type after applying distribution defaults. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedLibraryType {
    Static,
    Dynamic,
}

impl LibraryType {
    /// Resolve against the distribution default.
    pub fn resolve(self, default: ResolvedLibraryType) -> ResolvedLibraryType {
        match self {
            LibraryType::Default => default,
            LibraryType::Static => ResolvedLibraryType::Static,
            LibraryType::Dynamic => ResolvedLibraryType::Dynamic,
        }
    }
}

impl fmt::Display for ResolvedLibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedLibraryType::Static => write!(f, "static"),
            ResolvedLibraryType::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// A to-be-built executable or library.
#[derive(Debug, Clone)]
pub struct LinkedCompilation {
    /// Unique within the owning distribution
    pub name: String,
    pub dist_name: String,
    pub dist_version: String,
    /// Directory receiving the binaries
    pub out_dir: BuildPath,
    pub sources: Vec<BuildPath>,
    /// Public include directories, inherited by dependents
    pub include_dirs: Vec<BuildPath>,
    pub private_include_dirs: Vec<BuildPath>,
    /// Libraries linked directly
    pub link_to: Vec<Library>,
    pub packages: Vec<PackageReference>,
    /// Per-compilation compile command database
    pub compile_commands: BuildPath,
    /// Excluded from the exported package
    pub dev_only: bool,
}

impl LinkedCompilation {
    /// `dist/name`, unique across distributions of one process.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.dist_name, self.name)
    }
}

struct LibraryInner {
    compilation: LinkedCompilation,
    lib_type: ResolvedLibraryType,
    binary: BuildPath,
    import_library: Option<BuildPath>,
}

/// Shared handle to a declared library.
///
/// Handles compare by identity: two libraries with the same name declared
/// by different distributions are different libraries.
#[derive(Clone)]
pub struct Library(Arc<LibraryInner>);

impl Library {
    pub(crate) fn new(
        compilation: LinkedCompilation,
        lib_type: ResolvedLibraryType,
        binary: BuildPath,
        import_library: Option<BuildPath>,
    ) -> Self {
        Library(Arc::new(LibraryInner {
            compilation,
            lib_type,
            binary,
            import_library,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.compilation.name
    }

    pub fn dist_name(&self) -> &str {
        &self.0.compilation.dist_name
    }

    pub fn dist_version(&self) -> &str {
        &self.0.compilation.dist_version
    }

    pub fn lib_type(&self) -> ResolvedLibraryType {
        self.0.lib_type
    }

    /// The built static archive or shared object.
    pub fn binary(&self) -> &BuildPath {
        &self.0.binary
    }

    /// Import library of a Windows DLL.
    pub fn import_library(&self) -> Option<&BuildPath> {
        self.0.import_library.as_ref()
    }

    /// What dependents pass to the linker.
    pub fn link_artifact(&self) -> &BuildPath {
        self.import_library().unwrap_or(self.binary())
    }

    /// Public include directories.
    pub fn includes(&self) -> &[BuildPath] {
        &self.0.compilation.include_dirs
    }

    /// Libraries linked directly. External packages are not included.
    pub fn linked_libraries(&self) -> &[Library] {
        &self.0.compilation.link_to
    }

    pub fn compilation(&self) -> &LinkedCompilation {
        &self.0.compilation
    }

    pub fn ptr_eq(&self, other: &Library) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Library {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Library {}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("name", &self.qualified_name())
            .field("type", &self.0.lib_type)
            .field("binary", &self.0.binary)
            .finish()
    }
}

impl Library {
    pub fn qualified_name(&self) -> String {
        self.0.compilation.qualified_name()
    }
}

/// Result of `Distribution::add_executable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    pub name: String,
    pub binary: BuildPath,
}

/// Result of `Distribution::add_test`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Test {
    /// Runs the test binary
    pub run: BuildPath,
    pub binary: BuildPath,
}

/// Targets that can be installed.
pub trait InstallTarget {
    fn target_name(&self) -> &str;
}

impl InstallTarget for Executable {
    fn target_name(&self) -> &str {
        &self.name
    }
}

impl InstallTarget for Library {
    fn target_name(&self) -> &str {
        self.name()
    }
}

/// Options shared by executables, tests and libraries.
#[derive(Debug, Clone, Default)]
pub struct TargetOptions {
    pub name: String,
    /// Source files. Plain paths are relative to the source root; build
    /// paths name generated sources produced by another rule.
    pub sources: Vec<BuildPath>,
    /// Defaults to `include`
    pub include_dirs: Option<Vec<PathBuf>>,
    /// Defaults to `private/include`
    pub private_include_dirs: Option<Vec<PathBuf>>,
    pub link_to: Vec<LinkTarget>,
}

impl TargetOptions {
    pub fn new(name: impl Into<String>) -> Self {
        TargetOptions {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn source(mut self, src: impl Into<BuildPath>) -> Self {
        self.sources.push(src.into());
        self
    }

    pub fn sources<I, P>(mut self, srcs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<BuildPath>,
    {
        self.sources.extend(srcs.into_iter().map(Into::into));
        self
    }

    pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.get_or_insert_with(Vec::new).push(dir.into());
        self
    }

    pub fn private_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.private_include_dirs
            .get_or_insert_with(Vec::new)
            .push(dir.into());
        self
    }

    pub fn link_to(mut self, target: impl Into<LinkTarget>) -> Self {
        self.link_to.push(target.into());
        self
    }

    /// Turn these options into library options of the given type.
    pub fn with_type(self, lib_type: LibraryType) -> LibraryOptions {
        LibraryOptions {
            target: self,
            lib_type,
        }
    }
}

/// Options for `Distribution::add_library`.
#[derive(Debug, Clone, Default)]
pub struct LibraryOptions {
    pub target: TargetOptions,
    pub lib_type: LibraryType,
}

impl From<TargetOptions> for LibraryOptions {
    fn from(target: TargetOptions) -> Self {
        LibraryOptions {
            target,
            lib_type: LibraryType::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_type_parse() {
        assert_eq!("static".parse::<LibraryType>().unwrap(), LibraryType::Static);
        assert_eq!("dynamic".parse::<LibraryType>().unwrap(), LibraryType::Dynamic);
        assert_eq!("default".parse::<LibraryType>().unwrap(), LibraryType::Default);

        let err = "archive".parse::<LibraryType>().unwrap_err();
        assert!(matches!(err, DeclarationError::UnknownLibraryType(ref t) if t == "archive"));
    }

    #[test]
    fn test_library_type_resolution() {
        use ResolvedLibraryType::*;
        assert_eq!(LibraryType::Default.resolve(Static), Static);
        assert_eq!(LibraryType::Default.resolve(Dynamic), Dynamic);
        assert_eq!(LibraryType::Static.resolve(Dynamic), Static);
        assert_eq!(LibraryType::Dynamic.resolve(Static), Dynamic);
    }

    #[test]
    fn test_target_options_builder() {
        let opts = TargetOptions::new("add")
            .source("src/add.c")
            .include_dir("include")
            .private_include_dir("src");
        assert_eq!(opts.sources, vec![BuildPath::src("src/add.c")]);
        assert_eq!(opts.include_dirs, Some(vec![PathBuf::from("include")]));
        assert_eq!(opts.private_include_dirs, Some(vec![PathBuf::from("src")]));

        let lib = opts.with_type(LibraryType::Dynamic);
        assert_eq!(lib.lib_type, LibraryType::Dynamic);

        let generated = TargetOptions::new("e1").sources([
            BuildPath::src("src/e1.c"),
            BuildPath::build("gen.c"),
        ]);
        assert_eq!(generated.sources[1], BuildPath::build("gen.c"));
    }

    #[test]
    fn test_library_type_names_agree() {
        for name in ["default", "static", "dynamic", "shared"] {
            let parsed: LibraryType = name.parse().unwrap();
            let deserialized: LibraryType =
                serde_json::from_str(&format!("\"{}\"", name)).unwrap();
            assert_eq!(parsed, deserialized, "{name}");
        }
        assert!(serde_json::from_str::<LibraryType>("\"archive\"").is_err());
    }

    #[test]
    fn test_library_identity() {
        let comp = LinkedCompilation {
            name: "add".into(),
            dist_name: "math".into(),
            dist_version: "1.0.0".into(),
            out_dir: BuildPath::build("math"),
            sources: vec![BuildPath::src("src/add.c")],
            include_dirs: vec![BuildPath::src("include")],
            private_include_dirs: Vec::new(),
            link_to: Vec::new(),
            packages: Vec::new(),
            compile_commands: BuildPath::build("math/.add-compile_commands.json"),
            dev_only: false,
        };
        let a = Library::new(
            comp.clone(),
            ResolvedLibraryType::Static,
            BuildPath::build("math/libadd.a"),
            None,
        );
        let b = Library::new(
            comp,
            ResolvedLibraryType::Static,
            BuildPath::build("math/libadd.a"),
            None,
        );

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.link_artifact(), a.binary());
        assert_eq!(a.qualified_name(), "math/add");
    }
}

//! Toolchain abstraction for C/C++ compilers.
//!
//! A toolchain only generates commands and artifact names; running them is
//! left to build graph recipes. The toolchain is selected once per
//! distribution from the host platform:
//! - Windows: MSVC (`cl.exe`, `lib.exe`)
//! - everything else: a GCC-compatible driver, honouring `CC`, `CXX` and `AR`

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::source::{CStandard, CxxStandard, Language};

mod gcc;
mod msvc;

pub use gcc::GccToolchain;
pub use msvc::MsvcToolchain;

/// A command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to run (e.g., "cc", "cl.exe")
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Full argument vector, program first.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.program.display().to_string()];
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// Everything that goes into compiling one source file.
#[derive(Debug, Clone)]
pub struct CompileInput {
    /// Absolute path of the source
    pub source: PathBuf,
    pub language: Language,
    /// Request position independent code
    pub pic: bool,
    /// Absolute include directories, public then private
    pub include_dirs: Vec<PathBuf>,
    pub c_std: Option<CStandard>,
    pub cxx_std: Option<CxxStandard>,
    /// User flags for the source's language
    pub flags: Vec<String>,
    /// Flags reported by the package query service
    pub package_flags: Vec<String>,
}

/// Input for creating a static library.
#[derive(Debug, Clone)]
pub struct ArchiveInput {
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
}

/// Input for linking an executable or shared library.
#[derive(Debug, Clone)]
pub struct LinkInput {
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
    /// Libraries to link, dependents before their dependencies
    pub libraries: Vec<PathBuf>,
    /// Flags reported by the package query service
    pub package_flags: Vec<String>,
    /// Build a shared library instead of an executable
    pub shared: bool,
    /// Language of the link driver
    pub driver: Language,
}

/// How a toolchain reports the headers a source included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderDeps {
    /// Make-style depfile written next to the object
    Depfile,
    /// `Note: including file:` lines on stdout
    ShowIncludes,
}

/// The family of a toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainPlatform {
    Gcc,
    Msvc,
}

impl ToolchainPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainPlatform::Gcc => "gcc",
            ToolchainPlatform::Msvc => "msvc",
        }
    }
}

/// Operating system the build runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    Darwin,
    Windows,
    /// Other ELF-based systems
    Other,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            HostOs::Windows
        } else if cfg!(target_os = "macos") {
            HostOs::Darwin
        } else if cfg!(target_os = "linux") {
            HostOs::Linux
        } else {
            HostOs::Other
        }
    }

    /// Whether executables need an origin-relative runtime search path to
    /// find shared libraries next to them.
    pub fn needs_rpath(&self) -> bool {
        matches!(self, HostOs::Linux | HostOs::Other)
    }
}

/// Trait for toolchain implementations.
pub trait Toolchain: Send + Sync + fmt::Debug {
    fn platform(&self) -> ToolchainPlatform;

    /// Compile command recorded in the compile command database. It holds
    /// every flag but no output options.
    fn compile_command(&self, input: &CompileInput) -> CommandSpec;

    /// Arguments appended to a recorded compile command to produce
    /// `object`, with header discovery written to or next to `depfile`.
    fn object_args(&self, object: &Path, depfile: &Path) -> Vec<String>;

    fn header_deps(&self) -> HeaderDeps;

    /// Create a static library.
    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec;

    /// Link an executable or shared library.
    fn link_command(&self, input: &LinkInput) -> CommandSpec;

    fn object_extension(&self) -> &str;

    fn static_lib_name(&self, name: &str) -> String;

    fn shared_lib_name(&self, name: &str) -> String;

    /// Separate link-time stub of a shared library, if the platform has one.
    fn import_lib_name(&self, name: &str) -> Option<String>;

    fn exe_name(&self, name: &str) -> String;

    /// Whether package link flags should be queried for static linking.
    fn prefer_static_packages(&self) -> bool;

    /// `Cflags` entry of a development `.pc` file.
    fn pc_include_flag(&self, dir: &Path) -> String;

    /// `Libs` entries of a development `.pc` file.
    fn pc_libs(&self, out_dir: &Path, name: &str) -> Vec<String>;
}

/// Pick the toolchain for a host.
pub fn detect_toolchain(host: HostOs) -> Arc<dyn Toolchain> {
    let toolchain: Arc<dyn Toolchain> = match host {
        HostOs::Windows => Arc::new(MsvcToolchain::default()),
        _ => Arc::new(GccToolchain::from_env(host)),
    };
    tracing::debug!("using {} toolchain", toolchain.platform().as_str());
    toolchain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpath_hosts() {
        assert!(HostOs::Linux.needs_rpath());
        assert!(HostOs::Other.needs_rpath());
        assert!(!HostOs::Darwin.needs_rpath());
        assert!(!HostOs::Windows.needs_rpath());
    }

    #[test]
    fn test_detect_by_host() {
        assert_eq!(
            detect_toolchain(HostOs::Windows).platform(),
            ToolchainPlatform::Msvc
        );
        assert_eq!(
            detect_toolchain(HostOs::Linux).platform(),
            ToolchainPlatform::Gcc
        );
    }

    #[test]
    fn test_command_spec_argv() {
        let cmd = CommandSpec::new("cc").arg("-c").args(["a.c"]);
        assert_eq!(cmd.argv(), vec!["cc", "-c", "a.c"]);
    }
}

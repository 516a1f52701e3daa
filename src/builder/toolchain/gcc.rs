//! GCC/Clang toolchain implementation.

use std::path::{Path, PathBuf};

use crate::core::source::Language;

use super::{
    ArchiveInput, CommandSpec, CompileInput, HeaderDeps, HostOs, LinkInput, Toolchain,
    ToolchainPlatform,
};

/// GCC-compatible driver (Unix-like systems).
#[derive(Debug, Clone)]
pub struct GccToolchain {
    /// Path to the C compiler
    pub cc: PathBuf,
    /// Path to the C++ compiler
    pub cxx: PathBuf,
    /// Path to the archiver
    pub ar: PathBuf,
    pub host: HostOs,
}

impl GccToolchain {
    pub fn new(cc: PathBuf, cxx: PathBuf, ar: PathBuf, host: HostOs) -> Self {
        GccToolchain { cc, cxx, ar, host }
    }

    /// `cc`, `c++` and `ar`, unless overridden by `CC`, `CXX` and `AR`.
    pub fn from_env(host: HostOs) -> Self {
        let var = |key: &str, default: &str| {
            std::env::var_os(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(default))
        };

        GccToolchain::new(var("CC", "cc"), var("CXX", "c++"), var("AR", "ar"), host)
    }

    fn driver(&self, lang: Language) -> &Path {
        match lang {
            Language::C => &self.cc,
            Language::Cxx => &self.cxx,
        }
    }
}

impl Toolchain for GccToolchain {
    fn platform(&self) -> ToolchainPlatform {
        ToolchainPlatform::Gcc
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.driver(input.language)).arg("-c");

        if input.pic {
            cmd = cmd.arg("-fPIC");
        }

        match input.language {
            Language::C => {
                if let Some(std) = input.c_std {
                    cmd = cmd.arg(format!("-std=c{}", std));
                }
            }
            Language::Cxx => {
                if let Some(std) = input.cxx_std {
                    cmd = cmd.arg(format!("-std=c++{}", std));
                }
            }
        }

        for dir in &input.include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        cmd.args(input.flags.iter().cloned())
            .args(input.package_flags.iter().cloned())
            .arg(input.source.display().to_string())
    }

    fn object_args(&self, object: &Path, depfile: &Path) -> Vec<String> {
        vec![
            "-o".to_string(),
            object.display().to_string(),
            "-MD".to_string(),
            "-MF".to_string(),
            depfile.display().to_string(),
        ]
    }

    fn header_deps(&self) -> HeaderDeps {
        HeaderDeps::Depfile
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        CommandSpec::new(&self.ar)
            .arg("rcs")
            .arg(input.output.display().to_string())
            .args(input.objects.iter().map(|o| o.display().to_string()))
    }

    fn link_command(&self, input: &LinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.driver(input.driver));

        if input.shared {
            cmd = cmd.arg("-shared");
        }

        if self.host.needs_rpath() {
            cmd = cmd.arg("-Wl,-rpath=$ORIGIN");
        }

        cmd.arg("-o")
            .arg(input.output.display().to_string())
            .args(input.objects.iter().map(|o| o.display().to_string()))
            .args(input.libraries.iter().map(|l| l.display().to_string()))
            .args(input.package_flags.iter().cloned())
    }

    fn object_extension(&self) -> &str {
        "o"
    }

    fn static_lib_name(&self, name: &str) -> String {
        format!("lib{}.a", name)
    }

    fn shared_lib_name(&self, name: &str) -> String {
        match self.host {
            HostOs::Darwin => format!("lib{}.dylib", name),
            _ => format!("lib{}.so", name),
        }
    }

    fn import_lib_name(&self, _name: &str) -> Option<String> {
        None
    }

    fn exe_name(&self, name: &str) -> String {
        name.to_string()
    }

    fn prefer_static_packages(&self) -> bool {
        true
    }

    fn pc_include_flag(&self, dir: &Path) -> String {
        format!("-I{}", dir.display())
    }

    fn pc_libs(&self, out_dir: &Path, name: &str) -> Vec<String> {
        vec![format!("-L{}", out_dir.display()), format!("-l{}", name)]
    }
}

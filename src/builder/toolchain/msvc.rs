//! MSVC toolchain implementation.

use std::path::{Path, PathBuf};

use super::{
    ArchiveInput, CommandSpec, CompileInput, HeaderDeps, LinkInput, Toolchain, ToolchainPlatform,
};
use crate::core::source::Language;

/// MSVC toolchain (Windows).
#[derive(Debug, Clone)]
pub struct MsvcToolchain {
    /// Path to cl.exe (compiler and link driver)
    pub cl: PathBuf,
    /// Path to lib.exe (librarian)
    pub lib: PathBuf,
}

impl MsvcToolchain {
    pub fn new(cl: PathBuf, lib: PathBuf) -> Self {
        MsvcToolchain { cl, lib }
    }
}

impl Default for MsvcToolchain {
    fn default() -> Self {
        MsvcToolchain::new("cl.exe".into(), "lib.exe".into())
    }
}

impl Toolchain for MsvcToolchain {
    fn platform(&self) -> ToolchainPlatform {
        ToolchainPlatform::Msvc
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cl).arg("/nologo").arg("/c");

        match input.language {
            Language::C => {
                if let Some(std) = input.c_std {
                    cmd = cmd.arg(format!("/std:c{}", std));
                }
            }
            Language::Cxx => {
                if let Some(std) = input.cxx_std {
                    cmd = cmd.arg(format!("/std:c++{}", std));
                }
            }
        }

        for dir in &input.include_dirs {
            cmd = cmd.arg("/I").arg(dir.display().to_string());
        }

        cmd.args(input.flags.iter().cloned())
            .args(input.package_flags.iter().cloned())
            .arg(input.source.display().to_string())
    }

    fn object_args(&self, object: &Path, _depfile: &Path) -> Vec<String> {
        vec!["/showIncludes".to_string(), format!("/Fo{}", object.display())]
    }

    fn header_deps(&self) -> HeaderDeps {
        HeaderDeps::ShowIncludes
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        CommandSpec::new(&self.lib)
            .arg("/nologo")
            .arg(format!("/OUT:{}", input.output.display()))
            .args(input.objects.iter().map(|o| o.display().to_string()))
    }

    fn link_command(&self, input: &LinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cl).arg("/nologo");

        if input.shared {
            cmd = cmd.arg("/LD");
        }

        cmd.arg(format!("/Fe{}", input.output.display()))
            .args(input.objects.iter().map(|o| o.display().to_string()))
            .args(input.libraries.iter().map(|l| l.display().to_string()))
            .args(input.package_flags.iter().cloned())
    }

    fn object_extension(&self) -> &str {
        "obj"
    }

    fn static_lib_name(&self, name: &str) -> String {
        format!("{}.lib", name)
    }

    fn shared_lib_name(&self, name: &str) -> String {
        format!("{}.dll", name)
    }

    fn import_lib_name(&self, name: &str) -> Option<String> {
        Some(format!("{}.lib", name))
    }

    fn exe_name(&self, name: &str) -> String {
        format!("{}.exe", name)
    }

    fn prefer_static_packages(&self) -> bool {
        false
    }

    fn pc_include_flag(&self, dir: &Path) -> String {
        format!("/I{}", dir.display())
    }

    fn pc_libs(&self, out_dir: &Path, name: &str) -> Vec<String> {
        vec![out_dir.join(format!("{}.lib", name)).display().to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_command() {
        let cmd = MsvcToolchain::default().compile_command(&CompileInput {
            source: PathBuf::from("C:/p/src/a.c"),
            language: Language::C,
            pic: true,
            include_dirs: vec![PathBuf::from("C:/p/include")],
            c_std: Some(crate::core::source::CStandard::C17),
            cxx_std: None,
            flags: Vec::new(),
            package_flags: Vec::new(),
        });

        assert_eq!(
            cmd.argv(),
            vec!["cl.exe", "/nologo", "/c", "/std:c17", "/I", "C:/p/include", "C:/p/src/a.c"]
        );
    }

    #[test]
    fn test_object_args_show_includes() {
        let tc = MsvcToolchain::default();
        assert_eq!(tc.header_deps(), HeaderDeps::ShowIncludes);
        assert_eq!(
            tc.object_args(Path::new("C:/b/a.obj"), Path::new("unused")),
            vec!["/showIncludes", "/FoC:/b/a.obj"]
        );
    }

    #[test]
    fn test_dynamic_library_link() {
        let cmd = MsvcToolchain::default().link_command(&LinkInput {
            objects: vec![PathBuf::from("add.obj")],
            output: PathBuf::from("add.dll"),
            libraries: vec![PathBuf::from("base.lib")],
            package_flags: Vec::new(),
            shared: true,
            driver: Language::C,
        });
        assert_eq!(
            cmd.argv(),
            vec!["cl.exe", "/nologo", "/LD", "/Feadd.dll", "add.obj", "base.lib"]
        );
    }

    #[test]
    fn test_artifact_names() {
        let tc = MsvcToolchain::default();
        assert_eq!(tc.static_lib_name("add"), "add.lib");
        assert_eq!(tc.shared_lib_name("add"), "add.dll");
        assert_eq!(tc.import_lib_name("add").as_deref(), Some("add.lib"));
        assert_eq!(tc.exe_name("main"), "main.exe");
        assert!(!tc.prefer_static_packages());
    }
}

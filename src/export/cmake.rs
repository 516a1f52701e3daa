//! Generated CMake build description.

use crate::core::library::LinkedCompilation;
use crate::core::source::{CStandard, CxxStandard};
use crate::export::ExportError;
use crate::util::fs::to_slash;
use crate::util::quote::quote_cmake_arg;

/// One `find_package` line, merged over every reference to the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedPackage {
    pub name: String,
    /// First version constraint seen
    pub version: Option<String>,
    pub components: Vec<String>,
}

impl MergedPackage {
    fn find_package_line(&self) -> String {
        let mut line = vec![format!("find_package({}", self.name)];
        line.extend(self.version.clone());
        if !self.components.is_empty() {
            line.push("COMPONENTS".to_string());
            line.extend(self.components.iter().cloned());
        }
        line.push("REQUIRED)".to_string());
        line.join(" ")
    }
}

/// Merge the package references of every exported compilation by package
/// name.
///
/// A reference without an export descriptor cannot be written to the
/// manifest and fails the export. Conflicting versions keep the first one.
pub fn merge_packages(targets: &[&LinkedCompilation]) -> Result<Vec<MergedPackage>, ExportError> {
    let mut merged: Vec<MergedPackage> = Vec::new();

    for c in targets {
        for r in &c.packages {
            let Some(export) = &r.export else {
                return Err(ExportError::MissingExportDescriptor {
                    compilation: c.name.clone(),
                    local_key: r.local_key.clone().unwrap_or_else(|| "<none>".to_string()),
                });
            };

            let idx = match merged.iter().position(|p| p.name == export.package_name) {
                Some(idx) => idx,
                None => {
                    merged.push(MergedPackage {
                        name: export.package_name.clone(),
                        version: None,
                        components: Vec::new(),
                    });
                    merged.len() - 1
                }
            };
            let pkg = &mut merged[idx];

            match (&pkg.version, &export.version) {
                (Some(kept), Some(other)) if kept != other => {
                    tracing::warn!(
                        "package `{}` was given conflicting versions: `{}` vs `{}`, using `{}`",
                        pkg.name,
                        other,
                        kept,
                        kept
                    );
                }
                (None, Some(v)) => pkg.version = Some(v.clone()),
                _ => {}
            }

            if let Some(component) = &export.component {
                if !pkg.components.contains(component) {
                    pkg.components.push(component.clone());
                }
            }
        }
    }

    Ok(merged)
}

/// An exported executable or library as seen by the manifest.
#[derive(Debug, Clone, Copy)]
pub struct ManifestTarget<'a> {
    pub compilation: &'a LinkedCompilation,
    /// Whether `install` was requested for the target
    pub installed: bool,
    /// Whether any of its include directories exist
    pub has_includes: bool,
}

impl ManifestTarget<'_> {
    fn name(&self) -> &str {
        &self.compilation.name
    }

    fn sources(&self, lines: &mut Vec<String>) {
        for src in &self.compilation.sources {
            lines.push(format!("\t{}", quote_cmake_arg(&to_slash(src.rel()))));
        }
    }

    /// `target_link_libraries` lines for libraries of the same distribution
    /// and for external packages.
    fn link_lines(&self, lines: &mut Vec<String>) {
        let c = self.compilation;
        let mut linked: Vec<&str> = Vec::new();

        for lib in &c.link_to {
            if lib.dist_name() == c.dist_name && !linked.contains(&lib.name()) {
                linked.push(lib.name());
            }
        }
        for r in &c.packages {
            if let Some(export) = &r.export {
                if !linked.contains(&export.target_alias.as_str()) {
                    linked.push(&export.target_alias);
                }
            }
        }

        for target in linked {
            lines.push(format!(
                "target_link_libraries({} PRIVATE {})",
                self.name(),
                target
            ));
        }
    }
}

/// The generated `CMakeLists.txt` of a distribution.
#[derive(Debug, Clone)]
pub struct CMakeLists<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub c_std: Option<CStandard>,
    pub cxx_std: Option<CxxStandard>,
    pub packages: &'a [MergedPackage],
    pub executables: Vec<ManifestTarget<'a>>,
    pub libraries: Vec<ManifestTarget<'a>>,
}

impl CMakeLists<'_> {
    pub fn render(&self) -> String {
        let mut lines = vec![
            "# GENERATED BY slipway".to_string(),
            "cmake_minimum_required(VERSION 3.10)".to_string(),
            format!("project({} VERSION {})", self.name, self.version),
            "include(GNUInstallDirs)".to_string(),
            "include(CMakePackageConfigHelpers)".to_string(),
            String::new(),
        ];

        for pkg in self.packages {
            lines.push(pkg.find_package_line());
        }

        if let Some(std) = self.c_std {
            lines.push(format!("set(CMAKE_C_STANDARD {})", std));
            lines.push("set(CMAKE_C_STANDARD_REQUIRED TRUE)".to_string());
        }
        if let Some(std) = self.cxx_std {
            lines.push(format!("set(CMAKE_CXX_STANDARD {})", std));
            lines.push("set(CMAKE_CXX_STANDARD_REQUIRED TRUE)".to_string());
        }

        for exe in &self.executables {
            lines.push(format!("add_executable({}", exe.name()));
            exe.sources(&mut lines);
            lines.push(")".to_string());

            if exe.has_includes {
                lines.push(format!(
                    "target_include_directories({} PRIVATE include)",
                    exe.name()
                ));
            }
            exe.link_lines(&mut lines);

            if exe.installed {
                lines.push(format!("install(TARGETS {})", exe.name()));
            }
        }

        lines.push(String::new());

        if self.libraries.iter().any(|l| l.installed) {
            lines.push(String::new());
            lines.push("install(DIRECTORY include/ TYPE INCLUDE)".to_string());
        }

        for lib in &self.libraries {
            render_library(lib, &mut lines);
        }

        lines.push(String::new());
        lines.join("\n")
    }
}

fn render_library(lib: &ManifestTarget<'_>, lines: &mut Vec<String>) {
    let name = lib.name();

    lines.push(format!("add_library({}", name));
    lib.sources(lines);
    lines.push(")".to_string());

    if lib.has_includes {
        lines.push(String::new());
        lines.push(format!("target_include_directories({} PUBLIC", name));
        lines.push("$<BUILD_INTERFACE:${CMAKE_CURRENT_SOURCE_DIR}/include>".to_string());
        lines.push("$<INSTALL_INTERFACE:include>".to_string());
        lines.push(")".to_string());
    }
    lib.link_lines(lines);

    if !lib.installed {
        return;
    }

    let targets = format!("{}-targets", name);
    let dir_var = config_dir_var(name);
    lines.extend([
        String::new(),
        "if (MSVC)".to_string(),
        format!("\tinstall(FILES \"pkgconfig/msvc/{}.pc\"", name),
        "\t\tDESTINATION \"${CMAKE_INSTALL_LIBDIR}/pkgconfig\"".to_string(),
        "\t)".to_string(),
        "else()".to_string(),
        format!("\tinstall(FILES pkgconfig/{}.pc", name),
        "\t\tDESTINATION \"${CMAKE_INSTALL_LIBDIR}/pkgconfig\"".to_string(),
        "\t)".to_string(),
        "endif()".to_string(),
        format!("set({} \"${{CMAKE_INSTALL_LIBDIR}}/cmake/{}\")", dir_var, name),
        format!("install(TARGETS {} EXPORT {})", name, targets),
        format!("install(EXPORT {} DESTINATION \"${{{}}}\")", targets, dir_var),
        format!("configure_package_config_file(\"cmake/{}-config.cmake.in\"", name),
        format!("\"${{CMAKE_CURRENT_BINARY_DIR}}/{}-config.cmake\"", name),
        format!("INSTALL_DESTINATION \"${{{}}}\"", dir_var),
        format!("PATH_VARS {}", dir_var),
        ")".to_string(),
        String::new(),
        "write_basic_package_version_file(".to_string(),
        format!("\"${{CMAKE_CURRENT_BINARY_DIR}}/{}-config-version.cmake\"", name),
        "COMPATIBILITY SameMajorVersion".to_string(),
        ")".to_string(),
        String::new(),
        "install(FILES".to_string(),
        format!("\"${{CMAKE_CURRENT_BINARY_DIR}}/{}-config.cmake\"", name),
        format!("\"${{CMAKE_CURRENT_BINARY_DIR}}/{}-config-version.cmake\"", name),
        format!("DESTINATION \"${{{}}}\"", dir_var),
        ")".to_string(),
    ]);
}

fn config_dir_var(name: &str) -> String {
    format!("{}_CONFIG_INSTALL_DIR", name.to_uppercase())
}

/// `cmake/<lib>-config.cmake.in`, finding the library's dependencies
/// before importing its targets.
pub fn render_package_config(lib: &LinkedCompilation) -> String {
    let dir_var = config_dir_var(&lib.name);
    let mut lines = vec![
        "# Generated by slipway".to_string(),
        "@PACKAGE_INIT@".to_string(),
        format!("include(\"@PACKAGE_{}@/{}-targets.cmake\")", dir_var, lib.name),
        "include(CMakeFindDependencyMacro)".to_string(),
    ];

    let mut found: Vec<&str> = Vec::new();
    for r in &lib.packages {
        if let Some(export) = &r.export {
            if !found.contains(&export.package_name.as_str()) {
                found.push(&export.package_name);
                lines.push(format!("find_dependency({})", export.package_name));
            }
        }
    }

    lines.push(format!("check_required_components({})", lib.name));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package::{ExportDescriptor, PackageReference};
    use crate::graph::BuildPath;

    fn compilation(name: &str, sources: &[&str]) -> LinkedCompilation {
        LinkedCompilation {
            name: name.into(),
            dist_name: "math".into(),
            dist_version: "1.0.0".into(),
            out_dir: BuildPath::build("math"),
            sources: sources.iter().map(BuildPath::src).collect(),
            include_dirs: vec![BuildPath::src("include")],
            private_include_dirs: Vec::new(),
            link_to: Vec::new(),
            packages: Vec::new(),
            compile_commands: BuildPath::build(format!("math/.{}-compile_commands.json", name)),
            dev_only: false,
        }
    }

    fn package(name: &str, version: Option<&str>, component: Option<&str>) -> PackageReference {
        PackageReference {
            local_key: Some(name.to_lowercase()),
            export: Some(ExportDescriptor {
                package_name: name.into(),
                component: component.map(String::from),
                version: version.map(String::from),
                target_alias: format!("{}::{}", name, component.unwrap_or(name)),
            }),
            cross_distribution: false,
        }
    }

    #[test]
    fn test_merge_packages_by_name() {
        let mut a = compilation("a", &["a.c"]);
        a.packages.push(package("Boost", Some("1.80"), Some("json")));
        let mut b = compilation("b", &["b.c"]);
        b.packages.push(package("Boost", Some("1.70"), Some("url")));
        b.packages.push(package("Boost", None, Some("json")));
        b.packages.push(package("ZLIB", None, None));

        let merged = merge_packages(&[&a, &b]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].version.as_deref(), Some("1.80"));
        assert_eq!(merged[0].components, vec!["json", "url"]);
        assert_eq!(
            merged[0].find_package_line(),
            "find_package(Boost 1.80 COMPONENTS json url REQUIRED)"
        );
        assert_eq!(merged[1].find_package_line(), "find_package(ZLIB REQUIRED)");
    }

    #[test]
    fn test_missing_export_descriptor_names_compilation() {
        let mut main = compilation("main", &["main.c"]);
        main.packages.push(PackageReference {
            local_key: Some("uuid".into()),
            export: None,
            cross_distribution: false,
        });

        let err = merge_packages(&[&main]).unwrap_err();
        match err {
            ExportError::MissingExportDescriptor {
                compilation,
                local_key,
            } => {
                assert_eq!(compilation, "main");
                assert_eq!(local_key, "uuid");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_render_executable_and_library() {
        let add = compilation("add", &["src/add.c"]);
        let mut main = compilation("main", &["src/main.c", "src/my file.c"]);
        main.packages.push(package("ZLIB", None, None));
        let packages = merge_packages(&[&main, &add]).unwrap();

        let lists = CMakeLists {
            name: "math",
            version: "1.0.0",
            c_std: Some(CStandard::C11),
            cxx_std: None,
            packages: &packages,
            executables: vec![ManifestTarget {
                compilation: &main,
                installed: true,
                has_includes: true,
            }],
            libraries: vec![ManifestTarget {
                compilation: &add,
                installed: false,
                has_includes: true,
            }],
        };

        let expected = "\
# GENERATED BY slipway
cmake_minimum_required(VERSION 3.10)
project(math VERSION 1.0.0)
include(GNUInstallDirs)
include(CMakePackageConfigHelpers)

find_package(ZLIB REQUIRED)
set(CMAKE_C_STANDARD 11)
set(CMAKE_C_STANDARD_REQUIRED TRUE)
add_executable(main
\tsrc/main.c
\t\"src/my file.c\"
)
target_include_directories(main PRIVATE include)
target_link_libraries(main PRIVATE ZLIB::ZLIB)
install(TARGETS main)

add_library(add
\tsrc/add.c
)

target_include_directories(add PUBLIC
$<BUILD_INTERFACE:${CMAKE_CURRENT_SOURCE_DIR}/include>
$<INSTALL_INTERFACE:include>
)
";
        assert_eq!(lists.render(), expected);
    }

    #[test]
    fn test_installed_library_rules() {
        let add = compilation("add", &["src/add.c"]);
        let lists = CMakeLists {
            name: "math",
            version: "1.0.0",
            c_std: None,
            cxx_std: None,
            packages: &[],
            executables: Vec::new(),
            libraries: vec![ManifestTarget {
                compilation: &add,
                installed: true,
                has_includes: false,
            }],
        };

        let text = lists.render();
        assert!(text.contains("\ninstall(DIRECTORY include/ TYPE INCLUDE)\n"));
        assert!(text.contains("\tinstall(FILES \"pkgconfig/msvc/add.pc\"\n"));
        assert!(text.contains(
            "set(ADD_CONFIG_INSTALL_DIR \"${CMAKE_INSTALL_LIBDIR}/cmake/add\")\n\
             install(TARGETS add EXPORT add-targets)\n\
             install(EXPORT add-targets DESTINATION \"${ADD_CONFIG_INSTALL_DIR}\")\n"
        ));
        assert!(text.contains("COMPATIBILITY SameMajorVersion"));
        assert!(!text.contains("target_include_directories"));
    }

    #[test]
    fn test_package_config() {
        let mut add = compilation("add", &["src/add.c"]);
        add.packages.push(package("ZLIB", None, None));
        add.packages.push(package("ZLIB", Some("1.2"), None));

        assert_eq!(
            render_package_config(&add),
            "# Generated by slipway\n\
             @PACKAGE_INIT@\n\
             include(\"@PACKAGE_ADD_CONFIG_INSTALL_DIR@/add-targets.cmake\")\n\
             include(CMakeFindDependencyMacro)\n\
             find_dependency(ZLIB)\n\
             check_required_components(add)"
        );
    }
}

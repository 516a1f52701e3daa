//! `Slipway.toml` build description.
//!
//! The CLI reads distributions and their targets from a TOML file:
//!
//! ```toml
//! [[distribution]]
//! name = "math"
//! version = "1.0.0"
//! c_std = 11
//!
//! [distribution.packages]
//! uuid = "uuid"
//!
//! [[distribution.library]]
//! name = "add"
//! sources = ["src/add/*.c"]
//! packages = ["uuid"]
//! install = true
//!
//! [[distribution.executable]]
//! name = "calc"
//! sources = ["src/calc.c"]
//! link_to = ["add"]
//! ```
//!
//! Libraries are referenced by name, or as `dist/name` across
//! distributions; packages by their key in `[distribution.packages]`.
//! Libraries may appear in any order and are declared dependencies first.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Deserialize;

use crate::core::distribution::{Distribution, DistributionOptions};
use crate::core::errors::DeclarationError;
use crate::core::library::{Library, LibraryType, TargetOptions};
use crate::core::package::{FindPackage, PackageHandle};
use crate::core::source::{CStandard, CxxStandard};
use crate::graph::BuildGraph;
use crate::util::fs::{glob_files, relative_path};
use crate::util::Config;

/// Default name of the build description, relative to the source root.
pub const BUILD_FILE_NAME: &str = "Slipway.toml";

/// A parsed `Slipway.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildFile {
    #[serde(default, rename = "distribution")]
    pub distributions: Vec<DistributionDecl>,

    /// Where the file was read from
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistributionDecl {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub c_std: Option<CStandard>,
    #[serde(default)]
    pub cxx_std: Option<CxxStandard>,
    #[serde(default)]
    pub cflags: Vec<String>,
    #[serde(default)]
    pub cxxflags: Vec<String>,
    #[serde(default)]
    pub license: Option<PathBuf>,
    /// `find_package` requests by key
    #[serde(default)]
    pub packages: BTreeMap<String, FindPackage>,
    #[serde(default, rename = "library")]
    pub libraries: Vec<TargetDecl>,
    #[serde(default, rename = "executable")]
    pub executables: Vec<TargetDecl>,
    #[serde(default, rename = "test")]
    pub tests: Vec<TargetDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDecl {
    pub name: String,
    /// Paths or glob patterns relative to the source root
    pub sources: Vec<String>,
    #[serde(default)]
    pub include_dirs: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub private_include_dirs: Option<Vec<PathBuf>>,
    /// Libraries, as `name` or `dist/name`
    #[serde(default)]
    pub link_to: Vec<String>,
    /// Keys of `[distribution.packages]`
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default, rename = "type")]
    pub lib_type: Option<LibraryType>,
    #[serde(default)]
    pub install: bool,
}

impl BuildFile {
    /// Load a build file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read build file: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse build file content read from `path`.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut file: BuildFile = toml::from_str(content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        file.path = path.to_path_buf();

        for dist in &file.distributions {
            for exe in dist.executables.iter().chain(&dist.tests) {
                if exe.lib_type.is_some() {
                    bail!(
                        "`type` only applies to libraries (set on `{}/{}`)",
                        dist.name,
                        exe.name
                    );
                }
            }
            if let Some(test) = dist.tests.iter().find(|t| t.install) {
                bail!("test `{}/{}` cannot be installed", dist.name, test.name);
            }
        }

        Ok(file)
    }

    /// Declare every distribution on `graph` with the host toolchain.
    pub fn declare(&self, graph: &Arc<BuildGraph>, config: &Config) -> Result<Vec<Distribution>> {
        self.declare_with(graph, config, Distribution::new)
    }

    /// Declare every distribution, creating each with `create`.
    pub fn declare_with<F>(
        &self,
        graph: &Arc<BuildGraph>,
        config: &Config,
        mut create: F,
    ) -> Result<Vec<Distribution>>
    where
        F: FnMut(&Arc<BuildGraph>, &DistributionOptions) -> Result<Distribution, DeclarationError>,
    {
        let order = self.library_order()?;

        let mut dists = Vec::with_capacity(self.distributions.len());
        let mut handles: Vec<BTreeMap<String, PackageHandle>> = Vec::new();
        for decl in &self.distributions {
            let opts = self.options(decl, graph.src_root(), config);
            let mut dist = create(graph, &opts)
                .with_context(|| format!("failed to declare distribution `{}`", decl.name))?;

            let found = decl
                .packages
                .iter()
                .map(|(key, spec)| (key.clone(), dist.find_package(spec.clone())))
                .collect();
            handles.push(found);
            dists.push(dist);
        }

        let mut libraries: HashMap<String, Library> = HashMap::new();
        for (d, l) in order {
            let decl = &self.distributions[d];
            let target = &decl.libraries[l];
            let opts = target_options(graph.src_root(), decl, target, &handles[d], &libraries)?;
            let lib_type = target.lib_type.unwrap_or_default();

            let lib = dists[d]
                .add_library(opts.with_type(lib_type))
                .with_context(|| format!("failed to declare library `{}/{}`", decl.name, target.name))?;
            if target.install {
                dists[d].install(&lib);
            }
            libraries.insert(format!("{}/{}", decl.name, target.name), lib);
        }

        for (d, decl) in self.distributions.iter().enumerate() {
            for target in &decl.executables {
                let opts = target_options(graph.src_root(), decl, target, &handles[d], &libraries)?;
                let exe = dists[d].add_executable(opts).with_context(|| {
                    format!("failed to declare executable `{}/{}`", decl.name, target.name)
                })?;
                if target.install {
                    dists[d].install(&exe);
                }
            }
            for target in &decl.tests {
                let opts = target_options(graph.src_root(), decl, target, &handles[d], &libraries)?;
                dists[d].add_test(opts).with_context(|| {
                    format!("failed to declare test `{}/{}`", decl.name, target.name)
                })?;
            }
        }

        Ok(dists)
    }

    fn options(&self, decl: &DistributionDecl, src_root: &Path, config: &Config) -> DistributionOptions {
        DistributionOptions {
            name: decl.name.clone(),
            version: decl.version.clone(),
            c_std: decl.c_std,
            cxx_std: decl.cxx_std,
            cflags: decl.cflags.clone(),
            cxxflags: decl.cxxflags.clone(),
            config: config.clone(),
            license: decl.license.clone(),
            declared_in: Some(relative_path(src_root, &self.path)),
        }
    }

    /// Libraries as `(distribution, library)` indices, dependencies first.
    fn library_order(&self) -> Result<Vec<(usize, usize)>> {
        let mut graph: DiGraph<(usize, usize), ()> = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
        let mut names: HashMap<NodeIndex, String> = HashMap::new();

        for (d, decl) in self.distributions.iter().enumerate() {
            for (l, lib) in decl.libraries.iter().enumerate() {
                let key = format!("{}/{}", decl.name, lib.name);
                let node = graph.add_node((d, l));
                if nodes.insert(key.clone(), node).is_some() {
                    bail!("library `{}` is declared twice", key);
                }
                names.insert(node, key);
            }
        }

        for decl in &self.distributions {
            for lib in &decl.libraries {
                let to = nodes[&format!("{}/{}", decl.name, lib.name)];
                for reference in &lib.link_to {
                    let key = qualify(&decl.name, reference);
                    let Some(&from) = nodes.get(&key) else {
                        bail!(
                            "unknown library `{}` linked by `{}/{}`",
                            reference,
                            decl.name,
                            lib.name
                        );
                    };
                    graph.add_edge(from, to, ());
                }
            }
        }

        let sorted = toposort(&graph, None).map_err(|cycle| {
            anyhow!(
                "cyclic library dependency involving `{}`",
                names[&cycle.node_id()]
            )
        })?;
        Ok(sorted.into_iter().map(|n| graph[n]).collect())
    }
}

/// `name` refers to the declaring distribution, `dist/name` to any.
fn qualify(dist: &str, reference: &str) -> String {
    if reference.contains('/') {
        reference.to_string()
    } else {
        format!("{}/{}", dist, reference)
    }
}

fn target_options(
    src_root: &Path,
    decl: &DistributionDecl,
    target: &TargetDecl,
    handles: &BTreeMap<String, PackageHandle>,
    libraries: &HashMap<String, Library>,
) -> Result<TargetOptions> {
    let sources = glob_files(src_root, &target.sources)?;
    if sources.is_empty() {
        tracing::warn!("`{}/{}` has no sources", decl.name, target.name);
    }

    let mut opts = TargetOptions::new(&target.name).sources(sources);
    opts.include_dirs = target.include_dirs.clone();
    opts.private_include_dirs = target.private_include_dirs.clone();

    for reference in &target.link_to {
        let Some(lib) = libraries.get(&qualify(&decl.name, reference)) else {
            bail!(
                "unknown library `{}` linked by `{}/{}`",
                reference,
                decl.name,
                target.name
            );
        };
        opts = opts.link_to(lib);
    }
    for key in &target.packages {
        let Some(handle) = handles.get(key) else {
            bail!(
                "unknown package `{}` used by `{}/{}`",
                key,
                decl.name,
                target.name
            );
        };
        opts = opts.link_to(handle.clone());
    }

    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::pkgconfig::PackageQuery;
    use crate::builder::toolchain::{GccToolchain, HostOs};
    use crate::core::library::ResolvedLibraryType;
    use crate::graph::BuildPath;

    struct NoPackages;

    impl PackageQuery for NoPackages {
        fn cflags(&self, _names: &[String]) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn libs(&self, _names: &[String], _prefer_static: bool) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn parse(content: &str) -> Result<BuildFile> {
        BuildFile::parse(content, Path::new("/src/Slipway.toml"))
    }

    fn declare(file: &BuildFile) -> Result<Vec<Distribution>> {
        let graph = BuildGraph::new("/src", "/build");
        file.declare_with(&graph, &Config::default(), |g, opts| {
            Distribution::with_toolchain(
                g,
                opts,
                Arc::new(GccToolchain::new(
                    "cc".into(),
                    "c++".into(),
                    "ar".into(),
                    HostOs::Linux,
                )),
                Arc::new(NoPackages),
            )
        })
    }

    const MATH: &str = r#"
[[distribution]]
name = "math"
version = "1.0.0"
c_std = 11

[distribution.packages]
uuid = "uuid"
zlib = { local = "zlib >= 1.2", export = { package_name = "ZLIB", target_alias = "ZLIB::ZLIB" } }

[[distribution.library]]
name = "mul"
sources = ["src/mul.c"]
link_to = ["add"]
type = "dynamic"
install = true

[[distribution.library]]
name = "add"
sources = ["src/add.c"]
packages = ["uuid", "zlib"]

[[distribution.executable]]
name = "calc"
sources = ["src/calc.c"]
link_to = ["mul"]

[[distribution.test]]
name = "check"
sources = ["test/check.c"]
link_to = ["add"]
"#;

    #[test]
    fn test_parse() {
        let file = parse(MATH).unwrap();
        assert_eq!(file.distributions.len(), 1);

        let dist = &file.distributions[0];
        assert_eq!(dist.c_std, Some(CStandard::C11));
        assert_eq!(dist.libraries.len(), 2);
        assert_eq!(dist.libraries[0].lib_type, Some(LibraryType::Dynamic));
        assert_eq!(dist.packages["uuid"], FindPackage::Name("uuid".into()));
        assert!(matches!(dist.packages["zlib"], FindPackage::Split { .. }));
    }

    #[test]
    fn test_declares_dependencies_first() {
        let file = parse(MATH).unwrap();
        let dists = declare(&file).unwrap();
        let math = &dists[0];

        let libs = math.libraries();
        let names: Vec<&str> = libs.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["add", "mul"]);
        assert_eq!(libs[1].linked_libraries(), &[libs[0].clone()]);
        assert_eq!(libs[1].lib_type(), ResolvedLibraryType::Dynamic);
        assert_eq!(libs[0].compilation().packages.len(), 2);

        let prereqs = math.graph().prereqs_of(math.test()).unwrap();
        assert_eq!(prereqs, vec![BuildPath::build("math/check.run")]);
    }

    #[test]
    fn test_cross_distribution_reference() {
        let file = parse(
            r#"
[[distribution]]
name = "b"
version = "2.0"
[[distribution.library]]
name = "two"
sources = ["two.c"]
link_to = ["a/one"]

[[distribution]]
name = "a"
version = "1.0"
[[distribution.library]]
name = "one"
sources = ["one.c"]
"#,
        )
        .unwrap();
        let dists = declare(&file).unwrap();
        let two = &dists[0].libraries()[0];
        assert_eq!(two.linked_libraries()[0].qualified_name(), "a/one");
        assert!(two.compilation().packages[0].cross_distribution);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let file = parse(
            r#"
[[distribution]]
name = "math"
version = "1.0.0"
[[distribution.library]]
name = "a"
sources = ["a.c"]
link_to = ["b"]
[[distribution.library]]
name = "b"
sources = ["b.c"]
link_to = ["a"]
"#,
        )
        .unwrap();
        let err = declare(&file).unwrap_err();
        assert!(err.to_string().contains("cyclic library dependency"));
    }

    #[test]
    fn test_unknown_references() {
        let file = parse(
            r#"
[[distribution]]
name = "math"
version = "1.0.0"
[[distribution.executable]]
name = "calc"
sources = ["calc.c"]
packages = ["nope"]
"#,
        )
        .unwrap();
        let err = declare(&file).unwrap_err();
        assert_eq!(err.to_string(), "unknown package `nope` used by `math/calc`");

        let file = parse(
            r#"
[[distribution]]
name = "math"
version = "1.0.0"
[[distribution.library]]
name = "a"
sources = ["a.c"]
link_to = ["missing"]
"#,
        )
        .unwrap();
        let err = declare(&file).unwrap_err();
        assert_eq!(err.to_string(), "unknown library `missing` linked by `math/a`");
    }

    #[test]
    fn test_invalid_files() {
        let err = parse(
            r#"
[[distribution]]
name = "math"
version = "1.0.0"
[[distribution.executable]]
name = "calc"
sources = ["calc.c"]
type = "static"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("only applies to libraries"));

        let err = parse("[[distribution]]\nname = \"x\"\nversion = \"1\"\nbogus = 1\n").unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_glob_sources() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/b.c"), "").unwrap();
        std::fs::write(tmp.path().join("src/a.c"), "").unwrap();
        std::fs::write(tmp.path().join("src/a.h"), "").unwrap();

        let decl = DistributionDecl {
            name: "math".into(),
            version: "1.0".into(),
            c_std: None,
            cxx_std: None,
            cflags: Vec::new(),
            cxxflags: Vec::new(),
            license: None,
            packages: BTreeMap::new(),
            libraries: Vec::new(),
            executables: Vec::new(),
            tests: Vec::new(),
        };
        let target = TargetDecl {
            name: "calc".into(),
            sources: vec!["src/*.c".into(), "gen/extra.c".into()],
            include_dirs: None,
            private_include_dirs: None,
            link_to: Vec::new(),
            packages: Vec::new(),
            lib_type: None,
            install: false,
        };

        let opts =
            target_options(tmp.path(), &decl, &target, &BTreeMap::new(), &HashMap::new()).unwrap();
        assert_eq!(
            opts.sources,
            vec![
                BuildPath::src("src/a.c"),
                BuildPath::src("src/b.c"),
                BuildPath::src("gen/extra.c"),
            ]
        );
    }
}

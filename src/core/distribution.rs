//! The distribution façade.
//!
//! A `Distribution` is one packaged set of executables and libraries. Every
//! declaration registers its build graph rules immediately; the export rule
//! (`<name>-<version>.tgz`) reads the declarations when it runs.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::builder::native::{CompileSettings, NativeCompiler};
use crate::builder::pkgconfig::{PackageQuery, PkgConfig};
use crate::builder::toolchain::{detect_toolchain, HostOs, Toolchain};
use crate::core::dependency::check_acyclic;
use crate::core::errors::DeclarationError;
use crate::core::library::{
    Executable, InstallTarget, Library, LibraryOptions, LinkedCompilation, ResolvedLibraryType,
    TargetOptions, Test,
};
use crate::core::package::{FindPackage, LinkTarget, PackageHandle, PackageReference};
use crate::core::source::{CStandard, CxxStandard};
use crate::export::{self, ExportContext};
use crate::graph::{BuildGraph, BuildPath};
use crate::util::lock;
use crate::util::Config;

/// Identifies the distribution a package handle came from.
static NEXT_OWNER: AtomicUsize = AtomicUsize::new(0);

/// Options for `Distribution::new`.
#[derive(Debug, Clone, Default)]
pub struct DistributionOptions {
    pub name: String,
    pub version: String,
    pub c_std: Option<CStandard>,
    pub cxx_std: Option<CxxStandard>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    /// Contents of the optional configuration file
    pub config: Config,
    /// License file copied into the export, relative to the source root
    pub license: Option<PathBuf>,
    /// File the declarations were read from, relative to the source root
    pub declared_in: Option<PathBuf>,
}

impl DistributionOptions {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        DistributionOptions {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }
}

/// Everything declared so far, shared with the export rule.
#[derive(Debug, Clone, Default)]
pub(crate) struct Declarations {
    /// Files copied into the export, by source path and destination
    pub files: Vec<(BuildPath, PathBuf)>,
    pub executables: Vec<LinkedCompilation>,
    pub libraries: Vec<Library>,
    /// Names of installed targets
    pub installed: Vec<String>,
}

/// A packaged distribution of C/C++ libraries and executables.
pub struct Distribution {
    graph: Arc<BuildGraph>,
    name: String,
    version: String,
    out_dir: BuildPath,
    dist: BuildPath,
    dist_alias: BuildPath,
    test: BuildPath,
    default_library_type: ResolvedLibraryType,
    owner: usize,
    packages: Vec<PackageReference>,
    compiler: NativeCompiler,
    decls: Arc<Mutex<Declarations>>,
}

impl fmt::Debug for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Distribution")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("default_library_type", &self.default_library_type)
            .finish_non_exhaustive()
    }
}

impl Distribution {
    /// Create a distribution using the host toolchain and `pkg-config`.
    pub fn new(
        graph: &Arc<BuildGraph>,
        opts: &DistributionOptions,
    ) -> Result<Self, DeclarationError> {
        let packages = Arc::new(PkgConfig::new(Self::search_paths(graph, &opts.config)));
        Self::with_toolchain(graph, opts, detect_toolchain(HostOs::current()), packages)
    }

    /// Create a distribution with an explicit toolchain and package query
    /// service.
    pub fn with_toolchain(
        graph: &Arc<BuildGraph>,
        opts: &DistributionOptions,
        toolchain: Arc<dyn Toolchain>,
        packages: Arc<dyn PackageQuery>,
    ) -> Result<Self, DeclarationError> {
        let name = opts.name.clone();
        let version = opts.version.clone();

        let default_library_type = if opts.config.build_shared_libs {
            ResolvedLibraryType::Dynamic
        } else {
            ResolvedLibraryType::Static
        };

        let settings = CompileSettings {
            c_std: opts.c_std,
            cxx_std: opts.cxx_std,
            cflags: opts.cflags.clone(),
            cxxflags: opts.cxxflags.clone(),
        };
        let compiler = NativeCompiler::new(toolchain, packages, settings)
            .with_declaration_inputs(opts.declared_in.iter().map(BuildPath::src).collect());

        let dist = Distribution {
            graph: graph.clone(),
            out_dir: BuildPath::build(&name),
            dist: BuildPath::build(format!("{}-{}.tgz", name, version)),
            dist_alias: BuildPath::build(format!("dist-{}", name)),
            test: BuildPath::build(format!("test-{}", name)),
            default_library_type,
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            packages: Vec::new(),
            compiler,
            decls: Arc::new(Mutex::new(Declarations::default())),
            name,
            version,
        };

        export::register(
            graph,
            ExportContext {
                name: dist.name.clone(),
                version: dist.version.clone(),
                c_std: opts.c_std,
                cxx_std: opts.cxx_std,
                archive: dist.dist.clone(),
            },
            dist.decls.clone(),
        )?;
        graph.add_prereqs(dist.dist_alias.clone(), [dist.dist.clone()])?;
        graph.add_prereqs(dist.test.clone(), Vec::new())?;

        if let Some(license) = &opts.license {
            dist.add_file(BuildPath::src(license), license.clone())?;
        }

        tracing::debug!(
            "declared distribution {} {} ({} libraries by default)",
            dist.name,
            dist.version,
            dist.default_library_type
        );
        Ok(dist)
    }

    /// Directories searched for `.pc` files: the build tree's own
    /// `pkgconfig`, then `vendor/lib/pkgconfig`, then configured extras.
    pub fn search_paths(graph: &BuildGraph, config: &Config) -> Vec<PathBuf> {
        let mut paths = vec![
            graph.build_root().join("pkgconfig"),
            graph.src_root().join("vendor/lib/pkgconfig"),
        ];
        paths.extend(config.add_pkg_config_search_paths.iter().cloned());
        paths
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn graph(&self) -> &Arc<BuildGraph> {
        &self.graph
    }

    /// Directory receiving binaries, `<buildRoot>/<name>`.
    pub fn out_dir(&self) -> &BuildPath {
        &self.out_dir
    }

    /// The exported archive, `<name>-<version>.tgz`.
    pub fn dist(&self) -> &BuildPath {
        &self.dist
    }

    /// `dist-<name>`, an alias for `dist`.
    pub fn dist_alias(&self) -> &BuildPath {
        &self.dist_alias
    }

    /// `test-<name>`, running every test of the distribution.
    pub fn test(&self) -> &BuildPath {
        &self.test
    }

    pub fn default_library_type(&self) -> ResolvedLibraryType {
        self.default_library_type
    }

    pub fn toolchain(&self) -> &Arc<dyn Toolchain> {
        self.compiler.toolchain()
    }

    /// Libraries declared so far.
    pub fn libraries(&self) -> Vec<Library> {
        lock(&self.decls).libraries.clone()
    }

    /// Declare an external package that targets can link to.
    pub fn find_package(&mut self, spec: impl Into<FindPackage>) -> PackageHandle {
        let spec = spec.into();
        let debug_name = spec.debug_name();
        let id = self.packages.len();
        self.packages.push(spec.into_reference());

        tracing::debug!("{}: find_package({}) -> #{}", self.name, debug_name, id);
        PackageHandle::new(id, self.owner, debug_name)
    }

    /// Declare an executable, exported with the distribution.
    pub fn add_executable(&mut self, opts: TargetOptions) -> Result<Executable, DeclarationError> {
        self.add_executable_inner(opts, false)
    }

    /// Declare a test: a development-only executable plus a rule running it.
    pub fn add_test(&mut self, opts: TargetOptions) -> Result<Test, DeclarationError> {
        let exe = self.add_executable_inner(opts, true)?;

        let run = exe.binary.gen("run");
        let binary = exe.binary.clone();
        self.graph.add_rule([run.clone()], [binary.clone()], move |args| {
            let program = args.abs(&binary);
            args.spawn(program, Vec::<String>::new())?;
            Ok(())
        })?;
        self.graph.add_prereqs(self.test.clone(), [run.clone()])?;

        Ok(Test {
            run,
            binary: exe.binary,
        })
    }

    /// Declare a library.
    pub fn add_library(
        &mut self,
        opts: impl Into<LibraryOptions>,
    ) -> Result<Library, DeclarationError> {
        let opts = opts.into();
        let lib_type = opts.lib_type.resolve(self.default_library_type);
        let c = self.create_compilation(opts.target, false)?;

        let lib = self.compiler.add_library(&self.graph, c, lib_type)?;
        self.add_sources(lib.compilation())?;
        self.graph.add_prereqs(self.dist.clone(), [lib.binary().clone()])?;
        lock(&self.decls).libraries.push(lib.clone());

        tracing::debug!("{}: add_library({})", self.name, lib.name());
        Ok(lib)
    }

    /// Install a target with the exported package.
    pub fn install(&mut self, target: &impl InstallTarget) {
        let name = target.target_name().to_string();
        let mut decls = lock(&self.decls);
        if !decls.installed.contains(&name) {
            decls.installed.push(name);
        }
    }

    /// Compile command databases of every declared compilation, executables
    /// first.
    pub fn compile_commands_components(&self) -> Vec<BuildPath> {
        let decls = lock(&self.decls);
        let exes = decls.executables.iter().map(|c| c.compile_commands.clone());
        let libs = decls
            .libraries
            .iter()
            .map(|l| l.compilation().compile_commands.clone());
        exes.chain(libs).collect()
    }

    fn add_executable_inner(
        &mut self,
        opts: TargetOptions,
        dev_only: bool,
    ) -> Result<Executable, DeclarationError> {
        let c = self.create_compilation(opts, dev_only)?;
        let exe = self.compiler.add_executable(&self.graph, c.clone())?;

        if !dev_only {
            self.add_sources(&c)?;
            self.graph.add_prereqs(self.dist.clone(), [exe.binary.clone()])?;
        }
        lock(&self.decls).executables.push(c);

        tracing::debug!("{}: add_executable({})", self.name, exe.name);
        Ok(exe)
    }

    fn create_compilation(
        &self,
        opts: TargetOptions,
        dev_only: bool,
    ) -> Result<LinkedCompilation, DeclarationError> {
        let mut link_to: Vec<Library> = Vec::new();
        let mut packages: Vec<PackageReference> = Vec::new();

        for target in opts.link_to {
            match target {
                LinkTarget::Library(lib) => {
                    if lib.dist_name() != self.name {
                        packages.push(PackageReference::cross_distribution(&lib));
                    }
                    if !link_to.contains(&lib) {
                        link_to.push(lib);
                    }
                }
                LinkTarget::Package(handle) => {
                    if handle.owner != self.owner {
                        return Err(DeclarationError::ForeignPackageHandle {
                            compilation: opts.name.clone(),
                            package: handle.debug_name().to_string(),
                        });
                    }
                    let Some(r) = self.packages.get(handle.id) else {
                        return Err(DeclarationError::InvalidPackageHandle {
                            compilation: opts.name.clone(),
                            id: handle.id,
                        });
                    };
                    if !packages.contains(r) {
                        packages.push(r.clone());
                    }
                }
            }
        }

        check_acyclic(&self.name, &opts.name, &link_to)?;
        self.check_unique(&opts.name)?;

        let include_dirs = opts
            .include_dirs
            .unwrap_or_else(|| vec![PathBuf::from("include")]);
        let private_include_dirs = opts
            .private_include_dirs
            .unwrap_or_else(|| vec![PathBuf::from("private/include")]);

        Ok(LinkedCompilation {
            compile_commands: self
                .out_dir
                .join(format!(".{}-compile_commands.json", opts.name)),
            name: opts.name,
            dist_name: self.name.clone(),
            dist_version: self.version.clone(),
            out_dir: self.out_dir.clone(),
            sources: opts.sources,
            include_dirs: include_dirs.into_iter().map(BuildPath::src).collect(),
            private_include_dirs: private_include_dirs
                .into_iter()
                .map(BuildPath::src)
                .collect(),
            link_to,
            packages,
            dev_only,
        })
    }

    fn check_unique(&self, name: &str) -> Result<(), DeclarationError> {
        let decls = lock(&self.decls);
        let taken = decls.executables.iter().any(|c| c.name == name)
            || decls.libraries.iter().any(|l| l.name() == name);
        if taken {
            return Err(DeclarationError::DuplicateTarget {
                dist: self.name.clone(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn add_sources(&self, c: &LinkedCompilation) -> Result<(), DeclarationError> {
        for src in &c.sources {
            self.add_file(src.clone(), src.rel().to_path_buf())?;
        }
        Ok(())
    }

    fn add_file(&self, src: BuildPath, dest: PathBuf) -> Result<(), DeclarationError> {
        self.graph.add_prereqs(self.dist.clone(), [src.clone()])?;
        lock(&self.decls).files.push((src, dest));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::GccToolchain;
    use crate::core::library::LibraryType;
    use anyhow::Result;

    struct NoPackages;

    impl PackageQuery for NoPackages {
        fn cflags(&self, _names: &[String]) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn libs(&self, _names: &[String], _prefer_static: bool) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn graph() -> Arc<BuildGraph> {
        BuildGraph::new("/src", "/build")
    }

    fn dist(graph: &Arc<BuildGraph>, name: &str, config: Config) -> Distribution {
        let opts = DistributionOptions {
            config,
            ..DistributionOptions::new(name, "1.0.0")
        };
        Distribution::with_toolchain(
            graph,
            &opts,
            Arc::new(GccToolchain::new("cc".into(), "c++".into(), "ar".into(), HostOs::Linux)),
            Arc::new(NoPackages),
        )
        .unwrap()
    }

    #[test]
    fn test_paths() {
        let g = graph();
        let d = dist(&g, "math", Config::default());
        assert_eq!(d.out_dir(), &BuildPath::build("math"));
        assert_eq!(d.dist(), &BuildPath::build("math-1.0.0.tgz"));
        assert_eq!(d.test(), &BuildPath::build("test-math"));
        assert_eq!(
            g.prereqs_of(d.dist_alias()).unwrap(),
            vec![BuildPath::build("math-1.0.0.tgz")]
        );
    }

    #[test]
    fn test_default_library_type_from_config() {
        let g = graph();
        let mut d = dist(&g, "math", Config::default());
        let add = d.add_library(TargetOptions::new("add").source("src/add.c")).unwrap();
        assert_eq!(add.lib_type(), ResolvedLibraryType::Static);

        let shared = Config {
            build_shared_libs: true,
            ..Default::default()
        };
        let g = graph();
        let mut d = dist(&g, "shared", shared);
        let add = d.add_library(TargetOptions::new("add").source("src/add.c")).unwrap();
        assert_eq!(add.lib_type(), ResolvedLibraryType::Dynamic);

        let forced = d
            .add_library(
                TargetOptions::new("sub")
                    .source("src/sub.c")
                    .with_type(LibraryType::Static),
            )
            .unwrap();
        assert_eq!(forced.lib_type(), ResolvedLibraryType::Static);
    }

    #[test]
    fn test_default_include_dirs() {
        let g = graph();
        let mut d = dist(&g, "math", Config::default());
        let add = d.add_library(TargetOptions::new("add").source("src/add.c")).unwrap();
        assert_eq!(add.includes(), &[BuildPath::src("include")]);
        assert_eq!(
            add.compilation().private_include_dirs,
            vec![BuildPath::src("private/include")]
        );

        let sub = d
            .add_library(
                TargetOptions::new("sub")
                    .source("src/sub.c")
                    .include_dir("sub/include"),
            )
            .unwrap();
        assert_eq!(sub.includes(), &[BuildPath::src("sub/include")]);
    }

    #[test]
    fn test_dist_depends_on_distributed_targets_only() {
        let g = graph();
        let mut d = dist(&g, "math", Config::default());
        let add = d.add_library(TargetOptions::new("add").source("src/add.c")).unwrap();
        let main = d
            .add_executable(TargetOptions::new("main").source("src/main.c").link_to(&add))
            .unwrap();
        let test = d
            .add_test(TargetOptions::new("check").source("test/check.c").link_to(&add))
            .unwrap();

        let prereqs = g.prereqs_of(d.dist()).unwrap();
        assert!(prereqs.contains(&BuildPath::src("src/add.c")));
        assert!(prereqs.contains(add.binary()));
        assert!(prereqs.contains(&BuildPath::src("src/main.c")));
        assert!(prereqs.contains(&main.binary));
        assert!(!prereqs.contains(&BuildPath::src("test/check.c")));
        assert!(!prereqs.contains(&test.binary));

        assert_eq!(test.run, BuildPath::build("math/check.run"));
        assert_eq!(g.prereqs_of(d.test()).unwrap(), vec![test.run.clone()]);
        assert_eq!(g.prereqs_of(&test.run).unwrap(), vec![test.binary]);
    }

    #[test]
    fn test_generated_sources() {
        let g = graph();
        let mut d = dist(&g, "math", Config::default());
        let gen_c = BuildPath::build("gen.c");
        g.add_rule([gen_c.clone()], Vec::new(), |_| Ok(())).unwrap();

        let e1 = d
            .add_executable(
                TargetOptions::new("e1").sources([BuildPath::src("src/e1.c"), gen_c.clone()]),
            )
            .unwrap();

        let object = BuildPath::build("math/e1.dir/gen.o");
        assert_eq!(g.prereqs_of(&object).unwrap()[0], gen_c);
        assert!(g.prereqs_of(&e1.binary).unwrap().contains(&object));
        assert!(g.prereqs_of(d.dist()).unwrap().contains(&gen_c));
        assert!(lock(&d.decls)
            .files
            .contains(&(gen_c, PathBuf::from("gen.c"))));
    }

    #[test]
    fn test_debug_output() {
        let g = graph();
        let d = dist(&g, "math", Config::default());
        let debug = format!("{:?}", d);
        assert!(debug.starts_with("Distribution { name: \"math\", version: \"1.0.0\""));
    }

    #[test]
    fn test_find_package_handles() {
        let g = graph();
        let mut d = dist(&g, "math", Config::default());
        let uuid = d.find_package("uuid");
        assert_eq!(uuid.id(), 0);
        assert_eq!(uuid.debug_name(), "uuid");

        let main = d
            .add_executable(TargetOptions::new("main").source("src/main.c").link_to(uuid))
            .unwrap();
        assert_eq!(main.name, "main");

        let bogus = PackageHandle::new(7, d.owner, "bogus".into());
        let err = d
            .add_executable(TargetOptions::new("other").source("src/o.c").link_to(bogus))
            .unwrap_err();
        assert!(matches!(err, DeclarationError::InvalidPackageHandle { id: 7, .. }));
    }

    #[test]
    fn test_foreign_package_handle() {
        let g = graph();
        let mut a = dist(&g, "a", Config::default());
        let mut b = dist(&g, "b", Config::default());
        let uuid = a.find_package("uuid");

        let err = b
            .add_executable(TargetOptions::new("main").source("main.c").link_to(uuid))
            .unwrap_err();
        assert!(matches!(err, DeclarationError::ForeignPackageHandle { .. }));
    }

    #[test]
    fn test_cross_distribution_link() {
        let g = graph();
        let mut a = dist(&g, "a", Config::default());
        let mut b = dist(&g, "b", Config::default());
        let one = a.add_library(TargetOptions::new("one").source("one.c")).unwrap();
        let two = b
            .add_library(TargetOptions::new("two").source("two.c").link_to(&one))
            .unwrap();

        let c = two.compilation();
        assert_eq!(c.link_to, vec![one.clone()]);
        assert_eq!(c.packages.len(), 1);
        assert!(c.packages[0].cross_distribution);
        let export = c.packages[0].export.as_ref().unwrap();
        assert_eq!(export.package_name, "one");
        assert_eq!(export.version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_duplicate_and_cyclic_names() {
        let g = graph();
        let mut d = dist(&g, "math", Config::default());
        let add = d.add_library(TargetOptions::new("add").source("add.c")).unwrap();

        let err = d
            .add_executable(TargetOptions::new("add").source("main.c"))
            .unwrap_err();
        assert!(matches!(err, DeclarationError::DuplicateTarget { .. }));

        let err = d
            .add_library(TargetOptions::new("add").source("add2.c").link_to(&add))
            .unwrap_err();
        match err {
            DeclarationError::Cycle { path } => assert_eq!(path, vec!["math/add", "math/add"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_compile_commands_components() {
        let g = graph();
        let mut d = dist(&g, "math", Config::default());
        d.add_library(TargetOptions::new("add").source("add.c")).unwrap();
        d.add_executable(TargetOptions::new("main").source("main.c")).unwrap();
        d.add_test(TargetOptions::new("check").source("check.c")).unwrap();

        assert_eq!(
            d.compile_commands_components(),
            vec![
                BuildPath::build("math/.main-compile_commands.json"),
                BuildPath::build("math/.check-compile_commands.json"),
                BuildPath::build("math/.add-compile_commands.json"),
            ]
        );
    }

    #[test]
    fn test_search_paths() {
        let g = graph();
        let config = Config {
            add_pkg_config_search_paths: vec![PathBuf::from("/opt/pc")],
            ..Default::default()
        };
        assert_eq!(
            Distribution::search_paths(&g, &config),
            vec![
                PathBuf::from("/build/pkgconfig"),
                PathBuf::from("/src/vendor/lib/pkgconfig"),
                PathBuf::from("/opt/pc"),
            ]
        );
    }
}

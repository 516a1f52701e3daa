//! Native C/C++ compiler driver.
//!
//! Turns linked compilations into build graph rules:
//! - one compile command database per compilation, regenerated as a whole
//! - one object rule per source, replaying the recorded command and
//!   registering discovered headers as postreqs
//! - an archive or link rule producing the final binary
//! - a development `.pc` file per library

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::builder::compile_commands::{CompileCommand, CompileCommandCache, CompileCommandDb};
use crate::builder::depfile::{parse_depfile, parse_show_includes};
use crate::builder::pkgconfig::PackageQuery;
use crate::builder::toolchain::{ArchiveInput, CompileInput, HeaderDeps, LinkInput, Toolchain};
use crate::core::dependency::{accumulated_package_keys, all_include_dirs, transitive_libraries};
use crate::core::library::{Executable, Library, LinkedCompilation, ResolvedLibraryType};
use crate::core::source::{link_language, CStandard, CxxStandard, Language};
use crate::graph::{BuildGraph, BuildPath, GraphError, RecipeArgs};
use crate::util::fs::{read_to_string, write_string};
use crate::util::quote::quote_shell_arg;

/// Flags applied to every compilation of a distribution.
#[derive(Debug, Clone, Default)]
pub struct CompileSettings {
    pub c_std: Option<CStandard>,
    pub cxx_std: Option<CxxStandard>,
    /// Extra flags for C sources
    pub cflags: Vec<String>,
    /// Extra flags for C++ sources
    pub cxxflags: Vec<String>,
}

/// Registers compile and link rules for one distribution.
pub struct NativeCompiler {
    toolchain: Arc<dyn Toolchain>,
    packages: Arc<dyn PackageQuery>,
    settings: Arc<CompileSettings>,
    cache: Arc<CompileCommandCache>,
    /// Files the declarations were read from
    declared_in: Vec<BuildPath>,
}

impl NativeCompiler {
    pub fn new(
        toolchain: Arc<dyn Toolchain>,
        packages: Arc<dyn PackageQuery>,
        settings: CompileSettings,
    ) -> Self {
        NativeCompiler {
            toolchain,
            packages,
            settings: Arc::new(settings),
            cache: Arc::new(CompileCommandCache::new()),
            declared_in: Vec::new(),
        }
    }

    /// Regenerate compile command databases whenever these files change.
    pub fn with_declaration_inputs(mut self, inputs: Vec<BuildPath>) -> Self {
        self.declared_in = inputs;
        self
    }

    pub fn toolchain(&self) -> &Arc<dyn Toolchain> {
        &self.toolchain
    }

    /// Development `.pc` file of a library, searched first by the package
    /// query service.
    pub fn dev_pc_file(name: &str) -> BuildPath {
        BuildPath::build("pkgconfig").join(format!("{}.pc", name))
    }

    /// Where the object of `src` is placed for compilation `c`.
    pub fn object_path(&self, c: &LinkedCompilation, src: &BuildPath) -> BuildPath {
        let ext = self.toolchain.object_extension();
        c.out_dir
            .join(format!("{}.dir", c.name))
            .join(src.rel().with_extension(ext))
    }

    pub fn executable_path(&self, c: &LinkedCompilation) -> BuildPath {
        c.out_dir.join(self.toolchain.exe_name(&c.name))
    }

    /// Binary and, for Windows DLLs, import library of a library.
    pub fn library_paths(
        &self,
        c: &LinkedCompilation,
        lib_type: ResolvedLibraryType,
    ) -> (BuildPath, Option<BuildPath>) {
        match lib_type {
            ResolvedLibraryType::Static => {
                (c.out_dir.join(self.toolchain.static_lib_name(&c.name)), None)
            }
            ResolvedLibraryType::Dynamic => (
                c.out_dir.join(self.toolchain.shared_lib_name(&c.name)),
                self.toolchain
                    .import_lib_name(&c.name)
                    .map(|n| c.out_dir.join(n)),
            ),
        }
    }

    /// Register the rules of an executable.
    pub fn add_executable(
        &self,
        graph: &BuildGraph,
        c: LinkedCompilation,
    ) -> Result<Executable, GraphError> {
        let binary = self.executable_path(&c);
        let objs = self.add_objects(graph, &c, false)?;
        self.add_link(graph, &c, vec![binary.clone()], objs, false, Vec::new())?;

        Ok(Executable {
            name: c.name,
            binary,
        })
    }

    /// Register the rules of a library and return its handle.
    pub fn add_library(
        &self,
        graph: &BuildGraph,
        c: LinkedCompilation,
        lib_type: ResolvedLibraryType,
    ) -> Result<Library, GraphError> {
        let (binary, import_library) = self.library_paths(&c, lib_type);
        let pc_file = Self::dev_pc_file(&c.name);
        self.add_dev_pc_file(graph, &c, lib_type, &pc_file)?;

        let objs = self.add_objects(graph, &c, lib_type == ResolvedLibraryType::Dynamic)?;

        match lib_type {
            ResolvedLibraryType::Static => {
                let toolchain = self.toolchain.clone();
                let out = binary.clone();
                let obj_paths = objs.clone();
                let mut prereqs = objs;
                prereqs.push(pc_file);

                graph.add_rule([binary.clone()], prereqs, move |args| {
                    let input = ArchiveInput {
                        objects: args.abs_all(&obj_paths),
                        output: args.abs(&out),
                    };
                    // ar appends to an existing archive
                    let output = input.output.clone();
                    if output.exists() {
                        std::fs::remove_file(&output).with_context(|| {
                            format!("failed to remove stale archive {}", output.display())
                        })?;
                    }
                    let cmd = toolchain.archive_command(&input);
                    args.spawn(&cmd.program, &cmd.args)?;
                    Ok(())
                })?;
            }
            ResolvedLibraryType::Dynamic => {
                let mut targets = vec![binary.clone()];
                targets.extend(import_library.clone());
                self.add_link(graph, &c, targets, objs, true, vec![pc_file])?;
            }
        }

        tracing::debug!("library {} ({}) at {}", c.qualified_name(), lib_type, binary);
        Ok(Library::new(c, lib_type, binary, import_library))
    }

    /// Register the compile command database and one rule per object.
    fn add_objects(
        &self,
        graph: &BuildGraph,
        c: &LinkedCompilation,
        pic: bool,
    ) -> Result<Vec<BuildPath>, GraphError> {
        self.add_compile_commands(graph, c, pic)?;

        let mut objs = Vec::new();
        for src in &c.sources {
            let obj = self.object_path(c, src);
            objs.push(obj.clone());

            let db = c.compile_commands.clone();
            let src = src.clone();
            let toolchain = self.toolchain.clone();
            let cache = self.cache.clone();

            graph.add_rule([obj.clone()], [src.clone(), db.clone()], move |args| {
                compile_object(args, toolchain.as_ref(), &cache, &db, &src, &obj)
            })?;
        }
        Ok(objs)
    }

    fn add_compile_commands(
        &self,
        graph: &BuildGraph,
        c: &LinkedCompilation,
        pic: bool,
    ) -> Result<(), GraphError> {
        let toolchain = self.toolchain.clone();
        let packages = self.packages.clone();
        let settings = self.settings.clone();
        let cache = self.cache.clone();
        let comp = c.clone();

        graph.add_rule(
            [c.compile_commands.clone()],
            self.declared_in.clone(),
            move |args| {
                let keys = accumulated_package_keys(&comp)?;
                let package_flags = packages
                    .cflags(&keys)
                    .with_context(|| format!("failed to resolve packages of `{}`", comp.name))?;

                let db = compile_commands_of(
                    toolchain.as_ref(),
                    &settings,
                    &comp,
                    pic,
                    &|p: &BuildPath| args.abs(p),
                    args.src_root(),
                    &package_flags,
                );

                let path = args.abs(&comp.compile_commands);
                db.write(&path)?;
                args.log(format!("wrote {} compile commands", db.len()));
                cache.replace(&path, db);
                Ok(())
            },
        )?;

        // Library type, toolchain and flags all shape the recorded commands.
        let db = compile_commands_of(
            self.toolchain.as_ref(),
            &self.settings,
            c,
            pic,
            &|p: &BuildPath| graph.abs(p),
            graph.src_root(),
            &[],
        );
        let mut fingerprint: Vec<String> =
            db.commands().iter().map(|cmd| cmd.arguments.join(" ")).collect();
        fingerprint.push(package_fingerprint(c));
        graph.set_fingerprint(&c.compile_commands, fingerprint.join("\n"))
    }

    /// Register an executable or shared library link.
    fn add_link(
        &self,
        graph: &BuildGraph,
        c: &LinkedCompilation,
        targets: Vec<BuildPath>,
        objs: Vec<BuildPath>,
        shared: bool,
        extra_prereqs: Vec<BuildPath>,
    ) -> Result<(), GraphError> {
        // Dependents come before their dependencies on the link line.
        let libs: Vec<Library> = transitive_libraries(c).into_iter().rev().collect();
        let lib_artifacts: Vec<BuildPath> =
            libs.iter().map(|l| l.link_artifact().clone()).collect();

        let mut prereqs = objs.clone();
        prereqs.extend(libs.iter().map(|l| l.binary().clone()));
        prereqs.extend(extra_prereqs);

        let toolchain = self.toolchain.clone();
        let packages = self.packages.clone();
        let comp = c.clone();
        let output = targets[0].clone();
        let driver = link_language(
            &c.sources.iter().map(|s| s.rel().to_path_buf()).collect::<Vec<PathBuf>>(),
        );

        let fingerprint = [
            self.toolchain
                .link_command(&LinkInput {
                    objects: objs.iter().map(|o| graph.abs(o)).collect(),
                    output: graph.abs(&output),
                    libraries: lib_artifacts.iter().map(|l| graph.abs(l)).collect(),
                    package_flags: Vec::new(),
                    shared,
                    driver,
                })
                .argv()
                .join(" "),
            package_fingerprint(c),
        ]
        .join("\n");
        let fingerprint_target = output.clone();

        graph.add_rule(targets, prereqs, move |args| {
            let keys = accumulated_package_keys(&comp)?;
            let package_flags = packages
                .libs(&keys, toolchain.prefer_static_packages())
                .with_context(|| format!("failed to resolve packages of `{}`", comp.name))?;

            let cmd = toolchain.link_command(&LinkInput {
                objects: args.abs_all(&objs),
                output: args.abs(&output),
                libraries: args.abs_all(&lib_artifacts),
                package_flags,
                shared,
                driver,
            });
            args.spawn(&cmd.program, &cmd.args)?;
            Ok(())
        })?;
        graph.set_fingerprint(&fingerprint_target, fingerprint)
    }

    fn add_dev_pc_file(
        &self,
        graph: &BuildGraph,
        c: &LinkedCompilation,
        lib_type: ResolvedLibraryType,
        pc_file: &BuildPath,
    ) -> Result<(), GraphError> {
        let toolchain = self.toolchain.clone();
        let comp = c.clone();
        let out = pc_file.clone();

        graph.add_rule([pc_file.clone()], self.declared_in.clone(), move |args| {
            let abs = |p: &BuildPath| args.abs(p);
            let contents = dev_pc_contents(toolchain.as_ref(), &comp, lib_type, &abs)?;
            write_string(&args.abs(&out), &contents)
        })?;

        let abs = |p: &BuildPath| graph.abs(p);
        let fingerprint =
            dev_pc_contents(self.toolchain.as_ref(), c, lib_type, &abs).unwrap_or_default();
        graph.set_fingerprint(pc_file, fingerprint)
    }
}

/// Compile command database of a compilation.
fn compile_commands_of(
    toolchain: &dyn Toolchain,
    settings: &CompileSettings,
    comp: &LinkedCompilation,
    pic: bool,
    abs: &dyn Fn(&BuildPath) -> PathBuf,
    src_root: &Path,
    package_flags: &[String],
) -> CompileCommandDb {
    let mut include_dirs: Vec<PathBuf> = all_include_dirs(comp).iter().map(abs).collect();
    include_dirs.extend(comp.private_include_dirs.iter().map(abs));

    let mut db = CompileCommandDb::new();
    for src in &comp.sources {
        let language = Language::of(src.rel());
        let flags = match language {
            Language::C => settings.cflags.clone(),
            Language::Cxx => settings.cxxflags.clone(),
        };
        let cmd = toolchain.compile_command(&CompileInput {
            source: abs(src),
            language,
            pic,
            include_dirs: include_dirs.clone(),
            c_std: settings.c_std,
            cxx_std: settings.cxx_std,
            flags,
            package_flags: package_flags.to_vec(),
        });
        db.insert(CompileCommand {
            file: abs(src),
            directory: src_root.to_path_buf(),
            arguments: cmd.argv(),
        });
    }
    db
}

/// Package keys a compilation is built against. Package flags are only
/// known once the query service runs, so the keys stand in for them.
fn package_fingerprint(c: &LinkedCompilation) -> String {
    match accumulated_package_keys(c) {
        Ok(keys) => format!("packages: {}", keys.join(", ")),
        Err(e) => format!("packages: {:#}", e),
    }
}

/// Contents of the development `.pc` file of a library.
fn dev_pc_contents(
    toolchain: &dyn Toolchain,
    comp: &LinkedCompilation,
    lib_type: ResolvedLibraryType,
    abs: &dyn Fn(&BuildPath) -> PathBuf,
) -> Result<String> {
    let cflags: Vec<String> = comp
        .include_dirs
        .iter()
        .map(|d| quote_shell_arg(&toolchain.pc_include_flag(&abs(d))))
        .collect();
    let libs: Vec<String> = toolchain
        .pc_libs(&abs(&comp.out_dir), &comp.name)
        .iter()
        .map(|f| quote_shell_arg(f))
        .collect();

    let mut requires: Vec<String> = comp.link_to.iter().map(|l| l.name().to_string()).collect();
    for key in accumulated_package_keys(comp)? {
        if !requires.contains(&key) {
            requires.push(key);
        }
    }

    let requires_field = match lib_type {
        ResolvedLibraryType::Static => "Requires",
        ResolvedLibraryType::Dynamic => "Requires.private",
    };

    let contents = [
        format!("Name: {}", comp.name),
        format!("Version: {}", comp.dist_version),
        format!("Description: development build of {}", comp.name),
        format!("Cflags: {}", cflags.join(" ")),
        format!("Libs: {}", libs.join(" ")),
        format!("{}: {}", requires_field, requires.join(", ")),
    ];
    Ok(contents.join("\n") + "\n")
}

/// Compile one object from its recorded command.
fn compile_object(
    args: &mut RecipeArgs<'_>,
    toolchain: &dyn Toolchain,
    cache: &CompileCommandCache,
    db: &BuildPath,
    src: &BuildPath,
    obj: &BuildPath,
) -> Result<()> {
    let db_path = args.abs(db);
    let index = cache.get_or_load(&db_path)?;
    let Some(cmd) = index.get(&args.abs(src)) else {
        bail!("{} not found in {}", src, db);
    };
    let Some((program, recorded)) = cmd.arguments.split_first() else {
        bail!("empty compile command for {} in {}", src, db);
    };

    let depfile = args.abs(&obj.gen("deps"));
    let mut argv = recorded.to_vec();
    argv.extend(toolchain.object_args(&args.abs(obj), &depfile));

    let output = args.spawn(program, &argv)?;

    match toolchain.header_deps() {
        HeaderDeps::Depfile => {
            let contents = read_to_string(&depfile)?;
            for header in parse_depfile(&contents) {
                args.add_postreq(header);
            }
        }
        HeaderDeps::ShowIncludes => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            for header in parse_show_includes(&stdout) {
                args.add_postreq(header);
            }
        }
    }
    Ok(())
}

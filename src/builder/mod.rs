//! C/C++ compilation.
//!
//! This module turns declared compilations into build graph rules: toolchain
//! command generation, compile command databases, header dependency
//! discovery and external package queries.

pub mod compile_commands;
pub mod depfile;
pub mod native;
pub mod pkgconfig;
pub mod toolchain;

pub use compile_commands::{add_compile_commands, CompileCommand, CompileCommandDb};
pub use native::{CompileSettings, NativeCompiler};
pub use pkgconfig::{PackageQuery, PkgConfig};
pub use toolchain::{
    detect_toolchain, CommandSpec, GccToolchain, HostOs, MsvcToolchain, Toolchain,
    ToolchainPlatform,
};

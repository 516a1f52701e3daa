//! Slipway - a declarative build and packaging library for C/C++
//!
//! Distributions declare executables, libraries and tests on a build graph;
//! the graph compiles them with the host toolchain, and each distribution
//! can be exported as a self-contained CMake source package.

pub mod builder;
pub mod core;
pub mod export;
pub mod graph;
pub mod manifest;
pub mod util;

pub use builder::add_compile_commands;
pub use core::{
    DeclarationError, Distribution, DistributionOptions, Executable, FindPackage, Library,
    LibraryType, TargetOptions, Test,
};
pub use graph::{BuildGraph, BuildPath, UpdateReport};
pub use manifest::BuildFile;
pub use util::Config;

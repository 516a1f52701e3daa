//! Declarations: distributions, their targets and external packages.
//!
//! - `distribution`: the façade every declaration goes through
//! - `library`: executables, libraries and the compilations behind them
//! - `package`: `find_package` requests and their handles
//! - `dependency`: link closures and include propagation

pub mod dependency;
pub mod distribution;
pub mod errors;
pub mod library;
pub mod package;
pub mod source;

pub use distribution::{Distribution, DistributionOptions};
pub use errors::DeclarationError;
pub use library::{
    Executable, InstallTarget, Library, LibraryOptions, LibraryType, LinkedCompilation,
    ResolvedLibraryType, TargetOptions, Test,
};
pub use package::{ExportDescriptor, ExportSpec, FindPackage, LinkTarget, PackageHandle};
pub use source::{CStandard, CxxStandard, Language};

//! External package references.
//!
//! A package found with `Distribution::find_package` carries two identities:
//! a local key handed to the package query service while developing, and an
//! export descriptor written into the generated manifest. Either may be
//! absent; a missing one only becomes an error when something actually
//! needs it.

use serde::{Deserialize, Serialize};

use crate::core::library::Library;

/// How a package is referenced from an exported manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportDescriptor {
    /// Name given to `find_package`
    pub package_name: String,
    /// Optional component of the package
    #[serde(default)]
    pub component: Option<String>,
    /// Optional version constraint, passed through verbatim
    #[serde(default)]
    pub version: Option<String>,
    /// Target name linked with `target_link_libraries`
    pub target_alias: String,
}

impl ExportDescriptor {
    /// A descriptor whose package and target share one name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        ExportDescriptor {
            package_name: name.clone(),
            component: None,
            version: None,
            target_alias: name,
        }
    }
}

/// Export half of a split `find_package` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportSpec {
    Name(String),
    Descriptor(ExportDescriptor),
}

impl ExportSpec {
    pub fn into_descriptor(self) -> ExportDescriptor {
        match self {
            ExportSpec::Name(name) => ExportDescriptor::named(name),
            ExportSpec::Descriptor(d) => d,
        }
    }
}

/// A `find_package` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FindPackage {
    /// One name used for both local lookup and export
    Name(String),
    /// Separate local key and export descriptor
    Split {
        #[serde(default)]
        local: Option<String>,
        #[serde(default)]
        export: Option<ExportSpec>,
    },
}

impl FindPackage {
    /// Name used in diagnostics.
    pub fn debug_name(&self) -> String {
        match self {
            FindPackage::Name(name) => name.clone(),
            FindPackage::Split { local, export } => match export {
                Some(ExportSpec::Name(name)) => name.clone(),
                Some(ExportSpec::Descriptor(d)) => d.target_alias.clone(),
                None => local.clone().unwrap_or_else(|| "invalid".to_string()),
            },
        }
    }

    pub fn into_reference(self) -> PackageReference {
        match self {
            FindPackage::Name(name) => PackageReference {
                local_key: Some(name.clone()),
                export: Some(ExportDescriptor::named(name)),
                cross_distribution: false,
            },
            FindPackage::Split { local, export } => PackageReference {
                local_key: local,
                export: export.map(ExportSpec::into_descriptor),
                cross_distribution: false,
            },
        }
    }
}

impl From<&str> for FindPackage {
    fn from(name: &str) -> Self {
        FindPackage::Name(name.to_string())
    }
}

impl From<String> for FindPackage {
    fn from(name: String) -> Self {
        FindPackage::Name(name)
    }
}

/// A resolved external dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    /// Key for the package query service, possibly with a version
    /// constraint such as `"add >= 2.3"`
    pub local_key: Option<String>,
    pub export: Option<ExportDescriptor>,
    /// Stands for a library of another distribution in this process
    pub cross_distribution: bool,
}

impl PackageReference {
    /// Reference another distribution's library as an external package.
    pub fn cross_distribution(lib: &Library) -> Self {
        PackageReference {
            local_key: None,
            export: Some(ExportDescriptor {
                package_name: lib.name().to_string(),
                component: None,
                version: Some(lib.dist_version().to_string()),
                target_alias: lib.name().to_string(),
            }),
            cross_distribution: true,
        }
    }

    /// The local key or, failing that, the export name.
    pub fn display_name(&self) -> String {
        self.local_key
            .clone()
            .or_else(|| self.export.as_ref().map(|e| e.package_name.clone()))
            .unwrap_or_else(|| "<unnamed>".to_string())
    }
}

/// Opaque handle returned by `find_package`, accepted by `link_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageHandle {
    pub(crate) id: usize,
    pub(crate) owner: usize,
    debug_name: String,
}

impl PackageHandle {
    pub(crate) fn new(id: usize, owner: usize, debug_name: String) -> Self {
        PackageHandle {
            id,
            owner,
            debug_name,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

/// Anything a compilation can link to.
#[derive(Debug, Clone)]
pub enum LinkTarget {
    Library(Library),
    Package(PackageHandle),
}

impl From<Library> for LinkTarget {
    fn from(lib: Library) -> Self {
        LinkTarget::Library(lib)
    }
}

impl From<&Library> for LinkTarget {
    fn from(lib: &Library) -> Self {
        LinkTarget::Library(lib.clone())
    }
}

impl From<PackageHandle> for LinkTarget {
    fn from(pkg: PackageHandle) -> Self {
        LinkTarget::Package(pkg)
    }
}

impl From<&PackageHandle> for LinkTarget {
    fn from(pkg: &PackageHandle) -> Self {
        LinkTarget::Package(pkg.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name_is_used_for_both_lookups() {
        let r = FindPackage::from("zlib").into_reference();
        assert_eq!(r.local_key.as_deref(), Some("zlib"));
        assert_eq!(r.export, Some(ExportDescriptor::named("zlib")));
        assert!(!r.cross_distribution);
    }

    #[test]
    fn test_split_request() {
        let req = FindPackage::Split {
            local: Some("libcurl >= 7.0".into()),
            export: Some(ExportSpec::Descriptor(ExportDescriptor {
                package_name: "CURL".into(),
                component: Some("HTTPS".into()),
                version: Some("7.0".into()),
                target_alias: "CURL::libcurl".into(),
            })),
        };
        assert_eq!(req.debug_name(), "CURL::libcurl");

        let r = req.into_reference();
        assert_eq!(r.local_key.as_deref(), Some("libcurl >= 7.0"));
        assert_eq!(r.export.unwrap().package_name, "CURL");
    }

    #[test]
    fn test_local_only_request_has_no_export() {
        let req = FindPackage::Split {
            local: Some("dev-helper".into()),
            export: None,
        };
        assert_eq!(req.debug_name(), "dev-helper");
        assert!(req.into_reference().export.is_none());
    }

    #[test]
    fn test_find_package_deserializes_both_shapes() {
        let bare: FindPackage = serde_json::from_str(r#""uuid""#).unwrap();
        assert_eq!(bare, FindPackage::Name("uuid".into()));

        let split: FindPackage = serde_json::from_str(
            r#"{
                "local": "uuid",
                "export": { "package_name": "unofficial-uuid", "target_alias": "unofficial::uuid" }
            }"#,
        )
        .unwrap();
        assert_eq!(split.debug_name(), "unofficial::uuid");
    }
}

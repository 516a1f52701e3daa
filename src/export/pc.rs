//! Installed pkg-config files.
//!
//! Each exported library ships two `.pc` files: one with POSIX paths and
//! `-I`/`-L -l` flags, and one for MSVC with escaped backslashes, `/I` and
//! a direct path to the `.lib`. Both locate the install prefix relative to
//! the file itself.

use crate::core::library::ResolvedLibraryType;

/// What goes into an exported `.pc` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcFile {
    pub name: String,
    pub version: String,
    pub lib_type: ResolvedLibraryType,
    /// pkg-config names this library depends on
    pub requires: Vec<String>,
}

impl PcFile {
    fn requires_line(&self) -> Option<String> {
        if self.requires.is_empty() {
            return None;
        }
        let field = match self.lib_type {
            ResolvedLibraryType::Static => "Requires",
            ResolvedLibraryType::Dynamic => "Requires.private",
        };
        Some(format!("{}: {}", field, self.requires.join(" ")))
    }

    /// Contents installed as `lib/pkgconfig/<name>.pc` on POSIX systems.
    pub fn render_posix(&self) -> String {
        let mut lines = vec![
            "# Generated by slipway".to_string(),
            "prefix=${pcfiledir}/../..".to_string(),
            "libdir=${prefix}/lib".to_string(),
            "includedir=${prefix}/include".to_string(),
            String::new(),
            format!("Name: {}", self.name),
            format!("Version: {}", self.version),
            "Description: generated by slipway".to_string(),
            "Cflags: \"-I${includedir}\"".to_string(),
            format!("Libs: \"-L${{libdir}}\" \"-l{}\"", self.name),
        ];
        lines.extend(self.requires_line());
        lines.join("\n")
    }

    /// Contents installed as `lib/pkgconfig/<name>.pc` with MSVC.
    pub fn render_msvc(&self) -> String {
        let mut lines = vec![
            "# Generated by slipway".to_string(),
            r"prefix=${pcfiledir}\\..\\..".to_string(),
            r"libdir=${prefix}\\lib".to_string(),
            r"includedir=${prefix}\\include".to_string(),
            String::new(),
            format!("Name: {}", self.name),
            format!("Version: {}", self.version),
            "Description: generated by slipway".to_string(),
            "Cflags: \"/I${includedir}\"".to_string(),
            format!(r#"Libs: "${{libdir}}\\{}.lib""#, self.name),
        ];
        lines.extend(self.requires_line());
        lines.join("\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pc(lib_type: ResolvedLibraryType, requires: &[&str]) -> PcFile {
        PcFile {
            name: "add".into(),
            version: "1.0.0".into(),
            lib_type,
            requires: requires.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_posix_pc_file() {
        let text = pc(ResolvedLibraryType::Dynamic, &["uuid"]).render_posix();
        assert_eq!(
            text,
            "# Generated by slipway\n\
             prefix=${pcfiledir}/../..\n\
             libdir=${prefix}/lib\n\
             includedir=${prefix}/include\n\
             \n\
             Name: add\n\
             Version: 1.0.0\n\
             Description: generated by slipway\n\
             Cflags: \"-I${includedir}\"\n\
             Libs: \"-L${libdir}\" \"-ladd\"\n\
             Requires.private: uuid"
        );
    }

    #[test]
    fn test_msvc_pc_file() {
        let text = pc(ResolvedLibraryType::Static, &[]).render_msvc();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines[1], r"prefix=${pcfiledir}\\..\\..");
        assert_eq!(lines[8], r#"Cflags: "/I${includedir}""#);
        assert_eq!(lines[9], r#"Libs: "${libdir}\\add.lib""#);
        assert_eq!(lines.len(), 10);
        assert!(!text.contains("Requires"));
    }

    #[test]
    fn test_static_library_requires_publicly() {
        let text = pc(ResolvedLibraryType::Static, &["uuid", "base"]).render_posix();
        assert!(text.ends_with("\nRequires: uuid base"));
    }
}

//! Source classification and language standards.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Language of a single source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    C,
    Cxx,
}

impl Language {
    /// Classify a source file by extension.
    ///
    /// Only `.c` is C. Every other compilable extension (`.cpp`, `.cc`,
    /// `.cxx`, `.C`, ...) is treated as C++.
    pub fn of(src: &Path) -> Self {
        match src.extension().and_then(|e| e.to_str()) {
            Some("c") => Language::C,
            _ => Language::Cxx,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
        }
    }
}

/// Whether a source must be compiled as C++.
pub fn is_cxx_src(src: &Path) -> bool {
    Language::of(src) == Language::Cxx
}

/// Whether a compilation must be linked with the C++ driver.
pub fn is_cxx_link<P: AsRef<Path>>(srcs: &[P]) -> bool {
    srcs.iter().any(|s| is_cxx_src(s.as_ref()))
}

/// Language driving the link step of a compilation.
pub fn link_language<P: AsRef<Path>>(srcs: &[P]) -> Language {
    if is_cxx_link(srcs) {
        Language::Cxx
    } else {
        Language::C
    }
}

/// C language version, numbered like `CMAKE_C_STANDARD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CStandard {
    C90,
    C99,
    C11,
    C17,
    C23,
}

impl CStandard {
    /// The number used by CMake and by `-std=c<N>`.
    pub fn number(&self) -> u32 {
        match self {
            CStandard::C90 => 90,
            CStandard::C99 => 99,
            CStandard::C11 => 11,
            CStandard::C17 => 17,
            CStandard::C23 => 23,
        }
    }
}

impl TryFrom<u32> for CStandard {
    type Error = StandardParseError;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            90 => Ok(CStandard::C90),
            99 => Ok(CStandard::C99),
            11 => Ok(CStandard::C11),
            17 => Ok(CStandard::C17),
            23 => Ok(CStandard::C23),
            _ => Err(StandardParseError {
                lang: Language::C,
                value: n.to_string(),
            }),
        }
    }
}

impl From<CStandard> for u32 {
    fn from(std: CStandard) -> u32 {
        std.number()
    }
}

impl FromStr for CStandard {
    type Err = StandardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('c').or_else(|| s.strip_prefix('C')).unwrap_or(s);
        digits
            .parse::<u32>()
            .ok()
            .and_then(|n| CStandard::try_from(n).ok())
            .ok_or_else(|| StandardParseError {
                lang: Language::C,
                value: s.to_string(),
            })
    }
}

impl fmt::Display for CStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// C++ language version, numbered like `CMAKE_CXX_STANDARD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CxxStandard {
    Cxx98,
    Cxx11,
    Cxx14,
    Cxx17,
    Cxx20,
    Cxx23,
    Cxx26,
}

impl CxxStandard {
    /// The number used by CMake and by `-std=c++<N>`.
    pub fn number(&self) -> u32 {
        match self {
            CxxStandard::Cxx98 => 98,
            CxxStandard::Cxx11 => 11,
            CxxStandard::Cxx14 => 14,
            CxxStandard::Cxx17 => 17,
            CxxStandard::Cxx20 => 20,
            CxxStandard::Cxx23 => 23,
            CxxStandard::Cxx26 => 26,
        }
    }
}

impl TryFrom<u32> for CxxStandard {
    type Error = StandardParseError;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            98 => Ok(CxxStandard::Cxx98),
            11 => Ok(CxxStandard::Cxx11),
            14 => Ok(CxxStandard::Cxx14),
            17 => Ok(CxxStandard::Cxx17),
            20 => Ok(CxxStandard::Cxx20),
            23 => Ok(CxxStandard::Cxx23),
            26 => Ok(CxxStandard::Cxx26),
            _ => Err(StandardParseError {
                lang: Language::Cxx,
                value: n.to_string(),
            }),
        }
    }
}

impl From<CxxStandard> for u32 {
    fn from(std: CxxStandard) -> u32 {
        std.number()
    }
}

impl FromStr for CxxStandard {
    type Err = StandardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("c++").unwrap_or(s);
        digits
            .parse::<u32>()
            .ok()
            .and_then(|n| CxxStandard::try_from(n).ok())
            .ok_or_else(|| StandardParseError {
                lang: Language::Cxx,
                value: s.to_string(),
            })
    }
}

impl fmt::Display for CxxStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Error returned when parsing an unsupported language standard.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid {} standard '{value}'", lang.as_str())]
pub struct StandardParseError {
    lang: Language,
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_sources() {
        assert_eq!(Language::of(Path::new("src/add.c")), Language::C);
        assert_eq!(Language::of(Path::new("src/add.cpp")), Language::Cxx);
        assert_eq!(Language::of(Path::new("src/add.cc")), Language::Cxx);
        assert_eq!(Language::of(Path::new("src/add.C")), Language::Cxx);
    }

    #[test]
    fn test_mixed_sources_link_as_cxx() {
        assert!(!is_cxx_link(&["a.c", "b.c"]));
        assert!(is_cxx_link(&["a.c", "b.cpp"]));
        assert_eq!(link_language(&["main.c"]), Language::C);
        assert_eq!(link_language(&["main.c", "impl.cxx"]), Language::Cxx);
    }

    #[test]
    fn test_parse_standards() {
        assert_eq!("11".parse::<CStandard>().unwrap(), CStandard::C11);
        assert_eq!("c99".parse::<CStandard>().unwrap(), CStandard::C99);
        assert!("14".parse::<CStandard>().is_err());

        assert_eq!("c++20".parse::<CxxStandard>().unwrap(), CxxStandard::Cxx20);
        assert_eq!("98".parse::<CxxStandard>().unwrap(), CxxStandard::Cxx98);
        assert!("99".parse::<CxxStandard>().is_err());
    }

    #[test]
    fn test_standards_deserialize_from_numbers() {
        #[derive(Deserialize)]
        struct Opts {
            c: CStandard,
            cxx: CxxStandard,
        }

        let opts: Opts = serde_json::from_str(r#"{ "c": 17, "cxx": 26 }"#).unwrap();
        assert_eq!(opts.c, CStandard::C17);
        assert_eq!(opts.cxx, CxxStandard::Cxx26);
        assert!(serde_json::from_str::<Opts>(r#"{ "c": 18, "cxx": 17 }"#).is_err());
    }
}

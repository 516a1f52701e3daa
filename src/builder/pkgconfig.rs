//! External package queries.
//!
//! Packages are looked up by their local key through `pkg-config`. The
//! search path always starts with the build tree's own `pkgconfig`
//! directory, so libraries of one distribution can be found by another
//! while developing.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::util::process::{find_executable, ProcessBuilder};

/// Flags for a set of packages, by local lookup key.
pub trait PackageQuery: Send + Sync {
    /// Compile flags (`--cflags`).
    fn cflags(&self, names: &[String]) -> Result<Vec<String>>;

    /// Link flags (`--libs`), optionally for static linking.
    fn libs(&self, names: &[String], prefer_static: bool) -> Result<Vec<String>>;
}

/// `pkg-config` executable with a fixed search path.
#[derive(Debug, Clone)]
pub struct PkgConfig {
    search_paths: Vec<PathBuf>,
}

impl PkgConfig {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        PkgConfig { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    fn query(&self, names: &[String], mode: &[&str]) -> Result<Vec<String>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let program =
            find_executable(&["pkg-config", "pkgconf"]).context("pkg-config not found in PATH")?;

        let search_path = std::env::join_paths(&self.search_paths)
            .context("pkg-config search path contains an invalid entry")?;

        let output = ProcessBuilder::new(program)
            .args(mode)
            .args(names)
            .env("PKG_CONFIG_PATH", &search_path)
            .exec_and_check()
            .with_context(|| format!("failed to query packages: {}", names.join(", ")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        tracing::debug!("pkg-config {} {:?}: {}", mode.join(" "), names, stdout.trim());
        Ok(split_words(&stdout))
    }
}

impl PackageQuery for PkgConfig {
    fn cflags(&self, names: &[String]) -> Result<Vec<String>> {
        self.query(names, &["--cflags"])
    }

    fn libs(&self, names: &[String], prefer_static: bool) -> Result<Vec<String>> {
        if prefer_static {
            self.query(names, &["--libs", "--static"])
        } else {
            self.query(names, &["--libs"])
        }
    }
}

/// Split command-line text into words, honouring quotes and backslashes.
pub fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    word.push(q);
                }
            }
            '"' => {
                in_word = true;
                while let Some(q) = chars.next() {
                    match q {
                        '"' => break,
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                word.push(escaped);
                            }
                        }
                        q => word.push(q),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(escaped) = chars.next() {
                    word.push(escaped);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }

    if in_word {
        words.push(word);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_words() {
        assert_eq!(
            split_words("-I/usr/include/uuid  -DX=1\n"),
            vec!["-I/usr/include/uuid", "-DX=1"]
        );
    }

    #[test]
    fn test_split_quoted_words() {
        assert_eq!(
            split_words(r#""-I/my dir/include" '-L/a b' -l\ x"#),
            vec!["-I/my dir/include", "-L/a b", "-l x"]
        );
    }

    #[test]
    fn test_split_empty_quotes_are_words() {
        assert_eq!(split_words(r#"a "" b"#), vec!["a", "", "b"]);
        assert!(split_words("   \n").is_empty());
    }

    #[test]
    fn test_empty_query_does_not_spawn() {
        let pc = PkgConfig::new(vec![PathBuf::from("/nonexistent")]);
        assert!(pc.cflags(&[]).unwrap().is_empty());
        assert!(pc.libs(&[], true).unwrap().is_empty());
    }
}

//! Header dependency discovery.

use std::sync::LazyLock;

use regex::Regex;

/// Prerequisites listed in a Make-style depfile written by `-MD -MF`.
///
/// Backslash-newline continuations are joined, and everything after the
/// first rule target (`obj.o:`) is a prerequisite. Spaces escaped with a
/// backslash stay inside the path.
pub fn parse_depfile(contents: &str) -> Vec<String> {
    let joined = contents.replace("\\\r\n", " ").replace("\\\n", " ");

    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = joined.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&' ') => {
                current.push(' ');
                chars.next();
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    let mut prereqs = Vec::new();
    let mut after_target = false;
    for word in words {
        if !after_target {
            if word.ends_with(':') {
                after_target = true;
            }
            continue;
        }
        // A second rule (from -MP) starts with another target.
        if word.ends_with(':') {
            continue;
        }
        if !prereqs.contains(&word) {
            prereqs.push(word);
        }
    }
    prereqs
}

static SHOW_INCLUDES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Note: including file:\s+(.*?)\s*$").unwrap());

/// Headers reported by `cl.exe /showIncludes`.
pub fn parse_show_includes(stdout: &str) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for line in stdout.lines() {
        if let Some(caps) = SHOW_INCLUDES.captures(line) {
            let header = caps[1].to_string();
            if !headers.contains(&header) {
                headers.push(header);
            }
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_depfile() {
        let deps = "/b/src/main.o: /p/src/main.c /p/include/add.h \\\n  /usr/include/stdio.h\n";
        assert_eq!(
            parse_depfile(deps),
            vec!["/p/src/main.c", "/p/include/add.h", "/usr/include/stdio.h"]
        );
    }

    #[test]
    fn test_parse_depfile_escaped_space() {
        let deps = "a.o: my\\ dir/a.c b.h";
        assert_eq!(parse_depfile(deps), vec!["my dir/a.c", "b.h"]);
    }

    #[test]
    fn test_parse_depfile_phony_targets() {
        let deps = "a.o: a.c a.h\n\na.h:\n";
        assert_eq!(parse_depfile(deps), vec!["a.c", "a.h"]);
    }

    #[test]
    fn test_parse_depfile_empty() {
        assert!(parse_depfile("").is_empty());
    }

    #[test]
    fn test_parse_show_includes() {
        let out = "add.c\r\nNote: including file: C:\\p\\include\\add.h\r\nNote: including file:  C:\\sdk\\stdio.h\r\n";
        assert_eq!(
            parse_show_includes(out),
            vec!["C:\\p\\include\\add.h", "C:\\sdk\\stdio.h"]
        );
    }
}

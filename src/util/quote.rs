//! Argument quoting for generated files.

/// Quote an argument for a CMake command invocation.
///
/// Plain arguments are returned unchanged. Anything CMake would split,
/// treat as a comment or expand is wrapped in double quotes with `;`, `"`,
/// `\`, control characters and `${` escaped.
pub fn quote_cmake_arg(arg: &str) -> String {
    let special = |c: char| c.is_whitespace() || "#();\"\\".contains(c);
    if !arg.contains(special) && !arg.contains("${") {
        return arg.to_string();
    }

    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    let mut chars = arg.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            ';' => out.push_str("\\;"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Quote an argument for a POSIX shell, as read by pkg-config.
pub fn quote_shell_arg(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\\''"))
}

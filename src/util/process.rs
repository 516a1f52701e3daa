//! Running toolchain and package query commands.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use thiserror::Error;

use crate::util::quote::quote_shell_arg;

/// A command that could not be run or did not succeed.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with code {}\n{stderr}", code.map_or("none".to_string(), |c| c.to_string()))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// A program invocation: argv, extra environment and working directory.
///
/// Output is always captured and stdin is closed.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<OsString>,
    env: Vec<(String, OsString)>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set an environment variable, replacing an earlier value.
    pub fn env(mut self, key: impl Into<String>, value: impl AsRef<OsStr>) -> Self {
        let key = key.into();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, value.as_ref().to_os_string()));
        self
    }

    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Run to completion. A nonzero exit is not an error here.
    pub fn exec(&self) -> Result<Output, ProcessError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        cmd.output().map_err(|source| ProcessError::Spawn {
            command: self.display_command(),
            source,
        })
    }

    /// Run to completion and require a zero exit status.
    pub fn exec_and_check(&self) -> Result<Output, ProcessError> {
        let output = self.exec()?;
        if !output.status.success() {
            return Err(ProcessError::Failed {
                command: self.display_command(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }
        Ok(output)
    }

    /// The command line as it would be typed into a shell.
    pub fn display_command(&self) -> String {
        let mut line = display_word(self.program.as_os_str());
        for arg in &self.args {
            line.push(' ');
            line.push_str(&display_word(arg));
        }
        line
    }
}

fn display_word(word: &OsStr) -> String {
    let word = word.to_string_lossy();
    if word.is_empty() || word.contains(|c: char| c.is_whitespace() || "'\"$`\\".contains(c)) {
        quote_shell_arg(&word)
    } else {
        word.into_owned()
    }
}

/// First of `candidates` found in `PATH`.
pub fn find_executable(candidates: &[&str]) -> Option<PathBuf> {
    candidates.iter().find_map(|name| which::which(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_exec_captures_output() {
        let output = ProcessBuilder::new("sh")
            .args(["-c", "echo \"$GREETING\""])
            .env("GREETING", "hello")
            .exec()
            .unwrap();

        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[test]
    #[cfg(unix)]
    fn test_exec_and_check_reports_failure() {
        let err = ProcessBuilder::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .exec_and_check()
            .unwrap_err();

        match &err {
            ProcessError::Failed { code, stderr, .. } => {
                assert_eq!(*code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("exited with code 3"));
    }

    #[test]
    fn test_spawn_failure() {
        let err = ProcessBuilder::new("/nonexistent/slipway-cc").exec().unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
        assert_eq!(err.to_string(), "failed to spawn `/nonexistent/slipway-cc`");
    }

    #[test]
    fn test_display_command_quotes_when_needed() {
        let cmd = ProcessBuilder::new("cc").args(["-c", "my file.c", "-DNAME=\"x\"", ""]);
        assert_eq!(
            cmd.display_command(),
            r#"cc -c 'my file.c' '-DNAME="x"' ''"#
        );
    }

    #[test]
    fn test_env_replaces() {
        let cmd = ProcessBuilder::new("pkg-config")
            .env("PKG_CONFIG_PATH", "/a")
            .env("PKG_CONFIG_PATH", "/b");
        assert_eq!(cmd.env, vec![("PKG_CONFIG_PATH".to_string(), OsString::from("/b"))]);
    }
}

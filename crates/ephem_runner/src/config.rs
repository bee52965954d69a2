//! Command configuration types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Description of a single external command invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to execute (looked up on PATH)
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Working directory for the child process
    pub workdir: Option<PathBuf>,
    /// Extra environment variables for the child process
    pub env: BTreeMap<String, String>,
    /// Whether to echo output while the command runs
    pub stream_output: bool,
    /// Timeout in seconds (None = wait forever)
    pub timeout_seconds: Option<u64>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            env: BTreeMap::new(),
            stream_output: false,
            timeout_seconds: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Echo stdout/stderr lines as they arrive.
    pub fn stream(mut self) -> Self {
        self.stream_output = true;
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// The first argument, usually the subcommand (`init`, `clone`, ...).
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Format the command line for logging.
    pub fn display(&self) -> String {
        let mut cmd = self.program.clone();
        for arg in &self.args {
            if arg.contains(' ') || arg.contains('=') {
                cmd.push_str(&format!(" '{}'", arg));
            } else {
                cmd.push_str(&format!(" {}", arg));
            }
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let spec = CommandSpec::new("terraform")
            .args(["plan", "-input=false"])
            .workdir("/tmp/module")
            .env("TF_IN_AUTOMATION", "1")
            .stream()
            .timeout(60);

        assert_eq!(spec.program, "terraform");
        assert_eq!(spec.subcommand(), Some("plan"));
        assert_eq!(spec.env.get("TF_IN_AUTOMATION").map(String::as_str), Some("1"));
        assert!(spec.stream_output);
        assert_eq!(spec.timeout_seconds, Some(60));
    }

    #[test]
    fn test_display_quotes_args() {
        let spec = CommandSpec::new("git").args(["commit", "-m", "two words", "a=b"]);
        assert_eq!(spec.display(), "git commit -m 'two words' 'a=b'");
    }
}

//! External tool invocation

use async_trait::async_trait;
use std::fmt;
use std::path::Path;

use crate::error::ExperimentError;

/// A program plus arguments, run without a shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Build from an argv, e.g. an ssh prefix plus a remote command
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Runs external tools (merge utility, scp, ntpdate, scheme wrappers)
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion; a non-zero exit is an error
    async fn run(&self, command: &ToolCommand) -> Result<(), ExperimentError>;

    /// Run to completion and return stdout; a non-zero exit is an error
    async fn output(&self, command: &ToolCommand) -> Result<String, ExperimentError>;
}

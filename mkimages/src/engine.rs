use std::path::Path;

use image_reference::{Host, ImageReference};

use crate::process::CommandLine;

pub const DEFAULT_PROGRAM: &str = "docker";

/// The command line interface of a local container engine. Only describes invocations, see
/// [`crate::backend::Backend::run`] for running them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    program: String,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl Engine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> CommandLine {
        CommandLine::new(&self.program)
    }

    /// Builds the Dockerfile in `context_dir` and tags the result as `reference`.
    pub fn build(&self, reference: &ImageReference, context_dir: &Path) -> CommandLine {
        self.command()
            .args(["build", "-t"])
            .arg(reference.to_string())
            .arg(context_dir.to_string_lossy())
            .current_dir(context_dir)
    }

    pub fn tag(&self, source: &ImageReference, destination: &ImageReference) -> CommandLine {
        self.command()
            .arg("tag")
            .arg(source.to_string())
            .arg(destination.to_string())
    }

    pub fn push(&self, reference: &ImageReference) -> CommandLine {
        self.command().arg("push").arg(reference.to_string())
    }

    pub fn remove(&self, reference: &ImageReference) -> CommandLine {
        self.command().arg("rmi").arg(reference.to_string())
    }

    pub fn login(&self, host: &Host, username: &str, password: &str) -> CommandLine {
        self.command()
            .arg("login")
            .arg(host.to_string())
            .args(["-u", username, "-p"])
            .secret_arg(password)
    }
}

mod composite;
mod print;
mod system;

use std::{io::Write, path::Path};

pub use composite::*;
pub use print::*;
pub use system::*;

use crate::{process::CommandLine, Result};

/// The side effects a run needs. Everything above this trait only describes what should happen; the implementations
/// decide whether it actually does.
pub trait Backend {
    /// Creates `path` and any missing parents.
    fn create_dir(&self, path: &Path) -> Result<()>;

    /// Writes `content` to `path`, replacing the file if it exists.
    fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Runs `command` to completion. A non-zero exit status is an error.
    fn run(&self, command: &CommandLine) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only print what would happen.
    DryRun,
    /// Perform every action.
    Execute,
    /// Print every action, then perform it.
    PrintAndExecute,
}

impl Mode {
    pub fn from_flags(dry_run: bool, verbose: bool) -> Self {
        match (dry_run, verbose) {
            (true, _) => Mode::DryRun,
            (false, false) => Mode::Execute,
            (false, true) => Mode::PrintAndExecute,
        }
    }

    pub fn executes(&self) -> bool {
        !matches!(self, Mode::DryRun)
    }

    pub fn backend<'a>(&self, out: &'a mut dyn Write) -> Box<dyn Backend + 'a> {
        match self {
            Mode::DryRun => Box::new(PrintBackend::new(out)),
            Mode::Execute => Box::new(SystemBackend),
            Mode::PrintAndExecute => {
                let backends: Vec<Box<dyn Backend + 'a>> =
                    vec![Box::new(PrintBackend::new(out)), Box::new(SystemBackend)];
                Box::new(CompositeBackend::new(backends))
            }
        }
    }
}

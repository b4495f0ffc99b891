use std::{fs, path::Path};

use super::Backend;
use crate::{
    process::{self, CommandLine},
    Result,
};

/// Performs every action on the local system.
pub struct SystemBackend;

impl Backend for SystemBackend {
    fn create_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .map_err(|error| format!("failed to create directory {path:?}: {error}"))?;
        Ok(())
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, content).map_err(|error| format!("failed to write {path:?}: {error}"))?;
        Ok(())
    }

    fn run(&self, command: &CommandLine) -> Result<()> {
        process::Command::from(command).status()?;
        Ok(())
    }
}

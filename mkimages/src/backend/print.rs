use std::{cell::RefCell, io::Write, path::Path};

use super::Backend;
use crate::{
    process::{shell_quote, CommandLine},
    Result,
};

/// Prints every action as a shell command instead of performing it. The output of a dry run can be replayed with
/// `sh`.
pub struct PrintBackend<'a> {
    out: RefCell<&'a mut dyn Write>,
}

impl<'a> PrintBackend<'a> {
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }
}

fn display_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

/// Returns a heredoc delimiter that no line of `content` equals.
fn heredoc_delimiter(content: &str) -> String {
    let mut delimiter = "EOF".to_owned();
    while content.lines().any(|line| line == delimiter) {
        delimiter.push('_');
    }
    delimiter
}

impl Backend for PrintBackend<'_> {
    fn create_dir(&self, path: &Path) -> Result<()> {
        writeln!(self.out.borrow_mut(), "mkdir -p {}", display_path(path))?;
        Ok(())
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let delimiter = heredoc_delimiter(content);
        let mut out = self.out.borrow_mut();
        writeln!(out, "cat > {} <<'{delimiter}'", display_path(path))?;
        out.write_all(content.as_bytes())?;
        if !content.is_empty() && !content.ends_with('\n') {
            writeln!(out)?;
        }
        writeln!(out, "{delimiter}")?;
        Ok(())
    }

    fn run(&self, command: &CommandLine) -> Result<()> {
        let mut out = self.out.borrow_mut();
        match command.get_current_dir() {
            Some(dir) => writeln!(out, "(cd {} && {command})", display_path(dir))?,
            None => writeln!(out, "{command}")?,
        }
        Ok(())
    }
}

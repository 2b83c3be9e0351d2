//! Plain-text transcript log, enabled with `--log` or `/log`.

use crate::core::conversation::Entry;
use crate::core::message::Role;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub struct LoggingState {
    file_path: Option<String>,
    is_active: bool,
}

impl LoggingState {
    /// A path given up front starts logging immediately.
    pub fn new(log_file: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut logging = LoggingState {
            file_path: None,
            is_active: false,
        };
        if let Some(path) = log_file {
            logging.set_log_file(path)?;
        }
        Ok(logging)
    }

    pub fn set_log_file(&mut self, path: String) -> Result<String, Box<dyn std::error::Error>> {
        Self::test_file_access(&path)?;

        self.file_path = Some(path.clone());
        self.is_active = true;
        self.log_marker(&format!(
            "Logging started {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ))?;

        Ok(format!("Logging enabled to: {path}"))
    }

    pub fn toggle_logging(&mut self) -> Result<String, Box<dyn std::error::Error>> {
        match &self.file_path {
            Some(path) => {
                if self.is_active {
                    self.log_marker("Logging paused")?;
                    self.is_active = false;
                    Ok(format!("Logging paused (file: {path})"))
                } else {
                    self.is_active = true;
                    Ok(format!("Logging resumed to: {path}"))
                }
            }
            None => {
                Err("No log file specified. Use /log <filename> to enable logging first.".into())
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn log_user(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.log_message(&format!("You: {content}"))
    }

    pub fn log_assistant(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.log_message(content)
    }

    fn log_marker(&self, text: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.log_message(&format!("## {text}"))
    }

    fn log_message(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = self.file_path.as_deref().filter(|_| self.is_active) else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;

        writer.flush()?;
        Ok(())
    }

    /// Replace the log with the current transcript. Used after a refine or
    /// retry so the replaced answer does not linger in the file.
    pub fn rewrite_from_entries(&self, entries: &[Entry]) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = self.file_path.as_deref().filter(|_| self.is_active) else {
            return Ok(());
        };

        let target_path = Path::new(file_path);
        let parent = target_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(parent)?;

        for entry in entries {
            let Entry::Turn(turn) = entry else {
                continue;
            };
            let block = match turn.role {
                Role::User => format!("You: {}", turn.content),
                Role::Assistant if !turn.content.is_empty() => turn.content.clone(),
                _ => continue,
            };
            for line in block.lines() {
                writeln!(temp_file, "{line}")?;
            }
            writeln!(temp_file)?;
        }

        temp_file.flush()?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(file_path)?;

        Ok(())
    }

    pub fn get_status_string(&self) -> String {
        let name = |path: &str| {
            Path::new(path)
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned()
        };
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", name(path)),
            (Some(path), false) => format!("paused ({})", name(path)),
        }
    }

    fn test_file_access(path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.flush()?;
        Ok(())
    }
}

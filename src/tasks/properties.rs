//! Property file task: writes `key=value` entries to a file when run.

use crate::exec::implementation::{ExecutionFailure, HostContext, Implementation};
use crate::replay::target::{downcast_child, parse_flag, ReplayRejection, ReplayTarget};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct PropertyEntry {
    key: Option<String>,
    value: Option<String>,
}

impl ReplayTarget for PropertyEntry {
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), ReplayRejection> {
        match name {
            "key" => self.key = Some(value.to_string()),
            "value" => self.value = Some(value.to_string()),
            _ => return Err(ReplayRejection::UnknownAttribute(name.to_string())),
        }
        Ok(())
    }

    fn create_child(&mut self, name: &str) -> Result<Box<dyn ReplayTarget>, ReplayRejection> {
        Err(ReplayRejection::UnknownElement(name.to_string()))
    }

    fn accept_child(
        &mut self,
        name: &str,
        _child: Box<dyn ReplayTarget>,
    ) -> Result<(), ReplayRejection> {
        Err(ReplayRejection::UnknownElement(name.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct PropertyFileTask {
    file: Option<PathBuf>,
    comment: Option<String>,
    append: bool,
    entries: Vec<(String, String)>,
}

impl PropertyFileTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// File contents in `.properties` syntax
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(comment) = &self.comment {
            for line in comment.lines() {
                let _ = writeln!(out, "# {}", line);
            }
        }
        for (key, value) in &self.entries {
            let _ = writeln!(out, "{}={}", escape(key, true), escape(value, false));
        }
        out
    }
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}

impl ReplayTarget for PropertyFileTask {
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), ReplayRejection> {
        match name {
            "file" => self.file = Some(PathBuf::from(value)),
            "comment" => self.comment = Some(value.to_string()),
            "append" => self.append = parse_flag(name, value)?,
            _ => return Err(ReplayRejection::UnknownAttribute(name.to_string())),
        }
        Ok(())
    }

    fn create_child(&mut self, name: &str) -> Result<Box<dyn ReplayTarget>, ReplayRejection> {
        match name {
            "entry" => Ok(Box::new(PropertyEntry::default())),
            _ => Err(ReplayRejection::UnknownElement(name.to_string())),
        }
    }

    fn accept_child(
        &mut self,
        name: &str,
        child: Box<dyn ReplayTarget>,
    ) -> Result<(), ReplayRejection> {
        let entry = downcast_child::<PropertyEntry>(name, child)?;
        let key = entry.key.ok_or_else(|| ReplayRejection::InvalidValue {
            name: "key".to_string(),
            value: String::new(),
            reason: "entry requires a key".to_string(),
        })?;
        self.entries.push((key, entry.value.unwrap_or_default()));
        Ok(())
    }
}

impl Implementation for PropertyFileTask {
    fn run(&mut self, host: &HostContext<'_>) -> Result<(), ExecutionFailure> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| ExecutionFailure::new("file attribute is required"))?;

        OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.append)
            .truncate(!self.append)
            .open(file)
            .and_then(|mut out| out.write_all(self.render().as_bytes()))
            .map_err(|e| {
                ExecutionFailure::new(format!("Failed to write {}: {}", file.display(), e))
            })?;
        host.emit(format!(
            "Wrote {} entr{} to {}",
            self.entries.len(),
            if self.entries.len() == 1 { "y" } else { "ies" },
            file.display()
        ));
        Ok(())
    }
}

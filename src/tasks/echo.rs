use crate::exec::implementation::{ExecutionFailure, HostContext, Implementation};
use crate::replay::target::{downcast_child, ReplayRejection, ReplayTarget};
/// Echo task
/// Generation 1 knows a single `message` attribute. Generation 2 adds a
/// `level` attribute and nested `line` elements, so a generation 2
/// configuration only replays onto an isolated generation 2 instance.
use log::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    V1,
    V2,
}

/// Nested `<line text="..."/>`
#[derive(Debug, Default)]
pub struct EchoLine {
    text: Option<String>,
}

impl ReplayTarget for EchoLine {
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), ReplayRejection> {
        match name {
            "text" => {
                self.text = Some(value.to_string());
                Ok(())
            }
            _ => Err(ReplayRejection::UnknownAttribute(name.to_string())),
        }
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

#[derive(Debug)]
pub struct EchoTask {
    generation: Generation,
    message: Option<String>,
    level: Level,
    lines: Vec<String>,
}

impl EchoTask {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            message: None,
            level: Level::Info,
            lines: Vec::new(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    fn parse_level(value: &str) -> Result<Level, ReplayRejection> {
        match value.to_ascii_lowercase().as_str() {
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "verbose" | "debug" => Ok(Level::Debug),
            _ => Err(ReplayRejection::InvalidValue {
                name: "level".to_string(),
                value: value.to_string(),
                reason: "expected error, warning, info or debug".to_string(),
            }),
        }
    }
}

impl ReplayTarget for EchoTask {
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), ReplayRejection> {
        match (name, self.generation) {
            ("message", _) => self.message = Some(value.to_string()),
            ("level", Generation::V2) => self.level = Self::parse_level(value)?,
            _ => return Err(ReplayRejection::UnknownAttribute(name.to_string())),
        }
        Ok(())
    }

    fn create_child(&mut self, name: &str) -> Result<Box<dyn ReplayTarget>, ReplayRejection> {
        match (name, self.generation) {
            ("line", Generation::V2) => Ok(Box::new(EchoLine::default())),
            _ => Err(ReplayRejection::UnknownElement(name.to_string())),
        }
    }

    fn accept_child(
        &mut self,
        name: &str,
        child: Box<dyn ReplayTarget>,
    ) -> Result<(), ReplayRejection> {
        let line = downcast_child::<EchoLine>(name, child)?;
        self.lines.push(line.text.unwrap_or_default());
        Ok(())
    }
}

impl Implementation for EchoTask {
    fn run(&mut self, host: &HostContext<'_>) -> Result<(), ExecutionFailure> {
        let output = self
            .message
            .iter()
            .chain(self.lines.iter())
            .cloned()
            .collect::<Vec<_>>();

        if output.is_empty() {
            host.emit(String::new());
        }
        for line in output {
            log::log!(self.level, "[echo] {}", line);
            host.emit(line);
        }
        Ok(())
    }
}

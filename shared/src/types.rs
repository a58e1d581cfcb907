//! Service labels and output stream tags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{SharedError, SharedResult};

/// ANSI foreground color used to tell services apart in merged output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelColor {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl LabelColor {
    /// Colors handed out to services in start order
    pub const ROTATION: [LabelColor; 4] = [
        LabelColor::Yellow,
        LabelColor::Blue,
        LabelColor::Magenta,
        LabelColor::Cyan,
    ];

    pub fn ansi_code(self) -> u8 {
        match self {
            LabelColor::Red => 31,
            LabelColor::Green => 32,
            LabelColor::Yellow => 33,
            LabelColor::Blue => 34,
            LabelColor::Magenta => 35,
            LabelColor::Cyan => 36,
            LabelColor::White => 37,
        }
    }

    /// Pick a color for the n-th service of a session
    pub fn for_index(index: usize) -> Self {
        Self::ROTATION[index % Self::ROTATION.len()]
    }
}

impl Default for LabelColor {
    fn default() -> Self {
        LabelColor::White
    }
}

impl FromStr for LabelColor {
    type Err = SharedError;

    fn from_str(s: &str) -> SharedResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Ok(LabelColor::Red),
            "green" => Ok(LabelColor::Green),
            "yellow" => Ok(LabelColor::Yellow),
            "blue" => Ok(LabelColor::Blue),
            "magenta" => Ok(LabelColor::Magenta),
            "cyan" => Ok(LabelColor::Cyan),
            "white" => Ok(LabelColor::White),
            _ => Err(SharedError::InvalidConfig {
                field: "color".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Which pipe a captured line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    /// Single-letter tag shown in prefixed output
    pub fn tag(self) -> &'static str {
        match self {
            OutputStream::Stdout => "o",
            OutputStream::Stderr => "e",
        }
    }

    fn tag_color(self) -> u8 {
        match self {
            OutputStream::Stdout => LabelColor::Green.ansi_code(),
            OutputStream::Stderr => LabelColor::Red.ansi_code(),
        }
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Name and color a service is known by in logs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceLabel {
    name: String,
    color: LabelColor,
}

impl ServiceLabel {
    /// Labels must be non-empty and free of whitespace so they read cleanly
    /// inside a `[name]` prefix and double as temp-file name components.
    pub fn new(name: impl Into<String>, color: LabelColor) -> SharedResult<Self> {
        let name = name.into();
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control() || c == '/') {
            return Err(SharedError::InvalidLabel { input: name });
        }
        Ok(Self { name, color })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> LabelColor {
        self.color
    }

    /// Prefix for one captured line, e.g. `[o][store] ` with ANSI colors
    pub fn prefix(&self, stream: OutputStream) -> String {
        format!(
            "\x1b[{}m[{}]\x1b[{}m[{}]\x1b[0m ",
            stream.tag_color(),
            stream.tag(),
            self.color.ansi_code(),
            self.name
        )
    }
}

impl fmt::Display for ServiceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

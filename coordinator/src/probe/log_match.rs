//! Log line probe: ready once the service has printed a pattern

use async_trait::async_trait;
use regex::Regex;
use std::fmt;

use super::{ProbeKind, ProbeTarget, ProbeTiming};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::output::OutputBuffer;
use crate::traits::Probe;

#[derive(Debug, Clone)]
pub enum LogPattern {
    Literal(String),
    Regex(Regex),
}

impl LogPattern {
    pub fn literal(text: impl Into<String>) -> Self {
        LogPattern::Literal(text.into())
    }

    pub fn regex(pattern: &str) -> CoordinatorResult<Self> {
        Regex::new(pattern)
            .map(LogPattern::Regex)
            .map_err(|e| CoordinatorError::spec(format!("invalid log pattern '{pattern}': {e}")))
    }

    pub fn matches(&self, output: &OutputBuffer) -> bool {
        match self {
            LogPattern::Literal(text) => output.contains(text),
            LogPattern::Regex(regex) => output.is_match(regex),
        }
    }
}

impl fmt::Display for LogPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogPattern::Literal(text) => write!(f, "{text:?}"),
            LogPattern::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogMatchProbe {
    pattern: LogPattern,
    timing: ProbeTiming,
}

impl LogMatchProbe {
    pub fn new(pattern: LogPattern) -> Self {
        Self {
            pattern,
            timing: ProbeTiming::log_line(),
        }
    }

    /// Shorthand for a literal substring
    pub fn literal(text: impl Into<String>) -> Self {
        Self::new(LogPattern::literal(text))
    }

    pub fn with_timing(mut self, timing: ProbeTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn pattern(&self) -> &LogPattern {
        &self.pattern
    }
}

#[async_trait]
impl Probe for LogMatchProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::LogMatch
    }

    fn timing(&self) -> ProbeTiming {
        self.timing
    }

    async fn attempt(&self, target: &ProbeTarget) -> Result<(), String> {
        let output = target.output();
        if self.pattern.matches(output) {
            Ok(())
        } else {
            Err(format!("{} not found in {} bytes of output", self.pattern, output.len()))
        }
    }
}

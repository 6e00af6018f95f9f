//! Report parsers
//!
//! Provides:
//! - The `CoverageParser` contract shared by every report format
//! - OpenCover, Cobertura, NUnit, xUnit and JUnit adapters
//! - Helpers for required attributes and tolerant number parsing

mod cobertura;
mod junit;
mod nunit;
mod opencover;
mod xunit;

pub use cobertura::*;
pub use junit::*;
pub use nunit::*;
pub use opencover::*;
pub use xunit::*;

use log::debug;
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::error::{CoverageError, Result};
use crate::events::{Element, EventStream};
use crate::metric::Metric;
use crate::node::Node;
use crate::value::{parse_count, Value};
use crate::warnings::Warnings;

/// Name used for the root module and for unnamed packages
pub const EMPTY: &str = "-";

/// Event stream type handed to adapters
pub type Events<'a> = EventStream<&'a mut dyn BufRead>;

/// How element-local problems such as missing attributes are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMode {
    /// Abort the whole report
    #[default]
    FailFast,
    /// Log a warning and skip the element
    IgnoreErrors,
}

impl FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail-fast" => Ok(ProcessingMode::FailFast),
            "ignore-errors" => Ok(ProcessingMode::IgnoreErrors),
            _ => Err(format!(
                "Unknown processing mode: {}. Supported: fail-fast, ignore-errors",
                s
            )),
        }
    }
}

/// Settings shared by all adapters
#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
    pub mode: ProcessingMode,
    /// Prefixes removed from report paths to make them project-relative
    pub strip_prefixes: Vec<String>,
}

impl ParserOptions {
    pub fn new(mode: ProcessingMode) -> Self {
        Self {
            mode,
            strip_prefixes: Vec::new(),
        }
    }

    pub fn with_strip_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.strip_prefixes = prefixes;
        self
    }

    /// Escalates `error` or records it as a warning, depending on the mode.
    /// Only element-local errors can be recovered.
    pub fn handle_local_error(&self, error: CoverageError, warnings: &mut Warnings) -> Result<()> {
        if self.mode == ProcessingMode::FailFast || !error.is_element_local() {
            return Err(error);
        }
        warnings.log_error(format!("Skipping element: {}", error));
        Ok(())
    }
}

/// Turns one report's event stream into a module-rooted tree
pub trait CoverageParser: Send + Sync {
    /// Adapter-specific mapping from events to nodes
    fn parse_report(&self, events: &mut Events<'_>, warnings: &mut Warnings) -> Result<Node>;

    fn parse(&self, reader: &mut dyn BufRead, warnings: &mut Warnings) -> Result<Node> {
        let mut events = EventStream::new(reader);
        let root = self.parse_report(&mut events, warnings)?;
        if !root.has_children() {
            return Err(CoverageError::NoCoverageData);
        }
        debug!(
            "{}: parsed {} top-level node(s) with {} warning(s)",
            warnings.title(),
            root.children().len(),
            warnings.messages().len() + warnings.skipped()
        );
        Ok(root)
    }

    fn parse_str(&self, content: &str, warnings: &mut Warnings) -> Result<Node> {
        let mut bytes = content.as_bytes();
        self.parse(&mut bytes, warnings)
    }

    fn parse_file(&self, path: &Path, warnings: &mut Warnings) -> Result<Node> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        self.parse(&mut reader, warnings)
    }
}

/// Supported report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserKind {
    OpenCover,
    Cobertura,
    Nunit,
    Xunit,
    Junit,
}

impl ParserKind {
    pub const ALL: [ParserKind; 5] = [
        ParserKind::OpenCover,
        ParserKind::Cobertura,
        ParserKind::Nunit,
        ParserKind::Xunit,
        ParserKind::Junit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ParserKind::OpenCover => "opencover",
            ParserKind::Cobertura => "cobertura",
            ParserKind::Nunit => "nunit",
            ParserKind::Xunit => "xunit",
            ParserKind::Junit => "junit",
        }
    }

    pub fn create(&self, options: ParserOptions) -> Box<dyn CoverageParser> {
        match self {
            ParserKind::OpenCover => Box::new(OpenCoverParser::new(options)),
            ParserKind::Cobertura => Box::new(CoberturaParser::new(options)),
            ParserKind::Nunit => Box::new(NunitParser::new(options)),
            ParserKind::Xunit => Box::new(XunitParser::new(options)),
            ParserKind::Junit => Box::new(JunitParser::new(options)),
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParserKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        ParserKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == lower)
            .ok_or_else(|| {
                format!(
                    "Unknown report format: {}. Supported: opencover, cobertura, nunit, xunit, junit",
                    s
                )
            })
    }
}

/// Reads an optional count attribute; bad numbers are logged and become 0
pub(crate) fn read_count(element: &Element, attribute: &str, warnings: &mut Warnings) -> u64 {
    match element.attribute(attribute) {
        Some(text) => parse_number(element.name(), text, warnings),
        None => 0,
    }
}

/// Parses a count, tolerating float input; never fails
pub(crate) fn parse_number(element: &str, text: &str, warnings: &mut Warnings) -> u64 {
    parse_count(text).unwrap_or_else(|| {
        let error = CoverageError::InvalidNumber {
            element: element.to_string(),
            value: text.to_string(),
        };
        warnings.log_error(error.to_string());
        0
    })
}

/// Coverage of a structural level: one covered or one missed item
pub(crate) fn structural(metric: Metric, covered: bool) -> Result<Value> {
    if covered {
        Value::coverage(metric, 1, 0)
    } else {
        Value::coverage(metric, 0, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_kind_from_str() {
        assert_eq!("OpenCover".parse::<ParserKind>().unwrap(), ParserKind::OpenCover);
        assert_eq!("junit".parse::<ParserKind>().unwrap(), ParserKind::Junit);
        assert_eq!("xUnit".parse::<ParserKind>().unwrap(), ParserKind::Xunit);
        assert!("lcov".parse::<ParserKind>().is_err());
        for kind in ParserKind::ALL {
            assert_eq!(kind.to_string().parse::<ParserKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_processing_mode_from_str() {
        assert_eq!(
            "ignore-errors".parse::<ProcessingMode>().unwrap(),
            ProcessingMode::IgnoreErrors
        );
        assert_eq!(ProcessingMode::default(), ProcessingMode::FailFast);
        assert!("strict".parse::<ProcessingMode>().is_err());
    }

    #[test]
    fn test_parse_number_is_tolerant() {
        let mut warnings = Warnings::new("test");
        assert_eq!(parse_number("Method", "3.2", &mut warnings), 3);
        assert_eq!(parse_number("Method", "7", &mut warnings), 7);
        assert!(!warnings.has_errors());

        assert_eq!(parse_number("Method", "abc", &mut warnings), 0);
        assert!(warnings.messages()[0].contains("Invalid number 'abc'"));
    }

    #[test]
    fn test_read_count_missing_attribute_is_zero() {
        let mut warnings = Warnings::new("test");
        let element = Element::new("line", &[("hits", "4")]);
        assert_eq!(read_count(&element, "hits", &mut warnings), 4);
        assert_eq!(read_count(&element, "number", &mut warnings), 0);
        assert!(!warnings.has_errors());
    }

    #[test]
    fn test_local_errors_follow_mode() {
        let mut warnings = Warnings::new("test");
        let strict = ParserOptions::new(ProcessingMode::FailFast);
        let lenient = ParserOptions::new(ProcessingMode::IgnoreErrors);

        let missing = || CoverageError::missing_attribute("Class", "FullName");
        assert!(strict.handle_local_error(missing(), &mut warnings).is_err());
        assert!(lenient.handle_local_error(missing(), &mut warnings).is_ok());
        assert!(warnings.has_errors());

        assert!(lenient
            .handle_local_error(CoverageError::NoCoverageData, &mut warnings)
            .is_err());
    }

    #[test]
    fn test_created_parsers_reject_empty_input() {
        for kind in ParserKind::ALL {
            let parser = kind.create(ParserOptions::default());
            let mut warnings = Warnings::new("empty.xml");
            let error = parser.parse_str("<empty/>", &mut warnings).unwrap_err();
            assert!(matches!(error, CoverageError::NoCoverageData), "{}", kind);
        }
    }
}

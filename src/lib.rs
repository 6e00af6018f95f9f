//! covtree - coverage and test-result normalization
//!
//! A library for turning coverage and test-result reports into one model:
//! - A closed catalog of metrics and a value algebra (coverage, fraction, counts)
//! - A tree of module, package, file, class and method nodes with aggregation and merge
//! - Streaming parsers for OpenCover, Cobertura, NUnit, xUnit and JUnit XML
//! - Parallel parsing of many reports with a merged result

pub mod batch;
pub mod config;
pub mod error;
pub mod events;
pub mod intern;
pub mod metric;
pub mod node;
pub mod parser;
pub mod paths;
pub mod value;
pub mod warnings;

pub use batch::{merge_reports, ParallelParser, ParsedReport, ReportJob};
pub use error::{CoverageError, Result};
pub use metric::{Metric, ValueKind};
pub use node::{Node, NodeKind, TestCase, TestResult};
pub use parser::{CoverageParser, ParserKind, ParserOptions, ProcessingMode};
pub use value::{Coverage, FractionValue, Value};
pub use warnings::Warnings;

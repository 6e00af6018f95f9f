//! Metric catalog
//!
//! The closed set of measurable quantities a node can carry. The declaration
//! order is the canonical order: structural levels first (by tree depth),
//! then the measured quantities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::node::NodeKind;

/// Kind of measurable quantity attached to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Metric {
    Container,
    Module,
    Package,
    File,
    Class,
    Method,
    Line,
    Instruction,
    Branch,
    Mutation,
    Complexity,
    ComplexityDensity,
    Loc,
    Tests,
}

/// Which value variant a metric is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Coverage,
    Fraction,
    Complexity,
    LinesOfCode,
    TestCount,
}

impl Metric {
    pub const ALL: [Metric; 14] = [
        Metric::Container,
        Metric::Module,
        Metric::Package,
        Metric::File,
        Metric::Class,
        Metric::Method,
        Metric::Line,
        Metric::Instruction,
        Metric::Branch,
        Metric::Mutation,
        Metric::Complexity,
        Metric::ComplexityDensity,
        Metric::Loc,
        Metric::Tests,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Container => "CONTAINER",
            Metric::Module => "MODULE",
            Metric::Package => "PACKAGE",
            Metric::File => "FILE",
            Metric::Class => "CLASS",
            Metric::Method => "METHOD",
            Metric::Line => "LINE",
            Metric::Instruction => "INSTRUCTION",
            Metric::Branch => "BRANCH",
            Metric::Mutation => "MUTATION",
            Metric::Complexity => "COMPLEXITY",
            Metric::ComplexityDensity => "COMPLEXITY_DENSITY",
            Metric::Loc => "LOC",
            Metric::Tests => "TESTS",
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL.iter().copied().find(|m| m.name() == name)
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            Metric::ComplexityDensity => ValueKind::Fraction,
            Metric::Complexity => ValueKind::Complexity,
            Metric::Loc => ValueKind::LinesOfCode,
            Metric::Tests => ValueKind::TestCount,
            _ => ValueKind::Coverage,
        }
    }

    /// Structural metrics describe a tree level rather than a measurement
    pub fn is_structural(&self) -> bool {
        self.node_kind().is_some() || *self == Metric::Container
    }

    /// The tree level this metric describes, if it is structural
    pub fn node_kind(&self) -> Option<NodeKind> {
        match self {
            Metric::Module => Some(NodeKind::Module),
            Metric::Package => Some(NodeKind::Package),
            Metric::File => Some(NodeKind::File),
            Metric::Class => Some(NodeKind::Class),
            Metric::Method => Some(NodeKind::Method),
            _ => None,
        }
    }
}

impl From<NodeKind> for Metric {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Module => Metric::Module,
            NodeKind::Package => Metric::Package,
            NodeKind::File => Metric::File,
            NodeKind::Class => Metric::Class,
            NodeKind::Method => Metric::Method,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::from_name(s).ok_or_else(|| format!("Unknown metric: {}", s))
    }
}

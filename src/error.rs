//! Error types shared by the value algebra, the node tree and the parsers

use thiserror::Error;

use crate::metric::Metric;
use crate::node::NodeKind;

/// Everything that can go wrong while building or combining coverage trees
#[derive(Debug, Error)]
pub enum CoverageError {
    /// The character stream is not well-formed XML
    #[error("Malformed report: {0}")]
    MalformedStream(String),

    /// A required attribute (or identifying child element) is absent
    #[error("Could not obtain attribute '{attribute}' from element '{element}'")]
    MissingAttribute { element: String, attribute: String },

    /// A numeric field could not be parsed; parsers recover with zero
    #[error("Invalid number '{value}' in element '{element}', using 0")]
    InvalidNumber { element: String, value: String },

    /// The report contained no module markers or no class/file content
    #[error("No coverage information found in the specified file.")]
    NoCoverageData,

    /// Two values of different metrics were combined
    #[error("Cannot combine values of metric {left} and {right}")]
    MetricMismatch { left: Metric, right: Metric },

    /// Text could not be converted into a value
    #[error("Cannot convert '{0}' to a valid Value instance.")]
    InvalidFormat(String),

    /// A count or a sum of counts does not fit in 64 bits
    #[error("Value of metric {0} exceeds the supported range")]
    Overflow(Metric),

    /// No value for the requested metric in a collection
    #[error("No value for metric {0}")]
    NotFound(Metric),

    /// Two nodes with different kinds or names were merged
    #[error("Cannot merge {left_kind:?} '{left_name}' with {right_kind:?} '{right_name}'")]
    NodeMismatch {
        left_kind: NodeKind,
        left_name: String,
        right_kind: NodeKind,
        right_name: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoverageError {
    pub fn missing_attribute(element: &str, attribute: &str) -> Self {
        CoverageError::MissingAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
        }
    }

    /// Whether the error is local to one element and may be skipped
    pub fn is_element_local(&self) -> bool {
        matches!(self, CoverageError::MissingAttribute { .. })
    }
}

impl From<quick_xml::Error> for CoverageError {
    fn from(error: quick_xml::Error) -> Self {
        CoverageError::MalformedStream(error.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for CoverageError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        CoverageError::MalformedStream(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoverageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_attribute_message() {
        let error = CoverageError::missing_attribute("Class", "FullName");
        assert_eq!(
            error.to_string(),
            "Could not obtain attribute 'FullName' from element 'Class'"
        );
        assert!(error.is_element_local());
        assert!(!CoverageError::NoCoverageData.is_element_local());
    }
}

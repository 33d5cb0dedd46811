/// Error type shared by parsing, derivation and flattening
use thiserror::Error;

use crate::mesh::AttributeKind;

/// Mesh error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("Malformed input on line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("Line {line} references {kind} index {index} but only {len} are defined")]
    IndexOutOfRange {
        line: usize,
        kind: AttributeKind,
        index: u32,
        len: usize,
    },
    #[error("Unsupported face on line {line}: {arity} vertices")]
    UnsupportedTopology { line: usize, arity: usize },
    #[error("{operation} requires {kind} data")]
    MissingPrerequisite {
        operation: &'static str,
        kind: AttributeKind,
    },
    #[error("Face table for {kind} is inconsistent: {reason}")]
    InconsistentFaces { kind: AttributeKind, reason: String },
    #[error("{kind} index {index} does not fit in a 16-bit index buffer")]
    IndexOverflow { kind: AttributeKind, index: u32 },
}

pub type MeshResult<T> = Result<T, MeshError>;

impl MeshError {
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_attribute() {
        let err = MeshError::MissingPrerequisite {
            operation: "tangent derivation",
            kind: AttributeKind::TexCoords,
        };
        assert_eq!(err.to_string(), "tangent derivation requires texCoords data");

        let err = MeshError::IndexOutOfRange {
            line: 7,
            kind: AttributeKind::Positions,
            index: 9,
            len: 8,
        };
        assert_eq!(
            err.to_string(),
            "Line 7 references positions index 9 but only 8 are defined"
        );
    }
}

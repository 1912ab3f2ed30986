use crate::parse::onnx::AttributeKind;

/// Why an ONNX model could not be imported.
///
/// Every variant is fatal: the import stops at the first error and whatever
/// the graph handler built so far must be discarded.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Node op-type outside the supported operator table
    #[error("unsupported operator \"{op_type}\"")]
    UnsupportedOperator { op_type: String },

    /// A requested attribute carries a tag other than INT, INTS, FLOAT, STRING or TENSOR
    #[error("{op_type}: attribute \"{attribute}\" has unsupported kind {kind}")]
    UnsupportedAttributeKind {
        op_type: String,
        attribute: String,
        kind: AttributeKind,
    },

    /// A resolved attribute was read as a different kind than its default
    #[error("{op_type}: attribute \"{attribute}\" expected {expected}, found {found}")]
    AttributeTypeMismatch {
        op_type: String,
        attribute: String,
        expected: AttributeKind,
        found: AttributeKind,
    },

    /// Attribute read without being requested from the resolver
    #[error("{op_type}: attribute \"{attribute}\" was not resolved")]
    MissingAttribute { op_type: String, attribute: String },

    /// Supported operator with attribute values the graph cannot express
    #[error("{op_type}: {reason}")]
    UnsupportedConfiguration { op_type: String, reason: String },

    /// Input name not defined by a graph input, initializer or earlier node
    #[error("{op_type}: input \"{name}\" is not defined before use")]
    UnresolvedInput { op_type: String, name: String },

    #[error("{op_type}: expected {expected} {what}, found {found}")]
    ArityMismatch {
        op_type: String,
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("tensor \"{name}\" is defined more than once")]
    DuplicateTensor { name: String },

    #[error("tensor \"{name}\": unsupported element type {elem_type}")]
    UnsupportedDataType { name: String, elem_type: i32 },

    /// The graph handler rejected a construction call
    #[error("{op_type}: graph construction failed: {source}")]
    Graph {
        op_type: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

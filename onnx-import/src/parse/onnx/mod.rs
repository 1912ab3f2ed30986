//! In-memory ONNX model, as delivered by a protobuf decoder.
//!
//! Only the fields the importer reads are carried. Shapes are concrete:
//! symbolic dimensions must be resolved before import.

use std::fmt;

pub mod attributes;
pub mod lowering;
pub mod registry;

pub use attributes::{resolve, AttrValue, Attributes, BatchNormAttrs, FlattenAttrs};
pub use lowering::{from_onnx, to_graph, ImportedGraph, Operator};
pub use registry::TensorRegistry;

/// `TensorProto.DataType` tags.
pub mod elem_type {
    pub const FLOAT: i32 = 1;
    pub const UINT8: i32 = 2;
    pub const INT8: i32 = 3;
    pub const UINT16: i32 = 4;
    pub const INT16: i32 = 5;
    pub const INT32: i32 = 6;
    pub const INT64: i32 = 7;
    pub const STRING: i32 = 8;
    pub const BOOL: i32 = 9;
    pub const FLOAT16: i32 = 10;
    pub const DOUBLE: i32 = 11;
    pub const UINT32: i32 = 12;
    pub const UINT64: i32 = 13;
    pub const BFLOAT16: i32 = 16;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub ir_version: i64,
    pub producer_name: String,
    pub producer_version: String,
    pub opset_import: Vec<OperatorSetId>,
    pub graph: GraphDef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorSetId {
    /// Empty for the default `ai.onnx` domain
    pub domain: String,
    pub version: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphDef {
    pub name: String,
    pub input: Vec<ValueInfo>,
    pub output: Vec<ValueInfo>,
    /// Topologically sorted
    pub node: Vec<Node>,
    pub initializer: Vec<TensorLiteral>,
}

/// A named, typed graph input or output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueInfo {
    pub name: String,
    pub elem_type: i32,
    pub shape: Vec<usize>,
}

impl ValueInfo {
    pub fn new(name: impl Into<String>, elem_type: i32, shape: &[usize]) -> Self {
        Self {
            name: name.into(),
            elem_type,
            shape: shape.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub name: Option<String>,
    pub op_type: String,
    pub input: Vec<String>,
    pub output: Vec<String>,
    pub attribute: Vec<Attribute>,
}

impl Node {
    pub fn new(op_type: &str, input: &[&str], output: &[&str]) -> Self {
        Self {
            name: None,
            op_type: op_type.to_string(),
            input: input.iter().map(|s| s.to_string()).collect(),
            output: output.iter().map(|s| s.to_string()).collect(),
            attribute: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attribute(mut self, attr: Attribute) -> Self {
        self.attribute.push(attr);
        self
    }

    /// Node name if set, otherwise its first output; used in log lines.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or_else(|| self.output.first().map(String::as_str))
            .unwrap_or("<anonymous>")
    }
}

/// A constant tensor: an initializer or a TENSOR attribute payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorLiteral {
    pub name: String,
    pub data_type: i32,
    pub dims: Vec<usize>,
    pub raw_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn int(name: &str, v: i64) -> Self {
        Self::new(name, AttributeValue::Int(v))
    }

    pub fn ints(name: &str, v: &[i64]) -> Self {
        Self::new(name, AttributeValue::Ints(v.to_vec()))
    }

    pub fn float(name: &str, v: f32) -> Self {
        Self::new(name, AttributeValue::Float(v))
    }

    pub fn string(name: &str, v: &str) -> Self {
        Self::new(name, AttributeValue::String(v.as_bytes().to_vec()))
    }

    pub fn tensor(name: &str, v: TensorLiteral) -> Self {
        Self::new(name, AttributeValue::Tensor(v))
    }
}

/// Attribute payload, tagged by `AttributeProto.type`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Undefined,
    Float(f32),
    Int(i64),
    String(Vec<u8>),
    Tensor(TensorLiteral),
    Graph(Box<GraphDef>),
    Floats(Vec<f32>),
    Ints(Vec<i64>),
    Strings(Vec<Vec<u8>>),
    Tensors(Vec<TensorLiteral>),
    Graphs(Vec<GraphDef>),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Undefined => AttributeKind::Undefined,
            AttributeValue::Float(_) => AttributeKind::Float,
            AttributeValue::Int(_) => AttributeKind::Int,
            AttributeValue::String(_) => AttributeKind::String,
            AttributeValue::Tensor(_) => AttributeKind::Tensor,
            AttributeValue::Graph(_) => AttributeKind::Graph,
            AttributeValue::Floats(_) => AttributeKind::Floats,
            AttributeValue::Ints(_) => AttributeKind::Ints,
            AttributeValue::Strings(_) => AttributeKind::Strings,
            AttributeValue::Tensors(_) => AttributeKind::Tensors,
            AttributeValue::Graphs(_) => AttributeKind::Graphs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Undefined,
    Float,
    Int,
    String,
    Tensor,
    Graph,
    Floats,
    Ints,
    Strings,
    Tensors,
    Graphs,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeKind::Undefined => "UNDEFINED",
            AttributeKind::Float => "FLOAT",
            AttributeKind::Int => "INT",
            AttributeKind::String => "STRING",
            AttributeKind::Tensor => "TENSOR",
            AttributeKind::Graph => "GRAPH",
            AttributeKind::Floats => "FLOATS",
            AttributeKind::Ints => "INTS",
            AttributeKind::Strings => "STRINGS",
            AttributeKind::Tensors => "TENSORS",
            AttributeKind::Graphs => "GRAPHS",
        };
        f.write_str(name)
    }
}

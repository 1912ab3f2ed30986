//! ONNX model importer: builds a computational graph from a parsed ONNX model.
//!
//! [`from_onnx`] drives any [`GraphHandler`]; [`to_graph`] imports into the
//! bundled in-memory [`Graph`].

pub mod error;
pub mod ir;
pub mod parse;

pub use error::ImportError;
pub use ir::{DType, Graph, GraphError, GraphHandler, GraphOp, TensorId};
pub use parse::onnx::{from_onnx, to_graph, ImportedGraph, Model, TensorRegistry};

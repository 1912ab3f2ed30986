pub mod graph;
pub mod handler;
pub mod ops;

pub use graph::{DType, Graph, GraphError, Tensor, TensorId};
pub use handler::GraphHandler;
pub use ops::{ActType, BatchNormParams, BinaryOp, GraphOp, UnaryOp};

//! Operator set of the in-memory graph.
//! each variant is one construction call on the graph handler
//!

use crate::ir::graph::TensorId;

#[derive(Debug, Clone, PartialEq)]
pub enum GraphOp {
    /// Matrix product with optional transposes, bias and fused activation
    MatMul {
        a: TensorId,
        b: TensorId,
        bias: Option<TensorId>,
        output: TensorId,
        trans_a: bool,
        trans_b: bool,
        act: ActType,
    },

    /// Batch normalization over the channel axis (axis 1)
    BatchNorm {
        input: TensorId,
        mean: TensorId,
        var: TensorId,
        scale: TensorId,
        bias: TensorId,
        output: TensorId,
        params: BatchNormParams,
    },

    /// Elementwise binary op with multidirectional broadcasting
    Binary {
        op: BinaryOp,
        a: TensorId,
        b: TensorId,
        output: TensorId,
    },

    /// Shape-preserving unary op
    Unary {
        op: UnaryOp,
        input: TensorId,
        output: TensorId,
    },

    /// Flatten to 2D starting at axis 1
    Flatten { input: TensorId, output: TensorId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActType {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchNormParams {
    pub momentum: f32,
    pub eps: f32,
    pub training: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
    Abs,
    Identity,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "Add",
            BinaryOp::Sub => "Sub",
            BinaryOp::Mul => "Mul",
            BinaryOp::Div => "Div",
            BinaryOp::Pow => "Pow",
        }
    }
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Relu => "Relu",
            UnaryOp::Sigmoid => "Sigmoid",
            UnaryOp::Tanh => "Tanh",
            UnaryOp::Softmax => "Softmax",
            UnaryOp::Abs => "Abs",
            UnaryOp::Identity => "Identity",
        }
    }
}

impl GraphOp {
    pub fn name(&self) -> &'static str {
        match self {
            GraphOp::MatMul { .. } => "MatMul",
            GraphOp::BatchNorm { .. } => "BatchNorm",
            GraphOp::Binary { op, .. } => op.name(),
            GraphOp::Unary { op, .. } => op.name(),
            GraphOp::Flatten { .. } => "Flatten",
        }
    }

    pub fn inputs(&self) -> Vec<TensorId> {
        match self {
            GraphOp::MatMul { a, b, bias, .. } => {
                let mut v = vec![*a, *b];
                // bias is optional
                if let Some(bias) = bias {
                    v.push(*bias);
                }
                v
            }
            GraphOp::BatchNorm {
                input,
                mean,
                var,
                scale,
                bias,
                ..
            } => vec![*input, *mean, *var, *scale, *bias],
            GraphOp::Binary { a, b, .. } => vec![*a, *b],
            GraphOp::Unary { input, .. } | GraphOp::Flatten { input, .. } => vec![*input],
        }
    }

    pub fn output(&self) -> TensorId {
        match self {
            GraphOp::MatMul { output, .. }
            | GraphOp::BatchNorm { output, .. }
            | GraphOp::Binary { output, .. }
            | GraphOp::Unary { output, .. }
            | GraphOp::Flatten { output, .. } => *output,
        }
    }
}

//! Graph construction interface consumed by the importer.

use std::fmt::Debug;
use std::hash::Hash;

use crate::ir::graph::DType;
use crate::ir::ops::{ActType, BinaryOp, UnaryOp};

/// An execution engine that owns tensors and builds a computational graph.
///
/// Every construction call takes an optional `output` handle. `Some` asks the
/// engine to write into that existing tensor, `None` asks it to allocate a
/// fresh one. The returned handle is the tensor the node writes.
pub trait GraphHandler {
    /// Opaque tensor handle. Identity, not value, names a tensor.
    type Tensor: Copy + Eq + Hash + Debug;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Declare a tensor with a known shape and element type.
    fn declare_tensor(&mut self, shape: &[usize], dtype: DType) -> Self::Tensor;

    #[allow(clippy::too_many_arguments)]
    fn matmul(
        &mut self,
        a: Self::Tensor,
        b: Self::Tensor,
        output: Option<Self::Tensor>,
        trans_a: bool,
        trans_b: bool,
        bias: Option<Self::Tensor>,
        act: ActType,
    ) -> Result<Self::Tensor, Self::Error>;

    #[allow(clippy::too_many_arguments)]
    fn batch_norm(
        &mut self,
        input: Self::Tensor,
        output: Option<Self::Tensor>,
        mean: Self::Tensor,
        var: Self::Tensor,
        scale: Self::Tensor,
        bias: Self::Tensor,
        momentum: f32,
        eps: f32,
        training: bool,
    ) -> Result<Self::Tensor, Self::Error>;

    fn binary(
        &mut self,
        op: BinaryOp,
        a: Self::Tensor,
        b: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error>;

    fn unary(
        &mut self,
        op: UnaryOp,
        input: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error>;

    /// Flatten to `[d0, d1 * .. * dn]`.
    fn flatten(
        &mut self,
        input: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error>;

    fn add(
        &mut self,
        a: Self::Tensor,
        b: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error> {
        self.binary(BinaryOp::Add, a, b, output)
    }

    fn sub(
        &mut self,
        a: Self::Tensor,
        b: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error> {
        self.binary(BinaryOp::Sub, a, b, output)
    }

    fn mul(
        &mut self,
        a: Self::Tensor,
        b: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error> {
        self.binary(BinaryOp::Mul, a, b, output)
    }

    fn div(
        &mut self,
        a: Self::Tensor,
        b: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error> {
        self.binary(BinaryOp::Div, a, b, output)
    }

    fn pow(
        &mut self,
        a: Self::Tensor,
        b: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error> {
        self.binary(BinaryOp::Pow, a, b, output)
    }

    fn relu(
        &mut self,
        input: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error> {
        self.unary(UnaryOp::Relu, input, output)
    }

    fn sigmoid(
        &mut self,
        input: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error> {
        self.unary(UnaryOp::Sigmoid, input, output)
    }

    fn tanh(
        &mut self,
        input: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error> {
        self.unary(UnaryOp::Tanh, input, output)
    }

    fn softmax(
        &mut self,
        input: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error> {
        self.unary(UnaryOp::Softmax, input, output)
    }

    fn abs(
        &mut self,
        input: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error> {
        self.unary(UnaryOp::Abs, input, output)
    }

    fn identity(
        &mut self,
        input: Self::Tensor,
        output: Option<Self::Tensor>,
    ) -> Result<Self::Tensor, Self::Error> {
        self.unary(UnaryOp::Identity, input, output)
    }
}

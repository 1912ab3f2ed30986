//! Core graph types and the in-memory graph handler.

use crate::ir::handler::GraphHandler;
use crate::ir::ops::{ActType, BatchNormParams, BinaryOp, GraphOp, UnaryOp};

pub type TensorId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor {
    pub id: TensorId,
    pub shape: Vec<usize>,
    pub dtype: DType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F32,
    F16,
    BF16,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("tensor {0} does not exist")]
    UnknownTensor(TensorId),
    #[error("{op}: expected rank >= {min}, got shape {shape:?}")]
    Rank {
        op: &'static str,
        min: usize,
        shape: Vec<usize>,
    },
    #[error("{op}: shapes {lhs:?} and {rhs:?} are incompatible")]
    Incompatible {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },
    #[error("{op}: element types {lhs:?} and {rhs:?} differ")]
    DTypeMismatch {
        op: &'static str,
        lhs: DType,
        rhs: DType,
    },
    #[error("{op}: output tensor {id} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        op: &'static str,
        id: TensorId,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

#[derive(Debug)]
pub struct Graph<Op> {
    pub tensors: Vec<Tensor>,
    pub ops: Vec<Op>,
}

impl<Op> Graph<Op> {
    pub fn tensor(&self, id: TensorId) -> &Tensor {
        &self.tensors[id]
    }

    pub fn new() -> Self {
        Self {
            tensors: Vec::new(),
            ops: Vec::new(),
        }
    }

    pub fn add_tensor(&mut self, shape: Vec<usize>, dtype: DType) -> TensorId {
        let id = self.tensors.len();
        self.tensors.push(Tensor { id, shape, dtype });
        id
    }

    fn get(&self, id: TensorId) -> Result<&Tensor, GraphError> {
        self.tensors.get(id).ok_or(GraphError::UnknownTensor(id))
    }
}

impl<Op> Default for Graph<Op> {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph<GraphOp> {
    /// The op that writes `id`, if any.
    pub fn producer(&self, id: TensorId) -> Option<&GraphOp> {
        self.ops.iter().find(|op| op.output() == id)
    }

    /// All ops that read `id`, in insertion order.
    pub fn consumers(&self, id: TensorId) -> Vec<&GraphOp> {
        self.ops
            .iter()
            .filter(|op| op.inputs().contains(&id))
            .collect()
    }

    /// Use the caller's output tensor if given, otherwise allocate a fresh one.
    ///
    /// A given output must already have the inferred shape and dtype.
    fn bind_output(
        &mut self,
        op: &'static str,
        output: Option<TensorId>,
        shape: Vec<usize>,
        dtype: DType,
    ) -> Result<TensorId, GraphError> {
        match output {
            Some(id) => {
                let existing = self.get(id)?;
                if existing.shape != shape {
                    return Err(GraphError::ShapeMismatch {
                        op,
                        id,
                        expected: shape,
                        found: existing.shape.clone(),
                    });
                }
                if existing.dtype != dtype {
                    return Err(GraphError::DTypeMismatch {
                        op,
                        lhs: dtype,
                        rhs: existing.dtype,
                    });
                }
                Ok(id)
            }
            None => Ok(self.add_tensor(shape, dtype)),
        }
    }
}

impl GraphHandler for Graph<GraphOp> {
    type Tensor = TensorId;
    type Error = GraphError;

    fn declare_tensor(&mut self, shape: &[usize], dtype: DType) -> TensorId {
        self.add_tensor(shape.to_vec(), dtype)
    }

    fn matmul(
        &mut self,
        a: TensorId,
        b: TensorId,
        output: Option<TensorId>,
        trans_a: bool,
        trans_b: bool,
        bias: Option<TensorId>,
        act: ActType,
    ) -> Result<TensorId, GraphError> {
        let ta = self.get(a)?;
        let tb = self.get(b)?;
        let dtype = ta.dtype;
        let shape = matmul_shape(&ta.shape, &tb.shape, trans_a, trans_b)?;

        if let Some(bias) = bias {
            let bias_shape = &self.get(bias)?.shape;
            if broadcast_shapes(&shape, bias_shape).as_ref() != Some(&shape) {
                return Err(GraphError::Incompatible {
                    op: "MatMul",
                    lhs: shape,
                    rhs: bias_shape.clone(),
                });
            }
        }

        let output = self.bind_output("MatMul", output, shape, dtype)?;
        self.ops.push(GraphOp::MatMul {
            a,
            b,
            bias,
            output,
            trans_a,
            trans_b,
            act,
        });
        Ok(output)
    }

    fn batch_norm(
        &mut self,
        input: TensorId,
        output: Option<TensorId>,
        mean: TensorId,
        var: TensorId,
        scale: TensorId,
        bias: TensorId,
        momentum: f32,
        eps: f32,
        training: bool,
    ) -> Result<TensorId, GraphError> {
        let x = self.get(input)?;
        if x.shape.len() < 2 {
            return Err(GraphError::Rank {
                op: "BatchNorm",
                min: 2,
                shape: x.shape.clone(),
            });
        }
        let shape = x.shape.clone();
        let dtype = x.dtype;

        // Per-channel parameters are 1D of length C (axis 1 of the input)
        let channels = [shape[1]];
        for param in [mean, var, scale, bias] {
            let p = self.get(param)?;
            if p.shape != channels {
                return Err(GraphError::Incompatible {
                    op: "BatchNorm",
                    lhs: shape,
                    rhs: p.shape.clone(),
                });
            }
        }

        let output = self.bind_output("BatchNorm", output, shape, dtype)?;
        self.ops.push(GraphOp::BatchNorm {
            input,
            mean,
            var,
            scale,
            bias,
            output,
            params: BatchNormParams {
                momentum,
                eps,
                training,
            },
        });
        Ok(output)
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        a: TensorId,
        b: TensorId,
        output: Option<TensorId>,
    ) -> Result<TensorId, GraphError> {
        let ta = self.get(a)?;
        let tb = self.get(b)?;
        // Pow allows a different exponent type
        if op != BinaryOp::Pow && ta.dtype != tb.dtype {
            return Err(GraphError::DTypeMismatch {
                op: op.name(),
                lhs: ta.dtype,
                rhs: tb.dtype,
            });
        }
        let dtype = ta.dtype;
        let shape =
            broadcast_shapes(&ta.shape, &tb.shape).ok_or_else(|| GraphError::Incompatible {
                op: op.name(),
                lhs: ta.shape.clone(),
                rhs: tb.shape.clone(),
            })?;

        let output = self.bind_output(op.name(), output, shape, dtype)?;
        self.ops.push(GraphOp::Binary { op, a, b, output });
        Ok(output)
    }

    fn unary(
        &mut self,
        op: UnaryOp,
        input: TensorId,
        output: Option<TensorId>,
    ) -> Result<TensorId, GraphError> {
        let x = self.get(input)?;
        let (shape, dtype) = (x.shape.clone(), x.dtype);

        let output = self.bind_output(op.name(), output, shape, dtype)?;
        self.ops.push(GraphOp::Unary { op, input, output });
        Ok(output)
    }

    fn flatten(
        &mut self,
        input: TensorId,
        output: Option<TensorId>,
    ) -> Result<TensorId, GraphError> {
        let x = self.get(input)?;
        let dtype = x.dtype;
        let shape = flatten_shape(&x.shape).ok_or_else(|| GraphError::Rank {
            op: "Flatten",
            min: 1,
            shape: x.shape.clone(),
        })?;

        let output = self.bind_output("Flatten", output, shape, dtype)?;
        self.ops.push(GraphOp::Flatten { input, output });
        Ok(output)
    }
}

/// Multidirectional (numpy-style) broadcast of two shapes.
///
/// Shapes are right-aligned; each dimension pair must be equal or contain a 1.
fn broadcast_shapes(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let rank = a.len().max(b.len());
    let pad = |s: &[usize]| -> Vec<usize> {
        std::iter::repeat(1)
            .take(rank - s.len())
            .chain(s.iter().copied())
            .collect()
    };

    pad(a)
        .into_iter()
        .zip(pad(b))
        .map(|(x, y)| match (x, y) {
            _ if x == y => Some(x),
            (1, y) => Some(y),
            (x, 1) => Some(x),
            _ => None,
        })
        .collect()
}

/// Output shape of `op(A) x op(B)` over the last two axes, broadcasting
/// the leading (batch) axes.
fn matmul_shape(
    a: &[usize],
    b: &[usize],
    trans_a: bool,
    trans_b: bool,
) -> Result<Vec<usize>, GraphError> {
    for s in [a, b] {
        if s.len() < 2 {
            return Err(GraphError::Rank {
                op: "MatMul",
                min: 2,
                shape: s.to_vec(),
            });
        }
    }
    let incompatible = || GraphError::Incompatible {
        op: "MatMul",
        lhs: a.to_vec(),
        rhs: b.to_vec(),
    };

    let (batch_a, mat_a) = a.split_at(a.len() - 2);
    let (batch_b, mat_b) = b.split_at(b.len() - 2);
    let (m, k) = if trans_a {
        (mat_a[1], mat_a[0])
    } else {
        (mat_a[0], mat_a[1])
    };
    let (k_b, n) = if trans_b {
        (mat_b[1], mat_b[0])
    } else {
        (mat_b[0], mat_b[1])
    };
    if k != k_b {
        return Err(incompatible());
    }

    let mut shape = broadcast_shapes(batch_a, batch_b).ok_or_else(incompatible)?;
    shape.extend([m, n]);
    Ok(shape)
}

/// `[d0, d1, .., dn]` -> `[d0, d1 * .. * dn]`
fn flatten_shape(shape: &[usize]) -> Option<Vec<usize>> {
    let (&outer, rest) = shape.split_first()?;
    Some(vec![outer, rest.iter().product()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(shapes: &[&[usize]]) -> (Graph<GraphOp>, Vec<TensorId>) {
        let mut graph: Graph<GraphOp> = Graph::new();
        let ids = shapes
            .iter()
            .map(|s| graph.declare_tensor(s, DType::F32))
            .collect();
        (graph, ids)
    }

    #[test]
    fn broadcast_right_aligns() {
        assert_eq!(broadcast_shapes(&[2, 3, 4], &[4]), Some(vec![2, 3, 4]));
        assert_eq!(broadcast_shapes(&[2, 1, 4], &[3, 1]), Some(vec![2, 3, 4]));
        assert_eq!(broadcast_shapes(&[], &[5]), Some(vec![5]));
        assert_eq!(broadcast_shapes(&[2, 3], &[3, 2]), None);
    }

    #[test]
    fn matmul_shape_with_transposes() {
        assert_eq!(matmul_shape(&[2, 3], &[3, 4], false, false), Ok(vec![2, 4]));
        assert_eq!(matmul_shape(&[3, 2], &[3, 4], true, false), Ok(vec![2, 4]));
        assert_eq!(matmul_shape(&[2, 3], &[4, 3], false, true), Ok(vec![2, 4]));
        // batch dims broadcast
        assert_eq!(
            matmul_shape(&[5, 1, 2, 3], &[4, 3, 6], false, false),
            Ok(vec![5, 4, 2, 6])
        );
    }

    #[test]
    fn matmul_rejects_inner_dim_mismatch() {
        let err = matmul_shape(&[2, 3], &[4, 5], false, false).unwrap_err();
        assert!(matches!(err, GraphError::Incompatible { op: "MatMul", .. }));

        let err = matmul_shape(&[3], &[3, 4], false, false).unwrap_err();
        assert!(matches!(err, GraphError::Rank { min: 2, .. }));
    }

    #[test]
    fn flatten_from_axis_1() {
        assert_eq!(flatten_shape(&[2, 3, 4, 5]), Some(vec![2, 60]));
        assert_eq!(flatten_shape(&[7]), Some(vec![7, 1]));
        assert_eq!(flatten_shape(&[]), None);
    }

    #[test]
    fn fresh_output_is_allocated() {
        let (mut graph, ids) = graph_with(&[&[2, 2], &[2, 2]]);
        let y = graph.add(ids[0], ids[1], None).unwrap();
        assert_eq!(y, 2);
        assert_eq!(graph.tensor(y).shape, vec![2, 2]);
        assert_eq!(graph.ops.len(), 1);
    }

    #[test]
    fn existing_output_is_written_in_place() {
        let (mut graph, ids) = graph_with(&[&[2, 2], &[2, 2], &[2, 2]]);
        let y = graph.relu(ids[0], Some(ids[2])).unwrap();
        assert_eq!(y, ids[2]);
        assert_eq!(graph.tensors.len(), 3);
    }

    #[test]
    fn existing_output_shape_must_match() {
        let (mut graph, ids) = graph_with(&[&[2, 3], &[3, 4], &[2, 2]]);
        let err = graph
            .matmul(
                ids[0],
                ids[1],
                Some(ids[2]),
                false,
                false,
                None,
                ActType::Linear,
            )
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::ShapeMismatch {
                op: "MatMul",
                id: ids[2],
                expected: vec![2, 4],
                found: vec![2, 2],
            }
        );
        assert!(graph.ops.is_empty());
    }

    #[test]
    fn existing_output_dtype_must_match() {
        let mut graph: Graph<GraphOp> = Graph::new();
        let x = graph.declare_tensor(&[2, 2], DType::F32);
        let y = graph.declare_tensor(&[2, 2], DType::I64);
        let err = graph.relu(x, Some(y)).unwrap_err();
        assert_eq!(
            err,
            GraphError::DTypeMismatch {
                op: "Relu",
                lhs: DType::F32,
                rhs: DType::I64,
            }
        );
        assert!(graph.ops.is_empty());
    }

    #[test]
    fn batch_norm_checks_channel_params() {
        let (mut graph, ids) = graph_with(&[&[1, 3, 4, 4], &[3], &[3], &[3], &[4]]);
        let err = graph
            .batch_norm(
                ids[0],
                None,
                ids[1],
                ids[2],
                ids[3],
                ids[4],
                0.9,
                1e-5,
                false,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::Incompatible {
                op: "BatchNorm",
                ..
            }
        ));
    }

    #[test]
    fn binary_rejects_mixed_dtypes() {
        let mut graph: Graph<GraphOp> = Graph::new();
        let a = graph.declare_tensor(&[2], DType::F32);
        let b = graph.declare_tensor(&[2], DType::I64);
        let err = graph.sub(a, b, None).unwrap_err();
        assert!(matches!(err, GraphError::DTypeMismatch { op: "Sub", .. }));
        // exponent may differ
        assert!(graph.pow(a, b, None).is_ok());
    }

    #[test]
    fn producer_and_consumers() {
        let (mut graph, ids) = graph_with(&[&[2, 2], &[2, 2]]);
        let sum = graph.add(ids[0], ids[1], None).unwrap();
        let y = graph.relu(sum, None).unwrap();

        assert!(graph.producer(ids[0]).is_none());
        assert_eq!(graph.producer(sum).map(GraphOp::name), Some("Add"));
        let consumers = graph.consumers(sum);
        assert_eq!(consumers.len(), 1);
        assert_eq!(consumers[0].output(), y);
    }
}

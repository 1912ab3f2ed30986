//! ONNX to graph lowering pass.
//!
//! Declares graph inputs, initializers and outputs, then lowers every node in
//! file order into exactly one graph handler call. Outputs are declared before
//! any node runs so the node producing one writes into the declared tensor
//! instead of allocating a new one.

use std::collections::HashSet;

use super::attributes::{BatchNormAttrs, FlattenAttrs};
use super::registry::TensorRegistry;
use super::{elem_type, Model, Node};
use crate::error::ImportError;
use crate::ir::graph::{DType, Graph, TensorId};
use crate::ir::handler::GraphHandler;
use crate::ir::ops::{ActType, BinaryOp, GraphOp, UnaryOp};

/// A model imported into the in-memory graph, paired with its name registry.
#[derive(Debug)]
pub struct ImportedGraph {
    pub graph: Graph<GraphOp>,
    pub tensors: TensorRegistry<TensorId>,
}

/// Import an ONNX model into a fresh in-memory graph.
pub fn to_graph(model: &Model) -> Result<ImportedGraph, ImportError> {
    let mut graph: Graph<GraphOp> = Graph::new();
    let tensors = from_onnx(model, &mut graph)?;
    Ok(ImportedGraph { graph, tensors })
}

/// Build `model` on `handler`.
///
/// Returns the name -> tensor registry. On error the handler may hold a
/// partially built graph, which the caller must discard.
pub fn from_onnx<H: GraphHandler>(
    model: &Model,
    handler: &mut H,
) -> Result<TensorRegistry<H::Tensor>, ImportError> {
    let graph = &model.graph;
    let opsets: Vec<String> = model
        .opset_import
        .iter()
        .map(|o| {
            let domain = if o.domain.is_empty() {
                "ai.onnx"
            } else {
                o.domain.as_str()
            };
            format!("{domain}:{}", o.version)
        })
        .collect();
    log::info!(
        "importing graph \"{}\" (ir_version {}, producer \"{} {}\", opsets [{}])",
        graph.name,
        model.ir_version,
        model.producer_name,
        model.producer_version,
        opsets.join(", ")
    );

    let mut tensors = TensorRegistry::new();

    for input in &graph.input {
        declare(
            handler,
            &mut tensors,
            &input.name,
            input.elem_type,
            &input.shape,
        )?;
    }

    // Older exporters also list initializers as graph inputs
    let input_names: HashSet<&str> = graph.input.iter().map(|i| i.name.as_str()).collect();
    for init in &graph.initializer {
        if input_names.contains(init.name.as_str()) {
            continue;
        }
        declare(
            handler,
            &mut tensors,
            &init.name,
            init.data_type,
            &init.dims,
        )?;
    }

    for output in &graph.output {
        if tensors.contains(&output.name) {
            log::debug!("output \"{}\" already declared, reusing", output.name);
            continue;
        }
        declare(
            handler,
            &mut tensors,
            &output.name,
            output.elem_type,
            &output.shape,
        )?;
    }

    for node in &graph.node {
        lower_node(handler, &mut tensors, node)?;
    }

    log::info!(
        "imported {} nodes, {} named tensors",
        graph.node.len(),
        tensors.len()
    );
    Ok(tensors)
}

/// Supported ONNX operators, each carrying its validated arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
    MatMul,
    BatchNormalization(BatchNormAttrs),
    Binary(BinaryOp),
    Unary(UnaryOp),
    Flatten(FlattenAttrs),
}

impl Operator {
    /// Classify a node by op-type and parse the attributes it needs.
    pub fn from_node(node: &Node) -> Result<Self, ImportError> {
        let op = match node.op_type.as_str() {
            "MatMul" => Operator::MatMul,
            "BatchNormalization" => Operator::BatchNormalization(BatchNormAttrs::from_node(node)?),
            "Add" => Operator::Binary(BinaryOp::Add),
            "Sub" => Operator::Binary(BinaryOp::Sub),
            "Mul" => Operator::Binary(BinaryOp::Mul),
            "Div" => Operator::Binary(BinaryOp::Div),
            "Pow" => Operator::Binary(BinaryOp::Pow),
            "Relu" => Operator::Unary(UnaryOp::Relu),
            "Sigmoid" => Operator::Unary(UnaryOp::Sigmoid),
            "Tanh" => Operator::Unary(UnaryOp::Tanh),
            "Softmax" => Operator::Unary(UnaryOp::Softmax),
            "Abs" => Operator::Unary(UnaryOp::Abs),
            "Identity" => Operator::Unary(UnaryOp::Identity),
            "Flatten" => Operator::Flatten(FlattenAttrs::from_node(node)?),
            other => {
                return Err(ImportError::UnsupportedOperator {
                    op_type: other.to_string(),
                });
            }
        };
        Ok(op)
    }

    /// Number of node inputs the operator consumes.
    pub fn num_inputs(&self) -> usize {
        match self {
            Operator::MatMul | Operator::Binary(_) => 2,
            Operator::BatchNormalization(_) => 5,
            Operator::Unary(_) | Operator::Flatten(_) => 1,
        }
    }
}

/// Declare a graph input, initializer or output on the handler.
fn declare<H: GraphHandler>(
    handler: &mut H,
    tensors: &mut TensorRegistry<H::Tensor>,
    name: &str,
    elem_type: i32,
    shape: &[usize],
) -> Result<(), ImportError> {
    if tensors.contains(name) {
        return Err(ImportError::DuplicateTensor {
            name: name.to_string(),
        });
    }
    let dtype = convert_dtype(name, elem_type)?;
    let tensor = handler.declare_tensor(shape, dtype);
    log::debug!("declared \"{name}\" {shape:?} {dtype:?} -> {tensor:?}");
    tensors.declare(name, tensor)
}

/// Lower one node into a single handler call and record its output.
fn lower_node<H: GraphHandler>(
    handler: &mut H,
    tensors: &mut TensorRegistry<H::Tensor>,
    node: &Node,
) -> Result<(), ImportError> {
    let op_type = node.op_type.as_str();
    let op = Operator::from_node(node)?;

    if node.input.len() != op.num_inputs() {
        return Err(ImportError::ArityMismatch {
            op_type: op_type.to_string(),
            what: "inputs",
            expected: op.num_inputs(),
            found: node.input.len(),
        });
    }
    let output_name = node
        .output
        .first()
        .ok_or_else(|| ImportError::ArityMismatch {
            op_type: op_type.to_string(),
            what: "outputs",
            expected: 1,
            found: 0,
        })?;
    if node.output.len() > 1 {
        log::warn!(
            "{op_type} \"{}\": only the first output is imported, ignoring {:?}",
            node.label(),
            &node.output[1..]
        );
    }
    tensors.check_unproduced(output_name)?;

    let inputs = node
        .input
        .iter()
        .map(|name| tensors.resolve(op_type, name))
        .collect::<Result<Vec<_>, _>>()?;
    // Pre-declared graph outputs are written in place
    let output = tensors.get(output_name);

    log::debug!(
        "lowering {op_type} \"{}\": {:?} -> \"{output_name}\" ({})",
        node.label(),
        node.input,
        if output.is_some() {
            "existing"
        } else {
            "fresh"
        }
    );

    let result = match op {
        Operator::MatMul => handler.matmul(
            inputs[0],
            inputs[1],
            output,
            false,
            false,
            None,
            ActType::Linear,
        ),
        Operator::BatchNormalization(attrs) => {
            // ONNX order is (X, scale, B, mean, var)
            let (input, scale, bias, mean, var) =
                (inputs[0], inputs[1], inputs[2], inputs[3], inputs[4]);
            handler.batch_norm(
                input,
                output,
                mean,
                var,
                scale,
                bias,
                attrs.momentum,
                attrs.epsilon,
                attrs.training(),
            )
        }
        Operator::Binary(BinaryOp::Add) => handler.add(inputs[0], inputs[1], output),
        Operator::Binary(BinaryOp::Sub) => handler.sub(inputs[0], inputs[1], output),
        Operator::Binary(BinaryOp::Mul) => handler.mul(inputs[0], inputs[1], output),
        Operator::Binary(BinaryOp::Div) => handler.div(inputs[0], inputs[1], output),
        Operator::Binary(BinaryOp::Pow) => handler.pow(inputs[0], inputs[1], output),
        Operator::Unary(UnaryOp::Relu) => handler.relu(inputs[0], output),
        Operator::Unary(UnaryOp::Sigmoid) => handler.sigmoid(inputs[0], output),
        Operator::Unary(UnaryOp::Tanh) => handler.tanh(inputs[0], output),
        Operator::Unary(UnaryOp::Softmax) => handler.softmax(inputs[0], output),
        Operator::Unary(UnaryOp::Abs) => handler.abs(inputs[0], output),
        Operator::Unary(UnaryOp::Identity) => handler.identity(inputs[0], output),
        Operator::Flatten(_) => handler.flatten(inputs[0], output),
    }
    .map_err(|e| ImportError::Graph {
        op_type: op_type.to_string(),
        source: Box::new(e),
    })?;

    tensors.produce(output_name, result);
    Ok(())
}

/// Convert an ONNX element type tag to our DType
fn convert_dtype(name: &str, tag: i32) -> Result<DType, ImportError> {
    let dtype = match tag {
        elem_type::FLOAT => DType::F32,
        elem_type::FLOAT16 => DType::F16,
        elem_type::BFLOAT16 => DType::BF16,
        elem_type::DOUBLE => DType::F64,
        elem_type::INT8 => DType::I8,
        elem_type::INT16 => DType::I16,
        elem_type::INT32 => DType::I32,
        elem_type::INT64 => DType::I64,
        elem_type::UINT8 => DType::U8,
        elem_type::UINT16 => DType::U16,
        elem_type::UINT32 => DType::U32,
        elem_type::UINT64 => DType::U64,
        elem_type::BOOL => DType::Bool,
        other => {
            return Err(ImportError::UnsupportedDataType {
                name: name.to_string(),
                elem_type: other,
            });
        }
    };
    Ok(dtype)
}

//! Node attribute resolution.
//!
//! [`resolve`] pulls a fixed set of attribute names out of a node, falling
//! back to caller defaults. The typed structs below build on it, one per
//! operator that reads attributes.

use super::{AttributeKind, AttributeValue, Node, TensorLiteral};
use crate::error::ImportError;

/// A resolved attribute value, borrowing its payload from the node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttrValue<'a> {
    Int(i64),
    Ints(&'a [i64]),
    Float(f32),
    String(&'a [u8]),
    Tensor(&'a TensorLiteral),
}

impl AttrValue<'_> {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttrValue::Int(_) => AttributeKind::Int,
            AttrValue::Ints(_) => AttributeKind::Ints,
            AttrValue::Float(_) => AttributeKind::Float,
            AttrValue::String(_) => AttributeKind::String,
            AttrValue::Tensor(_) => AttributeKind::Tensor,
        }
    }
}

/// Requested attributes of one node, each either node-supplied or defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes<'a> {
    op_type: &'a str,
    values: Vec<(&'a str, AttrValue<'a>)>,
}

/// Resolve the attributes named in `defaults` against `node`.
///
/// Every requested name is present in the result. Node attributes that were
/// not requested are ignored; a requested one whose tag is outside
/// INT/INTS/FLOAT/STRING/TENSOR is an error.
pub fn resolve<'a>(
    node: &'a Node,
    defaults: &[(&'a str, AttrValue<'a>)],
) -> Result<Attributes<'a>, ImportError> {
    let mut values = defaults.to_vec();

    for attr in &node.attribute {
        if let Some(slot) = values.iter_mut().find(|(name, _)| *name == attr.name) {
            slot.1 = match &attr.value {
                AttributeValue::Int(v) => AttrValue::Int(*v),
                AttributeValue::Ints(v) => AttrValue::Ints(v),
                AttributeValue::Float(v) => AttrValue::Float(*v),
                AttributeValue::String(v) => AttrValue::String(v),
                AttributeValue::Tensor(v) => AttrValue::Tensor(v),
                other => {
                    return Err(ImportError::UnsupportedAttributeKind {
                        op_type: node.op_type.clone(),
                        attribute: attr.name.clone(),
                        kind: other.kind(),
                    });
                }
            };
            log::trace!(
                "{} {}: {} = {:?}",
                node.op_type,
                node.label(),
                attr.name,
                slot.1
            );
        }
    }

    Ok(Attributes {
        op_type: &node.op_type,
        values,
    })
}

impl<'a> Attributes<'a> {
    pub fn get(&self, name: &str) -> Option<AttrValue<'a>> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, AttrValue<'a>)> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn int(&self, name: &str) -> Result<i64, ImportError> {
        match self.lookup(name)? {
            AttrValue::Int(v) => Ok(v),
            other => Err(self.mismatch(name, AttributeKind::Int, other)),
        }
    }

    pub fn ints(&self, name: &str) -> Result<&'a [i64], ImportError> {
        match self.lookup(name)? {
            AttrValue::Ints(v) => Ok(v),
            other => Err(self.mismatch(name, AttributeKind::Ints, other)),
        }
    }

    pub fn float(&self, name: &str) -> Result<f32, ImportError> {
        match self.lookup(name)? {
            AttrValue::Float(v) => Ok(v),
            other => Err(self.mismatch(name, AttributeKind::Float, other)),
        }
    }

    pub fn string(&self, name: &str) -> Result<&'a [u8], ImportError> {
        match self.lookup(name)? {
            AttrValue::String(v) => Ok(v),
            other => Err(self.mismatch(name, AttributeKind::String, other)),
        }
    }

    pub fn tensor(&self, name: &str) -> Result<&'a TensorLiteral, ImportError> {
        match self.lookup(name)? {
            AttrValue::Tensor(v) => Ok(v),
            other => Err(self.mismatch(name, AttributeKind::Tensor, other)),
        }
    }

    fn lookup(&self, name: &str) -> Result<AttrValue<'a>, ImportError> {
        self.get(name).ok_or_else(|| ImportError::MissingAttribute {
            op_type: self.op_type.to_string(),
            attribute: name.to_string(),
        })
    }

    fn mismatch(&self, name: &str, expected: AttributeKind, found: AttrValue<'_>) -> ImportError {
        ImportError::AttributeTypeMismatch {
            op_type: self.op_type.to_string(),
            attribute: name.to_string(),
            expected,
            found: found.kind(),
        }
    }
}

/// BatchNormalization attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchNormAttrs {
    pub momentum: f32,
    pub epsilon: f32,
    pub training_mode: i64,
}

impl BatchNormAttrs {
    pub const DEFAULT: Self = Self {
        momentum: 0.9,
        epsilon: 1e-5,
        training_mode: 0,
    };

    pub fn from_node(node: &Node) -> Result<Self, ImportError> {
        let d = Self::DEFAULT;
        let attrs = resolve(
            node,
            &[
                ("momentum", AttrValue::Float(d.momentum)),
                ("epsilon", AttrValue::Float(d.epsilon)),
                ("training_mode", AttrValue::Int(d.training_mode)),
            ],
        )?;

        Ok(Self {
            momentum: attrs.float("momentum")?,
            epsilon: attrs.float("epsilon")?,
            training_mode: attrs.int("training_mode")?,
        })
    }

    /// Any nonzero `training_mode` means training.
    pub fn training(&self) -> bool {
        self.training_mode != 0
    }
}

impl Default for BatchNormAttrs {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Flatten attributes. Only axis 1 can be lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenAttrs {
    pub axis: i64,
}

impl FlattenAttrs {
    pub const SUPPORTED_AXIS: i64 = 1;

    pub fn from_node(node: &Node) -> Result<Self, ImportError> {
        let attrs = resolve(node, &[("axis", AttrValue::Int(Self::SUPPORTED_AXIS))])?;
        let axis = attrs.int("axis")?;

        // TODO accept negative axes equal to 1 once input rank is known here
        if axis != Self::SUPPORTED_AXIS {
            return Err(ImportError::UnsupportedConfiguration {
                op_type: node.op_type.clone(),
                reason: format!("only axis 1 can be flattened, got axis {axis}"),
            });
        }
        Ok(Self { axis })
    }
}

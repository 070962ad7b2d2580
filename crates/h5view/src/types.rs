//! Value and metadata types shared by the item model and the backends.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether an entry is a group or a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Group,
    Dataset,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Group => f.pad("group"),
            ItemKind::Dataset => f.pad("dataset"),
        }
    }
}

/// Simplified element type of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    /// Fixed-length string of the given byte width.
    String(usize),
    VariableLengthString,
    /// Anything else, with a description and its element width in bytes.
    Other { desc: String, size: usize },
}

impl DType {
    /// Width of one element in bytes.
    ///
    /// Variable-length strings count as one pointer per element, matching
    /// their in-memory representation rather than their payload.
    pub fn element_size(&self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::F64 | DType::I64 | DType::U64 => 8,
            DType::String(width) => *width,
            DType::VariableLengthString => std::mem::size_of::<usize>(),
            DType::Other { size, .. } => *size,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
            DType::I8 => write!(f, "i8"),
            DType::I16 => write!(f, "i16"),
            DType::I32 => write!(f, "i32"),
            DType::I64 => write!(f, "i64"),
            DType::U8 => write!(f, "u8"),
            DType::U16 => write!(f, "u16"),
            DType::U32 => write!(f, "u32"),
            DType::U64 => write!(f, "u64"),
            DType::String(width) => write!(f, "string[{width}]"),
            DType::VariableLengthString => write!(f, "vlen_string"),
            DType::Other { desc, .. } => write!(f, "other({desc})"),
        }
    }
}

/// A decoded attribute (or sidecar field) value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    F64(f64),
    I64(i64),
    U64(u64),
    String(String),
    F64Array(Vec<f64>),
    I64Array(Vec<i64>),
    U64Array(Vec<u64>),
    StringArray(Vec<String>),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::F64(v) => Some(*v),
            AttrValue::I64(v) => Some(*v as f64),
            AttrValue::U64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::F64(v) => write!(f, "{v:?}"),
            AttrValue::I64(v) => write!(f, "{v}"),
            AttrValue::U64(v) => write!(f, "{v}"),
            AttrValue::String(s) => write!(f, "{s}"),
            AttrValue::F64Array(arr) => write!(f, "{arr:?}"),
            AttrValue::I64Array(arr) => write!(f, "{arr:?}"),
            AttrValue::U64Array(arr) => write!(f, "{arr:?}"),
            AttrValue::StringArray(arr) => write!(f, "{arr:?}"),
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::F64(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::I64(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::String(v)
    }
}

/// Shape and element type of a dataset as reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub shape: Vec<u64>,
    pub dtype: DType,
}

/// Classification of a backend object.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Group,
    Dataset(DatasetInfo),
}

impl Node {
    pub fn kind(&self) -> ItemKind {
        match self {
            Node::Group => ItemKind::Group,
            Node::Dataset(_) => ItemKind::Dataset,
        }
    }

    /// Sidecar metadata carried by the item built from this node.
    pub(crate) fn fields(&self) -> BTreeMap<String, AttrValue> {
        let mut fields = BTreeMap::new();
        if let Node::Dataset(info) = self {
            fields.insert("shape".to_string(), AttrValue::U64Array(info.shape.clone()));
            fields.insert("dtype".to_string(), AttrValue::String(info.dtype.to_string()));
        }
        fields
    }
}

/// Immutable description of one discovered entry.
///
/// `shape` and `dtype` are present exactly when `kind` is
/// [`ItemKind::Dataset`]. Paths are relative to the root, without a
/// leading slash (`MyGroup1/MyGroup11`).
#[derive(Debug, Clone, PartialEq)]
pub struct ItemInfo {
    pub path: String,
    pub kind: ItemKind,
    pub shape: Option<Vec<u64>>,
    pub dtype: Option<DType>,
}

impl ItemInfo {
    pub(crate) fn new(path: &str, node: &Node) -> Self {
        match node {
            Node::Group => Self {
                path: path.to_string(),
                kind: ItemKind::Group,
                shape: None,
                dtype: None,
            },
            Node::Dataset(info) => Self {
                path: path.to_string(),
                kind: ItemKind::Dataset,
                shape: Some(info.shape.clone()),
                dtype: Some(info.dtype.clone()),
            },
        }
    }
}

impl fmt::Display for ItemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<8} {}", self.kind, self.path)?;
        if let (Some(shape), Some(dtype)) = (&self.shape, &self.dtype) {
            write!(f, " {} {dtype}", format_shape(shape))?;
        }
        Ok(())
    }
}

/// Number of elements in a dataspace of this shape, `None` on overflow.
pub fn element_count(shape: &[u64]) -> Option<u64> {
    shape.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d))
}

/// Format a shape as a tuple: `(100, 100)`, `(3,)`, `()`.
pub fn format_shape(shape: &[u64]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}

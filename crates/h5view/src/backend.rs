//! The boundary to the container library doing the actual I/O.
//!
//! A [`Backend`] opens files read-only and hands out a [`Handle`]. The
//! navigation layer never touches bytes itself: it enumerates paths,
//! classifies them, and asks the handle for attributes and dataset regions
//! by absolute path (`/`, `/grp`, `/grp/data`).

use std::collections::BTreeMap;
use std::path::Path;

use crate::array::Array;
use crate::error::{Error, Result};
use crate::selection::Selection;
use crate::types::{element_count, AttrValue, DType, ItemKind, Node};

/// Opens containers read-only.
pub trait Backend {
    type Handle: Handle;

    /// Open the container at `path` for reading.
    ///
    /// Fails with [`Error::Open`] when the file is missing, unreadable or
    /// not in the expected format.
    fn open_read_only(&self, path: &Path) -> Result<Self::Handle>;

    /// Whether opened names refer to files on disk. Only those are
    /// canonicalized when rendered.
    fn on_disk(&self) -> bool {
        true
    }
}

/// A live, open container.
pub trait Handle {
    /// Call `visit` once for every group and dataset below the root.
    ///
    /// Paths are relative to the root and carry no leading slash. Ancestors
    /// should be visited before their descendants; the visitor copes when
    /// they are not.
    fn visit_all(&self, visit: &mut dyn FnMut(&str) -> Result<()>) -> Result<()>;

    /// Classify the object at `path`, or `None` if it is neither a group
    /// nor a dataset (or does not exist).
    fn classify(&self, path: &str) -> Result<Option<Node>>;

    /// Attribute names of the object at `path`, sorted.
    fn attr_names(&self, path: &str) -> Result<Vec<String>>;

    /// A single attribute, or `None` if the object has no such attribute.
    fn attr(&self, path: &str, name: &str) -> Result<Option<AttrValue>>;

    /// Read a region of the dataset at `path`.
    fn read_region(&self, path: &str, selection: &Selection) -> Result<Array>;

    /// Size of the container on disk, in bytes.
    fn file_size(&self) -> Result<u64>;

    /// Number of elements in the dataset at `path`, if the backend can
    /// report it directly.
    fn element_count(&self, path: &str) -> Result<Option<u64>> {
        match self.classify(path)? {
            Some(Node::Dataset(info)) => element_count(&info.shape)
                .map(Some)
                .ok_or_else(|| Error::backend(path, "element count overflows")),
            _ => Ok(None),
        }
    }

    /// Length of the dataset at `path` along its first axis (1 for scalars).
    fn len(&self, path: &str) -> Result<u64> {
        match self.classify(path)? {
            Some(Node::Dataset(info)) => Ok(info.shape.first().copied().unwrap_or(1)),
            _ => Err(Error::NotADataset(path.to_string())),
        }
    }

    /// Release the handle.
    fn close(self) -> Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// The live backend object behind an item, freshly looked up.
pub struct Object<'h, H: ?Sized> {
    handle: &'h H,
    path: String,
    node: Node,
}

impl<'h, H: Handle + ?Sized> Object<'h, H> {
    /// Look up `path` on `handle`.
    pub fn lookup(handle: &'h H, path: &str) -> Result<Self> {
        let node = handle
            .classify(path)?
            .ok_or_else(|| Error::Classify(path.to_string()))?;
        Ok(Self {
            handle,
            path: path.to_string(),
            node,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn kind(&self) -> ItemKind {
        self.node.kind()
    }

    pub fn is_dataset(&self) -> bool {
        self.kind() == ItemKind::Dataset
    }

    pub fn is_group(&self) -> bool {
        self.kind() == ItemKind::Group
    }

    /// Dataset shape, `None` for groups.
    pub fn shape(&self) -> Option<&[u64]> {
        match &self.node {
            Node::Dataset(info) => Some(&info.shape),
            Node::Group => None,
        }
    }

    /// Dataset element type, `None` for groups.
    pub fn dtype(&self) -> Option<&DType> {
        match &self.node {
            Node::Dataset(info) => Some(&info.dtype),
            Node::Group => None,
        }
    }

    pub fn attr_names(&self) -> Result<Vec<String>> {
        let mut names = self.handle.attr_names(&self.path)?;
        names.sort();
        Ok(names)
    }

    pub fn attr(&self, name: &str) -> Result<Option<AttrValue>> {
        self.handle.attr(&self.path, name)
    }

    /// Read all attributes.
    pub fn attrs(&self) -> Result<BTreeMap<String, AttrValue>> {
        let mut map = BTreeMap::new();
        for name in self.attr_names()? {
            if let Some(value) = self.attr(&name)? {
                map.insert(name, value);
            }
        }
        Ok(map)
    }

    /// Read a region of this dataset.
    pub fn read(&self, selection: &Selection) -> Result<Array> {
        if !self.is_dataset() {
            return Err(Error::NotADataset(self.path.clone()));
        }
        self.handle.read_region(&self.path, selection)
    }

    /// Read the whole dataset.
    pub fn read_all(&self) -> Result<Array> {
        self.read(&Selection::all())
    }

    /// Number of elements, falling back to the first-axis length when the
    /// backend cannot report a size (variable-length data).
    pub fn element_count(&self) -> Result<u64> {
        match self.handle.element_count(&self.path)? {
            Some(n) => Ok(n),
            None => self.handle.len(&self.path),
        }
    }

    /// Storage size of the dataset in bytes: element width times count.
    pub fn nbytes(&self) -> Result<u64> {
        let dtype = self
            .dtype()
            .ok_or_else(|| Error::NotADataset(self.path.clone()))?;
        (dtype.element_size() as u64)
            .checked_mul(self.element_count()?)
            .ok_or_else(|| Error::backend(&self.path, "byte size overflows"))
    }
}

impl<H: ?Sized> std::fmt::Debug for Object<'_, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("path", &self.path)
            .field("node", &self.node)
            .finish()
    }
}

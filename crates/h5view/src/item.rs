//! The item tree: one proxy node per group or dataset.
//!
//! [`Item`] is the owned node built once at open time. Callers never hold
//! an `Item` directly: they get an [`ItemRef`], which pairs a node with the
//! open backend handle it reads through. Every attribute and region read
//! goes back to the backend by the node's full path.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::array::Array;
use crate::backend::{Handle, Object};
use crate::error::Result;
use crate::selection::Selection;
use crate::size::format_size;
use crate::types::{format_shape, AttrValue, ItemKind, Node};

/// A node of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    name: String,
    full_path: String,
    kind: ItemKind,
    fields: BTreeMap<String, AttrValue>,
    children: Vec<Item>,
    index: HashMap<String, usize>,
}

impl Item {
    /// The root group, path `/`.
    pub(crate) fn root() -> Self {
        Self {
            name: String::new(),
            full_path: "/".to_string(),
            kind: ItemKind::Group,
            fields: BTreeMap::new(),
            children: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn is_root(&self) -> bool {
        self.full_path == "/"
    }

    /// Attach a child built from `node` and return it.
    ///
    /// Re-adding an existing name replaces the node but keeps its position.
    pub(crate) fn add_child(&mut self, name: &str, node: &Node) -> &mut Item {
        let full_path = if self.is_root() {
            format!("/{name}")
        } else {
            format!("{}/{name}", self.full_path)
        };
        let child = Item {
            name: name.to_string(),
            full_path,
            kind: node.kind(),
            fields: node.fields(),
            children: Vec::new(),
            index: HashMap::new(),
        };
        let pos = match self.index.get(name) {
            Some(&pos) => {
                self.children[pos] = child;
                pos
            }
            None => {
                self.children.push(child);
                self.index.insert(name.to_string(), self.children.len() - 1);
                self.children.len() - 1
            }
        };
        &mut self.children[pos]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Sidecar metadata: `shape` and `dtype` for datasets.
    pub fn fields(&self) -> &BTreeMap<String, AttrValue> {
        &self.fields
    }

    pub fn child(&self, name: &str) -> Option<&Item> {
        self.index.get(name).map(|&i| &self.children[i])
    }

    /// Children in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.children.iter()
    }

    /// Walk `path` (relative, `/`-separated) down from this node.
    pub fn descendant(&self, path: &str) -> Option<&Item> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |item, segment| item.child(segment))
    }

    pub(crate) fn descendant_mut(&mut self, path: &str) -> Option<&mut Item> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let pos = *current.index.get(segment)?;
            current = &mut current.children[pos];
        }
        Some(current)
    }
}

/// What a name resolved to.
pub enum Resolved<'f, H: ?Sized> {
    /// An attribute stored in the container.
    Attribute(AttrValue),
    /// A child or descendant item.
    Item(ItemRef<'f, H>),
    /// A sidecar field (`shape`, `dtype`), only from [`ItemRef::member`].
    Field(AttrValue),
}

impl<'f, H: ?Sized> Resolved<'f, H> {
    pub fn as_item(&self) -> Option<&ItemRef<'f, H>> {
        match self {
            Resolved::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn into_item(self) -> Option<ItemRef<'f, H>> {
        match self {
            Resolved::Item(item) => Some(item),
            _ => None,
        }
    }

    /// The attribute or field value, `None` for items.
    pub fn as_value(&self) -> Option<&AttrValue> {
        match self {
            Resolved::Attribute(v) | Resolved::Field(v) => Some(v),
            Resolved::Item(_) => None,
        }
    }
}

impl<H: ?Sized> fmt::Debug for Resolved<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Attribute(v) => f.debug_tuple("Attribute").field(v).finish(),
            Resolved::Item(item) => f.debug_tuple("Item").field(item).finish(),
            Resolved::Field(v) => f.debug_tuple("Field").field(v).finish(),
        }
    }
}

impl<H: Handle + ?Sized> fmt::Display for Resolved<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Attribute(v) | Resolved::Field(v) => write!(f, "{v}"),
            Resolved::Item(item) => write!(f, "{item}"),
        }
    }
}

/// An item of an open file.
pub struct ItemRef<'f, H: ?Sized> {
    handle: &'f H,
    item: &'f Item,
}

impl<H: ?Sized> Clone for ItemRef<'_, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H: ?Sized> Copy for ItemRef<'_, H> {}

impl<H: ?Sized> fmt::Debug for ItemRef<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemRef")
            .field("path", &self.item.full_path)
            .field("kind", &self.item.kind)
            .finish()
    }
}

impl<'f, H: Handle + ?Sized> ItemRef<'f, H> {
    pub(crate) fn new(handle: &'f H, item: &'f Item) -> Self {
        Self { handle, item }
    }

    /// The underlying tree node.
    pub fn node(&self) -> &'f Item {
        self.item
    }

    pub fn name(&self) -> &'f str {
        &self.item.name
    }

    pub fn full_path(&self) -> &'f str {
        &self.item.full_path
    }

    pub fn kind(&self) -> ItemKind {
        self.item.kind
    }

    pub fn is_dataset(&self) -> bool {
        self.item.kind == ItemKind::Dataset
    }

    pub fn is_group(&self) -> bool {
        self.item.kind == ItemKind::Group
    }

    pub fn fields(&self) -> &'f BTreeMap<String, AttrValue> {
        &self.item.fields
    }

    /// Current child names.
    pub fn children(&self) -> BTreeSet<String> {
        self.item.index.keys().cloned().collect()
    }

    /// Direct child by name.
    pub fn child(&self, name: &str) -> Option<ItemRef<'f, H>> {
        self.item.child(name).map(|item| ItemRef::new(self.handle, item))
    }

    /// Children in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = ItemRef<'f, H>> + 'f {
        let handle = self.handle;
        self.item.iter().map(move |item| ItemRef::new(handle, item))
    }

    /// Attribute names, sorted.
    pub fn attr_names(&self) -> Result<Vec<String>> {
        let mut names = self.handle.attr_names(&self.item.full_path)?;
        names.sort();
        Ok(names)
    }

    pub fn attr(&self, name: &str) -> Result<Option<AttrValue>> {
        self.handle.attr(&self.item.full_path, name)
    }

    /// Resolve `name` to an attribute, a child, or a descendant.
    ///
    /// Attributes shadow children of the same name. A name containing `/`
    /// is split at its last separator: the head is resolved first, then the
    /// tail is looked up on the result. Misses are `Ok(None)`.
    pub fn get(&self, name: &str) -> Result<Option<Resolved<'f, H>>> {
        tracing::trace!(path = %self.item.full_path, name, "resolving");
        if let Some(value) = self.attr(name)? {
            return Ok(Some(Resolved::Attribute(value)));
        }
        if name.contains('/') {
            let (head, tail) = split_path(name);
            let parent = if head.trim_matches('/').is_empty() {
                *self
            } else {
                match self.get(head)? {
                    Some(Resolved::Item(item)) => item,
                    _ => return Ok(None),
                }
            };
            if tail.is_empty() {
                return Ok(Some(Resolved::Item(parent)));
            }
            return parent.get(tail);
        }
        Ok(self.child(name).map(Resolved::Item))
    }

    /// Like [`get`](Self::get), falling back to the sidecar fields.
    pub fn member(&self, name: &str) -> Result<Option<Resolved<'f, H>>> {
        if let Some(found) = self.get(name)? {
            return Ok(Some(found));
        }
        Ok(self.item.fields.get(name).cloned().map(Resolved::Field))
    }

    /// Every name [`member`](Self::member) can resolve without a path:
    /// children, attributes and sidecar fields, sorted and deduplicated.
    pub fn members(&self) -> Result<Vec<String>> {
        let mut names: BTreeSet<String> = self.item.index.keys().cloned().collect();
        names.extend(self.attr_names()?);
        names.extend(self.item.fields.keys().cloned());
        Ok(names.into_iter().collect())
    }

    /// Fresh backend lookup of this item.
    pub fn item(&self) -> Result<Object<'f, H>> {
        Object::lookup(self.handle, &self.item.full_path)
    }

    /// Read a region of this dataset. Groups yield `Ok(None)`.
    pub fn read(&self, selection: &Selection) -> Result<Option<Array>> {
        if !self.is_dataset() {
            return Ok(None);
        }
        self.item()?.read(selection).map(Some)
    }

    /// Read the whole dataset. Groups yield `Ok(None)`.
    pub fn read_all(&self) -> Result<Option<Array>> {
        self.read(&Selection::all())
    }

    /// This item's own lines: the header plus one line per attribute.
    fn summary(&self, out: &mut String) -> Result<()> {
        if self.is_dataset() {
            let object = self.item()?;
            let shape = object.shape().map(format_shape).unwrap_or_default();
            let dtype = object.dtype().map(|d| d.to_string()).unwrap_or_default();
            let size = format_size(object.nbytes()? as f64);
            out.push_str(&format!(
                "{}: shape {shape}, dtype \"{dtype}\", {size}",
                self.item.full_path
            ));
        } else {
            out.push_str(&self.item.full_path);
        }
        for name in self.attr_names()? {
            if let Some(value) = self.attr(&name)? {
                out.push_str(&format!("\n  * {name}: {value}"));
            }
        }
        Ok(())
    }

    fn render_into(&self, out: &mut String) -> Result<()> {
        self.summary(out)?;
        for child in self.iter() {
            out.push('\n');
            child.render_into(out)?;
        }
        Ok(())
    }

    /// Render this item and its whole subtree.
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        self.render_into(&mut out)?;
        Ok(out)
    }
}

impl<H: Handle + ?Sized> fmt::Display for ItemRef<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Ok(s) => f.write_str(&s),
            Err(e) => write!(f, "{}: <error: {e}>", self.item.full_path),
        }
    }
}

/// Split at the last `/`: the head loses its trailing separators unless it
/// is made of nothing else.
fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        None => ("", path),
        Some(i) => {
            let head = &path[..=i];
            let trimmed = head.trim_end_matches('/');
            let head = if trimmed.is_empty() { head } else { trimmed };
            (head, &path[i + 1..])
        }
    }
}

//! One-shot walk that turns the backend's entry list into the item tree.

use tracing::{debug, trace, warn};

use crate::backend::Handle;
use crate::error::{Error, Result};
use crate::item::Item;
use crate::types::{ItemInfo, ItemKind};

/// Builds the item tree and the flat [`ItemInfo`] list of an open handle.
pub struct Visitor<'h, H: ?Sized> {
    handle: &'h H,
    root: Item,
    infos: Vec<ItemInfo>,
}

impl<'h, H: Handle + ?Sized> Visitor<'h, H> {
    pub fn new(handle: &'h H) -> Self {
        Self {
            handle,
            root: Item::root(),
            infos: Vec::new(),
        }
    }

    /// Visit every entry once. Returns the root and the infos sorted by path.
    pub fn run(mut self) -> Result<(Item, Vec<ItemInfo>)> {
        let handle = self.handle;
        handle.visit_all(&mut |path| self.visit_item(path))?;
        self.infos.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(items = self.infos.len(), "visit complete");
        Ok((self.root, self.infos))
    }

    fn visit_item(&mut self, path: &str) -> Result<()> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Ok(());
        }
        if self.root.descendant(path).is_some() {
            trace!(path, "already materialized");
            return Ok(());
        }

        let node = self
            .handle
            .classify(&format!("/{path}"))?
            .ok_or_else(|| Error::Classify(path.to_string()))?;
        trace!(path, kind = %node.kind(), "visiting");

        let (parent_path, name) = path.rsplit_once('/').unwrap_or(("", path));
        self.ensure_ancestor(parent_path)?;
        let parent = self
            .root
            .descendant_mut(parent_path)
            .ok_or_else(|| Error::backend(path, "parent vanished during visit"))?;
        if parent.kind() == ItemKind::Dataset {
            return Err(Error::backend(path, "parent is a dataset"));
        }

        self.infos.push(ItemInfo::new(path, &node));
        parent.add_child(name, &node);
        Ok(())
    }

    /// Materialize `path` if the backend has not yielded it yet.
    fn ensure_ancestor(&mut self, path: &str) -> Result<()> {
        if path.is_empty() || self.root.descendant(path).is_some() {
            return Ok(());
        }
        warn!(path, "descendant visited before its ancestor");
        self.visit_item(path)
    }
}

//! The container: an open backend handle plus the item tree built from it.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::backend::{Backend, Handle};
use crate::error::{Error, Result};
use crate::item::{Item, ItemRef, Resolved};
use crate::size::format_size;
use crate::types::ItemInfo;
use crate::visitor::Visitor;

/// A read-only container.
///
/// Opening runs the visitor once; the tree and the sorted [`ItemInfo`] list
/// then stay fixed until [`close`](File::close). Dropping the file closes it.
///
/// ```
/// use h5view::fixture;
/// use h5view::File;
///
/// let file = File::new(fixture::demo_backend().unwrap(), Some(fixture::DEMO_FILENAME)).unwrap();
/// let attr = file.get("MyAttr").unwrap().unwrap();
/// assert_eq!(attr.as_value().and_then(|v| v.as_f64()), Some(23.0));
/// ```
pub struct File<B: Backend> {
    backend: B,
    filename: Option<PathBuf>,
    handle: Option<B::Handle>,
    root: Item,
    item_infos: Vec<ItemInfo>,
}

impl<B: Backend> File<B> {
    /// Create a container and open `filename` if one is given.
    pub fn new<P: AsRef<Path>>(backend: B, filename: Option<P>) -> Result<Self> {
        let mut file = Self {
            backend,
            filename: filename.map(|p| p.as_ref().to_path_buf()),
            handle: None,
            root: Item::root(),
            item_infos: Vec::new(),
        };
        file.open(None)?;
        Ok(file)
    }

    /// Open read-only and visit the whole hierarchy.
    ///
    /// Does nothing when already open, or when no file name is known.
    /// A name given here replaces the stored one only if the file is closed.
    pub fn open(&mut self, filename: Option<&Path>) -> Result<()> {
        if self.handle.is_some() {
            debug!("already open");
            return Ok(());
        }
        if let Some(name) = filename {
            self.filename = Some(name.to_path_buf());
        }
        let Some(path) = self.filename.clone() else {
            return Ok(());
        };

        debug!(path = %path.display(), "opening");
        let handle = self.backend.open_read_only(&path)?;
        let (root, item_infos) = Visitor::new(&handle).run()?;
        self.root = root;
        self.item_infos = item_infos;
        self.handle = Some(handle);
        Ok(())
    }

    /// Release the handle and drop the tree. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        debug!(path = ?self.filename, "closing");
        self.root = Item::root();
        self.item_infos.clear();
        handle.close()
    }

    /// Run `f` on the file, then close it whatever `f` returned.
    pub fn scope<T>(mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let out = f(&mut self);
        let closed = self.close();
        let out = out?;
        closed?;
        Ok(out)
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// Every discovered entry, sorted by path. Empty when closed.
    pub fn item_infos(&self) -> &[ItemInfo] {
        &self.item_infos
    }

    pub fn handle(&self) -> Result<&B::Handle> {
        self.handle.as_ref().ok_or(Error::Closed)
    }

    /// The root group.
    pub fn root(&self) -> Result<ItemRef<'_, B::Handle>> {
        Ok(ItemRef::new(self.handle()?, &self.root))
    }

    /// [`ItemRef::get`] on the root.
    pub fn get(&self, name: &str) -> Result<Option<Resolved<'_, B::Handle>>> {
        self.root()?.get(name)
    }

    /// [`ItemRef::member`] on the root.
    pub fn member(&self, name: &str) -> Result<Option<Resolved<'_, B::Handle>>> {
        self.root()?.member(name)
    }

    /// Size of the container in bytes.
    pub fn file_size(&self) -> Result<u64> {
        self.handle()?.file_size()
    }

    /// Header line with the resolved file name and size, then the tree.
    pub fn render(&self) -> Result<String> {
        let root = self.root()?;
        let name = self.filename.as_deref().unwrap_or_else(|| Path::new(""));
        let shown = if self.backend.on_disk() {
            std::fs::canonicalize(name).unwrap_or_else(|_| name.to_path_buf())
        } else {
            name.to_path_buf()
        };
        Ok(format!(
            "<HDF5 file \"{}\", {}>\n{}",
            shown.display(),
            format_size(self.file_size()? as f64),
            root.render()?
        ))
    }
}

impl<B: Backend> Drop for File<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "error while closing");
        }
    }
}

impl<B: Backend> fmt::Display for File<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Ok(s) => f.write_str(&s),
            Err(e) => write!(f, "<HDF5 file: {e}>"),
        }
    }
}

impl<B: Backend> fmt::Debug for File<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("filename", &self.filename)
            .field("open", &self.is_open())
            .field("items", &self.item_infos.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::array::Array;
    use crate::fixture::{demo_backend, demo_image, DEMO_FILENAME};
    use crate::memory::{MemoryBackend, MemoryFile};
    use crate::selection::Selection;
    use crate::types::{AttrValue, Node};

    // ---------------------------------------------------------------------------
    // A backend that counts how often its handles are closed
    // ---------------------------------------------------------------------------

    struct CountingBackend {
        inner: MemoryBackend,
        closes: Rc<Cell<usize>>,
    }

    struct CountingFile {
        inner: MemoryFile,
        closes: Rc<Cell<usize>>,
    }

    impl Backend for CountingBackend {
        type Handle = CountingFile;

        fn open_read_only(&self, path: &Path) -> Result<CountingFile> {
            Ok(CountingFile {
                inner: self.inner.open_read_only(path)?,
                closes: Rc::clone(&self.closes),
            })
        }
    }

    impl Handle for CountingFile {
        fn visit_all(&self, visit: &mut dyn FnMut(&str) -> Result<()>) -> Result<()> {
            self.inner.visit_all(visit)
        }

        fn classify(&self, path: &str) -> Result<Option<Node>> {
            self.inner.classify(path)
        }

        fn attr_names(&self, path: &str) -> Result<Vec<String>> {
            self.inner.attr_names(path)
        }

        fn attr(&self, path: &str, name: &str) -> Result<Option<AttrValue>> {
            self.inner.attr(path, name)
        }

        fn read_region(&self, path: &str, selection: &Selection) -> Result<Array> {
            self.inner.read_region(path, selection)
        }

        fn file_size(&self) -> Result<u64> {
            self.inner.file_size()
        }

        fn close(self) -> Result<()> {
            self.closes.set(self.closes.get() + 1);
            Ok(())
        }
    }

    fn counting_file() -> (File<CountingBackend>, Rc<Cell<usize>>) {
        let closes = Rc::new(Cell::new(0));
        let backend = CountingBackend {
            inner: demo_backend().unwrap(),
            closes: Rc::clone(&closes),
        };
        (File::new(backend, Some(DEMO_FILENAME)).unwrap(), closes)
    }

    // ---------------------------------------------------------------------------
    // Tests
    // ---------------------------------------------------------------------------

    #[test]
    fn new_without_name_stays_closed() {
        let file = File::new(MemoryBackend::new(), None::<&Path>).unwrap();
        assert!(!file.is_open());
        assert!(matches!(file.root(), Err(Error::Closed)));
        assert!(file.item_infos().is_empty());
    }

    #[test]
    fn open_later() {
        let mut file = File::new(demo_backend().unwrap(), None::<&Path>).unwrap();
        file.open(Some(Path::new(DEMO_FILENAME))).unwrap();
        assert!(file.is_open());
        assert_eq!(file.filename(), Some(Path::new(DEMO_FILENAME)));
        assert_eq!(file.item_infos().len(), 6);
    }

    #[test]
    fn open_while_open_keeps_name() {
        let mut file = File::new(demo_backend().unwrap(), Some(DEMO_FILENAME)).unwrap();
        file.open(Some(Path::new("other.h5"))).unwrap();
        assert_eq!(file.filename(), Some(Path::new(DEMO_FILENAME)));
    }

    #[test]
    fn close_clears_tree() {
        let mut file = File::new(demo_backend().unwrap(), Some(DEMO_FILENAME)).unwrap();
        file.close().unwrap();
        file.close().unwrap();
        assert!(!file.is_open());
        assert!(file.item_infos().is_empty());
        assert!(matches!(file.get("MyAttr"), Err(Error::Closed)));

        file.open(None).unwrap();
        assert!(file.get("MyGroup1").unwrap().is_some());
    }

    #[test]
    fn scope_closes_on_error() {
        let file = File::new(demo_backend().unwrap(), Some(DEMO_FILENAME)).unwrap();
        let result: Result<()> = file.scope(|f| {
            assert!(f.is_open());
            Err(Error::Selection("boom".into()))
        });
        assert!(matches!(result, Err(Error::Selection(_))));
    }

    #[test]
    fn scope_error_closes_handle_once() {
        let (file, closes) = counting_file();
        let result: Result<()> = file.scope(|_| Err(Error::Selection("boom".into())));
        assert!(result.is_err());
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn drop_closes_handle_once() {
        let (file, closes) = counting_file();
        assert_eq!(closes.get(), 0);
        drop(file);
        assert_eq!(closes.get(), 1);

        let (mut file, closes) = counting_file();
        file.close().unwrap();
        drop(file);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn in_memory_name_is_not_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.h5"), b"").unwrap();
        let name = dir.path().join(".").join("x.h5");
        let backend = MemoryBackend::new().with_image(name.clone(), demo_image().unwrap());

        let file = File::new(backend, Some(&name)).unwrap();
        let text = file.render().unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, format!("<HDF5 file \"{}\", 39.5 KB>", name.display()));
    }

    #[test]
    fn header_line() {
        let file = File::new(demo_backend().unwrap(), Some(DEMO_FILENAME)).unwrap();
        let text = file.render().unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, "<HDF5 file \"test.h5\", 39.5 KB>");
    }
}

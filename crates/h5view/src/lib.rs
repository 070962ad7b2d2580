//! Read-only, path-addressable navigation over HDF5 containers.
//!
//! Opening a [`File`] walks the whole hierarchy once and builds a tree of
//! items. Items resolve names to attributes or children, read dataset
//! regions through the backend, and pretty-print themselves and their
//! subtree.
//!
//! # Navigating
//!
//! ```
//! use h5view::{fixture, File, Selection};
//!
//! let file = File::new(fixture::demo_backend().unwrap(), Some("test.h5")).unwrap();
//! let root = file.root().unwrap();
//!
//! // Attributes shadow children; paths resolve through groups
//! let attr = root.get("MyAttr").unwrap().unwrap();
//! println!("MyAttr = {attr}");
//!
//! let ds = root.get("MyGroup2/MyDataset1").unwrap().unwrap().into_item().unwrap();
//! let block = ds.read(&Selection::from([2..4, 3..5])).unwrap().unwrap();
//! assert_eq!(block.shape(), &[2, 2]);
//!
//! println!("{file}");
//! ```
//!
//! # Snapshots
//!
//! ```no_run
//! use h5view::memory::ImageBuilder;
//! use h5view::AttrValue;
//!
//! let mut builder = ImageBuilder::new();
//! builder.create_dataset("data").with_f64_data(&[1.0, 2.0, 3.0]);
//! builder.set_attr("version", AttrValue::I64(1));
//! builder.write_json("data.json").unwrap();
//!
//! let file = h5view::open_snapshot("data.json").unwrap();
//! println!("{file}");
//! ```

pub mod array;
pub mod backend;
pub mod error;
pub mod file;
pub mod fixture;
#[cfg(feature = "hdf5")]
pub mod hdf5_backend;
pub mod item;
pub mod memory;
pub mod selection;
pub mod size;
pub mod snapshot;
pub mod types;
pub mod visitor;

use std::path::Path;

pub use array::Array;
pub use backend::{Backend, Handle, Object};
pub use error::{Error, OpenError, Result};
pub use file::File;
#[cfg(feature = "hdf5")]
pub use hdf5_backend::Hdf5Backend;
pub use item::{Item, ItemRef, Resolved};
pub use memory::{ImageBuilder, MemoryBackend};
pub use selection::{Selection, SliceSpec};
pub use size::format_size;
pub use snapshot::SnapshotBackend;
pub use types::{AttrValue, DType, ItemInfo, ItemKind};

/// Open a JSON snapshot.
pub fn open_snapshot<P: AsRef<Path>>(path: P) -> Result<File<SnapshotBackend>> {
    File::new(SnapshotBackend, Some(path))
}

/// Open an HDF5 file through libhdf5.
#[cfg(feature = "hdf5")]
pub fn open<P: AsRef<Path>>(path: P) -> Result<File<Hdf5Backend>> {
    File::new(Hdf5Backend, Some(path))
}

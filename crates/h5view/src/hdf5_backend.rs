//! Native HDF5 files through the `hdf5` crate.
//!
//! Region reads load the whole dataset and cut the selection out of it in
//! memory. Fixed-length string datasets are listed and rendered but cannot
//! be read.

use std::fs;
use std::path::{Path, PathBuf};

use hdf5::types::{FloatSize, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Attribute, Dataset, Group, H5Type, LinkInfo, LinkType, LocationToken};
use ndarray::ArrayD;

use crate::array::{self, Array};
use crate::backend::{Backend, Handle};
use crate::error::{Error, OpenError, Result};
use crate::selection::Selection;
use crate::types::{AttrValue, DType, DatasetInfo, Node};

/// Opens files with libhdf5.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hdf5Backend;

impl Backend for Hdf5Backend {
    type Handle = Hdf5File;

    fn open_read_only(&self, path: &Path) -> Result<Hdf5File> {
        if let Err(e) = fs::metadata(path) {
            return Err(Error::open(path, e));
        }
        let file = hdf5::File::open(path)
            .map_err(|e| Error::open(path, OpenError::FormatInvalid(e.to_string())))?;
        tracing::debug!(path = %path.display(), "opened HDF5 file");
        Ok(Hdf5File {
            path: path.to_path_buf(),
            file,
        })
    }
}

/// An open HDF5 file.
pub struct Hdf5File {
    path: PathBuf,
    file: hdf5::File,
}

enum Object {
    Group(Group),
    Dataset(Dataset),
}

impl Hdf5File {
    fn object(&self, path: &str) -> Option<Object> {
        if let Ok(ds) = self.file.dataset(path) {
            Some(Object::Dataset(ds))
        } else if let Ok(g) = self.file.group(path) {
            Some(Object::Group(g))
        } else {
            None
        }
    }

    fn dataset(&self, path: &str) -> Result<Dataset> {
        match self.object(path) {
            Some(Object::Dataset(ds)) => Ok(ds),
            Some(Object::Group(_)) => Err(Error::NotADataset(path.to_string())),
            None => Err(Error::backend(path, "no such object")),
        }
    }

    fn attribute(&self, path: &str, name: &str) -> Result<Attribute> {
        let attr = match self.object(path) {
            Some(Object::Group(g)) => g.attr(name),
            Some(Object::Dataset(ds)) => ds.attr(name),
            None => return Err(Error::backend(path, "no such object")),
        };
        attr.map_err(|e| Error::backend(path, e))
    }

    /// Depth-first over hard links only, in name order. Soft and external
    /// links are skipped and an object reachable through several hard links
    /// is reported under the first path that reaches it.
    fn walk(
        &self,
        group: &Group,
        prefix: &str,
        seen: &mut Vec<LocationToken>,
        visit: &mut dyn FnMut(&str) -> Result<()>,
    ) -> Result<()> {
        let at = if prefix.is_empty() { "/" } else { prefix };
        let mut names = group
            .iter_visit_default(Vec::new(), |_, name, info: LinkInfo, names: &mut Vec<String>| {
                if matches!(info.link_type, LinkType::Hard) {
                    names.push(name.to_string());
                }
                true
            })
            .map_err(|e| Error::backend(at, e))?;
        names.sort();
        for name in names {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            let sub = group.group(&name).ok();
            let token = match &sub {
                Some(g) => g.loc_info(),
                None => match group.dataset(&name) {
                    Ok(ds) => ds.loc_info(),
                    Err(_) => {
                        visit(&path)?;
                        continue;
                    }
                },
            }
            .map_err(|e| Error::backend(&path, e))?
            .token;
            if seen.contains(&token) {
                tracing::trace!(path = %path, "already visited through another link");
                continue;
            }
            seen.push(token);
            visit(&path)?;
            if let Some(sub) = sub {
                self.walk(&sub, &path, seen, visit)?;
            }
        }
        Ok(())
    }
}

fn dtype_of(td: &TypeDescriptor) -> DType {
    match td {
        TypeDescriptor::Float(FloatSize::U4) => DType::F32,
        TypeDescriptor::Float(FloatSize::U8) => DType::F64,
        TypeDescriptor::Integer(IntSize::U1) => DType::I8,
        TypeDescriptor::Integer(IntSize::U2) => DType::I16,
        TypeDescriptor::Integer(IntSize::U4) => DType::I32,
        TypeDescriptor::Integer(IntSize::U8) => DType::I64,
        TypeDescriptor::Unsigned(IntSize::U1) => DType::U8,
        TypeDescriptor::Unsigned(IntSize::U2) => DType::U16,
        TypeDescriptor::Unsigned(IntSize::U4) => DType::U32,
        TypeDescriptor::Unsigned(IntSize::U8) => DType::U64,
        TypeDescriptor::FixedAscii(n) | TypeDescriptor::FixedUnicode(n) => DType::String(*n),
        TypeDescriptor::VarLenAscii | TypeDescriptor::VarLenUnicode => {
            DType::VariableLengthString
        }
        other => DType::Other {
            desc: format!("{other:?}"),
            size: other.size(),
        },
    }
}

fn descriptor(path: &str, ds: &Dataset) -> Result<TypeDescriptor> {
    ds.dtype()
        .and_then(|t| t.to_descriptor())
        .map_err(|e| Error::backend(path, e))
}

fn read_dyn<T: H5Type + Clone>(path: &str, ds: &Dataset, selection: &Selection) -> Result<ArrayD<T>> {
    let full: ArrayD<T> = ds.read_dyn().map_err(|e| Error::backend(path, e))?;
    array::select_view(full.view(), selection)
}

fn read_scalar_or_array(path: &str, attr: &Attribute, td: &TypeDescriptor) -> Result<AttrValue> {
    let scalar = attr.ndim() == 0;
    let err = |e: hdf5::Error| Error::backend(path, e);
    Ok(match td {
        TypeDescriptor::Float(_) if scalar => AttrValue::F64(attr.read_scalar().map_err(err)?),
        TypeDescriptor::Float(_) => AttrValue::F64Array(attr.read_raw().map_err(err)?),
        TypeDescriptor::Integer(_) if scalar => AttrValue::I64(attr.read_scalar().map_err(err)?),
        TypeDescriptor::Integer(_) => AttrValue::I64Array(attr.read_raw().map_err(err)?),
        TypeDescriptor::Unsigned(_) if scalar => AttrValue::U64(attr.read_scalar().map_err(err)?),
        TypeDescriptor::Unsigned(_) => AttrValue::U64Array(attr.read_raw().map_err(err)?),
        TypeDescriptor::VarLenUnicode if scalar => {
            let s: VarLenUnicode = attr.read_scalar().map_err(err)?;
            AttrValue::String(s.as_str().to_string())
        }
        TypeDescriptor::VarLenUnicode => {
            let v: Vec<VarLenUnicode> = attr.read_raw().map_err(err)?;
            AttrValue::StringArray(v.iter().map(|s| s.as_str().to_string()).collect())
        }
        TypeDescriptor::VarLenAscii if scalar => {
            let s: VarLenAscii = attr.read_scalar().map_err(err)?;
            AttrValue::String(s.as_str().to_string())
        }
        TypeDescriptor::VarLenAscii => {
            let v: Vec<VarLenAscii> = attr.read_raw().map_err(err)?;
            AttrValue::StringArray(v.iter().map(|s| s.as_str().to_string()).collect())
        }
        other => {
            tracing::trace!(path, ?other, "attribute type not decoded");
            AttrValue::String(format!("<{}>", dtype_of(other)))
        }
    })
}

impl Handle for Hdf5File {
    fn visit_all(&self, visit: &mut dyn FnMut(&str) -> Result<()>) -> Result<()> {
        let root = self.file.group("/").map_err(|e| Error::backend("/", e))?;
        let mut seen = vec![root.loc_info().map_err(|e| Error::backend("/", e))?.token];
        self.walk(&root, "", &mut seen, visit)
    }

    fn classify(&self, path: &str) -> Result<Option<Node>> {
        Ok(match self.object(path) {
            Some(Object::Group(_)) => Some(Node::Group),
            Some(Object::Dataset(ds)) => Some(Node::Dataset(DatasetInfo {
                shape: ds.shape().iter().map(|&d| d as u64).collect(),
                dtype: dtype_of(&descriptor(path, &ds)?),
            })),
            None => None,
        })
    }

    fn attr_names(&self, path: &str) -> Result<Vec<String>> {
        let names = match self.object(path) {
            Some(Object::Group(g)) => g.attr_names(),
            Some(Object::Dataset(ds)) => ds.attr_names(),
            None => return Err(Error::backend(path, "no such object")),
        };
        let mut names = names.map_err(|e| Error::backend(path, e))?;
        names.sort();
        Ok(names)
    }

    fn attr(&self, path: &str, name: &str) -> Result<Option<AttrValue>> {
        if !self.attr_names(path)?.iter().any(|n| n == name) {
            return Ok(None);
        }
        let attr = self.attribute(path, name)?;
        let td = attr
            .dtype()
            .and_then(|t| t.to_descriptor())
            .map_err(|e| Error::backend(path, e))?;
        read_scalar_or_array(path, &attr, &td).map(Some)
    }

    fn read_region(&self, path: &str, selection: &Selection) -> Result<Array> {
        tracing::trace!(path, %selection, "reading region");
        let ds = self.dataset(path)?;
        Ok(match descriptor(path, &ds)? {
            TypeDescriptor::Float(FloatSize::U4) => Array::F32(read_dyn(path, &ds, selection)?),
            TypeDescriptor::Float(FloatSize::U8) => Array::F64(read_dyn(path, &ds, selection)?),
            TypeDescriptor::Integer(IntSize::U8) => Array::I64(read_dyn(path, &ds, selection)?),
            TypeDescriptor::Integer(_) => Array::I32(read_dyn(path, &ds, selection)?),
            TypeDescriptor::Unsigned(IntSize::U1) => Array::U8(read_dyn(path, &ds, selection)?),
            TypeDescriptor::Unsigned(_) => Array::U64(read_dyn(path, &ds, selection)?),
            TypeDescriptor::VarLenUnicode => {
                let raw: ArrayD<VarLenUnicode> = read_dyn(path, &ds, selection)?;
                Array::String(raw.mapv(|s| s.as_str().to_string()))
            }
            TypeDescriptor::VarLenAscii => {
                let raw: ArrayD<VarLenAscii> = read_dyn(path, &ds, selection)?;
                Array::String(raw.mapv(|s| s.as_str().to_string()))
            }
            other => {
                return Err(Error::backend(
                    path,
                    format!("cannot read elements of type {}", dtype_of(&other)),
                ))
            }
        })
    }

    fn file_size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    fn close(self) -> Result<()> {
        tracing::debug!(path = %self.path.display(), "closing HDF5 file");
        drop(self.file);
        Ok(())
    }
}

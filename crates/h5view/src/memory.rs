//! In-process backend: container images built in memory.
//!
//! An [`Image`] is a complete group/dataset/attribute tree with its data.
//! Images are assembled with [`ImageBuilder`] and registered under a file
//! name in a [`MemoryBackend`], which then opens them like files.
//!
//! ```
//! use h5view::memory::{ImageBuilder, MemoryBackend};
//! use h5view::{AttrValue, File};
//!
//! let mut b = ImageBuilder::new();
//! b.set_attr("version", AttrValue::I64(1));
//! let mut g = b.create_group("sensors");
//! g.create_dataset("temperature").with_f64_data(&[20.5, 21.0]);
//! b.add_group(g.finish());
//!
//! let backend = MemoryBackend::new().with_image("lab.h5", b.finish().unwrap());
//! let file = File::new(backend, Some("lab.h5")).unwrap();
//! assert!(file.get("sensors/temperature").unwrap().is_some());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::array::{self, Array};
use crate::backend::{Backend, Handle};
use crate::error::{Error, OpenError, Result};
use crate::selection::Selection;
use crate::types::{element_count, AttrValue, DType, DatasetInfo, Node};

// ---------------------------------------------------------------------------
// Image model
// ---------------------------------------------------------------------------

/// Raw dataset contents, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Data {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U64(Vec<u64>),
    /// Fixed-width strings.
    String { width: usize, values: Vec<String> },
    VarLenString(Vec<String>),
}

impl Data {
    pub fn dtype(&self) -> DType {
        match self {
            Data::F32(_) => DType::F32,
            Data::F64(_) => DType::F64,
            Data::I32(_) => DType::I32,
            Data::I64(_) => DType::I64,
            Data::U8(_) => DType::U8,
            Data::U64(_) => DType::U64,
            Data::String { width, .. } => DType::String(*width),
            Data::VarLenString(_) => DType::VariableLengthString,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Data::F32(v) => v.len(),
            Data::F64(v) => v.len(),
            Data::I32(v) => v.len(),
            Data::I64(v) => v.len(),
            Data::U8(v) => v.len(),
            Data::U64(v) => v.len(),
            Data::String { values, .. } => values.len(),
            Data::VarLenString(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select(&self, path: &str, shape: &[u64], selection: &Selection) -> Result<Array> {
        Ok(match self {
            Data::F32(v) => Array::F32(array::select(path, v, shape, selection)?),
            Data::F64(v) => Array::F64(array::select(path, v, shape, selection)?),
            Data::I32(v) => Array::I32(array::select(path, v, shape, selection)?),
            Data::I64(v) => Array::I64(array::select(path, v, shape, selection)?),
            Data::U8(v) => Array::U8(array::select(path, v, shape, selection)?),
            Data::U64(v) => Array::U64(array::select(path, v, shape, selection)?),
            Data::String { values, .. } | Data::VarLenString(values) => {
                Array::String(array::select(path, values, shape, selection)?)
            }
        })
    }
}

/// A dataset: shape, data and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetImage {
    pub shape: Vec<u64>,
    pub data: Data,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl DatasetImage {
    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            shape: self.shape.clone(),
            dtype: self.data.dtype(),
        }
    }

    fn nbytes(&self) -> u64 {
        self.data.dtype().element_size() as u64 * self.data.len() as u64
    }
}

/// A group: attributes plus named members, kept in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupImage {
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
    #[serde(default)]
    pub members: BTreeMap<String, MemberImage>,
}

/// A member of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MemberImage {
    Group(GroupImage),
    Dataset(DatasetImage),
}

/// A complete container held in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub root: GroupImage,
}

/// Borrowed view of whatever lives at a path.
enum Entry<'a> {
    Group(&'a GroupImage),
    Dataset(&'a DatasetImage),
}

impl Image {
    /// Check names and data lengths throughout the tree.
    pub fn validate(&self) -> Result<()> {
        validate_group(&self.root, "")
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate an image from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let image: Image = serde_json::from_slice(bytes)?;
        image.validate()?;
        Ok(image)
    }

    /// Total dataset payload in bytes.
    pub fn nbytes(&self) -> u64 {
        fn group_bytes(g: &GroupImage) -> u64 {
            g.members
                .values()
                .map(|m| match m {
                    MemberImage::Group(g) => group_bytes(g),
                    MemberImage::Dataset(d) => d.nbytes(),
                })
                .sum()
        }
        group_bytes(&self.root)
    }

    fn entry(&self, path: &str) -> Option<Entry<'_>> {
        let mut current = Entry::Group(&self.root);
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = match current {
                Entry::Group(g) => match g.members.get(segment)? {
                    MemberImage::Group(sub) => Entry::Group(sub),
                    MemberImage::Dataset(ds) => Entry::Dataset(ds),
                },
                Entry::Dataset(_) => return None,
            };
        }
        Some(current)
    }

    fn attrs_at(&self, path: &str) -> Result<&BTreeMap<String, AttrValue>> {
        match self.entry(path) {
            Some(Entry::Group(g)) => Ok(&g.attrs),
            Some(Entry::Dataset(d)) => Ok(&d.attrs),
            None => Err(Error::backend(path, "no such object")),
        }
    }
}

fn validate_group(group: &GroupImage, prefix: &str) -> Result<()> {
    for (name, member) in &group.members {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidImage(format!(
                "invalid member name {name:?} under {}",
                if prefix.is_empty() { "/" } else { prefix }
            )));
        }
        let path = format!("{prefix}/{name}");
        match member {
            MemberImage::Group(g) => validate_group(g, &path)?,
            MemberImage::Dataset(d) => {
                let expected = element_count(&d.shape).ok_or_else(|| {
                    Error::InvalidImage(format!("{path}: shape {:?} is too large", d.shape))
                })?;
                if d.data.len() as u64 != expected {
                    return Err(Error::InvalidImage(format!(
                        "{path}: {} elements for shape {:?}",
                        d.data.len(),
                        d.shape
                    )));
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Builder for one dataset. Obtained from `create_dataset`.
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    name: String,
    shape: Option<Vec<u64>>,
    data: Option<Data>,
    attrs: BTreeMap<String, AttrValue>,
}

impl DatasetBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shape: None,
            data: None,
            attrs: BTreeMap::new(),
        }
    }

    fn with_data(&mut self, data: Data) -> &mut Self {
        if self.shape.is_none() {
            self.shape = Some(vec![data.len() as u64]);
        }
        self.data = Some(data);
        self
    }

    pub fn with_f32_data(&mut self, data: &[f32]) -> &mut Self {
        self.with_data(Data::F32(data.to_vec()))
    }

    pub fn with_f64_data(&mut self, data: &[f64]) -> &mut Self {
        self.with_data(Data::F64(data.to_vec()))
    }

    pub fn with_i32_data(&mut self, data: &[i32]) -> &mut Self {
        self.with_data(Data::I32(data.to_vec()))
    }

    pub fn with_i64_data(&mut self, data: &[i64]) -> &mut Self {
        self.with_data(Data::I64(data.to_vec()))
    }

    pub fn with_u8_data(&mut self, data: &[u8]) -> &mut Self {
        self.with_data(Data::U8(data.to_vec()))
    }

    pub fn with_u64_data(&mut self, data: &[u64]) -> &mut Self {
        self.with_data(Data::U64(data.to_vec()))
    }

    /// Fixed-width strings; the width is the longest value in bytes.
    pub fn with_string_data(&mut self, data: &[&str]) -> &mut Self {
        let width = data.iter().map(|s| s.len()).max().unwrap_or(0);
        self.with_data(Data::String {
            width,
            values: data.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn with_vlen_string_data(&mut self, data: &[&str]) -> &mut Self {
        self.with_data(Data::VarLenString(
            data.iter().map(|s| s.to_string()).collect(),
        ))
    }

    pub fn with_shape(&mut self, shape: &[u64]) -> &mut Self {
        self.shape = Some(shape.to_vec());
        self
    }

    pub fn set_attr(&mut self, name: &str, value: AttrValue) -> &mut Self {
        self.attrs.insert(name.to_string(), value);
        self
    }

    fn finish(self) -> Result<(String, DatasetImage)> {
        let data = self
            .data
            .ok_or_else(|| Error::InvalidImage(format!("dataset {} has no data", self.name)))?;
        let shape = self.shape.unwrap_or_else(|| vec![data.len() as u64]);
        Ok((
            self.name,
            DatasetImage {
                shape,
                data,
                attrs: self.attrs,
            },
        ))
    }
}

/// Builder for a group. Call `.finish()` and hand the result to the
/// parent's `add_group()`.
#[derive(Debug, Clone)]
pub struct GroupBuilder {
    name: String,
    datasets: Vec<DatasetBuilder>,
    groups: Vec<FinishedGroup>,
    attrs: BTreeMap<String, AttrValue>,
}

/// A completed group, ready to be attached to its parent.
#[derive(Debug, Clone)]
pub struct FinishedGroup {
    name: String,
    datasets: Vec<DatasetBuilder>,
    groups: Vec<FinishedGroup>,
    attrs: BTreeMap<String, AttrValue>,
}

impl GroupBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            datasets: Vec::new(),
            groups: Vec::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn create_dataset(&mut self, name: &str) -> &mut DatasetBuilder {
        self.datasets.push(DatasetBuilder::new(name));
        let last = self.datasets.len() - 1;
        &mut self.datasets[last]
    }

    pub fn create_group(&mut self, name: &str) -> GroupBuilder {
        GroupBuilder::new(name)
    }

    pub fn add_group(&mut self, group: FinishedGroup) {
        self.groups.push(group);
    }

    pub fn set_attr(&mut self, name: &str, value: AttrValue) {
        self.attrs.insert(name.to_string(), value);
    }

    pub fn finish(self) -> FinishedGroup {
        FinishedGroup {
            name: self.name,
            datasets: self.datasets,
            groups: self.groups,
            attrs: self.attrs,
        }
    }
}

impl FinishedGroup {
    fn build(self) -> Result<(String, GroupImage)> {
        let mut image = GroupImage {
            attrs: self.attrs,
            members: BTreeMap::new(),
        };
        for group in self.groups {
            let (name, sub) = group.build()?;
            insert_member(&mut image, name, MemberImage::Group(sub))?;
        }
        for dataset in self.datasets {
            let (name, ds) = dataset.finish()?;
            insert_member(&mut image, name, MemberImage::Dataset(ds))?;
        }
        Ok((self.name, image))
    }
}

fn insert_member(group: &mut GroupImage, name: String, member: MemberImage) -> Result<()> {
    if group.members.contains_key(&name) {
        return Err(Error::InvalidImage(format!("duplicate member name {name:?}")));
    }
    group.members.insert(name, member);
    Ok(())
}

/// Builder for a whole [`Image`].
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    root: GroupBuilder,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            root: GroupBuilder::new(""),
        }
    }

    /// Create a dataset at the root level.
    pub fn create_dataset(&mut self, name: &str) -> &mut DatasetBuilder {
        self.root.create_dataset(name)
    }

    /// Create a group builder. Call `.finish()` on it, then `add_group()`.
    pub fn create_group(&mut self, name: &str) -> GroupBuilder {
        GroupBuilder::new(name)
    }

    pub fn add_group(&mut self, group: FinishedGroup) {
        self.root.add_group(group);
    }

    /// Set an attribute on the root group.
    pub fn set_attr(&mut self, name: &str, value: AttrValue) {
        self.root.set_attr(name, value);
    }

    /// Assemble and validate the image.
    pub fn finish(self) -> Result<Image> {
        let (_, root) = self.root.finish().build()?;
        let image = Image { root };
        image.validate()?;
        Ok(image)
    }

    /// Assemble the image and write it as a JSON snapshot.
    pub fn write_json<P: AsRef<Path>>(self, path: P) -> Result<()> {
        let json = self.finish()?.to_json()?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Opens registered in-memory images by file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    images: HashMap<PathBuf, Arc<Image>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `image` under `path`.
    pub fn insert<P: Into<PathBuf>>(&mut self, path: P, image: Image) {
        self.images.insert(path.into(), Arc::new(image));
    }

    pub fn with_image<P: Into<PathBuf>>(mut self, path: P, image: Image) -> Self {
        self.insert(path, image);
        self
    }
}

impl Backend for MemoryBackend {
    type Handle = MemoryFile;

    fn open_read_only(&self, path: &Path) -> Result<MemoryFile> {
        let image = self
            .images
            .get(path)
            .ok_or_else(|| Error::open(path, OpenError::NotFound))?;
        tracing::debug!(path = %path.display(), "opening in-memory image");
        let size = image.nbytes();
        Ok(MemoryFile::new(Arc::clone(image), size))
    }

    fn on_disk(&self) -> bool {
        false
    }
}

/// An open in-memory image.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    image: Arc<Image>,
    size: u64,
}

impl MemoryFile {
    pub fn new(image: Arc<Image>, size: u64) -> Self {
        Self { image, size }
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    fn dataset(&self, path: &str) -> Result<&DatasetImage> {
        match self.image.entry(path) {
            Some(Entry::Dataset(ds)) => Ok(ds),
            Some(Entry::Group(_)) => Err(Error::NotADataset(path.to_string())),
            None => Err(Error::backend(path, "no such object")),
        }
    }
}

fn visit_group(
    group: &GroupImage,
    prefix: &str,
    visit: &mut dyn FnMut(&str) -> Result<()>,
) -> Result<()> {
    for (name, member) in &group.members {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        visit(&path)?;
        if let MemberImage::Group(sub) = member {
            visit_group(sub, &path, visit)?;
        }
    }
    Ok(())
}

impl Handle for MemoryFile {
    fn visit_all(&self, visit: &mut dyn FnMut(&str) -> Result<()>) -> Result<()> {
        visit_group(&self.image.root, "", visit)
    }

    fn classify(&self, path: &str) -> Result<Option<Node>> {
        Ok(self.image.entry(path).map(|entry| match entry {
            Entry::Group(_) => Node::Group,
            Entry::Dataset(ds) => Node::Dataset(ds.info()),
        }))
    }

    fn attr_names(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.image.attrs_at(path)?.keys().cloned().collect())
    }

    fn attr(&self, path: &str, name: &str) -> Result<Option<AttrValue>> {
        Ok(self.image.attrs_at(path)?.get(name).cloned())
    }

    fn read_region(&self, path: &str, selection: &Selection) -> Result<Array> {
        tracing::trace!(path, %selection, "reading region");
        let ds = self.dataset(path)?;
        ds.data.select(path, &ds.shape, selection)
    }

    fn file_size(&self) -> Result<u64> {
        Ok(self.size)
    }

    fn element_count(&self, path: &str) -> Result<Option<u64>> {
        let ds = self.dataset(path)?;
        Ok(match ds.data {
            // Variable-length payloads have no fixed size; callers fall
            // back to the length along the first axis.
            Data::VarLenString(_) => None,
            _ => Some(
                element_count(&ds.shape)
                    .ok_or_else(|| Error::backend(path, "element count overflows"))?,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Image {
        let mut b = ImageBuilder::new();
        b.set_attr("title", AttrValue::String("sample".into()));
        let mut g = b.create_group("grp");
        g.create_dataset("vals")
            .with_i32_data(&[1, 2, 3, 4, 5, 6])
            .with_shape(&[2, 3])
            .set_attr("unit", AttrValue::String("m".into()));
        let mut inner = g.create_group("inner");
        inner.create_dataset("names").with_vlen_string_data(&["a", "bb"]);
        g.add_group(inner.finish());
        b.add_group(g.finish());
        b.create_dataset("top").with_f64_data(&[0.5]);
        b.finish().unwrap()
    }

    fn open(image: Image) -> MemoryFile {
        MemoryBackend::new()
            .with_image("s.h5", image)
            .open_read_only(Path::new("s.h5"))
            .unwrap()
    }

    #[test]
    fn visit_is_preorder_by_name() {
        let file = open(sample());
        let mut seen = Vec::new();
        file.visit_all(&mut |p| {
            seen.push(p.to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(
            seen,
            vec!["grp", "grp/inner", "grp/inner/names", "grp/vals", "top"]
        );
    }

    #[test]
    fn classify_paths() {
        let file = open(sample());
        assert_eq!(file.classify("/").unwrap(), Some(Node::Group));
        assert_eq!(file.classify("/grp").unwrap(), Some(Node::Group));
        let node = file.classify("/grp/vals").unwrap().unwrap();
        assert_eq!(
            node,
            Node::Dataset(DatasetInfo {
                shape: vec![2, 3],
                dtype: DType::I32
            })
        );
        assert_eq!(file.classify("/missing").unwrap(), None);
        assert_eq!(file.classify("/top/below").unwrap(), None);
    }

    #[test]
    fn attributes() {
        let file = open(sample());
        assert_eq!(file.attr_names("/").unwrap(), vec!["title"]);
        assert_eq!(
            file.attr("/grp/vals", "unit").unwrap(),
            Some(AttrValue::String("m".into()))
        );
        assert_eq!(file.attr("/grp", "unit").unwrap(), None);
        assert!(file.attr_names("/nope").is_err());
    }

    #[test]
    fn region_read() {
        let file = open(sample());
        let arr = file
            .read_region("/grp/vals", &Selection::from([1..2, 0..2]))
            .unwrap();
        assert_eq!(arr.as_i32().unwrap().iter().copied().collect::<Vec<_>>(), vec![4, 5]);
        assert!(matches!(
            file.read_region("/grp", &Selection::all()),
            Err(Error::NotADataset(_))
        ));
    }

    #[test]
    fn vlen_has_no_direct_size() {
        let file = open(sample());
        assert_eq!(file.element_count("/grp/inner/names").unwrap(), None);
        assert_eq!(file.len("/grp/inner/names").unwrap(), 2);
        assert_eq!(file.element_count("/grp/vals").unwrap(), Some(6));
    }

    #[test]
    fn unknown_file_is_not_found() {
        let err = MemoryBackend::new()
            .open_read_only(Path::new("absent.h5"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Open {
                source: OpenError::NotFound,
                ..
            }
        ));
    }

    #[test]
    fn builder_rejects_bad_images() {
        let mut b = ImageBuilder::new();
        b.create_dataset("d").with_f64_data(&[1.0, 2.0]).with_shape(&[3]);
        assert!(matches!(b.finish(), Err(Error::InvalidImage(_))));

        let mut b = ImageBuilder::new();
        b.create_dataset("empty");
        assert!(matches!(b.finish(), Err(Error::InvalidImage(_))));

        let mut b = ImageBuilder::new();
        b.create_dataset("x").with_u8_data(&[1]);
        b.create_dataset("x").with_u8_data(&[2]);
        assert!(matches!(b.finish(), Err(Error::InvalidImage(_))));

        let mut b = ImageBuilder::new();
        b.create_dataset("a/b").with_u8_data(&[1]);
        assert!(matches!(b.finish(), Err(Error::InvalidImage(_))));
    }

    #[test]
    fn json_round_trip() {
        let image = sample();
        let json = image.to_json().unwrap();
        assert_eq!(Image::from_json(json.as_bytes()).unwrap(), image);
    }

    #[test]
    fn payload_size() {
        // 6 * i32 + 1 * f64 + 2 vlen pointers
        let expected = 24 + 8 + 2 * std::mem::size_of::<usize>() as u64;
        assert_eq!(sample().nbytes(), expected);
    }
}

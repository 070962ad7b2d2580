//! Index expressions for partial dataset reads.
//!
//! A [`Selection`] holds one [`SliceSpec`] per leading axis, numpy style:
//! an integer index drops its axis, a range keeps it. Axes without a spec
//! are selected entirely.
//!
//! # Example
//!
//! ```
//! use h5view::selection::Selection;
//!
//! // Rows 2..4, columns 3..5 of a 100x100 dataset
//! let sel = Selection::from([2..4, 3..5]);
//! assert_eq!(sel.output_shape(&[100, 100]).unwrap(), vec![2, 2]);
//!
//! // The same thing from text
//! let parsed: Selection = "2:4, 3:5".parse().unwrap();
//! assert_eq!(parsed, sel);
//! ```

use std::fmt;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Selection along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceSpec {
    /// A single position; negative values count from the end.
    Index(i64),
    /// A strided range; bounds clamp to the axis extent.
    Range {
        start: Option<i64>,
        end: Option<i64>,
        step: u64,
    },
}

impl SliceSpec {
    /// The whole axis.
    pub const FULL: SliceSpec = SliceSpec::Range {
        start: None,
        end: None,
        step: 1,
    };
}

impl From<i64> for SliceSpec {
    fn from(i: i64) -> Self {
        SliceSpec::Index(i)
    }
}

impl From<Range<i64>> for SliceSpec {
    fn from(r: Range<i64>) -> Self {
        SliceSpec::Range {
            start: Some(r.start),
            end: Some(r.end),
            step: 1,
        }
    }
}

impl From<RangeFrom<i64>> for SliceSpec {
    fn from(r: RangeFrom<i64>) -> Self {
        SliceSpec::Range {
            start: Some(r.start),
            end: None,
            step: 1,
        }
    }
}

impl From<RangeTo<i64>> for SliceSpec {
    fn from(r: RangeTo<i64>) -> Self {
        SliceSpec::Range {
            start: None,
            end: Some(r.end),
            step: 1,
        }
    }
}

impl From<RangeFull> for SliceSpec {
    fn from(_: RangeFull) -> Self {
        SliceSpec::FULL
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SliceSpec::Index(i) => write!(f, "{i}"),
            SliceSpec::Range { start, end, step } => {
                if let Some(s) = start {
                    write!(f, "{s}")?;
                }
                write!(f, ":")?;
                if let Some(e) = end {
                    write!(f, "{e}")?;
                }
                if *step != 1 {
                    write!(f, ":{step}")?;
                }
                Ok(())
            }
        }
    }
}

/// A resolved, in-bounds selection along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSlice {
    pub start: usize,
    pub end: usize,
    pub step: usize,
    /// `true` for integer indices: the axis is removed from the output.
    pub collapse: bool,
}

impl AxisSlice {
    /// Number of selected positions along this axis.
    pub fn len(&self) -> usize {
        if self.end <= self.start {
            0
        } else {
            (self.end - self.start).div_ceil(self.step)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An index expression over a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    specs: Vec<SliceSpec>,
}

impl Selection {
    pub fn new(specs: Vec<SliceSpec>) -> Self {
        Self { specs }
    }

    /// Select everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Contiguous ranges, one per leading axis.
    pub fn slice(ranges: &[Range<i64>]) -> Self {
        Self {
            specs: ranges.iter().cloned().map(SliceSpec::from).collect(),
        }
    }

    pub fn specs(&self) -> &[SliceSpec] {
        &self.specs
    }

    /// Resolve against a dataspace shape, one [`AxisSlice`] per axis.
    ///
    /// Ranges clamp to the extent like Python slices; integer indices
    /// must be in bounds.
    pub fn resolve(&self, shape: &[usize]) -> Result<Vec<AxisSlice>> {
        if self.specs.len() > shape.len() {
            return Err(Error::Selection(format!(
                "too many indices: dataset is {}-dimensional, but {} were given",
                shape.len(),
                self.specs.len()
            )));
        }
        let mut resolved = Vec::with_capacity(shape.len());
        for (axis, &len) in shape.iter().enumerate() {
            let spec = self.specs.get(axis).copied().unwrap_or(SliceSpec::FULL);
            resolved.push(resolve_axis(spec, axis, len)?);
        }
        Ok(resolved)
    }

    /// Shape of the data this selection produces.
    pub fn output_shape(&self, shape: &[usize]) -> Result<Vec<usize>> {
        Ok(self
            .resolve(shape)?
            .iter()
            .filter(|s| !s.collapse)
            .map(AxisSlice::len)
            .collect())
    }
}

fn resolve_axis(spec: SliceSpec, axis: usize, len: usize) -> Result<AxisSlice> {
    let extent = len as i64;
    match spec {
        SliceSpec::Index(i) => {
            let idx = if i < 0 { i + extent } else { i };
            if idx < 0 || idx >= extent {
                return Err(Error::Selection(format!(
                    "index {i} is out of bounds for axis {axis} with size {len}"
                )));
            }
            Ok(AxisSlice {
                start: idx as usize,
                end: idx as usize + 1,
                step: 1,
                collapse: true,
            })
        }
        SliceSpec::Range { start, end, step } => {
            if step == 0 {
                return Err(Error::Selection("slice step cannot be zero".into()));
            }
            if step > isize::MAX as u64 {
                return Err(Error::Selection(format!("slice step {step} is too large")));
            }
            let clamp = |v: i64| {
                let v = if v < 0 { v + extent } else { v };
                v.clamp(0, extent) as usize
            };
            let start = start.map_or(0, clamp);
            let end = end.map_or(len, clamp).max(start);
            Ok(AxisSlice {
                start,
                end,
                step: step as usize,
                collapse: false,
            })
        }
    }
}

impl<const N: usize, T: Into<SliceSpec>> From<[T; N]> for Selection {
    fn from(specs: [T; N]) -> Self {
        Self {
            specs: specs.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<SliceSpec> for Selection {
    fn from(spec: SliceSpec) -> Self {
        Self { specs: vec![spec] }
    }
}

impl From<Vec<SliceSpec>> for Selection {
    fn from(specs: Vec<SliceSpec>) -> Self {
        Self { specs }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.specs.iter().map(|s| s.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

impl FromStr for Selection {
    type Err = Error;

    /// Parse a Python-style index expression: `"2:4, 3:5"`, `"0, ::2, -1"`.
    /// The empty string and `"..."` select everything.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().trim_start_matches('[').trim_end_matches(']').trim();
        if s.is_empty() || s == "..." {
            return Ok(Self::all());
        }
        s.split(',').map(parse_spec).collect::<Result<Vec<_>>>().map(Self::new)
    }
}

fn parse_spec(part: &str) -> Result<SliceSpec> {
    let part = part.trim();
    if !part.contains(':') {
        return parse_int(part).map(SliceSpec::Index);
    }
    let fields: Vec<&str> = part.split(':').map(str::trim).collect();
    if fields.len() > 3 {
        return Err(Error::Selection(format!("malformed slice: {part}")));
    }
    let bound = |f: &str| -> Result<Option<i64>> {
        if f.is_empty() {
            Ok(None)
        } else {
            parse_int(f).map(Some)
        }
    };
    let start = bound(fields[0])?;
    let end = bound(fields[1])?;
    let step = match fields.get(2) {
        None | Some(&"") => 1,
        Some(f) => f
            .parse::<u64>()
            .map_err(|_| Error::Selection(format!("step must be a positive integer: {f}")))?,
    };
    Ok(SliceSpec::Range { start, end, step })
}

fn parse_int(s: &str) -> Result<i64> {
    s.parse::<i64>()
        .map_err(|_| Error::Selection(format!("not an integer: {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_basic() {
        let sel = Selection::slice(&[20..30, 40..60]);
        assert_eq!(sel.output_shape(&[100, 100]).unwrap(), vec![10, 20]);
    }

    #[test]
    fn missing_axes_select_everything() {
        let sel = Selection::from([1..3]);
        assert_eq!(sel.output_shape(&[5, 6, 7]).unwrap(), vec![2, 6, 7]);
        assert_eq!(Selection::all().output_shape(&[4, 4]).unwrap(), vec![4, 4]);
    }

    #[test]
    fn index_collapses_axis() {
        let sel = Selection::new(vec![SliceSpec::Index(0), SliceSpec::from(1..3)]);
        assert_eq!(sel.output_shape(&[5, 6]).unwrap(), vec![2]);
    }

    #[test]
    fn negative_index_counts_from_end() {
        let sel = Selection::from([SliceSpec::Index(-1)]);
        let resolved = sel.resolve(&[5]).unwrap();
        assert_eq!(resolved[0].start, 4);
        assert!(resolved[0].collapse);
    }

    #[test]
    fn index_out_of_bounds() {
        let err = Selection::from([SliceSpec::Index(5)]).resolve(&[5]).unwrap_err();
        assert!(matches!(err, Error::Selection(_)));
        let err = Selection::from([SliceSpec::Index(-6)]).resolve(&[5]).unwrap_err();
        assert!(matches!(err, Error::Selection(_)));
    }

    #[test]
    fn ranges_clamp() {
        let sel = Selection::from([95..200]);
        assert_eq!(sel.output_shape(&[100]).unwrap(), vec![5]);
        let sel = Selection::from([-3..]);
        assert_eq!(sel.output_shape(&[10]).unwrap(), vec![3]);
        let sel = Selection::from([8..2]);
        assert_eq!(sel.output_shape(&[10]).unwrap(), vec![0]);
    }

    #[test]
    fn strided_length() {
        let s = AxisSlice {
            start: 0,
            end: 10,
            step: 3,
            collapse: false,
        };
        assert_eq!(s.len(), 4); // 0, 3, 6, 9
    }

    #[test]
    fn oversized_step_is_rejected() {
        let sel: Selection = "0, ::18446744073709551615".parse().unwrap();
        assert!(matches!(sel.resolve(&[100, 100]), Err(Error::Selection(_))));
        assert!(matches!(sel.output_shape(&[100, 100]), Err(Error::Selection(_))));

        let largest = format!("::{}", isize::MAX);
        let sel: Selection = largest.parse().unwrap();
        assert_eq!(sel.output_shape(&[100]).unwrap(), vec![1]);
    }

    #[test]
    fn too_many_indices() {
        let err = Selection::from([0..1, 0..1, 0..1]).resolve(&[2, 2]).unwrap_err();
        assert!(err.to_string().contains("too many indices"));
    }

    #[test]
    fn parse_python_syntax() {
        let sel: Selection = "0, ::2, -1".parse().unwrap();
        assert_eq!(
            sel.specs(),
            &[
                SliceSpec::Index(0),
                SliceSpec::Range {
                    start: None,
                    end: None,
                    step: 2
                },
                SliceSpec::Index(-1),
            ]
        );
        let sel: Selection = "[1:3]".parse().unwrap();
        assert_eq!(sel, Selection::from([1..3]));
        assert_eq!("".parse::<Selection>().unwrap(), Selection::all());
        assert_eq!("...".parse::<Selection>().unwrap(), Selection::all());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("a:b".parse::<Selection>().is_err());
        assert!("1:2:3:4".parse::<Selection>().is_err());
        assert!("::-1".parse::<Selection>().is_err());
        assert!(matches!(
            "::0".parse::<Selection>().unwrap().resolve(&[3]),
            Err(Error::Selection(_))
        ));
    }

    #[test]
    fn display_round_trips_text() {
        let sel: Selection = "2:4, :, 1::2".parse().unwrap();
        assert_eq!(sel.to_string(), "[2:4, :, 1::2]");
        assert_eq!(sel.to_string().parse::<Selection>().unwrap(), sel);
    }
}

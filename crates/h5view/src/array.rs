//! Typed n-dimensional results of region reads.

use std::fmt;

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Slice};

use crate::error::{Error, Result};
use crate::selection::Selection;

/// Data read from a dataset region.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    U8(ArrayD<u8>),
    U64(ArrayD<u64>),
    String(ArrayD<String>),
}

macro_rules! dispatch {
    ($self:expr, $a:ident => $body:expr) => {
        match $self {
            Array::F32($a) => $body,
            Array::F64($a) => $body,
            Array::I32($a) => $body,
            Array::I64($a) => $body,
            Array::U8($a) => $body,
            Array::U64($a) => $body,
            Array::String($a) => $body,
        }
    };
}

impl Array {
    pub fn shape(&self) -> &[usize] {
        dispatch!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        dispatch!(self, a => a.ndim())
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        dispatch!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Array::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&ArrayD<f64>> {
        match self {
            Array::F64(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&ArrayD<i32>> {
        match self {
            Array::I32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            Array::I64(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&ArrayD<String>> {
        match self {
            Array::String(a) => Some(a),
            _ => None,
        }
    }

    /// All numeric elements widened to `f64`, in row-major order.
    ///
    /// Returns `None` for string data.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Array::F32(a) => Some(a.iter().map(|&v| v as f64).collect()),
            Array::F64(a) => Some(a.iter().copied().collect()),
            Array::I32(a) => Some(a.iter().map(|&v| v as f64).collect()),
            Array::I64(a) => Some(a.iter().map(|&v| v as f64).collect()),
            Array::U8(a) => Some(a.iter().map(|&v| v as f64).collect()),
            Array::U64(a) => Some(a.iter().map(|&v| v as f64).collect()),
            Array::String(_) => None,
        }
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, a => write!(f, "{a}"))
    }
}

/// Cut `selection` out of a flat row-major buffer of the given shape.
pub(crate) fn select<T: Clone>(
    path: &str,
    data: &[T],
    shape: &[u64],
    selection: &Selection,
) -> Result<ArrayD<T>> {
    let dims = shape
        .iter()
        .map(|&d| usize::try_from(d))
        .collect::<std::result::Result<Vec<usize>, _>>()
        .map_err(|_| Error::backend(path, format!("shape {shape:?} does not fit in memory")))?;
    let expected = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| Error::backend(path, format!("shape {shape:?} is too large")))?;
    if data.len() != expected {
        return Err(Error::backend(
            path,
            format!("{} elements stored for shape {shape:?}", data.len()),
        ));
    }
    let view = ArrayViewD::from_shape(IxDyn(&dims), data)
        .map_err(|e| Error::backend(path, format!("data does not match shape: {e}")))?;
    select_view(view, selection)
}

/// Apply `selection` to an n-dimensional view and copy the result out.
pub(crate) fn select_view<T: Clone>(
    mut view: ArrayViewD<'_, T>,
    selection: &Selection,
) -> Result<ArrayD<T>> {
    let resolved = selection.resolve(view.shape())?;
    for (axis, s) in resolved.iter().enumerate() {
        view.slice_axis_inplace(
            Axis(axis),
            Slice::new(s.start as isize, Some(s.end as isize), s.step as isize),
        );
    }
    for (axis, s) in resolved.iter().enumerate().rev() {
        if s.collapse {
            view = view.index_axis_move(Axis(axis), 0);
        }
    }
    Ok(view.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<i32> {
        (0..20).collect()
    }

    #[test]
    fn select_block() {
        let out = select("/d", &grid(), &[4, 5], &Selection::from([1..3, 2..4])).unwrap();
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![7, 8, 12, 13]);
    }

    #[test]
    fn select_with_index_drops_axis() {
        let sel: Selection = "2, 1:5:2".parse().unwrap();
        let out = select("/d", &grid(), &[4, 5], &sel).unwrap();
        assert_eq!(out.shape(), &[2]);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![11, 13]);
    }

    #[test]
    fn select_scalar_element() {
        let sel: Selection = "-1, -1".parse().unwrap();
        let out = select("/d", &grid(), &[4, 5], &sel).unwrap();
        assert_eq!(out.ndim(), 0);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![19]);
    }

    #[test]
    fn shape_mismatch_is_backend_error() {
        let err = select("/d", &grid(), &[3, 3], &Selection::all()).unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
    }

    #[test]
    fn huge_step_keeps_first_element_only() {
        let sel: Selection = format!("::{}, 0", isize::MAX).parse().unwrap();
        let out = select("/d", &grid(), &[4, 5], &sel).unwrap();
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![0]);

        let sel: Selection = "::18446744073709551615".parse().unwrap();
        let err = select("/d", &grid(), &[4, 5], &sel).unwrap_err();
        assert!(matches!(err, Error::Selection(_)));
    }

    #[test]
    fn oversized_shape_is_backend_error() {
        let err = select("/d", &grid(), &[1 << 32, 1 << 32, 1 << 32], &Selection::all()).unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
    }

    #[test]
    fn array_accessors() {
        let arr = Array::I32(select("/d", &grid(), &[4, 5], &Selection::all()).unwrap());
        assert_eq!(arr.shape(), &[4, 5]);
        assert_eq!(arr.len(), 20);
        assert!(arr.as_i32().is_some());
        assert!(arr.as_f64().is_none());
        assert_eq!(arr.to_f64_vec().unwrap()[19], 19.0);
    }
}

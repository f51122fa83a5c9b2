/// Column backends
///
/// A backend is the storage and compute engine under a [`ScalarColumn`].
/// The set of backends is closed: [`BackendData`] is a tagged union over
/// [`PandasBackend`] and [`ArrowBackend`], both implementing the shared
/// [`ColumnBackend`] capability trait (construct, index, binary op,
/// aggregate). Callers pick one with a [`BackendKind`] selector.
///
/// The two backends agree on every result except where their native
/// numeric libraries differ:
///
/// | capability      | pandas                  | arrow                      |
/// |-----------------|-------------------------|----------------------------|
/// | storage         | contiguous array        | chunks of ~√N values       |
/// | `%` sign        | sign of the divisor     | sign of the dividend       |
/// | median          | native (selection)      | fallback sort, warns       |
///
/// [`ScalarColumn`]: crate::column::ScalarColumn

use crate::error::{FallbackWarning, FrameError, Result, Warned};
use crate::kernels::{self, ArithOp, CompareOp, LogicalOp, ModConvention};
use crate::sequence::{ArraySequence, ChunkedSequence, Sequence};
use crate::value::{DType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Contiguous array storage (default).
    #[default]
    Pandas,
    /// Chunked columnar storage.
    Arrow,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Pandas => "pandas",
            BackendKind::Arrow => "arrow",
        }
    }
}

impl FromStr for BackendKind {
    type Err = FrameError;

    /// Accepts "pandas" or "arrow", case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pandas" => Ok(BackendKind::Pandas),
            "arrow" => Ok(BackendKind::Arrow),
            _ => Err(FrameError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a backend operation.
#[derive(Debug, Clone, Copy)]
pub enum Rhs<'a> {
    Column(&'a BackendData),
    Scalar(&'a Value),
}

impl Rhs<'_> {
    fn dtype(&self) -> DType {
        match self {
            Rhs::Column(c) => c.dtype(),
            Rhs::Scalar(v) => v.dtype(),
        }
    }
}

/// Capabilities every backend provides.
pub trait ColumnBackend: Sized {
    const KIND: BackendKind;

    fn from_values(dtype: DType, values: Vec<Value>) -> Self;

    fn dtype(&self) -> DType;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Result<&Value>;

    fn set(&mut self, index: usize, value: Value) -> Result<()>;

    fn delete(&mut self, index: usize) -> Result<Value>;

    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_>;

    fn modulo(&self) -> ModConvention;

    /// Median computed by a backend-native kernel, or `None` if the backend
    /// has none.
    fn native_median(&self) -> Option<f64> {
        None
    }

    fn take(&self, positions: &[usize]) -> Result<Self> {
        let values = positions
            .iter()
            .map(|&i| self.get(i).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_values(self.dtype(), values))
    }

    fn arith(&self, op: ArithOp, rhs: Rhs<'_>, reflected: bool) -> Result<Self> {
        let (left, right) = if reflected {
            (rhs.dtype(), self.dtype())
        } else {
            (self.dtype(), rhs.dtype())
        };
        let (dtype, values) = kernels::arith(op, self.modulo(), left, right, pairs(self, rhs, reflected)?)?;
        Ok(Self::from_values(dtype, values))
    }

    fn compare(&self, op: CompareOp, rhs: Rhs<'_>) -> Result<Self> {
        let values = kernels::compare(op, self.dtype(), rhs.dtype(), pairs(self, rhs, false)?)?;
        Ok(Self::from_values(DType::Bool, values))
    }

    fn logical(&self, op: LogicalOp, rhs: Rhs<'_>) -> Result<Self> {
        let values = kernels::logical(op, self.dtype(), rhs.dtype(), pairs(self, rhs, false)?)?;
        Ok(Self::from_values(DType::Bool, values))
    }
}

/// Zip `this` with the right-hand side, broadcasting scalars. With
/// `reflected` the scalar comes first in each pair.
fn pairs<'a, B: ColumnBackend>(
    this: &'a B,
    rhs: Rhs<'a>,
    reflected: bool,
) -> Result<Box<dyn Iterator<Item = (&'a Value, &'a Value)> + 'a>> {
    match rhs {
        Rhs::Column(other) => {
            if other.len() != this.len() {
                return Err(FrameError::LengthMismatch {
                    expected: this.len(),
                    actual: other.len(),
                });
            }
            Ok(Box::new(this.values().zip(other.values())))
        }
        Rhs::Scalar(scalar) if reflected => Ok(Box::new(this.values().map(move |v| (scalar, v)))),
        Rhs::Scalar(scalar) => Ok(Box::new(this.values().map(move |v| (v, scalar)))),
    }
}

/// Contiguous array backend.
#[derive(Debug, Clone)]
pub struct PandasBackend {
    dtype: DType,
    data: ArraySequence<Value>,
}

impl ColumnBackend for PandasBackend {
    const KIND: BackendKind = BackendKind::Pandas;

    fn from_values(dtype: DType, values: Vec<Value>) -> Self {
        PandasBackend {
            dtype,
            data: ArraySequence::from_vec(values),
        }
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, index: usize) -> Result<&Value> {
        self.data.get(index)
    }

    fn set(&mut self, index: usize, value: Value) -> Result<()> {
        self.data.set(index, value)
    }

    fn delete(&mut self, index: usize) -> Result<Value> {
        self.data.delete(index)
    }

    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        Box::new(self.data.as_slice().iter())
    }

    fn modulo(&self) -> ModConvention {
        ModConvention::Floored
    }

    fn native_median(&self) -> Option<f64> {
        let mut nums: Vec<f64> = numbers(self.data.as_slice().iter()).collect();
        if nums.is_empty() {
            return Some(f64::NAN);
        }
        let n = nums.len();
        let (lower, upper, _) = nums.select_nth_unstable_by(n / 2, f64::total_cmp);
        if n % 2 == 1 {
            return Some(*upper);
        }
        // Even length: the other middle value is the largest of the lower half
        let below = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((below + *upper) / 2.0)
    }
}

/// Chunked columnar backend.
#[derive(Debug, Clone)]
pub struct ArrowBackend {
    dtype: DType,
    data: ChunkedSequence<Value>,
}

impl ColumnBackend for ArrowBackend {
    const KIND: BackendKind = BackendKind::Arrow;

    fn from_values(dtype: DType, values: Vec<Value>) -> Self {
        ArrowBackend {
            dtype,
            data: ChunkedSequence::from_vec(values),
        }
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, index: usize) -> Result<&Value> {
        self.data.get(index)
    }

    fn set(&mut self, index: usize, value: Value) -> Result<()> {
        self.data.set(index, value)
    }

    fn delete(&mut self, index: usize) -> Result<Value> {
        self.data.delete(index)
    }

    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        self.data.iter()
    }

    fn modulo(&self) -> ModConvention {
        ModConvention::Truncated
    }
}

/// The closed set of backends a column can hold.
#[derive(Debug, Clone)]
pub enum BackendData {
    Pandas(PandasBackend),
    Arrow(ArrowBackend),
}

macro_rules! dispatch {
    ($data:expr, $b:ident => $body:expr) => {
        match $data {
            BackendData::Pandas($b) => $body,
            BackendData::Arrow($b) => $body,
        }
    };
}

macro_rules! dispatch_build {
    ($data:expr, $b:ident => $body:expr) => {
        match $data {
            BackendData::Pandas($b) => BackendData::Pandas($body),
            BackendData::Arrow($b) => BackendData::Arrow($body),
        }
    };
}

impl BackendData {
    pub fn from_values(kind: BackendKind, dtype: DType, values: Vec<Value>) -> Self {
        match kind {
            BackendKind::Pandas => BackendData::Pandas(PandasBackend::from_values(dtype, values)),
            BackendKind::Arrow => BackendData::Arrow(ArrowBackend::from_values(dtype, values)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            BackendData::Pandas(_) => PandasBackend::KIND,
            BackendData::Arrow(_) => ArrowBackend::KIND,
        }
    }

    pub fn dtype(&self) -> DType {
        dispatch!(self, b => b.dtype())
    }

    pub fn len(&self) -> usize {
        dispatch!(self, b => b.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Result<&Value> {
        dispatch!(self, b => b.get(index))
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        dispatch!(self, b => b.set(index, value))
    }

    pub fn delete(&mut self, index: usize) -> Result<Value> {
        dispatch!(self, b => b.delete(index))
    }

    pub fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        dispatch!(self, b => b.values())
    }

    pub fn take(&self, positions: &[usize]) -> Result<Self> {
        Ok(dispatch_build!(self, b => b.take(positions)?))
    }

    /// Same backend, new values.
    pub fn rebuild(&self, dtype: DType, values: Vec<Value>) -> Self {
        BackendData::from_values(self.kind(), dtype, values)
    }

    pub fn arith(&self, op: ArithOp, rhs: Rhs<'_>, reflected: bool) -> Result<Self> {
        Ok(dispatch_build!(self, b => b.arith(op, rhs, reflected)?))
    }

    pub fn compare(&self, op: CompareOp, rhs: Rhs<'_>) -> Result<Self> {
        Ok(dispatch_build!(self, b => b.compare(op, rhs)?))
    }

    pub fn logical(&self, op: LogicalOp, rhs: Rhs<'_>) -> Result<Self> {
        Ok(dispatch_build!(self, b => b.logical(op, rhs)?))
    }

    /// Median of the numeric values, NaN skipped. Backends without a native
    /// kernel sort a copy of the data and attach a [`FallbackWarning`].
    pub fn median(&self) -> Warned<f64> {
        let native = dispatch!(self, b => b.native_median());
        match native {
            Some(median) => Warned::clean(median),
            None => Warned::with_warning(
                sorted_median(self.values()),
                FallbackWarning::NoNativeKernel {
                    backend: self.kind().as_str(),
                    operation: "median",
                },
            ),
        }
    }
}

/// Numeric view of `values`, NaN skipped.
fn numbers<'a>(values: impl Iterator<Item = &'a Value>) -> impl Iterator<Item = f64> {
    values.filter_map(Value::as_f64).filter(|v| !v.is_nan())
}

fn sorted_median<'a>(values: impl Iterator<Item = &'a Value>) -> f64 {
    let mut nums: Vec<f64> = numbers(values).collect();
    if nums.is_empty() {
        return f64::NAN;
    }
    nums.sort_by(f64::total_cmp);
    let mid = nums.len() / 2;
    if nums.len() % 2 == 0 {
        (nums[mid - 1] + nums[mid]) / 2.0
    } else {
        nums[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(kind: BackendKind, values: &[i64]) -> BackendData {
        BackendData::from_values(kind, DType::Int, values.iter().map(|v| Value::Int(*v)).collect())
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("pandas".parse::<BackendKind>().unwrap(), BackendKind::Pandas);
        assert_eq!("Arrow".parse::<BackendKind>().unwrap(), BackendKind::Arrow);
        assert_eq!(
            "torch".parse::<BackendKind>(),
            Err(FrameError::UnknownBackend("torch".to_string()))
        );
        assert_eq!(BackendKind::default(), BackendKind::Pandas);
    }

    #[test]
    fn test_modulo_differs_by_backend() {
        for (kind, expected) in [(BackendKind::Pandas, 2), (BackendKind::Arrow, -1)] {
            let col = ints(kind, &[-7]);
            let out = col.arith(ArithOp::Mod, Rhs::Scalar(&Value::Int(3)), false).unwrap();
            assert_eq!(out.kind(), kind);
            assert_eq!(*out.get(0).unwrap(), Value::Int(expected));
        }
    }

    #[test]
    fn test_reflected_scalar_order() {
        let col = ints(BackendKind::Pandas, &[1, 2, 3]);
        let out = col.arith(ArithOp::Sub, Rhs::Scalar(&Value::Int(10)), true).unwrap();
        let values: Vec<Value> = out.values().cloned().collect();
        assert_eq!(values, vec![Value::Int(9), Value::Int(8), Value::Int(7)]);
    }

    #[test]
    fn test_length_mismatch() {
        let a = ints(BackendKind::Arrow, &[1, 2, 3]);
        let b = ints(BackendKind::Arrow, &[1, 2]);
        let err = a.arith(ArithOp::Add, Rhs::Column(&b), false).unwrap_err();
        assert_eq!(err, FrameError::LengthMismatch { expected: 3, actual: 2 });
    }

    #[test]
    fn test_median_native_and_fallback() {
        for values in [&[5, 1, 4, 2][..], &[3, 9, 1][..]] {
            let pandas = ints(BackendKind::Pandas, values).median();
            let arrow = ints(BackendKind::Arrow, values).median();
            assert!(!pandas.has_warnings());
            assert!(arrow.has_warnings());
            assert_eq!(pandas.value(), arrow.value());
        }
        assert_eq!(*ints(BackendKind::Pandas, &[5, 1, 4, 2]).median().value(), 3.0);
        assert_eq!(*ints(BackendKind::Arrow, &[3, 9, 1]).median().value(), 3.0);
    }

    #[test]
    fn test_take_keeps_backend() {
        let col = ints(BackendKind::Arrow, &[10, 20, 30]);
        let taken = col.take(&[2, 0, 2]).unwrap();
        assert_eq!(taken.kind(), BackendKind::Arrow);
        let values: Vec<Value> = taken.values().cloned().collect();
        assert_eq!(values, vec![Value::Int(30), Value::Int(10), Value::Int(30)]);
        assert!(col.take(&[3]).is_err());
    }
}

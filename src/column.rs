/// ScalarColumn: a backend-polymorphic column
///
/// A ScalarColumn holds one [`BackendData`] and forwards every operator and
/// aggregation to it. Results are always new ScalarColumns on the backend of
/// the column operand, so callers never see backend-specific types.
///
/// # Examples
///
/// ```
/// use liveframe::{ScalarColumn, Value};
///
/// let a = ScalarColumn::new(vec![1i64, 4, 6, 8], Some("arrow")).unwrap();
/// let b = ScalarColumn::new(vec![2i64, 5, 7, 9], Some("arrow")).unwrap();
///
/// let sum = (&a + &b).unwrap();
/// assert!(sum.equals(&ScalarColumn::new(vec![3i64, 9, 13, 17], Some("arrow")).unwrap()));
///
/// let halves = (&a / 2).unwrap();
/// assert_eq!(*halves.get(0).unwrap(), Value::Float(0.5));
///
/// assert_eq!(a.sum().unwrap(), Value::Int(19));
/// ```

use crate::backend::{ArrowBackend, BackendData, BackendKind, PandasBackend, Rhs};
use crate::error::{FrameError, Result, Warned};
use crate::kernels::{ArithOp, CompareOp, LogicalOp};
use crate::value::{DType, Value};
use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Not, Range, Rem, Sub};

/// Raw input accepted by [`ScalarColumn::new`].
#[derive(Debug, Clone)]
pub enum ColumnSource {
    /// Values of a known dtype
    Typed { dtype: DType, values: Vec<Value> },
    /// Values whose dtype is inferred at construction
    Untyped(Vec<Value>),
    /// An existing backend-native structure
    Native(BackendData),
}

impl ColumnSource {
    fn into_backend(self, kind: Option<BackendKind>) -> Result<BackendData> {
        match self {
            ColumnSource::Typed { dtype, values } => {
                Ok(BackendData::from_values(kind.unwrap_or_default(), dtype, values))
            }
            ColumnSource::Untyped(values) => {
                let (dtype, values) = infer_dtype(values)?;
                Ok(BackendData::from_values(kind.unwrap_or_default(), dtype, values))
            }
            ColumnSource::Native(data) => match kind {
                Some(kind) if kind != data.kind() => Ok(BackendData::from_values(
                    kind,
                    data.dtype(),
                    data.values().cloned().collect(),
                )),
                _ => Ok(data),
            },
        }
    }
}

/// Pick a single dtype for a list of values. Ints mixed with floats become
/// floats; any other mix is an error. An empty list is Float.
fn infer_dtype(values: Vec<Value>) -> Result<(DType, Vec<Value>)> {
    let mut dtype: Option<DType> = None;
    for value in &values {
        let next = value.dtype();
        dtype = Some(match (dtype, next) {
            (None, next) => next,
            (Some(current), next) if current == next => current,
            (Some(DType::Int), DType::Float) | (Some(DType::Float), DType::Int) => DType::Float,
            (Some(current), next) => {
                return Err(FrameError::TypeMismatch {
                    op: "column construction",
                    left: current,
                    right: next,
                })
            }
        });
    }
    let dtype = dtype.unwrap_or(DType::Float);
    let values = values
        .into_iter()
        .map(|v| {
            let found = v.dtype();
            v.coerce(dtype)
                .ok_or(FrameError::InvalidValue { expected: dtype, found })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((dtype, values))
}

macro_rules! typed_source {
    ($($t:ty => $dtype:ident, $conv:expr);* $(;)?) => {
        $(
            impl From<Vec<$t>> for ColumnSource {
                fn from(values: Vec<$t>) -> Self {
                    ColumnSource::Typed {
                        dtype: DType::$dtype,
                        values: values.into_iter().map($conv).collect(),
                    }
                }
            }

            impl From<&[$t]> for ColumnSource {
                fn from(values: &[$t]) -> Self {
                    ColumnSource::from(values.to_vec())
                }
            }
        )*
    };
}

typed_source! {
    i64 => Int, Value::Int;
    i32 => Int, |v: i32| Value::Int(v as i64);
    f64 => Float, Value::Float;
    bool => Bool, Value::Bool;
    String => Str, Value::Str;
    &str => Str, |v: &str| Value::Str(v.to_string());
}

impl From<Vec<Value>> for ColumnSource {
    fn from(values: Vec<Value>) -> Self {
        ColumnSource::Untyped(values)
    }
}

impl From<BackendData> for ColumnSource {
    fn from(data: BackendData) -> Self {
        ColumnSource::Native(data)
    }
}

impl From<PandasBackend> for ColumnSource {
    fn from(data: PandasBackend) -> Self {
        ColumnSource::Native(BackendData::Pandas(data))
    }
}

impl From<ArrowBackend> for ColumnSource {
    fn from(data: ArrowBackend) -> Self {
        ColumnSource::Native(BackendData::Arrow(data))
    }
}

/// The other side of a binary column operation.
#[derive(Debug, Clone)]
pub enum Operand<'a> {
    Column(&'a ScalarColumn),
    Scalar(Value),
}

impl Operand<'_> {
    fn rhs(&self) -> Rhs<'_> {
        match self {
            Operand::Column(col) => Rhs::Column(&col.data),
            Operand::Scalar(value) => Rhs::Scalar(value),
        }
    }
}

impl<'a> From<&'a ScalarColumn> for Operand<'a> {
    fn from(col: &'a ScalarColumn) -> Self {
        Operand::Column(col)
    }
}

macro_rules! scalar_operand {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand<'_> {
                fn from(value: $t) -> Self {
                    Operand::Scalar(value.into())
                }
            }
        )*
    };
}

scalar_operand!(Value, i64, i32, f64, bool, &str, String);

/// A column of scalar values on one backend.
#[derive(Debug, Clone)]
pub struct ScalarColumn {
    data: BackendData,
}

impl ScalarColumn {
    /// Create a column from raw data and an optional backend selector
    /// ("pandas" or "arrow"). Without a selector, backend-native input keeps
    /// its backend and everything else goes to pandas.
    pub fn new(data: impl Into<ColumnSource>, backend: Option<&str>) -> Result<Self> {
        let kind = backend.map(str::parse::<BackendKind>).transpose()?;
        Ok(ScalarColumn {
            data: data.into().into_backend(kind)?,
        })
    }

    pub fn with_kind(data: impl Into<ColumnSource>, kind: BackendKind) -> Result<Self> {
        Ok(ScalarColumn {
            data: data.into().into_backend(Some(kind))?,
        })
    }

    /// Create a column from a JSON array of scalars. The dtype is inferred
    /// as for `Vec<Value>` input; nulls, arrays and objects are rejected.
    pub fn from_json(values: &[serde_json::Value], backend: Option<&str>) -> Result<Self> {
        let values = values
            .iter()
            .map(|raw| {
                Value::from_json(raw).ok_or_else(|| {
                    FrameError::InvalidRequest(format!("unsupported JSON value {} in column", raw))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        ScalarColumn::new(values, backend)
    }

    fn from_data(data: BackendData) -> Self {
        ScalarColumn { data }
    }

    /// The backend-native structure under this column.
    pub fn data(&self) -> &BackendData {
        &self.data
    }

    pub fn backend(&self) -> BackendKind {
        self.data.kind()
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Value> {
        self.data.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> + '_ {
        self.data.values()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.iter().cloned().collect()
    }

    /// Copy of this column on another backend.
    pub fn to_backend(&self, kind: BackendKind) -> ScalarColumn {
        ScalarColumn::from_data(BackendData::from_values(kind, self.dtype(), self.to_vec()))
    }

    // ==================== Selection ====================

    /// Rows at `positions`, in that order. Positions may repeat.
    pub fn take(&self, positions: &[usize]) -> Result<ScalarColumn> {
        Ok(ScalarColumn::from_data(self.data.take(positions)?))
    }

    /// Rows in `range`; the end is clamped to the column length.
    pub fn slice(&self, range: Range<usize>) -> Result<ScalarColumn> {
        let end = range.end.min(self.len());
        if range.start > end {
            return Err(FrameError::index(range.start, self.len()));
        }
        self.take(&(range.start..end).collect::<Vec<_>>())
    }

    /// Rows where `mask` is true.
    pub fn filter(&self, mask: &ScalarColumn) -> Result<ScalarColumn> {
        self.take(&mask.true_positions(self.len())?)
    }

    /// Positions of the true values of a boolean mask of length `expected`.
    pub fn true_positions(&self, expected: usize) -> Result<Vec<usize>> {
        if self.dtype() != DType::Bool {
            return Err(FrameError::Unsupported {
                op: "boolean mask",
                dtype: self.dtype(),
            });
        }
        if self.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: self.len(),
            });
        }
        Ok(self
            .iter()
            .enumerate()
            .filter(|(_, v)| v.as_bool() == Some(true))
            .map(|(i, _)| i)
            .collect())
    }

    /// Boolean column: is each value one of `values`?
    pub fn is_in(&self, values: &[Value]) -> ScalarColumn {
        let out = self
            .iter()
            .map(|v| Value::Bool(values.iter().any(|candidate| candidate == v)))
            .collect();
        ScalarColumn::from_data(self.data.rebuild(DType::Bool, out))
    }

    // ==================== Mutation ====================

    /// Overwrite one value in place. The value is converted to the column
    /// dtype first; incompatible values leave the column untouched.
    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        let value = self.coerce(value)?;
        self.data.set(index, value)
    }

    /// Overwrite every position where `mask` is true. Returns the number of
    /// values written.
    pub fn set_masked(&mut self, mask: &ScalarColumn, value: Value) -> Result<usize> {
        let positions = mask.true_positions(self.len())?;
        self.set_positions(&positions, value)
    }

    /// Overwrite every listed position. Nothing is written unless the value
    /// converts and every position is in range.
    pub fn set_positions(&mut self, positions: &[usize], value: Value) -> Result<usize> {
        let value = self.coerce(value)?;
        if let Some(&bad) = positions.iter().find(|&&i| i >= self.len()) {
            return Err(FrameError::index(bad, self.len()));
        }
        for &i in positions {
            self.data.set(i, value.clone())?;
        }
        Ok(positions.len())
    }

    /// Remove the value at `index`, shifting later values down.
    pub fn delete(&mut self, index: usize) -> Result<Value> {
        self.data.delete(index)
    }

    fn coerce(&self, value: Value) -> Result<Value> {
        let found = value.dtype();
        value.coerce(self.dtype()).ok_or(FrameError::InvalidValue {
            expected: self.dtype(),
            found,
        })
    }

    // ==================== Operators ====================

    /// `self op rhs`
    pub fn arith<'a>(&self, op: ArithOp, rhs: impl Into<Operand<'a>>) -> Result<ScalarColumn> {
        let rhs = rhs.into();
        Ok(ScalarColumn::from_data(self.data.arith(op, rhs.rhs(), false)?))
    }

    /// `lhs op self`, with the result on this column's backend.
    pub fn rarith(&self, op: ArithOp, lhs: impl Into<Value>) -> Result<ScalarColumn> {
        let lhs = lhs.into();
        Ok(ScalarColumn::from_data(self.data.arith(op, Rhs::Scalar(&lhs), true)?))
    }

    pub fn floor_div<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<ScalarColumn> {
        self.arith(ArithOp::FloorDiv, rhs)
    }

    pub fn pow<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<ScalarColumn> {
        self.arith(ArithOp::Pow, rhs)
    }

    /// `lhs // self`
    pub fn rfloor_div(&self, lhs: impl Into<Value>) -> Result<ScalarColumn> {
        self.rarith(ArithOp::FloorDiv, lhs)
    }

    /// `lhs ** self`
    pub fn rpow(&self, lhs: impl Into<Value>) -> Result<ScalarColumn> {
        self.rarith(ArithOp::Pow, lhs)
    }

    pub fn compare<'a>(&self, op: CompareOp, rhs: impl Into<Operand<'a>>) -> Result<ScalarColumn> {
        let rhs = rhs.into();
        Ok(ScalarColumn::from_data(self.data.compare(op, rhs.rhs())?))
    }

    /// `lhs op self`
    pub fn rcompare(&self, op: CompareOp, lhs: impl Into<Value>) -> Result<ScalarColumn> {
        self.compare(op.flipped(), lhs.into())
    }

    pub fn equal<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<ScalarColumn> {
        self.compare(CompareOp::Eq, rhs)
    }

    pub fn not_equal<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<ScalarColumn> {
        self.compare(CompareOp::Ne, rhs)
    }

    pub fn lt<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<ScalarColumn> {
        self.compare(CompareOp::Lt, rhs)
    }

    pub fn lt_eq<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<ScalarColumn> {
        self.compare(CompareOp::Le, rhs)
    }

    pub fn gt<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<ScalarColumn> {
        self.compare(CompareOp::Gt, rhs)
    }

    pub fn gt_eq<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<ScalarColumn> {
        self.compare(CompareOp::Ge, rhs)
    }

    pub fn logical<'a>(&self, op: LogicalOp, rhs: impl Into<Operand<'a>>) -> Result<ScalarColumn> {
        let rhs = rhs.into();
        Ok(ScalarColumn::from_data(self.data.logical(op, rhs.rhs())?))
    }

    /// Elementwise boolean negation (`~col`).
    pub fn invert(&self) -> Result<ScalarColumn> {
        if self.dtype() != DType::Bool {
            return Err(FrameError::Unsupported {
                op: "~",
                dtype: self.dtype(),
            });
        }
        let out = self
            .iter()
            .map(|v| Value::Bool(!v.as_bool().unwrap_or(false)))
            .collect();
        Ok(ScalarColumn::from_data(self.data.rebuild(DType::Bool, out)))
    }

    /// Elementwise numeric negation (`-col`).
    pub fn negate(&self) -> Result<ScalarColumn> {
        let out = match self.dtype() {
            DType::Int => self
                .iter()
                .map(|v| Value::Int(v.as_i64().unwrap_or(0).wrapping_neg()))
                .collect(),
            DType::Float => self
                .iter()
                .map(|v| Value::Float(-v.as_f64().unwrap_or(f64::NAN)))
                .collect(),
            dtype => return Err(FrameError::Unsupported { op: "-", dtype }),
        };
        Ok(ScalarColumn::from_data(self.data.rebuild(self.dtype(), out)))
    }

    // ==================== Aggregations ====================

    fn ensure_numeric(&self, op: &'static str) -> Result<()> {
        if !self.dtype().is_numeric() {
            return Err(FrameError::Unsupported {
                op,
                dtype: self.dtype(),
            });
        }
        Ok(())
    }

    /// Numeric values with NaN skipped. Every aggregation ignores NaN.
    fn numeric(&self, op: &'static str) -> Result<impl Iterator<Item = f64> + '_> {
        self.ensure_numeric(op)?;
        Ok(self.iter().filter_map(Value::as_f64).filter(|v| !v.is_nan()))
    }

    pub fn sum(&self) -> Result<Value> {
        match self.dtype() {
            DType::Float => Ok(Value::Float(self.numeric("sum")?.sum())),
            DType::Int | DType::Bool => Ok(Value::Int(
                self.iter()
                    .filter_map(Value::as_i64)
                    .fold(0i64, i64::wrapping_add),
            )),
            dtype => Err(FrameError::Unsupported { op: "sum", dtype }),
        }
    }

    pub fn product(&self) -> Result<Value> {
        match self.dtype() {
            DType::Float => Ok(Value::Float(self.numeric("product")?.product())),
            DType::Int | DType::Bool => Ok(Value::Int(
                self.iter()
                    .filter_map(Value::as_i64)
                    .fold(1i64, i64::wrapping_mul),
            )),
            dtype => Err(FrameError::Unsupported { op: "product", dtype }),
        }
    }

    /// Arithmetic mean; NaN when there is nothing to average.
    pub fn mean(&self) -> Result<f64> {
        let (count, total) = self
            .numeric("mean")?
            .fold((0usize, 0.0), |(n, sum), v| (n + 1, sum + v));
        Ok(if count == 0 { f64::NAN } else { total / count as f64 })
    }

    /// Sample variance (N-1 denominator); NaN for fewer than two values.
    pub fn var(&self) -> Result<f64> {
        let mean = self.mean()?;
        let (count, squares) = self
            .numeric("var")?
            .fold((0usize, 0.0), |(n, acc), v| (n + 1, acc + (v - mean) * (v - mean)));
        if count < 2 {
            return Ok(f64::NAN);
        }
        Ok(squares / (count - 1) as f64)
    }

    /// Sample standard deviation.
    pub fn std(&self) -> Result<f64> {
        Ok(self.var()?.sqrt())
    }

    /// Median of the values, NaN skipped. The result carries a warning when the backend
    /// has no native median kernel.
    pub fn median(&self) -> Result<Warned<f64>> {
        self.ensure_numeric("median")?;
        Ok(self.data.median())
    }

    pub fn min(&self) -> Result<Value> {
        self.extreme("min", std::cmp::Ordering::Less)
    }

    pub fn max(&self) -> Result<Value> {
        self.extreme("max", std::cmp::Ordering::Greater)
    }

    fn extreme(&self, op: &'static str, wanted: std::cmp::Ordering) -> Result<Value> {
        let mut best: Option<&Value> = None;
        for value in self.iter().filter(|v| !is_nan(v)) {
            best = match best {
                Some(current) if value.total_cmp(current) != wanted => Some(current),
                _ => Some(value),
            };
        }
        match best {
            Some(value) => Ok(value.clone()),
            // Every value is NaN
            None if !self.is_empty() => Ok(Value::Float(f64::NAN)),
            None => Err(FrameError::EmptyData(op)),
        }
    }

    /// Every most-frequent value, ascending. NaN is ignored.
    pub fn mode(&self) -> Result<ScalarColumn> {
        let mut sorted: Vec<&Value> = self.iter().filter(|v| !is_nan(v)).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut runs: Vec<(&Value, usize)> = Vec::new();
        for value in sorted {
            match runs.last_mut() {
                Some((last, count)) if last.same_as(value) => *count += 1,
                _ => runs.push((value, 1)),
            }
        }
        let top = runs.iter().map(|(_, count)| *count).max().unwrap_or(0);
        let modes = runs
            .into_iter()
            .filter(|(_, count)| *count == top)
            .map(|(value, _)| value.clone())
            .collect();
        Ok(ScalarColumn::from_data(self.data.rebuild(self.dtype(), modes)))
    }

    pub fn any(&self) -> Result<bool> {
        Ok(self.iter().filter(|v| !is_nan(v)).any(truthy))
    }

    pub fn all(&self) -> Result<bool> {
        Ok(self.iter().filter(|v| !is_nan(v)).all(truthy))
    }

    // ==================== Equality ====================

    /// Deep equality. The backend is part of a column's identity: columns on
    /// different backends are never equal, even with identical values. Same
    /// backend columns are equal when dtype, length and every value match
    /// (NaN matches NaN).
    pub fn equals(&self, other: &ScalarColumn) -> bool {
        self.backend() == other.backend()
            && self.dtype() == other.dtype()
            && self.len() == other.len()
            && self.iter().zip(other.iter()).all(|(a, b)| a.same_as(b))
    }
}

fn is_nan(value: &Value) -> bool {
    matches!(value, Value::Float(f) if f.is_nan())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(v) => *v != 0,
        Value::Float(v) => *v != 0.0,
        Value::Str(s) => !s.is_empty(),
    }
}

// ==================== std::ops ====================
//
// Operators return `Result<ScalarColumn>` because column/column forms fail
// on a length mismatch. Operators are implemented on references so operands
// are not consumed.

macro_rules! column_arith_ops {
    ($($trait:ident, $method:ident, $op:expr);* $(;)?) => {
        $(
            impl<'a, R: Into<Operand<'a>>> $trait<R> for &'a ScalarColumn {
                type Output = Result<ScalarColumn>;

                fn $method(self, rhs: R) -> Self::Output {
                    self.arith($op, rhs)
                }
            }

            impl $trait<&ScalarColumn> for i64 {
                type Output = Result<ScalarColumn>;

                fn $method(self, rhs: &ScalarColumn) -> Self::Output {
                    rhs.rarith($op, self)
                }
            }

            impl $trait<&ScalarColumn> for f64 {
                type Output = Result<ScalarColumn>;

                fn $method(self, rhs: &ScalarColumn) -> Self::Output {
                    rhs.rarith($op, self)
                }
            }
        )*
    };
}

column_arith_ops! {
    Add, add, ArithOp::Add;
    Sub, sub, ArithOp::Sub;
    Mul, mul, ArithOp::Mul;
    Div, div, ArithOp::TrueDiv;
    Rem, rem, ArithOp::Mod;
}

macro_rules! column_logical_ops {
    ($($trait:ident, $method:ident, $op:expr);* $(;)?) => {
        $(
            impl<'a, R: Into<Operand<'a>>> $trait<R> for &'a ScalarColumn {
                type Output = Result<ScalarColumn>;

                fn $method(self, rhs: R) -> Self::Output {
                    self.logical($op, rhs)
                }
            }

            impl $trait<&ScalarColumn> for bool {
                type Output = Result<ScalarColumn>;

                fn $method(self, rhs: &ScalarColumn) -> Self::Output {
                    // & | ^ are commutative
                    rhs.logical($op, self)
                }
            }
        )*
    };
}

column_logical_ops! {
    BitAnd, bitand, LogicalOp::And;
    BitOr, bitor, LogicalOp::Or;
    BitXor, bitxor, LogicalOp::Xor;
}

impl Not for &ScalarColumn {
    type Output = Result<ScalarColumn>;

    fn not(self) -> Self::Output {
        self.invert()
    }
}

impl Neg for &ScalarColumn {
    type Output = Result<ScalarColumn>;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

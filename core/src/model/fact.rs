use crate::internal::*;
use std::fmt;

/// Type and shape of a value, fully known at graph-build time.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TypedFact {
    pub datum_type: DatumType,
    pub shape: TVec<usize>,
}

impl TypedFact {
    pub fn dt_shape(datum_type: DatumType, shape: &[usize]) -> TypedFact {
        TypedFact { datum_type, shape: shape.into() }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn matches(&self, t: &Tensor) -> bool {
        self.datum_type == t.datum_type() && &*self.shape == t.shape()
    }

    /// Check that `other` has the type and shape this fact expects.
    pub fn check_fact(&self, other: &TypedFact) -> GraftResult<()> {
        if other.datum_type != self.datum_type {
            bail!(GraphError::TypeMismatch(format!(
                "expected {:?}, got {:?}",
                self.datum_type, other.datum_type
            )));
        }
        if other.shape != self.shape {
            bail!(GraphError::ShapeInference(format!(
                "expected shape {:?}, got {:?}",
                self.shape, other.shape
            )));
        }
        Ok(())
    }

    /// Check a concrete tensor against this fact.
    pub fn check_tensor(&self, t: &Tensor) -> GraftResult<()> {
        self.check_fact(&TypedFact::from(t))
    }
}

impl From<&Tensor> for TypedFact {
    fn from(t: &Tensor) -> TypedFact {
        TypedFact::dt_shape(t.datum_type(), t.shape())
    }
}

impl From<Arc<Tensor>> for TypedFact {
    fn from(t: Arc<Tensor>) -> TypedFact {
        TypedFact::from(&*t)
    }
}

impl fmt::Debug for TypedFact {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        for d in &self.shape {
            write!(fmt, "{d},")?;
        }
        write!(fmt, "{:?}", self.datum_type)
    }
}

impl fmt::Display for TypedFact {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, fmt)
    }
}

pub trait DatumExt {
    fn fact(shape: &[usize]) -> TypedFact;
}

impl<T: Datum> DatumExt for T {
    fn fact(shape: &[usize]) -> TypedFact {
        TypedFact::dt_shape(T::datum_type(), shape)
    }
}

pub trait DatumTypeExt {
    fn fact(&self, shape: &[usize]) -> TypedFact;
}

impl DatumTypeExt for DatumType {
    fn fact(&self, shape: &[usize]) -> TypedFact {
        TypedFact::dt_shape(*self, shape)
    }
}

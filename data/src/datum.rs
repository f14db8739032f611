//! Element types of the tensors handled by graft.
use crate::tensor::litteral::*;
use crate::tensor::Tensor;
use std::hash::{Hash, Hasher};
use std::{fmt, ops};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum DatumType {
    Bool,
    I32,
    I64,
    F32,
    F64,
}

impl DatumType {
    pub fn is_signed(&self) -> bool {
        matches!(self, DatumType::I32 | DatumType::I64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DatumType::F32 | DatumType::F64)
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed()
    }

    pub fn is_copy(&self) -> bool {
        true
    }

    #[inline]
    pub fn size_of(&self) -> usize {
        dispatch_datum!(std::mem::size_of(self)())
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.size_of()
    }
}

impl std::str::FromStr for DatumType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "I32" | "i32" => Ok(DatumType::I32),
            "I64" | "i64" => Ok(DatumType::I64),
            "F32" | "f32" => Ok(DatumType::F32),
            "F64" | "f64" => Ok(DatumType::F64),
            "Bool" | "bool" => Ok(DatumType::Bool),
            _ => anyhow::bail!("Unknown type {}", s),
        }
    }
}

/// A scalar type that can live in a `Tensor` buffer.
///
/// Tensors store their elements in a raw allocation and copy them bytewise,
/// so only plain `Copy` types qualify.
pub trait Datum:
    Copy + Send + Sync + fmt::Debug + fmt::Display + Default + 'static + PartialEq
{
    fn name() -> &'static str;
    fn datum_type() -> DatumType;
}

/// Floating point element types. Differentiable operators are generic over
/// this trait, one monomorphization per float width.
pub trait FloatLike:
    Datum + num_traits::Float + ops::AddAssign + std::iter::Sum + num_traits::NumCast
{
    /// Feed the bit pattern to a hasher, as floats are not `Hash`.
    fn hash_bits<H: Hasher>(&self, state: &mut H);
}

macro_rules! datum {
    ($t:ty, $v:ident) => {
        impl From<$t> for Tensor {
            fn from(it: $t) -> Tensor {
                tensor0(it)
            }
        }

        impl Datum for $t {
            fn name() -> &'static str {
                stringify!($t)
            }

            fn datum_type() -> DatumType {
                DatumType::$v
            }
        }
    };
}

datum!(bool, Bool);
datum!(i32, I32);
datum!(i64, I64);
datum!(f32, F32);
datum!(f64, F64);

macro_rules! float_like {
    ($t:ty) => {
        impl FloatLike for $t {
            fn hash_bits<H: Hasher>(&self, state: &mut H) {
                self.to_bits().hash(state)
            }
        }
    };
}

float_like!(f32);
float_like!(f64);

#[cfg(test)]
mod tests {
    use crate::internal::*;
    use ndarray::arr1;

    #[test]
    fn test_array_to_tensor_to_array() {
        let array = arr1(&[12i32, 42]);
        let tensor = Tensor::from(array.clone());
        let view = tensor.to_array_view::<i32>().unwrap();
        assert_eq!(array, view.into_dimensionality().unwrap());
    }

    #[test]
    fn test_sizes() {
        assert_eq!(DatumType::F32.size_of(), 4);
        assert_eq!(DatumType::F64.size_of(), 8);
        assert_eq!(DatumType::I64.size_of(), 8);
        assert_eq!(DatumType::Bool.size_of(), 1);
    }

    #[test]
    fn test_parse() {
        assert_eq!("f64".parse::<DatumType>().unwrap(), DatumType::F64);
        assert_eq!("F32".parse::<DatumType>().unwrap(), DatumType::F32);
        assert!("f16".parse::<DatumType>().is_err());
    }

    #[test]
    fn test_float_hash_bits_distinguish_values() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::Hasher;
        let mut a = DefaultHasher::new();
        0.5f32.hash_bits(&mut a);
        let mut b = DefaultHasher::new();
        0.5f32.hash_bits(&mut b);
        let mut c = DefaultHasher::new();
        0.25f32.hash_bits(&mut c);
        assert_eq!(a.finish(), b.finish());
        assert_ne!(a.finish(), c.finish());
    }
}

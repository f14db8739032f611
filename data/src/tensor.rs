//! `Tensor`, graft main data object of interest.
use crate::datum::{Datum, DatumType};
use crate::TVec;
use anyhow::Context;
use itertools::Itertools;
use ndarray::prelude::*;
use std::alloc;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

pub mod litteral;

/// Tensor is a concrete tensor in graft.
///
/// Elements live in one aligned allocation, laid out row-major. `strides` are
/// counted in elements and only change when the shape is set.
pub struct Tensor {
    dt: DatumType,
    shape: TVec<usize>,
    strides: TVec<isize>,
    len: usize,
    layout: alloc::Layout,
    data: *mut u8,
}

unsafe impl Send for Tensor {}
unsafe impl Sync for Tensor {}

impl Hash for Tensor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.dt.hash(state);
        self.shape.hash(state);
        unsafe { self.as_bytes() }.hash(state);
    }
}

impl Clone for Tensor {
    fn clone(&self) -> Tensor {
        self.deep_clone()
    }
}

impl Default for Tensor {
    fn default() -> Tensor {
        litteral::tensor0(0f32)
    }
}

impl Drop for Tensor {
    fn drop(&mut self) {
        if self.layout.size() > 0 {
            unsafe { alloc::dealloc(self.data, self.layout) }
        }
    }
}

impl Tensor {
    /// Create an uninitialized tensor (dt as type paramater).
    pub unsafe fn uninitialized<T: Datum>(shape: &[usize]) -> anyhow::Result<Tensor> {
        unsafe { Self::uninitialized_dt(T::datum_type(), shape) }
    }

    /// Create an uninitialized tensor (dt as regular parameter).
    pub unsafe fn uninitialized_dt(dt: DatumType, shape: &[usize]) -> anyhow::Result<Tensor> {
        unsafe { Self::uninitialized_aligned_dt(dt, shape, dt.alignment()) }
    }

    /// Create an uninitialized tensor with a given alignment (in bytes).
    pub unsafe fn uninitialized_aligned_dt(
        dt: DatumType,
        shape: &[usize],
        alignment: usize,
    ) -> anyhow::Result<Tensor> {
        let bytes = shape
            .iter()
            .try_fold(dt.size_of(), |acc, &d| acc.checked_mul(d))
            .with_context(|| format!("Tensor of shape {shape:?} and type {dt:?} is too big"))?;
        let layout = alloc::Layout::from_size_align(bytes, alignment)?;
        let data = if bytes == 0 {
            // dangling but aligned, never dereferenced nor freed
            layout.align() as *mut u8
        } else {
            let ptr = unsafe { alloc::alloc(layout) };
            anyhow::ensure!(!ptr.is_null(), "Allocation of {} bytes failed", bytes);
            ptr
        };
        let mut tensor = Tensor { strides: tvec!(), layout, dt, shape: shape.into(), data, len: 0 };
        tensor.update_strides_and_len();
        #[cfg(debug_assertions)]
        unsafe {
            if dt == DatumType::F32 {
                tensor.as_slice_mut_unchecked::<f32>().iter_mut().for_each(|f| *f = f32::NAN)
            } else if dt == DatumType::F64 {
                tensor.as_slice_mut_unchecked::<f64>().iter_mut().for_each(|f| *f = f64::NAN)
            }
        }
        Ok(tensor)
    }

    pub unsafe fn clear<T: Datum + num_traits::Zero>(&mut self) {
        unsafe { self.as_slice_mut_unchecked::<T>().iter_mut().for_each(|item| *item = T::zero()) }
    }

    pub fn zero<T: Datum + num_traits::Zero>(shape: &[usize]) -> anyhow::Result<Tensor> {
        unsafe {
            let mut t = Tensor::uninitialized::<T>(shape)?;
            t.clear::<T>();
            Ok(t)
        }
    }

    pub fn zero_dt(dt: DatumType, shape: &[usize]) -> anyhow::Result<Tensor> {
        dispatch_numbers!(Self::zero(dt)(shape))
    }

    /// Create a tensor with a given shape and a slice of elements.
    /// The data is copied and aligned to size of T.
    pub fn from_shape<T: Datum>(shape: &[usize], data: &[T]) -> anyhow::Result<Tensor> {
        anyhow::ensure!(
            data.len() == shape.iter().product::<usize>(),
            "Shape product must be equal to data length"
        );
        unsafe {
            let mut tensor = Tensor::uninitialized::<T>(shape)?;
            tensor.as_slice_mut_unchecked::<T>().copy_from_slice(data);
            Ok(tensor)
        }
    }

    /// Build a tensor of the given shape, every element equal to this
    /// scalar tensor's value.
    pub fn broadcast_scalar_to_shape(&self, shape: &[usize]) -> anyhow::Result<Tensor> {
        if self.len() != 1 {
            anyhow::bail!("Expected a scalar tensor, got {:?}", self.shape());
        }
        fn make<T: Datum>(src: &Tensor, shape: &[usize]) -> anyhow::Result<Tensor> {
            let value = *src.to_scalar::<T>()?;
            unsafe {
                let mut t = Tensor::uninitialized::<T>(shape)?;
                t.as_slice_mut_unchecked::<T>().iter_mut().for_each(|x| *x = value);
                Ok(t)
            }
        }
        dispatch_datum!(make(self.datum_type())(self, shape))
    }

    /// Get the number of dimensions (or axes) of the tensor.
    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Get the shape of the tensor.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the number of values in the tensor.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Get the strides of the tensor, in elements.
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    fn update_strides_and_len(&mut self) {
        self.strides.clear();
        compute_natural_stride_to(&mut self.strides, &self.shape);
        self.len = if self.rank() == 0 {
            1
        } else {
            unsafe { *self.strides.get_unchecked(0) as usize * self.shape.get_unchecked(0) }
        }
    }

    /// Force the tensor shape, no consistency check.
    pub unsafe fn set_shape_unchecked(&mut self, shape: &[usize]) {
        if shape != &*self.shape {
            self.shape.clear();
            self.shape.extend_from_slice(shape);
            self.update_strides_and_len();
        }
    }

    /// Force the tensor shape.
    pub fn set_shape(&mut self, shape: &[usize]) -> anyhow::Result<()> {
        if self.len() != shape.iter().product::<usize>() {
            anyhow::bail!("Invalid reshape {:?} to {:?}", self.shape, shape);
        }
        unsafe { self.set_shape_unchecked(shape) }
        Ok(())
    }

    pub fn into_shape(mut self, shape: &[usize]) -> anyhow::Result<Tensor> {
        self.set_shape(shape)?;
        Ok(self)
    }

    /// Get the datum type of the tensor.
    #[inline]
    pub fn datum_type(&self) -> DatumType {
        self.dt
    }

    /// Dump the tensor in a human readable form.
    ///
    /// `force_full` will force the tensor to be dump in full even if it is big.
    pub fn dump(&self, force_full: bool) -> anyhow::Result<String> {
        unsafe fn dump_t<D: Datum>(tensor: &Tensor, n: usize) -> String {
            unsafe { tensor.as_slice_unchecked::<D>()[0..n].iter().join(", ") }
        }
        unsafe {
            let trunc = self.len() > 12 && !force_full;
            let data = dispatch_datum!(dump_t(self.datum_type())(
                self,
                if trunc { 12 } else { self.len() }
            ));
            Ok(format!(
                "{},{:?} {}{}",
                self.shape.iter().join(","),
                self.dt,
                data,
                if trunc { "..." } else { "" }
            ))
        }
    }

    /// Compare two tensors, allowing for rounding errors.
    pub fn close_enough(&self, other: &Self, approx: bool) -> anyhow::Result<()> {
        if self.shape() != other.shape() {
            anyhow::bail!("Shape mismatch {:?} != {:?}", self.shape(), other.shape())
        }
        if self.datum_type() != other.datum_type() {
            anyhow::bail!("Type mismatch {:?} != {:?}", self.datum_type(), other.datum_type())
        }
        if approx && self.datum_type().is_float() {
            fn compare<T: crate::datum::FloatLike>(a: &Tensor, b: &Tensor) -> anyhow::Result<()> {
                let atol = 5e-4;
                let rtol = 1e-4;
                let ma = a.to_array_view::<T>()?;
                let mb = b.to_array_view::<T>()?;
                ndarray::indices_of(&ma).into_iter().try_for_each(|indices| {
                    let a = ma[&indices].to_f64().unwrap_or(f64::NAN);
                    let b = mb[&indices].to_f64().unwrap_or(f64::NAN);
                    if !((a.is_nan() && b.is_nan())
                        || (a.is_infinite() && b.is_infinite() && a.signum() == b.signum())
                        || (a - b).abs() <= atol + rtol * b.abs())
                    {
                        anyhow::bail!("Mismatch at {:?} {} != {}", indices.slice(), a, b)
                    }
                    Ok(())
                })
            }
            dispatch_floatlike!(compare(self.datum_type())(self, other))
        } else if self.eq(other) {
            Ok(())
        } else {
            anyhow::bail!("Mismatch")
        }
    }

    fn check_for_access<D: Datum>(&self) -> anyhow::Result<()> {
        if self.datum_type() != D::datum_type() {
            anyhow::bail!(
                "Tensor datum type error: tensor is {:?}, accessed as {:?}",
                self.datum_type(),
                D::datum_type(),
            );
        }
        Ok(())
    }

    /// Transform the data as a `ndarray::Array`.
    pub fn to_array_view<D: Datum>(&self) -> anyhow::Result<ArrayViewD<'_, D>> {
        self.check_for_access::<D>()?;
        unsafe { Ok(self.to_array_view_unchecked()) }
    }

    /// Transform the data as a `ndarray::Array`.
    pub unsafe fn to_array_view_unchecked<D: Datum>(&self) -> ArrayViewD<'_, D> {
        unsafe { ArrayViewD::from_shape_ptr(&*self.shape, self.data as *const D) }
    }

    /// Access the data as a pointer.
    pub fn as_ptr<D: Datum>(&self) -> anyhow::Result<*const D> {
        self.check_for_access::<D>()?;
        Ok(self.data as *const D)
    }

    /// Access the data as a mutable pointer.
    pub fn as_ptr_mut<D: Datum>(&mut self) -> anyhow::Result<*mut D> {
        self.as_ptr::<D>().map(|p| p as *mut D)
    }

    /// Access the data as a slice.
    pub fn as_slice<D: Datum>(&self) -> anyhow::Result<&[D]> {
        unsafe { Ok(std::slice::from_raw_parts::<D>(self.as_ptr()?, self.len())) }
    }

    /// Access the data as a mutable slice.
    pub fn as_slice_mut<D: Datum>(&mut self) -> anyhow::Result<&mut [D]> {
        unsafe { Ok(std::slice::from_raw_parts_mut::<D>(self.as_ptr_mut()?, self.len())) }
    }

    /// Access the data as a slice.
    pub unsafe fn as_slice_unchecked<D: Datum>(&self) -> &[D] {
        unsafe { std::slice::from_raw_parts::<D>(self.data as *const D, self.len()) }
    }

    /// Access the data as a mutable slice.
    pub unsafe fn as_slice_mut_unchecked<D: Datum>(&mut self) -> &mut [D] {
        unsafe { std::slice::from_raw_parts_mut::<D>(self.data as *mut D, self.len()) }
    }

    /// Access the data as a scalar.
    pub fn to_scalar<D: Datum>(&self) -> anyhow::Result<&D> {
        self.check_for_access::<D>()?;
        if self.len() == 0 {
            anyhow::bail!("to_scalar called on empty tensor ({:?})", self)
        }
        unsafe { Ok(&*(self.data as *const D)) }
    }

    pub unsafe fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.data, self.layout.size()) }
    }

    pub unsafe fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.data, self.layout.size()) }
    }

    fn from_datum<T: Datum>(it: ArrayD<T>) -> Tensor {
        unsafe {
            let mut t = Self::uninitialized::<T>(it.shape())
                .expect("layout of an existing array is valid");
            if let Some(slice) = it.as_slice() {
                t.as_slice_mut_unchecked::<T>().copy_from_slice(slice);
            } else {
                t.as_slice_mut_unchecked::<T>()
                    .iter_mut()
                    .zip(it.iter())
                    .for_each(|(t, a)| *t = *a);
            }
            t
        }
    }

    pub fn deep_clone(&self) -> Tensor {
        unsafe {
            let mut tensor = Tensor::uninitialized_dt(self.datum_type(), self.shape())
                .expect("layout of an existing tensor is valid");
            tensor.as_bytes_mut().copy_from_slice(self.as_bytes());
            tensor
        }
    }

    fn eq_dt(&self, other: &Tensor) -> anyhow::Result<bool> {
        unsafe fn eq_t<D: Datum>(me: &Tensor, other: &Tensor) -> bool {
            unsafe { me.as_slice_unchecked::<D>() == other.as_slice_unchecked::<D>() }
        }
        unsafe { Ok(dispatch_datum!(eq_t(self.dt)(self, other))) }
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Tensor) -> bool {
        if self.dt != other.dt || self.shape != other.shape {
            return false;
        }
        self.eq_dt(other).unwrap_or(false)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let content = self.dump(false).unwrap_or_else(|e| format!("Error : {e:?}"));
        write!(formatter, "{content}")
    }
}

pub fn natural_strides(shape: &[usize]) -> TVec<isize> {
    let mut strides = tvec!();
    compute_natural_stride_to(&mut strides, shape);
    strides
}

fn compute_natural_stride_to(strides: &mut TVec<isize>, shape: &[usize]) {
    match shape.len() {
        0 => (),
        1 => strides.push(1),
        2 => strides.extend_from_slice(&[shape[1] as isize, 1]),
        3 => strides.extend_from_slice(&[(shape[1] * shape[2]) as isize, shape[2] as _, 1]),
        4 => strides.extend_from_slice(&[
            (shape[1] * shape[2] * shape[3]) as isize,
            (shape[2] * shape[3]) as _,
            shape[3] as _,
            1,
        ]),
        _ => {
            strides.push(1);
            for dim in shape.iter().skip(1).rev() {
                let previous = *strides.last().unwrap();
                strides.push(previous * *dim as isize)
            }
            strides.reverse();
        }
    }
}

impl<D: ::ndarray::Dimension, T: Datum> From<Array<T, D>> for Tensor {
    fn from(it: Array<T, D>) -> Tensor {
        Tensor::from_datum(it.into_dyn())
    }
}

/// Convenient conversion to Tensor.
pub trait IntoTensor: Sized {
    /// Convert Self to a Tensor.
    ///
    /// May perform a copy
    fn into_tensor(self) -> Tensor;
}

/// Convenient conversion to Arc<Tensor>.
pub trait IntoArcTensor: Sized {
    /// Convert Self to a Arc<Tensor>.
    ///
    /// May perform a copy
    fn into_arc_tensor(self) -> Arc<Tensor>;
}

impl IntoTensor for Tensor {
    fn into_tensor(self) -> Tensor {
        self
    }
}

impl IntoTensor for Arc<Tensor> {
    fn into_tensor(self) -> Tensor {
        Arc::try_unwrap(self).unwrap_or_else(|t| (*t).clone())
    }
}

impl IntoArcTensor for Tensor {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        Arc::new(self)
    }
}

impl IntoArcTensor for Arc<Tensor> {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use proptest::prelude::*;

    #[test]
    fn natural_strides_rank_4() {
        assert_eq!(&*natural_strides(&[2, 3, 4, 5]), &[60, 20, 5, 1]);
    }

    #[test]
    fn natural_strides_rank_6() {
        assert_eq!(&*natural_strides(&[2, 1, 3, 1, 2, 2]), &[12, 12, 4, 4, 2, 1]);
    }

    #[test]
    fn typed_access_is_checked() {
        let t = tensor1(&[1f32, 2., 3.]);
        assert!(t.as_slice::<f32>().is_ok());
        let err = t.as_slice::<f64>().unwrap_err();
        assert!(err.to_string().contains("F32"));
    }

    #[test]
    fn empty_tensor_is_usable() {
        let t = Tensor::zero::<f32>(&[1, 0, 3]).unwrap();
        assert_eq!(t.len(), 0);
        assert!(t.as_slice::<f32>().unwrap().is_empty());
        assert_eq!(t.clone(), t);
    }

    #[test]
    fn broadcast_scalar() {
        let t = tensor0(2.5f64).broadcast_scalar_to_shape(&[2, 2]).unwrap();
        assert_eq!(t, tensor2(&[[2.5f64, 2.5], [2.5, 2.5]]));
    }

    #[test]
    fn close_enough_tolerates_rounding() {
        let a = tensor1(&[1.0f32, 2.0]);
        let b = tensor1(&[1.00001f32, 2.0]);
        assert!(a.close_enough(&b, true).is_ok());
        assert!(a.close_enough(&b, false).is_err());
        assert!(a.close_enough(&tensor1(&[1.5f32, 2.0]), true).is_err());
    }

    #[test]
    fn oversized_shape_is_an_error() {
        assert!(Tensor::zero::<f64>(&[usize::MAX, 2]).is_err());
    }

    #[test]
    fn reshape_keeps_data() {
        let t = tensor1(&[1i64, 2, 3, 4]).into_shape(&[2, 2]).unwrap();
        assert_eq!(t.strides(), &[2, 1]);
        assert_eq!(t, tensor2(&[[1i64, 2], [3, 4]]));
        assert!(t.into_shape(&[3]).is_err());
    }

    proptest! {
        #[test]
        fn strides_and_len_match_shape(shape in proptest::collection::vec(0..5usize, 0..6)) {
            let t = Tensor::zero::<f32>(&shape).unwrap();
            prop_assert_eq!(t.len(), shape.iter().product::<usize>());
            let strides = t.strides();
            for axis in 0..shape.len() {
                let inner: usize = shape[axis + 1..].iter().product();
                prop_assert_eq!(strides[axis], inner as isize);
            }
        }
    }
}

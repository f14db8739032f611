use super::Tensor;
use crate::datum::Datum;
use ndarray::*;

pub fn tensor0<A: Datum>(x: A) -> Tensor {
    Tensor::from(arr0(x))
}

pub fn tensor1<A: Datum>(xs: &[A]) -> Tensor {
    Tensor::from(arr1(xs))
}

pub fn tensor2<A: Datum, const N: usize>(xs: &[[A; N]]) -> Tensor {
    Tensor::from(arr2(xs))
}

pub fn tensor4<A: Datum, const C: usize, const H: usize, const W: usize>(
    xs: &[[[[A; W]; H]; C]],
) -> Tensor {
    let flat: Vec<A> = xs.iter().flatten().flatten().flatten().copied().collect();
    Tensor::from_shape(&[xs.len(), C, H, W], &flat).expect("shape matches nested literal")
}

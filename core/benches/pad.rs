#[macro_use]
extern crate criterion;

use criterion::Criterion;
use graft_core::internal::*;
use graft_core::ops::array::{MaskCache, Margins, Pad};

fn mk(shape: &[usize]) -> Tensor {
    let len = shape.iter().product::<usize>();
    let data: Vec<f32> = (0..len).map(|x| x as f32).collect();
    Tensor::from_shape(shape, &data).unwrap()
}

fn b(c: &mut Criterion, name: &str, n: usize, ch: usize, h: usize, w: usize, margin: usize) {
    let op = Pad::<f32>::constant(Margins::new(margin, margin, margin, margin), 0.);
    let input = mk(&[n, ch, h, w]);
    let mut mask = MaskCache::default();
    let mut output = op.forward(&mut mask, &input).unwrap();
    c.bench_function(name, move |b| {
        b.iter(|| op.forward_into(&mut mask, &mut output, &input).unwrap())
    });
}

macro_rules! b {
    ($id:ident, $($args:expr),*) => {
        #[allow(non_snake_case)]
        fn $id(c: &mut Criterion) {
            b(c, stringify!($id), $($args),*);
        }
    }
}

b!(small_1x3x32x32_m1, 1, 3, 32, 32, 1);
b!(conv_1x64x56x56_m1, 1, 64, 56, 56, 1);
b!(batch_8x32x28x28_m3, 8, 32, 28, 28, 3);

criterion_group!(benches, small_1x3x32x32_m1, conv_1x64x56x56_m1, batch_8x32x28x28_m3);
criterion_main!(benches);

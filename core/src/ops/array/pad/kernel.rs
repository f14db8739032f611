//! Plane-by-plane padding kernels.
//!
//! Buffers are walked one (batch, channel) plane at a time: once a plane is
//! done, each working slice advances by its own plane stride. Rows inside a
//! plane are addressed with the row strides.
use super::Margins;
use crate::internal::*;

/// Sizes and strides of a padding over a rank-4 (N, C, H, W) layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadGeometry {
    pub batches: usize,
    pub channels: usize,
    pub in_h: usize,
    pub in_w: usize,
    pub out_h: usize,
    pub out_w: usize,
    pub in_plane_stride: usize,
    pub out_plane_stride: usize,
    pub in_row_stride: usize,
    pub out_row_stride: usize,
}

fn stride(strides: &[isize], axis: usize) -> GraftResult<usize> {
    usize::try_from(strides[axis]).with_context(|| format!("Negative stride in {strides:?}"))
}

impl PadGeometry {
    pub fn new(input: &Tensor, output_shape: &[usize], margins: &Margins) -> GraftResult<PadGeometry> {
        let shape = input.shape();
        if shape.len() != 4 || output_shape.len() != 4 {
            bail!(GraphError::ShapeInference(format!(
                "Padding works on rank 4 tensors, got {:?} -> {:?}",
                shape, output_shape
            )));
        }
        let (out_h, out_w) = margins.padded(shape[2], shape[3])?;
        if output_shape[..2] != shape[..2] || output_shape[2] != out_h || output_shape[3] != out_w {
            bail!(GraphError::ShapeInference(format!(
                "Can not pad {shape:?} into {output_shape:?} with {margins}"
            )));
        }
        let out_strides = natural_strides(output_shape);
        Ok(PadGeometry {
            batches: shape[0],
            channels: shape[1],
            in_h: shape[2],
            in_w: shape[3],
            out_h,
            out_w,
            in_plane_stride: stride(input.strides(), 1)?,
            out_plane_stride: stride(&out_strides, 1)?,
            in_row_stride: stride(input.strides(), 2)?,
            out_row_stride: stride(&out_strides, 2)?,
        })
    }

    pub fn planes(&self) -> usize {
        self.batches * self.channels
    }

    pub fn input_len(&self) -> usize {
        self.planes() * self.in_plane_stride
    }

    pub fn output_len(&self) -> usize {
        self.planes() * self.out_plane_stride
    }
}

/// Copy `input` into the middle of `output` and fill the margins with `fill`.
///
/// `mask` has the output layout. It receives, for each output cell, the
/// offset in the whole input buffer of the cell it was copied from, or -1 for
/// fill cells.
pub fn pad_planes<T: Copy>(
    geo: &PadGeometry,
    margins: &Margins,
    fill: T,
    input: &[T],
    output: &mut [T],
    mask: &mut [i64],
) {
    debug_assert!(input.len() >= geo.input_len());
    debug_assert!(output.len() >= geo.output_len() && mask.len() >= geo.output_len());
    let mut input = input;
    let mut output = output;
    let mut mask = mask;
    let mut base = 0;
    for _ in 0..geo.planes() {
        for y in 0..geo.out_h {
            let out_row = &mut output[y * geo.out_row_stride..][..geo.out_w];
            let mask_row = &mut mask[y * geo.out_row_stride..][..geo.out_w];
            let Some(sy) = y.checked_sub(margins.top).filter(|&sy| sy < geo.in_h) else {
                out_row.fill(fill);
                mask_row.fill(-1);
                continue;
            };
            let (start, end) = (margins.left, margins.left + geo.in_w);
            let in_offset = sy * geo.in_row_stride;
            out_row[..start].fill(fill);
            out_row[start..end].copy_from_slice(&input[in_offset..][..geo.in_w]);
            out_row[end..].fill(fill);
            mask_row[..start].fill(-1);
            for (x, m) in mask_row[start..end].iter_mut().enumerate() {
                *m = (base + in_offset + x) as i64;
            }
            mask_row[end..].fill(-1);
        }
        input = &input[geo.in_plane_stride..];
        output = &mut std::mem::take(&mut output)[geo.out_plane_stride..];
        mask = &mut std::mem::take(&mut mask)[geo.out_plane_stride..];
        base += geo.in_plane_stride;
    }
}

/// Accumulate into `grad_in` the interior of `grad_out`, the cells found at
/// the margin offsets of each plane.
pub fn unpad_planes<T: FloatLike>(
    geo: &PadGeometry,
    margins: &Margins,
    grad_out: &[T],
    grad_in: &mut [T],
) {
    let mut grad_out = grad_out;
    let mut grad_in = grad_in;
    for _ in 0..geo.planes() {
        for sy in 0..geo.in_h {
            let src = &grad_out[(sy + margins.top) * geo.out_row_stride + margins.left..][..geo.in_w];
            let dst = &mut grad_in[sy * geo.in_row_stride..][..geo.in_w];
            dst.iter_mut().zip(src).for_each(|(d, s)| *d += *s);
        }
        grad_out = &grad_out[geo.out_plane_stride..];
        grad_in = &mut std::mem::take(&mut grad_in)[geo.in_plane_stride..];
    }
}

/// Accumulate `grad_out` into `grad_in` at the input offsets recorded in
/// `mask`, skipping fill cells.
pub fn scatter_by_mask<T: FloatLike>(
    geo: &PadGeometry,
    grad_out: &[T],
    mask: &[i64],
    grad_in: &mut [T],
) -> GraftResult<()> {
    let mut grad_out = grad_out;
    let mut mask = mask;
    for _ in 0..geo.planes() {
        for y in 0..geo.out_h {
            let g_row = &grad_out[y * geo.out_row_stride..][..geo.out_w];
            let m_row = &mask[y * geo.out_row_stride..][..geo.out_w];
            for (&g, &m) in g_row.iter().zip(m_row) {
                if m < 0 {
                    continue;
                }
                let cell = grad_in
                    .get_mut(m as usize)
                    .with_context(|| format!("Mask offset {m} out of bounds"))?;
                *cell += g;
            }
        }
        grad_out = &grad_out[geo.out_plane_stride..];
        mask = &mask[geo.out_plane_stride..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(shape: &[usize], margins: &Margins) -> PadGeometry {
        let input = Tensor::zero::<f32>(shape).unwrap();
        let (h, w) = margins.padded(shape[2], shape[3]).unwrap();
        PadGeometry::new(&input, &[shape[0], shape[1], h, w], margins).unwrap()
    }

    #[test]
    fn mask_points_across_planes() {
        let margins = Margins::new(0, 0, 1, 0);
        let geo = geometry(&[1, 2, 1, 2], &margins);
        let input = [1f32, 2., 3., 4.];
        let mut output = [0f32; 6];
        let mut mask = [0i64; 6];
        pad_planes(&geo, &margins, 9., &input, &mut output, &mut mask);
        assert_eq!(output, [9., 1., 2., 9., 3., 4.]);
        assert_eq!(mask, [-1, 0, 1, -1, 2, 3]);
    }

    #[test]
    fn both_adjoint_paths_agree() {
        let margins = Margins::new(1, 0, 2, 1);
        let geo = geometry(&[2, 1, 2, 2], &margins);
        let input: Vec<f64> = (0..8).map(|x| x as f64).collect();
        let mut output = vec![0f64; geo.output_len()];
        let mut mask = vec![0i64; geo.output_len()];
        pad_planes(&geo, &margins, 0., &input, &mut output, &mut mask);
        let grad_out: Vec<f64> = (0..geo.output_len()).map(|x| x as f64 * 0.5).collect();
        let mut by_offsets = vec![0f64; 8];
        unpad_planes(&geo, &margins, &grad_out, &mut by_offsets);
        let mut by_mask = vec![0f64; 8];
        scatter_by_mask(&geo, &grad_out, &mask, &mut by_mask).unwrap();
        assert_eq!(by_offsets, by_mask);
    }

    #[test]
    fn rejects_mismatched_output() {
        let margins = Margins::new(1, 1, 1, 1);
        let input = Tensor::zero::<f32>(&[1, 1, 2, 2]).unwrap();
        let err = PadGeometry::new(&input, &[1, 1, 4, 5], &margins).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::ShapeInference(_))));
    }
}

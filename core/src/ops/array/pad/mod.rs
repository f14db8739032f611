//! Constant padding of the spatial axes of (N, C, H, W) tensors.
use crate::internal::*;
use std::fmt;

mod grad;
pub mod kernel;

pub use self::grad::PadGrad;
use self::kernel::PadGeometry;

/// Margins added around the (height, width) plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, new)]
pub struct Margins {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Margins {
    /// Parse a user margin list for a `height` x `width` input.
    ///
    /// `[h, w]` pads symmetrically, `[top, bottom, left, right]` is used as
    /// is. Negative margins are rejected: padding never crops.
    pub fn from_list(pads: &[isize], height: usize, width: usize) -> GraftResult<Margins> {
        let [top, bottom, left, right] = match *pads {
            [h, w] => [h, h, w, w],
            [top, bottom, left, right] => [top, bottom, left, right],
            _ => bail!(GraphError::Configuration(format!(
                "Expected 2 or 4 margins, got {pads:?}"
            ))),
        };
        let feasible = |dim: usize, a: isize, b: isize| {
            isize::try_from(dim)
                .ok()
                .and_then(|d| d.checked_add(a)?.checked_add(b))
                .is_some_and(|d| d >= 0)
        };
        if !feasible(height, top, bottom) {
            bail!(GraphError::Configuration("Impossible height/pad combination".into()));
        }
        if !feasible(width, left, right) {
            bail!(GraphError::Configuration("Impossible width/pad combination".into()));
        }
        let margin = |m: isize| {
            usize::try_from(m).map_err(|_| {
                GraphError::Configuration(format!("Negative margins would crop: {pads:?}"))
            })
        };
        Ok(Margins::new(margin(top)?, margin(bottom)?, margin(left)?, margin(right)?))
    }

    /// Padded (height, width) of a `height` x `width` plane.
    pub fn padded(&self, height: usize, width: usize) -> GraftResult<(usize, usize)> {
        let h = height.checked_add(self.top).and_then(|h| h.checked_add(self.bottom));
        let w = width.checked_add(self.left).and_then(|w| w.checked_add(self.right));
        match (h, w) {
            (Some(h), Some(w)) => Ok((h, w)),
            _ => bail!(GraphError::ShapeInference(format!(
                "Padding a {height}x{width} plane with {self} overflows"
            ))),
        }
    }
}

impl fmt::Display for Margins {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}, {}, {}, {}}}", self.top, self.bottom, self.left, self.right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PadMode<T: FloatLike> {
    Constant(T),
}

impl<T: FloatLike> PadMode<T> {
    pub fn fill(&self) -> T {
        match self {
            PadMode::Constant(v) => *v,
        }
    }
}

impl<T: FloatLike> Hash for PadMode<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            PadMode::Constant(v) => v.hash_bits(state),
        }
    }
}

impl<T: FloatLike> fmt::Display for PadMode<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PadMode::Constant(v) => write!(f, "constant, value: {v}"),
        }
    }
}

/// Immutable configuration of a padding node.
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct PadSpec<T: FloatLike> {
    pub margins: Margins,
    pub mode: PadMode<T>,
}

impl<T: FloatLike> Hash for PadSpec<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.margins.hash(state);
        self.mode.hash(state);
    }
}

impl<T: FloatLike> fmt::Display for PadSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} mode: {}", self.margins, self.mode)
    }
}

/// Index mask of the last forward pass, for one output shape.
///
/// For each output cell: the offset of its source cell in the whole input
/// buffer, or -1 for fill cells.
#[derive(Debug, Clone, Default)]
pub struct MaskCache {
    indices: Option<Tensor>,
}

impl MaskCache {
    /// Output shape the mask was computed for.
    pub fn shape(&self) -> Option<&[usize]> {
        self.indices.as_ref().map(|t| t.shape())
    }

    /// Mask storage for `shape`, reallocated if the shape changed.
    pub fn ensure(&mut self, shape: &[usize]) -> GraftResult<&mut Tensor> {
        let indices = match self.indices.take() {
            Some(t) if t.shape() == shape => t,
            _ => {
                debug!("Allocating pad mask for {shape:?}");
                Tensor::zero::<i64>(shape)?
            }
        };
        Ok(self.indices.insert(indices))
    }

    /// The mask, if it is valid for an output of this shape.
    pub fn indices_for(&self, shape: &[usize]) -> Option<&Tensor> {
        self.indices.as_ref().filter(|t| t.shape() == shape)
    }
}

/// Gradient of padding with respect to its input: the interior of `grad`.
///
/// Uses `mask` to route the cells when given, the margin offsets otherwise.
pub fn unpad<T: FloatLike>(
    margins: &Margins,
    input_shape: &[usize],
    grad: &Tensor,
    mask: Option<&Tensor>,
) -> GraftResult<Tensor> {
    if grad.datum_type() != T::datum_type() {
        bail!(GraphError::TypeMismatch(format!(
            "Gradient is {:?}, expected {:?}",
            grad.datum_type(),
            T::datum_type()
        )));
    }
    let mut grad_in = Tensor::zero::<T>(input_shape)?;
    let geo = PadGeometry::new(&grad_in, grad.shape(), margins)?;
    match mask {
        Some(mask) => kernel::scatter_by_mask(
            &geo,
            grad.as_slice::<T>()?,
            mask.as_slice::<i64>()?,
            grad_in.as_slice_mut::<T>()?,
        )?,
        None => kernel::unpad_planes(
            &geo,
            margins,
            grad.as_slice::<T>()?,
            grad_in.as_slice_mut::<T>()?,
        ),
    }
    Ok(grad_in)
}

#[derive(Debug, Clone, PartialEq, new)]
pub struct Pad<T: FloatLike> {
    pub spec: PadSpec<T>,
}

impl<T: FloatLike> Pad<T> {
    pub fn constant(margins: Margins, value: T) -> Pad<T> {
        Pad::new(PadSpec::new(margins, PadMode::Constant(value)))
    }

    pub fn infer_type(&self, dt: DatumType) -> GraftResult<DatumType> {
        if dt != T::datum_type() {
            bail!(GraphError::TypeMismatch(format!(
                "{} expects {:?} input, got {:?}",
                self,
                T::datum_type(),
                dt
            )));
        }
        Ok(dt)
    }

    pub fn infer_shape(&self, input: &[usize]) -> GraftResult<TVec<usize>> {
        if input.len() != 4 {
            bail!(GraphError::ShapeInference(format!(
                "Expected input to have a shape with dimension 4, got {input:?}"
            )));
        }
        let (h, w) = self.spec.margins.padded(input[2], input[3])?;
        Ok(tvec!(input[0], input[1], h, w))
    }

    fn check_input(&self, input: &Tensor) -> GraftResult<TVec<usize>> {
        self.infer_type(input.datum_type())?;
        self.infer_shape(input.shape())
    }

    /// Pad `input` into a new tensor, recording sources in `mask`.
    pub fn forward(&self, mask: &mut MaskCache, input: &Tensor) -> GraftResult<Tensor> {
        let shape = self.check_input(input)?;
        let mut output = unsafe { Tensor::uninitialized::<T>(&shape)? };
        self.run(mask, &mut output, input)?;
        Ok(output)
    }

    /// Pad `input` into the caller's `output` buffer.
    pub fn forward_into(
        &self,
        mask: &mut MaskCache,
        output: &mut Tensor,
        input: &Tensor,
    ) -> GraftResult<()> {
        let shape = self.check_input(input)?;
        if output.datum_type() != T::datum_type() {
            bail!(GraphError::TypeMismatch(format!(
                "Output buffer is {:?}, expected {:?}",
                output.datum_type(),
                T::datum_type()
            )));
        }
        if output.shape() != &*shape {
            bail!(GraphError::ShapeInference(format!(
                "Output buffer has shape {:?}, expected {:?}",
                output.shape(),
                shape
            )));
        }
        self.run(mask, output, input)
    }

    fn run(&self, mask: &mut MaskCache, output: &mut Tensor, input: &Tensor) -> GraftResult<()> {
        let geo = PadGeometry::new(input, output.shape(), &self.spec.margins)?;
        let indices = mask.ensure(output.shape())?;
        kernel::pad_planes(
            &geo,
            &self.spec.margins,
            self.spec.mode.fill(),
            input.as_slice::<T>()?,
            output.as_slice_mut::<T>()?,
            indices.as_slice_mut::<i64>()?,
        );
        Ok(())
    }
}

impl<T: FloatLike> Hash for Pad<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.spec.hash(state)
    }
}

impl<T: FloatLike> fmt::Display for Pad<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pad{}", self.spec)
    }
}

impl<T: FloatLike> Op for Pad<T> {
    fn name(&self) -> Cow<'_, str> {
        "Pad".into()
    }

    fn info(&self) -> GraftResult<Vec<String>> {
        Ok(vec![format!("margins: {}", self.spec.margins), format!("mode: {}", self.spec.mode)])
    }

    op_as_typed_op!();
    impl_op_same_as!();
}

impl<T: FloatLike> EvalOp for Pad<T> {
    fn is_stateless(&self) -> bool {
        false
    }

    fn eval(&self, inputs: TVec<TValue>) -> GraftResult<TVec<TValue>> {
        let input = args_1!(inputs);
        let output = self.forward(&mut MaskCache::default(), &input)?;
        Ok(tvec!(output.into_tvalue()))
    }

    fn eval_with_prealloc(
        &self,
        prealloc: TVec<Tensor>,
        inputs: TVec<TValue>,
    ) -> GraftResult<TVec<TValue>> {
        let input = args_1!(inputs);
        let mut output = args_1!(prealloc);
        self.forward_into(&mut MaskCache::default(), &mut output, &input)?;
        Ok(tvec!(output.into_tvalue()))
    }

    fn state(
        &self,
        _session: &mut SessionState,
        _node_id: usize,
    ) -> GraftResult<Option<Box<dyn OpState>>> {
        Ok(Some(Box::new(PadState::<T>::default())))
    }
}

/// Per-session state of a padding node: the mask of its last forward pass.
#[derive(Debug, Clone, Default)]
pub struct PadState<T: FloatLike> {
    pub mask: MaskCache,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: FloatLike> OpState for PadState<T> {
    fn eval(
        &mut self,
        _session: &mut SessionState,
        op: &dyn Op,
        inputs: TVec<TValue>,
    ) -> GraftResult<TVec<TValue>> {
        let op = op.downcast_ref::<Pad<T>>().context("Wrong op")?;
        let input = args_1!(inputs);
        Ok(tvec!(op.forward(&mut self.mask, &input)?.into_tvalue()))
    }

    fn eval_with_prealloc(
        &mut self,
        _session: &mut SessionState,
        op: &dyn Op,
        prealloc: TVec<Tensor>,
        inputs: TVec<TValue>,
    ) -> GraftResult<TVec<TValue>> {
        let op = op.downcast_ref::<Pad<T>>().context("Wrong op")?;
        let input = args_1!(inputs);
        let shape = op.check_input(&input)?;
        let output = match prealloc.into_iter().next() {
            Some(mut output)
                if output.datum_type() == T::datum_type() && output.shape() == &*shape =>
            {
                op.forward_into(&mut self.mask, &mut output, &input)?;
                output
            }
            _ => op.forward(&mut self.mask, &input)?,
        };
        Ok(tvec!(output.into_tvalue()))
    }
}

impl<T: FloatLike> TypedOp for Pad<T> {
    as_op!();

    fn output_facts(&self, inputs: &[&TypedFact]) -> GraftResult<TVec<TypedFact>> {
        check_arity(1, inputs.len())?;
        let dt = self.infer_type(inputs[0].datum_type)?;
        Ok(tvec!(dt.fact(&self.infer_shape(&inputs[0].shape)?)))
    }

    fn diff_wrt(&self, inputs: usize) -> TVec<bool> {
        tvec![true; inputs]
    }

    fn sym_diff(
        &self,
        model: &mut TypedModel,
        prefix: &str,
        inputs: &[OutletId],
        _output: OutletId,
        grad: OutletId,
    ) -> GraftResult<TVec<Option<OutletId>>> {
        check_arity(1, inputs.len())?;
        let name = model.unique_name(format!("{prefix}.grad"));
        let wire = model.wire_node(name, PadGrad::<T>::new(self.spec.margins), &[inputs[0], grad])?;
        Ok(tvec!(Some(wire[0])))
    }

    fn do_diff(
        &self,
        ctx: &mut DiffContext,
        inputs: &[OutletId],
        output: OutletId,
    ) -> GraftResult<()> {
        check_arity(1, inputs.len())?;
        let input_shape: TVec<usize> = ctx.value(inputs[0])?.shape().into();
        let contribution = {
            let grad = ctx.grad(output).with_context(|| format!("No gradient for {output:?}"))?;
            let mask = ctx
                .state(output.node)
                .and_then(|s| s.downcast_ref::<PadState<T>>())
                .and_then(|s| s.mask.indices_for(grad.shape()));
            unpad::<T>(&self.spec.margins, &input_shape, grad, mask)?
        };
        ctx.accumulate_grad(inputs[0], contribution)
    }
}

fn constant_pad<T: FloatLike>(margins: Margins, value: f64) -> GraftResult<Box<dyn TypedOp>> {
    let value = <T as num_traits::NumCast>::from(value)
        .with_context(|| format!("Fill value {value} does not fit {}", T::name()))?;
    let op = Pad::<T>::constant(margins, value);
    debug!("Built {op}");
    Ok(Box::new(op))
}

/// Wire a zero padding of `input`, a rank 4 float tensor.
///
/// `pads` is `[h, w]` or `[top, bottom, left, right]`.
pub fn pad(
    model: &mut TypedModel,
    name: impl Into<String>,
    input: OutletId,
    pads: &[isize],
) -> GraftResult<OutletId> {
    pad_with_value(model, name, input, pads, 0.0)
}

/// Wire a constant padding of `input`, filling margins with `value`.
pub fn pad_with_value(
    model: &mut TypedModel,
    name: impl Into<String>,
    input: OutletId,
    pads: &[isize],
    value: f64,
) -> GraftResult<OutletId> {
    let fact = model.outlet_fact(input)?.clone();
    if fact.rank() != 4 {
        bail!(GraphError::Configuration(format!(
            "Expected input to have a shape with dimension 4, got {}",
            fact.rank()
        )));
    }
    if !fact.datum_type.is_float() {
        bail!(GraphError::TypeMismatch(format!("Can not pad {:?} tensors", fact.datum_type)));
    }
    let margins = Margins::from_list(pads, fact.shape[2], fact.shape[3])?;
    let op = dispatch_floatlike!(constant_pad(fact.datum_type)(margins, value))?;
    Ok(model.wire_node(name, op, &[input])?[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::fingerprint;
    use proptest::prelude::*;

    fn scenario_input() -> Tensor {
        let data: Vec<f32> = (1..=16).map(|x| x as f32).collect();
        Tensor::from_shape(&[1, 1, 4, 4], &data).unwrap()
    }

    #[test]
    fn pad_4x4_into_7x8() {
        let op = Pad::<f32>::constant(Margins::new(1, 2, 1, 3), 0.);
        let mut mask = MaskCache::default();
        let output = op.forward(&mut mask, &scenario_input()).unwrap();
        assert_eq!(output.shape(), &[1, 1, 7, 8]);
        let view = output.to_array_view::<f32>().unwrap();
        for y in 0..7 {
            for x in 0..8 {
                let v = view[[0, 0, y, x]];
                if (1..5).contains(&y) && (1..5).contains(&x) {
                    assert_eq!(v, ((y - 1) * 4 + x) as f32);
                } else {
                    assert_eq!(v, 0.);
                }
            }
        }
        let indices = mask.indices_for(&[1, 1, 7, 8]).unwrap().as_slice::<i64>().unwrap();
        assert_eq!(indices[0], -1);
        assert_eq!(indices[9], 0);
        assert_eq!(indices[4 * 8 + 4], 15);
        assert_eq!(indices.iter().filter(|&&i| i >= 0).count(), 16);
    }

    #[test]
    fn fill_value_and_f64() {
        let op = Pad::<f64>::constant(Margins::new(0, 1, 0, 0), -1.5);
        let input = tensor4(&[[[[1f64, 2.]]]]);
        let output = op.forward(&mut MaskCache::default(), &input).unwrap();
        assert_eq!(output, tensor4(&[[[[1f64, 2.], [-1.5, -1.5]]]]));
    }

    #[test]
    fn display() {
        let op = Pad::<f32>::constant(Margins::new(1, 2, 1, 3), 0.);
        assert_eq!(op.to_string(), "Pad{1, 2, 1, 3} mode: constant, value: 0");
    }

    #[test]
    fn fingerprints_follow_configuration() {
        let a = Pad::<f32>::constant(Margins::new(1, 1, 2, 2), 0.);
        let b = Pad::<f32>::constant(Margins::new(1, 1, 2, 2), 0.);
        let c = Pad::<f32>::constant(Margins::new(1, 1, 2, 3), 0.);
        let d = Pad::<f32>::constant(Margins::new(1, 1, 2, 2), 1.);
        let e = Pad::<f64>::constant(Margins::new(1, 1, 2, 2), 0.);
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
        assert_ne!(fingerprint(&a), fingerprint(&d));
        assert_ne!(fingerprint(&a), fingerprint(&e));
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }

    #[test]
    fn margin_lists() {
        assert_eq!(Margins::from_list(&[1, 2], 3, 3).unwrap(), Margins::new(1, 1, 2, 2));
        assert_eq!(Margins::from_list(&[1, 2, 3, 4], 3, 3).unwrap(), Margins::new(1, 2, 3, 4));
        let err = Margins::from_list(&[1, 2, 3], 3, 3).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::Configuration(_))));
    }

    #[test]
    fn impossible_margins() {
        let err = Margins::from_list(&[-3, 0, 0, 0], 2, 2).unwrap_err();
        assert_eq!(
            GraphError::of(&err),
            Some(&GraphError::Configuration("Impossible height/pad combination".into()))
        );
        let err = Margins::from_list(&[0, 0, 0, -3], 2, 2).unwrap_err();
        assert_eq!(
            GraphError::of(&err),
            Some(&GraphError::Configuration("Impossible width/pad combination".into()))
        );
        let err = Margins::from_list(&[-1, 0, 0, 0], 2, 2).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::Configuration(_))));
    }

    #[test]
    fn overflowing_margins() {
        for pads in [&[isize::MAX, 1][..], &[1, isize::MAX][..], &[isize::MIN, 0, 0, 0][..]] {
            let err = Margins::from_list(pads, 4, 4).unwrap_err();
            assert!(matches!(GraphError::of(&err), Some(GraphError::Configuration(_))));
        }
        let op = Pad::<f32>::constant(Margins::new(usize::MAX, 1, 0, 0), 0.);
        let err = op.output_facts(&[&f32::fact(&[1, 1, 4, 4])]).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::ShapeInference(_))));
        let err = Margins::new(0, 0, usize::MAX, usize::MAX).padded(1, 1).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::ShapeInference(_))));

        let mut model = TypedModel::default();
        let x = model.add_source("x", f32::fact(&[1, 1, 4, 4])).unwrap();
        let err = pad(&mut model, "pad", x, &[isize::MAX, 1]).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::Configuration(_))));
        assert_eq!(model.nodes().len(), 1);
    }

    #[test]
    fn construction_checks_input() {
        let mut model = TypedModel::default();
        let rank3 = model.add_source("rank3", f32::fact(&[1, 4, 4])).unwrap();
        let err = pad(&mut model, "pad", rank3, &[1, 1]).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::Configuration(_))));
        let ints = model.add_source("ints", i32::fact(&[1, 1, 4, 4])).unwrap();
        let err = pad(&mut model, "pad", ints, &[1, 1]).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::TypeMismatch(_))));
        assert_eq!(model.nodes().len(), 2);
    }

    #[test]
    fn construction_picks_element_type() {
        let mut model = TypedModel::default();
        let x = model.add_source("x", f64::fact(&[2, 3, 4, 5])).unwrap();
        let y = pad(&mut model, "pad", x, &[1, 2]).unwrap();
        assert_eq!(model.outlet_fact(y).unwrap(), &f64::fact(&[2, 3, 6, 9]));
        assert!(model.node(y.node).op_is::<Pad<f64>>());
    }

    #[test]
    fn forward_into_validates_buffer() {
        let op = Pad::<f32>::constant(Margins::new(1, 1, 1, 1), 0.);
        let mut mask = MaskCache::default();
        let input = tensor4(&[[[[1f32]]]]);
        let mut wrong_type = Tensor::zero::<f64>(&[1, 1, 3, 3]).unwrap();
        let err = op.forward_into(&mut mask, &mut wrong_type, &input).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::TypeMismatch(_))));
        let mut wrong_shape = Tensor::zero::<f32>(&[1, 1, 3, 4]).unwrap();
        let err = op.forward_into(&mut mask, &mut wrong_shape, &input).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::ShapeInference(_))));
        let mut output = Tensor::zero::<f32>(&[1, 1, 3, 3]).unwrap();
        op.forward_into(&mut mask, &mut output, &input).unwrap();
        assert_eq!(output.as_slice::<f32>().unwrap()[4], 1.);
    }

    #[test]
    fn mask_is_keyed_on_shape() {
        let op = Pad::<f32>::constant(Margins::new(1, 0, 0, 0), 0.);
        let mut mask = MaskCache::default();
        op.forward(&mut mask, &tensor4(&[[[[1f32, 2.]]]])).unwrap();
        assert_eq!(mask.shape(), Some(&[1usize, 1, 2, 2][..]));
        assert!(mask.indices_for(&[1, 1, 2, 3]).is_none());
        op.forward(&mut mask, &tensor4(&[[[[1f32, 2., 3.]]]])).unwrap();
        assert_eq!(mask.indices_for(&[1, 1, 2, 3]).unwrap().as_slice::<i64>().unwrap(), &[
            -1, -1, -1, 0, 1, 2
        ]);
    }

    #[test]
    fn ones_gradient() {
        let margins = Margins::new(1, 2, 1, 3);
        let op = Pad::<f32>::constant(margins, 0.);
        let mut mask = MaskCache::default();
        let ones = tensor0(1f32).broadcast_scalar_to_shape(&[1, 1, 4, 4]).unwrap();
        op.forward(&mut mask, &ones).unwrap();
        let grad = tensor0(1f32).broadcast_scalar_to_shape(&[1, 1, 7, 8]).unwrap();
        for m in [mask.indices_for(&[1, 1, 7, 8]), None] {
            let g = unpad::<f32>(&margins, &[1, 1, 4, 4], &grad, m).unwrap();
            assert_eq!(g, ones);
        }
    }

    #[test]
    fn fill_cells_do_not_contribute() {
        let margins = Margins::new(1, 1, 1, 1);
        let mut grad = Tensor::zero::<f64>(&[1, 1, 3, 3]).unwrap();
        grad.as_slice_mut::<f64>().unwrap().iter_mut().enumerate().for_each(|(ix, g)| {
            *g = if ix == 4 { 0. } else { 100. }
        });
        let g = unpad::<f64>(&margins, &[1, 1, 1, 1], &grad, None).unwrap();
        assert_eq!(g, tensor4(&[[[[0f64]]]]));
    }

    fn padding_problem() -> impl Strategy<Value = (Vec<usize>, Margins)> {
        (1usize..3, 1usize..3, 0usize..4, 0usize..4, 0usize..3, 0usize..3, 0usize..3, 0usize..3)
            .prop_map(|(n, c, h, w, t, b, l, r)| (vec![n, c, h, w], Margins::new(t, b, l, r)))
    }

    fn ramp(shape: &[usize], scale: f64) -> Tensor {
        let len = shape.iter().product::<usize>();
        let data: Vec<f64> = (0..len).map(|i| ((i * 7 % 11) as f64 - 5.) * scale).collect();
        Tensor::from_shape(shape, &data).unwrap()
    }

    proptest! {
        #[test]
        fn shape_law((shape, margins) in padding_problem()) {
            let op = Pad::<f64>::constant(margins, 0.);
            let out = op.forward(&mut MaskCache::default(), &ramp(&shape, 1.)).unwrap();
            prop_assert_eq!(out.shape(), &[
                shape[0],
                shape[1],
                shape[2] + margins.top + margins.bottom,
                shape[3] + margins.left + margins.right,
            ]);
        }

        #[test]
        fn adjoint_identity((shape, margins) in padding_problem()) {
            let op = Pad::<f64>::constant(margins, 0.);
            let x = ramp(&shape, 1.);
            let mut mask = MaskCache::default();
            let y = op.forward(&mut mask, &x).unwrap();
            let g = ramp(y.shape(), 0.5);
            let dot = |a: &Tensor, b: &Tensor| -> f64 {
                a.as_slice::<f64>().unwrap().iter().zip(b.as_slice::<f64>().unwrap()).map(|(a, b)| a * b).sum()
            };
            let by_offsets = unpad::<f64>(&margins, &shape, &g, None).unwrap();
            let by_mask = unpad::<f64>(&margins, &shape, &g, mask.indices_for(y.shape())).unwrap();
            prop_assert_eq!(dot(&y, &g), dot(&x, &by_offsets));
            prop_assert_eq!(&by_offsets, &by_mask);
        }
    }
}

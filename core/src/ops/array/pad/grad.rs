use super::{unpad, MaskCache, Margins, Pad};
use crate::internal::*;
use std::marker::PhantomData;

/// Adjoint of a padding: crops `grad` back to the shape of `input`.
///
/// Inputs are `(input, grad)`. The first one only provides the output shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PadGrad<T: FloatLike> {
    pub margins: Margins,
    _phantom: PhantomData<T>,
}

impl<T: FloatLike> PadGrad<T> {
    pub fn new(margins: Margins) -> PadGrad<T> {
        PadGrad { margins, _phantom: PhantomData }
    }
}

impl<T: FloatLike> Hash for PadGrad<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.margins.hash(state)
    }
}

impl<T: FloatLike> Op for PadGrad<T> {
    fn name(&self) -> Cow<'_, str> {
        "PadGrad".into()
    }

    fn info(&self) -> GraftResult<Vec<String>> {
        Ok(vec![format!("margins: {}", self.margins)])
    }

    op_as_typed_op!();
    impl_op_same_as!();
}

impl<T: FloatLike> EvalOp for PadGrad<T> {
    fn is_stateless(&self) -> bool {
        true
    }

    fn eval(&self, inputs: TVec<TValue>) -> GraftResult<TVec<TValue>> {
        let (input, grad) = args_2!(inputs);
        let grad_in = unpad::<T>(&self.margins, input.shape(), &grad, None)?;
        Ok(tvec!(grad_in.into_tvalue()))
    }
}

impl<T: FloatLike> TypedOp for PadGrad<T> {
    as_op!();

    fn output_facts(&self, inputs: &[&TypedFact]) -> GraftResult<TVec<TypedFact>> {
        check_arity(2, inputs.len())?;
        let (input, grad) = (inputs[0], inputs[1]);
        for dt in [input.datum_type, grad.datum_type] {
            if dt != T::datum_type() {
                bail!(GraphError::TypeMismatch(format!(
                    "PadGrad expects {:?} operands, got {:?}",
                    T::datum_type(),
                    dt
                )));
            }
        }
        if input.rank() != 4 {
            bail!(GraphError::ShapeInference(format!(
                "Expected input to have a shape with dimension 4, got {:?}",
                input.shape
            )));
        }
        let (h, w) = self.margins.padded(input.shape[2], input.shape[3])?;
        if grad.shape[..] != [input.shape[0], input.shape[1], h, w] {
            bail!(GraphError::ShapeInference(format!(
                "Gradient of shape {:?} does not match padded input {:?}",
                grad.shape, input.shape
            )));
        }
        Ok(tvec!(input.clone()))
    }

    fn diff_wrt(&self, _inputs: usize) -> TVec<bool> {
        tvec!(false, true)
    }

    fn sym_diff(
        &self,
        model: &mut TypedModel,
        prefix: &str,
        inputs: &[OutletId],
        _output: OutletId,
        grad: OutletId,
    ) -> GraftResult<TVec<Option<OutletId>>> {
        check_arity(2, inputs.len())?;
        let name = model.unique_name(format!("{prefix}.grad"));
        let wire = model.wire_node(name, Pad::<T>::constant(self.margins, T::zero()), &[grad])?;
        Ok(tvec!(None, Some(wire[0])))
    }

    fn do_diff(
        &self,
        ctx: &mut DiffContext,
        inputs: &[OutletId],
        output: OutletId,
    ) -> GraftResult<()> {
        check_arity(2, inputs.len())?;
        let contribution = {
            let grad = ctx.grad(output).with_context(|| format!("No gradient for {output:?}"))?;
            Pad::<T>::constant(self.margins, T::zero()).forward(&mut MaskCache::default(), grad)?
        };
        ctx.accumulate_grad(inputs[1], contribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crops_interior() {
        let op = PadGrad::<f32>::new(Margins::new(1, 0, 0, 1));
        let input = Tensor::zero::<f32>(&[1, 1, 1, 2]).unwrap();
        let grad = tensor4(&[[[[1f32, 2., 3.], [4., 5., 6.]]]]);
        let out = op.eval(tvec!(input.into_tvalue(), grad.into_tvalue())).unwrap();
        assert_eq!(*out[0], tensor4(&[[[[4f32, 5.]]]]));
    }

    #[test]
    fn checks_gradient_shape() {
        let op = PadGrad::<f32>::new(Margins::new(1, 1, 1, 1));
        let input = f32::fact(&[1, 1, 2, 2]);
        let err = op.output_facts(&[&input, &f32::fact(&[1, 1, 4, 5])]).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::ShapeInference(_))));
        let err = op.output_facts(&[&input, &f64::fact(&[1, 1, 4, 4])]).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::TypeMismatch(_))));
        assert_eq!(op.output_facts(&[&input, &f32::fact(&[1, 1, 4, 4])]).unwrap()[0], input);
    }
}

//! Element-wise arithmetic.
use crate::internal::*;
use std::ops;

/// Element-wise sum of two tensors of identical type and shape.
///
/// Gradient contributions flowing into the same value are summed with it.
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq)]
pub struct Add;

impl Add {
    fn eval_t<T: Datum + ops::AddAssign>(acc: &mut Tensor, other: &Tensor) -> GraftResult<()> {
        acc.as_slice_mut::<T>()?
            .iter_mut()
            .zip(other.as_slice::<T>()?.iter())
            .for_each(|(a, b)| *a += *b);
        Ok(())
    }

    /// Add `other` into `acc` in place.
    pub fn accumulate(acc: &mut Tensor, other: &Tensor) -> GraftResult<()> {
        TypedFact::from(&*acc).check_tensor(other)?;
        dispatch_numbers!(Self::eval_t(acc.datum_type())(acc, other))
    }
}

impl Op for Add {
    fn name(&self) -> Cow<'_, str> {
        "Add".into()
    }

    op_as_typed_op!();
    impl_op_same_as!();
}

impl EvalOp for Add {
    fn is_stateless(&self) -> bool {
        true
    }

    fn eval(&self, inputs: TVec<TValue>) -> GraftResult<TVec<TValue>> {
        let (a, b) = args_2!(inputs);
        let mut sum = a.into_tensor();
        Self::accumulate(&mut sum, &b)?;
        Ok(tvec!(sum.into_tvalue()))
    }
}

impl TypedOp for Add {
    as_op!();

    fn output_facts(&self, inputs: &[&TypedFact]) -> GraftResult<TVec<TypedFact>> {
        check_arity(2, inputs.len())?;
        if inputs[0].datum_type != inputs[1].datum_type {
            bail!(GraphError::TypeMismatch(format!(
                "Add operands are {:?} and {:?}",
                inputs[0].datum_type, inputs[1].datum_type
            )));
        }
        if inputs[0].shape != inputs[1].shape {
            bail!(GraphError::ShapeInference(format!(
                "Add operands have shapes {:?} and {:?}",
                inputs[0].shape, inputs[1].shape
            )));
        }
        Ok(tvec!(inputs[0].clone()))
    }

    fn diff_wrt(&self, inputs: usize) -> TVec<bool> {
        tvec![true; inputs]
    }

    fn sym_diff(
        &self,
        _model: &mut TypedModel,
        _prefix: &str,
        inputs: &[OutletId],
        _output: OutletId,
        grad: OutletId,
    ) -> GraftResult<TVec<Option<OutletId>>> {
        check_arity(2, inputs.len())?;
        Ok(tvec!(Some(grad), Some(grad)))
    }

    fn do_diff(
        &self,
        ctx: &mut DiffContext,
        inputs: &[OutletId],
        output: OutletId,
    ) -> GraftResult<()> {
        check_arity(2, inputs.len())?;
        let grad = ctx.grad(output).with_context(|| format!("No gradient for {output:?}"))?.clone();
        ctx.accumulate_grad(inputs[0], grad.clone())?;
        ctx.accumulate_grad(inputs[1], grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_in_place() {
        let mut acc = tensor1(&[1i64, 2]);
        Add::accumulate(&mut acc, &tensor1(&[10i64, 20])).unwrap();
        assert_eq!(acc, tensor1(&[11i64, 22]));
    }

    #[test]
    fn add_rejects_bool() {
        let mut acc = tensor1(&[true]);
        assert!(Add::accumulate(&mut acc, &tensor1(&[false])).is_err());
    }
}

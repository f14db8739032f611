use std::borrow::Borrow;

use crate::internal::*;
use crate::ops::math::Add;

/// Forward values and gradient slots of one backward pass.
///
/// Gradient slots start empty, which stands for zero: the first contribution
/// to an outlet is stored as is, later ones are added to it.
#[derive(Debug)]
pub struct DiffContext<'a> {
    values: &'a [Option<TVec<TValue>>],
    states: &'a [Option<Box<dyn OpState>>],
    grads: HashMap<OutletId, Tensor>,
}

impl<'a> DiffContext<'a> {
    pub fn new(
        values: &'a [Option<TVec<TValue>>],
        states: &'a [Option<Box<dyn OpState>>],
    ) -> DiffContext<'a> {
        DiffContext { values, states, grads: HashMap::default() }
    }

    /// Value computed for `outlet` by the forward pass.
    pub fn value(&self, outlet: OutletId) -> GraftResult<&'a TValue> {
        let values: &'a [Option<TVec<TValue>>] = self.values;
        values
            .get(outlet.node)
            .and_then(|v| v.as_ref())
            .and_then(|v| v.get(outlet.slot))
            .with_context(|| format!("No forward value for {outlet:?}"))
    }

    /// Op state of `node` as left by the forward pass.
    pub fn state(&self, node: usize) -> Option<&'a dyn OpState> {
        let states: &'a [Option<Box<dyn OpState>>] = self.states;
        states.get(node).and_then(|s| s.as_deref())
    }

    pub fn grad(&self, outlet: OutletId) -> Option<&Tensor> {
        self.grads.get(&outlet)
    }

    pub fn take_grad(&mut self, outlet: OutletId) -> Option<Tensor> {
        self.grads.remove(&outlet)
    }

    /// Add `contribution` to the gradient of `outlet`.
    pub fn accumulate_grad(&mut self, outlet: OutletId, contribution: Tensor) -> GraftResult<()> {
        let value = self.value(outlet)?;
        if !value.datum_type().is_float() {
            bail!(GraphError::TypeMismatch(format!(
                "Can not differentiate with respect to {:?} values",
                value.datum_type()
            )));
        }
        TypedFact::from(&**value)
            .check_tensor(&contribution)
            .with_context(|| format!("Gradient for {outlet:?}"))?;
        match self.grads.get_mut(&outlet) {
            Some(acc) => Add::accumulate(acc, &contribution)?,
            None => {
                self.grads.insert(outlet, contribution);
            }
        }
        Ok(())
    }
}

/// Gradients of `output` with respect to the `wrt` outlets, computed from the
/// values of the last pass of `state`.
///
/// `seed` is the gradient of `output` and must have its type and shape.
/// Outlets `output` does not depend on get a zero gradient.
pub fn backward<M, P>(
    state: &SimpleState<M, P>,
    output: OutletId,
    seed: Tensor,
    wrt: &[OutletId],
) -> GraftResult<TVec<Tensor>>
where
    M: Borrow<TypedModel>,
    P: Borrow<SimplePlan<M>>,
{
    let plan = state.plan();
    let model = plan.model();
    let mut ctx = DiffContext::new(&state.values, &state.states);
    ctx.accumulate_grad(output, seed).context("Seeding backward pass")?;
    for &n in plan.order.iter().rev() {
        let node = model.node(n);
        let outlet = OutletId::new(n, 0);
        if node.inputs.is_empty() || ctx.grad(outlet).is_none() {
            continue;
        }
        if !node.op.diff_wrt(node.inputs.len()).iter().any(|&d| d) {
            continue;
        }
        trace!("Backward step through {node}");
        node.op
            .do_diff(&mut ctx, &node.inputs, outlet)
            .with_context(|| format!("Differentiating {node}"))?;
    }
    wrt.iter()
        .map(|o| match ctx.take_grad(*o) {
            Some(grad) => Ok(grad),
            None => {
                let value = ctx.value(*o)?;
                Tensor::zero_dt(value.datum_type(), value.shape())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_accumulates() {
        crate::setup_test_logger();
        let mut model = TypedModel::default();
        let x = model.add_source("x", f64::fact(&[2])).unwrap();
        let y = model.wire_node("y", Add, &[x, x]).unwrap()[0];
        let z = model.wire_node("z", Add, &[y, x]).unwrap()[0];
        model.set_output_outlets(&[z]).unwrap();
        let plan = SimplePlan::new(&model).unwrap();
        let mut state = SimpleState::new(&plan).unwrap();
        state.run(tvec!(tensor1(&[1f64, 2.]).into_tvalue())).unwrap();
        let grads = backward(&state, z, tensor1(&[1f64, 10.]), &[x, y]).unwrap();
        assert_eq!(grads[0], tensor1(&[3f64, 30.]));
        assert_eq!(grads[1], tensor1(&[1f64, 10.]));
    }

    #[test]
    fn seed_is_checked() {
        let mut model = TypedModel::default();
        let x = model.add_source("x", f32::fact(&[2])).unwrap();
        let y = model.wire_node("y", Add, &[x, x]).unwrap()[0];
        model.set_output_outlets(&[y]).unwrap();
        let plan = SimplePlan::new(&model).unwrap();
        let mut state = SimpleState::new(&plan).unwrap();
        state.run(tvec!(tensor1(&[1f32, 2.]).into_tvalue())).unwrap();
        let err = backward(&state, y, tensor1(&[1f32]), &[x]).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::ShapeInference(_))));
        let err = backward(&state, y, tensor1(&[1f64, 1.]), &[x]).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::TypeMismatch(_))));
    }
}

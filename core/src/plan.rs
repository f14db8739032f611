use std::borrow::Borrow;
use std::marker::PhantomData;

use crate::internal::*;
use crate::model::eval_order_for_nodes;

/// Values shared by all the nodes during one evaluation session.
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    /// Model inputs for the current pass, indexed by source node id.
    pub inputs: HashMap<usize, TValue>,
}

/// An evaluation order for a model, and the outlets it produces.
#[derive(Debug, Clone)]
pub struct SimplePlan<M>
where
    M: Borrow<TypedModel>,
{
    pub model: M,
    pub outputs: Vec<OutletId>,
    pub order: Vec<usize>,
}

impl<M> SimplePlan<M>
where
    M: Borrow<TypedModel>,
{
    /// This contructor returns a plan that will compute all the model default outputs in one pass.
    pub fn new(model: M) -> GraftResult<SimplePlan<M>> {
        let outputs = model.borrow().output_outlets()?.to_vec();
        Self::new_for_outputs(model, &outputs)
    }

    /// This contructor returns a plan that will compute the specified output.
    pub fn new_for_outputs(model: M, outputs: &[OutletId]) -> GraftResult<SimplePlan<M>> {
        let inputs = model.borrow().input_outlets()?.iter().map(|n| n.node).collect::<Vec<_>>();
        let targets = outputs.iter().map(|o| o.node).collect::<Vec<_>>();
        let order = eval_order_for_nodes(model.borrow().nodes(), &inputs, &targets)?;
        Ok(SimplePlan { model, order, outputs: outputs.to_vec() })
    }

    /// Run the plan once, on a fresh state.
    pub fn run(&self, inputs: TVec<TValue>) -> GraftResult<TVec<TValue>> {
        let mut state = SimpleState::new(self)?;
        state.run(inputs)
    }

    pub fn model(&self) -> &TypedModel {
        self.model.borrow()
    }
}

/// Evaluation state of a plan.
///
/// All intermediate values of the last pass are kept until the next one, so
/// they can be read back (for instance by a backward pass). On the next pass,
/// values nobody else holds are recycled as preallocated outputs for the node
/// that produced them.
#[derive(Debug, Clone)]
pub struct SimpleState<M, P>
where
    M: Borrow<TypedModel>,
    P: Borrow<SimplePlan<M>>,
{
    plan: P,
    pub states: Vec<Option<Box<dyn OpState>>>,
    pub session_state: SessionState,
    pub values: Vec<Option<TVec<TValue>>>,
    recycled: Vec<Option<TVec<Tensor>>>,
    _phantom: PhantomData<M>,
}

impl<M, P> SimpleState<M, P>
where
    M: Borrow<TypedModel>,
    P: Borrow<SimplePlan<M>>,
{
    pub fn new(plan: P) -> GraftResult<SimpleState<M, P>> {
        let mut session_state = SessionState::default();
        let states = Self::make_states(plan.borrow().model(), &mut session_state)?;
        let count = plan.borrow().model().nodes().len();
        Ok(SimpleState {
            plan,
            states,
            session_state,
            values: vec![None; count],
            recycled: vec![None; count],
            _phantom: PhantomData,
        })
    }

    fn make_states(
        model: &TypedModel,
        session: &mut SessionState,
    ) -> GraftResult<Vec<Option<Box<dyn OpState>>>> {
        model.nodes().iter().map(|n| n.op.state(session, n.id)).collect()
    }

    pub fn plan(&self) -> &SimplePlan<M> {
        self.plan.borrow()
    }

    pub fn model(&self) -> &TypedModel {
        self.plan().model()
    }

    /// Forget all values and op states, as if the state was just created.
    pub fn reset(&mut self) -> GraftResult<()> {
        let count = self.model().nodes().len();
        self.values = vec![None; count];
        self.recycled = vec![None; count];
        self.session_state = SessionState::default();
        self.states = Self::make_states(self.plan.borrow().model(), &mut self.session_state)?;
        Ok(())
    }

    /// Check `inputs` against the model sources, then feed them.
    ///
    /// Nothing is fed unless every input is valid.
    pub fn set_inputs(&mut self, inputs: TVec<TValue>) -> GraftResult<()> {
        let model = self.plan.borrow().model();
        let sources = model.input_outlets()?;
        if inputs.len() != sources.len() {
            bail!(GraphError::Arity { expected: sources.len(), got: inputs.len() });
        }
        for (source, input) in sources.iter().zip(inputs.iter()) {
            model
                .outlet_fact(*source)?
                .check_tensor(input)
                .with_context(|| format!("Feeding {}", model.node(source.node)))?;
        }
        for (source, input) in sources.iter().zip(inputs) {
            self.session_state.inputs.insert(source.node, input);
        }
        Ok(())
    }

    /// Move values left over from the previous pass to the recycling bin.
    fn recycle(&mut self) {
        for (value, bin) in self.values.iter_mut().zip(self.recycled.iter_mut()) {
            if let Some(outputs) = value.take() {
                if outputs.iter().all(|v| v.is_exclusive()) {
                    *bin = Some(outputs.into_iter().map(|v| v.into_tensor()).collect());
                }
            }
        }
    }

    /// Evaluate the plan on `inputs`.
    ///
    /// Invalid inputs are rejected before the values of the previous pass are
    /// touched.
    pub fn run(&mut self, inputs: TVec<TValue>) -> GraftResult<TVec<TValue>> {
        self.set_inputs(inputs)?;
        self.recycle();
        let &mut SimpleState {
            ref plan,
            ref mut session_state,
            ref mut states,
            ref mut values,
            ref mut recycled,
            ..
        } = self;
        let plan = plan.borrow();
        let model = plan.model();
        for (step, &n) in plan.order.iter().enumerate() {
            let node = model.node(n);
            trace!("Running step {step}, node {node}");
            let inputs: TVec<TValue> = node
                .inputs
                .iter()
                .map(|i| {
                    values[i.node]
                        .as_ref()
                        .and_then(|v| v.get(i.slot))
                        .cloned()
                        .with_context(|| format!("Missing value for {i:?}, input of {node}"))
                })
                .collect::<GraftResult<_>>()?;
            let prealloc = recycled[n].take();
            let outputs = match (states[n].as_mut(), prealloc) {
                (Some(state), Some(prealloc)) => {
                    state.eval_with_prealloc(session_state, node.op.as_op(), prealloc, inputs)
                }
                (Some(state), None) => state.eval(session_state, node.op.as_op(), inputs),
                (None, Some(prealloc)) => node.op.eval_with_prealloc(prealloc, inputs),
                (None, None) => node.op.eval(inputs),
            }
            .with_context(|| format!("Evaluating {node}"))?;
            if outputs.len() != node.outputs.len() {
                bail!(
                    "Evaluating {}: expected {} outputs, got {}",
                    node,
                    node.outputs.len(),
                    outputs.len()
                );
            }
            values[n] = Some(outputs);
        }
        self.outputs()
    }

    fn outputs(&self) -> GraftResult<TVec<TValue>> {
        self.plan().outputs.iter().map(|o| self.value(*o).cloned()).collect()
    }

    /// Value computed for an outlet during the last pass.
    pub fn value(&self, outlet: OutletId) -> GraftResult<&TValue> {
        self.values
            .get(outlet.node)
            .and_then(|v| v.as_ref())
            .and_then(|v| v.get(outlet.slot))
            .with_context(|| format!("No value computed for {outlet:?}"))
    }

    pub fn state(&self, id: usize) -> Option<&dyn OpState> {
        self.states.get(id).and_then(|s| s.as_deref())
    }

    pub fn state_mut(&mut self, id: usize) -> Option<&mut (dyn OpState + 'static)> {
        self.states.get_mut(id).and_then(|s| s.as_deref_mut())
    }
}

#[cfg(test)]
mod tests {
    use crate::internal::*;
    use crate::ops::math::Add;

    fn adder() -> TypedModel {
        let mut model = TypedModel::default();
        let a = model.add_source("a", f32::fact(&[2])).unwrap();
        let b = model.add_const("b", tensor1(&[10f32, 20.])).unwrap();
        let sum = model.wire_node("sum", Add, &[a, b]).unwrap()[0];
        model.set_output_outlets(&[sum]).unwrap();
        model
    }

    #[test]
    fn run_once() {
        crate::setup_test_logger();
        let model = adder();
        let plan = SimplePlan::new(&model).unwrap();
        let outputs = plan.run(tvec!(tensor1(&[1f32, 2.]).into_tvalue())).unwrap();
        assert_eq!(*outputs[0], tensor1(&[11f32, 22.]));
    }

    #[test]
    fn state_is_reusable() {
        let model = adder();
        let plan = SimplePlan::new(&model).unwrap();
        let mut state = SimpleState::new(&plan).unwrap();
        for i in 0..3 {
            let x = i as f32;
            let outputs = state.run(tvec!(tensor1(&[x, x]).into_tvalue())).unwrap();
            assert_eq!(*outputs[0], tensor1(&[x + 10., x + 20.]));
        }
        let sum = model.output_outlets().unwrap()[0];
        assert_eq!(**state.value(sum).unwrap(), tensor1(&[12f32, 22.]));
    }

    #[test]
    fn inputs_are_checked() {
        let model = adder();
        let plan = SimplePlan::new(&model).unwrap();
        let err = plan.run(tvec!(tensor1(&[1f64, 2.]).into_tvalue())).unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::TypeMismatch(_))));
        let err = plan.run(tvec!()).unwrap_err();
        assert_eq!(GraphError::of(&err), Some(&GraphError::Arity { expected: 1, got: 0 }));
    }

    #[test]
    fn rejected_inputs_keep_previous_pass() {
        let mut model = TypedModel::default();
        let a = model.add_source("a", f32::fact(&[2])).unwrap();
        let b = model.add_source("b", f32::fact(&[2])).unwrap();
        let sum = model.wire_node("sum", Add, &[a, b]).unwrap()[0];
        model.set_output_outlets(&[sum]).unwrap();
        let plan = SimplePlan::new(&model).unwrap();
        let mut state = SimpleState::new(&plan).unwrap();
        let (x, y) = (tensor1(&[1f32, 2.]), tensor1(&[10f32, 20.]));
        state.run(tvec!(x.clone().into_tvalue(), y.into_tvalue())).unwrap();

        let err = state
            .run(tvec!(tensor1(&[5f32, 5.]).into_tvalue(), tensor1(&[1f64, 1.]).into_tvalue()))
            .unwrap_err();
        assert!(matches!(GraphError::of(&err), Some(GraphError::TypeMismatch(_))));
        assert!(state.run(tvec!(x.clone().into_tvalue())).is_err());

        assert_eq!(**state.value(sum).unwrap(), tensor1(&[11f32, 22.]));
        assert_eq!(**state.session_state.inputs.get(&a.node).unwrap(), x);
        let grads =
            crate::autodiff::numeric::backward(&state, sum, tensor1(&[1f32, 1.]), &[a]).unwrap();
        assert_eq!(grads[0], tensor1(&[1f32, 1.]));
    }
}

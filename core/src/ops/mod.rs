//! Ops
use std::fmt;

use downcast_rs::Downcast;
use dyn_clone::DynClone;
use dyn_hash::DynHash;

#[macro_use]
pub mod macros;

pub mod array;
pub mod konst;
pub mod math;
pub mod source;

use crate::internal::*;

/// Mutable per-session state of a node, created by `EvalOp::state`.
///
/// The executor owns it and hands it out by `&mut`, so one state is never
/// driven from two threads at once.
pub trait OpState: fmt::Debug + Send + DynClone + Downcast {
    fn eval(
        &mut self,
        session: &mut SessionState,
        op: &dyn Op,
        inputs: TVec<TValue>,
    ) -> GraftResult<TVec<TValue>>;

    /// Evaluate, reusing buffers from a previous pass when they fit.
    fn eval_with_prealloc(
        &mut self,
        session: &mut SessionState,
        op: &dyn Op,
        _prealloc: TVec<Tensor>,
        inputs: TVec<TValue>,
    ) -> GraftResult<TVec<TValue>> {
        self.eval(session, op, inputs)
    }
}
dyn_clone::clone_trait_object!(OpState);
downcast_rs::impl_downcast!(OpState);

pub trait EvalOp {
    #[allow(unused_variables)]
    fn eval(&self, inputs: TVec<TValue>) -> GraftResult<TVec<TValue>> {
        bail!("stateless evaluation not implemented")
    }

    /// Evaluate into caller-supplied storage instead of allocating.
    #[allow(unused_variables)]
    fn eval_with_prealloc(
        &self,
        prealloc: TVec<Tensor>,
        inputs: TVec<TValue>,
    ) -> GraftResult<TVec<TValue>> {
        self.eval(inputs)
    }

    #[allow(unused_variables)]
    fn state(
        &self,
        session: &mut SessionState,
        node_id: usize,
    ) -> GraftResult<Option<Box<dyn OpState>>> {
        Ok(None)
    }

    fn is_stateless(&self) -> bool;
}

/// A base operation
pub trait Op: fmt::Debug + DynClone + Send + Sync + 'static + Downcast + EvalOp {
    fn name(&self) -> Cow<'_, str>;

    /// Short (one-line) strings giving hints on important configuration
    /// details to be displayed in dumps.
    fn info(&self) -> GraftResult<Vec<String>> {
        Ok(vec![])
    }

    /// Compare two ops.
    fn same_as(&self, _other: &dyn Op) -> bool {
        false
    }

    fn as_typed(&self) -> Option<&dyn TypedOp>;
}
dyn_clone::clone_trait_object!(Op);
downcast_rs::impl_downcast!(Op);

pub trait TypedOp:
    Op + fmt::Debug + DynClone + Send + Sync + 'static + Downcast + EvalOp + DynHash
{
    /// Reinterpret the TypedOp as an Op.
    fn as_op(&self) -> &dyn Op;

    /// Reinterpret the TypedOp as an Op, mutably.
    fn as_op_mut(&mut self) -> &mut dyn Op;

    /// Deduce output facts from input facts.
    fn output_facts(&self, inputs: &[&TypedFact]) -> GraftResult<TVec<TypedFact>>;

    /// For each input, can a gradient flow back to it.
    fn diff_wrt(&self, inputs: usize) -> TVec<bool> {
        tvec![false; inputs]
    }

    /// Wire the nodes computing the gradient with respect to each input, given
    /// the gradient `grad` of the op's single output.
    ///
    /// Returns one entry per input, `None` where no gradient flows.
    #[allow(unused_variables)]
    fn sym_diff(
        &self,
        model: &mut TypedModel,
        prefix: &str,
        inputs: &[OutletId],
        output: OutletId,
        grad: OutletId,
    ) -> GraftResult<TVec<Option<OutletId>>> {
        bail!("{} does not support symbolic differentiation", self.name())
    }

    /// Compute the input gradients from the output gradient found in `ctx`,
    /// accumulating them into the inputs' gradient slots.
    #[allow(unused_variables)]
    fn do_diff(
        &self,
        ctx: &mut DiffContext,
        inputs: &[OutletId],
        output: OutletId,
    ) -> GraftResult<()> {
        bail!("{} does not support numeric differentiation", self.name())
    }
}
dyn_clone::clone_trait_object!(TypedOp);
downcast_rs::impl_downcast!(TypedOp);
dyn_hash::hash_trait_object!(TypedOp);

impl<O: TypedOp> From<O> for Box<dyn TypedOp> {
    fn from(it: O) -> Box<dyn TypedOp> {
        Box::new(it)
    }
}

impl AsRef<dyn Op> for Box<dyn TypedOp> {
    fn as_ref(&self) -> &dyn Op {
        self.as_op()
    }
}

impl fmt::Display for Box<dyn TypedOp> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.name())
    }
}

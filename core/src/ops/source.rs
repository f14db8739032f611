use crate::internal::*;

#[derive(Debug, Clone, new)]
pub struct SourceState(pub usize);

impl OpState for SourceState {
    fn eval(
        &mut self,
        session: &mut SessionState,
        _op: &dyn Op,
        _inputs: TVec<TValue>,
    ) -> GraftResult<TVec<TValue>> {
        let value = session
            .inputs
            .get(&self.0)
            .with_context(|| format!("No input fed for source node #{}", self.0))?;
        Ok(tvec!(value.clone()))
    }
}

/// Model input, fed by the caller on each pass.
#[derive(Debug, Clone, new, Hash, PartialEq, Eq)]
pub struct TypedSource {
    pub fact: TypedFact,
}

impl Op for TypedSource {
    fn name(&self) -> Cow<'_, str> {
        "Source".into()
    }

    fn info(&self) -> GraftResult<Vec<String>> {
        Ok(vec![format!("{:?}", self.fact)])
    }

    op_as_typed_op!();
}

impl EvalOp for TypedSource {
    fn is_stateless(&self) -> bool {
        false
    }

    fn state(
        &self,
        _session: &mut SessionState,
        node_id: usize,
    ) -> GraftResult<Option<Box<dyn OpState>>> {
        Ok(Some(Box::new(SourceState(node_id))))
    }
}

impl TypedOp for TypedSource {
    as_op!();

    fn output_facts(&self, _inputs: &[&TypedFact]) -> GraftResult<TVec<TypedFact>> {
        Ok(tvec!(self.fact.clone()))
    }
}

use crate::internal::*;
use num_traits::AsPrimitive;

/// A tensor of the same type and shape as its input, filled with a constant.
#[derive(Debug, Clone, Copy, new, Default, PartialEq)]
pub struct ConstantLike {
    pub value: f32,
}

impl Hash for ConstantLike {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.to_bits().hash(state)
    }
}

impl ConstantLike {
    pub fn make<T>(&self, shape: &[usize]) -> GraftResult<Tensor>
    where
        T: Datum,
        f32: AsPrimitive<T>,
    {
        tensor0::<T>(self.value.as_()).broadcast_scalar_to_shape(shape)
    }
}

impl Op for ConstantLike {
    fn name(&self) -> Cow<'_, str> {
        "ConstantLike".into()
    }

    fn info(&self) -> GraftResult<Vec<String>> {
        Ok(vec![format!("value: {}", self.value)])
    }

    op_as_typed_op!();
    impl_op_same_as!();
}

impl EvalOp for ConstantLike {
    fn is_stateless(&self) -> bool {
        true
    }

    fn eval(&self, inputs: TVec<TValue>) -> GraftResult<TVec<TValue>> {
        let input = args_1!(inputs);
        let value = dispatch_numbers!(Self::make(input.datum_type())(self, input.shape()))?;
        Ok(tvec!(value.into_tvalue()))
    }
}

impl TypedOp for ConstantLike {
    as_op!();

    fn output_facts(&self, inputs: &[&TypedFact]) -> GraftResult<TVec<TypedFact>> {
        check_arity(1, inputs.len())?;
        if !(inputs[0].datum_type.is_float() || inputs[0].datum_type.is_integer()) {
            bail!(GraphError::TypeMismatch(format!(
                "ConstantLike can not build {:?} values",
                inputs[0].datum_type
            )));
        }
        Ok(tvec!(inputs[0].clone()))
    }
}

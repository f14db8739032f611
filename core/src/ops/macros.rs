#[macro_export]
macro_rules! as_op {
    () => {
        fn as_op(&self) -> &dyn Op {
            self
        }

        fn as_op_mut(&mut self) -> &mut dyn Op {
            self
        }
    };
}

#[macro_export]
macro_rules! op_as_typed_op {
    () => {
        fn as_typed(&self) -> Option<&dyn TypedOp> {
            Some(self)
        }
    };
}

#[macro_export]
macro_rules! impl_op_same_as {
    () => {
        fn same_as(&self, other: &dyn Op) -> bool {
            if let Some(other) = other.downcast_ref::<Self>() { self == other } else { false }
        }
    };
}

#[macro_export]
macro_rules! args_1 {
    ($inputs:expr) => {{
        let mut inputs = $inputs;
        $crate::errors::check_arity(1, inputs.len())?;
        inputs.pop().unwrap()
    }};
}

#[macro_export]
macro_rules! args_2 {
    ($inputs:expr) => {{
        let mut inputs = $inputs;
        $crate::errors::check_arity(2, inputs.len())?;
        inputs.reverse();
        (inputs.pop().unwrap(), inputs.pop().unwrap())
    }};
}

#[macro_export]
macro_rules! assert_close {
    ($left:expr, $right:expr) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if let Err(e) = left_val.close_enough(right_val, true) {
                    panic!(r#"assertion failed: `(left ~ right)`
  left: `{:?}`,
 right: `{:?}`
 {:?}"#, left_val, right_val, e)
                }
            }
        }
    });
}

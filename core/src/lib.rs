//! # Graft
//!
//! Small differentiable computation graphs, built around a strided,
//! type-specialized 2D padding operator.
//!
//! ## Example
//!
//! ```
//! use graft_core::internal::*;
//!
//! let mut model = TypedModel::default();
//! let x = model.add_source("x", f32::fact(&[1, 1, 2, 2])).unwrap();
//! let padded = graft_core::ops::array::pad(&mut model, "pad", x, &[1, 1]).unwrap();
//! model.set_output_outlets(&[padded]).unwrap();
//! assert_eq!(&*model.outlet_fact(padded).unwrap().shape, &[1, 1, 4, 4]);
//!
//! let plan = SimplePlan::new(&model).unwrap();
//! let input = tensor4(&[[[[1f32, 2.], [3., 4.]]]]);
//! let outputs = plan.run(tvec!(input.into_tvalue())).unwrap();
//! assert_eq!(outputs[0].as_slice::<f32>().unwrap()[5], 1.0);
//! ```
//!
//! Gradients are available either as new graph nodes
//! ([`autodiff::symbolic::gradients`]) or computed directly after a forward
//! pass ([`autodiff::numeric::backward`]).

#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate log;

#[macro_use]
pub mod ops;

pub mod autodiff;
pub mod errors;
pub mod hash;
pub mod model;
pub mod plan;
pub mod value;

pub use graft_data as data;

/// Result type used across graft.
pub type GraftResult<T> = anyhow::Result<T>;

pub mod prelude {
    pub use crate::errors::GraphError;
    pub use crate::model::{
        DatumExt, DatumTypeExt, InletId, Node, Outlet, OutletId, TypedFact, TypedModel, TypedNode,
    };
    pub use crate::plan::{SimplePlan, SimpleState};
    pub use crate::value::{IntoTValue, TValue};
    pub use crate::GraftResult;
    pub use graft_data::prelude::*;
}

pub mod internal {
    pub use crate::autodiff::numeric::DiffContext;
    pub use crate::errors::check_arity;
    pub use crate::ops::{EvalOp, Op, OpState, TypedOp};
    pub use crate::plan::SessionState;
    pub use crate::prelude::*;
    pub use crate::{args_1, args_2, as_op, impl_op_same_as, op_as_typed_op};
    pub use graft_data::internal::*;
    pub use std::borrow::Cow;
    pub use std::collections::HashMap;
    pub use std::hash::{Hash, Hasher};
    pub use std::sync::Arc;
}

#[cfg(test)]
#[allow(dead_code)]
fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("GRAFT_LOG").try_init();
}

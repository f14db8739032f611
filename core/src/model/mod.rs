//! ## Models and their lifecycle
//!
//! A `TypedModel` is a directed acyclic graph of nodes. Every node holds a
//! `TypedOp` and the facts (datum type and shape) of the values it produces.
//! Facts are computed when a node is wired, so a model that could be built is
//! a model whose shapes are all consistent.
//!
//! Models are evaluated by `crate::plan::SimplePlan`.
mod fact;
mod graph;
mod node;
pub mod order;

pub use self::fact::{DatumExt, DatumTypeExt, TypedFact};
pub use self::graph::TypedModel;
pub use self::node::{InletId, Node, Outlet, OutletId, TypedNode};
pub use self::order::eval_order_for_nodes;

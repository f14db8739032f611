//! Gradients of a model output with respect to some of its values.
//!
//! Both drivers walk the ancestors of the output in reverse evaluation order
//! and rely on the per-op rules of `TypedOp`. [`symbolic`] extends the model
//! with nodes computing the gradients (`sym_diff`), while [`numeric`] computes
//! them right after a forward pass (`do_diff`).
pub mod numeric;
pub mod symbolic;

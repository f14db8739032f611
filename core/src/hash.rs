use crate::ops::TypedOp;
use downcast_rs::Downcast;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Stable fingerprint of an operator configuration.
///
/// Two ops of the same type built from the same configuration always
/// fingerprint identically within a build. The graph uses it to find nodes it
/// can merge.
pub fn fingerprint(op: &dyn TypedOp) -> u64 {
    // DefaultHasher::new() uses fixed keys
    let mut hasher = DefaultHasher::new();
    op.as_any().type_id().hash(&mut hasher);
    op.hash(&mut hasher);
    hasher.finish()
}

//! Array ops: ops that move values around without arithmetic.
mod constant_like;
pub mod pad;

pub use self::constant_like::ConstantLike;
pub use self::pad::{pad, pad_with_value, Margins, MaskCache, Pad, PadGrad, PadMode, PadSpec, PadState};

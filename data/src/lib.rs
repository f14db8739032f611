#[macro_use]
mod macros;

/// A Smallvec instantiation with 4 embeddable values.
///
/// Used about everywhere in graft, for node inputs and outputs, or
/// tensor dimensions.
pub type TVec<T> = smallvec::SmallVec<[T; 4]>;

pub mod prelude {
    pub use crate::datum::{Datum, DatumType, FloatLike};
    pub use crate::tensor::litteral::*;
    pub use crate::tensor::{natural_strides, IntoArcTensor, IntoTensor, Tensor};
    pub use crate::tvec;
    pub use crate::TVec;
    pub use crate::{dispatch_datum, dispatch_floatlike, dispatch_numbers};
}

pub mod internal {
    pub use crate::prelude::*;
    pub use anyhow::{anyhow, bail, ensure, format_err, Context as GraftErrorContext};
    pub use ndarray as graft_ndarray;
    pub use smallvec as graft_smallvec;
}

pub use anyhow;
pub use itertools;
pub use ndarray;

mod datum;
mod tensor;

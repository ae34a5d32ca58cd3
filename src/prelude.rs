//! Re-imports for convenience
#[doc(no_inline)]
pub use crate::{
    AndersonAcceleration, AndersonError, AndersonParams, ParamsError,
};

//! KFX output model: symbols, values, fragments.

pub mod fragment;
pub mod symbol;
pub mod value;

pub use fragment::{Fragment, FragmentList};
pub use symbol::Sym;
pub use value::{Dimension, Value, ValueMap};

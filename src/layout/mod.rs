//! Content tree assembly and margin collapsing.

pub mod images;
pub mod tree;

pub use tree::{ContainerInfo, ContentRef, ContentTree, Margins, RefKind};

//! Style resolution: registry, merge rules, cascade context, defaults.

pub mod context;
pub mod defaults;
pub mod merge;
pub mod postprocess;
pub mod registry;

pub use context::{ContainerFrame, ContainerKind, LayoutState, Resolved, Scope, StyleContext};
pub use defaults::{default_registry, install_defaults};
pub use merge::{MergeContext, MergeRule};
pub use registry::{Position, PositionMode, StyleDef, StyleRegistry, Usage};

//! # fb2kfx
//!
//! A converter core that turns FB2 e-books into Kindle KFX storyline and
//! style fragments, matching Kindle Previewer 3 output at the
//! style-property level.
//!
//! The interesting part is style resolution: a CSS subset parser, a
//! context-sensitive cascade with descendant and child combinators,
//! per-property merge rules, container-aware margin distribution, and a
//! deterministic style interning scheme producing the short `s1J`-style
//! names KP3 generates.
//!
//! ```no_run
//! use fb2kfx::{Options, convert, fb2};
//!
//! let xml = std::fs::read_to_string("book.fb2")?;
//! let document = fb2::parse_document(&xml)?;
//! let result = convert(&document, None, &Options::default());
//! print!("{}", result.fragments.dump());
//! for warning in &result.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! # Ok::<(), fb2kfx::Error>(())
//! ```

pub mod css;
pub mod error;
pub mod fb2;
pub mod kfx;
pub mod layout;
pub mod options;
pub mod storyline;
pub mod style;
pub mod warn;

pub use error::{Error, Result};
pub use kfx::{Fragment, FragmentList, Sym, Value};
pub use options::Options;
pub use storyline::{Conversion, convert};
pub use style::{StyleContext, StyleRegistry};
pub use warn::Warnings;

//! Runtime support for parsers generated by citron.
//!
//! The generator emits a set of packed action/lookahead tables; this crate
//! contains the engine that interprets them. Nothing here depends on the
//! grammar being parsed: the whole contract between the two crates is the
//! [`Tables`](definition::Tables) value stamped into the generated source.

pub mod definition;
pub mod parser;

pub use crate::{
    definition::Tables,
    parser::{ParseError, Parser, Step},
};

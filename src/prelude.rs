//! All the usual imports that the user will need to build and run a grammar.
//!
//! ```
//! use parce_packrat::prelude::*;
//! ```

pub use crate::{
    ExecutionMode,
    Grammar,
    GrammarBuilder,
    GrammarError,
    Outcome,
    ParseFailure,
    ParseOptions,
    Parser,
};

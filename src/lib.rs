//! # parce_packrat
//!
//! A packrat parser-combinator engine with left recursion and a stackless evaluator.
//!
//! ## Getting Started
//!
//! Add the following to your Cargo.toml:
//!
//! ```toml
//! [dependencies]
//! parce_packrat = "0.0.1"
//! ```
//!
//! Grammars are graphs of small parsers, built once with a [`GrammarBuilder`] and then shared
//! by as many parses as you like. Rules may refer to themselves, even on the left:
//!
//! ```
//! use parce_packrat::prelude::*;
//!
//! let mut g = GrammarBuilder::new();
//! let digit = g.pattern("[0-9]")?;
//! let sum = g.recursive("sum", |g, sum| {
//!     let plus = g.char('+');
//!     let tail = g.right(plus, digit);
//!     let add = g.sequence_with(sum, tail, |l: String, r: String| format!("({}+{})", l, r));
//!     Ok(g.choice(add, digit))
//! })?;
//! let grammar = g.build()?;
//!
//! assert_eq!(grammar.parse(sum, "1+2+3", &ParseOptions::default())?, "((1+2)+3)");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Failures are values. [`Grammar::try_parse`] returns an [`Outcome`] either way, and
//! [`Grammar::parse`] turns a failed one into a [`ParseFailure`]:
//!
//! ```
//! use parce_packrat::prelude::*;
//!
//! let mut g = GrammarBuilder::new();
//! let x = g.string("x");
//! let x = g.named(x, "A");
//! let z = g.string("z");
//! let z = g.named(z, "B");
//! let either = g.choice(x, z);
//! let grammar = g.build()?;
//!
//! let error = grammar.parse(either, "y", &ParseOptions::default()).unwrap_err();
//! assert_eq!(error.to_string(), "Expected A or B but found 'y' at position 0");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Grammars with recursion, and any parse deep enough to threaten the stack, run on the
//! iterative evaluator, which keeps its work on the heap. See [`ParseOptions`] to choose for
//! yourself, and [`Grammar::stepper`] to drive a parse one step at a time.

pub mod analysis;
pub mod error;
pub mod eval;
pub mod grammar;
pub(crate) mod memo;
pub mod options;
pub mod outcome;
pub mod plan;
pub mod prelude;

#[doc(inline)]
pub use crate::{
    analysis::Analysis,
    error::{Found, GrammarError, Label, ParseError, ParseFailure, StepperError},
    eval::{Report, Stats, Stepper},
    grammar::{Grammar, GrammarBuilder, Node, NodeId, NodeKind, Parser},
    options::{ExecutionMode, ParseOptions, DEFAULT_DEEP_THRESHOLD},
    outcome::{Failure, Outcome, Output, Success, Value},
    plan::{Evaluator, Mode, Plan},
};

//! Evaluation of a built grammar against one input.
//!
//! Two evaluators walk the graph: [`recursive`] on the native stack, and [`iterative`] on two
//! heap stacks with an explicit continuation for every "then". Everything they decide about a
//! node lives here or in [`memo`](crate::memo); only the control flow differs between them.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Found, ParseError, ParseFailure};
use crate::grammar::{CombineFn, Grammar, NodeId, NodeKind, Parser, Repeat, TransformFn};
use crate::memo::MemoTable;
use crate::options::ParseOptions;
use crate::outcome::{Failure, Outcome, Output, Success, Value};
use crate::plan::{Evaluator, Plan};

pub mod iterative;
mod recursive;

pub use iterative::Stepper;

/// Counters collected over one parse.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Node bodies run. One body run is one unit of the iterative evaluator's work.
    pub evaluations: usize,
    /// Outer-loop iterations of the iterative evaluator; zero for the recursive one.
    pub steps: usize,
    pub memo_hits: usize,
    pub memo_misses: usize,
    pub memo_entries: usize,
    pub growth_iterations: usize,
}

/// An [`Outcome`] together with how it was produced.
#[derive(Debug, Clone)]
pub struct Report {
    pub outcome: Outcome,
    pub evaluator: Evaluator,
    pub stats: Stats,
}

/// Per-parse state shared by both evaluators.
pub(crate) struct Context<'g, 'i> {
    pub grammar: &'g Grammar,
    pub plan: Plan,
    pub input: &'i str,
    pub memo: MemoTable,
    pub evaluations: usize,
}

impl<'g, 'i> Context<'g, 'i> {
    pub fn new(grammar: &'g Grammar, plan: Plan, input: &'i str) -> Context<'g, 'i> {
        Context {
            grammar,
            plan,
            input,
            memo: MemoTable::new(),
            evaluations: 0,
        }
    }

    pub fn stats(&self, steps: usize) -> Stats {
        let memo = self.memo.stats();
        Stats {
            evaluations: self.evaluations,
            steps,
            memo_hits: memo.hits,
            memo_misses: memo.misses,
            memo_entries: self.memo.len(),
            growth_iterations: memo.growth_iterations,
        }
    }

    pub fn kind(&self, id: NodeId) -> &'g NodeKind {
        self.grammar.node(id).kind()
    }

    /// Leaves never need another node's outcome.
    pub fn leaf(&self, id: NodeId, position: usize) -> Option<Outcome> {
        let rest = &self.input[position..];
        let outcome = match self.kind(id) {
            NodeKind::Char { expected, value } => match rest.chars().next() {
                Some(c) if c == *expected => Outcome::success(position, c.len_utf8(), value.clone()),
                _ => self.unexpected(id, position),
            },
            NodeKind::Literal { text, value } => {
                if rest.starts_with(text.as_str()) {
                    Outcome::success(position, text.len(), value.clone())
                } else {
                    self.unexpected(id, position)
                }
            }
            NodeKind::Pattern { regex, .. } => match regex.find(rest) {
                Some(found) => {
                    Outcome::success(position, found.end(), Arc::new(found.as_str().to_string()))
                }
                None => self.unexpected(id, position),
            },
            NodeKind::EndOfInput => {
                if rest.is_empty() {
                    Outcome::success(position, 0, Arc::new(()))
                } else {
                    self.unexpected(id, position)
                }
            }
            NodeKind::Constant(value) => Outcome::success(position, 0, value.clone()),
            _ => return None,
        };
        Some(outcome)
    }

    pub fn unexpected(&self, id: NodeId, position: usize) -> Outcome {
        Outcome::unexpected(position, self.grammar.describe(id), self.input)
    }

    /// A failure of a labelled node at its own start reports the label instead.
    pub fn relabel(&self, id: NodeId, position: usize, outcome: Outcome) -> Outcome {
        match (self.grammar.node(id).label(), outcome) {
            (Some(label), Outcome::Failure(failure)) => {
                Outcome::Failure(failure.relabel(position, label, self.input))
            }
            (_, outcome) => outcome,
        }
    }

    /// Ordered choice at `position` after the first alternative failed.
    pub fn choose(&self, position: usize, first: Failure, second: Outcome) -> Outcome {
        match second {
            Outcome::Failure(second) => {
                let found = Found::at(self.input, position);
                Outcome::Failure(first.merge(second, position, found))
            }
            success => success,
        }
    }

    pub fn not_ahead(&self, id: NodeId, position: usize, inner: Outcome) -> Outcome {
        match inner {
            Outcome::Success(_) => self.unexpected(id, position),
            Outcome::Failure(_) => Outcome::success(position, 0, Arc::new(())),
        }
    }
}

/// Both halves of a sequence matched; `combine` may still reject them.
pub(crate) fn combine(combine: &CombineFn, first: &Success, second: &Success) -> Outcome {
    match guard(|| combine(&first.value, &second.value)) {
        Ok(value) => Outcome::success(first.start, second.end() - first.start, value),
        Err(error) => Outcome::failure(first.start, vec![error]),
    }
}

pub(crate) fn transform(transform: &TransformFn, inner: Outcome) -> Outcome {
    let inner = match inner {
        Outcome::Success(inner) => inner,
        failure => return failure,
    };
    match guard(|| transform(&inner.value)) {
        Ok(value) => Outcome::success(inner.start, inner.length, value),
        Err(error) => Outcome::failure(inner.start, vec![error]),
    }
}

pub(crate) fn lookahead(position: usize, inner: Outcome) -> Outcome {
    match inner {
        Outcome::Success(success) => Outcome::success(position, 0, success.value),
        failure => failure,
    }
}

/// Runs user code, turning a panic into a transformation error.
fn guard(f: impl FnOnce() -> Result<Value, ParseError>) -> Result<Value, ParseError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(ParseError::transformation(panic_message(payload.as_ref())))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "transformation panicked".to_string()
    }
}

/// What a repetition wants next.
pub(crate) enum Pending {
    Evaluate(NodeId, usize),
    Done(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Element,
    Delimiter,
}

/// The loop of a repetition, unrolled so both evaluators can drive it.
pub(crate) struct RepeatState<'g> {
    repeat: &'g Repeat,
    start: usize,
    end: usize,
    count: usize,
    acc: Option<Value>,
    phase: Phase,
}

impl std::fmt::Debug for RepeatState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepeatState")
            .field("element", &self.repeat.element)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("count", &self.count)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl<'g> RepeatState<'g> {
    pub fn begin(repeat: &'g Repeat, position: usize) -> (RepeatState<'g>, Pending) {
        let mut state = RepeatState {
            repeat,
            start: position,
            end: position,
            count: 0,
            acc: None,
            phase: Phase::Element,
        };
        match guard(|| Ok((repeat.seed)())) {
            Ok(seed) => state.acc = Some(seed),
            Err(error) => return (state, Pending::Done(Outcome::failure(position, vec![error]))),
        }
        let pending = if repeat.max == Some(0) {
            state.succeed()
        } else {
            Pending::Evaluate(repeat.element, position)
        };
        (state, pending)
    }

    /// Feeds in the outcome of the last `Evaluate`.
    pub fn resume(&mut self, outcome: Outcome) -> Pending {
        let repeat = self.repeat;
        let success = match outcome {
            Outcome::Success(success) => success,
            Outcome::Failure(failure) if self.count < repeat.min => {
                return Pending::Done(Outcome::Failure(failure))
            }
            Outcome::Failure(_) => return self.succeed(),
        };

        if self.phase == Phase::Delimiter {
            self.phase = Phase::Element;
            return Pending::Evaluate(repeat.element, success.end());
        }

        let acc = match self.acc.take() {
            Some(acc) => acc,
            None => (repeat.seed)(),
        };
        match guard(|| (repeat.fold)(acc, &success.value)) {
            Ok(acc) => self.acc = Some(acc),
            Err(error) => return Pending::Done(Outcome::failure(success.start, vec![error])),
        }
        self.count += 1;
        self.end = success.end();

        let full = repeat.max.map_or(false, |max| self.count >= max);
        // An element that consumed nothing would match forever.
        let stuck = success.length == 0 && self.count >= repeat.min;
        if full || stuck {
            return self.succeed();
        }
        match repeat.delimiter {
            Some(delimiter) => {
                self.phase = Phase::Delimiter;
                Pending::Evaluate(delimiter, self.end)
            }
            None => Pending::Evaluate(repeat.element, self.end),
        }
    }

    fn succeed(&mut self) -> Pending {
        let acc = self.acc.take().unwrap_or_else(|| (self.repeat.seed)());
        Pending::Done(Outcome::success(self.start, self.end - self.start, acc))
    }
}

impl Grammar {
    fn plan(&self, root: NodeId, input: &str, options: &ParseOptions) -> Plan {
        let analysis = self.analysis(root);
        Plan::new(self, &analysis, options, input.len())
    }

    /// Parses `input` with `root` and reports which evaluator ran and what it did.
    ///
    /// # Panics
    ///
    /// If `root` was not built into this grammar.
    pub fn evaluate<T>(&self, root: Parser<T>, input: &str, options: &ParseOptions) -> Report {
        assert!(self.owns(&root), "{:?} does not belong to this grammar", root);
        let plan = self.plan(root.id(), input, options);
        let evaluator = plan.evaluator();
        debug!(root = root.id().index(), input = input.len(), ?evaluator, "parsing");

        let ctx = Context::new(self, plan, input);
        let (outcome, stats) = match evaluator {
            Evaluator::Recursive => recursive::run(ctx, root.id()),
            Evaluator::Iterative => {
                let mut stepper = Stepper::new(ctx, root.id());
                stepper.run();
                stepper.finish()
            }
        };
        debug!(success = outcome.is_success(), end = ?outcome.end(), ?stats, "parsed");
        Report {
            outcome,
            evaluator,
            stats,
        }
    }

    /// Parses `input` with `root`. Never fails: a failed parse is a [`Outcome::Failure`].
    ///
    /// # Panics
    ///
    /// If `root` was not built into this grammar. That is a bug in the calling code, not a
    /// property of the input, so it is not reported as a failure.
    pub fn try_parse<T>(&self, root: Parser<T>, input: &str, options: &ParseOptions) -> Outcome {
        self.evaluate(root, input, options).outcome
    }

    /// Parses `input` with `root` and returns the typed value.
    ///
    /// # Panics
    ///
    /// If `root` was not built into this grammar.
    pub fn parse<T: Output>(&self, root: Parser<T>, input: &str, options: &ParseOptions) -> Result<T, ParseFailure> {
        let success = self.try_parse(root, input, options).into_result()?;
        success.value::<T>().cloned().ok_or_else(|| {
            Failure::new(
                success.start,
                vec![ParseError::transformation(format!(
                    "expected a value of type {}",
                    std::any::type_name::<T>()
                ))],
            )
            .into()
        })
    }

    /// An iterative parse that the caller drives one step at a time.
    ///
    /// The options' execution mode is ignored; a stepper always runs the iterative evaluator.
    pub fn stepper<'g, 'i, T>(&'g self, root: Parser<T>, input: &'i str, options: &ParseOptions) -> Stepper<'g, 'i> {
        assert!(self.owns(&root), "{:?} does not belong to this grammar", root);
        let plan = self
            .plan(root.id(), input, options)
            .with_evaluator(Evaluator::Iterative);
        Stepper::new(Context::new(self, plan, input), root.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Label;
    use crate::grammar::GrammarBuilder;

    fn context<'g, 'i>(grammar: &'g Grammar, root: NodeId, input: &'i str) -> Context<'g, 'i> {
        Context::new(grammar, grammar.plan(root, input, &ParseOptions::default()), input)
    }

    #[test]
    fn leaves_match_at_byte_offsets() {
        let mut g = GrammarBuilder::new();
        let e = g.char('é');
        let word = g.pattern("[a-z]+").unwrap();
        let end = g.end_of_input();
        let grammar = g.build().unwrap();
        let input = "éab";

        let ctx = context(&grammar, e.id(), input);
        assert_eq!(ctx.leaf(e.id(), 0).unwrap().end(), Some(2));
        let ctx = context(&grammar, word.id(), input);
        let matched = ctx.leaf(word.id(), 2).unwrap();
        assert_eq!(matched.value::<String>().map(String::as_str), Some("ab"));
        assert!(!ctx.leaf(word.id(), 0).unwrap().is_success());
        let ctx = context(&grammar, end.id(), input);
        assert!(ctx.leaf(end.id(), 4).unwrap().is_success());
        assert!(!ctx.leaf(end.id(), 2).unwrap().is_success());
    }

    #[test]
    fn panics_become_transformation_errors() {
        let result = guard(|| panic!("bad digit"));
        match result {
            Err(ParseError::Transformation { message, .. }) => assert_eq!(message, "bad digit"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn repetition_leaves_a_trailing_delimiter() {
        let mut g = GrammarBuilder::new();
        let x = g.char('x');
        let comma = g.char(',');
        let list = g.separated(x, comma, 1..).unwrap();
        let grammar = g.build().unwrap();
        let input = "x,x,";
        let ctx = context(&grammar, list.id(), input);

        let repeat = match ctx.kind(list.id()) {
            NodeKind::Repeat(repeat) => repeat,
            kind => panic!("not a repetition: {:?}", kind),
        };
        let (mut state, mut pending) = RepeatState::begin(repeat, 0);
        let outcome = loop {
            match pending {
                Pending::Evaluate(id, position) => {
                    let outcome = ctx.leaf(id, position).unwrap();
                    pending = state.resume(outcome);
                }
                Pending::Done(outcome) => break outcome,
            }
        };
        assert_eq!(outcome.end(), Some(3));
        assert_eq!(outcome.value::<Vec<char>>(), Some(&vec!['x', 'x']));
    }

    #[test]
    fn choices_fail_where_they_started() {
        let mut g = GrammarBuilder::new();
        let a = g.char('a');
        let grammar = g.build().unwrap();
        let input = "ax";
        let ctx = context(&grammar, a.id(), input);

        let deeper = Failure::new(
            1,
            vec![ParseError::unexpected(Label::from("'b'"), Found::Char('x'))],
        );
        let outcome = ctx.choose(0, deeper, Outcome::unexpected(0, Label::from("'c'"), input));
        let failure = outcome.as_failure().unwrap();
        assert_eq!(failure.position, 0);
        assert_eq!(
            &*failure.errors,
            &[ParseError::UnexpectedToken {
                expected: [Label::from("'b'"), Label::from("'c'")].into_iter().collect(),
                found: Found::Char('a'),
            }]
        );
    }

    #[test]
    #[should_panic(expected = "does not belong to this grammar")]
    fn parsing_with_a_foreign_root_panics() {
        let mut other = GrammarBuilder::new();
        let foreign = other.char('x');
        let grammar = GrammarBuilder::new().build().unwrap();
        let _ = grammar.try_parse(foreign, "x", &ParseOptions::default());
    }
}

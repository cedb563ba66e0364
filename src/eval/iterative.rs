//! The evaluator that never recurses.
//!
//! Work waits on an execution stack of frames and finished outcomes on a result stack.
//! Whenever a node needs a child's outcome before it can go on, it pushes a continuation
//! holding whatever it will need, then the child on top of it. The child's outcome lands on the
//! result stack, and the continuation pops it when it comes back around. One pass of the outer
//! loop is one [`Stepper::step`], so a parse can be paused, cancelled, or run to any depth the
//! heap allows.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::trace;

use crate::error::{ParseError, StepperError};
use crate::eval::{self, Context, Pending, RepeatState, Report, Stats};
use crate::grammar::{CombineFn, NodeId, NodeKind, TransformFn};
use crate::memo::{Completion, Lookup};
use crate::outcome::{Failure, Outcome, Success};
use crate::plan::Evaluator;

#[derive(Debug)]
struct Frame<'g> {
    position: usize,
    task: Task<'g>,
}

#[derive(Debug)]
enum Task<'g> {
    /// Evaluate a node through its memo wrapper, if it has one.
    Enter(NodeId),
    /// Evaluate a node's own logic.
    Body(NodeId),
    Resume(Continuation<'g>),
}

/// What a node still has to do once the outcome on top of the result stack is ready.
enum Continuation<'g> {
    Memoized { id: NodeId, grows: bool },
    Relabel { id: NodeId },
    SequenceSecond { second: NodeId, combine: &'g CombineFn },
    SequenceFinish { combine: &'g CombineFn, first: Success },
    ChoiceSecond { second: NodeId },
    ChoiceFinish { first: Failure },
    Map { transform: &'g TransformFn },
    Lookahead,
    NotAhead { id: NodeId },
    Repeat(RepeatState<'g>),
}

impl std::fmt::Debug for Continuation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Continuation::*;

        match self {
            Memoized { id, grows } => write!(f, "Memoized({:?}, grows: {})", id, grows),
            Relabel { id } => write!(f, "Relabel({:?})", id),
            SequenceSecond { second, .. } => write!(f, "SequenceSecond({:?})", second),
            SequenceFinish { first, .. } => write!(f, "SequenceFinish({:?})", first),
            ChoiceSecond { second } => write!(f, "ChoiceSecond({:?})", second),
            ChoiceFinish { first } => write!(f, "ChoiceFinish({:?})", first),
            Map { .. } => f.write_str("Map"),
            Lookahead => f.write_str("Lookahead"),
            NotAhead { id } => write!(f, "NotAhead({:?})", id),
            Repeat(state) => write!(f, "Repeat({:?})", state),
        }
    }
}

/// An iterative parse in progress.
///
/// ```
/// use std::sync::atomic::AtomicBool;
/// use parce_packrat::prelude::*;
///
/// let mut g = GrammarBuilder::new();
/// let x = g.char('x');
/// let xs = g.repeat(x, 1..)?;
/// let grammar = g.build()?;
///
/// let mut stepper = grammar.stepper(xs, "xxx", &ParseOptions::default());
/// assert!(stepper.step());
/// let outcome = stepper.run_until(&AtomicBool::new(false))?;
/// assert_eq!(outcome.end(), Some(3));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Stepper<'g, 'i> {
    ctx: Context<'g, 'i>,
    exec: Vec<Frame<'g>>,
    results: Vec<Outcome>,
    steps: usize,
}

impl<'g, 'i> Stepper<'g, 'i> {
    pub(crate) fn new(ctx: Context<'g, 'i>, root: NodeId) -> Stepper<'g, 'i> {
        Stepper {
            ctx,
            exec: vec![Frame {
                position: 0,
                task: Task::Enter(root),
            }],
            results: vec![],
            steps: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.exec.is_empty()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The final outcome, once there is one.
    pub fn outcome(&self) -> Option<&Outcome> {
        if self.is_finished() {
            self.results.last()
        } else {
            None
        }
    }

    pub fn stats(&self) -> Stats {
        self.ctx.stats(self.steps)
    }

    /// Runs one pass of the outer loop. Returns `false` when there was nothing left to do.
    pub fn step(&mut self) -> bool {
        let Frame { position, task } = match self.exec.pop() {
            Some(frame) => frame,
            None => return false,
        };
        self.steps += 1;

        match task {
            Task::Enter(id) => self.enter(id, position),
            Task::Body(id) => self.body(id, position),
            Task::Resume(continuation) => {
                let outcome = self.results.pop().unwrap_or_else(|| {
                    Outcome::failure(
                        position,
                        vec![ParseError::transformation("continuation resumed without an outcome")],
                    )
                });
                self.resume(continuation, position, outcome)
            }
        }
        true
    }

    pub fn run(&mut self) {
        while self.step() {}
    }

    /// Runs to the end unless `cancel` is set, which is checked before every step.
    pub fn run_until(&mut self, cancel: &AtomicBool) -> Result<Outcome, StepperError> {
        while !self.is_finished() {
            if cancel.load(Ordering::Relaxed) {
                trace!(steps = self.steps, "parse cancelled");
                return Err(StepperError::Cancelled { steps: self.steps });
            }
            self.step();
        }
        self.outcome().cloned().ok_or(StepperError::Unfinished)
    }

    pub fn into_report(self) -> Result<Report, StepperError> {
        if !self.is_finished() {
            return Err(StepperError::Unfinished);
        }
        let (outcome, stats) = self.finish();
        Ok(Report {
            outcome,
            evaluator: Evaluator::Iterative,
            stats,
        })
    }

    pub(crate) fn finish(mut self) -> (Outcome, Stats) {
        let outcome = self.results.pop().unwrap_or_else(|| {
            Outcome::failure(0, vec![ParseError::transformation("parse produced no outcome")])
        });
        (outcome, self.stats())
    }

    fn push(&mut self, position: usize, task: Task<'g>) {
        self.exec.push(Frame { position, task });
    }

    fn resume_with(&mut self, position: usize, continuation: Continuation<'g>) {
        self.push(position, Task::Resume(continuation));
    }

    fn enter(&mut self, id: NodeId, position: usize) {
        if let NodeKind::Lazy { .. } = self.ctx.kind(id) {
            if self.ctx.grammar.node(id).label().is_some() {
                self.resume_with(position, Continuation::Relabel { id });
            }
            let target = self.ctx.grammar.resolve(id);
            return self.push(position, Task::Enter(target));
        }

        let mode = self.ctx.plan.mode(id);
        if !mode.is_memoized() {
            return self.body(id, position);
        }
        match self.ctx.memo.lookup(position, id, mode.grows()) {
            Lookup::Hit(outcome) => self.results.push(outcome),
            Lookup::Miss => {
                self.resume_with(
                    position,
                    Continuation::Memoized {
                        id,
                        grows: mode.grows(),
                    },
                );
                self.body(id, position);
            }
        }
    }

    fn body(&mut self, id: NodeId, position: usize) {
        self.ctx.evaluations += 1;
        if let Some(outcome) = self.ctx.leaf(id, position) {
            let outcome = self.ctx.relabel(id, position, outcome);
            return self.results.push(outcome);
        }
        if self.ctx.grammar.node(id).label().is_some() {
            self.resume_with(position, Continuation::Relabel { id });
        }

        match self.ctx.kind(id) {
            NodeKind::Sequence { first, second, combine } => {
                self.resume_with(
                    position,
                    Continuation::SequenceSecond {
                        second: *second,
                        combine,
                    },
                );
                self.push(position, Task::Enter(*first));
            }
            NodeKind::Choice { first, second } => {
                self.resume_with(position, Continuation::ChoiceSecond { second: *second });
                self.push(position, Task::Enter(*first));
            }
            NodeKind::Map { inner, transform } => {
                self.resume_with(position, Continuation::Map { transform });
                self.push(position, Task::Enter(*inner));
            }
            NodeKind::Repeat(repeat) => {
                let (state, pending) = RepeatState::begin(repeat, position);
                self.repeat(state, position, pending);
            }
            NodeKind::Lookahead(inner) => {
                self.resume_with(position, Continuation::Lookahead);
                self.push(position, Task::Enter(*inner));
            }
            NodeKind::NotAhead(inner) => {
                self.resume_with(position, Continuation::NotAhead { id });
                self.push(position, Task::Enter(*inner));
            }
            NodeKind::Memo(inner) | NodeKind::GrowingMemo(inner) => {
                self.push(position, Task::Enter(*inner));
            }
            NodeKind::Lazy { .. } => {
                let target = self.ctx.grammar.resolve(id);
                self.push(position, Task::Enter(target));
            }
            NodeKind::Char { .. }
            | NodeKind::Literal { .. }
            | NodeKind::Pattern { .. }
            | NodeKind::EndOfInput
            | NodeKind::Constant(_) => {
                let outcome = self.ctx.unexpected(id, position);
                self.results.push(outcome);
            }
        }
    }

    fn repeat(&mut self, state: RepeatState<'g>, position: usize, pending: Pending) {
        match pending {
            Pending::Evaluate(element, at) => {
                self.resume_with(position, Continuation::Repeat(state));
                self.push(at, Task::Enter(element));
            }
            Pending::Done(outcome) => self.results.push(outcome),
        }
    }

    fn resume(&mut self, continuation: Continuation<'g>, position: usize, outcome: Outcome) {
        use Continuation::*;

        let outcome = match continuation {
            Memoized { id, grows } => match self.ctx.memo.complete(position, id, outcome, grows) {
                Completion::Done(outcome) => outcome,
                Completion::Again => {
                    self.resume_with(position, Memoized { id, grows });
                    return self.push(position, Task::Body(id));
                }
            },
            Relabel { id } => self.ctx.relabel(id, position, outcome),
            SequenceSecond { second, combine } => match outcome {
                Outcome::Success(first) => {
                    let next = first.end();
                    self.resume_with(position, SequenceFinish { combine, first });
                    return self.push(next, Task::Enter(second));
                }
                failure => failure,
            },
            SequenceFinish { combine, first } => match outcome {
                Outcome::Success(second) => eval::combine(combine, &first, &second),
                failure => failure,
            },
            ChoiceSecond { second } => match outcome {
                Outcome::Failure(first) => {
                    self.resume_with(position, ChoiceFinish { first });
                    return self.push(position, Task::Enter(second));
                }
                success => success,
            },
            ChoiceFinish { first } => self.ctx.choose(position, first, outcome),
            Map { transform } => eval::transform(transform, outcome),
            Lookahead => eval::lookahead(position, outcome),
            NotAhead { id } => self.ctx.not_ahead(id, position, outcome),
            Repeat(mut state) => {
                let pending = state.resume(outcome);
                return self.repeat(state, position, pending);
            }
        };
        self.results.push(outcome);
    }
}

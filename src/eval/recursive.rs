//! The evaluator that recurses on the native stack.
//!
//! Its depth grows with the grammar's nesting and, for self-referential rules, with the input.

use crate::eval::{self, Context, Pending, RepeatState, Stats};
use crate::grammar::{NodeId, NodeKind};
use crate::memo::{Completion, Lookup};
use crate::outcome::Outcome;

pub(crate) fn run(mut ctx: Context, root: NodeId) -> (Outcome, Stats) {
    let outcome = enter(&mut ctx, root, 0);
    let stats = ctx.stats(0);
    (outcome, stats)
}

/// Evaluates `id` through whatever wrapper the plan gave it.
fn enter(ctx: &mut Context, id: NodeId, position: usize) -> Outcome {
    if let NodeKind::Lazy { .. } = ctx.kind(id) {
        let target = ctx.grammar.resolve(id);
        let outcome = enter(ctx, target, position);
        return ctx.relabel(id, position, outcome);
    }

    let mode = ctx.plan.mode(id);
    if !mode.is_memoized() {
        return body(ctx, id, position);
    }
    if let Lookup::Hit(outcome) = ctx.memo.lookup(position, id, mode.grows()) {
        return outcome;
    }
    loop {
        let outcome = body(ctx, id, position);
        if let Completion::Done(outcome) = ctx.memo.complete(position, id, outcome, mode.grows()) {
            return outcome;
        }
    }
}

fn body(ctx: &mut Context, id: NodeId, position: usize) -> Outcome {
    ctx.evaluations += 1;
    if let Some(outcome) = ctx.leaf(id, position) {
        return ctx.relabel(id, position, outcome);
    }

    let outcome = match ctx.kind(id) {
        NodeKind::Sequence { first, second, combine } => match enter(ctx, *first, position) {
            Outcome::Success(first) => match enter(ctx, *second, first.end()) {
                Outcome::Success(second) => eval::combine(combine, &first, &second),
                failure => failure,
            },
            failure => failure,
        },
        NodeKind::Choice { first, second } => match enter(ctx, *first, position) {
            Outcome::Failure(first) => {
                let second = enter(ctx, *second, position);
                ctx.choose(position, first, second)
            }
            success => success,
        },
        NodeKind::Map { inner, transform } => {
            let inner = enter(ctx, *inner, position);
            eval::transform(transform, inner)
        }
        NodeKind::Repeat(repeat) => {
            let (mut state, mut pending) = RepeatState::begin(repeat, position);
            loop {
                match pending {
                    Pending::Evaluate(element, at) => {
                        let outcome = enter(ctx, element, at);
                        pending = state.resume(outcome);
                    }
                    Pending::Done(outcome) => break outcome,
                }
            }
        }
        NodeKind::Lookahead(inner) => eval::lookahead(position, enter(ctx, *inner, position)),
        NodeKind::NotAhead(inner) => {
            let inner = enter(ctx, *inner, position);
            ctx.not_ahead(id, position, inner)
        }
        NodeKind::Memo(inner) | NodeKind::GrowingMemo(inner) => enter(ctx, *inner, position),
        NodeKind::Lazy { .. } => {
            let target = ctx.grammar.resolve(id);
            enter(ctx, target, position)
        }
        NodeKind::Char { .. }
        | NodeKind::Literal { .. }
        | NodeKind::Pattern { .. }
        | NodeKind::EndOfInput
        | NodeKind::Constant(_) => ctx.unexpected(id, position),
    };
    ctx.relabel(id, position, outcome)
}

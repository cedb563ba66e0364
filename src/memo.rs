//! The packrat memo table and the seed-growing algorithm for left recursion.
//!
//! Both evaluators drive the same two calls: [`MemoTable::lookup`] before a memoized node runs
//! and [`MemoTable::complete`] after each run of its body. Keeping the whole algorithm behind
//! these two calls is what makes the evaluators agree on every input.
//!
//! A miss seeds the slot with an `InfiniteRecursion` failure, so a node that reaches itself at
//! the same position sees a failure instead of recursing forever. For growing nodes, a
//! successful first run becomes the seed: the body runs again, now finding the seed in the slot
//! where it recurses into itself, and every run that ends strictly further replaces the seed.
//! The first run that fails or does not get further stops the growth, and the best seed is final.

use std::collections::HashMap;

use tracing::trace;

use crate::grammar::NodeId;
use crate::outcome::Outcome;

type Key = (usize, NodeId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Holds the recursion placeholder while the body runs for the first time.
    Seeded,
    /// Holds the best result so far while the body runs again.
    Growing,
    Final,
}

#[derive(Debug, Clone)]
struct Slot {
    outcome: Outcome,
    state: State,
}

/// A seed being grown, with every slot created at its position since the last run.
#[derive(Debug)]
struct Growth {
    id: NodeId,
    involved: Vec<NodeId>,
}

pub(crate) enum Lookup {
    Hit(Outcome),
    Miss,
}

pub(crate) enum Completion {
    Done(Outcome),
    Again,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MemoStats {
    pub hits: usize,
    pub misses: usize,
    pub growth_iterations: usize,
}

/// One parse's memo slots. Never shared between parses.
#[derive(Debug, Default)]
pub(crate) struct MemoTable {
    slots: HashMap<Key, Slot>,
    /// Seeds being grown, innermost last, by position.
    growths: HashMap<usize, Vec<Growth>>,
    stats: MemoStats,
}

impl MemoTable {
    pub fn new() -> MemoTable {
        MemoTable::default()
    }

    pub fn stats(&self) -> MemoStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns whatever the slot holds, or seeds it and asks the caller to run the body.
    pub fn lookup(&mut self, position: usize, id: NodeId, grows: bool) -> Lookup {
        let key = (position, id);
        if let Some(slot) = self.slots.get(&key) {
            self.stats.hits += 1;
            return Lookup::Hit(slot.outcome.clone());
        }

        self.stats.misses += 1;
        if let Some(growths) = self.growths.get_mut(&position) {
            for growth in growths.iter_mut() {
                growth.involved.push(id);
            }
        }
        self.slots.insert(
            key,
            Slot {
                outcome: Outcome::infinite_recursion(position),
                state: State::Seeded,
            },
        );
        if grows {
            self.growths.entry(position).or_default().push(Growth {
                id,
                involved: vec![],
            });
        }
        Lookup::Miss
    }

    /// Records one run of the body and decides whether it has to run again.
    pub fn complete(&mut self, position: usize, id: NodeId, outcome: Outcome, grows: bool) -> Completion {
        let key = (position, id);
        let state = self.slots.get(&key).map_or(State::Seeded, |slot| slot.state);

        match state {
            State::Seeded if grows && outcome.is_success() => {
                trace!(position, node = id.index(), end = ?outcome.end(), "planted seed");
                self.store(key, outcome, State::Growing);
                self.again(key)
            }
            State::Seeded => {
                if grows {
                    self.finish_growth(key);
                }
                self.store(key, outcome.clone(), State::Final);
                Completion::Done(outcome)
            }
            State::Growing => {
                let best = match self.slots.get(&key) {
                    Some(slot) => slot.outcome.clone(),
                    None => outcome.clone(),
                };
                match (outcome.end(), best.end()) {
                    (Some(end), Some(best_end)) if end > best_end => {
                        trace!(position, node = id.index(), end, "grew seed");
                        self.store(key, outcome, State::Growing);
                        self.again(key)
                    }
                    _ => {
                        self.finish_growth(key);
                        self.store(key, best.clone(), State::Final);
                        Completion::Done(best)
                    }
                }
            }
            // A final slot is never overwritten.
            State::Final => match self.slots.get(&key) {
                Some(slot) => Completion::Done(slot.outcome.clone()),
                None => Completion::Done(outcome),
            },
        }
    }

    fn store(&mut self, key: Key, outcome: Outcome, state: State) {
        self.slots.insert(key, Slot { outcome, state });
    }

    // Slots created at the seed's position during the last run may have read the old seed.
    fn again(&mut self, key: Key) -> Completion {
        self.stats.growth_iterations += 1;
        let (position, id) = key;
        let growth = self
            .growths
            .get_mut(&position)
            .and_then(|growths| growths.iter_mut().rev().find(|growth| growth.id == id));
        if let Some(growth) = growth {
            for involved in std::mem::take(&mut growth.involved) {
                if involved != id {
                    self.slots.remove(&(position, involved));
                }
            }
        }
        Completion::Again
    }

    fn finish_growth(&mut self, (position, id): Key) {
        if let Some(growths) = self.growths.get_mut(&position) {
            debug_assert_eq!(growths.last().map(|growth| growth.id), Some(id));
            if let Some(index) = growths.iter().rposition(|growth| growth.id == id) {
                growths.remove(index);
            }
            if growths.is_empty() {
                self.growths.remove(&position);
            }
        }
    }
}

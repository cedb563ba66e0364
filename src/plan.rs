use tracing::debug;

use crate::analysis::Analysis;
use crate::grammar::{Grammar, NodeId, NodeKind};
use crate::options::{ExecutionMode, ParseOptions};

/// How a node is wrapped when it is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Direct,
    Memo,
    Growing,
}

impl Mode {
    pub fn is_memoized(self) -> bool {
        self != Mode::Direct
    }

    pub fn grows(self) -> bool {
        self == Mode::Growing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Evaluator {
    Recursive,
    Iterative,
}

/// The wrapper chosen for every node reachable from one root, and the evaluator to run.
#[derive(Debug, Clone)]
pub struct Plan {
    modes: Vec<Mode>,
    evaluator: Evaluator,
}

impl Plan {
    pub fn new(grammar: &Grammar, analysis: &Analysis, options: &ParseOptions, input_len: usize) -> Plan {
        let mut modes = vec![Mode::Direct; grammar.len()];
        for id in analysis.reachable_nodes() {
            modes[id.index()] = mode_for(grammar, analysis, options, id);
        }

        let evaluator = match options.execution_mode {
            ExecutionMode::Recursive => Evaluator::Recursive,
            ExecutionMode::Iterative => Evaluator::Iterative,
            ExecutionMode::Auto => {
                let deep = analysis.max_depth().saturating_mul(input_len + 1) > options.deep_threshold;
                if analysis.has_recursion() || deep {
                    Evaluator::Iterative
                } else {
                    Evaluator::Recursive
                }
            }
        };

        debug!(
            ?evaluator,
            memoized = modes.iter().filter(|mode| mode.is_memoized()).count(),
            growing = modes.iter().filter(|mode| mode.grows()).count(),
            "planned parse"
        );
        Plan { modes, evaluator }
    }

    pub fn mode(&self, id: NodeId) -> Mode {
        self.modes[id.index()]
    }

    pub fn evaluator(&self) -> Evaluator {
        self.evaluator
    }

    /// Runs with `evaluator` whatever the options asked for.
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Plan {
        self.evaluator = evaluator;
        self
    }
}

// A recursive node is always at least memoized: without the placeholder slot, left recursion
// never returns, whatever the flags say.
fn mode_for(grammar: &Grammar, analysis: &Analysis, options: &ParseOptions, id: NodeId) -> Mode {
    let kind = grammar.node(id).kind();
    let recursive = analysis.is_recursive(id);

    match kind {
        NodeKind::GrowingMemo(_) => Mode::Growing,
        _ if recursive && options.enable_automatic_growing_recursion => Mode::Growing,
        NodeKind::Memo(_) => Mode::Memo,
        _ if recursive => Mode::Memo,
        kind if kind.is_leaf() => Mode::Direct,
        _ if options.enable_automatic_memoization && analysis.occurrences(id) > 1 => Mode::Memo,
        _ => Mode::Direct,
    }
}

use std::collections::HashMap;

use tracing::debug;

use crate::grammar::{Grammar, NodeId};

/// What one walk of the graph from a root found out.
///
/// `occurrences` counts every edge into a node (plus one for the root). `recursive` counts the
/// edges that reached a node while it was still open on the walk's call path, so a node is
/// recursive exactly when it heads a cycle.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    root: NodeId,
    occurrences: HashMap<NodeId, usize>,
    recursive: HashMap<NodeId, usize>,
    max_depth: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Enter(NodeId),
    Exit(NodeId),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Unseen,
    Open,
    Closed,
}

impl Analysis {
    /// Depth-first walk from `root` on a heap stack. A node reached again while open is recorded
    /// as recursive and not descended into; a closed node is only counted.
    pub fn of(grammar: &Grammar, root: NodeId) -> Analysis {
        let root = grammar.resolve(root);
        let mut analysis = Analysis {
            root,
            ..Analysis::default()
        };
        let mut states = vec![State::Unseen; grammar.len()];
        let mut stack = vec![Visit::Enter(root)];
        let mut depth = 0;

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(id) => {
                    let id = grammar.resolve(id);
                    *analysis.occurrences.entry(id).or_insert(0) += 1;
                    match states[id.index()] {
                        State::Open => *analysis.recursive.entry(id).or_insert(0) += 1,
                        State::Closed => {}
                        State::Unseen => {
                            states[id.index()] = State::Open;
                            depth += 1;
                            analysis.max_depth = analysis.max_depth.max(depth);
                            stack.push(Visit::Exit(id));
                            let children = grammar.children(id);
                            stack.extend(children.iter().rev().map(|&child| Visit::Enter(child)));
                        }
                    }
                }
                Visit::Exit(id) => {
                    states[id.index()] = State::Closed;
                    depth -= 1;
                }
            }
        }

        debug!(
            root = root.index(),
            reachable = analysis.occurrences.len(),
            recursive = analysis.recursive.len(),
            max_depth = analysis.max_depth,
            "analysed grammar"
        );
        analysis
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn occurrences(&self, id: NodeId) -> usize {
        self.occurrences.get(&id).copied().unwrap_or(0)
    }

    pub fn recursive_occurrences(&self, id: NodeId) -> usize {
        self.recursive.get(&id).copied().unwrap_or(0)
    }

    pub fn is_recursive(&self, id: NodeId) -> bool {
        self.recursive.contains_key(&id)
    }

    pub fn has_recursion(&self) -> bool {
        !self.recursive.is_empty()
    }

    pub fn is_reachable(&self, id: NodeId) -> bool {
        self.occurrences.contains_key(&id)
    }

    /// Number of distinct nodes reachable from the root.
    pub fn reachable(&self) -> usize {
        self.occurrences.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn reachable_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.occurrences.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarBuilder;

    #[test]
    fn plain_trees_have_no_recursion() {
        let mut g = GrammarBuilder::new();
        let a = g.char('a');
        let b = g.char('b');
        let ab = g.sequence(a, b);
        let grammar = g.build().unwrap();
        let analysis = Analysis::of(&grammar, ab.id());

        assert!(!analysis.has_recursion());
        assert_eq!(analysis.reachable(), 3);
        assert_eq!(analysis.max_depth(), 2);
        assert_eq!(analysis.occurrences(a.id()), 1);
    }

    #[test]
    fn shared_nodes_are_counted_per_use() {
        let mut g = GrammarBuilder::new();
        let a = g.char('a');
        let aa = g.sequence(a, a);
        let aaa = g.sequence(aa, a);
        let grammar = g.build().unwrap();
        let analysis = Analysis::of(&grammar, aaa.id());

        assert_eq!(analysis.occurrences(a.id()), 3);
        assert_eq!(analysis.occurrences(aa.id()), 1);
        assert!(!analysis.has_recursion());
    }

    #[test]
    fn self_reference_marks_the_rule_body() {
        let mut g = GrammarBuilder::new();
        let digit = g.char('1');
        let plus = g.char('+');
        let mut body = None;
        let expr = g
            .recursive("expr", |g, expr| {
                let tail = g.right(plus, digit);
                let sum = g.sequence_with(expr, tail, |l: char, _| l);
                let choice = g.choice(sum, digit);
                body = Some(choice);
                Ok(choice)
            })
            .unwrap();
        let grammar = g.build().unwrap();
        let analysis = Analysis::of(&grammar, expr.id());
        let body = body.unwrap();

        assert!(analysis.has_recursion());
        assert!(analysis.is_recursive(body.id()));
        assert_eq!(analysis.recursive_occurrences(body.id()), 1);
        assert_eq!(analysis.occurrences(body.id()), 2);
        assert!(!analysis.is_recursive(digit.id()));
        assert_eq!(analysis.root(), body.id());
    }

    #[test]
    fn mutual_recursion_terminates() {
        let mut g = GrammarBuilder::new();
        let a = g.declare::<char>("a");
        let b = g.declare::<char>("b");
        let x = g.char('x');
        let y = g.char('y');
        let a_body = g.left(b, x);
        let a_body = g.choice(a_body, x);
        let b_body = g.left(a, y);
        let b_body = g.choice(b_body, y);
        g.define(a, a_body).unwrap();
        g.define(b, b_body).unwrap();
        let grammar = g.build().unwrap();
        let analysis = Analysis::of(&grammar, a.id());

        assert!(analysis.is_recursive(a_body.id()));
        assert!(!analysis.is_recursive(b_body.id()));
        assert!(analysis.is_reachable(y.id()));
    }

    #[test]
    fn cached_per_root() {
        let mut g = GrammarBuilder::new();
        let a = g.char('a');
        let many = g.repeat(a, ..).unwrap();
        let grammar = g.build().unwrap();

        let first = grammar.analysis(many.id());
        let second = grammar.analysis(many.id());
        assert!(std::sync::Arc::ptr_eq(&first, &second));
        let other = grammar.analysis(a.id());
        assert_eq!(other.reachable(), 1);
    }
}

//! The parser expression graph.
//!
//! Grammars are built with a [`GrammarBuilder`], which hands out typed [`Parser`] handles. A handle
//! is only an index into the builder's arena, so the same node always maps to the same memo slot,
//! and two structurally identical nodes (say, the same literal under two different names) stay
//! distinct. Self reference goes through [`NodeKind::Lazy`] nodes, which are assigned exactly once
//! and resolved when the grammar is built.
//!
//! ```
//! use parce_packrat::prelude::*;
//!
//! let mut g = GrammarBuilder::new();
//! let digit = g.pattern("[0-9]")?;
//! let digit = g.map(digit, |d: String| d.parse::<i64>().unwrap_or_default());
//! let expr = g.recursive("expr", |g, expr| {
//!     let plus = g.char('+');
//!     let tail = g.right(plus, digit);
//!     let sum = g.sequence_with(expr, tail, |l: i64, r: i64| l + r);
//!     Ok(g.choice(sum, digit))
//! })?;
//! let grammar = g.build()?;
//!
//! assert_eq!(grammar.parse(expr, "1+2+3", &ParseOptions::default())?, 6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;
use std::ops::{Bound, RangeBounds};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use regex::Regex;
use tinyvec::{tiny_vec, TinyVec};
use tracing::debug;

use crate::analysis::Analysis;
use crate::error::{GrammarError, Label, ParseError};
use crate::outcome::{Output, Value};

static NEXT_GRAMMAR: AtomicU32 = AtomicU32::new(0);

/// Stable identity of a node: its index in the grammar's arena.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> NodeId {
        NodeId(index as u32)
    }
}

/// A typed handle to a node. `T` is the value the node produces on success.
pub struct Parser<T> {
    id: NodeId,
    grammar: u32,
    output: PhantomData<fn() -> T>,
}

impl<T> Parser<T> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn new(id: NodeId, grammar: u32) -> Parser<T> {
        Parser {
            id,
            grammar,
            output: PhantomData,
        }
    }
}

impl<T> Clone for Parser<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Parser<T> {}

impl<T> std::fmt::Debug for Parser<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parser({})", self.id.0)
    }
}

pub type CombineFn = Arc<dyn Fn(&Value, &Value) -> Result<Value, ParseError> + Send + Sync>;
pub type TransformFn = Arc<dyn Fn(&Value) -> Result<Value, ParseError> + Send + Sync>;
pub type SeedFn = Arc<dyn Fn() -> Value + Send + Sync>;
pub type FoldFn = Arc<dyn Fn(Value, &Value) -> Result<Value, ParseError> + Send + Sync>;

/// Greedy repetition of `element`, optionally separated by `delimiter`.
#[derive(Clone)]
pub struct Repeat {
    pub element: NodeId,
    pub delimiter: Option<NodeId>,
    pub min: usize,
    pub max: Option<usize>,
    pub seed: SeedFn,
    pub fold: FoldFn,
}

/// One arm per combinator. Evaluators match on this exhaustively.
#[derive(Clone)]
pub enum NodeKind {
    Char { expected: char, value: Value },
    Literal { text: String, value: Value },
    Pattern { source: String, regex: Regex },
    Sequence { first: NodeId, second: NodeId, combine: CombineFn },
    Choice { first: NodeId, second: NodeId },
    Map { inner: NodeId, transform: TransformFn },
    Repeat(Repeat),
    Lookahead(NodeId),
    NotAhead(NodeId),
    EndOfInput,
    Constant(Value),
    Lazy { name: Label, target: Option<NodeId> },
    Memo(NodeId),
    GrowingMemo(NodeId),
}

impl NodeKind {
    pub fn tag(&self) -> &'static str {
        use NodeKind::*;

        match self {
            Char { .. } => "char",
            Literal { .. } => "string",
            Pattern { .. } => "pattern",
            Sequence { .. } => "sequence",
            Choice { .. } => "choice",
            Map { .. } => "map",
            Repeat(_) => "repeat",
            Lookahead(_) => "lookahead",
            NotAhead(_) => "not",
            EndOfInput => "end of input",
            Constant(_) => "constant",
            Lazy { .. } => "lazy",
            Memo(_) => "memo",
            GrowingMemo(_) => "growing memo",
        }
    }

    /// Leaves never call another node.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            NodeKind::Char { .. }
                | NodeKind::Literal { .. }
                | NodeKind::Pattern { .. }
                | NodeKind::EndOfInput
                | NodeKind::Constant(_)
        )
    }

    /// Direct children, without resolving lazies.
    pub fn children(&self) -> TinyVec<[NodeId; 2]> {
        use NodeKind::*;

        match self {
            Sequence { first, second, .. } | Choice { first, second } => {
                tiny_vec!(_ => *first, *second)
            }
            Map { inner, .. } | Lookahead(inner) | NotAhead(inner) | Memo(inner) | GrowingMemo(inner) => {
                tiny_vec!(_ => *inner)
            }
            Repeat(repeat) => match repeat.delimiter {
                Some(delimiter) => tiny_vec![repeat.element, delimiter],
                None => tiny_vec![repeat.element],
            },
            Lazy { target: Some(target), .. } => tiny_vec!(_ => *target),
            Lazy { target: None, .. }
            | Char { .. }
            | Literal { .. }
            | Pattern { .. }
            | EndOfInput
            | Constant(_) => tiny_vec![],
        }
    }
}

impl std::fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Char { expected, .. } => write!(f, "char({:?})", expected),
            NodeKind::Literal { text, .. } => write!(f, "string({:?})", text),
            NodeKind::Pattern { source, .. } => write!(f, "pattern(/{}/)", source),
            NodeKind::Lazy { name, target } => write!(f, "lazy({}, {:?})", name, target),
            other => write!(f, "{}{:?}", other.tag(), other.children().as_slice()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    label: Option<Label>,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }
}

/// Mints nodes. Nothing it creates can be evaluated until [`GrammarBuilder::build`].
pub struct GrammarBuilder {
    grammar: u32,
    nodes: Vec<Node>,
    foreign: bool,
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        GrammarBuilder::new()
    }
}

impl GrammarBuilder {
    pub fn new() -> GrammarBuilder {
        GrammarBuilder {
            grammar: NEXT_GRAMMAR.fetch_add(1, Ordering::Relaxed),
            nodes: vec![],
            foreign: false,
        }
    }

    fn push<T>(&mut self, kind: NodeKind) -> Parser<T> {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, label: None });
        Parser::new(id, self.grammar)
    }

    fn own<T>(&mut self, parser: Parser<T>) -> NodeId {
        if parser.grammar != self.grammar {
            self.foreign = true;
        }
        parser.id
    }

    pub fn char(&mut self, expected: char) -> Parser<char> {
        self.push(NodeKind::Char {
            expected,
            value: Arc::new(expected),
        })
    }

    pub fn string(&mut self, text: impl Into<String>) -> Parser<String> {
        let text = text.into();
        let value: Value = Arc::new(text.clone());
        self.push(NodeKind::Literal { text, value })
    }

    /// Matches a regular expression anchored at the current position; produces the matched text.
    pub fn pattern(&mut self, source: &str) -> Result<Parser<String>, GrammarError> {
        let regex = Regex::new(&format!("^(?:{})", source)).map_err(|source_error| {
            GrammarError::Pattern {
                pattern: source.to_string(),
                source: source_error,
            }
        })?;
        Ok(self.push(NodeKind::Pattern {
            source: source.to_string(),
            regex,
        }))
    }

    pub fn end_of_input(&mut self) -> Parser<()> {
        self.push(NodeKind::EndOfInput)
    }

    /// Always succeeds without consuming anything.
    pub fn constant<T: Output>(&mut self, value: T) -> Parser<T> {
        self.push(NodeKind::Constant(Arc::new(value)))
    }

    pub fn sequence<A: Output, B: Output>(&mut self, first: Parser<A>, second: Parser<B>) -> Parser<(A, B)> {
        self.sequence_with(first, second, |a, b| (a, b))
    }

    pub fn sequence_with<A: Output, B: Output, C: Output>(
        &mut self,
        first: Parser<A>,
        second: Parser<B>,
        f: impl Fn(A, B) -> C + Send + Sync + 'static,
    ) -> Parser<C> {
        let first = self.own(first);
        let second = self.own(second);
        let combine: CombineFn = Arc::new(move |a: &Value, b: &Value| {
            Ok(Arc::new(f(cast::<A>(a)?, cast::<B>(b)?)) as Value)
        });
        self.push(NodeKind::Sequence { first, second, combine })
    }

    /// `first` then `second`, keeping `first`'s value.
    pub fn left<A: Output, B: Output>(&mut self, first: Parser<A>, second: Parser<B>) -> Parser<A> {
        self.sequence_with(first, second, |a, _| a)
    }

    /// `first` then `second`, keeping `second`'s value.
    pub fn right<A: Output, B: Output>(&mut self, first: Parser<A>, second: Parser<B>) -> Parser<B> {
        self.sequence_with(first, second, |_, b| b)
    }

    /// Ordered choice: `second` is only tried when `first` fails.
    pub fn choice<T: Output>(&mut self, first: Parser<T>, second: Parser<T>) -> Parser<T> {
        let first = self.own(first);
        let second = self.own(second);
        self.push(NodeKind::Choice { first, second })
    }

    /// Ordered choice over any number of alternatives, tried left to right.
    pub fn choice_all<T: Output>(
        &mut self,
        alternatives: impl IntoIterator<Item = Parser<T>>,
    ) -> Result<Parser<T>, GrammarError> {
        let mut alternatives: Vec<_> = alternatives.into_iter().collect();
        let mut choice = alternatives.pop().ok_or(GrammarError::EmptyChoice)?;
        while let Some(alternative) = alternatives.pop() {
            choice = self.choice(alternative, choice);
        }
        Ok(choice)
    }

    /// A panic inside `f` is reported as a transformation error, not propagated. The panic hook
    /// still runs, so the default hook prints each one to stderr; use [`try_map`](Self::try_map)
    /// for transformations that are expected to fail.
    pub fn map<A: Output, U: Output>(
        &mut self,
        inner: Parser<A>,
        f: impl Fn(A) -> U + Send + Sync + 'static,
    ) -> Parser<U> {
        let inner = self.own(inner);
        let transform: TransformFn =
            Arc::new(move |value: &Value| Ok(Arc::new(f(cast::<A>(value)?)) as Value));
        self.push(NodeKind::Map { inner, transform })
    }

    /// Like [`map`](Self::map), but `f` may reject the value; the error becomes the failure's cause.
    pub fn try_map<A: Output, U: Output, E>(
        &mut self,
        inner: Parser<A>,
        f: impl Fn(A) -> Result<U, E> + Send + Sync + 'static,
    ) -> Parser<U>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let inner = self.own(inner);
        let transform: TransformFn = Arc::new(move |value: &Value| {
            f(cast::<A>(value)?)
                .map(|out| Arc::new(out) as Value)
                .map_err(ParseError::caused_by)
        });
        self.push(NodeKind::Map { inner, transform })
    }

    /// Collects between `range.start` and `range.end` matches of `element`.
    pub fn repeat<T: Output>(
        &mut self,
        element: Parser<T>,
        range: impl RangeBounds<usize>,
    ) -> Result<Parser<Vec<T>>, GrammarError> {
        let element = self.own(element);
        self.push_repeat(element, None, range, collect_seed::<T>(), collect_fold::<T>())
    }

    /// Like [`repeat`](Self::repeat) with `delimiter` between elements. A trailing delimiter is
    /// left unconsumed.
    pub fn separated<T: Output, D: Output>(
        &mut self,
        element: Parser<T>,
        delimiter: Parser<D>,
        range: impl RangeBounds<usize>,
    ) -> Result<Parser<Vec<T>>, GrammarError> {
        let element = self.own(element);
        let delimiter = self.own(delimiter);
        self.push_repeat(
            element,
            Some(delimiter),
            range,
            collect_seed::<T>(),
            collect_fold::<T>(),
        )
    }

    /// The general repetition: every match of `element` is folded into an accumulator.
    pub fn fold<T: Output, A: Output>(
        &mut self,
        element: Parser<T>,
        range: impl RangeBounds<usize>,
        seed: impl Fn() -> A + Send + Sync + 'static,
        f: impl Fn(A, T) -> A + Send + Sync + 'static,
    ) -> Result<Parser<A>, GrammarError> {
        let element = self.own(element);
        let seed: SeedFn = Arc::new(move || Arc::new(seed()) as Value);
        let fold: FoldFn = Arc::new(move |acc: Value, item: &Value| {
            let acc = take::<A>(acc)?;
            Ok(Arc::new(f(acc, cast::<T>(item)?)) as Value)
        });
        self.push_repeat(element, None, range, seed, fold)
    }

    fn push_repeat<T>(
        &mut self,
        element: NodeId,
        delimiter: Option<NodeId>,
        range: impl RangeBounds<usize>,
        seed: SeedFn,
        fold: FoldFn,
    ) -> Result<Parser<T>, GrammarError> {
        let (min, max) = bounds(range)?;
        Ok(self.push(NodeKind::Repeat(Repeat {
            element,
            delimiter,
            min,
            max,
            seed,
            fold,
        })))
    }

    pub fn optional<T: Output>(&mut self, inner: Parser<T>) -> Parser<Option<T>> {
        let some = self.map(inner, Some);
        let none = self.constant(None);
        self.choice(some, none)
    }

    /// Succeeds with `inner`'s value when `inner` matches, but consumes nothing.
    pub fn lookahead<T: Output>(&mut self, inner: Parser<T>) -> Parser<T> {
        let inner = self.own(inner);
        self.push(NodeKind::Lookahead(inner))
    }

    /// Succeeds, consuming nothing, only when `inner` does not match.
    pub fn not<T: Output>(&mut self, inner: Parser<T>) -> Parser<()> {
        let inner = self.own(inner);
        self.push(NodeKind::NotAhead(inner))
    }

    /// Memoizes `inner` regardless of what the analysis decides.
    pub fn memo<T: Output>(&mut self, inner: Parser<T>) -> Parser<T> {
        let inner = self.own(inner);
        self.push(NodeKind::Memo(inner))
    }

    /// Memoizes `inner` and grows its seed, for left recursion the analysis cannot see.
    pub fn growing_memo<T: Output>(&mut self, inner: Parser<T>) -> Parser<T> {
        let inner = self.own(inner);
        self.push(NodeKind::GrowingMemo(inner))
    }

    /// A copy of `parser` that reports `label` when it fails where it started.
    pub fn named<T: Output>(&mut self, parser: Parser<T>, label: impl Into<Label>) -> Parser<T> {
        let id = self.own(parser);
        let label = Some(label.into());
        let kind = match &self.nodes[id.index()].kind {
            // Copying an undefined rule would detach it from its later definition.
            NodeKind::Lazy { name, .. } => NodeKind::Lazy {
                name: name.clone(),
                target: Some(id),
            },
            kind => kind.clone(),
        };
        let copy = self.push(kind);
        self.nodes[copy.id.index()].label = label;
        copy
    }

    /// A rule that can be referred to before it is [`define`](Self::define)d.
    pub fn declare<T: Output>(&mut self, name: impl Into<Label>) -> Parser<T> {
        self.push(NodeKind::Lazy {
            name: name.into(),
            target: None,
        })
    }

    /// Gives a declared rule its body. Each rule can be defined once.
    pub fn define<T: Output>(&mut self, rule: Parser<T>, body: Parser<T>) -> Result<(), GrammarError> {
        let rule = self.own(rule);
        let body = self.own(body);
        match &mut self.nodes[rule.index()].kind {
            NodeKind::Lazy { target: Some(_), name } => Err(GrammarError::Redefined(name.clone())),
            NodeKind::Lazy { target, .. } => {
                *target = Some(body);
                Ok(())
            }
            _ => Err(GrammarError::NotDeclared),
        }
    }

    /// Declares a rule, builds its body with a handle to itself, and defines it.
    pub fn recursive<T: Output>(
        &mut self,
        name: impl Into<Label>,
        body: impl FnOnce(&mut GrammarBuilder, Parser<T>) -> Result<Parser<T>, GrammarError>,
    ) -> Result<Parser<T>, GrammarError> {
        let rule = self.declare(name);
        let definition = body(self, rule)?;
        self.define(rule, definition)?;
        Ok(rule)
    }

    /// Freezes the graph, resolving every lazy reference to the node it finally stands for.
    pub fn build(mut self) -> Result<Grammar, GrammarError> {
        if self.foreign {
            return Err(GrammarError::ForeignParser);
        }

        let mut resolved = vec![];
        for (index, node) in self.nodes.iter().enumerate() {
            if let NodeKind::Lazy { .. } = node.kind {
                resolved.push((index, resolve_chain(&self.nodes, NodeId(index as u32))?));
            }
        }
        let rules = resolved.len();
        for (index, target) in resolved {
            if let NodeKind::Lazy { target: slot, .. } = &mut self.nodes[index].kind {
                *slot = Some(target);
            }
        }

        debug!(nodes = self.nodes.len(), rules, "built grammar");
        Ok(Grammar {
            grammar: self.grammar,
            nodes: self.nodes,
            analyses: RwLock::new(HashMap::new()),
        })
    }
}

fn resolve_chain(nodes: &[Node], start: NodeId) -> Result<NodeId, GrammarError> {
    let mut seen = vec![start];
    let mut current = start;
    loop {
        match &nodes[current.index()].kind {
            NodeKind::Lazy { target: None, name } => return Err(GrammarError::Undefined(name.clone())),
            NodeKind::Lazy { target: Some(next), name } => {
                if seen.contains(next) {
                    return Err(GrammarError::LazyCycle(name.clone()));
                }
                seen.push(*next);
                current = *next;
            }
            _ => return Ok(current),
        }
    }
}

fn bounds(range: impl RangeBounds<usize>) -> Result<(usize, Option<usize>), GrammarError> {
    let min = match range.start_bound() {
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n.checked_add(1).ok_or(GrammarError::RepeatOverflow)?,
        Bound::Unbounded => 0,
    };
    let max = match range.end_bound() {
        Bound::Included(&n) => Some(n),
        Bound::Excluded(&0) => return Err(GrammarError::InvalidRepeat { min, max: 0 }),
        Bound::Excluded(&n) => Some(n - 1),
        Bound::Unbounded => None,
    };
    match max {
        Some(max) if max < min => Err(GrammarError::InvalidRepeat { min, max }),
        _ => Ok((min, max)),
    }
}

pub(crate) fn cast<T: Output>(value: &Value) -> Result<T, ParseError> {
    value.downcast_ref::<T>().cloned().ok_or_else(|| {
        ParseError::transformation(format!(
            "expected a value of type {}",
            std::any::type_name::<T>()
        ))
    })
}

/// Takes `T` out of `value`, cloning only when the value is shared.
fn take<T: Output>(value: Value) -> Result<T, ParseError> {
    match value.downcast::<T>() {
        Ok(value) => Ok(Arc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone())),
        Err(_) => Err(ParseError::transformation(format!(
            "expected a value of type {}",
            std::any::type_name::<T>()
        ))),
    }
}

fn collect_seed<T: Output>() -> SeedFn {
    Arc::new(|| Arc::new(Vec::<T>::new()) as Value)
}

fn collect_fold<T: Output>() -> FoldFn {
    Arc::new(|acc: Value, item: &Value| {
        let mut items = take::<Vec<T>>(acc)?;
        items.push(cast::<T>(item)?);
        Ok(Arc::new(items) as Value)
    })
}

/// A built grammar. Immutable, `Send + Sync`, and meant to be shared between parses.
pub struct Grammar {
    grammar: u32,
    nodes: Vec<Node>,
    analyses: RwLock<HashMap<NodeId, Arc<Analysis>>>,
}

impl Grammar {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn owns<T>(&self, parser: &Parser<T>) -> bool {
        parser.grammar == self.grammar && parser.id.index() < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// The node `id` stands for: itself, or a lazy's final target.
    pub fn resolve(&self, id: NodeId) -> NodeId {
        match self.nodes[id.index()].kind {
            NodeKind::Lazy { target: Some(target), .. } => target,
            _ => id,
        }
    }

    /// Children of `id` with lazies resolved.
    pub fn children(&self, id: NodeId) -> TinyVec<[NodeId; 2]> {
        self.node(id)
            .kind
            .children()
            .into_iter()
            .map(|child| self.resolve(child))
            .collect()
    }

    /// The label reported when `id` fails without a better explanation.
    pub fn describe(&self, id: NodeId) -> Label {
        let node = self.node(id);
        if let Some(label) = &node.label {
            return label.clone();
        }
        match &node.kind {
            NodeKind::Char { expected, .. } => Label::from(format!("{:?}", expected)),
            NodeKind::Literal { text, .. } => Label::from(format!("{:?}", text)),
            NodeKind::Pattern { source, .. } => Label::from(format!("/{}/", source)),
            NodeKind::EndOfInput => Label::from("end of input"),
            NodeKind::Constant(_) => Label::from("anything"),
            NodeKind::Lazy { name, .. } => name.clone(),
            NodeKind::NotAhead(inner) => Label::from(format!("not {}", self.describe(*inner))),
            NodeKind::Choice { first, second } => {
                Label::from(format!("{} or {}", self.describe(*first), self.describe(*second)))
            }
            NodeKind::Sequence { first: inner, .. }
            | NodeKind::Map { inner, .. }
            | NodeKind::Lookahead(inner)
            | NodeKind::Memo(inner)
            | NodeKind::GrowingMemo(inner)
            | NodeKind::Repeat(Repeat { element: inner, .. }) => self.describe(*inner),
        }
    }

    /// The analysis of everything reachable from `root`, computed on first use and cached.
    pub fn analysis(&self, root: NodeId) -> Arc<Analysis> {
        let root = self.resolve(root);
        let cached = self
            .analyses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&root)
            .cloned();
        if let Some(analysis) = cached {
            return analysis;
        }

        let analysis = Arc::new(Analysis::of(self, root));
        self.analyses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(root)
            .or_insert(analysis)
            .clone()
    }
}

impl std::fmt::Debug for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_literals_are_distinct_nodes() {
        let mut g = GrammarBuilder::new();
        let a = g.char('a');
        let b = g.char('a');
        assert_ne!(a.id(), b.id());

        let named = g.named(a, "letter");
        assert_ne!(named.id(), a.id());
        let grammar = g.build().unwrap();
        assert_eq!(grammar.describe(a.id()), Label::from("'a'"));
        assert_eq!(grammar.describe(named.id()), Label::from("letter"));
    }

    #[test]
    fn lazy_chains_resolve_to_the_body() {
        let mut g = GrammarBuilder::new();
        let outer = g.declare::<char>("outer");
        let inner = g.declare::<char>("inner");
        let x = g.char('x');
        g.define(outer, inner).unwrap();
        g.define(inner, x).unwrap();
        let grammar = g.build().unwrap();

        assert_eq!(grammar.resolve(outer.id()), x.id());
        assert_eq!(grammar.resolve(inner.id()), x.id());
    }

    #[test]
    fn undefined_rules_fail_the_build() {
        let mut g = GrammarBuilder::new();
        let rule = g.declare::<char>("rule");
        let x = g.char('x');
        g.choice(rule, x);
        assert!(matches!(g.build(), Err(GrammarError::Undefined(name)) if &**name == "rule"));
    }

    #[test]
    fn rules_that_only_name_each_other_fail_the_build() {
        let mut g = GrammarBuilder::new();
        let a = g.declare::<char>("a");
        let b = g.declare::<char>("b");
        g.define(a, b).unwrap();
        g.define(b, a).unwrap();
        assert!(matches!(g.build(), Err(GrammarError::LazyCycle(_))));
    }

    #[test]
    fn rules_are_defined_once() {
        let mut g = GrammarBuilder::new();
        let rule = g.declare::<char>("rule");
        let x = g.char('x');
        let y = g.char('y');
        g.define(rule, x).unwrap();
        assert!(matches!(g.define(rule, y), Err(GrammarError::Redefined(_))));
        assert!(matches!(g.define(x, y), Err(GrammarError::NotDeclared)));
    }

    #[test]
    fn naming_a_rule_before_its_definition_follows_the_definition() {
        let mut g = GrammarBuilder::new();
        let rule = g.declare::<char>("rule");
        let named = g.named(rule, "thing");
        let x = g.char('x');
        g.define(rule, x).unwrap();
        let grammar = g.build().unwrap();
        assert_eq!(grammar.resolve(named.id()), x.id());
        assert_eq!(grammar.describe(named.id()), Label::from("thing"));
    }

    #[test]
    fn parsers_from_other_builders_are_rejected() {
        let mut other = GrammarBuilder::new();
        let foreign = other.char('x');
        let mut g = GrammarBuilder::new();
        let x = g.char('x');
        g.choice(x, foreign);
        assert!(matches!(g.build(), Err(GrammarError::ForeignParser)));
    }

    #[test]
    fn repeat_ranges() {
        assert_eq!(bounds(..).unwrap(), (0, None));
        assert_eq!(bounds(1..).unwrap(), (1, None));
        assert_eq!(bounds(10..=100).unwrap(), (10, Some(100)));
        assert_eq!(bounds(2..5).unwrap(), (2, Some(4)));
        assert!(bounds(0..0).is_err());
        assert!(bounds(5..=4).is_err());
        assert_eq!(
            bounds((Bound::Excluded(1), Bound::Included(3))).unwrap(),
            (2, Some(3))
        );
        assert!(matches!(
            bounds((Bound::Excluded(usize::MAX), Bound::Unbounded)),
            Err(GrammarError::RepeatOverflow)
        ));
    }

    #[test]
    fn choice_all_nests_to_the_right() {
        let mut g = GrammarBuilder::new();
        let a = g.char('a');
        let b = g.char('b');
        let c = g.char('c');
        let any = g.choice_all([a, b, c]).unwrap();
        let grammar = g.build().unwrap();
        assert_eq!(grammar.children(any.id())[0], a.id());
        assert_eq!(grammar.describe(any.id()), Label::from("'a' or 'b' or 'c'"));

        let mut g = GrammarBuilder::new();
        assert!(matches!(
            g.choice_all(Vec::<Parser<char>>::new()),
            Err(GrammarError::EmptyChoice)
        ));
    }

    #[test]
    fn invalid_patterns_are_reported() {
        let mut g = GrammarBuilder::new();
        assert!(matches!(g.pattern("[a-"), Err(GrammarError::Pattern { .. })));
    }

    #[test]
    fn children_follow_rules() {
        let mut g = GrammarBuilder::new();
        let rule = g.declare::<char>("rule");
        let x = g.char('x');
        let pair = g.sequence(rule, x);
        g.define(rule, x).unwrap();
        let grammar = g.build().unwrap();
        assert_eq!(grammar.children(pair.id()).as_slice(), &[x.id(), x.id()]);
    }
}

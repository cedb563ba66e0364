use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{Found, Label, ParseError, ParseFailure};

/// A type-erased parse value. Typed [`Parser`](crate::Parser) handles know what is inside.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Anything a parser can produce.
pub trait Output: Any + Clone + Send + Sync {}

impl<T: Any + Clone + Send + Sync> Output for T {}

/// The result of evaluating one node at one position.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(Success),
    Failure(Failure),
}

#[derive(Clone)]
pub struct Success {
    pub start: usize,
    pub length: usize,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub position: usize,
    pub errors: Arc<[ParseError]>,
}

impl Success {
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn value<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Success {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Success")
            .field("start", &self.start)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

impl Failure {
    pub fn new(position: usize, errors: Vec<ParseError>) -> Failure {
        Failure {
            position,
            errors: errors.into(),
        }
    }

    pub fn has_infinite_recursion(&self) -> bool {
        self.errors.iter().any(ParseError::is_infinite_recursion)
    }

    /// Every label mentioned by an `UnexpectedToken` error.
    pub fn expected(&self) -> BTreeSet<Label> {
        self.errors
            .iter()
            .filter_map(|error| match error {
                ParseError::UnexpectedToken { expected, .. } => Some(expected.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Combines the failures of both alternatives of a choice that started at `position`.
    ///
    /// Neither alternative could start there, so the result is reported at `position` with the
    /// union of both expected sets, whatever depth each alternative reached on its own. Other
    /// errors are kept once each. `InfiniteRecursion` only survives when nothing else explains
    /// the failure.
    pub fn merge(self, other: Failure, position: usize, found: Found) -> Failure {
        let mut expected = BTreeSet::new();
        let mut others: Vec<ParseError> = vec![];
        for error in self.errors.iter().chain(other.errors.iter()) {
            match error {
                ParseError::UnexpectedToken { expected: labels, .. } => {
                    expected.extend(labels.iter().cloned())
                }
                error => {
                    if !others.contains(error) {
                        others.push(error.clone())
                    }
                }
            }
        }

        let mut errors = vec![];
        if !expected.is_empty() {
            errors.push(ParseError::UnexpectedToken { expected, found });
        }
        let explained = !errors.is_empty() || others.iter().any(|e| !e.is_infinite_recursion());
        errors.extend(
            others
                .into_iter()
                .filter(|error| !(explained && error.is_infinite_recursion())),
        );
        Failure::new(position, errors)
    }

    /// Replaces the expectations of a failure at `start` with `label`.
    pub(crate) fn relabel(self, start: usize, label: &Label, input: &str) -> Failure {
        let expects_something = self
            .errors
            .iter()
            .any(|error| matches!(error, ParseError::UnexpectedToken { .. }));
        if self.position != start || !expects_something {
            return self;
        }
        let mut errors = vec![ParseError::unexpected(label.clone(), Found::at(input, start))];
        errors.extend(
            self.errors
                .iter()
                .filter(|error| !matches!(error, ParseError::UnexpectedToken { .. }))
                .cloned(),
        );
        Failure::new(self.position, errors)
    }
}

impl From<Failure> for ParseFailure {
    fn from(failure: Failure) -> Self {
        ParseFailure {
            position: failure.position,
            errors: failure.errors,
        }
    }
}

impl Outcome {
    pub fn success(start: usize, length: usize, value: Value) -> Outcome {
        Outcome::Success(Success { start, length, value })
    }

    pub fn failure(position: usize, errors: Vec<ParseError>) -> Outcome {
        Outcome::Failure(Failure::new(position, errors))
    }

    pub fn unexpected(position: usize, expected: Label, input: &str) -> Outcome {
        Outcome::failure(
            position,
            vec![ParseError::unexpected(expected, Found::at(input, position))],
        )
    }

    /// The placeholder a memo slot holds while its node is first being evaluated.
    pub fn infinite_recursion(position: usize) -> Outcome {
        Outcome::failure(position, vec![ParseError::InfiniteRecursion])
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn as_success(&self) -> Option<&Success> {
        match self {
            Outcome::Success(success) => Some(success),
            Outcome::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }

    /// Where the next parser would continue; `None` for failures.
    pub fn end(&self) -> Option<usize> {
        self.as_success().map(Success::end)
    }

    pub fn value<T: Any>(&self) -> Option<&T> {
        self.as_success().and_then(Success::value)
    }

    pub fn errors(&self) -> &[ParseError] {
        match self {
            Outcome::Success(_) => &[],
            Outcome::Failure(failure) => &failure.errors,
        }
    }

    pub fn into_result(self) -> Result<Success, ParseFailure> {
        match self {
            Outcome::Success(success) => Ok(success),
            Outcome::Failure(failure) => Err(failure.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unexpected(position: usize, label: &str) -> Failure {
        Failure::new(
            position,
            vec![ParseError::unexpected(Label::from(label), Found::Char('y'))],
        )
    }

    #[test]
    fn merge_unions_labels() {
        let merged = unexpected(0, "B").merge(
            unexpected(0, "A").merge(unexpected(0, "B"), 0, Found::Char('y')),
            0,
            Found::Char('y'),
        );
        assert_eq!(merged.position, 0);
        assert_eq!(merged.errors.len(), 1);
        assert_eq!(
            merged.expected(),
            BTreeSet::from([Label::from("A"), Label::from("B")])
        );
    }

    #[test]
    fn merge_reports_where_the_choice_started() {
        let merged = unexpected(1, "A").merge(unexpected(4, "B"), 0, Found::Char('a'));
        assert_eq!(merged.position, 0);
        assert_eq!(
            merged.expected(),
            BTreeSet::from([Label::from("A"), Label::from("B")])
        );
        assert_eq!(
            &*merged.errors,
            &[ParseError::UnexpectedToken {
                expected: BTreeSet::from([Label::from("A"), Label::from("B")]),
                found: Found::Char('a'),
            }]
        );
    }

    #[test]
    fn merge_drops_recursion_when_something_else_failed() {
        let recursion = Failure::new(0, vec![ParseError::InfiniteRecursion]);
        let merged = recursion.clone().merge(unexpected(0, "digit"), 0, Found::Char('y'));
        assert!(!merged.has_infinite_recursion());

        let merged = recursion.clone().merge(recursion, 0, Found::Char('y'));
        assert_eq!(&*merged.errors, &[ParseError::InfiniteRecursion]);
    }

    #[test]
    fn merge_keeps_transformation_errors_once() {
        let boom = Failure::new(2, vec![ParseError::transformation("boom")]);
        let merged = boom.clone().merge(boom, 0, Found::EndOfInput);
        assert_eq!(merged.position, 0);
        assert_eq!(&*merged.errors, &[ParseError::transformation("boom")]);
    }

    #[test]
    fn relabel_only_applies_at_the_start() {
        let label = Label::from("number");
        let relabelled = unexpected(0, "digit").relabel(0, &label, "y");
        assert_eq!(relabelled.expected(), BTreeSet::from([label.clone()]));

        let deeper = unexpected(3, "digit").relabel(0, &label, "y");
        assert_eq!(deeper.expected(), BTreeSet::from([Label::from("digit")]));
    }

    #[test]
    fn relabel_keeps_transformation_errors() {
        let failure = Failure::new(0, vec![ParseError::transformation("boom")]);
        assert_eq!(failure.clone().relabel(0, &Label::from("x"), "a"), failure);
    }
}

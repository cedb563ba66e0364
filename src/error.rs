use std::collections::BTreeSet;
use std::fmt::Formatter;
use std::sync::Arc;

use shrinkwraprs::Shrinkwrap;
use thiserror::Error;

/// A name reported in "expected ..." messages.
///
/// Primitives get a label derived from what they match (`'a'`, `"let"`, `/[0-9]+/`), and any
/// node can be given its own with [`GrammarBuilder::named`](crate::GrammarBuilder::named).
#[derive(Shrinkwrap, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(Arc<str>);

impl Label {
    pub fn new(text: impl Into<Arc<str>>) -> Label {
        Label(text.into())
    }
}

impl From<&str> for Label {
    fn from(text: &str) -> Self {
        Label::new(text)
    }
}

impl From<String> for Label {
    fn from(text: String) -> Self {
        Label::new(text)
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the parser actually saw where it expected something else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Found {
    Char(char),
    EndOfInput,
}

impl Found {
    /// The character starting at byte offset `position`, or [`Found::EndOfInput`].
    pub fn at(input: &str, position: usize) -> Found {
        match input.get(position..).and_then(|rest| rest.chars().next()) {
            Some(c) => Found::Char(c),
            None => Found::EndOfInput,
        }
    }
}

impl std::fmt::Display for Found {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Found::Char(c) => write!(f, "{:?}", c),
            Found::EndOfInput => f.write_str("EOF"),
        }
    }
}

/// The error taxonomy carried inside failed [`Outcome`](crate::Outcome)s.
///
/// These are plain data while the engine runs; only [`Grammar::parse`](crate::Grammar::parse)
/// turns a failure into a returned error.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("expected {} but found {found}", join_labels(.expected))]
    UnexpectedToken {
        expected: BTreeSet<Label>,
        found: Found,
    },

    #[error("transformation failed: {message}")]
    Transformation {
        message: String,
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },

    #[error("infinite left recursion")]
    InfiniteRecursion,
}

impl ParseError {
    pub fn unexpected(expected: Label, found: Found) -> ParseError {
        ParseError::UnexpectedToken {
            expected: BTreeSet::from([expected]),
            found,
        }
    }

    pub fn transformation(message: impl Into<String>) -> ParseError {
        ParseError::Transformation {
            message: message.into(),
            source: None,
        }
    }

    pub fn caused_by(error: impl std::error::Error + Send + Sync + 'static) -> ParseError {
        ParseError::Transformation {
            message: error.to_string(),
            source: Some(Arc::new(error)),
        }
    }

    pub fn is_infinite_recursion(&self) -> bool {
        matches!(self, ParseError::InfiniteRecursion)
    }
}

// Transformation causes are compared by message; the boxed cause has no equality of its own.
impl PartialEq for ParseError {
    fn eq(&self, other: &ParseError) -> bool {
        use ParseError::*;

        match (self, other) {
            (
                UnexpectedToken { expected, found },
                UnexpectedToken { expected: other_expected, found: other_found },
            ) => expected == other_expected && found == other_found,
            (Transformation { message, .. }, Transformation { message: other_message, .. }) => {
                message == other_message
            }
            (InfiniteRecursion, InfiniteRecursion) => true,
            _ => false,
        }
    }
}

pub(crate) fn join_labels(labels: &BTreeSet<Label>) -> String {
    labels
        .iter()
        .map(|label| label.to_string())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Problems found while building a grammar. All of them are reported before any parse runs.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("rule `{0}` was declared but never defined")]
    Undefined(Label),

    #[error("rule `{0}` is already defined")]
    Redefined(Label),

    #[error("only parsers created with `declare` can be defined")]
    NotDeclared,

    #[error("rule `{0}` only ever refers back to itself")]
    LazyCycle(Label),

    #[error("invalid pattern `{pattern}`")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("repetition range {min}..={max} is empty")]
    InvalidRepeat { min: usize, max: usize },

    #[error("repetition range starts after usize::MAX")]
    RepeatOverflow,

    #[error("a choice needs at least one alternative")]
    EmptyChoice,

    #[error("a parser from another grammar was used while building this one")]
    ForeignParser,
}

/// The error returned by [`Grammar::parse`](crate::Grammar::parse) when the input does not match.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub position: usize,
    pub errors: Arc<[ParseError]>,
}

impl ParseFailure {
    /// The error used for the one-line message.
    pub fn primary(&self) -> Option<&ParseError> {
        self.errors.first()
    }

    /// Renders the failure under the line of `input` it happened on, with a caret at the column.
    pub fn render(&self, input: &str) -> String {
        use colored::Colorize;

        let position = clamp_to_boundary(input, self.position);
        let line_start = input[..position].rfind('\n').map_or(0, |i| i + 1);
        let line_end = input[position..]
            .find('\n')
            .map_or(input.len(), |i| position + i);
        let line_number = input[..line_start].matches('\n').count() + 1;
        let column = input[line_start..position].chars().count();

        format!(
            "{}\n{}\n{}{}",
            format!("{}:{}: {}", line_number, column + 1, self).bright_blue(),
            &input[line_start..line_end],
            " ".repeat(column),
            "^".red()
        )
    }
}

fn clamp_to_boundary(input: &str, position: usize) -> usize {
    let mut position = position.min(input.len());
    while !input.is_char_boundary(position) {
        position -= 1;
    }
    position
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.primary() {
            Some(ParseError::UnexpectedToken { expected, found }) => write!(
                f,
                "Expected {} but found {} at position {}",
                join_labels(expected),
                found,
                self.position
            ),
            Some(ParseError::Transformation { message, .. }) => write!(
                f,
                "Transformation failed at position {}: {}",
                self.position, message
            ),
            Some(ParseError::InfiniteRecursion) => {
                write!(f, "Infinite left recursion at position {}", self.position)
            }
            None => write!(f, "Parse failed at position {}", self.position),
        }
    }
}

impl std::error::Error for ParseFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.primary().map(|error| error as &(dyn std::error::Error + 'static))
    }
}

/// Errors from driving a [`Stepper`](crate::Stepper) by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StepperError {
    #[error("parse was cancelled after {steps} steps")]
    Cancelled { steps: usize },

    #[error("parse has not finished")]
    Unfinished,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(errors: Vec<ParseError>, position: usize) -> ParseFailure {
        ParseFailure {
            position,
            errors: errors.into(),
        }
    }

    #[test]
    fn message_lists_every_label() {
        let error = ParseError::UnexpectedToken {
            expected: BTreeSet::from([Label::from("B"), Label::from("A")]),
            found: Found::Char('y'),
        };
        assert_eq!(
            failure(vec![error], 0).to_string(),
            "Expected A or B but found 'y' at position 0"
        );
    }

    #[test]
    fn end_of_input_is_reported_as_eof() {
        let error = ParseError::unexpected(Label::from("'x'"), Found::at("ab", 2));
        assert_eq!(
            failure(vec![error], 2).to_string(),
            "Expected 'x' but found EOF at position 2"
        );
    }

    #[test]
    fn transformation_keeps_its_cause() {
        let cause = "12x".parse::<u32>().unwrap_err();
        let error = ParseError::caused_by(cause);
        let failure = failure(vec![error], 3);

        assert!(failure.to_string().starts_with("Transformation failed at position 3"));
        let primary = std::error::Error::source(&failure).unwrap();
        assert!(primary.source().is_some());
    }

    #[test]
    fn render_points_at_the_column() {
        colored::control::set_override(false);
        let input = "first line\nsecond lyne\n";
        let error = ParseError::unexpected(Label::from("'i'"), Found::at(input, 19));
        let rendered = failure(vec![error], 19).render(input);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "2:9: Expected 'i' but found 'y' at position 19");
        assert_eq!(lines[1], "second lyne");
        assert_eq!(lines[2], "        ^");
    }
}

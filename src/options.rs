/// Which evaluator runs a parse.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Iterative for recursive or deep grammars, recursive otherwise.
    #[default]
    Auto,
    Recursive,
    Iterative,
}

/// Per-parse configuration.
///
/// ```
/// use parce_packrat::{ExecutionMode, ParseOptions};
///
/// let options = ParseOptions::default()
///     .with_execution_mode(ExecutionMode::Iterative)
///     .with_automatic_memoization(false);
/// assert!(options.enable_automatic_growing_recursion);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseOptions {
    pub execution_mode: ExecutionMode,

    /// Grow seeds for every node the analysis finds on a cycle.
    pub enable_automatic_growing_recursion: bool,

    /// Memoize every composite node reachable along more than one edge.
    pub enable_automatic_memoization: bool,

    /// `Auto` switches to the iterative evaluator once grammar depth times input length exceeds
    /// this.
    pub deep_threshold: usize,
}

pub const DEFAULT_DEEP_THRESHOLD: usize = 4096;

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            execution_mode: ExecutionMode::Auto,
            enable_automatic_growing_recursion: true,
            enable_automatic_memoization: true,
            deep_threshold: DEFAULT_DEEP_THRESHOLD,
        }
    }
}

impl ParseOptions {
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn with_automatic_growing_recursion(mut self, enabled: bool) -> Self {
        self.enable_automatic_growing_recursion = enabled;
        self
    }

    pub fn with_automatic_memoization(mut self, enabled: bool) -> Self {
        self.enable_automatic_memoization = enabled;
        self
    }

    pub fn with_deep_threshold(mut self, threshold: usize) -> Self {
        self.deep_threshold = threshold;
        self
    }

    /// Every combination of mode and flags, for exercising a grammar under all of them.
    pub fn all() -> impl Iterator<Item = ParseOptions> {
        [ExecutionMode::Auto, ExecutionMode::Recursive, ExecutionMode::Iterative]
            .into_iter()
            .flat_map(|mode| {
                [(true, true), (true, false), (false, true), (false, false)]
                    .into_iter()
                    .map(move |(growing, memo)| {
                        ParseOptions::default()
                            .with_execution_mode(mode)
                            .with_automatic_growing_recursion(growing)
                            .with_automatic_memoization(memo)
                    })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ParseOptions::default();
        assert_eq!(options.execution_mode, ExecutionMode::Auto);
        assert!(options.enable_automatic_growing_recursion);
        assert!(options.enable_automatic_memoization);
    }

    #[test]
    fn all_combinations_are_distinct() {
        let all: Vec<_> = ParseOptions::all().collect();
        assert_eq!(all.len(), 12);
        let unique: std::collections::HashSet<_> = all.iter().cloned().collect();
        assert_eq!(unique.len(), 12);
    }
}

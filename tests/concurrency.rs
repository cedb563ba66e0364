mod common;

use std::sync::Arc;
use std::thread;

use lazy_static::lazy_static;
use parce_packrat::prelude::*;

use common::Arithmetic;

lazy_static! {
    static ref ARITHMETIC: Arithmetic = common::arithmetic();
}

#[test]
fn one_grammar_many_threads() {
    let handles: Vec<_> = (0..8)
        .map(|n: i64| {
            thread::spawn(move || {
                let input = format!("{}+{}*({}-1)", n, n, n);
                let mode = if n % 2 == 0 {
                    ExecutionMode::Recursive
                } else {
                    ExecutionMode::Iterative
                };
                let options = ParseOptions::default().with_execution_mode(mode);
                let value = ARITHMETIC.grammar.parse(ARITHMETIC.expr, &input, &options);
                (n, value)
            })
        })
        .collect();

    for handle in handles {
        let (n, value) = handle.join().unwrap();
        assert_eq!(value.unwrap(), n + n * (n - 1));
    }
}

#[test]
fn grammars_can_be_shared_by_arc() {
    let grammar = Arc::new(common::words());
    let handles: Vec<_> = ["ab,cd", "ef", "ab,xy"]
        .into_iter()
        .map(|input| {
            let grammar = grammar.clone();
            thread::spawn(move || {
                grammar
                    .grammar
                    .try_parse(grammar.words, input, &ParseOptions::default())
                    .is_success()
            })
        })
        .collect();

    let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, [true, true, false]);
}

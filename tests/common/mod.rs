#![allow(dead_code)]

use parce_packrat::prelude::*;

/// `+`, `-` and `*` over single digits and parentheses, all left recursive.
pub struct Arithmetic {
    pub grammar: Grammar,
    pub expr: Parser<i64>,
}

pub fn arithmetic() -> Arithmetic {
    let mut g = GrammarBuilder::new();
    let expr = g.declare::<i64>("expr");
    let term = g.declare::<i64>("term");

    let digit = g.pattern("[0-9]").unwrap();
    let number = g.map(digit, |d: String| d.parse::<i64>().unwrap_or_default());
    let open = g.char('(');
    let close = g.char(')');
    let inner = g.right(open, expr);
    let group = g.left(inner, close);
    let atom = g.choice(number, group);
    let atom = g.named(atom, "atom");

    let times = g.char('*');
    let times_atom = g.right(times, atom);
    let mul = g.sequence_with(term, times_atom, |l: i64, r: i64| l.wrapping_mul(r));
    let term_body = g.choice(mul, atom);

    let plus = g.char('+');
    let plus_term = g.right(plus, term);
    let add = g.sequence_with(expr, plus_term, |l: i64, r: i64| l.wrapping_add(r));
    let minus = g.char('-');
    let minus_term = g.right(minus, term);
    let sub = g.sequence_with(expr, minus_term, |l: i64, r: i64| l.wrapping_sub(r));
    let expr_body = g.choice_all([add, sub, term]).unwrap();

    g.define(expr, expr_body).unwrap();
    g.define(term, term_body).unwrap();
    Arithmetic {
        grammar: g.build().unwrap(),
        expr,
    }
}

/// `a := b 'x' | 'x'` and `b := a 'y' | 'y'`: left recursion through two rules.
pub struct Mutual {
    pub grammar: Grammar,
    pub a: Parser<String>,
}

pub fn mutual() -> Mutual {
    let mut g = GrammarBuilder::new();
    let a = g.declare::<String>("a");
    let b = g.declare::<String>("b");
    let x = g.string("x");
    let y = g.string("y");

    let bx = g.sequence_with(b, x, |b: String, x: String| b + &x);
    let a_body = g.choice(bx, x);
    let ay = g.sequence_with(a, y, |a: String, y: String| a + &y);
    let b_body = g.choice(ay, y);

    g.define(a, a_body).unwrap();
    g.define(b, b_body).unwrap();
    Mutual {
        grammar: g.build().unwrap(),
        a,
    }
}

/// A comma separated list of words that may not start with `x`, then the end of input.
pub struct Words {
    pub grammar: Grammar,
    pub words: Parser<Vec<String>>,
}

pub fn words() -> Words {
    let mut g = GrammarBuilder::new();
    let x = g.char('x');
    let not_x = g.not(x);
    let word = g.pattern("[a-z]+").unwrap();
    let word = g.right(not_x, word);
    let word = g.named(word, "word");
    let comma = g.char(',');
    let list = g.separated(word, comma, 1..=4).unwrap();
    let end = g.end_of_input();
    let words = g.left(list, end);
    Words {
        grammar: g.build().unwrap(),
        words,
    }
}

/// A printable summary of an outcome that two evaluators must agree on exactly.
pub fn fingerprint<T: std::fmt::Debug + 'static>(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Success(success) => format!(
            "ok {}+{} {:?}",
            success.start,
            success.length,
            success.value::<T>()
        ),
        Outcome::Failure(failure) => format!("err {:?}", failure),
    }
}

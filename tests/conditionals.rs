#[macro_use]
mod common;

const ASUB: &str = "(def asub (a b) (if (> a b) ((- a b)) ((- b a))))";

#[test]
fn conditional() {
    let result = run_program!(concat!(
        "(def fun (a b)",
        "  (if ",
        "     (> a 0)",
        "     ((fun (- a 1) (+ b 1)))",
        "     ((+ b 1))))",
        "(fun 20 2)"
    ));
    assert_eq!(result, 23);
}

#[test]
fn conditional_small_const() {
    assert_eq!(run_program!(&format!("{} (asub 100 200)", ASUB)), 100);
}

#[test]
fn conditional_big_const() {
    assert_eq!(run_program!(&format!("{} (asub 200 100)", ASUB)), 100);
}

#[test]
fn conditional_at_top_level() {
    assert_eq!(run_program!("(if (> 3 2) 10 20)"), 10);
    assert_eq!(run_program!("(if (- 2 2) 10 20)"), 20);
}

#[test]
fn nested_conditionals() {
    let result = run_program!(concat!(
        "(def sign (x) (if (> x 0) 1 ((if (> 0 x) -1 0))))",
        "(+ (* 100 (sign 7)) (+ (* 10 (sign -3)) (sign 0)))"
    ));
    assert_eq!(result, 90);
}

#[test]
fn conditional_value_feeds_arithmetic() {
    assert_eq!(run_program!("(+ 1 (if (> 1 0) 41 0))"), 42);
}

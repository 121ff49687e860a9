#[macro_use]
mod common;

#[test]
fn calls_noargs() {
    let result = run_program!(concat!(
        "(def div () (/ 100 4))",
        "(def mul () (* 2 3))",
        "(def add () (+ 4 5))",
        "(def sub () (- 1000001 1000000))",
        "(+ (div) (+ (mul) (+ (add) (sub))))"
    ));
    assert_eq!(result, 41);
}

#[test]
fn calls_args() {
    let result = run_program!(concat!(
        "(def div (a b) (/ a b))",
        "(def mul (a b) (* a b))",
        "(def add (a b c) (+ a (+ b c)))",
        "(def neg (a) (- 0 a))",
        "(neg (add 10 20 (div 16 (mul 2 2))))"
    ));
    assert_eq!(result, -34);
}

#[test]
fn calls_before_definition() {
    let result = run_program!(concat!(
        "(def quad (a) (double (double a)))",
        "(def double (a) (+ a a))",
        "(quad 5)"
    ));
    assert_eq!(result, 20);
}

#[test]
fn arguments_survive_nested_calls() {
    // Each argument is evaluated into its own slot before the window is filled
    let result = run_program!(concat!(
        "(def sub (a b) (- a b))",
        "(def id (a) a)",
        "(sub (id 50) (sub (id 20) (id 8)))"
    ));
    assert_eq!(result, 38);
}

#[test]
fn mutual_recursion() {
    let result = run_program!(concat!(
        "(def even (n) (if (> n 0) ((odd (- n 1))) 1))",
        "(def odd (n) (if (> n 0) ((even (- n 1))) 0))",
        "(+ (even 10) (* 10 (odd 7)))"
    ));
    assert_eq!(result, 11);
}

mod common;
use common::run;

#[test]
fn fib() {
    let (code, output) = run(include_str!("../demos/fib.ql"));
    assert_eq!(code, 0);
    assert_eq!(output, "0\n1\n1\n2\n3\n5\n8\n13\n21\n");
}

#[test]
fn gcd() {
    assert_eq!(run(include_str!("../demos/gcd.ql")).0, 6);
}

#[test]
fn shapes() {
    assert_eq!(run(include_str!("../demos/shapes.ql")).0, 13);
}

#[test]
fn vectors() {
    assert_eq!(run(include_str!("../demos/vectors.ql")).0, 46);
}

#[test]
fn output() {
    let (code, output) = run(include_str!("../demos/output.ql"));
    assert_eq!(code, 0);
    assert_eq!(output, "42\ntrue\n1.5\n200\nhi\n!\n");
}

#[test]
fn pointers() {
    assert_eq!(run(include_str!("../demos/pointers.ql")).0, 24);
}

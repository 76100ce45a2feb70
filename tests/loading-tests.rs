use std::fs;

use quill::{compile_files, parse_files, CompileOptions, EvaluatorOptions, Evaluator};

#[test]
fn compiles_files_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let util = dir.path().join("util.ql");
    let main = dir.path().join("main.ql");
    fs::write(&util, "namespace util\nfn square(x: i32): i32 { x * x }\n").unwrap();
    fs::write(&main, "use util\nentry fn main(): i32 { square(7) }\n").unwrap();

    let compilation = compile_files(&[&util, &main], &CompileOptions::default()).unwrap();
    let program = compilation.program.expect("no errors");

    let mut output = Vec::new();
    let code = Evaluator::new(&program, EvaluatorOptions::default(), &mut output)
        .run()
        .unwrap();
    assert_eq!(code, 49);
}

#[test]
fn diagnostics_name_their_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ql");
    fs::write(&path, "entry fn main(): i32 { missing }\n").unwrap();

    let compilation = compile_files(&[&path], &CompileOptions::default()).unwrap();
    let error = compilation.errors().next().expect("an error");
    let location = error.location.as_ref().expect("a location");
    assert!(location.source.name.ends_with("broken.ql"));
}

#[test]
fn missing_files_are_load_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nowhere.ql");

    let error = compile_files(&[&path], &CompileOptions::default()).unwrap_err();
    assert_eq!(error.path, path);
    assert!(parse_files(&[&path]).is_err());
}

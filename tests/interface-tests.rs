mod common;
use common::compile_ok;

const GEOMETRY: &str = "
namespace app.geometry

struct Shape { val id: i32 = 1 }
struct Square: Shape { side: i32 }

inline fn double(x: i32): i32 { x * 2 }
ext fn perimeter(self: Square): i32 { self.side * 4 }
fn area(square: Square): i32 { square.side * square.side }
internal fn helper(): i32 { 1 }
private fn hidden(): i32 { 2 }
";

#[test]
fn public_functions_are_listed() {
    let interface = compile_ok(GEOMETRY).interface();
    let names: Vec<_> = interface.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        ["app.geometry.double", "app.geometry.perimeter", "app.geometry.area"]
    );

    let double = &interface.functions[0];
    assert_eq!(double.params, [(String::from("x"), String::from("i32"))]);
    assert_eq!(double.return_type, "i32");
    assert!(double.inline_body.as_ref().is_some_and(|body| !body.is_empty()));

    let perimeter = &interface.functions[1];
    assert!(perimeter.is_extension);
    assert!(perimeter.inline_body.is_none());
}

#[test]
fn structs_list_their_own_fields() {
    let interface = compile_ok(GEOMETRY).interface();
    assert_eq!(interface.structs.len(), 2);

    let shape = &interface.structs[0];
    assert_eq!(shape.parent, None);
    assert!(shape.fields[0].is_read_only);

    let square = &interface.structs[1];
    assert!(square.parent.as_deref().is_some_and(|parent| parent.ends_with("Shape")));
    let fields: Vec<_> = square.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, ["side"]);
}

#[test]
fn listing() {
    let listing = compile_ok(GEOMETRY).interface().to_string();
    assert!(listing.contains("inline fn app.geometry.double(x: i32): i32"));
    assert!(listing.contains("ext fn app.geometry.perimeter(self: "));
    assert!(!listing.contains("helper"));
    assert!(!listing.contains("hidden"));
}

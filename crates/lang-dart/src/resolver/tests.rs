use super::DartResolver;
use crate::parser::DartParser;
use refscope_api::models::{
    ElementKey, ElementKind, LibraryElements, Occurrence, OccurrenceContext, Snapshot, SourcePath,
    Stamp, SupertypeClause,
};
use refscope_plugin::{ResolutionScope, ResolvedDirective, ResolvedLibrary};
use std::collections::HashMap;
use std::sync::Arc;

const MAIN: &str = "/p/lib/main.dart";

type Libraries = HashMap<SourcePath, Arc<LibraryElements>>;

/// Resolve `source` at `path`; directive URIs bind to the library in
/// `libraries` with the same file name.
fn resolve_at(path: &str, source: &str, libraries: &Libraries) -> ResolvedLibrary {
    let snapshot = Snapshot::new(SourcePath::new(path), source.into(), Stamp(1), 0);
    let unit = DartParser::new().parse(&snapshot).unwrap();
    let directives: Vec<ResolvedDirective> = unit
        .directives
        .iter()
        .map(|d| ResolvedDirective {
            directive: d.clone(),
            target: libraries
                .keys()
                .find(|p| p.file_name() == d.uri.as_str())
                .cloned(),
        })
        .collect();
    let scope = ResolutionScope {
        path: &snapshot.path,
        library_uri: "package:p/main.dart",
        directives: &directives,
        libraries,
    };
    DartResolver::new().resolve(&unit, &scope).unwrap()
}

fn resolve(source: &str) -> ResolvedLibrary {
    resolve_at(MAIN, source, &HashMap::new())
}

fn dependency(path: &str, source: &str) -> Libraries {
    let resolved = resolve_at(path, source, &HashMap::new());
    let path = SourcePath::new(path);
    let library = LibraryElements::new(
        path.clone(),
        "package:p/dep.dart".into(),
        resolved.elements,
        Vec::new(),
        Vec::new(),
    );
    HashMap::from([(path, Arc::new(library))])
}

fn key(name: &str) -> ElementKey {
    ElementKey::new(SourcePath::new(MAIN), name)
}

/// Offset of `needle` inside `source`, searching from the first `anchor`.
fn offset(source: &str, anchor: &str, needle: &str) -> usize {
    let from = source.find(anchor).unwrap();
    from + source[from..].find(needle).unwrap()
}

fn occurrence_at(resolved: &ResolvedLibrary, offset: usize, length: usize) -> &Occurrence {
    resolved
        .occurrences
        .iter()
        .find(|o| o.offset == offset && o.length == length)
        .unwrap_or_else(|| {
            panic!("no occurrence at {offset}+{length}: {:#?}", resolved.occurrences)
        })
}

#[test]
fn test_declarations_in_source_order() {
    let source = "class A<T> extends B with M implements I {
  int x = 0;
  A(this.x);
  A.named();
  void foo(int a, {String? b}) {}
  set y(int v) {}
}
class B {}
mixin M {}
class I {}
";
    let resolved = resolve(source);
    let names: Vec<&str> = resolved.elements.iter().map(|e| e.key.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "", "A", "A.<T>", "A.x", "A.", "A..x", "A.named", "A.foo", "A.foo.a", "A.foo.b",
            "A.y=", "A.y=.v", "B", "M", "I"
        ]
    );

    let library = &resolved.elements[0];
    assert_eq!(
        library.kind,
        ElementKind::Library {
            uri: "package:p/main.dart".into()
        }
    );

    let class = &resolved.elements[1];
    let shape = class.kind.type_shape().unwrap();
    assert_eq!(shape.supertype, Some(key("B")));
    assert_eq!(shape.mixins, vec![key("M")]);
    assert_eq!(shape.interfaces, vec![key("I")]);
    assert_eq!(
        shape.members,
        vec![key("A.x"), key("A."), key("A.named"), key("A.foo"), key("A.y=")]
    );
    let location = class.location.as_ref().unwrap();
    assert_eq!(location.offset, 6);
    assert_eq!(location.length, 1);
    assert_eq!(location.code_offset, 0);

    let foo = resolved.elements.iter().find(|e| e.key.name == "A.foo").unwrap();
    assert_eq!(foo.signature.as_deref(), Some("(int a, {String? b})"));
    assert_eq!(foo.kind.parameters(), &[key("A.foo.a"), key("A.foo.b")]);
    let unnamed = resolved.elements.iter().find(|e| e.key.name == "A.").unwrap();
    assert_eq!(unnamed.name, None);
}

#[test]
fn test_supertype_clauses_are_marked() {
    let source =
        "class A {}\nclass B {}\nmixin M on A, B {}\nclass C extends A with M implements B {}\n";
    let resolved = resolve(source);
    let mixin = resolved.elements.iter().find(|e| e.key.name == "M").unwrap();
    assert_eq!(
        mixin.kind.type_shape().unwrap().superclass_constraints,
        vec![key("A"), key("B")]
    );

    let clause_at = |anchor: &str, needle: &str| {
        occurrence_at(&resolved, offset(source, anchor, needle), 1).clause
    };
    assert_eq!(clause_at("mixin M on", "A"), Some(SupertypeClause::On));
    assert_eq!(clause_at("mixin M on A,", "B"), Some(SupertypeClause::On));
    assert_eq!(clause_at("class C extends", "A"), Some(SupertypeClause::Extends));
    assert_eq!(clause_at("with M", "M"), Some(SupertypeClause::With));
    assert_eq!(clause_at("implements B", "B"), Some(SupertypeClause::Implements));
}

#[test]
fn test_constructor_invocations_and_tear_offs() {
    let source = "class A {
  A();
  A.named();
}
void f() {
  A();
  A.named();
  new A();
  A.new;
}
";
    let resolved = resolve(source);

    let call = offset(source, "void f", "A();");
    let type_usage = occurrence_at(&resolved, call, 1);
    assert_eq!(type_usage.context, OccurrenceContext::TypeUsage);
    assert_eq!(type_usage.target, Some(key("A")));
    assert_eq!(type_usage.enclosing, Some(key("f")));
    let unnamed = occurrence_at(&resolved, call + 1, 0);
    assert_eq!(unnamed.context, OccurrenceContext::Call);
    assert_eq!(unnamed.target, Some(key("A.")));

    let named = offset(source, "void f", "A.named();");
    assert_eq!(occurrence_at(&resolved, named, 1).target, Some(key("A")));
    let selector = occurrence_at(&resolved, named + 2, 5);
    assert_eq!(selector.context, OccurrenceContext::Call);
    assert_eq!(selector.target, Some(key("A.named")));
    assert!(selector.is_qualified);

    let created = offset(source, "void f", "new A();") + "new ".len();
    assert_eq!(
        occurrence_at(&resolved, created, 1).context,
        OccurrenceContext::TypeUsage
    );
    assert_eq!(
        occurrence_at(&resolved, created + 1, 0).target,
        Some(key("A."))
    );

    let tear_off = offset(source, "void f", "A.new;") + 2;
    let occurrence = occurrence_at(&resolved, tear_off, 3);
    assert_eq!(occurrence.context, OccurrenceContext::ConstructorTearOff);
    assert_eq!(occurrence.target, Some(key("A.")));
}

#[test]
fn test_implicit_constructor_is_not_synthesized() {
    let source = "class A {}\nvoid f() { A(); }\n";
    let resolved = resolve(source);
    let call = offset(source, "void f", "A()");
    assert_eq!(
        occurrence_at(&resolved, call, 1).context,
        OccurrenceContext::TypeUsage
    );
    assert!(resolved.occurrences.iter().all(|o| o.length > 0));
    assert!(resolved.elements.iter().all(|e| e.key.name != "A."));
}

#[test]
fn test_enum_constants_bind_to_the_constructor() {
    let source = "enum E {
  a,
  b(),
  c.named();
  const E();
  const E.named();
}
";
    let resolved = resolve(source);
    let constant = resolved.elements.iter().find(|e| e.key.name == "E.a").unwrap();
    assert!(constant.is_static);
    assert_eq!(constant.declared_type, Some(key("E")));

    let a = offset(source, "a,", "a") + 1;
    let without_args = occurrence_at(&resolved, a, 0);
    assert_eq!(
        without_args.context,
        OccurrenceContext::EnumConstantWithoutArguments
    );
    assert_eq!(without_args.target, Some(key("E.")));
    assert_eq!(without_args.enclosing, Some(key("E.a")));

    let b = offset(source, "b()", "b") + 1;
    assert_eq!(occurrence_at(&resolved, b, 0).context, OccurrenceContext::Call);

    let named = offset(source, "c.named", "named");
    let occurrence = occurrence_at(&resolved, named, 5);
    assert_eq!(occurrence.context, OccurrenceContext::Call);
    assert_eq!(occurrence.target, Some(key("E.named")));
}

#[test]
fn test_untyped_receiver_is_unresolved_selector() {
    let source = "void f(p) {\n  p.test();\n}\n";
    let resolved = resolve(source);
    let test = offset(source, "p.test", "test");
    let occurrence = occurrence_at(&resolved, test, 4);
    assert_eq!(occurrence.target, None);
    assert_eq!(occurrence.context, OccurrenceContext::Call);
    assert!(occurrence.is_qualified);
    assert!(occurrence.is_member_selector);

    let receiver = occurrence_at(&resolved, test - 2, 1);
    assert_eq!(receiver.target, Some(key("f.p")));
    assert!(!receiver.is_qualified);
}

#[test]
fn test_typed_locals_resolve_members() {
    let source = "class A {
  int count = 0;
  void foo() {}
}
A make() => A();
void f() {
  var a = A();
  a.foo();
  final b = make();
  b.count += 1;
  A c = b;
  c.count = 2;
}
";
    let resolved = resolve(source);
    let foo = occurrence_at(&resolved, offset(source, "a.foo", "foo"), 3);
    assert_eq!(foo.target, Some(key("A.foo")));
    assert_eq!(foo.context, OccurrenceContext::Call);

    let compound = occurrence_at(&resolved, offset(source, "b.count", "count"), 5);
    assert_eq!(compound.target, Some(key("A.count")));
    assert_eq!(compound.context, OccurrenceContext::CompoundAssignment);

    let write = occurrence_at(&resolved, offset(source, "c.count", "count"), 5);
    assert_eq!(write.target, Some(key("A.count")));
    assert_eq!(write.context, OccurrenceContext::Assignment);

    let local = resolved
        .elements
        .iter()
        .find(|e| e.key.name.starts_with("f.a@"))
        .unwrap();
    assert_eq!(local.declared_type, Some(key("A")));
    assert_eq!(local.enclosing, Some(key("f")));
}

#[test]
fn test_locals_shadow_members() {
    let source = "class A {
  int x = 0;
  void f() {
    x = 1;
    var x = 2;
    x;
    this.x;
  }
}
";
    let resolved = resolve(source);
    let member = occurrence_at(&resolved, offset(source, "x = 1", "x"), 1);
    assert_eq!(member.target, Some(key("A.x")));
    assert_eq!(member.context, OccurrenceContext::Assignment);
    assert!(member.is_member_selector);
    assert!(!member.is_qualified);

    let local = occurrence_at(&resolved, offset(source, "x;", "x"), 1);
    let target = local.target.as_ref().unwrap();
    assert!(target.name.starts_with("A.f.x@"));
    assert!(!local.is_member_selector);

    let qualified = occurrence_at(&resolved, offset(source, "this.x", "x"), 1);
    assert_eq!(qualified.target, Some(key("A.x")));
    assert!(qualified.is_qualified);
}

#[test]
fn test_field_formals_and_initializers() {
    let source = "class B {
  B(int v);
}
class A extends B {
  int x;
  int y;
  A(this.x) : y = 0, super(1);
}
";
    let resolved = resolve(source);
    let field_formal = occurrence_at(&resolved, offset(source, "this.x", "x"), 1);
    assert_eq!(field_formal.target, Some(key("A.x")));
    assert_eq!(field_formal.context, OccurrenceContext::Assignment);
    assert!(field_formal.is_qualified);

    let initializer = occurrence_at(&resolved, offset(source, "y = 0", "y"), 1);
    assert_eq!(initializer.target, Some(key("A.y")));
    assert_eq!(initializer.context, OccurrenceContext::Assignment);
    assert!(!initializer.is_qualified);
    assert!(!initializer.is_member_selector);

    let super_call = offset(source, "super(1)", "super") + "super".len();
    let occurrence = occurrence_at(&resolved, super_call, 0);
    assert_eq!(occurrence.target, Some(key("B.")));
    assert_eq!(occurrence.context, OccurrenceContext::Call);
}

#[test]
fn test_named_arguments_bind_parameters() {
    let source = "void g({int? count}) {}\nvoid f() { g(count: 1); }\n";
    let resolved = resolve(source);
    let label = occurrence_at(&resolved, offset(source, "g(count", "count"), 5);
    assert_eq!(label.target, Some(key("g.count")));
    assert_eq!(label.context, OccurrenceContext::Read);
}

#[test]
fn test_inherited_and_extension_members() {
    let source = "class A {
  void foo() {}
}
class B extends A {
  void bar() { foo(); }
}
extension X on A {
  void ext() {}
}
void f(B b) {
  b.foo();
  b.ext();
}
";
    let resolved = resolve(source);
    let implicit = occurrence_at(&resolved, offset(source, "foo();", "foo"), 3);
    assert_eq!(implicit.target, Some(key("A.foo")));
    assert!(implicit.is_member_selector);
    assert!(!implicit.is_qualified);

    let inherited = occurrence_at(&resolved, offset(source, "b.foo", "foo"), 3);
    assert_eq!(inherited.target, Some(key("A.foo")));
    let extension = occurrence_at(&resolved, offset(source, "b.ext", "ext"), 3);
    assert_eq!(extension.target, Some(key("X.ext")));
}

#[test]
fn test_prefixed_import() {
    let libraries = dependency("/p/lib/dep.dart", "class A {\n  static int count = 0;\n}\n");
    let source = "import 'dep.dart' as p;\np.A a = p.A();\nvoid f() { p.A.count; }\n";
    let resolved = resolve_at(MAIN, source, &libraries);
    let dep_a = ElementKey::new(SourcePath::new("/p/lib/dep.dart"), "A");

    let prefix = occurrence_at(&resolved, offset(source, "p.A a", "p"), 1);
    assert_eq!(prefix.target, Some(key("p")));
    assert_eq!(prefix.context, OccurrenceContext::Read);

    let ty = occurrence_at(&resolved, offset(source, "p.A a", "A"), 1);
    assert_eq!(ty.target, Some(dep_a.clone()));
    assert_eq!(ty.context, OccurrenceContext::TypeUsage);
    assert!(ty.is_qualified);
    assert!(!ty.is_member_selector);

    let static_field = occurrence_at(&resolved, offset(source, "A.count", "count"), 5);
    assert_eq!(
        static_field.target,
        Some(ElementKey::new(SourcePath::new("/p/lib/dep.dart"), "A.count"))
    );

    let variable = resolved.elements.iter().find(|e| e.key.name == "a").unwrap();
    assert_eq!(variable.declared_type, Some(dep_a));
    let prefix_element = resolved.elements.iter().find(|e| e.key.name == "p").unwrap();
    assert_eq!(prefix_element.location.as_ref().unwrap().offset, source.find("p;").unwrap());
}

#[test]
fn test_unresolved_import_is_a_diagnostic() {
    let resolved = resolve("import 'missing.dart';\nvoid f() {}\n");
    assert_eq!(resolved.diagnostics.len(), 1);
    assert!(resolved.diagnostics[0].contains("missing.dart"));
    assert!(
        resolved
            .elements
            .iter()
            .any(|e| matches!(e.kind, ElementKind::Import { .. }))
    );
}

#[test]
fn test_labels_and_closures() {
    let source = "void f(List<int> items) {
  outer:
  for (var i in items) {
    items.forEach((x) { if (x == i) break outer; });
  }
}
";
    let resolved = resolve(source);
    let label = occurrence_at(&resolved, offset(source, "break outer", "outer"), 5);
    let target = label.target.as_ref().unwrap();
    assert!(target.name.starts_with("f.outer:@"));

    let closure_param = occurrence_at(&resolved, offset(source, "x == i", "x"), 1);
    assert!(closure_param.target.is_some());
    let loop_var = occurrence_at(&resolved, offset(source, "x == i", "i"), 1);
    assert!(loop_var.target.as_ref().unwrap().name.starts_with("f.i@"));
}

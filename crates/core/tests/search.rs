use refscope_api::models::{
    DeclarationKind, ElementKey, SearchResultKind, SearchedFiles, Snapshot, SourcePath,
};
use refscope_core::project::StaticPackageConfig;
use refscope_core::resource::MemoryResourceProvider;
use refscope_core::{AnalysisDriver, CancelToken, SubtypeQuery};
use refscope_dart::dart_caps;
use refscope_plugin::{LanguageCaps, ParseCap, ParsedUnit, SyntaxError};
use regex::Regex;
use std::sync::Arc;

const AAA: &str = "/ws/aaa/lib/a.dart";
const BBB: &str = "/ws/bbb/lib/b.dart";
const CCC: &str = "/ws/ccc/lib/c.dart";

const A_SOURCE: &str = "class A {
  int x = 0;
  void foo() {}
}
";

const B_SOURCE: &str = "import 'package:aaa/a.dart';

class B extends A {
  void bar() {
    foo();
    x = 1;
    x += 2;
    var y = x;
  }
}

void untyped(p) {
  p.test();
}
";

const C_SOURCE: &str = "class A {}
class C extends A {
  void foo() {}
}
";

/// `bbb` depends on `aaa`; `ccc` is unrelated and declares its own `A`.
fn workspace() -> AnalysisDriver {
    workspace_with(dart_caps())
}

fn workspace_with(caps: LanguageCaps) -> AnalysisDriver {
    let provider = MemoryResourceProvider::new()
        .with_file(AAA, A_SOURCE)
        .with_file(BBB, B_SOURCE)
        .with_file(CCC, C_SOURCE);
    let packages = StaticPackageConfig::new()
        .package("aaa", "/ws/aaa", &[])
        .package("bbb", "/ws/bbb", &["aaa"])
        .package("ccc", "/ws/ccc", &[]);
    AnalysisDriver::builder(Arc::new(provider))
        .with_language(caps)
        .with_package_config(Arc::new(packages))
        .with_root("/ws/bbb")
        .with_root("/ws/ccc")
        .build()
        .unwrap()
}

/// A single package `app` holding `files`.
fn app(files: &[(&str, &str)]) -> AnalysisDriver {
    let mut provider = MemoryResourceProvider::new();
    for (path, content) in files {
        provider = provider.with_file(*path, *content);
    }
    AnalysisDriver::builder(Arc::new(provider))
        .with_language(dart_caps())
        .with_package_config(Arc::new(
            StaticPackageConfig::new().package("app", "/ws/app", &[]),
        ))
        .with_root("/ws/app")
        .build()
        .unwrap()
}

/// `app` depends on `bbb` and `aaa`. `ccc` imports `aaa` without
/// declaring the dependency.
fn closure_workspace() -> AnalysisDriver {
    let import = "import 'package:aaa/a.dart';\n";
    let provider = MemoryResourceProvider::new()
        .with_file(AAA, "class A {}\n")
        .with_file(BBB, format!("{import}class B implements A {{}}\n"))
        .with_file(CCC, format!("{import}class C extends A {{}}\n"))
        .with_file("/ws/app/lib/p.dart", format!("{import}class P extends A {{}}\n"));
    let packages = StaticPackageConfig::new()
        .package("aaa", "/ws/aaa", &[])
        .package("bbb", "/ws/bbb", &["aaa"])
        .package("ccc", "/ws/ccc", &[])
        .package("app", "/ws/app", &["bbb", "aaa"]);
    AnalysisDriver::builder(Arc::new(provider))
        .with_language(dart_caps())
        .with_package_config(Arc::new(packages))
        .with_root("/ws/app")
        .with_root("/ws/ccc")
        .build()
        .unwrap()
}

fn key(path: &str, name: &str) -> ElementKey {
    ElementKey::new(SourcePath::new(path), name)
}

/// Cancels `token` when asked to parse `trigger`.
struct CancelOnParse {
    inner: Arc<dyn ParseCap>,
    trigger: SourcePath,
    token: CancelToken,
}

impl ParseCap for CancelOnParse {
    fn parse(&self, snapshot: &Snapshot) -> Result<ParsedUnit, SyntaxError> {
        if snapshot.path == self.trigger {
            self.token.cancel();
        }
        self.inner.parse(snapshot)
    }
}

#[tokio::test]
async fn test_member_references_are_classified() {
    let driver = workspace();
    let token = CancelToken::new();
    let x = driver.element(&key(AAA, "A.x"), &token).await.unwrap().unwrap();

    let mut searched = SearchedFiles::new();
    let results = driver.references(&x, &mut searched, &token).await.unwrap();
    let kinds: Vec<_> = results.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SearchResultKind::Write,
            SearchResultKind::ReadWrite,
            SearchResultKind::Read
        ]
    );
    for result in &results {
        assert_eq!(result.path, SourcePath::new(BBB));
        assert_eq!(&B_SOURCE[result.offset..result.offset + result.length], "x");
        assert!(result.is_resolved);
        assert!(!result.is_qualified);
        assert_eq!(result.enclosing_element, Some(key(BBB, "B.bar")));
    }
    assert!(searched.contains(&SourcePath::new(BBB)));
    assert!(!searched.contains(&SourcePath::new(CCC)));
}

#[tokio::test]
async fn test_searched_files_are_skipped() {
    let driver = workspace();
    let token = CancelToken::new();
    let foo = driver.element(&key(AAA, "A.foo"), &token).await.unwrap().unwrap();

    let mut searched = SearchedFiles::new();
    let first = driver.references(&foo, &mut searched, &token).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].kind, SearchResultKind::Invocation);

    let again = driver.references(&foo, &mut searched, &token).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_untyped_receiver_is_an_unresolved_match() {
    let driver = workspace();
    let token = CancelToken::new();
    let mut searched = SearchedFiles::new();
    let results = driver
        .unresolved_member_references("test", &mut searched, &token)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.kind, SearchResultKind::Invocation);
    assert!(!result.is_resolved);
    assert!(result.is_qualified);
    assert_eq!(result.offset, B_SOURCE.find("test").unwrap());
}

#[tokio::test]
async fn test_subtypes_stay_within_dependent_packages() {
    let driver = workspace();
    let token = CancelToken::new();
    let a = key(AAA, "A");

    let mut searched = SearchedFiles::new();
    let results = driver
        .subtypes(&mut searched, SubtypeQuery::Type(&a), &token)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    let b = &results[0];
    assert_eq!(b.name, "B");
    assert_eq!(b.library_uri, "package:bbb/b.dart");
    assert_eq!(b.id, "package:bbb/b.dart;package:bbb/b.dart;B");
    assert_eq!(b.members, vec!["bar"]);
    assert!(!searched.contains(&SourcePath::new(CCC)));

    let mut searched = SearchedFiles::new();
    let deeper = driver
        .subtypes(&mut searched, SubtypeQuery::Subtype(b), &token)
        .await
        .unwrap();
    assert!(deeper.is_empty());
}

#[tokio::test]
async fn test_sub_types_reports_clause_occurrences() {
    let driver = workspace();
    let token = CancelToken::new();
    let mut searched = SearchedFiles::new();
    let results = driver
        .sub_types(&key(AAA, "A"), &mut searched, &token)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].kind, SearchResultKind::Reference);
    assert_eq!(results[0].offset, B_SOURCE.find("A {").unwrap());
}

#[tokio::test]
async fn test_subtype_without_members() {
    let path = "/ws/app/lib/a.dart";
    let driver = app(&[(path, "class A {}\nclass B extends A {}\n")]);
    let token = CancelToken::new();
    let mut searched = SearchedFiles::new();
    let a = key(path, "A");
    let results = driver
        .subtypes(&mut searched, SubtypeQuery::Type(&a), &token)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "B");
    assert_eq!(results[0].library_uri, "package:app/a.dart");
    assert!(results[0].members.is_empty());
}

#[tokio::test]
async fn test_references_have_no_duplicates() {
    let source = "class A {}\nA make() => A();\nvoid f(A a) { A b = a; }\n";
    let path = "/ws/app/lib/a.dart";
    let driver = app(&[(path, source)]);
    let token = CancelToken::new();
    let a = driver.element(&key(path, "A"), &token).await.unwrap().unwrap();
    let mut searched = SearchedFiles::new();
    let results = driver.references(&a, &mut searched, &token).await.unwrap();
    assert_eq!(results.len(), 4);
    let mut seen = std::collections::HashSet::new();
    for result in &results {
        assert!(seen.insert((result.offset, result.length)));
        assert!(result.offset + result.length <= source.len());
        assert_eq!(&source[result.offset..result.offset + result.length], "A");
        assert_eq!(result.kind, SearchResultKind::Reference);
    }
}

#[tokio::test]
async fn test_mixin_constraints_are_subtype_edges() {
    let driver = app(&[("/ws/app/lib/m.dart", "class A {}\nclass B {}\nmixin M on A, B {}\n")]);
    let token = CancelToken::new();
    let path = "/ws/app/lib/m.dart";
    let mixin = key(path, "M");
    assert_eq!(driver.all_subtypes(&key(path, "A"), &token).await.unwrap(), vec![mixin.clone()]);
    assert_eq!(driver.all_subtypes(&key(path, "B"), &token).await.unwrap(), vec![mixin]);
}

#[tokio::test]
async fn test_class_members_by_name() {
    let driver = workspace();
    let token = CancelToken::new();
    let mut searched = SearchedFiles::new();
    let members = driver.class_members("foo", &mut searched, &token).await.unwrap();
    let keys: Vec<_> = members.iter().map(|m| m.key.clone()).collect();
    // Discovery order: bbb, ccc, then aaa reached through bbb's dependencies.
    assert_eq!(keys, vec![key(CCC, "C.foo"), key(AAA, "A.foo")]);
}

#[tokio::test]
async fn test_element_at_follows_occurrences() {
    let driver = workspace();
    let token = CancelToken::new();
    let offset = B_SOURCE.find("foo();").unwrap();
    let element = driver
        .element_at(&SourcePath::new(BBB), offset, &token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(element.key, key(AAA, "A.foo"));

    let declared = B_SOURCE.find("bar").unwrap();
    let element = driver
        .element_at(&SourcePath::new(BBB), declared, &token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(element.key, key(BBB, "B.bar"));
}

#[tokio::test]
async fn test_top_level_elements_hide_private_names() {
    let driver = app(&[
        ("/ws/app/lib/a.dart", "class Alpha {}\nclass _Alpha {}\nvoid alphabet() {}\n"),
        ("/ws/app/lib/b.dart", "class Beta {}\n"),
    ]);
    let token = CancelToken::new();
    let pattern = Regex::new("(?i)alpha").unwrap();

    let names = |elements: Vec<Arc<refscope_api::models::Element>>| -> Vec<String> {
        elements.iter().map(|e| e.display_name().to_string()).collect()
    };
    let outside = SourcePath::new("/ws/app/lib/b.dart");
    let from_b = driver.top_level_elements(&pattern, Some(&outside), &token).await.unwrap();
    assert_eq!(names(from_b), vec!["Alpha", "alphabet"]);

    let inside = SourcePath::new("/ws/app/lib/a.dart");
    let from_a = driver.top_level_elements(&pattern, Some(&inside), &token).await.unwrap();
    assert_eq!(names(from_a), vec!["Alpha", "_Alpha", "alphabet"]);
}

#[tokio::test]
async fn test_declarations_in_discovery_order() {
    let driver = workspace();
    let token = CancelToken::new();
    let symbols = driver.declarations(None, None, &token).await.unwrap();
    assert!(!symbols.cancelled);

    let first = &symbols.declarations[0];
    assert_eq!(first.name, "B");
    assert_eq!(first.kind, DeclarationKind::Class);
    assert_eq!((first.line, first.column), (3, 7));
    assert_eq!(symbols.files[first.file_index], SourcePath::new(BBB));

    let foo = symbols
        .declarations
        .iter()
        .find(|d| d.name == "foo" && d.path == SourcePath::new(AAA))
        .unwrap();
    assert_eq!(foo.kind, DeclarationKind::Method);
    assert_eq!(foo.containing_class_name.as_deref(), Some("A"));
    assert_eq!(foo.parameters.as_deref(), Some("()"));
}

#[tokio::test]
async fn test_declarations_pattern_and_limit() {
    let driver = workspace();
    let token = CancelToken::new();
    let pattern = Regex::new("^(A|B|C)$").unwrap();
    let symbols = driver.declarations(Some(&pattern), Some(2), &token).await.unwrap();
    let names: Vec<_> = symbols.declarations.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(!symbols.cancelled);
}

#[tokio::test]
async fn test_cancelled_declarations_are_flagged() {
    let driver = workspace();
    let token = CancelToken::new();
    token.cancel();
    let symbols = driver.declarations(None, None, &token).await.unwrap();
    assert!(symbols.cancelled);
    assert!(symbols.declarations.is_empty());
}

#[tokio::test]
async fn test_subtypes_skip_packages_outside_the_dependency_closure() {
    let driver = closure_workspace();
    let token = CancelToken::new();
    let a = key(AAA, "A");
    let mut searched = SearchedFiles::new();
    let results = driver
        .subtypes(&mut searched, SubtypeQuery::Type(&a), &token)
        .await
        .unwrap();
    let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["P", "B"]);

    // `ccc` structurally extends `A` but does not depend on `aaa`.
    let unit = driver
        .get_resolved_unit(&SourcePath::new(CCC), &token)
        .await
        .unwrap();
    let c = unit.element(&key(CCC, "C")).unwrap();
    assert_eq!(c.kind.type_shape().unwrap().supertype, Some(a));
}

#[tokio::test]
async fn test_sub_types_skip_packages_outside_the_dependency_closure() {
    let driver = closure_workspace();
    let token = CancelToken::new();
    let mut searched = SearchedFiles::new();
    let results = driver
        .sub_types(&key(AAA, "A"), &mut searched, &token)
        .await
        .unwrap();
    let mut paths: Vec<_> = results.iter().map(|r| r.path.clone()).collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![SourcePath::new("/ws/app/lib/p.dart"), SourcePath::new(BBB)]
    );
    assert!(!searched.contains(&SourcePath::new(CCC)));
}

#[tokio::test]
async fn test_mixin_constraints_are_subtypes_of_each() {
    let path = "/ws/app/lib/m.dart";
    let driver = app(&[(path, "class A {}\nclass B {}\nmixin M on A, B {}\n")]);
    let token = CancelToken::new();
    let mut searched = SearchedFiles::new();
    for supertype in ["A", "B"] {
        let supertype = key(path, supertype);
        let results = driver
            .subtypes(&mut searched, SubtypeQuery::Type(&supertype), &token)
            .await
            .unwrap();
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["M"]);
    }
}

#[tokio::test]
async fn test_shared_searched_files_page_deeper() {
    let path = "/ws/app/lib/a.dart";
    let driver = app(&[(path, "class A {}\nclass B extends A {}\nclass C extends B {}\n")]);
    let token = CancelToken::new();
    let a = key(path, "A");

    let mut searched = SearchedFiles::new();
    let first = driver
        .subtypes(&mut searched, SubtypeQuery::Type(&a), &token)
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
    let deeper = driver
        .subtypes(&mut searched, SubtypeQuery::Subtype(&first[0]), &token)
        .await
        .unwrap();
    let names: Vec<_> = deeper.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["C"]);

    let again = driver
        .subtypes(&mut searched, SubtypeQuery::Type(&a), &token)
        .await
        .unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_shared_searched_files_cover_each_element() {
    let path = "/ws/app/lib/a.dart";
    let source = "class A {
  int x = 0;
  int y = 0;
  void f() {
    x = 1;
    y = 2;
  }
}
";
    let driver = app(&[(path, source)]);
    let token = CancelToken::new();
    let mut searched = SearchedFiles::new();
    for name in ["A.x", "A.y"] {
        let field = driver.element(&key(path, name), &token).await.unwrap().unwrap();
        let results = driver.references(&field, &mut searched, &token).await.unwrap();
        assert_eq!(results.len(), 1, "{name}");
        assert_eq!(results[0].kind, SearchResultKind::Write);
    }
}

#[tokio::test]
async fn test_declarations_cancelled_mid_scan_are_a_prefix() {
    let full = workspace().declarations(None, None, &CancelToken::new()).await.unwrap();

    let token = CancelToken::new();
    let mut caps = dart_caps();
    caps.parser = Arc::new(CancelOnParse {
        inner: caps.parser.clone(),
        trigger: SourcePath::new(CCC),
        token: token.clone(),
    });
    let driver = workspace_with(caps);
    let partial = driver.declarations(None, None, &token).await.unwrap();

    assert!(partial.cancelled);
    let n = partial.declarations.len();
    assert!(n > 0 && n < full.declarations.len());
    assert_eq!(partial.declarations[..], full.declarations[..n]);
    assert!(partial.declarations.iter().all(|d| d.path == SourcePath::new(BBB)));
}

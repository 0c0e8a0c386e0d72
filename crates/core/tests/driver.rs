use refscope_api::models::{ElementKey, Snapshot, SourcePath};
use refscope_api::AnalysisError;
use refscope_core::project::StaticPackageConfig;
use refscope_core::resource::MemoryResourceProvider;
use refscope_core::{AnalysisDriver, CancelToken};
use refscope_dart::dart_caps;
use refscope_plugin::{LanguageCaps, ParseCap, ParsedUnit, SyntaxError};
use std::sync::Arc;

const A: &str = "/ws/app/lib/a.dart";
const B: &str = "/ws/app/lib/b.dart";

fn driver(files: &[(&str, &str)]) -> AnalysisDriver {
    driver_with(dart_caps(), files)
}

fn driver_with(caps: LanguageCaps, files: &[(&str, &str)]) -> AnalysisDriver {
    let mut provider = MemoryResourceProvider::new();
    for (path, content) in files {
        provider = provider.with_file(*path, *content);
    }
    let packages = StaticPackageConfig::new().package("app", "/ws/app", &[]);
    AnalysisDriver::builder(Arc::new(provider))
        .with_language(caps)
        .with_package_config(Arc::new(packages))
        .with_root("/ws/app")
        .build()
        .unwrap()
}

fn path(p: &str) -> SourcePath {
    SourcePath::new(p)
}

#[test]
fn test_builder_requires_a_language() {
    let result = AnalysisDriver::builder(Arc::new(MemoryResourceProvider::new())).build();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_discovery_lists_package_files() {
    let driver = driver(&[(A, "class A {}\n"), (B, "class B {}\n"), ("/ws/app/README.md", "")]);
    driver.ensure_discovered(&CancelToken::new()).unwrap();
    assert_eq!(driver.known_files(), vec![path(A), path(B)]);
    assert!(driver.snapshot().is_discovered());
}

#[tokio::test]
async fn test_fresh_unit_is_returned_as_is() {
    let driver = driver(&[(A, "class A {}\n")]);
    let token = CancelToken::new();
    let first = driver.get_resolved_unit(&path(A), &token).await.unwrap();
    let second = driver.get_resolved_unit(&path(A), &token).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.uri, "package:app/a.dart");
    assert!(!first.partial);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_resolution() {
    let driver = Arc::new(driver(&[
        (A, "class A {}\n"),
        (B, "import 'a.dart';\nclass B extends A {}\n"),
    ]));
    let token = CancelToken::new();
    let (path_left, path_right) = (path(B), path(B));
    let (left, right) = tokio::join!(
        driver.get_resolved_unit(&path_left, &token),
        driver.get_resolved_unit(&path_right, &token)
    );
    assert!(Arc::ptr_eq(&left.unwrap(), &right.unwrap()));
}

#[tokio::test]
async fn test_edit_invalidates_dependents() {
    let driver = driver(&[(A, "class A {}\n"), (B, "import 'a.dart';\nclass B extends A {}\n")]);
    let token = CancelToken::new();
    let before = driver.get_resolved_unit(&path(B), &token).await.unwrap();

    driver.apply_edit(&path(A), "class A {}\nclass C {}\n");
    let after = driver.get_resolved_unit(&path(B), &token).await.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));

    let a = driver.get_resolved_unit(&path(A), &token).await.unwrap();
    assert!(a.element(&ElementKey::new(path(A), "C")).is_some());
    let b = after.element(&ElementKey::new(path(B), "B")).unwrap();
    assert_eq!(
        b.kind.type_shape().unwrap().supertype,
        Some(ElementKey::new(path(A), "A"))
    );
}

#[tokio::test]
async fn test_identical_edit_keeps_the_unit() {
    let driver = driver(&[(A, "class A {}\n")]);
    let token = CancelToken::new();
    let before = driver.get_resolved_unit(&path(A), &token).await.unwrap();
    driver.apply_edit(&path(A), "class A {}\n");
    let after = driver.get_resolved_unit(&path(A), &token).await.unwrap();
    assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn test_invalid_paths() {
    let driver = driver(&[(A, "class A {}\n")]);
    let token = CancelToken::new();
    for p in ["/elsewhere/x.dart", "/ws/app/lib/notes.txt", "/ws/app/lib/missing.dart"] {
        let err = driver.get_resolved_unit(&path(p), &token).await.unwrap_err();
        assert_eq!(err, AnalysisError::InvalidPath(path(p)));
    }
}

#[tokio::test]
async fn test_cancelled_token_stops_resolution() {
    let driver = driver(&[(A, "class A {}\n")]);
    let token = CancelToken::new();
    token.cancel();
    let err = driver.get_resolved_unit(&path(A), &token).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(driver.snapshot().fresh_unit(&path(A)).is_none());
}

#[tokio::test]
async fn test_syntax_errors_give_a_partial_unit() {
    let driver = driver(&[(A, "class A {\n  var s = \"open;\n}\n")]);
    let unit = driver
        .get_resolved_unit(&path(A), &CancelToken::new())
        .await
        .unwrap();
    assert!(unit.partial);
    assert!(!unit.diagnostics.is_empty());
}

#[tokio::test]
async fn test_import_cycle_resolves_both_ways() {
    let a = "import 'b.dart';\nclass A {}\nvoid useB() { B(); }\n";
    let b = "import 'a.dart';\nclass B extends A {}\n";
    let driver = driver(&[(A, a), (B, b)]);
    let token = CancelToken::new();

    let unit_a = driver.get_resolved_unit(&path(A), &token).await.unwrap();
    let call = a.find("B()").unwrap();
    let occurrence = unit_a.occurrence_at(call).unwrap();
    assert_eq!(occurrence.target, Some(ElementKey::new(path(B), "B")));

    let unit_b = driver.get_resolved_unit(&path(B), &token).await.unwrap();
    let class = unit_b.element(&ElementKey::new(path(B), "B")).unwrap();
    assert_eq!(
        class.kind.type_shape().unwrap().supertype,
        Some(ElementKey::new(path(A), "A"))
    );
}

#[tokio::test]
async fn test_remove_file_forgets_it() {
    let driver = driver(&[(A, "class A {}\n"), (B, "import 'a.dart';\nclass B extends A {}\n")]);
    let token = CancelToken::new();
    driver.get_resolved_unit(&path(B), &token).await.unwrap();

    driver.remove_file(&path(A));
    assert!(!driver.known_files().contains(&path(A)));
    assert!(driver.snapshot().index().file(&path(A)).is_none());
    assert!(driver.snapshot().fresh_unit(&path(B)).is_none());
}

#[tokio::test]
async fn test_non_ascii_comments_and_strings() {
    let source = "/* café © 2024 */\nclass A {\n  var s = 'naïve ✓';\n}\n";
    let driver = driver(&[(A, source)]);
    let unit = driver
        .get_resolved_unit(&path(A), &CancelToken::new())
        .await
        .unwrap();
    assert!(!unit.partial, "{:?}", unit.diagnostics);
    let class = unit.element(&ElementKey::new(path(A), "A")).unwrap();
    assert_eq!(class.location.as_ref().unwrap().offset, source.find("A {").unwrap());
    assert!(unit.element(&ElementKey::new(path(A), "A.s")).is_some());
}

struct PanickingParser;

impl ParseCap for PanickingParser {
    fn parse(&self, _snapshot: &Snapshot) -> Result<ParsedUnit, SyntaxError> {
        panic!("parser bug");
    }
}

#[tokio::test]
async fn test_parser_panic_gives_a_partial_unit() {
    let mut caps = dart_caps();
    caps.parser = Arc::new(PanickingParser);
    let driver = driver_with(caps, &[(A, "class A {}\n")]);
    let unit = driver
        .get_resolved_unit(&path(A), &CancelToken::new())
        .await
        .unwrap();
    assert!(unit.partial);
    assert!(unit.diagnostics.iter().any(|d| d.contains("parser panicked")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resolution_on_a_multi_threaded_runtime() {
    let driver = Arc::new(driver(&[
        (A, "class A {}\n"),
        (B, "import 'a.dart';\nclass B extends A {}\n"),
    ]));
    let token = CancelToken::new();
    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let driver = driver.clone();
            let token = token.clone();
            tokio::spawn(async move { driver.get_resolved_unit(&path(B), &token).await })
        })
        .collect();
    let mut units = Vec::new();
    for task in tasks {
        units.push(task.await.unwrap().unwrap());
    }
    assert!(units.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

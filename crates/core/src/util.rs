use refscope_api::{AnalysisError, AnalysisResult, SourcePath};
use regex::{Regex, RegexBuilder};
use smol_str::SmolStr;
use std::hash::Hasher;
use xxhash_rust::xxh3::Xxh3;

pub fn content_hash(content: &str) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.write(content.as_bytes());
    hasher.finish()
}

/// `file://` URI of a path outside every package's `lib` directory.
pub fn file_uri(path: &SourcePath) -> SmolStr {
    match url::Url::from_file_path(path.as_path()) {
        Ok(url) => SmolStr::new(url.as_str()),
        Err(()) => SmolStr::new(format!("file://{}", path)),
    }
}

/// Compile a user-supplied name pattern.
pub fn compile_pattern(pattern: &str) -> AnalysisResult<Regex> {
    RegexBuilder::new(pattern)
        .size_limit(1 << 20)
        .build()
        .map_err(|e| AnalysisError::InvalidPattern(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("class A {}"), content_hash("class A {}"));
        assert_ne!(content_hash("class A {}"), content_hash("class B {}"));
    }

    #[test]
    fn test_file_uri() {
        let uri = file_uri(&SourcePath::new("/ws/bin/main.dart"));
        assert_eq!(uri, "file:///ws/bin/main.dart");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            compile_pattern("(unclosed"),
            Err(AnalysisError::InvalidPattern(_))
        ));
        assert!(compile_pattern("^Foo").unwrap().is_match("FooBar"));
    }
}

use super::Scope;
use refscope_api::models::ElementKey;
use smol_str::SmolStr;
use std::collections::HashMap;

/// Block-structured scope of parameters, locals, type parameters and labels.
#[derive(Debug, Default)]
pub struct LocalScope {
    frames: Vec<HashMap<SmolStr, ElementKey>>,
    labels: Vec<(SmolStr, ElementKey)>,
}

impl LocalScope {
    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn declare(&mut self, name: &str, key: ElementKey) {
        if self.frames.is_empty() {
            self.push();
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(SmolStr::new(name), key);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.iter().all(HashMap::is_empty)
    }

    pub fn push_label(&mut self, name: &str, key: ElementKey) {
        self.labels.push((SmolStr::new(name), key));
    }

    pub fn pop_label(&mut self) {
        self.labels.pop();
    }

    pub fn label(&self, name: &str) -> Option<&ElementKey> {
        self.labels
            .iter()
            .rev()
            .find(|(label, _)| label == name)
            .map(|(_, key)| key)
    }
}

impl Scope for LocalScope {
    fn lookup(&self, name: &str, _setter: bool) -> Option<ElementKey> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .cloned()
    }

    fn name(&self) -> &'static str {
        "Local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refscope_api::models::SourcePath;

    fn key(name: &str) -> ElementKey {
        ElementKey::new(SourcePath::new("/p/lib/a.dart"), name)
    }

    #[test]
    fn test_inner_frames_shadow_outer() {
        let mut scope = LocalScope::default();
        scope.push();
        scope.declare("x", key("f.x@1"));
        scope.push();
        scope.declare("x", key("f.x@9"));
        assert_eq!(scope.lookup("x", false), Some(key("f.x@9")));
        scope.pop();
        assert_eq!(scope.lookup("x", false), Some(key("f.x@1")));
        scope.pop();
        assert_eq!(scope.lookup("x", false), None);
    }

    #[test]
    fn test_labels_are_separate_from_values() {
        let mut scope = LocalScope::default();
        scope.push_label("outer", key("f.outer:@3"));
        assert!(scope.lookup("outer", false).is_none());
        assert_eq!(scope.label("outer"), Some(&key("f.outer:@3")));
        scope.pop_label();
        assert!(scope.label("outer").is_none());
    }
}

use crate::DartPlugin;
use refscope_plugin::FileMatcherCap;
use std::path::Path;

impl FileMatcherCap for DartPlugin {
    fn supports_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("dart"))
            .unwrap_or(false)
    }
}

use crate::DartPlugin;
use refscope_api::models::Language;
use refscope_plugin::LanguageCaps;
use std::sync::Arc;

pub fn dart_caps() -> LanguageCaps {
    let plugin = Arc::new(DartPlugin::new());
    LanguageCaps {
        language: Language::DART,
        matcher: plugin.clone(),
        parser: plugin.clone(),
        resolver: plugin,
    }
}

use crate::DartPlugin;
use refscope_plugin::{ParsedUnit, ResolutionError, ResolutionScope, ResolveCap, ResolvedLibrary};

impl ResolveCap for DartPlugin {
    fn resolve(
        &self,
        unit: &ParsedUnit,
        scope: &ResolutionScope<'_>,
    ) -> Result<ResolvedLibrary, ResolutionError> {
        self.resolver.resolve(unit, scope)
    }
}

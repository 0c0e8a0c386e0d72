use crate::DartPlugin;
use refscope_api::models::Snapshot;
use refscope_plugin::{ParseCap, ParsedUnit, SyntaxError};

impl ParseCap for DartPlugin {
    fn parse(&self, snapshot: &Snapshot) -> Result<ParsedUnit, SyntaxError> {
        self.parser.parse(snapshot)
    }
}

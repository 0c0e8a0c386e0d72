use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Name of the language a parsed file was handled by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(Cow<'static, str>);

impl Language {
    pub const DART: Language = Language(Cow::Borrowed("dart"));
    /// Recorded for files no registered plugin matched.
    pub const UNKNOWN: Language = Language(Cow::Borrowed("unknown"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

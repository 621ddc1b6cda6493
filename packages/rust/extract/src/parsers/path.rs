//! File path parser (POSIX and Windows).

use std::sync::LazyLock;

use factlearn_shared::{Fact, Result};
use regex::Regex;

use super::{FactStream, Parser};

/// Absolute paths ending in a file with an extension.
static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:^|[\s"'=(])((?:/[\w.\-]+)+\.\w+|[A-Za-z]:\\(?:[\w.\-]+\\)*[\w.\-]+\.\w+)"#,
    )
    .expect("path regex")
});

/// Yields `host.file.path` facts.
pub struct PathParser;

impl PathParser {
    pub const NAME: &'static str = "path";
    pub const TRAIT: &'static str = "host.file.path";
}

impl Parser for PathParser {
    fn parse<'a>(&'a self, text: &'a str) -> Result<FactStream<'a>> {
        Ok(Box::new(
            PATH_RE
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .map(|m| Fact::new(Self::TRAIT, m.as_str())),
        ))
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

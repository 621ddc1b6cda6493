//! Regex parsers declared in `[[parsers.custom]]`.

use factlearn_shared::{Fact, LearnError, PatternParserConfig, Result, is_valid_trait};
use regex::Regex;

use super::{FactStream, Parser};

/// Stamps a fixed trait on every regex match. The first capture group is the
/// value when the pattern has one, otherwise the whole match.
pub struct PatternParser {
    name: String,
    trait_name: String,
    pattern: Regex,
}

impl PatternParser {
    pub fn new(name: impl Into<String>, trait_name: impl Into<String>, pattern: &str) -> Result<Self> {
        let name = name.into();
        let trait_name = trait_name.into();

        if !is_valid_trait(&trait_name) {
            return Err(LearnError::config(format!(
                "parser '{name}': invalid trait '{trait_name}'"
            )));
        }
        let pattern = Regex::new(pattern)
            .map_err(|e| LearnError::config(format!("parser '{name}': bad pattern: {e}")))?;

        Ok(Self {
            name,
            trait_name,
            pattern,
        })
    }

    pub fn from_config(config: &PatternParserConfig) -> Result<Self> {
        Self::new(&config.name, &config.trait_name, &config.pattern)
    }
}

impl Parser for PatternParser {
    fn parse<'a>(&'a self, text: &'a str) -> Result<FactStream<'a>> {
        let has_group = self.pattern.captures_len() > 1;
        Ok(Box::new(self.pattern.captures_iter(text).filter_map(
            move |caps| {
                let m = if has_group { caps.get(1) } else { caps.get(0) }?;
                let value = m.as_str().trim();
                (!value.is_empty()).then(|| Fact::new(&self.trait_name, value))
            },
        )))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

//! Fact extraction parsers.
//!
//! This crate provides:
//! - [`Parser`] — the capability every parser plugin exposes
//! - Built-in parsers ([`IpParser`], [`PathParser`]) and config-driven [`PatternParser`]s
//! - [`ParserRegistry`] — the fixed, ordered set of parsers loaded at startup

pub mod parsers;

pub use parsers::{
    BUILTIN_PARSERS, FactStream, IpParser, Parser, ParserRegistry, PathParser, PatternParser,
};

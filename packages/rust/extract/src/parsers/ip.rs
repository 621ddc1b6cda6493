//! IPv4 address parser.

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use factlearn_shared::{Fact, Result};
use regex::Regex;

use super::{FactStream, Parser};

/// Dotted quads; octet ranges are checked by `Ipv4Addr` afterwards.
static IPV4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("ipv4 regex")
});

/// Yields `host.ip.address` facts for routable-looking IPv4 addresses.
pub struct IpParser;

impl IpParser {
    pub const NAME: &'static str = "ip";
    pub const TRAIT: &'static str = "host.ip.address";
}

impl Parser for IpParser {
    fn parse<'a>(&'a self, text: &'a str) -> Result<FactStream<'a>> {
        Ok(Box::new(
            IPV4_RE
                .find_iter(text)
                .map(|m| m.as_str())
                .filter(|raw| is_usable_ip(raw))
                .map(|raw| Fact::new(Self::TRAIT, raw)),
        ))
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

/// Rejects out-of-range octets and addresses that never identify a host.
fn is_usable_ip(raw: &str) -> bool {
    match raw.parse::<Ipv4Addr>() {
        Ok(ip) => !(ip.is_unspecified() || ip.is_loopback() || ip.is_broadcast()),
        Err(_) => false,
    }
}

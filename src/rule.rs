//! Ingress rule model shared by the feed, gateway and reconciler.

use ipnet::Ipv4Net;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// The only protocol cfsync manages
pub const INGRESS_PROTOCOL: &str = "tcp";

/// A single managed ingress rule: one CIDR allowed on one TCP port.
///
/// Ordering is by CIDR, then port, which keeps every set of rules iterating
/// in the same order from run to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rule {
    pub cidr: Ipv4Net,
    pub port: u16,
}

impl Rule {
    pub fn new(cidr: Ipv4Net, port: u16) -> Self {
        Self { cidr, port }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cidr, self.port)
    }
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Build the desired rule set: every CIDR crossed with every managed port.
pub fn desired_rules(cidrs: &BTreeSet<Ipv4Net>, ports: &[u16]) -> BTreeSet<Rule> {
    cidrs
        .iter()
        .flat_map(|cidr| ports.iter().map(move |port| Rule::new(*cidr, *port)))
        .collect()
}

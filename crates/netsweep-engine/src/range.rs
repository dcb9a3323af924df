//! IP range expansion.
//!
//! Accepted forms, optionally joined by commas:
//! * a single address: `192.168.1.10`
//! * a dash pair: `192.168.1.1-192.168.1.20`, or `192.168.1.1-20` for the last octet
//! * a CIDR block: `192.168.1.0/24` (network and broadcast included)
//!
//! Expansion is ascending and deduplicated. That order is the canonical
//! order of every result set.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use netsweep_core::{Result, SweepError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Span { start: Ipv4Addr, end: Ipv4Addr },
    Cidr(Ipv4Net),
}

impl Segment {
    fn bounds(&self) -> (u32, u32) {
        match self {
            Self::Span { start, end } => (u32::from(*start), u32::from(*end)),
            Self::Cidr(net) => (u32::from(net.network()), u32::from(net.broadcast())),
        }
    }

    fn size(&self) -> u64 {
        let (start, end) = self.bounds();
        u64::from(end - start) + 1
    }

    fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> {
        let (start, end) = self.bounds();
        (start..=end).map(Ipv4Addr::from)
    }
}

/// A parsed, not yet expanded, address range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRange {
    spec: String,
    segments: Vec<Segment>,
}

impl AddressRange {
    pub fn parse(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(SweepError::invalid_range(spec, "empty range"));
        }

        let segments = trimmed
            .split(',')
            .map(|part| parse_segment(spec, part.trim()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            spec: spec.to_string(),
            segments,
        })
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Upper bound on the number of addresses, before deduplication.
    pub fn size_hint(&self) -> u64 {
        self.segments.iter().map(Segment::size).sum()
    }

    /// Materialize the addresses, failing once more than `max_hosts` distinct
    /// addresses would be produced.
    pub fn expand(&self, max_hosts: usize) -> Result<Vec<Ipv4Addr>> {
        let too_large = |requested: u64| SweepError::RangeTooLarge {
            requested,
            limit: max_hosts,
        };

        for segment in &self.segments {
            if segment.size() > max_hosts as u64 {
                return Err(too_large(segment.size()));
            }
        }

        if let [only] = self.segments.as_slice() {
            return Ok(only.addresses().collect());
        }

        let mut distinct = BTreeSet::new();
        for segment in &self.segments {
            distinct.extend(segment.addresses());
            if distinct.len() > max_hosts {
                return Err(too_large(distinct.len() as u64));
            }
        }
        Ok(distinct.into_iter().collect())
    }
}

impl FromStr for AddressRange {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parse and expand `spec` in one step.
pub fn expand(spec: &str, max_hosts: usize) -> Result<Vec<Ipv4Addr>> {
    AddressRange::parse(spec)?.expand(max_hosts)
}

fn parse_segment(spec: &str, part: &str) -> Result<Segment> {
    if part.is_empty() {
        return Err(SweepError::invalid_range(spec, "empty segment"));
    }

    if let Some((addr, prefix)) = part.split_once('/') {
        let addr = parse_addr(spec, addr)?;
        let prefix: u8 = prefix
            .trim()
            .parse()
            .map_err(|_| SweepError::invalid_range(spec, format!("invalid prefix in {part:?}")))?;
        let net = Ipv4Net::new(addr, prefix)
            .map_err(|_| SweepError::invalid_range(spec, format!("prefix /{prefix} exceeds 32")))?;
        return Ok(Segment::Cidr(net.trunc()));
    }

    if let Some((start, end)) = part.split_once('-') {
        let start = parse_addr(spec, start)?;
        let end = parse_range_end(spec, start, end.trim())?;
        if start > end {
            return Err(SweepError::invalid_range(
                spec,
                format!("start {start} is after end {end}"),
            ));
        }
        return Ok(Segment::Span { start, end });
    }

    let addr = parse_addr(spec, part)?;
    Ok(Segment::Span {
        start: addr,
        end: addr,
    })
}

/// The end of a dash pair is either a full address or just the last octet.
fn parse_range_end(spec: &str, start: Ipv4Addr, end: &str) -> Result<Ipv4Addr> {
    if end.contains('.') {
        return parse_addr(spec, end);
    }
    let last: u8 = end
        .parse()
        .map_err(|_| SweepError::invalid_range(spec, format!("invalid range end {end:?}")))?;
    let [a, b, c, _] = start.octets();
    Ok(Ipv4Addr::new(a, b, c, last))
}

fn parse_addr(spec: &str, s: &str) -> Result<Ipv4Addr> {
    let s = s.trim();
    if s.contains(':') {
        return Err(SweepError::invalid_range(spec, "IPv6 ranges are not supported"));
    }
    s.parse()
        .map_err(|_| SweepError::invalid_range(spec, format!("{s:?} is not a dotted IPv4 address")))
}

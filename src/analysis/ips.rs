//! IP address extraction from shell output.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;

use super::text::plain_text;
use crate::tracelog::Event;

const IPV4_PATTERN: &str = r"\d{1,3}(?:\.\d{1,3}){3}";
const IPV6_PATTERN: &str = r"(?i)[0-9a-f]{0,4}(?::[0-9a-f]{0,4}){2,7}";

fn ipv4() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IPV4_PATTERN).expect("static IPv4 pattern"))
}

fn ipv6() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IPV6_PATTERN).expect("static IPv6 pattern"))
}

/// Candidate must not be glued to surrounding word characters, e.g. `std::io`
/// or a longer dotted version number.
fn standalone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    let glued = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == ':';
    if before.is_some_and(|c| glued(c) || c == '.') || after.is_some_and(glued) {
        return false;
    }
    // "1.2.3.4." ends a sentence; "1.2.3.4.5" does not stand alone.
    !(after == Some('.') && text[end + 1..].starts_with(|c: char| c.is_ascii_digit()))
}

/// Valid addresses in `text`, in order of appearance (duplicates included).
pub fn find_ips(text: &str) -> Vec<IpAddr> {
    let mut found: Vec<(usize, IpAddr)> = Vec::new();

    for regex in [ipv4(), ipv6()] {
        for m in regex.find_iter(text) {
            // A bare "::" run is punctuation, not an address.
            if !m.as_str().contains(|c: char| c.is_ascii_hexdigit()) {
                continue;
            }
            if !standalone(text, m.start(), m.end()) {
                continue;
            }
            if let Ok(ip) = m.as_str().parse::<IpAddr>() {
                found.push((m.start(), ip));
            }
        }
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, ip)| ip).collect()
}

/// Distinct addresses in output events, first-seen order.
pub fn extract_ips(events: &[Event]) -> Vec<IpAddr> {
    let mut seen = HashSet::new();
    let mut ips = Vec::new();
    for event in events.iter().filter(|e| e.is_output()) {
        for ip in find_ips(&plain_text(&event.payload)) {
            if seen.insert(ip) {
                ips.push(ip);
            }
        }
    }
    ips
}

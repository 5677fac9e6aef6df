//! Virtual-host resolution.
//!
//! Precedence, first non-empty value wins:
//!
//! 1. `X-Forwarded-Host`: not standard, but what most proxies send.
//! 2. `Forwarded` (RFC 7239): the `host` token of the first element that has one.
//! 3. The request's own host ([`Request::host`]).

use http::header::FORWARDED;

use crate::request::Request;

const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Returns the virtual host `req` targets, or `""` when nothing names one.
///
/// An empty host is routed to the wildcard tree.
pub fn resolve_host(req: &Request) -> &str {
    if let Some(host) = req.header(X_FORWARDED_HOST).filter(|h| !h.is_empty()) {
        return host;
    }

    let forwarded = req
        .headers()
        .get_all(FORWARDED)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(forwarded_host);
    if let Some(host) = forwarded {
        return host;
    }

    req.host().unwrap_or_default()
}

/// The values of one `Forwarded` element list this crate cares about.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Forwarded<'a> {
    pub for_addr: Option<&'a str>,
    pub proto: Option<&'a str>,
    pub host: Option<&'a str>,
}

/// Parses a `Forwarded` header value.
///
/// Elements are comma-separated, pairs within an element semicolon-separated.
/// Tokens are case-insensitive; values lose surrounding whitespace and quotes.
/// Pairs without `=` are skipped. For each token the first non-empty value
/// wins, so the element closest to the client takes precedence.
pub fn parse_forwarded(value: &str) -> Forwarded<'_> {
    let mut out = Forwarded::default();

    for pair in value.split([',', ';']) {
        let Some((token, value)) = pair.split_once('=') else { continue };
        let value = value.trim().trim_matches('"').trim();
        if value.is_empty() {
            continue;
        }

        let slot = match token.trim() {
            t if t.eq_ignore_ascii_case("for") => &mut out.for_addr,
            t if t.eq_ignore_ascii_case("proto") => &mut out.proto,
            t if t.eq_ignore_ascii_case("host") => &mut out.host,
            _ => continue,
        };
        slot.get_or_insert(value);
    }

    out
}

fn forwarded_host(value: &str) -> Option<&str> {
    parse_forwarded(value).host
}

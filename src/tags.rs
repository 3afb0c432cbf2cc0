//! Parsing of the `<hrs>` and `<status>` tags freelancers embed in issue and
//! comment bodies. Anything that fails to match is treated as absent, never as
//! an error.

use once_cell::sync::Lazy;
use regex::Regex;

static HOURS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<hrs>(\d+\.?\d*)</hrs>").unwrap());
static STATUS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<status>(\w+)</status>").unwrap());

/// Extract the first `<hrs>NUMBER</hrs>` tag from `content`
pub fn get_hours(content: &str) -> Option<f64> {
    let captures = HOURS_RE.captures(content)?;
    captures.get(1)?.as_str().parse::<f64>().ok()
}

/// Extract the first `<status>TOKEN</status>` tag from `content`, upper-cased.
/// The token is not validated against the known status codes.
pub fn get_status(content: &str) -> Option<String> {
    let captures = STATUS_RE.captures(content)?;
    Some(captures.get(1)?.as_str().to_uppercase())
}

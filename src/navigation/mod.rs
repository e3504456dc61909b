//! Roll-number extraction at the navigation boundary.
//!
//! Pages address results as `/result?rollNo=<roll>`. A missing or blank
//! parameter is its own state and never reaches the fetcher.

use reqwest::Url;

pub const ROLL_QUERY_PARAM: &str = "rollNo";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RollQuery {
    Present(String),
    Missing,
}

impl RollQuery {
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Self::Present(v.to_string()),
            _ => Self::Missing,
        }
    }
}

/// Accepts an absolute URL, a path with a query (`/result?rollNo=1`) or a bare
/// query string (`rollNo=1`).
pub fn parse_roll_query(input: &str) -> Result<RollQuery, String> {
    let input = input.trim();
    let url = if input.contains("://") {
        Url::parse(input).map_err(|e| format!("invalid result URL '{input}': {e}"))?
    } else {
        let base = Url::parse("http://localhost/").map_err(|e| e.to_string())?;
        let relative = if input.starts_with('/') || input.starts_with('?') {
            input.to_string()
        } else if input.contains('=') {
            format!("?{input}")
        } else {
            input.to_string()
        };
        base.join(&relative)
            .map_err(|e| format!("invalid result path '{input}': {e}"))?
    };
    let value = url
        .query_pairs()
        .find(|(k, _)| k == ROLL_QUERY_PARAM)
        .map(|(_, v)| v.into_owned());
    Ok(RollQuery::from_value(value.as_deref()))
}

/// The page path the entry form navigates to for a roll number.
pub fn result_path(roll_number: &str) -> String {
    let mut url = match Url::parse("http://localhost/result") {
        Ok(url) => url,
        Err(_) => return format!("/result?{ROLL_QUERY_PARAM}={}", roll_number.trim()),
    };
    url.query_pairs_mut()
        .append_pair(ROLL_QUERY_PARAM, roll_number.trim());
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

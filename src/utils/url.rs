use url::Url;

/// Tracking parameter injected by the source site into shared search links.
const CONTEXT_PARAM: &str = "context";

/// Normalize a search URL before it is fetched or stored.
///
/// Drops every query parameter named `context` and keeps the remaining
/// parameters verbatim and in their original order.
pub fn normalize_url(raw: &str) -> Result<String, url::ParseError> {
    let mut parsed = Url::parse(raw.trim())?;

    let kept = parsed.query().map(|query| {
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| param_name(pair) != CONTEXT_PARAM)
            .collect::<Vec<_>>()
            .join("&")
    });

    match kept {
        Some(query) if !query.is_empty() => parsed.set_query(Some(&query)),
        _ => parsed.set_query(None),
    }

    Ok(parsed.to_string())
}

/// Whether `raw` points at `allowed_host` or one of its subdomains.
pub fn host_matches(raw: &str, allowed_host: &str) -> bool {
    let Ok(parsed) = Url::parse(raw.trim()) else {
        return false;
    };
    match parsed.host_str() {
        Some(host) => host == allowed_host || host.ends_with(&format!(".{}", allowed_host)),
        None => false,
    }
}

fn param_name(pair: &str) -> &str {
    pair.split_once('=').map(|(name, _)| name).unwrap_or(pair)
}

//! URL reduction helpers.
//!
//! Candidates arrive as full result URLs; scoring and deduplication work on
//! two reductions of them:
//! - `main_part`: the origin, scheme://host, path stripped
//! - `domain_name`: the host, with a leading "www." label removed

/// Reduce a URL to its origin: everything up to the third '/'.
/// Shorter inputs are returned unchanged.
pub fn main_part(url: &str) -> String {
    let fields: Vec<&str> = url.split('/').collect();

    if fields.len() >= 3 {
        fields[..3].join("/")
    } else {
        url.to_string()
    }
}

/// Extract the host from a URL and strip a leading "www." when the host has
/// at least three labels, so "www.acme.co.uk" and "acme.co.uk" compare equal.
/// Comparison elsewhere is case-insensitive, so the host is lowercased here.
pub fn domain_name(url: &str) -> String {
    let without_scheme = match url.find("://") {
        Some(pos) => &url[pos + 3..],
        None => url,
    };

    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);

    // Drop userinfo and port if present
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    let host = host.to_lowercase();

    let fields: Vec<&str> = host.split('.').collect();

    if fields.len() >= 3 && fields[0] == "www" {
        fields[1..].join(".")
    } else {
        host
    }
}

/// The leftmost label of a domain, the part a company name can match against.
/// "acmewidgets.co.uk" -> "acmewidgets".
pub fn bare_domain(domain: &str) -> String {
    domain.split('.').next().unwrap_or(domain).to_string()
}

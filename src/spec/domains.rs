//! Domain matching rules for certificates and DNS zones.

fn canonical(domain: &str) -> String {
    domain.to_lowercase().trim_matches('.').to_string()
}

/// Whether `domain` is covered by any entry of `cert_domains`.
///
/// Wildcard matching follows RFC 6125: `*.example.com` matches
/// `app.example.com` but neither `example.com` itself nor
/// `sub.app.example.com`.
pub fn domain_matches_cert(domain: &str, cert_domains: &[String]) -> bool {
    let domain = canonical(domain);
    for cert_domain in cert_domains {
        let cd = canonical(cert_domain);
        if cd == domain {
            return true;
        }
        if let Some(wildcard_base) = cd.strip_prefix("*.") {
            if let Some(prefix) = domain
                .strip_suffix(wildcard_base)
                .and_then(|p| p.strip_suffix('.'))
            {
                if !prefix.is_empty() && !prefix.contains('.') {
                    return true;
                }
            }
        }
    }
    false
}

/// Whether `domain` equals or is a subdomain of `zone_domain`.
pub fn domain_is_under_zone(domain: &str, zone_domain: &str) -> bool {
    let domain = canonical(domain);
    let zone_domain = canonical(zone_domain);
    domain == zone_domain || domain.ends_with(&format!(".{zone_domain}"))
}

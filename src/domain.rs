/// Normalize an SNI host name: ASCII-lowercase and strip one trailing dot.
pub fn fix_domain(domain: &str) -> String {
    let trimmed = domain.strip_suffix('.').unwrap_or(domain);
    trimmed.to_ascii_lowercase()
}

/// Normalize a list of host names with [`fix_domain`].
pub fn fix_domains<S: AsRef<str>>(domains: &[S]) -> Vec<String> {
    domains.iter().map(|d| fix_domain(d.as_ref())).collect()
}

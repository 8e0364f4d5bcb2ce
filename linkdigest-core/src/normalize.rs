/// Canonical form of a shared link, used as the key of every ledger set.
///
/// Lower-cases the scheme and host (userinfo and port are kept as-is apart
/// from the host part) and trims surrounding whitespace. Path, query and
/// fragment are left untouched so distinct articles stay distinct. Input that
/// does not look like `scheme://...` is only trimmed. Idempotent.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(sep) = trimmed.find("://") else {
        return trimmed.to_string();
    };

    let scheme = &trimmed[..sep];
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return trimmed.to_string();
    }

    let rest = &trimmed[sep + 3..];
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    let authority = match authority.rfind('@') {
        Some(at) => format!("{}@{}", &authority[..at], authority[at + 1..].to_lowercase()),
        None => authority.to_lowercase(),
    };

    format!("{}://{}{}", scheme.to_ascii_lowercase(), authority, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_userinfo_case_is_kept() {
        assert_eq!(
            normalize("https://User:Pw@Example.COM/x"),
            "https://User:Pw@example.com/x"
        );
    }

    #[test]
    fn test_bad_scheme_is_only_trimmed() {
        assert_eq!(normalize(" a b://Host/ "), "a b://Host/");
    }
}

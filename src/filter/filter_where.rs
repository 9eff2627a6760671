/// Escapes `\`, `%` and `_` for use in a LIKE/ILIKE pattern.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Case-insensitive substring pattern: `%term%`.
pub fn contains_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_wildcards() {
        assert_eq!(escape_like("100%_sure\\"), "100\\%\\_sure\\\\");
        assert_eq!(contains_pattern("  pots "), "%pots%");
    }
}

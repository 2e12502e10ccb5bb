use unicode_normalization::UnicodeNormalization;

/// Canonical form of a CSV header: accent-free ASCII, lowercase, with spaces,
/// apostrophes and hyphens turned into underscores.
///
/// `"Libellé de la Commune"` becomes `"libelle_de_la_commune"`. Decomposition
/// happens before trimming and lowercasing so the result is a fixed point.
pub fn normalize_header(name: &str) -> String {
    // NFKD splits "é" into "e" + U+0301; non-ASCII leftovers are dropped
    let ascii: String = name
        .nfkd()
        .filter(|c| c.is_ascii() || *c == '\u{2019}')
        .collect();

    ascii
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '\'' | '\u{2019}' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// Normalize every header of a CSV header row.
pub fn normalize_headers<'a, I>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    headers.into_iter().map(normalize_header).collect()
}

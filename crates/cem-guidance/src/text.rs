/// Case-insensitive Levenshtein distance over Unicode scalar values.
pub(crate) fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    if a.is_empty() {
        return b.len();
    }
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != cb);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }
    row[b.len()]
}

/// A fifth of the term length in characters; the edit budget for a term.
pub(crate) fn edit_budget(term: &str) -> f64 {
    term.chars().count() as f64 / 5.0
}

/// Replace the first case-insensitive occurrence of `term` in `query` with
/// `replacement`. When the term cannot be located the replacement alone is
/// the new query.
pub(crate) fn substitute_term(query: &str, term: &str, replacement: &str) -> String {
    if term.is_empty() {
        return replacement.to_string();
    }
    let found = query.char_indices().find_map(|(start, _)| match_len(&query[start..], term).map(|len| (start, len)));
    match found {
        Some((start, len)) => format!("{}{}{}", &query[..start], replacement, &query[start + len..]),
        None => replacement.to_string(),
    }
}

/// Byte length of the prefix of `haystack` equal to `term` under Unicode
/// lowercasing, compared character by character.
fn match_len(haystack: &str, term: &str) -> Option<usize> {
    let mut chars = haystack.chars();
    let mut len = 0;
    for expected in term.chars() {
        let actual = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        len += actual.len_utf8();
    }
    Some(len)
}

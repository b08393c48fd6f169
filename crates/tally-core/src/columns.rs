//! Header normalization and column matching

/// Build headers from a raw header row
///
/// Cells are trimmed; empty cells become positional placeholders (`Col0`,
/// `Col1`, ...) so every header is non-empty.
pub fn normalize_headers(row: &[String]) -> Vec<String> {
    row.iter()
        .enumerate()
        .map(|(i, cell)| {
            let t = cell.trim();
            if t.is_empty() {
                format!("Col{}", i)
            } else {
                t.to_string()
            }
        })
        .collect()
}

/// Resolve a proposed (possibly approximate) column name against real headers
///
/// Exact case-insensitive equality over trimmed text first, then the first
/// header containing the proposed name. An empty proposal never matches.
pub fn match_column<'a>(headers: &'a [String], proposed: &str) -> Option<&'a str> {
    let target = proposed.trim().to_lowercase();
    if target.is_empty() {
        return None;
    }

    headers
        .iter()
        .find(|h| h.trim().to_lowercase() == target)
        .or_else(|| headers.iter().find(|h| h.to_lowercase().contains(&target)))
        .map(String::as_str)
}

/// Position of the column that carries a header name
///
/// When a name repeats, the last column with that name wins, as it would in
/// a name-keyed record.
pub fn column_index(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().rposition(|h| h == name)
}

/// Positions of the winning column for each distinct header name, in header order
pub fn distinct_columns(headers: &[String]) -> Vec<usize> {
    (0..headers.len())
        .filter(|&i| column_index(headers, &headers[i]) == Some(i))
        .collect()
}

/// Pick a column by priority keyword list
///
/// Scans the keywords in order for an exact case-insensitive header match,
/// then scans them again for a header containing the keyword.
pub fn pick_column<'a>(headers: &'a [String], keywords: &[String]) -> Option<&'a str> {
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();

    let exact = keywords.iter().find_map(|k| {
        let k = k.to_lowercase();
        lowered.iter().position(|h| *h == k)
    });
    let position = exact.or_else(|| {
        keywords.iter().find_map(|k| {
            let k = k.to_lowercase();
            lowered.iter().position(|h| h.contains(&k))
        })
    });

    position.map(|i| headers[i].as_str())
}

//! Text formatting helpers for console output and reports.

/// Formats a number with thousand separators: `1234567` → `"1,234,567"`.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Like [`format_number`] with an explicit sign: `-1234` → `"-1,234"`, `5` → `"+5"`.
pub fn format_signed(n: i64) -> String {
    let sign = if n < 0 { '-' } else { '+' };
    format!("{}{}", sign, format_number(n.unsigned_abs()))
}

/// Rounds to the nearest integer and formats with separators.
pub fn format_rounded(x: f64) -> String {
    let r = x.round();
    if r < 0.0 {
        format!("-{}", format_number((-r) as u64))
    } else {
        format_number(r as u64)
    }
}

/// First `max` characters of `s`.
pub fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// `"time_off"` → `"Time Off"`.
pub fn title_case(s: &str) -> String {
    s.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

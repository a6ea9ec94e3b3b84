//! Canonical warehouse identifiers for sheet names and column headers.
//!
//! [`normalize`] is total and idempotent: any label (including a missing one) maps to a
//! non-empty identifier made of `[a-z0-9_]`, with no leading, trailing or repeated underscores
//! and no leading digit. [`disambiguate`] makes a list of normalized names unique.

use std::collections::{HashMap, HashSet};

/// Identifier used when a label is missing or has no alphanumeric characters.
pub const UNNAMED_FIELD: &str = "unnamed_field";

/// Prefix added to identifiers that would otherwise start with a digit.
pub const DIGIT_PREFIX: &str = "n_";

/// Normalize an arbitrary label into a warehouse-safe identifier.
///
/// ```
/// use sheet_warehouse::naming::normalize;
///
/// assert_eq!(normalize("Order ID"), "order_id");
/// assert_eq!(normalize("A--B__C"), "a_b_c");
/// assert_eq!(normalize("123abc"), "n_123abc");
/// assert_eq!(normalize(None), "unnamed_field");
/// ```
pub fn normalize<'a>(text: impl Into<Option<&'a str>>) -> String {
    let Some(text) = text.into() else {
        return UNNAMED_FIELD.to_string();
    };
    if text.trim().is_empty() {
        return UNNAMED_FIELD.to_string();
    }

    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            // Any run of other characters (underscores included) becomes one separator.
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }

    if out.is_empty() {
        return UNNAMED_FIELD.to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, DIGIT_PREFIX);
    }
    out
}

/// Make `names` unique by suffixing repeats with `_2`, `_3`, … in first-seen order.
///
/// The first occurrence of every name is kept unchanged. Generated names skip every name that
/// appears literally anywhere in the list, so `["a", "a", "a_2"]` becomes `["a", "a_3", "a_2"]`.
pub fn disambiguate<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut emitted: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(names.len());

    for name in names {
        if emitted.insert(name.clone()) {
            out.push(name);
            continue;
        }

        let mut n = next_suffix.get(&name).copied().unwrap_or(2);
        let candidate = loop {
            let candidate = format!("{name}_{n}");
            n += 1;
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        next_suffix.insert(name, n);
        taken.insert(candidate.clone());
        emitted.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// Normalize then disambiguate a list of optional labels.
pub fn normalize_all<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    disambiguate(labels.into_iter().map(|label| normalize(label)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_canonical(s: &str) -> bool {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            && !s.contains("__")
            && !s.starts_with('_')
            && !s.ends_with('_')
            && !s.starts_with(|c: char| c.is_ascii_digit())
    }

    #[test]
    fn known_labels() {
        assert_eq!(normalize(""), "unnamed_field");
        assert_eq!(normalize(None), "unnamed_field");
        assert_eq!(normalize("   \t"), "unnamed_field");
        assert_eq!(normalize("!!!"), "unnamed_field");
        assert_eq!(normalize("123abc"), "n_123abc");
        assert_eq!(normalize("Regional Manager"), "regional_manager");
        assert_eq!(normalize("Order ID"), "order_id");
        assert_eq!(normalize("A--B__C"), "a_b_c");
        assert_eq!(normalize("  Sub-Category "), "sub_category");
        assert_eq!(normalize("Profit (%)"), "profit");
        assert_eq!(normalize("_private_"), "private");
        assert_eq!(normalize("Ünïcode Näme"), "n_code_n_me");
    }

    #[test]
    fn output_is_canonical_and_idempotent() {
        let inputs = [
            "",
            " ",
            "Order Date",
            "Customer ID",
            "2024 Sales",
            "__x__",
            "Ship-Mode",
            "a..b,,c",
            "ÄÖÜ",
            "9",
            "Row ID",
            "tab\tseparated",
            "string_field_0",
            "n_123",
            "日本語",
        ];
        for input in inputs {
            let once = normalize(input);
            assert!(is_canonical(&once), "{input:?} -> {once:?}");
            assert_eq!(normalize(once.as_str()), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn duplicates_get_numeric_suffixes_in_first_seen_order() {
        assert_eq!(disambiguate(["region", "region"]), vec!["region", "region_2"]);
        assert_eq!(
            disambiguate(["a", "b", "a", "a", "b"]),
            vec!["a", "b", "a_2", "a_3", "b_2"]
        );
    }

    #[test]
    fn generated_suffix_skips_names_already_taken() {
        assert_eq!(
            disambiguate(["region_2", "region", "region"]),
            vec!["region_2", "region", "region_3"]
        );
    }

    #[test]
    fn later_literal_names_are_reserved() {
        assert_eq!(disambiguate(["a", "a", "a_2"]), vec!["a", "a_3", "a_2"]);
        assert_eq!(
            disambiguate(["region", "region", "region_2", "region_2"]),
            vec!["region", "region_3", "region_2", "region_2_2"]
        );
    }

    #[test]
    fn normalize_all_handles_missing_labels() {
        assert_eq!(
            normalize_all([Some("Region"), None, Some("Region"), Some("")]),
            vec!["region", "unnamed_field", "region_2", "unnamed_field_2"]
        );
    }
}

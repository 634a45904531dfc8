//! Name normalization and fuzzy matching of free-text place names.
//!
//! Reverse geocoders report names like `"Jalgaon District"` or
//! `"East Godavari"`, while the dataset keys are `"Jalgaon"` and
//! `"East Godavari"`. Both sides are reduced to a comparison key before
//! they are compared.

const DISTRICT_WORD: &[u8] = b"district";

/// Produces the comparison key for a place name.
///
/// Removes the standalone word "district" (any case), trims, lower-cases
/// and drops every character outside `[a-z0-9]`. Never fails; empty input
/// yields an empty key.
pub fn normalize_name(value: &str) -> String {
    strip_district_word(value)
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn strip_district_word(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = String::with_capacity(value.len());
    let mut copied = 0;
    let mut i = 0;

    while i + DISTRICT_WORD.len() <= bytes.len() {
        let end = i + DISTRICT_WORD.len();
        let starts_word = i == 0 || !is_word_byte(bytes[i - 1]);
        let ends_word = end == bytes.len() || !is_word_byte(bytes[end]);

        if starts_word && ends_word && bytes[i..end].eq_ignore_ascii_case(DISTRICT_WORD) {
            out.push_str(&value[copied..i]);
            copied = end;
            i = end;
        } else {
            i += 1;
        }
    }

    out.push_str(&value[copied..]);
    out
}

/// Picks the candidate that best matches `target`.
///
/// 1. Exact: the first candidate whose key equals the target's key.
/// 2. Loose: the first candidate whose key contains the target's key or is
///    contained in it.
///
/// Returns `None` when the candidate list is empty, the target normalizes
/// to nothing, or neither rule matches.
pub fn find_best_match<'a>(candidates: &[&'a str], target: &str) -> Option<&'a str> {
    if candidates.is_empty() {
        return None;
    }

    let target = normalize_name(target);
    if target.is_empty() {
        return None;
    }

    let keyed: Vec<(&'a str, String)> = candidates
        .iter()
        .map(|c| (*c, normalize_name(c)))
        .collect();

    if let Some((name, _)) = keyed.iter().find(|(_, key)| *key == target) {
        return Some(*name);
    }

    keyed
        .iter()
        .find(|(_, key)| key.contains(target.as_str()) || target.contains(key.as_str()))
        .map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_district_word() {
        assert_eq!(
            normalize_name("East Godavari District"),
            normalize_name("east godavari")
        );
        assert_eq!(normalize_name("Jalgaon District"), "jalgaon");
        assert_eq!(normalize_name("DISTRICT of Pune"), "ofpune");
    }

    #[test]
    fn test_normalize_keeps_embedded_district() {
        // Only the standalone word is removed.
        assert_eq!(normalize_name("Subdistrict"), "subdistrict");
        assert_eq!(normalize_name("district_9"), "district9");
    }

    #[test]
    fn test_normalize_punctuation_and_empty() {
        assert_eq!(normalize_name("  Rampura-Phul (Bathinda) "), "rampuraphulbathinda");
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("   "), "");
        assert_eq!(normalize_name("District"), "");
    }

    #[test]
    fn test_exact_match_beats_earlier_substring_match() {
        let candidates = ["Nalgonda Rural", "Nalgonda"];
        assert_eq!(find_best_match(&candidates, "nalgonda"), Some("Nalgonda"));
    }

    #[test]
    fn test_substring_match_either_direction() {
        let candidates = ["Pune", "Nashik"];
        assert_eq!(find_best_match(&candidates, "Pune City"), Some("Pune"));

        let candidates = ["Rampura Phul", "Bathinda"];
        assert_eq!(find_best_match(&candidates, "Rampura"), Some("Rampura Phul"));
    }

    #[test]
    fn test_first_loose_match_in_list_order() {
        let candidates = ["Jalgaon Rural", "Jalgaon East"];
        assert_eq!(find_best_match(&candidates, "Jalgaon"), Some("Jalgaon Rural"));
    }

    #[test]
    fn test_empty_inputs_yield_none() {
        assert_eq!(find_best_match(&[], "Pune"), None);
        assert_eq!(find_best_match(&["Pune"], ""), None);
        assert_eq!(find_best_match(&["Pune"], "  -- "), None);
        assert_eq!(find_best_match(&["Pune"], "District"), None);
    }

    #[test]
    fn test_blank_candidate_matches_loosely() {
        // "" is contained in every key
        assert_eq!(find_best_match(&["--", "Pune"], "Guntur"), Some("--"));
        assert_eq!(find_best_match(&["--", "Pune"], "Pune"), Some("Pune"));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(find_best_match(&["Pune", "Nashik"], "Guntur"), None);
    }
}

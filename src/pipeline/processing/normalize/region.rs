//! Fuzzy correction of free-text region names against the fixed gazetteer.

use std::collections::BTreeSet;

use crate::constants::{REGION_MATCH_THRESHOLD, UNKNOWN, VALID_REGIONS};
use crate::domain::Value;

/// Best gazetteer candidate for an input, with its token-set score (0-100).
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMatch {
    pub region: &'static str,
    pub score: f64,
}

impl RegionMatch {
    pub fn is_accepted(&self) -> bool {
        self.score >= REGION_MATCH_THRESHOLD
    }
}

/// Length of the longest common character subsequence.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diagonal = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb { diagonal + 1 } else { above.max(row[j]) };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Insert/delete similarity on a 0-100 scale: `2 * lcs / (len_a + len_b)`.
/// Substitutions cost two edits, so near-threshold typos score lower than
/// under Levenshtein.
pub fn indel_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(&a, &b) as f64 / total as f64
}

/// Whole-string closeness used only to break equal token-set scores.
fn closeness(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Token-set similarity on a 0-100 scale.
///
/// Both inputs are lower-cased and split into whitespace token sets. When the
/// shared tokens fully cover either side the score is 100; otherwise the best
/// [`indel_ratio`] between the shared tokens and each side's sorted token
/// string.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let lower_a = a.to_lowercase();
    let lower_b = b.to_lowercase();
    let tokens_a: BTreeSet<&str> = lower_a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = lower_b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let sect: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !sect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let sect = sect.join(" ");
    let join = |diff: &[&str]| {
        if sect.is_empty() {
            diff.join(" ")
        } else {
            format!("{sect} {}", diff.join(" "))
        }
    };
    let combined_ab = join(&diff_ab);
    let combined_ba = join(&diff_ba);

    let mut best = indel_ratio(&combined_ab, &combined_ba);
    if !sect.is_empty() {
        best = best
            .max(indel_ratio(&sect, &combined_ab))
            .max(indel_ratio(&sect, &combined_ba));
    }
    best
}

/// Highest-scoring gazetteer entry for `input`.
///
/// Equal token-set scores are broken by whole-string similarity, then by
/// gazetteer order, so `"Ahafo Region"` stays itself rather than matching
/// `"Brong Ahafo Region"`.
pub fn best_region(input: &str) -> RegionMatch {
    let lower = input.trim().to_lowercase();
    let mut best: Option<(RegionMatch, f64)> = None;

    for region in VALID_REGIONS {
        let score = token_set_ratio(input, region);
        let tie_break = closeness(&lower, &region.to_lowercase());
        let better = match &best {
            None => true,
            Some((current, current_tie_break)) => {
                score > current.score || (score == current.score && tie_break > *current_tie_break)
            }
        };
        if better {
            best = Some((RegionMatch { region, score }, tie_break));
        }
    }

    best.map(|(m, _)| m).unwrap_or(RegionMatch {
        region: VALID_REGIONS[0],
        score: 0.0,
    })
}

/// Region cell transform: the accepted gazetteer entry, otherwise `Unknown`.
pub fn correct_region(value: &Value) -> Value {
    let Some(text) = value.to_text() else {
        return Value::text(UNKNOWN);
    };
    let matched = best_region(&text);
    if matched.is_accepted() {
        Value::text(matched.region)
    } else {
        Value::text(UNKNOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_set_ratio_subset_scores_full() {
        assert_eq!(token_set_ratio("Ashanti", "Ashanti Region"), 100.0);
        assert_eq!(token_set_ratio("greater ACCRA", "Greater Accra Region"), 100.0);
        assert_eq!(token_set_ratio("", "Oti Region"), 0.0);
    }

    #[test]
    fn test_indel_ratio_counts_substitution_as_two_edits() {
        assert_eq!(indel_ratio("abc", "abc"), 100.0);
        assert_eq!(indel_ratio("", ""), 100.0);
        assert_eq!(indel_ratio("abc", "xyz"), 0.0);
        // One substitution: lcs 3 of 4 + 4 characters.
        assert_eq!(indel_ratio("abcd", "abxd"), 75.0);
        assert!((indel_ratio("regoin", "region") - 200.0 * 5.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_token_set_ratio_uses_indel_on_remainders() {
        // "volta regoin" vs "volta region": lcs 11 over 24 characters.
        let expected = 200.0 * 11.0 / 24.0;
        assert!((token_set_ratio("Volta Regoin", "Volta Region") - expected).abs() < 1e-9);
    }

    #[test]
    fn test_correct_region_known_and_unknown() {
        assert_eq!(correct_region(&Value::text("Ashanti")), Value::text("Ashanti Region"));
        assert_eq!(correct_region(&Value::text("Mars Region")), Value::text(UNKNOWN));
        assert_eq!(correct_region(&Value::Null), Value::text(UNKNOWN));
    }

    #[test]
    fn test_correct_region_prefers_closest_on_tie() {
        assert_eq!(correct_region(&Value::text("Ahafo Region")), Value::text("Ahafo Region"));
        assert_eq!(correct_region(&Value::text("Western North Region")), Value::text("Western North Region"));
        assert_eq!(correct_region(&Value::text("Western")), Value::text("Western Region"));
    }

    #[test]
    fn test_correct_region_is_idempotent_over_gazetteer() {
        for region in VALID_REGIONS {
            assert_eq!(correct_region(&Value::text(region)), Value::text(region));
        }
        assert_eq!(correct_region(&Value::text(UNKNOWN)), Value::text(UNKNOWN));
    }

    #[test]
    fn test_correct_region_tolerates_typos() {
        assert_eq!(correct_region(&Value::text("Volta Regoin")).as_text(), Some("Volta Region"));
    }
}

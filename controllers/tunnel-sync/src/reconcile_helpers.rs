//! Helper functions shared by the reconcilers
//!
//! Hostname normalization, zone matching and tag-set handling.

use std::collections::HashSet;

/// Lower-case and strip surrounding whitespace and a trailing dot.
pub fn normalize_hostname(hostname: &str) -> String {
    hostname.trim().trim_end_matches('.').to_lowercase()
}

/// `true` when `hostname` is `zone` itself or a subdomain of it.
///
/// Both arguments must already be normalized.
pub fn hostname_in_zone(hostname: &str, zone: &str) -> bool {
    if zone.is_empty() {
        return false;
    }
    hostname == zone
        || hostname
            .strip_suffix(zone)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Order zones so the most specific (longest name) comes first.
///
/// Ties are broken by name so the order is stable.
pub fn sort_zones_by_specificity<T, F>(zones: &mut [T], name: F)
where
    F: Fn(&T) -> &str,
{
    zones.sort_by(|a, b| {
        let (a, b) = (name(a), name(b));
        b.len().cmp(&a.len()).then_with(|| a.cmp(b))
    });
}

/// Trim, drop blanks and drop duplicates, keeping first-seen order.
pub fn dedupe_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().to_string())
        .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
        .collect()
}

pub fn has_tag(tags: &[String], tag: &str) -> bool {
    tags.iter().any(|t| t.trim() == tag)
}

/// Set equality, ignoring order and duplicates.
pub fn string_sets_equal(left: &[String], right: &[String]) -> bool {
    let left: HashSet<&str> = left.iter().map(String::as_str).collect();
    let right: HashSet<&str> = right.iter().map(String::as_str).collect();
    left == right
}

/// Multiset equality of already-normalized strings.
pub fn multisets_equal(mut left: Vec<String>, mut right: Vec<String>) -> bool {
    left.sort();
    right.sort();
    left == right
}

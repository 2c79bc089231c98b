//! Unit tests for reconcile_helpers module

#[cfg(test)]
mod tests {
    use crate::reconcile_helpers::*;

    #[test]
    fn test_normalize_hostname() {
        assert_eq!(normalize_hostname(" App.Example.COM. "), "app.example.com");
        assert_eq!(normalize_hostname("example.com"), "example.com");
    }

    #[test]
    fn test_hostname_in_zone() {
        assert!(hostname_in_zone("example.com", "example.com"));
        assert!(hostname_in_zone("a.b.example.com", "example.com"));
        assert!(!hostname_in_zone("badexample.com", "example.com"));
        assert!(!hostname_in_zone("example.com", "a.example.com"));
        assert!(!hostname_in_zone("example.com", ""));
    }

    #[test]
    fn test_zones_sorted_longest_first() {
        let mut zones = vec!["example.com", "api.example.com", "b.io", "a.io"];
        sort_zones_by_specificity(&mut zones, |z| *z);
        assert_eq!(zones, vec!["api.example.com", "example.com", "a.io", "b.io"]);
    }

    #[test]
    fn test_dedupe_tags_keeps_first_occurrence() {
        let tags = dedupe_tags([" team ", "ops", "", "team", "ops "]);
        assert_eq!(tags, vec!["team".to_string(), "ops".to_string()]);
    }

    #[test]
    fn test_tag_helpers() {
        let tags = vec!["managed-by=x".to_string(), "team".to_string()];
        assert!(has_tag(&tags, "managed-by=x"));
        assert!(!has_tag(&tags, "managed-by=y"));

        let reordered = vec!["team".to_string(), "managed-by=x".to_string()];
        assert!(string_sets_equal(&tags, &reordered));
        assert!(!string_sets_equal(&tags, &["team".to_string()]));
    }

    #[test]
    fn test_multisets_equal_counts_duplicates() {
        let a = vec!["email:a".to_string(), "ip:1".to_string()];
        let b = vec!["ip:1".to_string(), "email:a".to_string()];
        assert!(multisets_equal(a.clone(), b));
        assert!(!multisets_equal(a, vec!["email:a".to_string(), "email:a".to_string(), "ip:1".to_string()]));
    }
}

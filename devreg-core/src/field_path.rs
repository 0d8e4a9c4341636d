//! Dot-separated field paths and field-mask helpers.
//!
//! Paths are compared component by component: `session` is a prefix of
//! `session.keys` but not of `session_id`.

/// `true` when `path` equals `prefix` or lies below it.
pub fn has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

/// `true` when `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len() && has_prefix(path, ancestor)
}

/// Drop every path that equals or lies below one of `excluded`.
pub fn exclude_fields<P: AsRef<str>>(paths: &[String], excluded: &[P]) -> Vec<String> {
    paths
        .iter()
        .filter(|p| !excluded.iter().any(|e| has_prefix(p, e.as_ref())))
        .cloned()
        .collect()
}

/// Append `extra` paths that are not already present, keeping the result
/// sorted and deduplicated.
pub fn add_fields<P: AsRef<str>>(paths: &[String], extra: &[P]) -> Vec<String> {
    let mut out: Vec<String> = paths.to_vec();
    out.extend(extra.iter().map(|p| p.as_ref().to_string()));
    sort_dedup(&mut out);
    out
}

pub fn sort_dedup(paths: &mut Vec<String>) {
    paths.sort();
    paths.dedup();
}

pub fn to_paths<P: AsRef<str>>(paths: &[P]) -> Vec<String> {
    paths.iter().map(|p| p.as_ref().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_structural() {
        assert!(has_prefix("session.keys", "session"));
        assert!(has_prefix("session", "session"));
        assert!(!has_prefix("session_id", "session"));
        assert!(!has_prefix("sess", "session"));
    }

    #[test]
    fn descendant_excludes_self() {
        assert!(is_descendant("a.b", "a"));
        assert!(!is_descendant("a", "a"));
    }

    #[test]
    fn exclude_removes_subtrees() {
        let paths = to_paths(&["session.dev_addr", "session_note", "name"]);
        assert_eq!(
            exclude_fields(&paths, &["session"]),
            vec!["session_note".to_string(), "name".to_string()]
        );
    }

    #[test]
    fn add_fields_sorts_and_dedups() {
        let paths = to_paths(&["name", "ids"]);
        assert_eq!(add_fields(&paths, &["ids"]), to_paths(&["ids", "name"]));
    }
}

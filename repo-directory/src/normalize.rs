//! Canonical comparison keys for Git remote URLs.
//!
//! GitLab reports a project's `web_url` (`https://host/group/project`) while
//! Crucible stores whatever clone URL the repository was registered with
//! (`git@host:group/project.git`, `ssh://git@alt-host:443/group/project`, ...).
//! [`normalize`] maps all of these spellings onto `host/group/project` so the
//! two sides can be compared with plain string equality.

const STRIPPED_PREFIXES: [&str; 4] = ["http://", "https://", "ssh://", "git@"];

/// Normalizes a Git remote URL into an opaque comparison key.
///
/// `host_aliases` lists equivalent host names with the canonical one first;
/// every later alias is replaced by the canonical host wherever it occurs.
/// Fewer than two entries disables aliasing.
///
/// Never fails: empty input yields an empty key and malformed input is
/// normalized best-effort. A second pass is a no-op unless the path holds a
/// further ':' or a doubled ".git" suffix.
pub fn normalize<S: AsRef<str>>(raw_url: &str, host_aliases: &[S]) -> String {
    let mut url = raw_url;
    for prefix in STRIPPED_PREFIXES {
        url = url.strip_prefix(prefix).unwrap_or(url);
    }

    let mut url = url.to_string();
    if let Some((canonical, aliases)) = host_aliases.split_first() {
        let canonical = canonical.as_ref();
        for alias in aliases {
            let alias = alias.as_ref();
            if !alias.is_empty() {
                url = url.replace(alias, canonical);
            }
        }
    }

    if let Some(stripped) = url.strip_suffix(".git") {
        url.truncate(stripped.len());
    }

    url.replacen(':', "/", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_ALIASES: [&str; 0] = [];

    #[test]
    fn test_normalize_table() {
        let cases: [(&str, &[&str], &str); 9] = [
            ("http://example.com/jsmith/example", &[], "example.com/jsmith/example"),
            ("https://example.com/jsmith/example", &[], "example.com/jsmith/example"),
            ("git@example.com:jsmith/example.git", &[], "example.com/jsmith/example"),
            ("", &[], ""),
            (
                "http://example.org/jsmith/example",
                &["example.com", "example.org"],
                "example.com/jsmith/example"
            ),
            (
                "http://example.com/jsmith/example",
                &["example.com", "example.org"],
                "example.com/jsmith/example"
            ),
            (
                "ssh://git@altssh.example.com:443/jsmith/example",
                &["example.com", "altssh.example.com:443"],
                "example.com/jsmith/example"
            ),
            ("ssh://git@example.com/jsmith/example.git", &[], "example.com/jsmith/example"),
            ("example.com/jsmith/example", &[], "example.com/jsmith/example")
        ];

        for (input, aliases, expected) in cases {
            assert_eq!(
                normalize(input, aliases),
                expected,
                "normalize({input:?}, {aliases:?})"
            );
        }
    }

    #[test]
    fn test_single_alias_is_not_applied() {
        assert_eq!(
            normalize("https://example.org/jsmith/example", &["example.com"]),
            "example.org/jsmith/example"
        );
    }

    #[test]
    fn test_only_first_colon_is_replaced() {
        assert_eq!(
            normalize("git@example.com:group/weird:name.git", &NO_ALIASES),
            "example.com/group/weird:name"
        );
    }

    #[test]
    fn test_git_suffix_stripped_once() {
        assert_eq!(
            normalize("https://example.com/jsmith/example.git.git", &NO_ALIASES),
            "example.com/jsmith/example.git"
        );
    }

    #[test]
    fn test_port_without_alias_keeps_port_segment() {
        assert_eq!(
            normalize("ssh://git@altssh.example.com:443/jsmith/example", &NO_ALIASES),
            "altssh.example.com/443/jsmith/example"
        );
    }

    #[test]
    fn test_malformed_input_is_best_effort() {
        assert_eq!(normalize("git@", &NO_ALIASES), "");
        assert_eq!(normalize("https://", &NO_ALIASES), "");
        assert_eq!(normalize(":", &NO_ALIASES), "/");
        assert_eq!(normalize("not a url at all", &NO_ALIASES), "not a url at all");
    }

    // Holds for inputs with no ':' in the path after the host separator and
    // no doubled ".git" suffix; see test_second_pass_outside_idempotent_domain.
    #[test]
    fn test_normalize_is_idempotent() {
        let aliases = ["example.com", "example.org", "altssh.example.com:443"];
        let inputs = [
            "",
            "http://example.com/jsmith/example",
            "https://example.org/jsmith/example",
            "git@example.com:jsmith/example.git",
            "ssh://git@altssh.example.com:443/jsmith/example",
            "ssh://git@example.org/group/sub/project.git",
            "example.com/already/normal"
        ];

        for input in inputs {
            let once = normalize(input, &aliases);
            assert_eq!(normalize(&once, &aliases), once, "input {input:?}");

            let plain = normalize(input, &NO_ALIASES);
            assert_eq!(normalize(&plain, &NO_ALIASES), plain, "input {input:?}");
        }
    }

    #[test]
    fn test_second_pass_outside_idempotent_domain() {
        let once = normalize("git@example.com:group/weird:name.git", &NO_ALIASES);
        assert_eq!(once, "example.com/group/weird:name");
        assert_eq!(normalize(&once, &NO_ALIASES), "example.com/group/weird/name");

        let once = normalize("https://example.com/a/b.git.git", &NO_ALIASES);
        assert_eq!(once, "example.com/a/b.git");
        assert_eq!(normalize(&once, &NO_ALIASES), "example.com/a/b");
    }

    #[test]
    fn test_accepts_owned_alias_lists() {
        let aliases = vec!["example.com".to_string(), "example.org".to_string()];
        assert_eq!(
            normalize("git@example.org:jsmith/example.git", aliases.as_slice()),
            "example.com/jsmith/example"
        );
    }
}

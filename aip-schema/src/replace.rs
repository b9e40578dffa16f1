/// Word-boundary-aware matcher for a dotted field path.
///
/// An occurrence of the path inside a filter string only counts when it is
/// a whole word: the character before (if any) and the character after (if
/// any) must not be an identifier character or a dot. This keeps `user`
/// from matching inside `user.address` or `username`, and keeps `a.b`
/// from matching inside `a.b.c`.
///
/// Matching scans characters explicitly rather than compiling a regex; the
/// path is treated as a literal, dots included.
#[derive(Debug, Clone)]
pub struct ReplacementMatcher {
    path: String,
}

fn is_path_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.' || c == b'@'
}

impl ReplacementMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the path occurs as a word at byte offset `at` of `input`.
    fn matches_at(&self, input: &[u8], at: usize) -> bool {
        let needle = self.path.as_bytes();
        if at + needle.len() > input.len() || &input[at..at + needle.len()] != needle {
            return false;
        }
        if at > 0 && is_path_char(input[at - 1]) {
            return false;
        }
        match input.get(at + needle.len()) {
            Some(&next) => !is_path_char(next),
            None => true,
        }
    }

    /// Replace every word occurrence of the path with `replacement`.
    pub fn replace_all(&self, input: &str, replacement: &str) -> String {
        let bytes = input.as_bytes();
        let mut out = String::with_capacity(input.len());
        let mut i = 0;
        while i < bytes.len() {
            if self.matches_at(bytes, i) {
                out.push_str(replacement);
                i += self.path.len();
            } else {
                // Advance a full UTF-8 scalar to keep the output valid.
                let ch = input[i..].chars().next().unwrap();
                out.push(ch);
                i += ch.len_utf8();
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_whole_words_only() {
        let m = ReplacementMatcher::new("user");
        assert_eq!(m.replace_all("user = \"a\"", "user_id"), "user_id = \"a\"");
        assert_eq!(m.replace_all("username = \"a\"", "user_id"), "username = \"a\"");
        assert_eq!(m.replace_all("user.address = \"a\"", "user_id"), "user.address = \"a\"");
    }

    #[test]
    fn replaces_dotted_paths_as_words() {
        let m = ReplacementMatcher::new("a.b");
        assert_eq!(m.replace_all("a.b > 1", "col@b"), "col@b > 1");
        // a.b is a dotted prefix of a.b.c and must stay untouched there.
        assert_eq!(m.replace_all("a.b.c > 1", "col@b"), "a.b.c > 1");
        // strict suffix
        assert_eq!(m.replace_all("x.a.b > 1", "col@b"), "x.a.b > 1");
    }

    #[test]
    fn replaces_multiple_occurrences() {
        let m = ReplacementMatcher::new("id");
        assert_eq!(
            m.replace_all("id = \"x\" || id = \"y\"", "user_id"),
            "user_id = \"x\" || user_id = \"y\""
        );
    }

    #[test]
    fn does_not_rematch_inside_prior_replacements() {
        // After `nested.field2` became `JSONB(nested_col@field2)`, the
        // root path `nested` must not match inside `nested_col`.
        let m = ReplacementMatcher::new("nested");
        assert_eq!(
            m.replace_all("JSONB(nested_col@field2) > 3 && nested", "nested_col"),
            "JSONB(nested_col@field2) > 3 && nested_col"
        );
    }

    #[test]
    fn occurrence_at_string_boundaries() {
        let m = ReplacementMatcher::new("deleted");
        assert_eq!(m.replace_all("deleted", "is_deleted"), "is_deleted");
        assert_eq!(m.replace_all("NOT deleted", "is_deleted"), "NOT is_deleted");
    }
}

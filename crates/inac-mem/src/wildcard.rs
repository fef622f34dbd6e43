//! Glob-style matching with `*` and `?`.

/// Returns `true` if `text` matches `pattern` as a whole.
///
/// `*` matches any run of bytes (including none) and `?` matches exactly one
/// byte; every other byte matches itself. Matching is iterative: on a
/// mismatch after a `*`, the matcher returns to the last `*` and lets it
/// absorb one more byte, so no input can make it recurse.
///
/// ```
/// use inac_mem::wildcard_match;
///
/// assert!(wildcard_match("mississippi", "*sip*"));
/// assert!(wildcard_match("xy", "x?"));
/// assert!(!wildcard_match("xy", "x"));
/// ```
#[must_use]
pub fn wildcard_match(text: impl AsRef<[u8]>, pattern: impl AsRef<[u8]>) -> bool {
    let text = text.as_ref();
    let pattern = pattern.as_ref();

    let mut t = 0;
    let mut p = 0;
    // Pattern position after the last `*`, and the text position it resumes at.
    let mut bookmark: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(&b'*') => {
                while pattern.get(p) == Some(&b'*') {
                    p += 1;
                }
                if p == pattern.len() {
                    return true;
                }
                bookmark = Some((p, t));
            }
            Some(&b) if b == b'?' || b == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match bookmark {
                Some((resume_p, resume_t)) => {
                    p = resume_p;
                    t = resume_t + 1;
                    bookmark = Some((resume_p, t));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}

//! Glob patterns over cache keys.
//!
//! Only `*` is special: it matches any (possibly empty) run of characters.
//! Every other character, including regex and Redis glob metacharacters,
//! matches itself.

/// Wildcard marker recognised in key patterns.
pub const WILDCARD: char = '*';

/// Returns `true` if `key` contains the wildcard marker.
#[must_use]
pub fn has_wildcard(key: &str) -> bool {
    key.contains(WILDCARD)
}

/// A compiled key pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPattern {
    source: String,
    // Literal segments between wildcards. A pattern with no wildcard has one segment.
    segments: Vec<String>,
}

impl GlobPattern {
    /// Compiles a pattern string.
    #[must_use]
    pub fn compile(pattern: &str) -> Self {
        Self {
            source: pattern.to_string(),
            segments: pattern.split(WILDCARD).map(str::to_string).collect(),
        }
    }

    /// The pattern as it was written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns `true` if the pattern contains at least one wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.segments.len() > 1
    }

    /// Tests whether `key` matches the whole pattern.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        let (first, rest) = match self.segments.split_first() {
            Some(split) => split,
            None => return key.is_empty(),
        };

        if rest.is_empty() {
            return key == first;
        }

        let Some(mut remaining) = key.strip_prefix(first.as_str()) else {
            return false;
        };

        let (last, middle) = match rest.split_last() {
            Some(split) => split,
            None => return true,
        };

        for segment in middle {
            match remaining.find(segment.as_str()) {
                Some(pos) => remaining = &remaining[pos + segment.len()..],
                None => return false,
            }
        }

        remaining.len() >= last.len() && remaining.ends_with(last.as_str())
    }

    /// Renders the pattern for Redis `SCAN MATCH`, escaping every glob
    /// metacharacter other than `*`.
    #[must_use]
    pub fn to_redis_match(&self) -> String {
        let mut out = String::with_capacity(self.source.len() + 4);
        for ch in self.source.chars() {
            match ch {
                '?' | '[' | ']' | '\\' | '^' => {
                    out.push('\\');
                    out.push(ch);
                }
                _ => out.push(ch),
            }
        }
        out
    }
}

impl std::fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

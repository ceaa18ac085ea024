//! Which hosts are eligible for caching.

/// A list of hostname suffixes, matched on label boundaries.
///
/// An empty list matches every host. Otherwise a host matches when it equals
/// a configured suffix or is a sub-domain of one; matching ignores ASCII case,
/// leading dots on suffixes, and a trailing root dot.
///
/// # Examples
///
/// ```
/// use diskcache::cache::DomainFilter;
///
/// let filter = DomainFilter::new(["example.com"]);
/// assert!(filter.allows("example.com"));
/// assert!(filter.allows("api.example.com"));
/// assert!(!filter.allows("example.com.evil.com"));
/// assert!(!filter.allows("notexample.com"));
///
/// assert!(DomainFilter::default().allows("anything.test"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFilter {
    suffixes: Vec<String>,
}

impl DomainFilter {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = suffixes
            .into_iter()
            .map(|s| normalize(s.as_ref().trim_start_matches('.')))
            .filter(|s| !s.is_empty())
            .collect();
        Self { suffixes }
    }

    /// Returns `true` if responses for `host` may be cached.
    pub fn allows(&self, host: &str) -> bool {
        if self.suffixes.is_empty() {
            return true;
        }
        let host = normalize(host);
        self.suffixes.iter().any(|suffix| {
            host == *suffix
                || host
                    .strip_suffix(suffix.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }
}

fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

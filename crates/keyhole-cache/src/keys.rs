use keyhole_core::ShortCode;

/// Key layout of cache entries and lock leases in a shared key-value store.
///
/// The two prefixes must differ, otherwise a held lease would read back as
/// a cached URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    url_prefix: String,
    lock_prefix: String,
}

impl KeySpace {
    /// Uses `{namespace}url:` for entries and `{namespace}lock:` for leases.
    pub fn with_namespace(namespace: &str) -> Self {
        Self {
            url_prefix: format!("{namespace}url:"),
            lock_prefix: format!("{namespace}lock:"),
        }
    }

    pub fn url_key(&self, code: &ShortCode) -> String {
        format!("{}{}", self.url_prefix, code.as_str())
    }

    pub fn lock_key(&self, code: &ShortCode) -> String {
        format!("{}{}", self.lock_prefix, code.as_str())
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::with_namespace("kh:")
    }
}

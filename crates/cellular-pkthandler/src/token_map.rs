//! URC token map: sorted prefix to handler dispatch.
//!
//! A modem driver declares one [`TokenMap`] listing every URC token it
//! understands (`CEREG`, `QIURC`, `RDY`, ...) with the handler that parses
//! the rest of the line. Lookup is a binary search, so the entries must be
//! strictly ordered under [`compare_tokens`]; [`TokenMap::validate`] checks
//! this once before traffic starts and refuses unsorted or duplicated tables.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use tracing::error;

use crate::context::PacketHandler;
use crate::error::{PktError, PktResult};

/// Handler for one URC token, called with the context and the text after
/// the `:`.
pub type UrcHandler = Arc<dyn Fn(&PacketHandler, &str) + Send + Sync>;

/// Order two tokens.
///
/// The shared leading bytes decide first; when they are equal the shorter
/// token sorts first. Two tokens compare equal only when they are identical,
/// so `RDY` never matches `RD` or `RDYY`.
pub fn compare_tokens(a: &str, b: &str) -> Ordering {
    let shared = a.len().min(b.len());
    a.as_bytes()[..shared]
        .cmp(&b.as_bytes()[..shared])
        .then(a.len().cmp(&b.len()))
}

/// One token and its handler.
#[derive(Clone)]
pub struct TokenMapEntry {
    /// Token text without the leading character or the colon.
    pub token: String,
    /// Handler, or `None` for a token that is known but not implemented.
    pub handler: Option<UrcHandler>,
}

impl TokenMapEntry {
    /// Create an entry with a handler.
    pub fn new<F>(token: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&PacketHandler, &str) + Send + Sync + 'static,
    {
        TokenMapEntry {
            token: token.into(),
            handler: Some(Arc::new(handler)),
        }
    }

    /// Create an entry for a recognized token with no handler.
    pub fn unhandled(token: impl Into<String>) -> Self {
        TokenMapEntry {
            token: token.into(),
            handler: None,
        }
    }
}

impl fmt::Debug for TokenMapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenMapEntry")
            .field("token", &self.token)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Sorted table of URC tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenMap {
    entries: Vec<TokenMapEntry>,
}

impl TokenMap {
    /// Wrap entries in the order given.
    ///
    /// The order is not checked here; call [`TokenMap::validate`] before use.
    pub fn new(entries: Vec<TokenMapEntry>) -> Self {
        TokenMap { entries }
    }

    /// Build a map by sorting `entries` with [`compare_tokens`].
    ///
    /// For tables assembled at runtime. Duplicates are kept and still fail
    /// [`TokenMap::validate`].
    pub fn sorted(mut entries: Vec<TokenMapEntry>) -> Self {
        entries.sort_by(|a, b| compare_tokens(&a.token, &b.token));
        TokenMap { entries }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in table order.
    pub fn entries(&self) -> &[TokenMapEntry] {
        &self.entries
    }

    /// Find the entry whose token is exactly `token`.
    pub fn lookup(&self, token: &str) -> Option<&TokenMapEntry> {
        self.entries
            .binary_search_by(|entry| compare_tokens(&entry.token, token))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// Check that every adjacent pair is strictly ordered.
    ///
    /// Returns [`PktError::InvalidHandle`] for an empty table and
    /// [`PktError::BadParameter`] for the first pair that is out of order or
    /// duplicated.
    pub fn validate(&self) -> PktResult<()> {
        if self.entries.is_empty() {
            error!("URC token map is empty");
            return Err(PktError::InvalidHandle);
        }

        for (idx, pair) in self.entries.windows(2).enumerate() {
            if compare_tokens(&pair[0].token, &pair[1].token) != Ordering::Less {
                error!(
                    "URC token map is not sorted at index {}: {:?} must sort before {:?}",
                    idx, pair[0].token, pair[1].token
                );
                return Err(PktError::BadParameter);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(tokens: &[&str]) -> TokenMap {
        TokenMap::new(tokens.iter().map(|t| TokenMapEntry::unhandled(*t)).collect())
    }

    #[test]
    fn test_compare_tokens() {
        assert_eq!(compare_tokens("RDY", "RDY"), Ordering::Equal);
        assert_eq!(compare_tokens("RD", "RDY"), Ordering::Less);
        assert_eq!(compare_tokens("RDYY", "RDY"), Ordering::Greater);
        assert_eq!(compare_tokens("CEREG", "CREG"), Ordering::Less);
    }

    #[test]
    fn test_lookup_exact_tokens_only() {
        let map = map_of(&["CEREG", "CGREG", "CREG", "QIURC", "RDY"]);
        map.validate().unwrap();

        for entry in map.entries() {
            assert_eq!(map.lookup(&entry.token).unwrap().token, entry.token);
        }
        assert!(map.lookup("RD").is_none());
        assert!(map.lookup("RDYY").is_none());
        assert!(map.lookup("CERE").is_none());
        assert!(map.lookup("AAAA").is_none());
        assert!(map.lookup("ZZZZ").is_none());
    }

    #[test]
    fn test_validate_rejects_unsorted() {
        assert_eq!(map_of(&["RDY", "CEREG"]).validate(), Err(PktError::BadParameter));
        assert_eq!(map_of(&["CEREG", "RDY", "RDY"]).validate(), Err(PktError::BadParameter));
        assert_eq!(map_of(&["RDYY", "RDY"]).validate(), Err(PktError::BadParameter));
    }

    #[test]
    fn test_validate_empty() {
        assert_eq!(TokenMap::default().validate(), Err(PktError::InvalidHandle));
    }

    #[test]
    fn test_sorted() {
        let map = TokenMap::sorted(
            ["RDY", "CEREG", "QIURC", "CEREGX"]
                .iter()
                .map(|t| TokenMapEntry::unhandled(*t))
                .collect(),
        );
        let tokens: Vec<_> = map.entries().iter().map(|e| e.token.as_str()).collect();
        assert_eq!(tokens, vec!["CEREG", "CEREGX", "QIURC", "RDY"]);
        assert!(map.validate().is_ok());
    }
}

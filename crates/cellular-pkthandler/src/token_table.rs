//! Per-modem token tables.

use crate::token_map::TokenMap;

/// Final result codes that end a response successfully.
pub const DEFAULT_SUCCESS_TOKENS: &[&str] = &["OK", "CONNECT", "SEND OK", ">"];

/// Final result codes that end a response with an error.
pub const DEFAULT_ERROR_TOKENS: &[&str] = &[
    "ERROR",
    "BUSY",
    "NO CARRIER",
    "NO ANSWER",
    "NO DIALTONE",
    "ABORTED",
    "+CMS ERROR",
    "+CME ERROR",
    "SEND FAIL",
];

/// URCs that arrive without a `+TOKEN:` prefix.
pub const DEFAULT_URC_TOKENS_WITHOUT_PREFIX: &[&str] = &["RDY", "NORMAL POWER DOWN", "PSM POWER DOWN"];

fn owned(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

/// The token tables a modem driver hands to the packet handler.
#[derive(Debug, Clone)]
pub struct TokenTable {
    /// URC dispatch table.
    pub urc_map: TokenMap,
    /// Success result codes.
    pub success_tokens: Vec<String>,
    /// Error result codes.
    pub error_tokens: Vec<String>,
    /// Whole-line URCs without a prefix.
    pub urc_tokens_without_prefix: Vec<String>,
}

impl TokenTable {
    /// Create tables with the default result codes.
    pub fn new(urc_map: TokenMap) -> Self {
        TokenTable {
            urc_map,
            success_tokens: owned(DEFAULT_SUCCESS_TOKENS),
            error_tokens: owned(DEFAULT_ERROR_TOKENS),
            urc_tokens_without_prefix: owned(DEFAULT_URC_TOKENS_WITHOUT_PREFIX),
        }
    }

    /// Replace the success result codes.
    pub fn with_success_tokens(mut self, tokens: &[&str]) -> Self {
        self.success_tokens = owned(tokens);
        self
    }

    /// Replace the error result codes.
    pub fn with_error_tokens(mut self, tokens: &[&str]) -> Self {
        self.error_tokens = owned(tokens);
        self
    }

    /// Replace the prefix-less URC tokens.
    pub fn with_urc_tokens_without_prefix(mut self, tokens: &[&str]) -> Self {
        self.urc_tokens_without_prefix = owned(tokens);
        self
    }

    /// Whether `line` is exactly one of the prefix-less URC tokens.
    pub fn is_urc_without_prefix(&self, line: &str) -> bool {
        self.urc_tokens_without_prefix.iter().any(|t| t == line)
    }
}

impl Default for TokenTable {
    fn default() -> Self {
        Self::new(TokenMap::default())
    }
}

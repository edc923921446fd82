//! Unified encryption key input for the binlog and the SQL store.

// Layer 1: Standard library
use std::fmt;

/// An encryption key input: absent, a password run through a slow KDF,
/// or 32 raw key bytes used as-is.
#[derive(Clone, PartialEq, Eq)]
pub enum DbKey {
    /// No encryption.
    Empty,
    /// Password; the store derives the actual key with a salted KDF.
    Password(String),
    /// Raw 256-bit key used without derivation.
    RawKey([u8; 32]),
}

impl DbKey {
    /// No encryption.
    pub fn empty() -> Self {
        DbKey::Empty
    }

    /// Password-based key.
    pub fn password(password: impl Into<String>) -> Self {
        DbKey::Password(password.into())
    }

    /// Raw 256-bit key.
    pub fn raw_key(key: [u8; 32]) -> Self {
        DbKey::RawKey(key)
    }

    /// Check whether this key disables encryption.
    pub fn is_empty(&self) -> bool {
        matches!(self, DbKey::Empty)
    }
}

// Key material must never end up in logs.
impl fmt::Debug for DbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbKey::Empty => write!(f, "DbKey::Empty"),
            DbKey::Password(_) => write!(f, "DbKey::Password(<redacted>)"),
            DbKey::RawKey(_) => write!(f, "DbKey::RawKey(<redacted>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_empty() {
        assert!(DbKey::empty().is_empty());
        assert!(!DbKey::password("hunter2").is_empty());
        assert!(!DbKey::raw_key([7u8; 32]).is_empty());
    }

    #[test]
    fn test_debug_redacts_material() {
        let rendered = format!("{:?}", DbKey::password("hunter2"));
        assert!(!rendered.contains("hunter2"));
        let rendered = format!("{:?}", DbKey::raw_key([0x41; 32]));
        assert!(!rendered.contains('A'));
    }

    #[test]
    fn test_equality() {
        assert_eq!(DbKey::password("a"), DbKey::password("a"));
        assert_ne!(DbKey::password("a"), DbKey::password("b"));
        assert_ne!(DbKey::password("a"), DbKey::empty());
    }
}

//! API key selection.
//!
//! A run authenticates either with a single override key or with the key set
//! from the config file, rotated round-robin across every outbound call.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Produces the credential for the next search call.
#[derive(Debug)]
pub enum KeyProvider {
    /// Always the same key (`--api-key`).
    Static(String),
    /// Round-robin over the configured keys.
    Rotating {
        /// Non-empty keys in config order.
        keys: Vec<String>,
        /// Process-wide rotation cursor.
        cursor: AtomicUsize,
    },
}

impl KeyProvider {
    /// Creates a provider that always yields `key`.
    pub fn fixed(key: impl Into<String>) -> Self {
        Self::Static(key.into())
    }

    /// Creates a rotating provider, dropping blank keys.
    pub fn rotating<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys
            .into_iter()
            .map(Into::into)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self::Rotating {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Returns the next key.
    ///
    /// Each call on a rotating provider takes a unique slot of the rotation
    /// sequence, so `n * len` concurrent calls hand out every key exactly `n`
    /// times. An empty rotating set yields `""`.
    #[must_use]
    pub fn next_key(&self) -> &str {
        match self {
            Self::Static(key) => key,
            Self::Rotating { keys, cursor } => {
                if keys.is_empty() {
                    return "";
                }
                let slot = cursor.fetch_add(1, Ordering::Relaxed);
                &keys[slot % keys.len()]
            }
        }
    }

    /// Number of distinct keys available.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Static(_) => 1,
            Self::Rotating { keys, .. } => keys.len(),
        }
    }

    /// Returns true when no usable key is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Static(key) => key.is_empty(),
            Self::Rotating { keys, .. } => keys.is_empty(),
        }
    }
}

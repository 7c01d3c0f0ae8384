//! Secret values: storage keys, SAS tokens, connection strings.
//!
//! These are produced on demand and must never reach logs or rendered output
//! in plaintext. [`SensitiveString`] prints as [`REDACTED`] through `Display`,
//! `Debug` and `Serialize`. [`SecretRegistry`] collects every secret resolved
//! during a deployment so free text, such as a provider error message, can be
//! scrubbed before it is printed.

use std::collections::HashSet;
use std::fmt;

use parking_lot::RwLock;

/// Placeholder printed instead of a secret value.
pub const REDACTED: &str = "[REDACTED]";

/// A secret string. Only [`expose`](Self::expose) yields the value.
///
/// ```rust
/// use azstack::secrets::SensitiveString;
///
/// let key = SensitiveString::new("c2VjcmV0");
/// assert_eq!(format!("{}", key), "[REDACTED]");
/// assert_eq!(key.expose(), "c2VjcmV0");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct SensitiveString(String);

impl SensitiveString {
    /// Wraps a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plaintext, for values that have to leave the process (a request
    /// header, a connection string).
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Unwraps the plaintext.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveString({})", REDACTED)
    }
}

impl serde::Serialize for SensitiveString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> serde::Deserialize<'de> for SensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

/// Secret values seen by one deployment.
#[derive(Default)]
pub struct SecretRegistry {
    values: RwLock<HashSet<String>>,
}

impl SecretRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers a value. Empty strings are ignored.
    pub fn register(&self, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.values.write().insert(value);
        }
    }

    /// Whether `text` contains any registered value.
    pub fn contains_secret(&self, text: &str) -> bool {
        self.values.read().iter().any(|v| text.contains(v.as_str()))
    }

    /// Replaces every registered value in `text` with [`REDACTED`].
    pub fn redact(&self, text: &str) -> String {
        let values = self.values.read();

        // Longest first, so a key inside a connection string cannot leave a
        // partial value behind.
        let mut ordered: Vec<&String> = values.iter().collect();
        ordered.sort_by_key(|v| std::cmp::Reverse(v.len()));

        ordered
            .into_iter()
            .fold(text.to_string(), |text, value| text.replace(value.as_str(), REDACTED))
    }

    /// Number of registered values.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl fmt::Debug for SecretRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRegistry")
            .field("registered_values", &self.len())
            .finish()
    }
}

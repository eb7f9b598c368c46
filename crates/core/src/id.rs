// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! Typed entity identifiers.
//!
//! A Gridmill id renders as `{prefix}{suffix}`: a short type tag
//! ("job-", "wfl-", …) and a random suffix. Only the suffix is stored,
//! in a fixed inline buffer, so ids are `Copy` and cheap map keys; the
//! prefix belongs to the type and is re-attached on display,
//! serialization, and string comparison. Parsing tolerates a bare
//! suffix, so `"job-7f3k"` and `"7f3k"` name the same job.

/// Length of the random suffix in generated ids; also the storage
/// capacity for parsed ones.
pub const ID_SUFFIX_LEN: usize = 16;

/// Inline id suffix. At most [`ID_SUFFIX_LEN`] bytes, zero-padded.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdSuffix {
    len: u8,
    bytes: [u8; ID_SUFFIX_LEN],
}

impl IdSuffix {
    /// Fresh random suffix.
    pub fn random() -> Self {
        Self::new(&nanoid::nanoid!(ID_SUFFIX_LEN))
    }

    /// Store a parsed suffix. Input past the capacity is truncated at a
    /// character boundary; wire-facing paths length-check before this.
    pub fn new(s: &str) -> Self {
        let mut len = s.len().min(ID_SUFFIX_LEN);
        while len > 0 && !s.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0u8; ID_SUFFIX_LEN];
        bytes[..len].copy_from_slice(&s.as_bytes()[..len]);
        Self { len: len as u8, bytes }
    }

    pub fn as_str(&self) -> &str {
        // Construction truncates on character boundaries, so the active
        // bytes are always valid UTF-8.
        match std::str::from_utf8(&self.bytes[..self.len as usize]) {
            Ok(s) => s,
            Err(_) => unreachable!("IdSuffix constructed from non-UTF-8"),
        }
    }
}

impl std::fmt::Debug for IdSuffix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Define an entity id type with a fixed type prefix.
///
/// ```ignore
/// entity_id! {
///     /// Doc comment for the id type.
///     pub struct JobId("job-");
/// }
/// ```
///
/// Generated ids are `{prefix}{16-char random suffix}`. `from_string`
/// accepts the rendered form or a bare suffix; `Display` and serde always
/// emit the rendered form, and comparing against a `&str` expects it.
#[macro_export]
macro_rules! entity_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($crate::id::IdSuffix);

        impl $name {
            /// Type tag prepended to the rendered id.
            pub const PREFIX: &'static str = $prefix;

            /// Mint a fresh random id.
            pub fn new() -> Self {
                Self($crate::id::IdSuffix::random())
            }

            /// Parse an id; a missing type prefix is tolerated.
            pub fn from_string(id: impl AsRef<str>) -> Self {
                let raw = id.as_ref();
                let suffix = raw.strip_prefix(Self::PREFIX).unwrap_or(raw);
                Self($crate::id::IdSuffix::new(suffix))
            }

            /// The random part, without the type prefix.
            pub fn suffix(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", Self::PREFIX, self.0.as_str())
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:?}", self.to_string())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                match other.strip_prefix(Self::PREFIX) {
                    Some(suffix) => suffix == self.0.as_str(),
                    None => false,
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                let suffix = raw.strip_prefix(Self::PREFIX).unwrap_or(&raw);
                if suffix.len() > $crate::id::ID_SUFFIX_LEN {
                    return Err(serde::de::Error::custom(format!(
                        "id suffix exceeds {} bytes: {:?}",
                        $crate::id::ID_SUFFIX_LEN,
                        raw,
                    )));
                }
                Ok(Self($crate::id::IdSuffix::new(suffix)))
            }
        }
    };
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;

//! Instance tags: `key:value` annotations on package instances.

use std::fmt;

use super::pin::is_word;
use crate::PackageError;
use crate::Result;

/// Maximum total length of a tag, in bytes.
pub const MAX_TAG_LEN: usize = 400;

/// A validated `key:value` tag.
///
/// Can only be constructed through [`InstanceTag::parse`]. The key is a
/// lowercase word; the value is free-form and may itself contain `:`.
///
/// # Examples
///
/// ```
/// use pkgfs_core::InstanceTag;
///
/// let tag = InstanceTag::parse("git_revision:deadbeef")?;
/// assert_eq!(tag.key(), "git_revision");
/// assert_eq!(tag.value(), "deadbeef");
/// # Ok::<(), pkgfs_core::PackageError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceTag {
    raw: String,
    split: usize,
}

impl InstanceTag {
    /// Validates `tag` and wraps it.
    pub fn parse(tag: &str) -> Result<Self> {
        let split = check_tag(tag)?;
        Ok(Self {
            raw: tag.to_owned(),
            split,
        })
    }

    /// The part before the first `:`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.raw[..self.split]
    }

    /// Everything after the first `:`.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.raw[self.split + 1..]
    }

    /// The full `key:value` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for InstanceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Checks that `tag` is a `key:value` pair no longer than 400 bytes whose key
/// matches `[a-z0-9_-]+`.
///
/// # Errors
///
/// Returns `PackageError::InvalidTag`. Checks run in order: separator,
/// length, key.
///
/// # Examples
///
/// ```
/// use pkgfs_core::validate_instance_tag;
///
/// assert!(validate_instance_tag("os:linux").is_ok());
/// assert!(validate_instance_tag("OS:linux").is_err());
/// assert!(validate_instance_tag("nocolon").is_err());
/// ```
pub fn validate_instance_tag(tag: &str) -> Result<()> {
    check_tag(tag).map(|_| ())
}

/// Returns the byte offset of the separating `:`.
fn check_tag(tag: &str) -> Result<usize> {
    let invalid = |reason: &str| PackageError::InvalidTag {
        tag: tag.to_owned(),
        reason: reason.to_owned(),
    };

    let split = tag
        .find(':')
        .ok_or_else(|| invalid("not a key:value pair"))?;
    if tag.len() > MAX_TAG_LEN {
        return Err(invalid("tag is too long"));
    }
    if !is_word(&tag[..split]) {
        return Err(invalid("key should be a lowercase word"));
    }
    Ok(split)
}

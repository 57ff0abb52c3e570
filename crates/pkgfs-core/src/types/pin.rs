//! Package pin identity and name/instance-ID validation.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::PackageError;
use crate::Result;

/// Length of an instance ID: a hex-encoded SHA-1 digest.
pub const INSTANCE_ID_LEN: usize = 40;

/// Identifies one immutable instance of a package.
///
/// A `Pin` is plain data; [`Pin::validate`] decides whether both halves are
/// well formed. Serialized as `{"package": ..., "instance_id": ...}`.
///
/// # Examples
///
/// ```
/// use pkgfs_core::Pin;
///
/// let pin = Pin::new("infra/tools/cipd", "0123456789abcdef0123456789abcdef01234567");
/// assert!(pin.validate().is_ok());
/// assert_eq!(
///     pin.to_string(),
///     "infra/tools/cipd:0123456789abcdef0123456789abcdef01234567"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pin {
    /// Slash-separated package name, e.g. `infra/tools/cipd`.
    #[serde(rename = "package")]
    pub package_name: String,

    /// Content hash of the package instance.
    pub instance_id: String,
}

impl Pin {
    /// Creates a pin without validating it.
    pub fn new(package_name: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            instance_id: instance_id.into(),
        }
    }

    /// Validates the package name, then the instance ID.
    pub fn validate(&self) -> Result<()> {
        validate_pin(self)
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package_name, self.instance_id)
    }
}

/// Returns `true` for the characters allowed in a name segment or tag key:
/// `[a-z0-9_-]`.
pub(crate) const fn is_word_char(c: u8) -> bool {
    matches!(c, b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-')
}

/// Returns `true` if `s` is a non-empty run of `[a-z0-9_-]`.
pub(crate) fn is_word(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_word_char)
}

/// Checks that `name` looks like `word(/word)*`, each word matching
/// `[a-z0-9_-]+`.
///
/// # Errors
///
/// Returns `PackageError::InvalidName` for empty names, empty segments
/// (leading, trailing or doubled `/`) and any character outside the
/// grammar, uppercase letters included.
///
/// # Examples
///
/// ```
/// use pkgfs_core::validate_package_name;
///
/// assert!(validate_package_name("infra/tools/cipd").is_ok());
/// assert!(validate_package_name("/infra").is_err());
/// assert!(validate_package_name("Infra").is_err());
/// ```
pub fn validate_package_name(name: &str) -> Result<()> {
    if name.split('/').all(is_word) {
        Ok(())
    } else {
        Err(PackageError::InvalidName {
            name: name.to_owned(),
        })
    }
}

/// Checks that `id` is exactly 40 lowercase hexadecimal characters.
///
/// # Errors
///
/// Returns `PackageError::InvalidInstanceId` naming the wrong length or the
/// first offending character.
pub fn validate_instance_id(id: &str) -> Result<()> {
    if id.len() != INSTANCE_ID_LEN {
        return Err(PackageError::InvalidInstanceId {
            id: id.to_owned(),
            reason: format!("not {INSTANCE_ID_LEN} bytes"),
        });
    }
    if let Some(c) = id.chars().find(|c| !matches!(c, '0'..='9' | 'a'..='f')) {
        return Err(PackageError::InvalidInstanceId {
            id: id.to_owned(),
            reason: format!("wrong char {c:?}"),
        });
    }
    Ok(())
}

/// Validates both halves of a pin, package name first.
pub fn validate_pin(pin: &Pin) -> Result<()> {
    validate_package_name(&pin.package_name)?;
    validate_instance_id(&pin.instance_id)
}

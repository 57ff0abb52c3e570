//! Package identity and manifest entry types.
//!
//! - [`Pin`] names one immutable package instance.
//! - [`InstanceTag`] is a validated `key:value` annotation.
//! - [`Member`] is one file or symlink of a package, as a two-variant sum
//!   type so file-only and symlink-only fields never coexist.
//!
//! Validation is pure: no I/O, no state, same answer for the same input.

pub mod member;
pub mod pin;
pub mod tag;

pub use member::FileMember;
pub use member::Member;
pub use member::SymlinkMember;
pub use pin::Pin;
pub use pin::validate_instance_id;
pub use pin::validate_package_name;
pub use pin::validate_pin;
pub use tag::InstanceTag;
pub use tag::validate_instance_tag;

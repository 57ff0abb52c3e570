//! Path containment and symlink rules.
//!
//! Every decision about whether a path stays inside a root goes through
//! [`containment::is_subpath`], both at scan time and at extraction time.

pub mod containment;
pub mod symlink;

pub use containment::absolutize;
pub use containment::from_slash;
pub use containment::is_subpath;
pub use containment::normalize_lexically;
pub use containment::relative_to;
pub use containment::to_slash;
pub use symlink::sanitize_scanned_target;
pub use symlink::validate_staged_target;
pub use symlink::verify_parent_chain;

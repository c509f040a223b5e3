//! Fast hash set alias.
//!
//! Claimed paths and archive entry names are short strings hashed on every
//! event, so the workspace uses the Fx hash from `rustc-hash` instead of
//! SipHash. Keys are local filenames only.

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;

//! Functional units of the core.
//!
//! The cache models of the memory hierarchy and the prefetchers that feed them.

/// Set-associative cache model with replacement policies.
pub mod cache;

/// Hardware prefetcher implementations (next-line, stride).
pub mod prefetch;

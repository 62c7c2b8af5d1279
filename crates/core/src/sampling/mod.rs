//! Sampling gate: random sampling plus include/exclude name filters

pub mod patterns;
pub mod policy;

pub use patterns::{
    matches_excluded, matches_exclusive, qualified_name, NameFilter, ScopeFilters, ScopeKind,
};
pub use policy::{resolve_rate, should_sample, should_sample_with};

//! Exact and wildcard name matching for include/exclude lists
//!
//! Names look like `Admin::UsersController#index`: a *scope* optionally
//! followed by `#` and a *sub-scope*. Patterns follow the same shape and may
//! contain `*` wildcards.
//!
//! - A pattern containing `#` is matched against the full name and its `*`
//!   matches any run of characters, so `Admin::*#*` covers
//!   `Admin::Reports::X#index`.
//! - A pattern without `#` is matched against the scope part only and its
//!   `*` stops at the `:` namespace separator, so `Admin::*` covers
//!   `Admin::UsersController` (and all of its sub-scopes) but not
//!   `Admin::Reports::X`.
//!
//! Matching is anchored at both ends. Compiled patterns are kept in a small
//! process-wide LRU cache.

use std::num::NonZeroUsize;

use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::debug;
use vigil_domain::FilterSettings;

const SCOPE_SEPARATOR: char = '#';
const ANY: &str = ".*";
const ANY_WITHIN_NAMESPACE: &str = "[^:]*";

const PATTERN_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(512) {
    Some(size) => size,
    None => NonZeroUsize::MIN,
};

static PATTERN_CACHE: Lazy<Mutex<LruCache<String, Regex>>> =
    Lazy::new(|| Mutex::new(LruCache::new(PATTERN_CACHE_SIZE)));

fn translate_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let wildcard =
        if pattern.contains(SCOPE_SEPARATOR) { ANY } else { ANY_WITHIN_NAMESPACE };

    let body = pattern.split('*').map(regex::escape).collect::<Vec<_>>().join(wildcard);
    Regex::new(&format!("^(?:{body})$"))
}

/// Whether `name` matches `pattern`, compiling through the cache.
///
/// Errors only when the pattern cannot be compiled.
pub fn pattern_matches(name: &str, pattern: &str) -> Result<bool, regex::Error> {
    let subject = if pattern.contains(SCOPE_SEPARATOR) {
        name
    } else {
        name.split(SCOPE_SEPARATOR).next().unwrap_or(name)
    };

    if !pattern.contains('*') {
        return Ok(subject == pattern);
    }

    let mut cache = PATTERN_CACHE.lock();
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.is_match(subject));
    }

    let regex = translate_pattern(pattern)?;
    let matched = regex.is_match(subject);
    cache.put(pattern.to_string(), regex);
    Ok(matched)
}

/// True when any pattern matches `name`.
///
/// A pattern that fails to compile never excludes anything.
pub fn matches_excluded(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| match pattern_matches(name, pattern) {
        Ok(matched) => matched,
        Err(err) => {
            debug!(pattern = %pattern, error = %err, "Ignoring unusable exclusion pattern");
            false
        }
    })
}

/// True when `patterns` is empty or any pattern matches `name`.
///
/// A pattern that fails to compile counts as a match.
pub fn matches_exclusive(name: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }

    patterns.iter().any(|pattern| match pattern_matches(name, pattern) {
        Ok(matched) => matched,
        Err(err) => {
            debug!(
                pattern = %pattern,
                error = %err,
                "Treating unusable exclusive pattern as a match"
            );
            true
        }
    })
}

/// Joins a scope and optional sub-scope into a matchable name.
pub fn qualified_name(scope: &str, subscope: Option<&str>) -> String {
    match subscope {
        Some(sub) if !sub.is_empty() => format!("{scope}{SCOPE_SEPARATOR}{sub}"),
        _ => scope.to_string(),
    }
}

/// An exclusion list paired with an exclusive (allow-only) list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    excluded: Vec<String>,
    exclusive: Vec<String>,
}

impl NameFilter {
    pub fn new(excluded: Vec<String>, exclusive: Vec<String>) -> Self {
        Self { excluded, exclusive }
    }

    /// Exclusion is checked first and always wins.
    pub fn allows(&self, scope: &str, subscope: Option<&str>) -> bool {
        let name = qualified_name(scope, subscope);
        !matches_excluded(&name, &self.excluded) && matches_exclusive(&name, &self.exclusive)
    }

    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty() && self.exclusive.is_empty()
    }
}

/// Which family of work a scope belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Web request handled by a controller action
    Action,
    /// Background job
    Job,
}

/// Per-kind filters built from configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFilters {
    pub actions: NameFilter,
    pub jobs: NameFilter,
}

impl ScopeFilters {
    pub fn from_settings(settings: &FilterSettings) -> Self {
        Self {
            actions: NameFilter::new(
                settings.excluded_actions.clone(),
                settings.exclusive_actions.clone(),
            ),
            jobs: NameFilter::new(settings.excluded_jobs.clone(), settings.exclusive_jobs.clone()),
        }
    }

    pub fn for_kind(&self, kind: ScopeKind) -> &NameFilter {
        match kind {
            ScopeKind::Action => &self.actions,
            ScopeKind::Job => &self.jobs,
        }
    }

    pub fn allows(&self, kind: ScopeKind, scope: &str, subscope: Option<&str>) -> bool {
        self.for_kind(kind).allows(scope, subscope)
    }
}

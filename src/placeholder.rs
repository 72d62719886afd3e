//! `?` placeholder rewriting
//!
//! Oracle binds by position with `:1`, `:2`, ... . Connections opened with
//! `questionph=YES` accept `?` markers and rewrite them before execution.
//! The rewrite is textual: a `?` inside a string literal or comment is
//! rewritten too.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\?").unwrap());

/// Replace each `?` with `:1`, `:2`, ... from left to right.
///
/// Numbering starts at 1 on every call. Returns the input unchanged (and
/// unallocated) when it has no markers.
///
/// ```rust
/// use oracle_oci::placeholders;
///
/// assert_eq!(
///     placeholders("SELECT * FROM t WHERE a=? AND b=?"),
///     "SELECT * FROM t WHERE a=:1 AND b=:2"
/// );
/// ```
pub fn placeholders(sql: &str) -> Cow<'_, str> {
    let mut n = 0u32;
    PLACEHOLDER.replace_all(sql, |_: &Captures<'_>| {
        n += 1;
        format!(":{}", n)
    })
}

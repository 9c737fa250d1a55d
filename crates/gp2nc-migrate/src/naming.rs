//! Filename increment heuristics
//!
//! Google exports disambiguate clashing names with a parenthesised counter,
//! `IMG_0001(1).jpg`. These helpers decide whether a remote file with the
//! same content as a local one already carries an acceptable name, and find
//! a free name when it does not.

use std::future::Future;
use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

fn increment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\([\w\s]+\)").expect("valid increment regex"))
}

/// Whether `filename` carries a parenthesised increment such as `(1)`
pub fn contains_increment(filename: &str) -> bool {
    increment_pattern().is_match(filename)
}

/// `filename` with every parenthesised increment removed
pub fn strip_increment(filename: &str) -> String {
    increment_pattern().replace_all(filename, "").into_owned()
}

/// How a remote file with the same content as a local one should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateClass {
    /// Same name: nothing to do
    AlreadyUploaded,
    /// Keep the remote name: the local name is itself an exporter
    /// duplicate, the remote name was chosen by something other than the
    /// exporter, or the names only differ by an increment
    AcceptableDuplicate,
    /// The remote copy carries an unrelated exporter increment and should
    /// be renamed
    Rename,
}

/// Checks are applied in order, first match wins:
/// identical names, local increment, remote without increment, names equal
/// once increments are stripped. Anything left is renamed.
pub fn classify_duplicate(local: &str, remote: &str) -> DuplicateClass {
    if local == remote {
        DuplicateClass::AlreadyUploaded
    } else if contains_increment(local)
        || !contains_increment(remote)
        || strip_increment(local) == strip_increment(remote)
    {
        DuplicateClass::AcceptableDuplicate
    } else {
        DuplicateClass::Rename
    }
}

fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => (&filename[..idx], &filename[idx..]),
        _ => (filename, ""),
    }
}

/// The `n`th candidate name: the bare name, then `stem(n).ext`
pub fn candidate_name(filename: &str, n: u32) -> String {
    if n == 0 {
        return filename.to_string();
    }
    let (stem, extension) = split_extension(filename);
    format!("{stem}({n}){extension}")
}

/// First candidate name for which `exists` reports `false`
///
/// Gives up with `None` after `limit` candidates.
pub async fn find_available<F, Fut, E>(
    filename: &str,
    limit: u32,
    mut exists: F,
) -> Result<Option<String>, E>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    for n in 0..limit {
        let candidate = candidate_name(filename, n);
        if !exists(candidate.clone()).await? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// `filename` behind a fresh 8-character token, for unrelated name clashes
pub fn prefixed_name(filename: &str) -> String {
    format!("{}-{filename}", &Uuid::new_v4().to_string()[..8])
}

//! Reader selection.

use crate::{Error, Result};

/// Chooses one reader from the enumerated reader list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderSelector {
    /// Zero-based index into the enumerated readers.
    Index(isize),
    /// Exact reader name.
    Name(String),
}

impl ReaderSelector {
    fn select<'a>(&self, readers: &'a [String]) -> Result<&'a str> {
        match self {
            ReaderSelector::Index(index) => usize::try_from(*index)
                .ok()
                .and_then(|i| readers.get(i))
                .map(String::as_str)
                .ok_or_else(|| {
                    Error::ReaderSelection(format!(
                        "reader index out of range: {} (readers={})",
                        index,
                        readers.len()
                    ))
                }),
            ReaderSelector::Name(name) => {
                if name.is_empty() {
                    return Err(Error::ReaderSelection(
                        "reader name must not be empty".to_string(),
                    ));
                }
                readers
                    .iter()
                    .find(|r| *r == name)
                    .map(String::as_str)
                    .ok_or_else(|| {
                        Error::ReaderSelection(format!("reader name not found: {:?}", name))
                    })
            }
        }
    }
}

impl std::fmt::Display for ReaderSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderSelector::Index(i) => write!(f, "#{}", i),
            ReaderSelector::Name(name) => write!(f, "{:?}", name),
        }
    }
}

/// Resolves the reader to connect to.
///
/// No selector picks the first reader. More than one selector is rejected.
pub fn resolve_reader(readers: &[String], selectors: &[ReaderSelector]) -> Result<String> {
    match selectors {
        [] => readers.first().cloned().ok_or(Error::NoReaders),
        [selector] => selector.select(readers).map(str::to_string),
        _ => Err(Error::ReaderSelection(
            "at most one reader selector is accepted".to_string(),
        )),
    }
}

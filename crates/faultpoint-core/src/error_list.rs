//! Round-robin list of error codes for error-kind faults.

use crate::errno::Errno;
use crate::error::{FaultError, Result};
use crate::sync::lock;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    codes: Vec<Errno>,
    /// Index of the next code to hand out.
    cursor: usize,
}

/// Ordered error codes plus a selection cursor.
///
/// Duplicates are allowed and order is preserved.  Each [`next`] hands out
/// the code under the cursor and advances it modulo the list length.
///
/// [`next`]: ErrorList::next
#[derive(Debug, Default)]
pub struct ErrorList {
    inner: Mutex<Inner>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list such as `ENOSPC,-EAGAIN,5`.
    ///
    /// Blank input yields an empty list.  Empty items (`EIO,,EAGAIN`) are
    /// rejected.
    pub fn parse(text: &str) -> Result<Vec<Errno>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        text.split(',')
            .map(|token| {
                if token.trim().is_empty() {
                    return Err(FaultError::ParseErrors {
                        input: text.to_string(),
                        reason: "empty item".to_string(),
                    });
                }
                token.parse::<Errno>().map_err(|e| match e {
                    FaultError::ParseErrors { reason, .. } => FaultError::ParseErrors {
                        input: text.to_string(),
                        reason: format!("{reason} ({:?})", token.trim()),
                    },
                    other => other,
                })
            })
            .collect()
    }

    /// Replace the list from text.  On a parse error the old list stays.
    pub fn set(&self, text: &str) -> Result<()> {
        let codes = Self::parse(text)?;
        self.replace(codes);
        Ok(())
    }

    /// Replace the list and rewind the cursor.
    pub fn replace(&self, codes: Vec<Errno>) {
        let mut inner = lock(&self.inner);
        inner.codes = codes;
        inner.cursor = 0;
    }

    /// Select the next code, or `None` when the list is empty.
    pub fn next(&self) -> Option<Errno> {
        let mut inner = lock(&self.inner);
        let code = *inner.codes.get(inner.cursor)?;
        inner.cursor = (inner.cursor + 1) % inner.codes.len();
        Some(code)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn codes(&self) -> Vec<Errno> {
        lock(&self.inner).codes.clone()
    }

    /// Canonical rendering: negative codes, comma joined.
    pub fn render(&self) -> String {
        lock(&self.inner)
            .codes
            .iter()
            .map(Errno::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_is_canonical() {
        let list = ErrorList::new();
        list.set("ENOSPC,EAGAIN").unwrap();
        assert_eq!(list.render(), "-ENOSPC,-EAGAIN");

        list.set("5, -12 ,+EBUSY\n").unwrap();
        assert_eq!(list.render(), "-EIO,-ENOMEM,-EBUSY");
    }

    #[test]
    fn round_robin_wraps() {
        let list = ErrorList::new();
        list.set("ENOSPC,EAGAIN").unwrap();
        let picked: Vec<_> = (0..5).map(|_| list.next().unwrap()).collect();
        assert_eq!(
            picked,
            vec![
                Errno::ENOSPC,
                Errno::EAGAIN,
                Errno::ENOSPC,
                Errno::EAGAIN,
                Errno::ENOSPC
            ]
        );
    }

    #[test]
    fn duplicates_kept_in_order() {
        let list = ErrorList::new();
        list.set("EIO,EIO,EAGAIN").unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.render(), "-EIO,-EIO,-EAGAIN");
    }

    #[test]
    fn replace_resets_cursor() {
        let list = ErrorList::new();
        list.set("EIO,EAGAIN").unwrap();
        assert_eq!(list.next(), Some(Errno::EIO));
        list.set("ENOMEM,EBUSY").unwrap();
        assert_eq!(list.next(), Some(Errno::ENOMEM));
    }

    #[test]
    fn malformed_input_keeps_previous_list() {
        let list = ErrorList::new();
        list.set("EIO").unwrap();
        let err = list.set("EIO,,EAGAIN").unwrap_err();
        assert!(matches!(err, FaultError::ParseErrors { .. }));
        assert!(list.set("EIO,banana").is_err());
        assert_eq!(list.render(), "-EIO");
    }

    #[test]
    fn empty_list_selects_nothing() {
        let list = ErrorList::new();
        assert!(list.is_empty());
        assert_eq!(list.next(), None);
        list.set("EIO").unwrap();
        list.set("  ").unwrap();
        assert!(list.is_empty());
        assert_eq!(list.render(), "");
    }
}

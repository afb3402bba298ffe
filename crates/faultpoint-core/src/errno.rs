//! Error codes returned by error-kind faults.
//!
//! Codes are always stored in canonical negative-magnitude form (`-5` for
//! `EIO`), which is what kernel-style call sites expect to return.  Parsing
//! accepts either form and either spelling: `EIO`, `-EIO`, `5`, `-5`.

use crate::error::{FaultError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Linux errno values by name.  Aliases come after the canonical name so
/// reverse lookup picks the canonical spelling.
const ERRNO_NAMES: &[(&str, i32)] = &[
    ("EPERM", 1),
    ("ENOENT", 2),
    ("ESRCH", 3),
    ("EINTR", 4),
    ("EIO", 5),
    ("ENXIO", 6),
    ("E2BIG", 7),
    ("ENOEXEC", 8),
    ("EBADF", 9),
    ("ECHILD", 10),
    ("EAGAIN", 11),
    ("ENOMEM", 12),
    ("EACCES", 13),
    ("EFAULT", 14),
    ("ENOTBLK", 15),
    ("EBUSY", 16),
    ("EEXIST", 17),
    ("EXDEV", 18),
    ("ENODEV", 19),
    ("ENOTDIR", 20),
    ("EISDIR", 21),
    ("EINVAL", 22),
    ("ENFILE", 23),
    ("EMFILE", 24),
    ("ENOTTY", 25),
    ("ETXTBSY", 26),
    ("EFBIG", 27),
    ("ENOSPC", 28),
    ("ESPIPE", 29),
    ("EROFS", 30),
    ("EMLINK", 31),
    ("EPIPE", 32),
    ("EDOM", 33),
    ("ERANGE", 34),
    ("EDEADLK", 35),
    ("ENAMETOOLONG", 36),
    ("ENOLCK", 37),
    ("ENOSYS", 38),
    ("ENOTEMPTY", 39),
    ("ELOOP", 40),
    ("ENODATA", 61),
    ("ETIME", 62),
    ("EOVERFLOW", 75),
    ("EILSEQ", 84),
    ("ENOTSOCK", 88),
    ("EOPNOTSUPP", 95),
    ("EADDRINUSE", 98),
    ("ENETDOWN", 100),
    ("ENETUNREACH", 101),
    ("ECONNABORTED", 103),
    ("ECONNRESET", 104),
    ("ENOBUFS", 105),
    ("ETIMEDOUT", 110),
    ("ECONNREFUSED", 111),
    ("EHOSTUNREACH", 113),
    ("EALREADY", 114),
    ("EINPROGRESS", 115),
    ("ESTALE", 116),
    ("EDQUOT", 122),
    ("ECANCELED", 125),
    ("EWOULDBLOCK", 11),
    ("EDEADLOCK", 35),
];

/// An error code in canonical (negative) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Errno(i32);

impl Errno {
    pub const EIO: Errno = Errno(-5);
    pub const EAGAIN: Errno = Errno(-11);
    pub const ENOMEM: Errno = Errno(-12);
    pub const EBUSY: Errno = Errno(-16);
    pub const EINVAL: Errno = Errno(-22);
    pub const ENOSPC: Errno = Errno(-28);
    pub const ETIMEDOUT: Errno = Errno(-110);

    /// Normalize `code` to negative form.  Zero is not an error and
    /// `i32::MIN` has no positive magnitude, so both are rejected.
    pub fn new(code: i32) -> Option<Errno> {
        match code {
            0 | i32::MIN => None,
            c if c < 0 => Some(Errno(c)),
            c => Some(Errno(-c)),
        }
    }

    /// Look up a symbolic name such as `ENOSPC`.
    pub fn from_name(name: &str) -> Option<Errno> {
        ERRNO_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, value)| Errno(-value))
    }

    /// The raw (negative) code.
    pub fn code(self) -> i32 {
        self.0
    }

    /// Positive magnitude, as found in `errno`.
    pub fn magnitude(self) -> i32 {
        -self.0
    }

    /// Symbolic name, if this is a well-known errno.
    pub fn name(self) -> Option<&'static str> {
        let magnitude = self.magnitude();
        ERRNO_NAMES
            .iter()
            .find(|&&(_, value)| value == magnitude)
            .map(|&(name, _)| name)
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "-{name}"),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for Errno {
    type Err = FaultError;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        let invalid = |reason: &str| FaultError::ParseErrors {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let unsigned = token
            .strip_prefix('-')
            .or_else(|| token.strip_prefix('+'))
            .unwrap_or(token);
        if unsigned.is_empty() {
            return Err(invalid("empty error code"));
        }

        if unsigned.bytes().all(|b| b.is_ascii_digit()) {
            let magnitude: i32 = unsigned
                .parse()
                .map_err(|_| invalid("error code out of range"))?;
            return Errno::new(magnitude).ok_or_else(|| invalid("zero is not an error code"));
        }

        Errno::from_name(&unsigned.to_ascii_uppercase())
            .ok_or_else(|| invalid("unknown error name"))
    }
}

impl TryFrom<i32> for Errno {
    type Error = FaultError;

    fn try_from(code: i32) -> Result<Self> {
        Errno::new(code).ok_or_else(|| FaultError::ParseErrors {
            input: code.to_string(),
            reason: "not an error code".to_string(),
        })
    }
}

impl From<Errno> for i32 {
    fn from(errno: Errno) -> i32 {
        errno.0
    }
}

impl std::error::Error for Errno {}

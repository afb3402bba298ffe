//! Fault point identity: call-site metadata and stable addresses.
//!
//! # Addresses
//!
//! Each fault site has a 64-bit [`Address`] derived from its source
//! location with FNV-1a, so the same site gets the same address on every
//! run and the control surface can name points without symbol lookup.

use crate::error::{FaultError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ═══════════════════════════════════════════════════════════════════════
//  Address
// ═══════════════════════════════════════════════════════════════════════

/// Stable identifier of a fault point.
///
/// Serialized as its `0x` hex string, the same form the control commands
/// accept.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u64);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = FaultError;

    /// Hex, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FaultError::MalformedAddress(s.to_string()));
        }
        u64::from_str_radix(digits, 16)
            .map(Address)
            .map_err(|_| FaultError::MalformedAddress(s.to_string()))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

// ═══════════════════════════════════════════════════════════════════════
//  Sites
// ═══════════════════════════════════════════════════════════════════════

/// Which call shape a fault point is used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultClass {
    /// Fire-and-check: the caller inspects the returned error itself.
    Check,
    /// Guards an operation returning a raw integer status.
    Int,
    /// Guards an operation returning a `Result`.
    Result,
}

impl FaultClass {
    pub fn name(self) -> &'static str {
        match self {
            FaultClass::Check => "check",
            FaultClass::Int => "int",
            FaultClass::Result => "result",
        }
    }

    const fn tag(self) -> u8 {
        match self {
            FaultClass::Check => 0,
            FaultClass::Int => 1,
            FaultClass::Result => 2,
        }
    }
}

impl fmt::Display for FaultClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source location of a fault point.  Opaque to the engine; carried for
/// listings and log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FaultSite {
    pub class: FaultClass,
    /// Enclosing function, as a module path.
    pub function: &'static str,
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl FaultSite {
    pub const fn new(
        class: FaultClass,
        function: &'static str,
        file: &'static str,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            class,
            function,
            file,
            line,
            column,
        }
    }

    /// Stable address derived from the location and class.
    pub const fn address(&self) -> Address {
        let mut hash = fnv1a(FNV_OFFSET, self.file.as_bytes());
        hash = fnv1a(hash, &self.line.to_le_bytes());
        hash = fnv1a(hash, &self.column.to_le_bytes());
        hash = fnv1a(hash, self.function.as_bytes());
        hash = fnv1a(hash, &[self.class.tag()]);
        Address(hash)
    }
}

impl fmt::Display for FaultSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.function, self.file, self.line)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Macros
// ═══════════════════════════════════════════════════════════════════════

/// Describe the current source location as a [`FaultSite`].
///
/// ```
/// use faultpoint_core::{fault_site, FaultClass};
///
/// # fn main() {
/// let site = fault_site!(FaultClass::Int);
/// assert_eq!(site.class, FaultClass::Int);
/// assert!(site.function.ends_with("main"));
/// # }
/// ```
#[macro_export]
macro_rules! fault_site {
    () => {
        $crate::fault_site!($crate::FaultClass::Check)
    };
    ($class:expr) => {{
        fn __here() {}
        fn __name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = __name_of(__here);
        $crate::FaultSite::new(
            $class,
            name.strip_suffix("::__here").unwrap_or(name),
            file!(),
            line!(),
            column!(),
        )
    }};
}

/// Return early with the injected error if `point` fires.
///
/// The error is converted with `From<Errno>`.
///
/// ```
/// use faultpoint_core::{fault_return, fault_site, Errno, FaultInjector};
///
/// fn flush(point: &faultpoint_core::FaultPoint) -> Result<(), Errno> {
///     fault_return!(point);
///     Ok(())
/// }
///
/// let injector = FaultInjector::new(Default::default());
/// let point = injector.register(fault_site!()).unwrap();
/// assert!(flush(&point).is_ok());
/// ```
#[macro_export]
macro_rules! fault_return {
    ($point:expr) => {
        if let ::std::option::Option::Some(errno) = $point.check() {
            return ::std::result::Result::Err(::std::convert::From::from(errno));
        }
    };
}

/// Evaluate `op` unless `point` fires, in which case yield the negative
/// error code instead.
#[macro_export]
macro_rules! fault_call_int {
    ($point:expr, $op:expr) => {
        $point.call_int(|| $op)
    };
}

/// Evaluate `op` (a `Result`) unless `point` fires, in which case yield
/// `Err(errno.into())` instead.
#[macro_export]
macro_rules! fault_call_result {
    ($point:expr, $op:expr) => {
        $point.call_result(|| $op)
    };
}

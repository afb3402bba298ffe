//! Per-kind fault configuration and counters.
//!
//! A [`FaultConfig`] holds the tunables (`enabled`, `times`, `probability`,
//! `interval`, `task_filter`, plus the kind payload) and the statistics
//! (`hits`, `injected`) for one fault kind inside one group.  Every field is
//! an individual atomic: call sites read them without locking while the
//! control surface rewrites them.

use crate::errno::Errno;
use crate::error::{FaultError, Result};
use crate::error_list::ErrorList;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};

/// `times` value meaning "fire without limit".
pub const UNLIMITED: i64 = -1;

/// The three things a fault point can be made to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultKind {
    /// Sleep for `delay_us`, then continue normally.
    Delay,
    /// Return a code from the error list.
    Error,
    /// Abort the program.
    Panic,
}

impl FaultKind {
    /// All kinds, in evaluation order.
    pub const ALL: [FaultKind; 3] = [FaultKind::Delay, FaultKind::Error, FaultKind::Panic];

    pub fn name(self) -> &'static str {
        match self {
            FaultKind::Delay => "delay",
            FaultKind::Error => "error",
            FaultKind::Panic => "panic",
        }
    }

    /// Single-letter flag used in listings.
    pub fn flag(self) -> char {
        match self {
            FaultKind::Delay => 'D',
            FaultKind::Error => 'E',
            FaultKind::Panic => 'P',
        }
    }

    fn bit(self) -> u8 {
        match self {
            FaultKind::Delay => 0b001,
            FaultKind::Error => 0b010,
            FaultKind::Panic => 0b100,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FaultKind {
    type Err = FaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "delay" => Ok(FaultKind::Delay),
            "error" => Ok(FaultKind::Error),
            "panic" => Ok(FaultKind::Panic),
            other => Err(FaultError::UnknownAttribute(other.to_string())),
        }
    }
}

/// Set of enabled kinds, rendered as `DEP` with `-` for missing kinds.
/// Serializes to the same string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KindSet(u8);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);

    pub fn insert(&mut self, kind: FaultKind) {
        self.0 |= kind.bit();
    }

    pub fn contains(self, kind: FaultKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<FaultKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = FaultKind>>(iter: I) -> Self {
        let mut set = KindSet::EMPTY;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl fmt::Display for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in FaultKind::ALL {
            let c = if self.contains(kind) { kind.flag() } else { '-' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl FromStr for KindSet {
    type Err = FaultError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || FaultError::MalformedValue {
            attribute: "kinds".to_string(),
            input: s.to_string(),
        };
        let flags: Vec<char> = s.chars().collect();
        if flags.len() != FaultKind::ALL.len() {
            return Err(malformed());
        }
        let mut set = KindSet::EMPTY;
        for (kind, flag) in FaultKind::ALL.into_iter().zip(flags) {
            match flag {
                '-' => {}
                f if f == kind.flag() => set.insert(kind),
                _ => return Err(malformed()),
            }
        }
        Ok(set)
    }
}

impl Serialize for KindSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KindSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Kind-specific part of a config.
#[derive(Debug)]
enum Payload {
    Delay { delay_us: AtomicU32 },
    Error { errors: ErrorList },
    Panic,
}

/// Tunables and counters for one fault kind within one group.
#[derive(Debug)]
pub struct FaultConfig {
    kind: FaultKind,
    enabled: AtomicBool,
    hits: AtomicU64,
    injected: AtomicU64,
    times: AtomicI64,
    probability: AtomicU32,
    interval: AtomicU32,
    task_filter: AtomicBool,
    payload: Payload,
}

impl FaultConfig {
    /// A disabled config with default tunables: unlimited times,
    /// probability 100, interval 1, no task filter.
    pub fn new(kind: FaultKind) -> Self {
        let payload = match kind {
            FaultKind::Delay => Payload::Delay {
                delay_us: AtomicU32::new(0),
            },
            FaultKind::Error => Payload::Error {
                errors: ErrorList::new(),
            },
            FaultKind::Panic => Payload::Panic,
        };
        Self {
            kind,
            enabled: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            injected: AtomicU64::new(0),
            times: AtomicI64::new(UNLIMITED),
            probability: AtomicU32::new(100),
            interval: AtomicU32::new(1),
            task_filter: AtomicBool::new(false),
            payload,
        }
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Acquire)
    }

    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::Acquire)
    }

    pub fn times(&self) -> i64 {
        self.times.load(Ordering::Acquire)
    }

    pub fn probability(&self) -> u32 {
        self.probability.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> u32 {
        self.interval.load(Ordering::Acquire)
    }

    pub fn task_filter(&self) -> bool {
        self.task_filter.load(Ordering::Acquire)
    }

    /// Delay in microseconds; `None` for non-delay kinds.
    pub fn delay_us(&self) -> Option<u32> {
        match &self.payload {
            Payload::Delay { delay_us } => Some(delay_us.load(Ordering::Acquire)),
            _ => None,
        }
    }

    /// The error list; `None` for non-error kinds.
    pub fn errors(&self) -> Option<&ErrorList> {
        match &self.payload {
            Payload::Error { errors } => Some(errors),
            _ => None,
        }
    }

    // ── Writes ──────────────────────────────────────────────────

    /// Crate-private: member points must be re-armed alongside, which
    /// [`FaultInjector::set_enabled`](crate::FaultInjector::set_enabled)
    /// takes care of.
    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn set_times(&self, times: i64) -> Result<()> {
        if times == 0 || times < UNLIMITED {
            return Err(FaultError::InvalidTimes(times));
        }
        self.times.store(times, Ordering::Release);
        Ok(())
    }

    pub fn set_probability(&self, probability: u32) -> Result<()> {
        if !(1..=100).contains(&probability) {
            return Err(FaultError::ProbabilityOutOfRange(probability));
        }
        self.probability.store(probability, Ordering::Release);
        Ok(())
    }

    pub fn set_interval(&self, interval: u32) -> Result<()> {
        if interval == 0 {
            return Err(FaultError::ZeroInterval);
        }
        self.interval.store(interval, Ordering::Release);
        Ok(())
    }

    pub fn set_task_filter(&self, task_filter: bool) {
        self.task_filter.store(task_filter, Ordering::Release);
    }

    pub fn set_delay_us(&self, micros: u32) -> Result<()> {
        match &self.payload {
            Payload::Delay { delay_us } => {
                delay_us.store(micros, Ordering::Release);
                Ok(())
            }
            _ => Err(FaultError::UnsupportedAttribute {
                kind: self.kind,
                attribute: "delay_us",
            }),
        }
    }

    /// Replace the error list from text; the old list survives a parse
    /// error.
    pub fn set_errors(&self, text: &str) -> Result<()> {
        match &self.payload {
            Payload::Error { errors } => errors.set(text),
            _ => Err(FaultError::UnsupportedAttribute {
                kind: self.kind,
                attribute: "errors",
            }),
        }
    }

    // ── Decision ────────────────────────────────────────────────

    /// Count one invocation and decide whether this kind fires.
    ///
    /// `roll` is only called when the interval gate passed and the
    /// probability is below 100; it must return a value in `1..=100`.
    pub(crate) fn try_fire(&self, marked: bool, roll: impl FnOnce() -> u32) -> bool {
        if !self.is_enabled() {
            return false;
        }

        // One fetch_add per invocation: the returned slot is ours alone.
        let hit = self.hits.fetch_add(1, Ordering::AcqRel) + 1;

        if self.task_filter() && !marked {
            return false;
        }

        let interval = u64::from(self.interval().max(1));
        if hit % interval != 0 {
            return false;
        }

        let probability = self.probability();
        if probability < 100 && roll() > probability {
            return false;
        }

        if !self.consume_budget() {
            return false;
        }

        self.injected.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Take one firing from `times`.  Fails once the budget is exhausted.
    fn consume_budget(&self) -> bool {
        self.times
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |times| match times {
                0 => None,
                t if t < 0 => Some(t),
                t => Some(t - 1),
            })
            .is_ok()
    }

    /// Select the error to return after a firing.  Always `None` for an
    /// empty list.
    pub(crate) fn select_error(&self) -> Option<Errno> {
        self.errors().and_then(ErrorList::next)
    }

    /// Point-in-time copy of the config.
    pub fn stats(&self) -> FaultStats {
        // injected before hits, so the copy never shows injected > hits.
        let injected = self.injected();
        let hits = self.hits();
        FaultStats {
            kind: self.kind,
            enabled: self.is_enabled(),
            hits,
            injected,
            times: self.times(),
            probability: self.probability(),
            interval: self.interval(),
            task_filter: self.task_filter(),
            delay_us: self.delay_us(),
            errors: self.errors().map(ErrorList::render),
        }
    }
}

/// Snapshot of a [`FaultConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultStats {
    pub kind: FaultKind,
    pub enabled: bool,
    pub hits: u64,
    pub injected: u64,
    pub times: i64,
    pub probability: u32,
    pub interval: u32,
    pub task_filter: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_us: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always() -> u32 {
        1
    }

    fn enabled(kind: FaultKind) -> FaultConfig {
        let config = FaultConfig::new(kind);
        config.set_enabled(true);
        config
    }

    #[test]
    fn defaults() {
        let config = FaultConfig::new(FaultKind::Delay);
        assert!(!config.is_enabled());
        assert_eq!(config.times(), UNLIMITED);
        assert_eq!(config.probability(), 100);
        assert_eq!(config.interval(), 1);
        assert!(!config.task_filter());
        assert_eq!(config.delay_us(), Some(0));
        assert!(config.errors().is_none());
    }

    #[test]
    fn disabled_touches_nothing() {
        let config = FaultConfig::new(FaultKind::Panic);
        assert!(!config.try_fire(true, always));
        assert_eq!(config.hits(), 0);
        assert_eq!(config.injected(), 0);
    }

    #[test]
    fn rejects_invalid_values() {
        let config = FaultConfig::new(FaultKind::Error);
        assert_eq!(config.set_times(0), Err(FaultError::InvalidTimes(0)));
        assert_eq!(config.set_times(-2), Err(FaultError::InvalidTimes(-2)));
        assert_eq!(
            config.set_probability(0),
            Err(FaultError::ProbabilityOutOfRange(0))
        );
        assert_eq!(
            config.set_probability(101),
            Err(FaultError::ProbabilityOutOfRange(101))
        );
        assert_eq!(config.set_interval(0), Err(FaultError::ZeroInterval));
        // Failed writes leave the previous values.
        assert_eq!(config.times(), UNLIMITED);
        assert_eq!(config.probability(), 100);
        assert_eq!(config.interval(), 1);
    }

    #[test]
    fn payload_attributes_are_kind_specific() {
        let delay = FaultConfig::new(FaultKind::Delay);
        assert!(delay.set_errors("EIO").is_err());
        delay.set_delay_us(250).unwrap();
        assert_eq!(delay.delay_us(), Some(250));

        let error = FaultConfig::new(FaultKind::Error);
        assert_eq!(
            error.set_delay_us(1),
            Err(FaultError::UnsupportedAttribute {
                kind: FaultKind::Error,
                attribute: "delay_us"
            })
        );
        error.set_errors("EIO").unwrap();
        assert_eq!(error.stats().errors.as_deref(), Some("-EIO"));
    }

    #[test]
    fn times_budget_is_absolute() {
        let config = enabled(FaultKind::Panic);
        config.set_times(2).unwrap();
        let fired: Vec<bool> = (0..5).map(|_| config.try_fire(false, always)).collect();
        assert_eq!(fired, vec![true, true, false, false, false]);
        assert_eq!(config.times(), 0);
        assert_eq!(config.hits(), 5);
        assert_eq!(config.injected(), 2);

        config.set_times(1).unwrap();
        assert!(config.try_fire(false, always));
        assert!(!config.try_fire(false, always));
    }

    #[test]
    fn interval_fires_every_kth_hit() {
        let config = enabled(FaultKind::Delay);
        config.set_interval(3).unwrap();
        let fired: Vec<usize> = (1..=9)
            .filter(|_| config.try_fire(false, always))
            .collect();
        assert_eq!(fired.len(), 3);
        assert_eq!(config.hits(), 9);

        let config = enabled(FaultKind::Delay);
        config.set_interval(3).unwrap();
        let slots: Vec<bool> = (0..6).map(|_| config.try_fire(false, always)).collect();
        assert_eq!(slots, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn task_filter_requires_mark() {
        let config = enabled(FaultKind::Error);
        config.set_task_filter(true);
        assert!(!config.try_fire(false, always));
        assert!(config.try_fire(true, always));
        assert_eq!(config.hits(), 2);
        assert_eq!(config.injected(), 1);
    }

    #[test]
    fn probability_uses_roll() {
        let config = enabled(FaultKind::Error);
        config.set_probability(30).unwrap();
        assert!(config.try_fire(false, || 30));
        assert!(!config.try_fire(false, || 31));
        assert_eq!(config.injected(), 1);
    }

    #[test]
    fn full_probability_never_rolls() {
        let config = enabled(FaultKind::Error);
        assert!(config.try_fire(false, || unreachable!("no roll at 100%")));
    }

    #[test]
    fn kind_set_rendering() {
        let set: KindSet = [FaultKind::Delay, FaultKind::Panic].into_iter().collect();
        assert_eq!(set.to_string(), "D-P");
        assert_eq!(KindSet::EMPTY.to_string(), "---");
        assert!(KindSet::EMPTY.is_empty());
    }

    #[test]
    fn kind_set_serializes_as_flags() {
        let set: KindSet = [FaultKind::Error].into_iter().collect();
        let json = serde_json::to_value(set).unwrap();
        assert_eq!(json, serde_json::json!("-E-"));
        assert_eq!(serde_json::from_value::<KindSet>(json).unwrap(), set);
        assert_eq!("D-P".parse::<KindSet>().unwrap().to_string(), "D-P");
        for bad in ["", "DE", "E--", "DEPD", "d--"] {
            assert!(bad.parse::<KindSet>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn kind_parse() {
        assert_eq!("error".parse::<FaultKind>().unwrap(), FaultKind::Error);
        assert!("bogus".parse::<FaultKind>().is_err());
    }
}

//! How fired delays and panics are carried out.

use crate::site::FaultSite;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Executes the side effects of a fired fault.
///
/// The engine decides *whether* to delay or abort; the hooks decide *how*.
/// Tests swap in hooks that record instead of sleeping.
pub trait FaultHooks: Send + Sync {
    /// Suspend the calling thread for `micros` microseconds.
    fn delay(&self, micros: u32);

    /// Terminate the program on behalf of `site`.
    fn abort(&self, site: &FaultSite) -> !;
}

/// What a fired panic fault does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanicMode {
    /// `panic!`, which unwinds unless the binary is built with
    /// `panic = "abort"`.
    #[default]
    Unwind,
    /// `std::process::abort`, no unwinding.
    Abort,
}

/// Hooks backed by `std::thread::sleep` and `panic!`/`abort`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdHooks {
    pub panic_mode: PanicMode,
}

impl StdHooks {
    pub fn new(panic_mode: PanicMode) -> Self {
        Self { panic_mode }
    }
}

impl FaultHooks for StdHooks {
    fn delay(&self, micros: u32) {
        if micros > 0 {
            std::thread::sleep(Duration::from_micros(u64::from(micros)));
        }
    }

    fn abort(&self, site: &FaultSite) -> ! {
        match self.panic_mode {
            PanicMode::Unwind => panic!("injected panic fault at {site}"),
            PanicMode::Abort => std::process::abort(),
        }
    }
}

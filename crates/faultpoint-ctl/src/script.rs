//! Line-oriented control scripts.
//!
//! Each non-blank line that does not start with `#` is a control command
//! (see `faultpoint_core::control`), except `drive <n>`, which runs the demo
//! workload for `n` iterations.  A failing command is reported and the
//! script carries on.

use crate::demo::BlockStore;
use faultpoint_core::{FaultInjector, Response};
use log::warn;
use serde_json::json;
use std::io::{self, BufRead, Write};

/// Totals for one script run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptSummary {
    pub commands: usize,
    pub failures: usize,
}

pub struct ScriptRunner<'a> {
    injector: &'a FaultInjector,
    store: &'a BlockStore,
    json: bool,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(injector: &'a FaultInjector, store: &'a BlockStore, json: bool) -> Self {
        Self {
            injector,
            store,
            json,
        }
    }

    pub fn run(&self, input: impl BufRead, out: &mut impl Write) -> io::Result<ScriptSummary> {
        let mut summary = ScriptSummary::default();
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            summary.commands += 1;
            if !self.run_line(line, out)? {
                summary.failures += 1;
            }
        }
        Ok(summary)
    }

    /// Returns whether the command succeeded.
    fn run_line(&self, line: &str, out: &mut impl Write) -> io::Result<bool> {
        if let Some(count) = line.strip_prefix("drive") {
            let Ok(iterations) = count.trim().parse::<u64>() else {
                return self.fail(line, &format!("bad iteration count {:?}", count.trim()), out);
            };
            let outcome = self.store.drive(iterations);
            if self.json {
                writeln!(out, "{}", serde_json::to_string(&outcome)?)?;
            } else {
                writeln!(
                    out,
                    "drove {} iterations: {} ok, {} errors, {} panics",
                    outcome.iterations, outcome.ok, outcome.errors, outcome.panics
                )?;
            }
            return Ok(true);
        }

        match self.injector.execute(line) {
            Ok(response) => {
                self.print(&response, out)?;
                Ok(true)
            }
            Err(e) => self.fail(line, &e.to_string(), out),
        }
    }

    fn print(&self, response: &Response, out: &mut impl Write) -> io::Result<()> {
        if self.json {
            writeln!(out, "{}", serde_json::to_string(response)?)
        } else {
            let text = response.to_string();
            write!(out, "{text}")?;
            if !text.ends_with('\n') {
                writeln!(out)?;
            }
            Ok(())
        }
    }

    fn fail(&self, line: &str, message: &str, out: &mut impl Write) -> io::Result<bool> {
        warn!("command {line:?} failed: {message}");
        if self.json {
            writeln!(out, "{}", json!({ "command": line, "error": message }))?;
        } else {
            writeln!(out, "error: {message}")?;
        }
        Ok(false)
    }
}

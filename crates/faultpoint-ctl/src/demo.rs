//! A small instrumented block store to aim fault groups at.
//!
//! Three fault points, one per call shape:
//!
//! - `demo::read_block` (int): returns bytes read or a negative errno
//! - `demo::write_block` (check): returns early with the injected error
//! - `demo::alloc_buffer` (result): `Err(errno)` instead of a buffer

use faultpoint_core::{
    fault_call_int, fault_call_result, fault_return, Errno, FaultClass, FaultInjector, FaultPoint,
    FaultSite, Result,
};
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Once, PoisonError};

pub const BLOCK_SIZE: usize = 512;

pub const SITES: [FaultSite; 3] = [
    FaultSite::new(FaultClass::Int, "demo::read_block", file!(), line!(), column!()),
    FaultSite::new(FaultClass::Check, "demo::write_block", file!(), line!(), column!()),
    FaultSite::new(FaultClass::Result, "demo::alloc_buffer", file!(), line!(), column!()),
];

/// Replace the process panic hook with one that logs at debug level, so
/// injected panics caught by [`BlockStore::drive`] don't spam stderr.
/// Installed at most once per process.
pub fn quiet_panics() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        panic::set_hook(Box::new(|info| debug!("caught panic: {info}")));
    });
}

/// Outcome counts of one [`BlockStore::drive`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DriveSummary {
    pub iterations: u64,
    pub ok: u64,
    pub errors: u64,
    pub panics: u64,
}

/// In-memory block store whose operations go through fault points.
#[derive(Debug)]
pub struct BlockStore {
    read_point: Arc<FaultPoint>,
    write_point: Arc<FaultPoint>,
    alloc_point: Arc<FaultPoint>,
    blocks: Mutex<HashMap<u64, Vec<u8>>>,
}

impl BlockStore {
    /// Register the store's fault points with `injector`.
    pub fn new(injector: &FaultInjector) -> Result<Self> {
        Ok(Self {
            read_point: injector.register(SITES[0])?,
            write_point: injector.register(SITES[1])?,
            alloc_point: injector.register(SITES[2])?,
            blocks: Mutex::new(HashMap::new()),
        })
    }

    /// Bytes read, or a negative errno.
    pub fn read_block(&self, lba: u64, out: &mut [u8]) -> i32 {
        fault_call_int!(self.read_point, {
            let blocks = self.blocks.lock().unwrap_or_else(PoisonError::into_inner);
            let len = out.len().min(BLOCK_SIZE);
            match blocks.get(&lba) {
                Some(data) => out[..len].copy_from_slice(&data[..len]),
                None => out[..len].fill(0),
            }
            len as i32
        })
    }

    pub fn write_block(&self, lba: u64, data: &[u8]) -> std::result::Result<(), Errno> {
        fault_return!(self.write_point);
        let mut block = vec![0; BLOCK_SIZE];
        let len = data.len().min(BLOCK_SIZE);
        block[..len].copy_from_slice(&data[..len]);
        self.blocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(lba, block);
        Ok(())
    }

    pub fn alloc_buffer(&self) -> std::result::Result<Vec<u8>, Errno> {
        fault_call_result!(self.alloc_point, Ok(vec![0; BLOCK_SIZE]))
    }

    /// One allocate, write, read-back cycle.
    fn cycle(&self, lba: u64) -> std::result::Result<(), Errno> {
        let mut buffer = self.alloc_buffer()?;
        buffer[0] = lba as u8;
        self.write_block(lba, &buffer)?;
        let read = self.read_block(lba, &mut buffer);
        if read < 0 {
            return Err(Errno::new(read).unwrap_or(Errno::EIO));
        }
        Ok(())
    }

    /// Run `iterations` cycles, counting failures.  Injected panics are
    /// caught and counted instead of ending the run.  The panic hook is left
    /// alone; see [`quiet_panics`].
    pub fn drive(&self, iterations: u64) -> DriveSummary {
        let mut summary = DriveSummary {
            iterations,
            ..DriveSummary::default()
        };
        for lba in 0..iterations {
            match panic::catch_unwind(AssertUnwindSafe(|| self.cycle(lba % 64))) {
                Ok(Ok(())) => summary.ok += 1,
                Ok(Err(errno)) => {
                    debug!("cycle {lba} failed with {errno}");
                    summary.errors += 1;
                }
                Err(_) => summary.panics += 1,
            }
        }
        summary
    }
}

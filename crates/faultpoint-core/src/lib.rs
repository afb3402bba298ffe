//! Runtime fault injection for instrumented programs.
//!
//! Code is instrumented with **fault points**.  At runtime a controller
//! gathers points into **fault groups** and configures, per group, three
//! kinds of fault: delay, error and panic.  Each invocation of an armed
//! point runs through the decision engine, which applies the group's
//! interval, probability, task filter and `times` budget and keeps exact
//! hit/injection counters.
//!
//! # Architecture
//!
//! ```text
//! instrumented code          FaultInjector                controller
//! ─────────────────          ─────────────                ──────────
//! point.check()      ──→ armed? ──→ DecisionEngine        control::Request
//! fault_call_int!()         │         └─ FaultGroup  ←──  apply_plan()
//! fault_return!()           └─ FaultPointRegistry         report()
//!                                GroupTable (256 slots)
//! ```
//!
//! Modules:
//!
//! 1. **[`site`]**, **[`point`]**, **[`registry`]**: fault point identity,
//!    the call-site API and the catalog
//! 2. **[`group`]**, **[`table`]**, **[`config`]**: groups and their per-kind
//!    configuration
//! 3. **[`engine`]**: the decision algorithm
//! 4. **[`injector`]**, **[`control`]**, **[`plan`]**: the context object
//!    and the ways to drive it

pub mod config;
pub mod control;
pub mod engine;
pub mod errno;
pub mod error;
pub mod error_list;
pub mod filter;
pub mod group;
pub mod hooks;
pub mod injector;
pub mod plan;
pub mod point;
pub mod registry;
pub mod site;
pub mod table;

mod sync;

pub use config::{FaultConfig, FaultKind, FaultStats, KindSet, UNLIMITED};
pub use control::{Attribute, Request, Response};
pub use engine::{Decision, DecisionEngine};
pub use errno::Errno;
pub use error::{ErrorClass, FaultError, Result};
pub use filter::{mark_current_thread, MarkGuard, TaskFilter, ThreadMarks};
pub use group::{FaultGroup, GroupId, GroupStats};
pub use hooks::{FaultHooks, PanicMode, StdHooks};
pub use injector::{FaultInjector, FaultInjectorBuilder, InjectorConfig, InjectorReport};
pub use plan::{load_plan, save_plan, FaultPlan, GroupPlan, KindPlan, PlanError};
pub use point::{FaultPoint, FaultPointInfo};
pub use site::{Address, FaultClass, FaultSite};
pub use table::MAX_GROUPS;

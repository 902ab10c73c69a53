#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! ** Schist engine **
//! Runtime for the Schist trigger language: walks parsed triggers against a
//! simulated game world, suspends on delays, and resumes on a tick scheduler.

pub const SCHIST_VERSION: &str = env!("CARGO_PKG_VERSION");

// Core modules
pub mod bus;
pub mod config;
pub mod console;
pub mod engine;
pub mod event;
pub mod exec;
pub mod player;
pub mod reload;
pub mod sched;
pub mod trigger;
pub mod vars;
pub mod world;

// Re-exports for convenience
pub use bus::TriggerBus;
pub use config::Config;
pub use engine::Engine;
pub use event::EventCtx;
pub use exec::{ExecError, Outcome};
pub use player::Player;
pub use sched::{Continuation, Scheduler, Task, WorkerPool};
pub use trigger::Trigger;
pub use vars::VarStore;
pub use world::{Outbound, World};

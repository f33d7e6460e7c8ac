//! Sandbox: execution of verification scripts in an embedded interpreter.
//!
//! Each script runs in a fresh scope with two objects passed to its entry
//! point: `input` (the change and host utilities) and `output` (result
//! factories). The return value is checked against the result contract as
//! soon as the entry point returns.
//!
//! # Modules
//!
//! - [`engine`]: `build_engine()`, API registration and operation budget
//! - [`input_api`]: `InputApi`, `ChangeHandle`, `FileHandle`, `RhsLines`
//! - [`output_api`]: `OutputApi` result factories
//! - [`executor`]: `ScriptExecutor` (entry-point dispatch, contract check)
//! - [`error`]: `ScriptError` / `ScriptResult`

pub mod engine;
pub mod error;
pub mod executor;
pub mod input_api;
pub mod output_api;

pub use engine::build_engine;
pub use error::{ScriptError, ScriptResult};
pub use executor::{ScriptExecutor, COMMIT_ENTRY_POINT, UPLOAD_ENTRY_POINT};
pub use input_api::{ChangeHandle, FileHandle, InputApi, RhsLines};
pub use output_api::OutputApi;

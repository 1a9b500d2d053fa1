//! Compiler Backend Contract
//!
//! The parser and JIT live outside this crate; the runtime sees them as a
//! [`Backend`] handed to `process::init`. A backend turns source text into
//! a [`FunctionDescriptor`] whose entry takes `(frame, self, it)` and
//! returns a value.
//!
//! Compiled bodies keep two disciplines:
//!
//! - **Frame chain**: push the frame on entry and pop it on every exit
//!   path (`fiber::push_call_frame` / `fiber::pop_call_frame`, or the
//!   scoped `fiber::FrameGuard`).
//! - **Unwind**: failures travel as `Err` through the body's own return
//!   value; a handler is an ordinary match on a call's result.
//!
//! The runtime helpers a backend may reference by name:
//! `create_call_frame`, `merge_splat_arguments`, `get_local`, `set_local`,
//! `get_member`, `set_member`, `get_module_value`, `function_call`,
//! `eval_truth`, `push_call_frame`, `pop_call_frame`, the numeric helpers
//! (`numeric::{add, sub, mul, div, rem}`), and `array::{get, set}` /
//! `map::{get, set}`.

use std::fmt;
use std::sync::Arc;

use crate::function::FunctionDescriptor;

/// A parser/codegen diagnostic.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> CompileError {
        CompileError {
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compile error: {}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// The compilation service the runtime consumes.
pub trait Backend: Send + Sync {
    /// Human-readable backend name, for diagnostics and `--version`.
    fn name(&self) -> &str;

    /// Compile one module's source to its entry descriptor.
    fn compile(
        &self,
        module_name: &str,
        source: &str,
    ) -> Result<Arc<FunctionDescriptor>, CompileError>;
}

/// The backend used when no JIT is linked: every compilation reports a
/// diagnostic through the standard channel. Flag handling, globals, and
/// host calls all remain live.
pub struct NullBackend;

impl Backend for NullBackend {
    fn name(&self) -> &str {
        "none"
    }

    fn compile(
        &self,
        module_name: &str,
        _source: &str,
    ) -> Result<Arc<FunctionDescriptor>, CompileError> {
        Err(CompileError::new(format!(
            "no compiler backend linked (compiling '{module_name}')"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_backend_reports_unavailable() {
        let err = NullBackend.compile("m", "1 + 1").unwrap_err();
        assert!(err.message.contains("no compiler backend"));
        assert!(err.to_string().starts_with("compile error:"));
    }
}

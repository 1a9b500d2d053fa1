//! Runtime Error Channel
//!
//! A raise is a non-local transfer up the call-frame chain of the current
//! fiber. There is no stack unwinder: errors ride an ordinary `Result` rail
//! through every call boundary, and the compiler lowers raises into early
//! returns. Frame cleanup happens in drop guards, so popping the chain on
//! the error path needs no extra machinery.
//!
//! Every error carries a kind from the fixed taxonomy plus a message, and a
//! user-level `raise` additionally carries the raised value itself.

use std::fmt;

use rime_core::{Symbol, Value, symbol_name};

/// Result alias used by every fallible runtime operation.
pub type RtResult<T> = Result<T, RuntimeError>;

/// The failure taxonomy. Each variant corresponds to one failure the
/// runtime can report; anything scripted goes through `Raised`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Identifier not resolvable as local, upvalue, or module member.
    UndefinedName,
    /// Method lookup returned nil on a required call.
    NoMethod,
    /// Value is not a function and does not respond to `__call__`.
    NotCallable,
    /// Operation received a value of an incompatible kind.
    WrongType,
    /// Negative index still negative after length adjustment.
    IndexOutOfRange,
    /// Read of a property that only has a setter.
    PropertyWriteOnly,
    /// Write to a property that only has a getter.
    PropertyReadOnly,
    /// Resume of a fiber whose functor already returned.
    FiberFinished,
    /// Resume of a fiber that is currently running.
    FiberSelfResume,
    /// The parser or backend produced a diagnostic.
    CompileError,
    /// A symbol id that did not originate from the symbol table.
    UnknownSymbol,
    /// User-level raise; the payload value is attached.
    Raised,
}

impl ErrorKind {
    fn label(self) -> &'static str {
        match self {
            ErrorKind::UndefinedName => "undefined-name",
            ErrorKind::NoMethod => "no-method",
            ErrorKind::NotCallable => "not-callable",
            ErrorKind::WrongType => "wrong-type",
            ErrorKind::IndexOutOfRange => "index-out-of-range",
            ErrorKind::PropertyWriteOnly => "property-write-only",
            ErrorKind::PropertyReadOnly => "property-read-only",
            ErrorKind::FiberFinished => "fiber-finished",
            ErrorKind::FiberSelfResume => "fiber-self-resume",
            ErrorKind::CompileError => "compile-error",
            ErrorKind::UnknownSymbol => "unknown-symbol",
            ErrorKind::Raised => "raised",
        }
    }
}

/// An error travelling up the frame chain.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    kind: ErrorKind,
    message: String,
    value: Value,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            kind,
            message: message.into(),
            value: Value::UNDEFINED,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The raised payload, or undefined for runtime-originated errors.
    pub fn value(&self) -> Value {
        self.value
    }

    // Constructors for the failures raised from more than one place.

    pub fn undefined_name(name: Symbol) -> RuntimeError {
        Self::new(
            ErrorKind::UndefinedName,
            format!("variable '{}' not found", sym_str(name)),
        )
    }

    pub fn no_method(name: Symbol) -> RuntimeError {
        Self::new(
            ErrorKind::NoMethod,
            format!("object does not respond to method '{}'", sym_str(name)),
        )
    }

    pub fn not_callable() -> RuntimeError {
        Self::new(
            ErrorKind::NotCallable,
            "value is not a function and does not respond to __call__",
        )
    }

    pub fn wrong_type(expected: &str) -> RuntimeError {
        Self::new(ErrorKind::WrongType, format!("expected {expected}"))
    }

    pub fn index_out_of_range(index: i64) -> RuntimeError {
        Self::new(
            ErrorKind::IndexOutOfRange,
            format!("index {index} out of range"),
        )
    }

    pub fn property_write_only(name: Symbol) -> RuntimeError {
        Self::new(
            ErrorKind::PropertyWriteOnly,
            format!("property '{}' is write-only", sym_str(name)),
        )
    }

    pub fn property_read_only(name: Symbol) -> RuntimeError {
        Self::new(
            ErrorKind::PropertyReadOnly,
            format!("property '{}' is read-only", sym_str(name)),
        )
    }

    pub fn fiber_finished() -> RuntimeError {
        Self::new(ErrorKind::FiberFinished, "fiber has already finished")
    }

    pub fn fiber_self_resume() -> RuntimeError {
        Self::new(ErrorKind::FiberSelfResume, "fiber is already running")
    }

    pub fn compile_error(message: impl Into<String>) -> RuntimeError {
        Self::new(ErrorKind::CompileError, message)
    }

    pub fn unknown_symbol(id: u64) -> RuntimeError {
        Self::new(ErrorKind::UnknownSymbol, format!("unknown symbol id {id}"))
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl std::error::Error for RuntimeError {}

fn sym_str(name: Symbol) -> &'static str {
    symbol_name(name).unwrap_or("<unknown>")
}

/// Raise a value as an error. The invocation engine propagates it up the
/// frame chain until a compiler-emitted handler consumes it.
pub fn raise(value: Value) -> RuntimeError {
    RuntimeError {
        kind: ErrorKind::Raised,
        message: format!("uncaught {:?}", value),
        value,
    }
}

/// Raise with a formatted diagnostic and no payload value.
pub fn raise_with_message(message: impl Into<String>) -> RuntimeError {
    RuntimeError {
        kind: ErrorKind::Raised,
        message: message.into(),
        value: Value::UNDEFINED,
    }
}

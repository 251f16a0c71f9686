//! Error type.
//!
//! This is the shared error type for the whole interface: descriptor
//! validation, resource creation, command recording and replay all report
//! through it. Replay failures are additionally surfaced through the log so
//! a bad frame does not abort the submission batch.

use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum Error {
    /// A descriptor failed validation (duplicate binding, negative index,
    /// missing required field, ...). Raised at construction; the resource is
    /// not created.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The backend lacks a capability required by the operation.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A format has no backend equivalent and no acceptable fallback.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Shader source in a language the backend cannot consume.
    #[error("unsupported shader language: {0}")]
    UnsupportedLanguage(String),

    /// A mip level, array layer, sub-region or byte range exceeds the bounds
    /// of the resource it addresses.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A shader stage failed to compile. Carries the backend info log.
    #[error("shader compilation failed: {log}")]
    Compile { log: String },

    /// Program linking failed. Carries the backend info log.
    #[error("program link failed: {log}")]
    Link { log: String },

    /// The rendering context was lost. Non-fatal; the device transitions to
    /// the lost state and waits for a restore.
    #[error("rendering context lost")]
    ContextLost,

    /// `end()` called on a render pass that already ended.
    #[error("render pass already ended")]
    PassEnded,

    /// An operation on a command encoder after `finish()`.
    #[error("command encoder already finished")]
    EncoderFinished,

    /// Use of a destroyed resource. Callers that cannot propagate this treat
    /// it as a logged no-op.
    #[error("lifecycle violation: {0}")]
    Lifecycle(String),

    /// An individual command failed during replay. The submission batch
    /// continues with the next buffer.
    #[error("replay failure: {0}")]
    Replay(String),
}

pub type Result<T> = std::result::Result<T, Error>;

//! distcc-cross verifier
//!
//! Runs inside a built client container and asserts that the image is wired
//! the way the cross-compiler lane expects: the container reports the right
//! machine, ccache intercepts the compiler front-ends, distcc sits beneath
//! ccache, and a reference C project builds twice through that stack.

pub mod environment;
pub mod runner;
pub mod scratch;
pub mod telemetry;

pub use environment::{CapturedOutput, CommandStatus, Environment, FakeEnvironment, SystemEnvironment};
pub use runner::{
    Check, CheckStatus, VerificationFailure, VerificationResult, VerificationRunner, VerifyError,
    VerifyOptions,
};

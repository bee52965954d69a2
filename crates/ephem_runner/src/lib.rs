//! # ephem_runner
//!
//! External process execution for ephem.
//!
//! Every external tool ephem drives (git, terraform) is launched through the
//! [`CommandRunner`] trait so the orchestration code can be exercised with
//! [`MockRunner`] in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use ephem_runner::{CommandRunner, CommandSpec, ProcessRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = ProcessRunner::new();
//!
//!     let spec = CommandSpec::new("terraform")
//!         .arg("version")
//!         .timeout(30);
//!
//!     let result = runner.run(&spec).await?;
//!     println!("Exit code: {}", result.exit_code);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod mock;
pub mod process;
pub mod runner;

pub use config::CommandSpec;
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use process::{LogStream, ProcessRunner};
pub use runner::{CommandRunner, ExecutionResult};

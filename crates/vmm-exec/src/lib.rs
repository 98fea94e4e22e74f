//! vmm-exec: process execution abstraction
//!
//! Runs external programs with an explicit environment overlay and probes SSH
//! reachability through the system OpenSSH client.

pub mod error;
pub mod local;
pub mod result;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use local::{LocalRunner, locate_program};
pub use result::{CommandResult, CommandSpec};
pub use ssh::{OpenSshProbe, SshIdentity, SshProbe};
pub use traits::CommandRunner;

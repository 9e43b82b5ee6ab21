mod azure;
mod command;
mod local;
mod ssh;

pub use azure::AzureCliProvisioner;
pub use command::Command;
pub use local::LocalShellRunner;
pub use ssh::{SshSessionRunner, SSHPASS_ENV};

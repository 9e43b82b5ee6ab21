mod collector;
mod orchestrator;
mod plugins;
mod provisioner;
mod reference;
mod script;
mod sequencer;
mod session;
mod stream;
mod sync;
mod types;
mod user_config;

pub use collector::*;
pub use orchestrator::*;
pub use plugins::*;
pub use provisioner::*;
pub use reference::*;
pub use script::*;
pub use sequencer::*;
pub use session::*;
pub use stream::*;
pub use sync::*;
pub use types::*;
pub use user_config::*;

pub use async_trait::async_trait;
pub use tokio_stream::{Stream, StreamExt};

pub type Result<T> = std::result::Result<T, Error>;

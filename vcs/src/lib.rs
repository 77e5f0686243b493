//! Git subprocess gateway for tagz
//!
//! Every git invocation made by the tagging engine goes through the [`Gateway`]
//! trait. Commands are typed ([`GitCommand`]) rather than free-form strings, and
//! results are structured ([`CommandOutput`]) so callers match on the exit status
//! instead of guessing from diagnostic text.
//!
//! ```no_run
//! use std::path::Path;
//! use vcs::{Gateway, GatewayConfig, GitCommand, GitGateway};
//!
//! # async fn demo() -> vcs::GatewayResult<()> {
//! let gateway = GitGateway::new(GatewayConfig::default().with_dry_run(true));
//! let output = gateway
//!     .run(Path::new("/tmp/mozilla__fireplace"), &GitCommand::fetch_tags("origin"))
//!     .await?;
//! assert!(output.success());
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod gateway;

pub use command::GitCommand;
pub use gateway::{
    git_available, CommandOutput, Gateway, GatewayConfig, GatewayError, GatewayResult, GitGateway,
};

pub mod prelude {
    pub use crate::command::*;
    pub use crate::gateway::*;
}

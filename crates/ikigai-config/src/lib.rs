//! TOML + environment-variable configuration loading, grounded on
//! `arawn-config`: a user-level file under the XDG config dir, a
//! project-local `ikigai.toml`, and environment variables layered on top,
//! merged into one fully-defaulted [`ResolvedConfig`].

pub mod error;
pub mod resolver;
pub mod types;

pub use error::{ConfigError, Result};
pub use resolver::{ResolvedConfig, load};
pub use types::{AgentSection, DebugSection, IkigaiConfig, LlmSection, SessionSection};

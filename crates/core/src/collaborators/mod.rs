//! External collaborators invoked by the stage sequencer.

mod command;
mod config;
mod error;
mod traits;

pub use command::{
    parse_converter_output, parse_locator, CommandEnricher, CommandLinkConverter,
    CommandTargetDiscovery,
};
pub use config::{EnrichmentConfig, ToolsConfig, OPENAI_API_KEY_ENV};
pub use error::CollaboratorError;
pub use traits::{DiscoveryRequest, Enricher, LinkConverter, TargetDiscovery};

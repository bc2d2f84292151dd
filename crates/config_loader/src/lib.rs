//! # Config Loader
//!
//! Reads the gateway configuration document (TOML or JSON) and checks it
//! before any sink or engine is built.
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("bulkline.toml")).unwrap();
//! println!("Batch size: {}", blueprint.window.max_batch_size);
//! ```

mod parser;
mod validator;

pub use contracts::GatewayBlueprint;
pub use parser::ConfigFormat;
pub use validator::MAX_INTERVAL_MS;

use std::path::Path;

use contracts::ContractError;

/// Entry point for loading, checking and exporting gateway configuration
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate the document at `path`, format taken from its extension
    pub fn load_from_path(path: &Path) -> Result<GatewayBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Parse and validate an in-memory document
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<GatewayBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Re-run validation, e.g. after CLI overrides were applied
    pub fn validate(blueprint: &GatewayBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Export a blueprint (effective config after overrides) as `format`
    pub fn render(blueprint: &GatewayBlueprint, format: ConfigFormat) -> Result<String, ContractError> {
        parser::render(blueprint, format)
    }
}

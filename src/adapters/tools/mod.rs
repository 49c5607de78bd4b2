//! Tool executor implementations.

pub mod admin_links;
pub mod fixture;
pub mod function;
pub mod mock;

pub use admin_links::{AdminLink, AdminLinksTool};
pub use fixture::FixtureTool;
pub use function::FnTool;
pub use mock::MockTool;

use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::domain::errors::CatalogError;
use crate::domain::models::ToolsConfig;
use crate::services::catalog::{BuiltinTool, ToolCatalog};

/// Catalog of the builtin tools.
///
/// Data tools replay fixtures from `tools.fixtures_dir`; without one only
/// the local admin links tool is available.
pub fn builtin_catalog(config: &ToolsConfig) -> Result<ToolCatalog, CatalogError> {
    let fixtures = config.fixtures_dir.as_deref().map(Path::new);
    if fixtures.is_none() {
        warn!("no fixtures directory configured, only admin links are available");
    }

    let mut builder = ToolCatalog::builder();
    for tool in BuiltinTool::ALL {
        let spec = tool.spec(config.default_limit);
        match (tool, fixtures) {
            (BuiltinTool::AdminLinks, _) => {
                builder = builder.register(spec, Arc::new(AdminLinksTool::new(&config.admin_base_url)));
            }
            (_, Some(dir)) => {
                builder = builder.register(spec, Arc::new(FixtureTool::new(dir, tool.name())));
            }
            (_, None) => {}
        }
    }
    builder.build()
}

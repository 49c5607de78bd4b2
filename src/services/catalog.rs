//! Tool catalog: the process-wide, read-only table of tools.
//!
//! Built once at startup and shared through `Arc`. Lookups never lock.

use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::domain::errors::CatalogError;
use crate::domain::models::{ArgSpec, EntityKind, IssueCategory, ToolRole, ToolSpec};
use crate::domain::ports::ToolExecutor;

/// A tool description together with the executor that runs it.
#[derive(Clone)]
pub struct CatalogEntry {
    /// Static description.
    pub spec: ToolSpec,
    /// Implementation.
    pub executor: Arc<dyn ToolExecutor>,
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Immutable tool table indexed by name and by category.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    entries: BTreeMap<String, CatalogEntry>,
    /// Names in execution order: priority descending, then name.
    ordered: Vec<String>,
    by_category: HashMap<IssueCategory, Vec<String>>,
}

impl ToolCatalog {
    /// Starts an empty builder.
    pub fn builder() -> ToolCatalogBuilder {
        ToolCatalogBuilder::default()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spec of the tool called `name`.
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.entries.get(name).map(|e| &e.spec)
    }

    /// Executor of the tool called `name`.
    pub fn executor(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.entries.get(name).map(|e| Arc::clone(&e.executor))
    }

    /// Priority of `name`, zero for unknown tools.
    pub fn priority(&self, name: &str) -> u8 {
        self.spec(name).map_or(0, |s| s.priority)
    }

    /// Role of `name`, if registered.
    pub fn role(&self, name: &str) -> Option<ToolRole> {
        self.spec(name).map(|s| s.role)
    }

    /// All specs in execution order.
    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.ordered.iter().filter_map(|name| self.spec(name))
    }

    /// Specs applicable to a category, in execution order.
    pub fn for_category(&self, category: IssueCategory) -> impl Iterator<Item = &ToolSpec> {
        self.by_category
            .get(&category)
            .into_iter()
            .flatten()
            .filter_map(|name| self.spec(name))
    }

    /// Specs with a given role, in execution order.
    pub fn with_role(&self, role: ToolRole) -> impl Iterator<Item = &ToolSpec> {
        self.specs().filter(move |s| s.role == role)
    }
}

/// Collects entries and validates them into a [`ToolCatalog`].
#[derive(Default)]
pub struct ToolCatalogBuilder {
    entries: Vec<CatalogEntry>,
}

impl ToolCatalogBuilder {
    /// Adds a tool; duplicates are reported by [`Self::build`].
    #[must_use]
    pub fn register(mut self, spec: ToolSpec, executor: Arc<dyn ToolExecutor>) -> Self {
        self.entries.push(CatalogEntry { spec, executor });
        self
    }

    /// Validates names and arguments and builds the catalog.
    pub fn build(self) -> Result<ToolCatalog, CatalogError> {
        let mut entries = BTreeMap::new();
        for entry in self.entries {
            let name = entry.spec.name.clone();
            if name.trim().is_empty() {
                return Err(CatalogError::EmptyName);
            }
            let mut arg_names = HashSet::new();
            for arg in &entry.spec.args {
                if !arg_names.insert(arg.name.as_str()) {
                    return Err(CatalogError::DuplicateArgument {
                        tool: name,
                        arg: arg.name.clone(),
                    });
                }
            }
            if entries.insert(name.clone(), entry).is_some() {
                return Err(CatalogError::DuplicateTool(name));
            }
        }

        let mut ordered: Vec<&ToolSpec> = entries.values().map(|e| &e.spec).collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));

        let mut by_category: HashMap<IssueCategory, Vec<String>> = HashMap::new();
        for spec in &ordered {
            for category in &spec.categories {
                by_category
                    .entry(*category)
                    .or_default()
                    .push(spec.name.clone());
            }
        }
        let ordered = ordered.into_iter().map(|s| s.name.clone()).collect();

        Ok(ToolCatalog {
            entries,
            ordered,
            by_category,
        })
    }
}

/// The builtin support-platform tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTool {
    /// `get_device_info`
    DeviceInfo,
    /// `get_third_party_device_info`
    ThirdPartyDeviceInfo,
    /// `get_action_attempts`
    ActionAttempts,
    /// `get_access_codes`
    AccessCodes,
    /// `get_audit_logs`
    AuditLogs,
    /// `get_device_events`
    DeviceEvents,
    /// `get_admin_links`
    AdminLinks,
}

impl BuiltinTool {
    /// Every builtin tool.
    pub const ALL: [Self; 7] = [
        Self::DeviceInfo,
        Self::ThirdPartyDeviceInfo,
        Self::ActionAttempts,
        Self::AccessCodes,
        Self::AuditLogs,
        Self::DeviceEvents,
        Self::AdminLinks,
    ];

    /// Catalog name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DeviceInfo => "get_device_info",
            Self::ThirdPartyDeviceInfo => "get_third_party_device_info",
            Self::ActionAttempts => "get_action_attempts",
            Self::AccessCodes => "get_access_codes",
            Self::AuditLogs => "get_audit_logs",
            Self::DeviceEvents => "get_device_events",
            Self::AdminLinks => "get_admin_links",
        }
    }

    /// Spec for this tool; list tools start at `page_limit` items.
    pub fn spec(&self, page_limit: u64) -> ToolSpec {
        use IssueCategory::{AccountIssue, ApiHelp, DeviceBehavior, Troubleshooting, Unknown};

        let limit = || ArgSpec::literal("limit", json!(page_limit));
        let device = || ArgSpec::entity(EntityKind::DeviceId);
        let workspace = || ArgSpec::entity(EntityKind::WorkspaceId);

        match self {
            Self::DeviceInfo => ToolSpec::new(self.name(), ToolRole::DeviceStatus)
                .with_description("Device record: status, properties, online state")
                .with_arg(device())
                .for_categories(&[DeviceBehavior, Troubleshooting, ApiHelp, AccountIssue, Unknown])
                .with_priority(100),
            Self::ThirdPartyDeviceInfo => {
                ToolSpec::new(self.name(), ToolRole::ThirdPartyLookup)
                    .with_description("Provider-side device record by third-party id")
                    .with_arg(ArgSpec::entity(EntityKind::ThirdPartyDeviceId))
                    .with_priority(40)
            }
            Self::ActionAttempts => ToolSpec::new(self.name(), ToolRole::ActionHistory)
                .with_description("Recent lock, unlock and access code actions with results")
                .with_arg(device())
                .with_arg(workspace())
                .with_arg(limit())
                .for_categories(&[DeviceBehavior, Troubleshooting, ApiHelp, Unknown])
                .with_priority(80),
            Self::AccessCodes => ToolSpec::new(self.name(), ToolRole::AccessCodes)
                .with_description("Access codes on the device, managed and unmanaged")
                .with_arg(device())
                .with_arg(workspace())
                .with_arg(limit())
                .with_arg(ArgSpec::literal("offset", json!(0)))
                .for_categories(&[Troubleshooting, AccountIssue])
                .with_priority(75),
            Self::DeviceEvents => ToolSpec::new(self.name(), ToolRole::ConnectivityHistory)
                .with_description("Device events: connects, disconnects, battery, lock state")
                .with_arg(device())
                .with_arg(workspace())
                .with_arg(limit())
                .for_categories(&[DeviceBehavior, Troubleshooting, Unknown])
                .with_priority(70),
            Self::AuditLogs => ToolSpec::new(self.name(), ToolRole::AuditTrail)
                .with_description("Database change history for the device")
                .with_arg(device())
                .with_arg(limit())
                .for_categories(&[Troubleshooting, AccountIssue])
                .with_priority(60),
            Self::AdminLinks => ToolSpec::new(self.name(), ToolRole::AdminLinks)
                .with_description("Links to admin pages for the entities involved")
                .with_arg(device())
                .with_arg(ArgSpec::optional_entity(EntityKind::WorkspaceId))
                .with_arg(ArgSpec::optional_entity(EntityKind::AccessCodeId))
                .with_priority(10),
        }
    }
}

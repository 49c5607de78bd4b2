//! Tool specs, canonical arguments and invocations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::intent::{EntityKind, IssueCategory};

/// What a tool tells us about, used by gap rules and synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolRole {
    /// Device state and properties.
    DeviceStatus,
    /// Lookup of a device by its provider-side id.
    ThirdPartyLookup,
    /// Lock, unlock and access code action attempts.
    ActionHistory,
    /// Connect and disconnect events.
    ConnectivityHistory,
    /// Access codes on a device.
    AccessCodes,
    /// Workspace audit log.
    AuditTrail,
    /// Links into the admin console.
    AdminLinks,
    /// Anything else.
    Generic,
}

impl ToolRole {
    /// Evidence kind used when a payload does not name its own.
    pub const fn default_kind(&self) -> &'static str {
        match self {
            Self::DeviceStatus => "device_status",
            Self::ThirdPartyLookup => "third_party_device",
            Self::ActionHistory => "action_attempt",
            Self::ConnectivityHistory => "device_event",
            Self::AccessCodes => "access_code",
            Self::AuditTrail => "audit_log",
            Self::AdminLinks => "admin_links",
            Self::Generic => "tool_result",
        }
    }
}

/// Where an argument value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgSource {
    /// Bound from an extracted or discovered entity.
    Entity(EntityKind),
    /// Fixed value.
    Literal(Value),
}

/// One declared tool argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    /// Argument name as passed to the tool.
    pub name: String,
    /// Where the value comes from.
    pub source: ArgSource,
    /// Whether the tool cannot run without it.
    pub required: bool,
}

impl ArgSpec {
    /// Required argument bound from an entity of the same name.
    pub fn entity(kind: EntityKind) -> Self {
        Self {
            name: kind.as_str().to_string(),
            source: ArgSource::Entity(kind),
            required: true,
        }
    }

    /// Optional argument bound from an entity of the same name.
    pub fn optional_entity(kind: EntityKind) -> Self {
        Self {
            required: false,
            ..Self::entity(kind)
        }
    }

    /// Argument with a fixed default value.
    pub fn literal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            source: ArgSource::Literal(value.into()),
            required: false,
        }
    }
}

/// Static description of a tool in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name.
    pub name: String,
    /// One-line description for listings.
    pub description: String,
    /// Declared arguments.
    pub args: Vec<ArgSpec>,
    /// Categories for which this tool runs in the first round.
    pub categories: Vec<IssueCategory>,
    /// Higher runs first. Ties are broken by name.
    pub priority: u8,
    /// Kind of evidence the tool produces.
    pub role: ToolRole,
}

impl ToolSpec {
    /// Spec with no arguments, categories or priority.
    pub fn new(name: impl Into<String>, role: ToolRole) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            args: Vec::new(),
            categories: Vec::new(),
            priority: 0,
            role,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declares one more argument.
    #[must_use]
    pub fn with_arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// Sets the first-round categories.
    #[must_use]
    pub fn for_categories(mut self, categories: &[IssueCategory]) -> Self {
        self.categories = categories.to_vec();
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Whether the tool runs in the first round for `category`.
    pub fn applies_to(&self, category: IssueCategory) -> bool {
        self.categories.contains(&category)
    }

    /// Declared argument called `name`.
    pub fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|a| a.name == name)
    }
}

/// Tool arguments as a key-sorted JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalArgs(BTreeMap<String, Value>);

impl CanonicalArgs {
    /// No arguments.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds an argument, replacing any previous value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts an argument, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Argument value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Argument value, if it is a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Argument value, if it is an unsigned integer.
    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(Value::as_u64)
    }

    /// Whether `name` is set.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Arguments in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no arguments are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable serialized form used in cache keys.
    pub fn canonical_string(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl From<BTreeMap<String, Value>> for CanonicalArgs {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// Identity of an execution: tool name plus canonical arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// Tool name.
    pub tool: String,
    /// Canonical argument string.
    pub args: String,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tool, self.args)
    }
}

/// Why the selection policy proposed an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// First-round pick for the intent category.
    Initial,
    /// Category tool whose arguments only became bindable later.
    Deferred,
    /// The previous call reported more pages.
    Pagination,
    /// The device is offline; look at its connectivity history.
    DeviceOffline,
    /// The device lookup failed; try the provider-side id.
    DeviceLookupFailed,
    /// Actions failed; look at the action history.
    FailedActions,
    /// Access codes were found; look at their history.
    AccessCodesFound,
    /// Links for the devices discovered so far.
    AdminLinks,
    /// Suggested by the reasoning engine.
    EngineProposal,
}

/// A concrete call the scheduler will perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool to call.
    pub tool: String,
    /// Bound arguments.
    pub args: CanonicalArgs,
    /// Round the invocation belongs to.
    pub round: u32,
    /// Why it was selected.
    pub reason: SelectionReason,
}

impl ToolInvocation {
    /// Invocation of `tool` with bound `args`.
    pub fn new(
        tool: impl Into<String>,
        args: CanonicalArgs,
        round: u32,
        reason: SelectionReason,
    ) -> Self {
        Self {
            tool: tool.into(),
            args,
            round,
            reason,
        }
    }

    /// Cache identity of this invocation.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            tool: self.tool.clone(),
            args: self.args.canonical_string(),
        }
    }
}

//! Variant payload records.
//!
//! Each record is the body of one step kind (`run`, `run-test`,
//! `approval`, ...). Leaf records use plain serde derives; records that
//! nest steps or accept a shorthand form have their own `decode`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::coerce::{StringOrList, one_or_many};
use super::errors::{DecodeError, DecodePath, DecodeResult};
use super::fields::Fields;
use super::step::Step;

/// Shell used to interpret a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    /// POSIX sh
    Sh,
    /// Bash
    Bash,
    /// Windows PowerShell
    Powershell,
    /// PowerShell Core
    Pwsh,
    /// Python interpreter
    Python,
}

/// Container a step runs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Container {
    /// Image reference only
    Image(String),
    /// Full container specification
    Spec(ContainerSpec),
}

/// Container specification
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContainerSpec {
    /// Image reference
    pub image: String,
    /// Pull policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull: Option<String>,
    /// Entrypoint override
    #[serde(default, skip_serializing_if = "StringOrList::is_empty")]
    pub entrypoint: StringOrList,
    /// Arguments
    #[serde(default, skip_serializing_if = "StringOrList::is_empty")]
    pub args: StringOrList,
    /// Container environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Report upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Report format, e.g. `junit`
    #[serde(rename = "type")]
    pub kind: String,
    /// Report file path(s)
    #[serde(default, skip_serializing_if = "StringOrList::is_empty")]
    pub path: StringOrList,
}

/// Run step body, also used for background steps.
///
/// `run: make` and `run: [make, make test]` are shorthand for a body
/// with only `script` set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StepRun {
    /// Shell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<Shell>,
    /// Script lines
    #[serde(default, skip_serializing_if = "StringOrList::is_empty")]
    pub script: StringOrList,
    /// Container to run in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
    /// Environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Reports
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub report: Vec<Report>,
}

impl StepRun {
    /// Creates a run body with only a script
    #[must_use]
    pub fn script(script: impl Into<StringOrList>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    /// Decodes either the script shorthand or the full mapping
    pub fn decode(value: &Value, path: &DecodePath) -> DecodeResult<Self> {
        if let Ok(script) = StringOrList::deserialize(value) {
            return Ok(Self::script(script));
        }
        let fields = Fields::new(value, path, "a script or a run mapping")?;
        Ok(Self {
            shell: fields.get("shell")?,
            script: fields.get("script")?.unwrap_or_default(),
            container: fields.get("container")?,
            env: fields.get("env")?.unwrap_or_default(),
            report: fields
                .decode("report", |value, path| {
                    one_or_many(value).map_err(|err| DecodeError::type_mismatch(path, err))
                })?
                .unwrap_or_default(),
        })
    }
}

/// Test splitting settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestSplitting {
    /// Disable splitting
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    /// Number of concurrent shards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u64>,
}

/// Test intelligence settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestIntelligence {
    /// Disable test selection
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

/// Test step body (`run-test`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StepTest {
    /// Shell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<Shell>,
    /// Script lines
    #[serde(default, skip_serializing_if = "StringOrList::is_empty")]
    pub script: StringOrList,
    /// Glob patterns selecting test files
    #[serde(
        default,
        rename = "match",
        skip_serializing_if = "StringOrList::is_empty"
    )]
    pub match_patterns: StringOrList,
    /// Container to run in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
    /// Environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Splitting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splitting: Option<TestSplitting>,
    /// Intelligence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intelligence: Option<TestIntelligence>,
    /// Reports
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub report: Vec<Report>,
}

/// Action step body
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepAction {
    /// Action reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    /// Action inputs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, Value>,
    /// Environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Reports
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub report: Vec<Report>,
}

/// Approval gate body
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepApproval {
    /// Approval provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    /// Provider inputs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, Value>,
    /// Environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Template reference body
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepTemplate {
    /// Template reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    /// Template inputs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, Value>,
    /// Environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Synchronization barrier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepBarrier {
    /// Barrier name shared by the steps that wait on it
    pub name: String,
}

/// Queue scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueScope {
    /// Queue shared across the pipeline
    Pipeline,
    /// Queue local to the stage
    Stage,
}

/// Queue step body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepQueue {
    /// Queue key
    pub key: String,
    /// Queue scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<QueueScope>,
}

/// Status check body
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    /// Condition deciding the reported status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Remote execution target: one delegate selector or several
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Delegate(pub StringOrList);

/// Plugin invocation through top-level `uses` and `with`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PluginInvocation {
    /// Plugin reference
    pub uses: Option<String>,
    /// Plugin parameters
    pub with: BTreeMap<String, Value>,
}

/// Concurrency of a deprecated group-level `parallel` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Concurrency {
    /// Enabled or disabled
    Enabled(bool),
    /// Maximum number of concurrently running steps
    Limit(u64),
}

/// Nested steps, run sequentially (`group`) or concurrently (`parallel`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StepGroup {
    /// Concurrency limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<Concurrency>,
    /// Nested steps
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

impl StepGroup {
    /// Creates a group of steps
    #[must_use]
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            parallel: None,
            steps,
        }
    }

    /// Decodes a group, decoding every nested step with the step decoder
    pub fn decode(value: &Value, path: &DecodePath) -> DecodeResult<Self> {
        let fields = Fields::new(value, path, "a step group mapping")?;
        let steps = match fields.raw("steps") {
            None => Vec::new(),
            Some(Value::Array(items)) => {
                let steps_path = path.key("steps");
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| Step::decode(item, &steps_path.index(index)))
                    .collect::<DecodeResult<Vec<_>>>()?
            }
            Some(other) => {
                return Err(DecodeError::unexpected(
                    &path.key("steps"),
                    "a list of steps",
                    other,
                ));
            }
        };

        Ok(Self {
            parallel: fields.get("parallel")?,
            steps,
        })
    }
}

/// Failure handling action: a bare action name or a structured action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FailureAction {
    /// Named action, e.g. `ignore` or `abort`
    Named(String),
    /// Structured action with its settings
    Detailed(BTreeMap<String, Value>),
}

/// `on-failure` policy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FailureStrategy {
    /// Error types the policy applies to
    #[serde(default, skip_serializing_if = "StringOrList::is_empty")]
    pub errors: StringOrList,
    /// Action taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<FailureAction>,
}

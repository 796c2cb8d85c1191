//! Step decoding and encoding.
//!
//! A step is authored either as a bare command shorthand
//!
//! ```yaml
//! - go build
//! - [go build, go test]
//! ```
//!
//! or as a mapping carrying common fields plus one variant field:
//!
//! ```yaml
//! - name: build
//!   needs: lint
//!   run:
//!     script: go build
//! ```
//!
//! There is no discriminator on the wire. Decoding probes the shapes in a
//! fixed order: the shorthand first, then the structured mapping.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::coerce::{StringOrInt, StringOrList};
use super::errors::{DecodePath, DecodeResult};
use super::fields::Fields;
use super::payload::{
    Delegate, FailureStrategy, PluginInvocation, Status, StepAction, StepApproval, StepBarrier,
    StepGroup, StepQueue, StepRun, StepTemplate, StepTest,
};
use super::strategy::Strategy;

/// Values resolved by matrix or template expansion for one expanded
/// step instance. Never authored by hand.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Context {
    /// Matrix cell values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub matrix: BTreeMap<String, String>,
    /// Template input values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, Value>,
}

/// Kind of a step payload, named after its wire key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepKind {
    /// `run`
    Run,
    /// `background`
    Background,
    /// `run-test`
    Test,
    /// `action`
    Action,
    /// `approval`
    Approval,
    /// `barrier`
    Barrier,
    /// `delegate`
    Delegate,
    /// `group`
    Group,
    /// `parallel`
    Parallel,
    /// `queue`
    Queue,
    /// `status`
    Status,
    /// `template`
    Template,
    /// `uses` / `with`
    Plugin,
}

impl StepKind {
    /// Wire key of this kind
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Background => "background",
            Self::Test => "run-test",
            Self::Action => "action",
            Self::Approval => "approval",
            Self::Barrier => "barrier",
            Self::Delegate => "delegate",
            Self::Group => "group",
            Self::Parallel => "parallel",
            Self::Queue => "queue",
            Self::Status => "status",
            Self::Template => "template",
            Self::Plugin => "uses",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The semantic payload of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepPayload {
    /// Run a script
    Run(StepRun),
    /// Run a script in the background
    Background(StepRun),
    /// Run tests
    Test(StepTest),
    /// Run an action
    Action(StepAction),
    /// Wait for approval
    Approval(StepApproval),
    /// Synchronization point
    Barrier(StepBarrier),
    /// Execute on a remote delegate
    Delegate(Delegate),
    /// Nested sequential steps
    Group(StepGroup),
    /// Nested concurrent steps
    Parallel(StepGroup),
    /// Queue
    Queue(StepQueue),
    /// Status check
    Status(Status),
    /// Templated step reference
    Template(StepTemplate),
    /// Plugin invocation
    Plugin(PluginInvocation),
}

impl StepPayload {
    /// Kind of this payload
    #[must_use]
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Run(_) => StepKind::Run,
            Self::Background(_) => StepKind::Background,
            Self::Test(_) => StepKind::Test,
            Self::Action(_) => StepKind::Action,
            Self::Approval(_) => StepKind::Approval,
            Self::Barrier(_) => StepKind::Barrier,
            Self::Delegate(_) => StepKind::Delegate,
            Self::Group(_) => StepKind::Group,
            Self::Parallel(_) => StepKind::Parallel,
            Self::Queue(_) => StepKind::Queue,
            Self::Status(_) => StepKind::Status,
            Self::Template(_) => StepKind::Template,
            Self::Plugin(_) => StepKind::Plugin,
        }
    }

    /// Nested steps of a group or parallel payload
    #[must_use]
    pub fn children(&self) -> &[Step] {
        match self {
            Self::Group(group) | Self::Parallel(group) => &group.steps,
            _ => &[],
        }
    }
}

/// One unit of work in a pipeline.
///
/// `payloads` records every variant field that was populated, in
/// [`StepKind`] order. A well-formed step has exactly one; decoding does
/// not enforce that; [`crate::schema::Validate`] reports it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Step {
    /// Step identifier
    pub id: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Conditional execution expression (`if`)
    pub if_condition: Option<String>,
    /// Identifiers of steps that must complete first
    pub needs: StringOrList,
    /// Timeout, in seconds or as a duration string
    pub timeout: StringOrInt,
    /// Failure handling
    pub on_failure: Option<FailureStrategy>,
    /// Environment
    pub env: BTreeMap<String, String>,
    /// Execution strategy
    pub strategy: Option<Strategy>,
    /// Populated variant payloads
    pub payloads: Vec<StepPayload>,
    /// Expansion side-channel
    pub context: Option<Context>,
}

impl Step {
    /// Creates a step from a single payload
    #[must_use]
    pub fn new(payload: StepPayload) -> Self {
        Self {
            payloads: vec![payload],
            ..Self::default()
        }
    }

    /// Creates a run step, as the shorthand form does
    #[must_use]
    pub fn run(script: impl Into<StringOrList>) -> Self {
        Self::new(StepPayload::Run(StepRun::script(script)))
    }

    /// Sets the step identifier
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the display name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the dependencies
    #[must_use]
    pub fn with_needs(mut self, needs: impl Into<StringOrList>) -> Self {
        self.needs = needs.into();
        self
    }

    /// Sets the strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Adds a payload
    #[must_use]
    pub fn with_payload(mut self, payload: StepPayload) -> Self {
        self.payloads.push(payload);
        self
    }

    /// Decodes a generic node into a step.
    ///
    /// 1. The shorthand: a string or list of strings becomes the run
    ///    script and nothing else is set.
    /// 2. Otherwise the node is decoded as a structured mapping, each
    ///    field on its own; its error is returned as-is on failure.
    pub fn decode(value: &Value, path: &DecodePath) -> DecodeResult<Self> {
        if let Ok(script) = StringOrList::decode(value, path) {
            tracing::trace!(%path, lines = script.len(), "decoded step shorthand");
            return Ok(Self::run(script));
        }

        let step = Self::decode_structured(value, path)?;
        tracing::trace!(%path, kinds = ?step.kinds(), "decoded structured step");
        Ok(step)
    }

    fn decode_structured(value: &Value, path: &DecodePath) -> DecodeResult<Self> {
        let fields = Fields::new(value, path, "a step: a string, a list of strings or a mapping")?;

        let mut payloads = Vec::new();
        if let Some(run) = fields.decode("run", StepRun::decode)? {
            payloads.push(StepPayload::Run(run));
        }
        if let Some(background) = fields.decode("background", StepRun::decode)? {
            payloads.push(StepPayload::Background(background));
        }
        if let Some(test) = fields.get("run-test")? {
            payloads.push(StepPayload::Test(test));
        }
        if let Some(action) = fields.get("action")? {
            payloads.push(StepPayload::Action(action));
        }
        if let Some(approval) = fields.get("approval")? {
            payloads.push(StepPayload::Approval(approval));
        }
        if let Some(barrier) = fields.get("barrier")? {
            payloads.push(StepPayload::Barrier(barrier));
        }
        if let Some(delegate) = fields.get("delegate")? {
            payloads.push(StepPayload::Delegate(delegate));
        }
        if let Some(group) = fields.decode("group", StepGroup::decode)? {
            payloads.push(StepPayload::Group(group));
        }
        if let Some(parallel) = fields.decode("parallel", StepGroup::decode)? {
            payloads.push(StepPayload::Parallel(parallel));
        }
        if let Some(queue) = fields.get("queue")? {
            payloads.push(StepPayload::Queue(queue));
        }
        if let Some(status) = fields.get("status")? {
            payloads.push(StepPayload::Status(status));
        }
        if let Some(template) = fields.get("template")? {
            payloads.push(StepPayload::Template(template));
        }

        let uses: Option<String> = fields.get("uses")?;
        let with: Option<BTreeMap<String, Value>> = fields.get("with")?;
        if uses.is_some() || with.is_some() {
            payloads.push(StepPayload::Plugin(PluginInvocation {
                uses,
                with: with.unwrap_or_default(),
            }));
        }

        Ok(Self {
            id: fields.get("id")?,
            name: fields.get("name")?,
            if_condition: fields.get("if")?,
            needs: fields.get("needs")?.unwrap_or_default(),
            timeout: fields.get("timeout")?.unwrap_or_default(),
            on_failure: fields.get("on-failure")?,
            env: fields.get("env")?.unwrap_or_default(),
            strategy: fields.decode("strategy", Strategy::decode)?,
            payloads,
            context: fields.get("context")?,
        })
    }

    /// Encodes the step in its structured form
    pub fn encode(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Kinds of all populated payloads
    #[must_use]
    pub fn kinds(&self) -> Vec<StepKind> {
        self.payloads.iter().map(StepPayload::kind).collect()
    }

    /// First payload of the given kind
    #[must_use]
    pub fn payload_of(&self, kind: StepKind) -> Option<&StepPayload> {
        self.payloads.iter().find(|payload| payload.kind() == kind)
    }

    /// The run payload, if populated
    #[must_use]
    pub fn run_payload(&self) -> Option<&StepRun> {
        match self.payload_of(StepKind::Run) {
            Some(StepPayload::Run(run)) => Some(run),
            _ => None,
        }
    }

    /// Expands a matrix strategy into one step per cell.
    ///
    /// Each expanded step keeps the remaining strategy settings, drops the
    /// matrix and carries its cell in `context.matrix`. A step without a
    /// matrix expands to itself.
    #[must_use]
    pub fn expand_matrix(&self) -> Vec<Self> {
        let Some(matrix) = self.strategy.as_ref().and_then(|s| s.matrix.as_ref()) else {
            return vec![self.clone()];
        };

        matrix
            .cells()
            .into_iter()
            .map(|cell| {
                let mut step = self.clone();
                step.strategy = step
                    .strategy
                    .take()
                    .map(|strategy| Strategy {
                        matrix: None,
                        ..strategy
                    })
                    .filter(|strategy| !strategy.is_empty());
                step.context.get_or_insert_with(Context::default).matrix = cell;
                step
            })
            .collect()
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(id) = &self.id {
            map.serialize_entry("id", id)?;
        }
        if let Some(name) = &self.name {
            map.serialize_entry("name", name)?;
        }
        if let Some(condition) = &self.if_condition {
            map.serialize_entry("if", condition)?;
        }
        if !self.needs.is_empty() {
            map.serialize_entry("needs", &self.needs)?;
        }
        if !self.timeout.is_absent() {
            map.serialize_entry("timeout", &self.timeout)?;
        }
        if let Some(on_failure) = &self.on_failure {
            map.serialize_entry("on-failure", on_failure)?;
        }
        if !self.env.is_empty() {
            map.serialize_entry("env", &self.env)?;
        }
        if let Some(strategy) = &self.strategy {
            map.serialize_entry("strategy", strategy)?;
        }

        for payload in &self.payloads {
            let key = payload.kind().as_str();
            match payload {
                StepPayload::Run(run) | StepPayload::Background(run) => {
                    map.serialize_entry(key, run)?;
                }
                StepPayload::Test(test) => map.serialize_entry(key, test)?,
                StepPayload::Action(action) => map.serialize_entry(key, action)?,
                StepPayload::Approval(approval) => map.serialize_entry(key, approval)?,
                StepPayload::Barrier(barrier) => map.serialize_entry(key, barrier)?,
                StepPayload::Delegate(delegate) => map.serialize_entry(key, delegate)?,
                StepPayload::Group(group) | StepPayload::Parallel(group) => {
                    map.serialize_entry(key, group)?;
                }
                StepPayload::Queue(queue) => map.serialize_entry(key, queue)?,
                StepPayload::Status(status) => map.serialize_entry(key, status)?,
                StepPayload::Template(template) => map.serialize_entry(key, template)?,
                StepPayload::Plugin(plugin) => {
                    if let Some(uses) = &plugin.uses {
                        map.serialize_entry("uses", uses)?;
                    }
                    if !plugin.with.is_empty() || plugin.uses.is_none() {
                        map.serialize_entry("with", &plugin.with)?;
                    }
                }
            }
        }

        if let Some(context) = &self.context {
            map.serialize_entry("context", context)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::decode(&value, &DecodePath::root()).map_err(serde::de::Error::custom)
    }
}

/// Decodes a step node at the document root; see [`Step::decode`]
pub fn decode_step(value: &Value) -> DecodeResult<Step> {
    Step::decode(value, &DecodePath::root())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::matrix::Matrix;
    use crate::schema::payload::{Concurrency, QueueScope};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_shorthand_list() {
        let step = decode_step(&json!(["echo hi", "echo bye"])).unwrap();
        assert_eq!(step, Step::run(StringOrList::from_iter(["echo hi", "echo bye"])));
        assert_eq!(step.kinds(), vec![StepKind::Run]);
        assert!(step.name.is_none());
        assert!(step.needs.is_empty());
        assert!(step.timeout.is_absent());
        assert!(step.strategy.is_none());
        assert!(step.context.is_none());
    }

    #[test]
    fn test_shorthand_string() {
        let step = decode_step(&json!("make")).unwrap();
        assert_eq!(step.run_payload(), Some(&StepRun::script("make")));
        assert_eq!(step.payloads.len(), 1);
    }

    #[test]
    fn test_structured_run() {
        let step = decode_step(&json!({"name": "build", "run": {"script": ["go build"]}})).unwrap();
        assert_eq!(step.name.as_deref(), Some("build"));
        assert_eq!(
            step.run_payload().unwrap().script,
            StringOrList::from("go build")
        );
        assert_eq!(step.kinds(), vec![StepKind::Run]);
    }

    #[test]
    fn test_structured_common_fields() {
        let step = decode_step(&json!({
            "id": "test",
            "if": "<+ branch == 'main' >",
            "needs": "build",
            "timeout": "10m",
            "env": {"GOFLAGS": "-mod=vendor"},
            "on-failure": {"errors": "all", "action": "ignore"},
            "run": "go test"
        }))
        .unwrap();
        assert_eq!(step.id.as_deref(), Some("test"));
        assert_eq!(step.if_condition.as_deref(), Some("<+ branch == 'main' >"));
        assert_eq!(step.needs, StringOrList::from("build"));
        assert_eq!(step.timeout, StringOrInt::from("10m"));
        assert_eq!(step.env["GOFLAGS"], "-mod=vendor");
        assert!(step.on_failure.is_some());
    }

    #[test]
    fn test_timeout_as_integer() {
        let step = decode_step(&json!({"timeout": 300, "run": "sleep 1"})).unwrap();
        assert_eq!(step.timeout, StringOrInt::Int(300));
    }

    #[test]
    fn test_every_variant_key() {
        let cases = [
            (json!({"background": "redis-server"}), StepKind::Background),
            (json!({"run-test": {"script": "go test"}}), StepKind::Test),
            (json!({"action": {"uses": "checkout"}}), StepKind::Action),
            (json!({"approval": {"uses": "jira"}}), StepKind::Approval),
            (json!({"barrier": {"name": "sync"}}), StepKind::Barrier),
            (json!({"delegate": "pool-a"}), StepKind::Delegate),
            (json!({"group": {"steps": ["a"]}}), StepKind::Group),
            (json!({"parallel": {"steps": ["a", "b"]}}), StepKind::Parallel),
            (json!({"queue": {"key": "deploy"}}), StepKind::Queue),
            (json!({"status": {"condition": "all"}}), StepKind::Status),
            (json!({"template": {"uses": "build@1"}}), StepKind::Template),
            (json!({"uses": "docker/build", "with": {"push": true}}), StepKind::Plugin),
        ];
        for (input, kind) in cases {
            let step = decode_step(&input).unwrap();
            assert_eq!(step.kinds(), vec![kind], "input: {input}");
        }
    }

    #[test]
    fn test_plugin_invocation() {
        let step = decode_step(&json!({"uses": "slack", "with": {"channel": "#ci", "retries": 3}}))
            .unwrap();
        let Some(StepPayload::Plugin(plugin)) = step.payload_of(StepKind::Plugin) else {
            panic!("expected a plugin payload");
        };
        assert_eq!(plugin.uses.as_deref(), Some("slack"));
        assert_eq!(plugin.with["retries"], json!(3));
    }

    #[test]
    fn test_plugin_with_only_round_trip() {
        let step = decode_step(&json!({"with": {}})).unwrap();
        assert_eq!(step.kinds(), vec![StepKind::Plugin]);

        let encoded = step.encode().unwrap();
        assert_eq!(encoded, json!({"with": {}}));
        assert_eq!(decode_step(&encoded).unwrap(), step);
    }

    #[test]
    fn test_multiple_variants_are_kept() {
        let step = decode_step(&json!({
            "run": "make",
            "barrier": {"name": "sync"}
        }))
        .unwrap();
        assert_eq!(step.kinds(), vec![StepKind::Run, StepKind::Barrier]);
    }

    #[test]
    fn test_no_variant_decodes() {
        let step = decode_step(&json!({"name": "placeholder"})).unwrap();
        assert!(step.payloads.is_empty());
    }

    #[test]
    fn test_list_under_string_field_is_type_mismatch() {
        let err = decode_step(&json!({
            "name": "build",
            "needs": {"os": ["linux", "macos"]},
            "run": "make"
        }))
        .unwrap_err();
        assert!(err.is_type_mismatch());
        assert_eq!(err.path().to_string(), "$.needs");
    }

    #[test]
    fn test_scalar_that_is_not_a_string_fails() {
        let err = decode_step(&json!(42)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type mismatch at $: expected a step: a string, a list of strings or a mapping, \
             found a number"
        );
    }

    #[test]
    fn test_list_with_non_strings_fails() {
        let err = decode_step(&json!(["echo", 1])).unwrap_err();
        assert!(err.is_type_mismatch());
    }

    #[test]
    fn test_nested_matrix_error_keeps_kind() {
        let err = decode_step(&json!({
            "run": "make",
            "strategy": {"matrix": {"exclude": ["linux"]}}
        }))
        .unwrap_err();
        assert!(err.is_malformed_reserved_key());
        assert_eq!(err.path().to_string(), "$.strategy.matrix");
    }

    #[test]
    fn test_nested_group_steps() {
        let step = decode_step(&json!({
            "parallel": {
                "parallel": true,
                "steps": [
                    "go vet",
                    {"name": "lint", "run": "golangci-lint run"},
                    {"queue": {"key": "db", "scope": "pipeline"}}
                ]
            }
        }))
        .unwrap();
        let Some(StepPayload::Parallel(group)) = step.payloads.first() else {
            panic!("expected a parallel payload");
        };
        assert_eq!(group.parallel, Some(Concurrency::Enabled(true)));
        assert_eq!(group.steps[1].name.as_deref(), Some("lint"));
        assert!(matches!(
            group.steps[2].payloads.first(),
            Some(StepPayload::Queue(queue)) if queue.scope == Some(QueueScope::Pipeline)
        ));
    }

    #[test]
    fn test_context_is_decoded() {
        let step = decode_step(&json!({
            "run": "make",
            "context": {"matrix": {"os": "linux"}}
        }))
        .unwrap();
        assert_eq!(step.context.unwrap().matrix["os"], "linux");
    }

    #[test]
    fn test_null_fields_are_absent() {
        let step = decode_step(&json!({"name": null, "run": "make", "strategy": null})).unwrap();
        assert!(step.name.is_none());
        assert!(step.strategy.is_none());
    }

    #[test]
    fn test_encode_shorthand_as_structured() {
        let step = decode_step(&json!("make")).unwrap();
        assert_eq!(step.encode().unwrap(), json!({"run": {"script": ["make"]}}));
    }

    #[test]
    fn test_encode_structured_round_trip() {
        let input = json!({
            "id": "build",
            "name": "Build",
            "needs": ["lint"],
            "timeout": 600,
            "strategy": {"matrix": {"go": ["1.21", "1.22"], "exclude": [{"go": "1.21"}]}},
            "run": {"shell": "bash", "script": ["go build"]},
            "uses": "cache",
            "with": {"key": "go-mod"}
        });
        let step = decode_step(&input).unwrap();
        let encoded = step.encode().unwrap();
        assert_eq!(encoded, input);
        assert_eq!(decode_step(&encoded).unwrap(), step);
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = r"
name: test
needs: build
run:
  script:
    - go test ./...
strategy:
  matrix:
    os: [linux, macos]
    include:
      - os: windows
";
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.name.as_deref(), Some("test"));
        let matrix = step.strategy.unwrap().matrix.unwrap();
        assert_eq!(matrix.axis["os"].len(), 2);
        assert_eq!(matrix.include.len(), 1);
    }

    #[test]
    fn test_deserialize_error_message() {
        let err = serde_yaml::from_str::<Step>("needs: {a: 1}\n").unwrap_err();
        assert!(err.to_string().contains("type mismatch at $.needs"));
    }

    #[test]
    fn test_expand_matrix() {
        let step = Step::run("go test").with_strategy(Strategy {
            max_parallel: Some(2),
            ..Strategy::matrix(Matrix::new().with_axis("os", ["linux", "macos"]))
        });
        let expanded = step.expand_matrix();
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].context.as_ref().unwrap().matrix["os"], "linux");
        assert_eq!(expanded[1].context.as_ref().unwrap().matrix["os"], "macos");
        let strategy = expanded[0].strategy.as_ref().unwrap();
        assert!(strategy.matrix.is_none());
        assert_eq!(strategy.max_parallel, Some(2));
    }

    #[test]
    fn test_expand_matrix_drops_empty_strategy() {
        let step = Step::run("go test")
            .with_strategy(Strategy::matrix(Matrix::new().with_axis("os", ["linux"])));
        let expanded = step.expand_matrix();
        assert_eq!(expanded.len(), 1);
        assert!(expanded[0].strategy.is_none());
    }

    #[test]
    fn test_expand_without_matrix() {
        let step = Step::run("make").with_name("build");
        assert_eq!(step.expand_matrix(), vec![step]);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(StepKind::Test.to_string(), "run-test");
        assert_eq!(StepKind::Plugin.to_string(), "uses");
    }
}

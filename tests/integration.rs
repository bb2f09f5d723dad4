//! End-to-end tests for the assistant.
//!
//! Every flow runs through the public builder with stub collaborators: a
//! desktop that records calls, a counting model backend, scripted
//! confirmers, and counting tools standing in for built-ins.

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use steward::assistant::{Assistant, Flow};
use steward::capability::{Capability, CapabilityChain, ComplianceVerdict, JsonlAuditLog};
use steward::config::AssistantConfig;
use steward::dispatch::{Confirmer, DenyAll, Dispatcher, Outcome};
use steward::intent::{Intent, ToolCall};
use steward::llm::{InferenceBackend, LlmError, LlmResult};
use steward::message::{AssistantMessage, VecSink};
use steward::store::{MemStore, SkillStore};
use steward::tool::{
    ContextProviders, DangerLevel, Desktop, PowerAction, Tool, ToolContext, ToolInput,
    ToolParam, ToolRegistry, ToolResult, ToolSignature, VolumeDirection,
};

// ── Stubs ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingDesktop {
    calls: Mutex<Vec<String>>,
}

impl RecordingDesktop {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: String) -> io::Result<()> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl Desktop for RecordingDesktop {
    fn open_url(&self, url: &str) -> io::Result<()> {
        self.push(format!("url {url}"))
    }
    fn launch(&self, command: &str) -> io::Result<()> {
        self.push(format!("launch {command}"))
    }
    fn type_text(&self, text: &str) -> io::Result<()> {
        self.push(format!("type {text}"))
    }
    fn volume(&self, direction: VolumeDirection) -> io::Result<()> {
        self.push(format!("volume {direction:?}"))
    }
    fn power(&self, action: PowerAction) -> io::Result<()> {
        self.push(format!("power {action}"))
    }
}

/// Model stub that counts calls and answers with a fixed reply.
struct CountingModel {
    calls: Arc<AtomicUsize>,
    reply: Option<&'static str>,
}

impl InferenceBackend for CountingModel {
    fn generate(&self, _prompt: &str, _system: Option<&str>) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Some(reply) => Ok(reply.to_string()),
            None => Err(LlmError::Unavailable {
                url: "http://localhost:11434".into(),
            }),
        }
    }
}

/// Answers every confirmation with the same line.
struct Scripted(&'static str);

impl Confirmer for Scripted {
    fn ask(&self, _prompt: &str, _timeout: Duration) -> Option<String> {
        Some(self.0.to_string())
    }
}

/// A tool that counts invocations and echoes its arguments.
struct Counting {
    name: &'static str,
    params: Vec<ToolParam>,
    danger: DangerLevel,
    calls: Arc<AtomicUsize>,
}

impl Counting {
    fn new(name: &'static str) -> (Box<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let tool = Box::new(Self {
            name,
            params: vec![],
            danger: DangerLevel::Safe,
            calls: Arc::clone(&calls),
        });
        (tool, calls)
    }

    fn with_param(mut self: Box<Self>, name: &str) -> Box<Self> {
        self.params.push(ToolParam::required(name, "test parameter"));
        self
    }

    fn critical(mut self: Box<Self>) -> Box<Self> {
        self.danger = DangerLevel::Critical;
        self
    }
}

impl Tool for Counting {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: self.name.into(),
            description: "counting stub".into(),
            parameters: self.params.clone(),
            injected: vec![],
            danger: self.danger,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut args: Vec<String> = input
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        args.sort();
        Ok(format!("{} ran {}", self.name, args.join(",")))
    }
}

/// Capability that counts compliance checks and answers a fixed verdict.
struct Gate {
    name: &'static str,
    allow: bool,
    checks: Arc<AtomicUsize>,
}

impl Capability for Gate {
    fn name(&self) -> &str {
        self.name
    }

    fn check_compliance(&self, _intent: &Intent) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.allow
    }
}

fn quiet_config() -> AssistantConfig {
    let mut config = AssistantConfig::default();
    config.dispatch.composite_pause_ms = 0;
    config.dispatch.skill_step_pause_ms = 0;
    config
}

fn counting_model(reply: Option<&'static str>) -> (Arc<CountingModel>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let model = Arc::new(CountingModel {
        calls: Arc::clone(&calls),
        reply,
    });
    (model, calls)
}

// ── Resolution ──────────────────────────────────────────────────────────

#[test]
fn pattern_hits_never_reach_the_model() {
    let (model, calls) = counting_model(Some(r#"{"type":"get_date"}"#));
    let assistant = Assistant::builder(quiet_config())
        .output(Arc::new(VecSink::new()))
        .desktop(Arc::new(RecordingDesktop::default()))
        .backend(model)
        .build();

    for text in [
        "what time is it",
        "steward, what is the date",
        "open notepad",
        "play bohemian rhapsody on youtube",
        "weather in paris",
        "remember that the keys are in the drawer",
    ] {
        let first = assistant.resolve(text);
        let second = assistant.resolve(text);
        assert_eq!(first, second, "{text}");
        assert!(!first.is_unknown(), "{text}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn politeness_suffix_does_not_change_the_target() {
    let assistant = Assistant::builder(quiet_config())
        .output(Arc::new(VecSink::new()))
        .desktop(Arc::new(RecordingDesktop::default()))
        .build();
    let plain = assistant.resolve("open notepad");
    let polite = assistant.resolve("open notepad please");
    assert_eq!(
        plain,
        Intent::OpenSomething {
            target: "notepad".into()
        }
    );
    assert_eq!(plain, polite);
}

#[test]
fn polite_open_escalates_to_the_model() {
    let (model, calls) =
        counting_model(Some(r#"Sure: {"type":"open_something","target":"youtube"}"#));
    let assistant = Assistant::builder(quiet_config())
        .output(Arc::new(VecSink::new()))
        .desktop(Arc::new(RecordingDesktop::default()))
        .backend(model)
        .build();

    let intent = assistant.resolve("open youtube please");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        intent,
        Intent::OpenSomething {
            target: "youtube".into()
        }
    );
}

#[test]
fn unreachable_model_degrades_to_pattern_result() {
    let (model, calls) = counting_model(None);
    let sink = Arc::new(VecSink::new());
    let assistant = Assistant::builder(quiet_config())
        .output(sink.clone())
        .desktop(Arc::new(RecordingDesktop::default()))
        .backend(model)
        .build();

    assert_eq!(assistant.handle_utterance("flibber the jabberwock"), Flow::Continue);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.texts(), vec!["Sorry, I didn't understand that."]);
}

#[test]
fn disabled_llm_never_escalates() {
    let (model, calls) = counting_model(Some(r#"{"type":"get_time"}"#));
    let mut config = quiet_config();
    config.llm.enabled = false;
    let assistant = Assistant::builder(config)
        .output(Arc::new(VecSink::new()))
        .desktop(Arc::new(RecordingDesktop::default()))
        .backend(model)
        .build();
    assert!(assistant.resolve("flibber").is_unknown());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ── Capability chain ────────────────────────────────────────────────────

#[test]
fn compliance_veto_short_circuits() {
    let counters: Vec<Arc<AtomicUsize>> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    let chain = CapabilityChain::new();
    for (i, (name, allow)) in [("a", true), ("b", false), ("c", true)].into_iter().enumerate() {
        chain.register(Arc::new(Gate {
            name,
            allow,
            checks: Arc::clone(&counters[i]),
        }));
    }

    let verdict = chain.check_compliance(&Intent::GetTime);
    assert_eq!(verdict, ComplianceVerdict::Blocked { by: "b".into() });
    let counts: Vec<usize> = counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    assert_eq!(counts, vec![1, 1, 0]);
}

#[test]
fn vetoed_intent_is_reported_as_blocked_and_not_run() {
    let (tool, calls) = Counting::new("get_current_time");
    let sink = Arc::new(VecSink::new());
    let checks = Arc::new(AtomicUsize::new(0));
    let assistant = Assistant::builder(quiet_config())
        .output(sink.clone())
        .desktop(Arc::new(RecordingDesktop::default()))
        .tool(tool)
        .capability(Arc::new(Gate {
            name: "curfew",
            allow: false,
            checks: Arc::clone(&checks),
        }))
        .build();

    assistant.handle_utterance("what time is it");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(checks.load(Ordering::SeqCst), 1);
    match &sink.messages()[0] {
        AssistantMessage::Blocked { capability, text } => {
            assert_eq!(capability, "curfew");
            assert!(text.contains("blocked by the curfew policy"));
        }
        other => panic!("expected a blocked message, got {other:?}"),
    }
}

#[test]
fn prohibited_shell_fragment_is_blocked() {
    let (tool, calls) = Counting::new("execute_system_command");
    let tool = tool.with_param("command").critical();
    let sink = Arc::new(VecSink::new());
    let assistant = Assistant::builder(quiet_config())
        .output(sink.clone())
        .desktop(Arc::new(RecordingDesktop::default()))
        .confirmer(Arc::new(Scripted("yes")))
        .tool(tool)
        .build();

    assistant.handle_utterance("run command rm -rf /");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(matches!(
        &sink.messages()[0],
        AssistantMessage::Blocked { capability, .. } if capability == "compliance"
    ));
}

#[test]
fn provenance_writes_parsed_and_outcome_records() {
    let dir = tempfile::TempDir::new().unwrap();
    let log = dir.path().join("audit.jsonl");
    let (tool, _) = Counting::new("get_current_time");
    let assistant = Assistant::builder(quiet_config())
        .output(Arc::new(VecSink::new()))
        .desktop(Arc::new(RecordingDesktop::default()))
        .audit(Arc::new(JsonlAuditLog::new(&log)))
        .tool(tool)
        .build();

    assistant.handle_utterance("what time is it");
    let content = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["outcome"], "parsed");
    assert_eq!(lines[0]["intent"]["type"], "get_time");
    assert_eq!(lines[1]["outcome"], "completed");
}

#[test]
fn output_hooks_rewrite_replies() {
    struct Shout;
    impl Capability for Shout {
        fn name(&self) -> &str {
            "shout"
        }
        fn on_output_generation(&self, text: String) -> String {
            text.to_uppercase()
        }
    }

    let (tool, _) = Counting::new("get_current_time");
    let sink = Arc::new(VecSink::new());
    let assistant = Assistant::builder(quiet_config())
        .output(sink.clone())
        .desktop(Arc::new(RecordingDesktop::default()))
        .tool(tool)
        .capability(Arc::new(Shout))
        .build();

    assistant.handle_utterance("what time is it");
    assert_eq!(sink.texts(), vec!["GET_CURRENT_TIME RAN "]);

    assert!(assistant.chain().set_enabled("shout", false));
    assistant.handle_utterance("what time is it");
    assert_eq!(sink.texts()[1], "get_current_time ran ");
}

// ── Dispatch ────────────────────────────────────────────────────────────

fn dispatcher(registry: ToolRegistry, confirmer: Arc<dyn Confirmer>) -> Dispatcher {
    let providers = ContextProviders::new(Arc::new(quiet_config()));
    Dispatcher::new(Arc::new(registry), providers, confirmer)
}

#[test]
fn shutdown_without_confirmation_is_cancelled() {
    let (tool, calls) = Counting::new("control_system_power");
    let mut registry = ToolRegistry::new();
    registry.register(tool.with_param("action").critical());
    let dispatcher = dispatcher(registry, Arc::new(DenyAll));

    let intent: Intent =
        serde_json::from_str(r#"{"type":"system_control","action":"shutdown"}"#).unwrap();
    let outcome = dispatcher.execute(&intent);
    assert_eq!(
        outcome,
        Outcome::Cancelled {
            tool: "control_system_power".into()
        }
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn confirmed_shutdown_reaches_the_desktop() {
    let desktop = Arc::new(RecordingDesktop::default());
    let sink = Arc::new(VecSink::new());
    let assistant = Assistant::builder(quiet_config())
        .output(sink.clone())
        .desktop(desktop.clone())
        .confirmer(Arc::new(Scripted("yes, do it")))
        .build();

    assistant.handle_utterance("shutdown the computer");
    assert_eq!(desktop.calls(), vec!["power shutdown"]);
    assert_eq!(sink.texts(), vec!["Shutting down the system."]);
}

#[test]
fn declined_shutdown_is_cancelled() {
    let desktop = Arc::new(RecordingDesktop::default());
    let sink = Arc::new(VecSink::new());
    let assistant = Assistant::builder(quiet_config())
        .output(sink.clone())
        .desktop(desktop.clone())
        .confirmer(Arc::new(Scripted("no")))
        .build();

    assistant.handle_utterance("shutdown the computer");
    assert!(desktop.calls().is_empty());
    assert_eq!(sink.texts(), vec!["Okay, cancelled."]);
}

#[test]
fn argument_mismatch_is_isolated() {
    let (weather, weather_calls) = Counting::new("get_weather");
    let (clock, clock_calls) = Counting::new("get_current_time");
    let mut registry = ToolRegistry::new();
    registry.register(weather.with_param("location"));
    registry.register(clock);
    let dispatcher = dispatcher(registry, Arc::new(DenyAll));

    let outcome = dispatcher.execute_call(&ToolCall {
        tool_name: "get_weather".into(),
        arguments: BTreeMap::new(),
    });
    match &outcome {
        Outcome::ArgumentMismatch { tool, detail } => {
            assert_eq!(tool, "get_weather");
            assert!(detail.contains("location"));
        }
        other => panic!("expected argument mismatch, got {other:?}"),
    }
    assert_eq!(weather_calls.load(Ordering::SeqCst), 0);

    let next = dispatcher.execute(&Intent::GetTime);
    assert!(next.is_completed());
    assert_eq!(clock_calls.load(Ordering::SeqCst), 1);

    let retry = dispatcher.execute_call(&ToolCall::new("get_weather").arg("location", "oslo"));
    assert_eq!(retry.message(), "get_weather ran location=oslo");
}

#[test]
fn learned_tool_call_dispatches_by_name() {
    let (model, _) = counting_model(Some(
        r#"{"tool_name":"search_web","arguments":{"query":"rust ownership"}}"#,
    ));
    let desktop = Arc::new(RecordingDesktop::default());
    let sink = Arc::new(VecSink::new());
    let assistant = Assistant::builder(quiet_config())
        .output(sink.clone())
        .desktop(desktop.clone())
        .backend(model)
        .build();

    assistant.handle_utterance("zorp about rust ownership");
    assert_eq!(sink.texts(), vec!["Searching for rust ownership on Google."]);
    assert_eq!(desktop.calls().len(), 1);
}

// ── Skills ──────────────────────────────────────────────────────────────

#[test]
fn skill_round_trip_replays_in_order() {
    let (time, time_calls) = Counting::new("get_current_time");
    let (date, date_calls) = Counting::new("get_current_date");
    let store = Arc::new(MemStore::new());
    let sink = Arc::new(VecSink::new());
    let assistant = Assistant::builder(quiet_config())
        .output(sink.clone())
        .desktop(Arc::new(RecordingDesktop::default()))
        .store(store.clone())
        .tool(time)
        .tool(date)
        .build();

    assistant.handle_utterance("start learning demo");
    assistant.handle_utterance("hello");
    assistant.handle_utterance("what time is it");
    assistant.handle_utterance("what is the date");
    assistant.handle_utterance("stop learning");

    assert_eq!(time_calls.load(Ordering::SeqCst), 0);
    assert_eq!(date_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        store.get_skill("demo").unwrap(),
        Some(vec![Intent::GetTime, Intent::GetDate])
    );
    assert_eq!(
        sink.texts().last().map(String::as_str),
        Some("I have learned the skill demo with 2 steps.")
    );

    sink.clear();
    assistant.handle_utterance("run skill demo");
    assert_eq!(
        sink.texts(),
        vec![
            "Executing skill: demo",
            "get_current_time ran ",
            "get_current_date ran ",
            "Skill execution complete.",
        ]
    );
}

#[test]
fn run_skill_while_recording_is_not_captured() {
    let (time, time_calls) = Counting::new("get_current_time");
    let store = Arc::new(MemStore::new());
    store.put_skill("clock", &[Intent::GetTime]).unwrap();
    let assistant = Assistant::builder(quiet_config())
        .output(Arc::new(VecSink::new()))
        .desktop(Arc::new(RecordingDesktop::default()))
        .store(store.clone())
        .tool(time)
        .build();

    assistant.handle_utterance("start learning outer");
    assistant.handle_utterance("run skill clock");
    assert_eq!(time_calls.load(Ordering::SeqCst), 1);
    assistant.handle_utterance("what is the date");
    assistant.handle_utterance("stop learning");
    assert_eq!(
        store.get_skill("outer").unwrap(),
        Some(vec![Intent::GetDate])
    );
}

// ── Composite utterances and lifecycle ──────────────────────────────────

#[test]
fn composite_commands_run_in_spoken_order() {
    let desktop = Arc::new(RecordingDesktop::default());
    let sink = Arc::new(VecSink::new());
    let assistant = Assistant::builder(quiet_config())
        .output(sink.clone())
        .desktop(desktop.clone())
        .build();

    assistant.handle_utterance("open notepad and open calculator");
    assert_eq!(
        desktop.calls(),
        vec!["launch gedit", "launch gnome-calculator"]
    );
    assert_eq!(sink.len(), 2);
}

#[test]
fn exit_stops_remaining_sub_commands() {
    let desktop = Arc::new(RecordingDesktop::default());
    let assistant = Assistant::builder(quiet_config())
        .output(Arc::new(VecSink::new()))
        .desktop(desktop.clone())
        .build();

    assert_eq!(
        assistant.handle_utterance("exit and open notepad"),
        Flow::Exit
    );
    assert!(desktop.calls().is_empty());
}

#[test]
fn notes_and_preferences_flow_through_tools() {
    let sink = Arc::new(VecSink::new());
    let assistant = Assistant::builder(quiet_config())
        .output(sink.clone())
        .desktop(Arc::new(RecordingDesktop::default()))
        .build();

    assistant.handle_utterance("remember that the keys are in the drawer");
    assistant.handle_utterance("what do you remember");
    let texts = sink.texts();
    assert_eq!(texts[0], "I will remember that: the keys are in the drawer");
    assert_eq!(texts[1], "You told me: the keys are in the drawer");
}

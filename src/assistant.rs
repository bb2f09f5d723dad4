//! The assistant: one utterance in, typed replies out.
//!
//! [`Assistant::handle_utterance`] drives the whole flow for a single line of
//! user text: input hooks, composite splitting, two-tier resolution, intent
//! hooks and the compliance veto, then either the skill recorder, a
//! conversational answer, a skill replay, or the dispatcher. Every reply goes
//! through the output hooks before it reaches the [`MessageSink`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::seq::SliceRandom;

use crate::capability::{
    ActionProvenance, AuditSink, Capability, CapabilityChain, ComplianceEngine,
    ComplianceVerdict, CostOptimizer, PrivacyManager,
};
use crate::config::AssistantConfig;
use crate::dispatch::{Confirmer, DenyAll, Dispatcher, Outcome};
use crate::intent::{Intent, IntentPipeline, LearnedResolver, PatternResolver, split_composite};
use crate::llm::InferenceBackend;
use crate::message::{AssistantMessage, MessageSink, StdoutSink};
use crate::skills::{RecorderState, ReplayStep, SkillRecorder, begin_message, replay};
use crate::speech::SpeechQueue;
use crate::store::{AssistantStore, MemStore};
use crate::tool::{ContextProviders, Desktop, SystemDesktop, Tool, ToolRegistry, VisionHandle};
use crate::tools::{Builtins, register_builtin};

const GREETINGS: &[&str] = &["Hello.", "At your service.", "Online and ready.", "Greetings."];

/// Whether the caller should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Assembles an [`Assistant`] from its collaborators.
///
/// Everything except the configuration has a default: an in-memory store,
/// the process-spawning desktop, stdout output, and a confirmer that
/// declines every dangerous action.
pub struct AssistantBuilder {
    config: AssistantConfig,
    store: Option<Arc<dyn AssistantStore>>,
    desktop: Option<Arc<dyn Desktop>>,
    output: Option<Arc<dyn MessageSink>>,
    speech: Option<Arc<SpeechQueue>>,
    confirmer: Option<Arc<dyn Confirmer>>,
    backend: Option<Arc<dyn InferenceBackend>>,
    vision: Option<Arc<dyn VisionHandle>>,
    audit: Option<Arc<dyn AuditSink>>,
    tools: Vec<Box<dyn Tool>>,
    capabilities: Vec<Arc<dyn Capability>>,
    downloads_dir: Option<PathBuf>,
    builtins: bool,
}

impl AssistantBuilder {
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            config,
            store: None,
            desktop: None,
            output: None,
            speech: None,
            confirmer: None,
            backend: None,
            vision: None,
            audit: None,
            tools: Vec::new(),
            capabilities: Vec::new(),
            downloads_dir: None,
            builtins: true,
        }
    }

    pub fn store(mut self, store: Arc<dyn AssistantStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn desktop(mut self, desktop: Arc<dyn Desktop>) -> Self {
        self.desktop = Some(desktop);
        self
    }

    /// Emit replies directly to `sink` on the calling thread.
    pub fn output(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.output = Some(sink);
        self.speech = None;
        self
    }

    /// Emit replies through a running output worker.
    pub fn speech(mut self, queue: Arc<SpeechQueue>) -> Self {
        self.output = Some(Arc::clone(&queue) as Arc<dyn MessageSink>);
        self.speech = Some(queue);
        self
    }

    pub fn confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    /// Model used for the learned resolver and as the generator handed to
    /// tools. The learned tier is only attached when `llm.enabled` is set.
    pub fn backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn vision(mut self, vision: Arc<dyn VisionHandle>) -> Self {
        self.vision = Some(vision);
        self
    }

    /// Append-only log for the provenance capability.
    pub fn audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Register an extra tool. A tool named like a built-in replaces it.
    pub fn tool(mut self, tool: Box<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Register an extra capability after the built-in set.
    pub fn capability(mut self, capability: Arc<dyn Capability>) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn downloads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.downloads_dir = Some(dir.into());
        self
    }

    /// Skip the built-in tool catalog.
    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    pub fn build(self) -> Assistant {
        let config = Arc::new(self.config);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemStore::new()) as Arc<dyn AssistantStore>);
        let desktop = self
            .desktop
            .unwrap_or_else(|| Arc::new(SystemDesktop) as Arc<dyn Desktop>);
        let output = self
            .output
            .unwrap_or_else(|| Arc::new(StdoutSink) as Arc<dyn MessageSink>);
        let confirmer = self
            .confirmer
            .unwrap_or_else(|| Arc::new(DenyAll) as Arc<dyn Confirmer>);

        let mut registry = ToolRegistry::new();
        if self.builtins {
            let downloads_dir = self
                .downloads_dir
                .unwrap_or_else(|| std::env::temp_dir().join("steward-downloads"));
            register_builtin(
                &mut registry,
                &Builtins {
                    desktop,
                    store: Arc::clone(&store),
                    downloads_dir,
                },
            );
        }
        for tool in self.tools {
            registry.register(tool);
        }

        let pattern = PatternResolver::new(config.wake_word.clone(), config.known_apps());
        let mut pipeline = IntentPipeline::new(config.wake_word.clone(), pattern);
        let mut providers = ContextProviders::new(Arc::clone(&config));
        if let Some(backend) = &self.backend {
            if config.llm.enabled {
                pipeline =
                    pipeline.with_learned(LearnedResolver::new(Arc::clone(backend), &registry.list()));
            }
            providers = providers.with_generator(Arc::clone(backend));
        }
        if let Some(vision) = self.vision {
            providers = providers.with_vision(vision);
        }

        let caps = &config.capabilities;
        let chain = Arc::new(CapabilityChain::new());
        chain.register(Arc::new(PrivacyManager::new(caps.privacy.scrub_input)));
        chain.register(Arc::new(ComplianceEngine::new(&caps.compliance)));
        if let Some(audit) = self.audit {
            if caps.provenance.enabled {
                chain.register(Arc::new(ActionProvenance::new(audit)));
            }
        }
        chain.register(Arc::new(CostOptimizer::new(&caps.cost)));
        for capability in self.capabilities {
            chain.register(capability);
        }

        let dispatch = &config.dispatch;
        let composite_pause = Duration::from_millis(dispatch.composite_pause_ms);
        let skill_pause = Duration::from_millis(dispatch.skill_step_pause_ms);

        tracing::info!(
            tools = registry.len(),
            capabilities = chain.len(),
            learned = pipeline.has_learned(),
            "assistant assembled"
        );

        Assistant {
            dispatcher: Dispatcher::new(
                Arc::new(registry),
                providers,
                Arc::new(HookedConfirmer {
                    chain: Arc::clone(&chain),
                    inner: confirmer,
                }),
            ),
            recorder: Mutex::new(SkillRecorder::new(Arc::clone(&store).into_skill_store())),
            chain,
            config,
            pipeline,
            store,
            output,
            speech: self.speech,
            composite_pause,
            skill_pause,
        }
    }
}

/// Passes confirmation prompts through the output hooks before asking.
struct HookedConfirmer {
    chain: Arc<CapabilityChain>,
    inner: Arc<dyn Confirmer>,
}

impl Confirmer for HookedConfirmer {
    fn ask(&self, prompt: &str, timeout: Duration) -> Option<String> {
        let prompt = self.chain.process_output(prompt.to_string());
        self.inner.ask(&prompt, timeout)
    }
}

/// The assembled command assistant.
pub struct Assistant {
    config: Arc<AssistantConfig>,
    pipeline: IntentPipeline,
    chain: Arc<CapabilityChain>,
    dispatcher: Dispatcher,
    store: Arc<dyn AssistantStore>,
    recorder: Mutex<SkillRecorder>,
    output: Arc<dyn MessageSink>,
    speech: Option<Arc<SpeechQueue>>,
    composite_pause: Duration,
    skill_pause: Duration,
}

impl Assistant {
    pub fn builder(config: AssistantConfig) -> AssistantBuilder {
        AssistantBuilder::new(config)
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn chain(&self) -> &CapabilityChain {
        &self.chain
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    pub fn store(&self) -> &Arc<dyn AssistantStore> {
        &self.store
    }

    pub fn recorder_state(&self) -> RecorderState {
        self.recorder
            .lock()
            .expect("recorder lock poisoned")
            .state()
            .clone()
    }

    /// Run every capability's start hook.
    pub fn start(&self) {
        self.chain.start();
    }

    /// Run every capability's shutdown hook and drain queued output.
    ///
    /// A skill still being recorded is saved first.
    pub fn shutdown(&self) {
        self.close_recording();
        self.chain.shutdown();
        if let Some(speech) = &self.speech {
            speech.shutdown();
        }
    }

    /// Resolve `text` without dispatching anything.
    ///
    /// Input hooks run; intent hooks do not, so nothing is audited.
    pub fn resolve(&self, text: &str) -> Intent {
        let text = self.chain.process_input(text.to_string());
        self.pipeline.resolve(&text)
    }

    /// Handle one line of user text, which may hold several sub-commands
    /// joined by " and ".
    pub fn handle_utterance(&self, text: &str) -> Flow {
        let text = self.chain.process_input(text.to_string());
        let pieces = split_composite(&text);
        if pieces.len() > 1 {
            tracing::debug!(parts = pieces.len(), "composite utterance");
        }
        for (i, piece) in pieces.iter().enumerate() {
            if i > 0 && !self.composite_pause.is_zero() {
                std::thread::sleep(self.composite_pause);
            }
            if self.handle_command(piece) == Flow::Exit {
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    fn handle_command(&self, text: &str) -> Flow {
        let normalized = self.pipeline.normalize(text);
        let intent = self.chain.process_intent(self.pipeline.resolve(text));
        tracing::debug!(intent = %intent, "resolved");

        if let ComplianceVerdict::Blocked { by } = self.chain.check_compliance(&intent) {
            tracing::warn!(intent = %intent, capability = %by, "intent blocked");
            let outcome = Outcome::Blocked { capability: by };
            self.chain.observe_outcome(&intent, &outcome);
            self.say(outcome.to_message());
            return Flow::Continue;
        }

        if matches!(intent, Intent::Exit) {
            self.close_recording();
            self.say(AssistantMessage::reply("Shutting down. Goodbye."));
            return Flow::Exit;
        }

        let event = self
            .recorder
            .lock()
            .expect("recorder lock poisoned")
            .observe(&normalized, &intent);
        if let Some(event) = event {
            self.say(AssistantMessage::system(event.message()));
            return Flow::Continue;
        }

        match &intent {
            Intent::ExecuteSkill { skill_name } => self.run_skill(skill_name),
            other if other.is_conversational() => self.converse(other),
            other => self.dispatch(other),
        }
        Flow::Continue
    }

    fn close_recording(&self) {
        let event = self
            .recorder
            .lock()
            .expect("recorder lock poisoned")
            .close();
        if let Some(event) = event {
            self.say(AssistantMessage::system(event.message()));
        }
    }

    fn dispatch(&self, intent: &Intent) {
        let outcome = self.dispatcher.execute(intent);
        self.chain.observe_outcome(intent, &outcome);
        self.say(outcome.to_message());
    }

    fn converse(&self, intent: &Intent) {
        let text = match intent {
            Intent::Greeting => GREETINGS
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or("Hello.")
                .to_string(),
            Intent::Farewell => "Goodbye. I'll be here if you need me.".to_string(),
            Intent::Identity => self.identity(),
            _ => return,
        };
        self.say(AssistantMessage::reply(text));
    }

    fn identity(&self) -> String {
        let mut text = format!(
            "I am {}, your personal assistant.",
            capitalize(&self.config.wake_word)
        );
        match self.store.get_preference("user_name") {
            Ok(Some(name)) => {
                text.push_str(&format!(" And you are {name}."));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to read user name"),
        }
        text
    }

    fn run_skill(&self, name: &str) {
        let report = replay(
            self.store.as_skill_store(),
            name,
            self.skill_pause,
            |step| match step {
                ReplayStep::Begin { name, .. } => {
                    self.say(AssistantMessage::system(begin_message(name)));
                }
                ReplayStep::Step { index, intent } => self.replay_step(index, intent),
            },
        );
        self.say(AssistantMessage::system(report.message()));
    }

    /// One stored step: compliance is rechecked, skill and exit commands are
    /// skipped, and everything else runs as if just spoken.
    fn replay_step(&self, index: usize, intent: &Intent) {
        tracing::debug!(step = index, intent = %intent, "replay step");
        if let ComplianceVerdict::Blocked { by } = self.chain.check_compliance(intent) {
            tracing::warn!(intent = %intent, capability = %by, "replayed step blocked");
            let outcome = Outcome::Blocked { capability: by };
            self.chain.observe_outcome(intent, &outcome);
            self.say(outcome.to_message());
            return;
        }
        match intent {
            Intent::Exit
            | Intent::ExecuteSkill { .. }
            | Intent::StartLearning { .. }
            | Intent::StopLearning => {
                tracing::info!(intent = %intent, "skipping control step during replay");
            }
            other if other.is_conversational() => self.converse(other),
            other => self.dispatch(other),
        }
    }

    fn say(&self, msg: AssistantMessage) {
        let msg = msg.map_text(|t| self.chain.process_output(t));
        self.output.emit(&msg);
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("tools", &self.registry().len())
            .field("chain", &self.chain)
            .field("recorder", &self.recorder_state())
            .finish()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::VecSink;
    use crate::store::{NoteStore, SkillStore};
    use crate::tool::{DangerLevel, ToolContext, ToolInput, ToolResult, ToolSignature};
    use crate::tools::testing::RecordingDesktop;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quiet_config() -> AssistantConfig {
        let mut config = AssistantConfig::default();
        config.dispatch.composite_pause_ms = 0;
        config.dispatch.skill_step_pause_ms = 0;
        config.llm.enabled = false;
        config
    }

    fn assistant() -> (Assistant, Arc<VecSink>, Arc<RecordingDesktop>) {
        let sink = Arc::new(VecSink::new());
        let desktop = Arc::new(RecordingDesktop::default());
        let a = Assistant::builder(quiet_config())
            .output(sink.clone())
            .desktop(desktop.clone())
            .build();
        (a, sink, desktop)
    }

    struct Echo {
        calls: Arc<AtomicUsize>,
    }

    impl Tool for Echo {
        fn signature(&self) -> ToolSignature {
            ToolSignature {
                name: "get_current_time".into(),
                description: "Counting clock.".into(),
                parameters: vec![],
                injected: vec![],
                danger: DangerLevel::Safe,
            }
        }

        fn execute(&self, _ctx: &ToolContext, _input: ToolInput) -> ToolResult<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("tick {n}"))
        }
    }

    #[test]
    fn exit_stops_the_loop() {
        let (a, sink, _) = assistant();
        assert_eq!(a.handle_utterance("exit"), Flow::Exit);
        assert_eq!(sink.texts(), vec!["Shutting down. Goodbye."]);
    }

    #[test]
    fn farewell_keeps_running() {
        let (a, sink, _) = assistant();
        assert_eq!(a.handle_utterance("goodbye"), Flow::Continue);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn greeting_is_one_of_the_set() {
        let (a, sink, _) = assistant();
        a.handle_utterance("hello");
        let texts = sink.texts();
        assert!(GREETINGS.contains(&texts[0].as_str()));
    }

    #[test]
    fn identity_uses_the_stored_name() {
        let (a, sink, _) = assistant();
        a.handle_utterance("who are you");
        assert_eq!(sink.texts()[0], "I am Steward, your personal assistant.");
        a.store().set_preference("user_name", "Ada").unwrap();
        a.handle_utterance("who are you");
        assert_eq!(
            sink.texts()[1],
            "I am Steward, your personal assistant. And you are Ada."
        );
    }

    #[test]
    fn composite_runs_in_spoken_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(VecSink::new());
        let a = Assistant::builder(quiet_config())
            .output(sink.clone())
            .desktop(Arc::new(RecordingDesktop::default()))
            .tool(Box::new(Echo {
                calls: calls.clone(),
            }))
            .build();
        a.handle_utterance("what time is it and tell me the time");
        assert_eq!(sink.texts(), vec!["tick 1", "tick 2"]);
    }

    #[test]
    fn recording_withholds_dispatch_until_replay() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(VecSink::new());
        let a = Assistant::builder(quiet_config())
            .output(sink.clone())
            .desktop(Arc::new(RecordingDesktop::default()))
            .tool(Box::new(Echo {
                calls: calls.clone(),
            }))
            .build();

        a.handle_utterance("start learning morning");
        a.handle_utterance("what time is it");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        a.handle_utterance("stop learning");
        assert_eq!(a.recorder_state(), RecorderState::Idle);
        assert_eq!(
            a.store().get_skill("morning").unwrap(),
            Some(vec![Intent::GetTime])
        );

        sink.clear();
        a.handle_utterance("run skill morning");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            sink.texts(),
            vec![
                "Executing skill: morning",
                "tick 1",
                "Skill execution complete."
            ]
        );
    }

    #[test]
    fn exit_while_recording_saves_the_session() {
        let (a, sink, _) = assistant();
        a.handle_utterance("start learning demo");
        a.handle_utterance("what time is it");
        sink.clear();

        assert_eq!(a.handle_utterance("exit"), Flow::Exit);
        assert_eq!(a.recorder_state(), RecorderState::Idle);
        assert_eq!(
            a.store().get_skill("demo").unwrap(),
            Some(vec![Intent::GetTime])
        );
        assert_eq!(
            sink.texts(),
            vec![
                "I have learned the skill demo with 1 step.",
                "Shutting down. Goodbye."
            ]
        );
    }

    #[test]
    fn shutdown_saves_an_open_session() {
        let (a, _, _) = assistant();
        a.handle_utterance("start learning nightly");
        a.handle_utterance("what is the date");
        a.shutdown();
        assert_eq!(
            a.store().get_skill("nightly").unwrap(),
            Some(vec![Intent::GetDate])
        );
    }

    #[test]
    fn unknown_skill_reports_not_found() {
        let (a, sink, _) = assistant();
        a.handle_utterance("run skill nothing");
        assert_eq!(sink.texts(), vec!["I don't know the skill nothing yet."]);
    }

    #[test]
    fn prohibited_power_action_is_blocked() {
        let mut config = quiet_config();
        config.capabilities.compliance.prohibited_actions = vec!["shutdown".into()];
        let sink = Arc::new(VecSink::new());
        let desktop = Arc::new(RecordingDesktop::default());
        let a = Assistant::builder(config)
            .output(sink.clone())
            .desktop(desktop.clone())
            .build();
        a.handle_utterance("shutdown the computer");
        assert!(matches!(
            sink.messages()[0],
            AssistantMessage::Blocked { ref capability, .. } if capability == "compliance"
        ));
        assert!(desktop.calls().is_empty());
    }

    #[test]
    fn dangerous_action_is_cancelled_by_default() {
        let (a, sink, desktop) = assistant();
        a.handle_utterance("restart the computer");
        assert_eq!(sink.texts(), vec!["Okay, cancelled."]);
        assert!(desktop.calls().is_empty());
    }

    struct Shout;

    impl Capability for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn on_output_generation(&self, text: String) -> String {
            text.to_uppercase()
        }
    }

    #[derive(Default)]
    struct Asked {
        prompts: Mutex<Vec<String>>,
        answer: Option<&'static str>,
    }

    impl Confirmer for Asked {
        fn ask(&self, prompt: &str, _timeout: Duration) -> Option<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.map(String::from)
        }
    }

    #[test]
    fn confirmation_prompt_passes_output_hooks() {
        let asked = Arc::new(Asked::default());
        let a = Assistant::builder(quiet_config())
            .output(Arc::new(VecSink::new()))
            .desktop(Arc::new(RecordingDesktop::default()))
            .confirmer(asked.clone())
            .capability(Arc::new(Shout))
            .build();
        a.handle_utterance("restart the computer");
        let prompts = asked.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("ARE YOU SURE YOU WANT TO RUN CONTROL_SYSTEM_POWER"));
    }

    #[test]
    fn prohibited_power_alias_in_a_skill_is_blocked() {
        let mut config = quiet_config();
        config.capabilities.compliance.prohibited_actions = vec!["shutdown".into()];
        let desktop = Arc::new(RecordingDesktop::default());
        let sink = Arc::new(VecSink::new());
        let a = Assistant::builder(config)
            .output(sink.clone())
            .desktop(desktop.clone())
            .confirmer(Arc::new(Asked {
                answer: Some("yes"),
                ..Asked::default()
            }))
            .build();
        a.store()
            .put_skill(
                "lights out",
                &[Intent::SystemControl {
                    action: "poweroff".into(),
                }],
            )
            .unwrap();

        a.handle_utterance("run skill lights out");
        assert!(desktop.calls().is_empty());
        assert!(!sink.texts().iter().any(|t| t == "Shutting down the system."));
    }

    #[test]
    fn open_goes_through_the_desktop() {
        let (a, _, desktop) = assistant();
        a.handle_utterance("open youtube");
        assert_eq!(desktop.calls(), vec!["url https://www.youtube.com"]);
    }

    #[test]
    fn wake_word_is_capitalized() {
        assert_eq!(capitalize("steward"), "Steward");
        assert_eq!(capitalize(""), "");
    }
}

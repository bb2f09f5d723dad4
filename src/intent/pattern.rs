//! Deterministic pattern tier.
//!
//! An ordered table of rules, each a predicate over the normalized utterance
//! that either builds an intent or declines. The first rule that builds an
//! intent wins; nothing backtracks. The tier is pure: no I/O, no clock, no
//! randomness.

use std::sync::LazyLock;

use regex::Regex;

use super::Intent;

static RE_JOKE_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" in (\w+)").unwrap());

static RE_START_LEARNING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:start learning|learn this as|learn skill|learn)\s+(?:skill\s+)?(.+)$").unwrap()
});

static RE_SKILL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:run|execute|perform|do)\s+(?:the\s+)?skill\s+(.+)$").unwrap()
});

static RE_SKILL_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:run|execute|perform|do)\s+(?:the\s+)?(.+?)\s+skill$").unwrap()
});

static RE_AND_SEND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i) and send ").unwrap());
static RE_TO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i) to ").unwrap());
static RE_AND_PLAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i) and play ").unwrap());
static RE_AND_SEARCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i) and search(?: for)? ").unwrap());

static RE_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(?:type|write)\s+(.+)$").unwrap());

const GREETINGS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "hello there",
    "hey there",
    "good morning",
    "good afternoon",
    "good evening",
];
const FAREWELLS: &[&str] = &["bye", "goodbye", "see you", "good night"];
const EXITS: &[&str] = &["exit", "quit", "shutdown yourself", "stop listening"];
const IDENTITY: &[&str] = &[
    "who are you",
    "what are you",
    "introduce yourself",
    "who am i",
    "what is my name",
    "what's my name",
    "do you know me",
];
const MACHINE_WORDS: &[&str] = &["pc", "laptop", "computer", "system"];
const POLITENESS: &[&str] = &[" please", " thanks", " now"];
const QUESTION_STARTERS: &[&str] = &["where is", "who is", "what is", "how to", "when is"];
const RECALL: &[&str] = &[
    "what do you remember",
    "what are my notes",
    "show my notes",
    "read my notes",
    "recall",
];

/// Phrase groups for vision commands, checked in order.
const VISION_RULES: &[(&[&str], VisionRule)] = &[
    (
        &["activate vision", "enable vision", "start camera", "turn on eyes"],
        VisionRule::Start("monitoring"),
    ),
    (
        &["stop vision", "disable vision", "close camera", "turn off eyes"],
        VisionRule::Stop,
    ),
    (
        &["virtual keyboard", "air keyboard", "enable keyboard"],
        VisionRule::Start("keyboard"),
    ),
    (
        &["click picture", "click my picture", "take photo", "take selfie", "capture photo"],
        VisionRule::Capture,
    ),
    (&["count fingers", "how many fingers"], VisionRule::Start("counting")),
    (
        &["what is this", "what am i showing", "describe this", "what do you see"],
        VisionRule::Describe,
    ),
    (
        &["mouse control", "control mouse", "cursor mode", "enable mouse"],
        VisionRule::Start("mouse"),
    ),
    (
        &["drawing mode", "start drawing", "i want to draw", "enable drawing"],
        VisionRule::Start("drawing"),
    ),
    (
        &["gesture control", "volume gesture", "hand gestures", "enable gestures"],
        VisionRule::Start("gestures"),
    ),
];

#[derive(Debug, Clone, Copy)]
enum VisionRule {
    Start(&'static str),
    Stop,
    Capture,
    Describe,
}

/// A normalized utterance plus the resolver context the rules need.
struct Utterance<'a> {
    text: &'a str,
    words: Vec<&'a str>,
    wake_word: &'a str,
    known_apps: &'a [String],
}

impl<'a> Utterance<'a> {
    fn new(text: &'a str, wake_word: &'a str, known_apps: &'a [String]) -> Self {
        let words = text
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .collect();
        Self {
            text,
            words,
            wake_word,
            known_apps,
        }
    }

    /// Word-boundary phrase match.
    fn has(&self, phrase: &str) -> bool {
        let needle: Vec<&str> = phrase.split(' ').collect();
        self.words
            .windows(needle.len())
            .any(|window| window == needle.as_slice())
    }

    fn has_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.has(p))
    }

    fn starts_with_any(&self, prefixes: &[&str]) -> bool {
        prefixes.iter().any(|p| self.text.starts_with(p))
    }
}

/// One entry in the ordered rule table.
struct Rule {
    name: &'static str,
    apply: fn(&Utterance<'_>) -> Option<Intent>,
}

const RULES: &[Rule] = &[
    Rule { name: "greeting", apply: greeting },
    Rule { name: "farewell", apply: farewell },
    Rule { name: "exit", apply: exit },
    Rule { name: "skill_control", apply: skill_control },
    Rule { name: "joke", apply: joke },
    Rule { name: "identity", apply: identity },
    Rule { name: "system_control", apply: system_control },
    Rule { name: "vision", apply: vision },
    Rule { name: "weather", apply: weather },
    Rule { name: "wikipedia", apply: wikipedia },
    Rule { name: "time", apply: time },
    Rule { name: "play", apply: play },
    Rule { name: "date", apply: date },
    Rule { name: "open", apply: open },
    Rule { name: "send", apply: send },
    Rule { name: "search", apply: search },
    Rule { name: "question", apply: question },
    Rule { name: "type", apply: keyboard_type },
    Rule { name: "volume", apply: volume },
    Rule { name: "download", apply: download },
    Rule { name: "command", apply: command },
    Rule { name: "remember", apply: remember },
    Rule { name: "recall", apply: recall },
];

/// Rule-ordered text-to-intent mapper.
#[derive(Debug, Clone)]
pub struct PatternResolver {
    wake_word: String,
    known_apps: Vec<String>,
}

impl PatternResolver {
    pub fn new(wake_word: impl Into<String>, known_apps: Vec<String>) -> Self {
        Self {
            wake_word: wake_word.into().to_lowercase(),
            known_apps: known_apps.into_iter().map(|a| a.to_lowercase()).collect(),
        }
    }

    /// Resolve already-normalized text (lower-case, wake word stripped).
    ///
    /// Total: text no rule accepts becomes [`Intent::Unknown`] carrying it.
    pub fn resolve(&self, text: &str) -> Intent {
        let utterance = Utterance::new(text, &self.wake_word, &self.known_apps);
        for rule in RULES {
            if let Some(intent) = (rule.apply)(&utterance) {
                tracing::debug!(rule = rule.name, intent = %intent, "pattern rule matched");
                return intent;
            }
        }
        Intent::unknown(text)
    }
}

fn greeting(u: &Utterance<'_>) -> Option<Intent> {
    let text = u.text;
    let bare = text
        .strip_suffix(u.wake_word)
        .map(str::trim)
        .filter(|_| !u.wake_word.is_empty())
        .unwrap_or(text);
    (text.is_empty() || text == u.wake_word || GREETINGS.contains(&bare)).then_some(Intent::Greeting)
}

fn farewell(u: &Utterance<'_>) -> Option<Intent> {
    u.has_any(FAREWELLS).then_some(Intent::Farewell)
}

fn exit(u: &Utterance<'_>) -> Option<Intent> {
    u.has_any(EXITS).then_some(Intent::Exit)
}

fn skill_control(u: &Utterance<'_>) -> Option<Intent> {
    if u.has_any(&["stop learning", "save skill", "finish learning"]) {
        return Some(Intent::StopLearning);
    }
    let skill_name = |re: &Regex| {
        re.captures(u.text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|name| !name.is_empty())
    };
    if let Some(skill_name) = skill_name(&*RE_START_LEARNING) {
        return Some(Intent::StartLearning { skill_name });
    }
    skill_name(&*RE_SKILL_PREFIX)
        .or_else(|| skill_name(&*RE_SKILL_SUFFIX))
        .map(|skill_name| Intent::ExecuteSkill { skill_name })
}

fn joke(u: &Utterance<'_>) -> Option<Intent> {
    if !["joke", "laugh", "funny"].iter().any(|w| u.text.contains(w)) {
        return None;
    }
    let language = RE_JOKE_LANGUAGE
        .captures(u.text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    Some(Intent::Joke { language })
}

fn identity(u: &Utterance<'_>) -> Option<Intent> {
    u.has_any(IDENTITY).then_some(Intent::Identity)
}

fn system_control(u: &Utterance<'_>) -> Option<Intent> {
    let machine = u.has_any(MACHINE_WORDS);
    let action = if u.text == "shutdown" || (u.has("shutdown") && machine) {
        "shutdown"
    } else if u.text == "restart" || (u.has("restart") && machine) {
        "restart"
    } else if u.has("sleep") && (machine || u.has("mode")) {
        "sleep"
    } else {
        return None;
    };
    Some(Intent::SystemControl {
        action: action.into(),
    })
}

fn vision(u: &Utterance<'_>) -> Option<Intent> {
    let (_, rule) = VISION_RULES.iter().find(|(phrases, _)| u.has_any(phrases))?;
    Some(match *rule {
        VisionRule::Start(mode) => Intent::VisionControl {
            action: "start".into(),
            mode: Some(mode.into()),
        },
        VisionRule::Stop => Intent::VisionControl {
            action: "stop".into(),
            mode: None,
        },
        VisionRule::Capture => Intent::VisionCapture,
        VisionRule::Describe => Intent::VisionDescribe,
    })
}

fn weather(u: &Utterance<'_>) -> Option<Intent> {
    if !u.has("weather") {
        return None;
    }
    let location = u
        .text
        .split_once(" in ")
        .map(|(_, loc)| loc.trim().to_string())
        .filter(|loc| !loc.is_empty());
    Some(Intent::Weather { location })
}

fn wikipedia(u: &Utterance<'_>) -> Option<Intent> {
    if u.has("wikipedia") {
        let query = u
            .text
            .replace("wikipedia", "")
            .replace("search", "")
            .split_whitespace()
            .skip_while(|w| matches!(*w, "for" | "on" | "about"))
            .collect::<Vec<_>>()
            .join(" ");
        let query = query
            .strip_prefix("tell me about ")
            .unwrap_or(&query)
            .trim()
            .to_string();
        return (!query.is_empty()).then_some(Intent::Wikipedia { query });
    }
    let query = u.text.strip_prefix("tell me about ")?.trim();
    (!query.is_empty()).then(|| Intent::Wikipedia {
        query: query.to_string(),
    })
}

fn time(u: &Utterance<'_>) -> Option<Intent> {
    u.has_any(&["time", "clock"]).then_some(Intent::GetTime)
}

fn play(u: &Utterance<'_>) -> Option<Intent> {
    let mut song = u.text.strip_prefix("play ")?.trim();
    for suffix in [" from youtube", " on youtube", " youtube"] {
        if let Some(stripped) = song.strip_suffix(suffix) {
            song = stripped.trim();
        }
    }
    (!song.is_empty()).then(|| Intent::PlayMusic {
        song: song.to_string(),
    })
}

fn date(u: &Utterance<'_>) -> Option<Intent> {
    u.has_any(&["date", "day today"]).then_some(Intent::GetDate)
}

/// Drop trailing politeness markers until none remain.
fn strip_politeness(mut target: &str) -> &str {
    loop {
        let before = target;
        for polite in POLITENESS {
            if let Some(stripped) = target.strip_suffix(polite) {
                target = stripped.trim_end();
            }
        }
        if target == before {
            return target;
        }
    }
}

fn open(u: &Utterance<'_>) -> Option<Intent> {
    let target = strip_politeness(u.text.strip_prefix("open ")?.trim());

    if let Some((_, remainder)) = split_once_re(&RE_AND_SEND, target) {
        if let Some((msg, contact)) = split_once_re(&RE_TO, remainder) {
            let (msg, contact) = (msg.trim(), contact.trim());
            if !msg.is_empty() && !contact.is_empty() {
                return Some(Intent::WhatsappMsg {
                    contact: contact.to_string(),
                    msg: msg.to_string(),
                });
            }
        }
    }

    if let Some((_, song)) = split_once_re(&RE_AND_PLAY, target) {
        let song = song.trim();
        if !song.is_empty() {
            return Some(Intent::PlayMusic {
                song: song.to_string(),
            });
        }
    }

    if let Some((site, query)) = split_once_re(&RE_AND_SEARCH, target) {
        let (site, query) = (trim_to_known_app(site.trim(), u.known_apps), query.trim());
        if !site.is_empty() && !query.is_empty() {
            return Some(Intent::OpenWithSearch {
                target: site.to_string(),
                query: query.to_string(),
            });
        }
    }

    let target = trim_to_known_app(target, u.known_apps);
    (!target.is_empty()).then(|| Intent::OpenSomething {
        target: target.to_string(),
    })
}

/// "whatsapp web" → "whatsapp" when "whatsapp" is a known app.
fn trim_to_known_app<'t>(target: &'t str, known_apps: &[String]) -> &'t str {
    for app in known_apps {
        let matches = target == app
            || target
                .strip_prefix(app.as_str())
                .is_some_and(|rest| rest.starts_with(' '));
        if matches {
            return &target[..app.len()];
        }
    }
    target
}

fn split_once_re<'t>(re: &Regex, text: &'t str) -> Option<(&'t str, &'t str)> {
    let m = re.find(text)?;
    Some((&text[..m.start()], &text[m.end()..]))
}

fn send(u: &Utterance<'_>) -> Option<Intent> {
    let rest = u.text.strip_prefix("send ")?;
    let (msg, contact) = rest.split_once(" to ")?;
    let (msg, contact) = (msg.trim(), contact.trim());
    (!msg.is_empty() && !contact.is_empty()).then(|| Intent::WhatsappMsg {
        contact: contact.to_string(),
        msg: msg.to_string(),
    })
}

fn search(u: &Utterance<'_>) -> Option<Intent> {
    let query = u.text.strip_prefix("search ")?.trim();
    if query.contains(" and play") {
        let song = query.replace(" and play", "").trim().to_string();
        return (!song.is_empty()).then_some(Intent::PlayMusic { song });
    }
    let query = query.strip_prefix("for ").unwrap_or(query).trim();
    (!query.is_empty()).then(|| Intent::WebSearch {
        query: query.to_string(),
    })
}

fn question(u: &Utterance<'_>) -> Option<Intent> {
    u.starts_with_any(QUESTION_STARTERS)
        .then(|| Intent::ResearchTopic {
            query: u.text.to_string(),
        })
}

fn keyboard_type(u: &Utterance<'_>) -> Option<Intent> {
    let captured = RE_TYPE.captures(u.text)?.get(1)?.as_str().trim();
    let text = captured
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(captured);
    (!text.is_empty()).then(|| Intent::KeyboardType {
        text: text.to_string(),
    })
}

fn volume(u: &Utterance<'_>) -> Option<Intent> {
    if u.has_any(&["volume up", "increase volume", "turn up the volume"]) {
        Some(Intent::VolumeUp)
    } else if u.has_any(&["volume down", "decrease volume", "turn down the volume"]) {
        Some(Intent::VolumeDown)
    } else if u.has_any(&["mute volume", "mute sound", "mute"]) {
        Some(Intent::VolumeMute)
    } else {
        None
    }
}

fn download(u: &Utterance<'_>) -> Option<Intent> {
    let url = u.text.strip_prefix("download ")?.trim();
    (!url.is_empty()).then(|| Intent::Download {
        url: url.to_string(),
    })
}

fn command(u: &Utterance<'_>) -> Option<Intent> {
    let command = u
        .text
        .strip_prefix("run command ")
        .or_else(|| u.text.strip_prefix("execute "))?
        .trim();
    (!command.is_empty()).then(|| Intent::SystemCommand {
        command: command.to_string(),
    })
}

fn remember(u: &Utterance<'_>) -> Option<Intent> {
    let note = u.text.strip_prefix("remember ")?.trim();
    let note = note.strip_prefix("that ").unwrap_or(note).trim();
    (!note.is_empty()).then(|| Intent::Remember {
        note: note.to_string(),
    })
}

fn recall(u: &Utterance<'_>) -> Option<Intent> {
    u.has_any(RECALL).then_some(Intent::Recall)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PatternResolver {
        PatternResolver::new(
            "steward",
            vec!["notepad".into(), "calculator".into(), "whatsapp".into()],
        )
    }

    fn resolve(text: &str) -> Intent {
        resolver().resolve(text)
    }

    #[test]
    fn greetings_are_exact() {
        assert_eq!(resolve("hello"), Intent::Greeting);
        assert_eq!(resolve("hi steward"), Intent::Greeting);
        assert_eq!(resolve(""), Intent::Greeting);
        assert_ne!(resolve("hello world how are things"), Intent::Greeting);
    }

    #[test]
    fn farewell_and_exit() {
        assert_eq!(resolve("ok bye"), Intent::Farewell);
        assert_eq!(resolve("good night"), Intent::Farewell);
        assert_eq!(resolve("quit"), Intent::Exit);
        assert_eq!(resolve("stop listening"), Intent::Exit);
    }

    #[test]
    fn politeness_is_stripped() {
        let plain = resolve("open notepad");
        assert_eq!(plain, resolve("open notepad please"));
        assert_eq!(plain, resolve("open notepad now please"));
        assert_eq!(
            plain,
            Intent::OpenSomething {
                target: "notepad".into()
            }
        );
    }

    #[test]
    fn open_trims_to_known_app() {
        assert_eq!(
            resolve("open whatsapp web"),
            Intent::OpenSomething {
                target: "whatsapp".into()
            }
        );
        assert_eq!(
            resolve("open notepadplus"),
            Intent::OpenSomething {
                target: "notepadplus".into()
            }
        );
    }

    #[test]
    fn open_composite_send() {
        assert_eq!(
            resolve("open whatsapp and send hi there to mom"),
            Intent::WhatsappMsg {
                contact: "mom".into(),
                msg: "hi there".into()
            }
        );
    }

    #[test]
    fn open_composite_play_and_search() {
        assert_eq!(
            resolve("open youtube and play lofi beats"),
            Intent::PlayMusic {
                song: "lofi beats".into()
            }
        );
        assert_eq!(
            resolve("open youtube and search for rust talks"),
            Intent::OpenWithSearch {
                target: "youtube".into(),
                query: "rust talks".into()
            }
        );
    }

    #[test]
    fn play_strips_youtube_suffix() {
        assert_eq!(
            resolve("play despacito on youtube"),
            Intent::PlayMusic {
                song: "despacito".into()
            }
        );
    }

    #[test]
    fn joke_language() {
        assert_eq!(
            resolve("tell me a joke in kannada"),
            Intent::Joke {
                language: Some("kannada".into())
            }
        );
        assert_eq!(resolve("make me laugh"), Intent::Joke { language: None });
    }

    #[test]
    fn system_control_needs_machine_word() {
        assert_eq!(
            resolve("shutdown the computer"),
            Intent::SystemControl {
                action: "shutdown".into()
            }
        );
        assert_eq!(
            resolve("put the laptop to sleep"),
            Intent::SystemControl {
                action: "sleep".into()
            }
        );
        assert!(resolve("i need sleep").is_unknown());
    }

    #[test]
    fn vision_phrases() {
        assert_eq!(
            resolve("open virtual keyboard"),
            Intent::VisionControl {
                action: "start".into(),
                mode: Some("keyboard".into())
            }
        );
        assert_eq!(resolve("take photo"), Intent::VisionCapture);
        assert_eq!(resolve("what do you see"), Intent::VisionDescribe);
    }

    #[test]
    fn weather_and_wikipedia() {
        assert_eq!(
            resolve("what is the weather in london"),
            Intent::Weather {
                location: Some("london".into())
            }
        );
        assert_eq!(resolve("weather"), Intent::Weather { location: None });
        assert_eq!(
            resolve("tell me about alan turing"),
            Intent::Wikipedia {
                query: "alan turing".into()
            }
        );
        assert_eq!(
            resolve("search wikipedia for rust"),
            Intent::Wikipedia {
                query: "rust".into()
            }
        );
    }

    #[test]
    fn time_and_date_use_word_boundaries() {
        assert_eq!(resolve("what time is it"), Intent::GetTime);
        assert_eq!(resolve("what is the date"), Intent::GetDate);
        assert!(!matches!(resolve("update everything"), Intent::GetDate));
    }

    #[test]
    fn search_redirects_and_strips_for() {
        assert_eq!(
            resolve("search for loop python"),
            Intent::WebSearch {
                query: "loop python".into()
            }
        );
        assert_eq!(
            resolve("search ishq song and play"),
            Intent::PlayMusic {
                song: "ishq song".into()
            }
        );
    }

    #[test]
    fn questions_become_research() {
        assert_eq!(
            resolve("who is the president of france"),
            Intent::ResearchTopic {
                query: "who is the president of france".into()
            }
        );
    }

    #[test]
    fn send_message() {
        assert_eq!(
            resolve("send running late to alice"),
            Intent::WhatsappMsg {
                contact: "alice".into(),
                msg: "running late".into()
            }
        );
    }

    #[test]
    fn typing_strips_quotes() {
        assert_eq!(
            resolve("type \"hello world\""),
            Intent::KeyboardType {
                text: "hello world".into()
            }
        );
    }

    #[test]
    fn volume_download_command() {
        assert_eq!(resolve("volume up"), Intent::VolumeUp);
        assert_eq!(resolve("mute sound"), Intent::VolumeMute);
        assert_eq!(
            resolve("download https://example.com/a.txt"),
            Intent::Download {
                url: "https://example.com/a.txt".into()
            }
        );
        assert_eq!(
            resolve("run command ls -la"),
            Intent::SystemCommand {
                command: "ls -la".into()
            }
        );
    }

    #[test]
    fn remember_and_recall() {
        assert_eq!(
            resolve("remember that the keys are in the drawer"),
            Intent::Remember {
                note: "the keys are in the drawer".into()
            }
        );
        assert_eq!(resolve("what do you remember"), Intent::Recall);
    }

    #[test]
    fn skill_control_phrases() {
        assert_eq!(
            resolve("learn this as morning routine"),
            Intent::StartLearning {
                skill_name: "morning routine".into()
            }
        );
        assert_eq!(resolve("stop learning"), Intent::StopLearning);
        assert_eq!(
            resolve("execute skill morning routine"),
            Intent::ExecuteSkill {
                skill_name: "morning routine".into()
            }
        );
        assert_eq!(
            resolve("run the demo skill"),
            Intent::ExecuteSkill {
                skill_name: "demo".into()
            }
        );
    }

    #[test]
    fn identity_precedes_recall() {
        assert_eq!(resolve("who am i"), Intent::Identity);
    }

    #[test]
    fn unresolved_text_is_unknown_with_raw() {
        assert_eq!(
            resolve("could you open notepad"),
            Intent::unknown("could you open notepad")
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let r = resolver();
        for text in ["open notepad", "play x", "blorp", "what time is it"] {
            assert_eq!(r.resolve(text), r.resolve(text));
        }
    }
}

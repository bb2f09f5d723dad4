//! Network lookups: research, Wikipedia, weather, downloads, and jokes.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use serde_json::Value;

use crate::tool::{
    DangerLevel, Injected, Tool, ToolContext, ToolError, ToolInput, ToolParam, ToolResult,
    ToolSignature,
};

use super::http_agent;

const LOOKUP_TIMEOUT_SECS: u64 = 10;
const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Longest research context handed to the generator.
const MAX_RESEARCH_CONTEXT: usize = 4000;

const JOKES: &[&str] = &[
    "Why do programmers prefer dark mode? Because light attracts bugs.",
    "There are only 10 kinds of people in the world: those who understand binary and those who don't.",
    "A SQL query walks into a bar, walks up to two tables and asks: can I join you?",
    "Why did the developer go broke? Because he used up all his cache.",
    "I would tell you a UDP joke, but you might not get it.",
    "How many programmers does it take to change a light bulb? None, that's a hardware problem.",
    "Why do Java developers wear glasses? Because they don't C sharp.",
    "To understand recursion, you must first understand recursion.",
];

/// First `n` sentences of `text`.
pub fn first_sentences(text: &str, n: usize) -> String {
    let mut out = String::new();
    let mut count = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?')
            && text[i + c.len_utf8()..]
                .chars()
                .next()
                .is_none_or(char::is_whitespace)
        {
            count += 1;
            if count == n {
                out = text[..i + c.len_utf8()].to_string();
                break;
            }
        }
    }
    if out.is_empty() {
        text.trim().to_string()
    } else {
        out.trim().to_string()
    }
}

/// Spoken answer for a Wikipedia page-summary document.
pub fn summary_from_page(page: &Value) -> String {
    if page.get("type").and_then(Value::as_str) == Some("disambiguation") {
        return "That topic is too vague. Please be more specific.".into();
    }
    match page.get("extract").and_then(Value::as_str) {
        Some(extract) if !extract.trim().is_empty() => first_sentences(extract, 2),
        _ => "I couldn't find any data on that topic.".into(),
    }
}

fn wikipedia_page(query: &str) -> Result<Option<Value>, String> {
    let title = query.trim().replace(' ', "_");
    let url = format!(
        "https://en.wikipedia.org/api/rest_v1/page/summary/{}",
        urlencoding::encode(&title)
    );
    match http_agent(LOOKUP_TIMEOUT_SECS).get(&url).call() {
        Ok(response) => response.into_json().map(Some).map_err(|e| e.to_string()),
        Err(ureq::Error::Status(404, _)) => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

pub struct WikipediaTool;

impl Tool for WikipediaTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "search_wikipedia".into(),
            description: "Summarize a topic from Wikipedia in two sentences.".into(),
            parameters: vec![ToolParam::required("query", "Topic to look up.")],
            injected: vec![],
            danger: DangerLevel::Safe,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        let query = input.require("query", "search_wikipedia")?;
        match wikipedia_page(query) {
            Ok(Some(page)) => Ok(summary_from_page(&page)),
            Ok(None) => Ok("I couldn't find any data on that topic.".into()),
            Err(e) => {
                tracing::warn!(query, error = %e, "wikipedia lookup failed");
                Err(ToolError::execution("search_wikipedia", "Knowledge retrieval failed."))
            }
        }
    }
}

/// Gather text about `query` from the DuckDuckGo instant-answer API and Wikipedia.
fn gather_research(query: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let url = format!(
        "https://api.duckduckgo.com/?q={}&format=json&no_html=1&skip_disambig=1",
        urlencoding::encode(query)
    );
    match http_agent(LOOKUP_TIMEOUT_SECS)
        .get(&url)
        .call()
        .map_err(|e| e.to_string())
        .and_then(|r| r.into_json::<Value>().map_err(|e| e.to_string()))
    {
        Ok(answer) => {
            if let Some(text) = answer.get("AbstractText").and_then(Value::as_str) {
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
            if let Some(topics) = answer.get("RelatedTopics").and_then(Value::as_array) {
                parts.extend(
                    topics
                        .iter()
                        .filter_map(|t| t.get("Text").and_then(Value::as_str))
                        .take(5)
                        .map(String::from),
                );
            }
        }
        Err(e) => tracing::warn!(query, error = %e, "instant-answer lookup failed"),
    }
    match wikipedia_page(query) {
        Ok(Some(page)) => {
            if let Some(extract) = page.get("extract").and_then(Value::as_str) {
                parts.push(extract.to_string());
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(query, error = %e, "wikipedia lookup failed"),
    }

    let mut joined = parts.join("\n");
    if let Some((cut, _)) = joined.char_indices().nth(MAX_RESEARCH_CONTEXT) {
        joined.truncate(cut);
    }
    joined
}

/// Prompt asking the generator for a short spoken answer.
pub fn research_prompt(query: &str, gathered: &str) -> String {
    let gathered = if gathered.trim().is_empty() {
        "(no web results were found)"
    } else {
        gathered
    };
    format!(
        "You are a helpful assistant. The user asked: '{query}'.\n\
         Here is raw text gathered from a web search:\n\n{gathered}\n\n\
         Provide a concise, spoken answer (2-3 sentences max) summarizing the key \
         information to answer the user's question."
    )
}

pub struct ResearchTool;

impl Tool for ResearchTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "research_topic".into(),
            description: "Research a question on the web and answer it in a few sentences."
                .into(),
            parameters: vec![ToolParam::required("query", "Question or topic.")],
            injected: vec![Injected::Generator],
            danger: DangerLevel::Safe,
        }
    }

    fn execute(&self, ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        const NAME: &str = "research_topic";
        let query = input.require("query", NAME)?;
        let generator = ctx.generator(NAME)?;
        let gathered = gather_research(query);
        tracing::info!(query, chars = gathered.len(), "researching topic");
        generator
            .generate(&research_prompt(query, &gathered), None)
            .map(|answer| answer.trim().to_string())
            .map_err(|e| ToolError::execution(NAME, format!("Error during research: {e}")))
    }
}

pub struct WeatherTool;

impl Tool for WeatherTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "get_weather".into(),
            description: "Current weather for a location (or the local area).".into(),
            parameters: vec![ToolParam::optional("location", "City or place.")],
            injected: vec![],
            danger: DangerLevel::Safe,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        let location = input.get("location").unwrap_or("").trim();
        let url = format!("https://wttr.in/{}?format=3", urlencoding::encode(location));
        let report = http_agent(LOOKUP_TIMEOUT_SECS)
            .get(&url)
            .set("User-Agent", "curl/7.68.0")
            .call()
            .map_err(|e| e.to_string())
            .and_then(|r| r.into_string().map_err(|e| e.to_string()))
            .map_err(|e| {
                ToolError::execution(
                    "get_weather",
                    format!("Unable to connect to weather services: {e}"),
                )
            })?;
        Ok(format!("Weather Report: {}", report.trim()))
    }
}

pub struct JokeTool;

impl JokeTool {
    fn english() -> &'static str {
        JOKES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(JOKES[0])
    }
}

impl Tool for JokeTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "tell_joke".into(),
            description: "Tell a short joke, optionally in another language.".into(),
            parameters: vec![ToolParam::optional("language", "Language (default: English).")],
            injected: vec![Injected::Generator],
            danger: DangerLevel::Safe,
        }
    }

    fn execute(&self, ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        let language = input.get("language").map(str::trim).unwrap_or("en");
        if matches!(language.to_lowercase().as_str(), "" | "en" | "english") {
            return Ok(Self::english().into());
        }
        let prompt = format!("Tell me a short, funny joke in {language}. Output ONLY the joke text.");
        let generated = ctx
            .generator("tell_joke")
            .ok()
            .map(|g| g.generate(&prompt, None));
        match generated {
            Some(Ok(joke)) if !joke.trim().is_empty() => Ok(joke.trim().to_string()),
            other => {
                if let Some(Err(e)) = other {
                    tracing::warn!(language, error = %e, "joke generation failed");
                }
                Ok(format!(
                    "I couldn't generate a joke in {language}. Here is one in English: {}",
                    Self::english()
                ))
            }
        }
    }
}

/// File name to save `url` under: its last path segment, or a timestamped name.
pub fn download_file_name(url: &str) -> String {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/');
    let after_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    let segment = after_scheme
        .split_once('/')
        .and_then(|(_, p)| p.rsplit('/').next())
        .unwrap_or("");
    let cleaned: String = segment
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '\0'))
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        format!("download_{}.file", chrono::Utc::now().timestamp())
    } else {
        cleaned
    }
}

pub struct DownloadTool {
    dir: PathBuf,
}

impl DownloadTool {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn save(&self, url: &str, dest: &Path) -> io::Result<u64> {
        let response = http_agent(DOWNLOAD_TIMEOUT_SECS)
            .get(url)
            .call()
            .map_err(io::Error::other)?;
        std::fs::create_dir_all(&self.dir)?;
        let mut file = File::create(dest)?;
        io::copy(&mut response.into_reader(), &mut file)
    }
}

impl Tool for DownloadTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "download_file".into(),
            description: "Download a file into the downloads directory.".into(),
            parameters: vec![ToolParam::required("url", "http(s) URL of the file.")],
            injected: vec![],
            danger: DangerLevel::Dangerous,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        const NAME: &str = "download_file";
        let url = input.require("url", NAME)?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::ArgumentMismatch {
                tool: NAME.into(),
                detail: "Invalid URL. Must start with http or https.".into(),
            });
        }
        let name = download_file_name(url);
        let dest = self.dir.join(&name);
        let bytes = self
            .save(url, &dest)
            .map_err(|e| ToolError::execution(NAME, format!("Failed to download file: {e}")))?;
        tracing::info!(url, path = %dest.display(), bytes, "download complete");
        Ok(format!("Downloaded {name}."))
    }
}

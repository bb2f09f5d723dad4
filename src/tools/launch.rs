//! Opening applications and websites, site searches, music and messages.

use std::sync::Arc;

use crate::config::AssistantConfig;
use crate::tool::{
    DangerLevel, Desktop, Injected, Tool, ToolContext, ToolError, ToolInput, ToolParam,
    ToolResult, ToolSignature,
};

use super::io_failure;

/// Search URL templates for sites with a known query endpoint.
const SITE_SEARCH: &[(&str, &str)] = &[
    ("youtube", "https://www.youtube.com/results?search_query="),
    ("google", "https://www.google.com/search?q="),
    ("wikipedia", "https://en.wikipedia.org/w/index.php?search="),
    ("amazon", "https://www.amazon.com/s?k="),
    ("github", "https://github.com/search?q="),
    ("reddit", "https://www.reddit.com/search/?q="),
];

/// How a target name resolves against the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// Configured application with its launch command.
    App(String),
    /// Configured shortcut or a bare domain.
    Url(String),
    /// Unknown name, handed to the desktop launcher as is.
    System(String),
}

/// Resolve `target` the way `open_application_or_website` does:
/// configured apps, then web shortcuts, then anything with a dot as a domain.
pub fn resolve_target(config: &AssistantConfig, target: &str) -> LaunchTarget {
    let key = target.trim().to_lowercase();
    if let Some(command) = config.apps.get(&key) {
        LaunchTarget::App(command.clone())
    } else if let Some(url) = config.web_shortcuts.get(&key) {
        LaunchTarget::Url(url.clone())
    } else if key.contains('.') {
        if key.starts_with("http://") || key.starts_with("https://") {
            LaunchTarget::Url(key)
        } else {
            LaunchTarget::Url(format!("https://{key}"))
        }
    } else {
        LaunchTarget::System(key)
    }
}

/// Search URL for `query` on `site`; unknown sites fall back to a scoped web search.
pub fn site_search_url(site: &str, query: &str) -> String {
    let site = site.trim().to_lowercase();
    let encoded = urlencoding::encode(query.trim());
    match SITE_SEARCH.iter().find(|(name, _)| *name == site) {
        Some((_, base)) => format!("{base}{encoded}"),
        None => {
            let scoped = format!("site:{site} {}", query.trim());
            format!(
                "https://www.google.com/search?q={}",
                urlencoding::encode(&scoped)
            )
        }
    }
}

pub struct OpenTool {
    desktop: Arc<dyn Desktop>,
}

impl OpenTool {
    pub fn new(desktop: Arc<dyn Desktop>) -> Self {
        Self { desktop }
    }
}

impl Tool for OpenTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "open_application_or_website".into(),
            description: "Open a configured application, a web shortcut or a website.".into(),
            parameters: vec![ToolParam::required(
                "target",
                "Application name, shortcut name or domain.",
            )],
            injected: vec![Injected::Config],
            danger: DangerLevel::Cautious,
        }
    }

    fn execute(&self, ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        const NAME: &str = "open_application_or_website";
        let target = input.require("target", NAME)?;
        let config = ctx.config(NAME)?;
        match resolve_target(config, target) {
            LaunchTarget::App(command) => {
                self.desktop.launch(&command).map_err(io_failure(NAME))?;
                Ok(format!("Opened application: {target}"))
            }
            LaunchTarget::Url(url) => {
                self.desktop.open_url(&url).map_err(io_failure(NAME))?;
                Ok(format!("Opened website: {target}"))
            }
            LaunchTarget::System(name) => match self.desktop.launch(&name) {
                Ok(()) => Ok(format!("Opened system application: {target}")),
                Err(e) => {
                    tracing::debug!(app = %name, error = %e, "system launch failed");
                    Err(ToolError::execution(
                        NAME,
                        format!("I don't know how to open {target} yet. You can add it to my config."),
                    ))
                }
            },
        }
    }
}

pub struct SearchSiteTool {
    desktop: Arc<dyn Desktop>,
}

impl SearchSiteTool {
    pub fn new(desktop: Arc<dyn Desktop>) -> Self {
        Self { desktop }
    }
}

impl Tool for SearchSiteTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "search_site".into(),
            description: "Open a site's search results for a query.".into(),
            parameters: vec![
                ToolParam::required("target", "Site to search (youtube, amazon, ...)."),
                ToolParam::required("query", "What to search for."),
            ],
            injected: vec![],
            danger: DangerLevel::Cautious,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        const NAME: &str = "search_site";
        let target = input.require("target", NAME)?;
        let query = input.require("query", NAME)?;
        self.desktop
            .open_url(&site_search_url(target, query))
            .map_err(io_failure(NAME))?;
        Ok(format!("Searching {target} for {query}."))
    }
}

pub struct WebSearchTool {
    desktop: Arc<dyn Desktop>,
}

impl WebSearchTool {
    pub fn new(desktop: Arc<dyn Desktop>) -> Self {
        Self { desktop }
    }
}

impl Tool for WebSearchTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "search_web".into(),
            description: "Open web search results for a query.".into(),
            parameters: vec![ToolParam::required("query", "What to search for.")],
            injected: vec![],
            danger: DangerLevel::Cautious,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        let query = input.require("query", "search_web")?;
        self.desktop
            .open_url(&site_search_url("google", query))
            .map_err(io_failure("search_web"))?;
        Ok(format!("Searching for {query} on Google."))
    }
}

pub struct PlayMusicTool {
    desktop: Arc<dyn Desktop>,
}

impl PlayMusicTool {
    pub fn new(desktop: Arc<dyn Desktop>) -> Self {
        Self { desktop }
    }
}

impl Tool for PlayMusicTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "play_music_on_youtube".into(),
            description: "Find a song on YouTube and start playing it.".into(),
            parameters: vec![ToolParam::required("song_name", "Song, artist or both.")],
            injected: vec![],
            danger: DangerLevel::Cautious,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        let song = input.require("song_name", "play_music_on_youtube")?;
        let url = format!(
            "https://www.youtube.com/embed?listType=search&list={}&autoplay=1",
            urlencoding::encode(song)
        );
        self.desktop
            .open_url(&url)
            .map_err(io_failure("play_music_on_youtube"))?;
        Ok(format!("Playing {song} on YouTube."))
    }
}

pub struct WhatsappTool {
    desktop: Arc<dyn Desktop>,
}

impl WhatsappTool {
    pub fn new(desktop: Arc<dyn Desktop>) -> Self {
        Self { desktop }
    }
}

impl Tool for WhatsappTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "send_whatsapp_message".into(),
            description: "Open a WhatsApp chat with a message ready to send.".into(),
            parameters: vec![
                ToolParam::required("contact", "Phone number or contact name."),
                ToolParam::required("message", "Message text."),
            ],
            injected: vec![],
            danger: DangerLevel::Dangerous,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        const NAME: &str = "send_whatsapp_message";
        let contact: String = input
            .require("contact", NAME)?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let message = input.require("message", NAME)?;
        let url = format!(
            "https://web.whatsapp.com/send?phone={}&text={}",
            urlencoding::encode(&contact),
            urlencoding::encode(message)
        );
        self.desktop.open_url(&url).map_err(io_failure(NAME))?;
        Ok(format!("Sending '{message}' to {contact} on WhatsApp."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::RecordingDesktop;

    fn ctx() -> ToolContext {
        crate::tool::ContextProviders::new(Arc::new(AssistantConfig::default()))
            .context_for(&[Injected::Config])
    }

    #[test]
    fn targets_resolve_in_order() {
        let config = AssistantConfig::default();
        assert_eq!(
            resolve_target(&config, "Calculator"),
            LaunchTarget::App("gnome-calculator".into())
        );
        assert_eq!(
            resolve_target(&config, "youtube"),
            LaunchTarget::Url("https://www.youtube.com".into())
        );
        assert_eq!(
            resolve_target(&config, "docs.rs"),
            LaunchTarget::Url("https://docs.rs".into())
        );
        assert_eq!(
            resolve_target(&config, "blender"),
            LaunchTarget::System("blender".into())
        );
    }

    #[test]
    fn search_urls_are_encoded() {
        assert_eq!(
            site_search_url("YouTube", "lofi beats"),
            "https://www.youtube.com/results?search_query=lofi%20beats"
        );
        assert_eq!(
            site_search_url("docs.rs", "serde"),
            "https://www.google.com/search?q=site%3Adocs.rs%20serde"
        );
    }

    #[test]
    fn open_launches_configured_app() {
        let desktop = Arc::new(RecordingDesktop::default());
        let tool = OpenTool::new(desktop.clone());
        let out = tool
            .execute(&ctx(), ToolInput::new().with_param("target", "notepad"))
            .unwrap();
        assert_eq!(out, "Opened application: notepad");
        assert_eq!(desktop.calls(), vec!["launch gedit"]);
    }

    #[test]
    fn open_unknown_program_fails_politely() {
        let desktop = Arc::new(RecordingDesktop {
            fail_launch: true,
            ..Default::default()
        });
        let tool = OpenTool::new(desktop);
        let err = tool
            .execute(&ctx(), ToolInput::new().with_param("target", "blender"))
            .unwrap_err();
        assert!(err.to_string().contains("I don't know how to open blender"));
    }

    #[test]
    fn whatsapp_strips_spaces_from_contact() {
        let desktop = Arc::new(RecordingDesktop::default());
        let tool = WhatsappTool::new(desktop.clone());
        let input = ToolInput::new()
            .with_param("contact", "+1 555 0100")
            .with_param("message", "on my way");
        let out = tool.execute(&ToolContext::empty(), input).unwrap();
        assert_eq!(out, "Sending 'on my way' to +15550100 on WhatsApp.");
        assert_eq!(
            desktop.calls(),
            vec!["url https://web.whatsapp.com/send?phone=%2B15550100&text=on%20my%20way"]
        );
    }
}

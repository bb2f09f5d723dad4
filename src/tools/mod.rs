//! Built-in tools: clock, launching, system control, knowledge lookups,
//! notes and preferences, vision.

pub mod clock;
pub mod knowledge;
pub mod launch;
pub mod memory;
pub mod system;
pub mod vision;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::store::AssistantStore;
use crate::tool::{Desktop, ToolError, ToolRegistry};

pub use clock::{DateTool, TimeTool};
pub use knowledge::{DownloadTool, JokeTool, ResearchTool, WeatherTool, WikipediaTool};
pub use launch::{OpenTool, PlayMusicTool, SearchSiteTool, WebSearchTool, WhatsappTool};
pub use memory::{GetNotesTool, SaveNoteTool, SetPreferenceTool};
pub use system::{PowerTool, ShellTool, TypeTextTool, VolumeTool};
pub use vision::{CapturePhotoTool, DescribeSceneTool, VisionControlTool};

/// Collaborators the built-in tools are constructed with.
#[derive(Clone)]
pub struct Builtins {
    pub desktop: Arc<dyn Desktop>,
    pub store: Arc<dyn AssistantStore>,
    /// Where `download_file` writes.
    pub downloads_dir: PathBuf,
}

/// Register every built-in tool.
pub fn register_builtin(registry: &mut ToolRegistry, deps: &Builtins) {
    // Clock.
    registry.register(Box::new(TimeTool));
    registry.register(Box::new(DateTool));

    // Desktop launching.
    registry.register(Box::new(OpenTool::new(Arc::clone(&deps.desktop))));
    registry.register(Box::new(SearchSiteTool::new(Arc::clone(&deps.desktop))));
    registry.register(Box::new(WebSearchTool::new(Arc::clone(&deps.desktop))));
    registry.register(Box::new(PlayMusicTool::new(Arc::clone(&deps.desktop))));
    registry.register(Box::new(WhatsappTool::new(Arc::clone(&deps.desktop))));

    // System control.
    registry.register(Box::new(PowerTool::new(Arc::clone(&deps.desktop))));
    registry.register(Box::new(ShellTool));
    registry.register(Box::new(VolumeTool::new(Arc::clone(&deps.desktop))));
    registry.register(Box::new(TypeTextTool::new(Arc::clone(&deps.desktop))));

    // Knowledge.
    registry.register(Box::new(ResearchTool));
    registry.register(Box::new(WikipediaTool));
    registry.register(Box::new(WeatherTool));
    registry.register(Box::new(JokeTool));
    registry.register(Box::new(DownloadTool::new(deps.downloads_dir.clone())));

    // Notes and preferences.
    registry.register(Box::new(SaveNoteTool::new(Arc::clone(&deps.store))));
    registry.register(Box::new(GetNotesTool::new(Arc::clone(&deps.store))));
    registry.register(Box::new(SetPreferenceTool::new(Arc::clone(&deps.store))));

    // Vision.
    registry.register(Box::new(VisionControlTool));
    registry.register(Box::new(CapturePhotoTool));
    registry.register(Box::new(DescribeSceneTool));
}

/// Map a desktop I/O failure to a tool execution error.
pub(crate) fn io_failure(tool: &'static str) -> impl Fn(io::Error) -> ToolError {
    move |e| ToolError::execution(tool, e)
}

/// Blocking HTTP agent with a request timeout.
pub(crate) fn http_agent(timeout_secs: u64) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("steward/", env!("CARGO_PKG_VERSION")))
        .build()
}

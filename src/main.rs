//! steward CLI: personal command assistant.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use steward::assistant::{Assistant, Flow};
use steward::capability::JsonlAuditLog;
use steward::config::AssistantConfig;
use steward::dispatch::{ChannelConfirmer, Confirmer, DenyAll};
use steward::llm::{InferenceBackend, OllamaClient};
use steward::message::{JsonSink, MessageSink, StdoutSink};
use steward::paths::StewardPaths;
use steward::speech::SpeechQueue;
use steward::store::{DurableStore, SkillStore};

#[derive(Parser)]
#[command(name = "steward", version, about = "Personal command assistant")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/steward/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root directory for config, data and state, instead of the XDG dirs.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Never call the language model.
    #[arg(long, global = true)]
    no_llm: bool,

    /// Log at info level.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit replies as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive loop (the default). Say "exit" to stop.
    Repl,

    /// Handle one utterance, which may chain commands with "and".
    Once {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Print the intent an utterance resolves to, without running it.
    Resolve {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// List the tool catalog.
    Tools,

    /// Manage taught skills.
    Skill {
        #[command(subcommand)]
        action: SkillAction,
    },

    /// Inspect the configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SkillAction {
    /// List skill names.
    List,
    /// Show a skill's steps.
    Show { name: String },
    /// Forget a skill.
    Delete { name: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the config file path.
    Path,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let paths = match &cli.data_dir {
        Some(root) => StewardPaths::rooted(root),
        None => StewardPaths::resolve()?,
    };
    paths.ensure_dirs()?;
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());

    match cli.command {
        None | Some(Commands::Repl) => {
            let config = load_config(&config_path, cli.no_llm)?;
            run_repl(config, &paths, cli.json)?;
        }
        Some(Commands::Once { ref text }) => {
            let config = load_config(&config_path, cli.no_llm)?;
            let sink = base_sink(cli.json);
            let confirmer = Arc::new(ChannelConfirmer::new(
                Arc::clone(&sink),
                spawn_stdin_reader()?,
            ));
            let assistant = assemble(config, &paths, sink, None, confirmer)?;
            assistant.start();
            assistant.handle_utterance(&text.join(" "));
            assistant.shutdown();
        }
        Some(Commands::Resolve { ref text }) => {
            let config = load_config(&config_path, cli.no_llm)?;
            let assistant = assemble(config, &paths, base_sink(cli.json), None, Arc::new(DenyAll))?;
            let intent = assistant.resolve(&text.join(" "));
            let json = serde_json::to_string_pretty(&intent).into_diagnostic()?;
            println!("{json}");
        }
        Some(Commands::Tools) => {
            let config = load_config(&config_path, true)?;
            let assistant = assemble(config, &paths, base_sink(cli.json), None, Arc::new(DenyAll))?;
            let tools = assistant.registry().list();
            println!("Tools ({}):", tools.len());
            for sig in tools {
                let params: Vec<String> = sig
                    .parameters
                    .iter()
                    .map(|p| {
                        if p.required {
                            p.name.clone()
                        } else {
                            format!("{}?", p.name)
                        }
                    })
                    .collect();
                println!(
                    "  {:<30} [{}] ({}) {}",
                    sig.name,
                    sig.danger,
                    params.join(", "),
                    sig.description
                );
            }
        }
        Some(Commands::Skill { action }) => {
            let store = DurableStore::open(&paths.store_dir())?;
            match action {
                SkillAction::List => {
                    let names = store.list_skills()?;
                    if names.is_empty() {
                        println!("No skills learned yet.");
                    } else {
                        println!("Skills ({}):", names.len());
                        for name in names {
                            println!("  {name}");
                        }
                    }
                }
                SkillAction::Show { name } => match store.get_skill(&name)? {
                    Some(steps) => {
                        println!("Skill: {name} ({} steps)", steps.len());
                        for (i, step) in steps.iter().enumerate() {
                            let json = serde_json::to_string(step).into_diagnostic()?;
                            println!("  {}. {json}", i + 1);
                        }
                    }
                    None => println!("No skill named \"{name}\"."),
                },
                SkillAction::Delete { name } => {
                    if store.delete_skill(&name)? {
                        println!("Deleted skill: {name}");
                    } else {
                        println!("No skill named \"{name}\".");
                    }
                }
            }
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => {
                let config = AssistantConfig::load_or_init(&config_path)?;
                let toml = toml::to_string_pretty(&config).into_diagnostic()?;
                print!("{toml}");
            }
            ConfigAction::Path => println!("{}", config_path.display()),
        },
    }

    Ok(())
}

fn load_config(path: &std::path::Path, no_llm: bool) -> Result<AssistantConfig> {
    let mut config = AssistantConfig::load_or_init(path)?;
    if no_llm {
        config.llm.enabled = false;
    }
    Ok(config)
}

fn base_sink(json: bool) -> Arc<dyn MessageSink> {
    if json {
        Arc::new(JsonSink)
    } else {
        Arc::new(StdoutSink)
    }
}

/// Probe the configured model server; `None` leaves the learned tier off.
fn connect_backend(config: &AssistantConfig) -> Option<Arc<dyn InferenceBackend>> {
    if !config.llm.enabled {
        return None;
    }
    let mut client = OllamaClient::new(config.llm.clone().into());
    if !client.probe() {
        tracing::warn!(
            url = %config.llm.base_url,
            "model server not reachable, continuing with pattern rules only"
        );
        return None;
    }
    if !client.has_model() {
        tracing::warn!(model = client.model(), "model not pulled on the server");
    }
    Some(Arc::new(client))
}

fn assemble(
    config: AssistantConfig,
    paths: &StewardPaths,
    sink: Arc<dyn MessageSink>,
    speech: Option<Arc<SpeechQueue>>,
    confirmer: Arc<dyn Confirmer>,
) -> Result<Assistant> {
    let store = DurableStore::open(&paths.store_dir())?;
    let backend = connect_backend(&config);

    let mut builder = Assistant::builder(config)
        .store(Arc::new(store))
        .confirmer(confirmer)
        .audit(Arc::new(JsonlAuditLog::new(paths.provenance_log())))
        .downloads_dir(paths.downloads_dir());
    builder = match speech {
        Some(queue) => builder.speech(queue),
        None => builder.output(sink),
    };
    if let Some(backend) = backend {
        builder = builder.backend(backend);
    }
    Ok(builder.build())
}

/// Feed stdin lines into a channel shared by the loop and the confirmer.
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .into_diagnostic()?;
    Ok(rx)
}

fn run_repl(config: AssistantConfig, paths: &StewardPaths, json: bool) -> Result<()> {
    let wake_word = config.wake_word.clone();
    let queue = Arc::new(SpeechQueue::spawn(base_sink(json)).into_diagnostic()?);
    let lines = Arc::new(Mutex::new(spawn_stdin_reader()?));
    let confirmer = Arc::new(ChannelConfirmer::shared(
        Arc::clone(&queue) as Arc<dyn MessageSink>,
        Arc::clone(&lines),
    ));
    let assistant = assemble(
        config,
        paths,
        Arc::clone(&queue) as Arc<dyn MessageSink>,
        Some(Arc::clone(&queue)),
        confirmer,
    )?;

    assistant.start();
    if !json {
        eprintln!("steward ready. Talk to me (\"{wake_word}, ...\" works too); say \"exit\" to stop.");
    }
    loop {
        let next = lines.lock().expect("stdin lock poisoned").recv();
        let Ok(line) = next else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if assistant.handle_utterance(line) == Flow::Exit {
            break;
        }
    }
    assistant.shutdown();
    Ok(())
}

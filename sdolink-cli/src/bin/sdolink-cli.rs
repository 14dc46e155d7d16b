//! A REPL-style interactive shell for managing CANopen devices via socketcan
use std::{
    borrow::Cow,
    ffi::OsString,
    marker::PhantomData,
    path::PathBuf,
    str::FromStr,
    sync::{Arc, Mutex},
};

use clap::Parser;
use reedline::{
    default_emacs_keybindings, Emacs, FileBackedHistory, KeyModifiers, MenuBuilder, Prompt,
    PromptHistorySearch, PromptHistorySearchStatus, Reedline, ReedlineEvent, ReedlineMenu, Signal,
    Span,
};
use sdolink_cli::command::{Cli, Commands};
use sdolink_client::{
    common::{objects::ObjectId, NodeId},
    BusConfig, DictionarySource, Session, SessionConfig, SocketCanConnector,
    TomlDictionaryProvider,
};
use shlex::Shlex;

type CliSession = Session<SocketCanConnector, TomlDictionaryProvider>;

#[derive(Parser)]
struct Args {
    /// The CAN socket to connect to (e.g. 'can0' or 'vcan0')
    channel: String,
    /// Session configuration file (TOML)
    #[arg(long, value_hint=clap::ValueHint::FilePath)]
    config: Option<PathBuf>,
}

#[derive(Default)]
struct PromptState {
    channel: String,
    connected: bool,
    nodes: usize,
    active: Option<NodeId>,
}

impl PromptState {
    fn update(&mut self, session: &CliSession) {
        self.channel = session.config().bus.channel.clone();
        self.connected = session.is_connected();
        self.nodes = session.discovered_devices().len();
        self.active = session.active_device();
    }
}

struct SdolinkPrompt {
    state: Arc<Mutex<PromptState>>,
}

impl Prompt for SdolinkPrompt {
    fn render_prompt_left(&self) -> std::borrow::Cow<str> {
        match self.state.lock() {
            Ok(state) if state.connected => Cow::Owned(state.channel.clone()),
            Ok(state) => Cow::Owned(format!("{} (disconnected)", state.channel)),
            Err(_) => Cow::Borrowed(""),
        }
    }

    fn render_prompt_right(&self) -> std::borrow::Cow<str> {
        let Ok(state) = self.state.lock() else {
            return Cow::Borrowed("");
        };
        match state.active {
            Some(node) => Cow::Owned(format!("Nodes: {} Active: {node}", state.nodes)),
            None => Cow::Owned(format!("Nodes: {}", state.nodes)),
        }
    }

    fn render_prompt_indicator(
        &self,
        _prompt_mode: reedline::PromptEditMode,
    ) -> std::borrow::Cow<str> {
        Cow::Borrowed(">")
    }

    fn render_prompt_multiline_indicator(&self) -> std::borrow::Cow<str> {
        Cow::Borrowed("::: ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> std::borrow::Cow<str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!(
            "({}reverse-search: {}) ",
            prefix, history_search.term
        ))
    }
}

struct Completer<C: Parser + Send + Sync + 'static> {
    c_phantom: PhantomData<C>,
}
impl<C: Parser + Send + Sync + 'static> Completer<C> {
    pub fn new() -> Self {
        Self {
            c_phantom: PhantomData::<C>,
        }
    }
}

impl<C: Parser + Send + Sync + 'static> reedline::Completer for Completer<C> {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<reedline::Suggestion> {
        let mut cmd = C::command();

        let args = Shlex::new(line);
        let mut args = std::iter::once("".to_owned())
            .chain(args)
            .map(OsString::from)
            .collect::<Vec<_>>();
        if line.ends_with(' ') {
            args.push(OsString::new());
        }

        let arg_index = args.len() - 1;
        let span = Span::new(pos.saturating_sub(args[arg_index].len()), pos);

        if line.is_empty() {
            return cmd
                .get_subcommands()
                .map(|cmd| reedline::Suggestion {
                    value: cmd.get_name().to_owned(),
                    description: cmd.get_about().map(|x| x.to_string()),
                    style: None,
                    extra: None,
                    span,
                    append_whitespace: true,
                })
                .collect();
        }
        let Ok(candidates) = clap_complete::engine::complete(
            &mut cmd,
            args,
            arg_index,
            PathBuf::from_str(".").ok().as_deref(),
        ) else {
            return vec![];
        };
        candidates
            .into_iter()
            .map(|c| reedline::Suggestion {
                value: c.get_value().to_string_lossy().into_owned(),
                description: c.get_help().map(|x| x.to_string()),
                style: None,
                extra: None,
                span,
                append_whitespace: false,
            })
            .collect()
    }
}

fn print_nodes(session: &CliSession) {
    let nodes = session.discovered_devices();
    if nodes.is_empty() {
        println!("No nodes discovered");
    }
    for node in nodes {
        let marker = if Some(node) == session.active_device() {
            "*"
        } else {
            " "
        };
        println!("{marker} Node {node}");
    }
}

fn print_objects(session: &CliSession) {
    let objects = session.objects();
    println!("Sendable:");
    for entry in &objects.sendable {
        println!("  {}", entry.label);
    }
    println!("Receivable:");
    for entry in &objects.receivable {
        println!("  {}", entry.label);
    }
}

async fn run_command(session: &mut CliSession, command: Commands) {
    match command {
        Commands::Connect { channel } => {
            let bus = match channel {
                Some(channel) => BusConfig {
                    channel,
                    ..session.config().bus.clone()
                },
                None => session.config().bus.clone(),
            };
            match session.connect_to(bus) {
                Ok(()) => println!("Connected to {}", session.config().bus.channel),
                Err(e) => println!("{e}"),
            }
        }
        Commands::Disconnect => {
            session.disconnect();
            println!("Disconnected");
        }
        Commands::Scan { dictionary } => {
            let source = dictionary.map(DictionarySource::new);
            match session.scan(source.as_ref()).await {
                Ok(outcome) => {
                    println!("{outcome}");
                    print_nodes(session);
                    if let Some(report) = session.last_mode_report() {
                        if session.active_device().is_some() {
                            println!("{report}");
                        }
                    }
                }
                Err(e) => println!("{e}"),
            }
        }
        Commands::Nodes => print_nodes(session),
        Commands::Select { node } => {
            let node = match NodeId::new(node) {
                Ok(id) => id,
                Err(e) => {
                    println!("{e}");
                    return;
                }
            };
            match session.set_active_device(node).await {
                Ok(report) => println!("{report}"),
                Err(e) => println!("{e}"),
            }
        }
        Commands::Objects => print_objects(session),
        Commands::Read(args) => {
            let Some(descriptor) = session.objects().find_receivable(args.index, args.sub).cloned()
            else {
                println!(
                    "{} is not a readable object of the active device",
                    ObjectId::new(args.index, args.sub)
                );
                return;
            };
            match session.read(&descriptor, args.repr.into()).await {
                Ok(report) => println!("{report}"),
                Err(e) => println!("{e}"),
            }
        }
        Commands::Write(args) => {
            let Some(descriptor) = session.objects().find_sendable(args.index, args.sub).cloned()
            else {
                println!(
                    "{} is not a writable object of the active device",
                    ObjectId::new(args.index, args.sub)
                );
                return;
            };
            match session.write(&descriptor, &args.value).await {
                Ok(report) => println!("{report}"),
                Err(e) => println!("{e}"),
            }
        }
        Commands::Nmt(args) => {
            let cmd = args.action.into();
            match session.nmt_command(cmd, args.node.raw()).await {
                Ok(()) => println!("Sent {cmd:?} to {}", args.node.raw()),
                Err(e) => println!("{e}"),
            }
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match SessionConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                println!("Error reading config file: {e}");
                return;
            }
        },
        None => SessionConfig::default(),
    };
    config.bus.channel = args.channel.clone();

    let mut session = Session::new(SocketCanConnector, TomlDictionaryProvider::new(), config);
    if let Err(e) = session.connect() {
        // Keep going; the user can retry with `connect`
        println!("{e}");
    }

    let state = Arc::new(Mutex::new(PromptState::default()));
    let prompt = SdolinkPrompt {
        state: state.clone(),
    };

    let completion_menu = Box::new(
        reedline::IdeMenu::default()
            .with_default_border()
            .with_name("completion_menu"),
    );
    let mut keybindings = default_emacs_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        reedline::KeyCode::Tab,
        ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu("completion_menu".to_string()),
            ReedlineEvent::MenuNext,
        ]),
    );
    let edit_mode = Box::new(Emacs::new(keybindings));

    let mut rl = Reedline::create()
        .with_completer(Box::new(Completer::<Cli>::new()))
        .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
        .with_edit_mode(edit_mode);
    match FileBackedHistory::with_file(10000, "/tmp/sdolink-cli-history".into()) {
        Ok(history) => rl = rl.with_history(Box::new(history)),
        Err(e) => log::warn!("Command history unavailable: {e}"),
    }

    loop {
        if let Ok(mut state) = state.lock() {
            state.update(&session);
        }
        let line = match rl.read_line(&prompt) {
            Ok(Signal::Success(line)) => line,
            Ok(Signal::CtrlC) => continue,
            Ok(Signal::CtrlD) => {
                println!("Exiting...");
                break;
            }
            Err(e) => {
                println!("Reedline error: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let Some(split) = shlex::split(&line) else {
            println!("Unbalanced quotes");
            continue;
        };
        let cmd = match Cli::try_parse_from(
            std::iter::once("").chain(split.iter().map(String::as_str)),
        ) {
            Ok(c) => c,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        run_command(&mut session, cmd.command).await;
    }

    session.disconnect();
}

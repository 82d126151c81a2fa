// gpilot - apply model-proposed spreadsheet Actions from the command line

mod ai;
mod exit_codes;
mod render;
mod sheet_io;

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use gridpilot_actions::executor::ExecutorConfig;
use gridpilot_actions::{
    classify, parse_response, Action, BatchPolicy, BatchReport, HistoryEntry, ParsedResponse, Session,
    SessionConfig, UndoError, UndoOutcome,
};
use gridpilot_config::{AIConfigStatus, AIProvider, ResolvedAIConfig, Settings};
use gridpilot_engine::Workbook;

use exit_codes::{
    ask_exit_code, EXIT_AI_DISABLED, EXIT_AI_MISSING_KEY, EXIT_APPLY_FAILED, EXIT_ERROR, EXIT_IO,
    EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "gpilot")]
#[command(about = "Apply natural-language spreadsheet edits as undoable Actions")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Settings file (JSON, or TOML by extension) instead of the default
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log debug output to stderr (GRIDPILOT_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a list of Actions to a CSV sheet
    #[command(after_help = "\
The actions file is a JSON array of Actions or model markup:
  <action type=\"values\" target=\"A1:B2\">[[\"x\",1],[\"y\",2]]</action>

Examples:
  gpilot apply actions.json --input data.csv --output out.csv
  gpilot apply reply.txt --input data.csv --output - --select 0,2
  gpilot apply actions.json --input data.csv --policy atomic --json
  gpilot apply actions.json --input data.csv --undo 1 --output out.csv")]
    Apply {
        /// Actions file (JSON or markup), or - for stdin
        actions: PathBuf,

        /// Sheet to edit, as CSV (omit to start empty)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Where to write the edited sheet as CSV (- for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Apply only these Actions (0-based, comma separated)
        #[arg(long, value_delimiter = ',', value_name = "INDEXES")]
        select: Vec<usize>,

        /// Failure handling (default: batch.policy from settings)
        #[arg(long)]
        policy: Option<PolicyArg>,

        /// Undo this many Actions after applying
        #[arg(long, default_value_t = 0, value_name = "N")]
        undo: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract Actions from model markup
    #[command(after_help = "\
Examples:
  gpilot parse reply.txt
  cat reply.txt | gpilot parse - --json")]
    Parse {
        /// Markup or JSON file, or - for stdin
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// List the supported Action types
    Catalog {
        #[arg(long)]
        json: bool,
    },

    /// Show the task type and model guidance for an instruction
    Classify {
        /// Instruction text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Ask the model for Actions and (with --yes) apply them
    #[command(after_help = "\
Examples:
  gpilot ask 'bold the header row' --input data.csv
  gpilot ask 'add a total row' --input data.csv --output out.csv --yes
  gpilot ask 'chart sales by month' --input data.csv --endpoint http://localhost:11434/v1

The API key is read from the keychain or GRIDPILOT_<PROVIDER>_KEY.")]
    Ask {
        /// What to do, in plain language
        #[arg(required = true, num_args = 1..)]
        instruction: Vec<String>,

        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Apply the proposed Actions without asking
        #[arg(long, short = 'y')]
        yes: bool,

        /// Chat-completions base URL (overrides ai.endpoint)
        #[arg(long)]
        endpoint: Option<String>,

        /// Model name (overrides ai.model)
        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        policy: Option<PolicyArg>,

        #[arg(long)]
        json: bool,
    },

    /// Inspect and change settings and API keys
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the settings file path
    Path,

    /// Show the resolved AI configuration and whether `ask` can run
    #[command(after_help = "\
Exit codes: 0 ready, 10 disabled or provider not implemented, 11 key missing.")]
    Show {
        #[arg(long)]
        json: bool,
    },

    /// Choose the AI provider and write it to the settings file
    #[command(after_help = "\
Examples:
  gpilot config set-provider openai --model gpt-4o-mini
  gpilot config set-provider local --endpoint http://localhost:11434/v1")]
    SetProvider {
        /// none, openai, local or anthropic
        provider: String,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Store an API key (read from stdin) in the system keychain
    #[command(after_help = "\
Example:
  printf '%s' \"$KEY\" | gpilot config set-key openai

Needs a build with the keychain feature; otherwise export GRIDPILOT_<PROVIDER>_KEY.")]
    SetKey {
        provider: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Continue,
    Stop,
    Atomic,
}

impl From<PolicyArg> for BatchPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Continue => BatchPolicy::ContinueOnError,
            PolicyArg::Stop => BatchPolicy::StopOnError,
            PolicyArg::Atomic => BatchPolicy::Atomic,
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GPILOT_COMMIT"),
        ")",
        "\ntarget:  ",
        env!("GPILOT_TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Apply { actions, input, output, select, policy, undo, json } => {
            cmd_apply(config, &actions, input, output, select, policy, undo, json)
        }
        Commands::Parse { file, json } => cmd_parse(&file, json),
        Commands::Catalog { json } => cmd_catalog(json),
        Commands::Classify { text, json } => cmd_classify(&text.join(" "), json),
        Commands::Ask { instruction, input, output, yes, endpoint, model, policy, json } => {
            cmd_ask(config, &instruction.join(" "), input, output, yes, endpoint, model, policy, json)
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => cmd_config_path(config),
            ConfigCommands::Show { json } => cmd_config_show(config, json),
            ConfigCommands::SetProvider { provider, model, endpoint } => {
                cmd_config_set_provider(config, &provider, model, endpoint)
            }
            ConfigCommands::SetKey { provider } => cmd_config_set_key(&provider),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Logs go to stderr. `log` records from the library crates are bridged
/// into the subscriber.
fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("GRIDPILOT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    pub fn eval(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn apply(msg: impl Into<String>) -> Self {
        Self { code: EXIT_APPLY_FAILED, message: msg.into(), hint: None }
    }

    /// Create error from a model client error with the matching exit code.
    pub fn ask(err: ai::AskError) -> Self {
        let code = ask_exit_code(&err);
        let hint = match &err {
            ai::AskError::NotConfigured(_) => Some(format!(
                "set \"ai\": {{\"provider\": \"openai\"}} in {}",
                Settings::config_path_display()
            )),
            ai::AskError::NotImplemented(_) => Some("use the openai or local provider".to_string()),
            ai::AskError::MissingKey => Some("export GRIDPILOT_OPENAI_KEY=sk-...".to_string()),
            ai::AskError::NetworkError(_) => Some("check ai.endpoint and your connection".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    match path {
        None => Ok(Settings::load()),
        Some(path) => Settings::load_from(path).map_err(|e| match e {
            gridpilot_config::SettingsError::Io { .. } => CliError::io(e.to_string()),
            gridpilot_config::SettingsError::Parse { .. } => CliError::parse(e.to_string()),
        }),
    }
}

fn session_config(settings: &Settings) -> Result<SessionConfig, CliError> {
    let batch_policy = BatchPolicy::parse(&settings.batch_policy).ok_or_else(|| {
        CliError::args(format!("unknown batch.policy \"{}\"", settings.batch_policy))
            .with_hint("use \"continue\", \"stop\" or \"atomic\"")
    })?;
    Ok(SessionConfig {
        history_capacity: settings.history_capacity,
        verify_before_undo: settings.verify_before_undo,
        max_snapshot_cells: settings.max_snapshot_cells,
        executor: ExecutorConfig {
            chart_anchor: settings.chart_anchor.clone(),
            strict_payloads: settings.strict_payloads,
        },
        batch_policy,
    })
}

fn read_text(path: &Path) -> Result<String, CliError> {
    if path.as_os_str() == "-" {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .map_err(|e| CliError::io(e.to_string()))?;
        return Ok(input);
    }
    std::fs::read_to_string(path).map_err(|e| CliError::io(format!("cannot read {}: {}", path.display(), e)))
}

/// A JSON array (or single object) of Actions, or model markup.
fn read_actions(path: &Path) -> Result<ParsedResponse, CliError> {
    let text = read_text(path)?;
    let trimmed = text.trim_start();

    let from_json = |result: Result<Vec<Action>, serde_json::Error>| {
        result
            .map(|actions| ParsedResponse { actions, ..ParsedResponse::default() })
            .map_err(|e| {
                CliError::parse(format!("{}: {}", path.display(), e))
                    .with_hint("each Action needs at least \"type\"; \"target\" and \"data\" are strings")
            })
    };

    if trimmed.starts_with('[') {
        from_json(serde_json::from_str::<Vec<Action>>(trimmed))
    } else if trimmed.starts_with('{') {
        from_json(serde_json::from_str::<Action>(trimmed).map(|a| vec![a]))
    } else {
        Ok(parse_response(&text))
    }
}

fn load_workbook(input: Option<&Path>) -> Result<Workbook, CliError> {
    match input {
        Some(path) => sheet_io::read_csv(path),
        None => Ok(Workbook::new()),
    }
}

fn writes_stdout(output: Option<&Path>) -> bool {
    output.is_some_and(|p| p.as_os_str() == "-")
}

/// Print to stdout unless the sheet itself is going there.
fn emit(text: &str, sheet_on_stdout: bool) {
    if sheet_on_stdout {
        eprintln!("{}", text);
    } else {
        println!("{}", text);
    }
}

struct Applied {
    report: BatchReport,
    undone: Vec<HistoryEntry>,
    undo_error: Option<UndoError>,
}

/// Apply the session's selected Actions, then undo `undo` of them.
fn run_batch(session: &mut Session, workbook: &mut Workbook, policy: BatchPolicy, undo: usize) -> Applied {
    let report = session.apply_selected(workbook, policy);

    let mut undone = Vec::new();
    let mut undo_error = None;
    for _ in 0..undo {
        match session.undo(workbook) {
            Ok(UndoOutcome::Undone(entry)) => undone.push(entry),
            Ok(UndoOutcome::NothingToUndo) => {
                tracing::info!("nothing left to undo after {} step(s)", undone.len());
                break;
            }
            Err(e) => {
                undo_error = Some(e);
                break;
            }
        }
    }

    Applied { report, undone, undo_error }
}

fn finish(
    applied: Applied,
    session: &Session,
    workbook: &Workbook,
    output: Option<&Path>,
    json: bool,
) -> Result<serde_json::Value, CliError> {
    if let Some(path) = output {
        sheet_io::write_csv(workbook, path)?;
    }

    let history: Vec<&HistoryEntry> = session.ledger().entries().collect();
    let value = render::report_json(&applied.report, &applied.undone, &history);
    if !json {
        let sheet_on_stdout = writes_stdout(output);
        let mut text = render::report_text(&applied.report);
        for entry in &applied.undone {
            text.push_str(&format!("undone   {}\n", render::entry_line(entry)));
        }
        emit(text.trim_end(), sheet_on_stdout);
    }

    if let Some(err) = applied.undo_error {
        let hint = match err {
            UndoError::Conflict { .. } => "set history.verifyBeforeUndo to false to undo anyway",
            UndoError::Apply(_) => "the entry is kept; the sheet may be protected",
        };
        return Err(CliError::apply(format!("undo failed: {}", err)).with_hint(hint));
    }
    Ok(value)
}

// ============================================================================
// apply
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn cmd_apply(
    config: Option<&Path>,
    actions: &Path,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    select: Vec<usize>,
    policy: Option<PolicyArg>,
    undo: usize,
    json: bool,
) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let session_cfg = session_config(&settings)?;
    let policy = policy.map(BatchPolicy::from).unwrap_or(session_cfg.batch_policy);

    let parsed = read_actions(actions)?;
    if parsed.actions.is_empty() {
        return Err(CliError::parse(format!("no actions found in {}", actions.display()))
            .with_hint("expected a JSON array of Actions or <action> tags"));
    }

    let mut workbook = load_workbook(input.as_deref())?;
    let mut session = Session::new(session_cfg);
    let count = parsed.actions.len();
    session.stage(parsed.actions);

    if !select.is_empty() {
        if let Some(bad) = select.iter().find(|i| **i >= count) {
            return Err(CliError::args(format!("--select index {} is out of range", bad))
                .with_hint(format!("the file has {} action(s), numbered from 0", count)));
        }
        let preview = session.preview_mut();
        preview.toggle_all();
        for index in &select {
            if !preview.is_selected(*index) {
                preview.toggle(*index);
            }
        }
    }

    let applied = run_batch(&mut session, &mut workbook, policy, undo);
    let success = applied.report.is_success();
    let summary = applied.report.summary();
    let value = finish(applied, &session, &workbook, output.as_deref(), json)?;

    if json {
        emit(&value.to_string(), writes_stdout(output.as_deref()));
    }
    if !success {
        return Err(CliError::apply(summary));
    }
    Ok(())
}

// ============================================================================
// parse
// ============================================================================

fn cmd_parse(file: &Path, json: bool) -> Result<(), CliError> {
    let parsed = read_actions(file)?;

    if json {
        println!("{}", render::actions_json(&parsed.explanation, &parsed.actions, parsed.skipped));
        return Ok(());
    }

    if !parsed.explanation.is_empty() {
        println!("{}\n", parsed.explanation);
    }
    let selections = vec![true; parsed.actions.len()];
    print!("{}", render::action_list(&parsed.actions, &selections));
    if parsed.skipped > 0 {
        eprintln!("skipped {} tag(s) without a type", parsed.skipped);
    }
    Ok(())
}

// ============================================================================
// catalog / classify
// ============================================================================

fn cmd_catalog(json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", render::catalog_json());
    } else {
        print!("{}", render::catalog_text());
    }
    Ok(())
}

fn cmd_classify(text: &str, json: bool) -> Result<(), CliError> {
    let task = classify(text);
    if json {
        println!("{}", render::classify_json(task));
    } else {
        println!("{}\n\n{}", task, task.guidance());
    }
    Ok(())
}

// ============================================================================
// ask
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn cmd_ask(
    config: Option<&Path>,
    instruction: &str,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    yes: bool,
    endpoint: Option<String>,
    model: Option<String>,
    policy: Option<PolicyArg>,
    json: bool,
) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let session_cfg = session_config(&settings)?;
    let policy = policy.map(BatchPolicy::from).unwrap_or(session_cfg.batch_policy);

    let mut ai_settings = settings.ai.clone();
    if let Some(endpoint) = endpoint {
        ai_settings.endpoint = Some(endpoint);
    }
    if let Some(model) = model {
        ai_settings.model = model;
    }
    let ai_config = ResolvedAIConfig::from_settings(&ai_settings);
    tracing::debug!(?ai_config, "resolved AI configuration");

    let mut workbook = load_workbook(input.as_deref())?;
    let response = ai::ask(&ai_config, instruction, &sheet_io::preview(&workbook)).map_err(CliError::ask)?;
    for warning in &response.warnings {
        eprintln!("warning: {}", warning);
    }

    let sheet_on_stdout = writes_stdout(output.as_deref());
    let mut value = serde_json::json!({
        "task": response.task,
        "explanation": response.explanation,
        "actions": response.actions,
        "warnings": response.warnings,
    });

    if !json {
        let selections = vec![true; response.actions.len()];
        let mut text = format!("[{}] {}\n", response.task, response.explanation);
        text.push_str(&render::action_list(&response.actions, &selections));
        emit(text.trim_end(), sheet_on_stdout);
    }

    if !yes || response.actions.is_empty() {
        if json {
            emit(&value.to_string(), sheet_on_stdout);
        } else if !response.actions.is_empty() {
            eprintln!("hint:  re-run with --yes to apply these actions");
        }
        return Ok(());
    }

    let mut session = Session::new(session_cfg);
    session.stage(response.actions);
    let applied = run_batch(&mut session, &mut workbook, policy, 0);
    let success = applied.report.is_success();
    let summary = applied.report.summary();
    value["report"] = finish(applied, &session, &workbook, output.as_deref(), json)?;

    if json {
        emit(&value.to_string(), sheet_on_stdout);
    }
    if !success {
        return Err(CliError::apply(summary));
    }
    Ok(())
}

// ============================================================================
// config
// ============================================================================

fn cmd_config_path(config: Option<&Path>) -> Result<(), CliError> {
    match config {
        Some(path) => println!("{}", path.display()),
        None => println!("{}", Settings::config_path_display()),
    }
    Ok(())
}

fn cmd_config_show(config: Option<&Path>, json: bool) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let resolved = ResolvedAIConfig::from_settings(&settings.ai);
    let keychain = if gridpilot_config::keychain_available() { "ok" } else { "unavailable" };
    let key = if resolved.api_key.is_some() { "present" } else { "missing" };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "status": resolved.status.as_str(),
                "blocking_reason": resolved.blocking_reason,
                "provider": resolved.provider.name(),
                "model": resolved.model,
                "endpoint": resolved.endpoint,
                "key": key,
                "key_source": resolved.key_source.as_str(),
                "keychain": keychain,
                "batch_policy": settings.batch_policy,
                "history_capacity": settings.history_capacity,
            })
        );
    } else {
        println!("status:     {}", resolved.status.as_str());
        if let Some(reason) = &resolved.blocking_reason {
            println!("reason:     {}", reason);
        }
        println!("provider:   {}", resolved.provider.name());
        if resolved.provider.is_enabled() {
            println!("model:      {}", resolved.model);
            println!("endpoint:   {}", resolved.endpoint);
        }
        println!("key:        {} ({})", key, resolved.key_source.as_str());
        println!("keychain:   {}", keychain);
        println!("settings:   {}", config.map(|p| p.display().to_string()).unwrap_or_else(Settings::config_path_display));
    }

    match resolved.status {
        AIConfigStatus::Ready => Ok(()),
        AIConfigStatus::Disabled | AIConfigStatus::NotImplemented => {
            Err(CliError { code: EXIT_AI_DISABLED, message: String::new(), hint: None })
        }
        AIConfigStatus::MissingKey => Err(CliError {
            code: EXIT_AI_MISSING_KEY,
            message: String::new(),
            hint: Some(format!("export {}=...", gridpilot_config::env_var_name(resolved.provider.name()))),
        }),
    }
}

fn cmd_config_set_provider(
    config: Option<&Path>,
    provider: &str,
    model: Option<String>,
    endpoint: Option<String>,
) -> Result<(), CliError> {
    let provider = AIProvider::parse(provider).ok_or_else(|| {
        CliError::args(format!("unknown provider \"{}\"", provider))
            .with_hint("use none, openai, local or anthropic")
    })?;
    if config.is_some_and(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("toml"))) {
        return Err(CliError::args("set-provider writes JSON settings")
            .with_hint("edit the TOML file by hand, or pass a .json path"));
    }

    // A settings file that does not exist yet starts from defaults
    let mut settings = match config {
        Some(path) if path.exists() => load_settings(Some(path))?,
        Some(_) => Settings::default(),
        None => Settings::load(),
    };
    settings.ai.provider = provider;
    if let Some(model) = model {
        settings.ai.model = model;
    }
    if endpoint.is_some() {
        settings.ai.endpoint = endpoint;
    }

    let written = match config {
        Some(path) => settings.save_to(path).map(|_| path.display().to_string()),
        None => settings.save().map(|_| Settings::config_path_display()),
    }
    .map_err(CliError::io)?;

    tracing::info!(provider = provider.name(), "saved AI provider");
    println!("ai.provider = {} ({})", provider.name(), written);
    Ok(())
}

fn cmd_config_set_key(provider: &str) -> Result<(), CliError> {
    let provider = AIProvider::parse(provider)
        .filter(AIProvider::needs_api_key)
        .ok_or_else(|| CliError::args(format!("{} takes no API key", provider)).with_hint("use openai or anthropic"))?;

    let mut key = String::new();
    io::stdin().read_to_string(&mut key).map_err(|e| CliError::io(e.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::args("no key on stdin"));
    }

    gridpilot_config::set_api_key(provider.name(), key).map_err(|e| {
        CliError::eval(e).with_hint(format!("export {}=...", gridpilot_config::env_var_name(provider.name())))
    })?;
    println!("stored {} key in the keychain", provider.name());
    Ok(())
}

// crates/protoctl-cli/src/app.rs
// ============================================================================
// Module: Application
// Description: Top-level entry point tying discovery, commands, and calls.
// Purpose: Run one protoctl invocation end to end.
// Dependencies: clap, protoctl-client, protoctl-config, protoctl-schema, tokio
// ============================================================================

//! ## Overview
//! [`App::run`] drives one invocation:
//! 1. `__complete` requests are answered and always succeed.
//! 2. Global flags are pre-scanned and the configuration is loaded.
//! 3. Schemas are discovered from embedded models, `--descriptor-set`
//!    files, reflection of `--address`, or, failing all of those, the
//!    bookmarked services.
//! 4. The command tree is built and the full command line parsed.
//! 5. Hooks run against the [`ExecutionContext`], then the call is made.
//!
//! With no schema source the tree is empty and help is printed.
//!
//! ## Invariants
//! - Only one [`ExecutionContext`] exists per invocation.
//! - Discovery is skipped for `config` commands.
//! - A bookmark that cannot be decoded is skipped with a warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Cursor;
use std::io::Write;
use std::sync::Arc;

use clap::FromArgMatches;
use clap::error::ErrorKind;
use protoctl_client::CallTarget;
use protoctl_client::Headers;
use protoctl_client::Invoker;
use protoctl_client::Protocol;
use protoctl_client::ReflectionSchemaSource;
use protoctl_client::STREAM_BUFFER;
use protoctl_client::SchemaSource;
use protoctl_client::StaticSchemaSource;
use protoctl_config::Config;
use protoctl_config::ConfigStore;
use protoctl_config::SchemaCache;
use protoctl_config::ServiceTarget;
use protoctl_schema::OperationDefinition;
use protoctl_schema::SchemaModel;
use tokio::io::AsyncBufRead;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::args::GlobalArgs;
use crate::args::prescan;
use crate::args::root_command;
use crate::complete::COMPLETE_COMMAND;
use crate::complete::DIRECTIVE_DEFAULT;
use crate::complete::candidates;
use crate::complete::render;
use crate::config_cmd;
use crate::config_cmd::CONFIG_COMMAND;
use crate::config_cmd::ConfigCommand;
use crate::context::ExecutionContext;
use crate::context::Hooks;
use crate::context::assemble_headers;
use crate::error::CliError;
use crate::error::CliResult;
use crate::input::feed;
use crate::input::load_descriptor_set;
use crate::input::stream_sources;
use crate::input::unary_payload;
use crate::output::write_line;
use crate::output::write_raw;
use crate::t;
use crate::tree::CommandTree;
use crate::tree::ResolvedCall;
use crate::tree::SchemaBinding;

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Source of request bodies read from standard input.
type StdinReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Configures an [`App`].
#[derive(Debug, Clone)]
pub struct AppBuilder {
    /// Program name shown in help.
    name: String,
    /// Schemas compiled into the program.
    models: Vec<SchemaModel>,
    /// Hooks run before each call.
    hooks: Hooks,
    /// Aborts in-flight work.
    cancel: CancellationToken,
    /// Fixed standard input, replacing the process stdin.
    stdin: Option<Arc<[u8]>>,
}

impl AppBuilder {
    /// Creates a builder for a program called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            models: Vec::new(),
            hooks: Hooks::default(),
            cancel: CancellationToken::new(),
            stdin: None,
        }
    }

    /// Adds an embedded schema.
    #[must_use]
    pub fn with_model(mut self, model: SchemaModel) -> Self {
        self.models.push(model);
        self
    }

    /// Adds an embedded schema from an encoded `FileDescriptorSet`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Discovery`] when the bytes are not a schema.
    pub fn with_descriptor_set(self, bytes: &[u8]) -> CliResult<Self> {
        let model = SchemaModel::from_file_descriptor_set(bytes).map_err(|err| {
            CliError::Discovery(t!(
                "discovery.descriptor_invalid",
                path = "<embedded>",
                error = err
            ))
        })?;
        Ok(self.with_model(model))
    }

    /// Registers a hook run with the execution context before each call.
    #[must_use]
    pub fn with_context_fn<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut ExecutionContext) -> CliResult<()> + Send + Sync + 'static,
    {
        self.hooks.push_context(Arc::new(hook));
        self
    }

    /// Registers a hook run with the context and the resolved operation.
    #[must_use]
    pub fn with_operation_context_fn<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut ExecutionContext, &OperationDefinition) -> CliResult<()> + Send + Sync + 'static,
    {
        self.hooks.push_operation(Arc::new(hook));
        self
    }

    /// Uses `cancel` to abort calls.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Reads request bodies from `contents` instead of the process stdin.
    #[must_use]
    pub fn with_stdin(mut self, contents: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(Arc::from(contents.into()));
        self
    }

    /// Finishes configuration.
    #[must_use]
    pub fn build(self) -> App {
        App {
            name: self.name,
            models: self.models,
            hooks: self.hooks,
            cancel: self.cancel,
            stdin: self.stdin,
        }
    }
}

// ============================================================================
// SECTION: App
// ============================================================================

/// A configured protoctl program.
#[derive(Debug, Clone)]
pub struct App {
    /// Program name shown in help.
    name: String,
    /// Schemas compiled into the program.
    models: Vec<SchemaModel>,
    /// Hooks run before each call.
    hooks: Hooks,
    /// Aborts in-flight work.
    cancel: CancellationToken,
    /// Fixed standard input, replacing the process stdin.
    stdin: Option<Arc<[u8]>>,
}

impl App {
    /// Starts configuring a program called `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> AppBuilder {
        AppBuilder::new(name)
    }

    /// Returns the cancellation token shared with every call.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs the registered hooks against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Context`] when `ctx` is detached or lacks an
    /// operation some hook needs, and any error a hook returns.
    pub fn prepare(&self, ctx: &mut ExecutionContext) -> CliResult<()> {
        self.hooks.run(ctx)
    }

    /// Runs one invocation; `args` starts with the program name.
    ///
    /// Command output goes to `out`; diagnostics go through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError`] tagged with the phase that failed. Completion
    /// requests never fail.
    pub async fn run<I, S>(&self, args: I, out: &mut impl Write) -> CliResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if args.get(1).map(String::as_str) == Some(COMPLETE_COMMAND) {
            self.complete(&args, out).await;
            return Ok(());
        }

        let scan = prescan(&args)?;
        let mut store = ConfigStore::open(scan.globals.config.as_deref())?;
        let mut ctx = ExecutionContext::root(self.cancel.clone());
        *ctx.headers_mut() = assemble_headers(store.config(), &scan.globals.headers)?;

        let bindings = if scan.command() == Some(CONFIG_COMMAND) {
            Vec::new()
        } else {
            self.discover(&scan.globals, store.config(), ctx.headers()).await?
        };
        let tree = CommandTree::build(bindings)?;
        let mut command = tree.to_clap(root_command(&self.name)).subcommand(config_cmd::command());
        let matches = match command.try_get_matches_from_mut(args.iter()) {
            Ok(matches) => matches,
            Err(err) => {
                return match err.kind() {
                    ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                        write_raw(out, &err.render().to_string())
                    }
                    _ => Err(CliError::Input(t!("input.flags_invalid", error = err.render()))),
                };
            }
        };

        let Some((name, sub_matches)) = matches.subcommand() else {
            return write_raw(out, &command.render_help().to_string());
        };
        if name == CONFIG_COMMAND {
            let config_command = ConfigCommand::from_arg_matches(sub_matches)
                .map_err(|err| CliError::Input(t!("input.flags_invalid", error = err.render())))?;
            return config_cmd::run(config_command, &mut store, &scan.globals, ctx.headers(), out)
                .await;
        }

        let call = tree
            .resolve(&matches)
            .map_err(|err| CliError::Input(t!("input.flags_invalid", error = err)))?;
        let Some(call) = call else {
            return write_raw(out, &command.render_help().to_string());
        };
        ctx.set_operation(call.operation.clone());
        self.hooks.run(&mut ctx)?;

        let target = call_target(&scan.globals, call.target.as_ref(), &call.service)?;
        let invoker = Invoker::new(target, ctx.headers().clone(), ctx.cancellation().clone());
        if call.operation.mode().is_streaming() {
            stream(&invoker, &call, self.stdin(), out).await
        } else {
            unary(&invoker, &call, self.stdin(), out).await
        }
    }

    /// Returns the reader request bodies come from.
    fn stdin(&self) -> StdinReader {
        match &self.stdin {
            Some(contents) => Box::new(Cursor::new(Arc::clone(contents))),
            None => Box::new(BufReader::new(tokio::io::stdin())),
        }
    }

    // ------------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------------

    /// Collects schema bindings from every configured source.
    async fn discover(
        &self,
        globals: &GlobalArgs,
        config: &Config,
        headers: &Headers,
    ) -> CliResult<Vec<SchemaBinding>> {
        let mut bindings: Vec<SchemaBinding> =
            self.models.iter().cloned().map(SchemaBinding::new).collect();
        for path in &globals.descriptor_sets {
            let bytes = load_descriptor_set(path)?;
            let model = StaticSchemaSource::from_bytes(&bytes)
                .map_err(|err| {
                    CliError::Discovery(t!(
                        "discovery.descriptor_invalid",
                        path = path.display(),
                        error = err
                    ))
                })?
                .load()
                .await
                .map_err(|err| CliError::discovery(&path.display().to_string(), &err))?;
            bindings.push(SchemaBinding::new(model));
        }
        if let Some(address) = globals.address.as_deref() {
            let target = CallTarget::new(address, Protocol::Grpc, globals.plaintext);
            let mut source = ReflectionSchemaSource::new(target, headers.clone());
            if let Some(path) = globals.cache.clone().or_else(SchemaCache::default_path) {
                source = source.with_cache(path);
            }
            let model = source.load().await.map_err(|err| CliError::discovery(address, &err))?;
            bindings.push(SchemaBinding::new(model));
        } else if bindings.is_empty() {
            bindings = bookmarks(config);
        }
        debug!(sources = bindings.len(), "schema discovery finished");
        Ok(bindings)
    }

    // ------------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------------

    /// Answers a `__complete` request.
    async fn complete(&self, args: &[String], out: &mut impl Write) {
        let words: Vec<String> = args.iter().skip(2).cloned().collect();
        let response = if words.is_empty() {
            format!("{DIRECTIVE_DEFAULT}\n")
        } else {
            let tree = self.completion_tree(args).await;
            render(&candidates(&tree, &config_cmd::command(), &words))
        };
        if let Err(err) = write_raw(out, &response) {
            debug!(error = %err, "completion output failed");
        }
    }

    /// Builds the tree used for completion, degrading to an empty tree.
    async fn completion_tree(&self, args: &[String]) -> CommandTree {
        let scan_args: Vec<String> =
            args.iter().take(1).chain(args.iter().skip(2)).cloned().collect();
        let scan = match prescan(&scan_args) {
            Ok(scan) => scan,
            Err(err) => {
                debug!(error = %err, "completion prescan failed");
                return CommandTree::default();
            }
        };
        let config = ConfigStore::open(scan.globals.config.as_deref())
            .map(|store| store.config().clone())
            .unwrap_or_else(|err| {
                debug!(error = %err, "completion config unavailable");
                Config::default()
            });
        let headers = assemble_headers(&config, &scan.globals.headers).unwrap_or_default();
        let bindings = match self.discover(&scan.globals, &config, &headers).await {
            Ok(bindings) => bindings,
            Err(err) => {
                debug!(error = %err, "completion discovery failed");
                return CommandTree::default();
            }
        };
        CommandTree::build(bindings).unwrap_or_else(|err| {
            debug!(error = %err, "completion tree unavailable");
            CommandTree::default()
        })
    }
}

// ============================================================================
// SECTION: Bookmarks
// ============================================================================

/// Builds bindings for every decodable bookmark.
fn bookmarks(config: &Config) -> Vec<SchemaBinding> {
    config
        .services
        .iter()
        .filter_map(|entry| {
            let model = entry
                .descriptor_bytes()
                .map_err(|err| err.to_string())
                .and_then(|bytes| {
                    SchemaModel::from_file_descriptor_set(&bytes)
                        .and_then(|model| model.restrict_to(&entry.name))
                        .map_err(|err| err.to_string())
                })
                .inspect_err(|err| warn!(service = %entry.name, error = %err, "skipping bookmark"))
                .ok()?;
            Some(match config.service_target(&entry.name) {
                Some(target) => SchemaBinding::bookmarked(model, target),
                None => SchemaBinding::new(model),
            })
        })
        .collect()
}

/// Resolves where a call goes. `--address` wins over a bookmark.
fn call_target(
    globals: &GlobalArgs,
    bookmark: Option<&ServiceTarget>,
    service: &str,
) -> CliResult<CallTarget> {
    if let Some(address) = globals.address.as_deref() {
        return Ok(CallTarget::new(address, globals.protocol, globals.plaintext));
    }
    let target =
        bookmark.ok_or_else(|| CliError::Input(t!("input.address_missing", service = service)))?;
    let protocol = match target.protocol.as_deref() {
        Some(name) => name.parse::<Protocol>().map_err(|err| {
            CliError::Config(t!("config.protocol_invalid", service = service, error = err))
        })?,
        None => globals.protocol,
    };
    Ok(CallTarget::new(target.address.clone(), protocol, target.plaintext || globals.plaintext))
}

// ============================================================================
// SECTION: Calls
// ============================================================================

/// Performs a unary call and prints the response.
async fn unary(
    invoker: &Invoker,
    call: &ResolvedCall,
    stdin: StdinReader,
    out: &mut impl Write,
) -> CliResult<()> {
    let json_data = call.json_data.last().map(String::as_str);
    let payload = unary_payload(&call.value, json_data, stdin).await?;
    let response = invoker.unary(&call.operation, &payload).await?;
    write_line(out, &response)
}

/// Performs a streaming call, printing each response as it arrives.
///
/// The request feeder is always awaited; its error wins over the call's.
async fn stream(
    invoker: &Invoker,
    call: &ResolvedCall,
    stdin: StdinReader,
    out: &mut impl Write,
) -> CliResult<()> {
    let sources = stream_sources(call.operation.mode(), &call.value, &call.json_data)?;
    let (requests, input) = mpsc::channel(STREAM_BUFFER);
    let (output, mut responses) = mpsc::channel::<String>(STREAM_BUFFER);
    let feeder = tokio::spawn(feed(sources, stdin, requests));
    let print = async {
        while let Some(response) = responses.recv().await {
            write_line(out, &response)?;
        }
        Ok::<(), CliError>(())
    };
    let (called, printed) = tokio::join!(invoker.stream(&call.operation, input, output), print);
    feeder
        .await
        .map_err(|err| CliError::Invocation(t!("invoke.feeder_failed", error = err)))??;
    called?;
    printed
}

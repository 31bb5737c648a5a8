//! CLI entry point for `gmail-attachments`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::builder::BoolishValueParser;
use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use gmail_attachments::auth::oauth::OAuthSession;
use gmail_attachments::auth::SessionProvider;
use gmail_attachments::config::{self, Config};
use gmail_attachments::filter::FilterSpec;
use gmail_attachments::gmail::GmailClient;
use gmail_attachments::pipeline::Pipeline;
use gmail_attachments::stats::RunStats;

#[derive(Parser)]
#[command(
    name = "gmail-attachments",
    version,
    about = "Download Gmail attachments, or a PDF of the body when there are none",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,

    /// Config file (default: <config dir>/gmail-attachments/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log at debug level
    #[arg(
        long,
        global = true,
        env = "VERBOSE_LOGGING",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    verbose_logging: Option<bool>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download matching attachments (the default)
    Run(RunArgs),
    /// Run the OAuth consent flow and store a token
    Auth(AuthArgs),
    /// Print the effective configuration as TOML
    Config(RunArgs),
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Args, Debug, Clone, Default)]
struct AuthArgs {
    /// OAuth client secrets file
    #[arg(long, env = "GMAIL_CREDENTIALS_FILE", value_name = "FILE")]
    credentials_file: Option<PathBuf>,

    /// Where the access/refresh token is stored
    #[arg(long, env = "GMAIL_TOKEN_FILE", value_name = "FILE")]
    token_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// Gmail search query
    #[arg(long, env = "SEARCH_QUERY", value_name = "QUERY")]
    search_query: Option<String>,

    /// Maximum number of messages to examine
    #[arg(long, env = "MAX_MESSAGES", value_name = "N")]
    max_messages: Option<usize>,

    /// Directory to download into
    #[arg(long, env = "DOWNLOAD_PATH", value_name = "DIR")]
    download_path: Option<PathBuf>,

    /// One folder per message, named from subject and id
    #[arg(
        long,
        env = "CREATE_SUBJECT_FOLDERS",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    create_subject_folders: Option<bool>,

    /// Earliest message date (YYYY/MM/DD)
    #[arg(long, env = "DATE_FROM", value_name = "DATE")]
    date_from: Option<String>,

    /// Latest message date, inclusive (YYYY/MM/DD)
    #[arg(long, env = "DATE_TO", value_name = "DATE")]
    date_to: Option<String>,

    /// Case-insensitive regex the subject must contain a match for
    #[arg(long, env = "SUBJECT_PATTERN", value_name = "REGEX")]
    subject_pattern: Option<String>,

    /// Case-insensitive regex the attachment filename must contain a match for
    #[arg(long, env = "FILENAME_PATTERN", value_name = "REGEX")]
    filename_pattern: Option<String>,

    /// Save the body as PDF when no attachment is saved
    #[arg(
        long,
        env = "CONVERT_BODY_IF_NO_ATTACHMENT",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    convert_body_if_no_attachment: Option<bool>,

    /// Fail instead of starting the browser consent flow
    #[arg(long)]
    non_interactive: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    auth: AuthArgs,
}

impl AuthArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.credentials_file {
            config.auth.credentials_file = path.clone();
        }
        if let Some(path) = &self.token_file {
            config.auth.token_file = path.clone();
        }
    }
}

impl RunArgs {
    /// Overlay flags and environment variables onto the file config.
    fn apply(&self, config: &mut Config) {
        if let Some(q) = &self.search_query {
            config.gmail.search_query = q.clone();
        }
        if let Some(n) = self.max_messages {
            config.gmail.max_messages = n;
        }
        if let Some(path) = &self.download_path {
            config.output.download_path = path.clone();
        }
        if let Some(on) = self.create_subject_folders {
            config.output.create_subject_folders = on;
        }
        if let Some(on) = self.convert_body_if_no_attachment {
            config.output.convert_body_if_no_attachment = on;
        }
        let filter = &mut config.filter;
        for (arg, slot) in [
            (&self.date_from, &mut filter.date_from),
            (&self.date_to, &mut filter.date_to),
            (&self.subject_pattern, &mut filter.subject_pattern),
            (&self.filename_pattern, &mut filter.filename_pattern),
        ] {
            if let Some(value) = arg {
                *slot = Some(value.clone());
            }
        }
        if self.non_interactive {
            config.auth.interactive = false;
        }
        self.auth.apply(config);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(on) = cli.verbose_logging {
        config.general.verbose_logging = on;
    }

    let log_level = match cli.verbose {
        0 => config.general.effective_level().to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    match cli.command {
        None => cmd_run(&cli.run, config),
        Some(Commands::Run(args)) => cmd_run(&args, config),
        Some(Commands::Auth(args)) => cmd_auth(&args, config),
        Some(Commands::Config(args)) => cmd_config(&args, config),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and a log file.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "gmail_attachments.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Search, filter and download.
fn cmd_run(args: &RunArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);

    // Bad patterns and dates are reported before any network activity.
    FilterSpec::from_config(&config)?;

    let session = OAuthSession::from_config(&config.auth).get_session()?;
    let client = GmailClient::from_config(&config.gmail, session)?;
    let pipeline = Pipeline::from_config(client, &config)?;

    let pb = ProgressBar::new(pipeline.spec().max_messages as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Messages [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let start = Instant::now();
    let result = pipeline.run(&mut |_, stats| {
        pb.inc(1);
        pb.set_message(format!("{} saved", stats.files_written()));
    });
    pb.finish_and_clear();
    let stats = result?;

    let root = pipeline.materializer().root();
    if args.json {
        print_summary_json(&stats, root, start.elapsed())?;
    } else {
        print_summary_table(&stats, root, start.elapsed());
    }
    if stats.has_failures() {
        tracing::warn!(
            log_dir = %config::log_dir(&config).display(),
            "Some messages or files could not be saved; see the log for details"
        );
    }
    Ok(())
}

/// Force the consent flow and store the resulting token.
fn cmd_auth(args: &AuthArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);
    let session = OAuthSession::from_config(&config.auth);
    session.authorize()?;
    println!("Token saved to {}", session.token_path().display());
    Ok(())
}

/// Print the configuration that a run would use.
fn cmd_config(args: &RunArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);
    FilterSpec::from_config(&config)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "gmail-attachments", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print the run summary in a human-readable table.
fn print_summary_table(stats: &RunStats, root: &Path, elapsed: Duration) {
    use humansize::{format_size, BINARY};

    println!();
    for (label, value) in stats.rows() {
        println!("  {label:<34} {value}");
    }
    println!(
        "  {:<34} {}",
        "Bytes written",
        format_size(stats.bytes_written, BINARY)
    );
    println!(
        "  {:<34} {}",
        "Download location",
        root.display()
    );
    println!("  {:<34} {:.2?}", "Elapsed", elapsed);
    println!();
}

/// Print the run summary as JSON.
fn print_summary_json(stats: &RunStats, root: &Path, elapsed: Duration) -> anyhow::Result<()> {
    let summary = serde_json::json!({
        "stats": stats,
        "has_failures": stats.has_failures(),
        "download_path": root.to_string_lossy(),
        "elapsed_ms": elapsed.as_millis() as u64,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

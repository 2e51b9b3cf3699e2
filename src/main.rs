use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgGroup, Args, Parser, Subcommand};

use mail_brief::auth::{self, AccessTokenSource};
use mail_brief::config::AppConfig;
use mail_brief::digest::{DigestOutcome, DigestRequest, DigestService, DraftOutcome, identity_line};
use mail_brief::error::Error;
use mail_brief::graph::{GraphClient, MessageQuery, QueryFilter};
use mail_brief::llm::{LlmConfig, create_provider};
use mail_brief::summary::{DEFAULT_TONE, Summarizer};
use mail_brief::web::{self, AppState};

#[derive(Parser)]
#[command(name = "mail-brief", version, about = "Summarize recent Outlook mail and draft replies via Microsoft Graph")]
struct Cli {
    /// Account to sign in as (login hint), e.g. name@outlook.com
    #[arg(long, global = true)]
    login: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize the latest mail from a sender or domain
    Summarize(SummarizeArgs),
    /// Summarize messages matching a phrase
    Search(SearchArgs),
    /// Start the local web UI
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: String,
    },
}

#[derive(Args)]
#[command(group(ArgGroup::new("target").required(true).args(["from_sender", "from_domain"])))]
struct SummarizeArgs {
    /// Exact sender address, e.g. john@company.com
    #[arg(long)]
    from_sender: Option<String>,
    /// Sender domain, e.g. company.com
    #[arg(long)]
    from_domain: Option<String>,
    #[arg(long, default_value_t = 5)]
    last: usize,
    /// Only the last N days
    #[arg(long)]
    days: Option<u32>,
    /// Restrict to one mail folder
    #[arg(long)]
    folder_id: Option<String>,
    #[arg(long, default_value = DEFAULT_TONE)]
    tone: String,
    /// Meeting slot to propose, e.g. "Thu 14:00-15:00 Europe/Bucharest"
    #[arg(long)]
    slot: Option<String>,
    /// Create a reply draft to the newest message
    #[arg(long)]
    create_draft: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Keyword or phrase
    #[arg(long)]
    query: String,
    #[arg(long, default_value_t = 20)]
    last: usize,
    #[arg(long)]
    days: Option<u32>,
    #[arg(long)]
    folder_id: Option<String>,
    #[arg(long, default_value = DEFAULT_TONE)]
    tone: String,
    #[arg(long)]
    create_draft: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for the digest.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[ERROR] {e}");
            return ExitCode::from(1);
        }
    };

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_http() => {
            eprintln!("[HTTP ERROR] {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("[ERROR] {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<(), Error> {
    let tokens = auth::token_source(&config)?;
    let digests = DigestService::new(build_summarizer(&config));
    let login = cli.login.as_deref();

    match cli.command {
        Command::Summarize(args) => {
            let filter = match (args.from_sender, args.from_domain) {
                (Some(sender), _) => QueryFilter::Sender(sender),
                (None, Some(domain)) => QueryFilter::Domain(domain),
                (None, None) => QueryFilter::None,
            };
            let query = MessageQuery::new(filter, args.last)
                .with_days(args.days)
                .with_folder(args.folder_id);
            let request = DigestRequest::new(query, args.tone)
                .with_slot(args.slot)
                .with_draft(args.create_draft);
            run_digest(&config, tokens.as_ref(), login, &digests, &request, false).await
        }
        Command::Search(args) => {
            let query = MessageQuery::new(QueryFilter::Phrase(args.query), args.last)
                .with_days(args.days)
                .with_folder(args.folder_id);
            let request = DigestRequest::new(query, args.tone).with_draft(args.create_draft);
            run_digest(&config, tokens.as_ref(), login, &digests, &request, true).await
        }
        Command::Serve { bind } => {
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            eprintln!("Mail Brief UI: http://{bind}/");
            let state = AppState::new(Arc::new(config), tokens, digests);
            web::serve(listener, state).await?;
            Ok(())
        }
    }
}

fn build_summarizer(config: &AppConfig) -> Summarizer {
    let llm = LlmConfig::from_app(config).and_then(|llm_config| match create_provider(&llm_config) {
        Ok(provider) => Some(provider),
        Err(e) => {
            tracing::warn!(error = %e, "LLM provider unavailable");
            None
        }
    });
    Summarizer::new(llm, config.timezone.clone())
}

async fn run_digest(
    config: &AppConfig,
    tokens: &dyn AccessTokenSource,
    login: Option<&str>,
    digests: &DigestService,
    request: &DigestRequest,
    show_timeline: bool,
) -> Result<(), Error> {
    let token = tokens.access_token(login).await?;
    let client = GraphClient::new(config.graph_base_url.clone(), token)?;
    match identity_line(&client).await {
        Ok(line) | Err(line) => println!("{line}"),
    }

    let digest = match digests.run(&client, request).await? {
        DigestOutcome::Ready(digest) => digest,
        DigestOutcome::NoMessages => {
            println!("No messages matched the given criteria.");
            return Ok(());
        }
    };

    if show_timeline {
        println!("\n=== PARTICIPANTS ===\n");
        for address in &digest.participants {
            println!("- {address}");
        }
        println!("\n=== TIMELINE ===\n");
        for (i, m) in digest.messages.iter().enumerate() {
            println!(
                "{}. {} | {} | {}",
                i + 1,
                m.received_date_time.as_deref().unwrap_or(""),
                m.sender_address().unwrap_or(""),
                m.subject_or_empty()
            );
        }
    }

    println!("\n=== SUMMARY ===\n");
    println!("{}", digest.summary.summary);
    println!("\n=== DRAFT (HTML) ===\n");
    println!("{}", digest.summary.draft_html);

    match digest.draft {
        Some(DraftOutcome::Created { web_link, .. }) => {
            println!("\nDraft created: {}", web_link.as_deref().unwrap_or("(no link)"));
        }
        Some(DraftOutcome::Failed(e)) => return Err(e.into()),
        None => {}
    }
    Ok(())
}

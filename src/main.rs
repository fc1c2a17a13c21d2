use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cosmetics_advisor::api::{ChatServer, ChatState, TelephonyServer, TelephonyState, throttle::ChatThrottle};
use cosmetics_advisor::chat::prompt::format_product_line;
use cosmetics_advisor::db::{self, BudgetTier};
use cosmetics_advisor::telephony::{Dialogue, SessionStore};
use cosmetics_advisor::{ChatAdvisor, ChatSessions, Config, ProductRepo, Transcriber};

/// Cosmetics Advisor - product advice over chat and phone
#[derive(Parser)]
#[command(name = "advisor", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the chat advisor HTTP service
    Chat {
        /// Port to listen on
        #[arg(long, env = "ADVISOR_CHAT_PORT")]
        port: Option<u16>,
    },
    /// Run the telephony webhook service
    Telephony {
        /// Port to listen on
        #[arg(long, env = "ADVISOR_TELEPHONY_PORT")]
        port: Option<u16>,
    },
    /// Ask the advisor a single question
    Ask {
        /// The question
        query: String,
        /// Write the spoken reply (MP3) to this file
        #[arg(long)]
        speak_to: Option<PathBuf>,
    },
    /// List in-stock products
    Products {
        /// Exact category (case-insensitive)
        #[arg(short, long)]
        category: Option<String>,
        /// Budget tier: low, medium or premium
        #[arg(short, long)]
        budget: Option<String>,
    },
    /// Place an outbound advisor call
    Call {
        /// Number to call; defaults to USER_PHONE_NUMBER
        #[arg(long)]
        to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,cosmetics_advisor=info",
        1 => "info,cosmetics_advisor=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;

    match cli.command {
        Command::Chat { port } => run_chat(config, port).await,
        Command::Telephony { port } => run_telephony(config, port).await,
        Command::Ask { query, speak_to } => ask(&config, &query, speak_to).await,
        Command::Products { category, budget } => products(&config, category, budget),
        Command::Call { to } => call(&config, to).await,
    }
}

fn build_advisor(config: &Config, catalog: ProductRepo) -> anyhow::Result<ChatAdvisor> {
    let mut advisor = ChatAdvisor::new(catalog, Arc::new(config.llm_client()?));

    if let Some(recognizer) = config.speech_recognizer()? {
        advisor = advisor.with_transcriber(Transcriber::new(recognizer));
    } else {
        tracing::info!("no speech recognizer configured, microphone input disabled");
    }
    if let Some(tts) = config.speech_synthesizer()? {
        advisor = advisor.with_tts(tts);
    }

    Ok(advisor)
}

async fn run_chat(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let pool = db::init(&config.database.path)?;
    let advisor = build_advisor(&config, ProductRepo::new(pool.clone()))?;

    let state = ChatState {
        db: pool,
        advisor,
        sessions: ChatSessions::new(),
        throttle: config.server.rate_limit_rpm.map(ChatThrottle::per_minute),
    };

    let port = port.unwrap_or(config.server.port);
    tracing::info!(port, "starting chat advisor");

    ChatServer::new(state, port)
        .static_dir(config.server.static_dir.clone())
        .run()
        .await?;
    Ok(())
}

async fn run_telephony(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let pool = db::init(&config.database.path)?;
    let dialogue = Dialogue::new(config.dialogue_script(), ProductRepo::new(pool.clone()));

    let twilio = match config.twilio_client() {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!(error = %e, "outbound calls unavailable");
            None
        }
    };

    let state = TelephonyState {
        db: pool,
        dialogue,
        sessions: SessionStore::default(),
        twilio,
        to_number: config.telephony.to_number.clone(),
        voice_url: config.telephony.url("voice"),
        status_url: config.telephony.url("status"),
    };

    let port = port.unwrap_or(config.telephony.port);
    tracing::info!(port, public_url = %config.telephony.public_url, "starting telephony advisor");

    TelephonyServer::new(state, port).run().await?;
    Ok(())
}

async fn ask(config: &Config, query: &str, speak_to: Option<PathBuf>) -> anyhow::Result<()> {
    let pool = db::init(&config.database.path)?;
    let advisor = ChatAdvisor::new(ProductRepo::new(pool), Arc::new(config.llm_client()?));

    let reply = advisor.generate_response(query).await?;
    println!("{reply}");

    if let Some(path) = speak_to {
        let Some(tts) = config.speech_synthesizer()? else {
            anyhow::bail!("--speak-to needs OPENAI_API_KEY or ELEVENLABS_API_KEY");
        };
        let mp3 = tts.synthesize(&reply).await?;
        tokio::fs::write(&path, mp3).await?;
        println!("\nSpoken reply written to {}", path.display());
    }

    Ok(())
}

fn products(config: &Config, category: Option<String>, budget: Option<String>) -> anyhow::Result<()> {
    if let Some(text) = budget.as_deref() {
        if BudgetTier::parse(text).is_none() {
            tracing::warn!(budget = text, "unrecognized budget tier, showing all prices");
        }
    }

    let pool = db::init(&config.database.path)?;
    let products = ProductRepo::new(pool).fetch_by_text(category.as_deref(), budget.as_deref())?;

    if products.is_empty() {
        println!("No products in stock for that selection.");
        return Ok(());
    }

    for product in &products {
        println!("{}  [{}, stock {}]", format_product_line(product), product.category, product.stock);
    }
    Ok(())
}

async fn call(config: &Config, to: Option<String>) -> anyhow::Result<()> {
    let twilio = config.twilio_client()?;
    let Some(to) = to.or_else(|| config.telephony.to_number.clone()) else {
        anyhow::bail!("no callee: pass --to or set USER_PHONE_NUMBER");
    };

    let sid = twilio
        .create_call(&to, &config.telephony.url("voice"), Some(&config.telephony.url("status")))
        .await?;
    println!("Calling {to}... SID: {sid}");
    Ok(())
}

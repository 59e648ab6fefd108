//! wtf command implementations

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use wtf_agent::{AgentLoop, Database, Outcome};
use wtf_config::{self, Config};
use wtf_provider::OpenAiProvider;

/// Arguments for `wtf sql`
pub struct SqlArgs {
    pub db: PathBuf,
    pub yes: bool,
    pub model: Option<String>,
    pub transcript: Option<PathBuf>,
    pub request: Vec<String>,
}

/// Expand short model names
pub fn resolve_model(name: &str) -> String {
    match name {
        "gpt3" | "instruct" => "gpt-3.5-turbo-instruct".to_string(),
        "davinci" | "codex" => "davinci-002".to_string(),
        other => other.to_string(),
    }
}

/// Read a line from stdin. `None` on end of input.
fn read_line() -> Result<Option<String>> {
    let mut input = String::new();
    let read = std::io::stdin().read_line(&mut input)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// Read password from stdin (masked input)
fn read_password() -> Result<String> {
    match rpassword::read_password() {
        Ok(password) => Ok(password.trim().to_string()),
        Err(_) => Ok(read_line()?.unwrap_or_default()),
    }
}

/// Ask a yes/no question; an empty answer means yes, end of input means no
fn confirm(question: &str) -> Result<bool> {
    print!("{} [Y/n] ", question);
    std::io::stdout().flush()?;

    Ok(match read_line()? {
        Some(answer) => matches!(answer.to_lowercase().as_str(), "" | "y" | "yes"),
        None => false,
    })
}

/// Explore a database to answer a request
pub async fn sql_command(args: SqlArgs) -> Result<()> {
    let mut config = Config::load().await?;
    if let Some(model) = &args.model {
        config.set_primary_model(resolve_model(model));
    }

    let api_key = config
        .api_key()
        .context("No API key configured. Run `wtf setup` or set OPENAI_API_KEY")?;

    if !args.db.is_file() {
        anyhow::bail!("Database not found: {}", args.db.display());
    }
    let database = Database::open_read_only(&args.db)
        .with_context(|| format!("Failed to open {}", args.db.display()))?;

    let provider = OpenAiProvider::with_timeout(
        api_key,
        config.api_base(),
        Duration::from_secs(config.provider.request_timeout_secs),
    );

    let task = args.request.join(" ");
    let mut agent = AgentLoop::with_config(provider, database, task, &config);

    let result = explore(&mut agent, args.yes).await;

    if let Some(path) = &args.transcript {
        agent
            .session_log()
            .save_to(path)
            .await
            .with_context(|| format!("Failed to write transcript to {}", path.display()))?;
    }

    result
}

async fn explore(agent: &mut AgentLoop<OpenAiProvider>, yes: bool) -> Result<()> {
    if let Err(e) = agent.prime().await {
        warn!("◆ Planning skipped: {}", e);
    }
    if let Some(plan) = agent.plan() {
        println!("◆ Plan:\n{}\n", plan);
    }

    while let Some(proposal) = agent.next_turn().await? {
        println!("◆ {}", proposal.reason);
        println!("{}", proposal.original_query);

        if !yes && !proposal.original_query.trim().is_empty() && !confirm("Execute?")? {
            println!("◆ Aborted");
            return Ok(());
        }
    }

    match agent.outcome() {
        Outcome::Answered => {
            let answer = agent.answer_turn()?;
            if !answer.reason().is_empty() {
                println!("◆ {}", answer.reason());
            }
            println!("{}", answer.query());

            if yes || confirm("Execute?")? {
                println!("{}", agent.rerun_answer()?);
            }
            info!("◆ Session {} complete", agent.session_id());
            Ok(())
        }
        _ => Err(wtf_agent::AgentError::Exhausted.into()),
    }
}

/// Initialize config
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing wtf...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = wtf_config::init().await?;

    println!("Config:  {}", wtf_config::config_path().display());
    println!("Models:  {}", config.agent.models.join(", "));

    println!("\n◆ wtf initialized");
    println!("\nNext steps:");
    println!("  1. Add your API key: wtf setup");
    println!("     (or export {})", wtf_config::API_KEY_ENV);
    println!("  2. Ask a question:   wtf sql --db shop.db \"who ordered the most?\"");

    Ok(())
}

/// Show status
pub async fn status_command() -> Result<()> {
    let config_path = wtf_config::config_path();

    println!("◆ wtf Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!(
        "Config:   {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );

    let config = Config::load().await?;
    println!(
        "API Key:  {}",
        if config.has_api_key() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!(
        "API Base: {}",
        config
            .api_base()
            .unwrap_or_else(|| wtf_provider::openai::DEFAULT_API_BASE.to_string())
    );
    println!("Models:   {}", config.agent.models.join(" -> "));
    println!("Turns:    {} max", config.agent.max_turns);

    println!("\n◆ Ready");

    Ok(())
}

/// Interactive setup wizard
pub async fn setup_command() -> Result<()> {
    println!("◆ wtf Setup Wizard");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    let mut config = Config::load().await?;

    // Step 1: API key
    println!("Step 1: OpenAI API Key");
    println!("Get your API key at: https://platform.openai.com/api-keys");
    if !config.provider.api_key.is_empty() {
        println!("(leave empty to keep the current key)");
    }
    println!();

    print!("Enter your API key: ");
    std::io::stdout().flush()?;
    let key = read_password()?;
    if !key.is_empty() {
        config.provider.api_key = key;
    } else if config.provider.api_key.is_empty() {
        println!("No key entered; {} will be used if set.", wtf_config::API_KEY_ENV);
    }
    println!();

    // Step 2: model
    println!("Step 2: Primary Model");
    println!("Current: {}", config.default_model());
    print!("Model (gpt3, davinci, or a model id; empty keeps current): ");
    std::io::stdout().flush()?;
    if let Some(model) = read_line()?.filter(|m| !m.is_empty()) {
        config.set_primary_model(resolve_model(&model));
    }
    println!();

    config.save().await?;

    println!("◆ Configuration saved to {}", wtf_config::config_path().display());
    println!("\nNext steps:");
    println!("  - Ask a question: wtf sql --db shop.db \"how many orders?\"");
    println!("  - Check status:   wtf status");

    Ok(())
}

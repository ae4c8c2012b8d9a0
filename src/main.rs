use clap::{Parser, Subcommand};
use dotenv::dotenv;
use sql_agent_rs::adk::config::Config;
use sql_agent_rs::adk::model::provider::LlmFactory;
use sql_agent_rs::sql::server::{self, AppState};
use sql_agent_rs::sql::SqlAgent;

use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a single question
    Ask {
        /// The question, in any language
        #[arg(short, long)]
        question: String,
    },
    /// List the chat models a provider offers
    Models {
        #[arg(short, long, default_value = "mistral")]
        provider: String,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    log::debug!("Loaded config: {:?}", config);

    match args.command {
        Commands::Ask { question } => {
            let agent = SqlAgent::from_config(&config).await?;
            let state = agent.invoke(&question).await?;

            if let Some(sql) = &state.sql_query {
                println!("SQL: {}", sql);
            }
            if let Some(table) = &state.execution_result {
                println!("Result:\n{}", table);
            }
            match state.final_answer() {
                Some(answer) => println!("Answer: {}", answer),
                None => {
                    let error = state.error.as_deref().unwrap_or("no answer generated");
                    eprintln!("Failed: {}", error);
                    std::process::exit(1);
                }
            }
        }
        Commands::Models { provider } => {
            let factory = LlmFactory::new(&config.api_keys);
            let models = factory.list_models(&provider).await?;
            println!("{} models available from {}:", models.len(), provider);
            for model in models {
                println!("  {} ({} tokens)", model.id, model.context_length);
            }
        }
        Commands::Serve { port } => {
            let agent = SqlAgent::from_config(&config).await?;
            let state = Arc::new(AppState {
                agent: Arc::new(agent),
                factory: LlmFactory::new(&config.api_keys),
            });
            server::serve(state, port).await?;
        }
    }

    Ok(())
}

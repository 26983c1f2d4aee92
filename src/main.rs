use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod config;
mod error;
mod executor;
mod io;
mod llm;
mod pipeline;
mod source;
mod template;

use config::{RunConfig, SettingsOverrides};
use executor::Executor;
use io::StdinHandle;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "llm",
    version,
    about = "Send a prompt, prompt file, or prompt template to a chat model",
    long_about = None,
    after_help = "Examples:\n  llm prompt.txt\n  llm prompt_template.txt argument1 argument2\n  echo \"Just say hello\" | llm\n  echo \"input text\" | llm prompt_template.txt\n  llm --stream \"Just say hello in {{language}}\" Japanese"
)]
struct Cli {
    /// Prompt text, {{variable}} template, or path to a prompt file. Read from stdin when omitted.
    #[arg(value_name = "PROMPT")]
    prompt: Option<String>,

    /// Template values in order. A file path is replaced by its contents, '-' by stdin.
    #[arg(value_name = "ARGS")]
    args: Vec<String>,

    /// Stream output tokens as they arrive
    #[arg(short = 's', long = "stream")]
    stream: bool,

    /// Log the resolved prompt and request details to stderr (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Model identifier
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// Config profile name
    #[arg(short = 'p', long = "profile")]
    profile: Option<String>,

    /// Provider: openai, groq, lmstudio, or mock
    #[arg(long = "provider")]
    provider: Option<String>,

    /// Timeout (seconds) for network requests
    #[arg(long = "timeout")]
    timeout_secs: Option<u64>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("error: {:#}", e);
        std::process::exit(error::exit_code_for(&e));
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = RunConfig::resolve(&SettingsOverrides {
        profile: cli.profile.as_deref(),
        provider: cli.provider.as_deref(),
        model: cli.model.as_deref(),
        timeout_secs: cli.timeout_secs,
    })?;

    let mut stdin = StdinHandle::from_process();
    let prompt = pipeline::resolve_prompt(cli.prompt.as_deref(), &cli.args, &mut stdin)?;

    let backend = llm::backend_for(&config)?;
    let req = executor::build_request(&config.model, prompt, cli.stream);
    let mut executor = Executor::new(std::io::stdout());
    executor.run(backend.as_ref(), req).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_prompt_args_and_flags() {
        let cli = Cli::try_parse_from(["llm", "-s", "-v", "Say {{a}} {{b}}", "-", "two"]).unwrap();
        assert!(cli.stream);
        assert_eq!(cli.verbose, 1);
        assert_eq!(cli.prompt.as_deref(), Some("Say {{a}} {{b}}"));
        assert_eq!(cli.args, vec!["-".to_string(), "two".to_string()]);
    }

    #[test]
    fn no_positionals_means_stdin_prompt() {
        let cli = Cli::try_parse_from(["llm", "--stream"]).unwrap();
        assert_eq!(cli.prompt, None);
        assert!(cli.args.is_empty());
    }
}

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use modelchain::{
    mlog, Config, Priority, RequirementAnalyzer, Result, ResultSynthesizer, Task,
};

/// Modelchain - plan, execute and synthesize multi-model task chains
#[derive(Parser, Debug)]
#[command(name = "modelchain")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    MODELCHAIN_DEBUG=1     Enable debug logging (alternative to --debug)\n    MODELCHAIN_CONFIG      Path to the config file")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.modelchain/modelchain.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Derive requirements for a task and propose a minimal chain
    Analyze {
        /// Task description
        description: String,

        /// Task type tag, e.g. code_generation or summarization
        #[arg(long = "type", short = 't', default_value = "reasoning")]
        task_type: String,

        /// Task input as JSON
        #[arg(long, short = 'i')]
        input: Option<String>,

        /// Override the inferred priority (speed, quality, efficiency)
        #[arg(long, short = 'p')]
        priority: Option<Priority>,
    },

    /// Combine a JSON array of phase outcomes into one formatted result
    Synthesize {
        /// File holding the outcomes, or - for stdin
        file: PathBuf,

        /// Require every phase to complete for overall success
        #[arg(long)]
        require_all_phases: bool,

        /// Print the combined result without formatting
        #[arg(long)]
        raw: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    modelchain::log::init(cli.debug);
    if modelchain::log::is_debug() {
        eprintln!("Debug logging to ~/.modelchain/modelchain.log");
    }
    mlog!("modelchain starting: {:?}", cli.command);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let report = json!({
                "error": {
                    "code": err.code(),
                    "message": err.to_string(),
                    "details": err.details(),
                }
            });
            eprintln!("{}", serde_json::to_string_pretty(&report).unwrap_or_else(|_| err.to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Analyze {
            description,
            task_type,
            input,
            priority,
        } => {
            let input = match input {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Value::Null,
            };
            let mut task = Task::new(task_type, description, input);
            if let Some(priority) = priority {
                task = task.with_metadata("priority", json!(priority.to_string()));
            }

            let analyzer = RequirementAnalyzer::new();
            let requirements = analyzer.analyze(&task)?;
            let suggestion = analyzer.suggest_model_chain(&requirements);
            print_json(&json!({
                "task": task.id,
                "requirements": requirements,
                "suggestedChain": suggestion,
            }))
        }

        Command::Synthesize {
            file,
            require_all_phases,
            raw,
        } => {
            let text = if file.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin())?
            } else {
                fs::read_to_string(&file)?
            };
            let values: Vec<Value> = serde_json::from_str(&text)?;

            let mut config = Config::load()?.synthesizer;
            config.require_all_phases |= require_all_phases;
            let synthesizer = ResultSynthesizer::new(config);

            let combined = synthesizer.combine_json(&values)?;
            if raw {
                print_json(&combined)
            } else {
                print_json(&synthesizer.format(&combined))
            }
        }

        Command::Config { init } => {
            let config = if init {
                let config = Config::default();
                config.save()?;
                eprintln!("Wrote {}", Config::config_path()?.display());
                config
            } else {
                Config::load()?
            };
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

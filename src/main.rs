/// Interactive entry point: read a flood-related question, run the
/// pipeline, print the answer, and optionally save JSON and Markdown
/// results.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use flai_service::config::{AppConfig, Settings};
use flai_service::logging::{self, LogLevel};
use flai_service::pipeline;
use flai_service::report::markdown;

const SETTINGS_PATH: &str = "flai_service.toml";

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let settings = match Settings::load(SETTINGS_PATH) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logger(LogLevel::Info, settings.log_file.as_deref(), false);

    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("======================================================================");
    println!("  FLOOD INFORMATION RETRIEVAL & QUESTION ANSWERING SYSTEM");
    println!("======================================================================");
    println!();
    println!("This system will:");
    println!("  1. Retrieve flood-related data from the flai database");
    println!("  2. Select the information relevant to your question");
    println!("  3. Generate a comprehensive answer");
    println!();
    println!("Example queries:");
    println!("  - 'What is the flood history in Tuscaloosa, Alabama?'");
    println!("  - 'What is the precipitation forecast for the next 2 hours in Birmingham?'");
    println!("  - 'Why is Mobile, AL vulnerable to flooding?'");
    println!("======================================================================");
    println!();

    let query = match prompt_line("Enter your query: ") {
        Some(q) if !q.is_empty() => q,
        _ => {
            eprintln!("Error: Query cannot be empty.");
            return ExitCode::FAILURE;
        }
    };
    println!();

    let result = match pipeline::run_query(&cfg, &settings, &query) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to process query: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!();
    println!("======================================================================");
    println!("FINAL ANSWER");
    println!("======================================================================");
    println!();
    println!("Question: {}", result.query);
    println!();
    println!("{}", result.answer);
    println!();
    println!("======================================================================");
    println!();

    let choice = prompt_line("Save detailed results? (json/md/all/no): ")
        .unwrap_or_default()
        .to_lowercase();

    if choice == "json" || choice == "all" {
        match pipeline::save_json(&result, &settings.results_dir) {
            Ok(path) => println!("JSON results saved to {}", path.display()),
            Err(e) => eprintln!("Error saving JSON: {}", e),
        }
    }

    if choice == "md" || choice == "all" {
        match markdown::write_markdown_report(&result, &settings.results_dir) {
            Ok(path) => println!("Markdown report saved to {}", path.display()),
            Err(e) => eprintln!("Error generating Markdown: {}", e),
        }
    }

    ExitCode::SUCCESS
}

/// Print a prompt and read one trimmed line from stdin.
fn prompt_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    io::stdout().flush().ok()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).ok()?;
    Some(line.trim().to_string())
}

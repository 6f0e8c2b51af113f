//! REPL – the interactive SARA shell.
//!
//! Plain text is handed to the orchestrator as a command.  Slash-commands:
//!   /help          – show this list
//!   /facts         – print everything in the fact store
//!   /recall <text> – show the memories most relevant to `<text>`
//!   /models        – list / switch the active model
//!   /status        – memory, model and background-task status
//!   /quit | /exit  – wait for background tasks and exit

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Runtime;

use sara_runtime::Orchestrator;
use sara_types::{CommandResponse, ResponseKind};

use crate::config::{self, Config};
use crate::ollama;

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Empty,
    Help,
    Facts,
    Recall(String),
    Models,
    Status,
    Quit,
    UnknownSlash(String),
    Command(String),
}

pub fn parse_line(raw: &str) -> Line {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Empty;
    }
    if !line.starts_with('/') {
        return Line::Command(line.to_string());
    }
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match head {
        "/help" => Line::Help,
        "/facts" => Line::Facts,
        "/recall" => Line::Recall(rest.trim().to_string()),
        "/models" => Line::Models,
        "/status" => Line::Status,
        "/quit" | "/exit" => Line::Quit,
        other => Line::UnknownSlash(other.to_string()),
    }
}

/// Run until `/quit`, EOF, Ctrl-C at the prompt, or `shutdown` being set.
pub fn run(rt: &Runtime, orchestrator: &Orchestrator, cfg: &Config, shutdown: Arc<AtomicBool>) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Terminal error".red(), e);
            return;
        }
    };

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let raw = match editor.readline("sara> ") {
            Ok(raw) => raw,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };
        if !raw.trim().is_empty() {
            let _ = editor.add_history_entry(raw.as_str());
        }

        match parse_line(&raw) {
            Line::Empty => {}
            Line::Help => cmd_help(),
            Line::Facts => cmd_facts(orchestrator),
            Line::Recall(query) => cmd_recall(rt, orchestrator, cfg, &query),
            Line::Models => cmd_models(&mut editor, cfg),
            Line::Status => cmd_status(orchestrator, cfg),
            Line::Quit => break,
            Line::UnknownSlash(other) => println!(
                "{} '{}'. Type {} for available commands.",
                "Unknown command:".red(),
                other.yellow(),
                "/help".bold()
            ),
            Line::Command(text) => match rt.block_on(orchestrator.process_command(&text)) {
                Ok(response) => print_response(&response),
                Err(e) => println!("{}", e.to_string().red()),
            },
        }
    }
    shutdown.store(true, Ordering::SeqCst);
}

fn print_response(response: &CommandResponse) {
    match response.kind {
        ResponseKind::Sync => println!("{}", response.response),
        ResponseKind::Async => println!(
            "{} {}",
            response.response.green(),
            "(running in the background)".dimmed()
        ),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "SARA Commands".bold().underline());
    println!("  {}          – anything else is a command for SARA", "<text>".bold().cyan());
    println!("  {}          – show remembered facts", "/facts".bold().cyan());
    println!("  {}  – show memories related to <text>", "/recall <text>".bold().cyan());
    println!("  {}         – list and switch models", "/models".bold().cyan());
    println!("  {}         – memory and task status", "/status".bold().cyan());
    println!("  {}    – exit", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_facts(orchestrator: &Orchestrator) {
    let doc = orchestrator.knowledge().get_facts();
    if doc.is_empty() {
        println!("  {}", "Nothing remembered yet.".dimmed());
        return;
    }
    if !doc.user_details.is_empty() {
        println!("{}", "About you".bold().underline());
        for (key, value) in &doc.user_details {
            println!("  {} : {}", key.cyan(), value);
        }
    }
    if !doc.contacts.is_empty() {
        println!("{}", "Contacts".bold().underline());
        for (name, details) in &doc.contacts {
            println!("  {}", name.bold());
            for (key, value) in details {
                println!("    {} : {}", key.cyan(), value);
            }
        }
    }
}

fn cmd_recall(rt: &Runtime, orchestrator: &Orchestrator, cfg: &Config, query: &str) {
    if query.is_empty() {
        println!("  Usage: {}", "/recall <text>".bold());
        return;
    }
    let memories = rt.block_on(
        orchestrator
            .knowledge()
            .recall_memories(query, cfg.recall_k.max(1)),
    );
    if memories.is_empty() {
        println!("  {}", "No related memories.".dimmed());
    }
    for (i, memory) in memories.iter().enumerate() {
        println!("  {}. {}", i + 1, memory);
    }
}

fn cmd_models(editor: &mut DefaultEditor, cfg: &Config) {
    println!("{}", "AI Models".bold().underline());
    println!("  Active model : {}", cfg.active_model.yellow());
    println!("  Model server : {}", cfg.llm_base_url.dimmed());

    let models = match ollama::fetch_models(&cfg.llm_base_url) {
        Ok(models) => models,
        Err(e) => {
            println!("  {}", "offline".red());
            println!("  {}", e.dimmed());
            println!("  Is Ollama running?  Try: ollama serve");
            return;
        }
    };
    if models.is_empty() {
        println!("  {}", "no models found".yellow());
        println!("  Run `ollama pull {}` to download one.", cfg.active_model);
        return;
    }
    for m in &models {
        let active = ollama::has_model(std::slice::from_ref(m), &cfg.active_model);
        let marker = if active { "▶" } else { " " };
        println!("    {} {}", marker.green(), m.name.bold());
    }

    let wanted = match editor.readline(&format!("  Switch to model [{}]: ", cfg.active_model)) {
        Ok(line) if !line.trim().is_empty() => line.trim().to_string(),
        _ => return,
    };
    if wanted == cfg.active_model {
        return;
    }
    if !ollama::has_model(&models, &wanted) {
        println!("{} '{}'", "Unknown model:".red(), wanted.yellow());
        return;
    }
    let mut new_cfg = cfg.clone();
    new_cfg.active_model = wanted.clone();
    match config::save(&new_cfg) {
        Ok(()) => println!(
            "{} {} {}",
            "✓ Active model set to".green(),
            wanted.bold(),
            "(takes effect on next start)".dimmed()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

fn cmd_status(orchestrator: &Orchestrator, cfg: &Config) {
    let knowledge = orchestrator.knowledge();
    println!("{}", "Status".bold().underline());
    println!("  Model            : {}", cfg.active_model.yellow());
    if knowledge.is_degraded() {
        println!("  Memory stream    : {}", "unavailable (facts only)".yellow());
    } else {
        println!("  Memory stream    : {} entries", knowledge.memory_count());
    }
    println!("  Remembered facts : {}", knowledge.get_facts().user_details.len());
    println!("  Background tasks : {}", orchestrator.tasks().in_flight());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_command() {
        assert_eq!(
            parse_line("  open notepad and write hello "),
            Line::Command("open notepad and write hello".into())
        );
        assert_eq!(parse_line("   "), Line::Empty);
    }

    #[test]
    fn slash_commands_are_recognised() {
        assert_eq!(parse_line("/help"), Line::Help);
        assert_eq!(parse_line("/facts"), Line::Facts);
        assert_eq!(parse_line("/models"), Line::Models);
        assert_eq!(parse_line("/status"), Line::Status);
        assert_eq!(parse_line("/quit"), Line::Quit);
        assert_eq!(parse_line("/exit"), Line::Quit);
        assert_eq!(parse_line("/start"), Line::UnknownSlash("/start".into()));
    }

    #[test]
    fn recall_takes_the_rest_of_the_line() {
        assert_eq!(
            parse_line("/recall  project deadline "),
            Line::Recall("project deadline".into())
        );
        assert_eq!(parse_line("/recall"), Line::Recall(String::new()));
    }
}

//! `sara` – command-line front end for the SARA desktop assistant.
//!
//! 1. Loads `~/.sara/config.toml`, running a **First-Run Wizard** when the
//!    file is absent.
//! 2. Probes the model server and reports the available models.
//! 3. Builds the orchestrator (fact store, memory stream, model, desktop
//!    drivers) and drops the user into an **interactive REPL**.
//! 4. On `/quit`, EOF or **Ctrl-C**, waits a bounded time for background
//!    automation tasks so their memory entries are written.

mod bootstrap;
mod config;
mod ollama;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::warn;

/// Upper bound on waiting for background tasks at exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

fn main() {
    let _telemetry = sara_runtime::init_tracing("sara");

    print_banner();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // Only fires while a command is running; at the prompt Ctrl-C is read
    // as a key by the line editor.
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – finishing the current command, then exiting …"
                .yellow()
                .bold()
        );
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Model server discovery ────────────────────────────────────────────
    print!("\n  Probing model server at {} … ", cfg.llm_base_url.dimmed());
    match ollama::fetch_models(&cfg.llm_base_url) {
        Ok(models) => {
            println!("{} ({} model(s) available)", "online".green(), models.len());
            if !ollama::has_model(&models, &cfg.active_model) {
                println!(
                    "  {} model '{}' is not installed. Run `{}`.",
                    "Warning:".yellow(),
                    cfg.active_model,
                    format!("ollama pull {}", cfg.active_model).bold()
                );
            }
        }
        Err(_) => {
            println!("{}", "offline".yellow());
            println!(
                "  {}  Run `{}` to start a local model.",
                "No Ollama instance detected.".dimmed(),
                "ollama serve".bold()
            );
        }
    }

    // ── Runtime + orchestrator ────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            return;
        }
    };
    let orchestrator = runtime.block_on(bootstrap::build_orchestrator(&cfg));
    if orchestrator.knowledge().is_degraded() {
        println!(
            "  {} memory stream unavailable; facts still work, recall is disabled.",
            "Warning:".yellow()
        );
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(&runtime, &orchestrator, &cfg, shutdown);

    // ── Graceful shutdown ─────────────────────────────────────────────────
    let pending = orchestrator.tasks().in_flight();
    if pending > 0 {
        println!(
            "  Waiting for {} background task(s) to finish …",
            pending.to_string().bold()
        );
        let tasks = orchestrator.tasks().clone();
        if !runtime.block_on(tasks.wait_idle_timeout(SHUTDOWN_GRACE)) {
            println!(
                "  {} some tasks were still running; their results are lost.",
                "Warning:".yellow()
            );
        }
    }
    println!("{}", "Goodbye.".green());
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        SARA First-Run Wizard         ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up SARA.\n");

    let mut cfg = config::Config::default();

    cfg.llm_base_url = prompt_line(
        &format!("  Model server URL [{}]: ", cfg.llm_base_url),
        &cfg.llm_base_url,
    );
    cfg.active_model = prompt_line(
        &format!("  Chat model [{}]: ", cfg.active_model),
        &cfg.active_model,
    );

    println!("  How should memories be embedded?");
    println!("    1) Ollama embedding model  (default)");
    println!("    2) Offline hashing          (no model needed, coarser recall)");
    match prompt_line("  Enter choice [1]: ", "1").as_str() {
        "2" => cfg.embedding_provider = config::EmbeddingProvider::Hashing,
        _ => {
            cfg.embedding_provider = config::EmbeddingProvider::Ollama;
            cfg.embedding_model = prompt_line(
                &format!("  Embedding model [{}]: ", cfg.embedding_model),
                &cfg.embedding_model,
            );
        }
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   _____ ___    ____  ___ "#.bold().cyan());
    println!("{}", r#"  / ___//   |  / __ \/   |"#.bold().cyan());
    println!("{}", r#"  \__ \/ /| | / /_/ / /| |"#.bold().cyan());
    println!("{}", r#" ___/ / ___ |/ _, _/ ___ |"#.bold().cyan());
    println!("{}", r#"/____/_/  |_/_/ |_/_/  |_|"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "SARA".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Desktop assistant: conversation, screen reading, memory and app automation");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}

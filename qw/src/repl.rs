//! Interactive chat session

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::engine::{Engine, Response};

/// Print a response the way a person wants to read it
pub fn print_response(response: &Response) {
    match response {
        Response::System { message } => println!("{} {}", "*".dimmed(), message.dimmed()),
        Response::Question {
            message,
            stage,
            missing_fields,
            ..
        } => {
            println!("{}", message);
            if let Some(fields) = missing_fields {
                debug!(%stage, ?fields, "print_response: question with missing fields");
            }
        }
        Response::ForceGenerate { message, recipe, .. } => {
            println!("{} {}", "Wygenerowano:".bright_green().bold(), recipe.goal_id.cyan());
            let pretty = serde_json::from_str::<serde_json::Value>(message)
                .and_then(|v| serde_json::to_string_pretty(&v))
                .unwrap_or_else(|_| message.clone());
            println!("{}", pretty);
        }
        Response::Failure { error } => eprintln!("{} {}", "error:".red().bold(), error),
    }
}

enum SlashResult {
    Continue,
    Quit,
    /// Not a local command, send it to the engine
    Forward,
}

/// REPL over one conversation
pub struct ChatSession<'a> {
    engine: &'a Engine,
    conversation_id: String,
    profile: String,
    model: String,
}

impl<'a> ChatSession<'a> {
    pub fn new(engine: &'a Engine, conversation_id: String, profile: String, model: String) -> Self {
        debug!(%conversation_id, %model, "ChatSession::new: called");
        Self {
            engine,
            conversation_id,
            profile,
            model,
        }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    match self.handle_slash_command(input) {
                        SlashResult::Continue => continue,
                        SlashResult::Quit => break,
                        SlashResult::Forward => {}
                    }

                    let response = self
                        .engine
                        .process_message(&self.conversation_id, input, &self.profile, &self.model)
                        .await;
                    print_response(&response);
                    println!();
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Rozmowa zapisana jako {}", self.conversation_id.cyan());
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Questwright".bright_cyan().bold());
        println!("Rozmowa: {}", self.conversation_id.cyan());
        println!("Wpisz {} po pomoc, {} aby wyjść", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn handle_slash_command(&self, input: &str) -> SlashResult {
        match input.split_whitespace().next().unwrap_or("") {
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/help" | "/h" => {
                self.print_help();
                SlashResult::Continue
            }
            _ => SlashResult::Forward,
        }
    }

    fn print_help(&self) {
        println!("{}", "Polecenia:".bold());
        println!("  {}      nowa rozmowa (porzuca bieżący cel)", "/new".yellow());
        println!("  {}   porzuca bieżący cel", "/cancel".yellow());
        println!("  {}    od razu zacznij quest", "/quest".yellow());
        println!("  {}    tryb z informacjami diagnostycznymi", "/debug".yellow());
        println!("  {}     krótsze pytania", "/fast".yellow());
        println!("  {} tryb standardowy", "/standard".yellow());
        println!("  {}     wyjście", "/quit".yellow());
    }
}

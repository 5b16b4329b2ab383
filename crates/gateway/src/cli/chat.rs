//! `skypearls chat`: interactive REPL.
//!
//! Each line is one turn on the current thread; replies stream to stdout.
//! Slash commands switch threads or set the intake profile.

use std::io::Write;
use std::sync::Arc;

use sv_domain::config::Config;
use sv_domain::state::LeadInfo;

use crate::bootstrap;
use crate::runtime::{run_turn, TurnEvent, TurnInput};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(config: Arc<Config>, thread: Option<String>) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config).await?;
    bootstrap::spawn_background_tasks(&state);

    let history_path = dirs::data_dir()
        .unwrap_or_default()
        .join("skypearls")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    let mut repl = Repl {
        thread_id: thread.unwrap_or_else(new_thread_id),
        lead_info: None,
    };

    eprintln!("{} concierge", state.config.brand.name);
    eprintln!("Thread: {}  |  Type /help for commands, Ctrl+D to exit", repl.thread_id);
    eprintln!();

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if repl.handle_slash_command(trimmed) {
                        break;
                    }
                    continue;
                }

                send_message(&state, &mut repl, trimmed).await;
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    if let Err(e) = state.threads.flush() {
        tracing::warn!(error = %e, "thread index flush on exit failed");
    }

    eprintln!("Goodbye!");
    Ok(())
}

fn new_thread_id() -> String {
    format!("cli:{}", uuid::Uuid::new_v4())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash command handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Repl {
    thread_id: String,
    /// Sent with the next turn only; the thread keeps it afterwards.
    lead_info: Option<LeadInfo>,
}

impl Repl {
    /// Returns `true` if the REPL should exit.
    fn handle_slash_command(&mut self, input: &str) -> bool {
        let (cmd, arg) = match input.split_once(' ') {
            Some((cmd, arg)) => (cmd, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (input, None),
        };

        match cmd {
            "/exit" | "/quit" => return true,
            "/thread" => match arg {
                Some(id) => {
                    self.thread_id = id.to_string();
                    eprintln!("Thread switched to: {}", self.thread_id);
                }
                None => eprintln!("Current thread: {}\nUsage: /thread <id>", self.thread_id),
            },
            "/new" => {
                self.thread_id = new_thread_id();
                eprintln!("New thread: {}", self.thread_id);
            }
            "/profile" => match arg.and_then(parse_profile) {
                Some(lead) => {
                    eprintln!("Profile set for {}", lead.first_name);
                    self.lead_info = Some(lead);
                }
                None => eprintln!("Usage: /profile <first name> [email]"),
            },
            "/clear" => eprint!("\x1B[2J\x1B[1;1H"),
            "/help" => {
                eprintln!("Commands:");
                eprintln!("  /thread <id>                 Switch to a thread");
                eprintln!("  /new                         Start a fresh thread");
                eprintln!("  /profile <name> [email]      Set the intake profile");
                eprintln!("  /clear                       Clear the screen");
                eprintln!("  /exit, /quit                 Exit the chat");
                eprintln!("  /help                        Show this help");
            }
            other => eprintln!("Unknown command: {other}  (type /help for a list)"),
        }
        false
    }
}

/// `"Ana ana@example.com"` → a profile that opts in to transcripts when an
/// email is given.
fn parse_profile(arg: &str) -> Option<LeadInfo> {
    let mut parts = arg.split_whitespace();
    let first_name = parts.next()?.to_string();
    let email = parts.next().filter(|e| e.contains('@')).map(str::to_string);
    Some(LeadInfo {
        first_name,
        transcript_opt_in: email.is_some(),
        email,
        phone: None,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message sending + event streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn send_message(state: &AppState, repl: &mut Repl, message: &str) {
    let input = TurnInput {
        thread_id: repl.thread_id.clone(),
        message: message.to_string(),
        lead_info: repl.lead_info.take(),
        stream: true,
    };
    let (_message_id, mut rx) = run_turn(state.clone(), input);

    while let Some(event) = rx.recv().await {
        match &event {
            TurnEvent::Token { text, .. } => {
                print!("{text}");
                std::io::stdout().flush().ok();
            }
            TurnEvent::Images { urls, .. } => {
                println!();
                for url in urls {
                    eprintln!("\x1B[2m[image: {url}]\x1B[0m");
                }
            }
            TurnEvent::Booking { booking, .. } => {
                if let Some(url) = &booking.scheduling_url {
                    eprintln!("\x1B[2m[booking: {url}]\x1B[0m");
                }
            }
            TurnEvent::Final { .. } => {
                println!();
                println!();
            }
            TurnEvent::Stopped { .. } => eprintln!("\n(turn stopped)"),
            TurnEvent::Error { message, .. } => eprintln!("\x1B[31m{message}\x1B[0m"),
        }
        if event.is_terminal() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_with_email_opts_in() {
        let lead = parse_profile("Ana ana@example.com").unwrap();
        assert_eq!(lead.first_name, "Ana");
        assert_eq!(lead.email.as_deref(), Some("ana@example.com"));
        assert!(lead.transcript_opt_in);
    }

    #[test]
    fn profile_without_email() {
        let lead = parse_profile("Ben").unwrap();
        assert!(lead.email.is_none());
        assert!(!lead.transcript_opt_in);
        assert!(parse_profile("   ").is_none());
    }

    #[test]
    fn slash_commands_switch_threads() {
        let mut repl = Repl {
            thread_id: "t1".into(),
            lead_info: None,
        };
        assert!(!repl.handle_slash_command("/thread t2"));
        assert_eq!(repl.thread_id, "t2");
        assert!(!repl.handle_slash_command("/new"));
        assert!(repl.thread_id.starts_with("cli:"));
        assert!(repl.handle_slash_command("/exit"));
    }
}

//! `skypearls run`: one turn from the command line.
//!
//! Streams the reply to stdout and exits. With `--json` the turn runs
//! without streaming and the final event is printed as JSON.

use std::io::Write;
use std::sync::Arc;

use sv_domain::config::Config;

use crate::bootstrap;
use crate::runtime::{run_turn, TurnEvent, TurnInput};

pub async fn run(
    config: Arc<Config>,
    message: String,
    thread_id: String,
    json_output: bool,
) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config).await?;

    let input = TurnInput {
        thread_id,
        message,
        lead_info: None,
        stream: !json_output,
    };
    let (_message_id, mut rx) = run_turn(state.clone(), input);

    let mut exit_code = 0;
    while let Some(event) = rx.recv().await {
        if json_output {
            if event.is_terminal() {
                println!("{}", serde_json::to_string_pretty(&event)?);
            }
        } else {
            match &event {
                TurnEvent::Token { text, .. } => {
                    print!("{text}");
                    std::io::stdout().flush().ok();
                }
                TurnEvent::Images { urls, .. } => {
                    println!();
                    for url in urls {
                        eprintln!("\x1b[2m[image: {url}]\x1b[0m");
                    }
                }
                TurnEvent::Booking { booking, .. } => {
                    if let Some(url) = &booking.scheduling_url {
                        eprintln!("\x1b[2m[booking: {url}]\x1b[0m");
                    }
                }
                TurnEvent::Final { .. } => println!(),
                TurnEvent::Stopped { .. } => eprintln!("\nturn stopped"),
                TurnEvent::Error { message, .. } => {
                    eprintln!("error: {message}");
                    exit_code = 1;
                }
            }
        }
        if event.is_terminal() {
            if matches!(event, TurnEvent::Error { .. }) {
                exit_code = 1;
            }
            break;
        }
    }

    if let Err(e) = state.threads.flush() {
        tracing::warn!(error = %e, "thread index flush on exit failed");
    }

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

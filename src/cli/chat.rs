//! Line-oriented interactive chat.

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::core::assembler::StreamError;
use crate::core::config::Config;
use crate::core::conversation::{ConversationSink, Entry, ERROR_NOTICE};
use crate::core::message::Role;
use crate::core::session::{ChatSession, SubmitError, TurnOutcome};
use crate::utils::logging::LoggingState;

const HELP_TEXT: &str = "\
Commands:
  /refine <text>   Regenerate the last answer with an edit instruction
  /retry           Regenerate the last answer unchanged
  /log [file]      Enable logging to a file, or toggle it
  /help            Show this help
  /quit            Leave the chat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Send(String),
    Refine(String),
    Retry,
    Log(Option<String>),
    Help,
    Quit,
    Unknown(String),
}

/// Interpret one line of input. Anything not starting with `/` is a message;
/// `//text` sends `/text` literally.
pub fn parse_command(line: &str) -> ReplCommand {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return ReplCommand::Send(trimmed.to_string());
    };
    if rest.starts_with('/') {
        return ReplCommand::Send(rest.to_string());
    }

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    match name {
        "refine" => ReplCommand::Refine(args.to_string()),
        "retry" => ReplCommand::Retry,
        "log" if args.is_empty() => ReplCommand::Log(None),
        "log" => ReplCommand::Log(Some(args.to_string())),
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        _ => ReplCommand::Unknown(name.to_string()),
    }
}

/// Echoes deltas to a terminal as they arrive.
pub struct ConsoleSink<W: Write> {
    out: W,
    wrote_any: bool,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            wrote_any: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn finish_line(&mut self) {
        if self.wrote_any {
            let _ = writeln!(self.out);
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
        self.wrote_any = false;
    }
}

impl<W: Write> ConversationSink for ConsoleSink<W> {
    fn append_delta(&mut self, text: &str) {
        let _ = write!(self.out, "{text}");
        let _ = self.out.flush();
        self.wrote_any = true;
    }

    fn complete_turn(&mut self, _full_text: &str) {
        self.finish_line();
    }

    fn fail_turn(&mut self, error: &StreamError) {
        warn!(error = %error, "turn failed");
        if self.wrote_any {
            let _ = writeln!(self.out, " [interrupted]");
            self.wrote_any = false;
        }
        let _ = writeln!(self.out, "{ERROR_NOTICE}");
        self.finish_line();
    }
}

enum Step {
    Continue,
    Turn(Result<TurnOutcome, SubmitError>),
    Quit,
}

fn print_transcript(session: &ChatSession) {
    for entry in session.conversation().entries() {
        match entry {
            Entry::Turn(turn) if turn.role == Role::Assistant => println!("{}\n", turn.content),
            Entry::Turn(turn) if turn.role == Role::User => println!("You: {}\n", turn.content),
            _ => {}
        }
    }
}

fn report(outcome: Result<TurnOutcome, SubmitError>) {
    match outcome {
        Ok(TurnOutcome::Failed(err)) => eprintln!("⚠️  {err}"),
        Ok(TurnOutcome::Empty) => eprintln!("(no response)"),
        Ok(TurnOutcome::Completed(_)) => {}
        Err(err) => eprintln!("⚠️  {err}"),
    }
}

pub async fn run_chat(config: &Config, log_file: Option<String>) -> Result<(), Box<dyn Error>> {
    let logging = LoggingState::new(log_file)?;
    let mut session = ChatSession::new(config, logging)?;

    eprintln!("🚀 streamchat");
    eprintln!("🌐 Endpoint: {}", session.chat_url());
    eprintln!("📝 Logging: {}", session.logging().get_status_string());
    eprintln!("💡 Type /help for commands, /quit or Ctrl+D to leave");
    eprintln!();
    print_transcript(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = parse_command(&line);
        let mut sink = ConsoleSink::new(io::stdout());
        let step = tokio::select! {
            step = async {
                match command {
                    ReplCommand::Send(text) if text.is_empty() => Step::Continue,
                    ReplCommand::Send(text) => Step::Turn(session.submit(&text, &mut sink).await),
                    ReplCommand::Refine(text) => Step::Turn(session.refine(&text, &mut sink).await),
                    ReplCommand::Retry => Step::Turn(session.retry(&mut sink).await),
                    ReplCommand::Log(path) => {
                        let result = match path {
                            Some(path) => session.logging_mut().set_log_file(path),
                            None => session.logging_mut().toggle_logging(),
                        };
                        match result {
                            Ok(message) => eprintln!("{message}"),
                            Err(err) => eprintln!("⚠️  {err}"),
                        }
                        Step::Continue
                    }
                    ReplCommand::Help => {
                        eprintln!("{HELP_TEXT}");
                        Step::Continue
                    }
                    ReplCommand::Quit => Step::Quit,
                    ReplCommand::Unknown(name) => {
                        eprintln!("⚠️  Unknown command: /{name} (try /help)");
                        Step::Continue
                    }
                }
            } => step,
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
                println!("\n[cancelled]\n");
                Step::Continue
            }
        };

        match step {
            Step::Turn(outcome) => report(outcome),
            Step::Continue => {}
            Step::Quit => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_messages() {
        assert_eq!(
            parse_command("  hello there  "),
            ReplCommand::Send("hello there".to_string())
        );
        assert_eq!(
            parse_command("//literal"),
            ReplCommand::Send("/literal".to_string())
        );
    }

    #[test]
    fn slash_commands_are_recognised() {
        assert_eq!(
            parse_command("/refine make it shorter"),
            ReplCommand::Refine("make it shorter".to_string())
        );
        assert_eq!(parse_command("/refine"), ReplCommand::Refine(String::new()));
        assert_eq!(parse_command("/retry"), ReplCommand::Retry);
        assert_eq!(parse_command("/log"), ReplCommand::Log(None));
        assert_eq!(
            parse_command("/log chat.md"),
            ReplCommand::Log(Some("chat.md".to_string()))
        );
        assert_eq!(parse_command("/help"), ReplCommand::Help);
        assert_eq!(parse_command("/quit"), ReplCommand::Quit);
        assert_eq!(
            parse_command("/theme dark"),
            ReplCommand::Unknown("theme".to_string())
        );
    }

    #[test]
    fn console_sink_prints_deltas_as_they_arrive() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.append_delta("Hel");
        sink.append_delta("lo");
        sink.complete_turn("Hello");
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "Hello\n\n");
    }

    #[test]
    fn console_sink_reports_failures() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.append_delta("part");
        sink.fail_turn(&StreamError::Transport("reset".to_string()));
        assert_eq!(
            String::from_utf8(sink.into_inner()).unwrap(),
            format!("part [interrupted]\n{ERROR_NOTICE}\n\n")
        );
    }
}

//! Terminal command parsing.

use crate::view::Screen;

/// A parsed line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text, sent as a chat message.
    Chat { content: String },
    /// `/profile [key=value ...]` — edit the draft, or show it when bare.
    Profile { fields: Vec<(String, String)> },
    Save,
    Connect,
    Skip,
    Status,
    /// Re-fetch onboarding state from the backend.
    Refresh,
    /// `/docs [filter]`
    Docs { filter: Option<String> },
    /// `/upload <path> <title> [category]`
    Upload {
        path: String,
        title: String,
        category: Option<String>,
    },
    /// `/search [query]` — a bare command clears the result.
    Search { query: String },
    Confirm,
    Reset,
    View { screen: Screen },
    Health,
    Help,
    Quit,
    /// A recognised command with bad arguments.
    Invalid { message: String },
}

/// Parses terminal input into commands.
pub struct CommandParser;

impl CommandParser {
    pub fn parse(line: &str) -> Command {
        let trimmed = line.trim();
        if !trimmed.starts_with('/') {
            return Command::Chat {
                content: trimmed.to_string(),
            };
        }

        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };

        match head.to_lowercase().as_str() {
            "/save" => Command::Save,
            "/connect" => Command::Connect,
            "/skip" => Command::Skip,
            "/status" => Command::Status,
            "/refresh" => Command::Refresh,
            "/confirm" | "/yes" => Command::Confirm,
            "/reset" | "/new" => Command::Reset,
            "/health" => Command::Health,
            "/help" | "/?" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            "/docs" => Command::Docs {
                filter: (!rest.is_empty()).then(|| rest.to_string()),
            },
            "/search" => Command::Search {
                query: rest.to_string(),
            },
            "/profile" => parse_profile(rest),
            "/upload" => parse_upload(rest),
            "/view" => match rest.parse::<Screen>() {
                Ok(screen) => Command::View { screen },
                Err(message) => Command::Invalid { message },
            },
            other => Command::Invalid {
                message: format!("unknown command {other}; type /help"),
            },
        }
    }
}

/// `key=value` pairs; values may be double-quoted.
fn parse_profile(rest: &str) -> Command {
    let mut fields = Vec::new();
    for token in tokenize(rest) {
        match token.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                fields.push((key.to_string(), value.to_string()));
            }
            _ => {
                return Command::Invalid {
                    message: format!("expected key=value, got {token:?}"),
                };
            }
        }
    }
    Command::Profile { fields }
}

fn parse_upload(rest: &str) -> Command {
    let mut tokens = tokenize(rest).into_iter();
    match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
        (Some(path), Some(title), category, None) => Command::Upload {
            path,
            title,
            category,
        },
        _ => Command::Invalid {
            message: "usage: /upload <path> <title> [category]".into(),
        },
    }
}

/// Whitespace-separated tokens with `"..."` grouping.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut started = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                started = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if started {
                    tokens.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        tokens.push(current);
    }
    tokens
}

pub const HELP: &str = "\
Commands:
  /profile key=value ...   edit the company profile draft (bare: show it)
  /save                    save the profile
  /connect                 confirm the Alpha-Business integration
  /skip                    skip the integration step for now
  /status                  session summary
  /refresh                 re-check onboarding with the backend
  /docs [filter]           list documents, optionally filtered
  /upload <path> <title> [category]
  /search <query>          search the knowledge base (bare: clear)
  /confirm                 run the proposed plan
  /reset                   start a new conversation
  /view <chat|docs|search|profile|integration>
  /health                  backend health
  /quit
Anything else is sent to the assistant.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(
            CommandParser::parse("  What is our VAT rate? "),
            Command::Chat {
                content: "What is our VAT rate?".into()
            }
        );
    }

    #[test]
    fn simple_commands() {
        assert_eq!(CommandParser::parse("/SAVE"), Command::Save);
        assert_eq!(CommandParser::parse("/confirm"), Command::Confirm);
        assert_eq!(CommandParser::parse("/exit"), Command::Quit);
        assert_eq!(CommandParser::parse("/refresh"), Command::Refresh);
        assert_eq!(CommandParser::parse("/docs"), Command::Docs { filter: None });
        assert_eq!(
            CommandParser::parse("/docs price list"),
            Command::Docs {
                filter: Some("price list".into())
            }
        );
        assert_eq!(
            CommandParser::parse("/search"),
            Command::Search { query: String::new() }
        );
    }

    #[test]
    fn profile_fields_support_quotes() {
        assert_eq!(
            CommandParser::parse(r#"/profile name="Acme Ltd" employees=12"#),
            Command::Profile {
                fields: vec![
                    ("name".into(), "Acme Ltd".into()),
                    ("employees".into(), "12".into()),
                ]
            }
        );
        assert!(matches!(
            CommandParser::parse("/profile Acme"),
            Command::Invalid { .. }
        ));
    }

    #[test]
    fn upload_arguments() {
        assert_eq!(
            CommandParser::parse(r#"/upload ./prices.txt "Price list" sales"#),
            Command::Upload {
                path: "./prices.txt".into(),
                title: "Price list".into(),
                category: Some("sales".into()),
            }
        );
        assert!(matches!(CommandParser::parse("/upload ./a.txt"), Command::Invalid { .. }));
        assert!(matches!(
            CommandParser::parse("/upload a b c d"),
            Command::Invalid { .. }
        ));
    }

    #[test]
    fn view_and_unknown() {
        assert_eq!(
            CommandParser::parse("/view docs"),
            Command::View {
                screen: Screen::Documents
            }
        );
        assert!(matches!(CommandParser::parse("/view nope"), Command::Invalid { .. }));
        assert!(matches!(CommandParser::parse("/frobnicate"), Command::Invalid { .. }));
    }
}

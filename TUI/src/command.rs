use crate::action::Action;

pub struct CommandParser;

impl CommandParser {
    pub fn parse(input: &str) -> Result<Action, String> {
        let input = input.trim();
        if !input.starts_with('/') {
            return Err("Not a command".to_string());
        }

        let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
        let args = args.trim();

        match cmd {
            "/help" => Ok(Action::Help),
            "/open" => {
                if args.is_empty() {
                    Err("Usage: /open <image path>".to_string())
                } else {
                    Ok(Action::OpenImage { path: unquote(args).to_string() })
                }
            }
            "/paste" => Ok(Action::PasteImage),
            "/capture" => Ok(Action::Capture),
            "/discard" => Ok(Action::DiscardImage),
            "/camera" => Ok(Action::RestartCamera),
            "/history" => Ok(Action::ToggleHistory),
            "/quit" => Ok(Action::Quit),
            _ => Err(format!("Unknown command: {}. Type /help for available commands.", cmd)),
        }
    }
}

/// Terminals quote dropped paths that contain spaces.
fn unquote(s: &str) -> &str {
    for q in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner;
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(CommandParser::parse("/help"), Ok(Action::Help));
        assert_eq!(CommandParser::parse(" /capture "), Ok(Action::Capture));
        assert_eq!(CommandParser::parse("/paste"), Ok(Action::PasteImage));
        assert_eq!(CommandParser::parse("/discard"), Ok(Action::DiscardImage));
        assert_eq!(CommandParser::parse("/camera"), Ok(Action::RestartCamera));
        assert_eq!(CommandParser::parse("/history"), Ok(Action::ToggleHistory));
        assert_eq!(CommandParser::parse("/quit"), Ok(Action::Quit));
    }

    #[test]
    fn test_parse_open() {
        assert_eq!(
            CommandParser::parse("/open ./homework.png"),
            Ok(Action::OpenImage { path: "./homework.png".into() })
        );
        assert_eq!(
            CommandParser::parse("/open '/tmp/my photo.jpg'"),
            Ok(Action::OpenImage { path: "/tmp/my photo.jpg".into() })
        );
        assert!(CommandParser::parse("/open").unwrap_err().starts_with("Usage"));
    }

    #[test]
    fn test_parse_rejects_non_commands() {
        assert!(CommandParser::parse("what is 2+2").is_err());
        assert!(CommandParser::parse("/frobnicate")
            .unwrap_err()
            .starts_with("Unknown command: /frobnicate"));
    }
}

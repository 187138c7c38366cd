use std::fmt;
use std::io::{self, BufRead, Write};

const KEY_PROMPT: &str = "Enter your Gemini API key (blank to cancel): ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationChoice {
    Yes,
    No,
    Cancel,
}

#[derive(Debug, Clone)]
pub struct UiError {
    message: String,
}

impl UiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for UiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UiError {}

/// Reads one key from `input`. Blank input is `None`.
pub fn prompt_api_key<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> io::Result<Option<String>> {
    writeln!(output)?;
    writeln!(output, "🔐 Moodchat API key")?;
    writeln!(output, "Create one at https://aistudio.google.com/apikey")?;
    write!(output, "{KEY_PROMPT}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed before a key was entered",
        ));
    }
    let key = line.trim();
    Ok((!key.is_empty()).then(|| key.to_string()))
}

pub fn prompt_confirmation<R: BufRead, W: Write>(
    question: &str,
    input: &mut R,
    output: &mut W,
) -> Result<ConfirmationChoice, UiError> {
    write!(output, "{question} (y/N): ").map_err(|err| UiError::new(err.to_string()))?;
    output.flush().map_err(|err| UiError::new(err.to_string()))?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .map_err(|err| UiError::new(err.to_string()))?;
    parse_confirmation(&answer)
}

pub fn parse_confirmation(input: &str) -> Result<ConfirmationChoice, UiError> {
    let trimmed = input.trim().to_lowercase();
    if trimmed.is_empty() {
        return Ok(ConfirmationChoice::No);
    }
    match trimmed.as_str() {
        "y" | "yes" => Ok(ConfirmationChoice::Yes),
        "n" | "no" => Ok(ConfirmationChoice::No),
        "c" | "cancel" => Ok(ConfirmationChoice::Cancel),
        _ => Err(UiError::new("Invalid confirmation response")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn prompt_trims_key_and_treats_blank_as_cancel() {
        let mut output = Vec::new();
        let key = prompt_api_key(&mut Cursor::new("  AIza-test \n"), &mut output).expect("prompt");
        assert_eq!(key.as_deref(), Some("AIza-test"));
        assert!(String::from_utf8_lossy(&output).contains("API key"));

        let blank = prompt_api_key(&mut Cursor::new("\n"), &mut Vec::new()).expect("prompt");
        assert_eq!(blank, None);
    }

    #[test]
    fn prompt_fails_on_closed_input() {
        let err = prompt_api_key(&mut Cursor::new(""), &mut Vec::new()).expect_err("eof");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn confirmation_defaults_to_no() {
        assert_eq!(parse_confirmation("").expect("parse"), ConfirmationChoice::No);
        assert_eq!(parse_confirmation("YES").expect("parse"), ConfirmationChoice::Yes);
        assert_eq!(parse_confirmation("c").expect("parse"), ConfirmationChoice::Cancel);
        assert!(parse_confirmation("maybe").is_err());
    }
}

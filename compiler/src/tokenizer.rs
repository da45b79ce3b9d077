use regex::Regex;
use lazy_static::lazy_static;
use crate::utils::{quote, error};
use crate::error::ProtoError;

lazy_static! {
    pub static ref TOKEN_REGEX: Regex = Regex::new(concat!(
        r"(",
        r"//[^\n]*",
        r"|/\*(?s:.*?)\*/",
        r#"|"(?:[^"\\\n]|\\.)*""#,
        r"|'(?:[^'\\\n]|\\.)*'",
        r"|-?(?:0[xX][0-9A-Fa-f]+|\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)\b",
        r"|\.?[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*",
        r"|[=;{}\[\]<>,()]",
        r"|\s+",
        r")"
    ))
    .unwrap();
}

#[derive(Debug, PartialEq)]
pub struct Token {
    pub text:   String,
    pub line:   usize,
    pub column: usize,
}

/// 1-based line and column, counted in characters.
#[derive(Debug, Clone, Copy)]
struct Position {
    line:   usize,
    column: usize,
}

impl Position {
    fn advance(&mut self, span: &str) {
        for c in span.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn token(&self, text: &str) -> Token {
        Token {
            text:   text.to_string(),
            line:   self.line,
            column: self.column,
        }
    }
}

/// Comments and whitespace separate tokens but never become one.
fn is_trivia(part: &str) -> bool {
    part.starts_with("//") || part.starts_with("/*") || part.chars().all(char::is_whitespace)
}

fn unexpected(text: &str, at: Position) -> ProtoError {
    let snippet: String = text.chars().take_while(|c| !c.is_whitespace()).take(16).collect();
    error(&format!("Syntax error: {}", quote(&snippet)), at.line, at.column)
}

/// Splits `.proto` source into tokens, dropping whitespace and comments. The
/// last token is always an empty EOF marker.
pub fn tokenize_schema(text: &str) -> Result<Vec<Token>, ProtoError> {
    let mut tokens = Vec::new();
    let mut at = Position { line: 1, column: 1 };
    let mut consumed = 0;

    for part in TOKEN_REGEX.find_iter(text) {
        // Anything the pattern had to jump over is not part of the grammar.
        if part.start() != consumed {
            return Err(unexpected(&text[consumed..], at));
        }
        if !is_trivia(part.as_str()) {
            tokens.push(at.token(part.as_str()));
        }
        at.advance(part.as_str());
        consumed = part.end();
    }

    if consumed != text.len() {
        return Err(unexpected(&text[consumed..], at));
    }

    tokens.push(at.token(""));
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(input: &str) -> Vec<String> {
        tokenize_schema(input)
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_tokenize_simple() {
        let input = "int32 x = 10;";
        let expected = vec![
            Token { text: "int32".into(), line: 1, column: 1 },
            Token { text: "x".into(),     line: 1, column: 7 },
            Token { text: "=".into(),     line: 1, column: 9 },
            Token { text: "10".into(),    line: 1, column: 11 },
            Token { text: ";".into(),     line: 1, column: 13 },
            Token { text: "".into(),      line: 1, column: 14 },
        ];
        let got = tokenize_schema(input).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_tokenize_field_options_and_maps() {
        assert_eq!(
            texts("map<string, int32> stats = 6 [packed=true];"),
            vec!["map", "<", "string", ",", "int32", ">", "stats", "=", "6", "[", "packed", "=", "true", "]", ";", ""]
        );
    }

    #[test]
    fn test_tokenize_literals_and_qualified_names() {
        assert_eq!(
            texts("syntax = \"proto3\"; .my.game.Player p = -0x1F;"),
            vec!["syntax", "=", "\"proto3\"", ";", ".my.game.Player", "p", "=", "-0x1F", ";", ""]
        );
    }

    #[test]
    fn test_tokenize_comments() {
        let input = "// header\nmessage /* inline\n comment */ P {}";
        let got = tokenize_schema(input).unwrap();
        assert_eq!(got[0], Token { text: "message".into(), line: 2, column: 1 });
        assert_eq!(got[1], Token { text: "P".into(), line: 3, column: 13 });
        assert_eq!(got.len(), 5);
    }

    #[test]
    fn test_tokenize_unexpected_text() {
        for input in ["int32 x = 10 @", "message P { /* open", "x = 10abc;"] {
            let err = tokenize_schema(input).unwrap_err();
            assert!(
                matches!(err, ProtoError::ParseError { .. }),
                "expected a ParseError but got {:?}",
                err
            );
        }
    }
}

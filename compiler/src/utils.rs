use crate::error::ProtoError;

pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

pub fn error(msg: &str, line: usize, column: usize) -> ProtoError {
    ProtoError::ParseError {
        msg: msg.to_string(),
        line,
        column,
    }
}

/// Decodes a quoted string literal token. Double-quoted literals use the JSON
/// escape rules, which cover the escapes found in practice in `.proto` files.
pub fn unquote(text: &str) -> Option<String> {
    if text.len() < 2 {
        return None;
    }
    if text.starts_with('"') {
        serde_json::from_str(text).ok()
    } else if text.starts_with('\'') && text.ends_with('\'') {
        Some(text[1..text.len() - 1].replace("\\'", "'"))
    } else {
        None
    }
}

/// Joins a scope and a name with `.`, the separator of fully-qualified names.
pub fn join_name(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(unquote("\"proto3\""), Some("proto3".to_string()));
        assert_eq!(unquote("'other.proto'"), Some("other.proto".to_string()));
        assert_eq!(unquote("\"a\\nb\""), Some("a\nb".to_string()));
        assert_eq!(unquote("proto3"), None);
    }

    #[test]
    fn names() {
        assert_eq!(join_name("", "Player"), "Player");
        assert_eq!(join_name("my.game", "Player"), "my.game.Player");
    }
}

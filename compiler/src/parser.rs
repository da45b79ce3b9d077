use crate::{
    tokenizer::Token,
    types::{Enum, EnumValue, ExtensionRange, Extend, Field, Label, MapType, Message, ProtoFile, Syntax},
    utils::{error, quote, unquote},
    error::ProtoError,
};
use brine_pb_schema::wire::MAX_TAG;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER:        Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref TYPE_NAME:         Regex = Regex::new(r"^\.?[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap();
    static ref INTEGER:           Regex = Regex::new(r"^-?(0[xX][0-9A-Fa-f]+|\d+)$").unwrap();
    static ref STRING:            Regex = Regex::new(r#"^("|').*("|')$"#).unwrap();
    static ref EQUALS:            Regex = Regex::new(r"^=$").unwrap();
    static ref SEMICOLON:         Regex = Regex::new(r"^;$").unwrap();
    static ref COMMA:             Regex = Regex::new(r"^,$").unwrap();
    static ref LEFT_BRACE:        Regex = Regex::new(r"^\{$").unwrap();
    static ref RIGHT_BRACE:       Regex = Regex::new(r"^\}$").unwrap();
    static ref LEFT_BRACKET:      Regex = Regex::new(r"^\[$").unwrap();
    static ref RIGHT_BRACKET:     Regex = Regex::new(r"^\]$").unwrap();
    static ref LEFT_ANGLE:        Regex = Regex::new(r"^<$").unwrap();
    static ref RIGHT_ANGLE:       Regex = Regex::new(r"^>$").unwrap();
    static ref LEFT_PAREN:        Regex = Regex::new(r"^\($").unwrap();
    static ref RIGHT_PAREN:       Regex = Regex::new(r"^\)$").unwrap();
    static ref SYNTAX_KEYWORD:    Regex = Regex::new(r"^syntax$").unwrap();
    static ref PACKAGE_KEYWORD:   Regex = Regex::new(r"^package$").unwrap();
    static ref IMPORT_KEYWORD:    Regex = Regex::new(r"^import$").unwrap();
    static ref IMPORT_MODIFIER:   Regex = Regex::new(r"^(public|weak)$").unwrap();
    static ref OPTION_KEYWORD:    Regex = Regex::new(r"^option$").unwrap();
    static ref MESSAGE_KEYWORD:   Regex = Regex::new(r"^message$").unwrap();
    static ref ENUM_KEYWORD:      Regex = Regex::new(r"^enum$").unwrap();
    static ref EXTEND_KEYWORD:    Regex = Regex::new(r"^extend$").unwrap();
    static ref SERVICE_KEYWORD:   Regex = Regex::new(r"^service$").unwrap();
    static ref ONEOF_KEYWORD:     Regex = Regex::new(r"^oneof$").unwrap();
    static ref MAP_KEYWORD:       Regex = Regex::new(r"^map$").unwrap();
    static ref RESERVED_KEYWORD:  Regex = Regex::new(r"^reserved$").unwrap();
    static ref EXTENSIONS_KEYWORD: Regex = Regex::new(r"^extensions$").unwrap();
    static ref GROUP_KEYWORD:     Regex = Regex::new(r"^group$").unwrap();
    static ref TO_KEYWORD:        Regex = Regex::new(r"^to$").unwrap();
    static ref MAX_KEYWORD:       Regex = Regex::new(r"^max$").unwrap();
    static ref OPTIONAL_KEYWORD:  Regex = Regex::new(r"^optional$").unwrap();
    static ref REQUIRED_KEYWORD:  Regex = Regex::new(r"^required$").unwrap();
    static ref REPEATED_KEYWORD:  Regex = Regex::new(r"^repeated$").unwrap();
    static ref EOF:               Regex = Regex::new(r"^$").unwrap();
}

/// Parses the tokens of one `.proto` file.
pub fn parse_schema(tokens: &[Token]) -> Result<ProtoFile, ProtoError> {
    if tokens.is_empty() {
        return Err(error("Expected end of file", 0, 0));
    }
    let mut parser = Parser { tokens, index: 0 };
    parser.parse_file()
}

struct Parser<'t> {
    tokens: &'t [Token],
    index:  usize,
}

impl<'t> Parser<'t> {
    /// The tokenizer always ends the stream with an EOF token, which is
    /// returned for any index past the end.
    fn current_token(&self) -> &'t Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.index.min(last)]
    }

    fn peek(&self, offset: usize, test: &Regex) -> bool {
        let last = self.tokens.len() - 1;
        test.is_match(&self.tokens[(self.index + offset).min(last)].text)
    }

    fn eat(&mut self, test: &Regex) -> bool {
        if test.is_match(&self.current_token().text) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, test: &Regex, expected: &str) -> Result<&'t Token, ProtoError> {
        let tok = self.current_token();
        if !self.eat(test) {
            return Err(error(
                &format!("Expected {} but found {}", expected, quote(&tok.text)),
                tok.line,
                tok.column,
            ));
        }
        Ok(tok)
    }

    fn unexpected_token(&self) -> ProtoError {
        let tok = self.current_token();
        if tok.text.is_empty() {
            error("Unexpected end of file", tok.line, tok.column)
        } else {
            error(
                &format!("Unexpected token {}", quote(&tok.text)),
                tok.line,
                tok.column,
            )
        }
    }

    fn parse_file(&mut self) -> Result<ProtoFile, ProtoError> {
        let mut file = ProtoFile::default();

        while !self.eat(&EOF) {
            if self.eat(&SEMICOLON) {
                continue;
            } else if self.eat(&SYNTAX_KEYWORD) {
                self.expect(&EQUALS, "\"=\"")?;
                let tok = self.expect(&STRING, "string")?;
                file.syntax = match unquote(&tok.text).as_deref() {
                    Some("proto2") => Syntax::Proto2,
                    Some("proto3") => Syntax::Proto3,
                    _ => {
                        return Err(error(
                            &format!("Unsupported syntax {}", tok.text),
                            tok.line,
                            tok.column,
                        ))
                    }
                };
                self.expect(&SEMICOLON, "\";\"")?;
            } else if self.eat(&PACKAGE_KEYWORD) {
                let tok = self.expect(&TYPE_NAME, "package name")?;
                if file.package.is_some() {
                    return Err(error("Multiple package declarations", tok.line, tok.column));
                }
                file.package = Some(tok.text.trim_start_matches('.').to_string());
                self.expect(&SEMICOLON, "\";\"")?;
            } else if self.eat(&IMPORT_KEYWORD) {
                self.eat(&IMPORT_MODIFIER);
                let tok = self.expect(&STRING, "string")?;
                let path = unquote(&tok.text)
                    .ok_or_else(|| error("Invalid string literal", tok.line, tok.column))?;
                file.imports.push(path);
                self.expect(&SEMICOLON, "\";\"")?;
            } else if self.eat(&OPTION_KEYWORD) {
                self.skip_statement()?;
            } else if self.eat(&MESSAGE_KEYWORD) {
                file.messages.push(self.parse_message()?);
            } else if self.eat(&ENUM_KEYWORD) {
                file.enums.push(self.parse_enum()?);
            } else if self.eat(&EXTEND_KEYWORD) {
                file.extends.push(self.parse_extend()?);
            } else if self.eat(&SERVICE_KEYWORD) {
                self.expect(&IDENTIFIER, "identifier")?;
                self.skip_block()?;
            } else {
                return Err(self.unexpected_token());
            }
        }

        Ok(file)
    }

    fn parse_message(&mut self) -> Result<Message, ProtoError> {
        let name_tok = self.expect(&IDENTIFIER, "identifier")?;
        self.expect(&LEFT_BRACE, "\"{\"")?;

        let mut message = Message {
            name:       name_tok.text.clone(),
            line:       name_tok.line,
            column:     name_tok.column,
            fields:     Vec::new(),
            messages:   Vec::new(),
            enums:      Vec::new(),
            extends:    Vec::new(),
            extensions: Vec::new(),
        };

        while !self.eat(&RIGHT_BRACE) {
            if self.eat(&SEMICOLON) {
                continue;
            } else if self.peek(0, &EOF) {
                return Err(self.unexpected_token());
            } else if self.peek(1, &IDENTIFIER) && self.eat(&MESSAGE_KEYWORD) {
                message.messages.push(self.parse_message()?);
            } else if self.peek(1, &IDENTIFIER) && self.eat(&ENUM_KEYWORD) {
                message.enums.push(self.parse_enum()?);
            } else if self.peek(1, &TYPE_NAME) && self.eat(&EXTEND_KEYWORD) {
                message.extends.push(self.parse_extend()?);
            } else if self.peek(1, &IDENTIFIER) && self.peek(2, &LEFT_BRACE) && self.eat(&ONEOF_KEYWORD) {
                self.parse_oneof(&mut message.fields)?;
            } else if self.peek(1, &INTEGER) && self.eat(&EXTENSIONS_KEYWORD) {
                self.parse_extensions(&mut message.extensions)?;
            } else if !self.peek(1, &EQUALS) && self.eat(&RESERVED_KEYWORD) {
                self.skip_statement()?;
            } else if !self.peek(1, &EQUALS) && self.eat(&OPTION_KEYWORD) {
                self.skip_statement()?;
            } else {
                message.fields.push(self.parse_field(true)?);
            }
        }

        Ok(message)
    }

    /// Parses one field declaration, including map fields. `oneof` members
    /// carry no label.
    fn parse_field(&mut self, allow_label: bool) -> Result<Field, ProtoError> {
        let label = if !allow_label {
            Label::None
        } else if self.eat(&OPTIONAL_KEYWORD) {
            Label::Optional
        } else if self.eat(&REQUIRED_KEYWORD) {
            Label::Required
        } else if self.eat(&REPEATED_KEYWORD) {
            Label::Repeated
        } else {
            Label::None
        };

        if self.peek(0, &GROUP_KEYWORD) && self.peek(4, &LEFT_BRACE) {
            let tok = self.current_token();
            return Err(error("Groups are not supported", tok.line, tok.column));
        }

        let mut map = None;
        let type_tok = if self.peek(1, &LEFT_ANGLE) && self.eat(&MAP_KEYWORD) {
            self.expect(&LEFT_ANGLE, "\"<\"")?;
            let key = self.expect(&IDENTIFIER, "map key type")?;
            self.expect(&COMMA, "\",\"")?;
            let value = self.expect(&TYPE_NAME, "map value type")?;
            self.expect(&RIGHT_ANGLE, "\">\"")?;
            map = Some(MapType {
                key:   key.text.clone(),
                value: value.text.clone(),
            });
            value
        } else {
            self.expect(&TYPE_NAME, "type")?
        };

        let name_tok = self.expect(&IDENTIFIER, "identifier")?;
        self.expect(&EQUALS, "\"=\"")?;
        let tag = self.parse_tag()?;
        let packed = self.parse_field_options()?;
        self.expect(&SEMICOLON, "\";\"")?;

        Ok(Field {
            name: name_tok.text.clone(),
            line: name_tok.line,
            column: name_tok.column,
            type_: type_tok.text.clone(),
            tag,
            label,
            map,
            packed,
        })
    }

    fn parse_tag(&mut self) -> Result<u32, ProtoError> {
        let tok = self.expect(&INTEGER, "integer")?;
        parse_integer(&tok.text)
            .and_then(|value| u32::try_from(value).ok())
            .ok_or_else(|| {
                error(
                    &format!("Invalid field number {}", quote(&tok.text)),
                    tok.line,
                    tok.column,
                )
            })
    }

    /// Parses `[name = value, ...]` and returns the `packed` option if set.
    /// Every other option is accepted and ignored.
    fn parse_field_options(&mut self) -> Result<Option<bool>, ProtoError> {
        let mut packed = None;
        if !self.eat(&LEFT_BRACKET) {
            return Ok(packed);
        }
        loop {
            let name = self.parse_option_name()?;
            self.expect(&EQUALS, "\"=\"")?;
            let value = self.current_token();
            if name == "packed" {
                packed = Some(match value.text.as_str() {
                    "true" => true,
                    "false" => false,
                    _ => {
                        return Err(error(
                            &format!("Expected true or false but found {}", quote(&value.text)),
                            value.line,
                            value.column,
                        ))
                    }
                });
                self.index += 1;
            } else {
                self.skip_constant()?;
            }
            if !self.eat(&COMMA) {
                break;
            }
        }
        self.expect(&RIGHT_BRACKET, "\"]\"")?;
        Ok(packed)
    }

    fn parse_option_name(&mut self) -> Result<String, ProtoError> {
        let mut name = String::new();
        loop {
            if self.eat(&LEFT_PAREN) {
                let tok = self.expect(&TYPE_NAME, "option name")?;
                self.expect(&RIGHT_PAREN, "\")\"")?;
                name.push_str(&format!("({})", tok.text));
            } else {
                let tok = self.expect(&TYPE_NAME, "option name")?;
                name.push_str(&tok.text);
            }
            // Custom option paths such as `(my.opt).field` continue with a
            // dotted identifier token.
            if !self.current_token().text.starts_with('.') {
                break;
            }
        }
        Ok(name)
    }

    /// Skips one option value. Aggregate values `{ ... }` are skipped whole.
    fn skip_constant(&mut self) -> Result<(), ProtoError> {
        if self.peek(0, &LEFT_BRACE) {
            return self.skip_block();
        }
        let tok = self.current_token();
        if tok.text.is_empty() || [",", ";", "]", "}"].contains(&tok.text.as_str()) {
            return Err(error(
                &format!("Expected constant but found {}", quote(&tok.text)),
                tok.line,
                tok.column,
            ));
        }
        self.index += 1;
        Ok(())
    }

    fn parse_oneof(&mut self, fields: &mut Vec<Field>) -> Result<(), ProtoError> {
        self.expect(&IDENTIFIER, "identifier")?;
        self.expect(&LEFT_BRACE, "\"{\"")?;
        while !self.eat(&RIGHT_BRACE) {
            if self.eat(&SEMICOLON) {
                continue;
            } else if !self.peek(1, &EQUALS) && self.eat(&OPTION_KEYWORD) {
                self.skip_statement()?;
            } else if self.peek(0, &EOF) {
                return Err(self.unexpected_token());
            } else {
                let mut field = self.parse_field(false)?;
                field.label = Label::Optional;
                fields.push(field);
            }
        }
        Ok(())
    }

    fn parse_extensions(&mut self, ranges: &mut Vec<ExtensionRange>) -> Result<(), ProtoError> {
        loop {
            let start = self.parse_tag()?;
            let end = if self.eat(&TO_KEYWORD) {
                if self.eat(&MAX_KEYWORD) {
                    MAX_TAG
                } else {
                    self.parse_tag()?
                }
            } else {
                start
            };
            ranges.push(ExtensionRange { start, end });
            if !self.eat(&COMMA) {
                break;
            }
        }
        self.parse_field_options()?;
        self.expect(&SEMICOLON, "\";\"")?;
        Ok(())
    }

    fn parse_enum(&mut self) -> Result<Enum, ProtoError> {
        let name_tok = self.expect(&IDENTIFIER, "identifier")?;
        self.expect(&LEFT_BRACE, "\"{\"")?;

        let mut values = Vec::new();
        while !self.eat(&RIGHT_BRACE) {
            if self.eat(&SEMICOLON) {
                continue;
            } else if !self.peek(1, &EQUALS) && self.eat(&OPTION_KEYWORD) {
                self.skip_statement()?;
            } else if !self.peek(1, &EQUALS) && self.eat(&RESERVED_KEYWORD) {
                self.skip_statement()?;
            } else {
                let v_name = self.expect(&IDENTIFIER, "identifier")?;
                self.expect(&EQUALS, "\"=\"")?;
                let v_tok = self.expect(&INTEGER, "integer")?;
                let value = parse_integer(&v_tok.text)
                    .and_then(|value| i32::try_from(value).ok())
                    .ok_or_else(|| {
                        error(
                            &format!("Invalid integer {}", quote(&v_tok.text)),
                            v_tok.line,
                            v_tok.column,
                        )
                    })?;
                self.parse_field_options()?;
                self.expect(&SEMICOLON, "\";\"")?;
                values.push(EnumValue {
                    name: v_name.text.clone(),
                    line: v_name.line,
                    column: v_name.column,
                    value,
                });
            }
        }

        Ok(Enum {
            name:   name_tok.text.clone(),
            line:   name_tok.line,
            column: name_tok.column,
            values,
        })
    }

    fn parse_extend(&mut self) -> Result<Extend, ProtoError> {
        let name_tok = self.expect(&TYPE_NAME, "message name")?;
        self.expect(&LEFT_BRACE, "\"{\"")?;

        let mut fields = Vec::new();
        while !self.eat(&RIGHT_BRACE) {
            if self.eat(&SEMICOLON) {
                continue;
            } else if self.peek(0, &EOF) {
                return Err(self.unexpected_token());
            }
            fields.push(self.parse_field(true)?);
        }

        Ok(Extend {
            name: name_tok.text.clone(),
            line: name_tok.line,
            column: name_tok.column,
            fields,
        })
    }

    /// Skips tokens up to and including the next top-level `;`.
    fn skip_statement(&mut self) -> Result<(), ProtoError> {
        loop {
            if self.eat(&SEMICOLON) {
                return Ok(());
            } else if self.peek(0, &LEFT_BRACE) {
                self.skip_block()?;
            } else if self.peek(0, &EOF) || self.peek(0, &RIGHT_BRACE) {
                return Err(self.unexpected_token());
            } else {
                self.index += 1;
            }
        }
    }

    /// Skips a balanced `{ ... }` block.
    fn skip_block(&mut self) -> Result<(), ProtoError> {
        self.expect(&LEFT_BRACE, "\"{\"")?;
        let mut depth = 1;
        while depth > 0 {
            if self.eat(&LEFT_BRACE) {
                depth += 1;
            } else if self.eat(&RIGHT_BRACE) {
                depth -= 1;
            } else if self.peek(0, &EOF) {
                return Err(self.unexpected_token());
            } else {
                self.index += 1;
            }
        }
        Ok(())
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize_schema;

    fn parse(input: &str) -> Result<ProtoFile, ProtoError> {
        parse_schema(&tokenize_schema(input)?)
    }

    #[test]
    fn test_parse_header() {
        let file = parse(
            r#"
            syntax = "proto3";
            package my.game;
            import public "other.proto";
            option java_package = "com.example";
            option (my.custom).flag = true;
            "#,
        )
        .unwrap();
        assert_eq!(file.syntax, Syntax::Proto3);
        assert_eq!(file.package.as_deref(), Some("my.game"));
        assert_eq!(file.imports, vec!["other.proto".to_string()]);
        assert!(file.messages.is_empty());
    }

    #[test]
    fn test_parse_message() {
        let file = parse(
            r#"
            message Player {
              required int32 id = 1;
              optional string name = 2 [default = "anon"];
              repeated int32 items = 5 [packed=true];
              map<string, int32> stats = 6;
              enum State { IDLE = 0; ACTIVE = 1; }
              message Position { required float x = 1; }
              optional State state = 3;
              optional .my.Other other = 7 [deprecated = true, packed = false];
              reserved 8, 9 to 11;
              reserved "old";
              extensions 100 to 199, 500 to max;
              oneof choice { string a = 20; Position b = 21; }
            }
            "#,
        )
        .unwrap();

        assert_eq!(file.syntax, Syntax::Proto2);
        let player = &file.messages[0];
        assert_eq!(player.name, "Player");
        assert_eq!(player.line, 2);

        let names: Vec<&str> = player.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "items", "stats", "state", "other", "a", "b"]);

        assert_eq!(player.fields[0].label, Label::Required);
        assert_eq!(player.fields[2].label, Label::Repeated);
        assert_eq!(player.fields[2].packed, Some(true));
        assert_eq!(
            player.fields[3].map,
            Some(MapType { key: "string".to_string(), value: "int32".to_string() })
        );
        assert_eq!(player.fields[3].label, Label::None);
        assert_eq!(player.fields[5].type_, ".my.Other");
        assert_eq!(player.fields[5].packed, Some(false));
        assert_eq!(player.fields[6].label, Label::Optional);
        assert_eq!(player.fields[7].tag, 21);

        assert_eq!(player.enums[0].values[1].name, "ACTIVE");
        assert_eq!(player.messages[0].name, "Position");
        assert_eq!(
            player.extensions,
            vec![
                ExtensionRange { start: 100, end: 199 },
                ExtensionRange { start: 500, end: MAX_TAG },
            ]
        );
    }

    #[test]
    fn test_parse_enum_extend_and_service() {
        let file = parse(
            r#"
            enum Status {
              option allow_alias = true;
              UNKNOWN = 0;
              ACTIVE = 2;
              RUNNING = 2 [deprecated = true];
              NEGATIVE = -1;
              HEX = 0x10;
            }
            extend Player {
              optional int32 level = 100;
            }
            service Lobby {
              rpc Join (JoinRequest) returns (JoinReply) { option deadline = 5; }
            }
            "#,
        )
        .unwrap();
        let values: Vec<(&str, i32)> = file.enums[0]
            .values
            .iter()
            .map(|v| (v.name.as_str(), v.value))
            .collect();
        assert_eq!(
            values,
            vec![("UNKNOWN", 0), ("ACTIVE", 2), ("RUNNING", 2), ("NEGATIVE", -1), ("HEX", 16)]
        );
        assert_eq!(file.extends[0].name, "Player");
        assert_eq!(file.extends[0].fields[0].tag, 100);
    }

    #[test]
    fn test_fields_named_like_keywords() {
        let file = parse("syntax = \"proto3\"; message M { string message = 1; int32 option = 2; map<int32, M> map = 3; }")
            .unwrap();
        let names: Vec<&str> = file.messages[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["message", "option", "map"]);
        assert_eq!(file.messages[0].fields[0].label, Label::None);
    }

    #[test]
    fn test_parse_errors() {
        for input in [
            "message P { int32 id = 1 }",
            "message P { int32 id = ; }",
            "message P { int32 id = 1;",
            "syntax = \"proto4\";",
            "message P { optional group G = 1 { } }",
            "message P { repeated int32 xs = 1 [packed = yes]; }",
            "message P { int32 id = -1; }",
            "struct P {}",
        ] {
            let err = parse(input).unwrap_err();
            assert!(
                matches!(err, ProtoError::ParseError { .. }),
                "expected a ParseError for {:?} but got {:?}",
                input,
                err
            );
        }
    }
}

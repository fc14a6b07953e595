use crate::error::DecodeError;
use serde_json::{Map, Value};

/// The commands understood by the playback service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Play,
}

/// A decoded request line.
///
/// Every JSON object is a valid command. The parameters are kept so they can
/// be logged, but the service always plays its configured media file no
/// matter what the gateway sends.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub raw_params: Map<String, Value>,
}

impl Command {
    /// Build a play request carrying the given parameters.
    pub fn play(params: Map<String, Value>) -> Self {
        Self {
            kind: CommandKind::Play,
            raw_params: params,
        }
    }

    /// Encode as a single request line, including the trailing newline.
    pub fn to_line(&self) -> String {
        let mut object = self.raw_params.clone();
        object
            .entry("command")
            .or_insert_with(|| Value::String("play".to_string()));
        format!("{}\n", Value::Object(object))
    }
}

/// Parse one line received from a gateway into a [`Command`].
pub fn decode(line: &str) -> Result<Command, DecodeError> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        return Err(DecodeError::Empty);
    }

    match serde_json::from_str::<Value>(line)? {
        Value::Object(params) => Ok(Command::play(params)),
        other => Err(DecodeError::NotAnObject {
            found: json_type_name(&other),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case::play_command(r#"{"command":"play"}"#)]
    #[case::unrelated_fields(r#"{"foo":1}"#)]
    #[case::empty_object("{}")]
    #[case::nested(r#"{"song":{"name":"x","tags":[1,2,3]},"volume":null}"#)]
    #[case::with_newline("{\"command\":\"play\"}\n")]
    #[case::with_crlf("{\"command\":\"stop\"}\r\n")]
    fn any_object_decodes_to_play(#[case] line: &str) {
        let command = decode(line).unwrap();
        assert_eq!(command.kind, CommandKind::Play);
    }

    #[test]
    fn parameters_are_kept_verbatim() {
        let command = decode(r#"{"foo":1,"bar":"baz"}"#).unwrap();
        assert_eq!(command.raw_params.get("foo"), Some(&Value::from(1)));
        assert_eq!(command.raw_params.get("bar"), Some(&Value::from("baz")));
    }

    #[rstest]
    #[case::empty("")]
    #[case::only_newline("\n")]
    #[case::whitespace("   \t \r\n")]
    fn blank_input_is_rejected(#[case] line: &str) {
        assert_matches!(decode(line), Err(DecodeError::Empty));
    }

    #[rstest]
    #[case::plain_text("play please")]
    #[case::truncated(r#"{"command":"pl"#)]
    #[case::trailing_garbage(r#"{"a":1} x"#)]
    fn malformed_json_is_rejected(#[case] line: &str) {
        assert_matches!(decode(line), Err(DecodeError::InvalidJson(_)));
    }

    #[rstest]
    #[case::array("[1,2,3]", "array")]
    #[case::string(r#""play""#, "string")]
    #[case::number("42", "number")]
    #[case::boolean("true", "boolean")]
    #[case::null("null", "null")]
    fn non_objects_are_rejected(#[case] line: &str, #[case] expected: &str) {
        assert_matches!(
            decode(line),
            Err(DecodeError::NotAnObject { found }) if found == expected
        );
    }

    #[test]
    fn play_line_adds_command_field() {
        let line = Command::play(Map::new()).to_line();
        assert_eq!(line, "{\"command\":\"play\"}\n");

        let decoded = decode(&line).unwrap();
        assert_eq!(decoded.raw_params.get("command"), Some(&Value::from("play")));
    }

    #[test]
    fn explicit_command_field_is_not_overwritten() {
        let mut params = Map::new();
        params.insert("command".to_string(), Value::from("shuffle"));
        let line = Command::play(params).to_line();
        assert!(line.contains("shuffle"));
    }
}

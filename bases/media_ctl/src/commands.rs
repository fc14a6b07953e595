use clap::Subcommand;
use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;
use serde_json::{Map, Value};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start playback on the remote device
    Play {
        /// Extra request parameter as key=value (repeatable)
        ///
        /// Values that parse as JSON are sent as JSON, anything else as a string.
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Send a raw JSON request line
    Raw {
        /// The request, e.g. '{"command":"play"}'
        json: String,
    },
}

/// Build the request object from `key=value` pairs.
pub fn parse_params(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut params = Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| eyre!("Invalid parameter '{}', expected KEY=VALUE", pair))?;
        if key.is_empty() {
            bail!("Invalid parameter '{}', key is empty", pair);
        }
        let value =
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_strings_and_json_values() {
        let params = parse_params(&[
            "song=first light".to_string(),
            "volume=42".to_string(),
            "loop=true".to_string(),
        ])
        .unwrap();

        assert_eq!(params["song"], Value::from("first light"));
        assert_eq!(params["volume"], Value::from(42));
        assert_eq!(params["loop"], Value::from(true));
    }

    #[test]
    fn value_may_contain_equals() {
        let params = parse_params(&["query=a=b".to_string()]).unwrap();
        assert_eq!(params["query"], Value::from("a=b"));
    }

    #[rstest]
    #[case::no_separator("volume")]
    #[case::empty_key("=3")]
    fn rejects_malformed_pairs(#[case] pair: &str) {
        assert!(parse_params(&[pair.to_string()]).is_err());
    }
}

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid override '{0}'. Expected KEY=VALUE (e.g., 'md.n-cycles=50').")]
    InvalidKeyValue(String),

    #[error("Invalid value '{value}' for '{key}': expected {expected}.")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Command for '{0}' cannot be empty.")]
    EmptyCommand(&'static str),
}

/// Splits a `KEY=VALUE` override at the first `=`.
pub fn parse_key_value(pair: &str) -> Result<(&str, &str), ParseError> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(ParseError::InvalidKeyValue(pair.to_string())),
    }
}

pub fn parse_value<T: std::str::FromStr>(
    key: &str,
    value: &str,
    expected: &'static str,
) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    })
}

/// Splits a shell-like command line on whitespace. Quoting is not
/// interpreted.
pub fn parse_command(command: &str, kind: &'static str) -> Result<Vec<String>, ParseError> {
    let parts: Vec<String> = command.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        return Err(ParseError::EmptyCommand(kind));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_splits_at_the_first_equals_sign() {
        assert_eq!(
            parse_key_value("engine.pair-coeff=* * Cu.eam Cu").unwrap(),
            ("engine.pair-coeff", "* * Cu.eam Cu")
        );
        assert_eq!(parse_key_value(" md.n-cycles = 5 ").unwrap(), ("md.n-cycles", "5"));
    }

    #[test]
    fn key_value_without_key_is_rejected() {
        assert!(matches!(
            parse_key_value("md.n-cycles"),
            Err(ParseError::InvalidKeyValue(_))
        ));
        assert!(matches!(parse_key_value("=5"), Err(ParseError::InvalidKeyValue(_))));
    }

    #[test]
    fn value_parse_failure_names_the_key() {
        let result: Result<u64, _> = parse_value("md.n-cycles", "many", "an integer");
        assert_eq!(
            result,
            Err(ParseError::InvalidValue {
                key: "md.n-cycles".to_string(),
                value: "many".to_string(),
                expected: "an integer",
            })
        );
    }

    #[test]
    fn command_is_split_on_whitespace() {
        assert_eq!(
            parse_command("mpirun  -np 4 lmp", "engine").unwrap(),
            vec!["mpirun", "-np", "4", "lmp"]
        );
        assert_eq!(parse_command("   ", "engine"), Err(ParseError::EmptyCommand("engine")));
    }
}

use serde::de::DeserializeOwned;
use std::io::{self, Read};
use tracing::debug;

/// Deserialize a request piped on stdin. `None` when stdin is a terminal or
/// carries nothing but whitespace.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_piped(&buffer)
}

fn parse_piped<T: DeserializeOwned>(buffer: &str) -> Result<Option<T>, Box<dyn std::error::Error>> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    debug!(bytes = trimmed.len(), "reading request from stdin");
    let request = serde_json::from_str(trimmed)
        .map_err(|e| format!("Failed to parse JSON from stdin: {}", e))?;
    Ok(Some(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fincalc_core::capital_budgeting::cash_flows::CashFlowInput;

    #[test]
    fn test_blank_input_is_none() {
        let parsed: Option<CashFlowInput> = parse_piped("  \n ").unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_piped_request_parsed() {
        let parsed: Option<CashFlowInput> =
            parse_piped(r#"{"cash_flows": ["-100", "110"]}"#).unwrap();
        assert_eq!(parsed.unwrap().cash_flows.len(), 2);
    }

    #[test]
    fn test_malformed_json_reported() {
        let err = parse_piped::<CashFlowInput>("{not json").unwrap_err();
        assert!(err.to_string().contains("stdin"));
    }
}

//! Generator prompt template and the fields recoverable from it
//!
//! The generator is prompted with a natural-language query and the dataset's
//! columns. Stored prompts are the only record of which columns a completion
//! was generated against, so validation recovers them from the prompt text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt has no {0} line")]
    MissingLine(&'static str),

    #[error("Malformed column list: {0}")]
    MalformedColumns(#[from] serde_json::Error),
}

const NLQ_PREFIX: &str = "NLQ:";
const COLUMNS_PREFIX: &str = "Columns:";

/// Instruction template sent to the query generator
pub const PROMPT_TEMPLATE: &str = r#"Honeycomb is an observability platform that allows you to write queries to inspect trace data. You are an assistant that takes a natural language query (NLQ) and a list of valid columns and produce a Honeycomb query.

### Instruction:

NLQ: "{nlq}"

Columns: {cols}

### Response:
"#;

/// Fill the template for one query
pub fn render_prompt(nlq: &str, columns: &[String]) -> String {
    let cols = columns
        .iter()
        .map(|column| format!("'{}'", column))
        .collect::<Vec<_>>()
        .join(", ");

    PROMPT_TEMPLATE
        .replace("{nlq}", nlq)
        .replace("{cols}", &format!("[{}]", cols))
}

/// The natural-language query a prompt was built from
pub fn extract_nlq(prompt: &str) -> Result<String, PromptError> {
    let rest = find_line(prompt, NLQ_PREFIX)?;
    Ok(rest.trim_matches('"').to_string())
}

/// The column list a prompt offered the generator
///
/// Lists are written with single quotes; they get the same quote
/// normalization as query specs.
pub fn extract_columns(prompt: &str) -> Result<Vec<String>, PromptError> {
    let rest = find_line(prompt, COLUMNS_PREFIX)?;
    Ok(serde_json::from_str(&rest.replace('\'', "\""))?)
}

fn find_line<'p>(prompt: &'p str, prefix: &'static str) -> Result<&'p str, PromptError> {
    prompt
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(prefix))
        .map(str::trim)
        .ok_or(PromptError::MissingLine(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_then_extract() {
        let columns = vec!["duration_ms".to_string(), "http.route".to_string()];
        let prompt = render_prompt("slowest routes", &columns);

        assert!(prompt.contains("Columns: ['duration_ms', 'http.route']"));
        assert_eq!(extract_nlq(&prompt).unwrap(), "slowest routes");
        assert_eq!(extract_columns(&prompt).unwrap(), columns);
    }

    #[test]
    fn test_extract_from_stored_prompt() {
        let prompt = "NLQ: \"errors by service\"\n\nColumns: ['error', 'service.name', 'trace.parent_id']\n\n### Response:\n";
        assert_eq!(
            extract_columns(prompt).unwrap(),
            vec!["error", "service.name", "trace.parent_id"]
        );
    }

    #[test]
    fn test_missing_and_malformed_columns() {
        assert!(matches!(
            extract_columns("NLQ: \"count\""),
            Err(PromptError::MissingLine("Columns:"))
        ));
        assert!(matches!(
            extract_columns("Columns: ['a', 'b'"),
            Err(PromptError::MalformedColumns(_))
        ));
        assert!(matches!(extract_nlq(""), Err(PromptError::MissingLine("NLQ:"))));
    }
}

//! Reusable prompts using Handlebars for templating. Handlebars adds
//! additional security controls since it can't do much out of the box
//! without registering your own helpers. This is ideal since output
//! from LLMs should be considered untrusted and Handlebars forces you
//! to add only what you need.

use std::fmt;

use handlebars::{Handlebars, TemplateError};

#[derive(Debug)]
pub enum Prompt {
    PlanRequests,
    FinalAnswer,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<Prompt> for String {
    fn from(item: Prompt) -> String {
        format!("{:?}", item)
    }
}

const PLAN_REQUESTS_PROMPT: &str = r#"[STRUCTURED_RESPONSE_START]
FORMAT: <dataType>,<num_days_look_back>; <dataType>,<num_days_look_back>; ...
TIMESTAMP FORMAT: positive integer
VALID DATATYPES: {{#each data_types}}{{#if @index}}, {{/if}}{{this}}{{/each}}

USER QUERY: "{{query}}"

INSTRUCTIONS: Based on the user query, provide multiple dataType and the number of days back to search. Use only the specified format and valid dataTypes. The number of days should be based on the user query. If the user says 1 month, the number of days should be 30 days back from today.
[STRUCTURED_RESPONSE_END]

IMPORTANT: After this initial structured response, please respond normally to all subsequent queries without any special formatting."#;

const FINAL_ANSWER_PROMPT: &str = r"{{query}}

Contextual Data:
{{context}}";

pub fn templates<'a>() -> Result<Handlebars<'a>, TemplateError> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Prompts are plain text so nothing should be HTML escaped
    registry.register_escape_fn(handlebars::no_escape);
    registry.register_template_string(&Prompt::PlanRequests.to_string(), PLAN_REQUESTS_PROMPT)?;
    registry.register_template_string(&Prompt::FinalAnswer.to_string(), FINAL_ANSWER_PROMPT)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_prompt_lists_data_types() {
        let registry = templates().unwrap();
        let rendered = registry
            .render(
                &Prompt::PlanRequests.to_string(),
                &json!({
                    "query": "How's my \"resting\" heart rate?",
                    "data_types": ["HeartRateData", "SleepData"],
                }),
            )
            .unwrap();

        assert!(rendered.starts_with("[STRUCTURED_RESPONSE_START]"));
        assert!(rendered.contains("VALID DATATYPES: HeartRateData, SleepData\n"));
        assert!(rendered.contains(r#"USER QUERY: "How's my "resting" heart rate?""#));
    }

    #[test]
    fn test_final_prompt_appends_context() {
        let registry = templates().unwrap();
        let rendered = registry
            .render(
                &Prompt::FinalAnswer.to_string(),
                &json!({"query": "Did I sleep well?", "context": "SleepData:\nDate: 2024-07-01, Sleep Duration (minutes): 420\n\n"}),
            )
            .unwrap();

        assert_eq!(
            rendered,
            "Did I sleep well?\n\nContextual Data:\nSleepData:\nDate: 2024-07-01, Sleep Duration (minutes): 420\n\n"
        );
    }

    #[test]
    fn test_strict_mode_rejects_missing_fields() {
        let registry = templates().unwrap();
        let result = registry.render(&Prompt::FinalAnswer.to_string(), &json!({"query": "hi"}));
        assert!(result.is_err());
    }
}

//! Two-stage prompting: ask the LLM which data to fetch, then ask it
//! to answer the user's query with that data attached.
use handlebars::Handlebars;
use serde_json::json;

use super::models::{DataType, ParsedQueryPair};
use crate::ai::chat::Conversation;
use crate::ai::prompt::{Prompt, templates};
use crate::core::{HealthError, Result};
use crate::openai::ChatCompletion;

/// Drops everything the structured format can't contain: digits, the
/// separators, and the letters of the valid data type names survive.
pub fn clean_response(response: &str) -> String {
    response
        .chars()
        .filter(|c| {
            c.is_ascii_digit()
                || *c == ','
                || *c == ';'
                || DataType::ALL.iter().any(|t| t.as_str().contains(*c))
        })
        .collect()
}

/// Splits a `dataType,days; dataType,days` response into raw pairs.
/// Fails if any segment doesn't have exactly two parts or if there
/// are no segments at all.
pub fn parse_response(response: &str) -> Result<Vec<(String, String)>> {
    let cleaned = clean_response(response);
    let mut pairs = Vec::new();

    for segment in cleaned.split(';').filter(|s| !s.is_empty()) {
        let parts: Vec<&str> = segment.split(',').filter(|p| !p.is_empty()).collect();
        match parts.as_slice() {
            [data_type, days] => pairs.push((data_type.to_string(), days.to_string())),
            _ => {
                return Err(HealthError::InvalidResponse(format!(
                    "Expected `dataType,days` but got `{}`",
                    segment
                )));
            }
        }
    }

    if pairs.is_empty() {
        return Err(HealthError::InvalidResponse(format!(
            "No data requests found in `{}`",
            response
        )));
    }

    Ok(pairs)
}

pub fn validate_pair(data_type: &str, days: &str) -> Result<ParsedQueryPair> {
    let data_type = data_type.parse::<DataType>()?;
    let look_back_days = days
        .parse::<u32>()
        .map_err(|e| HealthError::InvalidLookback(format!("{}: {}", days, e)))?;
    if look_back_days == 0 {
        return Err(HealthError::InvalidLookback(days.to_string()));
    }
    Ok(ParsedQueryPair::new(data_type, look_back_days))
}

/// The validated requests from a planning response. Pairs that failed
/// validation are kept in `rejected` rather than failing the plan.
#[derive(Debug, Default)]
pub struct QueryPlan {
    pub pairs: Vec<ParsedQueryPair>,
    pub rejected: Vec<HealthError>,
}

pub fn parse_plan(response: &str) -> Result<QueryPlan> {
    let mut plan = QueryPlan::default();
    for (data_type, days) in parse_response(response)? {
        match validate_pair(&data_type, &days) {
            Ok(pair) => plan.pairs.push(pair),
            Err(e) => plan.rejected.push(e),
        }
    }
    Ok(plan)
}

pub struct QueryPlanner {
    templates: Handlebars<'static>,
}

impl QueryPlanner {
    pub fn new() -> Result<Self> {
        let templates = templates().map_err(|e| HealthError::Prompt(e.to_string()))?;
        Ok(Self { templates })
    }

    pub fn plan_prompt(&self, query: &str) -> Result<String> {
        let data_types: Vec<&str> = DataType::ALL.iter().map(|t| t.as_str()).collect();
        self.templates
            .render(
                &Prompt::PlanRequests.to_string(),
                &json!({"query": query, "data_types": data_types}),
            )
            .map_err(|e| HealthError::Prompt(e.to_string()))
    }

    pub fn final_prompt(&self, query: &str, context: Option<&str>) -> Result<String> {
        match context {
            Some(context) => self
                .templates
                .render(
                    &Prompt::FinalAnswer.to_string(),
                    &json!({"query": query, "context": context}),
                )
                .map_err(|e| HealthError::Prompt(e.to_string())),
            None => Ok(query.to_string()),
        }
    }

    /// Asks the LLM which data types and how many days to fetch for
    /// `query`. The exchange is not added to the conversation.
    pub async fn plan_requests(
        &self,
        llm: &dyn ChatCompletion,
        conversation: &Conversation,
        query: &str,
    ) -> Result<QueryPlan> {
        let prompt = self.plan_prompt(query)?;
        let response = llm
            .complete(&conversation.request(&prompt))
            .await
            .map_err(|e| HealthError::Llm(format!("{:#}", e)))?;

        tracing::debug!("Planning response: {}", response);

        parse_plan(&response)
    }

    /// Asks the LLM to answer `query`, with `context` attached when
    /// there is any, and records the exchange in the conversation.
    pub async fn compose_final_answer(
        &self,
        llm: &dyn ChatCompletion,
        conversation: &mut Conversation,
        query: &str,
        context: Option<&str>,
    ) -> Result<String> {
        let prompt = self.final_prompt(query, context)?;
        let answer = llm
            .complete(&conversation.request(&prompt))
            .await
            .map_err(|e| HealthError::Llm(format!("{:#}", e)))?;

        conversation.record(query, &answer).await?;
        Ok(answer)
    }
}

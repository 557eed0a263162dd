//! Answers a user query end to end: plan, fetch, then answer.
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::mpsc;

use super::coordinator::SharedCoordinator;
use super::models::DataType;
use super::planner::QueryPlanner;
use crate::ai::chat::Conversation;
use crate::core::{HealthError, Result};
use crate::openai::ChatCompletion;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryState {
    AwaitingPlan,
    AwaitingFinalAnswer,
    Done,
    Failed,
}

/// Progress notifications for whoever is driving the query, such as a
/// UI showing which data is being pulled in.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryEvent {
    StateChanged(QueryState),
    ActiveDataTypes(Vec<DataType>),
    PairRejected(String),
    FetchFailed { data_type: DataType, error: String },
    PlanFallback(String),
}

pub struct QueryHandler {
    llm: Arc<dyn ChatCompletion>,
    planner: QueryPlanner,
    coordinator: SharedCoordinator,
    conversation: Conversation,
    tx: Option<mpsc::UnboundedSender<QueryEvent>>,
    state: QueryState,
}

impl QueryHandler {
    pub fn new(
        llm: Arc<dyn ChatCompletion>,
        coordinator: SharedCoordinator,
        conversation: Conversation,
    ) -> Result<Self> {
        Ok(Self {
            llm,
            planner: QueryPlanner::new()?,
            coordinator,
            conversation,
            tx: None,
            state: QueryState::Done,
        })
    }

    pub fn streaming(mut self, transmitter: mpsc::UnboundedSender<QueryEvent>) -> Self {
        self.tx = Some(transmitter);
        self
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    fn emit(&self, event: QueryEvent) {
        if let Some(tx) = &self.tx {
            // A dropped receiver just means nobody is listening
            let _ = tx.send(event);
        }
    }

    fn transition(&mut self, state: QueryState) {
        tracing::debug!("Query state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.emit(QueryEvent::StateChanged(state));
    }

    fn fail(&mut self, err: HealthError) -> HealthError {
        tracing::error!("Query failed: {}", err);
        self.transition(QueryState::Failed);
        err
    }

    /// Plans which data `query` needs, fetches it relative to `today`,
    /// and returns the LLM's answer.
    ///
    /// A planning response that can't be parsed falls back to asking
    /// the bare query. Fetch failures for individual data types are
    /// reported as events and leave the rest of the context intact.
    /// LLM transport failures are returned as errors.
    pub async fn handle(&mut self, query: &str, today: NaiveDate) -> Result<String> {
        self.transition(QueryState::AwaitingPlan);

        let planned = self
            .planner
            .plan_requests(self.llm.as_ref(), &self.conversation, query)
            .await;
        let pairs = match planned {
            Ok(plan) => {
                for rejected in plan.rejected {
                    tracing::warn!("Skipping data request: {}", rejected);
                    self.emit(QueryEvent::PairRejected(rejected.to_string()));
                }
                plan.pairs
            }
            Err(HealthError::InvalidResponse(msg)) => {
                tracing::warn!("Falling back to bare query: {}", msg);
                self.emit(QueryEvent::PlanFallback(msg));
                vec![]
            }
            Err(e) => return Err(self.fail(e)),
        };

        let mut active: Vec<DataType> = Vec::new();
        for pair in pairs.iter() {
            if !active.contains(&pair.data_type) {
                active.push(pair.data_type);
            }
        }
        self.emit(QueryEvent::ActiveDataTypes(active));

        let aggregate = self.coordinator.fetch_many(&pairs, today).await;
        for (data_type, error) in aggregate.failures.iter() {
            self.emit(QueryEvent::FetchFailed {
                data_type: *data_type,
                error: error.to_string(),
            });
        }

        self.transition(QueryState::AwaitingFinalAnswer);

        let context = (!aggregate.is_empty()).then(|| aggregate.to_context());
        let answer = self
            .planner
            .compose_final_answer(
                self.llm.as_ref(),
                &mut self.conversation,
                query,
                context.as_deref(),
            )
            .await;
        match answer {
            Ok(answer) => {
                self.transition(QueryState::Done);
                Ok(answer)
            }
            Err(e) => Err(self.fail(e)),
        }
    }
}

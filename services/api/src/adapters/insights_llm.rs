//! services/api/src/adapters/insights_llm.rs
//!
//! This module contains the adapter for the coaching-recommendations LLM.
//! It implements the `InsightService` port from the `core` crate.

use agent_metrics_core::aggregate::{AgentMetrics, AggregatedMetrics};
use agent_metrics_core::domain::AgentClass;
use agent_metrics_core::ports::{InsightService, PortError, PortResult};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::fmt::Write;

const SYSTEM_PROMPT: &str = "You are an expert real-estate sales coach. Analyse the team's \
performance data and give concrete, actionable recommendations. Structure the answer as: \
an executive summary of 2-3 lines; top performers and why; agents who need support and why; \
2-3 specific actions per agent; 3-5 team-wide strategies; the metrics to watch. \
Agents marked 'no showings' have no showings funnel: judge them on inquiries and listings only. \
Be professional and motivating, and ground every point in the numbers given.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `InsightService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiInsightsAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiInsightsAdapter {
    /// Creates a new `OpenAiInsightsAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Renders the aggregated numbers as the user message.
pub fn build_prompt(team: &AggregatedMetrics, agents: &[AgentMetrics]) -> String {
    let mut out = String::new();
    let rates = &team.conversion_rates;

    let _ = writeln!(out, "TEAM PERFORMANCE ({} records)", team.count);
    let _ = writeln!(out, "- Inquiries received: {}", team.totals.inquiries);
    let _ = writeln!(out, "- Showings completed: {}", team.totals.showings);
    let _ = writeln!(out, "- Deals closed: {}", team.totals.deals);
    let _ = writeln!(out, "- Listings acquired: {}", team.totals.listings);
    let _ = writeln!(
        out,
        "- Records with follow-up: {}/{} ({}%)",
        team.totals.follow_ups, team.count, team.follow_up_rate
    );
    let _ = writeln!(out, "- Inquiry to showing rate: {}%", rates.inquiries_to_showings);
    let _ = writeln!(out, "- Showing to deal rate: {}%", rates.showings_to_deals);
    let _ = writeln!(out);
    let _ = writeln!(out, "INDIVIDUAL PERFORMANCE");

    for entry in agents {
        let m = &entry.metrics;
        let class = match entry.class {
            AgentClass::Standard => "",
            AgentClass::NoShowings => " (no showings)",
        };
        let _ = writeln!(
            out,
            "- {}{}: {} inquiries, {} showings, {} deals, {} listings, follow-up {}%, \
             conversion {}% -> {}%, score {}",
            entry.agent.name,
            class,
            m.totals.inquiries,
            m.totals.showings,
            m.totals.deals,
            m.totals.listings,
            m.follow_up_rate,
            m.conversion_rates.inquiries_to_showings,
            m.conversion_rates.showings_to_deals,
            entry.score
        );
    }
    out
}

//=========================================================================================
// `InsightService` Trait Implementation
//=========================================================================================

#[async_trait]
impl InsightService for OpenAiInsightsAdapter {
    /// Asks the model for coaching recommendations over the given aggregates.
    async fn recommendations(
        &self,
        team: &AggregatedMetrics,
        agents: &[AgentMetrics],
    ) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(build_prompt(team, agents))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Insights LLM response contained no text content.".to_string())
            })
    }
}

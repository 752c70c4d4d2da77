//! Provider-specific invoice parsers.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::calculation::CalculationPolicy;
use crate::detector::Provider;
use crate::error::Result;
use crate::hints::extract_hints;
use crate::llm::CompletionModel;
use crate::prompt::build_prompt;
use crate::reconcile::reconcile;
use crate::reply::parse_model_reply;
use crate::schema::InvoiceData;

/// Turns bill text from one provider into invoice data.
#[async_trait]
pub trait InvoiceParser: Send + Sync {
    fn provider(&self) -> Provider;

    async fn parse(
        &self,
        text: &str,
        policy: CalculationPolicy,
        instructions: Option<&str>,
    ) -> Result<InvoiceData>;
}

/// Regex hints, one LLM call, then reconciliation.
pub struct EnergisaParser {
    model: Arc<dyn CompletionModel>,
}

impl EnergisaParser {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl InvoiceParser for EnergisaParser {
    fn provider(&self) -> Provider {
        Provider::Energisa
    }

    async fn parse(
        &self,
        text: &str,
        policy: CalculationPolicy,
        instructions: Option<&str>,
    ) -> Result<InvoiceData> {
        let hints = extract_hints(text);
        let (filled, total) = hints.coverage();
        info!("Regex hints: {}/{} fields matched", filled, total);

        let prompt = build_prompt(text, &hints, instructions);
        debug!(
            "Prompt ({} chars): {}",
            prompt.len(),
            truncate_for_log(&prompt, 2000)
        );

        let raw = self.model.complete_json(&prompt).await?;
        debug!("Raw model reply ({} chars): {}", raw.len(), truncate_for_log(&raw, 2000));

        let reply = parse_model_reply(&raw)?;
        Ok(reconcile(&hints, &reply, policy))
    }
}

/// Providers without field extraction yet: empty fields plus the client's policy.
pub struct StubParser {
    provider: Provider,
}

impl StubParser {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl InvoiceParser for StubParser {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn parse(
        &self,
        _text: &str,
        policy: CalculationPolicy,
        _instructions: Option<&str>,
    ) -> Result<InvoiceData> {
        let data = InvoiceData::default();
        let settlement = policy.calculate_local(&data.energia_atv_injetada_valor);
        Ok(InvoiceData {
            economia: settlement.economia,
            valor_a_pagar: settlement.valor_a_pagar,
            ..data
        })
    }
}

fn truncate_for_log(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

//! Bill processing pipeline: text, provider routing, parsing and batch handling.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ClientProfile;
use crate::detector::{DetectorSet, Provider, ProviderScore};
use crate::error::{ExtractionError, Result};
use crate::llm::CompletionModel;
use crate::parser::{EnergisaParser, InvoiceParser, StubParser};
use crate::pdf;
use crate::schema::{now_iso8601, BatchReport, FileError, ProcessedInvoice};

/// An uploaded bill.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }
}

/// Provider detection result.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Detection {
    pub concessionaria: Provider,
    pub scores: Vec<ProviderScore>,
}

/// Pipeline orchestrator.
pub struct InvoiceExtractor {
    model: Arc<dyn CompletionModel>,
    detectors: DetectorSet,
    parsers: Vec<Box<dyn InvoiceParser>>,
}

impl InvoiceExtractor {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        let parsers: Vec<Box<dyn InvoiceParser>> = vec![
            Box::new(EnergisaParser::new(model.clone())),
            Box::new(StubParser::new(Provider::Enel)),
            Box::new(StubParser::new(Provider::Cpfl)),
        ];
        Self {
            model,
            detectors: DetectorSet::default(),
            parsers,
        }
    }

    pub fn detect(&self, text: &str) -> Detection {
        Detection {
            concessionaria: self.detectors.detect(text),
            scores: self.detectors.scores(text),
        }
    }

    /// Process already extracted bill text.
    ///
    /// `instructions` overrides the profile's prompt instructions when given.
    pub async fn process_text(
        &self,
        file_name: &str,
        text: &str,
        profile: &ClientProfile,
        instructions: Option<&str>,
    ) -> Result<ProcessedInvoice> {
        if text.trim().is_empty() {
            return Err(ExtractionError::NoTextExtracted);
        }

        let provider = self.detectors.detect(text);
        let parser = self.parser_for(provider);
        let instructions = instructions
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| profile.instructions());

        info!(
            "Processing {} ({} chars) as {} for client {} ({:?})",
            file_name,
            text.len(),
            provider,
            profile.name,
            profile.politica_calculo
        );

        let dados = parser
            .parse(text, profile.politica_calculo, instructions)
            .await?;

        Ok(ProcessedInvoice {
            file_name: file_name.to_string(),
            concessionaria: provider,
            template_fatura: profile.invoice_template().to_string(),
            content_hash: content_hash(text),
            processed_at: now_iso8601(),
            consumo_atual: dados.current_consumption().to_string(),
            endereco_simplificado: dados.simplified_address(),
            dados,
        })
    }

    /// Process every file, isolating failures per file.
    ///
    /// Only a missing credential aborts the batch, and it is checked before
    /// any file is read.
    pub async fn process_batch(
        &self,
        files: &[UploadedFile],
        profile: &ClientProfile,
        instructions: Option<&str>,
    ) -> Result<BatchReport> {
        self.run_batch(files, profile, instructions, |file| {
            pdf::extract_text(&file.data)
        })
        .await
    }

    async fn run_batch<F>(
        &self,
        files: &[UploadedFile],
        profile: &ClientProfile,
        instructions: Option<&str>,
        extract_text: F,
    ) -> Result<BatchReport>
    where
        F: Fn(&UploadedFile) -> Result<String> + Send + Sync,
    {
        self.model.ensure_ready()?;

        let id = format!("batch_{}", Uuid::new_v4().simple());
        info!("Batch {}: {} files for client {}", id, files.len(), profile.name);

        let mut processed = Vec::new();
        let mut errors = Vec::new();

        for file in files {
            let outcome = match extract_text(file) {
                Ok(text) => {
                    self.process_text(&file.file_name, &text, profile, instructions)
                        .await
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(invoice) => processed.push(invoice),
                Err(e) if e.is_batch_fatal() => return Err(e),
                Err(e) => {
                    error!("Failed to process {}: {}", file.file_name, e);
                    errors.push(FileError {
                        file_name: file.file_name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if !errors.is_empty() {
            warn!("Batch {}: {} of {} files failed", id, errors.len(), files.len());
        }
        info!("Batch {} complete: {} processed", id, processed.len());

        Ok(BatchReport {
            id,
            success_count: processed.len(),
            processed,
            errors,
        })
    }

    fn parser_for(&self, provider: Provider) -> &dyn InvoiceParser {
        self.parsers
            .iter()
            .find(|p| p.provider() == provider)
            .unwrap_or(&self.parsers[0])
            .as_ref()
    }
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

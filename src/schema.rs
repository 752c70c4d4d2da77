//! Invoice data types shared by the hint extractor, the model reply parser and
//! reconciliation.
//!
//! Field names follow the contract consumed by invoice rendering, so the
//! serialized keys are the Portuguese snake_case names used on the bills.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::detector::Provider;

/// Generate ISO8601 timestamp for current time.
pub fn now_iso8601() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let time_of_day = secs % 86400;
    let (year, month, day) = civil_from_days((secs / 86400) as i64);

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        day,
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60
    )
}

/// Days since 1970-01-01 to (year, month, day) in the proleptic Gregorian calendar.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// One row of the "last 13 months" consumption table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionEntry {
    pub mes: String,
    pub consumo: String,
}

impl ConsumptionEntry {
    pub fn new(mes: impl Into<String>, consumo: impl Into<String>) -> Self {
        Self {
            mes: mes.into(),
            consumo: consumo.into(),
        }
    }
}

/// Regex-derived candidate values. Built once per document, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HintSet {
    pub nome_do_cliente: String,
    pub endereco: String,
    pub codigo_do_cliente_uc: String,
    pub data_de_emissao: String,
    pub data_de_vencimento: String,
    pub leitura_anterior: String,
    pub leitura_atual: String,
    pub consumo_kwh: String,
    pub preco_unitario: String,
    pub energia_atv_injetada_kwh: String,
    pub energia_atv_injetada_valor: String,
    pub mes_referencia: String,
    pub saldo_acumulado: String,
    pub historico_de_consumo: Vec<ConsumptionEntry>,
}

impl HintSet {
    /// How many scalar hints matched (out of the scalar ones).
    pub fn coverage(&self) -> (usize, usize) {
        let scalars = [
            &self.nome_do_cliente,
            &self.endereco,
            &self.codigo_do_cliente_uc,
            &self.data_de_emissao,
            &self.data_de_vencimento,
            &self.leitura_anterior,
            &self.leitura_atual,
            &self.consumo_kwh,
            &self.preco_unitario,
            &self.energia_atv_injetada_kwh,
            &self.energia_atv_injetada_valor,
            &self.mes_referencia,
            &self.saldo_acumulado,
        ];
        let filled = scalars.iter().filter(|v| !v.is_empty()).count();
        (filled, scalars.len())
    }
}

/// The model's reply after key normalization and schema validation.
///
/// Missing values are empty strings; the reply parser guarantees every key
/// was present in the JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub nome_do_cliente: String,
    pub endereco: String,
    pub codigo_do_cliente_uc: String,
    pub data_de_emissao: String,
    pub data_de_vencimento: String,
    pub leitura_anterior: String,
    pub leitura_atual: String,
    pub consumo_kwh: String,
    pub preco_unitario: String,
    pub energia_atv_injetada_kwh: String,
    pub energia_atv_injetada_valor: String,
    pub historico_de_consumo: Vec<ConsumptionEntry>,
    pub economia: String,
    pub valor_a_pagar: String,
    pub mes_referencia: String,
    pub saldo_acumulado: String,
}

/// Final reconciled invoice data handed to invoice rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceData {
    pub nome_do_cliente: String,
    pub endereco: String,
    pub codigo_do_cliente_uc: String,
    pub data_de_emissao: String,
    pub data_de_vencimento: String,
    pub leitura_anterior: String,
    pub leitura_atual: String,
    pub consumo_kwh: String,
    pub preco_unitario: String,
    pub energia_atv_injetada_kwh: String,
    pub energia_atv_injetada_valor: String,
    pub economia: String,
    pub valor_a_pagar: String,
    pub mes_referencia: String,
    pub saldo_acumulado: String,
    pub historico_de_consumo: Vec<ConsumptionEntry>,
}

impl InvoiceData {
    /// Current consumption, or the first non-empty history value when the
    /// main consumption line was not found.
    pub fn current_consumption(&self) -> &str {
        if !self.consumo_kwh.is_empty() {
            return &self.consumo_kwh;
        }
        self.historico_de_consumo
            .iter()
            .map(|e| e.consumo.as_str())
            .find(|c| !c.is_empty())
            .unwrap_or("")
    }

    /// Address without block/lot details, digit-only segments or notes in
    /// parentheses: `"RUA X, 123 - QD 58 LT 04 - 08 103 - 79094550 Y"` becomes
    /// `"RUA X, 123 - 79094550 Y"`.
    pub fn simplified_address(&self) -> String {
        simplify_address(&self.endereco)
    }
}

fn simplify_address(address: &str) -> String {
    let kept: Vec<&str> = address
        .split('-')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter(|part| {
            !part.split_whitespace().any(|token| {
                matches!(
                    token.to_uppercase().as_str(),
                    "QD" | "QUADRA" | "LT" | "LOTE"
                )
            })
        })
        .filter(|part| !part.chars().all(|c| c.is_ascii_digit() || c.is_whitespace()))
        .collect();

    let mut joined = kept.join(" - ");
    while let Some(start) = joined.find('(') {
        let Some(len) = joined[start..].find(')') else {
            break;
        };
        joined.replace_range(start..=start + len, "");
    }

    joined
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == ' ' || c == '-')
        .to_string()
}

/// One successfully processed bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedInvoice {
    pub file_name: String,
    pub concessionaria: Provider,
    pub template_fatura: String,
    /// SHA-256 of the extracted text.
    pub content_hash: String,
    pub processed_at: String,
    /// Consumption shown on the invoice, see [`InvoiceData::current_consumption`].
    pub consumo_atual: String,
    pub endereco_simplificado: String,
    pub dados: InvoiceData,
}

/// A bill that could not be processed, reported without partial output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileError {
    pub file_name: String,
    pub error: String,
}

/// Result of processing an upload of one or more bills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub id: String,
    pub success_count: usize,
    pub processed: Vec<ProcessedInvoice>,
    pub errors: Vec<FileError>,
}

//! Parsing and validation of the model's JSON reply.
//!
//! Models sometimes wrap the JSON in markdown fences or answer with the
//! human-readable field names used in client instructions (`"nome do
//! cliente"`, `"Economia"`, ...). Both are normalized here, once, so the rest
//! of the pipeline only sees [`ModelResponse`].

use serde_json::{Map, Value};

use crate::error::{ExtractionError, Result};
use crate::number::{format_local_number, parse_json_number};
use crate::schema::{ConsumptionEntry, ModelResponse};

const SCALAR_FIELDS: [&str; 15] = [
    "nome_do_cliente",
    "endereco",
    "codigo_do_cliente_uc",
    "data_de_emissao",
    "data_de_vencimento",
    "leitura_anterior",
    "leitura_atual",
    "consumo_kwh",
    "preco_unitario",
    "energia_atv_injetada_kwh",
    "energia_atv_injetada_valor",
    "economia",
    "valor_a_pagar",
    "mes_referencia",
    "saldo_acumulado",
];

const HISTORY_FIELD: &str = "historico_de_consumo";

/// Alternate key spellings and the canonical field each one maps to.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("nome do cliente", "nome_do_cliente"),
    ("codigo do cliente - uc", "codigo_do_cliente_uc"),
    ("data de emissao", "data_de_emissao"),
    ("data de vencimento", "data_de_vencimento"),
    ("leitura anterior", "leitura_anterior"),
    ("leitura atual", "leitura_atual"),
    ("consumo kwh", "consumo_kwh"),
    ("preco unit com tributos", "preco_unitario"),
    ("Energia Atv Injetada", "energia_atv_injetada_kwh"),
    ("Economia", "economia"),
    ("valor a pagar", "valor_a_pagar"),
    ("mes de referencia", "mes_referencia"),
    ("saldo acumulado", "saldo_acumulado"),
    ("historico de consumo", "historico_de_consumo"),
];

/// Parse a raw reply into a validated [`ModelResponse`].
///
/// Fails with [`ExtractionError::MalformedModelReply`] when the reply is not a
/// JSON object, a field is missing, or a field has the wrong type.
pub fn parse_model_reply(raw: &str) -> Result<ModelResponse> {
    let json_str = strip_code_fence(raw);

    let value: Value = serde_json::from_str(json_str).map_err(|e| {
        ExtractionError::malformed(format!("invalid JSON ({e}): {}", preview(json_str)))
    })?;

    let Value::Object(object) = value else {
        return Err(ExtractionError::malformed(format!(
            "expected a JSON object, got: {}",
            preview(json_str)
        )));
    };

    let fields = normalize_keys(object);

    let scalar = |name: &str| -> Result<String> {
        let value = fields
            .get(name)
            .ok_or_else(|| ExtractionError::malformed(format!("missing field `{name}`")))?;
        scalar_to_string(value)
            .ok_or_else(|| ExtractionError::malformed(format!("field `{name}` must be a string")))
    };

    let history = fields
        .get(HISTORY_FIELD)
        .ok_or_else(|| ExtractionError::malformed(format!("missing field `{HISTORY_FIELD}`")))?;

    Ok(ModelResponse {
        nome_do_cliente: scalar("nome_do_cliente")?,
        endereco: scalar("endereco")?,
        codigo_do_cliente_uc: scalar("codigo_do_cliente_uc")?,
        data_de_emissao: scalar("data_de_emissao")?,
        data_de_vencimento: scalar("data_de_vencimento")?,
        leitura_anterior: scalar("leitura_anterior")?,
        leitura_atual: scalar("leitura_atual")?,
        consumo_kwh: scalar("consumo_kwh")?,
        preco_unitario: scalar("preco_unitario")?,
        energia_atv_injetada_kwh: scalar("energia_atv_injetada_kwh")?,
        energia_atv_injetada_valor: scalar("energia_atv_injetada_valor")?,
        historico_de_consumo: parse_history(history)?,
        economia: scalar("economia")?,
        valor_a_pagar: scalar("valor_a_pagar")?,
        mes_referencia: scalar("mes_referencia")?,
        saldo_acumulado: scalar("saldo_acumulado")?,
    })
}

/// Extract the JSON payload from a reply that may be wrapped in markdown fences.
fn strip_code_fence(response: &str) -> &str {
    if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
            .trim()
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response).trim()
    } else {
        response.trim()
    }
}

/// Rename alias keys to canonical ones. A canonical key always beats its alias.
fn normalize_keys(object: Map<String, Value>) -> Map<String, Value> {
    let mut normalized = Map::with_capacity(object.len());
    let mut aliased = Vec::new();

    for (key, value) in object {
        match canonical_key(&key) {
            Some(canonical) if canonical != key => aliased.push((canonical, value)),
            _ => {
                normalized.insert(key, value);
            }
        }
    }

    for (canonical, value) in aliased {
        normalized.entry(canonical.to_string()).or_insert(value);
    }
    normalized
}

fn canonical_key(key: &str) -> Option<&'static str> {
    let key = key.trim();
    KEY_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(key))
        .map(|(_, canonical)| *canonical)
        .or_else(|| {
            SCALAR_FIELDS
                .iter()
                .chain(std::iter::once(&HISTORY_FIELD))
                .find(|name| **name == key)
                .copied()
        })
}

/// Strings pass through trimmed, numbers are rendered in local format with at
/// least two decimals, `null` is empty. Anything else is a type error.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => {
            let decimals = n
                .to_string()
                .split_once('.')
                .map_or(0, |(_, fraction)| fraction.len());
            Some(format_local_number(Some(parse_json_number(value)), decimals.max(2)))
        }
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn parse_history(value: &Value) -> Result<Vec<ConsumptionEntry>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        _ => {
            return Err(ExtractionError::malformed(format!(
                "field `{HISTORY_FIELD}` must be a list"
            )))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| -> Result<ConsumptionEntry> {
            let entry = item.as_object().ok_or_else(|| {
                ExtractionError::malformed(format!("`{HISTORY_FIELD}[{i}]` must be an object"))
            })?;
            let field = |names: &[&str]| {
                names
                    .iter()
                    .find_map(|n| entry.get(*n))
                    .and_then(scalar_to_string)
                    .ok_or_else(|| {
                        ExtractionError::malformed(format!(
                            "`{HISTORY_FIELD}[{i}].{}` is missing or not a string",
                            names[0]
                        ))
                    })
            };
            Ok(ConsumptionEntry::new(
                field(&["mes", "mês"])?,
                field(&["consumo"])?,
            ))
        })
        .collect()
}

fn preview(s: &str) -> String {
    s.chars().take(200).collect()
}

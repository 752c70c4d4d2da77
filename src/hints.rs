//! Regex hints pulled from the linearized bill text.
//!
//! Pure functions, no async. Every extractor returns an empty string (or an
//! empty list) when its pattern does not match; a miss is never an error.
//! The hints seed the LLM prompt and take part in reconciliation.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::number::{format_currency, parse_local_number};
use crate::schema::{ConsumptionEntry, HintSet};

// ============================================================================
// Patterns
// ============================================================================

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-ZÁÉÍÓÚÃÕÇ]{3,}(?: [A-ZÁÉÍÓÚÃÕÇ]{2,})+)\s+\d{2}/\d{2}/\d{4}").unwrap()
});
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(RUA [A-Z0-9ÁÉÍÓÚÃÕÇ\s.]+,\s*\d+\s*-\s*\d{8})").unwrap()
});
static UC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"10/\d{7,8}-\d").unwrap());
static ISSUE_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"DATA DE EMISSÃO:?(\d{2}/\d{2}/\d{4})").unwrap());
static DUE_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-zÁÉÍÓÚÃÕÇ]+ ?/\d{4}\s+(\d{2}/\d{2}/\d{4})").unwrap()
});
static READINGS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Leitura Anterior:(\d{2}/\d{2}/\d{4}).*?Leitura Atual:(\d{2}/\d{2}/\d{4})")
        .unwrap()
});
static KWH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"KWH\s*([\d.]+,\d{2})").unwrap());
static UNIT_PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Consumo em kWh.*?(\d,\d{5,})").unwrap());
static HISTORY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z]{3}/\d{2})\s+(\d+,\d{2})").unwrap());
static REFERENCE_MONTH_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)((?:JANEIRO|FEVEREIRO|MARÇO|ABRIL|MAIO|JUNHO|JULHO|AGOSTO|SETEMBRO|OUTUBRO|NOVEMBRO|DEZEMBRO) / \d{4})",
        r"(?i)Referente a[: ]+([A-ZÇÃÉÍÓÚ]+/?\d{4})",
        r"(?i)(?:M[ÊE]S DE REFER[ÊE]NCIA|M[ÊE]S REFER[ÊE]NCIA)\s*[:\-]?\s*([A-Z]{3}/\d{2,4})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static BALANCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Saldo Acumulado(?: anterior)?[^0-9\-]*(-?\d{1,3}(?:\.\d{3})*,\d{2})").unwrap()
});
static ANY_BALANCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Saldo[^0-9\-]*(-?\d{1,3}(?:\.\d{3})*,\d{2})").unwrap()
});
static ITEMS_END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(Consumo dos últimos 13 meses|Consumo kWh|NOTA FISCAL)").unwrap()
});
static INJECTED_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)Energia Atv Injetada.*?(-\d[\d.]*,\d{2})").unwrap());

const INJECTED_LABEL: &str = "Energia Atv Injetada";
const ITEMS_LABEL: &str = "Itens da Fatura";
/// Characters inspected before a `KWH` value to tell it apart from the
/// injected-energy line printed right next to it.
const KWH_EXCLUSION_WINDOW: usize = 80;

// ============================================================================
// Entry point
// ============================================================================

/// Run every extractor over the bill text.
pub fn extract_hints(text: &str) -> HintSet {
    let (leitura_anterior, leitura_atual) = extract_readings(text);
    let preco_unitario = extract_unit_price(text);

    let injected_value = injected_energy_value(text);
    let energia_atv_injetada_valor = if injected_value > 0.0 {
        format_currency(injected_value)
    } else {
        String::new()
    };
    let energia_atv_injetada_kwh = injected_energy_kwh(injected_value, &preco_unitario);

    let hints = HintSet {
        nome_do_cliente: extract_client_name(text),
        endereco: extract_address(text),
        codigo_do_cliente_uc: extract_uc(text),
        data_de_emissao: extract_issue_date(text),
        data_de_vencimento: extract_due_date(text),
        leitura_anterior,
        leitura_atual,
        consumo_kwh: extract_consumption_kwh(text),
        preco_unitario,
        energia_atv_injetada_kwh,
        energia_atv_injetada_valor,
        mes_referencia: extract_reference_month(text),
        saldo_acumulado: extract_balance(text),
        historico_de_consumo: extract_history(text),
    };

    let (filled, total) = hints.coverage();
    debug!(filled, total, history = hints.historico_de_consumo.len(), "Regex hints extracted");
    hints
}

// ============================================================================
// Scalar field extractors
// ============================================================================

fn first_group(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Uppercase name followed by a date. Document headers ("DOCUMENTO AUXILIAR
/// DA NOTA FISCAL ...") look the same and are rejected.
pub fn extract_client_name(text: &str) -> String {
    let name = first_group(&NAME_RE, text);
    if name.contains("DOCUMENTO") || name.contains("NOTA FISCAL") {
        return String::new();
    }
    name
}

pub fn extract_address(text: &str) -> String {
    first_group(&ADDRESS_RE, text)
}

pub fn extract_uc(text: &str) -> String {
    UC_RE
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

pub fn extract_issue_date(text: &str) -> String {
    first_group(&ISSUE_DATE_RE, text)
}

pub fn extract_due_date(text: &str) -> String {
    first_group(&DUE_DATE_RE, text)
}

/// Previous and current meter reading dates.
pub fn extract_readings(text: &str) -> (String, String) {
    READINGS_RE
        .captures(text)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .unwrap_or_default()
}

/// Main billed consumption. Occurrences whose preceding window mentions
/// injected energy belong to the injected line and are skipped.
pub fn extract_consumption_kwh(text: &str) -> String {
    KWH_RE
        .captures_iter(text)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let window = preceding_window(text, whole.start(), KWH_EXCLUSION_WINDOW);
            (!window.contains(INJECTED_LABEL)).then(|| c[1].to_string())
        })
        .next()
        .unwrap_or_default()
}

/// Unit prices carry five or more decimals, unlike currency amounts.
pub fn extract_unit_price(text: &str) -> String {
    first_group(&UNIT_PRICE_RE, text)
}

/// Every `MMM/YY value` pair, in document order.
pub fn extract_history(text: &str) -> Vec<ConsumptionEntry> {
    HISTORY_RE
        .captures_iter(text)
        .map(|c| ConsumptionEntry::new(&c[1], &c[2]))
        .collect()
}

/// Labelled reference month, falling back to the first history month.
pub fn extract_reference_month(text: &str) -> String {
    for re in REFERENCE_MONTH_RES.iter() {
        let month = first_group(re, text);
        if !month.is_empty() {
            return month;
        }
    }
    extract_history(text)
        .into_iter()
        .next()
        .map(|entry| entry.mes)
        .unwrap_or_default()
}

/// Accumulated balance with its sign preserved.
pub fn extract_balance(text: &str) -> String {
    let balance = first_group(&BALANCE_RE, text);
    if !balance.is_empty() {
        return balance;
    }
    first_group(&ANY_BALANCE_RE, text)
}

// ============================================================================
// Injected energy
// ============================================================================

/// The "Itens da Fatura" block, up to the first section that follows it.
/// Without the label the whole text is returned.
fn invoice_items_section(text: &str) -> &str {
    let Some(start) = text.find(ITEMS_LABEL) else {
        return text;
    };
    let rest = &text[start..];
    match ITEMS_END_RE.find(rest) {
        Some(end) => &rest[..end.start()],
        None => rest,
    }
}

/// Sum of the negative R$ values following each injected-energy line inside
/// the items block, returned as a positive magnitude.
pub fn injected_energy_value(text: &str) -> f64 {
    let items = invoice_items_section(text);
    let total: f64 = INJECTED_VALUE_RE
        .captures_iter(items)
        .map(|c| parse_local_number(Some(&c[1])))
        .sum();
    total.abs()
}

/// kWh equivalent of the injected value, when value and unit price are both positive.
pub fn injected_energy_kwh(value: f64, unit_price: &str) -> String {
    let price = parse_local_number(Some(unit_price));
    if value > 0.0 && price > 0.0 {
        format_currency(value / price)
    } else {
        String::new()
    }
}

/// Up to `chars` characters ending at byte offset `end`.
fn preceding_window(text: &str, end: usize, chars: usize) -> &str {
    let head = &text[..end];
    let start = head
        .char_indices()
        .rev()
        .nth(chars.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    &head[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ENERGISA_BILL;

    #[test]
    fn test_full_bill_hints() {
        let hints = extract_hints(ENERGISA_BILL);
        assert_eq!(hints.nome_do_cliente, "MARIA APARECIDA DOS SANTOS");
        assert_eq!(hints.endereco, "RUA DAS PALMEIRAS, 145 - 79094550");
        assert_eq!(hints.codigo_do_cliente_uc, "10/12345678-9");
        assert_eq!(hints.data_de_emissao, "05/09/2025");
        assert_eq!(hints.data_de_vencimento, "15/09/2025");
        assert_eq!(hints.leitura_anterior, "05/08/2025");
        assert_eq!(hints.leitura_atual, "04/09/2025");
        assert_eq!(hints.consumo_kwh, "410,00");
        assert_eq!(hints.preco_unitario, "1,108630");
        assert_eq!(hints.energia_atv_injetada_valor, "443,45");
        assert_eq!(hints.energia_atv_injetada_kwh, "400,00");
        assert_eq!(hints.mes_referencia, "SETEMBRO / 2025");
        assert_eq!(hints.saldo_acumulado, "1.250,00");
        assert_eq!(hints.historico_de_consumo.len(), 3);
        assert_eq!(hints.coverage(), (13, 13));
    }

    #[test]
    fn test_empty_text_yields_empty_hints() {
        let hints = extract_hints("");
        assert_eq!(hints, HintSet::default());
    }

    #[test]
    fn test_name_rejects_document_header() {
        let text = "DOCUMENTO AUXILIAR DA NOTA 05/09/2025";
        assert_eq!(extract_client_name(text), "");
        let text = "JOSE CARLOS PEREIRA 01/02/2025";
        assert_eq!(extract_client_name(text), "JOSE CARLOS PEREIRA");
    }

    #[test]
    fn test_uc_first_occurrence_wins() {
        let text = "UC 10/1234567-1 outra 10/87654321-2";
        assert_eq!(extract_uc(text), "10/1234567-1");
        assert_eq!(extract_uc("sem codigo"), "");
    }

    #[test]
    fn test_readings_span_lines() {
        let text = "Leitura Anterior:01/07/2025\nmedidor 123\nLeitura Atual:31/07/2025";
        assert_eq!(
            extract_readings(text),
            ("01/07/2025".to_string(), "31/07/2025".to_string())
        );
        assert_eq!(extract_readings("Leitura Atual:31/07/2025"), (String::new(), String::new()));
    }

    #[test]
    fn test_consumption_skips_injected_occurrence() {
        let text = format!(
            "Energia Atv Injetada GDI KWH 123,45 {} Consumo KWH 456,78",
            "-".repeat(100)
        );
        assert_eq!(extract_consumption_kwh(&text), "456,78");
    }

    #[test]
    fn test_consumption_excluded_when_label_within_window() {
        let text = "Energia Atv Injetada GDI KWH 123,45 KWH 456,78";
        assert_eq!(extract_consumption_kwh(text), "");
    }

    #[test]
    fn test_unit_price_requires_five_decimals() {
        assert_eq!(extract_unit_price("Consumo em kWh 410,00 0,95"), "");
        assert_eq!(extract_unit_price("Consumo em kWh 410,00\n0,954321"), "0,954321");
    }

    #[test]
    fn test_history_keeps_document_order_and_duplicates() {
        let history = extract_history("MAR/25 100,00 JAN/25 80,00 MAR/25 100,00");
        let months: Vec<&str> = history.iter().map(|e| e.mes.as_str()).collect();
        assert_eq!(months, vec!["MAR/25", "JAN/25", "MAR/25"]);
    }

    #[test]
    fn test_reference_month_patterns() {
        assert_eq!(extract_reference_month("Referente a: AGOSTO/2025"), "AGOSTO/2025");
        assert_eq!(extract_reference_month("MÊS DE REFERÊNCIA: SET/2025"), "SET/2025");
        assert_eq!(extract_reference_month("historico JUL/25 300,00 JUN/25 280,00"), "JUL/25");
        assert_eq!(extract_reference_month("nada aqui"), "");
    }

    #[test]
    fn test_balance_keeps_sign_and_falls_back() {
        assert_eq!(extract_balance("Saldo Acumulado: -1.234,56"), "-1.234,56");
        assert_eq!(extract_balance("Saldo em kWh 87,00"), "87,00");
        assert_eq!(extract_balance("sem informacao"), "");
    }

    #[test]
    fn test_injected_value_sums_negatives_inside_items() {
        let text = concat!(
            "Itens da Fatura\n",
            "Energia Atv Injetada GDI KWH 90,00 1,108630 -100,00\n",
            "Energia Atv Injetada GDI KWH 45,00 1,116000 -50,25\n",
            "NOTA FISCAL\n",
            "Energia Atv Injetada GDI -300,00\n",
        );
        assert_eq!(injected_energy_value(text), 150.25);
        assert_eq!(format_currency(injected_energy_value(text)), "150,25");
    }

    #[test]
    fn test_injected_value_without_items_label_uses_whole_text() {
        let text = "Energia Atv Injetada GDI -1.000,50";
        assert_eq!(injected_energy_value(text), 1000.5);
        assert_eq!(injected_energy_value("Consumo 10,00"), 0.0);
    }

    #[test]
    fn test_injected_kwh_needs_positive_inputs() {
        assert_eq!(injected_energy_kwh(110.863, "1,108630"), "100,00");
        assert_eq!(injected_energy_kwh(0.0, "1,108630"), "");
        assert_eq!(injected_energy_kwh(110.0, ""), "");
    }

    #[test]
    fn test_preceding_window_is_char_based() {
        let text = "ááááá KWH";
        let end = text.find("KWH").unwrap();
        assert_eq!(preceding_window(text, end, 3), "áá ");
        assert_eq!(preceding_window(text, end, 100), "ááááá ");
    }
}

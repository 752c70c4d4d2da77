//! Field-by-field merge of the model's reply with the regex hints.
//!
//! Text fields trust the model and fall back to the hints. Money does the
//! opposite: the injected-energy value summed from the bill lines wins over
//! whatever the model computed, and the kWh figure is re-derived from it.

use tracing::debug;

use crate::calculation::CalculationPolicy;
use crate::number::{format_currency, parse_local_number, try_parse_local_number};
use crate::schema::{HintSet, InvoiceData, ModelResponse};

/// Build the final invoice data.
pub fn reconcile(hints: &HintSet, model: &ModelResponse, policy: CalculationPolicy) -> InvoiceData {
    let preco_unitario = prefer(&model.preco_unitario, &hints.preco_unitario);

    let energia_atv_injetada_valor = if parse_local_number(Some(&hints.energia_atv_injetada_valor)) > 0.0 {
        hints.energia_atv_injetada_valor.clone()
    } else {
        model_injected_value(&model.energia_atv_injetada_valor)
    };

    let energia_atv_injetada_kwh =
        injected_kwh(&energia_atv_injetada_valor, &preco_unitario, hints, model);

    let settlement = policy.calculate_local(&energia_atv_injetada_valor);
    let economia = prefer(&model.economia, &settlement.economia);
    let valor_a_pagar = prefer(&model.valor_a_pagar, &settlement.valor_a_pagar);

    let historico_de_consumo = if model.historico_de_consumo.is_empty() {
        hints.historico_de_consumo.clone()
    } else {
        model.historico_de_consumo.clone()
    };

    debug!(
        valor = %energia_atv_injetada_valor,
        kwh = %energia_atv_injetada_kwh,
        economia = %economia,
        valor_a_pagar = %valor_a_pagar,
        ?policy,
        "Reconciled injected energy"
    );

    InvoiceData {
        nome_do_cliente: prefer(&model.nome_do_cliente, &hints.nome_do_cliente),
        endereco: prefer(&model.endereco, &hints.endereco),
        codigo_do_cliente_uc: prefer(&model.codigo_do_cliente_uc, &hints.codigo_do_cliente_uc),
        data_de_emissao: prefer(&model.data_de_emissao, &hints.data_de_emissao),
        data_de_vencimento: prefer(&model.data_de_vencimento, &hints.data_de_vencimento),
        leitura_anterior: prefer(&model.leitura_anterior, &hints.leitura_anterior),
        leitura_atual: prefer(&model.leitura_atual, &hints.leitura_atual),
        consumo_kwh: prefer(&model.consumo_kwh, &hints.consumo_kwh),
        preco_unitario,
        energia_atv_injetada_kwh,
        energia_atv_injetada_valor,
        economia,
        valor_a_pagar,
        mes_referencia: prefer(&model.mes_referencia, &hints.mes_referencia),
        saldo_acumulado: prefer(&model.saldo_acumulado, &hints.saldo_acumulado),
        historico_de_consumo,
    }
}

/// First non-blank value, trimmed.
fn prefer(primary: &str, fallback: &str) -> String {
    let primary = primary.trim();
    if primary.is_empty() {
        fallback.trim().to_string()
    } else {
        primary.to_string()
    }
}

/// The model's injected value, re-rendered non-negative. Unreadable values are dropped.
fn model_injected_value(raw: &str) -> String {
    match try_parse_local_number(raw) {
        Ok(value) => format_currency(value.abs()),
        Err(_) => String::new(),
    }
}

fn injected_kwh(valor: &str, preco: &str, hints: &HintSet, model: &ModelResponse) -> String {
    let valor = parse_local_number(Some(valor));
    let preco = parse_local_number(Some(preco));
    if valor > 0.0 && preco > 0.0 {
        return format_currency(valor / preco);
    }
    if parse_local_number(Some(&hints.energia_atv_injetada_kwh)) > 0.0 {
        return hints.energia_atv_injetada_kwh.clone();
    }
    model.energia_atv_injetada_kwh.trim().to_string()
}

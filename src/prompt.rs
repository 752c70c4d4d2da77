//! Prompt for reading an Energisa bill with the LLM.
//!
//! The prompt is deterministic for a given text, hint set and instructions so
//! that replies can be compared across runs.

use crate::schema::HintSet;

const HEADER: &str = "Você é especialista em leitura de faturas ENERGISA.";

const INJECTED_ENERGY_RULES: &str = r#"REGRAS PARA ENERGIA ATIVA INJETADA:
- Considere apenas as linhas dentro de "Itens da Fatura".
- No PDF o valor em R$ da "Energia Atv Injetada" aparece NEGATIVO (ex.: -7.206,16); no JSON ele deve ser POSITIVO.
- "energia_atv_injetada_valor" é a soma de todos os valores negativos das linhas de "Energia Atv Injetada".
- A quantidade em kWh injetada é sempre POSITIVA.
- Se as DICAS trouxerem "energia_atv_injetada_valor" ou "energia_atv_injetada_kwh", copie esses valores sem alterar nem recalcular."#;

const JSON_TEMPLATE: &str = r#"MODELO JSON (responda somente com um JSON válido neste formato):
{
  "nome_do_cliente": "",
  "endereco": "",
  "codigo_do_cliente_uc": "",
  "data_de_emissao": "",
  "data_de_vencimento": "",
  "leitura_anterior": "",
  "leitura_atual": "",
  "consumo_kwh": "",
  "preco_unitario": "",
  "energia_atv_injetada_kwh": "",
  "energia_atv_injetada_valor": "",
  "historico_de_consumo": [],
  "economia": "",
  "valor_a_pagar": "",
  "mes_referencia": "",
  "saldo_acumulado": ""
}"#;

const FIELD_RULES: &str = r#"Regras dos campos:
- As INSTRUÇÕES DO CLIENTE têm prioridade sobre fórmulas e formatos.
- Use somente dados presentes no texto ou contas diretas sobre eles.
- "codigo_do_cliente_uc" é a Unidade Consumidora (ex.: "10/########-#").
- Datas no formato DD/MM/AAAA.
- "consumo_kwh" é o consumo principal faturado de energia ativa.
- "preco_unitario" é o preço em R$/kWh no formato brasileiro (ex.: "1,108630").
- "energia_atv_injetada_kwh": copie das DICAS quando houver; senão calcule de forma que energia_atv_injetada_kwh ≈ energia_atv_injetada_valor / preco_unitario.
- "mes_referencia" deve vir do texto (ex.: "SET / 2025", "AGOSTO/2025", "Referente a: ...").
- "saldo_acumulado" deve ser copiado do texto mantendo sinal e formato.
- "historico_de_consumo" é uma lista de objetos {"mes": "ABC/AA", "consumo": "0,00"}.

Para "economia" e "valor_a_pagar":
- Se o cliente definir fatores ou fórmulas, siga-os.
- Caso contrário use base = energia_atv_injetada_valor (positivo) e calcule economia = base * 0.3 e valor_a_pagar = base * 0.7.
- Devolva ambos como texto no formato brasileiro (ex.: "999,99")."#;

/// Build the extraction prompt.
///
/// `instructions` is the client's free text; when present it is placed right
/// after the header as a priority block.
pub fn build_prompt(text: &str, hints: &HintSet, instructions: Option<&str>) -> String {
    let hints_json = serde_json::to_string(hints).unwrap_or_else(|_| "{}".to_string());

    let mut prompt = String::with_capacity(text.len() + hints_json.len() + 4096);
    prompt.push_str(HEADER);
    prompt.push('\n');

    if let Some(extra) = instructions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\nINSTRUÇÕES DO CLIENTE (têm prioridade, siga-as):\n");
        prompt.push_str(extra);
        prompt.push('\n');
    }

    for section in [INJECTED_ENERGY_RULES, JSON_TEMPLATE] {
        prompt.push('\n');
        prompt.push_str(section);
        prompt.push('\n');
    }

    prompt.push_str("\nDICAS extraídas por regex (JSON):\n");
    prompt.push_str(&hints_json);
    prompt.push('\n');

    prompt.push('\n');
    prompt.push_str(FIELD_RULES);
    prompt.push('\n');

    prompt.push_str("\nTEXTO COMPLETO DA FATURA:\n\"\"\"");
    prompt.push_str(text);
    prompt.push_str("\"\"\"\n\nResponda somente com o JSON final, sem comentários.\n");

    prompt
}

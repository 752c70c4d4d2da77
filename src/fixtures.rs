//! Linearized bill text shared by the unit tests.

/// An Energisa bill as produced by the word-joining PDF extractor.
pub const ENERGISA_BILL: &str = concat!(
    "ENERGISA MATO GROSSO DO SUL - DISTRIBUIDORA DE ENERGIA S.A. DANF3E DOCUMENTO AUXILIAR DA NOTA FISCAL DE ENERGIA ELÉTRICA ELETRÔNICA\n",
    "MARIA APARECIDA DOS SANTOS 05/09/2025 RUA DAS PALMEIRAS, 145 - 79094550 CAMPO GRANDE MS\n",
    "CÓDIGO DO CLIENTE 10/12345678-9 DATA DE EMISSÃO:05/09/2025\n",
    "REF: SETEMBRO / 2025 VENCIMENTO SET/2025 15/09/2025 TOTAL A PAGAR R$ 312,40\n",
    "Leitura Anterior:05/08/2025 Leitura Atual:04/09/2025 Próxima Leitura:06/10/2025\n",
    "Itens da Fatura Consumo em kWh KWH 410,00 1,108630 454,54 ",
    "Energia Atv Injetada GDI oUC ago/25 mPT KWH 380,00 1,108630 -421,28 ",
    "Energia Atv Injetada GDI oUC jul/25 mPT KWH 20,00 1,108630 -22,17 ",
    "Contrib Ilum Publica 35,12\n",
    "Saldo Acumulado anterior 1.250,00\n",
    "Consumo dos últimos 13 meses AGO/25 395,00 JUL/25 402,00 JUN/25 388,00\n",
    "NOTA FISCAL N° 123456\n",
);

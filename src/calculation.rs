//! Economy / payable split applied to the injected-energy value.

use serde::{Deserialize, Deserializer, Serialize};

use crate::number::{format_currency, parse_local_number};

const STANDARD_ECONOMY_RATE: f64 = 0.3;
const STANDARD_PAYABLE_RATE: f64 = 0.7;

/// How a client's savings are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationPolicy {
    /// 30% economy, 70% payable.
    #[default]
    Standard,
    /// No discount: the whole base is payable.
    Vip,
}

impl<'de> Deserialize<'de> for CalculationPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// Amounts derived from the injected-energy value, in local format.
/// Both are empty when the base was missing or non-positive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub economia: String,
    pub valor_a_pagar: String,
}

impl CalculationPolicy {
    /// `"VIP"` in any case selects [`CalculationPolicy::Vip`]; everything else is standard.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("vip") {
            Self::Vip
        } else {
            Self::Standard
        }
    }

    pub fn calculate(self, base: f64) -> Settlement {
        if !base.is_finite() || base <= 0.0 {
            return Settlement::default();
        }

        let (economia, valor_a_pagar) = match self {
            Self::Standard => (base * STANDARD_ECONOMY_RATE, base * STANDARD_PAYABLE_RATE),
            Self::Vip => (0.0, base),
        };

        Settlement {
            economia: format_currency(economia),
            valor_a_pagar: format_currency(valor_a_pagar),
        }
    }

    /// Same as [`calculate`](Self::calculate) with a localized base such as `"1.000,00"`.
    pub fn calculate_local(self, base: &str) -> Settlement {
        self.calculate(parse_local_number(Some(base)))
    }
}

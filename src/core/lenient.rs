//! Numeric fields that arrive either as JSON numbers or as decimal strings.
//!
//! Stored fund configurations round-trip through decimal text columns, so a
//! record can show up as `"fundSize": 25000000` or `"fundSize": "25000000.00"`.
//! Both are normalized to numbers before they reach the engine.

use serde::{Deserialize, Deserializer, de::Error};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn into_f64<E: Error>(self) -> Result<f64, E> {
        match self {
            Self::Number(v) => Ok(v),
            Self::Text(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<f64>()
                    .map_err(|_| E::custom(format!("invalid decimal string {trimmed:?}")))
            }
        }
    }
}

fn whole_number<T, E>(value: f64) -> Result<T, E>
where
    T: TryFrom<u64>,
    E: Error,
{
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(E::custom(format!("expected a non-negative integer, got {value}")));
    }
    T::try_from(value as u64).map_err(|_| E::custom(format!("integer {value} out of range")))
}

pub fn f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrText::deserialize(deserializer)?.into_f64()
}

pub fn u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    whole_number(NumberOrText::deserialize(deserializer)?.into_f64()?)
}

pub fn option_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrText>::deserialize(deserializer)?
        .map(NumberOrText::into_f64)
        .transpose()
}

pub fn option_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrText>::deserialize(deserializer)?
        .map(|v| v.into_f64().and_then(whole_number))
        .transpose()
}

//! Raw ↔ physical value conversion of a signal.
//!
//! A [`Conversion`] is picked once per signal by [`Conversion::factory`]
//! from its scale, offset, value table and float flag. The integer
//! variant keeps integral scalings exact instead of going through `f64`.

use std::collections::{BTreeMap, HashMap};

use crate::types::{
    errors::NoSuchChoice,
    value::{NamedValue, SignalValue},
};

/// Value table of a signal: raw number → label.
pub type Choices = BTreeMap<i64, String>;

// Largest magnitude for which an f64 still holds every integer exactly.
const EXACT_INT_LIMIT: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    /// `scaled == raw`.
    Identity { is_float: bool },
    /// `scaled = raw * scale + offset` with integral scale, offset and raw.
    LinearInteger { scale: i64, offset: i64 },
    /// `scaled = raw * scale + offset` in floating point.
    LinearFloat {
        scale: f64,
        offset: f64,
        is_float: bool,
    },
    /// A linear conversion plus a value table.
    Named {
        base: Box<Conversion>,
        choices: Choices,
        inverse: HashMap<String, i64>,
    },
}

impl Default for Conversion {
    fn default() -> Self {
        Conversion::Identity { is_float: false }
    }
}

impl Conversion {
    /// Selects the narrowest conversion for the given parameters.
    pub fn factory(scale: f64, offset: f64, choices: Option<Choices>, is_float: bool) -> Self {
        if let Some(choices) = choices.filter(|c| !c.is_empty()) {
            let inverse: HashMap<String, i64> = choices
                .iter()
                .map(|(raw, label)| (label.clone(), *raw))
                .collect();
            return Conversion::Named {
                base: Box::new(Conversion::factory(scale, offset, None, is_float)),
                choices,
                inverse,
            };
        }

        if scale == 1.0 && offset == 0.0 {
            return Conversion::Identity { is_float };
        }

        if !is_float && is_exact_integer(scale) && is_exact_integer(offset) && scale != 0.0 {
            return Conversion::LinearInteger {
                scale: scale as i64,
                offset: offset as i64,
            };
        }

        Conversion::LinearFloat {
            scale,
            offset,
            is_float,
        }
    }

    pub fn scale(&self) -> f64 {
        match self {
            Conversion::Identity { .. } => 1.0,
            Conversion::LinearInteger { scale, .. } => *scale as f64,
            Conversion::LinearFloat { scale, .. } => *scale,
            Conversion::Named { base, .. } => base.scale(),
        }
    }

    pub fn offset(&self) -> f64 {
        match self {
            Conversion::Identity { .. } => 0.0,
            Conversion::LinearInteger { offset, .. } => *offset as f64,
            Conversion::LinearFloat { offset, .. } => *offset,
            Conversion::Named { base, .. } => base.offset(),
        }
    }

    /// Whether the raw value is an IEEE-754 float.
    pub fn is_float(&self) -> bool {
        match self {
            Conversion::Identity { is_float } => *is_float,
            Conversion::LinearInteger { .. } => false,
            Conversion::LinearFloat { is_float, .. } => *is_float,
            Conversion::Named { base, .. } => base.is_float(),
        }
    }

    pub fn choices(&self) -> Option<&Choices> {
        match self {
            Conversion::Named { choices, .. } => Some(choices),
            _ => None,
        }
    }

    /// Converts a raw value into its physical value.
    ///
    /// With `decode_choices`, raw numbers found in the value table come back
    /// as labels.
    pub fn raw_to_scaled(&self, raw: &SignalValue, decode_choices: bool) -> SignalValue {
        match self {
            Conversion::Identity { is_float } => match raw {
                SignalValue::Named(n) => SignalValue::Int(n.value as i128),
                SignalValue::Int(v) if *is_float => SignalValue::Float(*v as f64),
                other => other.clone(),
            },
            Conversion::LinearInteger { scale, offset } => match raw.as_i128() {
                Some(r) => r
                    .checked_mul(*scale as i128)
                    .and_then(|v| v.checked_add(*offset as i128))
                    .map(SignalValue::Int)
                    .unwrap_or_else(|| {
                        SignalValue::Float(r as f64 * *scale as f64 + *offset as f64)
                    }),
                None => SignalValue::Float(raw.as_f64() * *scale as f64 + *offset as f64),
            },
            Conversion::LinearFloat { scale, offset, .. } => {
                SignalValue::Float(raw.as_f64() * scale + offset)
            }
            Conversion::Named { base, choices, .. } => {
                if decode_choices
                    && let Some(r) = raw.as_i128()
                    && let Ok(key) = i64::try_from(r)
                    && let Some(label) = choices.get(&key)
                {
                    return SignalValue::Named(NamedValue::new(key, label.clone()));
                }
                base.raw_to_scaled(raw, false)
            }
        }
    }

    /// Converts a physical value (number or label) into its raw value.
    pub fn scaled_to_raw(&self, scaled: &SignalValue) -> Result<SignalValue, NoSuchChoice> {
        match scaled {
            SignalValue::Named(n) => Ok(SignalValue::Int(self.choice_to_number(&n.name)? as i128)),
            numeric => Ok(self.numeric_scaled_to_raw(numeric)),
        }
    }

    /// Numeric fast path of [`Conversion::scaled_to_raw`]; labels are taken
    /// by their carried number.
    pub fn numeric_scaled_to_raw(&self, scaled: &SignalValue) -> SignalValue {
        match self {
            Conversion::Identity { is_float } => match scaled {
                _ if *is_float => SignalValue::Float(scaled.as_f64()),
                SignalValue::Int(v) => SignalValue::Int(*v),
                SignalValue::Float(v) => SignalValue::Int(v.round() as i128),
                SignalValue::Named(n) => SignalValue::Int(n.value as i128),
            },
            Conversion::LinearInteger { scale, offset } => match scaled {
                SignalValue::Float(v) => {
                    SignalValue::Int(((v - *offset as f64) / *scale as f64).round() as i128)
                }
                other => {
                    let v = other.as_i128().unwrap_or_default();
                    match v.checked_sub(*offset as i128) {
                        Some(n) => SignalValue::Int(round_div(n, *scale as i128)),
                        None => SignalValue::Int(
                            ((v as f64 - *offset as f64) / *scale as f64).round() as i128,
                        ),
                    }
                }
            },
            Conversion::LinearFloat {
                scale,
                offset,
                is_float,
            } => {
                let raw = (scaled.as_f64() - offset) / scale;
                if *is_float {
                    SignalValue::Float(raw)
                } else {
                    SignalValue::Int(raw.round() as i128)
                }
            }
            Conversion::Named { base, .. } => base.numeric_scaled_to_raw(scaled),
        }
    }

    /// Looks up the raw number of a value-table label.
    pub fn choice_to_number(&self, label: &str) -> Result<i64, NoSuchChoice> {
        match self {
            Conversion::Named { inverse, .. } => {
                inverse.get(label).copied().ok_or_else(|| NoSuchChoice {
                    choice: label.to_string(),
                })
            }
            _ => Err(NoSuchChoice {
                choice: label.to_string(),
            }),
        }
    }
}

fn is_exact_integer(v: f64) -> bool {
    v.fract() == 0.0 && v.abs() < EXACT_INT_LIMIT
}

/// Integer division rounding half away from zero.
fn round_div(n: i128, d: i128) -> i128 {
    let q = n / d;
    let r = n % d;
    if 2 * r.abs() >= d.abs() {
        if (n < 0) != (d < 0) { q - 1 } else { q + 1 }
    } else {
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enable_choices() -> Choices {
        Choices::from([(0, "Disabled".to_string()), (1, "Enabled".to_string())])
    }

    #[test]
    fn test_factory_picks_narrowest_variant() {
        assert_eq!(
            Conversion::factory(1.0, 0.0, None, false),
            Conversion::Identity { is_float: false }
        );
        assert_eq!(
            Conversion::factory(2.0, -40.0, None, false),
            Conversion::LinearInteger {
                scale: 2,
                offset: -40
            }
        );
        assert!(matches!(
            Conversion::factory(0.1, 0.0, None, false),
            Conversion::LinearFloat { .. }
        ));
        assert!(matches!(
            Conversion::factory(2.0, 0.0, None, true),
            Conversion::LinearFloat { is_float: true, .. }
        ));
        assert!(matches!(
            Conversion::factory(1.0, 0.0, Some(enable_choices()), false),
            Conversion::Named { .. }
        ));
        // an empty table is no table
        assert_eq!(
            Conversion::factory(1.0, 0.0, Some(Choices::new()), false),
            Conversion::Identity { is_float: false }
        );
    }

    #[test]
    fn test_linear_integer_is_exact() {
        let conv = Conversion::factory(3.0, 10.0, None, false);
        assert_eq!(conv.raw_to_scaled(&SignalValue::Int(5), true), SignalValue::Int(25));
        assert_eq!(conv.scaled_to_raw(&SignalValue::Int(25)), Ok(SignalValue::Int(5)));
        // 27 -> (27 - 10) / 3 = 5.67 -> 6
        assert_eq!(conv.scaled_to_raw(&SignalValue::Int(27)), Ok(SignalValue::Int(6)));
        // 26.5 -> 5.5 -> 6 (half away from zero)
        assert_eq!(conv.scaled_to_raw(&SignalValue::Float(26.5)), Ok(SignalValue::Int(6)));
        assert_eq!(conv.scaled_to_raw(&SignalValue::Float(-6.5)), Ok(SignalValue::Int(-6)));
    }

    #[test]
    fn test_round_div_half_away_from_zero() {
        assert_eq!(round_div(5, 2), 3);
        assert_eq!(round_div(-5, 2), -3);
        assert_eq!(round_div(4, 3), 1);
        assert_eq!(round_div(-4, 3), -1);
        assert_eq!(round_div(5, -2), -3);
    }

    #[test]
    fn test_linear_float_round_trip() {
        let conv = Conversion::factory(0.1, 0.0, None, false);
        for raw in [0i128, 1, 3, 7, 50, 1000, 65535] {
            let scaled = conv.raw_to_scaled(&SignalValue::Int(raw), false);
            assert_eq!(conv.scaled_to_raw(&scaled), Ok(SignalValue::Int(raw)));
        }
        let signed = Conversion::factory(0.0625, 250.0, None, false);
        assert_eq!(
            signed.raw_to_scaled(&SignalValue::Int(-800), false),
            SignalValue::Float(200.0)
        );
        assert_eq!(
            signed.scaled_to_raw(&SignalValue::Float(200.0)),
            Ok(SignalValue::Int(-800))
        );
    }

    #[test]
    fn test_float_raw_passes_through() {
        let conv = Conversion::factory(2.0, 1.0, None, true);
        assert_eq!(
            conv.scaled_to_raw(&SignalValue::Float(4.0)),
            Ok(SignalValue::Float(1.5))
        );
        let ident = Conversion::factory(1.0, 0.0, None, true);
        assert_eq!(
            ident.scaled_to_raw(&SignalValue::Int(3)),
            Ok(SignalValue::Float(3.0))
        );
    }

    #[test]
    fn test_named_conversion() {
        let conv = Conversion::factory(1.0, 0.0, Some(enable_choices()), false);
        let decoded = conv.raw_to_scaled(&SignalValue::Int(1), true);
        assert_eq!(decoded, "Enabled");
        assert_eq!(conv.raw_to_scaled(&SignalValue::Int(1), false), SignalValue::Int(1));
        // raw outside the table falls back to the number
        assert_eq!(conv.raw_to_scaled(&SignalValue::Int(7), true), SignalValue::Int(7));

        assert_eq!(conv.choice_to_number("Enabled"), Ok(1));
        assert_eq!(
            conv.scaled_to_raw(&SignalValue::from("Disabled")),
            Ok(SignalValue::Int(0))
        );
        assert_eq!(
            conv.choice_to_number("Maybe"),
            Err(NoSuchChoice {
                choice: "Maybe".to_string()
            })
        );
        for label in ["Disabled", "Enabled"] {
            let raw = conv.choice_to_number(label).unwrap();
            assert_eq!(conv.raw_to_scaled(&SignalValue::Int(raw as i128), true), label);
        }
    }

    #[test]
    fn test_choice_lookup_without_table() {
        let conv = Conversion::factory(1.0, 0.0, None, false);
        assert!(conv.choice_to_number("Enabled").is_err());
        assert!(conv.scaled_to_raw(&SignalValue::from("Enabled")).is_err());
    }
}

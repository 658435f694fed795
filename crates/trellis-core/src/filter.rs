//! Parameter filters.
//!
//! Filters are declared as short expressions, `name` or
//! `name(key=value, ...)`, and parsed once into [`Filter`] values when a
//! signature entry is built. Applying a chain never fails hard: a rejected
//! value is replaced by the failure value and the outcome is flagged.
//!
//! | expression | effect |
//! |---|---|
//! | `int(min=, max=)` | integer, optionally bounded |
//! | `float(min=, max=)` | number, optionally bounded |
//! | `bool` | `1/true/on/yes` or `0/false/off/no/""` |
//! | `email` | address with a single `@` and a dotted domain |
//! | `url` | absolute URL |
//! | `ip` | IPv4 or IPv6 address |
//! | `alnum` | non-empty, letters and digits only |
//! | `length(min=, max=)` | string length in characters |
//! | `one_of(values=a\|b)` | one of the listed strings |
//! | `trim`, `lower` | sanitizers, never fail on strings |

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FilterError, FilterResult};

/// The value a rejected parameter continues with.
pub const FAILED_VALUE: Value = Value::Bool(false);

/// A parsed filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum Filter {
    Int { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    Bool,
    Email,
    Url,
    Ip,
    Alnum,
    Length { min: Option<usize>, max: Option<usize> },
    OneOf { values: Vec<String> },
    Trim,
    Lower,
}

/// Result of running a value through a filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub value: Value,
    pub failed: bool,
}

impl Filter {
    /// Parses a filter expression.
    pub fn parse(expression: &str) -> FilterResult<Self> {
        let expression = expression.trim();
        let (name, args) = match expression.find('(') {
            Some(open) => {
                let close = expression
                    .strip_suffix(')')
                    .ok_or_else(|| FilterError::Malformed(expression.to_string()))?;
                (&expression[..open], parse_args(&close[open + 1..], expression)?)
            }
            None => (expression, Vec::new()),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(FilterError::Malformed(expression.to_string()));
        }

        let filter = match name {
            "int" => Self::Int {
                min: arg(name, &args, "min")?,
                max: arg(name, &args, "max")?,
            },
            "float" => Self::Float {
                min: arg(name, &args, "min")?,
                max: arg(name, &args, "max")?,
            },
            "length" => Self::Length {
                min: arg(name, &args, "min")?,
                max: arg(name, &args, "max")?,
            },
            "one_of" => Self::OneOf {
                values: args
                    .iter()
                    .find(|(k, _)| k == "values")
                    .map(|(_, v)| v.split('|').map(str::to_owned).collect())
                    .unwrap_or_default(),
            },
            "bool" => Self::Bool,
            "email" => Self::Email,
            "url" => Self::Url,
            "ip" => Self::Ip,
            "alnum" => Self::Alnum,
            "trim" => Self::Trim,
            "lower" => Self::Lower,
            other => return Err(FilterError::Unknown(other.to_string())),
        };

        if let Some((key, _)) = args.iter().find(|(k, _)| !filter.accepts(k)) {
            return Err(FilterError::InvalidArgument {
                filter: name.to_string(),
                argument: key.clone(),
            });
        }
        Ok(filter)
    }

    fn accepts(&self, key: &str) -> bool {
        match self {
            Self::Int { .. } | Self::Float { .. } | Self::Length { .. } => {
                key == "min" || key == "max"
            }
            Self::OneOf { .. } => key == "values",
            _ => false,
        }
    }

    /// Applies this filter; `None` means the value was rejected.
    pub fn apply(&self, value: &Value) -> Option<Value> {
        match self {
            Self::Int { min, max } => {
                let n = match value {
                    Value::Number(n) => n.as_i64()?,
                    Value::String(s) => s.trim().parse::<i64>().ok()?,
                    _ => return None,
                };
                within(n, *min, *max).then(|| Value::from(n))
            }
            Self::Float { min, max } => {
                let n = match value {
                    Value::Number(n) => n.as_f64()?,
                    Value::String(s) => s.trim().parse::<f64>().ok()?,
                    _ => return None,
                };
                within(n, *min, *max).then(|| Value::from(n))
            }
            Self::Bool => match value {
                Value::Bool(b) => Some(Value::Bool(*b)),
                Value::Number(n) => match n.as_i64() {
                    Some(1) => Some(Value::Bool(true)),
                    Some(0) => Some(Value::Bool(false)),
                    _ => None,
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" | "on" | "yes" => Some(Value::Bool(true)),
                    "0" | "false" | "off" | "no" | "" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            Self::Email => text(value).filter(|s| is_email(s)).map(Value::from),
            Self::Url => text(value)
                .filter(|s| url::Url::parse(s).is_ok())
                .map(Value::from),
            Self::Ip => text(value)
                .filter(|s| s.parse::<IpAddr>().is_ok())
                .map(Value::from),
            Self::Alnum => text(value)
                .filter(|s| !s.is_empty() && s.chars().all(char::is_alphanumeric))
                .map(Value::from),
            Self::Length { min, max } => {
                let s = text(value)?;
                within(s.chars().count(), *min, *max).then(|| Value::from(s))
            }
            Self::OneOf { values } => text(value)
                .filter(|s| values.iter().any(|v| v == s))
                .map(Value::from),
            Self::Trim => Some(match value {
                Value::String(s) => Value::from(s.trim()),
                other => other.clone(),
            }),
            Self::Lower => Some(match value {
                Value::String(s) => Value::from(s.to_lowercase()),
                other => other.clone(),
            }),
        }
    }
}

/// Runs `value` through `filters` in order.
///
/// After a rejection the chain continues with [`FAILED_VALUE`].
pub fn apply_chain(filters: &[Filter], value: Value) -> Filtered {
    let mut current = value;
    let mut failed = false;
    for filter in filters {
        current = match filter.apply(&current) {
            Some(next) => next,
            None => {
                failed = true;
                FAILED_VALUE
            }
        };
    }
    Filtered {
        value: current,
        failed,
    }
}

/// Parses every expression, stopping at the first invalid one.
pub fn parse_chain<S: AsRef<str>>(expressions: &[S]) -> FilterResult<Vec<Filter>> {
    expressions.iter().map(|e| Filter::parse(e.as_ref())).collect()
}

fn parse_args(inner: &str, expression: &str) -> FilterResult<Vec<(String, String)>> {
    inner
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| FilterError::Malformed(expression.to_string()))
        })
        .collect()
}

fn arg<T: std::str::FromStr>(
    filter: &str,
    args: &[(String, String)],
    key: &str,
) -> FilterResult<Option<T>> {
    match args.iter().find(|(k, _)| k == key) {
        Some((_, raw)) => raw.parse().map(Some).map_err(|_| FilterError::InvalidArgument {
            filter: filter.to_string(),
            argument: format!("{key}={raw}"),
        }),
        None => Ok(None),
    }
}

fn within<T: PartialOrd>(n: T, min: Option<T>, max: Option<T>) -> bool {
    min.is_none_or(|m| n >= m) && max.is_none_or(|m| n <= m)
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_expressions() {
        assert_eq!(
            Filter::parse("int(min=1, max=10)").unwrap(),
            Filter::Int {
                min: Some(1),
                max: Some(10)
            }
        );
        assert_eq!(Filter::parse(" email ").unwrap(), Filter::Email);
        assert_eq!(
            Filter::parse("one_of(values=a|b)").unwrap(),
            Filter::OneOf {
                values: vec!["a".into(), "b".into()]
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_expressions() {
        assert_eq!(
            Filter::parse("shout"),
            Err(FilterError::Unknown("shout".into()))
        );
        assert!(matches!(
            Filter::parse("int(min=1"),
            Err(FilterError::Malformed(_))
        ));
        assert!(matches!(
            Filter::parse("int(min=x)"),
            Err(FilterError::InvalidArgument { .. })
        ));
        assert!(matches!(
            Filter::parse("email(strict=1)"),
            Err(FilterError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_int_filter() {
        let filter = Filter::parse("int(min=1)").unwrap();
        assert_eq!(filter.apply(&json!("42")), Some(json!(42)));
        assert_eq!(filter.apply(&json!(0)), None);
        assert_eq!(filter.apply(&json!("4x")), None);
    }

    #[test]
    fn test_validators() {
        assert!(Filter::Email.apply(&json!("a@example.com")).is_some());
        assert!(Filter::Email.apply(&json!("a@localhost")).is_none());
        assert!(Filter::Url.apply(&json!("https://example.com/x")).is_some());
        assert!(Filter::Url.apply(&json!("not a url")).is_none());
        assert!(Filter::Ip.apply(&json!("::1")).is_some());
        assert!(Filter::Alnum.apply(&json!("abc-1")).is_none());
        assert_eq!(Filter::Bool.apply(&json!("off")), Some(json!(false)));
        assert_eq!(
            Filter::Length {
                min: None,
                max: Some(3)
            }
            .apply(&json!("abcd")),
            None
        );
    }

    #[test]
    fn test_chain_continues_after_failure() {
        let chain = parse_chain(&["trim", "int", "trim"]).unwrap();
        assert_eq!(
            apply_chain(&chain, json!(" 7 ")),
            Filtered {
                value: json!(7),
                failed: false
            }
        );

        let outcome = apply_chain(&chain, json!("seven"));
        assert!(outcome.failed);
        assert_eq!(outcome.value, FAILED_VALUE);
    }
}

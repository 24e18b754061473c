//! registry::builtin
//!
//! Handlers for the core scalar types, registered by
//! [`HandlerRegistry::with_builtins`](super::HandlerRegistry::with_builtins).
//!
//! Examples are sampled fresh on every call so repeated help output does not
//! look canned.

use rand::Rng;

use super::handler::{Parsed, TypeHandler};

/// Whole numbers (`i64`).
pub struct IntegerHandler;

impl TypeHandler for IntegerHandler {
    type Value = i64;

    fn type_name(&self) -> &'static str {
        "integer"
    }

    fn parse(&self, raw: &str) -> Result<Parsed<i64>, String> {
        raw.parse()
            .map(Parsed::One)
            .map_err(|_| "expected a whole number".to_string())
    }

    fn render(&self, value: &i64) -> String {
        value.to_string()
    }

    fn example(&self) -> String {
        rand::rng().random_range(1..=99_i64).to_string()
    }
}

/// Fractional numbers (`f64`). Non-finite input is rejected.
pub struct DecimalHandler;

impl TypeHandler for DecimalHandler {
    type Value = f64;

    fn type_name(&self) -> &'static str {
        "decimal"
    }

    fn parse(&self, raw: &str) -> Result<Parsed<f64>, String> {
        let value: f64 = raw
            .parse()
            .map_err(|_| "expected a number".to_string())?;
        if !value.is_finite() {
            return Err("expected a finite number".to_string());
        }
        Ok(Parsed::One(value))
    }

    fn render(&self, value: &f64) -> String {
        value.to_string()
    }

    fn example(&self) -> String {
        let whole = rand::rng().random_range(0..=9_u8);
        let tenth = rand::rng().random_range(0..=9_u8);
        format!("{whole}.{tenth}")
    }
}

/// Booleans. Accepts `true`/`false` and `yes`/`no`, case-insensitive.
pub struct BoolHandler;

impl TypeHandler for BoolHandler {
    type Value = bool;

    fn type_name(&self) -> &'static str {
        "boolean"
    }

    fn parse(&self, raw: &str) -> Result<Parsed<bool>, String> {
        match raw.to_lowercase().as_str() {
            "true" | "yes" => Ok(Parsed::One(true)),
            "false" | "no" => Ok(Parsed::One(false)),
            _ => Err("expected true or false".to_string()),
        }
    }

    fn render(&self, value: &bool) -> String {
        value.to_string()
    }

    fn possibilities(&self) -> Option<Vec<bool>> {
        Some(vec![true, false])
    }

    fn example(&self) -> String {
        if rand::rng().random_bool(0.5) {
            "true".to_string()
        } else {
            "false".to_string()
        }
    }
}

/// Free text. Parsing never fails.
pub struct TextHandler;

impl TypeHandler for TextHandler {
    type Value = String;

    fn type_name(&self) -> &'static str {
        "text"
    }

    fn parse(&self, raw: &str) -> Result<Parsed<String>, String> {
        Ok(Parsed::One(raw.to_string()))
    }

    fn render(&self, value: &String) -> String {
        value.clone()
    }

    fn example(&self) -> String {
        const WORDS: [&str; 4] = ["note", "title", "alias", "word"];
        WORDS[rand::rng().random_range(0..WORDS.len())].to_string()
    }
}

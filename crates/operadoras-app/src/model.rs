// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::Cnpj;

/// Rows per list page, fixed by the API contract.
pub const PAGE_SIZE: u64 = 10;

pub const CNPJ_FIELD: &str = "CNPJ";
pub const NAME_FIELD: &str = "RazaoSocial";
pub const EXPENSES_FIELD: &str = "ValorDespesas";

const NAME_FALLBACK_FIELD: &str = "razao_social";
const UNNAMED: &str = "(sem nome)";

pub fn total_pages(total: u64) -> u32 {
    let pages = total.div_ceil(PAGE_SIZE).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// A list row. The API owns the schema, so attributes stay untyped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operadora {
    attributes: Map<String, Value>,
}

impl Operadora {
    pub fn from_attributes(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn cnpj(&self) -> Option<Cnpj> {
        scalar_text(self.attributes.get(CNPJ_FIELD)?).map(Cnpj::new)
    }

    pub fn text_field(&self, key: &str) -> Option<String> {
        scalar_text(self.attributes.get(key)?)
    }

    pub fn display_name(&self) -> String {
        self.text_field(NAME_FIELD)
            .or_else(|| self.text_field(NAME_FALLBACK_FIELD))
            .or_else(|| self.cnpj().map(|cnpj| cnpj.to_string()))
            .unwrap_or_else(|| UNNAMED.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperadoraPage {
    pub items: Vec<Operadora>,
    pub total: u64,
}

/// Detail payload for one operator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperadoraDetail {
    attributes: Map<String, Value>,
}

impl OperadoraDetail {
    pub fn from_attributes(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn text_field(&self, key: &str) -> Option<String> {
        scalar_text(self.attributes.get(key)?)
    }

    /// Expense total for the chart. Missing, null, or non-numeric reads as zero.
    pub fn valor_despesas(&self) -> f64 {
        let value = match self.attributes.get(EXPENSES_FIELD) {
            Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
            Some(Value::String(raw)) => raw.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };
        if value.is_finite() { value } else { 0.0 }
    }

    /// Attribute pairs in key order, rendered as display text.
    pub fn display_rows(&self) -> Vec<(String, String)> {
        let mut rows = self
            .attributes
            .iter()
            .map(|(key, value)| (key.clone(), scalar_text(value).unwrap_or_default()))
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| left.0.cmp(&right.0));
        rows
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

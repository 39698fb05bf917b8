// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use std::fmt::Debug;

use crate::model::OperadoraDetail;

pub const EXPENSES_CATEGORY: &str = "Despesas";
pub const EXPENSES_SERIES: &str = "Valor Total";

/// A single-series, single-bar chart. The value axis always starts at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct BarChartSpec {
    pub category: String,
    pub series: String,
    pub value: f64,
}

impl BarChartSpec {
    pub fn despesas(detail: &OperadoraDetail) -> Self {
        Self {
            category: EXPENSES_CATEGORY.to_owned(),
            series: EXPENSES_SERIES.to_owned(),
            value: detail.valor_despesas(),
        }
    }
}

/// One drawing target. Callers must destroy the live handle before rendering
/// again; surfaces must accept a new render once the previous handle is gone.
pub trait ChartSurface {
    type Handle: Copy + Eq + Debug;

    fn render(&mut self, spec: &BarChartSpec) -> Result<Self::Handle>;
    fn destroy(&mut self, handle: Self::Handle);
}

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use operadoras_app::validation::cnpj_check_digits;
use operadoras_app::{
    BarChartSpec, CNPJ_FIELD, ChartSurface, Cnpj, EXPENSES_FIELD, NAME_FIELD, Operadora,
    OperadoraDetail, OperadoraPage, PAGE_SIZE,
};
use serde_json::{Map, Value, json};

const BRANDS: [&str; 14] = [
    "UNIMED",
    "AMIL",
    "BRADESCO SAUDE",
    "SULAMERICA",
    "HAPVIDA",
    "NOTREDAME INTERMEDICA",
    "PORTO SEGURO",
    "GOLDEN CROSS",
    "PREVENT SENIOR",
    "ASSIM SAUDE",
    "MEDSENIOR",
    "CAMPERJ",
    "SAO FRANCISCO",
    "CASSI",
];

const CITIES: [(&str, &str); 14] = [
    ("BELO HORIZONTE", "MG"),
    ("SAO PAULO", "SP"),
    ("RIO DE JANEIRO", "RJ"),
    ("CURITIBA", "PR"),
    ("PORTO ALEGRE", "RS"),
    ("SALVADOR", "BA"),
    ("RECIFE", "PE"),
    ("FORTALEZA", "CE"),
    ("GOIANIA", "GO"),
    ("BELEM", "PA"),
    ("MANAUS", "AM"),
    ("CAMPINAS", "SP"),
    ("VITORIA", "ES"),
    ("FLORIANOPOLIS", "SC"),
];

const MODALIDADES: [&str; 6] = [
    "Cooperativa Medica",
    "Medicina de Grupo",
    "Seguradora Especializada em Saude",
    "Autogestao",
    "Filantropia",
    "Odontologia de Grupo",
];

const SUFFIXES: [&str; 5] = ["", "SA", "LTDA", "COOPERATIVA", "PLANOS DE SAUDE"];
const QUARTERS: [&str; 4] = ["1T", "2T", "3T", "4T"];

/// Three fixed rows that mirror the backend seed data.
pub fn sample_records() -> Vec<Map<String, Value>> {
    [
        ("12345678000190", "UNIMED BH", 150000.50),
        ("23456789000191", "AMIL SP", 280000.75),
        ("34567890000192", "BRADESCO RJ", 450000.00),
    ]
    .into_iter()
    .map(|(cnpj, name, value)| {
        as_map(json!({
            "CNPJ": cnpj,
            "RazaoSocial": name,
            "Trimestre": "1T",
            "Ano": 2024,
            "ValorDespesas": value,
        }))
    })
    .collect()
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

#[derive(Debug, Clone)]
pub struct OperadoraFaker {
    rng: DeterministicRng,
    seed: u64,
}

impl OperadoraFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// A 14-digit CNPJ with valid check digits.
    pub fn cnpj(&mut self) -> String {
        loop {
            let root = self.int_range(10_000_000, 99_999_999);
            let branch = self.int_range(1, 9);
            let base = format!("{root:08}{branch:04}");
            if let Some((first, second)) = cnpj_check_digits(&base) {
                return format!("{base}{first}{second}");
            }
        }
    }

    /// A full row as the detail endpoint returns it.
    pub fn record(&mut self) -> Map<String, Value> {
        let brand = self.pick(&BRANDS);
        let (city, uf) = CITIES[self.rng.int_n(CITIES.len())];
        let suffix = self.pick(&SUFFIXES);
        let name = if suffix.is_empty() {
            format!("{brand} {city}")
        } else {
            format!("{brand} {city} {suffix}")
        };
        let cents = self.int_range(1_000_000, 90_000_000_000);

        as_map(json!({
            "CNPJ": self.cnpj(),
            "RazaoSocial": name,
            "RegistroANS": format!("{:06}", self.int_range(300_000, 429_999)),
            "UF": uf,
            "Modalidade": self.pick(&MODALIDADES),
            "Ano": 2020 + self.int_range(0, 5),
            "Trimestre": self.pick(&QUARTERS),
            "ValorDespesas": cents as f64 / 100.0,
        }))
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range(&mut self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + self.rng.next_u64() % span
    }
}

/// In-memory stand-in for the list and detail endpoints.
#[derive(Debug, Clone, Default)]
pub struct DemoCatalog {
    rows: Vec<Map<String, Value>>,
}

impl DemoCatalog {
    pub fn new(rows: Vec<Map<String, Value>>) -> Self {
        Self { rows }
    }

    /// The fixed sample rows followed by `count` generated ones.
    pub fn seeded(seed: u64, count: usize) -> Self {
        let mut faker = OperadoraFaker::new(seed);
        let mut rows = sample_records();
        rows.extend((0..count).map(|_| faker.record()));
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Matches on name (case-insensitive) or CNPJ substring, then slices the
    /// 1-based page. List rows carry only the identifier and name.
    pub fn page(&self, page: u32, search: &str) -> OperadoraPage {
        let needle = search.trim();
        let lowered = needle.to_lowercase();
        let matches = self
            .rows
            .iter()
            .filter(|row| {
                if needle.is_empty() {
                    return true;
                }
                let name = text(row, NAME_FIELD).to_lowercase();
                name.contains(&lowered) || text(row, CNPJ_FIELD).contains(needle)
            })
            .collect::<Vec<_>>();

        let size = PAGE_SIZE as usize;
        let start = (page.max(1) as usize - 1).saturating_mul(size);
        let items = matches
            .iter()
            .skip(start)
            .take(size)
            .map(|row| {
                let mut summary = Map::new();
                for key in [CNPJ_FIELD, NAME_FIELD] {
                    if let Some(value) = row.get(key) {
                        summary.insert(key.to_owned(), value.clone());
                    }
                }
                Operadora::from_attributes(summary)
            })
            .collect();

        OperadoraPage {
            items,
            total: matches.len() as u64,
        }
    }

    pub fn detail(&self, cnpj: &Cnpj) -> Option<OperadoraDetail> {
        self.rows
            .iter()
            .find(|row| text(row, CNPJ_FIELD) == cnpj.as_str())
            .cloned()
            .map(OperadoraDetail::from_attributes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordingHandle(u32);

impl RecordingHandle {
    pub const fn get(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartCall {
    Render {
        handle: RecordingHandle,
        spec: BarChartSpec,
    },
    Destroy {
        handle: RecordingHandle,
    },
}

/// Chart surface that records calls and panics on a second live handle.
#[derive(Debug, Default)]
pub struct RecordingChart {
    next: u32,
    live: Option<RecordingHandle>,
    calls: Vec<ChartCall>,
    fail_renders: bool,
}

impl RecordingChart {
    pub fn failing() -> Self {
        Self {
            fail_renders: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> &[ChartCall] {
        &self.calls
    }

    pub fn live(&self) -> Option<RecordingHandle> {
        self.live
    }

    pub fn live_count(&self) -> usize {
        usize::from(self.live.is_some())
    }

    /// Values of every render, in call order.
    pub fn rendered_values(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                ChartCall::Render { spec, .. } => Some(spec.value),
                ChartCall::Destroy { .. } => None,
            })
            .collect()
    }

    pub fn live_spec(&self) -> Option<&BarChartSpec> {
        let live = self.live?;
        self.calls.iter().rev().find_map(|call| match call {
            ChartCall::Render { handle, spec } if *handle == live => Some(spec),
            _ => None,
        })
    }
}

impl ChartSurface for RecordingChart {
    type Handle = RecordingHandle;

    fn render(&mut self, spec: &BarChartSpec) -> Result<RecordingHandle> {
        assert!(
            self.live.is_none(),
            "render called while {:?} is still live",
            self.live
        );
        if self.fail_renders {
            bail!("recording chart configured to fail");
        }
        self.next += 1;
        let handle = RecordingHandle(self.next);
        self.live = Some(handle);
        self.calls.push(ChartCall::Render {
            handle,
            spec: spec.clone(),
        });
        Ok(handle)
    }

    fn destroy(&mut self, handle: RecordingHandle) {
        assert_eq!(
            self.live,
            Some(handle),
            "destroy called for a handle that is not live"
        );
        self.live = None;
        self.calls.push(ChartCall::Destroy { handle });
    }
}

pub fn operadora(cnpj: &str, name: &str) -> Operadora {
    let mut attributes = Map::new();
    attributes.insert(CNPJ_FIELD.to_owned(), Value::from(cnpj));
    attributes.insert(NAME_FIELD.to_owned(), Value::from(name));
    Operadora::from_attributes(attributes)
}

pub fn detail_with_expenses(cnpj: &str, value: Value) -> OperadoraDetail {
    let mut attributes = Map::new();
    attributes.insert(CNPJ_FIELD.to_owned(), Value::from(cnpj));
    attributes.insert(EXPENSES_FIELD.to_owned(), value);
    OperadoraDetail::from_attributes(attributes)
}

fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn text(row: &Map<String, Value>, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Number(value)) => value.to_string(),
        _ => String::new(),
    }
}

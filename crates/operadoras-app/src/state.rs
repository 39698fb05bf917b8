// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{debug, info, warn};

use crate::{
    BarChartSpec, ChartSurface, Cnpj, DetailToken, ListToken, Operadora, OperadoraDetail,
    OperadoraPage, total_pages,
};

/// Result of one fetch as seen by the controller; errors arrive pre-rendered.
pub type FetchOutcome<T> = std::result::Result<T, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct ListState {
    pub items: Vec<Operadora>,
    pub page: u32,
    pub total_pages: u32,
    pub total: Option<u64>,
    pub search_term: String,
    pub loading: bool,
    /// Page that produced `items`; restored when a newer fetch fails.
    pub loaded_page: u32,
    /// Search term that produced `items`.
    pub loaded_search: String,
}

impl Default for ListState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            total_pages: 1,
            total: None,
            search_term: String::new(),
            loading: false,
            loaded_page: 1,
            loaded_search: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailSelection<H> {
    pub selected: Option<Operadora>,
    pub detail: Option<OperadoraDetail>,
    pub chart_handle: Option<H>,
    pub loading: bool,
}

impl<H> Default for DetailSelection<H> {
    fn default() -> Self {
        Self {
            selected: None,
            detail: None,
            chart_handle: None,
            loading: false,
        }
    }
}

impl<H> DetailSelection<H> {
    pub fn selected_cnpj(&self) -> Option<Cnpj> {
        self.selected.as_ref().and_then(Operadora::cnpj)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub token: ListToken,
    pub page: u32,
    pub search: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRequest {
    pub token: DetailToken,
    pub cnpj: Cnpj,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    Initialize,
    Reload,
    ChangePage(i64),
    SetSearch(String),
    SelectDetail(Operadora),
    ClearDetail,
    ListResolved {
        token: ListToken,
        outcome: FetchOutcome<OperadoraPage>,
    },
    DetailResolved {
        token: DetailToken,
        cnpj: Cnpj,
        outcome: FetchOutcome<OperadoraDetail>,
    },
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    ListRequested(ListRequest),
    DetailRequested(DetailRequest),
    PageChanged(u32),
    SearchChanged(String),
    ListLoaded {
        page: u32,
        total_pages: u32,
        rows: usize,
    },
    ListFailed(String),
    DetailSelected(Option<Cnpj>),
    DetailLoaded(Cnpj),
    DetailFailed(String),
    ChartRendered {
        value: f64,
    },
    ChartDestroyed,
    SelectionCleared,
    StaleDiscarded,
    StatusUpdated(String),
    StatusCleared,
}

/// Owns list and detail state plus the single chart handle. Fetches are
/// requested through events and resolved through commands, so every mutation
/// happens on the caller's thread.
pub struct ViewController<C: ChartSurface> {
    list: ListState,
    detail: DetailSelection<C::Handle>,
    status_line: Option<String>,
    chart: C,
    list_token: ListToken,
    detail_token: DetailToken,
}

impl<C: ChartSurface> ViewController<C> {
    pub fn new(chart: C) -> Self {
        Self {
            list: ListState::default(),
            detail: DetailSelection::default(),
            status_line: None,
            chart,
            list_token: ListToken::default(),
            detail_token: DetailToken::default(),
        }
    }

    pub fn list(&self) -> &ListState {
        &self.list
    }

    pub fn detail(&self) -> &DetailSelection<C::Handle> {
        &self.detail
    }

    pub fn status_line(&self) -> Option<&str> {
        self.status_line.as_deref()
    }

    pub fn chart(&self) -> &C {
        &self.chart
    }

    pub fn latest_list_token(&self) -> ListToken {
        self.list_token
    }

    pub fn latest_detail_token(&self) -> DetailToken {
        self.detail_token
    }

    pub fn dispatch(&mut self, command: ViewCommand) -> Vec<ViewEvent> {
        match command {
            ViewCommand::Initialize => {
                self.list.page = 1;
                self.list.search_term.clear();
                vec![self.issue_list_request()]
            }
            ViewCommand::Reload => vec![self.issue_list_request()],
            ViewCommand::ChangePage(step) => self.change_page(step),
            ViewCommand::SetSearch(term) => {
                self.list.search_term = term.trim().to_owned();
                self.list.page = 1;
                vec![
                    ViewEvent::SearchChanged(self.list.search_term.clone()),
                    ViewEvent::PageChanged(1),
                    self.issue_list_request(),
                ]
            }
            ViewCommand::SelectDetail(operadora) => self.select_detail(operadora),
            ViewCommand::ClearDetail => {
                let mut events = self.release_chart();
                self.detail.selected = None;
                self.detail.detail = None;
                self.detail.loading = false;
                self.detail_token = self.detail_token.next();
                events.push(ViewEvent::SelectionCleared);
                events
            }
            ViewCommand::ListResolved { token, outcome } => self.resolve_list(token, outcome),
            ViewCommand::DetailResolved {
                token,
                cnpj,
                outcome,
            } => self.resolve_detail(token, cnpj, outcome),
            ViewCommand::ClearStatus => {
                self.status_line = None;
                vec![ViewEvent::StatusCleared]
            }
        }
    }

    fn change_page(&mut self, step: i64) -> Vec<ViewEvent> {
        let current = i64::from(self.list.page);
        let last = i64::from(self.list.total_pages.max(1));
        let target = current.saturating_add(step).clamp(1, last);
        if target == current {
            return match step.signum() {
                -1 => vec![self.set_status("already on the first page")],
                1 => vec![self.set_status("already on the last page")],
                _ => Vec::new(),
            };
        }

        self.list.page = target as u32;
        vec![
            ViewEvent::PageChanged(self.list.page),
            self.issue_list_request(),
        ]
    }

    fn select_detail(&mut self, operadora: Operadora) -> Vec<ViewEvent> {
        let mut events = self.release_chart();
        let cnpj = operadora.cnpj();
        self.detail.selected = Some(operadora);
        self.detail.detail = None;
        self.detail_token = self.detail_token.next();
        events.push(ViewEvent::DetailSelected(cnpj.clone()));

        match cnpj {
            Some(cnpj) => {
                self.detail.loading = true;
                events.push(ViewEvent::DetailRequested(DetailRequest {
                    token: self.detail_token,
                    cnpj,
                }));
            }
            None => {
                self.detail.loading = false;
                warn!("selected record has no CNPJ; detail fetch skipped");
                events.push(self.set_status("record has no CNPJ; details unavailable"));
            }
        }
        events
    }

    fn resolve_list(
        &mut self,
        token: ListToken,
        outcome: FetchOutcome<OperadoraPage>,
    ) -> Vec<ViewEvent> {
        if token != self.list_token {
            debug!(%token, latest = %self.list_token, "discarding stale list response");
            return vec![ViewEvent::StaleDiscarded];
        }
        self.list.loading = false;

        let page = match outcome {
            Ok(page) => page,
            Err(error) => {
                warn!(
                    page = self.list.page,
                    search = %self.list.search_term,
                    %error,
                    "list fetch failed"
                );
                let mut events = vec![ViewEvent::ListFailed(error.clone())];
                events.extend(self.restore_loaded_query());
                events.push(self.set_status(&format!("load failed: {error}")));
                return events;
            }
        };

        self.list.loaded_page = self.list.page;
        self.list.loaded_search = self.list.search_term.clone();
        self.list.items = page.items;
        self.list.total = Some(page.total);
        self.list.total_pages = total_pages(page.total);
        let mut events = vec![ViewEvent::ListLoaded {
            page: self.list.page,
            total_pages: self.list.total_pages,
            rows: self.list.items.len(),
        }];

        if self.list.page > self.list.total_pages {
            let requested = self.list.page;
            self.list.page = self.list.total_pages;
            self.list.loaded_page = self.list.page;
            info!(
                requested,
                clamped = self.list.page,
                "page out of range after reload"
            );
            events.push(ViewEvent::PageChanged(self.list.page));
            events.push(self.set_status(&format!(
                "page {requested} no longer exists; showing page {}",
                self.list.page
            )));
            events.push(self.issue_list_request());
        }
        events
    }

    fn resolve_detail(
        &mut self,
        token: DetailToken,
        cnpj: Cnpj,
        outcome: FetchOutcome<OperadoraDetail>,
    ) -> Vec<ViewEvent> {
        if token != self.detail_token || self.detail.selected_cnpj().as_ref() != Some(&cnpj) {
            debug!(%token, latest = %self.detail_token, %cnpj, "discarding stale detail response");
            return vec![ViewEvent::StaleDiscarded];
        }
        self.detail.loading = false;

        let detail = match outcome {
            Ok(detail) => detail,
            Err(error) => {
                warn!(%cnpj, %error, "detail fetch failed");
                return vec![
                    ViewEvent::DetailFailed(error.clone()),
                    self.set_status(&format!("detail failed: {error}")),
                ];
            }
        };

        let mut events = self.release_chart();
        let spec = BarChartSpec::despesas(&detail);
        match self.chart.render(&spec) {
            Ok(handle) => {
                self.detail.chart_handle = Some(handle);
                events.push(ViewEvent::ChartRendered { value: spec.value });
            }
            Err(error) => {
                let message = format!("{error:#}");
                warn!(%cnpj, error = %message, "chart render failed");
                events.push(self.set_status(&format!("chart failed: {error}")));
            }
        }
        self.detail.detail = Some(detail);
        events.push(ViewEvent::DetailLoaded(cnpj));
        events
    }

    /// Puts `page` and `search_term` back in step with the rows on screen.
    fn restore_loaded_query(&mut self) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        if self.list.search_term != self.list.loaded_search {
            self.list.search_term = self.list.loaded_search.clone();
            events.push(ViewEvent::SearchChanged(self.list.search_term.clone()));
        }
        if self.list.page != self.list.loaded_page {
            self.list.page = self.list.loaded_page;
            events.push(ViewEvent::PageChanged(self.list.page));
        }
        events
    }

    fn issue_list_request(&mut self) -> ViewEvent {
        self.list_token = self.list_token.next();
        self.list.loading = true;
        ViewEvent::ListRequested(ListRequest {
            token: self.list_token,
            page: self.list.page,
            search: self.list.search_term.clone(),
        })
    }

    fn release_chart(&mut self) -> Vec<ViewEvent> {
        match self.detail.chart_handle.take() {
            Some(handle) => {
                self.chart.destroy(handle);
                vec![ViewEvent::ChartDestroyed]
            }
            None => Vec::new(),
        }
    }

    fn set_status(&mut self, message: &str) -> ViewEvent {
        self.status_line = Some(message.to_owned());
        ViewEvent::StatusUpdated(message.to_owned())
    }
}

impl<C: ChartSurface> Drop for ViewController<C> {
    fn drop(&mut self) {
        if let Some(handle) = self.detail.chart_handle.take() {
            self.chart.destroy(handle);
        }
    }
}

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use operadoras_api::{ApiError, Client};
use operadoras_app::{DetailRequest, ListRequest, OperadoraDetail, OperadoraPage};
use operadoras_testkit::DemoCatalog;
use operadoras_tui::{AppRuntime, InternalEvent};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::debug;

/// Talks to the HTTP API. Each fetch runs on its own worker thread so the
/// event loop keeps drawing while requests are in flight.
pub struct ApiRuntime {
    client: Client,
}

impl ApiRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn list_page(client: &Client, request: &ListRequest) -> Result<OperadoraPage, ApiError> {
    client.list_operadoras(request.page, &request.search)
}

fn operadora_detail(
    client: &Client,
    request: &DetailRequest,
) -> Result<OperadoraDetail, ApiError> {
    client.get_operadora(&request.cnpj)
}

fn api_outcome<T>(result: Result<T, ApiError>) -> Result<T, String> {
    result.map_err(|error| {
        debug!(kind = error.kind(), %error, "api request failed");
        error.to_string()
    })
}

// `fetch_*` is the blocking path; the spawn overrides run the same calls on a
// worker thread.
impl AppRuntime for ApiRuntime {
    fn fetch_list(&mut self, request: &ListRequest) -> Result<OperadoraPage> {
        Ok(list_page(&self.client, request)?)
    }

    fn fetch_detail(&mut self, request: &DetailRequest) -> Result<OperadoraDetail> {
        Ok(operadora_detail(&self.client, request)?)
    }

    fn spawn_list_fetch(&mut self, request: ListRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name("list-fetch".to_owned())
            .spawn(move || {
                let outcome = api_outcome(list_page(&client, &request));
                debug!(token = %request.token, ok = outcome.is_ok(), "list fetch finished");
                let _ = tx.send(InternalEvent::ListFetched {
                    token: request.token,
                    outcome,
                });
            })
            .context("spawn list fetch thread")?;
        Ok(())
    }

    fn spawn_detail_fetch(
        &mut self,
        request: DetailRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name("detail-fetch".to_owned())
            .spawn(move || {
                let outcome = api_outcome(operadora_detail(&client, &request));
                debug!(
                    token = %request.token,
                    cnpj = %request.cnpj,
                    ok = outcome.is_ok(),
                    "detail fetch finished"
                );
                let _ = tx.send(InternalEvent::DetailFetched {
                    token: request.token,
                    cnpj: request.cnpj,
                    outcome,
                });
            })
            .context("spawn detail fetch thread")?;
        Ok(())
    }
}

/// Serves the in-memory demo catalog; no network involved.
pub struct DemoRuntime {
    catalog: DemoCatalog,
}

impl DemoRuntime {
    pub fn new(catalog: DemoCatalog) -> Self {
        Self { catalog }
    }
}

impl AppRuntime for DemoRuntime {
    fn fetch_list(&mut self, request: &ListRequest) -> Result<OperadoraPage> {
        Ok(self.catalog.page(request.page, &request.search))
    }

    fn fetch_detail(&mut self, request: &DetailRequest) -> Result<OperadoraDetail> {
        self.catalog
            .detail(&request.cnpj)
            .ok_or_else(|| anyhow!("server error (404): operadora {} not found", request.cnpj))
    }
}

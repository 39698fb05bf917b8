// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use operadoras_app::validation::{format_cnpj, format_reais, is_valid_cnpj};
use operadoras_app::{
    BarChartSpec, ChartSurface, Cnpj, DetailRequest, DetailToken, EXPENSES_FIELD, FetchOutcome,
    ListRequest, ListState, ListToken, OperadoraDetail, OperadoraPage, ViewCommand,
    ViewController, ViewEvent,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{
    Bar, BarChart, BarGroup, Block, Borders, Cell, Clear, Paragraph, Row, Table,
};
use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info, warn};

const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);

/// Executes fetches on behalf of the event loop. The default `spawn_*`
/// methods run the fetch inline and post the result; network runtimes
/// override them to fetch on a worker thread.
pub trait AppRuntime {
    fn fetch_list(&mut self, request: &ListRequest) -> Result<OperadoraPage>;
    fn fetch_detail(&mut self, request: &DetailRequest) -> Result<OperadoraDetail>;

    fn spawn_list_fetch(&mut self, request: ListRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let outcome = self
            .fetch_list(&request)
            .map_err(|error| error.to_string());
        tx.send(InternalEvent::ListFetched {
            token: request.token,
            outcome,
        })
        .map_err(|_| anyhow!("fetch event channel closed"))?;
        Ok(())
    }

    fn spawn_detail_fetch(
        &mut self,
        request: DetailRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let outcome = self
            .fetch_detail(&request)
            .map_err(|error| error.to_string());
        tx.send(InternalEvent::DetailFetched {
            token: request.token,
            cnpj: request.cnpj,
            outcome,
        })
        .map_err(|_| anyhow!("fetch event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    ListFetched {
        token: ListToken,
        outcome: FetchOutcome<OperadoraPage>,
    },
    DetailFetched {
        token: DetailToken,
        cnpj: Cnpj,
        outcome: FetchOutcome<OperadoraDetail>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaneHandle(u64);

/// The detail pane's chart slot. Holds at most one bar chart at a time.
#[derive(Debug, Default)]
pub struct TerminalChart {
    issued: u64,
    slot: Option<(PaneHandle, BarChartSpec)>,
}

impl TerminalChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&BarChartSpec> {
        self.slot.as_ref().map(|(_, spec)| spec)
    }

    pub fn live_handle(&self) -> Option<PaneHandle> {
        self.slot.as_ref().map(|(handle, _)| *handle)
    }
}

impl ChartSurface for TerminalChart {
    type Handle = PaneHandle;

    fn render(&mut self, spec: &BarChartSpec) -> Result<PaneHandle> {
        if let Some((live, _)) = &self.slot {
            bail!("chart pane already holds {live:?}");
        }
        self.issued = self.issued.saturating_add(1);
        let handle = PaneHandle(self.issued);
        self.slot = Some((handle, spec.clone()));
        Ok(handle)
    }

    fn destroy(&mut self, handle: PaneHandle) {
        match &self.slot {
            Some((live, _)) if *live == handle => self.slot = None,
            _ => debug!(?handle, "ignoring destroy for a handle that is not live"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum InputMode {
    #[default]
    Browse,
    Search,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    cursor: usize,
    input_mode: InputMode,
    search_draft: String,
    help_visible: bool,
    status_token: u64,
    last_refresh: Option<OffsetDateTime>,
}

pub fn run_app<R: AppRuntime>(
    controller: &mut ViewController<TerminalChart>,
    runtime: &mut R,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();
    info!("starting terminal session");
    dispatch(
        controller,
        runtime,
        &mut view_data,
        &internal_tx,
        ViewCommand::Initialize,
    );

    let mut result = Ok(());
    loop {
        process_internal_events(
            controller,
            runtime,
            &mut view_data,
            &internal_tx,
            &internal_rx,
        );

        if let Err(error) = terminal.draw(|frame| render(frame, controller, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        match poll_key() {
            Ok(Some(key)) => {
                if handle_key_event(controller, runtime, &mut view_data, &internal_tx, key) {
                    break;
                }
            }
            Ok(None) => {}
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }

    info!("terminal session ended");
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn poll_key() -> Result<Option<KeyEvent>> {
    if !event::poll(Duration::from_millis(120)).context("poll event")? {
        return Ok(None);
    }
    match event::read().context("read event")? {
        Event::Key(key) => Ok(Some(key)),
        _ => Ok(None),
    }
}

fn process_internal_events<C: ChartSurface, R: AppRuntime>(
    controller: &mut ViewController<C>,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        let command = match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                ViewCommand::ClearStatus
            }
            InternalEvent::ClearStatus { .. } => continue,
            InternalEvent::ListFetched { token, outcome } => {
                ViewCommand::ListResolved { token, outcome }
            }
            InternalEvent::DetailFetched {
                token,
                cnpj,
                outcome,
            } => ViewCommand::DetailResolved {
                token,
                cnpj,
                outcome,
            },
        };
        dispatch(controller, runtime, view_data, tx, command);
    }
}

/// Runs a command through the controller and carries out whatever it asks
/// for, including commands that follow from a failed spawn.
fn dispatch<C: ChartSurface, R: AppRuntime>(
    controller: &mut ViewController<C>,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    command: ViewCommand,
) {
    let mut pending = VecDeque::from([command]);
    while let Some(command) = pending.pop_front() {
        for event in controller.dispatch(command) {
            if let Some(follow_up) = apply_view_event(runtime, view_data, tx, event) {
                pending.push_back(follow_up);
            }
        }
    }
}

fn apply_view_event<R: AppRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: ViewEvent,
) -> Option<ViewCommand> {
    match event {
        ViewEvent::ListRequested(request) => {
            let token = request.token;
            let error = runtime.spawn_list_fetch(request, tx.clone()).err()?;
            warn!(%token, error = %error, "list fetch could not be started");
            Some(ViewCommand::ListResolved {
                token,
                outcome: Err(error.to_string()),
            })
        }
        ViewEvent::DetailRequested(request) => {
            let token = request.token;
            let cnpj = request.cnpj.clone();
            let error = runtime.spawn_detail_fetch(request, tx.clone()).err()?;
            warn!(%token, %cnpj, error = %error, "detail fetch could not be started");
            Some(ViewCommand::DetailResolved {
                token,
                cnpj,
                outcome: Err(error.to_string()),
            })
        }
        ViewEvent::PageChanged(_) | ViewEvent::SearchChanged(_) => {
            view_data.cursor = 0;
            None
        }
        ViewEvent::ListLoaded { rows, .. } => {
            view_data.cursor = view_data.cursor.min(rows.saturating_sub(1));
            view_data.last_refresh = Some(OffsetDateTime::now_utc());
            None
        }
        ViewEvent::StatusUpdated(_) => {
            view_data.status_token = view_data.status_token.saturating_add(1);
            schedule_status_clear(tx, view_data.status_token);
            None
        }
        _ => None,
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

/// Returns true when the app should exit.
fn handle_key_event<C: ChartSurface, R: AppRuntime>(
    controller: &mut ViewController<C>,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    if view_data.help_visible {
        view_data.help_visible = false;
        return false;
    }
    if view_data.input_mode == InputMode::Search {
        if let Some(command) = handle_search_key(view_data, key) {
            dispatch(controller, runtime, view_data, internal_tx, command);
        }
        return false;
    }

    let command = match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => {
            view_data.help_visible = true;
            None
        }
        KeyCode::Char('j') | KeyCode::Down => {
            move_cursor(view_data, controller.list().items.len(), 1);
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            move_cursor(view_data, controller.list().items.len(), -1);
            None
        }
        KeyCode::Char('n') | KeyCode::Right => Some(ViewCommand::ChangePage(1)),
        KeyCode::Char('p') | KeyCode::Left => Some(ViewCommand::ChangePage(-1)),
        KeyCode::Char('r') => Some(ViewCommand::Reload),
        KeyCode::Char('/') => {
            view_data.input_mode = InputMode::Search;
            view_data.search_draft = controller.list().search_term.clone();
            None
        }
        KeyCode::Enter => controller
            .list()
            .items
            .get(view_data.cursor)
            .cloned()
            .map(ViewCommand::SelectDetail),
        KeyCode::Esc if controller.detail().selected.is_some() => Some(ViewCommand::ClearDetail),
        _ => None,
    };

    if let Some(command) = command {
        dispatch(controller, runtime, view_data, internal_tx, command);
    }
    false
}

fn handle_search_key(view_data: &mut ViewData, key: KeyEvent) -> Option<ViewCommand> {
    match key.code {
        KeyCode::Enter => {
            view_data.input_mode = InputMode::Browse;
            Some(ViewCommand::SetSearch(std::mem::take(
                &mut view_data.search_draft,
            )))
        }
        KeyCode::Esc => {
            view_data.input_mode = InputMode::Browse;
            view_data.search_draft.clear();
            None
        }
        KeyCode::Backspace => {
            view_data.search_draft.pop();
            None
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.search_draft.push(ch);
            None
        }
        _ => None,
    }
}

fn move_cursor(view_data: &mut ViewData, rows: usize, delta: isize) {
    if rows == 0 {
        view_data.cursor = 0;
        return;
    }
    let last = rows - 1;
    view_data.cursor = view_data.cursor.saturating_add_signed(delta).min(last);
}

fn render(
    frame: &mut ratatui::Frame<'_>,
    controller: &ViewController<TerminalChart>,
    view_data: &ViewData,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(controller.list(), view_data))
        .block(Block::default().title("operadoras").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(layout[1]);
    render_table(frame, body[0], controller.list(), view_data);
    render_detail(frame, body[1], controller);

    let status = Paragraph::new(status_text(controller.status_line(), view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if view_data.help_visible {
        let area = centered_rect(60, 50, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn header_text(list: &ListState, view_data: &ViewData) -> String {
    let search = match view_data.input_mode {
        InputMode::Search => format!("search: {}_", view_data.search_draft),
        InputMode::Browse if list.search_term.is_empty() => "search: (all)".to_owned(),
        InputMode::Browse => format!("search: {}", list.search_term),
    };
    let total = list
        .total
        .map_or_else(|| "-".to_owned(), |total| total.to_string());
    let refreshed = view_data
        .last_refresh
        .and_then(|at| at.format(format_description!("[hour]:[minute]:[second]")).ok())
        .map_or_else(|| "never".to_owned(), |at| format!("{at} UTC"));
    format!(
        "{search} | page {}/{} | {total} records | refreshed {refreshed}",
        list.page, list.total_pages
    )
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    list: &ListState,
    view_data: &ViewData,
) {
    let rows = list.items.iter().enumerate().map(|(index, item)| {
        let cnpj = item.cnpj();
        let shown = cnpj
            .as_ref()
            .map_or_else(|| "-".to_owned(), |cnpj| format_cnpj(cnpj.as_str()));
        let mark = match &cnpj {
            Some(cnpj) if is_valid_cnpj(cnpj.as_str()) => " ",
            _ => "!",
        };
        let row = Row::new(vec![
            Cell::from(shown),
            Cell::from(mark),
            Cell::from(item.display_name()),
        ]);
        if index == view_data.cursor {
            row.style(Style::default().add_modifier(Modifier::REVERSED))
        } else {
            row
        }
    });

    let title = if list.loading {
        "records (loading)"
    } else {
        "records"
    };
    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(1),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec!["CNPJ", "", "Razao Social"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn render_detail(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    controller: &ViewController<TerminalChart>,
) {
    let panes = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let detail = Paragraph::new(detail_text(controller))
        .block(Block::default().title("details").borders(Borders::ALL));
    frame.render_widget(detail, panes[0]);

    match controller.chart().current() {
        Some(spec) => frame.render_widget(bar_chart(spec, panes[1].width), panes[1]),
        None => frame.render_widget(
            Block::default().title("chart").borders(Borders::ALL),
            panes[1],
        ),
    }
}

fn detail_text(controller: &ViewController<TerminalChart>) -> String {
    let selection = controller.detail();
    let Some(selected) = &selection.selected else {
        return "enter shows details for the highlighted record".to_owned();
    };
    if selection.loading {
        return format!("loading {}...", selected.display_name());
    }
    let Some(detail) = &selection.detail else {
        return selected.display_name();
    };
    detail
        .display_rows()
        .into_iter()
        .map(|(key, value)| {
            if key == EXPENSES_FIELD {
                format!("{key}: {}", format_reais(detail.valor_despesas()))
            } else {
                format!("{key}: {value}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn bar_chart(spec: &BarChartSpec, width: u16) -> BarChart<'static> {
    let value = bar_value(spec.value);
    let bar = Bar::default()
        .value(value)
        .label(Line::from(spec.category.clone()))
        .text_value(format_reais(spec.value))
        .style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));

    BarChart::default()
        .block(
            Block::default()
                .title(spec.series.clone())
                .borders(Borders::ALL),
        )
        .data(BarGroup::default().bars(&[bar]))
        .max(value.max(1))
        .bar_gap(1)
        .bar_width(width.saturating_sub(6).clamp(3, 24))
}

/// Terminal bars are integral and start at zero.
fn bar_value(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

fn status_text(status_line: Option<&str>, view_data: &ViewData) -> String {
    let hints = match view_data.input_mode {
        InputMode::Browse => {
            "j/k move | n/p page | / search | enter details | esc clear | r reload | ? help | q quit"
        }
        InputMode::Search => "type to filter | enter apply | esc cancel",
    };
    match status_line {
        Some(status) => format!("{status} | {hints}"),
        None => hints.to_owned(),
    }
}

fn help_overlay_text() -> &'static str {
    "browse: j/k or up/down move | n/right next page | p/left previous page\n\
browse: / search | enter show details | esc clear details | r reload\n\
search: type to edit | backspace delete | enter apply | esc cancel\n\
global: ? help | q quit | ctrl+c quit\n\
any key closes this help"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InputMode, InternalEvent, PaneHandle, TerminalChart, ViewData, bar_value,
        dispatch, handle_key_event, header_text, help_overlay_text, process_internal_events,
        status_text,
    };
    use anyhow::{Result, anyhow, bail};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use operadoras_app::{
        BarChartSpec, ChartSurface, DetailRequest, ListRequest, ListState, OperadoraDetail,
        OperadoraPage, ViewCommand, ViewController,
    };
    use operadoras_testkit::DemoCatalog;
    use std::sync::mpsc::{self, Receiver, Sender};

    #[derive(Debug, Default)]
    struct TestRuntime {
        catalog: DemoCatalog,
        list_calls: Vec<ListRequest>,
        detail_calls: Vec<DetailRequest>,
        fail_lists: bool,
    }

    impl AppRuntime for TestRuntime {
        fn fetch_list(&mut self, request: &ListRequest) -> Result<OperadoraPage> {
            self.list_calls.push(request.clone());
            if self.fail_lists {
                bail!("server error (500): boom");
            }
            Ok(self.catalog.page(request.page, &request.search))
        }

        fn fetch_detail(&mut self, request: &DetailRequest) -> Result<OperadoraDetail> {
            self.detail_calls.push(request.clone());
            self.catalog
                .detail(&request.cnpj)
                .ok_or_else(|| anyhow!("server error (404): Not Found"))
        }
    }

    /// Parks every request until the test answers it.
    #[derive(Debug, Default)]
    struct DeferredRuntime {
        lists: Vec<ListRequest>,
        details: Vec<DetailRequest>,
    }

    impl AppRuntime for DeferredRuntime {
        fn fetch_list(&mut self, _request: &ListRequest) -> Result<OperadoraPage> {
            bail!("deferred runtime never fetches inline")
        }

        fn fetch_detail(&mut self, _request: &DetailRequest) -> Result<OperadoraDetail> {
            bail!("deferred runtime never fetches inline")
        }

        fn spawn_list_fetch(
            &mut self,
            request: ListRequest,
            _tx: Sender<InternalEvent>,
        ) -> Result<()> {
            self.lists.push(request);
            Ok(())
        }

        fn spawn_detail_fetch(
            &mut self,
            request: DetailRequest,
            _tx: Sender<InternalEvent>,
        ) -> Result<()> {
            self.details.push(request);
            Ok(())
        }
    }

    struct Harness<R: AppRuntime> {
        controller: ViewController<TerminalChart>,
        runtime: R,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl<R: AppRuntime> Harness<R> {
        fn new(runtime: R) -> Self {
            let (tx, rx) = mpsc::channel();
            Self {
                controller: ViewController::new(TerminalChart::new()),
                runtime,
                view_data: ViewData::default(),
                tx,
                rx,
            }
        }

        fn start(&mut self) {
            dispatch(
                &mut self.controller,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                ViewCommand::Initialize,
            );
            self.settle();
        }

        fn settle(&mut self) {
            process_internal_events(
                &mut self.controller,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                &self.rx,
            );
        }

        fn key(&mut self, key: KeyEvent) -> bool {
            let quit = handle_key_event(
                &mut self.controller,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                key,
            );
            self.settle();
            quit
        }

        fn press(&mut self, code: KeyCode) -> bool {
            self.key(KeyEvent::new(code, KeyModifiers::NONE))
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.press(KeyCode::Char(ch));
            }
        }

        fn send(&mut self, event: InternalEvent) {
            self.tx.send(event).expect("channel should be open");
            self.settle();
        }
    }

    fn catalog() -> DemoCatalog {
        DemoCatalog::seeded(5, 22)
    }

    fn demo_harness() -> Harness<TestRuntime> {
        let mut harness = Harness::new(TestRuntime {
            catalog: catalog(),
            ..TestRuntime::default()
        });
        harness.start();
        harness
    }

    fn deferred_harness_with_first_page() -> Harness<DeferredRuntime> {
        let mut harness = Harness::new(DeferredRuntime::default());
        harness.start();
        let request = harness.runtime.lists.remove(0);
        harness.send(InternalEvent::ListFetched {
            token: request.token,
            outcome: Ok(catalog().page(1, "")),
        });
        harness
    }

    fn spec(value: f64) -> BarChartSpec {
        BarChartSpec {
            category: "Despesas".to_owned(),
            series: "Valor Total".to_owned(),
            value,
        }
    }

    #[test]
    fn start_loads_first_page() {
        let harness = demo_harness();
        let list = harness.controller.list();
        assert_eq!(list.page, 1);
        assert_eq!(list.total_pages, 3);
        assert_eq!(list.items.len(), 10);
        assert!(!list.loading);
        assert!(harness.view_data.last_refresh.is_some());
        assert_eq!(harness.runtime.list_calls.len(), 1);
    }

    #[test]
    fn page_keys_move_between_pages_and_stop_at_edges() {
        let mut harness = demo_harness();

        harness.press(KeyCode::Char('n'));
        assert_eq!(harness.controller.list().page, 2);
        harness.press(KeyCode::Right);
        assert_eq!(harness.controller.list().page, 3);
        assert_eq!(harness.controller.list().items.len(), 5);

        harness.press(KeyCode::Char('n'));
        assert_eq!(harness.controller.list().page, 3);
        assert_eq!(
            harness.controller.status_line(),
            Some("already on the last page")
        );
        assert_eq!(harness.runtime.list_calls.len(), 3);

        harness.press(KeyCode::Left);
        harness.press(KeyCode::Char('p'));
        assert_eq!(harness.controller.list().page, 1);
        harness.press(KeyCode::Char('p'));
        assert_eq!(
            harness.controller.status_line(),
            Some("already on the first page")
        );
        assert_eq!(harness.runtime.list_calls.len(), 5);
    }

    #[test]
    fn cursor_stays_within_rows_and_resets_on_page_change() {
        let mut harness = demo_harness();
        for _ in 0..12 {
            harness.press(KeyCode::Char('j'));
        }
        assert_eq!(harness.view_data.cursor, 9);
        harness.press(KeyCode::Up);
        assert_eq!(harness.view_data.cursor, 8);

        harness.press(KeyCode::Char('n'));
        assert_eq!(harness.view_data.cursor, 0);
        harness.press(KeyCode::Char('k'));
        assert_eq!(harness.view_data.cursor, 0);
    }

    #[test]
    fn search_prompt_applies_trimmed_term_from_first_page() {
        let mut harness = demo_harness();
        harness.press(KeyCode::Char('n'));

        harness.press(KeyCode::Char('/'));
        assert_eq!(harness.view_data.input_mode, InputMode::Search);
        harness.type_text(" amil ");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.view_data.input_mode, InputMode::Browse);
        let list = harness.controller.list();
        assert_eq!(list.search_term, "amil");
        assert_eq!(list.page, 1);
        assert!(!list.items.is_empty());
        assert!(
            list.items
                .iter()
                .all(|item| item.display_name().to_lowercase().contains("amil"))
        );

        let last = harness
            .runtime
            .list_calls
            .last()
            .expect("search should fetch");
        assert_eq!(last.page, 1);
        assert_eq!(last.search, "amil");
    }

    #[test]
    fn search_prompt_backspace_and_escape() {
        let mut harness = demo_harness();
        harness.press(KeyCode::Char('/'));
        harness.type_text("xyz");
        harness.press(KeyCode::Backspace);
        assert_eq!(harness.view_data.search_draft, "xy");

        harness.press(KeyCode::Esc);
        assert_eq!(harness.view_data.input_mode, InputMode::Browse);
        assert_eq!(harness.controller.list().search_term, "");
        assert_eq!(harness.runtime.list_calls.len(), 1);
    }

    #[test]
    fn enter_renders_chart_for_highlighted_record() {
        let mut harness = demo_harness();
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Enter);

        let detail = harness.controller.detail();
        let selected = detail.selected.as_ref().expect("row should be selected");
        assert_eq!(selected.display_name(), "AMIL SP");
        assert!(detail.detail.is_some());
        assert!(!detail.loading);
        assert_eq!(
            harness.controller.chart().current().map(|spec| spec.value),
            Some(280000.75)
        );
        assert_eq!(detail.chart_handle, harness.controller.chart().live_handle());
    }

    #[test]
    fn selecting_another_record_replaces_the_chart() {
        let mut harness = demo_harness();
        harness.press(KeyCode::Enter);
        let first = harness
            .controller
            .detail()
            .chart_handle
            .expect("first chart should render");
        assert_eq!(
            harness.controller.chart().current().map(|spec| spec.value),
            Some(150000.5)
        );

        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Enter);
        let second = harness
            .controller
            .detail()
            .chart_handle
            .expect("second chart should render");
        assert_ne!(first, second);
        assert_eq!(harness.controller.chart().live_handle(), Some(second));
        assert_eq!(
            harness.controller.chart().current().map(|spec| spec.value),
            Some(280000.75)
        );
    }

    #[test]
    fn escape_clears_selection_and_chart() {
        let mut harness = demo_harness();
        harness.press(KeyCode::Enter);
        assert!(harness.controller.chart().current().is_some());

        harness.press(KeyCode::Esc);
        assert!(harness.controller.detail().selected.is_none());
        assert!(harness.controller.detail().chart_handle.is_none());
        assert!(harness.controller.chart().current().is_none());
    }

    #[test]
    fn out_of_order_list_responses_keep_latest_page() {
        let mut harness = deferred_harness_with_first_page();
        harness.press(KeyCode::Char('n'));
        harness.press(KeyCode::Char('n'));
        assert_eq!(harness.runtime.lists.len(), 2);
        let second = harness.runtime.lists.remove(0);
        let third = harness.runtime.lists.remove(0);
        assert_eq!((second.page, third.page), (2, 3));

        harness.send(InternalEvent::ListFetched {
            token: third.token,
            outcome: Ok(catalog().page(3, "")),
        });
        harness.send(InternalEvent::ListFetched {
            token: second.token,
            outcome: Ok(catalog().page(2, "")),
        });

        let list = harness.controller.list();
        assert_eq!(list.page, 3);
        assert_eq!(list.items, catalog().page(3, "").items);
    }

    #[test]
    fn stale_detail_response_does_not_touch_the_chart() {
        let mut harness = deferred_harness_with_first_page();
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Enter);
        assert_eq!(harness.runtime.details.len(), 2);
        let first = harness.runtime.details.remove(0);
        let second = harness.runtime.details.remove(0);

        harness.send(InternalEvent::DetailFetched {
            token: first.token,
            cnpj: first.cnpj.clone(),
            outcome: catalog().detail(&first.cnpj).ok_or_else(String::new),
        });
        assert!(harness.controller.chart().current().is_none());
        assert!(harness.controller.detail().loading);

        harness.send(InternalEvent::DetailFetched {
            token: second.token,
            cnpj: second.cnpj.clone(),
            outcome: catalog().detail(&second.cnpj).ok_or_else(String::new),
        });
        assert_eq!(
            harness.controller.chart().current().map(|spec| spec.value),
            Some(280000.75)
        );
    }

    #[test]
    fn list_failure_keeps_rows_and_reports_status() {
        let mut harness = demo_harness();
        let before = harness.controller.list().items.clone();
        harness.runtime.fail_lists = true;

        harness.press(KeyCode::Char('r'));
        assert_eq!(harness.controller.list().items, before);
        assert!(!harness.controller.list().loading);
        assert_eq!(
            harness.controller.status_line(),
            Some("load failed: server error (500): boom")
        );
    }

    #[test]
    fn failed_page_load_keeps_header_on_visible_page() {
        let mut harness = demo_harness();
        let before = harness.controller.list().items.clone();
        harness.runtime.fail_lists = true;

        harness.press(KeyCode::Char('n'));
        assert_eq!(harness.controller.list().page, 1);
        assert_eq!(harness.controller.list().items, before);
        assert!(
            header_text(harness.controller.list(), &harness.view_data).contains("page 1/3")
        );

        harness.runtime.fail_lists = false;
        harness.press(KeyCode::Char('n'));
        assert_eq!(harness.controller.list().page, 2);
    }

    #[test]
    fn detail_failure_reports_status_without_chart() {
        let mut harness = demo_harness();
        harness.runtime.catalog = DemoCatalog::default();
        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.detail_calls.len(), 1);
        assert!(harness.controller.chart().current().is_none());
        assert_eq!(
            harness.controller.status_line(),
            Some("detail failed: server error (404): Not Found")
        );
    }

    #[test]
    fn closed_channel_resolves_fetch_as_failure() {
        let mut harness = demo_harness();
        let (_replacement_tx, replacement) = mpsc::channel();
        drop(std::mem::replace(&mut harness.rx, replacement));

        harness.press(KeyCode::Char('r'));
        assert!(!harness.controller.list().loading);
        assert_eq!(
            harness.controller.status_line(),
            Some("load failed: fetch event channel closed")
        );
    }

    #[test]
    fn status_clear_ignores_superseded_tokens() {
        let mut harness = demo_harness();
        harness.press(KeyCode::Char('p'));
        let first = harness.view_data.status_token;
        harness.press(KeyCode::Char('p'));
        let second = harness.view_data.status_token;
        assert!(second > first);

        harness.send(InternalEvent::ClearStatus { token: first });
        assert!(harness.controller.status_line().is_some());

        harness.send(InternalEvent::ClearStatus { token: second });
        assert!(harness.controller.status_line().is_none());
    }

    #[test]
    fn help_overlay_swallows_next_key_and_q_quits() {
        let mut harness = demo_harness();
        assert!(!harness.press(KeyCode::Char('?')));
        assert!(harness.view_data.help_visible);

        assert!(!harness.press(KeyCode::Char('q')));
        assert!(!harness.view_data.help_visible);

        assert!(harness.press(KeyCode::Char('q')));
        assert!(harness.key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn q_in_search_prompt_is_text() {
        let mut harness = demo_harness();
        harness.press(KeyCode::Char('/'));
        assert!(!harness.press(KeyCode::Char('q')));
        assert_eq!(harness.view_data.search_draft, "q");
    }

    #[test]
    fn header_text_shows_search_page_and_refresh() {
        let list = ListState {
            page: 2,
            total_pages: 3,
            total: Some(25),
            search_term: "amil".to_owned(),
            ..ListState::default()
        };
        let mut view_data = ViewData::default();

        let text = header_text(&list, &view_data);
        assert!(text.contains("search: amil"));
        assert!(text.contains("page 2/3"));
        assert!(text.contains("25 records"));
        assert!(text.contains("refreshed never"));

        view_data.input_mode = InputMode::Search;
        view_data.search_draft = "bra".to_owned();
        assert!(header_text(&list, &view_data).contains("search: bra_"));

        let empty = header_text(&ListState::default(), &ViewData::default());
        assert!(empty.contains("search: (all)"));
        assert!(empty.contains("page 1/1"));
        assert!(empty.contains("- records"));
    }

    #[test]
    fn status_text_prefixes_status_line_before_hints() {
        let view_data = ViewData::default();
        assert!(status_text(None, &view_data).starts_with("j/k move"));
        let status = status_text(Some("load failed: boom"), &view_data);
        assert!(status.starts_with("load failed: boom | "));

        let search = ViewData {
            input_mode: InputMode::Search,
            ..ViewData::default()
        };
        assert!(status_text(None, &search).contains("enter apply"));
    }

    #[test]
    fn terminal_chart_keeps_one_live_handle() -> Result<()> {
        let mut chart = TerminalChart::new();
        let first = chart.render(&spec(4200.0))?;
        assert!(chart.render(&spec(1.0)).is_err());

        chart.destroy(PaneHandle(99));
        assert_eq!(chart.live_handle(), Some(first));

        chart.destroy(first);
        assert!(chart.current().is_none());
        let second = chart.render(&spec(10.0))?;
        assert_ne!(first, second);
        assert_eq!(chart.current().map(|spec| spec.value), Some(10.0));
        Ok(())
    }

    #[test]
    fn bar_value_rounds_and_floors_at_zero() {
        assert_eq!(bar_value(4200.4), 4200);
        assert_eq!(bar_value(4200.5), 4201);
        assert_eq!(bar_value(-10.0), 0);
        assert_eq!(bar_value(f64::NAN), 0);
        assert_eq!(bar_value(f64::INFINITY), 0);
    }

    #[test]
    fn help_overlay_lists_core_keys() {
        let help = help_overlay_text();
        assert!(help.contains("/ search"));
        assert!(help.contains("enter show details"));
        assert!(help.contains("q quit"));
    }
}

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use expense_dashboard::aggregate::{DashboardView, ExpenseFilter};
use expense_dashboard::auth::{AuthGate, AuthState, CredentialsForm, Session};
use expense_dashboard::dashboard::Dashboard;
use expense_dashboard::expense::{Category, PaymentMethod};
use expense_dashboard::export::export_month_to_path;
use expense_dashboard::money::{format_brl, format_compact};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Clear, Dataset, GraphType,
        Paragraph, Row, Table, TableState,
    },
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// How often pending auth events and remote changes are checked
const TICK: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Search,
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Email,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Date,
    Description,
    Amount,
    Category,
    Method,
    Paid,
    Recurring,
    Vendor,
    Notes,
}

impl FormField {
    const ORDER: [FormField; 9] = [
        FormField::Date,
        FormField::Description,
        FormField::Amount,
        FormField::Category,
        FormField::Method,
        FormField::Paid,
        FormField::Recurring,
        FormField::Vendor,
        FormField::Notes,
    ];

    fn index(&self) -> usize {
        Self::ORDER.iter().position(|f| f == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Self::ORDER[(self.index() + 1) % Self::ORDER.len()]
    }

    pub fn previous(&self) -> Self {
        Self::ORDER[(self.index() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    pub fn label(&self) -> &str {
        match self {
            FormField::Date => "Date",
            FormField::Description => "Description",
            FormField::Amount => "Amount (R$)",
            FormField::Category => "Category",
            FormField::Method => "Payment method",
            FormField::Paid => "Paid",
            FormField::Recurring => "Recurring",
            FormField::Vendor => "Vendor",
            FormField::Notes => "Notes",
        }
    }

    fn is_text(&self) -> bool {
        matches!(
            self,
            FormField::Date
                | FormField::Description
                | FormField::Amount
                | FormField::Vendor
                | FormField::Notes
        )
    }
}

pub struct App {
    pub dashboard: Dashboard,
    gate: Option<AuthGate>,
    pub credentials: CredentialsForm,
    pub login_field: LoginField,
    pub login_notice: Option<String>,
    active_session: Option<Session>,
    pub state: TableState,
    pub mode: Mode,
    pub form_field: FormField,
    export_dir: Option<PathBuf>,
}

impl App {
    pub fn new(dashboard: Dashboard) -> Self {
        Self {
            dashboard,
            gate: None,
            credentials: CredentialsForm::default(),
            login_field: LoginField::Email,
            login_notice: None,
            active_session: None,
            state: TableState::default(),
            mode: Mode::Normal,
            form_field: FormField::Date,
            export_dir: None,
        }
    }

    /// Put the dashboard behind a login screen (remote variant)
    pub fn with_gate(mut self, gate: AuthGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_export_dir(mut self, dir: PathBuf) -> Self {
        self.export_dir = Some(dir);
        self
    }

    /// Initial session lookup and first fetch
    pub fn start(&mut self) {
        if let Some(gate) = self.gate.as_mut() {
            gate.start();
            self.sync_session();
        } else if let Err(err) = self.dashboard.load() {
            tracing::warn!(error = %err, "initial load failed");
        }
        self.reset_selection();
    }

    pub fn needs_login(&self) -> bool {
        match &self.gate {
            Some(gate) => !matches!(gate.state(), AuthState::Authenticated(_)),
            None => false,
        }
    }

    fn auth_state(&self) -> Option<AuthState> {
        self.gate.as_ref().map(AuthGate::state)
    }

    /// Hand a changed session to the dashboard and re-fetch
    fn sync_session(&mut self) {
        let current = self.gate.as_ref().and_then(|g| g.session().cloned());
        if current == self.active_session {
            return;
        }
        tracing::info!(signed_in = current.is_some(), "session changed");
        self.active_session = current.clone();
        if let Err(err) = self.dashboard.set_session(current) {
            tracing::warn!(error = %err, "reload after session change failed");
        }
        self.reset_selection();
    }

    /// Periodic work between key presses
    pub fn tick(&mut self) {
        if let Some(gate) = self.gate.as_mut() {
            if gate.poll() {
                self.sync_session();
            }
        }
        match self.dashboard.sync() {
            Ok(true) => self.clamp_selection(),
            Ok(false) => {}
            Err(err) => tracing::warn!(error = %err, "change polling failed"),
        }
    }

    pub fn view(&self) -> DashboardView {
        self.dashboard.view()
    }

    // ========================================================================
    // SELECTION
    // ========================================================================

    fn row_count(&self) -> usize {
        self.view().rows.len()
    }

    fn reset_selection(&mut self) {
        if self.row_count() > 0 {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.row_count();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None => self.state.select(Some(0)),
            Some(_) => {}
        }
    }

    pub fn selected_id(&self) -> Option<String> {
        let view = self.view();
        self.state
            .selected()
            .and_then(|i| view.rows.get(i))
            .map(|e| e.id.clone())
    }

    pub fn next(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 10).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(10));
        self.state.select(Some(i));
    }

    // ========================================================================
    // MONTHS AND FILTERS
    // ========================================================================

    /// `older` moves back in time; the month list is newest first
    pub fn step_month(&mut self, older: bool) {
        let months = self.dashboard.months();
        let Some(i) = months.iter().position(|m| *m == self.dashboard.month()) else {
            return;
        };
        let target = if older {
            months.get(i + 1)
        } else {
            i.checked_sub(1).and_then(|j| months.get(j))
        };
        if let Some(month) = target.copied() {
            self.dashboard.select_month(month);
            self.reset_selection();
        }
    }

    fn update_filter(&mut self, change: impl FnOnce(&mut ExpenseFilter)) {
        change(&mut self.dashboard.filter);
        self.reset_selection();
    }

    fn toggle_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            // Failures roll back inside the dashboard and leave a notice
            let _ = self.dashboard.toggle_paid(&id);
        }
    }

    fn remove_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            let _ = self.dashboard.remove(&id);
            self.clamp_selection();
        }
    }

    fn export_month(&mut self) {
        let Some(dir) = self.export_dir.clone() else {
            self.dashboard.set_notice("Export directory is not configured");
            return;
        };
        let month = self.dashboard.month();
        let path = dir.join(format!("expenses-{}.csv", month));
        match export_month_to_path(&path, self.dashboard.expenses(), month) {
            Ok(count) => self
                .dashboard
                .set_notice(format!("Exported {} rows to {}", count, path.display())),
            Err(err) => {
                tracing::error!(error = %err, "export failed");
                self.dashboard.set_notice(format!("Export failed: {}", err));
            }
        }
    }

    fn sign_out(&mut self) {
        if let Some(gate) = self.gate.as_mut() {
            if let Err(err) = gate.sign_out() {
                self.dashboard.set_notice(err.to_string());
            }
        }
        self.sync_session();
    }

    // ========================================================================
    // KEYS
    // ========================================================================

    /// Returns true when the app should quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.needs_login() {
            return self.handle_login_key(key);
        }
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Search => {
                self.handle_search_key(key);
                false
            }
            Mode::Create => {
                self.handle_form_key(key);
                false
            }
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.login_field = match self.login_field {
                    LoginField::Email => LoginField::Password,
                    LoginField::Password => LoginField::Email,
                };
            }
            KeyCode::F(2) => {
                self.credentials.toggle_mode();
                self.login_notice = None;
            }
            KeyCode::Enter => self.submit_credentials(),
            KeyCode::Backspace => {
                self.login_input().pop();
            }
            KeyCode::Char(c) => self.login_input().push(c),
            _ => {}
        }
        false
    }

    fn login_input(&mut self) -> &mut String {
        match self.login_field {
            LoginField::Email => &mut self.credentials.email,
            LoginField::Password => &mut self.credentials.password,
        }
    }

    fn submit_credentials(&mut self) {
        if !self.credentials.can_submit() {
            self.login_notice =
                Some("Enter an email and a password of at least 6 characters.".to_string());
            return;
        }
        let Some(gate) = self.gate.as_mut() else {
            return;
        };
        match gate.submit(&mut self.credentials) {
            Ok(notice) => {
                self.login_notice = notice;
                self.login_field = LoginField::Email;
            }
            Err(err) => self.login_notice = Some(err.to_string()),
        }
        self.sync_session();
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::PageUp => self.page_up(),
            KeyCode::Left | KeyCode::Char('h') => self.step_month(true),
            KeyCode::Right | KeyCode::Char('l') => self.step_month(false),
            KeyCode::Char(' ') | KeyCode::Char('p') => self.toggle_selected(),
            KeyCode::Char('d') | KeyCode::Delete => self.remove_selected(),
            KeyCode::Char('n') => {
                self.dashboard.clear_notice();
                self.form_field = FormField::Date;
                self.mode = Mode::Create;
            }
            KeyCode::Char('/') => self.mode = Mode::Search,
            KeyCode::Char('c') => {
                self.update_filter(|f| f.category = f.category.cycle(&Category::ALL))
            }
            KeyCode::Char('m') => self.update_filter(|f| {
                f.payment_method = f.payment_method.cycle(&PaymentMethod::ALL)
            }),
            KeyCode::Char('s') => self.update_filter(|f| f.status = f.status.next()),
            KeyCode::Char('x') => self.update_filter(|f| *f = ExpenseFilter::default()),
            KeyCode::Char('r') => {
                let _ = self.dashboard.load();
                self.clamp_selection();
            }
            KeyCode::Char('e') => self.export_month(),
            KeyCode::Char('o') if self.gate.is_some() => self.sign_out(),
            _ => {}
        }
        false
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Backspace => self.update_filter(|f| {
                f.query.pop();
            }),
            KeyCode::Char(c) => self.update_filter(|f| f.query.push(c)),
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let field = self.form_field;
        let form = &mut self.dashboard.form;
        match key.code {
            KeyCode::Esc => {
                self.dashboard.clear_notice();
                self.mode = Mode::Normal;
            }
            KeyCode::Tab | KeyCode::Down => self.form_field = field.next(),
            KeyCode::BackTab | KeyCode::Up => self.form_field = field.previous(),
            KeyCode::Enter => {
                if self.dashboard.add_expense().is_ok() {
                    self.mode = Mode::Normal;
                    self.reset_selection();
                }
            }
            KeyCode::Left | KeyCode::Right => {
                let forward = key.code == KeyCode::Right;
                match field {
                    FormField::Category => form.category = step(&Category::ALL, form.category, forward),
                    FormField::Method => {
                        form.payment_method = step(&PaymentMethod::ALL, form.payment_method, forward)
                    }
                    FormField::Paid => form.paid = !form.paid,
                    FormField::Recurring => form.recurring = !form.recurring,
                    _ => {}
                }
            }
            KeyCode::Char(' ') if field == FormField::Paid => form.paid = !form.paid,
            KeyCode::Char(' ') if field == FormField::Recurring => form.recurring = !form.recurring,
            KeyCode::Backspace => {
                if let Some(input) = form_input(&mut self.dashboard.form, field) {
                    input.pop();
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(input) = form_input(&mut self.dashboard.form, field) {
                    input.push(c);
                }
            }
            _ => {}
        }
    }
}

fn form_input(
    form: &mut expense_dashboard::expense::ExpenseForm,
    field: FormField,
) -> Option<&mut String> {
    match field {
        FormField::Date => Some(&mut form.date),
        FormField::Description => Some(&mut form.description),
        FormField::Amount => Some(&mut form.amount),
        FormField::Vendor => Some(&mut form.vendor),
        FormField::Notes => Some(&mut form.notes),
        _ => None,
    }
}

/// Neighbour of `current` in `values`, wrapping at both ends
fn step<T: Copy + PartialEq>(values: &[T], current: T, forward: bool) -> T {
    let len = values.len();
    let i = values.iter().position(|v| *v == current).unwrap_or(0);
    let j = if forward { (i + 1) % len } else { (i + len - 1) % len };
    values[j]
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if !event::poll(TICK)? {
            app.tick();
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    if app.needs_login() {
        render_login(f, f.size(), app);
        return;
    }

    let view = app.view();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Header with months
            Constraint::Length(4),  // KPI cards
            Constraint::Length(12), // Charts
            Constraint::Length(3),  // Filter bar
            Constraint::Min(5),     // Expense table
            Constraint::Length(3),  // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app, &view);
    render_kpis(f, chunks[1], &view);

    let chart_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[2]);
    render_category_chart(f, chart_chunks[0], &view);
    render_trend_chart(f, chart_chunks[1], &view);

    render_filter_bar(f, chunks[3], app);
    render_table(f, chunks[4], app, &view);
    render_status_bar(f, chunks[5], app);

    if app.mode == Mode::Create {
        render_form_dialog(f, f.size(), app);
    }
}

fn render_login(f: &mut Frame, area: Rect, app: &App) {
    let area = centered_rect(60, 50, area);
    let field_style = |field: LoginField| {
        if app.login_field == field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let mut content = vec![Line::from("")];
    if app.auth_state() == Some(AuthState::Loading) {
        content.push(Line::from("  Checking session..."));
    } else {
        content.push(Line::from(vec![
            Span::styled("  Email:    ", field_style(LoginField::Email)),
            Span::raw(app.credentials.email.clone()),
        ]));
        content.push(Line::from(vec![
            Span::styled("  Password: ", field_style(LoginField::Password)),
            Span::raw("*".repeat(app.credentials.password.chars().count())),
        ]));
        content.push(Line::from(""));
        if let Some(notice) = &app.login_notice {
            content.push(Line::from(Span::styled(
                format!("  {}", notice),
                Style::default().fg(Color::Green),
            )));
            content.push(Line::from(""));
        }
        content.push(Line::from(vec![
            Span::styled("  Enter", Style::default().fg(Color::Yellow)),
            Span::raw(" Submit | "),
            Span::styled("Tab", Style::default().fg(Color::Yellow)),
            Span::raw(" Field | "),
            Span::styled("F2", Style::default().fg(Color::Yellow)),
            Span::raw(" Sign in / Create account | "),
            Span::styled("Esc", Style::default().fg(Color::Red)),
            Span::raw(" Quit"),
        ]));
    }

    let login = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" Expense Dashboard: {} ", app.credentials.mode.title())),
    );
    f.render_widget(login, area);
}

fn render_header(f: &mut Frame, area: Rect, app: &App, view: &DashboardView) {
    let mut spans = vec![
        Span::styled(
            "Expense Dashboard",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
    ];

    // Up to two months on each side of the selection, oldest on the left
    let selected = view.months.iter().position(|m| *m == view.month).unwrap_or(0);
    let newest = selected.saturating_sub(2);
    let oldest = (selected + 2).min(view.months.len().saturating_sub(1));
    spans.push(Span::styled("◀ ", Style::default().fg(Color::DarkGray)));
    for (n, i) in (newest..=oldest).rev().enumerate() {
        let Some(month) = view.months.get(i) else {
            continue;
        };
        if n > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if i == selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(month.to_string(), style));
    }
    spans.push(Span::styled(" ▶", Style::default().fg(Color::DarkGray)));

    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        app.dashboard.backend_label(),
        Style::default().fg(Color::White),
    ));
    if let Some(session) = &app.active_session {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(session.email.clone(), Style::default().fg(Color::Green)));
    }

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));
    f.render_widget(header, area);
}

fn render_kpis(f: &mut Frame, area: Rect, view: &DashboardView) {
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25); 4])
        .split(area);

    let pending_color = if view.kpis.pending_total > 0 {
        Color::Red
    } else {
        Color::Green
    };
    let kpis = [
        (" Month total ", view.kpis.total, Color::White),
        (" Recurring ", view.kpis.recurring_total, Color::Cyan),
        (" Pending ", view.kpis.pending_total, pending_color),
        (" 6-month average ", view.kpis.average_6m, Color::Magenta),
    ];

    for ((title, value, color), card) in kpis.into_iter().zip(cards.iter()) {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            format_brl(value),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title),
        );
        f.render_widget(paragraph, *card);
    }
}

fn render_category_chart(f: &mut Frame, area: Rect, view: &DashboardView) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(" By category ");

    if view.by_category.is_empty() {
        let empty = Paragraph::new("No expenses this month")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let bars: Vec<Bar> = view
        .by_category
        .iter()
        .map(|c| {
            Bar::default()
                .label(Line::from(c.category.label()))
                .value(c.total.max(0) as u64)
                .text_value(format_brl(c.total))
                .style(Style::default().fg(Color::Cyan))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, area);
}

fn render_trend_chart(f: &mut Frame, area: Rect, view: &DashboardView) {
    let points: Vec<(f64, f64)> = view
        .trend
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, p.total as f64 / 100.0))
        .collect();
    let max = points.iter().map(|(_, y)| *y).fold(0.0_f64, f64::max).max(1.0);
    let peak = view.trend.iter().map(|p| p.total).max().unwrap_or(0);

    let first = view.trend.first().map(|p| p.month.to_string()).unwrap_or_default();
    let last = view.trend.last().map(|p| p.month.to_string()).unwrap_or_default();

    let dataset = Dataset::default()
        .name("Monthly total")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Yellow))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Last 12 months "),
        )
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, points.len().saturating_sub(1).max(1) as f64])
                .labels(vec![Span::raw(first), Span::raw(last)]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, max])
                .labels(vec![Span::raw("0"), Span::raw(format_compact(peak))]),
        );
    f.render_widget(chart, area);
}

fn render_filter_bar(f: &mut Frame, area: Rect, app: &App) {
    let filter = &app.dashboard.filter;
    let key = Style::default().fg(Color::Yellow);
    let value = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);

    let query_style = if app.mode == Mode::Search {
        Style::default().fg(Color::Black).bg(Color::Yellow)
    } else {
        value
    };
    let query = if filter.query.is_empty() && app.mode != Mode::Search {
        "(none)".to_string()
    } else {
        filter.query.clone()
    };

    let category = match filter.category {
        expense_dashboard::aggregate::Choice::All => "All".to_string(),
        expense_dashboard::aggregate::Choice::Only(c) => c.label().to_string(),
    };
    let method = match filter.payment_method {
        expense_dashboard::aggregate::Choice::All => "All".to_string(),
        expense_dashboard::aggregate::Choice::Only(m) => m.label().to_string(),
    };

    let mut spans = vec![
        Span::styled(" /", key),
        Span::raw(" Search: "),
        Span::styled(query, query_style),
        Span::raw(" | "),
        Span::styled("c", key),
        Span::raw(" Category: "),
        Span::styled(category, value),
        Span::raw(" | "),
        Span::styled("m", key),
        Span::raw(" Method: "),
        Span::styled(method, value),
        Span::raw(" | "),
        Span::styled("s", key),
        Span::raw(" Status: "),
        Span::styled(filter.status.label(), value),
    ];
    if filter.is_active() {
        spans.push(Span::raw(" ("));
        spans.push(Span::styled("x", key));
        spans.push(Span::raw(" clear)"));
    }

    let bar = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(bar, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App, view: &DashboardView) {
    let header_cells = ["Date", "Description", "Category", "Method", "Amount", "Status", "Vendor"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = view.rows.iter().map(|e| {
        let (status, color) = if e.paid {
            ("Paid", Color::Green)
        } else {
            ("Pending", Color::Red)
        };
        let description = if e.is_recurring() {
            format!("{} ↻", truncate(&e.description, 34))
        } else {
            truncate(&e.description, 36)
        };

        let cells = vec![
            Cell::from(e.date.format("%d/%m/%Y").to_string()),
            Cell::from(description),
            Cell::from(e.category.label()),
            Cell::from(e.payment_method.label()),
            Cell::from(format_brl(e.amount_cents)),
            Cell::from(status).style(Style::default().fg(color)),
            Cell::from(truncate(e.vendor.as_deref().unwrap_or(""), 20)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(38),
            Constraint::Length(18),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(9),
            Constraint::Length(22),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(
                " Expenses {} ({} of {}) ",
                view.month,
                view.rows.len(),
                view.month_count
            )),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let key = Style::default().fg(Color::Yellow);

    let status_spans = if let Some(notice) = app.dashboard.notice() {
        vec![Span::styled(
            format!(" {}", notice),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )]
    } else {
        let mut spans = vec![
            Span::styled(" ←/→", key),
            Span::raw(" Month | "),
            Span::styled("↑/↓", key),
            Span::raw(" Nav | "),
            Span::styled("Space", key),
            Span::raw(" Paid | "),
            Span::styled("d", key),
            Span::raw(" Delete | "),
            Span::styled("n", key),
            Span::raw(" New | "),
            Span::styled("e", key),
            Span::raw(" Export | "),
            Span::styled("r", key),
            Span::raw(" Reload | "),
        ];
        if app.gate.is_some() {
            spans.push(Span::styled("o", key));
            spans.push(Span::raw(" Sign out | "));
        }
        spans.push(Span::styled("q", Style::default().fg(Color::Red)));
        spans.push(Span::raw(" Quit"));
        spans
    };

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(status_bar, area);
}

fn render_form_dialog(f: &mut Frame, area: Rect, app: &App) {
    let area = centered_rect(60, 70, area);
    let form = &app.dashboard.form;

    let mut content = vec![Line::from("")];
    for field in FormField::ORDER {
        let value = match field {
            FormField::Date => form.date.clone(),
            FormField::Description => form.description.clone(),
            FormField::Amount => form.amount.clone(),
            FormField::Category => format!("◀ {} ▶", form.category.label()),
            FormField::Method => format!("◀ {} ▶", form.payment_method.label()),
            FormField::Paid => checkbox(form.paid),
            FormField::Recurring => checkbox(form.recurring),
            FormField::Vendor => form.vendor.clone(),
            FormField::Notes => form.notes.clone(),
        };
        let focused = field == app.form_field;
        let label_style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        let cursor = if focused && field.is_text() { "_" } else { "" };
        content.push(Line::from(vec![
            Span::raw(if focused { " → " } else { "   " }),
            Span::styled(format!("{:<16}", field.label()), label_style),
            Span::raw(format!("{}{}", value, cursor)),
        ]));
    }

    content.push(Line::from(""));
    if let Some(notice) = app.dashboard.notice() {
        content.push(Line::from(Span::styled(
            format!("   {}", notice),
            Style::default().fg(Color::Red),
        )));
        content.push(Line::from(""));
    }
    content.push(Line::from(vec![
        Span::styled("   Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Next | "),
        Span::styled("←/→", Style::default().fg(Color::Yellow)),
        Span::raw(" Change | "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Save | "),
        Span::styled("Esc", Style::default().fg(Color::Red)),
        Span::raw(" Cancel"),
    ]));

    let dialog = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" New expense "),
    );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn checkbox(checked: bool) -> String {
    if checked { "[x]" } else { "[ ]" }.to_string()
}

/// Rect of `percent_x` by `percent_y` centred in `area`
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
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
        .split(vertical[1])[1]
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

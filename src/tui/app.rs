//! Main application logic for the terminal user interface.
//!
//! This module contains the `App` struct which manages the TUI state,
//! handles user input, renders the interface, and coordinates between the
//! boards (task list, risk list) and the suggestion review modal.

use std::io;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{self, Event, KeyCode};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use tracing::error;

use crate::client::TaskService;
use crate::task::{format_due_relative, truncate, Risk, Task};
use crate::tui::{
    colors::{DARK_GREEN, DARK_RED, GOLD},
    enums::AppState,
    utils::centered_rect,
};
use crate::workflow::{AssignmentWorkflow, NoticeKind};

/// A blocking service call deferred until after the next draw.
///
/// Key handlers queue one of these instead of calling the service directly,
/// so the "Contacting service..." status line is on screen while the
/// request runs.
enum PendingCall {
    RefreshTasks,
    RefreshRisks,
    Suggest,
    ConfirmOne(String),
    AssignAll,
}

/// Main application state for the terminal user interface.
///
/// Holds the fetched task and risk lists, the multi-select state, the
/// assignment workflow, and the filter/status plumbing shared by all boards.
pub struct App<'a> {
    state: AppState,
    service: &'a dyn TaskService,
    workflow: AssignmentWorkflow,

    tasks: Vec<Task>,
    filtered_tasks: Vec<u64>,
    selection: Vec<u64>,
    task_table_state: TableState,

    risks: Vec<Risk>,
    risks_loaded: bool,
    risk_sort_desc: bool,
    risk_table_state: TableState,

    review_table_state: TableState,

    filter_text: String,
    filter_active: bool,
    status_message: String,
    pending_call: Option<PendingCall>,
}

impl<'a> App<'a> {
    /// Create a new App instance and issue the one-time unassigned-task
    /// fetch. A failed fetch leaves the list empty; `r` refetches.
    pub fn new(service: &'a dyn TaskService) -> Self {
        let mut app = App {
            state: AppState::TaskBoard,
            service,
            workflow: AssignmentWorkflow::new(),
            tasks: Vec::new(),
            filtered_tasks: Vec::new(),
            selection: Vec::new(),
            task_table_state: TableState::default(),
            risks: Vec::new(),
            risks_loaded: false,
            risk_sort_desc: true,
            risk_table_state: TableState::default(),
            review_table_state: TableState::default(),
            filter_text: String::new(),
            filter_active: false,
            status_message: String::new(),
            pending_call: None,
        };
        app.refresh_tasks();
        app
    }

    /// Refetch the unassigned-task list.
    ///
    /// A successful fetch replaces the list and invalidates the selection;
    /// a failed one leaves both exactly as they were, so a transient error
    /// never wipes loaded state.
    fn refresh_tasks(&mut self) {
        match self.service.fetch_unassigned_tasks() {
            Ok(tasks) => {
                self.tasks = tasks;
                self.selection.clear();
                self.update_filtered_tasks();
                self.set_status_message(format!("Loaded {} unassigned task(s)", self.tasks.len()));
            }
            Err(e) => {
                error!("failed to fetch unassigned tasks: {e}");
                self.set_status_message("Error fetching tasks".to_string());
            }
        }
    }

    /// Fetch risk items for the risk board.
    fn refresh_risks(&mut self) {
        match self.service.fetch_risk_items() {
            Ok(mut risks) => {
                sort_risks(&mut risks, self.risk_sort_desc);
                self.risks = risks;
                self.risks_loaded = true;
                self.set_status_message(format!("Loaded {} risk item(s)", self.risks.len()));
            }
            Err(e) => {
                error!("failed to fetch risk items: {e}");
                self.set_status_message("Error fetching risks".to_string());
            }
        }
        self.risk_table_state
            .select(if self.risks.is_empty() { None } else { Some(0) });
    }

    /// Update the filtered task list from the free-text filter, preserving
    /// the highlighted row when possible.
    fn update_filtered_tasks(&mut self) {
        let old_selected_id = self
            .task_table_state
            .selected()
            .and_then(|idx| self.filtered_tasks.get(idx))
            .copied();

        let needle = self.filter_text.to_lowercase();
        self.filtered_tasks = self
            .tasks
            .iter()
            .filter(|t| {
                needle.is_empty()
                    || t.title.to_lowercase().contains(&needle)
                    || t.work_item_type.to_lowercase().contains(&needle)
            })
            .map(|t| t.id)
            .collect();

        if let Some(old_id) = old_selected_id {
            if let Some(new_idx) = self.filtered_tasks.iter().position(|&id| id == old_id) {
                self.task_table_state.select(Some(new_idx));
                return;
            }
        }
        self.task_table_state
            .select(if self.filtered_tasks.is_empty() { None } else { Some(0) });
    }

    fn get_task(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn highlighted_task_id(&self) -> Option<u64> {
        self.task_table_state
            .selected()
            .and_then(|idx| self.filtered_tasks.get(idx))
            .copied()
    }

    /// Toggle selection of the highlighted row, preserving insertion order.
    fn toggle_selected(&mut self) {
        if let Some(id) = self.highlighted_task_id() {
            if let Some(pos) = self.selection.iter().position(|&s| s == id) {
                self.selection.remove(pos);
            } else {
                self.selection.push(id);
            }
        }
    }

    /// Select all visible rows, or clear them if all are already selected.
    fn toggle_select_all_visible(&mut self) {
        let all_selected = !self.filtered_tasks.is_empty()
            && self
                .filtered_tasks
                .iter()
                .all(|id| self.selection.contains(id));
        if all_selected {
            self.selection.retain(|id| !self.filtered_tasks.contains(id));
        } else {
            for &id in &self.filtered_tasks {
                if !self.selection.contains(&id) {
                    self.selection.push(id);
                }
            }
        }
    }

    /// Ask the service for assignment suggestions for the selection.
    fn request_suggestions(&mut self) {
        if self.workflow.request_suggestions(self.service, &self.selection) {
            self.state = AppState::Review;
            self.review_table_state.select(Some(0));
        }
        self.consume_notices();
    }

    fn highlighted_review_task_id(&self) -> Option<String> {
        self.review_table_state
            .selected()
            .and_then(|idx| self.workflow.review_list().get(idx))
            .map(|e| e.task_id.clone())
    }

    /// Confirm one suggestion; prune the task locally when the server
    /// accepted the assignment.
    fn review_confirm(&mut self, task_id: &str) {
        self.workflow.confirm(self.service, task_id);
        let removed = !self
            .workflow
            .review_list()
            .iter()
            .any(|e| e.task_id == task_id);
        if removed {
            self.prune_task(task_id);
        }
        self.after_review_change();
    }

    /// Dismiss the highlighted suggestion locally.
    fn review_dismiss(&mut self) {
        if let Some(task_id) = self.highlighted_review_task_id() {
            self.workflow.dismiss(&task_id);
            self.after_review_change();
        }
    }

    /// Bulk-assign every remaining suggestion that carries an email.
    fn review_assign_all(&mut self) {
        let candidates: Vec<String> = self
            .workflow
            .review_list()
            .iter()
            .filter(|e| e.assignable())
            .map(|e| e.task_id.clone())
            .collect();
        self.workflow.assign_all(self.service);
        if self.workflow.review_list().is_empty() {
            for task_id in &candidates {
                self.prune_task(task_id);
            }
        }
        self.after_review_change();
    }

    /// Remove an assigned task from the local list and selection.
    fn prune_task(&mut self, task_id: &str) {
        if let Ok(id) = task_id.parse::<u64>() {
            self.tasks.retain(|t| t.id != id);
            self.selection.retain(|&s| s != id);
            self.update_filtered_tasks();
        }
    }

    /// Clamp the review highlight and fall back to the task board when the
    /// workflow has left the reviewing state.
    fn after_review_change(&mut self) {
        let len = self.workflow.review_list().len();
        match self.review_table_state.selected() {
            Some(idx) if len > 0 && idx >= len => {
                self.review_table_state.select(Some(len - 1));
            }
            _ if len == 0 => self.review_table_state.select(None),
            _ => {}
        }
        if !self.workflow.is_reviewing() {
            self.state = AppState::TaskBoard;
        }
        self.consume_notices();
    }

    /// Move workflow notices into the status bar (latest wins; detail is
    /// already in the tracing log).
    fn consume_notices(&mut self) {
        for notice in self.workflow.drain_notices() {
            self.status_message = match notice.kind {
                NoticeKind::Success => notice.message,
                NoticeKind::Warning => format!("Warning: {}", notice.message),
                NoticeKind::Error => format!("Error: {}", notice.message),
            };
        }
    }

    fn set_status_message(&mut self, msg: String) {
        self.status_message = msg;
    }

    /// Defer a blocking service call until after the next draw, so the
    /// frame announcing it reaches the screen first.
    fn queue_call(&mut self, call: PendingCall) {
        self.set_status_message("Contacting service...".to_string());
        self.pending_call = Some(call);
    }

    /// Execute the deferred call, if any.
    fn run_pending(&mut self) {
        match self.pending_call.take() {
            Some(PendingCall::RefreshTasks) => self.refresh_tasks(),
            Some(PendingCall::RefreshRisks) => self.refresh_risks(),
            Some(PendingCall::Suggest) => self.request_suggestions(),
            Some(PendingCall::ConfirmOne(task_id)) => self.review_confirm(&task_id),
            Some(PendingCall::AssignAll) => self.review_assign_all(),
            None => {}
        }
    }

    fn accent_color(&self) -> Color {
        match self.state {
            AppState::TaskBoard | AppState::Help => GOLD,
            AppState::RiskBoard => DARK_RED,
            AppState::Review => DARK_GREEN,
        }
    }

    fn move_table(state: &mut TableState, len: usize, down: bool) {
        if len == 0 {
            state.select(None);
            return;
        }
        let idx = state.selected().unwrap_or(0);
        let next = if down {
            (idx + 1).min(len - 1)
        } else {
            idx.saturating_sub(1)
        };
        state.select(Some(next));
    }

    /// Handle keyboard input while the free-text filter is being edited.
    fn handle_filter_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => {
                self.filter_active = false;
                self.filter_text.clear();
                self.update_filtered_tasks();
            }
            KeyCode::Enter => {
                self.filter_active = false;
                self.set_status_message(format!(
                    "Filter: '{}' ({} tasks shown)",
                    self.filter_text,
                    self.filtered_tasks.len()
                ));
            }
            KeyCode::Backspace => {
                self.filter_text.pop();
                self.update_filtered_tasks();
            }
            KeyCode::Char(c) => {
                self.filter_text.push(c);
                self.update_filtered_tasks();
            }
            _ => {}
        }
    }

    /// Handle keyboard input on the task board.
    ///
    /// Returns true if the application should quit.
    fn handle_task_board_input(&mut self, key: KeyCode) -> bool {
        if self.filter_active {
            self.handle_filter_input(key);
            return false;
        }
        match key {
            KeyCode::Char('q') => return true,
            KeyCode::Up | KeyCode::Char('k') => {
                Self::move_table(&mut self.task_table_state, self.filtered_tasks.len(), false);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                Self::move_table(&mut self.task_table_state, self.filtered_tasks.len(), true);
            }
            KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::Char('a') => self.toggle_select_all_visible(),
            KeyCode::Char('g') | KeyCode::Enter => self.queue_call(PendingCall::Suggest),
            KeyCode::Char('r') => self.queue_call(PendingCall::RefreshTasks),
            KeyCode::Char('v') => {
                self.state = AppState::RiskBoard;
                if !self.risks_loaded {
                    self.queue_call(PendingCall::RefreshRisks);
                }
            }
            KeyCode::Char('/') => {
                self.filter_active = true;
                self.filter_text.clear();
                self.update_filtered_tasks();
            }
            KeyCode::Char('h') => self.state = AppState::Help,
            _ => {}
        }
        false
    }

    /// Handle keyboard input on the risk board.
    fn handle_risk_board_input(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Char('q') => return true,
            KeyCode::Up | KeyCode::Char('k') => {
                Self::move_table(&mut self.risk_table_state, self.risks.len(), false);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                Self::move_table(&mut self.risk_table_state, self.risks.len(), true);
            }
            KeyCode::Char('s') => {
                self.risk_sort_desc = !self.risk_sort_desc;
                sort_risks(&mut self.risks, self.risk_sort_desc);
            }
            KeyCode::Char('r') => self.queue_call(PendingCall::RefreshRisks),
            KeyCode::Char('v') | KeyCode::Esc => self.state = AppState::TaskBoard,
            KeyCode::Char('h') => self.state = AppState::Help,
            _ => {}
        }
        false
    }

    /// Handle keyboard input in the suggestion review modal.
    fn handle_review_input(&mut self, key: KeyCode) -> bool {
        let len = self.workflow.review_list().len();
        match key {
            KeyCode::Up | KeyCode::Char('k') => {
                Self::move_table(&mut self.review_table_state, len, false);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                Self::move_table(&mut self.review_table_state, len, true);
            }
            KeyCode::Char('c') | KeyCode::Enter => {
                if let Some(task_id) = self.highlighted_review_task_id() {
                    self.queue_call(PendingCall::ConfirmOne(task_id));
                }
            }
            KeyCode::Char('x') => self.review_dismiss(),
            KeyCode::Char('A') => self.queue_call(PendingCall::AssignAll),
            KeyCode::Esc => {
                // Close without mutating server state; undecided entries
                // are discarded locally.
                self.workflow.close();
                self.state = AppState::TaskBoard;
            }
            _ => {}
        }
        false
    }

    fn handle_help_input(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Char('q') => return true,
            KeyCode::Esc | KeyCode::Char('h') => self.state = AppState::TaskBoard,
            _ => {}
        }
        false
    }

    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                let should_quit = match self.state {
                    AppState::TaskBoard => self.handle_task_board_input(key.code),
                    AppState::RiskBoard => self.handle_risk_board_input(key.code),
                    AppState::Review => self.handle_review_input(key.code),
                    AppState::Help => self.handle_help_input(key.code),
                };
                if should_quit {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Render the unassigned-task board.
    fn render_task_board(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let header_text = vec![Line::from(vec![
            Span::styled(
                "WORK-ITEM DASHBOARD",
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                format!("Unassigned Tasks  ({} selected)", self.selection.len()),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::ITALIC),
            ),
        ])];
        let header_block = Paragraph::new(header_text)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(header_block, chunks[0]);

        let header_cells = ["Sel", "ID", "Type", "State", "Title"].iter().map(|h| {
            Cell::from(*h).style(Style::default().add_modifier(Modifier::BOLD))
        });
        let header = Row::new(header_cells)
            .style(Style::default().bg(GOLD).fg(Color::Rgb(20, 20, 20)))
            .height(1);

        let rows: Vec<Row> = self
            .filtered_tasks
            .iter()
            .filter_map(|&id| self.get_task(id))
            .map(|task| {
                let selected = self.selection.contains(&task.id);
                let marker = if selected { "[x]" } else { "[ ]" };
                let style = if selected {
                    Style::default().fg(GOLD).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                Row::new(vec![
                    Cell::from(marker),
                    Cell::from(task.id.to_string()),
                    Cell::from(truncate(&task.work_item_type, 14)),
                    Cell::from(truncate(&task.state, 12)),
                    Cell::from(task.title.clone()),
                ])
                .style(style)
            })
            .collect();

        let widths = [
            Constraint::Length(4),  // Sel
            Constraint::Length(7),  // ID
            Constraint::Length(14), // Type
            Constraint::Length(12), // State
            Constraint::Min(25),    // Title
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(format!(
                "Tasks ({}/{}) - Press 'h' for help",
                self.filtered_tasks.len(),
                self.tasks.len()
            )))
            .row_highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, chunks[1], &mut self.task_table_state);
    }

    /// Render the risk board.
    fn render_risk_board(&mut self, f: &mut Frame, area: Rect) {
        let today = Local::now().date_naive();

        let header_cells = ["ID", "State", "Assigned To", "Due", "Score", "Title"]
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().add_modifier(Modifier::BOLD)));
        let header = Row::new(header_cells)
            .style(Style::default().bg(DARK_RED).fg(Color::White))
            .height(1);

        let rows: Vec<Row> = self
            .risks
            .iter()
            .map(|risk| {
                let overdue = risk.due_date.map_or(false, |d| d < today);
                let style = if overdue {
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                let assigned = if risk.assigned_to.is_empty() {
                    "-".to_string()
                } else {
                    truncate(&risk.assigned_to, 24)
                };
                Row::new(vec![
                    Cell::from(risk.id.to_string()),
                    Cell::from(truncate(&risk.state, 10)),
                    Cell::from(assigned),
                    Cell::from(format_due_relative(risk.due_date, today)),
                    Cell::from(format!("{:.1}", risk.priority_score)),
                    Cell::from(risk.title.clone()),
                ])
                .style(style)
            })
            .collect();

        let widths = [
            Constraint::Length(7),  // ID
            Constraint::Length(10), // State
            Constraint::Length(24), // Assigned To
            Constraint::Length(10), // Due
            Constraint::Length(7),  // Score
            Constraint::Min(25),    // Title
        ];

        let direction = if self.risk_sort_desc { "desc" } else { "asc" };
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(format!(
                "Risks ({}) - score {} - 's' to flip, 'v' for tasks",
                self.risks.len(),
                direction
            )))
            .row_highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, area, &mut self.risk_table_state);
    }

    /// Render the suggestion review modal over the task board.
    fn render_review_modal(&mut self, f: &mut Frame, area: Rect) {
        let modal_area = centered_rect(80, 70, area);
        f.render_widget(Clear, modal_area);

        let block = Block::default()
            .title("Task Assignments")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(DARK_GREEN).add_modifier(Modifier::BOLD));
        let inner = block.inner(modal_area);
        f.render_widget(block, modal_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(inner);

        if self.workflow.review_list().is_empty() {
            let empty = Paragraph::new("No tasks left").alignment(Alignment::Center);
            f.render_widget(empty, chunks[0]);
        } else {
            let header_cells = ["Task ID", "Suggested Assignee", "Reason"].iter().map(|h| {
                Cell::from(*h).style(Style::default().add_modifier(Modifier::BOLD))
            });
            let header = Row::new(header_cells)
                .style(Style::default().bg(DARK_GREEN).fg(Color::White))
                .height(1);

            let rows: Vec<Row> = self
                .workflow
                .review_list()
                .iter()
                .map(|entry| {
                    let style = if entry.assignable() {
                        Style::default().fg(Color::White)
                    } else {
                        // No email candidate: confirm is unavailable.
                        Style::default().fg(Color::DarkGray)
                    };
                    Row::new(vec![
                        Cell::from(entry.task_id.clone()),
                        Cell::from(entry.email.clone().unwrap_or_else(|| "-".into())),
                        Cell::from(entry.reason.clone().unwrap_or_else(|| "-".into())),
                    ])
                    .style(style)
                })
                .collect();

            let widths = [
                Constraint::Length(9),  // Task ID
                Constraint::Length(30), // Assignee
                Constraint::Min(20),    // Reason
            ];
            let table = Table::new(rows, widths)
                .header(header)
                .row_highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
                .highlight_symbol(">> ");
            f.render_stateful_widget(table, chunks[0], &mut self.review_table_state);
        }

        let hints = Paragraph::new("c confirm | x dismiss | A assign all | Esc close")
            .style(Style::default().fg(Color::Cyan))
            .alignment(Alignment::Center);
        f.render_widget(hints, chunks[1]);
    }

    /// Render the help screen.
    fn render_help(&mut self, f: &mut Frame, area: Rect) {
        let text = vec![
            Line::from(Span::styled(
                "Keys",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Task board"),
            Line::from("  j/k or arrows  move        space  select row"),
            Line::from("  a   select/clear all visible"),
            Line::from("  g   ask AI to assign selection"),
            Line::from("  /   filter by title or type    r  refetch"),
            Line::from("  v   switch to risk board"),
            Line::from(""),
            Line::from("Review modal"),
            Line::from("  c   confirm suggestion (assigns on the server)"),
            Line::from("  x   dismiss suggestion (local only)"),
            Line::from("  A   assign all remaining suggestions in one call"),
            Line::from("  Esc close, discarding undecided suggestions"),
            Line::from(""),
            Line::from("Risk board"),
            Line::from("  s   flip score sort    r  refetch    v/Esc  back"),
            Line::from(""),
            Line::from("q quits from any board."),
        ];
        let help = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .wrap(Wrap { trim: false });
        f.render_widget(help, area);
    }

    /// Render the status bar at the bottom of the screen.
    fn render_status_bar(&mut self, f: &mut Frame, area: Rect) {
        let status_text = if self.filter_active {
            format!(
                "Search: {} (Esc to clear, Enter to confirm)",
                self.filter_text
            )
        } else if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            match self.state {
                AppState::TaskBoard => format!(
                    "Tasks: {} | Selected: {} | Press 'h' for help",
                    self.filtered_tasks.len(),
                    self.selection.len()
                ),
                AppState::RiskBoard => format!("Risks: {}", self.risks.len()),
                AppState::Review => format!(
                    "Reviewing {} suggestion(s)",
                    self.workflow.review_list().len()
                ),
                AppState::Help => "Help".to_string(),
            }
        };

        let accent = self.accent_color();
        let text_color = match accent {
            GOLD => Color::Rgb(20, 20, 20),
            _ => Color::White,
        };
        let status = Paragraph::new(status_text)
            .style(Style::default().bg(accent).fg(text_color))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    /// Main render function that dispatches to appropriate view renderers.
    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
            .split(f.area());

        match self.state {
            AppState::TaskBoard => self.render_task_board(f, chunks[0]),
            AppState::RiskBoard => self.render_risk_board(f, chunks[0]),
            AppState::Review => {
                self.render_task_board(f, chunks[0]);
                self.render_review_modal(f, chunks[0]);
            }
            AppState::Help => self.render_help(f, chunks[0]),
        }

        self.render_status_bar(f, chunks[1]);
    }

    /// Main event loop for the TUI application.
    ///
    /// Handles rendering and input processing until the user exits. A
    /// queued service call runs right after the draw that announces it,
    /// and the loop redraws before polling for input again.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.pending_call.is_some() {
                self.run_pending();
                continue;
            }

            if self.handle_input()? {
                break;
            }
        }
        Ok(())
    }
}

fn sort_risks(risks: &mut [Risk], desc: bool) {
    risks.sort_by(|a, b| {
        let ord = a
            .priority_score
            .partial_cmp(&b.priority_score)
            .unwrap_or(std::cmp::Ordering::Equal);
        if desc {
            ord.reverse()
        } else {
            ord
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ServiceError;
    use crate::task::{AssignmentPair, SuggestionEntry};
    use std::cell::RefCell;

    struct FixedService {
        tasks: Vec<Task>,
        suggest_calls: RefCell<usize>,
    }

    impl FixedService {
        fn with_tasks(tasks: Vec<Task>) -> Self {
            FixedService {
                tasks,
                suggest_calls: RefCell::new(0),
            }
        }
    }

    impl TaskService for FixedService {
        fn fetch_unassigned_tasks(&self) -> Result<Vec<Task>, ServiceError> {
            Ok(self.tasks.clone())
        }

        fn fetch_risk_items(&self) -> Result<Vec<Risk>, ServiceError> {
            Ok(Vec::new())
        }

        fn suggest_assignments(
            &self,
            _task_ids: &[u64],
        ) -> Result<Vec<SuggestionEntry>, ServiceError> {
            *self.suggest_calls.borrow_mut() += 1;
            Ok(Vec::new())
        }

        fn assign_task(&self, _task_id: &str, _email: &str) -> Result<(), ServiceError> {
            Ok(())
        }

        fn bulk_assign(&self, _pairs: &[AssignmentPair]) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    /// Serves the task list once, then fails every fetch after that.
    struct FlakyService {
        tasks: Vec<Task>,
        fetches: RefCell<usize>,
    }

    impl TaskService for FlakyService {
        fn fetch_unassigned_tasks(&self) -> Result<Vec<Task>, ServiceError> {
            let mut fetches = self.fetches.borrow_mut();
            *fetches += 1;
            if *fetches > 1 {
                return Err(ServiceError::Api {
                    status: 500,
                    message: "unavailable".into(),
                });
            }
            Ok(self.tasks.clone())
        }

        fn fetch_risk_items(&self) -> Result<Vec<Risk>, ServiceError> {
            Ok(Vec::new())
        }

        fn suggest_assignments(
            &self,
            _task_ids: &[u64],
        ) -> Result<Vec<SuggestionEntry>, ServiceError> {
            Ok(Vec::new())
        }

        fn assign_task(&self, _task_id: &str, _email: &str) -> Result<(), ServiceError> {
            Ok(())
        }

        fn bulk_assign(&self, _pairs: &[AssignmentPair]) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    fn task(id: u64, title: &str, kind: &str) -> Task {
        Task {
            id,
            url: format!("u{id}"),
            work_item_type: kind.into(),
            state: "New".into(),
            title: title.into(),
        }
    }

    #[test]
    fn initial_fetch_populates_list_once() {
        let service =
            FixedService::with_tasks(vec![task(1, "Fix bug", "Task"), task(2, "Write docs", "Task")]);
        let app = App::new(&service);
        assert_eq!(app.filtered_tasks, vec![1, 2]);
        assert!(app.selection.is_empty());
    }

    #[test]
    fn filter_matches_title_and_type() {
        let service = FixedService::with_tasks(vec![
            task(1, "Fix login bug", "Task"),
            task(2, "Quarterly report", "Feature"),
        ]);
        let mut app = App::new(&service);

        app.filter_text = "feature".into();
        app.update_filtered_tasks();
        assert_eq!(app.filtered_tasks, vec![2]);

        app.filter_text = "login".into();
        app.update_filtered_tasks();
        assert_eq!(app.filtered_tasks, vec![1]);
    }

    #[test]
    fn selection_preserves_toggle_order() {
        let service = FixedService::with_tasks(vec![
            task(1, "a", "Task"),
            task(2, "b", "Task"),
            task(3, "c", "Task"),
        ]);
        let mut app = App::new(&service);

        app.task_table_state.select(Some(2));
        app.toggle_selected();
        app.task_table_state.select(Some(0));
        app.toggle_selected();
        assert_eq!(app.selection, vec![3, 1]);

        // Toggling again removes.
        app.toggle_selected();
        assert_eq!(app.selection, vec![3]);
    }

    #[test]
    fn select_all_visible_respects_filter() {
        let service = FixedService::with_tasks(vec![
            task(1, "alpha", "Task"),
            task(2, "beta", "Task"),
            task(3, "alphabet", "Task"),
        ]);
        let mut app = App::new(&service);
        app.filter_text = "alpha".into();
        app.update_filtered_tasks();

        app.toggle_select_all_visible();
        assert_eq!(app.selection, vec![1, 3]);

        // Second toggle clears the visible ones.
        app.toggle_select_all_visible();
        assert!(app.selection.is_empty());
    }

    #[test]
    fn refetch_clears_selection() {
        let service = FixedService::with_tasks(vec![task(1, "a", "Task")]);
        let mut app = App::new(&service);
        app.task_table_state.select(Some(0));
        app.toggle_selected();
        assert_eq!(app.selection, vec![1]);

        app.refresh_tasks();
        assert!(app.selection.is_empty());
    }

    #[test]
    fn failed_refetch_keeps_loaded_tasks_and_selection() {
        let service = FlakyService {
            tasks: vec![task(1, "a", "Task"), task(2, "b", "Task")],
            fetches: RefCell::new(0),
        };
        let mut app = App::new(&service);
        app.task_table_state.select(Some(0));
        app.toggle_selected();
        assert_eq!(app.selection, vec![1]);

        // Second fetch fails; the loaded list and selection must survive.
        app.refresh_tasks();
        assert_eq!(app.filtered_tasks, vec![1, 2]);
        assert_eq!(app.selection, vec![1]);
        assert_eq!(app.status_message, "Error fetching tasks");
    }

    #[test]
    fn queued_service_call_waits_for_the_next_draw() {
        let service = FixedService::with_tasks(vec![task(1, "a", "Task")]);
        let mut app = App::new(&service);
        app.task_table_state.select(Some(0));
        app.toggle_selected();

        app.queue_call(PendingCall::Suggest);
        assert_eq!(app.status_message, "Contacting service...");
        assert_eq!(*service.suggest_calls.borrow(), 0);

        // The run loop draws the queued status, then executes.
        app.run_pending();
        assert_eq!(*service.suggest_calls.borrow(), 1);
        assert!(app.pending_call.is_none());
    }

    #[test]
    fn prune_task_removes_from_list_and_selection() {
        let service = FixedService::with_tasks(vec![task(1, "a", "Task"), task(2, "b", "Task")]);
        let mut app = App::new(&service);
        app.task_table_state.select(Some(0));
        app.toggle_selected();

        app.prune_task("1");
        assert_eq!(app.filtered_tasks, vec![2]);
        assert!(app.selection.is_empty());
    }
}

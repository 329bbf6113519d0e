//! Todo page rendering
//!
//! Renders the current page: a header naming the page and query key, the
//! loading/error/success projection of the query, the id input, and on the
//! mutation page the PUT status.

use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use todoquery::api::Todo;
use todoquery::pages::Page;
use todoquery::query::{MutationStatus, QueryState};

/// Renders the whole screen for the current page
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(3),    // Query result
            Constraint::Length(3), // Id input
            Constraint::Length(3), // Mutation status
            Constraint::Length(1), // Help text
        ])
        .split(area);

    render_header(frame, app, chunks[0]);
    render_query(frame, app.query_state(), chunks[1]);
    render_input(frame, app, chunks[2]);
    if app.page.has_mutation() {
        render_mutation(frame, app, chunks[3]);
    }
    render_help(frame, app.page, chunks[4]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let tabs: Vec<Span> = Page::all()
        .iter()
        .flat_map(|page| {
            let style = if *page == app.page {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            [Span::styled(format!(" {} ", page.title()), style), Span::raw(" ")]
        })
        .collect();

    let key = Span::styled(
        format!("key {}", app.query_state().key),
        Style::default().fg(Color::DarkGray),
    );

    let header = Paragraph::new(vec![Line::from(tabs), Line::from(key)]);
    frame.render_widget(header, area);
}

/// Text lines for the loading/error/success projection of a query
pub fn query_lines(state: &QueryState<Todo>) -> Vec<Line<'static>> {
    if state.is_loading() {
        return vec![Line::from(Span::styled(
            "LOADING",
            Style::default().fg(Color::Yellow),
        ))];
    }

    if state.is_error() {
        let message = state
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        return vec![Line::from(Span::styled(
            message,
            Style::default().fg(Color::Red),
        ))];
    }

    let json = state
        .data
        .as_ref()
        .and_then(|todo| serde_json::to_string(todo).ok())
        .unwrap_or_else(|| "null".to_string());

    let mut status = Vec::new();
    if let Some(updated) = state.updated_at {
        status.push(Span::styled(
            format!("updated {}", updated.with_timezone(&Local).format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if state.is_fetching {
        status.push(Span::styled(
            "  refreshing...",
            Style::default().fg(Color::Yellow),
        ));
    } else if state.is_stale {
        status.push(Span::styled("  stale", Style::default().fg(Color::DarkGray)));
    }

    vec![
        Line::from(vec![
            Span::styled("Fetched from API: ", Style::default().fg(Color::Green)),
            Span::raw(json),
        ]),
        Line::from(status),
    ]
}

fn render_query(frame: &mut Frame, state: &QueryState<Todo>, area: Rect) {
    let block = Block::default().title(" Todo ").borders(Borders::ALL);
    let paragraph = Paragraph::new(query_lines(state))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" id ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let input = Paragraph::new(Line::from(vec![
        Span::raw(app.id_input.clone()),
        Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
    ]))
    .block(block);
    frame.render_widget(input, area);
}

fn render_mutation(frame: &mut Frame, app: &App, area: Rect) {
    let state = app.mutation_state();
    let line = match state.status {
        MutationStatus::Idle => Line::from(Span::styled(
            "Press Enter to PUT",
            Style::default().fg(Color::DarkGray),
        )),
        MutationStatus::Pending => Line::from(Span::styled(
            "Adding todo...",
            Style::default().fg(Color::Yellow),
        )),
        MutationStatus::Error => Line::from(Span::styled(
            format!(
                "An error occurred: {}",
                state.error.map(|e| e.to_string()).unwrap_or_default()
            ),
            Style::default().fg(Color::Red),
        )),
        MutationStatus::Success => Line::from(Span::styled(
            "Todo added!",
            Style::default().fg(Color::Green),
        )),
    };

    let block = Block::default().title(" PUT ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_help(frame: &mut Frame, page: Page, area: Rect) {
    let mut text = String::from("0-9: id  Tab: page  r: refetch  ?: help  q: quit");
    if page.has_mutation() {
        text.push_str("  Enter: PUT");
    }
    let help = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use todoquery::query::{LoaderError, QueryKey, QueryStatus};

    fn state(status: QueryStatus) -> QueryState<Todo> {
        QueryState {
            key: QueryKey::new("todos").with(1),
            status,
            data: None,
            error: None,
            is_fetching: false,
            is_stale: false,
            updated_at: None,
        }
    }

    fn text(lines: &[Line<'_>]) -> String {
        lines
            .iter()
            .map(|line| line.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_loading_projection() {
        let lines = query_lines(&state(QueryStatus::Loading));
        assert_eq!(text(&lines), "LOADING");
        assert_eq!(text(&query_lines(&state(QueryStatus::Idle))), "LOADING");
    }

    #[test]
    fn test_error_projection_shows_message() {
        let mut failed = state(QueryStatus::Error);
        failed.error = Some(LoaderError::Status { status: 404 });
        assert_eq!(
            text(&query_lines(&failed)),
            "Request failed with status code 404"
        );
    }

    #[test]
    fn test_success_projection_shows_json_and_refresh_marker() {
        let mut done = state(QueryStatus::Success);
        done.data = Some(Todo {
            user_id: Some(1),
            id: 1,
            title: "a".to_string(),
            completed: Some(true),
            body: None,
        });
        done.is_fetching = true;
        let rendered = text(&query_lines(&done));
        assert!(rendered.contains(r#"Fetched from API: {"userId":1,"id":1,"title":"a","completed":true}"#));
        assert!(rendered.contains("refreshing"));
    }

    #[tokio::test]
    async fn test_mutation_page_renders() {
        use ratatui::{backend::TestBackend, Terminal};
        use std::time::Duration;
        use todoquery::api::TodoClient;
        use todoquery::cli::StartupConfig;
        use todoquery::query::{QueryClient, QueryConfig, RetryPolicy};

        let config = StartupConfig {
            page: Page::Mutation,
            base_url: "http://127.0.0.1:9".to_string(),
            query: QueryConfig {
                stale_time: Duration::from_secs(600),
            },
            retry: RetryPolicy::none(),
            ..StartupConfig::default()
        };
        let client = QueryClient::new(config.query.clone());
        client.set_query_data(
            &Page::Mutation.query_key(1),
            Todo {
                user_id: Some(1),
                id: 1,
                title: "delectus".to_string(),
                completed: Some(false),
                body: None,
            },
        );
        let app = App::with_client(&config, client, TodoClient::with_base_url(&config.base_url));

        let backend = TestBackend::new(100, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content().iter().map(|cell| cell.symbol()).collect();

        assert!(content.contains("Fetched from API"), "Should show the todo");
        assert!(content.contains("delectus"));
        assert!(content.contains("Press Enter to PUT"), "Should offer the PUT");
        assert!(content.contains("Mutation"));
    }
}

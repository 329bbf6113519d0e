//! Help overlay
//!
//! Lists the pages and the keys that work on the current one.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use todoquery::pages::Page;

const OVERLAY_WIDTH: u16 = 46;

/// (key, description, shown on pages with a mutation only)
const BINDINGS: &[(&str, &str, bool)] = &[
    ("0-9", "Type a todo id", false),
    ("Backspace", "Delete last digit", false),
    ("r", "Invalidate and refetch", false),
    ("Enter/p", "PUT the demo todo", true),
    ("Tab", "Next page", false),
    ("Shift-Tab", "Previous page", false),
    ("?", "Toggle this help", false),
    ("q/Esc", "Quit", false),
];

/// Overlay text for `current`
pub fn help_lines(current: Page) -> Vec<Line<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = vec![Line::from(Span::styled("Pages", bold))];

    for page in Page::all() {
        let marker = if *page == current { ">" } else { " " };
        let style = if *page == current {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!("{} {:<10} key {}", marker, page.title(), page.query_key(1)),
            style,
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("Keys on {}", current.title()),
        bold,
    )));
    lines.extend(
        BINDINGS
            .iter()
            .filter(|(_, _, mutation_only)| !mutation_only || current.has_mutation())
            .map(|(key, description, _)| {
                Line::from(vec![
                    Span::styled(format!("{:>10}  ", key), Style::default().fg(Color::Yellow)),
                    Span::raw(*description),
                ])
            }),
    );
    lines
}

/// Renders the help overlay on top of the current page
pub fn render(frame: &mut Frame, page: Page) {
    let lines = help_lines(page);
    // two rows of border
    let height = lines.len() as u16 + 2;
    let area = overlay_area(frame.area(), OVERLAY_WIDTH, height);

    let block = Block::default()
        .title(" Help (Esc to close) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// `width` x `height` in the middle of `area`, clipped to it
fn overlay_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn text(lines: &[Line<'_>]) -> String {
        lines
            .iter()
            .map(|line| line.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_put_binding_only_on_mutation_page() {
        assert!(text(&help_lines(Page::Mutation)).contains("PUT the demo todo"));
        assert!(!text(&help_lines(Page::Index)).contains("PUT the demo todo"));
    }

    #[test]
    fn test_pages_list_marks_current_and_shows_keys() {
        let rendered = text(&help_lines(Page::Pattern2));
        assert!(rendered.contains(r#"> Pattern 2  key ["todos",1]"#));
        assert!(rendered.contains(r#"  Home       key ["todos",{"id":1}]"#));
    }

    #[test]
    fn test_overlay_area_is_centered_and_clipped() {
        let area = Rect::new(0, 0, 80, 24);
        assert_eq!(overlay_area(area, 40, 10), Rect::new(20, 7, 40, 10));
        assert_eq!(overlay_area(Rect::new(0, 0, 20, 5), 40, 10), Rect::new(0, 0, 20, 5));
    }

    #[test]
    fn test_overlay_renders_in_small_terminal() {
        let backend = TestBackend::new(50, 12);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| render(frame, Page::Index)).unwrap();

        let content: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(content.contains("Help"));
        assert!(content.contains("Pages"));
    }
}

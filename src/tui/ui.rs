use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, FormField};
use crate::models::FeedStatus;

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Bookmark list
            Constraint::Length(1), // Status line
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_bookmark_list(frame, app, chunks[1]);
    render_status(frame, app, chunks[2]);

    if app.form_active {
        render_form(frame, app);
    }

    if app.show_help {
        render_help(frame);
    }
}

fn status_dot(status: FeedStatus) -> Span<'static> {
    let color = match status {
        FeedStatus::Connected => Color::Green,
        FeedStatus::Connecting => Color::Yellow,
        FeedStatus::Disconnected => Color::Red,
    };
    Span::styled("●", Style::default().fg(color))
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let email = app
        .session
        .as_ref()
        .map(|s| s.email.as_str())
        .unwrap_or("not signed in");

    let block = Block::default()
        .title(" My Bookmarks ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let line = Line::from(vec![
        status_dot(app.feed_status),
        Span::raw(format!(" {} | ", app.feed_status.label())),
        Span::raw(format!("{} bookmarks | ", app.store.len())),
        Span::styled(email, Style::default().fg(Color::Blue)),
    ]);
    frame.render_widget(Paragraph::new(line), inner);
}

fn render_bookmark_list(frame: &mut Frame, app: &App, area: Rect) {
    if app.store.is_empty() {
        let text = if app.is_loading {
            "Loading bookmarks..."
        } else {
            "No bookmarks yet. Press 'a' to add your first bookmark!"
        };
        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = app
        .store
        .items()
        .iter()
        .map(|bookmark| {
            // Provisional rows are dimmed until the backend confirms them
            let title_style = if bookmark.is_provisional() {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::White)
            };

            let added = bookmark.created_at.format("%Y-%m-%d");
            let line = Line::from(vec![
                Span::styled(bookmark.title.clone(), title_style),
                Span::raw("  "),
                Span::styled(bookmark.url.clone(), Style::default().fg(Color::Blue)),
                Span::styled(
                    format!("  added {added}"),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);

            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.selected_index));

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let status = if app.is_loading {
        "Refreshing..."
    } else {
        "j/k:nav  a:add  d:delete  r:refresh  s:sign out  ?:help  q:quit"
    };

    let paragraph = Paragraph::new(status).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_form(frame: &mut Frame, app: &App) {
    let area = centered_rect(60, 30, frame.area());

    let block = Block::default()
        .title(" Add New Bookmark ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let inner = block.inner(area);
    frame.render_widget(ratatui::widgets::Clear, area);
    frame.render_widget(block, area);

    let focus = |field: FormField| {
        if app.form_field == field {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        }
    };
    let cursor = |field: FormField| if app.form_field == field { "_" } else { "" };

    let lines = vec![
        Line::from(vec![
            Span::styled("Title: ", focus(FormField::Title)),
            Span::raw(format!("{}{}", app.title_input, cursor(FormField::Title))),
        ]),
        Line::from(vec![
            Span::styled("URL:   ", focus(FormField::Url)),
            Span::raw(format!("{}{}", app.url_input, cursor(FormField::Url))),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Tab:switch field  Enter:save  Esc:cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, inner);
}

fn render_help(frame: &mut Frame) {
    let area = centered_rect(50, 60, frame.area());

    let help_text = vec![
        "",
        " Navigation:",
        "   j / ↓    Move down",
        "   k / ↑    Move up",
        "",
        " Actions:",
        "   a / n    Add bookmark",
        "   d        Delete selected bookmark",
        "   r        Refresh from server",
        "   s        Sign out",
        "",
        " General:",
        "   ?        Toggle this help",
        "   q        Quit",
        "",
        " Press any key to close",
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(help_text.join("\n"))
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(ratatui::widgets::Clear, area);
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

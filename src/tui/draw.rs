use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use super::{App, AuthForm, DetailView, FormEditor, FormField, InterviewField, Overlay, ToastLevel};
use crate::detail;
use crate::form::{FormMode, FormPhase};
use crate::guard::Route;

pub(super) fn draw(frame: &mut Frame, app: &App) {
    match app.route {
        Route::Login => draw_auth(frame, &app.auth_form, false),
        Route::Signup => draw_auth(frame, &app.auth_form, true),
        Route::Dashboard => draw_dashboard(frame, app),
    }
    draw_toasts(frame, app);
}

fn draw_auth(frame: &mut Frame, form: &AuthForm, signup: bool) {
    let area = centered(frame.area(), 50, 12);
    let title = if signup { " Sign up " } else { " Log in " };

    let mut fields = vec![("Username", form.username.clone())];
    if signup {
        fields.push(("Email", form.email.clone()));
    }
    fields.push(("Password", "*".repeat(form.password.chars().count())));

    let mut lines: Vec<Line> = Vec::new();
    for (i, (label, value)) in fields.into_iter().enumerate() {
        let focused = i == form.focus;
        lines.push(input_line(label, &value, focused));
    }
    lines.push(Line::from(""));

    if form.busy {
        lines.push(Line::from(Span::styled("Please wait...", Style::default().fg(Color::Yellow))));
    } else if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    }

    let switch = if signup {
        " Enter:sign up  Tab:next field  Ctrl+N:log in instead  Esc:quit"
    } else {
        " Enter:log in  Tab:next field  Ctrl+N:sign up instead  Esc:quit"
    };
    lines.push(Line::from(Span::styled(switch, Style::default().fg(Color::DarkGray))));

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn draw_dashboard(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[0]);

    // Left panel: applications
    let visible = app.list.filtered();
    let items: Vec<ListItem> = visible
        .iter()
        .map(|a| {
            let title = crate::truncate(&a.job_title, 28);
            ListItem::new(Line::from(vec![
                Span::raw(format!("{} | {} ", crate::truncate(&a.company_name, 20), title)),
                Span::styled(format!("[{}]", a.status.label()), detail::status_style(a.status)),
            ]))
        })
        .collect();

    let title = if app.loading {
        " Applications (loading...) ".to_string()
    } else if app.list.filter().is_empty() {
        format!(" Applications ({}) ", app.list.all().len())
    } else {
        format!(" Applications ({}/{}) ", visible.len(), app.list.all().len())
    };

    let empty = items.is_empty();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    let mut list_state = ListState::default();
    if !empty {
        list_state.select(Some(app.list.selected_index()));
    }
    frame.render_stateful_widget(list, chunks[0], &mut list_state);

    // Right panel: preview of the selection
    let preview = match app.list.selected() {
        Some(selected) => detail::to_text(selected),
        None if app.list.all().is_empty() && !app.loading => {
            Text::raw("No applications yet. Press 'a' to add one.")
        }
        None => Text::raw("No matching applications"),
    };
    let preview = Paragraph::new(preview)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false });
    frame.render_widget(preview, chunks[1]);

    // Footer: search input or help
    let footer = if app.searching {
        Paragraph::new(format!(" Search: {}_", app.list.filter())).style(Style::default().fg(Color::Yellow))
    } else {
        let who = app
            .session
            .user()
            .map(|u| u.username)
            .filter(|name| !name.is_empty())
            .map(|name| format!(" {} |", name))
            .unwrap_or_default();
        Paragraph::new(format!(
            "{} j/k:navigate  /:search  v:view  a:add  e:edit  d:delete  r:refresh  L:logout  q:quit",
            who
        ))
        .style(Style::default().fg(Color::DarkGray))
    };
    frame.render_widget(footer, rows[1]);

    match &app.overlay {
        Overlay::None => {}
        Overlay::Detail(view) => draw_detail(frame, view),
        Overlay::Form(editor) => draw_form(frame, editor),
        Overlay::ConfirmDelete { company, .. } => draw_confirm(frame, company),
    }
}

fn draw_detail(frame: &mut Frame, view: &DetailView) {
    let area = popup(frame.area(), 80, 85);
    frame.render_widget(Clear, area);

    let mut text = detail::to_text(&view.application);
    if view.loading {
        text.lines.push(Line::from(""));
        text.lines.push(Line::from(Span::styled(
            "Loading interviews...",
            Style::default().fg(Color::Yellow),
        )));
    }

    let title = format!(" {} - {} ", view.application.company_name, view.application.job_title);
    let widget = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_bottom(" j/k:scroll  Esc:close "),
        )
        .wrap(Wrap { trim: false })
        .scroll((view.scroll, 0));
    frame.render_widget(widget, area);
}

fn draw_form(frame: &mut Frame, editor: &FormEditor) {
    let area = popup(frame.area(), 80, 90);
    frame.render_widget(Clear, area);

    let title = match editor.phase {
        FormPhase::Prefetching { .. } => " Edit Application (loading...) ",
        FormPhase::Open(FormMode::Create) | FormPhase::Submitting(FormMode::Create) => {
            " Add New Application "
        }
        _ => " Edit Application ",
    };

    let focused = editor.focused();
    let mut lines: Vec<Line> = Vec::new();
    let mut interview_header = None;

    for field in editor.fields() {
        if let FormField::Interview(i, _) = field {
            if interview_header != Some(i) {
                interview_header = Some(i);
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    format!("Round {}", i + 1),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
            }
        } else if field == FormField::Resume {
            if let Some(existing) = &editor.form.resume_url {
                lines.push(Line::from(Span::styled(
                    format!("  Current resume: {}", existing),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }

        let value = editor.value(field);
        let hint = match field {
            FormField::Interview(i, InterviewField::Type)
                if editor.form.interviews().get(i).is_some_and(|row| row.interview_type.is_blank()) =>
            {
                " (Enter cycles TECHNICAL, BEHAVIORAL, SYSTEM_DESIGN, HR or type your own)".to_string()
            }
            FormField::Date => " (YYYY-MM-DD)".to_string(),
            FormField::Interview(_, InterviewField::Date) => " (YYYY-MM-DDTHH:MM)".to_string(),
            _ => String::new(),
        };
        let mut line = input_line(field.label(), &value, field == focused);
        if !hint.is_empty() {
            line.spans.push(Span::styled(hint, Style::default().fg(Color::DarkGray)));
        }
        lines.push(line);
    }

    if editor.form.interviews().is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "No interviews. Ctrl+A to add one.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines.push(Line::from(""));
    match (&editor.phase, &editor.error) {
        (FormPhase::Submitting(_), _) => {
            lines.push(Line::from(Span::styled("Saving...", Style::default().fg(Color::Yellow))));
        }
        (_, Some(error)) => {
            lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
        }
        _ => {}
    }

    // Keep the focused row in view.
    let focus_row = lines
        .iter()
        .position(|l| l.spans.first().is_some_and(|s| s.content.starts_with("> ")))
        .unwrap_or(0) as u16;
    let inner_height = area.height.saturating_sub(2);
    let scroll = focus_row.saturating_sub(inner_height.saturating_sub(3));

    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_bottom(" Tab:next  Space:cycle  Ctrl+A:add interview  Ctrl+D:remove  Ctrl+S:save  Esc:cancel "),
        )
        .scroll((scroll, 0));
    frame.render_widget(widget, area);
}

fn draw_confirm(frame: &mut Frame, company: &str) {
    let area = centered(frame.area(), 56, 6);
    frame.render_widget(Clear, area);
    let lines = vec![
        Line::from(crate::dashboard::DELETE_PROMPT),
        Line::from(Span::styled(company.to_string(), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(Span::styled(" y:delete  n:cancel", Style::default().fg(Color::DarkGray))),
    ];
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Delete "))
        .wrap(Wrap { trim: true });
    frame.render_widget(widget, area);
}

fn draw_toasts(frame: &mut Frame, app: &App) {
    let screen = frame.area();
    for (i, toast) in app.toasts.iter().rev().take(3).enumerate() {
        let width = toast_width(&toast.message, screen.width);
        let y = 1 + (i as u16) * 3;
        if y + 3 > screen.height {
            break;
        }
        let area = Rect::new(screen.width.saturating_sub(width.saturating_add(1)), y, width, 3);
        let color = match toast.level {
            ToastLevel::Success => Color::Green,
            ToastLevel::Error => Color::Red,
            ToastLevel::Info => Color::Cyan,
        };
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(toast.message.as_str())
                .style(Style::default().fg(color))
                .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color))),
            area,
        );
    }
}

/// Border plus padding around the message, capped at the screen width.
fn toast_width(message: &str, screen_width: u16) -> u16 {
    u16::try_from(message.chars().count())
        .unwrap_or(u16::MAX)
        .saturating_add(4)
        .min(screen_width)
}

fn input_line(label: &str, value: &str, focused: bool) -> Line<'static> {
    let marker = if focused { "> " } else { "  " };
    let label_style = if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let cursor = if focused { "_" } else { "" };
    Line::from(vec![
        Span::styled(format!("{}{}: ", marker, label), label_style),
        Span::raw(format!("{}{}", value, cursor)),
    ])
}

fn popup(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
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

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toast_width_is_capped() {
        assert_eq!(toast_width("Saved", 80), 9);
        assert_eq!(toast_width(&"x".repeat(70_000), 120), 120);
        assert_eq!(toast_width(&"x".repeat(70_000), u16::MAX), u16::MAX);
    }
}

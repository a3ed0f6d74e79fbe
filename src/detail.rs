use ratatui::prelude::*;

use crate::dates;
use crate::models::{ApplicationStatus, JobApplication};

const WRAP_WIDTH: usize = 70;

/// One line of the read-only application view, before styling.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailLine {
    Heading(String),
    Field { label: &'static str, value: String },
    Link { label: &'static str, url: String },
    Text(String),
    Blank,
}

pub fn build(app: &JobApplication) -> Vec<DetailLine> {
    let mut lines = vec![
        DetailLine::Heading("Basic Information".to_string()),
        field("Company", &app.company_name),
        field("Position", &app.job_title),
        field("Status", app.status.label()),
        field("Application Date", &dates::display_date(app.application_date)),
        DetailLine::Blank,
        DetailLine::Heading("Job Description".to_string()),
    ];

    match app.job_description.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(description) => {
            for paragraph in description.lines() {
                if paragraph.trim().is_empty() {
                    lines.push(DetailLine::Blank);
                    continue;
                }
                for wrapped in textwrap::wrap(paragraph, WRAP_WIDTH) {
                    lines.push(DetailLine::Text(wrapped.into_owned()));
                }
            }
        }
        None => lines.push(DetailLine::Text("No description provided".to_string())),
    }

    lines.push(DetailLine::Blank);
    lines.push(DetailLine::Heading("Links".to_string()));
    if let Some(url) = &app.job_url {
        lines.push(DetailLine::Link {
            label: "Job Posting",
            url: url.clone(),
        });
    }
    if let Some(url) = &app.resume_url {
        lines.push(DetailLine::Link {
            label: "Resume",
            url: url.clone(),
        });
    }

    if !app.interviews.is_empty() {
        lines.push(DetailLine::Blank);
        lines.push(DetailLine::Heading("Interviews".to_string()));
        for interview in &app.interviews {
            lines.push(DetailLine::Blank);
            lines.push(field("Round", &interview.round_number.to_string()));
            lines.push(field("Type", interview.interview_type.as_str()));
            lines.push(field("Status", interview.status.as_str()));
            lines.push(field("Date", &dates::display_datetime(&interview.interview_date)));
            if let Some(notes) = interview.notes.as_deref().filter(|n| !n.trim().is_empty()) {
                lines.push(field("Notes", notes));
            }
        }
    }

    lines
}

fn field(label: &'static str, value: &str) -> DetailLine {
    DetailLine::Field {
        label,
        value: value.to_string(),
    }
}

/// Plain text for `applymate show`.
pub fn to_plain(lines: &[DetailLine]) -> String {
    let mut out = String::new();
    for line in lines {
        match line {
            DetailLine::Heading(title) => {
                out.push_str(&format!("--- {} ---\n", title));
            }
            DetailLine::Field { label, value } => out.push_str(&format!("{}: {}\n", label, value)),
            DetailLine::Link { label, url } => out.push_str(&format!("{}: {}\n", label, url)),
            DetailLine::Text(text) => {
                out.push_str(text);
                out.push('\n');
            }
            DetailLine::Blank => out.push('\n'),
        }
    }
    out
}

pub fn status_style(status: ApplicationStatus) -> Style {
    match status {
        ApplicationStatus::Applied => Style::default().fg(Color::Green),
        ApplicationStatus::InterviewScheduled
        | ApplicationStatus::TechnicalInterview
        | ApplicationStatus::FinalInterview => Style::default().fg(Color::Yellow),
        ApplicationStatus::OfferReceived => Style::default().fg(Color::Cyan),
        ApplicationStatus::Rejected => Style::default().fg(Color::Red),
        ApplicationStatus::Withdrawn => Style::default().fg(Color::DarkGray),
    }
}

/// Styled text for the dashboard's detail pane.
pub fn to_text(app: &JobApplication) -> Text<'static> {
    let lines: Vec<Line<'static>> = build(app)
        .into_iter()
        .map(|line| match line {
            DetailLine::Heading(title) => Line::from(Span::styled(
                title,
                Style::default().add_modifier(Modifier::BOLD),
            )),
            DetailLine::Field { label: "Status", value } if value == app.status.label() => {
                Line::from(vec![
                    Span::styled("  Status: ", Style::default().fg(Color::DarkGray)),
                    Span::styled(value, status_style(app.status)),
                ])
            }
            DetailLine::Field { label, value } => Line::from(vec![
                Span::styled(format!("  {}: ", label), Style::default().fg(Color::DarkGray)),
                Span::raw(value),
            ]),
            DetailLine::Link { label, url } => Line::from(vec![
                Span::styled(format!("  {}: ", label), Style::default().fg(Color::DarkGray)),
                Span::styled(url, Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED)),
            ]),
            DetailLine::Text(text) => Line::from(format!("  {}", text)),
            DetailLine::Blank => Line::from(""),
        })
        .collect();
    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Interview, InterviewStatus, InterviewType};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn application() -> JobApplication {
        JobApplication {
            id: 1,
            company_name: "Acme".to_string(),
            job_title: "Engineer".to_string(),
            status: ApplicationStatus::OfferReceived,
            job_description: None,
            job_url: None,
            application_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            resume_url: None,
            interviews: Vec::new(),
        }
    }

    #[test]
    fn test_minimal_application_omits_links_and_interviews() {
        let lines = build(&application());
        assert!(lines.contains(&DetailLine::Text("No description provided".to_string())));
        assert!(lines.contains(&field("Application Date", "Mar 01, 2024")));
        assert!(lines.contains(&field("Status", "Offer Received")));
        assert!(!lines.iter().any(|l| matches!(l, DetailLine::Link { .. })));
        assert!(!lines.contains(&DetailLine::Heading("Interviews".to_string())));
    }

    #[test]
    fn test_links_render_only_when_present() {
        let mut app = application();
        app.resume_url = Some("https://files.example/cv.pdf".to_string());
        let lines = build(&app);
        assert!(lines.contains(&DetailLine::Link {
            label: "Resume",
            url: "https://files.example/cv.pdf".to_string()
        }));
        assert!(!lines.iter().any(|l| matches!(l, DetailLine::Link { label: "Job Posting", .. })));
    }

    #[test]
    fn test_interviews_section() {
        let mut app = application();
        app.interviews = vec![
            Interview {
                id: Some(1),
                job_application_id: Some(1),
                round_number: 1,
                interview_date: Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap(),
                interview_type: InterviewType::Behavioral,
                notes: Some("panel of three".to_string()),
                status: InterviewStatus::Completed,
            },
            Interview {
                id: Some(2),
                job_application_id: Some(1),
                round_number: 2,
                interview_date: Utc.with_ymd_and_hms(2024, 3, 9, 9, 0, 0).unwrap(),
                interview_type: InterviewType::Other("Take-home".to_string()),
                notes: None,
                status: InterviewStatus::Scheduled,
            },
        ];
        let plain = to_plain(&build(&app));
        assert!(plain.contains("--- Interviews ---"));
        assert!(plain.contains("Date: Mar 05, 2024 14:30"));
        assert!(plain.contains("Type: BEHAVIORAL"));
        assert!(plain.contains("Type: Take-home"));
        assert_eq!(plain.matches("Notes:").count(), 1);
    }

    #[test]
    fn test_long_description_wraps() {
        let mut app = application();
        app.job_description = Some("word ".repeat(40));
        let text_lines = build(&app)
            .into_iter()
            .filter(|l| matches!(l, DetailLine::Text(_)))
            .count();
        assert!(text_lines > 1);
        assert!(to_text(&app).lines.len() > 10);
    }
}

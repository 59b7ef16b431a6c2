pub mod charting;
pub mod history;
pub mod screen;

use itertools::Itertools;
use mathdash::{DrillConfig, Phase, RunResult, Session, Verdict};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
    Frame,
};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;
/// The clock turns red at this many seconds left
const LOW_TIME_SECS: u32 = 10;

pub fn draw(app: &App, f: &mut Frame) {
    screen::current_screen(&app.state).render(app, f);
}

/// One-line description of a configuration, e.g.
/// `+ - ×   add 2-100 / 2-100   mul 2-12 / 2-100   60s`
pub fn describe_config(config: &DrillConfig) -> String {
    let r = &config.ranges;
    format!(
        "{}   add {} / {}   mul {} / {}   {}",
        config.operations.iter().map(|op| op.glyph()).join(" "),
        r.add_a,
        r.add_b,
        r.mul_a,
        r.mul_b,
        config.duration
    )
}

fn hud_line(session: &Session) -> Line<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let state = session.state();
    let time_style = if session.phase() == Phase::Running && state.time_left <= LOW_TIME_SECS {
        bold.fg(Color::Red)
    } else {
        bold
    };

    Line::from(vec![
        Span::raw("score "),
        Span::styled(state.score.to_string(), bold),
        Span::raw("   streak "),
        Span::styled(state.streak.to_string(), bold),
        Span::raw("   time "),
        Span::styled(format!("{}s", state.time_left), time_style),
        Span::raw("   accuracy "),
        Span::styled(format!("{}%", session.accuracy()), bold),
    ])
}

fn result_lines(result: &RunResult) -> Vec<Line<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = vec![
        Line::from(Span::styled("Run complete", bold.fg(Color::Cyan))),
        Line::from(""),
        Line::from(Span::styled(format!("Score: {}", result.score), bold)),
        Line::from(format!(
            "Accuracy: {}/{} ({}%)",
            result.correct, result.attempted, result.accuracy
        )),
    ];
    lines.push(match result.best_score {
        Some(_) if result.is_new_high_score => {
            Line::from(Span::styled("New high score", bold.fg(Color::Green)))
        }
        Some(best) => Line::from(Span::styled(
            format!("Best score: {best}"),
            Style::default().add_modifier(Modifier::DIM),
        )),
        None => Line::from(Span::styled(
            "Not saved",
            Style::default().fg(Color::Yellow),
        )),
    });
    lines
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let session = &self.session;
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // hud
                Constraint::Length(1), // configuration
                Constraint::Min(3),    // card
                Constraint::Length(1), // status
                Constraint::Length(1), // legend
            ])
            .split(area);

        Paragraph::new(hud_line(session))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        Paragraph::new(Span::styled(describe_config(session.config()), dim_style))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        let state = session.state();
        let (card, status, legend): (Vec<Line>, Option<Span>, &str) = match session.phase() {
            Phase::Idle => (
                vec![Line::from(Span::styled("Ready?", bold_style))],
                None,
                "(enter) start / (h)istory / (esc)ape",
            ),
            Phase::Running => {
                let card = match &state.current_question {
                    Some(q) => {
                        let answer_style = match session.last_verdict() {
                            Some(Verdict::Incorrect) => bold_style.fg(Color::Red),
                            _ => bold_style.fg(Color::Green),
                        };
                        vec![
                            Line::from(Span::styled(q.prompt.clone(), bold_style)),
                            Line::from(""),
                            Line::from(vec![
                                Span::raw("= "),
                                Span::styled(state.pending_input.clone(), answer_style),
                                Span::styled("_", dim_style),
                            ]),
                        ]
                    }
                    None if session.awaiting_question() => {
                        vec![Line::from(Span::styled("loading…", dim_style))]
                    }
                    None => vec![Line::from(Span::styled(
                        "no question available",
                        Style::default().fg(Color::Yellow),
                    ))],
                };
                let status = session.last_error().map(|e| {
                    Span::styled(format!("{e} (r)etry"), Style::default().fg(Color::Yellow))
                });
                (card, status, "(enter) submit / (esc) end run")
            }
            Phase::Settling if session.settlement_failed() => (
                vec![Line::from(Span::styled("Run over", bold_style))],
                session
                    .last_error()
                    .map(|e| Span::styled(e.to_string(), Style::default().fg(Color::Red))),
                "(r)etry save / (d)iscard",
            ),
            Phase::Settling => (
                vec![Line::from(Span::styled("saving…", dim_style))],
                None,
                "",
            ),
            Phase::Complete => (
                session.result().map(result_lines).unwrap_or_default(),
                None,
                "(enter) close / (h)istory",
            ),
        };

        Paragraph::new(card)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[2], buf);

        if let Some(status) = status {
            Paragraph::new(status)
                .alignment(Alignment::Center)
                .render(chunks[3], buf);
        }

        Paragraph::new(Span::styled(legend, italic_style)).render(chunks[4], buf);
    }
}

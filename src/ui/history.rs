use chrono::Local;
use mathdash::PastRun;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table},
    Frame,
};

use crate::ui::charting::{compute_chart_params, format_label, score_series};
use crate::ui::describe_config;
use crate::App;

fn present_row(run: &PastRun) -> Row<'static> {
    Row::new(vec![
        Cell::from(
            run.timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
        ),
        Cell::from(run.score.to_string()),
        Cell::from(format!("{}/{}", run.correct, run.attempted)),
        Cell::from(format!("{}%", run.accuracy())),
    ])
}

/// Render the history screen for the browsed scope
pub fn render_history(app: &App, f: &mut Frame) {
    let history = &app.history;
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),      // best score card
            Constraint::Percentage(50), // chart
            Constraint::Min(5),         // recent runs
            Constraint::Length(1),      // legend
        ])
        .split(f.area());

    let card = Paragraph::new(vec![
        Line::from(vec![
            Span::raw("Best score "),
            Span::styled(history.best_score.to_string(), bold_style.fg(Color::Green)),
            Span::raw(format!("   over {} runs", history.points.len())),
        ]),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(describe_config(&history.scope)),
    );
    f.render_widget(card, chunks[0]);

    if let Some(error) = &history.error {
        let message = Paragraph::new(format!("History unavailable: {error}"))
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Red));
        f.render_widget(message, chunks[1]);
    } else if history.points.is_empty() {
        let message = Paragraph::new("No runs for this configuration yet.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray));
        f.render_widget(message, chunks[1]);
    } else {
        let (runs, highest) = compute_chart_params(&history.points);
        let (raw, average) = score_series(&history.points);

        let mut datasets = vec![Dataset::default()
            .name("score")
            .marker(Marker::Dot)
            .style(Style::default().fg(Color::Magenta))
            .graph_type(GraphType::Scatter)
            .data(&raw)];
        if history.show_average {
            datasets.push(
                Dataset::default()
                    .name(format!("average of {}", app.settings.window_size))
                    .marker(Marker::Braille)
                    .style(Style::default().fg(Color::Cyan))
                    .graph_type(GraphType::Line)
                    .data(&average),
            );
        }

        let chart = Chart::new(datasets)
            .x_axis(
                Axis::default()
                    .title("run")
                    .bounds([1.0, runs])
                    .labels(vec![
                        Span::styled("1", bold_style),
                        Span::styled(format_label(runs), bold_style),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("score")
                    .bounds([0.0, highest])
                    .labels(vec![
                        Span::styled("0", bold_style),
                        Span::styled(format_label(highest), bold_style),
                    ]),
            );
        f.render_widget(chart, chunks[1]);
    }

    let header = Row::new(vec![
        Cell::from("Date"),
        Cell::from("Score"),
        Cell::from("Correct"),
        Cell::from("Accuracy"),
    ])
    .style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );
    let widths = [
        Constraint::Length(18),
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Min(8),
    ];
    let table = Table::new(history.recent.iter().map(present_row), widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Recent runs"))
        .column_spacing(2);
    f.render_widget(table, chunks[2]);

    let legend = Paragraph::new(Span::styled(
        "(+ - * /) toggle operation / (a) toggle average / (b)ack",
        italic_style,
    ));
    f.render_widget(legend, chunks[3]);
}

//! Ratatui rendering of the open interest dashboard

use chrono::{DateTime, Local, Utc};
use itertools::Itertools;
use oi_data::{FetchError, Freshness, Snapshot, StrikeOi};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph},
};
use rust_decimal::prelude::ToPrimitive;

use crate::app::App;
use crate::feed::FeedStatus;

const C_CALLS: Color = Color::Rgb(220, 100, 100);
const C_PUTS: Color = Color::Rgb(100, 220, 100);
const C_NEUTRAL: Color = Color::Rgb(180, 180, 100);
const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);
const C_ACCENT: Color = Color::Rgb(100, 180, 220);

/// Width of a single bar in the strike chart
const BAR_WIDTH: u16 = 3;
/// One group = calls bar + puts bar + gap
const GROUP_WIDTH: u16 = BAR_WIDTH * 2 + 1;

/// Characters of an error message shown in the status line
const ERROR_PREVIEW_CHARS: usize = 50;

/// Render the whole dashboard
pub fn render_dashboard(f: &mut Frame, app: &App, now: DateTime<Utc>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);

    match app.state().latest() {
        Some(snapshot) => {
            render_metrics(f, snapshot, chunks[1]);
            render_strike_chart(f, snapshot, chunks[2]);
        }
        None => {
            let waiting = Paragraph::new(Line::from(Span::styled(
                "Waiting for market data...",
                Style::default().fg(C_NEUTRAL),
            )))
            .block(Block::default().borders(Borders::ALL));
            let area = Rect {
                height: chunks[1].height + chunks[2].height,
                ..chunks[1]
            };
            f.render_widget(waiting, area);
        }
    }

    render_status(f, app, now, chunks[3]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(
        "NSE OPTIONS OI LIVE  ",
        Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
    )];

    let selector = app.symbols().iter().map(|symbol| {
        if symbol == app.symbol() {
            Span::styled(
                format!("[{symbol}]"),
                Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(format!(" {symbol} "), Style::default().fg(C_DIM))
        }
    });
    spans.extend(Itertools::intersperse(selector, Span::raw(" ")));

    spans.push(Span::styled(
        format!("   every {}s", app.refresh().as_secs()),
        Style::default().fg(C_DIM),
    ));

    let (feed_label, feed_color) = match app.feed_status() {
        FeedStatus::Fetching => ("  ● fetching", C_ACCENT),
        FeedStatus::Idle => ("  ○ idle", C_DIM),
        FeedStatus::Stopped => ("  ✕ stopped", C_CALLS),
    };
    spans.push(Span::styled(feed_label, Style::default().fg(feed_color)));

    let block = Block::default().borders(Borders::ALL);
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_metrics(f: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(33),
            Constraint::Percentage(33),
            Constraint::Percentage(34),
        ])
        .split(area);

    render_metric(f, columns[0], " CALLS OI ", format_lakhs(snapshot.calls_oi), C_CALLS, None);
    render_metric(f, columns[1], " PUTS OI ", format_lakhs(snapshot.puts_oi), C_PUTS, None);

    let pcr = snapshot.pcr.to_f64().unwrap_or_default();
    let gauge_width = (columns[2].width as usize).saturating_sub(10).max(10);
    let gauge = Line::from(vec![
        Span::styled("0 ", Style::default().fg(C_DIM)),
        Span::styled(render_pcr_gauge(pcr, gauge_width), Style::default().fg(pcr_color(pcr))),
        Span::styled(" 2", Style::default().fg(C_DIM)),
    ]);
    render_metric(
        f,
        columns[2],
        " PUT/CALL RATIO ",
        format!("{:.2}", snapshot.pcr),
        pcr_color(pcr),
        Some(gauge),
    );
}

fn render_metric(
    f: &mut Frame,
    area: Rect,
    title: &str,
    value: String,
    color: Color,
    extra: Option<Line<'_>>,
) {
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));

    let mut lines = vec![Line::from(Span::styled(
        value,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))];
    lines.extend(extra);

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_strike_chart(f: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let title = match (&snapshot.nearest_expiry, snapshot.underlying_value) {
        (Some(expiry), Some(spot)) => {
            format!(" CALL vs PUT OPEN INTEREST  spot {spot:.2}  expiry {expiry} ")
        }
        (None, Some(spot)) => format!(" CALL vs PUT OPEN INTEREST  spot {spot:.2} "),
        _ => " CALL vs PUT OPEN INTEREST ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_ACCENT));

    let max_groups = (block.inner(area).width / GROUP_WIDTH) as usize;
    let strikes = visible_strikes(&snapshot.strikes, max_groups);

    let mut chart = BarChart::default()
        .block(block)
        .bar_width(BAR_WIDTH)
        .bar_gap(0)
        .group_gap(1);

    for strike in strikes {
        let bars = [
            Bar::default()
                .value(strike.calls_oi)
                .text_value(String::new())
                .style(Style::default().fg(C_CALLS)),
            Bar::default()
                .value(strike.puts_oi)
                .text_value(String::new())
                .style(Style::default().fg(C_PUTS)),
        ];
        chart = chart.data(
            BarGroup::default()
                .label(Line::from(format!("{:.0}", strike.strike)))
                .bars(&bars),
        );
    }

    f.render_widget(chart, area);
}

fn render_status(f: &mut Frame, app: &App, now: DateTime<Utc>, area: Rect) {
    let state = app.state();
    let mut spans = Vec::new();

    match app.freshness(now) {
        Freshness::Waiting => {
            spans.push(Span::styled(
                "Waiting for market data...",
                Style::default().fg(C_NEUTRAL),
            ));
        }
        Freshness::Fresh => {
            if let Some(snapshot) = state.latest() {
                spans.push(Span::styled(
                    format!(
                        "Updated {}",
                        snapshot.captured_at.with_timezone(&Local).format("%H:%M:%S")
                    ),
                    Style::default().fg(C_PUTS),
                ));
            }
        }
        Freshness::Stale => {
            let age = state.age(now).unwrap_or_default().as_secs();
            spans.push(Span::styled(
                format!("STALE {age}s"),
                Style::default().fg(C_CALLS).add_modifier(Modifier::BOLD),
            ));
        }
    }

    if let Some(error) = state.last_error() {
        spans.push(Span::styled(
            format!(
                "  Data refresh in progress... ({}, {} failed)",
                error_preview(error),
                state.consecutive_failures()
            ),
            Style::default().fg(C_NEUTRAL),
        ));
    }

    spans.push(Span::styled(
        "   s/Tab symbol  +/- speed  q quit",
        Style::default().fg(C_DIM),
    ));

    let block = Block::default().borders(Borders::ALL);
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

/// Format open interest in lakhs (1 L = 100,000 contracts), eg/ `12.3 L`.
pub fn format_lakhs(open_interest: u64) -> String {
    format!("{:.1} L", open_interest as f64 / 100_000.0)
}

/// `Error: <first 50 characters>` preview of a fetch error.
pub fn error_preview(error: &FetchError) -> String {
    let message = error.to_string();
    format!("Error: {}", message.chars().take(ERROR_PREVIEW_CHARS).collect::<String>())
}

/// Select at most `max_groups` consecutive strikes, centred on the strike with the largest
/// combined open interest.
pub fn visible_strikes(strikes: &[StrikeOi], max_groups: usize) -> &[StrikeOi] {
    if strikes.len() <= max_groups {
        return strikes;
    }
    if max_groups == 0 {
        return &[];
    }

    let peak = strikes
        .iter()
        .position_max_by_key(|strike| strike.total())
        .unwrap_or(0);
    let start = peak
        .saturating_sub(max_groups / 2)
        .min(strikes.len() - max_groups);

    &strikes[start..start + max_groups]
}

/// Render PCR gauge: position marker on a 0 to 2 scale
fn render_pcr_gauge(pcr: f64, width: usize) -> String {
    if width < 5 {
        return "".to_string();
    }

    let normalized = pcr / 2.0;
    let position = (normalized * width as f64).clamp(0.0, (width - 1) as f64) as usize;
    let center = width / 2;

    let mut gauge = String::new();
    for i in 0..width {
        if i == position {
            gauge.push('●');
        } else if i == center {
            gauge.push('│');
        } else {
            gauge.push('═');
        }
    }
    gauge
}

/// Above 1 puts dominate (green), below 0.7 calls dominate (red)
fn pcr_color(pcr: f64) -> Color {
    if pcr > 1.0 {
        C_PUTS
    } else if pcr < 0.7 {
        C_CALLS
    } else {
        C_NEUTRAL
    }
}

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::shared::{DisplayState, Instrument};

use super::grid::draw_channel_grid;
use super::mode::TuiState;

const HELP: &str = "space play/pause  s stop  [ ] tempo  - = volume  1-9 mute row  \
                    ↑↓ row  ←→ row volume  tab next variant  e edit  ? help  esc quit";
const EDIT_HELP: &str = "←→ step  X . a o f h r s z 0 write  backspace rest  c clear row  esc done";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState, blink_on: bool) {
    let grid_height = Instrument::ALL.len() as u16 + 2;
    let footer_height = if ts.show_help { 7 } else { 5 };
    let sections = Layout::vertical([
        Constraint::Length(3),           // header
        Constraint::Length(grid_height), // notation grid
        Constraint::Length(footer_height),
        Constraint::Min(0),
    ])
    .split(area);

    draw_header(frame, sections[0], state, blink_on);
    draw_channel_grid(
        frame,
        sections[1],
        &state.rows,
        playhead(state),
        state.selected_row,
        state.playing,
        state.edit_step,
    );
    draw_footer(frame, sections[2], state, ts);
}

// the cursor already points at the next step while playing
fn playhead(state: &DisplayState) -> usize {
    if state.playing && state.length > 0 {
        (state.current_step + state.length - 1) % state.length
    } else {
        state.current_step
    }
}

fn draw_header(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    let transport = if !state.audio_loaded && state.playing {
        Span::styled("LOADING", Style::default().fg(Color::Yellow))
    } else if state.playing {
        let style = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
        Span::styled(if blink_on { "▶ PLAY" } else { "  PLAY" }, style)
    } else if state.current_step > 0 {
        Span::styled("‖ PAUSED", Style::default().fg(Color::Cyan))
    } else {
        Span::styled("■ STOPPED", Style::default().fg(Color::DarkGray))
    };

    let mut spans = vec![
        Span::styled(state.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(
            "  {} ({}/{})",
            state.variant,
            state.variant_index + 1,
            state.variant_count.max(1)
        )),
        Span::raw(format!("  {:.0} bpm  vol {}  ", state.bpm, state.master_volume)),
        transport,
        Span::raw(format!("  step {:>3}/{}", playhead(state) + 1, state.length)),
    ];
    if let Some(step) = state.edit_step {
        spans.push(Span::styled(
            format!("  EDIT {:>3}", step + 1),
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        ));
    }
    if !state.audio_loaded && !state.playing {
        spans.push(Span::styled("  samples not loaded", Style::default().fg(Color::DarkGray)));
    }

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(" batuque "));
    frame.render_widget(header, area);
}

fn draw_footer(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let mut lines = Vec::new();
    if let Some(mnemonic) = &state.mnemonic {
        lines.push(Line::from(Span::styled(
            mnemonic.clone(),
            Style::default().fg(Color::LightBlue).add_modifier(Modifier::ITALIC),
        )));
    }
    if let Some(row) = state.rows.get(state.selected_row) {
        let inst = row.instrument;
        lines.push(Line::from(format!(
            "{} ({}), {}",
            inst.label(),
            inst.description(),
            if row.enabled { "on" } else { "muted" }
        )));
    }
    if !state.status_text.is_empty() {
        lines.push(Line::from(Span::styled(
            state.status_text.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    if ts.editing {
        lines.push(Line::from(Span::styled(EDIT_HELP, Style::default().fg(Color::Blue))));
    } else if ts.show_help {
        lines.push(Line::from(HELP));
    } else {
        lines.push(Line::from(Span::styled("? help", Style::default().fg(Color::DarkGray))));
    }

    let footer = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}

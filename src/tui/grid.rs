use std::ops::Range;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::shared::{ChannelRow, STEPS_PER_BEAT};

// "ls  100 " in front of every row
const LABEL_WIDTH: u16 = 9;

/// The page of steps that holds the playhead, `width` steps wide.
/// Pages start on a bar line so the view jumps rather than scrolls.
pub fn visible_window(length: usize, current: usize, width: usize) -> Range<usize> {
    let bar = STEPS_PER_BEAT as usize * 4;
    let width = if width >= bar { width - width % bar } else { width.max(1) };
    if length <= width {
        return 0..length;
    }
    let start = (current % length) / width * width;
    start..(start + width).min(length)
}

pub fn draw_channel_grid(
    frame: &mut Frame,
    area: Rect,
    rows: &[ChannelRow],
    current_step: usize,
    selected_row: usize,
    playing: bool,
    edit_step: Option<usize>,
) {
    let block = Block::default().borders(Borders::ALL).title(" Pattern ");
    let inner_width = area.width.saturating_sub(2 + LABEL_WIDTH) as usize;
    let length = rows.first().map_or(0, |r| r.notation.chars().count());
    // the page follows the edit cursor while editing
    let window = visible_window(length, edit_step.unwrap_or(current_step), inner_width);

    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let cursor = edit_step.filter(|_| idx == selected_row);
            channel_line(row, &window, current_step, idx == selected_row, playing, cursor)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn channel_line(
    row: &ChannelRow,
    window: &Range<usize>,
    current_step: usize,
    selected: bool,
    playing: bool,
    cursor: Option<usize>,
) -> Line<'static> {
    let base = if !row.enabled {
        Style::default().fg(Color::DarkGray)
    } else if row.instrument.is_surdo() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    };
    let label_style = if selected {
        base.add_modifier(Modifier::REVERSED)
    } else {
        base
    };

    let mut spans = vec![Span::styled(
        format!("{:<3}{:>4} ", row.instrument.code(), row.volume),
        label_style,
    )];
    spans.push(Span::raw(" "));

    let beat = STEPS_PER_BEAT as usize;
    for (step, c) in row.notation.chars().enumerate().skip(window.start).take(window.len()) {
        let shown = if c == ' ' && step % beat == 0 { '·' } else { c };
        let style = if cursor == Some(step) {
            base.bg(Color::Blue).add_modifier(Modifier::BOLD)
        } else if playing && step == current_step {
            base.bg(Color::Magenta).add_modifier(Modifier::BOLD)
        } else if step % (beat * 4) == 0 {
            base.add_modifier(Modifier::UNDERLINED)
        } else {
            base
        };
        spans.push(Span::styled(shown.to_string(), style));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_patterns_fit_in_one_page() {
        assert_eq!(visible_window(16, 5, 80), 0..16);
        assert_eq!(visible_window(0, 0, 80), 0..0);
    }

    #[test]
    fn long_patterns_page_on_bar_lines() {
        // 70 columns hold four bars
        assert_eq!(visible_window(128, 10, 70), 0..64);
        assert_eq!(visible_window(128, 64, 70), 64..128);
        assert_eq!(visible_window(100, 99, 70), 64..100);
        // narrower than a bar still shows something
        assert_eq!(visible_window(64, 20, 10), 20..30);
    }

    #[test]
    fn edit_cursor_marks_only_its_step() {
        let row = ChannelRow {
            instrument: crate::shared::Instrument::Sn,
            enabled: true,
            volume: 100,
            notation: "X.X.".to_string(),
        };
        let line = channel_line(&row, &(0..4), 0, true, true, Some(2));
        // label and spacer come first
        let steps = &line.spans[2..];
        assert_eq!(steps[2].style.bg, Some(Color::Blue));
        assert_eq!(steps[0].style.bg, Some(Color::Magenta));
        assert_eq!(steps[1].style.bg, None);
    }
}

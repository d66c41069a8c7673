use std::time::Duration;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crate::shared::InputEvent;
use super::mode::TuiState;

const ROW_VOLUME_STEP: i8 = 5;

// poll for input from tui and resolve keys into input events for the middle layer
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code, ts));
    }
    Ok(vec![])
}

// keys the step editor takes over; anything else falls through to the player keys
fn handle_edit_key(code: KeyCode) -> Option<InputEvent> {
    let event = match code {
        KeyCode::Esc => InputEvent::ToggleEdit,
        KeyCode::Left => InputEvent::MoveEditStep(-1),
        KeyCode::Right => InputEvent::MoveEditStep(1),
        KeyCode::Backspace | KeyCode::Delete => InputEvent::WriteStep(' '),
        KeyCode::Char('x') => InputEvent::WriteStep('X'),
        KeyCode::Char(c @ ('X' | '.' | 'a' | 'o' | 'f' | 'h' | 'r' | 's' | 'z' | '0')) => InputEvent::WriteStep(c),
        KeyCode::Char('c') => InputEvent::ClearRow,
        KeyCode::Char('q') => return Some(InputEvent::ToggleEdit),
        _ => return None,
    };
    Some(event)
}

fn handle_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    if ts.editing {
        if let Some(event) = handle_edit_key(code) {
            return vec![event];
        }
    }
    match code {
        KeyCode::Esc | KeyCode::Char('q') => vec![InputEvent::Quit],
        KeyCode::Char(' ') => vec![InputEvent::PlayPress],
        KeyCode::Char('s') => vec![InputEvent::StopPress],
        KeyCode::Tab => vec![InputEvent::NextVariant],
        KeyCode::Char('e') => vec![InputEvent::ToggleEdit],

        KeyCode::Char('[') => vec![InputEvent::TempoDown],
        KeyCode::Char(']') => vec![InputEvent::TempoUp],
        KeyCode::Char('-') => vec![InputEvent::VolumeDown],
        KeyCode::Char('=' | '+') => vec![InputEvent::VolumeUp],

        // one key per instrument row, in Instrument::ALL order
        KeyCode::Char(c @ '1'..='9') => vec![InputEvent::ToggleInstrument(c as u8 - b'1')],

        KeyCode::Up => vec![InputEvent::SelectRow(-1)],
        KeyCode::Down => vec![InputEvent::SelectRow(1)],
        KeyCode::Left => vec![InputEvent::RowVolume(-ROW_VOLUME_STEP)],
        KeyCode::Right => vec![InputEvent::RowVolume(ROW_VOLUME_STEP)],

        KeyCode::Char('?') => {
            ts.show_help = !ts.show_help;
            vec![]
        }
        _ => vec![],
    }
}

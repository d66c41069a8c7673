// state local to tui, mirrors the keybinds shown in the help line
// playing and editing are synced from DisplayState per loop
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub show_help: bool, // toggled with '?'
    pub playing: bool,
    pub editing: bool,
}

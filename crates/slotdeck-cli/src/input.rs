//! Keyboard input handling for the TUI.
//!
//! Normal mode forwards performance keys to the router; command mode edits a
//! slash command in an [`InputBuffer`].

use crossterm::event::{ KeyCode, KeyEventKind };

use slotdeck_core::Key;


/// Current input mode of the application.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum InputMode {
    /// Performance keys go to the focused buffer.
    #[default]
    Normal,

    /// Typing a slash command.
    Command,
}


/// Maps a terminal key to a router key, if the router knows it.
pub fn router_key( code: KeyCode ) -> Option<Key> {
    match code {
        KeyCode::Char( c ) => Some( Key::char( c ) ),
        KeyCode::Enter => Some( Key::Enter ),
        KeyCode::Backspace => Some( Key::Backspace ),
        KeyCode::Tab => Some( Key::Tab ),
        _ => None,
    }
}


/// Decides whether a key event should reach the router as a release.
///
/// Terminals with keyboard enhancement report real releases. Without it only
/// presses arrive, so a press stands in for the release.
pub fn is_release( kind: KeyEventKind, enhanced: bool ) -> bool {
    match kind {
        KeyEventKind::Release => true,
        KeyEventKind::Press => !enhanced,
        KeyEventKind::Repeat => false,
    }
}


/// Input buffer for command text entry.
#[derive( Debug, Default )]
pub struct InputBuffer {
    content: String,
    cursor: usize,
}


impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }


    /// Inserts a character at the cursor position.
    pub fn insert( &mut self, c: char ) {
        self.content.insert( self.cursor, c );
        self.cursor += c.len_utf8();
    }


    /// Deletes the character before the cursor.
    pub fn backspace( &mut self ) {
        if self.cursor > 0 {
            let prev = self.prev_boundary();
            self.content.remove( prev );
            self.cursor = prev;
        }
    }


    pub fn clear( &mut self ) {
        self.content.clear();
        self.cursor = 0;
    }


    pub fn content( &self ) -> &str {
        &self.content
    }


    /// Cursor position as a character count (for display).
    pub fn cursor_char_pos( &self ) -> usize {
        self.content[ ..self.cursor ].chars().count()
    }


    pub fn move_left( &mut self ) {
        self.cursor = self.prev_boundary();
    }


    pub fn move_right( &mut self ) {
        self.cursor = self.content[ self.cursor.. ]
            .chars()
            .next()
            .map_or( self.cursor, |c| self.cursor + c.len_utf8() );
    }


    pub fn is_empty( &self ) -> bool {
        self.content.is_empty()
    }


    fn prev_boundary( &self ) -> usize {
        self.content[ ..self.cursor ]
            .char_indices()
            .last()
            .map( |( i, _ )| i )
            .unwrap_or( 0 )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_editing_multibyte_text() {
        let mut buffer = InputBuffer::new();
        for c in "file né".chars() {
            buffer.insert( c );
        }
        buffer.move_left();
        buffer.backspace();
        assert_eq!( buffer.content(), "file é" );
        assert_eq!( buffer.cursor_char_pos(), 5 );

        buffer.move_right();
        buffer.move_right();
        assert_eq!( buffer.cursor_char_pos(), 6 );
        buffer.clear();
        assert!( buffer.is_empty() );
    }


    #[test]
    fn test_release_detection() {
        assert!( is_release( KeyEventKind::Release, true ) );
        assert!( !is_release( KeyEventKind::Press, true ) );
        assert!( is_release( KeyEventKind::Press, false ) );
        assert!( !is_release( KeyEventKind::Repeat, false ) );
    }


    #[test]
    fn test_router_keys() {
        assert_eq!( router_key( KeyCode::Char( 'Q' ) ), Some( Key::Char( 'q' ) ) );
        assert_eq!( router_key( KeyCode::Backspace ), Some( Key::Backspace ) );
        assert_eq!( router_key( KeyCode::F( 1 ) ), None );
    }
}

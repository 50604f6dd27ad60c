//! View mode management for the TUI.


/// Current view mode of the application.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum ViewMode {
    /// Buffer bank with bindings, positions and transport state.
    #[default]
    Buffers,

    /// Collections and their sizes.
    Collections,

    /// Help overlay - lists actions and default bindings.
    Help,
}


impl ViewMode {
    /// Returns the next view in tab order (excluding Help overlay).
    pub fn next_tab( self ) -> Self {
        match self {
            ViewMode::Buffers => ViewMode::Collections,
            ViewMode::Collections => ViewMode::Buffers,
            ViewMode::Help => ViewMode::Help, // Help stays on Help until dismissed
        }
    }


    pub fn title( &self ) -> &'static str {
        match self {
            ViewMode::Buffers => "Buffers",
            ViewMode::Collections => "Collections",
            ViewMode::Help => "Help",
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_tab_cycles_and_help_stays() {
        assert_eq!( ViewMode::default().next_tab(), ViewMode::Collections );
        assert_eq!( ViewMode::Collections.next_tab(), ViewMode::Buffers );
        assert_eq!( ViewMode::Help.next_tab(), ViewMode::Help );
    }
}

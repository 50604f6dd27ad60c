//! Canonical control actions.
//!
//! Every input device is reduced to this vocabulary before anything touches
//! buffer state. Actions also have a short textual form, parsed by
//! [`Action::parse`], for the command prompt and for logs.

use std::fmt;
use std::str::FromStr;

use serde::{ Deserialize, Serialize };
use thiserror::Error;


/// Errors that can occur while parsing an action.
#[derive( Debug, Error, PartialEq, Eq )]
pub enum ActionError {
    #[error( "Unknown action: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// Movement through an ordered list (files, collections, patches).
#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum Step {
    Next,
    Prev,
    Random,
    /// Absolute zero-based index, wrapped into range by the receiver.
    Index( usize ),
}


impl Step {
    /// Resolves the step against a list of `len` items.
    ///
    /// `current` is the present position, if any. `random` is only consulted
    /// for [`Step::Random`] and must return a value in `0..len`.
    pub fn resolve( self, current: Option<usize>, len: usize, random: impl FnOnce( usize ) -> usize ) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let index = match ( self, current ) {
            ( Step::Next, Some( c ) ) => ( c + 1 ) % len,
            ( Step::Next, None ) => 0,
            ( Step::Prev, Some( c ) ) => ( c % len + len - 1 ) % len,
            ( Step::Prev, None ) => len - 1,
            ( Step::Random, _ ) => random( len ) % len,
            ( Step::Index( i ), _ ) => i % len,
        };
        Some( index )
    }
}


impl FromStr for Step {
    type Err = ActionError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "next" | "n" | "+" => Ok( Step::Next ),
            "prev" | "previous" | "p" | "-" => Ok( Step::Prev ),
            "random" | "rand" | "r" => Ok( Step::Random ),
            other => match other.parse::<usize>() {
                Ok( n ) if n >= 1 => Ok( Step::Index( n - 1 ) ),
                _ => Err( ActionError::InvalidArgument(
                    format!( "'{}'. Use 'next', 'prev', 'random' or a number from 1", s )
                )),
            },
        }
    }
}


/// Playhead operations for time-based media.
#[derive( Debug, Clone, Copy, PartialEq, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum TimeShift {
    Forward,
    Backward,
    Reset,
    Random,
    /// Seek to this fraction (0.0 to 1.0) of the duration.
    Fraction( f64 ),
}


impl FromStr for TimeShift {
    type Err = ActionError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "forward" | "fwd" | "f" => Ok( TimeShift::Forward ),
            "backward" | "back" | "b" => Ok( TimeShift::Backward ),
            "reset" | "0" => Ok( TimeShift::Reset ),
            "random" | "rand" => Ok( TimeShift::Random ),
            other => match other.parse::<f64>() {
                Ok( f ) if ( 0.0..=1.0 ).contains( &f ) => Ok( TimeShift::Fraction( f ) ),
                _ => Err( ActionError::InvalidArgument(
                    format!( "'{}'. Use 'forward', 'backward', 'reset', 'random' or 0.0-1.0", s )
                )),
            },
        }
    }
}


/// Playback rate operations for time-based media.
#[derive( Debug, Clone, Copy, PartialEq, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum SpeedShift {
    Faster,
    Slower,
    Normal,
    Random,
    /// Direct rate, clamped by the buffer.
    Rate( f64 ),
}


impl FromStr for SpeedShift {
    type Err = ActionError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "faster" | "up" => Ok( SpeedShift::Faster ),
            "slower" | "down" => Ok( SpeedShift::Slower ),
            "normal" | "reset" => Ok( SpeedShift::Normal ),
            "random" | "rand" => Ok( SpeedShift::Random ),
            other => match other.trim_end_matches( 'x' ).parse::<f64>() {
                Ok( rate ) if rate.is_finite() && rate > 0.0 => Ok( SpeedShift::Rate( rate ) ),
                _ => Err( ActionError::InvalidArgument(
                    format!( "'{}'. Use 'faster', 'slower', 'normal', 'random' or a rate", s )
                )),
            },
        }
    }
}


/// A canonical control action.
#[derive( Debug, Clone, Copy, PartialEq, Serialize, Deserialize )]
#[serde( tag = "action", content = "arg", rename_all = "camelCase" )]
pub enum Action {
    /// Give input focus to a buffer slot (zero-based).
    Focus( usize ),
    SwitchFile( Step ),
    SwitchCollection( Step ),
    TimeShift( TimeShift ),
    SpeedShift( SpeedShift ),
    TogglePlay,
    ToggleMute,
    SwitchPatch( Step ),
    SwitchCamera,
    /// Hold note-triggered actions until the controller has been idle a while.
    ToggleChill,
    /// Rescan the library and merge what is new.
    RefreshLibrary,
}


impl Action {
    /// Returns true for actions that do not need a focused buffer.
    pub fn is_global( &self ) -> bool {
        matches!(
            self,
            Action::Focus( _ )
                | Action::SwitchPatch( _ )
                | Action::SwitchCamera
                | Action::ToggleChill
                | Action::RefreshLibrary
        )
    }


    /// Parses the textual form of an action (without a leading `/`).
    ///
    /// @param input - e.g. `"file next"`, `"speed 1.5"`, `"focus 2"`
    ///
    /// @returns The parsed action or an error
    pub fn parse( input: &str ) -> Result<Self, ActionError> {
        let input = input.trim();
        let mut parts = input.splitn( 2, ' ' );
        let verb = parts.next().unwrap_or( "" ).to_lowercase();
        let arg = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );
        let require = |what: &str| arg.ok_or_else( || ActionError::MissingArgument( what.into() ) );

        match verb.as_str() {
            "focus" | "fo" => {
                let slot = require( "slot number" )?;
                match slot.parse::<usize>() {
                    Ok( n ) if n >= 1 => Ok( Action::Focus( n - 1 ) ),
                    _ => Err( ActionError::InvalidArgument( format!( "Invalid slot: '{}'", slot ) ) ),
                }
            }
            "file" | "fi" => Ok( Action::SwitchFile( require( "direction" )?.parse()? ) ),
            "collection" | "col" => Ok( Action::SwitchCollection( require( "direction" )?.parse()? ) ),
            "time" | "seek" => Ok( Action::TimeShift( require( "time operation" )?.parse()? ) ),
            "speed" | "rate" => Ok( Action::SpeedShift( require( "speed operation" )?.parse()? ) ),
            "play" | "pause" | "toggle" => Ok( Action::TogglePlay ),
            "mute" | "unmute" => Ok( Action::ToggleMute ),
            "patch" => Ok( Action::SwitchPatch( arg.unwrap_or( "next" ).parse()? ) ),
            "camera" | "cam" => Ok( Action::SwitchCamera ),
            "chill" => Ok( Action::ToggleChill ),
            "rescan" | "refresh" => Ok( Action::RefreshLibrary ),

            "" => Err( ActionError::Unknown( "empty action".into() ) ),
            other => Err( ActionError::Unknown( other.to_string() ) ),
        }
    }


    /// Returns a brief description of the action for help text.
    pub fn description( &self ) -> &'static str {
        match self {
            Action::Focus( _ ) => "Focus a buffer",
            Action::SwitchFile( _ ) => "Load another file from the bound collection",
            Action::SwitchCollection( _ ) => "Bind another collection",
            Action::TimeShift( _ ) => "Move the playhead",
            Action::SpeedShift( _ ) => "Change the playback rate",
            Action::TogglePlay => "Play/pause",
            Action::ToggleMute => "Mute/unmute",
            Action::SwitchPatch( _ ) => "Switch visual patch",
            Action::SwitchCamera => "Switch camera",
            Action::ToggleChill => "Toggle chill mode",
            Action::RefreshLibrary => "Rescan the library",
        }
    }
}


fn step_text( step: &Step ) -> String {
    match step {
        Step::Next => "next".into(),
        Step::Prev => "prev".into(),
        Step::Random => "random".into(),
        Step::Index( i ) => ( i + 1 ).to_string(),
    }
}


impl fmt::Display for Action {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        match self {
            Action::Focus( slot ) => write!( f, "focus {}", slot + 1 ),
            Action::SwitchFile( s ) => write!( f, "file {}", step_text( s ) ),
            Action::SwitchCollection( s ) => write!( f, "collection {}", step_text( s ) ),
            Action::TimeShift( t ) => match t {
                TimeShift::Forward => f.write_str( "time forward" ),
                TimeShift::Backward => f.write_str( "time backward" ),
                TimeShift::Reset => f.write_str( "time reset" ),
                TimeShift::Random => f.write_str( "time random" ),
                TimeShift::Fraction( x ) => write!( f, "time {:.3}", x ),
            },
            Action::SpeedShift( s ) => match s {
                SpeedShift::Faster => f.write_str( "speed faster" ),
                SpeedShift::Slower => f.write_str( "speed slower" ),
                SpeedShift::Normal => f.write_str( "speed normal" ),
                SpeedShift::Random => f.write_str( "speed random" ),
                SpeedShift::Rate( r ) => write!( f, "speed {:.2}", r ),
            },
            Action::TogglePlay => f.write_str( "play" ),
            Action::ToggleMute => f.write_str( "mute" ),
            Action::SwitchPatch( s ) => write!( f, "patch {}", step_text( s ) ),
            Action::SwitchCamera => f.write_str( "camera" ),
            Action::ToggleChill => f.write_str( "chill" ),
            Action::RefreshLibrary => f.write_str( "rescan" ),
        }
    }
}


/// Returns help text listing the textual actions.
pub fn help_text() -> &'static str {
    r#"Buffer Actions:
  /focus <n>          Focus buffer n                 [1-4]
  /file <dir|n>       next / prev / random / index   [q w e]
  /collection <dir|n> next / prev / random / index   [r t y]
  /time <op>          forward / backward / reset / random / 0.0-1.0
  /speed <op>         faster / slower / normal / random / rate
  /play               Toggle play/pause              [Enter]
  /mute               Toggle mute                    [Backspace]

Global Actions:
  /patch [dir|n]      Switch visual patch            [b]
  /camera             Switch camera                  [v]
  /chill              Hold MIDI notes for 2s         [grid 7,15]

Library:
  /rescan             Merge newly added files        [grid 7,13]
  /save               Write current settings
  /quit               Exit slotdeck"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_focus_is_one_based() {
        assert_eq!( Action::parse( "focus 2" ), Ok( Action::Focus( 1 ) ) );
        assert!( matches!( Action::parse( "focus 0" ), Err( ActionError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_steps() {
        assert_eq!( Action::parse( "file next" ), Ok( Action::SwitchFile( Step::Next ) ) );
        assert_eq!( Action::parse( "col previous" ), Ok( Action::SwitchCollection( Step::Prev ) ) );
        assert_eq!( Action::parse( "file 3" ), Ok( Action::SwitchFile( Step::Index( 2 ) ) ) );
        assert_eq!( Action::parse( "patch" ), Ok( Action::SwitchPatch( Step::Next ) ) );
    }


    #[test]
    fn test_parse_transport() {
        assert_eq!( Action::parse( "time back" ), Ok( Action::TimeShift( TimeShift::Backward ) ) );
        assert_eq!( Action::parse( "seek 0.5" ), Ok( Action::TimeShift( TimeShift::Fraction( 0.5 ) ) ) );
        assert_eq!( Action::parse( "speed 2x" ), Ok( Action::SpeedShift( SpeedShift::Rate( 2.0 ) ) ) );
        assert_eq!( Action::parse( "speed up" ), Ok( Action::SpeedShift( SpeedShift::Faster ) ) );
        assert_eq!( Action::parse( "pause" ), Ok( Action::TogglePlay ) );
    }


    #[test]
    fn test_parse_errors() {
        assert!( matches!( Action::parse( "warp 9" ), Err( ActionError::Unknown( _ ) ) ) );
        assert!( matches!( Action::parse( "file" ), Err( ActionError::MissingArgument( _ ) ) ) );
        assert!( matches!( Action::parse( "time 1.5" ), Err( ActionError::InvalidArgument( _ ) ) ) );
        assert!( matches!( Action::parse( "speed -1" ), Err( ActionError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_display_parses_back() {
        let actions = [
            Action::Focus( 3 ),
            Action::SwitchCollection( Step::Index( 4 ) ),
            Action::TimeShift( TimeShift::Reset ),
            Action::SpeedShift( SpeedShift::Normal ),
            Action::SwitchCamera,
            Action::ToggleChill,
            Action::RefreshLibrary,
        ];
        for action in actions {
            assert_eq!( Action::parse( &action.to_string() ), Ok( action ) );
        }
    }


    #[test]
    fn test_help_keys_follow_collection_order() {
        let line = help_text().lines().find( |l| l.contains( "/collection" ) ).unwrap();
        assert!( line.contains( "next / prev / random" ) );
        assert!( line.ends_with( "[r t y]" ) );
    }


    #[test]
    fn test_step_resolve_wraps() {
        assert_eq!( Step::Next.resolve( Some( 2 ), 3, |_| 0 ), Some( 0 ) );
        assert_eq!( Step::Prev.resolve( Some( 0 ), 3, |_| 0 ), Some( 2 ) );
        assert_eq!( Step::Index( 7 ).resolve( None, 3, |_| 0 ), Some( 1 ) );
        assert_eq!( Step::Random.resolve( None, 3, |len| len - 1 ), Some( 2 ) );
        assert_eq!( Step::Next.resolve( None, 0, |_| 0 ), None );
    }
}

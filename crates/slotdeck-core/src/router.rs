//! Input dispatch router
//!
//! Reduces keyboard, MIDI and grid events to canonical [`Action`]s and
//! applies them to the session. Failures are logged and swallowed so device
//! events keep flowing.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };
use tokio::time::Instant;

use crate::action::{ Action, SpeedShift, Step, TimeShift };
use crate::buffer::{ MAX_RATE, MIN_RATE };
use crate::config::SessionConfig;
use crate::debounce::{ repeat_interval, AutoRepeat, Debouncer };
use crate::grid::{ GridKey, GridMap, LedFrame, LedGrid };
use crate::session::Session;


const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;

/// Controller values below this start the backward-style repeat.
pub const CC_LOW: u8 = 54;
/// Controller values above this start the forward-style repeat.
pub const CC_HIGH: u8 = 74;
const CC_MAX: u8 = 127;

/// Quiet time a note must see before its actions run in chill mode.
pub const CHILL_DELAY: Duration = Duration::from_millis( 2000 );


/// A keyboard key, as far as the router cares.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum Key {
    /// A printable key, lowercased.
    Char( char ),
    Enter,
    Backspace,
    Escape,
    Tab,
}


impl Key {
    pub fn char( c: char ) -> Self {
        Key::Char( c.to_ascii_lowercase() )
    }
}


impl FromStr for Key {
    type Err = String;

    /// Accepts key names (`"Enter"`, `"q"`) and layout codes (`"KeyQ"`, `"Digit1"`).
    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        let code = s.strip_prefix( "Key" ).or_else( || s.strip_prefix( "Digit" ) ).unwrap_or( s );
        let mut chars = code.chars();
        match ( chars.next(), chars.next() ) {
            ( Some( c ), None ) => return Ok( Key::char( c ) ),
            ( None, _ ) => return Err( "Empty key code".to_string() ),
            _ => {}
        }

        match code.to_lowercase().as_str() {
            "enter" | "return" => Ok( Key::Enter ),
            "backspace" => Ok( Key::Backspace ),
            "escape" | "esc" => Ok( Key::Escape ),
            "tab" => Ok( Key::Tab ),
            "space" => Ok( Key::Char( ' ' ) ),
            _ => Err( format!( "Unknown key code: '{}'", s ) ),
        }
    }
}


impl fmt::Display for Key {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        match self {
            Key::Char( c ) => write!( f, "{}", c ),
            Key::Enter => f.write_str( "Enter" ),
            Key::Backspace => f.write_str( "Backspace" ),
            Key::Escape => f.write_str( "Escape" ),
            Key::Tab => f.write_str( "Tab" ),
        }
    }
}


/// One already-decoded device event.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum InputEvent {
    Key { key: Key, released: bool },
    Midi { status: u8, data1: u8, data2: u8 },
    Grid { key: GridKey, pressed: bool },
}


const KEY_TABLE: &[( Key, Action )] = &[
    ( Key::Char( '1' ), Action::Focus( 0 ) ),
    ( Key::Char( '2' ), Action::Focus( 1 ) ),
    ( Key::Char( '3' ), Action::Focus( 2 ) ),
    ( Key::Char( '4' ), Action::Focus( 3 ) ),
    ( Key::Char( 'q' ), Action::SwitchFile( Step::Prev ) ),
    ( Key::Char( 'w' ), Action::SwitchFile( Step::Next ) ),
    ( Key::Char( 'e' ), Action::SwitchFile( Step::Random ) ),
    ( Key::Char( 'r' ), Action::SwitchCollection( Step::Next ) ),
    ( Key::Char( 't' ), Action::SwitchCollection( Step::Prev ) ),
    ( Key::Char( 'y' ), Action::SwitchCollection( Step::Random ) ),
    ( Key::Char( 'a' ), Action::TimeShift( TimeShift::Backward ) ),
    ( Key::Char( 's' ), Action::TimeShift( TimeShift::Forward ) ),
    ( Key::Char( 'd' ), Action::TimeShift( TimeShift::Random ) ),
    ( Key::Char( 'z' ), Action::SpeedShift( SpeedShift::Slower ) ),
    ( Key::Char( 'x' ), Action::SpeedShift( SpeedShift::Faster ) ),
    ( Key::Char( 'c' ), Action::SpeedShift( SpeedShift::Normal ) ),
    ( Key::Char( 'v' ), Action::SwitchCamera ),
    ( Key::Char( 'b' ), Action::SwitchPatch( Step::Next ) ),
    ( Key::Enter, Action::TogglePlay ),
    ( Key::Backspace, Action::ToggleMute ),
];


const NOTE_TABLE: &[( u8, &[Action] )] = &[
    ( 11, &[ Action::SwitchFile( Step::Next ) ] ),
    ( 12, &[ Action::SwitchFile( Step::Prev ) ] ),
    ( 23, &[ Action::Focus( 0 ) ] ),
    ( 61, &[ Action::Focus( 0 ) ] ),
    ( 53, &[ Action::Focus( 1 ) ] ),
    ( 62, &[ Action::Focus( 1 ) ] ),
    ( 28, &[ Action::Focus( 0 ), Action::SpeedShift( SpeedShift::Faster ) ] ),
    ( 29, &[ Action::Focus( 0 ), Action::SpeedShift( SpeedShift::Slower ) ] ),
    ( 58, &[ Action::Focus( 1 ), Action::SpeedShift( SpeedShift::Faster ) ] ),
    ( 59, &[ Action::Focus( 1 ), Action::SpeedShift( SpeedShift::Slower ) ] ),
    ( 63, &[ Action::SwitchPatch( Step::Random ) ] ),
    ( 64, &[ Action::TimeShift( TimeShift::Random ) ] ),
    ( 65, &[ Action::SpeedShift( SpeedShift::Random ) ] ),
    ( 66, &[ Action::SwitchFile( Step::Random ) ] ),
    ( 67, &[ Action::TimeShift( TimeShift::Backward ) ] ),
    ( 68, &[ Action::SwitchCamera ] ),
    ( 69, &[ Action::SwitchPatch( Step::Next ) ] ),
    ( 70, &[ Action::SpeedShift( SpeedShift::Slower ) ] ),
    ( 71, &[ Action::SpeedShift( SpeedShift::Faster ) ] ),
    ( 72, &[ Action::SpeedShift( SpeedShift::Normal ) ] ),
];


/// What a continuous controller drives.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
enum Control {
    /// Proportional index into the patch list.
    PatchSelect,
    /// Proportional index into the non-empty collections.
    CollectionSelect,
    /// Direct playback rate around a centred dead zone.
    SpeedRate,
    /// Proportional index into the focused buffer's collection.
    FileSelect,
    TimeRepeat,
    SpeedRepeat,
}


const CC_TABLE: &[( u8, Control )] = &[
    ( 37, Control::PatchSelect ),
    ( 38, Control::CollectionSelect ),
    ( 39, Control::SpeedRate ),
    ( 40, Control::TimeRepeat ),
    ( 41, Control::FileSelect ),
    ( 43, Control::SpeedRepeat ),
];


fn control_for( cc: u8 ) -> Option<Control> {
    CC_TABLE.iter().find( |( n, _ )| *n == cc ).map( |( _, c )| *c )
}


/// Maps a 0-127 controller value onto an index in `0..len`.
fn proportional( value: u8, len: usize ) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some( ( ( value as usize + 1 ) * len / 128 ).min( len - 1 ) )
}


/// Maps a controller value onto a playback rate, with 1.0 across the dead zone.
pub fn speed_from_cc( value: u8 ) -> f64 {
    let value = value.min( CC_MAX ) as f64;
    let ( low, high, max ) = ( CC_LOW as f64, CC_HIGH as f64, CC_MAX as f64 );
    if value < low {
        MIN_RATE + ( value / low ) * ( 1.0 - MIN_RATE )
    } else if value > high {
        1.0 + ( ( value - high ) / ( max - high ) ) * ( MAX_RATE - 1.0 )
    } else {
        1.0
    }
}


/// Routes device events to the session.
#[derive( Debug )]
pub struct Router {
    keys: HashMap<Key, Action>,
    notes: HashMap<u8, &'static [Action]>,
    debouncer: Debouncer,
    held_notes: Debouncer,
    repeat: AutoRepeat,
    leds: LedGrid,
    rng: StdRng,
}


impl Router {
    /// Creates a router with the static device tables.
    pub fn new( config: &SessionConfig ) -> Self {
        Self::with_rng( config, StdRng::from_os_rng() )
    }


    /// Like [`Router::new`] with a caller-supplied random source for kiosk mode.
    pub fn with_rng( config: &SessionConfig, rng: StdRng ) -> Self {
        Self {
            keys: KEY_TABLE.iter().copied().collect(),
            notes: NOTE_TABLE.iter().copied().collect(),
            debouncer: Debouncer::new( config.debounce() ),
            held_notes: Debouncer::new( CHILL_DELAY ),
            repeat: AutoRepeat::new(),
            leds: LedGrid::new(),
            rng,
        }
    }


    /// Dispatches one event and returns how many actions were applied.
    ///
    /// Controller changes only enter the debouncer here; their actions run
    /// from [`Router::poll`] once the window elapses.
    pub fn dispatch( &mut self, session: &mut Session, event: InputEvent, now: Instant ) -> usize {
        match event {
            InputEvent::Key { released: false, .. } => 0,
            InputEvent::Key { key, released: true } => match self.keys.get( &key ).copied() {
                Some( action ) => self.apply( session, action ),
                None => {
                    tracing::trace!( "Unmapped key {}", key );
                    0
                }
            },

            InputEvent::Midi { status, data1, data2 } => match status & 0xF0 {
                NOTE_ON if data2 > 0 => match self.notes.get( &data1 ).copied() {
                    Some( _ ) if session.is_chill() => {
                        self.held_notes.push( data1, data2, now );
                        0
                    }
                    Some( actions ) => actions.iter().map( |&a| self.apply( session, a ) ).sum(),
                    None => {
                        tracing::trace!( "Unmapped note {}", data1 );
                        0
                    }
                },
                CONTROL_CHANGE if control_for( data1 ).is_some() => {
                    self.debouncer.push( data1, data2, now );
                    0
                }
                _ => 0,
            },

            InputEvent::Grid { pressed: false, .. } => 0,
            InputEvent::Grid { key, pressed: true } => match GridMap::for_session( session ).get( key ) {
                Some( action ) => self.apply( session, action ),
                None => {
                    tracing::trace!( "Unmapped grid key {}", key );
                    0
                }
            },
        }
    }


    /// Applies a single action, logging instead of failing.
    pub fn apply( &mut self, session: &mut Session, action: Action ) -> usize {
        let result = session.apply( action );
        self.leds.mark_dirty();
        match result {
            Ok(()) => 1,
            Err( e ) => {
                tracing::warn!( "{} had no effect: {}", action, e );
                0
            }
        }
    }


    /// Runs everything due at `now`: settled controller values, notes held
    /// back by chill mode, and repeats.
    pub fn poll( &mut self, session: &mut Session, now: Instant ) -> usize {
        let mut applied = 0;
        for ( cc, value ) in self.debouncer.take_due( now ) {
            applied += self.control_change( session, cc, value, now );
        }
        for ( number, _ ) in self.held_notes.take_due( now ) {
            let actions = self.notes.get( &number ).copied().unwrap_or_default();
            applied += actions.iter().map( |&a| self.apply( session, a ) ).sum::<usize>();
        }
        for action in self.repeat.take_due( now ) {
            applied += self.apply( session, action );
        }
        applied
    }


    /// Earliest instant at which [`Router::poll`] has work.
    pub fn next_deadline( &self ) -> Option<Instant> {
        [ self.debouncer.next_deadline(), self.held_notes.next_deadline(), self.repeat.next_deadline() ]
            .into_iter()
            .flatten()
            .min()
    }


    /// One unattended step: make sure a buffer has focus, then switch to a
    /// random patch (one time in three) or run a random grid action.
    ///
    /// Chill and library refresh are never picked.
    pub fn kiosk_step( &mut self, session: &mut Session ) -> usize {
        let mut applied = 0;
        if session.buffers().focused().is_none() {
            applied += self.apply( session, Action::Focus( 0 ) );
        }

        if self.rng.random_range( 0..3 ) == 2 {
            return applied + self.apply( session, Action::SwitchPatch( Step::Random ) );
        }

        let candidates: Vec<Action> = GridMap::for_session( session ).actions()
            .filter( |a| !matches!( a, Action::ToggleChill | Action::RefreshLibrary ) )
            .collect();
        if candidates.is_empty() {
            return applied;
        }
        let action = candidates[ self.rng.random_range( 0..candidates.len() ) ];
        tracing::debug!( "Kiosk runs {}", action );
        applied + self.apply( session, action )
    }


    pub fn mark_dirty( &mut self ) {
        self.leds.mark_dirty();
    }


    /// Recomputes the LED frame if anything changed since the last refresh.
    pub fn refresh_leds( &mut self, session: &Session ) -> Option<LedFrame> {
        self.leds.refresh( session )
    }


    fn control_change( &mut self, session: &mut Session, cc: u8, value: u8, now: Instant ) -> usize {
        let Some( control ) = control_for( cc ) else {
            return 0;
        };
        tracing::debug!( "cc {} settled at {}", cc, value );

        match control {
            Control::PatchSelect => match proportional( value, session.patches().len() ) {
                Some( i ) => self.apply( session, Action::SwitchPatch( Step::Index( i ) ) ),
                None => 0,
            },
            Control::CollectionSelect => {
                let names = session.catalog().non_empty_names();
                let Some( i ) = proportional( value, names.len() ) else {
                    return 0;
                };
                let unchanged = session.focused().and_then( |b| b.bound_collection() ) == Some( names[ i ] );
                if unchanged {
                    return 0;
                }
                self.apply( session, Action::SwitchCollection( Step::Index( i ) ) )
            }
            Control::SpeedRate => self.apply( session, Action::SpeedShift( SpeedShift::Rate( speed_from_cc( value ) ) ) ),
            Control::FileSelect => {
                let len = session.focused()
                    .and_then( |b| b.bound_collection() )
                    .and_then( |name| session.catalog().collection( name ) )
                    .map_or( 0, |c| c.len() );
                match proportional( value, len ) {
                    Some( i ) => self.apply( session, Action::SwitchFile( Step::Index( i ) ) ),
                    None => 0,
                }
            }
            Control::TimeRepeat => self.drive_repeat(
                session,
                cc,
                value,
                ( Action::TimeShift( TimeShift::Backward ), Action::TimeShift( TimeShift::Forward ) ),
                now,
            ),
            Control::SpeedRepeat => self.drive_repeat(
                session,
                cc,
                value,
                ( Action::SpeedShift( SpeedShift::Slower ), Action::SpeedShift( SpeedShift::Faster ) ),
                now,
            ),
        }
    }


    /// Starts, retunes or cancels the repeat owned by `cc`.
    fn drive_repeat(
        &mut self,
        session: &mut Session,
        cc: u8,
        value: u8,
        ( backward, forward ): ( Action, Action ),
        now: Instant,
    ) -> usize {
        let ( action, interval ) = if value < CC_LOW {
            ( backward, repeat_interval( CC_LOW - value, CC_LOW ) )
        } else if value > CC_HIGH {
            ( forward, repeat_interval( value - CC_HIGH, CC_MAX - CC_HIGH ) )
        } else {
            self.repeat.cancel( cc );
            return 0;
        };

        self.repeat.start( cc, action, interval, now );
        self.apply( session, action )
    }
}


#[cfg( test )]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::session::tests::{ catalog, config, session };
    use crate::session::NullSink;


    fn release( c: char ) -> InputEvent {
        InputEvent::Key { key: Key::char( c ), released: true }
    }


    fn cc( number: u8, value: u8 ) -> InputEvent {
        InputEvent::Midi { status: CONTROL_CHANGE, data1: number, data2: value }
    }


    fn note( number: u8, velocity: u8 ) -> InputEvent {
        InputEvent::Midi { status: NOTE_ON, data1: number, data2: velocity }
    }


    #[test]
    fn test_key_codes() {
        assert_eq!( "KeyQ".parse::<Key>(), Ok( Key::Char( 'q' ) ) );
        assert_eq!( "Digit3".parse::<Key>(), Ok( Key::Char( '3' ) ) );
        assert_eq!( "W".parse::<Key>(), Ok( Key::Char( 'w' ) ) );
        assert_eq!( "Backspace".parse::<Key>(), Ok( Key::Backspace ) );
        assert!( "F13".parse::<Key>().is_err() );
    }


    #[test]
    fn test_keys_fire_on_release_only() {
        let mut session = session();
        let mut router = Router::new( &config() );
        let now = Instant::now();

        let press = InputEvent::Key { key: Key::char( 'w' ), released: false };
        assert_eq!( router.dispatch( &mut session, press, now ), 0 );
        assert_eq!( session.focused().unwrap().position(), Some( 0 ) );

        assert_eq!( router.dispatch( &mut session, release( 'w' ), now ), 1 );
        assert_eq!( session.focused().unwrap().position(), Some( 1 ) );

        assert_eq!( router.dispatch( &mut session, release( '3' ), now ), 1 );
        assert_eq!( session.buffers().focused(), Some( 2 ) );
    }


    #[test]
    fn test_failures_do_not_escape() {
        let mut session = session();
        let mut router = Router::new( &config() );
        let now = Instant::now();

        // Slot 3 does not exist in a three-buffer session.
        assert_eq!( router.dispatch( &mut session, release( '4' ), now ), 0 );
        assert_eq!( session.buffers().focused(), Some( 0 ) );
        assert_eq!( router.dispatch( &mut session, release( 'm' ), now ), 0 );
    }


    #[test]
    fn test_note_sequences_and_note_off() {
        let mut session = session();
        let mut router = Router::new( &config() );
        let now = Instant::now();

        assert_eq!( router.dispatch( &mut session, note( 58, 0 ), now ), 0 );
        assert_eq!( router.dispatch( &mut session, InputEvent::Midi { status: 0x80, data1: 58, data2: 64 }, now ), 0 );

        // Buffer 1 is unbound: the speed change is declined but still counts.
        assert_eq!( router.dispatch( &mut session, note( 58, 100 ), now ), 2 );
        assert_eq!( session.buffers().focused(), Some( 1 ) );

        router.dispatch( &mut session, note( 28, 100 ), now );
        assert_eq!( session.buffers().focused(), Some( 0 ) );
        assert_eq!( session.focused().unwrap().playback_rate(), 2.0 );
    }


    #[test]
    fn test_cc_stream_dispatches_last_value_once() {
        let mut session = session();
        let mut router = Router::new( &config() );
        let start = Instant::now();

        for ( i, value ) in [ 40, 41, 42 ].into_iter().enumerate() {
            let at = start + Duration::from_millis( 20 * i as u64 );
            assert_eq!( router.dispatch( &mut session, cc( 39, value ), at ), 0 );
        }
        assert_eq!( session.focused().unwrap().playback_rate(), 1.0 );

        assert_eq!( router.poll( &mut session, start + Duration::from_millis( 150 ) ), 0 );
        assert_eq!( router.next_deadline(), Some( start + Duration::from_millis( 190 ) ) );
        assert_eq!( router.poll( &mut session, start + Duration::from_millis( 190 ) ), 1 );
        assert_eq!( session.focused().unwrap().playback_rate(), speed_from_cc( 42 ) );
        assert_eq!( router.poll( &mut session, start + Duration::from_secs( 1 ) ), 0 );
        assert_eq!( router.next_deadline(), None );
    }


    #[test]
    fn test_time_repeat_runs_until_centred() {
        let mut session = session();
        let mut router = Router::new( &config() );
        let start = Instant::now();

        router.dispatch( &mut session, cc( 40, 127 ), start );
        let settled = start + Duration::from_millis( 150 );
        assert_eq!( router.poll( &mut session, settled ), 1 );
        assert_eq!( session.focused().unwrap().resource().unwrap().current_time, 10.0 );

        let fired = router.poll( &mut session, settled + Duration::from_millis( 50 ) );
        assert_eq!( fired, 1 );
        assert_eq!( session.focused().unwrap().resource().unwrap().current_time, 20.0 );

        router.dispatch( &mut session, cc( 40, 64 ), settled + Duration::from_millis( 60 ) );
        router.poll( &mut session, settled + Duration::from_millis( 210 ) );
        assert_eq!( router.poll( &mut session, settled + Duration::from_secs( 2 ) ), 0 );
        assert_eq!( session.focused().unwrap().resource().unwrap().current_time, 20.0 );
    }


    #[test]
    fn test_proportional_selectors() {
        let mut session = session();
        let mut router = Router::new( &config() );
        let start = Instant::now();
        let settled = start + Duration::from_millis( 150 );

        // Videos holds two entries; the top half of the travel picks the second.
        router.dispatch( &mut session, cc( 41, 100 ), start );
        assert_eq!( router.poll( &mut session, settled ), 1 );
        assert_eq!( session.focused().unwrap().position(), Some( 1 ) );

        router.dispatch( &mut session, cc( 37, 127 ), start );
        router.poll( &mut session, settled );
        assert_eq!( session.patch(), Some( 2 ) );

        // Index 1 is the already-bound Videos collection.
        router.dispatch( &mut session, cc( 38, 30 ), start );
        assert_eq!( router.poll( &mut session, settled ), 0 );
        router.dispatch( &mut session, cc( 38, 0 ), start );
        assert_eq!( router.poll( &mut session, settled ), 1 );
        assert_eq!( session.focused().unwrap().bound_collection(), Some( "Images" ) );
    }


    #[test]
    fn test_grid_press_and_release() {
        let mut session = session();
        let mut router = Router::new( &config() );
        let now = Instant::now();
        assert!( router.refresh_leds( &session ).is_some() );
        assert!( router.refresh_leds( &session ).is_none() );

        let key = GridKey::new( 7, 1 );
        assert_eq!( router.dispatch( &mut session, InputEvent::Grid { key, pressed: false }, now ), 0 );
        assert_eq!( router.dispatch( &mut session, InputEvent::Grid { key, pressed: true }, now ), 1 );
        assert_eq!( session.buffers().focused(), Some( 1 ) );

        let frame = router.refresh_leds( &session ).unwrap();
        assert_eq!( frame[ 7 ][ 1 ], crate::grid::LED_ACTIVE );
    }


    #[test]
    fn test_chill_holds_notes_until_quiet() {
        let mut session = session();
        let mut router = Router::new( &config() );
        let start = Instant::now();

        let chill = InputEvent::Grid { key: GridKey::new( 7, 15 ), pressed: true };
        assert_eq!( router.dispatch( &mut session, chill, start ), 1 );
        assert!( session.is_chill() );

        assert_eq!( router.dispatch( &mut session, note( 11, 100 ), start ), 0 );
        assert_eq!( router.poll( &mut session, start + Duration::from_secs( 1 ) ), 0 );
        router.dispatch( &mut session, note( 11, 90 ), start + Duration::from_secs( 1 ) );
        assert_eq!( router.next_deadline(), Some( start + Duration::from_secs( 1 ) + CHILL_DELAY ) );

        assert_eq!( router.poll( &mut session, start + Duration::from_millis( 2500 ) ), 0 );
        assert_eq!( session.focused().unwrap().position(), Some( 0 ) );
        assert_eq!( router.poll( &mut session, start + Duration::from_secs( 3 ) ), 1 );
        assert_eq!( session.focused().unwrap().position(), Some( 1 ) );
        assert_eq!( router.next_deadline(), None );

        router.dispatch( &mut session, chill, start + Duration::from_secs( 4 ) );
        assert_eq!( router.dispatch( &mut session, note( 11, 100 ), start + Duration::from_secs( 4 ) ), 1 );
        assert_eq!( session.focused().unwrap().position(), Some( 0 ) );
    }


    #[test]
    fn test_refresh_button_requests_rescan() {
        let mut session = session();
        let mut router = Router::new( &config() );
        let key = GridKey::new( 7, 13 );

        assert_eq!( router.dispatch( &mut session, InputEvent::Grid { key, pressed: true }, Instant::now() ), 1 );
        assert!( session.take_refresh_request() );
    }


    #[test]
    fn test_kiosk_focuses_and_never_toggles_modes() {
        let config = SessionConfig { initial_focus: None, ..config() };
        let mut session = Session::with_rng( catalog(), &config, Box::new( NullSink ), StdRng::seed_from_u64( 5 ) );
        let mut router = Router::with_rng( &config, StdRng::seed_from_u64( 9 ) );

        router.kiosk_step( &mut session );
        assert!( session.buffers().focused().is_some() );

        for _ in 0..200 {
            router.kiosk_step( &mut session );
            assert!( session.buffers().focused().is_some() );
            assert!( !session.is_chill() );
            assert!( !session.take_refresh_request() );
        }
        assert!( session.patch().is_some() );
    }


    #[test]
    fn test_speed_curve() {
        assert_eq!( speed_from_cc( 0 ), MIN_RATE );
        assert_eq!( speed_from_cc( 64 ), 1.0 );
        assert_eq!( speed_from_cc( 127 ), MAX_RATE );
        assert!( speed_from_cc( 53 ) < 1.0 );
        assert!( speed_from_cc( 75 ) > 1.0 );
    }
}

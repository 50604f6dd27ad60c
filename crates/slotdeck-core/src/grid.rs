//! Button grid mapping and LED feedback
//!
//! Buttons are addressed as `"row,col"`. Rows 0 and 2-7 carry controls; the
//! lit state of every button is recomputed from the session only when the
//! model has been marked dirty.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::action::{ Action, SpeedShift, Step, TimeShift };
use crate::buffer::SPEED_PRESETS;
use crate::session::Session;


pub const GRID_ROWS: usize = 8;
pub const GRID_COLS: usize = 16;

/// Brightness of a mapped, inactive button.
pub const LED_MAPPED: u8 = 4;
/// Brightness of the playhead row background.
pub const LED_PLAYHEAD: u8 = 2;
/// Brightness of an active button.
pub const LED_ACTIVE: u8 = 15;

const PLAYHEAD_ROW: u8 = 0;
const PATCH_ROW: u8 = 2;
const COLLECTION_ROW: u8 = 3;
const SPEED_ROW: u8 = 4;
const TIME_ROW: u8 = 5;
const FILE_ROW: u8 = 6;
const FOCUS_ROW: u8 = 7;

/// First column of the per-item buttons on the patch, collection and speed rows.
const ITEM_COL: u8 = 4;
/// Row 7 right-hand buttons; focus buttons stop before them.
const REFRESH_COL: u8 = 13;
const CAMERA_COL: u8 = 14;
const CHILL_COL: u8 = 15;

/// Brightness per button, row-major.
pub type LedFrame = [[u8; GRID_COLS]; GRID_ROWS];


/// Physical position of a grid button.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord )]
pub struct GridKey {
    pub row: u8,
    pub col: u8,
}


impl GridKey {
    pub fn new( row: u8, col: u8 ) -> Self {
        Self { row, col }
    }


    /// Converts device coordinates (`x` = column, `y` = row), rejecting
    /// positions outside the grid.
    pub fn from_device( x: u8, y: u8 ) -> Option<Self> {
        ( ( y as usize ) < GRID_ROWS && ( x as usize ) < GRID_COLS ).then_some( Self { row: y, col: x } )
    }
}


impl fmt::Display for GridKey {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "{},{}", self.row, self.col )
    }
}


impl FromStr for GridKey {
    type Err = String;

    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        let ( row, col ) = s.split_once( ',' ).ok_or_else( || format!( "Invalid grid key: '{}'", s ) )?;
        let row = row.trim().parse::<u8>().map_err( |e| format!( "Invalid row '{}': {}", row, e ) )?;
        let col = col.trim().parse::<u8>().map_err( |e| format!( "Invalid column '{}': {}", col, e ) )?;
        GridKey::from_device( col, row ).ok_or_else( || format!( "Grid key out of range: '{}'", s ) )
    }
}


/// Button-to-action table for the current session.
///
/// The first three columns of rows 2-6 and the playhead row are fixed. The
/// per-item buttons follow the session's presets, non-empty collections,
/// patches and buffers.
#[derive( Debug, Clone, Default, PartialEq )]
pub struct GridMap {
    buttons: BTreeMap<GridKey, Action>,
}


impl GridMap {
    pub fn for_session( session: &Session ) -> Self {
        let mut map = Self::default();

        map.triple( FILE_ROW, Action::SwitchFile( Step::Prev ), Action::SwitchFile( Step::Next ), Action::SwitchFile( Step::Random ) );
        map.triple(
            TIME_ROW,
            Action::TimeShift( TimeShift::Backward ),
            Action::TimeShift( TimeShift::Forward ),
            Action::TimeShift( TimeShift::Random ),
        );
        map.triple(
            SPEED_ROW,
            Action::SpeedShift( SpeedShift::Slower ),
            Action::SpeedShift( SpeedShift::Faster ),
            Action::SpeedShift( SpeedShift::Normal ),
        );
        map.triple(
            COLLECTION_ROW,
            Action::SwitchCollection( Step::Prev ),
            Action::SwitchCollection( Step::Next ),
            Action::SwitchCollection( Step::Random ),
        );
        map.triple( PATCH_ROW, Action::SwitchPatch( Step::Prev ), Action::SwitchPatch( Step::Next ), Action::SwitchPatch( Step::Random ) );

        map.items( SPEED_ROW, SPEED_PRESETS.iter().map( |&rate| Action::SpeedShift( SpeedShift::Rate( rate ) ) ) );
        let collections = session.catalog().non_empty_names().len();
        map.items( COLLECTION_ROW, ( 0..collections ).map( |i| Action::SwitchCollection( Step::Index( i ) ) ) );
        map.items( PATCH_ROW, ( 0..session.patches().len() ).map( |i| Action::SwitchPatch( Step::Index( i ) ) ) );

        for col in 0..GRID_COLS as u8 {
            let fraction = col as f64 / GRID_COLS as f64;
            map.buttons.insert( GridKey::new( PLAYHEAD_ROW, col ), Action::TimeShift( TimeShift::Fraction( fraction ) ) );
        }

        for slot in 0..session.buffers().len().min( REFRESH_COL as usize ) {
            map.buttons.insert( GridKey::new( FOCUS_ROW, slot as u8 ), Action::Focus( slot ) );
        }
        map.buttons.insert( GridKey::new( FOCUS_ROW, REFRESH_COL ), Action::RefreshLibrary );
        map.buttons.insert( GridKey::new( FOCUS_ROW, CAMERA_COL ), Action::SwitchCamera );
        map.buttons.insert( GridKey::new( FOCUS_ROW, CHILL_COL ), Action::ToggleChill );

        map
    }


    fn triple( &mut self, row: u8, prev: Action, next: Action, random: Action ) {
        for ( col, action ) in [ prev, next, random ].into_iter().enumerate() {
            self.buttons.insert( GridKey::new( row, col as u8 ), action );
        }
    }


    fn items( &mut self, row: u8, actions: impl Iterator<Item = Action> ) {
        for ( col, action ) in ( ITEM_COL..GRID_COLS as u8 ).zip( actions ) {
            self.buttons.insert( GridKey::new( row, col ), action );
        }
    }


    pub fn get( &self, key: GridKey ) -> Option<Action> {
        self.buttons.get( &key ).copied()
    }


    pub fn keys( &self ) -> impl Iterator<Item = GridKey> + '_ {
        self.buttons.keys().copied()
    }


    pub fn actions( &self ) -> impl Iterator<Item = Action> + '_ {
        self.buttons.values().copied()
    }


    pub fn len( &self ) -> usize {
        self.buttons.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.buttons.is_empty()
    }
}


/// Lazily recomputed LED state.
#[derive( Debug, Clone )]
pub struct LedGrid {
    frame: LedFrame,
    dirty: bool,
}


impl Default for LedGrid {
    fn default() -> Self {
        Self::new()
    }
}


impl LedGrid {
    /// Creates a dark grid that will be computed on the first refresh.
    pub fn new() -> Self {
        Self {
            frame: [[ 0; GRID_COLS ]; GRID_ROWS],
            dirty: true,
        }
    }


    pub fn mark_dirty( &mut self ) {
        self.dirty = true;
    }


    pub fn is_dirty( &self ) -> bool {
        self.dirty
    }


    /// The last computed frame.
    pub fn frame( &self ) -> &LedFrame {
        &self.frame
    }


    /// Recomputes the frame if dirty and returns it; None when nothing changed.
    pub fn refresh( &mut self, session: &Session ) -> Option<LedFrame> {
        if !self.dirty {
            return None;
        }
        self.frame = render( session, &GridMap::for_session( session ) );
        self.dirty = false;
        Some( self.frame )
    }
}


fn render( session: &Session, map: &GridMap ) -> LedFrame {
    let mut frame = [[ 0; GRID_COLS ]; GRID_ROWS];
    // Columns past the grid edge are dropped.
    let mut light = |row: u8, col: usize, level: u8| {
        if let Some( cell ) = frame.get_mut( row as usize ).and_then( |r| r.get_mut( col ) ) {
            *cell = level;
        }
    };

    for key in map.keys() {
        light( key.row, key.col as usize, LED_MAPPED );
    }

    let focused = session.focused();

    if let Some( buffer ) = focused.filter( |_| session.focused_is_time_based() ) {
        for col in 0..GRID_COLS {
            light( PLAYHEAD_ROW, col, LED_PLAYHEAD );
        }
        if let Some( progress ) = buffer.progress() {
            let col = ( ( progress * GRID_COLS as f64 ) as usize ).min( GRID_COLS - 1 );
            light( PLAYHEAD_ROW, col, LED_ACTIVE );
        }
    }

    if let Some( slot ) = session.buffers().focused().filter( |&s| s < REFRESH_COL as usize ) {
        light( FOCUS_ROW, slot, LED_ACTIVE );
    }
    if session.is_chill() {
        light( FOCUS_ROW, CHILL_COL as usize, LED_ACTIVE );
    }

    if let Some( buffer ) = focused {
        if buffer.resource().is_some() {
            let rate = buffer.playback_rate();
            if let Some( i ) = SPEED_PRESETS.iter().position( |p| ( p - rate ).abs() < 0.01 ) {
                light( SPEED_ROW, ITEM_COL as usize + i, LED_ACTIVE );
            }
        }
        if let Some( bound ) = buffer.bound_collection() {
            if let Some( i ) = session.catalog().non_empty_names().iter().position( |n| *n == bound ) {
                light( COLLECTION_ROW, ITEM_COL as usize + i, LED_ACTIVE );
            }
        }
    }

    if let Some( i ) = session.patch() {
        light( PATCH_ROW, ITEM_COL as usize + i, LED_ACTIVE );
    }

    frame
}


#[cfg( test )]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::collection::Catalog;
    use crate::config::SessionConfig;
    use crate::media::MediaEntry;
    use crate::session::tests::session;
    use crate::session::NullSink;


    #[test]
    fn test_grid_key_text_form() {
        let key: GridKey = "6,2".parse().unwrap();
        assert_eq!( key, GridKey::new( 6, 2 ) );
        assert_eq!( key.to_string(), "6,2" );
        assert!( "8,0".parse::<GridKey>().is_err() );
        assert!( "6;2".parse::<GridKey>().is_err() );
        assert_eq!( GridKey::from_device( 16, 0 ), None );
    }


    #[test]
    fn test_map_follows_session() {
        let session = session();
        let map = GridMap::for_session( &session );

        assert_eq!( map.get( GridKey::new( 6, 1 ) ), Some( Action::SwitchFile( Step::Next ) ) );
        assert_eq!( map.get( GridKey::new( 7, 2 ) ), Some( Action::Focus( 2 ) ) );
        assert_eq!( map.get( GridKey::new( 7, 3 ) ), None );
        assert_eq!( map.get( GridKey::new( 7, 13 ) ), Some( Action::RefreshLibrary ) );
        assert_eq!( map.get( GridKey::new( 7, 14 ) ), Some( Action::SwitchCamera ) );
        assert_eq!( map.get( GridKey::new( 7, 15 ) ), Some( Action::ToggleChill ) );
        assert_eq!( map.get( GridKey::new( 0, 8 ) ), Some( Action::TimeShift( TimeShift::Fraction( 0.5 ) ) ) );
        assert_eq!( map.get( GridKey::new( 4, 6 ) ), Some( Action::SpeedShift( SpeedShift::Rate( 1.0 ) ) ) );
        assert_eq!( map.get( GridKey::new( 2, 6 ) ), Some( Action::SwitchPatch( Step::Index( 2 ) ) ) );
        assert_eq!( map.get( GridKey::new( 2, 7 ) ), None );
        assert_eq!( map.get( GridKey::new( 1, 0 ) ), None );
    }


    #[test]
    fn test_refresh_only_when_dirty() {
        let mut session = session();
        let mut leds = LedGrid::new();

        let frame = leds.refresh( &session ).unwrap();
        assert!( leds.refresh( &session ).is_none() );

        // Buffer 0 holds a video at 1x with no known duration.
        assert_eq!( frame[ 7 ][ 0 ], LED_ACTIVE );
        assert_eq!( frame[ 7 ][ 1 ], LED_MAPPED );
        assert_eq!( frame[ 0 ][ 3 ], LED_PLAYHEAD );
        assert_eq!( frame[ 4 ][ 6 ], LED_ACTIVE );
        assert_eq!( frame[ 3 ][ 5 ], LED_ACTIVE );
        assert_eq!( frame[ 1 ][ 0 ], 0 );

        session.report_playhead( 0, 15.0, Some( 60.0 ) ).unwrap();
        session.apply( Action::SwitchPatch( Step::Index( 1 ) ) ).unwrap();
        leds.mark_dirty();
        let frame = leds.refresh( &session ).unwrap();
        assert_eq!( frame[ 0 ][ 4 ], LED_ACTIVE );
        assert_eq!( frame[ 0 ][ 3 ], LED_PLAYHEAD );
        assert_eq!( frame[ 2 ][ 5 ], LED_ACTIVE );
        assert_eq!( frame[ 2 ][ 4 ], LED_MAPPED );
    }


    #[test]
    fn test_chill_lights_its_button() {
        let mut session = session();
        let mut leds = LedGrid::new();

        assert_eq!( leds.refresh( &session ).unwrap()[ 7 ][ 15 ], LED_MAPPED );
        session.apply( Action::ToggleChill ).unwrap();
        leds.mark_dirty();
        assert_eq!( leds.refresh( &session ).unwrap()[ 7 ][ 15 ], LED_ACTIVE );
    }


    #[test]
    fn test_collections_past_the_grid_edge_stay_dark() {
        let entries: Vec<MediaEntry> = ( 0..300 )
            .map( |i| {
                let folder = format!( "f{:03}", i );
                MediaEntry::new( format!( "/library/{}/still.png", folder ), folder.clone(), folder )
            })
            .collect();
        let config = SessionConfig {
            visual_buffers: 1,
            audio_buffers: 0,
            initial_focus: Some( 0 ),
            ..Default::default()
        };
        let mut session = Session::with_rng( Catalog::from_entries( entries, None ), &config, Box::new( NullSink ), StdRng::seed_from_u64( 1 ) );
        let mut leds = LedGrid::new();

        for index in [ 11, 252, 260, 299 ] {
            session.apply( Action::SwitchCollection( Step::Index( index ) ) ).unwrap();
            leds.mark_dirty();
            let frame = leds.refresh( &session ).unwrap();
            let lit = frame[ 3 ].iter().filter( |&&level| level == LED_ACTIVE ).count();
            assert_eq!( lit, usize::from( index < GRID_COLS - ITEM_COL as usize ) );
        }
    }
}

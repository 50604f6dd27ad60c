//! Session context
//!
//! Owns the catalog, the buffer bank, the device-scoped globals (patch and
//! camera) and the rendering sink. Every canonical action is applied here,
//! one at a time, to completion.

use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };
use serde::Serialize;
use thiserror::Error;

use crate::action::{ Action, SpeedShift, Step, TimeShift };
use crate::buffer::{ Buffer, BufferBank, BufferError, BufferKind, BufferState, LoadOutcome, Resource };
use crate::collection::{ Catalog, CollectionError, MergeReport };
use crate::config::SessionConfig;
use crate::media::{ MediaEntry, MediaType };


/// Errors surfaced by [`Session::apply`]. None of them are fatal.
#[derive( Debug, Error, PartialEq )]
pub enum SessionError {
    #[error( transparent )]
    Buffer( #[from] BufferError ),

    #[error( transparent )]
    Collection( #[from] CollectionError ),

    #[error( "No buffer has focus" )]
    NoFocus,

    #[error( "No patches configured" )]
    NoPatches,

    #[error( "No cameras configured" )]
    NoCameras,
}


/// The rendering collaborator.
///
/// `bind_source` is called only when a buffer gets a new resource; a reused
/// resource that was pointed at another file goes through `repoint_source`.
pub trait RenderSink: Send {
    fn bind_source( &mut self, slot: usize, resource: &Resource );

    fn repoint_source( &mut self, _slot: usize, _resource: &Resource ) {}

    /// The buffer dropped its resource; the renderer should stop showing it.
    fn release_source( &mut self, _slot: usize ) {}

    /// Transport state (time, rate, pause, mute) of a buffer changed.
    fn transport( &mut self, _buffer: &Buffer ) {}

    fn select_patch( &mut self, _index: usize, _name: &str ) {}

    fn select_camera( &mut self, _index: usize ) {}
}


/// A sink that discards everything.
#[derive( Debug, Default, Clone, Copy )]
pub struct NullSink;


impl RenderSink for NullSink {
    fn bind_source( &mut self, _slot: usize, _resource: &Resource ) {}
}


/// Read-only view of one buffer for the presentation layer.
#[derive( Debug, Clone, PartialEq, Serialize )]
pub struct BufferSnapshot {
    pub slot: usize,
    pub kind: BufferKind,
    pub state: BufferState,
    pub focused: bool,
    pub collection: Option<String>,
    pub position: Option<usize>,
    pub collection_len: Option<usize>,
    pub media_type: Option<MediaType>,
    pub source: Option<String>,
    pub current_time: Option<f64>,
    pub duration: Option<f64>,
    pub playback_rate: f64,
    pub paused: bool,
    pub muted: bool,
}


/// Name and size of a collection.
#[derive( Debug, Clone, PartialEq, Eq, Serialize )]
pub struct CollectionSummary {
    pub name: String,
    pub len: usize,
}


/// Read-only view of the whole session, published after every dispatch.
#[derive( Debug, Clone, Default, PartialEq, Serialize )]
pub struct SessionSnapshot {
    pub buffers: Vec<BufferSnapshot>,
    pub collections: Vec<CollectionSummary>,
    pub entries: usize,
    pub focus: Option<usize>,
    pub patch: Option<String>,
    pub camera: usize,
    pub chill: bool,
}


/// The process-wide session context.
pub struct Session {
    catalog: Catalog,
    buffers: BufferBank,
    patches: Vec<String>,
    patch: Option<usize>,
    cameras: usize,
    camera: usize,
    chill: bool,
    refresh_requested: bool,
    sink: Box<dyn RenderSink>,
    rng: StdRng,
}


impl Session {
    /// Creates a session with the buffer layout from `config` and applies
    /// its startup bindings and focus.
    ///
    /// Startup bindings that fail are logged and skipped.
    pub fn new( catalog: Catalog, config: &SessionConfig, sink: Box<dyn RenderSink> ) -> Self {
        Self::with_rng( catalog, config, sink, StdRng::from_os_rng() )
    }


    /// Like [`Session::new`] with a caller-supplied random source.
    pub fn with_rng( catalog: Catalog, config: &SessionConfig, sink: Box<dyn RenderSink>, rng: StdRng ) -> Self {
        let mut session = Self {
            catalog,
            buffers: BufferBank::new( config.visual_buffers, config.audio_buffers ),
            patches: config.patches.clone(),
            patch: None,
            cameras: config.cameras,
            camera: 0,
            chill: false,
            refresh_requested: false,
            sink,
            rng,
        };

        for ( &slot, name ) in &config.collections {
            if let Err( e ) = session.bind( slot, name ) {
                tracing::warn!( "Startup binding of '{}' to buffer {} failed: {}", name, slot, e );
            }
        }
        if let Some( slot ) = config.initial_focus {
            if let Err( e ) = session.buffers.focus( slot ) {
                tracing::warn!( "Initial focus ignored: {}", e );
            }
        }
        session
    }


    pub fn catalog( &self ) -> &Catalog {
        &self.catalog
    }


    pub fn buffers( &self ) -> &BufferBank {
        &self.buffers
    }


    pub fn focused( &self ) -> Option<&Buffer> {
        self.buffers.focused().and_then( |slot| self.buffers.get( slot ) )
    }


    pub fn patches( &self ) -> &[String] {
        &self.patches
    }


    /// Index of the selected patch.
    pub fn patch( &self ) -> Option<usize> {
        self.patch
    }


    pub fn cameras( &self ) -> usize {
        self.cameras
    }


    pub fn camera( &self ) -> usize {
        self.camera
    }


    /// True while note-triggered actions wait for the controller to go quiet.
    pub fn is_chill( &self ) -> bool {
        self.chill
    }


    /// Returns true once per [`Action::RefreshLibrary`] applied since the
    /// last call.
    pub fn take_refresh_request( &mut self ) -> bool {
        std::mem::take( &mut self.refresh_requested )
    }


    /// Applies one action to completion.
    ///
    /// Buffer-scoped actions target the focused buffer and fail with
    /// [`SessionError::NoFocus`] when there is none. Transport actions the
    /// loaded media cannot honour are declined (with a warning) and still
    /// return Ok.
    pub fn apply( &mut self, action: Action ) -> Result<(), SessionError> {
        tracing::debug!( "Applying {}", action );

        match action {
            Action::Focus( slot ) => {
                self.buffers.focus( slot )?;
                tracing::info!( "Focus on buffer {}", slot );
                Ok(())
            }
            Action::SwitchFile( step ) => self.switch_file( step ),
            Action::SwitchCollection( step ) => self.switch_collection( step ),
            Action::TimeShift( op ) => self.time_shift( op ),
            Action::SpeedShift( op ) => self.speed_shift( op ),
            Action::TogglePlay => self.transport_with( |b, _| b.toggle_play() ),
            Action::ToggleMute => self.transport_with( |b, _| b.toggle_mute() ),
            Action::SwitchPatch( step ) => self.switch_patch( step ),
            Action::SwitchCamera => self.switch_camera(),
            Action::ToggleChill => {
                self.chill = !self.chill;
                tracing::info!( "Chill mode {}", if self.chill { "on" } else { "off" } );
                Ok(())
            }
            Action::RefreshLibrary => {
                self.refresh_requested = true;
                Ok(())
            }
        }
    }


    /// Binds a collection to a buffer slot and loads its first entry.
    pub fn bind( &mut self, slot: usize, name: &str ) -> Result<(), SessionError> {
        let buffer = self.buffers.get_mut( slot )?;
        let outcome = buffer.bind( &self.catalog, name );
        publish_load( self.sink.as_mut(), buffer, outcome )
    }


    /// Presents a source directly in a buffer, unbinding its collection.
    pub fn inject( &mut self, slot: usize, url: &str ) -> Result<(), SessionError> {
        let buffer = self.buffers.get_mut( slot )?;
        let outcome = buffer.inject( url, MediaType::from_locator( url ) );
        publish_load( self.sink.as_mut(), buffer, outcome )
    }


    /// Releases a buffer's resource and binding.
    pub fn clear( &mut self, slot: usize ) -> Result<(), SessionError> {
        if self.buffers.get_mut( slot )?.clear().is_some() {
            self.sink.release_source( slot );
        }
        Ok(())
    }


    /// Records the renderer's playhead for a buffer.
    pub fn report_playhead( &mut self, slot: usize, current_time: f64, duration: Option<f64> ) -> Result<(), SessionError> {
        self.buffers.get_mut( slot )?.report_playhead( current_time, duration );
        Ok(())
    }


    /// Merges newly discovered entries into the catalog.
    pub fn merge_new( &mut self, entries: impl IntoIterator<Item = MediaEntry> ) -> MergeReport {
        self.catalog.merge_new( entries )
    }


    /// Returns true when the focused buffer holds media with a playhead.
    pub fn focused_is_time_based( &self ) -> bool {
        self.focused()
            .and_then( |b| b.loaded_media_type() )
            .is_some_and( |t| t.is_time_based() )
    }


    fn switch_file( &mut self, step: Step ) -> Result<(), SessionError> {
        let Self { catalog, buffers, sink, rng, .. } = self;
        let buffer = buffers.focused_mut().ok_or( SessionError::NoFocus )?;
        let outcome = buffer.advance( catalog, step, rng );
        publish_load( sink.as_mut(), buffer, outcome )
    }


    /// Walks the non-empty collections relative to the focused buffer's binding.
    fn switch_collection( &mut self, step: Step ) -> Result<(), SessionError> {
        let Self { catalog, buffers, sink, rng, .. } = self;
        let buffer = buffers.focused_mut().ok_or( SessionError::NoFocus )?;

        let names = catalog.non_empty_names();
        let current = buffer.bound_collection()
            .and_then( |bound| names.iter().position( |n| *n == bound ) );
        let index = step.resolve( current, names.len(), |len| rng.random_range( 0..len ) )
            .ok_or_else( || CollectionError::MediaNotFound( "no non-empty collections".into() ) )?;
        let name = names[ index ].to_string();

        let outcome = buffer.bind( catalog, &name );
        publish_load( sink.as_mut(), buffer, outcome )
    }


    fn time_shift( &mut self, op: TimeShift ) -> Result<(), SessionError> {
        self.transport_with( |b, rng| b.time_shift( op, rng ) )
    }


    fn speed_shift( &mut self, op: SpeedShift ) -> Result<(), SessionError> {
        self.transport_with( |b, rng| b.speed_shift( op, rng ) )
    }


    /// Runs a transport operation on the focused buffer and tells the sink
    /// if it took effect.
    fn transport_with( &mut self, op: impl FnOnce( &mut Buffer, &mut StdRng ) -> bool ) -> Result<(), SessionError> {
        let buffer = self.buffers.focused_mut().ok_or( SessionError::NoFocus )?;
        if op( buffer, &mut self.rng ) {
            self.sink.transport( buffer );
        }
        Ok(())
    }


    fn switch_patch( &mut self, step: Step ) -> Result<(), SessionError> {
        let rng = &mut self.rng;
        let index = step.resolve( self.patch, self.patches.len(), |len| rng.random_range( 0..len ) )
            .ok_or( SessionError::NoPatches )?;

        self.patch = Some( index );
        let name = &self.patches[ index ];
        tracing::info!( "Patch {} ({})", index, name );
        self.sink.select_patch( index, name );
        Ok(())
    }


    fn switch_camera( &mut self ) -> Result<(), SessionError> {
        if self.cameras == 0 {
            return Err( SessionError::NoCameras );
        }
        self.camera = ( self.camera + 1 ) % self.cameras;
        tracing::info!( "Camera {}", self.camera );
        self.sink.select_camera( self.camera );
        Ok(())
    }


    /// Builds the read-only view published to the presentation layer.
    pub fn snapshot( &self ) -> SessionSnapshot {
        let buffers = self.buffers.iter()
            .map( |b| {
                let resource = b.resource();
                BufferSnapshot {
                    slot: b.slot(),
                    kind: b.kind(),
                    state: b.state(),
                    focused: b.has_focus(),
                    collection: b.bound_collection().map( str::to_string ),
                    position: b.position(),
                    collection_len: b.bound_collection()
                        .and_then( |name| self.catalog.collection( name ) )
                        .map( |c| c.len() ),
                    media_type: b.loaded_media_type(),
                    source: resource.map( |r| r.source.clone() ),
                    current_time: resource.filter( |r| r.kind.is_time_based() ).map( |r| r.current_time ),
                    duration: resource.and_then( |r| r.duration ),
                    playback_rate: b.playback_rate(),
                    paused: b.is_paused(),
                    muted: b.is_muted(),
                }
            })
            .collect();

        SessionSnapshot {
            buffers,
            collections: self.catalog.collections().iter()
                .map( |c| CollectionSummary { name: c.name().to_string(), len: c.len() } )
                .collect(),
            entries: self.catalog.len(),
            focus: self.buffers.focused(),
            patch: self.patch.and_then( |i| self.patches.get( i ) ).cloned(),
            camera: self.camera,
            chill: self.chill,
        }
    }
}


/// Forwards a load result to the sink and converts the error.
fn publish_load(
    sink: &mut dyn RenderSink,
    buffer: &Buffer,
    outcome: Result<LoadOutcome, BufferError>,
) -> Result<(), SessionError> {
    let outcome = outcome?;
    if let Some( resource ) = buffer.resource() {
        if outcome.rebuilt {
            sink.bind_source( buffer.slot(), resource );
        } else {
            sink.repoint_source( buffer.slot(), resource );
        }
    }
    Ok(())
}


#[cfg( test )]
pub( crate ) mod tests {
    use super::*;

    use std::sync::{ Arc, Mutex };


    /// Records sink calls as short strings.
    #[derive( Clone, Default )]
    pub( crate ) struct RecordingSink {
        pub calls: Arc<Mutex<Vec<String>>>,
    }


    impl RenderSink for RecordingSink {
        fn bind_source( &mut self, slot: usize, resource: &Resource ) {
            self.calls.lock().unwrap().push( format!( "bind {} {}", slot, resource.source ) );
        }

        fn repoint_source( &mut self, slot: usize, resource: &Resource ) {
            self.calls.lock().unwrap().push( format!( "repoint {} {}", slot, resource.source ) );
        }

        fn release_source( &mut self, slot: usize ) {
            self.calls.lock().unwrap().push( format!( "release {}", slot ) );
        }

        fn select_patch( &mut self, index: usize, name: &str ) {
            self.calls.lock().unwrap().push( format!( "patch {} {}", index, name ) );
        }

        fn select_camera( &mut self, index: usize ) {
            self.calls.lock().unwrap().push( format!( "camera {}", index ) );
        }
    }


    pub( crate ) fn catalog() -> Catalog {
        Catalog::from_entries( vec![
            MediaEntry::new( "/library/clips/a.mp4", "clips", "clips" ),
            MediaEntry::new( "/library/clips/b.mp4", "clips", "clips" ),
            MediaEntry::new( "/library/clips/c.png", "clips", "clips" ),
            MediaEntry::new( "/library/stills/d.jpg", "stills", "stills" ),
            MediaEntry::new( "/library/loop.mp3", "library", "" ),
        ], None )
    }


    pub( crate ) fn config() -> SessionConfig {
        SessionConfig {
            visual_buffers: 2,
            audio_buffers: 1,
            collections: [ ( 0, "Videos".to_string() ), ( 2, "Audios".to_string() ) ].into(),
            initial_focus: Some( 0 ),
            patches: vec![ "tunnel".into(), "mirror".into(), "grain".into() ],
            cameras: 2,
            ..Default::default()
        }
    }


    pub( crate ) fn session() -> Session {
        Session::with_rng( catalog(), &config(), Box::new( NullSink ), StdRng::seed_from_u64( 3 ) )
    }


    #[test]
    fn test_startup_bindings_and_focus() {
        let session = session();
        let snapshot = session.snapshot();

        assert_eq!( snapshot.focus, Some( 0 ) );
        assert_eq!( snapshot.buffers[ 0 ].collection.as_deref(), Some( "Videos" ) );
        assert_eq!( snapshot.buffers[ 1 ].state, BufferState::Unbound );
        assert_eq!( snapshot.buffers[ 2 ].media_type, Some( MediaType::Audio ) );
    }


    #[test]
    fn test_sink_sees_rebuilds_and_repoints() {
        let sink = RecordingSink::default();
        let calls = sink.calls.clone();
        let mut session = Session::with_rng( catalog(), &config(), Box::new( sink ), StdRng::seed_from_u64( 3 ) );

        session.apply( Action::SwitchFile( Step::Next ) ).unwrap();
        session.bind( 0, "clips" ).unwrap();
        session.apply( Action::SwitchFile( Step::Index( 2 ) ) ).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!( *calls, vec![
            "bind 0 /library/clips/a.mp4",
            "bind 2 /library/loop.mp3",
            "repoint 0 /library/clips/b.mp4",
            "repoint 0 /library/clips/a.mp4",
            "bind 0 /library/clips/c.png",
        ]);
    }


    #[test]
    fn test_clear_releases_source_once() {
        let sink = RecordingSink::default();
        let calls = sink.calls.clone();
        let mut session = Session::with_rng( catalog(), &config(), Box::new( sink ), StdRng::seed_from_u64( 3 ) );

        session.clear( 0 ).unwrap();
        session.clear( 0 ).unwrap();
        session.clear( 1 ).unwrap();

        assert_eq!( session.snapshot().buffers[ 0 ].state, BufferState::Unbound );
        assert_eq!( calls.lock().unwrap().last().map( String::as_str ), Some( "release 0" ) );
        assert_eq!( calls.lock().unwrap().iter().filter( |c| c.starts_with( "release" ) ).count(), 1 );
    }


    #[test]
    fn test_chill_and_refresh_are_session_flags() {
        let mut session = session();
        assert!( !session.is_chill() );
        assert!( !session.take_refresh_request() );

        session.apply( Action::ToggleChill ).unwrap();
        session.apply( Action::RefreshLibrary ).unwrap();
        assert!( session.snapshot().chill );
        assert!( session.take_refresh_request() );
        assert!( !session.take_refresh_request() );

        session.apply( Action::ToggleChill ).unwrap();
        assert!( !session.is_chill() );
    }


    #[test]
    fn test_buffer_actions_need_focus() {
        let mut config = config();
        config.initial_focus = None;
        let mut session = Session::with_rng( catalog(), &config, Box::new( NullSink ), StdRng::seed_from_u64( 3 ) );

        assert_eq!( session.apply( Action::SwitchFile( Step::Next ) ), Err( SessionError::NoFocus ) );
        assert_eq!( session.apply( Action::TogglePlay ), Err( SessionError::NoFocus ) );
        assert!( session.apply( Action::SwitchCamera ).is_ok() );
    }


    #[test]
    fn test_switch_collection_walks_non_empty_names() {
        let mut session = session();
        // Non-empty: Images, Videos, Audios, clips, stills, library
        session.apply( Action::SwitchCollection( Step::Prev ) ).unwrap();
        assert_eq!( session.focused().unwrap().bound_collection(), Some( "Images" ) );

        session.apply( Action::SwitchCollection( Step::Index( 3 ) ) ).unwrap();
        assert_eq!( session.focused().unwrap().bound_collection(), Some( "clips" ) );
        assert_eq!( session.focused().unwrap().position(), Some( 0 ) );
    }


    #[test]
    fn test_transport_follows_focus() {
        let mut session = session();
        session.apply( Action::SpeedShift( SpeedShift::Faster ) ).unwrap();
        session.apply( Action::Focus( 2 ) ).unwrap();
        session.apply( Action::ToggleMute ).unwrap();

        let snapshot = session.snapshot();
        assert_eq!( snapshot.buffers[ 0 ].playback_rate, 2.0 );
        assert!( !snapshot.buffers[ 0 ].muted );
        assert!( snapshot.buffers[ 2 ].muted );
        assert_eq!( snapshot.buffers[ 2 ].playback_rate, 1.0 );
    }


    #[test]
    fn test_failed_focus_keeps_previous() {
        let mut session = session();
        assert!( matches!( session.apply( Action::Focus( 7 ) ), Err( SessionError::Buffer( BufferError::NoSuchSlot( 7 ) ) ) ) );
        assert_eq!( session.buffers().focused(), Some( 0 ) );
    }


    #[test]
    fn test_patches_and_cameras_cycle() {
        let sink = RecordingSink::default();
        let calls = sink.calls.clone();
        let mut config = config();
        config.collections.clear();
        let mut session = Session::with_rng( catalog(), &config, Box::new( sink ), StdRng::seed_from_u64( 3 ) );

        session.apply( Action::SwitchPatch( Step::Prev ) ).unwrap();
        session.apply( Action::SwitchPatch( Step::Next ) ).unwrap();
        session.apply( Action::SwitchCamera ).unwrap();
        session.apply( Action::SwitchCamera ).unwrap();

        assert_eq!( session.snapshot().patch.as_deref(), Some( "tunnel" ) );
        assert_eq!( *calls.lock().unwrap(), vec![
            "patch 2 grain",
            "patch 0 tunnel",
            "camera 1",
            "camera 0",
        ]);
    }


    #[test]
    fn test_no_patches_configured() {
        let mut config = config();
        config.patches.clear();
        let mut session = Session::with_rng( catalog(), &config, Box::new( NullSink ), StdRng::seed_from_u64( 3 ) );
        assert_eq!( session.apply( Action::SwitchPatch( Step::Next ) ), Err( SessionError::NoPatches ) );
    }


    #[test]
    fn test_merge_new_extends_collections() {
        let mut session = session();
        let report = session.merge_new( vec![
            MediaEntry::new( "/library/clips/e.webm", "clips", "clips" ),
            MediaEntry::new( "/library/clips/a.mp4", "clips", "clips" ),
        ]);

        assert_eq!( report.added.len(), 1 );
        assert_eq!( report.skipped, 1 );
        assert_eq!( session.catalog().require( "Videos" ).unwrap().len(), 3 );
    }
}

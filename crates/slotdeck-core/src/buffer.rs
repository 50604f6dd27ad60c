//! Buffer state machine
//!
//! A buffer is one playback/display slot. It is bound to a collection, keeps
//! a position into it, and holds at most one presentation resource. The
//! resource is only rebuilt when the required [`ResourceKind`] changes;
//! otherwise it is repointed at the new source.

use rand::Rng;
use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::action::{ SpeedShift, Step, TimeShift };
use crate::collection::{ Catalog, EntryId };
use crate::media::{ MediaEntry, MediaType, ResourceKind };


/// Seconds moved by a forward/backward time shift.
pub const TIME_STEP_SECS: f64 = 10.0;

/// Ordered playback rate presets walked by faster/slower.
pub const SPEED_PRESETS: [f64; 6] = [ 0.25, 0.5, 1.0, 2.0, 4.0, 8.0 ];

/// Bounds applied to direct playback rates.
pub const MIN_RATE: f64 = 0.25;
pub const MAX_RATE: f64 = 8.0;


/// Errors that can occur during buffer operations.
#[derive( Debug, Error, PartialEq, Eq )]
pub enum BufferError {
    #[error( "Collection not found: {0}" )]
    CollectionNotFound( String ),

    #[error( "Media not found: {0}" )]
    MediaNotFound( String ),

    #[error( "No collection bound to buffer {0}" )]
    NoCollectionBound( usize ),

    #[error( "Cannot load {media_type} into {kind:?} buffer {slot}" )]
    UnsupportedMediaKind {
        slot: usize,
        kind: BufferKind,
        media_type: MediaType,
    },

    #[error( "No buffer in slot {0}" )]
    NoSuchSlot( usize ),
}


/// What a buffer is allowed to present. Fixed at creation.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum BufferKind {
    Visual,
    Audio,
}


impl BufferKind {
    /// Returns true if media of this type can be loaded into the buffer.
    pub fn accepts( &self, media_type: MediaType ) -> bool {
        match self {
            BufferKind::Visual => matches!( media_type, MediaType::Image | MediaType::Video ),
            BufferKind::Audio => media_type == MediaType::Audio,
        }
    }
}


/// Lifecycle state, derived from the binding and the loaded resource.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize )]
#[serde( rename_all = "lowercase" )]
pub enum BufferState {
    Unbound,
    Bound,
    Loaded,
}


/// Identity of a presentation resource. Changes only when a buffer rebuilds it.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize )]
pub struct ResourceId {
    pub slot: usize,
    pub generation: u64,
}


/// The presentation resource attached to a loaded buffer.
#[derive( Debug, Clone, PartialEq )]
pub struct Resource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub source: String,
    /// Playhead in seconds, reported by the renderer for time-based media.
    pub current_time: f64,
    /// Known once the renderer has read the media's metadata.
    pub duration: Option<f64>,
}


/// Result of a successful load.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct LoadOutcome {
    pub resource: ResourceId,
    /// True when a new resource was built; false when the old one was repointed.
    pub rebuilt: bool,
}


/// One independent playback/display slot.
#[derive( Debug, Clone )]
pub struct Buffer {
    kind: BufferKind,
    slot: usize,
    bound: Option<String>,
    position: Option<usize>,
    resource: Option<Resource>,
    loaded_type: Option<MediaType>,
    generation: u64,
    has_focus: bool,
    playback_rate: f64,
    muted: bool,
    paused: bool,
}


impl Buffer {
    /// Creates an unbound buffer.
    pub fn new( kind: BufferKind, slot: usize ) -> Self {
        Self {
            kind,
            slot,
            bound: None,
            position: None,
            resource: None,
            loaded_type: None,
            generation: 0,
            has_focus: false,
            playback_rate: 1.0,
            muted: false,
            paused: false,
        }
    }


    pub fn kind( &self ) -> BufferKind {
        self.kind
    }


    pub fn slot( &self ) -> usize {
        self.slot
    }


    pub fn state( &self ) -> BufferState {
        if self.resource.is_some() {
            BufferState::Loaded
        } else if self.bound.is_some() {
            BufferState::Bound
        } else {
            BufferState::Unbound
        }
    }


    /// Name of the bound collection, if any.
    pub fn bound_collection( &self ) -> Option<&str> {
        self.bound.as_deref()
    }


    /// Position in the bound collection; None while unbound.
    pub fn position( &self ) -> Option<usize> {
        self.position
    }


    pub fn loaded_media_type( &self ) -> Option<MediaType> {
        self.loaded_type
    }


    pub fn resource( &self ) -> Option<&Resource> {
        self.resource.as_ref()
    }


    pub fn has_focus( &self ) -> bool {
        self.has_focus
    }


    pub fn playback_rate( &self ) -> f64 {
        self.playback_rate
    }


    pub fn is_muted( &self ) -> bool {
        self.muted
    }


    pub fn is_paused( &self ) -> bool {
        self.paused
    }


    /// Binds a collection and loads its first entry.
    ///
    /// Fails without touching the buffer if the collection does not exist or
    /// is empty. If the first entry cannot be presented by this buffer, the
    /// binding still takes effect and the error is returned.
    pub fn bind( &mut self, catalog: &Catalog, name: &str ) -> Result<LoadOutcome, BufferError> {
        let collection = catalog.collection( name )
            .ok_or_else( || BufferError::CollectionNotFound( name.to_string() ) )?;
        let first = collection.get( 0 )
            .ok_or_else( || BufferError::MediaNotFound( format!( "collection '{}' is empty", name ) ) )?;

        tracing::info!( "Buffer {} bound to '{}'", self.slot, name );
        self.bound = Some( name.to_string() );
        self.position = Some( 0 );
        self.load_id( catalog, first )
    }


    /// Moves through the bound collection and loads the entry there.
    ///
    /// The new position is always wrapped into range. It is kept even if the
    /// entry at that position cannot be presented by this buffer.
    pub fn advance<R: Rng>(
        &mut self,
        catalog: &Catalog,
        step: Step,
        rng: &mut R,
    ) -> Result<LoadOutcome, BufferError> {
        let name = self.bound.clone().ok_or( BufferError::NoCollectionBound( self.slot ) )?;
        let collection = catalog.collection( &name )
            .ok_or_else( || BufferError::CollectionNotFound( name.clone() ) )?;

        let position = step.resolve( self.position, collection.len(), |len| rng.random_range( 0..len ) )
            .ok_or_else( || BufferError::MediaNotFound( format!( "collection '{}' is empty", name ) ) )?;
        let id = collection.get( position )
            .ok_or_else( || BufferError::MediaNotFound( format!( "position {} in '{}'", position, name ) ) )?;

        self.position = Some( position );
        self.load_id( catalog, id )
    }


    /// Loads the entry at a position of the bound collection.
    pub fn load_at( &mut self, catalog: &Catalog, position: usize ) -> Result<LoadOutcome, BufferError> {
        let name = self.bound.as_deref().ok_or( BufferError::NoCollectionBound( self.slot ) )?;
        let id = catalog.collection( name )
            .and_then( |c| c.get( position ) )
            .ok_or_else( || BufferError::MediaNotFound( format!( "position {} in '{}'", position, name ) ) )?;

        let outcome = self.load_id( catalog, id )?;
        self.position = Some( position );
        Ok( outcome )
    }


    /// Loads an entry of the bound collection by its URL.
    pub fn load_by_url( &mut self, catalog: &Catalog, url: &str ) -> Result<LoadOutcome, BufferError> {
        let name = self.bound.as_deref().ok_or( BufferError::NoCollectionBound( self.slot ) )?;
        let position = catalog.entry_by_url( url )
            .and_then( |( id, _ )| catalog.collection( name )?.position_of( id ) )
            .ok_or_else( || BufferError::MediaNotFound( url.to_string() ) )?;

        self.load_at( catalog, position )
    }


    /// Presents a source directly, decoupling the buffer from any collection.
    pub fn inject( &mut self, url: &str, media_type: MediaType ) -> Result<LoadOutcome, BufferError> {
        let entry = MediaEntry::from_url( url );
        let outcome = self.load_entry( &entry, media_type )?;
        self.bound = None;
        self.position = None;
        Ok( outcome )
    }


    fn load_id( &mut self, catalog: &Catalog, id: EntryId ) -> Result<LoadOutcome, BufferError> {
        let entry = catalog.entry( id )
            .ok_or_else( || BufferError::MediaNotFound( format!( "entry #{}", id ) ) )?;
        self.load_entry( entry, entry.media_type() )
    }


    /// Attaches an entry, reusing the current resource when its kind matches.
    ///
    /// Validation happens before any mutation.
    fn load_entry( &mut self, entry: &MediaEntry, media_type: MediaType ) -> Result<LoadOutcome, BufferError> {
        let unsupported = BufferError::UnsupportedMediaKind {
            slot: self.slot,
            kind: self.kind,
            media_type,
        };
        if !self.kind.accepts( media_type ) {
            return Err( unsupported );
        }
        let kind = media_type.resource_kind().ok_or( unsupported )?;

        let outcome = match self.resource.as_mut().filter( |r| r.kind == kind ) {
            Some( resource ) => {
                resource.source = entry.url().to_string();
                resource.current_time = 0.0;
                resource.duration = None;
                LoadOutcome { resource: resource.id, rebuilt: false }
            }
            None => {
                self.generation += 1;
                let id = ResourceId { slot: self.slot, generation: self.generation };
                self.resource = Some( Resource {
                    id,
                    kind,
                    source: entry.url().to_string(),
                    current_time: 0.0,
                    duration: None,
                });
                LoadOutcome { resource: id, rebuilt: true }
            }
        };

        self.loaded_type = Some( media_type );
        tracing::debug!(
            "Buffer {} loaded {} ({}, {})",
            self.slot,
            entry.url(),
            media_type,
            if outcome.rebuilt { "new resource" } else { "reused" }
        );
        Ok( outcome )
    }


    /// Records the renderer's playhead for the loaded resource.
    pub fn report_playhead( &mut self, current_time: f64, duration: Option<f64> ) {
        if let Some( resource ) = self.resource.as_mut().filter( |r| r.kind.is_time_based() ) {
            resource.current_time = current_time.max( 0.0 );
            resource.duration = duration.filter( |d| d.is_finite() && *d > 0.0 );
        }
    }


    /// Playhead as a fraction of the duration, when both are known.
    pub fn progress( &self ) -> Option<f64> {
        let resource = self.time_based()?;
        let duration = resource.duration?;
        Some( ( resource.current_time / duration ).clamp( 0.0, 1.0 ) )
    }


    fn time_based( &self ) -> Option<&Resource> {
        self.resource.as_ref().filter( |r| r.kind.is_time_based() )
    }


    fn time_based_mut( &mut self, operation: &str ) -> Option<&mut Resource> {
        let slot = self.slot;
        let loaded = self.loaded_type;
        let resource = self.resource.as_mut().filter( |r| r.kind.is_time_based() );
        if resource.is_none() {
            tracing::warn!( "Cannot {} buffer {} holding {:?}", operation, slot, loaded );
        }
        resource
    }


    /// Moves the playhead. Returns false (and warns) when declined.
    pub fn time_shift<R: Rng>( &mut self, op: TimeShift, rng: &mut R ) -> bool {
        let Some( resource ) = self.time_based_mut( "time shift" ) else {
            return false;
        };

        let target = match ( op, resource.duration ) {
            ( TimeShift::Forward, duration ) => {
                let t = resource.current_time + TIME_STEP_SECS;
                duration.map_or( t, |d| t.min( d ) )
            }
            ( TimeShift::Backward, _ ) => ( resource.current_time - TIME_STEP_SECS ).max( 0.0 ),
            ( TimeShift::Reset, _ ) => 0.0,
            ( TimeShift::Random, Some( d ) ) => rng.random::<f64>() * d,
            ( TimeShift::Fraction( f ), Some( d ) ) if f.is_finite() => f.clamp( 0.0, 1.0 ) * d,
            ( op, _ ) => {
                tracing::warn!( "Time shift {:?} declined on buffer {}: duration unknown", op, resource.id.slot );
                return false;
            }
        };

        resource.current_time = target;
        true
    }


    /// Changes the playback rate. Returns false (and warns) when declined.
    pub fn speed_shift<R: Rng>( &mut self, op: SpeedShift, rng: &mut R ) -> bool {
        if self.time_based_mut( "speed shift" ).is_none() {
            return false;
        }

        let last = SPEED_PRESETS.len() - 1;
        let rate = match op {
            SpeedShift::Rate( r ) if r.is_finite() => r.clamp( MIN_RATE, MAX_RATE ),
            SpeedShift::Rate( r ) => {
                tracing::warn!( "Ignoring playback rate {} on buffer {}", r, self.slot );
                return false;
            }
            SpeedShift::Normal => 1.0,
            SpeedShift::Faster => SPEED_PRESETS[ ( nearest_preset( self.playback_rate ) + 1 ).min( last ) ],
            SpeedShift::Slower => SPEED_PRESETS[ nearest_preset( self.playback_rate ).saturating_sub( 1 ) ],
            SpeedShift::Random => SPEED_PRESETS[ rng.random_range( 0..SPEED_PRESETS.len() ) ],
        };

        self.playback_rate = rate;
        true
    }


    /// Toggles play/pause on time-based media.
    pub fn toggle_play( &mut self ) -> bool {
        if self.time_based_mut( "toggle play on" ).is_none() {
            return false;
        }
        self.paused = !self.paused;
        true
    }


    /// Toggles mute on time-based media.
    pub fn toggle_mute( &mut self ) -> bool {
        if self.time_based_mut( "toggle mute on" ).is_none() {
            return false;
        }
        self.muted = !self.muted;
        true
    }


    /// Releases the resource and unbinds the collection. Returns the
    /// resource that was attached, if any.
    pub fn clear( &mut self ) -> Option<Resource> {
        self.loaded_type = None;
        self.bound = None;
        self.position = None;
        tracing::debug!( "Buffer {} cleared", self.slot );
        self.resource.take()
    }
}


/// Index of the preset closest to `rate`.
fn nearest_preset( rate: f64 ) -> usize {
    SPEED_PRESETS.iter()
        .enumerate()
        .min_by( |( _, a ), ( _, b )| {
            ( *a - rate ).abs().total_cmp( &( *b - rate ).abs() )
        })
        .map( |( i, _ )| i )
        .unwrap_or( 2 )
}


/// The fixed array of buffers and the focus they share.
#[derive( Debug, Clone )]
pub struct BufferBank {
    buffers: Vec<Buffer>,
}


impl BufferBank {
    /// Creates `visual` visual buffers followed by `audio` audio buffers.
    pub fn new( visual: usize, audio: usize ) -> Self {
        let buffers = ( 0..visual ).map( |_| BufferKind::Visual )
            .chain( ( 0..audio ).map( |_| BufferKind::Audio ) )
            .enumerate()
            .map( |( slot, kind )| Buffer::new( kind, slot ) )
            .collect();
        Self { buffers }
    }


    /// Moves focus to `slot`, clearing it everywhere else in the same step.
    pub fn focus( &mut self, slot: usize ) -> Result<(), BufferError> {
        if slot >= self.buffers.len() {
            return Err( BufferError::NoSuchSlot( slot ) );
        }
        for buffer in &mut self.buffers {
            buffer.has_focus = buffer.slot == slot;
        }
        Ok(())
    }


    /// Slot of the focused buffer.
    pub fn focused( &self ) -> Option<usize> {
        self.buffers.iter().position( |b| b.has_focus )
    }


    pub fn focused_mut( &mut self ) -> Option<&mut Buffer> {
        self.buffers.iter_mut().find( |b| b.has_focus )
    }


    pub fn get( &self, slot: usize ) -> Option<&Buffer> {
        self.buffers.get( slot )
    }


    pub fn get_mut( &mut self, slot: usize ) -> Result<&mut Buffer, BufferError> {
        self.buffers.get_mut( slot ).ok_or( BufferError::NoSuchSlot( slot ) )
    }


    pub fn iter( &self ) -> impl Iterator<Item = &Buffer> {
        self.buffers.iter()
    }


    pub fn len( &self ) -> usize {
        self.buffers.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.buffers.is_empty()
    }
}


#[cfg( test )]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::media::MediaEntry;


    fn catalog() -> Catalog {
        Catalog::from_entries( vec![
            MediaEntry::new( "/library/clips/a.mp4", "clips", "clips" ),
            MediaEntry::new( "/library/clips/b.mov", "clips", "clips" ),
            MediaEntry::new( "/library/clips/c.png", "clips", "clips" ),
            MediaEntry::new( "/library/clips/d.mp3", "clips", "clips" ),
            MediaEntry::new( "/library/loop.mp3", "library", "" ),
        ], None )
    }


    fn rng() -> StdRng {
        StdRng::seed_from_u64( 7 )
    }


    #[test]
    fn test_bind_resets_position_and_loads() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Visual, 0 );
        assert_eq!( buffer.state(), BufferState::Unbound );

        let outcome = buffer.bind( &catalog, "Videos" ).unwrap();
        assert!( outcome.rebuilt );
        assert_eq!( buffer.state(), BufferState::Loaded );
        assert_eq!( buffer.position(), Some( 0 ) );
        assert_eq!( buffer.loaded_media_type(), Some( MediaType::Video ) );
    }


    #[test]
    fn test_bind_missing_collection_leaves_buffer_untouched() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Visual, 0 );
        buffer.bind( &catalog, "Videos" ).unwrap();
        buffer.advance( &catalog, Step::Next, &mut rng() ).unwrap();

        let err = buffer.bind( &catalog, "NoSuchCollection" ).unwrap_err();
        assert_eq!( err, BufferError::CollectionNotFound( "NoSuchCollection".into() ) );
        assert_eq!( buffer.bound_collection(), Some( "Videos" ) );
        assert_eq!( buffer.position(), Some( 1 ) );

        assert!( matches!( buffer.bind( &catalog, "Shapes" ), Err( BufferError::MediaNotFound( _ ) ) ) );
        assert_eq!( buffer.bound_collection(), Some( "Videos" ) );
    }


    #[test]
    fn test_advance_wraps_both_ways() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Visual, 0 );
        buffer.bind( &catalog, "Videos" ).unwrap();

        buffer.advance( &catalog, Step::Prev, &mut rng() ).unwrap();
        assert_eq!( buffer.position(), Some( 1 ) );
        buffer.advance( &catalog, Step::Next, &mut rng() ).unwrap();
        assert_eq!( buffer.position(), Some( 0 ) );
    }


    #[test]
    fn test_full_cycle_returns_to_start() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Visual, 0 );
        buffer.bind( &catalog, "Videos" ).unwrap();

        let len = catalog.require( "Videos" ).unwrap().len();
        for _ in 0..len {
            buffer.advance( &catalog, Step::Next, &mut rng() ).unwrap();
        }
        assert_eq!( buffer.position(), Some( 0 ) );
    }


    #[test]
    fn test_random_stays_in_range() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Visual, 0 );
        buffer.bind( &catalog, "clips" ).unwrap();

        let mut rng = rng();
        for _ in 0..50 {
            let _ = buffer.advance( &catalog, Step::Random, &mut rng );
            assert!( buffer.position().unwrap() < 4 );
        }
    }


    #[test]
    fn test_advance_requires_binding() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Visual, 3 );
        assert_eq!(
            buffer.advance( &catalog, Step::Next, &mut rng() ),
            Err( BufferError::NoCollectionBound( 3 ) )
        );
    }


    #[test]
    fn test_same_kind_reuses_resource() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Visual, 0 );
        let first = buffer.bind( &catalog, "clips" ).unwrap();
        buffer.report_playhead( 12.0, Some( 30.0 ) );

        let second = buffer.advance( &catalog, Step::Next, &mut rng() ).unwrap();
        assert!( !second.rebuilt );
        assert_eq!( second.resource, first.resource );
        assert_eq!( buffer.resource().unwrap().current_time, 0.0 );
        assert_eq!( buffer.resource().unwrap().source, "/library/clips/b.mov" );

        let third = buffer.advance( &catalog, Step::Next, &mut rng() ).unwrap();
        assert!( third.rebuilt );
        assert_ne!( third.resource, first.resource );
        assert_eq!( buffer.resource().unwrap().kind, ResourceKind::Image );
    }


    #[test]
    fn test_unsupported_entry_keeps_previous_resource() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Visual, 0 );
        buffer.bind( &catalog, "clips" ).unwrap();
        buffer.load_at( &catalog, 2 ).unwrap();

        let err = buffer.load_at( &catalog, 3 ).unwrap_err();
        assert!( matches!( err, BufferError::UnsupportedMediaKind { media_type: MediaType::Audio, .. } ) );
        assert_eq!( buffer.position(), Some( 2 ) );
        assert_eq!( buffer.loaded_media_type(), Some( MediaType::Image ) );

        assert!( matches!( buffer.load_at( &catalog, 9 ), Err( BufferError::MediaNotFound( _ ) ) ) );
        assert_eq!( buffer.position(), Some( 2 ) );
    }


    #[test]
    fn test_load_by_url_must_be_in_bound_collection() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Audio, 1 );
        buffer.bind( &catalog, "Audios" ).unwrap();

        buffer.load_by_url( &catalog, "/library/loop.mp3" ).unwrap();
        assert_eq!( buffer.position(), Some( 1 ) );
        assert!( matches!(
            buffer.load_by_url( &catalog, "/library/clips/a.mp4" ),
            Err( BufferError::MediaNotFound( _ ) )
        ));
    }


    #[test]
    fn test_inject_unbinds() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Visual, 0 );
        buffer.bind( &catalog, "Videos" ).unwrap();

        buffer.inject( "http://peer/cam.webm", MediaType::Video ).unwrap();
        assert_eq!( buffer.bound_collection(), None );
        assert_eq!( buffer.position(), None );
        assert_eq!( buffer.state(), BufferState::Loaded );
        assert!( matches!( buffer.advance( &catalog, Step::Next, &mut rng() ), Err( BufferError::NoCollectionBound( 0 ) ) ) );
    }


    #[test]
    fn test_transport_declines_on_images() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Visual, 0 );
        buffer.bind( &catalog, "Images" ).unwrap();

        assert!( !buffer.time_shift( TimeShift::Forward, &mut rng() ) );
        assert!( !buffer.speed_shift( SpeedShift::Faster, &mut rng() ) );
        assert!( !buffer.toggle_play() );
        assert!( !buffer.toggle_mute() );
        assert_eq!( buffer.playback_rate(), 1.0 );
    }


    #[test]
    fn test_time_shift_without_duration() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Visual, 0 );
        buffer.bind( &catalog, "Videos" ).unwrap();

        assert!( buffer.time_shift( TimeShift::Forward, &mut rng() ) );
        assert_eq!( buffer.resource().unwrap().current_time, 10.0 );
        assert!( !buffer.time_shift( TimeShift::Random, &mut rng() ) );
        assert!( !buffer.time_shift( TimeShift::Fraction( 0.5 ), &mut rng() ) );

        buffer.report_playhead( 3.0, Some( 40.0 ) );
        assert!( buffer.time_shift( TimeShift::Fraction( 0.5 ), &mut rng() ) );
        assert_eq!( buffer.resource().unwrap().current_time, 20.0 );
        assert!( buffer.time_shift( TimeShift::Backward, &mut rng() ) );
        assert!( buffer.time_shift( TimeShift::Backward, &mut rng() ) );
        assert_eq!( buffer.resource().unwrap().current_time, 0.0 );
    }


    #[test]
    fn test_speed_presets_and_clamping() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Visual, 0 );
        buffer.bind( &catalog, "Videos" ).unwrap();
        let mut rng = rng();

        assert!( buffer.speed_shift( SpeedShift::Faster, &mut rng ) );
        assert_eq!( buffer.playback_rate(), 2.0 );
        buffer.speed_shift( SpeedShift::Rate( 100.0 ), &mut rng );
        assert_eq!( buffer.playback_rate(), MAX_RATE );
        buffer.speed_shift( SpeedShift::Faster, &mut rng );
        assert_eq!( buffer.playback_rate(), MAX_RATE );

        // 1.4 snaps to 1.0 before stepping.
        buffer.speed_shift( SpeedShift::Rate( 1.4 ), &mut rng );
        buffer.speed_shift( SpeedShift::Slower, &mut rng );
        assert_eq!( buffer.playback_rate(), 0.5 );
        buffer.speed_shift( SpeedShift::Normal, &mut rng );
        assert_eq!( buffer.playback_rate(), 1.0 );

        buffer.speed_shift( SpeedShift::Random, &mut rng );
        assert!( SPEED_PRESETS.contains( &buffer.playback_rate() ) );
    }


    #[test]
    fn test_clear_returns_to_unbound() {
        let catalog = catalog();
        let mut buffer = Buffer::new( BufferKind::Audio, 2 );
        buffer.bind( &catalog, "Audios" ).unwrap();
        assert!( buffer.toggle_mute() );

        buffer.clear();
        assert_eq!( buffer.state(), BufferState::Unbound );
        assert_eq!( buffer.position(), None );
        assert!( buffer.resource().is_none() );
    }


    #[test]
    fn test_focus_is_singleton() {
        let mut bank = BufferBank::new( 2, 2 );
        assert_eq!( bank.focused(), None );

        for slot in [ 0, 3, 1, 1, 2 ] {
            bank.focus( slot ).unwrap();
            assert_eq!( bank.iter().filter( |b| b.has_focus() ).count(), 1 );
            assert_eq!( bank.focused(), Some( slot ) );
        }
        assert_eq!( bank.focus( 4 ), Err( BufferError::NoSuchSlot( 4 ) ) );
        assert_eq!( bank.focused(), Some( 2 ) );
        assert_eq!( bank.get( 3 ).unwrap().kind(), BufferKind::Audio );
    }
}

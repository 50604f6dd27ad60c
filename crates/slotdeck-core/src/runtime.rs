//! Single-threaded event loop
//!
//! One task owns the session and the router. Events arrive on a channel and
//! are applied one at a time; controller timers, LED refresh and the playhead
//! monitor are driven from the same `select!`, so no state is ever shared.
//! Library rescans run on their own task and come back as a merge.

use std::time::Duration;

use tokio::sync::{ mpsc, watch };
use tokio::time::{ self, Instant, Interval, MissedTickBehavior };

use crate::action::Action;
use crate::grid::LedFrame;
use crate::library::LibraryScanner;
use crate::media::MediaEntry;
use crate::router::{ InputEvent, Router };
use crate::session::{ Session, SessionSnapshot };


/// Cadence at which a dirty LED model is pushed to the device.
pub const LED_REFRESH: Duration = Duration::from_millis( 33 );

/// How often the playhead row is refreshed while time-based media is focused.
pub const PLAYHEAD_MONITOR: Duration = Duration::from_millis( 100 );


/// Everything the loop can be asked to do.
#[derive( Debug, Clone )]
pub enum SessionEvent {
    /// A device event, routed through the device tables.
    Input( InputEvent ),
    /// An action issued directly, e.g. from the command prompt.
    Action( Action ),
    /// The renderer's playhead for a buffer.
    Playhead { slot: usize, current_time: f64, duration: Option<f64> },
    /// Entries found by an incremental rescan.
    Merge( Vec<MediaEntry> ),
    Shutdown,
}


/// Channels the loop publishes on.
pub struct Outputs {
    pub snapshots: watch::Sender<SessionSnapshot>,
    pub leds: watch::Sender<LedFrame>,
}


/// Owns the session for the lifetime of the loop.
pub struct Runtime {
    session: Session,
    router: Router,
    outputs: Outputs,
    rescan: Option<LibraryScanner>,
    scanning: bool,
    kiosk: Option<Duration>,
}


impl Runtime {
    pub fn new( session: Session, router: Router, outputs: Outputs ) -> Self {
        Self {
            session,
            router,
            outputs,
            rescan: None,
            scanning: false,
            kiosk: None,
        }
    }


    /// Scanner used when the session asks for a library refresh.
    pub fn with_rescan( mut self, scanner: LibraryScanner ) -> Self {
        self.rescan = Some( scanner );
        self
    }


    /// Runs a kiosk step every `interval`; None leaves kiosk mode off.
    pub fn with_kiosk( mut self, interval: Option<Duration> ) -> Self {
        self.kiosk = interval;
        self
    }


    /// Runs until a [`SessionEvent::Shutdown`] arrives or every sender is
    /// dropped, then hands the session back.
    pub async fn run( mut self, mut events: mpsc::Receiver<SessionEvent> ) -> Session {
        let mut led_tick = time::interval( LED_REFRESH );
        led_tick.set_missed_tick_behavior( MissedTickBehavior::Skip );
        let mut playhead_tick = time::interval( PLAYHEAD_MONITOR );
        playhead_tick.set_missed_tick_behavior( MissedTickBehavior::Skip );
        let mut kiosk_tick = self.kiosk.map( |every| {
            tracing::info!( "Kiosk mode every {:?}", every );
            let mut tick = time::interval_at( Instant::now() + every, every );
            tick.set_missed_tick_behavior( MissedTickBehavior::Delay );
            tick
        });
        let ( found_tx, mut found_rx ) = mpsc::channel::<Vec<MediaEntry>>( 1 );

        tracing::info!( "Event loop started with {} buffers", self.session.buffers().len() );
        self.publish();

        loop {
            if self.session.take_refresh_request() {
                self.start_rescan( &found_tx );
            }
            let deadline = self.router.next_deadline();

            tokio::select! {
                event = events.recv() => match event {
                    Some( SessionEvent::Shutdown ) | None => break,
                    Some( event ) => {
                        self.handle( event );
                        self.publish();
                    }
                },
                _ = wait_for( deadline ) => {
                    if self.router.poll( &mut self.session, Instant::now() ) > 0 {
                        self.publish();
                    }
                }
                Some( entries ) = found_rx.recv() => {
                    self.scanning = false;
                    self.handle( SessionEvent::Merge( entries ) );
                    self.publish();
                }
                _ = next_tick( &mut kiosk_tick ) => {
                    self.router.kiosk_step( &mut self.session );
                    self.publish();
                }
                _ = led_tick.tick() => self.push_leds(),
                _ = playhead_tick.tick() => {
                    if self.session.focused_is_time_based() {
                        self.router.mark_dirty();
                    }
                }
            }
        }

        tracing::info!( "Event loop stopped" );
        self.session
    }


    fn handle( &mut self, event: SessionEvent ) {
        match event {
            SessionEvent::Input( input ) => {
                self.router.dispatch( &mut self.session, input, Instant::now() );
            }
            SessionEvent::Action( action ) => {
                self.router.apply( &mut self.session, action );
            }
            SessionEvent::Playhead { slot, current_time, duration } => {
                if let Err( e ) = self.session.report_playhead( slot, current_time, duration ) {
                    tracing::debug!( "Playhead report ignored: {}", e );
                }
            }
            SessionEvent::Merge( entries ) => {
                let report = self.session.merge_new( entries );
                if !report.added.is_empty() {
                    self.router.mark_dirty();
                }
            }
            SessionEvent::Shutdown => {}
        }
    }


    /// Scans the library on a separate task; the result arrives as a merge.
    fn start_rescan( &mut self, found: &mpsc::Sender<Vec<MediaEntry>> ) {
        let Some( scanner ) = self.rescan.clone() else {
            tracing::warn!( "Library refresh requested but no library root is configured" );
            return;
        };
        if self.scanning {
            tracing::debug!( "Library refresh already running" );
            return;
        }

        self.scanning = true;
        let found = found.clone();
        tokio::spawn( async move {
            let report = scanner.scan().await;
            if report.is_partial() {
                tracing::warn!( "Rescan skipped {} directories", report.failures.len() );
            }
            if found.send( report.entries ).await.is_err() {
                tracing::debug!( "Event loop gone before the rescan finished" );
            }
        });
    }


    fn publish( &self ) {
        self.outputs.snapshots.send_replace( self.session.snapshot() );
    }


    fn push_leds( &mut self ) {
        if let Some( frame ) = self.router.refresh_leds( &self.session ) {
            self.outputs.leds.send_replace( frame );
        }
    }
}


/// Waits for the next tick, or forever when there is no interval.
async fn next_tick( interval: &mut Option<Interval> ) {
    match interval {
        Some( interval ) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}


/// Sleeps until `deadline`, or forever when there is none.
async fn wait_for( deadline: Option<Instant> ) {
    match deadline {
        Some( at ) => time::sleep_until( at ).await,
        None => std::future::pending().await,
    }
}


#[cfg( test )]
mod tests {
    use super::*;

    use crate::action::{ SpeedShift, Step };
    use crate::grid::{ GridKey, GRID_COLS, GRID_ROWS, LED_ACTIVE };
    use crate::router::Key;
    use crate::session::tests::{ config, session };


    struct Harness {
        events: mpsc::Sender<SessionEvent>,
        snapshots: watch::Receiver<SessionSnapshot>,
        leds: watch::Receiver<LedFrame>,
        task: tokio::task::JoinHandle<Session>,
    }


    fn start() -> Harness {
        start_with( |runtime| runtime )
    }


    fn start_with( build: impl FnOnce( Runtime ) -> Runtime ) -> Harness {
        let ( snapshots_tx, snapshots ) = watch::channel( SessionSnapshot::default() );
        let ( leds_tx, leds ) = watch::channel( [[ 0; GRID_COLS ]; GRID_ROWS] );
        let ( events, events_rx ) = mpsc::channel( 64 );

        let runtime = build( Runtime::new(
            session(),
            Router::new( &config() ),
            Outputs { snapshots: snapshots_tx, leds: leds_tx },
        ));
        let task = tokio::spawn( runtime.run( events_rx ) );
        Harness { events, snapshots, leds, task }
    }


    #[tokio::test( start_paused = true )]
    async fn test_events_apply_in_order() {
        let mut harness = start();

        harness.events.send( SessionEvent::Action( Action::Focus( 2 ) ) ).await.unwrap();
        harness.events.send( SessionEvent::Input( InputEvent::Key { key: Key::Backspace, released: true } ) ).await.unwrap();
        harness.events.send( SessionEvent::Action( Action::Focus( 0 ) ) ).await.unwrap();
        harness.events.send( SessionEvent::Action( Action::SwitchFile( Step::Next ) ) ).await.unwrap();
        harness.events.send( SessionEvent::Shutdown ).await.unwrap();

        let session = harness.task.await.unwrap();
        let snapshot = session.snapshot();
        assert_eq!( snapshot.focus, Some( 0 ) );
        assert!( snapshot.buffers[ 2 ].muted );
        assert_eq!( snapshot.buffers[ 0 ].position, Some( 1 ) );

        assert_eq!( harness.snapshots.borrow_and_update().focus, Some( 0 ) );
    }


    #[tokio::test( start_paused = true )]
    async fn test_controller_settles_after_window() {
        let harness = start();
        let cc = |value| SessionEvent::Input( InputEvent::Midi { status: 0xB0, data1: 39, data2: value } );

        for value in [ 40, 41, 42 ] {
            harness.events.send( cc( value ) ).await.unwrap();
            time::sleep( Duration::from_millis( 10 ) ).await;
        }
        assert_eq!( harness.snapshots.borrow().buffers[ 0 ].playback_rate, 1.0 );

        time::sleep( Duration::from_millis( 200 ) ).await;
        let rate = harness.snapshots.borrow().buffers[ 0 ].playback_rate;
        assert_eq!( rate, crate::router::speed_from_cc( 42 ) );

        harness.events.send( SessionEvent::Action( Action::SpeedShift( SpeedShift::Normal ) ) ).await.unwrap();
        drop( harness.events );
        let session = harness.task.await.unwrap();
        assert_eq!( session.focused().unwrap().playback_rate(), 1.0 );
    }


    #[tokio::test( start_paused = true )]
    async fn test_leds_follow_grid_presses() {
        let mut harness = start();
        time::sleep( LED_REFRESH * 2 ).await;
        assert_eq!( harness.leds.borrow_and_update()[ 7 ][ 0 ], LED_ACTIVE );

        let press = InputEvent::Grid { key: GridKey::new( 7, 1 ), pressed: true };
        harness.events.send( SessionEvent::Input( press ) ).await.unwrap();
        time::sleep( LED_REFRESH * 2 ).await;

        let frame = *harness.leds.borrow_and_update();
        assert_eq!( frame[ 7 ][ 1 ], LED_ACTIVE );
        assert_ne!( frame[ 7 ][ 0 ], LED_ACTIVE );

        harness.events.send( SessionEvent::Shutdown ).await.unwrap();
        harness.task.await.unwrap();
    }


    #[tokio::test( start_paused = true )]
    async fn test_playhead_and_merge_events() {
        let harness = start();

        harness.events.send( SessionEvent::Playhead { slot: 0, current_time: 30.0, duration: Some( 60.0 ) } ).await.unwrap();
        harness.events.send( SessionEvent::Playhead { slot: 9, current_time: 1.0, duration: None } ).await.unwrap();
        harness.events.send( SessionEvent::Merge( vec![
            MediaEntry::new( "/library/clips/z.webm", "clips", "clips" ),
        ] ) ).await.unwrap();
        harness.events.send( SessionEvent::Shutdown ).await.unwrap();

        let session = harness.task.await.unwrap();
        assert_eq!( session.focused().unwrap().progress(), Some( 0.5 ) );
        assert_eq!( session.catalog().require( "clips" ).unwrap().len(), 4 );
    }


    #[tokio::test]
    async fn test_refresh_rescans_and_merges() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all( dir.path().join( "clips" ) ).unwrap();
        std::fs::write( dir.path().join( "clips/a.mp4" ), b"" ).unwrap();
        std::fs::write( dir.path().join( "clips/new.mp4" ), b"" ).unwrap();

        let scanner = LibraryScanner::new( dir.path() );
        let mut harness = start_with( |runtime| runtime.with_rescan( scanner ) );
        assert_eq!( harness.snapshots.borrow().entries, 5 );

        let refresh = InputEvent::Grid { key: GridKey::new( 7, 13 ), pressed: true };
        harness.events.send( SessionEvent::Input( refresh ) ).await.unwrap();
        time::timeout( Duration::from_secs( 5 ), harness.snapshots.wait_for( |s| s.entries == 6 ) )
            .await
            .unwrap()
            .unwrap();

        harness.events.send( SessionEvent::Shutdown ).await.unwrap();
        let session = harness.task.await.unwrap();
        assert_eq!( session.catalog().require( "clips" ).unwrap().len(), 4 );
        assert!( session.catalog().entry_by_url( "/library/clips/new.mp4" ).is_some() );
    }


    #[tokio::test( start_paused = true )]
    async fn test_kiosk_steps_on_its_interval() {
        let mut harness = start_with( |runtime| runtime.with_kiosk( Some( Duration::from_secs( 5 ) ) ) );
        time::sleep( Duration::from_millis( 10 ) ).await;
        harness.snapshots.borrow_and_update();

        time::sleep( Duration::from_millis( 4900 ) ).await;
        assert!( !harness.snapshots.has_changed().unwrap() );

        time::sleep( Duration::from_millis( 200 ) ).await;
        assert!( harness.snapshots.has_changed().unwrap() );

        harness.events.send( SessionEvent::Shutdown ).await.unwrap();
        let session = harness.task.await.unwrap();
        assert!( !session.is_chill() );
    }
}

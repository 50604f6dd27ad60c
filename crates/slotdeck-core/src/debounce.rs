//! Continuous-controller timers
//!
//! Both timers are deadline based: nothing here sleeps. The event loop asks
//! for the next deadline, waits until then, and polls with the current time.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::action::Action;


/// Repeat interval at the edge of the dead zone.
pub const REPEAT_SLOWEST: Duration = Duration::from_millis( 500 );

/// Repeat interval at the far end of a controller's travel.
pub const REPEAT_FASTEST: Duration = Duration::from_millis( 50 );


/// Keeps the latest value per controller until it has been stable for `window`.
///
/// A new value restarts the controller's timer and replaces the pending one;
/// superseded values are never delivered.
#[derive( Debug, Clone )]
pub struct Debouncer {
    window: Duration,
    pending: BTreeMap<u8, ( u8, Instant )>,
}


impl Debouncer {
    pub fn new( window: Duration ) -> Self {
        Self {
            window,
            pending: BTreeMap::new(),
        }
    }


    pub fn window( &self ) -> Duration {
        self.window
    }


    /// Records a value and restarts the controller's timer.
    pub fn push( &mut self, controller: u8, value: u8, now: Instant ) {
        self.pending.insert( controller, ( value, now + self.window ) );
    }


    /// Drops a pending value without delivering it.
    pub fn cancel( &mut self, controller: u8 ) -> bool {
        self.pending.remove( &controller ).is_some()
    }


    pub fn is_pending( &self, controller: u8 ) -> bool {
        self.pending.contains_key( &controller )
    }


    /// Earliest time at which a pending value becomes due.
    pub fn next_deadline( &self ) -> Option<Instant> {
        self.pending.values().map( |( _, due )| *due ).min()
    }


    /// Removes and returns every `(controller, value)` whose window has elapsed.
    pub fn take_due( &mut self, now: Instant ) -> Vec<( u8, u8 )> {
        let due: Vec<( u8, u8 )> = self.pending.iter()
            .filter( |( _, ( _, at ) )| *at <= now )
            .map( |( cc, ( value, _ ) )| ( *cc, *value ) )
            .collect();
        for ( cc, _ ) in &due {
            self.pending.remove( cc );
        }
        due
    }
}


#[derive( Debug, Clone, Copy )]
struct Repeat {
    action: Action,
    interval: Duration,
    next: Instant,
}


/// Repeating actions driven by controllers held away from centre.
#[derive( Debug, Clone, Default )]
pub struct AutoRepeat {
    active: BTreeMap<u8, Repeat>,
}


impl AutoRepeat {
    pub fn new() -> Self {
        Self::default()
    }


    /// Starts (or retunes) the repeat owned by `controller`.
    ///
    /// The first repetition is due one interval after `now`; the caller is
    /// expected to have applied the action once already.
    pub fn start( &mut self, controller: u8, action: Action, interval: Duration, now: Instant ) {
        tracing::debug!( "Repeating {} every {:?} (cc {})", action, interval, controller );
        self.active.insert( controller, Repeat { action, interval, next: now + interval } );
    }


    /// Stops the repeat owned by `controller`. Returns false if none was active.
    pub fn cancel( &mut self, controller: u8 ) -> bool {
        let cancelled = self.active.remove( &controller ).is_some();
        if cancelled {
            tracing::debug!( "Repeat on cc {} cancelled", controller );
        }
        cancelled
    }


    pub fn is_active( &self, controller: u8 ) -> bool {
        self.active.contains_key( &controller )
    }


    pub fn next_deadline( &self ) -> Option<Instant> {
        self.active.values().map( |r| r.next ).min()
    }


    /// Returns the actions due at `now` and schedules their next run.
    ///
    /// A repeat that fell behind fires once and restarts from `now`.
    pub fn take_due( &mut self, now: Instant ) -> Vec<Action> {
        let mut due = Vec::new();
        for repeat in self.active.values_mut() {
            if repeat.next <= now {
                due.push( repeat.action );
                let next = repeat.next + repeat.interval;
                repeat.next = if next <= now { now + repeat.interval } else { next };
            }
        }
        due
    }
}


/// Interval for a controller `distance` steps past its threshold, out of `span`.
///
/// Shrinks linearly from [`REPEAT_SLOWEST`] to [`REPEAT_FASTEST`].
pub fn repeat_interval( distance: u8, span: u8 ) -> Duration {
    if span == 0 {
        return REPEAT_FASTEST;
    }
    let slow = REPEAT_SLOWEST.as_millis() as u64;
    let fast = REPEAT_FASTEST.as_millis() as u64;
    let travelled = distance.min( span ) as u64;
    Duration::from_millis( slow - ( slow - fast ) * travelled / span as u64 )
}


#[cfg( test )]
mod tests {
    use super::*;

    use crate::action::TimeShift;


    #[test]
    fn test_rapid_values_collapse_to_last() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new( Duration::from_millis( 150 ) );

        debouncer.push( 40, 40, start );
        debouncer.push( 40, 41, start + Duration::from_millis( 20 ) );
        debouncer.push( 40, 42, start + Duration::from_millis( 45 ) );

        assert!( debouncer.take_due( start + Duration::from_millis( 150 ) ).is_empty() );
        assert_eq!( debouncer.next_deadline(), Some( start + Duration::from_millis( 195 ) ) );
        assert_eq!( debouncer.take_due( start + Duration::from_millis( 195 ) ), vec![( 40, 42 )] );
        assert!( debouncer.take_due( start + Duration::from_secs( 5 ) ).is_empty() );
    }


    #[test]
    fn test_controllers_are_independent() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new( Duration::from_millis( 150 ) );

        debouncer.push( 38, 10, start );
        debouncer.push( 41, 90, start + Duration::from_millis( 100 ) );

        assert_eq!( debouncer.take_due( start + Duration::from_millis( 160 ) ), vec![( 38, 10 )] );
        assert!( debouncer.is_pending( 41 ) );
        assert!( debouncer.cancel( 41 ) );
        assert_eq!( debouncer.next_deadline(), None );
    }


    #[test]
    fn test_repeat_fires_each_interval_until_cancelled() {
        let start = Instant::now();
        let action = Action::TimeShift( TimeShift::Forward );
        let mut repeat = AutoRepeat::new();

        repeat.start( 40, action, Duration::from_millis( 100 ), start );
        assert!( repeat.take_due( start + Duration::from_millis( 50 ) ).is_empty() );
        assert_eq!( repeat.take_due( start + Duration::from_millis( 100 ) ), vec![ action ] );
        assert_eq!( repeat.next_deadline(), Some( start + Duration::from_millis( 200 ) ) );

        // Falling far behind fires once, not once per missed interval.
        assert_eq!( repeat.take_due( start + Duration::from_millis( 1000 ) ).len(), 1 );
        assert_eq!( repeat.next_deadline(), Some( start + Duration::from_millis( 1100 ) ) );

        assert!( repeat.cancel( 40 ) );
        assert!( !repeat.is_active( 40 ) );
        assert!( repeat.take_due( start + Duration::from_secs( 10 ) ).is_empty() );
    }


    #[test]
    fn test_repeat_interval_range() {
        assert_eq!( repeat_interval( 0, 54 ), REPEAT_SLOWEST );
        assert_eq!( repeat_interval( 54, 54 ), REPEAT_FASTEST );
        assert_eq!( repeat_interval( 200, 53 ), REPEAT_FASTEST );
        let mid = repeat_interval( 27, 54 );
        assert!( mid < REPEAT_SLOWEST && mid > REPEAT_FASTEST );
    }
}

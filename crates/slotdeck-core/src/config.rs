//! Session configuration
//!
//! Everything the core needs to size and prime a session. Loading the file
//! is left to the caller; this type only describes its shape.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{ Deserialize, Serialize };

use crate::library::{ FolderFilter, LibraryScanner, DEFAULT_MOUNT };


/// Default continuous-controller debounce window.
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// Kiosk interval used when kiosk mode is switched on without one.
pub const DEFAULT_KIOSK_MS: u64 = 5000;


/// Shape and initial state of a session.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct SessionConfig {
    /// Number of visual buffers (slots `0..visual_buffers`)
    pub visual_buffers: usize,

    /// Number of audio buffers, placed after the visual ones
    pub audio_buffers: usize,

    /// Collections bound at startup, keyed by slot
    pub collections: BTreeMap<usize, String>,

    /// Slot focused at startup; no buffer is focused when unset
    pub initial_focus: Option<usize>,

    /// Visual patch names, in switching order
    pub patches: Vec<String>,

    /// Number of cameras the renderer can switch between
    pub cameras: usize,

    /// Virtual mount point prefixed to every scanned URL
    pub mount: String,

    /// Folder allow-list; empty means every folder
    pub folders: Vec<String>,

    pub include_subdirectories: bool,

    pub debounce_ms: u64,

    /// Unattended mode: a random grid action every this many milliseconds
    pub kiosk_interval_ms: Option<u64>,
}


impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            visual_buffers: 2,
            audio_buffers: 2,
            collections: BTreeMap::new(),
            initial_focus: None,
            patches: Vec::new(),
            cameras: 1,
            mount: DEFAULT_MOUNT.to_string(),
            folders: Vec::new(),
            include_subdirectories: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            kiosk_interval_ms: None,
        }
    }
}


impl SessionConfig {
    /// Total number of buffer slots.
    pub fn buffer_count( &self ) -> usize {
        self.visual_buffers + self.audio_buffers
    }


    pub fn debounce( &self ) -> Duration {
        Duration::from_millis( self.debounce_ms )
    }


    /// Kiosk step interval; None while kiosk mode is off.
    pub fn kiosk_interval( &self ) -> Option<Duration> {
        self.kiosk_interval_ms.filter( |&ms| ms > 0 ).map( Duration::from_millis )
    }


    /// The folder allow-list, if one is configured.
    pub fn folder_filter( &self ) -> Option<FolderFilter> {
        if self.folders.is_empty() {
            return None;
        }
        Some( FolderFilter::new( self.folders.iter().cloned() )
            .include_subdirectories( self.include_subdirectories ) )
    }


    /// Builds a scanner for `root` honouring the mount point and folder settings.
    pub fn scanner( &self, root: impl Into<PathBuf> ) -> LibraryScanner {
        LibraryScanner::new( root )
            .with_mount( self.mount.clone() )
            .with_folders( self.folders.iter().cloned() )
            .include_subdirectories( self.include_subdirectories )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SessionConfig = serde_json::from_str(
            r#"{ "visual_buffers": 3, "collections": { "0": "Videos", "3": "Audios" } }"#
        ).unwrap();

        assert_eq!( config.buffer_count(), 5 );
        assert_eq!( config.collections.get( &3 ).map( String::as_str ), Some( "Audios" ) );
        assert_eq!( config.debounce(), Duration::from_millis( 150 ) );
        assert_eq!( config.mount, "/library" );
        assert!( config.folder_filter().is_none() );
        assert_eq!( config.kiosk_interval(), None );
    }


    #[test]
    fn test_kiosk_interval() {
        let config: SessionConfig = serde_json::from_str( r#"{ "kiosk_interval_ms": 5000 }"# ).unwrap();
        assert_eq!( config.kiosk_interval(), Some( Duration::from_millis( DEFAULT_KIOSK_MS ) ) );

        let config = SessionConfig { kiosk_interval_ms: Some( 0 ), ..Default::default() };
        assert_eq!( config.kiosk_interval(), None );
    }


    #[test]
    fn test_folder_filter_follows_settings() {
        let config = SessionConfig {
            folders: vec![ "clips".into() ],
            include_subdirectories: false,
            ..Default::default()
        };
        let filter = config.folder_filter().unwrap();
        assert_eq!( filter.names(), [ "clips".to_string() ] );
    }
}

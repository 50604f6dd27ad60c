//! Application settings management
//!
//! Persistent settings live in `<config dir>/slotdeck/settings.json`.
//! Command-line flags override them for a single run.

use std::fs;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };

use slotdeck_core::SessionConfig;

use crate::cli::Args;


/// Application settings.
#[derive( Debug, Clone, Default, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Media library root
    pub root: Option<PathBuf>,

    /// Device bridge address
    pub bridge: Option<String>,

    /// Log file; defaults to `slotdeck.log` next to the settings file
    pub log_file: Option<PathBuf>,

    /// Buffer layout, startup bindings and device globals
    pub session: SessionConfig,
}


impl Settings {
    /// Returns the default path to the settings file.
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "slotdeck" ).join( "settings.json" ) )
    }


    /// Loads settings from `path` (or the default location), falling back
    /// to defaults if the file is missing or invalid.
    pub fn load( path: Option<&Path> ) -> Self {
        let path = match path.map( Path::to_path_buf ).or_else( Self::settings_path ) {
            Some( p ) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string( &path ) {
            Ok( contents ) => match serde_json::from_str( &contents ) {
                Ok( settings ) => settings,
                Err( e ) => {
                    tracing::warn!( "Invalid settings in {:?}: {}", path, e );
                    Self::default()
                }
            },
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        }
    }


    /// Saves settings to `path` (or the default location).
    pub fn save( &self, path: Option<&Path> ) {
        let path = match path.map( Path::to_path_buf ).or_else( Self::settings_path ) {
            Some( p ) => p,
            None => return,
        };

        if let Some( parent ) = path.parent() {
            if !parent.exists() {
                if let Err( e ) = fs::create_dir_all( parent ) {
                    tracing::warn!( "Failed to create settings directory: {}", e );
                    return;
                }
            }
        }

        match serde_json::to_string_pretty( self ) {
            Ok( json ) => {
                if let Err( e ) = fs::write( &path, json ) {
                    tracing::warn!( "Failed to save settings: {}", e );
                }
            }
            Err( e ) => {
                tracing::warn!( "Failed to serialize settings: {}", e );
            }
        }
    }


    /// Applies command-line overrides.
    pub fn with_args( mut self, args: &Args ) -> Self {
        if let Some( root ) = &args.root {
            self.root = Some( root.clone() );
        }
        if let Some( bridge ) = &args.bridge {
            self.bridge = Some( bridge.clone() );
        }
        if let Some( log ) = &args.log {
            self.log_file = Some( log.clone() );
        }
        if !args.folders.is_empty() {
            self.session.folders = args.folders.clone();
        }
        if args.no_subdirs {
            self.session.include_subdirectories = false;
        }
        if let Some( ms ) = args.kiosk {
            self.session.kiosk_interval_ms = Some( ms );
        }
        self
    }


    /// Library root to scan: the configured one or the current directory.
    pub fn library_root( &self ) -> PathBuf {
        self.root.clone().unwrap_or_else( || PathBuf::from( "." ) )
    }


    /// Where logs go when no file was requested.
    pub fn log_path( &self ) -> PathBuf {
        self.log_file.clone()
            .or_else( || Self::settings_path().and_then( |p| p.parent().map( |d| d.join( "slotdeck.log" ) ) ) )
            .unwrap_or_else( || PathBuf::from( "slotdeck.log" ) )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_missing_or_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        assert_eq!( Settings::load( Some( &path ) ), Settings::default() );

        fs::write( &path, "{ not json" ).unwrap();
        assert_eq!( Settings::load( Some( &path ) ), Settings::default() );
    }


    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "nested" ).join( "settings.json" );

        let mut settings = Settings::default();
        settings.bridge = Some( "127.0.0.1:8080".into() );
        settings.session.patches = vec![ "tunnel".into() ];
        settings.save( Some( &path ) );

        assert_eq!( Settings::load( Some( &path ) ), settings );
    }


    #[test]
    fn test_args_override_settings() {
        let settings = Settings {
            root: Some( "/media/show".into() ),
            ..Default::default()
        };
        let args = Args {
            folders: vec![ "clips".into() ],
            no_subdirs: true,
            bridge: Some( "10.0.0.2:9000".into() ),
            kiosk: Some( 3000 ),
            ..Default::default()
        };

        let settings = settings.with_args( &args );
        assert_eq!( settings.library_root(), PathBuf::from( "/media/show" ) );
        assert_eq!( settings.bridge.as_deref(), Some( "10.0.0.2:9000" ) );
        assert_eq!( settings.session.folders, vec![ "clips".to_string() ] );
        assert!( !settings.session.include_subdirectories );
        assert_eq!( settings.session.kiosk_interval_ms, Some( 3000 ) );
    }


    #[test]
    fn test_bare_kiosk_flag_uses_default_interval() {
        use clap::Parser;

        let args = Args::try_parse_from([ "slotdeck", "--kiosk" ]).unwrap();
        let settings = Settings::default().with_args( &args );
        assert_eq!( settings.session.kiosk_interval_ms, Some( slotdeck_core::config::DEFAULT_KIOSK_MS ) );

        let args = Args::try_parse_from([ "slotdeck" ]).unwrap();
        assert_eq!( Settings::default().with_args( &args ).session.kiosk_interval_ms, None );
    }
}

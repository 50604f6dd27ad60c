//! Library scanning
//!
//! Walks a media root, classifies files through the media taxonomy and
//! records every directory it visits. A scan never fails as a whole:
//! unreadable subtrees are logged, recorded and skipped.

use std::collections::{ BTreeMap, BTreeSet };
use std::path::{ Path, PathBuf };

use thiserror::Error;

use crate::media::{ MediaEntry, MediaType };


/// Virtual mount point prefixed to every scanned URL.
pub const DEFAULT_MOUNT: &str = "/library";


/// Errors that can occur during library operations.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "Skipped unreadable path {path:?}: {source}" )]
    PartialScanFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}


/// Result of a scan: entries in discovery order plus the directory tree.
#[derive( Debug, Default )]
pub struct ScanReport {
    pub entries: Vec<MediaEntry>,
    /// Relative path (`""` for the root) to absolute path, for every visited directory.
    pub directories: BTreeMap<String, PathBuf>,
    /// Subtrees that could not be read.
    pub failures: Vec<LibraryError>,
}


impl ScanReport {
    /// Returns the scanned URLs in discovery order.
    pub fn urls( &self ) -> Vec<&str> {
        self.entries.iter().map( |e| e.url() ).collect()
    }


    /// Returns true if part of the tree could not be read.
    pub fn is_partial( &self ) -> bool {
        !self.failures.is_empty()
    }
}


/// Requested-folder matching shared by the scanner and the collection model.
///
/// For each requested name, a directory matches when its relative path equals
/// the name or descends from it. Only when those rules select nothing for a
/// name is segment containment tried instead.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct FolderFilter {
    names: Vec<String>,
    include_subdirectories: bool,
}


impl FolderFilter {
    pub fn new( names: impl IntoIterator<Item = impl Into<String>> ) -> Self {
        Self {
            names: names.into_iter()
                .map( |n| n.into().trim_matches( '/' ).to_string() )
                .filter( |n| !n.is_empty() )
                .collect(),
            include_subdirectories: true,
        }
    }


    /// Controls whether descendants of a requested folder are selected.
    pub fn include_subdirectories( mut self, include: bool ) -> Self {
        self.include_subdirectories = include;
        self
    }


    pub fn names( &self ) -> &[String] {
        &self.names
    }


    /// Selects the paths matching a single requested name.
    pub fn select_for<'a>(
        &self,
        name: &str,
        paths: impl IntoIterator<Item = &'a str> + Clone,
    ) -> BTreeSet<String> {
        let prefix = format!( "{}/", name );
        let strict: BTreeSet<String> = paths.clone().into_iter()
            .filter( |p| *p == name || ( self.include_subdirectories && p.starts_with( &prefix ) ) )
            .map( str::to_string )
            .collect();

        if !strict.is_empty() {
            return strict;
        }

        paths.into_iter()
            .filter( |p| {
                if self.include_subdirectories {
                    p.split( '/' ).any( |seg| seg == name )
                } else {
                    p.rsplit( '/' ).next() == Some( name )
                }
            })
            .map( str::to_string )
            .collect()
    }


    /// Selects the paths matching any requested name.
    pub fn select<'a>( &self, paths: impl IntoIterator<Item = &'a str> + Clone ) -> BTreeSet<String> {
        self.names.iter()
            .flat_map( |name| self.select_for( name, paths.clone() ) )
            .collect()
    }
}


/// Single-entry form of the folder rule: equal, descendant or containing segment.
pub fn folder_path_matches( path: &str, value: &str ) -> bool {
    path == value
        || path.strip_prefix( value ).is_some_and( |rest| rest.starts_with( '/' ) )
        || path.split( '/' ).any( |seg| seg == value )
}


/// Library scanner for discovering media files.
#[derive( Debug, Clone )]
pub struct LibraryScanner {
    root: PathBuf,
    mount: String,
    filter: Option<FolderFilter>,
    include_subdirectories: bool,
}


impl LibraryScanner {
    /// Creates a scanner for the given root with the default mount point.
    pub fn new( root: impl Into<PathBuf> ) -> Self {
        Self {
            root: root.into(),
            mount: DEFAULT_MOUNT.to_string(),
            filter: None,
            include_subdirectories: true,
        }
    }


    /// Sets the virtual mount point prefixed to URLs.
    pub fn with_mount( mut self, mount: impl Into<String> ) -> Self {
        self.mount = mount.into().trim_end_matches( '/' ).to_string();
        self
    }


    /// Restricts results to the requested folders.
    pub fn with_folders( mut self, folders: impl IntoIterator<Item = impl Into<String>> ) -> Self {
        let filter = FolderFilter::new( folders );
        self.filter = if filter.names().is_empty() { None } else { Some( filter ) };
        self
    }


    /// Controls descent below the root (or below requested folders).
    pub fn include_subdirectories( mut self, include: bool ) -> Self {
        self.include_subdirectories = include;
        self
    }


    pub fn root( &self ) -> &Path {
        &self.root
    }


    /// Scans the root and returns everything found.
    ///
    /// Directory reads are awaited one at a time; callers only ever see the
    /// finished report.
    pub async fn scan( &self ) -> ScanReport {
        tracing::info!( "Scanning: {:?}", self.root );

        let mut report = ScanReport::default();
        let root_name = self.root.file_name()
            .map( |n| n.to_string_lossy().to_string() )
            .unwrap_or_default();

        let mut pending = vec![( self.root.clone(), String::new() )];
        while let Some(( dir, relative )) = pending.pop() {
            let listing = match read_sorted( &dir ).await {
                Ok( listing ) => listing,
                Err( e ) => {
                    tracing::warn!( "Skipping {:?}: {}", dir, e );
                    report.failures.push( LibraryError::PartialScanFailure { path: dir, source: e } );
                    continue;
                }
            };
            report.directories.insert( relative.clone(), dir.clone() );

            let immediate = if relative.is_empty() {
                root_name.clone()
            } else {
                relative.rsplit( '/' ).next().unwrap_or_default().to_string()
            };

            let mut subdirs = Vec::new();
            for ( name, is_dir ) in listing {
                if is_dir {
                    let child = if relative.is_empty() { name.clone() } else { format!( "{}/{}", relative, name ) };
                    subdirs.push(( dir.join( &name ), child ));
                } else if Self::is_media_file( &name ) {
                    let file_path = if relative.is_empty() { name.clone() } else { format!( "{}/{}", relative, name ) };
                    report.entries.push( MediaEntry::new(
                        format!( "{}/{}", self.mount, file_path ),
                        immediate.clone(),
                        relative.clone(),
                    ));
                }
            }

            // Requested folders may sit anywhere below the root, so a filter always descends.
            if self.include_subdirectories || self.filter.is_some() {
                // Reverse so the alphabetically first child is visited next.
                pending.extend( subdirs.into_iter().rev() );
            }
        }

        if let Some( filter ) = &self.filter {
            let filter = filter.clone().include_subdirectories( self.include_subdirectories );
            let allowed = filter.select( report.directories.keys().map( String::as_str ) );
            report.directories.retain( |rel, _| allowed.contains( rel ) );
            report.entries.retain( |e| allowed.contains( &e.full_folder_path ) );
        }

        tracing::info!(
            "Found {} media files in {} directories ({} skipped)",
            report.entries.len(),
            report.directories.len(),
            report.failures.len()
        );
        report
    }


    /// Checks if a file name carries an extension from the media taxonomy.
    fn is_media_file( name: &str ) -> bool {
        name.rsplit_once( '.' )
            .and_then( |( _, ext )| MediaType::from_extension( ext ) )
            .is_some()
    }
}


/// Reads one directory, returning `(name, is_dir)` pairs sorted by name.
async fn read_sorted( dir: &Path ) -> std::io::Result<Vec<( String, bool )>> {
    let mut reader = tokio::fs::read_dir( dir ).await?;
    let mut listing = Vec::new();

    while let Some( entry ) = reader.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        let file_type = match entry.file_type().await {
            Ok( t ) => t,
            Err( e ) => {
                tracing::warn!( "Cannot stat {:?}: {}", entry.path(), e );
                continue;
            }
        };

        if file_type.is_symlink() {
            // Follow links to files only; linked directories could form cycles.
            match tokio::fs::metadata( entry.path() ).await {
                Ok( meta ) if meta.is_file() => listing.push(( name, false )),
                _ => tracing::debug!( "Ignoring link {:?}", entry.path() ),
            }
            continue;
        }

        listing.push(( name, file_type.is_dir() ));
    }

    listing.sort_by( |a, b| a.0.cmp( &b.0 ) );
    Ok( listing )
}


#[cfg( test )]
mod tests {
    use super::*;

    use std::fs;

    use crate::collection::Catalog;


    fn touch( root: &Path, relative: &str ) {
        let path = root.join( relative );
        fs::create_dir_all( path.parent().unwrap() ).unwrap();
        fs::write( path, b"" ).unwrap();
    }


    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::Builder::new().prefix( "library" ).tempdir().unwrap();
        touch( dir.path(), "clips/intro.mp4" );
        touch( dir.path(), "clips/sub/a.png" );
        touch( dir.path(), "loop.mp3" );
        touch( dir.path(), "clips/notes.txt" );
        fs::create_dir_all( dir.path().join( "empty/deeper" ) ).unwrap();
        dir
    }


    #[tokio::test]
    async fn test_scan_records_every_directory() {
        let dir = fixture();
        let report = LibraryScanner::new( dir.path() ).scan().await;

        let keys: Vec<&str> = report.directories.keys().map( String::as_str ).collect();
        assert_eq!( keys, vec![ "", "clips", "clips/sub", "empty", "empty/deeper" ] );
        assert_eq!( report.directories[ "clips/sub" ], dir.path().join( "clips" ).join( "sub" ) );
        assert!( !report.is_partial() );
    }


    #[tokio::test]
    async fn test_scan_classifies_and_skips_unknown_extensions() {
        let dir = fixture();
        let report = LibraryScanner::new( dir.path() ).scan().await;

        assert_eq!( report.urls(), vec![
            "/library/loop.mp3",
            "/library/clips/intro.mp4",
            "/library/clips/sub/a.png",
        ]);
        assert!( report.entries.iter().all( |e| e.media_type() != MediaType::Unknown ) );
    }


    #[tokio::test]
    async fn test_scan_folder_fields() {
        let dir = fixture();
        let root_name = dir.path().file_name().unwrap().to_string_lossy().to_string();
        let report = LibraryScanner::new( dir.path() ).with_mount( "/media/" ).scan().await;

        let find = |title: &str| report.entries.iter().find( |e| e.title == title ).unwrap();
        assert_eq!( find( "intro" ).immediate_folder, "clips" );
        assert_eq!( find( "a" ).immediate_folder, "sub" );
        assert_eq!( find( "a" ).full_folder_path, "clips/sub" );
        assert_eq!( find( "a" ).url(), "/media/clips/sub/a.png" );
        assert_eq!( find( "loop" ).immediate_folder, root_name );
        assert_eq!( find( "loop" ).full_folder_path, "" );
    }


    #[tokio::test]
    async fn test_scan_feeds_type_collections() {
        let dir = fixture();
        let report = LibraryScanner::new( dir.path() ).scan().await;
        let catalog = Catalog::from_entries( report.entries, None );

        assert_eq!( catalog.require( "Videos" ).unwrap().len(), 1 );
        assert_eq!( catalog.require( "Images" ).unwrap().len(), 1 );
        assert_eq!( catalog.require( "Audios" ).unwrap().len(), 1 );
        assert_eq!( catalog.require( "Shapes" ).unwrap().len(), 0 );
        assert_eq!( catalog.require( "clips" ).unwrap().len(), 1 );
        assert_eq!( catalog.require( "sub" ).unwrap().len(), 1 );
    }


    #[tokio::test]
    async fn test_scan_missing_root_is_partial_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let report = LibraryScanner::new( dir.path().join( "gone" ) ).scan().await;

        assert!( report.entries.is_empty() );
        assert!( report.is_partial() );
        assert!( matches!( report.failures[ 0 ], LibraryError::PartialScanFailure { .. } ) );
    }


    #[tokio::test]
    async fn test_scan_with_folder_filter() {
        let dir = fixture();
        let report = LibraryScanner::new( dir.path() ).with_folders( [ "clips" ] ).scan().await;

        assert_eq!( report.urls(), vec![ "/library/clips/intro.mp4", "/library/clips/sub/a.png" ] );
        assert!( report.directories.contains_key( "clips/sub" ) );
        assert!( !report.directories.contains_key( "" ) );
    }


    #[tokio::test]
    async fn test_scan_without_subdirectories() {
        let dir = fixture();
        let report = LibraryScanner::new( dir.path() )
            .with_folders( [ "clips" ] )
            .include_subdirectories( false )
            .scan()
            .await;

        assert_eq!( report.urls(), vec![ "/library/clips/intro.mp4" ] );

        let flat = LibraryScanner::new( dir.path() ).include_subdirectories( false ).scan().await;
        assert_eq!( flat.urls(), vec![ "/library/loop.mp3" ] );
    }


    #[test]
    fn test_filter_segment_fallback_only_when_strict_rules_miss() {
        let paths = [ "clips", "clips/sub", "live/sub", "sub", "other/subway" ];
        let filter = FolderFilter::new( [ "sub" ] );

        // "sub" exists exactly, so segment containment is never consulted.
        let selected = filter.select( paths.iter().copied() );
        assert_eq!( selected.into_iter().collect::<Vec<_>>(), vec![ "sub" ] );

        let nested = [ "clips", "clips/sub", "clips/sub/deep", "live/sub" ];
        let selected = filter.select( nested.iter().copied() );
        assert_eq!(
            selected.into_iter().collect::<Vec<_>>(),
            vec![ "clips/sub", "clips/sub/deep", "live/sub" ]
        );
    }


    #[test]
    fn test_folder_path_matches() {
        assert!( folder_path_matches( "clips", "clips" ) );
        assert!( folder_path_matches( "clips/sub", "clips" ) );
        assert!( folder_path_matches( "live/clips/sub", "clips" ) );
        assert!( !folder_path_matches( "clipsx/sub", "clips" ) );
        assert!( !folder_path_matches( "clip", "clips" ) );
    }
}

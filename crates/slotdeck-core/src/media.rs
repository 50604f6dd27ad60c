//! Media taxonomy and library entries
//!
//! Classifies assets by file extension and describes a single entry of the
//! media library.

use std::collections::BTreeSet;
use std::fmt;

use serde::{ Deserialize, Serialize };


/// Extension table for the fixed media taxonomy.
const EXTENSION_TABLE: &[( MediaType, &[&str] )] = &[
    ( MediaType::Image, &[ "jpg", "jpeg", "png", "gif", "webp" ] ),
    ( MediaType::Video, &[ "mp4", "webm", "mov", "avi" ] ),
    ( MediaType::Audio, &[ "mp3", "wav", "ogg", "aac" ] ),
    ( MediaType::Shape, &[ "glb", "gltf", "obj" ] ),
];


/// Category of a media asset, derived from its extension.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Shape,
    /// Only produced for entries built out of band (remote URLs).
    Unknown,
}


impl MediaType {
    /// The types that own a type collection, in collection order.
    pub const CATALOGUED: [MediaType; 4] = [
        MediaType::Image,
        MediaType::Video,
        MediaType::Audio,
        MediaType::Shape,
    ];


    /// Looks up a lowercase or mixed-case extension in the taxonomy.
    ///
    /// Returns None for extensions outside the table.
    pub fn from_extension( ext: &str ) -> Option<Self> {
        let ext = ext.to_lowercase();
        EXTENSION_TABLE.iter()
            .find( |( _, exts )| exts.contains( &ext.as_str() ) )
            .map( |( ty, _ )| *ty )
    }


    /// Classifies a locator by the text after its last `.`.
    pub fn from_locator( locator: &str ) -> Self {
        let name = locator.rsplit( '/' ).next().unwrap_or( locator );
        name.rsplit_once( '.' )
            .and_then( |( _, ext )| Self::from_extension( ext ) )
            .unwrap_or( MediaType::Unknown )
    }


    /// Name of the type collection for this media type.
    pub fn collection_name( &self ) -> &'static str {
        match self {
            MediaType::Image => "Images",
            MediaType::Video => "Videos",
            MediaType::Audio => "Audios",
            MediaType::Shape => "Shapes",
            MediaType::Unknown => "Unknown",
        }
    }


    /// Returns true for media with a timeline (video and audio).
    pub fn is_time_based( &self ) -> bool {
        matches!( self, MediaType::Video | MediaType::Audio )
    }


    /// Resource kind a buffer needs to present this media, if any.
    pub fn resource_kind( &self ) -> Option<ResourceKind> {
        match self {
            MediaType::Image => Some( ResourceKind::Image ),
            MediaType::Video => Some( ResourceKind::Video ),
            MediaType::Audio => Some( ResourceKind::Audio ),
            MediaType::Shape | MediaType::Unknown => None,
        }
    }
}


impl fmt::Display for MediaType {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        let name = match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Shape => "shape",
            MediaType::Unknown => "unknown",
        };
        f.write_str( name )
    }
}


/// Kind of presentation resource held by a loaded buffer.
///
/// A buffer only rebuilds its resource when this kind changes.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum ResourceKind {
    Image,
    Video,
    Audio,
}


impl ResourceKind {
    /// Returns true when the resource has a playhead.
    pub fn is_time_based( &self ) -> bool {
        matches!( self, ResourceKind::Video | ResourceKind::Audio )
    }
}


/// One physical asset in the library.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
pub struct MediaEntry {
    url: String,
    media_type: MediaType,
    pub title: String,
    pub immediate_folder: String,
    pub full_folder_path: String,
    member_collections: BTreeSet<String>,
}


impl MediaEntry {
    /// Creates an entry for a scanned file.
    ///
    /// @param url - Locator under the virtual mount point
    /// @param immediate_folder - Name of the directory holding the file
    /// @param full_folder_path - Slash-joined path from the root to that directory
    pub fn new(
        url: impl Into<String>,
        immediate_folder: impl Into<String>,
        full_folder_path: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            media_type: MediaType::from_locator( &url ),
            title: title_of( &url ),
            url,
            immediate_folder: immediate_folder.into(),
            full_folder_path: full_folder_path.into(),
            member_collections: BTreeSet::new(),
        }
    }


    /// Builds an entry from a bare locator, e.g. one received from a remote peer.
    ///
    /// Folder information is taken from the locator's path segments.
    pub fn from_url( url: impl Into<String> ) -> Self {
        let url = url.into().replace( '\\', "/" );
        let path = match url.split_once( "://" ) {
            Some(( _, rest )) => rest.split_once( '/' ).map( |( _, p )| p ).unwrap_or( "" ),
            None => url.as_str(),
        };
        let mut segments: Vec<&str> = path.split( '/' ).filter( |s| !s.is_empty() ).collect();
        segments.pop();
        let immediate = segments.last().copied().unwrap_or_default().to_string();
        let full = segments.join( "/" );
        Self::new( url, immediate, full )
    }


    pub fn url( &self ) -> &str {
        &self.url
    }


    pub fn media_type( &self ) -> MediaType {
        self.media_type
    }


    /// Names of the collections this entry has been added to.
    pub fn member_collections( &self ) -> &BTreeSet<String> {
        &self.member_collections
    }


    pub( crate ) fn join_collection( &mut self, name: &str ) {
        self.member_collections.insert( name.to_string() );
    }


    pub( crate ) fn leave_collection( &mut self, name: &str ) {
        self.member_collections.remove( name );
    }
}


/// File name without directories and without anything after the first `.`.
fn title_of( url: &str ) -> String {
    let name = url.rsplit( '/' ).next().unwrap_or( url );
    name.split( '.' ).next().unwrap_or( name ).to_string()
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_extension_lookup_is_case_insensitive() {
        assert_eq!( MediaType::from_extension( "PNG" ), Some( MediaType::Image ) );
        assert_eq!( MediaType::from_extension( "Mov" ), Some( MediaType::Video ) );
        assert_eq!( MediaType::from_extension( "aac" ), Some( MediaType::Audio ) );
        assert_eq!( MediaType::from_extension( "gltf" ), Some( MediaType::Shape ) );
        assert_eq!( MediaType::from_extension( "txt" ), None );
    }


    #[test]
    fn test_locator_without_extension_is_unknown() {
        assert_eq!( MediaType::from_locator( "/library/notes/README" ), MediaType::Unknown );
        assert_eq!( MediaType::from_locator( "/library/a.b/clip.mp4" ), MediaType::Video );
    }


    #[test]
    fn test_entry_title_and_type() {
        let entry = MediaEntry::new( "/library/clips/intro.final.mp4", "clips", "clips" );
        assert_eq!( entry.title, "intro" );
        assert_eq!( entry.media_type(), MediaType::Video );
        assert!( entry.member_collections().is_empty() );
    }


    #[test]
    fn test_from_url_derives_folders() {
        let entry = MediaEntry::from_url( "http://peer/library/live/set1/kick.wav" );
        assert_eq!( entry.immediate_folder, "set1" );
        assert_eq!( entry.full_folder_path, "library/live/set1" );
        assert_eq!( entry.media_type(), MediaType::Audio );

        let remote = MediaEntry::from_url( "/library/live/notes.txt" );
        assert_eq!( remote.media_type(), MediaType::Unknown );
        assert_eq!( remote.full_folder_path, "library/live" );
    }


    #[test]
    fn test_resource_kind_mapping() {
        assert_eq!( MediaType::Video.resource_kind(), Some( ResourceKind::Video ) );
        assert_eq!( MediaType::Shape.resource_kind(), None );
        assert!( ResourceKind::Audio.is_time_based() );
        assert!( !ResourceKind::Image.is_time_based() );
    }
}

//! Collections of media entries
//!
//! The catalog owns every entry of one library snapshot and the named,
//! ordered groups built from them: one per media type, one per folder,
//! aggregate folder trees for allow-listed paths, and ad-hoc groups.

use std::collections::{ BTreeSet, HashMap };
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::library::{ folder_path_matches, FolderFilter };
use crate::media::{ MediaEntry, MediaType };


/// Index of an entry inside its catalog.
pub type EntryId = usize;


/// Errors that can occur with collection operations.
#[derive( Debug, Error, PartialEq, Eq )]
pub enum CollectionError {
    #[error( "Collection not found: {0}" )]
    CollectionNotFound( String ),

    #[error( "Collection already exists: {0}" )]
    CollectionExists( String ),

    #[error( "Invalid filter kind: '{0}'. Use 'type', 'immediateFolder' or 'folderPath'" )]
    InvalidFilterKind( String ),

    #[error( "Media not found: {0}" )]
    MediaNotFound( String ),
}


/// How a collection was derived, used when merging new entries.
#[derive( Debug, Clone, PartialEq, Eq, Serialize )]
#[serde( tag = "kind", content = "value", rename_all = "camelCase" )]
pub enum CollectionKind {
    Type( MediaType ),
    /// Entries whose immediate folder has this name.
    Folder( String ),
    /// Entries anywhere below an allow-listed path.
    FolderTree( String ),
    AdHoc,
}


/// Outcome of adding an entry to a collection.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Added {
    Added,
    AlreadyPresent,
}


/// Outcome of removing an entry from a collection.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Removed {
    Removed,
    NotPresent,
}


/// Entry attribute used by [`Catalog::get_by_filter`].
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum FilterKind {
    Type,
    ImmediateFolder,
    FolderPath,
}


impl FromStr for FilterKind {
    type Err = CollectionError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s {
            "type" => Ok( FilterKind::Type ),
            "immediateFolder" | "immediate_folder" => Ok( FilterKind::ImmediateFolder ),
            "folderPath" | "folder_path" => Ok( FilterKind::FolderPath ),
            other => Err( CollectionError::InvalidFilterKind( other.to_string() ) ),
        }
    }
}


/// Summary of an incremental merge.
#[derive( Debug, Default, Clone, PartialEq, Eq )]
pub struct MergeReport {
    pub added: Vec<EntryId>,
    /// Entries whose URL was already in the catalog.
    pub skipped: usize,
}


/// A named, ordered, deduplicated group of entries.
#[derive( Debug, Clone )]
pub struct Collection {
    name: String,
    kind: CollectionKind,
    items: Vec<EntryId>,
}


impl Collection {
    fn new( name: impl Into<String>, kind: CollectionKind ) -> Self {
        Self { name: name.into(), kind, items: Vec::new() }
    }


    pub fn name( &self ) -> &str {
        &self.name
    }


    pub fn kind( &self ) -> &CollectionKind {
        &self.kind
    }


    /// Entry ids in insertion order.
    pub fn items( &self ) -> &[EntryId] {
        &self.items
    }


    pub fn get( &self, position: usize ) -> Option<EntryId> {
        self.items.get( position ).copied()
    }


    pub fn position_of( &self, id: EntryId ) -> Option<usize> {
        self.items.iter().position( |i| *i == id )
    }


    pub fn len( &self ) -> usize {
        self.items.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.items.is_empty()
    }
}


/// All entries of one library snapshot and the collections over them.
#[derive( Debug, Default )]
pub struct Catalog {
    entries: Vec<MediaEntry>,
    by_url: HashMap<String, EntryId>,
    collections: Vec<Collection>,
    by_name: HashMap<String, usize>,
    allow_list: Option<FolderFilter>,
}


impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }


    /// Builds the catalog for a finished scan: type collections first, then
    /// folder collections.
    pub fn from_entries(
        entries: impl IntoIterator<Item = MediaEntry>,
        allow_list: Option<FolderFilter>,
    ) -> Self {
        let mut catalog = Self::new();
        let ids = catalog.ingest( entries ).added;
        catalog.create_type_collections( &ids );
        catalog.create_folder_collections( &ids, allow_list );

        tracing::info!(
            "Catalog built: {} entries, {} collections",
            catalog.entries.len(),
            catalog.collections.len()
        );
        catalog
    }


    /// Stores entries not yet known by URL and returns their ids.
    fn ingest( &mut self, entries: impl IntoIterator<Item = MediaEntry> ) -> MergeReport {
        let mut report = MergeReport::default();
        for entry in entries {
            if self.by_url.contains_key( entry.url() ) {
                report.skipped += 1;
                continue;
            }
            let id = self.entries.len();
            self.by_url.insert( entry.url().to_string(), id );
            self.entries.push( entry );
            report.added.push( id );
        }
        report
    }


    /// Creates one collection per catalogued media type, even when empty,
    /// and fills them with the given entries.
    pub fn create_type_collections( &mut self, ids: &[EntryId] ) {
        for ty in MediaType::CATALOGUED {
            self.ensure( ty.collection_name(), CollectionKind::Type( ty ) );
        }
        for &id in ids {
            self.add_to_type_collection( id );
        }
    }


    /// Creates folder collections for the given entries.
    ///
    /// Without an allow-list, every immediate folder gets a collection. With
    /// one, only folders selected by the allow-list do, and each allow-listed
    /// path additionally gets a `"{path}/*"` collection of everything below it.
    pub fn create_folder_collections( &mut self, ids: &[EntryId], allow_list: Option<FolderFilter> ) {
        self.allow_list = allow_list;

        let selection = self.folder_selection();
        for &id in ids {
            self.add_to_folder_collections( id, &selection );
        }
    }


    /// Creates an empty ad-hoc collection.
    pub fn create_ad_hoc( &mut self, name: &str ) -> Result<&Collection, CollectionError> {
        if self.by_name.contains_key( name ) {
            return Err( CollectionError::CollectionExists( name.to_string() ) );
        }
        let index = self.ensure( name, CollectionKind::AdHoc );
        Ok( &self.collections[ index ] )
    }


    /// Appends an entry to a collection.
    ///
    /// Adding an entry that is already a member changes nothing and reports
    /// [`Added::AlreadyPresent`].
    pub fn add( &mut self, collection: &str, id: EntryId ) -> Result<Added, CollectionError> {
        let index = self.index_of( collection )?;
        if id >= self.entries.len() {
            return Err( CollectionError::MediaNotFound( format!( "entry #{}", id ) ) );
        }
        Ok( self.insert_at( index, id ) )
    }


    /// Removes an entry from a collection.
    pub fn remove( &mut self, collection: &str, id: EntryId ) -> Result<Removed, CollectionError> {
        let index = self.index_of( collection )?;
        let target = &mut self.collections[ index ];

        match target.position_of( id ) {
            Some( pos ) => {
                target.items.remove( pos );
                let name = target.name.clone();
                if let Some( entry ) = self.entries.get_mut( id ) {
                    entry.leave_collection( &name );
                }
                Ok( Removed::Removed )
            }
            None => Ok( Removed::NotPresent ),
        }
    }


    /// Returns the ids of entries whose attribute matches `value`.
    ///
    /// `FolderPath` matches the folder itself, any descendant, and any path
    /// holding `value` as one of its segments.
    pub fn get_by_filter( &self, kind: FilterKind, value: &str ) -> Vec<EntryId> {
        self.entries.iter()
            .enumerate()
            .filter( |( _, e )| match kind {
                FilterKind::Type => e.media_type().to_string() == value.to_lowercase(),
                FilterKind::ImmediateFolder => e.immediate_folder == value,
                FilterKind::FolderPath => folder_path_matches( &e.full_folder_path, value ),
            })
            .map( |( id, _ )| id )
            .collect()
    }


    /// String-keyed form of [`Catalog::get_by_filter`].
    pub fn get_by_filter_str( &self, kind: &str, value: &str ) -> Result<Vec<EntryId>, CollectionError> {
        Ok( self.get_by_filter( kind.parse()?, value ) )
    }


    /// Adds entries not previously known to every collection that applies.
    ///
    /// Entries whose URL is already present are skipped, so merging the same
    /// batch twice is a no-op the second time.
    pub fn merge_new( &mut self, entries: impl IntoIterator<Item = MediaEntry> ) -> MergeReport {
        let report = self.ingest( entries );
        if report.added.is_empty() {
            return report;
        }

        let selection = self.folder_selection();
        for &id in &report.added {
            self.add_to_type_collection( id );
            self.add_to_folder_collections( id, &selection );
        }

        tracing::info!( "Merged {} new entries ({} already known)", report.added.len(), report.skipped );
        report
    }


    /// Looks up a collection by name.
    pub fn collection( &self, name: &str ) -> Option<&Collection> {
        self.by_name.get( name ).map( |&i| &self.collections[ i ] )
    }


    /// Looks up a collection by name, failing if it does not exist.
    pub fn require( &self, name: &str ) -> Result<&Collection, CollectionError> {
        self.collection( name )
            .ok_or_else( || CollectionError::CollectionNotFound( name.to_string() ) )
    }


    /// All collections in creation order.
    pub fn collections( &self ) -> &[Collection] {
        &self.collections
    }


    /// Names of collections holding at least one entry, in creation order.
    pub fn non_empty_names( &self ) -> Vec<&str> {
        self.collections.iter()
            .filter( |c| !c.is_empty() )
            .map( |c| c.name() )
            .collect()
    }


    pub fn entry( &self, id: EntryId ) -> Option<&MediaEntry> {
        self.entries.get( id )
    }


    pub fn entry_by_url( &self, url: &str ) -> Option<( EntryId, &MediaEntry )> {
        self.by_url.get( url ).map( |&id| ( id, &self.entries[ id ] ) )
    }


    pub fn entries( &self ) -> &[MediaEntry] {
        &self.entries
    }


    pub fn len( &self ) -> usize {
        self.entries.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.entries.is_empty()
    }


    fn index_of( &self, name: &str ) -> Result<usize, CollectionError> {
        self.by_name.get( name )
            .copied()
            .ok_or_else( || CollectionError::CollectionNotFound( name.to_string() ) )
    }


    /// Returns the index of the named collection, creating it if needed.
    fn ensure( &mut self, name: impl Into<String>, kind: CollectionKind ) -> usize {
        let name = name.into();
        if let Some( &index ) = self.by_name.get( &name ) {
            return index;
        }
        let index = self.collections.len();
        self.by_name.insert( name.clone(), index );
        self.collections.push( Collection::new( name, kind ) );
        index
    }


    fn insert_at( &mut self, index: usize, id: EntryId ) -> Added {
        let target = &mut self.collections[ index ];
        if self.entries[ id ].member_collections().contains( &target.name ) {
            return Added::AlreadyPresent;
        }
        target.items.push( id );
        let name = target.name.clone();
        self.entries[ id ].join_collection( &name );
        Added::Added
    }


    fn add_to_type_collection( &mut self, id: EntryId ) {
        let ty = self.entries[ id ].media_type();
        if ty == MediaType::Unknown {
            return;
        }
        let index = self.ensure( ty.collection_name(), CollectionKind::Type( ty ) );
        self.insert_at( index, id );
    }


    /// Resolves the allow-list against the catalogued folder paths once and
    /// makes sure every aggregate collection exists.
    fn folder_selection( &mut self ) -> FolderSelection {
        let Some( filter ) = self.allow_list.clone() else {
            return FolderSelection::default();
        };
        let paths: BTreeSet<&str> = self.entries.iter().map( |e| e.full_folder_path.as_str() ).collect();
        let per_name: Vec<( String, BTreeSet<String> )> = filter.names().iter()
            .map( |name| ( name.clone(), filter.select_for( name, paths.iter().copied() ) ) )
            .collect();

        let mut selection = FolderSelection {
            allowed: Some( per_name.iter().flat_map( |( _, set )| set.iter().cloned() ).collect() ),
            trees: Vec::with_capacity( per_name.len() ),
        };
        for ( name, set ) in per_name {
            let index = self.ensure( tree_collection_name( &name ), CollectionKind::FolderTree( name ) );
            selection.trees.push( ( index, set ) );
        }
        selection
    }


    fn add_to_folder_collections( &mut self, id: EntryId, selection: &FolderSelection ) {
        let ( folder, path ) = {
            let entry = &self.entries[ id ];
            ( entry.immediate_folder.clone(), entry.full_folder_path.clone() )
        };

        let admitted = selection.allowed.as_ref().map_or( true, |set| set.contains( &path ) );
        if admitted && !folder.is_empty() {
            let kind = CollectionKind::Folder( folder.clone() );
            match self.by_name.get( &folder ).copied() {
                Some( index ) if self.collections[ index ].kind != kind => {
                    tracing::warn!( "Folder '{}' shadows an existing collection, skipped", folder );
                }
                _ => {
                    let index = self.ensure( folder, kind );
                    self.insert_at( index, id );
                }
            }
        }

        for ( index, selected ) in &selection.trees {
            if selected.contains( &path ) {
                self.insert_at( *index, id );
            }
        }
    }
}


/// Allow-list resolved against one set of folder paths.
#[derive( Debug, Default )]
struct FolderSelection {
    /// Union of the selected paths; None admits every path.
    allowed: Option<BTreeSet<String>>,
    /// Aggregate collection index with the paths it gathers.
    trees: Vec<( usize, BTreeSet<String> )>,
}


/// Name of the aggregate collection for an allow-listed path.
pub fn tree_collection_name( path: &str ) -> String {
    format!( "{}/*", path )
}


#[cfg( test )]
mod tests {
    use super::*;


    fn entry( url: &str, folder: &str, path: &str ) -> MediaEntry {
        MediaEntry::new( url, folder, path )
    }


    fn sample() -> Vec<MediaEntry> {
        vec![
            entry( "/library/clips/intro.mp4", "clips", "clips" ),
            entry( "/library/clips/sub/a.png", "sub", "clips/sub" ),
            entry( "/library/loop.mp3", "library", "" ),
            entry( "/library/live/sub/b.gif", "sub", "live/sub" ),
        ]
    }


    #[test]
    fn test_type_collections_always_exist() {
        let catalog = Catalog::from_entries( sample(), None );

        assert_eq!( catalog.require( "Videos" ).unwrap().len(), 1 );
        assert_eq!( catalog.require( "Images" ).unwrap().len(), 2 );
        assert_eq!( catalog.require( "Audios" ).unwrap().len(), 1 );
        assert!( catalog.require( "Shapes" ).unwrap().is_empty() );
        assert_eq!( catalog.collections()[ 0 ].name(), "Images" );
    }


    #[test]
    fn test_folder_collections_by_immediate_folder() {
        let catalog = Catalog::from_entries( sample(), None );

        let sub = catalog.require( "sub" ).unwrap();
        assert_eq!( sub.len(), 2 );
        assert_eq!( *sub.kind(), CollectionKind::Folder( "sub".into() ) );
        assert_eq!( catalog.require( "library" ).unwrap().len(), 1 );
        assert_eq!(
            catalog.entry( 1 ).unwrap().member_collections().iter().collect::<Vec<_>>(),
            vec![ "Images", "sub" ]
        );
    }


    #[test]
    fn test_allow_list_adds_tree_collection() {
        let catalog = Catalog::from_entries( sample(), Some( FolderFilter::new( [ "clips" ] ) ) );

        let tree = catalog.require( "clips/*" ).unwrap();
        assert_eq!( tree.items(), &[ 0, 1 ] );
        assert!( catalog.collection( "clips" ).is_some() );
        // live/sub is outside the allow-list.
        assert_eq!( catalog.require( "sub" ).unwrap().items(), &[ 1 ] );
        assert!( catalog.collection( "library" ).is_none() );
    }


    #[test]
    fn test_add_is_idempotent_and_observable() {
        let mut catalog = Catalog::from_entries( sample(), None );
        catalog.create_ad_hoc( "set" ).unwrap();

        assert_eq!( catalog.add( "set", 2 ), Ok( Added::Added ) );
        assert_eq!( catalog.add( "set", 2 ), Ok( Added::AlreadyPresent ) );
        assert_eq!( catalog.require( "set" ).unwrap().len(), 1 );
        assert!( catalog.entry( 2 ).unwrap().member_collections().contains( "set" ) );
    }


    #[test]
    fn test_remove_reports_absent_entries() {
        let mut catalog = Catalog::from_entries( sample(), None );

        assert_eq!( catalog.remove( "Videos", 0 ), Ok( Removed::Removed ) );
        assert_eq!( catalog.remove( "Videos", 0 ), Ok( Removed::NotPresent ) );
        assert!( !catalog.entry( 0 ).unwrap().member_collections().contains( "Videos" ) );
    }


    #[test]
    fn test_missing_collection_and_duplicate_ad_hoc() {
        let mut catalog = Catalog::from_entries( sample(), None );

        assert_eq!(
            catalog.add( "nope", 0 ),
            Err( CollectionError::CollectionNotFound( "nope".into() ) )
        );
        assert!( matches!( catalog.create_ad_hoc( "Videos" ), Err( CollectionError::CollectionExists( _ ) ) ) );
        assert!( matches!( catalog.add( "Videos", 99 ), Err( CollectionError::MediaNotFound( _ ) ) ) );
    }


    #[test]
    fn test_get_by_filter() {
        let catalog = Catalog::from_entries( sample(), None );

        assert_eq!( catalog.get_by_filter( FilterKind::Type, "image" ), vec![ 1, 3 ] );
        assert_eq!( catalog.get_by_filter( FilterKind::ImmediateFolder, "sub" ), vec![ 1, 3 ] );
        assert_eq!( catalog.get_by_filter( FilterKind::FolderPath, "clips" ), vec![ 0, 1 ] );
        assert_eq!( catalog.get_by_filter_str( "folderPath", "sub" ), Ok( vec![ 1, 3 ] ) );
        assert_eq!(
            catalog.get_by_filter_str( "colour", "red" ),
            Err( CollectionError::InvalidFilterKind( "colour".into() ) )
        );
    }


    #[test]
    fn test_merge_new_is_idempotent() {
        let mut catalog = Catalog::from_entries( sample(), Some( FolderFilter::new( [ "clips" ] ) ) );
        let fresh = vec![
            entry( "/library/clips/outro.mov", "clips", "clips" ),
            entry( "/library/clips/intro.mp4", "clips", "clips" ),
        ];

        let report = catalog.merge_new( fresh.clone() );
        assert_eq!( report.added, vec![ 4 ] );
        assert_eq!( report.skipped, 1 );
        assert_eq!( catalog.require( "Videos" ).unwrap().items(), &[ 0, 4 ] );
        assert_eq!( catalog.require( "clips" ).unwrap().items(), &[ 0, 4 ] );
        assert_eq!( catalog.require( "clips/*" ).unwrap().items(), &[ 0, 1, 4 ] );

        let again = catalog.merge_new( fresh );
        assert!( again.added.is_empty() );
        assert_eq!( catalog.require( "Videos" ).unwrap().len(), 2 );
    }


    #[test]
    fn test_merge_remote_unknown_entry_skips_type_collections() {
        let mut catalog = Catalog::from_entries( sample(), None );
        let report = catalog.merge_new( vec![ MediaEntry::from_url( "/library/remote/readme" ) ] );

        let id = report.added[ 0 ];
        assert_eq!( catalog.entry( id ).unwrap().media_type(), MediaType::Unknown );
        assert_eq!(
            catalog.entry( id ).unwrap().member_collections().iter().collect::<Vec<_>>(),
            vec![ "remote" ]
        );
    }


    #[test]
    fn test_non_empty_names_in_creation_order() {
        let catalog = Catalog::from_entries( sample(), None );
        assert_eq!(
            catalog.non_empty_names(),
            vec![ "Images", "Videos", "Audios", "clips", "sub", "library" ]
        );
    }


    #[test]
    fn test_large_allow_listed_library() {
        let entries: Vec<MediaEntry> = ( 0..20_000 )
            .map( |i| {
                let ( root, folder ) = if i % 4 == 0 {
                    ( "other", format!( "o{}", i % 40 ) )
                } else {
                    ( "show", format!( "s{}", i % 60 ) )
                };
                let path = format!( "{}/{}", root, folder );
                entry( &format!( "/library/{}/{}.png", path, i ), &folder, &path )
            })
            .collect();

        let mut catalog = Catalog::from_entries( entries, Some( FolderFilter::new( [ "show" ] ) ) );
        assert_eq!( catalog.require( "Images" ).unwrap().len(), 20_000 );
        assert_eq!( catalog.require( "show/*" ).unwrap().len(), 15_000 );
        assert_eq!( catalog.require( "s1" ).unwrap().len(), 334 );
        assert!( catalog.collection( "o0" ).is_none() );

        let report = catalog.merge_new( vec![
            entry( "/library/show/s1/late.png", "s1", "show/s1" ),
            entry( "/library/other/o0/late.png", "o0", "other/o0" ),
        ]);
        assert_eq!( report.added.len(), 2 );
        assert_eq!( catalog.require( "show/*" ).unwrap().len(), 15_001 );
        assert_eq!( catalog.require( "s1" ).unwrap().len(), 335 );
        assert!( catalog.collection( "o0" ).is_none() );
    }
}

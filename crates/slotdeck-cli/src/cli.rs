//! Command-line argument parsing for Slotdeck.

use std::path::PathBuf;

use clap::Parser;


/// Slotdeck - live media slot controller.
#[derive( Parser, Debug, Default )]
#[command( name = "slotdeck" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Media library root to scan.
    #[arg( short, long )]
    pub root: Option<PathBuf>,

    /// Only index this folder (repeatable).
    #[arg( short, long = "folder" )]
    pub folders: Vec<String>,

    /// Do not descend below the root or the requested folders.
    #[arg( long )]
    pub no_subdirs: bool,

    /// Device bridge address, e.g. 127.0.0.1:8080.
    #[arg( short, long )]
    pub bridge: Option<String>,

    /// Settings file to use instead of the default location.
    #[arg( short, long )]
    pub config: Option<PathBuf>,

    /// Write logs to this file.
    #[arg( long )]
    pub log: Option<PathBuf>,

    /// Run unattended, picking a random action every MS milliseconds (default 5000).
    #[arg( long, value_name = "MS", num_args = 0..=1, default_missing_value = "5000" )]
    pub kiosk: Option<u64>,
}

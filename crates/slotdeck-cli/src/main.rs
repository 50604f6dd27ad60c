//! Slotdeck CLI - Terminal front end for the live media slot controller

mod bridge;
mod cli;
mod input;
mod settings;
mod view;

use std::fs::{ self, File };
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{ Duration, Instant };

use anyhow::{ Context, Result };
use clap::Parser;
use crossterm::{
    event::{
        self, Event, KeyCode, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    terminal::{ disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen, LeaveAlternateScreen },
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{ Block, Borders, List, ListItem, Paragraph, Wrap },
};
use tokio::sync::{ mpsc, watch };
use tracing_subscriber::{ fmt, prelude::*, EnvFilter };

use cli::Args;
use input::{ InputBuffer, InputMode };
use settings::Settings;
use view::ViewMode;

use slotdeck_core::{
    action, grid, Action, BufferKind, BufferState, Catalog, InputEvent, NullSink, Outputs, Router,
    Runtime, Session, SessionEvent, SessionSnapshot,
};


/// Capacity of the event channel into the session loop.
const EVENT_QUEUE: usize = 256;


/// Application state.
struct App {
    should_quit: bool,

    // View state
    view_mode: ViewMode,
    help_scroll: u16,

    // Input state
    input_mode: InputMode,
    input_buffer: InputBuffer,
    /// Terminal reports key releases
    enhanced_keys: bool,

    // Status message (shown in status bar)
    status_message: Option<String>,
    status_clear_at: Option<Instant>,

    // Session loop plumbing
    events: mpsc::Sender<SessionEvent>,
    snapshots: watch::Receiver<SessionSnapshot>,

    settings: Settings,
    /// Settings file given with `--config`
    settings_path: Option<PathBuf>,
}


impl App {
    /// Sets a status message that auto-clears after a delay.
    fn set_status( &mut self, msg: impl Into<String> ) {
        self.status_message = Some( msg.into() );
        self.status_clear_at = Some( Instant::now() + Duration::from_secs( 3 ) );
    }


    /// Clears expired status messages.
    fn tick( &mut self ) {
        if let Some( clear_at ) = self.status_clear_at {
            if Instant::now() >= clear_at {
                self.status_message = None;
                self.status_clear_at = None;
            }
        }
    }


    /// Handles a key event.
    fn handle_key( &mut self, code: KeyCode, modifiers: KeyModifiers, kind: KeyEventKind ) {
        if kind == KeyEventKind::Press
            && code == KeyCode::Char( 'c' )
            && modifiers.contains( KeyModifiers::CONTROL )
        {
            self.should_quit = true;
            return;
        }

        match self.input_mode {
            InputMode::Normal => self.handle_normal_key( code, kind ),
            InputMode::Command if kind != KeyEventKind::Release => self.handle_command_key( code ),
            InputMode::Command => {}
        }
    }


    fn handle_normal_key( &mut self, code: KeyCode, kind: KeyEventKind ) {
        // Global keys (work in any view)
        if kind == KeyEventKind::Press {
            match code {
                KeyCode::Char( '/' ) => {
                    self.input_mode = InputMode::Command;
                    self.input_buffer.clear();
                    return;
                }
                KeyCode::Tab => {
                    self.view_mode = self.view_mode.next_tab();
                    return;
                }
                KeyCode::Char( '?' ) => {
                    self.view_mode = if self.view_mode == ViewMode::Help { ViewMode::Buffers } else { ViewMode::Help };
                    return;
                }
                KeyCode::Esc => {
                    self.view_mode = ViewMode::Buffers;
                    return;
                }
                KeyCode::Up if self.view_mode == ViewMode::Help => {
                    self.help_scroll = self.help_scroll.saturating_sub( 1 );
                    return;
                }
                KeyCode::Down if self.view_mode == ViewMode::Help => {
                    self.help_scroll = self.help_scroll.saturating_add( 1 );
                    return;
                }
                _ => {}
            }
        }

        if kind == KeyEventKind::Repeat {
            return;
        }
        if let Some( key ) = input::router_key( code ) {
            let released = input::is_release( kind, self.enhanced_keys );
            self.send( SessionEvent::Input( InputEvent::Key { key, released } ) );
        }
    }


    fn handle_command_key( &mut self, code: KeyCode ) {
        match code {
            KeyCode::Enter => {
                let input = self.input_buffer.content().to_string();
                self.execute_command( &input );
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
            }
            KeyCode::Backspace => {
                if self.input_buffer.is_empty() {
                    self.input_mode = InputMode::Normal;
                } else {
                    self.input_buffer.backspace();
                }
            }
            KeyCode::Left => {
                self.input_buffer.move_left();
            }
            KeyCode::Right => {
                self.input_buffer.move_right();
            }
            KeyCode::Char( c ) => {
                self.input_buffer.insert( c );
            }
            _ => {}
        }
    }


    /// Runs a slash command. App-level commands are handled here; everything
    /// else must parse as an action for the session loop.
    fn execute_command( &mut self, input: &str ) {
        match input.trim() {
            "quit" | "q" | "exit" => self.should_quit = true,
            "help" | "h" | "?" => self.view_mode = ViewMode::Help,
            "save" => {
                self.settings.save( self.settings_path.as_deref() );
                self.set_status( "Settings saved" );
            }
            other => match Action::parse( other ) {
                Ok( action ) => {
                    self.send( SessionEvent::Action( action ) );
                    self.set_status( action.description() );
                }
                Err( e ) => self.set_status( format!( "{}", e ) ),
            },
        }
    }


    fn send( &mut self, event: SessionEvent ) {
        if self.events.try_send( event ).is_err() {
            self.set_status( "Session loop is busy or stopped" );
        }
    }
}


/// Routes logs to a file so they do not tear the terminal UI.
fn init_tracing( settings: &Settings ) -> Result<()> {
    let path = settings.log_path();
    if let Some( parent ) = path.parent().filter( |p| !p.as_os_str().is_empty() ) {
        fs::create_dir_all( parent )?;
    }
    let file = File::create( &path ).with_context( || format!( "Failed to open log file {:?}", path ) )?;

    tracing_subscriber::registry()
        .with( EnvFilter::try_from_default_env().unwrap_or_else( |_| "slotdeck=info,slotdeck_core=info".into() ) )
        .with( fmt::layer().with_writer( Mutex::new( file ) ).with_ansi( false ) )
        .init();
    Ok(())
}


fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load( args.config.as_deref() ).with_args( &args );
    init_tracing( &settings )?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    // Index the library and build the session before the UI comes up
    let config = settings.session.clone();
    let root = settings.library_root();
    let report = runtime.block_on( config.scanner( root.clone() ).scan() );
    if report.is_partial() {
        tracing::warn!( "Scan of {:?} skipped {} unreadable directories", root, report.failures.len() );
    }
    let catalog = Catalog::from_entries( report.entries, config.folder_filter() );
    let session = Session::new( catalog, &config, Box::new( NullSink ) );
    let router = Router::new( &config );

    let ( snapshots_tx, snapshots_rx ) = watch::channel( session.snapshot() );
    let ( leds_tx, leds_rx ) = watch::channel( [[ 0; grid::GRID_COLS ]; grid::GRID_ROWS] );
    let ( events_tx, events_rx ) = mpsc::channel( EVENT_QUEUE );

    let session_loop = runtime.spawn(
        Runtime::new( session, router, Outputs { snapshots: snapshots_tx, leds: leds_tx } )
            .with_rescan( config.scanner( root ) )
            .with_kiosk( config.kiosk_interval() )
            .run( events_rx ),
    );
    if let Some( addr ) = settings.bridge.clone() {
        runtime.spawn( bridge::run( addr, events_tx.clone(), leds_rx ) );
    }

    // Setup terminal
    enable_raw_mode()?;
    io::stdout().execute( EnterAlternateScreen )?;
    let enhanced_keys = supports_keyboard_enhancement().unwrap_or( false );
    if enhanced_keys {
        io::stdout().execute( PushKeyboardEnhancementFlags( KeyboardEnhancementFlags::REPORT_EVENT_TYPES ) )?;
    }

    let mut terminal = Terminal::new( CrosstermBackend::new( io::stdout() ) )?;

    let mut app = App {
        should_quit: false,
        view_mode: ViewMode::default(),
        help_scroll: 0,
        input_mode: InputMode::default(),
        input_buffer: InputBuffer::new(),
        enhanced_keys,
        status_message: None,
        status_clear_at: None,
        events: events_tx,
        snapshots: snapshots_rx,
        settings,
        settings_path: args.config.clone(),
    };

    // Main loop
    loop {
        app.tick();

        terminal.draw( |frame| draw_ui( frame, &mut app ) )?;

        // Handle events with timeout
        if event::poll( Duration::from_millis( 100 ) )? {
            if let Event::Key( key ) = event::read()? {
                app.handle_key( key.code, key.modifiers, key.kind );
            }
        }

        if app.should_quit {
            break;
        }
    }

    // Cleanup
    if enhanced_keys {
        io::stdout().execute( PopKeyboardEnhancementFlags )?;
    }
    disable_raw_mode()?;
    io::stdout().execute( LeaveAlternateScreen )?;

    let events = app.events.clone();
    drop( app );
    if runtime.block_on( events.send( SessionEvent::Shutdown ) ).is_err() {
        tracing::debug!( "Session loop already stopped" );
    }
    let session = runtime.block_on( session_loop )?;
    tracing::info!( "Session closed with {} entries", session.catalog().len() );
    runtime.shutdown_timeout( Duration::from_secs( 1 ) );

    Ok(())
}


/// Draws the main UI.
fn draw_ui( frame: &mut Frame, app: &mut App ) {
    let area = frame.area();
    let snapshot = app.snapshots.borrow_and_update().clone();

    let chunks = Layout::default()
        .direction( Direction::Vertical )
        .constraints([
            Constraint::Length( 2 ),  // Header
            Constraint::Min( 0 ),     // Main content
            Constraint::Length( 1 ),  // Status bar
        ])
        .split( area );

    let globals = format!(
        "patch {}  camera {}  entries {}{}",
        snapshot.patch.as_deref().unwrap_or( "-" ),
        snapshot.camera + 1,
        snapshot.entries,
        if snapshot.chill { "  CHILL" } else { "" },
    );
    let header = Paragraph::new( format!( "  SLOTDECK - {}   {}", app.view_mode.title().to_uppercase(), globals ) )
        .style( Style::default().fg( Color::Cyan ).bold() )
        .block( Block::default().borders( Borders::BOTTOM ) );
    frame.render_widget( header, chunks[0] );

    match app.view_mode {
        ViewMode::Buffers => draw_buffers( frame, &snapshot, chunks[1] ),
        ViewMode::Collections => draw_collections( frame, &snapshot, chunks[1] ),
        ViewMode::Help => draw_help( frame, app, chunks[1] ),
    }

    draw_status_bar( frame, app, chunks[2] );
}


fn draw_buffers( frame: &mut Frame, snapshot: &SessionSnapshot, area: Rect ) {
    let items: Vec<ListItem> = snapshot.buffers.iter()
        .map( |buffer| {
            let kind = match buffer.kind {
                BufferKind::Visual => "VIS",
                BufferKind::Audio => "AUD",
            };
            let binding = match ( &buffer.collection, buffer.position, buffer.collection_len ) {
                ( Some( name ), Some( pos ), Some( len ) ) => format!( "{} [{}/{}]", name, pos + 1, len ),
                ( Some( name ), _, _ ) => name.clone(),
                _ => "(unbound)".to_string(),
            };
            let source = buffer.source.as_deref()
                .and_then( |s| s.rsplit( '/' ).next() )
                .unwrap_or( "" );
            let timing = match ( buffer.current_time, buffer.duration ) {
                ( Some( t ), Some( d ) ) => format!( "{} / {}", format_time( t ), format_time( d ) ),
                ( Some( t ), None ) => format_time( t ),
                _ => String::new(),
            };
            let flags = format!(
                "{}{}x{:.2}",
                if buffer.paused { "paused " } else { "" },
                if buffer.muted { "muted " } else { "" },
                buffer.playback_rate,
            );

            let marker = if buffer.focused { ">" } else { " " };
            let line = format!(
                "{} {} {}  {:<28} {:<32} {:>15}  {}",
                marker, buffer.slot + 1, kind, binding, source, timing, flags,
            );

            let style = match ( buffer.focused, buffer.state ) {
                ( true, _ ) => Style::default().fg( Color::Yellow ).bold(),
                ( false, BufferState::Unbound ) => Style::default().fg( Color::DarkGray ),
                ( false, _ ) => Style::default(),
            };
            ListItem::new( line ).style( style )
        } )
        .collect();

    let list = List::new( items )
        .block( Block::default().title( " Buffers " ).borders( Borders::ALL ) );
    frame.render_widget( list, area );
}


fn draw_collections( frame: &mut Frame, snapshot: &SessionSnapshot, area: Rect ) {
    let bound: Vec<&str> = snapshot.buffers.iter()
        .filter_map( |b| b.collection.as_deref() )
        .collect();

    let items: Vec<ListItem> = snapshot.collections.iter()
        .map( |c| {
            let style = if bound.contains( &c.name.as_str() ) {
                Style::default().fg( Color::Green )
            } else if c.len == 0 {
                Style::default().fg( Color::DarkGray )
            } else {
                Style::default()
            };
            ListItem::new( format!( "  {:<40} {:>6}", c.name, c.len ) ).style( style )
        } )
        .collect();

    let list = List::new( items )
        .block( Block::default().title( " Collections " ).borders( Borders::ALL ) );
    frame.render_widget( list, area );
}


fn draw_help( frame: &mut Frame, app: &mut App, area: Rect ) {
    let help_text = action::help_text();
    let line_count = help_text.lines().count() as u16;
    let visible_height = area.height.saturating_sub( 2 ); // Account for borders

    // Clamp scroll to valid range
    let max_scroll = line_count.saturating_sub( visible_height );
    if app.help_scroll > max_scroll {
        app.help_scroll = max_scroll;
    }

    let help = Paragraph::new( help_text )
        .block( Block::default()
            .title( " Help (↑↓ scroll, ? or Esc to close) " )
            .borders( Borders::ALL )
        )
        .wrap( Wrap { trim: false } )
        .scroll(( app.help_scroll, 0 ));

    frame.render_widget( help, area );
}


fn draw_status_bar( frame: &mut Frame, app: &App, area: Rect ) {
    let ( text, style ) = match app.input_mode {
        InputMode::Command => {
            ( format!( "/{}", app.input_buffer.content() ), Style::default().fg( Color::Yellow ) )
        }
        InputMode::Normal => {
            if let Some( ref msg ) = app.status_message {
                ( msg.clone(), Style::default().fg( Color::Green ) )
            } else {
                let hint = match app.view_mode {
                    ViewMode::Help => " [?]Close [Esc]Close ",
                    _ => " [/]Cmd [Tab]Views [1-4]Focus [q w e]File [r t y]Collection [?]Help [Ctrl-C]Quit ",
                };
                ( hint.to_string(), Style::default().fg( Color::DarkGray ) )
            }
        }
    };

    let status = Paragraph::new( text ).style( style );
    frame.render_widget( status, area );

    if app.input_mode == InputMode::Command {
        let cursor_x = area.x + 1 + app.input_buffer.cursor_char_pos() as u16;
        frame.set_cursor_position(( cursor_x, area.y ));
    }
}


/// Formats seconds as `m:ss`.
fn format_time( secs: f64 ) -> String {
    let total = secs.max( 0.0 ) as u64;
    format!( "{}:{:02}", total / 60, total % 60 )
}

//! Device bridge messages
//!
//! JSON objects tagged by `type`. Inbound messages become [`InputEvent`]s;
//! the only outbound message is the LED frame.

use serde::{ Deserialize, Deserializer, Serialize };
use thiserror::Error;

use crate::grid::{ GridKey, LedFrame };
use crate::router::{ InputEvent, Key };


/// Errors that can occur while decoding device messages.
#[derive( Debug, Error )]
pub enum WireError {
    #[error( "Malformed message: {0}" )]
    Json( #[from] serde_json::Error ),

    #[error( "MIDI message needs 3 bytes, got {0}" )]
    MidiLength( usize ),

    #[error( "Grid key out of range: x={x}, y={y}" )]
    GridOutOfRange { x: u8, y: u8 },

    #[error( "{0}" )]
    UnknownKey( String ),

    #[error( "Unexpected inbound message: {0}" )]
    Unexpected( &'static str ),
}


/// One message on the device channel.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( tag = "type", rename_all = "camelCase" )]
pub enum DeviceMessage {
    /// Grid button; `s` is non-zero on press and 0 on release. Bridges that send
    /// `pressed` (number or bool) are accepted too.
    GridKey {
        x: u8,
        y: u8,
        #[serde( alias = "pressed", deserialize_with = "key_state" )]
        s: u8,
    },

    /// Raw MIDI bytes: status, data1, data2.
    Midi { data: Vec<u8> },

    Key {
        code: String,
        #[serde( default )]
        released: bool,
    },

    LedUpdate { grid: LedFrame },
}


impl DeviceMessage {
    pub fn led_update( grid: LedFrame ) -> Self {
        DeviceMessage::LedUpdate { grid }
    }


    /// Parses one JSON object.
    pub fn decode( text: &str ) -> Result<Self, WireError> {
        Ok( serde_json::from_str( text.trim() )? )
    }


    /// Serializes to a single line of JSON.
    pub fn encode( &self ) -> Result<String, WireError> {
        Ok( serde_json::to_string( self )? )
    }


    /// Converts an inbound message into a router event.
    pub fn into_event( self ) -> Result<InputEvent, WireError> {
        match self {
            DeviceMessage::GridKey { x, y, s } => {
                let key = GridKey::from_device( x, y ).ok_or( WireError::GridOutOfRange { x, y } )?;
                Ok( InputEvent::Grid { key, pressed: s != 0 } )
            }
            DeviceMessage::Midi { data } => match data.as_slice() {
                &[ status, data1, data2 ] => Ok( InputEvent::Midi { status, data1, data2 } ),
                other => Err( WireError::MidiLength( other.len() ) ),
            },
            DeviceMessage::Key { code, released } => {
                let key = code.parse::<Key>().map_err( WireError::UnknownKey )?;
                Ok( InputEvent::Key { key, released } )
            }
            DeviceMessage::LedUpdate { .. } => Err( WireError::Unexpected( "ledUpdate" ) ),
        }
    }
}


/// Reads a key state given either as a level or as a flag.
fn key_state<'de, D: Deserializer<'de>>( deserializer: D ) -> Result<u8, D::Error> {
    #[derive( Deserialize )]
    #[serde( untagged )]
    enum KeyState {
        Level( u8 ),
        Flag( bool ),
    }

    Ok( match KeyState::deserialize( deserializer )? {
        KeyState::Level( level ) => level,
        KeyState::Flag( pressed ) => pressed as u8,
    } )
}


#[cfg( test )]
mod tests {
    use super::*;

    use crate::grid::{ GRID_COLS, GRID_ROWS };


    #[test]
    fn test_decode_grid_press() {
        let event = DeviceMessage::decode( r#"{"type":"gridKey","x":3,"y":6,"s":1}"# )
            .unwrap()
            .into_event()
            .unwrap();
        assert_eq!( event, InputEvent::Grid { key: GridKey::new( 6, 3 ), pressed: true } );

        let release = DeviceMessage::decode( r#"{"type":"gridKey","x":3,"y":6,"pressed":false}"# ).unwrap();
        assert_eq!( release.into_event().unwrap(), InputEvent::Grid { key: GridKey::new( 6, 3 ), pressed: false } );
    }


    #[test]
    fn test_decode_midi_and_key() {
        let midi = DeviceMessage::decode( r#"{"type":"midi","data":[176,39,42]}"# ).unwrap();
        assert_eq!( midi.into_event().unwrap(), InputEvent::Midi { status: 176, data1: 39, data2: 42 } );

        let key = DeviceMessage::decode( r#"{"type":"key","code":"KeyW","released":true}"# ).unwrap();
        assert_eq!( key.into_event().unwrap(), InputEvent::Key { key: Key::Char( 'w' ), released: true } );
    }


    #[test]
    fn test_rejects_bad_messages() {
        assert!( matches!( DeviceMessage::decode( r#"{"type":"fader"}"# ), Err( WireError::Json( _ ) ) ) );

        let short = DeviceMessage::Midi { data: vec![ 144, 11 ] };
        assert!( matches!( short.into_event(), Err( WireError::MidiLength( 2 ) ) ) );

        let outside = DeviceMessage::GridKey { x: 16, y: 0, s: 1 };
        assert!( matches!( outside.into_event(), Err( WireError::GridOutOfRange { x: 16, y: 0 } ) ) );

        let frame = DeviceMessage::led_update( [[ 0; GRID_COLS ]; GRID_ROWS] );
        assert!( matches!( frame.into_event(), Err( WireError::Unexpected( _ ) ) ) );
    }


    #[test]
    fn test_led_update_shape() {
        let mut grid = [[ 0; GRID_COLS ]; GRID_ROWS];
        grid[ 7 ][ 0 ] = 15;
        let line = DeviceMessage::led_update( grid ).encode().unwrap();

        let value: serde_json::Value = serde_json::from_str( &line ).unwrap();
        assert_eq!( value[ "type" ], "ledUpdate" );
        assert_eq!( value[ "grid" ][ 7 ][ 0 ], 15 );
        assert_eq!( value[ "grid" ].as_array().unwrap().len(), GRID_ROWS );
    }
}

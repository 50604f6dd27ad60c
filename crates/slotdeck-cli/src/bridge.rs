//! TCP bridge to the control surfaces.
//!
//! The bridge process owns the actual MIDI ports and the grid. It sends one
//! JSON message per line and receives `ledUpdate` frames back.

use std::time::Duration;

use anyhow::Result;
use tokio::io::{ AsyncBufReadExt, AsyncWriteExt, BufReader };
use tokio::net::TcpStream;
use tokio::sync::{ mpsc, watch };

use slotdeck_core::{ DeviceMessage, LedFrame, SessionEvent };


/// Pause between connection attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs( 2 );


/// Keeps a connection to `addr` alive until the event loop goes away.
pub async fn run( addr: String, events: mpsc::Sender<SessionEvent>, mut leds: watch::Receiver<LedFrame> ) {
    while !events.is_closed() {
        match TcpStream::connect( &addr ).await {
            Ok( stream ) => {
                tracing::info!( "Connected to device bridge at {}", addr );
                match serve( stream, &events, &mut leds ).await {
                    Ok( () ) => tracing::info!( "Device bridge at {} disconnected", addr ),
                    Err( e ) => tracing::warn!( "Device bridge error: {}", e ),
                }
            }
            Err( e ) => tracing::debug!( "Device bridge at {} unavailable: {}", addr, e ),
        }

        if events.is_closed() {
            break;
        }
        tokio::time::sleep( RECONNECT_DELAY ).await;
    }
}


/// Pumps one connection: device lines in, LED frames out.
///
/// Returns `Ok` when the peer closes the stream or the event loop stops.
async fn serve(
    stream: TcpStream,
    events: &mpsc::Sender<SessionEvent>,
    leds: &mut watch::Receiver<LedFrame>,
) -> Result<()> {
    let ( reader, mut writer ) = stream.into_split();
    let mut lines = BufReader::new( reader ).lines();

    // A fresh device has no LEDs lit; send the current frame straight away.
    leds.mark_changed();
    let mut leds_open = true;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some( line ) = line? else {
                    return Ok( () );
                };
                if !line.trim().is_empty() {
                    match DeviceMessage::decode( &line ).and_then( DeviceMessage::into_event ) {
                        Ok( event ) => {
                            if events.send( SessionEvent::Input( event ) ).await.is_err() {
                                return Ok( () );
                            }
                        }
                        Err( e ) => tracing::warn!( "Ignoring device message {:?}: {}", line, e ),
                    }
                }
            }
            changed = leds.changed(), if leds_open => {
                if changed.is_err() {
                    leds_open = false;
                } else {
                    let frame = *leds.borrow_and_update();
                    let mut out = DeviceMessage::led_update( frame ).encode()?;
                    out.push( '\n' );
                    writer.write_all( out.as_bytes() ).await?;
                }
            }
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;

    use slotdeck_core::{ GridKey, InputEvent };
    use tokio::net::TcpListener;


    #[tokio::test]
    async fn test_lines_become_events_and_frames_go_out() {
        let listener = TcpListener::bind( "127.0.0.1:0" ).await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let ( events_tx, mut events_rx ) = mpsc::channel( 8 );
        let mut frame = [[ 0u8; 16 ]; 8];
        frame[ 7 ][ 0 ] = 15;
        let ( leds_tx, leds_rx ) = watch::channel( frame );

        let bridge = tokio::spawn( run( addr, events_tx, leds_rx ) );
        let ( peer, _ ) = listener.accept().await.unwrap();
        let ( peer_read, mut peer_write ) = peer.into_split();
        let mut peer_lines = BufReader::new( peer_read ).lines();

        let first = peer_lines.next_line().await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str( &first ).unwrap();
        assert_eq!( value[ "type" ], "ledUpdate" );
        assert_eq!( value[ "grid" ][ 7 ][ 0 ], 15 );

        peer_write.write_all( b"not json\n" ).await.unwrap();
        peer_write.write_all( b"{\"type\":\"gridKey\",\"x\":1,\"y\":7,\"s\":1}\n" ).await.unwrap();
        match events_rx.recv().await.unwrap() {
            SessionEvent::Input( event ) => {
                assert_eq!( event, InputEvent::Grid { key: GridKey::new( 7, 1 ), pressed: true } );
            }
            other => panic!( "unexpected event {:?}", other ),
        }

        frame[ 7 ][ 1 ] = 15;
        leds_tx.send_replace( frame );
        let second = peer_lines.next_line().await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str( &second ).unwrap();
        assert_eq!( value[ "grid" ][ 7 ][ 1 ], 15 );

        drop( events_rx );
        drop( peer_write );
        drop( peer_lines );
        bridge.await.unwrap();
    }
}

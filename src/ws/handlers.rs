//! Device message dispatch
//!
//! Routes each message from the device to where it belongs: capability
//! replies resolve pending requests on the remote session, runtime input
//! goes to the screen's event queue, overlay input to its input layer.

use tokio::sync::mpsc;

use crate::ar::OverlayEvent;
use crate::protocol::DeviceMessage;
use crate::xr::{RemoteSession, XrEvent};

/// Route one device message. `overlay` is None once the screen is unmounting.
pub async fn handle_device_message(
    msg: DeviceMessage,
    remote: &RemoteSession,
    xr_events: &mpsc::Sender<XrEvent>,
    overlay: Option<&mpsc::Sender<OverlayEvent>>,
) {
    match msg {
        DeviceMessage::Reply { request_id, reply } => {
            if !remote.resolve(request_id, reply).await {
                tracing::debug!(request_id, "Reply for unknown or expired request");
            }
        }

        // Waits for room: the screen skips stale frames, the newest must arrive
        DeviceMessage::Frame(frame) => {
            let _ = xr_events.send(XrEvent::Frame(frame)).await;
        }

        DeviceMessage::Select => {
            let _ = xr_events.send(XrEvent::Select).await;
        }

        DeviceMessage::SessionEnded => {
            tracing::info!("Device reported session end");
            remote.mark_ended().await;
            let _ = xr_events.send(XrEvent::End).await;
        }

        DeviceMessage::Tap => forward_overlay(overlay, OverlayEvent::Tap).await,
        DeviceMessage::Exit => forward_overlay(overlay, OverlayEvent::Exit).await,
    }
}

async fn forward_overlay(overlay: Option<&mpsc::Sender<OverlayEvent>>, event: OverlayEvent) {
    match overlay {
        Some(tx) => {
            let _ = tx.send(event).await;
        }
        None => tracing::debug!(?event, "Overlay input after unmount ignored"),
    }
}

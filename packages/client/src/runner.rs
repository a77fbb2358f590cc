//! Client execution logic with reconnection support.

use crate::{
    error::ClientError,
    reconnect::{ReconnectionController, SessionEnd, Transport},
    ui,
};

/// Run sessions over `transport` until the user exits or reconnection gives up
///
/// # Errors
///
/// * `ClientError::Authentication` - the token was refused; no retry
/// * `ClientError::ReconnectExhausted` - `max_attempts` consecutive attempts failed
pub async fn run_client<T>(
    transport: &mut T,
    controller: &mut ReconnectionController,
) -> Result<(), ClientError>
where
    T: Transport + ?Sized,
{
    let max_attempts = controller.policy().max_attempts;

    loop {
        if !controller.on_connecting() {
            return Err(ClientError::ReconnectExhausted(max_attempts));
        }
        tracing::info!(
            "Connecting (attempt {}/{})",
            controller.attempts(),
            max_attempts
        );

        match establish(transport, controller).await {
            Ok(()) => {
                controller.on_restored();
                ui::show_connected(controller.subscriptions().len());

                match transport
                    .run_until_closed(controller.subscriptions_mut())
                    .await
                {
                    SessionEnd::UserExit => {
                        tracing::info!("Client session ended normally");
                        controller.on_user_exit();
                        return Ok(());
                    }
                    SessionEnd::ConnectionLost(reason) => {
                        tracing::warn!("Connection lost: {}", reason);
                    }
                }
            }
            Err(ClientError::Authentication(reason)) => {
                tracing::error!("Authentication failed: {}", reason);
                controller.on_auth_failure();
                return Err(ClientError::Authentication(reason));
            }
            Err(e) => {
                tracing::warn!("Connection attempt failed: {}", e);
            }
        }

        match controller.on_disconnected() {
            Some(delay) => {
                ui::show_reconnecting(delay, controller.attempts(), max_attempts);
                tokio::time::sleep(delay).await;
            }
            None => {
                tracing::error!(
                    "Failed to reconnect after {} attempts. Giving up.",
                    max_attempts
                );
                return Err(ClientError::ReconnectExhausted(max_attempts));
            }
        }
    }
}

/// Connect and replay every remembered subscription
async fn establish<T>(
    transport: &mut T,
    controller: &mut ReconnectionController,
) -> Result<(), ClientError>
where
    T: Transport + ?Sized,
{
    transport.connect().await?;

    for room in controller.on_connected() {
        match transport.subscribe(&room).await {
            Ok(()) => tracing::debug!("Re-subscribed to '{}'", room),
            Err(ClientError::Rejected { code, message }) => {
                tracing::warn!("Server refused '{}' on replay ({}): {}", room, code, message);
                controller.on_replay_rejected(&room);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

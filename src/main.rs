use anyhow::Context;
use chatlink::{AuthKind, ChatClient, ChatConfig, ChatEvent, Credentials, MessageBody};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ChatConfig::from_env()?;
    let email = dotenv::var("CHAT_EMAIL").context("CHAT_EMAIL is not set")?;
    let password = dotenv::var("CHAT_PASSWORD").context("CHAT_PASSWORD is not set")?;

    let client = ChatClient::from_config(config);
    let mut events = client.subscribe();

    let me = client
        .login(AuthKind::Login, Credentials::login(email, password))
        .await
        .context("login failed")?;
    info!("logged in as {} ({})", me.full_name, me.id);

    for user in client.get_users().await? {
        let online = if client.is_online(&user.id).await { "online" } else { "offline" };
        info!(
            "{:<24} {:<8} unseen {}",
            user.full_name,
            online,
            client.unseen(&user.id).await
        );
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(ChatEvent::MessageAppended(message)) => {
                    let body = match message.body() {
                        MessageBody::Image(_) => "[image]".to_owned(),
                        MessageBody::Text(text) => text.to_owned(),
                        MessageBody::Empty => String::new(),
                    };
                    let who = if message.is_from(&me.id) {
                        "you".to_owned()
                    } else {
                        message.sender.to_string()
                    };
                    info!("{} {who}: {body}", message.time_label());
                }
                Ok(ChatEvent::UnseenChanged { user_id, count }) => info!("{user_id} has {count} unseen"),
                Ok(ChatEvent::PresenceChanged(online)) => info!("{} online", online.len()),
                Ok(ChatEvent::ChannelAbandoned(err)) => warn!("push channel down for good: {err}"),
                Ok(event) => info!("{event:?}"),
                Err(RecvError::Lagged(skipped)) => warn!("skipped {skipped} events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.logout().await;
    Ok(())
}

//! Storefront watch.
//!
//! Connects to the realtime endpoint and logs every feed change until ctrl-c.
//! Presence, product, order, chat, flash sale and seller feeds are only
//! opened when the matching environment variable names an id.

use std::env;
use std::fmt::Debug;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{self, BoxStream, StreamExt};
use storefront_sdk::sync::{
    ActivityFeed, CartSync, ChatFeed, FlashSaleCountdown, InventoryWatch, NotificationFeed,
    OrderTracker, PresenceWatch, PriceWatch, QuestionFeed, ReviewFeed, SellerDashboard,
    TypingIndicator, ViewerCount,
};
use storefront_sdk::ws::config::DEFAULT_WS_URL;
use storefront_sdk::{RealtimeContext, SyncConfig, WsConfig};
use tokio::sync::watch;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One line of output: which feed changed and its new state.
type Change = (&'static str, String);

fn changes<S>(feed: &'static str, state: watch::Receiver<S>) -> BoxStream<'static, Change>
where
    S: Debug + Clone + Send + Sync + 'static,
{
    WatchStream::from_changes(state)
        .map(move |state| (feed, format!("{state:?}")))
        .boxed()
}

fn id_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|id| !id.trim().is_empty())
}

fn ms_var(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{name} must be a number of milliseconds")),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront_sdk=debug,storefront_watch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let url = env::var("STOREFRONT_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string());
    let mut ws_config = WsConfig::new(&url)
        .with_reconnect_delay(Duration::from_millis(ms_var(
            "STOREFRONT_RECONNECT_DELAY_MS",
            1000,
        )?))
        .with_max_reconnect_delay(Duration::from_millis(ms_var(
            "STOREFRONT_MAX_RECONNECT_DELAY_MS",
            30_000,
        )?));
    if let Ok(token) = env::var("STOREFRONT_TOKEN") {
        ws_config = ws_config.with_auth_token(token);
    }

    let sync_config = SyncConfig::default()
        .with_typing_ttl(ms_var("STOREFRONT_TYPING_TTL_MS", 3000)?)
        .with_price_highlight(ms_var("STOREFRONT_PRICE_HIGHLIGHT_MS", 3000)?);

    info!("Starting storefront watch");
    info!("Realtime URL: {}", url);

    let (manager, ctx) =
        RealtimeContext::websocket(ws_config, sync_config).context("invalid configuration")?;
    let cache = ctx.cache().clone();
    manager.connect();

    let notifications = NotificationFeed::new(&ctx);
    let activity = ActivityFeed::new(&ctx);
    let user_id = id_var("WATCH_USER_ID");
    let cart = CartSync::new(&ctx, user_id.clone());
    let presence = user_id.map(|id| PresenceWatch::new(&ctx, Some(id)));

    let product_id = id_var("WATCH_PRODUCT_ID");
    let price = product_id.as_ref().map(|id| PriceWatch::new(&ctx, Some(id.clone())));
    let inventory = product_id
        .as_ref()
        .map(|id| InventoryWatch::new(&ctx, Some(id.clone())));
    let viewers = product_id
        .as_ref()
        .map(|id| ViewerCount::new(&ctx, Some(id.clone())));
    let reviews = product_id
        .as_ref()
        .map(|id| ReviewFeed::new(&ctx, Some(id.clone())));
    let questions = product_id.map(|id| QuestionFeed::new(&ctx, Some(id)));
    let order = id_var("WATCH_ORDER_ID").map(|id| OrderTracker::new(&ctx, Some(id)));
    let chat_id = id_var("WATCH_CHAT_ID");
    let chat = chat_id.as_ref().map(|id| ChatFeed::new(&ctx, Some(id.clone())));
    let typing = chat_id.map(|id| TypingIndicator::new(&ctx, Some(id)));
    let sale = id_var("WATCH_SALE_ID").map(|id| FlashSaleCountdown::new(&ctx, Some(id)));
    let seller = id_var("WATCH_SELLER_ID").map(|id| SellerDashboard::new(&ctx, Some(id)));

    let mut feeds = vec![
        changes("notifications", notifications.state()),
        changes("activity", activity.state()),
        changes("cart", cart.state()),
    ];
    feeds.extend(presence.as_ref().map(|f| changes("presence", f.state())));
    feeds.extend(price.as_ref().map(|f| changes("price", f.state())));
    feeds.extend(inventory.as_ref().map(|f| changes("inventory", f.state())));
    feeds.extend(viewers.as_ref().map(|f| changes("viewers", f.state())));
    feeds.extend(reviews.as_ref().map(|f| changes("reviews", f.state())));
    feeds.extend(questions.as_ref().map(|f| changes("questions", f.state())));
    feeds.extend(order.as_ref().map(|f| changes("order", f.state())));
    feeds.extend(chat.as_ref().map(|f| changes("chat", f.state())));
    feeds.extend(typing.as_ref().map(|f| changes("typing", f.state())));
    feeds.extend(sale.as_ref().map(|f| changes("flash_sale", f.state())));
    feeds.extend(seller.as_ref().map(|f| changes("seller", f.state())));
    let mut feeds = stream::select_all(feeds);

    let mut status = WatchStream::new(manager.watch_status());
    let mut invalidations = BroadcastStream::new(cache.subscribe());

    loop {
        tokio::select! {
            Some((feed, state)) = feeds.next() => {
                info!(feed, %state, "feed changed");
            }
            Some(status) = status.next() => {
                info!(%status, "connection status");
            }
            Some(key) = invalidations.next() => match key {
                Ok(key) => debug!(%key, "query invalidated"),
                Err(e) => warn!(error = %e, "invalidation log lagged"),
            },
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                break;
            }
        }
    }

    info!("Shutting down storefront watch");
    info!(metrics = ?manager.handle().metrics().snapshot(), "socket metrics");
    manager.disconnect();

    Ok(())
}

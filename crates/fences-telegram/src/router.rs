use std::{collections::HashMap, sync::Arc, time::Duration};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use fences_core::{
    broadcast::BroadcastDispatcher,
    config::Config,
    directory::DirectoryService,
    engine::Engine,
    messaging::port::DeliveryPort,
    monitor::ExpirationMonitor,
    session::SessionStore,
};

use crate::{handlers, TelegramDelivery};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DirectoryService>,
    pub engine: Arc<Engine>,
    pub chat_locks: Arc<ChatLocks>,
}

/// One lock per conversation so its events run strictly in order.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    service: Arc<DirectoryService>,
    monitor: Arc<ExpirationMonitor>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!("fences bot started: @{}", me.username());
    }

    let delivery: Arc<dyn DeliveryPort> = Arc::new(TelegramDelivery::new(bot.clone()));
    let dispatcher = BroadcastDispatcher::new(service.clone(), delivery);
    let sessions = Arc::new(SessionStore::new());
    let engine = Arc::new(Engine::new(
        service.clone(),
        sessions.clone(),
        dispatcher,
        monitor.expired_flag(),
        cfg.alias_byte_limit,
    ));

    let _monitor_task = monitor.start();

    // Abandoned conversations leave scratch behind; sweep it periodically.
    let sweeper_sessions = sessions.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            let evicted = sweeper_sessions.sweep().await;
            if evicted > 0 {
                debug!(evicted, "evicted idle sessions");
            }
        }
    });

    let state = Arc::new(AppState {
        service,
        engine,
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    monitor.stop();
    Ok(())
}

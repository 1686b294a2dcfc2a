use std::sync::Arc;

use fences_core::{
    config::Config,
    directory::DirectoryService,
    monitor::ExpirationMonitor,
    store::{self, DirectoryStore, JsonStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fences_core::logging::init("fences");

    let cfg = Arc::new(Config::load()?);

    let store: Arc<dyn DirectoryStore> = Arc::new(JsonStore::new(cfg.data_dir.clone()));
    store::seed(store.as_ref(), &cfg).await?;

    let service = Arc::new(DirectoryService::new(store, cfg.datetime_pattern.clone()));
    let monitor = Arc::new(ExpirationMonitor::new(service.clone()));

    fences_telegram::router::run_polling(cfg, service, monitor).await?;

    Ok(())
}

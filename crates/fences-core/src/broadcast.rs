use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    directory::DirectoryService,
    domain::ChatId,
    messaging::{port::DeliveryPort, types::Chunk},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BroadcastTarget {
    All,
    Label(String),
}

/// Per-recipient outcome of a broadcast. Successful deliveries stand even
/// when others fail.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: Vec<String>,
}

impl BroadcastReport {
    pub fn overall_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolves a broadcast target to delivery addresses and pushes every chunk
/// to each reachable recipient. Fail-fast per recipient, independent across
/// recipients; members the bot has never seen have no address and fail
/// without a delivery attempt.
pub struct BroadcastDispatcher {
    service: Arc<DirectoryService>,
    delivery: Arc<dyn DeliveryPort>,
}

impl BroadcastDispatcher {
    pub fn new(service: Arc<DirectoryService>, delivery: Arc<dyn DeliveryPort>) -> Self {
        Self { service, delivery }
    }

    pub async fn dispatch(&self, target: &BroadcastTarget, chunks: &[Chunk]) -> BroadcastReport {
        let directory = self.service.load().await;

        let recipients: Vec<(String, Option<i64>)> = match target {
            BroadcastTarget::All => directory
                .members
                .iter()
                .map(|m| (m.label.clone(), m.chat_id))
                .collect(),
            BroadcastTarget::Label(label) => match directory.find_by_label(label) {
                Some(m) => vec![(m.label.clone(), m.chat_id)],
                None => {
                    warn!(%label, "broadcast target unknown");
                    return BroadcastReport {
                        delivered: 0,
                        failed: vec![label.clone()],
                    };
                }
            },
        };

        let mut report = BroadcastReport::default();
        for (label, chat_id) in recipients {
            let Some(chat_id) = chat_id else {
                report.failed.push(label);
                continue;
            };

            let mut ok = true;
            for chunk in chunks {
                if let Err(e) = self.delivery.deliver(ChatId(chat_id), chunk).await {
                    warn!(%label, "broadcast delivery failed: {e}");
                    ok = false;
                    break;
                }
            }
            if ok {
                report.delivered += 1;
            } else {
                report.failed.push(label);
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failed.len(),
            "broadcast dispatched"
        );
        report
    }
}

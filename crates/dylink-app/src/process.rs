//! Message processing
//!
//! Runs TEA updates and performs the resulting actions. Config store access
//! happens here, on the event loop; everything else is handed to
//! `actions::handle_action` for background execution.

use std::collections::VecDeque;
use std::sync::Arc;

use dylink_core::prelude::*;
use dylink_patcher::PatcherFactory;
use tokio::sync::mpsc;

use crate::actions::handle_action;
use crate::config::{ConfigField, ConfigStore};
use crate::handler;
use crate::message::Message;
use crate::orchestrator::OperationContext;
use crate::state::AppState;
use crate::UpdateAction;

/// Process a message through the TEA update function
pub fn process_message<F: PatcherFactory>(
    state: &mut AppState,
    message: Message,
    msg_tx: &mpsc::Sender<Message>,
    store: &mut dyn ConfigStore,
    context: &Arc<OperationContext<F>>,
) {
    let mut queue = VecDeque::from([message]);

    while let Some(m) = queue.pop_front() {
        let result = handler::update(state, m);

        if let Some(action) = result.action {
            match action {
                UpdateAction::PersistConfig { bid, field } => {
                    queue.push_back(persist_config(store, &bid, field));
                }
                action => {
                    let action = hydrate_run_operation(action, store);
                    handle_action(action, msg_tx.clone(), context.clone());
                }
            }
        }

        // Continue with follow-up message
        if let Some(next) = result.message {
            queue.push_back(next);
        }
    }
}

/// Attach the configuration snapshot to a `RunOperation` action.
///
/// The snapshot is taken here, before the task is spawned, so option
/// changes made while the operation runs only affect the next one.
/// All other action variants are returned unchanged.
fn hydrate_run_operation(action: UpdateAction, store: &dyn ConfigStore) -> UpdateAction {
    match action {
        UpdateAction::RunOperation {
            kind,
            bid,
            config: None,
        } => {
            let config = store.get(&bid);
            UpdateAction::RunOperation {
                kind,
                bid,
                config: Some(config),
            }
        }
        other => other,
    }
}

fn persist_config(store: &mut dyn ConfigStore, bid: &str, field: ConfigField) -> Message {
    match store.set(bid, field) {
        Ok(config) => {
            debug!("{}: {}", bid, field);
            Message::ConfigSaved(config)
        }
        Err(e) => {
            error!("Failed to save {} for {}: {}", field, bid, e);
            Message::ConfigSaveFailed {
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use dylink_core::{InjectStrategy, InjectionConfiguration, OperationKind};

    #[test]
    fn test_hydrate_takes_store_snapshot() {
        let mut store = MemoryConfigStore::new();
        store
            .set("com.dts.freefireth", ConfigField::Strategy(InjectStrategy::Preorder))
            .unwrap();

        let action = hydrate_run_operation(
            UpdateAction::RunOperation {
                kind: OperationKind::Attach,
                bid: "com.dts.freefireth".to_string(),
                config: None,
            },
            &store,
        );

        match action {
            UpdateAction::RunOperation {
                config: Some(config),
                ..
            } => assert_eq!(config.strategy, InjectStrategy::Preorder),
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_hydrate_keeps_existing_snapshot() {
        let store = MemoryConfigStore::new();
        let snapshot = InjectionConfiguration {
            use_weak_reference: false,
            ..InjectionConfiguration::default()
        };

        let action = hydrate_run_operation(
            UpdateAction::RunOperation {
                kind: OperationKind::Detach,
                bid: "com.dts.freefireth".to_string(),
                config: Some(snapshot),
            },
            &store,
        );

        assert_eq!(
            action,
            UpdateAction::RunOperation {
                kind: OperationKind::Detach,
                bid: "com.dts.freefireth".to_string(),
                config: Some(snapshot),
            }
        );
    }

    #[test]
    fn test_persist_config_reports_saved_options() {
        let mut store = MemoryConfigStore::new();
        let msg = persist_config(
            &mut store,
            "com.dts.freefireth",
            ConfigField::WeakReference(false),
        );

        match msg {
            Message::ConfigSaved(config) => assert!(!config.use_weak_reference),
            other => panic!("unexpected message {:?}", other),
        }
    }
}

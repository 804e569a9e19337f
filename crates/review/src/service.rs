//! Long-lived annotation of a session's document.

use crate::config::AnnotatorConfig;
use crate::store::{AnnotationStore, SharedAnnotationStore};
use crate::watcher::{BatchStats, MutationWatcher};
use dom::{PatchKey, Session, Subscription, TreeCapability};
use std::cell::{Cell, Ref};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("session has no document to observe")]
    NoDocument,
}

/// Handle returned by `start_annotation_service`.
///
/// The watcher itself is owned by the session's observer list; this handle
/// shares the annotation store and the running totals with it.
pub struct AnnotationService {
    root: PatchKey,
    subscription: Subscription,
    store: SharedAnnotationStore,
    initial: BatchStats,
    totals: Rc<Cell<BatchStats>>,
}

impl AnnotationService {
    pub fn root(&self) -> PatchKey {
        self.root
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }

    pub fn is_seen(&self, key: PatchKey) -> bool {
        self.store.borrow().is_seen(key)
    }

    pub fn store(&self) -> Ref<'_, AnnotationStore> {
        self.store.borrow()
    }

    /// What the startup sweep did.
    pub fn initial_sweep(&self) -> BatchStats {
        self.initial
    }

    /// Sweep plus every batch delivered so far.
    pub fn totals(&self) -> BatchStats {
        self.totals.get()
    }

    /// Unsubscribe and drop records of nodes that left the document.
    pub fn stop(self, session: &Session) -> BatchStats {
        self.subscription.unsubscribe();
        let pruned = self.store.borrow_mut().prune_detached(session.tree());
        let totals = self.totals.get();
        log::info!(
            target: "review.watcher",
            "annotation service stopped: {} visited, {} highlighted, {pruned} stale records pruned",
            totals.visited,
            totals.highlighted
        );
        totals
    }
}

/// Sweep the current document once, then keep annotating everything the
/// host inserts below the document root.
pub fn start_annotation_service(
    session: &mut Session,
    config: &AnnotatorConfig,
) -> Result<AnnotationService, ServiceError> {
    let root = session.tree().root().ok_or(ServiceError::NoDocument)?;
    let store = AnnotationStore::shared();
    let watcher = MutationWatcher::new(config, Rc::clone(&store));

    let initial = watcher.sweep(session.tree_mut(), root);
    let totals = Rc::new(Cell::new(initial));

    let running = Rc::clone(&totals);
    let subscription = session.subscribe(root, true, move |tree, records| {
        let stats = watcher.handle_batch(tree, records);
        let mut sum = running.get();
        sum += stats;
        running.set(sum);
    });
    // Rewrites done by the sweep are delivered now, before any host batch.
    session.flush();

    log::info!(
        target: "review.watcher",
        "annotation service started at {root} for keyword {:?}",
        config.keyword
    );
    Ok(AnnotationService {
        root,
        subscription,
        store,
        initial,
        totals,
    })
}

#[cfg(test)]
mod tests {
    use super::{ServiceError, start_annotation_service};
    use crate::config::AnnotatorConfig;
    use dom::Session;

    #[test]
    fn refuses_empty_session() {
        let mut session = Session::new();
        assert_eq!(
            start_annotation_service(&mut session, &AnnotatorConfig::default()).err(),
            Some(ServiceError::NoDocument)
        );
        assert_eq!(session.observer_count(), 0);
    }
}

//! Ticket lifecycle store
//!
//! Owns the pending and completed ticket collections. Every mutation goes
//! through a named transition:
//!
//! ```text
//! PENDING -> PROCESSING -> { COMPLETED, FAILED }
//! FAILED  -> PENDING        (requeue, for a user retry)
//! FAILED  -> removed        (explicit discard)
//! ```
//!
//! Completion moves the entry out of the pending set and into the ticket set
//! under a single write lock, so no reader ever sees both or neither.

use crate::concert::ConcertInfo;
use crate::recorder::AudioUri;
use crate::tickets::types::{PendingId, PendingStatus, PendingTicket, Ticket};
use crate::utils::channels::{Broadcaster, Subscription, SubscriptionId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("pending ticket not found: {0}")]
    NotFound(PendingId),

    #[error("pending ticket {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: PendingId,
        from: PendingStatus,
        to: PendingStatus,
    },

    #[error("ticket id already in use: {0}")]
    DuplicateTicket(String),

    #[error("ticket {ticket_id} is {status}, only completed tickets can be stored")]
    NotCompleted {
        ticket_id: String,
        status: PendingStatus,
    },
}

/// Change notifications emitted after each successful mutation
#[derive(Debug, Clone, PartialEq)]
pub enum TicketEvent {
    PendingCreated(PendingId),
    StatusChanged {
        id: PendingId,
        from: PendingStatus,
        to: PendingStatus,
    },
    Completed {
        pending_id: PendingId,
        ticket_id: String,
    },
    Removed(PendingId),
    TicketAdded(String),
}

/// One row of the merged pending + completed view
#[derive(Debug, Clone, PartialEq)]
pub enum TicketEntry {
    Pending(PendingTicket),
    Completed(Ticket),
}

impl TicketEntry {
    pub fn id(&self) -> &str {
        match self {
            TicketEntry::Pending(pending) => pending.id.as_str(),
            TicketEntry::Completed(ticket) => &ticket.id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            TicketEntry::Pending(pending) => pending.created_at,
            TicketEntry::Completed(ticket) => ticket.created_at,
        }
    }

    pub fn status(&self) -> PendingStatus {
        match self {
            TicketEntry::Pending(pending) => pending.status,
            TicketEntry::Completed(_) => PendingStatus::Completed,
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    pending: HashMap<PendingId, PendingTicket>,
    /// Most recent first
    pending_order: VecDeque<PendingId>,
    /// Most recent first
    tickets: VecDeque<Ticket>,
    ticket_ids: HashSet<String>,
    /// Every pending id ever handed out, so ids are never reused
    issued: HashSet<PendingId>,
}

impl StoreInner {
    fn id_in_use(&self, id: &str) -> bool {
        self.ticket_ids.contains(id) || self.issued.contains(&PendingId::from(id))
    }

    fn fresh_id(&self) -> PendingId {
        loop {
            let id = PendingId::generate();
            if !self.id_in_use(id.as_str()) {
                return id;
            }
        }
    }

    fn remove_pending(&mut self, id: &PendingId) -> Option<PendingTicket> {
        let removed = self.pending.remove(id)?;
        self.pending_order.retain(|other| other != id);
        Some(removed)
    }

    fn check_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        if ticket.status != PendingStatus::Completed {
            return Err(StoreError::NotCompleted {
                ticket_id: ticket.id.clone(),
                status: ticket.status,
            });
        }
        if self.id_in_use(&ticket.id) {
            return Err(StoreError::DuplicateTicket(ticket.id.clone()));
        }
        Ok(())
    }
}

/// Process-scoped container for pending and completed tickets
#[derive(Clone)]
pub struct TicketStore {
    inner: Arc<RwLock<StoreInner>>,
    events: Broadcaster<TicketEvent>,
}

impl Default for TicketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            events: Broadcaster::new(),
        }
    }

    /// Create a store that already holds completed tickets, newest first
    pub fn with_tickets(tickets: Vec<Ticket>) -> Result<Self, StoreError> {
        let store = Self::new();
        for ticket in tickets.into_iter().rev() {
            store.add_ticket(ticket)?;
        }
        Ok(store)
    }

    pub fn subscribe(&self) -> Subscription<TicketEvent> {
        self.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.events.unsubscribe(id);
    }

    // === Transitions ===

    /// Register a new unit of work in the PENDING state
    pub fn create_pending(&self, concert_info: ConcertInfo, audio_uri: AudioUri) -> PendingId {
        let id = {
            let mut inner = self.inner.write();
            let id = inner.fresh_id();
            let pending = PendingTicket {
                id: id.clone(),
                concert_info,
                audio_uri,
                created_at: Utc::now(),
                status: PendingStatus::Pending,
                last_error: None,
            };
            inner.issued.insert(id.clone());
            inner.pending.insert(id.clone(), pending);
            inner.pending_order.push_front(id.clone());
            id
        };

        debug!("Created pending ticket {}", id);
        self.events.emit(TicketEvent::PendingCreated(id.clone()));
        id
    }

    /// PENDING -> PROCESSING. Already processing is a no-op.
    pub fn mark_processing(&self, id: &PendingId) -> Result<(), StoreError> {
        self.transition(
            id,
            PendingStatus::Processing,
            |from| match from {
                PendingStatus::Pending | PendingStatus::Processing => true,
                PendingStatus::Completed | PendingStatus::Failed => false,
            },
            |_| {},
        )
    }

    /// Replace a pending entry with its completed ticket
    ///
    /// Only presence is checked: an entry may complete from any pending state.
    pub fn complete(&self, id: &PendingId, ticket: Ticket) -> Result<(), StoreError> {
        let ticket_id = ticket.id.clone();
        {
            let mut inner = self.inner.write();
            let status = match inner.pending.get(id) {
                Some(pending) => pending.status,
                None => return Err(not_found(id, "complete")),
            };
            inner.check_ticket(&ticket)?;

            if status != PendingStatus::Processing {
                debug!("Completing {} directly from {}", id, status);
            }

            inner.remove_pending(id);
            inner.ticket_ids.insert(ticket_id.clone());
            inner.tickets.push_front(ticket);
        }

        info!("Pending ticket {} completed as {}", id, ticket_id);
        self.events.emit(TicketEvent::Completed {
            pending_id: id.clone(),
            ticket_id,
        });
        Ok(())
    }

    /// Mark an entry as failed. It stays visible until removed or requeued.
    pub fn fail(&self, id: &PendingId, reason: impl Into<String>) -> Result<(), StoreError> {
        let reason = reason.into();
        let from = {
            let mut inner = self.inner.write();
            let Some(pending) = inner.pending.get_mut(id) else {
                return Err(not_found(id, "fail"));
            };
            let from = pending.status;
            pending.status = PendingStatus::Failed;
            pending.last_error = Some(reason.clone());
            from
        };

        info!("Pending ticket {} failed: {}", id, reason);
        if from != PendingStatus::Failed {
            self.events.emit(TicketEvent::StatusChanged {
                id: id.clone(),
                from,
                to: PendingStatus::Failed,
            });
        }
        Ok(())
    }

    /// FAILED -> PENDING, clearing the failure message
    pub fn requeue(&self, id: &PendingId) -> Result<(), StoreError> {
        self.transition(id, PendingStatus::Pending, |from| from.is_failed(), |pending| {
            pending.last_error = None;
        })
    }

    /// Delete a pending entry. Removing an absent id is not an error.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self, id: &PendingId) -> bool {
        let removed = self.inner.write().remove_pending(id).is_some();
        if removed {
            debug!("Removed pending ticket {}", id);
            self.events.emit(TicketEvent::Removed(id.clone()));
        }
        removed
    }

    /// Insert an already completed ticket at the front of the collection
    pub fn add_ticket(&self, ticket: Ticket) -> Result<(), StoreError> {
        let ticket_id = ticket.id.clone();
        {
            let mut inner = self.inner.write();
            inner.check_ticket(&ticket)?;
            inner.ticket_ids.insert(ticket_id.clone());
            inner.tickets.push_front(ticket);
        }
        self.events.emit(TicketEvent::TicketAdded(ticket_id));
        Ok(())
    }

    fn transition(
        &self,
        id: &PendingId,
        to: PendingStatus,
        allowed: impl Fn(PendingStatus) -> bool,
        update: impl FnOnce(&mut PendingTicket),
    ) -> Result<(), StoreError> {
        let from = {
            let mut inner = self.inner.write();
            let Some(pending) = inner.pending.get_mut(id) else {
                return Err(not_found(id, "transition"));
            };
            let from = pending.status;
            if !allowed(from) {
                return Err(StoreError::InvalidTransition {
                    id: id.clone(),
                    from,
                    to,
                });
            }
            pending.status = to;
            update(pending);
            from
        };

        if from != to {
            debug!("Pending ticket {}: {} -> {}", id, from, to);
            self.events.emit(TicketEvent::StatusChanged {
                id: id.clone(),
                from,
                to,
            });
        }
        Ok(())
    }

    // === Queries ===

    /// Pending entries, most recent first
    pub fn pending(&self) -> Vec<PendingTicket> {
        let inner = self.inner.read();
        inner
            .pending_order
            .iter()
            .filter_map(|id| inner.pending.get(id).cloned())
            .collect()
    }

    /// Completed tickets, most recent first
    pub fn tickets(&self) -> Vec<Ticket> {
        self.inner.read().tickets.iter().cloned().collect()
    }

    pub fn pending_ticket(&self, id: &PendingId) -> Option<PendingTicket> {
        self.inner.read().pending.get(id).cloned()
    }

    pub fn ticket(&self, id: &str) -> Option<Ticket> {
        let inner = self.inner.read();
        if !inner.ticket_ids.contains(id) {
            return None;
        }
        inner.tickets.iter().find(|ticket| ticket.id == id).cloned()
    }

    pub fn contains_pending(&self, id: &PendingId) -> bool {
        self.inner.read().pending.contains_key(id)
    }

    pub fn contains_ticket(&self, id: &str) -> bool {
        self.inner.read().ticket_ids.contains(id)
    }

    /// Pending and completed entries merged, newest first
    pub fn entries(&self) -> Vec<TicketEntry> {
        let inner = self.inner.read();
        let mut entries: Vec<TicketEntry> = inner
            .pending_order
            .iter()
            .filter_map(|id| inner.pending.get(id).cloned())
            .map(TicketEntry::Pending)
            .chain(inner.tickets.iter().cloned().map(TicketEntry::Completed))
            .collect();
        entries.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        entries
    }

    pub fn pending_len(&self) -> usize {
        self.inner.read().pending.len()
    }

    pub fn tickets_len(&self) -> usize {
        self.inner.read().tickets.len()
    }
}

fn not_found(id: &PendingId, operation: &str) -> StoreError {
    error!("{} on unknown pending ticket {}", operation, id);
    StoreError::NotFound(id.clone())
}

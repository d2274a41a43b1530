pub mod emotions;
pub mod store;
pub mod types;

pub use emotions::EmotionDistribution;
pub use store::{StoreError, TicketEntry, TicketEvent, TicketStore};
pub use types::{PendingId, PendingStatus, PendingTicket, Ticket, TicketImage};

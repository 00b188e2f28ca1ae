//! Host document model: DOM arena, inline styles, mutation records, input
//! events, session history and a virtual timer queue.
//!
//! Everything here runs on one thread. Nothing is `Send`; listeners are plain
//! boxed closures owned by the document or history that registered them.

pub mod document;
pub mod events;
pub mod history;
pub mod style;
pub mod timers;

pub use document::Document;
pub use document::MutationRecord;
pub use document::NodeId;
pub use document::NodeKind;
pub use events::EventKind;
pub use events::InputEvent;
pub use events::ListenerId;
pub use events::ListenerOptions;
pub use history::History;
pub use history::NavigationEvent;
pub use history::NavigationKind;
pub use style::InlineStyle;
pub use timers::TimerId;
pub use timers::TimerQueue;

//! Content-script pipeline: finds short-form video content in a live
//! document, replaces it with reversible overlays, hides the immersive
//! viewer's navigation controls, blocks scrolling inside that viewer, and
//! re-runs whenever the document mutates or the page navigates client-side.

pub mod ancillary;
pub mod background;
pub mod controller;
pub mod gate;
pub mod matcher;
pub mod mode_preventer;
pub mod mutation_watcher;
pub mod navigation;
pub mod ownership;
pub mod registry;
pub mod runtime;
pub mod saved_panel;
pub mod suppressor;
pub mod timer;

pub use ancillary::AncillaryElementSuppressor;
pub use background::BackgroundService;
pub use controller::ClickOutcome;
pub use controller::PageController;
pub use controller::PassReport;
pub use controller::Stage;
pub use controller::StageFailure;
pub use gate::ProcessingGate;
pub use matcher::Matcher;
pub use mode_preventer::ModePreventer;
pub use mutation_watcher::MutationWatcher;
pub use navigation::NavigationSource;
pub use navigation::NavigationWatcher;
pub use registry::ItemHandle;
pub use registry::ItemState;
pub use registry::SessionRegistry;
pub use runtime::ContentScript;
pub use saved_panel::SavedItemsPanel;
pub use suppressor::ItemSuppressor;
pub use timer::DebounceSlot;
pub use timer::PassTrigger;

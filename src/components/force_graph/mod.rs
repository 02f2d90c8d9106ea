mod component;
mod layout;
mod render;
mod state;
mod style;
mod types;

pub use component::ConceptMapCanvas;
pub use types::MapClick;

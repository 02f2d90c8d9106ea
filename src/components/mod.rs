pub mod bindings;
pub mod force_graph;
pub mod panels;

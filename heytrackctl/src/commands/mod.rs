pub mod budget;
pub mod catalog;
pub mod hpp;
pub mod reorder;

pub mod clustering;
pub mod grid;
pub mod quadtree;

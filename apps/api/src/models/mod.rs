pub mod popularity;

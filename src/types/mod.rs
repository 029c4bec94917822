pub mod area;
pub mod assessment;
pub mod combined;
pub mod coordinate;
pub mod weather;

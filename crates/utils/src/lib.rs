pub mod pmtiles;
pub mod response;

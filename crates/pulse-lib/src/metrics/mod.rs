pub mod hrv;
pub mod live;

pub mod duration;
pub mod net;

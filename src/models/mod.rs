pub mod event;
pub mod seat;

pub use event::{Event, NewEvent};
pub use seat::Seat;

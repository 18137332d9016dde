pub mod calendar;
pub mod message;

pub use calendar::{Availability, CalendarEvent};
pub use message::{IdSequence, Message, MessageId, Role};

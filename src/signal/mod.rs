mod any;
mod controller;
mod reason;
mod sources;

pub use any::any_signal;
pub use controller::{AbortController, AbortSignal, Subscription};
pub use reason::AbortReason;
pub use sources::{deadline, interrupt, timeout, Timer};

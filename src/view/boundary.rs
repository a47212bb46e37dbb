use std::any::Any;
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::notify::{Notification, Notifier};

pub const FALLBACK: &str = "Something went wrong.";

/// Run a render. If it errors or panics, show [`FALLBACK`] instead and tell
/// the user once. Nothing else is affected.
pub fn render_guarded<F, E>(notifier: &dyn Notifier, render: F) -> String
where
    F: FnOnce() -> Result<String, E>,
    E: Display,
{
    let reason = match catch_unwind(AssertUnwindSafe(render)) {
        Ok(Ok(output)) => return output,
        Ok(Err(e)) => e.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };
    log::error!("Render failed: {}", reason);
    notifier.notify(Notification::error(format!("{} {}", FALLBACK, reason)));
    FALLBACK.to_string()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

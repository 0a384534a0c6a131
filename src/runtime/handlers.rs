//! Per-event callbacks run after a dispatch has been applied to the cache.
//!
//! ```ignore
//! let mut handlers = Handlers::new();
//! handlers.on(Event::MessageCreate, |state, dispatch| {
//!     if let Some(message) = dispatch.target().and_then(|r| state.get_message(r.id)) {
//!         println!("{}", message.content.get().map(String::as_str).unwrap_or_default());
//!     }
//! });
//! ingest::replay_with(&state, &handlers, reader)?;
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::registry::EntityRef;
use crate::runtime::events::Event;
use crate::runtime::state::State;

/// One applied dispatch, as seen by a handler.
#[derive(Debug, Clone, Copy)]
pub struct Dispatch<'a> {
    pub event: Event,
    pub data: &'a Value,
    pub sequence: Option<u64>,
    /// Whether applying the event changed the cache.
    pub changed: bool,
}

impl Dispatch<'_> {
    pub fn target(&self) -> Option<EntityRef> {
        self.event.target(self.data)
    }
}

type Handler = Box<dyn Fn(&State, &Dispatch<'_>) + Send + Sync>;

/// Callbacks keyed by event, run in registration order.
#[derive(Default)]
pub struct Handlers {
    handlers: HashMap<Event, Vec<Handler>>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, event: Event, handler: F) -> &mut Self
    where
        F: Fn(&State, &Dispatch<'_>) + Send + Sync + 'static,
    {
        self.handlers.entry(event).or_default().push(Box::new(handler));
        self
    }

    pub fn count(&self, event: Event) -> usize {
        self.handlers.get(&event).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.values().all(Vec::is_empty)
    }

    /// Run every handler registered for the dispatch's event. Returns how many ran.
    pub fn emit(&self, state: &State, dispatch: &Dispatch<'_>) -> usize {
        let Some(handlers) = self.handlers.get(&dispatch.event) else {
            return 0;
        };
        for handler in handlers {
            handler(state, dispatch);
        }
        handlers.len()
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.handlers.iter().map(|(event, list)| (event, list.len())))
            .finish()
    }
}

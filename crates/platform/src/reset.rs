use tracing::trace;

/// A component that returns to its power-on state when the system resets.
pub trait ResetHandler {
    fn system_reset(&mut self);
}

impl<F> ResetHandler for F
where
    F: FnMut(),
{
    fn system_reset(&mut self) {
        self();
    }
}

/// Ordered list of system reset handlers.
///
/// Handlers run in registration order, so components registered later observe the state
/// established by earlier ones (boot images are installed before vCPUs are seeded, for example).
#[derive(Default)]
pub struct ResetList {
    handlers: Vec<(String, Box<dyn ResetHandler>)>,
}

impl ResetList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Box<dyn ResetHandler>) {
        self.handlers.push((name.into(), handler));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.handlers.iter().map(|(name, _)| name.as_str())
    }

    pub fn run(&mut self) {
        for (name, handler) in &mut self.handlers {
            trace!(handler = %name, "system reset");
            handler.system_reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn handlers_run_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut list = ResetList::new();
        for name in ["rom", "cpu0", "cpu1"] {
            let order = order.clone();
            list.register(name, Box::new(move || order.borrow_mut().push(name)));
        }

        list.run();
        list.run();

        assert_eq!(list.len(), 3);
        assert_eq!(list.names().collect::<Vec<_>>(), ["rom", "cpu0", "cpu1"]);
        assert_eq!(
            *order.borrow(),
            ["rom", "cpu0", "cpu1", "rom", "cpu0", "cpu1"]
        );
    }
}

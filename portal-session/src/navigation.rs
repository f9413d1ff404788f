//! Seam to whatever owns routing in the host application.

use tracing::warn;

/// Receives forced redirects, e.g. to the login page once a session is lost.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Navigator for headless hosts: the redirect is only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, path: &str) {
        warn!(path, "Session lost, redirect requested");
    }
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn redirect(&self, path: &str) {
        self(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn closures_are_navigators() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let navigator: Box<dyn Navigator> =
            Box::new(move |path: &str| sink.lock().unwrap().push(path.to_string()));

        navigator.redirect("/login");
        assert_eq!(*seen.lock().unwrap(), vec!["/login".to_string()]);
    }
}

use std::thread::{self, JoinHandle};

use crate::constants::APP_NAME;

/// Spawns a named background thread (`ares-<name>`).
///
/// Spawn failures are logged and reported as `None`.
pub fn spawn_named_thread<F>(name: &str, task: F) -> Option<JoinHandle<()>>
where F: FnOnce() + Send + 'static {
    let thread_name = format!("{APP_NAME}-{name}");

    match thread::Builder::new().name(thread_name.clone()).spawn(task) {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::error!(thread = %thread_name, error = %err, "failed to spawn thread");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;
    use std::time::Duration;

    use super::*;

    #[test]
    fn spawn_named_thread_runs_task_with_prefix() {
        let (tx, rx) = channel();

        let handle = spawn_named_thread("monitor", move || {
            let name = thread::current().name().unwrap_or("").to_string();
            tx.send(name).unwrap();
        });

        assert!(handle.is_some());
        let thread_name = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(thread_name, "ares-monitor");
    }

    #[test]
    fn spawn_named_thread_can_be_joined() {
        let handle = spawn_named_thread("join-test", || {}).unwrap();
        assert!(handle.join().is_ok());
    }
}

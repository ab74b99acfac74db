use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Opaque identifier for one streaming session.
///
/// Handed to the caller when a stream is opened, before the handshake
/// completes, and stable for the whole life of that session (including
/// across restarts). Required for [`StreamRegistry::close`] and
/// [`StreamRegistry::restart`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId(String);

impl StreamId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionCommand {
    Close,
    Restart,
}

/// Control surface registered for a live session: a sender into the session
/// task's command channel. The socket itself stays owned by the task.
#[derive(Debug, Clone)]
pub(crate) struct StreamHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl StreamHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self { commands }
    }

    fn send(&self, command: SessionCommand) {
        // Best-effort: a dead session task removes its own entry on exit.
        let _ = self.commands.send(command);
    }
}

/// Concurrent-safe mapping from stream id to live session handle.
///
/// Sessions appear here only between a successful handshake and the
/// close/error event that follows; ids for sessions still connecting are
/// unknown to the registry. All map access goes through one mutex.
pub struct StreamRegistry {
    sessions: Mutex<HashMap<StreamId, StreamHandle>>,
    prefix: u32,
    next_seq: AtomicU64,
}

impl StreamRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            prefix: rand::random(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Allocate a fresh session id: random per-registry prefix plus a
    /// monotonic counter, so ids are never reused while this registry lives
    pub(crate) fn next_id(&self) -> StreamId {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        StreamId(format!("ws-{:08x}-{}", self.prefix, seq))
    }

    // A caller handler panicking on a session task must not wedge every
    // other session, so poisoning is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, HashMap<StreamId, StreamHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a handle for `id`. Called by the owning session task once per
    /// successful handshake; re-registering an id overwrites.
    pub(crate) fn register(&self, id: StreamId, handle: StreamHandle) {
        let replaced = self.lock().insert(id.clone(), handle).is_some();
        debug!(stream = %id, replaced, "registered stream session");
    }

    /// Remove `id` if present; idempotent
    pub(crate) fn remove(&self, id: &StreamId) {
        if self.lock().remove(id).is_some() {
            debug!(stream = %id, "deregistered stream session");
        }
    }

    pub(crate) fn lookup(&self, id: &StreamId) -> Option<StreamHandle> {
        self.lock().get(id).cloned()
    }

    /// Whether `id` currently maps to an open session
    #[must_use]
    pub fn contains(&self, id: &StreamId) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of open sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Ask the session to close its transport. Returns false when the id is
    /// unknown. Removal happens asynchronously, when the session's own close
    /// event fires; this call never waits for it.
    #[must_use]
    pub fn close(&self, id: &StreamId) -> bool {
        match self.lookup(id) {
            Some(handle) => {
                handle.send(SessionCommand::Close);
                true
            }
            None => false,
        }
    }

    /// Ask the session to drop its transport and reconnect a fresh one under
    /// the same id. Returns false when the id is unknown.
    #[must_use]
    pub fn restart(&self, id: &StreamId) -> bool {
        match self.lookup(id) {
            Some(handle) => {
                handle.send(SessionCommand::Restart);
                true
            }
            None => false,
        }
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (StreamHandle, mpsc::UnboundedReceiver<SessionCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (StreamHandle::new(tx), rx)
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = StreamRegistry::new();
        let a = registry.next_id();
        let b = registry.next_id();
        assert_ne!(a, b);
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_unknown_id_operations_return_false() {
        let registry = StreamRegistry::new();
        let id = registry.next_id();
        assert!(!registry.close(&id));
        assert!(!registry.restart(&id));
        assert!(!registry.contains(&id));
        // Removing an absent id is a no-op, not a panic.
        registry.remove(&id);
    }

    #[test]
    fn test_register_lookup_remove() {
        let registry = StreamRegistry::new();
        let id = registry.next_id();
        let (h, _rx) = handle();

        registry.register(id.clone(), h);
        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);

        registry.remove(&id);
        assert!(!registry.contains(&id));
        registry.remove(&id);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_close_delivers_command_and_keeps_entry() {
        let registry = StreamRegistry::new();
        let id = registry.next_id();
        let (h, mut rx) = handle();
        registry.register(id.clone(), h);

        assert!(registry.close(&id));
        assert_eq!(rx.try_recv().unwrap(), SessionCommand::Close);

        // close only initiates; the session task removes the entry itself.
        assert!(registry.contains(&id));
    }

    #[test]
    fn test_restart_delivers_command() {
        let registry = StreamRegistry::new();
        let id = registry.next_id();
        let (h, mut rx) = handle();
        registry.register(id.clone(), h);

        assert!(registry.restart(&id));
        assert_eq!(rx.try_recv().unwrap(), SessionCommand::Restart);
    }

    #[test]
    fn test_reregistering_overwrites() {
        let registry = StreamRegistry::new();
        let id = registry.next_id();
        let (first, mut first_rx) = handle();
        let (second, mut second_rx) = handle();

        registry.register(id.clone(), first);
        registry.register(id.clone(), second);
        assert_eq!(registry.len(), 1);

        assert!(registry.close(&id));
        assert!(first_rx.try_recv().is_err());
        assert_eq!(second_rx.try_recv().unwrap(), SessionCommand::Close);
    }
}

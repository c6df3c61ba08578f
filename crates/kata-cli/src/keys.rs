//! Process-wide keypress router.
//!
//! Readers queue a one-shot request; a single blocking thread reads raw
//! terminal events and resolves the oldest pending request with each key.
//! Keys that arrive while nobody is waiting (say, during a long test run)
//! are buffered and handed to the next requests in arrival order.

use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A keypress the session understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Enter,
    Char(char),
    Other,
}

impl Key {
    pub fn from_event(event: KeyEvent) -> Option<Key> {
        if event.kind != KeyEventKind::Press {
            return None;
        }
        Some(match event.code {
            KeyCode::Enter => Key::Enter,
            KeyCode::Char(' ') => Key::Space,
            // Raw mode swallows SIGINT, so Ctrl-C arrives here as 'c' and quits.
            KeyCode::Char(c) => Key::Char(c.to_ascii_lowercase()),
            _ => Key::Other,
        })
    }
}

/// Source of keypresses for a session.
#[allow(async_fn_in_trait)]
pub trait KeySource {
    /// The next key, or `None` once input is closed.
    async fn next_key(&mut self) -> Option<Key>;
}

#[derive(Debug, Default)]
struct Pending {
    waiters: VecDeque<oneshot::Sender<Key>>,
    /// Keys no live request was waiting for.
    buffered: VecDeque<Key>,
    closed: bool,
}

/// FIFO of pending key requests.
#[derive(Debug, Default)]
pub struct KeyRouter {
    pending: Mutex<Pending>,
}

static ROUTER: OnceLock<KeyRouter> = OnceLock::new();

impl KeyRouter {
    /// A router with no terminal reader attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// The terminal-backed router, created and started on first use.
    pub fn global() -> &'static KeyRouter {
        let mut created = false;
        let router = ROUTER.get_or_init(|| {
            created = true;
            KeyRouter::new()
        });
        if created {
            router.start_terminal_reader();
        }
        router
    }

    /// Queue a request for the next key. Resolves at once when a key is
    /// already buffered, even after the router is closed.
    pub fn request(&self) -> oneshot::Receiver<Key> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.lock();
        if let Some(key) = pending.buffered.pop_front() {
            // The receiver is still in hand, so this cannot fail.
            let _ = tx.send(key);
        } else if !pending.closed {
            pending.waiters.push_back(tx);
        }
        rx
    }

    pub async fn next_key(&self) -> Option<Key> {
        self.request().await.ok()
    }

    /// Resolve the oldest live request with `key`, or buffer it for the
    /// next request.
    pub fn dispatch(&self, key: Key) {
        let mut pending = self.lock();
        while let Some(waiter) = pending.waiters.pop_front() {
            if waiter.send(key).is_ok() {
                return;
            }
        }
        debug!(?key, buffered = pending.buffered.len() + 1, "no pending reader, key buffered");
        pending.buffered.push_back(key);
    }

    /// Fail every pending request, and every future one once the buffered
    /// keys are used up.
    pub fn close(&self) {
        let mut pending = self.lock();
        pending.closed = true;
        pending.waiters.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn start_terminal_reader(&'static self) {
        if let Err(err) = terminal::enable_raw_mode() {
            warn!(%err, "could not enable raw mode");
        }
        let spawned = std::thread::Builder::new()
            .name("kata-keys".into())
            .spawn(move || loop {
                match event::read() {
                    Ok(Event::Key(event)) => {
                        if let Some(key) = Key::from_event(event) {
                            self.dispatch(key);
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(%err, "terminal input closed");
                        self.close();
                        return;
                    }
                }
            });
        if let Err(err) = spawned {
            warn!(%err, "could not start key reader");
            self.close();
        }
    }
}

/// Keys from the terminal, through the global router.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalKeys;

impl KeySource for TerminalKeys {
    async fn next_key(&mut self) -> Option<Key> {
        KeyRouter::global().next_key().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    #[tokio::test]
    async fn requests_resolve_in_arrival_order() {
        let router = KeyRouter::new();
        let first = router.request();
        let second = router.request();
        router.dispatch(Key::Char('a'));
        router.dispatch(Key::Char('b'));
        assert_eq!(first.await.ok(), Some(Key::Char('a')));
        assert_eq!(second.await.ok(), Some(Key::Char('b')));
    }

    #[tokio::test]
    async fn abandoned_requests_are_skipped() {
        let router = KeyRouter::new();
        drop(router.request());
        let live = router.request();
        router.dispatch(Key::Enter);
        assert_eq!(live.await.ok(), Some(Key::Enter));
    }

    #[tokio::test]
    async fn keys_without_readers_are_buffered() {
        let router = KeyRouter::new();
        router.dispatch(Key::Space);
        router.dispatch(Key::Enter);
        let first = router.request();
        let second = router.request();
        let third = router.request();
        router.dispatch(Key::Char('q'));
        assert_eq!(first.await.ok(), Some(Key::Space));
        assert_eq!(second.await.ok(), Some(Key::Enter));
        assert_eq!(third.await.ok(), Some(Key::Char('q')));
    }

    #[tokio::test]
    async fn keys_typed_before_close_are_still_delivered() {
        let router = KeyRouter::new();
        router.dispatch(Key::Enter);
        router.close();
        assert_eq!(router.next_key().await, Some(Key::Enter));
        assert_eq!(router.next_key().await, None);
    }

    #[tokio::test]
    async fn abandoned_requests_do_not_swallow_keys() {
        let router = KeyRouter::new();
        drop(router.request());
        router.dispatch(Key::Space);
        assert_eq!(router.next_key().await, Some(Key::Space));
    }

    #[tokio::test]
    async fn closed_router_yields_none() {
        let router = KeyRouter::new();
        let pending = router.request();
        router.close();
        assert_eq!(pending.await.ok(), None);
        assert_eq!(router.next_key().await, None);
    }

    #[test]
    fn key_mapping() {
        let press = |code, modifiers| Key::from_event(KeyEvent::new(code, modifiers));
        assert_eq!(press(KeyCode::Char(' '), KeyModifiers::NONE), Some(Key::Space));
        assert_eq!(press(KeyCode::Enter, KeyModifiers::NONE), Some(Key::Enter));
        assert_eq!(press(KeyCode::Char('T'), KeyModifiers::SHIFT), Some(Key::Char('t')));
        assert_eq!(
            press(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(Key::Char('c'))
        );
        assert_eq!(press(KeyCode::Esc, KeyModifiers::NONE), Some(Key::Other));
    }
}

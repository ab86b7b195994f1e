//! Pooled scratch arenas, one per request cycle.
//!
//! Every connection drives its request cycle through a [`PooledArena`]:
//! the framing reader fills the arena's frame buffer, the dispatcher hands
//! the arena to the handler for transient allocations, and dropping the
//! guard returns the storage (reset, capacity retained) to the shared
//! pool. Arenas are never shared between concurrent requests; the pool
//! grows on demand and keeps its high-water mark of live arenas.

use std::sync::Arc;
use std::sync::Mutex;

/// Scratch storage scoped to a single request cycle.
#[derive(Debug, Default)]
pub struct Arena {
    frame: Vec<u8>,
    scratch: String,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw bytes of the frame currently being processed.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// Buffer the framing reader fills in place.
    pub fn frame_mut(&mut self) -> &mut Vec<u8> {
        &mut self.frame
    }

    /// General-purpose string scratch for handlers.
    pub fn scratch_mut(&mut self) -> &mut String {
        &mut self.scratch
    }

    /// Clears contents, keeps capacity.
    pub fn reset(&mut self) {
        self.frame.clear();
        self.scratch.clear();
    }

    /// Bytes currently reserved by this arena's buffers.
    pub fn footprint(&self) -> usize {
        self.frame.capacity() + self.scratch.capacity()
    }
}

#[derive(Debug, Default)]
struct PoolState {
    idle: Vec<Arena>,
    /// Total arenas ever created; the pool never shrinks below this.
    created: usize,
}

/// Shared pool of reusable [`Arena`]s, guarded by a mutex.
#[derive(Debug, Default)]
pub struct ArenaPool {
    state: Mutex<PoolState>,
}

impl ArenaPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hands out an idle arena, creating one if none is available. The
    /// returned guard releases the arena back to the pool on drop, on
    /// every exit path.
    pub fn acquire(self: &Arc<Self>) -> PooledArena {
        let arena = {
            let mut state = self.lock_state();
            match state.idle.pop() {
                Some(arena) => arena,
                None => {
                    state.created += 1;
                    Arena::new()
                }
            }
        };
        PooledArena {
            arena: Some(arena),
            pool: Arc::clone(self),
        }
    }

    /// Arenas currently idle in the pool.
    pub fn available(&self) -> usize {
        self.lock_state().idle.len()
    }

    /// Largest number of arenas this pool has ever handed out.
    pub fn high_water(&self) -> usize {
        self.lock_state().created
    }

    fn release(&self, mut arena: Arena) {
        arena.reset();
        self.lock_state().idle.push(arena);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        // A poisoned pool only means a handler panicked mid-request; the
        // storage itself is still reusable.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// RAII guard over an acquired [`Arena`].
#[derive(Debug)]
pub struct PooledArena {
    arena: Option<Arena>,
    pool: Arc<ArenaPool>,
}

impl std::ops::Deref for PooledArena {
    type Target = Arena;

    // `arena` is only None after drop.
    #[expect(clippy::expect_used)]
    fn deref(&self) -> &Arena {
        self.arena.as_ref().expect("arena taken")
    }
}

impl std::ops::DerefMut for PooledArena {
    #[expect(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut Arena {
        self.arena.as_mut().expect("arena taken")
    }
}

impl Drop for PooledArena {
    fn drop(&mut self) {
        if let Some(arena) = self.arena.take() {
            self.pool.release(arena);
        }
    }
}

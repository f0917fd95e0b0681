use {bytes::Bytes, std::sync::RwLock};

/// The most recently decoded frame.
///
/// Readers take a shared lock and clone a reference-counted handle, the crawler
/// swaps in a complete new frame under the exclusive lock. A reader therefore
/// sees either the previous frame or the new one, never a mix.
#[derive(Debug, Default)]
pub struct FrameCache {
    frame: RwLock<Bytes>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current frame, empty if none was cached yet.
    pub fn get(&self) -> Bytes {
        self.frame.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the current frame.
    pub fn set(&self, frame: impl Into<Bytes>) {
        let frame = frame.into();
        let previous = {
            let mut guard = self.frame.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *guard, frame)
        };
        // release the old frame outside the lock
        drop(previous);
    }

    pub fn len(&self) -> usize {
        self.frame.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

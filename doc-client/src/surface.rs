//! The editable surface a buffer client mutates and observes.
//!
//! The concrete surface (an editor widget, a text view) lives with the
//! embedder; the client only needs to issue range-replaces and read the
//! current length. Local edits travel the other way: the embedder wires
//! the surface's change notifications to
//! [`BufferClient::record_local_edit`](crate::BufferClient::record_local_edit),
//! which drops them while the client itself is mutating the surface
//! (echo suppression).

use doc_core::ContentBuffer;
use doc_types::Operation;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// A surface refused an edit.
#[derive(Debug, Clone, Error)]
#[error("surface edit failed: {0}")]
pub struct SurfaceError(pub String);

/// An editable rendering surface.
///
/// Offsets are character offsets with the same semantics as
/// [`Operation`]: `apply_replace` replaces the half-open range
/// `[from, to)` with `insert`.
pub trait Surface: Send {
    /// Apply a range-replace to the surface.
    fn apply_replace(&mut self, from: usize, to: usize, insert: &str) -> Result<(), SurfaceError>;

    /// Current content length in characters.
    fn len_chars(&self) -> usize;
}

/// In-memory surface for testing.
///
/// Records every applied edit and can echo edits back through a
/// callback, the way a real editor fires its change listener
/// synchronously when mutated. Clones share state.
#[derive(Clone, Default)]
pub struct MockSurface {
    inner: Arc<Mutex<MockSurfaceInner>>,
}

#[derive(Default)]
struct MockSurfaceInner {
    content: ContentBuffer,
    applied: Vec<Operation>,
    on_apply: Option<Box<dyn Fn(Operation) + Send>>,
    fail_next_apply: Option<String>,
}

impl MockSurface {
    /// Create an empty mock surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock surface with initial content.
    pub fn with_text(text: impl Into<String>) -> Self {
        let surface = Self::new();
        surface.inner.lock().unwrap().content = ContentBuffer::from_text(text);
        surface
    }

    /// The surface's current text.
    pub fn text(&self) -> String {
        self.inner.lock().unwrap().content.as_str().to_string()
    }

    /// Every edit applied to the surface, in order.
    pub fn applied(&self) -> Vec<Operation> {
        self.inner.lock().unwrap().applied.clone()
    }

    /// Register a callback fired synchronously on every applied edit,
    /// simulating an editor's change listener.
    pub fn on_apply(&self, callback: impl Fn(Operation) + Send + 'static) {
        self.inner.lock().unwrap().on_apply = Some(Box::new(callback));
    }

    /// Cause the next apply_replace() to fail with the given error.
    pub fn fail_next_apply(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_apply = Some(error.to_string());
    }
}

impl Surface for MockSurface {
    fn apply_replace(&mut self, from: usize, to: usize, insert: &str) -> Result<(), SurfaceError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_apply.take() {
            return Err(SurfaceError(error));
        }

        let op = Operation::new(from, to, insert);
        inner
            .content
            .apply(std::slice::from_ref(&op))
            .map_err(|e| SurfaceError(e.to_string()))?;
        inner.applied.push(op.clone());

        if let Some(callback) = inner.on_apply.as_ref() {
            callback(op);
        }
        Ok(())
    }

    fn len_chars(&self) -> usize {
        self.inner.lock().unwrap().content.len_chars()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_surface_applies_edits() {
        let mut surface = MockSurface::with_text("abc");
        surface.apply_replace(1, 2, "X").unwrap();

        assert_eq!(surface.text(), "aXc");
        assert_eq!(surface.len_chars(), 3);
        assert_eq!(surface.applied(), vec![Operation::new(1, 2, "X")]);
    }

    #[test]
    fn mock_surface_echoes_edits() {
        let mut surface = MockSurface::new();
        let echoed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&echoed);
        surface.on_apply(move |op| sink.lock().unwrap().push(op));

        surface.apply_replace(0, 0, "hi").unwrap();

        assert_eq!(
            echoed.lock().unwrap().clone(),
            vec![Operation::insert_at(0, "hi")]
        );
    }

    #[test]
    fn mock_surface_rejects_out_of_bounds() {
        let mut surface = MockSurface::with_text("ab");
        assert!(surface.apply_replace(0, 5, "X").is_err());
        assert_eq!(surface.text(), "ab");
    }

    #[test]
    fn forced_failure_is_one_shot() {
        let mut surface = MockSurface::with_text("ab");
        surface.fail_next_apply("detached");

        assert!(surface.apply_replace(0, 1, "X").is_err());
        surface.apply_replace(0, 1, "X").unwrap();
        assert_eq!(surface.text(), "Xb");
    }

    #[test]
    fn clones_share_state() {
        let mut surface = MockSurface::new();
        let observer = surface.clone();

        surface.apply_replace(0, 0, "shared").unwrap();
        assert_eq!(observer.text(), "shared");
    }
}

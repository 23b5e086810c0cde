//! Per-instance FIFO of fire requests.
//!
//! At most one request is in flight. The request that finds the queue idle
//! starts a drain task, which processes requests until the queue is empty;
//! callers only wait for their reply.

use crate::error::StateMachineError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::oneshot;

pub(crate) type FireReply = oneshot::Sender<Result<(), StateMachineError>>;

pub(crate) struct FireRequest<T, A> {
    pub(crate) trigger: T,
    pub(crate) args: A,
    /// `None` for requests issued from inside a running action.
    pub(crate) reply: Option<FireReply>,
}

struct QueueState<T, A> {
    firing: bool,
    pending: VecDeque<FireRequest<T, A>>,
}

pub(crate) struct FireQueue<T, A> {
    state: Mutex<QueueState<T, A>>,
}

impl<T, A> FireQueue<T, A> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                firing: false,
                pending: VecDeque::new(),
            }),
        }
    }

    /// Enqueue a request. Returns true when the caller must start a drain.
    pub(crate) fn admit(&self, request: FireRequest<T, A>) -> bool {
        let mut state = self.state.lock();
        state.pending.push_back(request);
        if state.firing {
            false
        } else {
            state.firing = true;
            true
        }
    }

    /// Next request for the driver. When the queue is empty the machine is
    /// marked idle in the same critical section, so no request is stranded.
    pub(crate) fn next(&self) -> Option<FireRequest<T, A>> {
        let mut state = self.state.lock();
        let request = state.pending.pop_front();
        if request.is_none() {
            state.firing = false;
        }
        request
    }

    pub(crate) fn is_firing(&self) -> bool {
        self.state.lock().firing
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Drop every queued request and mark the machine idle. Waiting callers
    /// observe their reply channel closing.
    fn abandon(&self) -> usize {
        let mut state = self.state.lock();
        state.firing = false;
        let dropped = state.pending.len();
        state.pending.clear();
        dropped
    }
}

/// Held by the drain task. If the task dies mid-drain (the runtime shutting
/// down) the queue is abandoned instead of being left marked as firing
/// forever.
pub(crate) struct DrainGuard<'a, T, A> {
    queue: &'a FireQueue<T, A>,
    finished: bool,
}

impl<'a, T, A> DrainGuard<'a, T, A> {
    pub(crate) fn new(queue: &'a FireQueue<T, A>) -> Self {
        Self {
            queue,
            finished: false,
        }
    }

    /// The drain loop observed an empty queue.
    pub(crate) fn finish(mut self) {
        self.finished = true;
    }
}

impl<T, A> Drop for DrainGuard<'_, T, A> {
    fn drop(&mut self) {
        if !self.finished {
            let dropped = self.queue.abandon();
            tracing::warn!(dropped, "fire queue abandoned by its drain task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(trigger: &'static str) -> FireRequest<&'static str, ()> {
        FireRequest {
            trigger,
            args: (),
            reply: None,
        }
    }

    #[test]
    fn first_admission_drives() {
        let queue = FireQueue::new();

        assert!(queue.admit(request("a")));
        assert!(!queue.admit(request("b")));
        assert!(queue.is_firing());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn requests_come_out_in_order() {
        let queue = FireQueue::new();
        queue.admit(request("a"));
        queue.admit(request("b"));
        queue.admit(request("c"));

        let order: Vec<_> = std::iter::from_fn(|| queue.next())
            .map(|request| request.trigger)
            .collect();

        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(!queue.is_firing());
    }

    #[test]
    fn empty_queue_hands_over_driving() {
        let queue = FireQueue::new();
        queue.admit(request("a"));
        assert!(queue.next().is_some());
        assert!(queue.next().is_none());

        assert!(queue.admit(request("b")));
    }

    #[tokio::test]
    async fn dropped_guard_releases_waiters() {
        let queue = FireQueue::new();
        let (reply, receiver) = oneshot::channel();
        queue.admit(request("a"));
        queue.admit(FireRequest {
            trigger: "b",
            args: (),
            reply: Some(reply),
        });

        {
            let _guard = DrainGuard::new(&queue);
            queue.next();
        }

        assert!(receiver.await.is_err());
        assert!(!queue.is_firing());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn finished_guard_leaves_queue_alone() {
        let queue = FireQueue::new();
        queue.admit(request("a"));
        let guard = DrainGuard::new(&queue);
        assert!(queue.next().is_some());
        assert!(queue.next().is_none());
        guard.finish();

        assert!(queue.admit(request("b")));
    }
}

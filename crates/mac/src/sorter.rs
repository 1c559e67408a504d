//! Per-session frame queues and the scheduler claim flag

use std::collections::{HashMap, VecDeque};

use serde::ser::{Serialize, SerializeMap, Serializer};
use subnet_lte_core::types::Timestamp;
use subnet_lte_core::{MacFrame, SessionId, SessionQueue};

/// Session queues in the order their sessions were first sorted.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SortedSessions {
    order: Vec<SessionId>,
    queues: HashMap<SessionId, SessionQueue>,
}

impl SortedSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps the frame and files it at the head of its session's queue.
    pub fn file(&mut self, mut frame: MacFrame, now: Timestamp) {
        frame.scheduler_enqueued_at = Some(now);
        let session_id = frame.session_id.clone();
        match self.queues.get_mut(&session_id) {
            Some(queue) => queue.packets.push_front(frame),
            None => {
                let mut queue = SessionQueue::default();
                queue.packets.push_front(frame);
                self.order.push(session_id.clone());
                self.queues.insert(session_id, queue);
            }
        }
    }

    /// Marks the first free session busy and detaches its frames, newest first.
    pub fn claim(&mut self) -> Option<(SessionId, VecDeque<MacFrame>)> {
        let session_id = self
            .order
            .iter()
            .find(|id| self.queues.get(*id).is_some_and(|q| !q.busy))?
            .clone();
        let queue = self.queues.get_mut(&session_id)?;
        queue.busy = true;
        let frames = std::mem::take(&mut queue.packets);
        Some((session_id, frames))
    }

    pub fn release(&mut self, session_id: &SessionId) {
        if let Some(queue) = self.queues.get_mut(session_id) {
            queue.busy = false;
        }
    }

    /// Hands detached frames back to their session behind anything sorted since.
    pub fn restore(&mut self, session_id: &SessionId, frames: VecDeque<MacFrame>) {
        if let Some(queue) = self.queues.get_mut(session_id) {
            queue.packets.extend(frames);
        }
    }

    pub fn get(&self, session_id: &SessionId) -> Option<&SessionQueue> {
        self.queues.get(session_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn waiting_frames(&self) -> usize {
        self.queues.values().map(|q| q.packets.len()).sum()
    }

    pub fn waiting_bits(&self) -> usize {
        self.queues.values().map(SessionQueue::total_bits).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, &SessionQueue)> {
        self.order
            .iter()
            .filter_map(move |id| self.queues.get(id).map(|q| (id, q)))
    }
}

impl Serialize for SortedSessions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for (id, queue) in self.iter() {
            map.serialize_entry(id, queue)?;
        }
        map.end()
    }
}

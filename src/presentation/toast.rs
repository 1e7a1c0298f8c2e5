use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

pub const TOAST_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToastVariant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Toast {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub variant: ToastVariant,
    pub created_at: DateTime<Utc>,
}

/// Transient banners, newest last. Oldest entries fall off past the limit.
pub struct Toasts {
    queue: Mutex<VecDeque<Toast>>,
    limit: usize,
}

impl Toasts {
    pub fn new(limit: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(limit)),
            limit: limit.max(1),
        }
    }

    pub fn push(
        &self,
        title: impl Into<String>,
        description: Option<String>,
        variant: ToastVariant,
    ) -> Toast {
        let toast = Toast {
            id: Uuid::new_v4(),
            title: title.into(),
            description,
            variant,
            created_at: Utc::now(),
        };

        let mut queue = self.lock();
        queue.push_back(toast.clone());
        while queue.len() > self.limit {
            queue.pop_front();
        }
        toast
    }

    pub fn info(&self, title: impl Into<String>, description: impl Into<String>) -> Toast {
        self.push(title, Some(description.into()), ToastVariant::Default)
    }

    pub fn failure(&self, err: &AppError) -> Toast {
        self.push(err.title(), Some(err.to_string()), ToastVariant::Destructive)
    }

    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut queue = self.lock();
        let before = queue.len();
        queue.retain(|toast| toast.id != id);
        queue.len() != before
    }

    pub fn list(&self) -> Vec<Toast> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Toast>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Toasts {
    fn default() -> Self {
        Self::new(TOAST_LIMIT)
    }
}

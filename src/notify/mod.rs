//! Process-wide transient notifications.
//!
//! A [`ToastQueue`] is created once at start-up and cloned into whatever
//! needs to report to the user; clones share the same queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use colored::Colorize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn render(&self) -> String {
        match self.level {
            ToastLevel::Info => format!("{} {}", "[INF]".cyan(), self.message),
            ToastLevel::Warn => format!("{} {}", "[WRN]".yellow(), self.message),
            ToastLevel::Error => format!("{} {}", "[ERR]".red(), self.message),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ToastQueue {
    inner: Arc<Mutex<VecDeque<Toast>>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, level: ToastLevel, message: impl Into<String>) {
        let toast = Toast {
            level,
            message: message.into(),
        };
        if let Ok(mut queue) = self.inner.lock() {
            queue.push_back(toast);
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(ToastLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(ToastLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(ToastLevel::Error, message);
    }

    pub fn drain(&self) -> Vec<Toast> {
        match self.inner.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

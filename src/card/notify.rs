//! Transient user notices (the page's toasts).

use std::sync::Mutex;
use tracing::{error, info};

pub const EMPTY_INPUT: &str = "请输入内容";
pub const GENERATED: &str = "SVG 生成成功";
pub const NO_SVG: &str = "无法生成 SVG";
pub const GENERATION_FAILED: &str = "生成过程中出现错误";
pub const SVG_ELEMENT_MISSING: &str = "SVG 元素未找到";
pub const IMAGE_CREATE_FAILED: &str = "无法创建图片";
pub const IMAGE_SAVED: &str = "图片已下载";
pub const IMAGE_COPIED: &str = "图片已复制到剪贴板";
pub const IMAGE_COPY_FAILED: &str = "复制图片失败";
pub const SVG_COPIED: &str = "SVG 已复制到剪贴板";
pub const SVG_COPY_FAILED: &str = "复制 SVG 失败";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, level: Level, message: &str);

    fn success(&self, message: &str) {
        self.notify(Level::Success, message);
    }

    fn error(&self, message: &str) {
        self.notify(Level::Error, message);
    }
}

/// Sends notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: Level, message: &str) {
        match level {
            Level::Success => info!(notice = message),
            Level::Error => error!(notice = message),
        }
    }
}

/// Keeps every notice, newest last.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(Level, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<(Level, String)> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<(Level, String)> {
        self.notices().pop()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: Level, message: &str) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push((level, message.to_string()));
        }
    }
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn notify(&self, level: Level, message: &str) {
        (**self).notify(level, message)
    }
}

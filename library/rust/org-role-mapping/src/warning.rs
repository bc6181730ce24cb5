//! スキップ警告: 解決できなかった候補を運用者向けに通知する。

use std::sync::{Mutex, PoisonError};

use crate::mapping::Candidate;

/// 候補をスキップした理由。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// レジストリに組織が存在しない。
    UnknownOrganization,
    /// 候補が組織 ID も組織名も持たない。
    IncorrectMapping,
}

impl SkipReason {
    /// ログメッセージ。
    pub fn message(&self) -> &'static str {
        match self {
            SkipReason::UnknownOrganization => "Unknown organization. Skipping.",
            SkipReason::IncorrectMapping => "Incorrect mapping found. Skipping.",
        }
    }
}

/// スキップされた候補 1 件分の警告。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipWarning {
    pub reason: SkipReason,
    /// クレームパスまたはレガシー方言のクエリ。
    pub config_option: String,
    /// 候補を生んだルールの元テキスト。
    pub rule_text: String,
    pub candidate: Candidate,
}

/// WarningSink はスキップ警告の通知先を抽象化するトレイト。
///
/// 解決呼び出し 1 回ごとに、スキップした候補 1 件につき 1 度だけ呼ばれる。
pub trait WarningSink: Send + Sync {
    fn warn(&self, warning: &SkipWarning);
}

/// TracingWarningSink は `tracing` の WARN イベントとして警告を出力するデフォルト実装。
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingWarningSink;

impl WarningSink for TracingWarningSink {
    fn warn(&self, warning: &SkipWarning) {
        tracing::warn!(
            config_option = %warning.config_option,
            mapping = %warning.candidate,
            "{}",
            warning.reason.message()
        );
    }
}

/// RecordingWarningSink は受け取った警告をメモリに保持する。
#[derive(Debug, Default)]
pub struct RecordingWarningSink {
    warnings: Mutex<Vec<SkipWarning>>,
}

impl RecordingWarningSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// これまでに受け取った警告を受信順に返す。
    pub fn warnings(&self) -> Vec<SkipWarning> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl WarningSink for RecordingWarningSink {
    fn warn(&self, warning: &SkipWarning) {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(warning.clone());
    }
}

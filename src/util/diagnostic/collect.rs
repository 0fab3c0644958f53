//! 诊断收集
//!
//! `DiagnosticList` 是单线程的有序列表，每个检查任务独占一份；
//! `DiagnosticSink` 是并发检查阶段的共享收集器，
//! 条目带 (任务序号, 条目序号) 标签，合并时按注册顺序排序，
//! 因此不论并发度如何输出都是确定的。

use parking_lot::Mutex;

use super::error::{Diagnostic, Severity};

/// 有序诊断列表
#[derive(Debug, Clone, Default)]
pub struct DiagnosticList {
    items: Vec<Diagnostic>,
}

impl DiagnosticList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        diagnostic: Diagnostic,
    ) {
        self.items.push(diagnostic);
    }

    pub fn extend(
        &mut self,
        other: DiagnosticList,
    ) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn has_failures(&self) -> bool {
        self.items.iter().any(Diagnostic::is_failure)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// 去掉警告
    pub fn retain_failures(&mut self) {
        self.items.retain(|d| d.severity == Severity::Failure);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl IntoIterator for DiagnosticList {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// 并发安全的诊断收集器
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    entries: Mutex<Vec<(usize, usize, Diagnostic)>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加某个任务产生的全部诊断
    pub fn append(
        &self,
        task: usize,
        diagnostics: DiagnosticList,
    ) {
        if diagnostics.is_empty() {
            return;
        }
        let mut entries = self.entries.lock();
        for (seq, diagnostic) in diagnostics.into_iter().enumerate() {
            entries.push((task, seq, diagnostic));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// 按 (任务序号, 条目序号) 排序后取出
    pub fn drain_ordered(&self) -> DiagnosticList {
        let mut entries = std::mem::take(&mut *self.entries.lock());
        entries.sort_by_key(|(task, seq, _)| (*task, *seq));
        let mut list = DiagnosticList::new();
        for (_, _, diagnostic) in entries {
            list.push(diagnostic);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::span::{Location, Span};
    use std::sync::Arc;

    fn diag(msg: &str) -> Diagnostic {
        Diagnostic::failure("E0000", msg.to_string(), Location::new(Arc::from("t"), Span::dummy()))
    }

    #[test]
    fn test_sink_orders_by_task() {
        let sink = DiagnosticSink::new();
        let mut late = DiagnosticList::new();
        late.push(diag("b1"));
        late.push(diag("b2"));
        let mut early = DiagnosticList::new();
        early.push(diag("a1"));
        sink.append(2, late);
        sink.append(1, early);

        let ordered: Vec<String> = sink
            .drain_ordered()
            .into_iter()
            .map(|d| d.message)
            .collect();
        assert_eq!(ordered, vec!["a1", "b1", "b2"]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_retain_failures() {
        let mut list = DiagnosticList::new();
        list.push(diag("x"));
        list.push(Diagnostic::warning(
            "W0001",
            "w".to_string(),
            Location::new(Arc::from("t"), Span::dummy()),
        ));
        list.retain_failures();
        assert_eq!(list.len(), 1);
        assert!(list.has_failures());
    }
}

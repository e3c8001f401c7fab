//! Bulk task-assignment workflow.
//!
//! This module owns the review loop between "ask the AI to assign" and the
//! final server mutation: requesting suggestions for a selection of work
//! items, holding the pending review list, and issuing single or bulk
//! assignment calls. The surrounding UI (TUI or CLI) only decides *when* to
//! trigger a transition; every rule about what a transition may do lives
//! here.
//!
//! State transitions:
//!
//! ```text
//! Idle -> RequestingSuggestions -> ReviewingSuggestions
//!                                     |-> ConfirmingOne -> ReviewingSuggestions | Idle
//!                                     |-> ConfirmingAll -> Idle | ReviewingSuggestions
//!                                     '-> (close) -> Idle
//! ```

use tracing::error;

use crate::client::TaskService;
use crate::task::{AssignmentPair, SuggestionEntry};

/// Where the workflow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    RequestingSuggestions,
    ReviewingSuggestions,
    ConfirmingOne,
    ConfirmingAll,
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Warning,
    Error,
}

/// A short user-facing notification produced by a workflow transition.
///
/// The UI drains these into its status bar; detail goes to the tracing log.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Orchestrates the suggestion / review / assignment loop.
pub struct AssignmentWorkflow {
    state: WorkflowState,
    review_list: Vec<SuggestionEntry>,
    notices: Vec<Notice>,
}

impl AssignmentWorkflow {
    pub fn new() -> Self {
        AssignmentWorkflow {
            state: WorkflowState::Idle,
            review_list: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Entries still awaiting confirmation or dismissal.
    pub fn review_list(&self) -> &[SuggestionEntry] {
        &self.review_list
    }

    /// Whether the review surface should be shown.
    pub fn is_reviewing(&self) -> bool {
        self.state == WorkflowState::ReviewingSuggestions
    }

    /// Take all pending notices, oldest first.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.notices.push(Notice {
            kind,
            message: message.into(),
        });
    }

    /// "Ask AI to assign": request suggestions for the selected work items.
    ///
    /// Rejected with a warning and zero network calls when the selection is
    /// empty. On success the review list is populated and the review surface
    /// opens; an empty suggestion set is reported as a warning without
    /// opening the surface. On failure the workflow returns to idle with the
    /// selection untouched so the user can retry.
    ///
    /// Returns true when the review surface was opened.
    pub fn request_suggestions(
        &mut self,
        service: &dyn TaskService,
        selected: &[u64],
    ) -> bool {
        if self.state != WorkflowState::Idle {
            return false;
        }
        if selected.is_empty() {
            self.notify(
                NoticeKind::Warning,
                "Select at least one task to assign.",
            );
            return false;
        }

        self.state = WorkflowState::RequestingSuggestions;
        match service.suggest_assignments(selected) {
            Ok(entries) if entries.is_empty() => {
                self.state = WorkflowState::Idle;
                self.notify(
                    NoticeKind::Warning,
                    "No suggestions returned for the selected tasks.",
                );
                false
            }
            Ok(entries) => {
                self.review_list = entries;
                self.state = WorkflowState::ReviewingSuggestions;
                self.notify(
                    NoticeKind::Success,
                    format!("Received {} assignment suggestion(s)", self.review_list.len()),
                );
                true
            }
            Err(e) => {
                error!("suggestion request failed: {e}");
                self.state = WorkflowState::Idle;
                self.notify(NoticeKind::Error, "Error generating task assignments");
                false
            }
        }
    }

    /// Confirm a single suggestion: assign the task on the server, then
    /// prune the entry locally.
    ///
    /// Entries without an email cannot be confirmed; the call is a no-op for
    /// them. On failure the entry stays in the list for retry.
    pub fn confirm(&mut self, service: &dyn TaskService, task_id: &str) {
        if self.state != WorkflowState::ReviewingSuggestions {
            return;
        }
        let Some(entry) = self.review_list.iter().find(|e| e.task_id == task_id) else {
            return;
        };
        if !entry.assignable() {
            return;
        }
        let email = entry.email.clone().unwrap_or_default();

        self.state = WorkflowState::ConfirmingOne;
        match service.assign_task(task_id, &email) {
            Ok(()) => {
                self.review_list.retain(|e| e.task_id != task_id);
                self.notify(
                    NoticeKind::Success,
                    format!("Task assigned to {email}"),
                );
                self.state = if self.review_list.is_empty() {
                    WorkflowState::Idle
                } else {
                    WorkflowState::ReviewingSuggestions
                };
            }
            Err(e) => {
                error!("assignment of task {task_id} failed: {e}");
                self.notify(NoticeKind::Error, format!("Error assigning task: {e}"));
                self.state = WorkflowState::ReviewingSuggestions;
            }
        }
    }

    /// Dismiss a suggestion locally. Never touches the server.
    pub fn dismiss(&mut self, task_id: &str) {
        if self.state != WorkflowState::ReviewingSuggestions {
            return;
        }
        self.review_list.retain(|e| e.task_id != task_id);
        if self.review_list.is_empty() {
            self.state = WorkflowState::Idle;
        }
    }

    /// "Assign all": one bulk call covering every assignable entry.
    ///
    /// A 2xx clears the entire review list; the bulk call is treated as
    /// all-or-nothing, so any failure leaves the list fully intact.
    pub fn assign_all(&mut self, service: &dyn TaskService) {
        if self.state != WorkflowState::ReviewingSuggestions || self.review_list.is_empty() {
            return;
        }
        let pairs: Vec<AssignmentPair> = self
            .review_list
            .iter()
            .filter(|e| e.assignable())
            .map(|e| AssignmentPair {
                task_id: e.task_id.clone(),
                email: e.email.clone().unwrap_or_default(),
            })
            .collect();
        if pairs.is_empty() {
            self.notify(
                NoticeKind::Warning,
                "No suggestion carries an assignee email.",
            );
            return;
        }

        self.state = WorkflowState::ConfirmingAll;
        match service.bulk_assign(&pairs) {
            Ok(()) => {
                self.review_list.clear();
                self.notify(NoticeKind::Success, "All tasks successfully assigned");
                self.state = WorkflowState::Idle;
            }
            Err(e) => {
                error!("bulk assignment failed: {e}");
                self.notify(NoticeKind::Error, "Error assigning all tasks");
                self.state = WorkflowState::ReviewingSuggestions;
            }
        }
    }

    /// Close the review surface, discarding undecided entries locally.
    pub fn close(&mut self) {
        self.review_list.clear();
        self.state = WorkflowState::Idle;
    }
}

impl Default for AssignmentWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ServiceError;
    use crate::task::{Risk, Task};
    use std::cell::RefCell;

    #[derive(Debug, PartialEq)]
    enum Call {
        Suggest(Vec<u64>),
        Assign(String, String),
        Bulk(Vec<AssignmentPair>),
    }

    /// In-memory service that records every call and answers from canned
    /// data, failing where instructed.
    #[derive(Default)]
    struct FakeService {
        calls: RefCell<Vec<Call>>,
        suggestions: Vec<SuggestionEntry>,
        fail_suggest: bool,
        fail_assign: bool,
        fail_bulk: bool,
    }

    impl FakeService {
        fn failure() -> ServiceError {
            ServiceError::Api {
                status: 500,
                message: "boom".into(),
            }
        }
    }

    impl TaskService for FakeService {
        fn fetch_unassigned_tasks(&self) -> Result<Vec<Task>, ServiceError> {
            Ok(Vec::new())
        }

        fn fetch_risk_items(&self) -> Result<Vec<Risk>, ServiceError> {
            Ok(Vec::new())
        }

        fn suggest_assignments(
            &self,
            task_ids: &[u64],
        ) -> Result<Vec<SuggestionEntry>, ServiceError> {
            self.calls.borrow_mut().push(Call::Suggest(task_ids.to_vec()));
            if self.fail_suggest {
                return Err(Self::failure());
            }
            Ok(self.suggestions.clone())
        }

        fn assign_task(&self, task_id: &str, email: &str) -> Result<(), ServiceError> {
            self.calls
                .borrow_mut()
                .push(Call::Assign(task_id.into(), email.into()));
            if self.fail_assign {
                return Err(Self::failure());
            }
            Ok(())
        }

        fn bulk_assign(&self, pairs: &[AssignmentPair]) -> Result<(), ServiceError> {
            self.calls.borrow_mut().push(Call::Bulk(pairs.to_vec()));
            if self.fail_bulk {
                return Err(Self::failure());
            }
            Ok(())
        }
    }

    fn entry(task_id: &str, email: &str) -> SuggestionEntry {
        SuggestionEntry {
            task_id: task_id.into(),
            email: Some(email.into()),
            reason: Some("best fit".into()),
        }
    }

    fn reviewing(entries: Vec<SuggestionEntry>) -> (AssignmentWorkflow, FakeService) {
        let service = FakeService {
            suggestions: entries,
            ..FakeService::default()
        };
        let mut wf = AssignmentWorkflow::new();
        assert!(wf.request_suggestions(&service, &[1, 2, 3]));
        service.calls.borrow_mut().clear();
        let _ = wf.drain_notices();
        (wf, service)
    }

    #[test]
    fn request_sends_selected_ids_in_order() {
        let service = FakeService {
            suggestions: vec![entry("5", "a@x.com")],
            ..FakeService::default()
        };
        let mut wf = AssignmentWorkflow::new();
        assert!(wf.request_suggestions(&service, &[5, 2, 9]));

        assert_eq!(*service.calls.borrow(), vec![Call::Suggest(vec![5, 2, 9])]);
        assert_eq!(wf.state(), WorkflowState::ReviewingSuggestions);
        assert_eq!(wf.review_list().len(), 1);
    }

    #[test]
    fn empty_selection_is_rejected_without_network() {
        let service = FakeService::default();
        let mut wf = AssignmentWorkflow::new();
        assert!(!wf.request_suggestions(&service, &[]));

        assert!(service.calls.borrow().is_empty());
        assert_eq!(wf.state(), WorkflowState::Idle);
        let notices = wf.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Warning);
    }

    #[test]
    fn empty_suggestion_response_stays_idle() {
        let service = FakeService::default();
        let mut wf = AssignmentWorkflow::new();
        assert!(!wf.request_suggestions(&service, &[1, 2]));

        assert_eq!(*service.calls.borrow(), vec![Call::Suggest(vec![1, 2])]);
        assert_eq!(wf.state(), WorkflowState::Idle);
        assert!(wf.review_list().is_empty());
        assert_eq!(wf.drain_notices()[0].kind, NoticeKind::Warning);
    }

    #[test]
    fn failed_request_returns_to_idle() {
        let service = FakeService {
            fail_suggest: true,
            ..FakeService::default()
        };
        let mut wf = AssignmentWorkflow::new();
        assert!(!wf.request_suggestions(&service, &[1]));

        assert_eq!(wf.state(), WorkflowState::Idle);
        assert!(wf.review_list().is_empty());
        assert_eq!(wf.drain_notices()[0].kind, NoticeKind::Error);
    }

    #[test]
    fn confirm_removes_exactly_that_entry() {
        let (mut wf, service) =
            reviewing(vec![entry("1", "a@x.com"), entry("2", "b@x.com")]);

        wf.confirm(&service, "1");

        assert_eq!(
            *service.calls.borrow(),
            vec![Call::Assign("1".into(), "a@x.com".into())]
        );
        assert_eq!(wf.review_list(), vec![entry("2", "b@x.com")]);
        assert_eq!(wf.state(), WorkflowState::ReviewingSuggestions);
    }

    #[test]
    fn confirm_last_entry_returns_to_idle() {
        let (mut wf, service) = reviewing(vec![entry("1", "a@x.com")]);

        wf.confirm(&service, "1");

        assert!(wf.review_list().is_empty());
        assert_eq!(wf.state(), WorkflowState::Idle);
    }

    #[test]
    fn failed_confirm_leaves_list_unchanged() {
        let (mut wf, mut service) =
            reviewing(vec![entry("1", "a@x.com"), entry("2", "b@x.com")]);
        service.fail_assign = true;

        wf.confirm(&service, "1");

        assert_eq!(wf.review_list().len(), 2);
        assert_eq!(wf.state(), WorkflowState::ReviewingSuggestions);
        assert_eq!(wf.drain_notices()[0].kind, NoticeKind::Error);
    }

    #[test]
    fn confirm_without_email_does_nothing() {
        let unassignable = SuggestionEntry {
            task_id: "1".into(),
            email: None,
            reason: None,
        };
        let (mut wf, service) = reviewing(vec![unassignable.clone()]);

        wf.confirm(&service, "1");

        assert!(service.calls.borrow().is_empty());
        assert_eq!(wf.review_list(), vec![unassignable]);
    }

    #[test]
    fn dismiss_is_local_only() {
        let (mut wf, service) =
            reviewing(vec![entry("1", "a@x.com"), entry("2", "b@x.com")]);

        wf.dismiss("1");

        assert!(service.calls.borrow().is_empty());
        assert_eq!(wf.review_list(), vec![entry("2", "b@x.com")]);
    }

    #[test]
    fn assign_all_issues_one_bulk_call_with_all_pairs() {
        let (mut wf, service) =
            reviewing(vec![entry("1", "a@x.com"), entry("2", "b@x.com")]);

        wf.assign_all(&service);

        assert_eq!(
            *service.calls.borrow(),
            vec![Call::Bulk(vec![
                AssignmentPair {
                    task_id: "1".into(),
                    email: "a@x.com".into()
                },
                AssignmentPair {
                    task_id: "2".into(),
                    email: "b@x.com".into()
                },
            ])]
        );
        assert!(wf.review_list().is_empty());
        assert_eq!(wf.state(), WorkflowState::Idle);
    }

    #[test]
    fn failed_bulk_leaves_list_intact_and_records_error() {
        let (mut wf, mut service) =
            reviewing(vec![entry("1", "a@x.com"), entry("2", "b@x.com")]);
        service.fail_bulk = true;

        wf.assign_all(&service);

        assert_eq!(wf.review_list().len(), 2);
        assert_eq!(wf.state(), WorkflowState::ReviewingSuggestions);
        assert_eq!(wf.drain_notices()[0].kind, NoticeKind::Error);
    }

    #[test]
    fn assign_all_skips_entries_without_email() {
        let no_email = SuggestionEntry {
            task_id: "3".into(),
            email: None,
            reason: None,
        };
        let (mut wf, service) = reviewing(vec![entry("1", "a@x.com"), no_email]);

        wf.assign_all(&service);

        assert_eq!(
            *service.calls.borrow(),
            vec![Call::Bulk(vec![AssignmentPair {
                task_id: "1".into(),
                email: "a@x.com".into()
            }])]
        );
        // A successful bulk call clears the whole list.
        assert!(wf.review_list().is_empty());
    }

    #[test]
    fn assign_all_with_no_assignable_entries_makes_no_call() {
        let no_email = SuggestionEntry {
            task_id: "3".into(),
            email: None,
            reason: None,
        };
        let (mut wf, service) = reviewing(vec![no_email]);

        wf.assign_all(&service);

        assert!(service.calls.borrow().is_empty());
        assert_eq!(wf.drain_notices()[0].kind, NoticeKind::Warning);
    }

    #[test]
    fn close_discards_entries_without_server_calls() {
        let (mut wf, service) = reviewing(vec![entry("1", "a@x.com")]);

        wf.close();

        assert!(service.calls.borrow().is_empty());
        assert!(wf.review_list().is_empty());
        assert_eq!(wf.state(), WorkflowState::Idle);
    }
}

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalRequest {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
}

impl ModalRequest {
    pub fn confirm(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            confirm_label: "Yes".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalResult {
    Confirmed,
    Dismissed,
}

/// Presenter side of an open modal. Dropping it without answering dismisses the modal.
#[derive(Debug)]
pub struct PendingModal {
    pub request: ModalRequest,
    responder: oneshot::Sender<ModalResult>,
}

impl PendingModal {
    pub fn confirm(self) {
        let _ = self.responder.send(ModalResult::Confirmed);
    }

    pub fn dismiss(self) {
        let _ = self.responder.send(ModalResult::Dismissed);
    }

    pub fn answer(self, result: ModalResult) {
        let _ = self.responder.send(result);
    }
}

/// Caller side: resolves once the presenter answers.
#[derive(Debug)]
pub struct ModalDecision {
    receiver: oneshot::Receiver<ModalResult>,
}

impl ModalDecision {
    /// A decision that is already made, for callers that skip the prompt.
    pub fn ready(result: ModalResult) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(result);
        Self { receiver }
    }
}

impl Future for ModalDecision {
    type Output = ModalResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(ModalResult::Dismissed))
    }
}

pub fn open(request: ModalRequest) -> (PendingModal, ModalDecision) {
    let (responder, receiver) = oneshot::channel();
    (
        PendingModal { request, responder },
        ModalDecision { receiver },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_confirm_resolves_decision() {
        let (pending, decision) = open(ModalRequest::confirm("Leave team", "Are you sure?"));
        assert_eq!(pending.request.title, "Leave team");
        pending.confirm();
        assert_eq!(decision.await, ModalResult::Confirmed);
    }

    #[tokio::test]
    async fn test_dropped_modal_is_dismissed() {
        let (pending, decision) = open(ModalRequest::confirm("Delete", "Really?"));
        drop(pending);
        assert_eq!(decision.await, ModalResult::Dismissed);
    }

    #[tokio::test]
    async fn test_answer_from_another_task() {
        let (pending, decision) = open(ModalRequest::confirm("Stop worker", "Stop it?"));
        tokio::spawn(async move { pending.answer(ModalResult::Dismissed) });
        assert_eq!(decision.await, ModalResult::Dismissed);
    }
}

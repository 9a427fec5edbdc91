use crate::api::{PreflightResponse, WorkItem};

/// An override in effect for this invocation: proceed despite a
/// rejection, at the cost of notifying the displaced claimants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideDirective {
    pub message: String,
    pub target_bead_id: Option<String>,
    pub notify: Vec<WorkItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: String,
    pub in_flight: Vec<WorkItem>,
}

/// Blocking/non-blocking policy as an explicit state machine, so the
/// pre-flight, override, and close-claim inputs can be audited in
/// isolation from any network call.
///
/// Transitions only move forward: `Unevaluated` accepts the pre-flight
/// outcome, `Approved` can still be demoted by the close-claim check,
/// and `Rejected`/`OverrideApplied` absorb all further inputs (an
/// override may gain additional claimants to notify).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingDecision {
    Unevaluated,
    Approved,
    Rejected(Rejection),
    OverrideApplied(OverrideDirective),
}

impl PendingDecision {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub fn may_proceed(&self) -> bool {
        matches!(self, Self::Approved | Self::OverrideApplied(_))
    }

    /// Fold in the pre-flight response. An explicit rejection blocks
    /// unless the invocation carried an override, in which case the
    /// claimants of the target bead become the notify list.
    pub fn apply_preflight(
        self,
        response: &PreflightResponse,
        override_message: Option<&str>,
        target_bead_id: Option<&str>,
        self_workspace_id: &str,
    ) -> Self {
        let Self::Unevaluated = self else {
            return self;
        };

        if response.approved {
            return Self::Approved;
        }

        let in_flight = response.context.beads_in_progress.clone();
        match override_message {
            Some(message) => {
                let notify = claimants_of(&in_flight, target_bead_id, self_workspace_id);
                Self::OverrideApplied(OverrideDirective {
                    message: message.to_string(),
                    target_bead_id: target_bead_id.map(ToString::to_string),
                    notify,
                })
            }
            None => Self::Rejected(Rejection {
                reason: response
                    .reason
                    .clone()
                    .unwrap_or_else(|| "rejected by coordination service".to_string()),
                in_flight,
            }),
        }
    }

    /// Close-claim gating: closing a bead that another workspace still
    /// claims needs the same override as a rejection.
    pub fn apply_close_claims(
        self,
        target_bead_id: &str,
        in_flight: &[WorkItem],
        self_workspace_id: &str,
        override_message: Option<&str>,
    ) -> Self {
        let claimants = claimants_of(in_flight, Some(target_bead_id), self_workspace_id);
        if claimants.is_empty() {
            return self;
        }

        match self {
            Self::Approved => match override_message {
                Some(message) => Self::OverrideApplied(OverrideDirective {
                    message: message.to_string(),
                    target_bead_id: Some(target_bead_id.to_string()),
                    notify: claimants,
                }),
                None => Self::Rejected(Rejection {
                    reason: format!("{target_bead_id} is still claimed by another workspace"),
                    in_flight: claimants,
                }),
            },
            Self::OverrideApplied(mut directive) => {
                for claimant in claimants {
                    let known = directive
                        .notify
                        .iter()
                        .any(|item| item.workspace_id == claimant.workspace_id);
                    if !known {
                        directive.notify.push(claimant);
                    }
                }
                if directive.target_bead_id.is_none() {
                    directive.target_bead_id = Some(target_bead_id.to_string());
                }
                Self::OverrideApplied(directive)
            }
            other => other,
        }
    }
}

/// Workspaces claiming `target`, excluding the caller and any entry
/// missing addressable identity.
fn claimants_of(
    in_flight: &[WorkItem],
    target: Option<&str>,
    self_workspace_id: &str,
) -> Vec<WorkItem> {
    let Some(target) = target else {
        return Vec::new();
    };
    in_flight
        .iter()
        .filter(|item| item.bead_id == target)
        .filter(|item| item.workspace_id != self_workspace_id)
        .filter(|item| !item.workspace_id.is_empty() && !item.alias.is_empty())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PreflightContext;

    fn item(bead: &str, workspace: &str, alias: &str) -> WorkItem {
        WorkItem {
            bead_id: bead.to_string(),
            workspace_id: workspace.to_string(),
            alias: alias.to_string(),
            human_name: alias.to_string(),
            title: String::new(),
        }
    }

    fn rejected_response(items: Vec<WorkItem>) -> PreflightResponse {
        PreflightResponse {
            approved: false,
            reason: Some("already claimed".to_string()),
            context: PreflightContext {
                beads_in_progress: items,
            },
        }
    }

    #[test]
    fn test_approval() {
        let response = PreflightResponse {
            approved: true,
            reason: None,
            context: PreflightContext::default(),
        };
        let decision =
            PendingDecision::Unevaluated.apply_preflight(&response, None, Some("bd-1"), "ws-self");
        assert_eq!(decision, PendingDecision::Approved);
        assert!(decision.may_proceed());
    }

    #[test]
    fn test_rejection_without_override_blocks() {
        let response = rejected_response(vec![item("bd-1", "ws-2", "fox")]);
        let decision =
            PendingDecision::Unevaluated.apply_preflight(&response, None, Some("bd-1"), "ws-self");
        assert!(decision.is_blocking());
        let PendingDecision::Rejected(rejection) = decision else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.reason, "already claimed");
        assert_eq!(rejection.in_flight.len(), 1);
    }

    #[test]
    fn test_rejection_with_override_collects_claimants() {
        let response = rejected_response(vec![
            item("bd-1", "ws-2", "fox"),
            item("bd-1", "ws-self", "me"),
            item("bd-9", "ws-3", "owl"),
            item("bd-1", "", ""),
        ]);
        let decision = PendingDecision::Unevaluated.apply_preflight(
            &response,
            Some("taking over"),
            Some("bd-1"),
            "ws-self",
        );
        let PendingDecision::OverrideApplied(directive) = decision else {
            panic!("expected override");
        };
        assert_eq!(directive.message, "taking over");
        assert_eq!(directive.target_bead_id.as_deref(), Some("bd-1"));
        assert_eq!(directive.notify.len(), 1);
        assert_eq!(directive.notify[0].workspace_id, "ws-2");
    }

    #[test]
    fn test_override_without_target_notifies_nobody() {
        let response = rejected_response(vec![item("bd-1", "ws-2", "fox")]);
        let decision =
            PendingDecision::Unevaluated.apply_preflight(&response, Some("go"), None, "ws-self");
        let PendingDecision::OverrideApplied(directive) = decision else {
            panic!("expected override");
        };
        assert!(directive.notify.is_empty());
        assert!(directive.target_bead_id.is_none());
    }

    #[test]
    fn test_close_claim_gating_blocks_other_claimant() {
        let in_flight = vec![item("bd-1", "ws-2", "fox")];
        let decision =
            PendingDecision::Approved.apply_close_claims("bd-1", &in_flight, "ws-self", None);
        assert!(decision.is_blocking());
    }

    #[test]
    fn test_close_of_exclusively_claimed_bead_passes() {
        let in_flight = vec![item("bd-1", "ws-self", "me")];
        let decision =
            PendingDecision::Approved.apply_close_claims("bd-1", &in_flight, "ws-self", None);
        assert_eq!(decision, PendingDecision::Approved);
    }

    #[test]
    fn test_close_claim_with_override_proceeds() {
        let in_flight = vec![item("bd-1", "ws-2", "fox")];
        let decision =
            PendingDecision::Approved.apply_close_claims("bd-1", &in_flight, "ws-self", Some("go"));
        assert!(decision.may_proceed());
    }

    #[test]
    fn test_close_claims_extend_existing_override() {
        let directive = OverrideDirective {
            message: "go".to_string(),
            target_bead_id: Some("bd-1".to_string()),
            notify: vec![item("bd-1", "ws-2", "fox")],
        };
        let in_flight = vec![item("bd-1", "ws-2", "fox"), item("bd-1", "ws-3", "owl")];
        let decision = PendingDecision::OverrideApplied(directive).apply_close_claims(
            "bd-1",
            &in_flight,
            "ws-self",
            Some("go"),
        );
        let PendingDecision::OverrideApplied(directive) = decision else {
            panic!("expected override");
        };
        let workspaces: Vec<&str> = directive
            .notify
            .iter()
            .map(|item| item.workspace_id.as_str())
            .collect();
        assert_eq!(workspaces, vec!["ws-2", "ws-3"]);
    }

    #[test]
    fn test_rejection_absorbs_later_inputs() {
        let rejected = PendingDecision::Rejected(Rejection {
            reason: "no".to_string(),
            in_flight: Vec::new(),
        });
        let after = rejected
            .clone()
            .apply_close_claims("bd-1", &[item("bd-1", "ws-2", "fox")], "ws-self", None);
        assert_eq!(after, rejected);
    }
}

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::models::{HasId, HostTeam, ParticipantTeam};
use crate::screens::{Route, ScreenAction, ScreenContext, Toast};
use crate::services::dialogs::{ModalDecision, ModalResult};
use crate::services::gateway::ApiRequest;
use crate::services::pagination::{PageRule, Paginator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamKind {
    Participant,
    Host,
}

impl TeamKind {
    fn list_path(self) -> &'static str {
        match self {
            TeamKind::Participant => "participants/participant_team",
            TeamKind::Host => "hosts/challenge_host_team/",
        }
    }

    fn create_path(self) -> &'static str {
        match self {
            TeamKind::Participant => "participants/participant_team",
            TeamKind::Host => "hosts/create_challenge_host_team",
        }
    }

    fn route(self) -> Route {
        match self {
            TeamKind::Participant => Route::Teams,
            TeamKind::Host => Route::HostTeams,
        }
    }
}

#[derive(Debug)]
pub struct TeamsViewModel<T> {
    pub kind: TeamKind,
    pub teams: Paginator<T>,
    pub is_loader: bool,
    pub form_error: Option<String>,
    pub notice: Option<Toast>,
    pub selected_host_team: Option<u64>,
}

pub type ParticipantTeamsViewModel = TeamsViewModel<ParticipantTeam>;
pub type HostTeamsViewModel = TeamsViewModel<HostTeam>;

impl<T> TeamsViewModel<T>
where
    T: DeserializeOwned + HasId,
{
    pub fn new(kind: TeamKind) -> Self {
        Self {
            kind,
            teams: Paginator::new(PageRule::FirstPage),
            is_loader: false,
            form_error: None,
            notice: None,
            selected_host_team: None,
        }
    }

    pub async fn load(&mut self, ctx: &ScreenContext) -> ScreenAction {
        self.is_loader = true;
        let token = ctx.token().await;
        let result = self
            .teams
            .load(&ctx.gateway, self.kind.list_path(), token)
            .await;
        self.settle(ctx, result).await
    }

    pub async fn next_page(&mut self, ctx: &ScreenContext) -> ScreenAction {
        self.is_loader = true;
        let token = ctx.token().await;
        let result = self.teams.next(&ctx.gateway, token).await.map(|_| ());
        self.settle(ctx, result).await
    }

    pub async fn prev_page(&mut self, ctx: &ScreenContext) -> ScreenAction {
        self.is_loader = true;
        let token = ctx.token().await;
        let result = self.teams.previous(&ctx.gateway, token).await.map(|_| ());
        self.settle(ctx, result).await
    }

    /// Creates a team and reloads the first page on success.
    pub async fn create_team(
        &mut self,
        ctx: &ScreenContext,
        team_name: &str,
        team_url: Option<&str>,
    ) -> ScreenAction {
        self.form_error = None;
        let body = json!({ "team_name": team_name, "team_url": team_url.unwrap_or_default() });
        match ctx.send(ApiRequest::post(self.kind.create_path(), body)).await {
            Ok(_) => {
                info!(kind = ?self.kind, team_name, "team created");
                let reload = self.load(ctx).await;
                if reload != ScreenAction::Stay {
                    return reload;
                }
                let toast = Toast::success("Your team has been created successfully!");
                self.notice = Some(toast.clone());
                ScreenAction::Toast(toast)
            }
            Err(err) => {
                let action = ctx.fail_from(Some(&self.kind.route()), &err).await;
                if let ScreenAction::FormError { message, .. } = &action {
                    self.form_error = Some(message.clone());
                }
                action
            }
        }
    }

    pub fn contains(&self, team_id: u64) -> bool {
        self.teams.items.iter().any(|team| team.id() == team_id)
    }

    async fn settle(&mut self, ctx: &ScreenContext, result: Result<(), ApiError>) -> ScreenAction {
        self.is_loader = false;
        match result {
            Ok(()) => ScreenAction::Stay,
            Err(err) => ctx.fail_from(Some(&self.kind.route()), &err).await,
        }
    }
}

impl TeamsViewModel<ParticipantTeam> {
    /// Leaves the team only after the caller's modal is confirmed.
    pub async fn leave_team(
        &mut self,
        ctx: &ScreenContext,
        team_id: u64,
        decision: ModalDecision,
    ) -> ScreenAction {
        if decision.await != ModalResult::Confirmed {
            return ScreenAction::Stay;
        }

        let request = ApiRequest::delete(format!(
            "participants/remove_self_from_participant_team/{team_id}"
        ));
        match ctx.send(request).await {
            Ok(_) => {
                self.teams.items.retain(|team| team.id != team_id);
                let toast = Toast::success("You have left the team successfully!");
                self.notice = Some(toast.clone());
                ScreenAction::Toast(toast)
            }
            Err(err) => ctx.fail_from(Some(&Route::Teams), &err).await,
        }
    }
}

impl TeamsViewModel<HostTeam> {
    /// Loads host teams and restores the stored selection if it is still listed.
    pub async fn load_with_selection(&mut self, ctx: &ScreenContext) -> ScreenAction {
        let action = self.load(ctx).await;
        if action == ScreenAction::Stay {
            let stored = ctx.session.lock().await.host_team();
            self.selected_host_team = stored.filter(|team_id| self.contains(*team_id));
        }
        action
    }

    pub async fn select_host_team(&mut self, ctx: &ScreenContext, team_id: u64) -> ScreenAction {
        if let Err(err) = ctx.session.lock().await.set_host_team(team_id) {
            return ScreenAction::Toast(Toast::error(err.to_string()));
        }
        self.selected_host_team = Some(team_id);
        let name = self
            .teams
            .items
            .iter()
            .find(|team| team.id == team_id)
            .map(|team| team.team_name.clone())
            .unwrap_or_else(|| format!("#{team_id}"));
        ScreenAction::Toast(Toast::info(format!("Selected host team {name}")))
    }
}

use tracing::{debug, warn};

use crate::error::ApiError;
use crate::models::{Challenge, ChallengePhase, PageEnvelope};
use crate::screens::{Route, ScreenAction, ScreenContext};
use crate::services::gateway::ApiRequest;
use crate::services::pagination::{PageRule, Paginator};
use crate::services::projection::{ChallengeCard, project_challenge};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChallengeTab {
    #[default]
    Present,
    Upcoming,
    Past,
}

impl ChallengeTab {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "present" | "ongoing" => Some(ChallengeTab::Present),
            "upcoming" | "future" => Some(ChallengeTab::Upcoming),
            "past" => Some(ChallengeTab::Past),
            _ => None,
        }
    }

    fn path(self) -> &'static str {
        match self {
            ChallengeTab::Present => "challenges/challenge/present/approved/public",
            ChallengeTab::Upcoming => "challenges/challenge/future/approved/public",
            ChallengeTab::Past => "challenges/challenge/past/approved/public",
        }
    }
}

#[derive(Debug)]
pub struct ChallengeListViewModel {
    pub tab: ChallengeTab,
    pub challenges: Paginator<Challenge>,
    pub cards: Vec<ChallengeCard>,
    pub is_loader: bool,
    pub no_challenges: bool,
}

impl Default for ChallengeListViewModel {
    fn default() -> Self {
        Self {
            tab: ChallengeTab::default(),
            challenges: Paginator::new(PageRule::FirstPage),
            cards: Vec::new(),
            is_loader: false,
            no_challenges: false,
        }
    }
}

impl ChallengeListViewModel {
    pub async fn load(&mut self, ctx: &ScreenContext, tab: ChallengeTab) -> ScreenAction {
        self.tab = tab;
        self.is_loader = true;
        let token = ctx.token().await;
        let result = self.challenges.load(&ctx.gateway, tab.path(), token).await;
        self.settle(ctx, result).await
    }

    pub async fn next_page(&mut self, ctx: &ScreenContext) -> ScreenAction {
        self.is_loader = true;
        let token = ctx.token().await;
        let result = self.challenges.next(&ctx.gateway, token).await.map(|_| ());
        self.settle(ctx, result).await
    }

    pub async fn prev_page(&mut self, ctx: &ScreenContext) -> ScreenAction {
        self.is_loader = true;
        let token = ctx.token().await;
        let result = self.challenges.previous(&ctx.gateway, token).await.map(|_| ());
        self.settle(ctx, result).await
    }

    async fn settle(&mut self, ctx: &ScreenContext, result: Result<(), ApiError>) -> ScreenAction {
        self.is_loader = false;
        match result {
            Ok(()) => {
                let now = ctx.now();
                self.cards = self
                    .challenges
                    .items
                    .iter()
                    .map(|challenge| project_challenge(challenge, now, &ctx.zone))
                    .collect();
                self.no_challenges = self.cards.is_empty();
                debug!(tab = ?self.tab, count = self.cards.len(), "challenge page loaded");
                ScreenAction::Stay
            }
            Err(err) => ctx.fail_from(Some(&Route::ChallengeList), &err).await,
        }
    }
}

#[derive(Debug, Default)]
pub struct ChallengeDetailViewModel {
    pub challenge: Option<Challenge>,
    pub card: Option<ChallengeCard>,
    pub phases: Vec<ChallengePhase>,
    pub error: Option<String>,
}

impl ChallengeDetailViewModel {
    /// A 404 leaves `challenge` empty and sets `error`.
    pub async fn load(&mut self, ctx: &ScreenContext, challenge_id: u64) -> ScreenAction {
        self.error = None;
        let route = Route::Challenge { challenge_id };
        let challenge: Challenge = match ctx
            .fetch(ApiRequest::get(format!("challenges/challenge/{challenge_id}/")))
            .await
        {
            Ok(challenge) => challenge,
            Err(err) => {
                self.challenge = None;
                self.card = None;
                let action = ctx.fail_from(Some(&route), &err).await;
                if let ScreenAction::InlineError(message) = &action {
                    self.error = Some(message.clone());
                }
                return action;
            }
        };

        self.card = Some(project_challenge(&challenge, ctx.now(), &ctx.zone));
        self.challenge = Some(challenge);

        match ctx
            .fetch::<PageEnvelope<ChallengePhase>>(ApiRequest::get(format!(
                "challenges/challenge/{challenge_id}/challenge_phase"
            )))
            .await
        {
            Ok(page) => self.phases = page.results,
            Err(err) => {
                warn!(challenge_id, error = %err, "failed to load challenge phases");
                self.phases.clear();
            }
        }
        ScreenAction::Stay
    }
}

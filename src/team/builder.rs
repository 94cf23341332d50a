//! TeamBuilder.

use std::collections::HashSet;
use std::sync::Arc;

use super::Team;
use crate::Error;
use crate::agent::Agent;
use crate::config::{ConfigError, TeamConfig};
use crate::hitl::{FlowInterceptor, MemoryPendingTaskStore, PendingTaskStore};
use crate::model::ModelCaller;

pub struct TeamBuilder {
    name: String,
    description: String,
    supervisor: Option<Arc<dyn ModelCaller>>,
    members: Vec<Arc<dyn Agent>>,
    flows: Vec<Arc<dyn FlowInterceptor>>,
    store: Option<Arc<dyn PendingTaskStore>>,
    config: TeamConfig,
}

impl TeamBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            supervisor: None,
            members: Vec::new(),
            flows: Vec::new(),
            store: None,
            config: TeamConfig::default(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Model used for the routing decision.
    pub fn supervisor(mut self, model: Arc<dyn ModelCaller>) -> Self {
        self.supervisor = Some(model);
        self
    }

    pub fn member(mut self, member: Arc<dyn Agent>) -> Self {
        self.members.push(member);
        self
    }

    pub fn flow(mut self, flow: impl FlowInterceptor + 'static) -> Self {
        self.flows.push(Arc::new(flow));
        self
    }

    /// Where flow suspensions are published. Share it with the [`Hitl`](crate::hitl::Hitl) API.
    pub fn pending_store(mut self, store: Arc<dyn PendingTaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: TeamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_total_iterations(mut self, max: usize) -> Self {
        self.config.max_total_iterations = max;
        self
    }

    /// Validate the member graph and build the team.
    ///
    /// Every agent below the team shares the session snapshot keyed by name,
    /// so names must be unique across the whole tree and the team must not
    /// appear below itself.
    pub fn build(self) -> crate::Result<Team> {
        let supervisor = self
            .supervisor
            .ok_or_else(|| ConfigError::invalid("supervisor", "a team needs a supervisor model"))?;
        if self.members.is_empty() {
            return Err(Error::Registration(format!(
                "team [{}] has no members",
                self.name
            )));
        }
        if self.config.max_total_iterations == 0 {
            return Err(ConfigError::invalid(
                "team.max_total_iterations",
                "must be greater than zero",
            )
            .into());
        }

        let mut seen = HashSet::from([self.name.clone()]);
        for member in &self.members {
            let name = member.name().to_string();
            if name == self.name || member.member_names().contains(&self.name) {
                return Err(Error::Registration(format!(
                    "team [{}] cannot contain itself (via member [{}])",
                    self.name, name
                )));
            }
            for descendant in std::iter::once(name.clone()).chain(member.member_names()) {
                if !seen.insert(descendant.clone()) {
                    return Err(Error::Registration(format!(
                        "duplicate agent name [{}] in team [{}]",
                        descendant, self.name
                    )));
                }
            }
        }

        tracing::debug!(
            team = %self.name,
            members = self.members.len(),
            flows = self.flows.len(),
            "Team built"
        );

        Ok(Team {
            name: self.name,
            description: self.description,
            supervisor,
            members: self.members,
            flows: self.flows,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryPendingTaskStore::new())),
            config: self.config,
        })
    }
}

//! In-memory stack provider.
//!
//! Stacks are partitioned per (account, region) with
//! [`AccountRegionStore`], so the same stack name in two accounts never
//! collides. Mutations start in an `*_IN_PROGRESS` status and settle after a
//! configurable number of `describe` polls, which lets tests exercise the
//! wait loop, stalls and concurrent-mutation conflicts.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use lzstack_model::{AccountId, AwsRegion, ErrorKind, LzError, StackStatus};

use super::{ProviderSession, StackDescription, StackProvider, StackSpec, UpdateOutcome};
use crate::state::AccountRegionStore;

#[derive(Debug, Default)]
struct RegionStacks {
    stacks: DashMap<String, StoredStack>,
}

#[derive(Debug, Clone)]
struct StoredStack {
    stack_id: String,
    spec: StackSpec,
    status: StackStatus,
    polls_until_settled: u32,
    outputs: BTreeMap<String, String>,
    /// Spec and outputs in force before the pending update.
    previous: Option<(StackSpec, BTreeMap<String, String>)>,
}

impl StoredStack {
    fn description(&self) -> StackDescription {
        StackDescription {
            stack_id: self.stack_id.clone(),
            status: self.status.clone(),
            outputs: self.outputs.clone(),
        }
    }
}

/// Stack provider backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryStackProvider {
    store: AccountRegionStore<RegionStacks>,
    settle_after_polls: AtomicU32,
    stalled: AtomicBool,
    roll_back: AtomicBool,
    injected: Mutex<Option<(ErrorKind, usize)>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    describes: AtomicUsize,
}

impl InMemoryStackProvider {
    /// Create a provider whose mutations settle on the first poll.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep new mutations in progress for `polls` describe calls.
    pub fn settle_after_polls(&self, polls: u32) {
        self.settle_after_polls.store(polls, Ordering::SeqCst);
    }

    /// Keep in-progress stacks in progress until turned off again.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Make subsequent mutations settle in a rolled-back state. A rolled-back
    /// update restores the spec and outputs it replaced.
    pub fn set_roll_back(&self, roll_back: bool) {
        self.roll_back.store(roll_back, Ordering::SeqCst);
    }

    /// Fail the next `times` provider calls with `kind`.
    pub fn fail_next(&self, kind: ErrorKind, times: usize) {
        *self.injected.lock() = (times > 0).then_some((kind, times));
    }

    /// Seed a stack directly, bypassing the create path.
    pub fn put_stack(
        &self,
        account_id: &AccountId,
        region: &AwsRegion,
        spec: StackSpec,
        status: StackStatus,
    ) -> String {
        let stack_id = stack_arn(account_id, region, &spec.name);
        let stacks = self.store.get_or_create(account_id, region);
        stacks.stacks.insert(
            spec.name.clone(),
            StoredStack {
                stack_id: stack_id.clone(),
                outputs: synthesize_outputs(&stack_id, &spec.template_body),
                spec,
                status,
                polls_until_settled: self.settle_after_polls.load(Ordering::SeqCst),
                previous: None,
            },
        );
        stack_id
    }

    /// Inspect a stack without advancing its status.
    #[must_use]
    pub fn stack(
        &self,
        account_id: &AccountId,
        region: &AwsRegion,
        stack_name: &str,
    ) -> Option<StackDescription> {
        self.store
            .get(account_id, region)
            .and_then(|r| r.stacks.get(stack_name).map(|s| s.description()))
    }

    /// Number of `create` calls that started a stack.
    #[must_use]
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of `update` calls that started an update.
    #[must_use]
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Number of `describe` calls.
    #[must_use]
    pub fn describes(&self) -> usize {
        self.describes.load(Ordering::SeqCst)
    }

    fn check_call(&self, session: &ProviderSession) -> Result<(), LzError> {
        {
            let mut injected = self.injected.lock();
            if let Some((kind, remaining)) = injected.as_mut() {
                let kind = *kind;
                *remaining -= 1;
                if *remaining == 0 {
                    *injected = None;
                }
                return Err(LzError::new(kind, "injected provider failure"));
            }
        }
        if session.credentials.as_ref().is_some_and(|c| c.is_expired()) {
            return Err(LzError::assume_role_expired(format!(
                "session credentials for {} have expired",
                session.account_id
            )));
        }
        Ok(())
    }

    fn settle(&self, stack: &mut StoredStack) {
        if !stack.status.is_in_progress() || self.stalled.load(Ordering::SeqCst) {
            return;
        }
        if stack.polls_until_settled > 0 {
            stack.polls_until_settled -= 1;
            return;
        }
        let roll_back = self.roll_back.load(Ordering::SeqCst);
        stack.status = match (&stack.status, roll_back) {
            (StackStatus::CreateInProgress, false) => StackStatus::CreateComplete,
            (StackStatus::CreateInProgress, true) => StackStatus::RollbackComplete,
            (_, false) => StackStatus::UpdateComplete,
            (_, true) => StackStatus::UpdateRollbackComplete,
        };
        let previous = stack.previous.take();
        if let (StackStatus::UpdateRollbackComplete, Some((spec, outputs))) =
            (&stack.status, previous)
        {
            stack.spec = spec;
            stack.outputs = outputs;
        }
    }
}

#[async_trait]
impl StackProvider for InMemoryStackProvider {
    async fn describe(
        &self,
        session: &ProviderSession,
        stack_name: &str,
    ) -> Result<Option<StackDescription>, LzError> {
        self.describes.fetch_add(1, Ordering::SeqCst);
        self.check_call(session)?;
        let Some(region) = self.store.get(&session.account_id, &session.region) else {
            return Ok(None);
        };
        let Some(mut stack) = region.stacks.get_mut(stack_name) else {
            return Ok(None);
        };
        self.settle(&mut stack);
        Ok(Some(stack.description()))
    }

    async fn create(&self, session: &ProviderSession, spec: &StackSpec) -> Result<String, LzError> {
        self.check_call(session)?;
        let region = self
            .store
            .get_or_create(&session.account_id, &session.region);
        if region.stacks.contains_key(&spec.name) {
            return Err(LzError::provider(format!(
                "stack [{}] already exists",
                spec.name
            )));
        }

        let stack_id = stack_arn(&session.account_id, &session.region, &spec.name);
        debug!(stack_id = %stack_id, account_id = %session.account_id, region = %session.region, "creating in-memory stack");
        region.stacks.insert(
            spec.name.clone(),
            StoredStack {
                stack_id: stack_id.clone(),
                spec: spec.clone(),
                status: StackStatus::CreateInProgress,
                polls_until_settled: self.settle_after_polls.load(Ordering::SeqCst),
                outputs: synthesize_outputs(&stack_id, &spec.template_body),
                previous: None,
            },
        );
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(stack_id)
    }

    async fn update(
        &self,
        session: &ProviderSession,
        stack_id: &str,
        spec: &StackSpec,
    ) -> Result<UpdateOutcome, LzError> {
        self.check_call(session)?;
        let region = self
            .store
            .get(&session.account_id, &session.region)
            .ok_or_else(|| LzError::provider(format!("stack {stack_id} does not exist")))?;
        let mut stack = region
            .stacks
            .get_mut(&spec.name)
            .filter(|s| s.stack_id == stack_id)
            .ok_or_else(|| LzError::provider(format!("stack {stack_id} does not exist")))?;

        if stack.status.is_in_progress() {
            return Err(LzError::concurrent_conflict(format!(
                "stack {stack_id} is in {} state and can not be updated",
                stack.status
            )));
        }
        if stack.spec == *spec {
            return Ok(UpdateOutcome::NoChange);
        }

        let outputs = synthesize_outputs(stack_id, &spec.template_body);
        let previous_spec = std::mem::replace(&mut stack.spec, spec.clone());
        let previous_outputs = std::mem::replace(&mut stack.outputs, outputs);
        stack.previous = Some((previous_spec, previous_outputs));
        stack.status = StackStatus::UpdateInProgress;
        stack.polls_until_settled = self.settle_after_polls.load(Ordering::SeqCst);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(UpdateOutcome::Updated)
    }
}

fn stack_arn(account_id: &AccountId, region: &AwsRegion, name: &str) -> String {
    format!(
        "arn:aws:cloudformation:{region}:{account_id}:stack/{name}/{}",
        uuid::Uuid::new_v4()
    )
}

/// Outputs declared by a JSON template. A literal string `Value` is used as
/// is; anything else resolves to `{stack_id}/{name}`.
fn synthesize_outputs(stack_id: &str, template_body: &str) -> BTreeMap<String, String> {
    let Ok(template) = serde_json::from_str::<serde_json::Value>(template_body) else {
        return BTreeMap::new();
    };
    let Some(outputs) = template.get("Outputs").and_then(|o| o.as_object()) else {
        return BTreeMap::new();
    };
    outputs
        .iter()
        .map(|(name, output)| {
            let value = output
                .get("Value")
                .and_then(|v| v.as_str())
                .map_or_else(|| format!("{stack_id}/{name}"), str::to_owned);
            (name.clone(), value)
        })
        .collect()
}

//! Lifecycle client shared by every resource type.
//!
//! Each call takes the identity key's lock for its whole duration, sends the
//! request through [`ApiClient`], classifies the answer and either returns or,
//! for deletes, keeps retrying until the server converges or the policy's
//! deadline passes.

use crate::handle::{Operation, ResourceHandle};
use crate::outcome::Outcome;
use crate::retry::RetryState;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use validator::Validate;
use vra_core::client::{ApiClient, ApiRequest, ConvergencePolicy, RawResponse, VersionToken};
use vra_core::config::ProviderConfig;
use vra_core::query::QueryParams;
use vra_core::{CancelToken, Error, Result};

const FORCE_PARAM: &str = "force";

/// A decoded response together with the raw response it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    /// Decoded body
    pub value: T,
    /// Raw response
    pub response: RawResponse,
}

impl<T> Fetched<T> {
    /// Changeset token to pass to the next update, if the server sent one.
    #[must_use]
    pub const fn version_token(&self) -> Option<&VersionToken> {
        self.response.version_token.as_ref()
    }
}

/// Summary of a successful delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteReport {
    /// Requests dispatched, including the successful one
    pub attempts: u32,
    /// Time from the first attempt to success
    pub elapsed: Duration,
    /// The server answered 404: the object was already gone
    pub already_gone: bool,
}

/// Create/read/update/delete against the API with per-object serialization.
#[derive(Clone)]
pub struct LifecycleClient {
    api: ApiClient,
    locks: Arc<crate::LockRegistry>,
    policy: ConvergencePolicy,
}

impl LifecycleClient {
    /// Create a client sharing `locks` with every other user of the registry.
    #[must_use]
    pub fn new(api: ApiClient, locks: Arc<crate::LockRegistry>) -> Self {
        Self {
            api,
            locks,
            policy: ConvergencePolicy::new(),
        }
    }

    /// Create a client whose delete policy comes from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if `config` fails validation.
    pub fn from_config(
        api: ApiClient,
        locks: Arc<crate::LockRegistry>,
        config: &ProviderConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(api, locks).with_policy(ConvergencePolicy::from(config)))
    }

    /// Override the delete convergence policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: ConvergencePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Delete convergence policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &ConvergencePolicy {
        &self.policy
    }

    /// Lock registry shared by this client.
    #[must_use]
    pub fn locks(&self) -> &Arc<crate::LockRegistry> {
        &self.locks
    }

    /// Underlying transport.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// POST `body` to the handle's create path and decode the response.
    ///
    /// # Errors
    ///
    /// Any non-success outcome, including 404, is returned as an error. No
    /// retries are attempted.
    pub async fn create_it<H, B, T>(
        &self,
        cancel: &CancelToken,
        handle: &H,
        body: &B,
    ) -> Result<Fetched<T>>
    where
        H: ResourceHandle + ?Sized,
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode(body)?;
        let response = self
            .send_once(cancel, Operation::Create, handle, Some(&body), None)
            .await?;
        decode(Operation::Create, handle, response)
    }

    /// GET the handle's read path.
    ///
    /// Returns `Ok(None)` when the server answers 404, meaning the object
    /// should be dropped from state.
    ///
    /// # Errors
    ///
    /// Any other non-success outcome is returned as an error. No retries are
    /// attempted.
    pub async fn read_it<H, T>(&self, cancel: &CancelToken, handle: &H) -> Result<Option<Fetched<T>>>
    where
        H: ResourceHandle + ?Sized,
        T: DeserializeOwned,
    {
        match self
            .send_once(cancel, Operation::Read, handle, None, None)
            .await?
        {
            Some(response) => decode(Operation::Read, handle, Some(response)).map(Some),
            None => {
                info!(key = %handle.identity_key(), "resource no longer exists");
                Ok(None)
            }
        }
    }

    /// PUT `body` to the handle's update path, echoing `version` as the
    /// changeset header when given.
    ///
    /// # Errors
    ///
    /// Any non-success outcome, including 404, is returned as an error. No
    /// retries are attempted.
    pub async fn update_it<H, B, T>(
        &self,
        cancel: &CancelToken,
        handle: &H,
        body: &B,
        version: Option<&VersionToken>,
    ) -> Result<Fetched<T>>
    where
        H: ResourceHandle + ?Sized,
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode(body)?;
        let response = self
            .send_once(cancel, Operation::Update, handle, Some(&body), version)
            .await?;
        decode(Operation::Update, handle, response)
    }

    /// DELETE the handle's delete path, retrying conflicts and transport
    /// failures until the server converges.
    ///
    /// A 404 counts as success. Auth and validation failures stop immediately.
    /// Retryable failures are retried until `policy.max_wait` has elapsed,
    /// after which [`Error::RetriesExhausted`] carries the last failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires during a request or a
    /// pause between attempts, the fatal error for auth and validation
    /// failures, or [`Error::RetriesExhausted`].
    pub async fn delete_it<H>(&self, cancel: &CancelToken, handle: &H) -> Result<DeleteReport>
    where
        H: ResourceHandle + ?Sized,
    {
        let key = handle.identity_key();
        let _guard = self.locks.acquire(&key).await;

        let path = handle.delete_path();
        let query = force_query(handle.force_delete(), &path);
        let mut state = RetryState::start(&self.policy);

        loop {
            let attempt = state.begin_attempt();
            let request = ApiRequest::new(Method::DELETE, &path).with_query(query.clone());
            let outcome = self
                .attempt(cancel, Operation::Delete, handle, request)
                .await?;

            match outcome {
                Outcome::Success(_) | Outcome::NotFound => {
                    let already_gone = matches!(outcome, Outcome::NotFound);
                    info!(key = %key, attempt, already_gone, "resource deleted");
                    return Ok(DeleteReport {
                        attempts: attempt,
                        elapsed: state.elapsed(),
                        already_gone,
                    });
                }
                outcome if outcome.is_retryable() => {
                    let error = match outcome.into_result() {
                        Err(error) => error,
                        Ok(_) => Error::InternalError("retryable outcome without error".into()),
                    };

                    if state.is_expired() {
                        warn!(
                            key = %key,
                            attempts = attempt,
                            elapsed = ?state.elapsed(),
                            error = %error,
                            "delete did not converge before the deadline"
                        );
                        state.record(error);
                        return Err(state.exhausted());
                    }

                    let delay = state.next_delay(&self.policy);
                    debug!(key = %key, attempt, ?delay, error = %error, "delete not converged, retrying");
                    state.record(error);
                    cancel.sleep(delay).await?;
                }
                outcome => {
                    let error = match outcome.into_result() {
                        Err(error) => error,
                        Ok(_) => Error::InternalError("fatal outcome without error".into()),
                    };
                    warn!(key = %key, attempt, error = %error, "delete failed");
                    return Err(error);
                }
            }
        }
    }

    async fn send_once<H>(
        &self,
        cancel: &CancelToken,
        operation: Operation,
        handle: &H,
        body: Option<&serde_json::Value>,
        version: Option<&VersionToken>,
    ) -> Result<Option<RawResponse>>
    where
        H: ResourceHandle + ?Sized,
    {
        let key = handle.identity_key();
        let _guard = self.locks.acquire(&key).await;

        let path = handle.path_for(operation);
        let mut request = ApiRequest::new(operation.method(), &path).with_version_token(version);
        if let Some(body) = body {
            request = request.with_body(body);
        }

        let response = self
            .attempt(cancel, operation, handle, request)
            .await?
            .into_result()
            .map_err(|error| {
                warn!(key = %key, operation = operation.verb(), error = %error, "request failed");
                error
            })?;

        match response {
            None if !operation.tolerates_missing() => Err(Error::NotFound(path)),
            other => Ok(other),
        }
    }

    async fn attempt<H>(
        &self,
        cancel: &CancelToken,
        operation: Operation,
        handle: &H,
        request: ApiRequest<'_>,
    ) -> Result<Outcome>
    where
        H: ResourceHandle + ?Sized,
    {
        let sent = cancel
            .run(async { Ok(self.api.execute(request).await) })
            .await?;
        Ok(Outcome::classify(
            operation,
            handle.allowed_codes(operation),
            sent,
        ))
    }
}

impl std::fmt::Debug for LifecycleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleClient")
            .field("api", &self.api)
            .field("locks", &self.locks.len())
            .field("policy", &self.policy)
            .finish()
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value> {
    serde_json::to_value(body)
        .map_err(|err| Error::InternalError(format!("failed to encode request body: {err}")))
}

fn decode<H, T>(operation: Operation, handle: &H, response: Option<RawResponse>) -> Result<Fetched<T>>
where
    H: ResourceHandle + ?Sized,
    T: DeserializeOwned,
{
    let response = response.ok_or_else(|| Error::NotFound(handle.path_for(operation)))?;
    let value = response.json::<T>()?;
    Ok(Fetched { value, response })
}

// The path may already carry the flag, e.g. `actions/42?force=true`.
fn force_query(force: bool, path: &str) -> QueryParams {
    let mut query = QueryParams::new();
    let already_set = path.split_once('?').is_some_and(|(_, params)| {
        params
            .split('&')
            .any(|pair| pair == FORCE_PARAM || pair.starts_with("force="))
    });

    if force && !already_set {
        query.push(FORCE_PARAM, true);
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_query_appends_flag_once() {
        assert_eq!(
            force_query(true, "vco/api/actions/42").into_pairs(),
            vec![("force", "true".to_string())]
        );
        assert!(force_query(true, "vco/api/actions/42?force=true").is_empty());
        assert!(force_query(true, "vco/api/actions/42?a=1&force").is_empty());
        assert!(force_query(false, "vco/api/actions/42").is_empty());
        assert!(!force_query(true, "vco/api/actions/42?forced=1").is_empty());
    }
}

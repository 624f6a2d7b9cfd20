// Copyright 2025 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Health predicates run against pooled resources.
//!
//! A [`HealthCheck`] runs on every idle candidate right before [`Pool::get`](crate::Pool::get)
//! hands it out. A [`KeepAlive`] runs periodically against idle items only. Both are
//! fail-closed: a predicate that returns an error or panics counts as a failed check.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use crate::BoxError;

/// A predicate deciding whether a resource may still be used.
///
/// Any `Fn(&mut T) -> bool` closure is a health check.
pub trait HealthCheck<T>: Send + Sync {
    /// Returns `Ok(true)` if the resource is healthy.
    fn check(&self, resource: &mut T) -> Result<bool, BoxError>;
}

impl<T, F> HealthCheck<T> for F
where
    F: Fn(&mut T) -> bool + Send + Sync,
{
    fn check(&self, resource: &mut T) -> Result<bool, BoxError> {
        Ok(self(resource))
    }
}

/// A periodic liveness check of idle resources.
pub trait KeepAlive<T>: Send + Sync + 'static {
    /// How often the check runs.
    fn interval(&self) -> Duration;

    /// Returns `Ok(true)` if the resource is still alive.
    fn check(&self, resource: &mut T) -> Result<bool, BoxError>;
}

/// A [`KeepAlive`] built from an interval and a closure.
///
/// See [`keepalive_fn`].
pub struct KeepAliveFn<F> {
    interval: Duration,
    f: F,
}

impl<F> fmt::Debug for KeepAliveFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepAliveFn")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Creates a [`KeepAlive`] that runs `f` every `interval`.
pub fn keepalive_fn<T, F>(interval: Duration, f: F) -> KeepAliveFn<F>
where
    F: Fn(&mut T) -> bool + Send + Sync + 'static,
{
    KeepAliveFn { interval, f }
}

impl<T, F> KeepAlive<T> for KeepAliveFn<F>
where
    F: Fn(&mut T) -> bool + Send + Sync + 'static,
{
    fn interval(&self) -> Duration {
        self.interval
    }

    fn check(&self, resource: &mut T) -> Result<bool, BoxError> {
        Ok((self.f)(resource))
    }
}

/// Why a predicate rejected a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckFailure {
    /// The predicate returned `false`.
    Unhealthy,
    /// The predicate returned an error.
    Errored(String),
    /// The predicate panicked.
    Panicked,
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckFailure::Unhealthy => f.write_str("check returned false"),
            CheckFailure::Errored(err) => write!(f, "check failed: {err}"),
            CheckFailure::Panicked => f.write_str("check panicked"),
        }
    }
}

/// Runs one predicate, turning errors and panics into failures.
pub(crate) fn run_check<T>(
    check: impl FnOnce(&mut T) -> Result<bool, BoxError>,
    resource: &mut T,
) -> Result<(), CheckFailure> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| check(resource))) {
        Ok(Ok(true)) => Ok(()),
        Ok(Ok(false)) => Err(CheckFailure::Unhealthy),
        Ok(Err(err)) => Err(CheckFailure::Errored(err.to_string())),
        Err(_) => Err(CheckFailure::Panicked),
    }
}

/// An ordered list of [`HealthCheck`]s.
///
/// The first failing check short-circuits the chain.
pub struct HealthCheckChain<T> {
    checks: Vec<Box<dyn HealthCheck<T>>>,
}

impl<T> Default for HealthCheckChain<T> {
    fn default() -> Self {
        Self { checks: Vec::new() }
    }
}

impl<T> fmt::Debug for HealthCheckChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheckChain")
            .field("len", &self.checks.len())
            .finish()
    }
}

impl<T> HealthCheckChain<T> {
    /// Creates an empty chain; an empty chain accepts every resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a check to the end of the chain.
    pub fn push(&mut self, check: impl HealthCheck<T> + 'static) {
        self.checks.push(Box::new(check));
    }

    /// Appends a boxed check to the end of the chain.
    pub fn push_boxed(&mut self, check: Box<dyn HealthCheck<T>>) {
        self.checks.push(check);
    }

    /// Number of checks in the chain.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether the chain has no checks.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Returns whether `resource` passes every check.
    pub fn check(&self, resource: &mut T) -> bool {
        self.evaluate(resource).is_ok()
    }

    /// Runs the chain, returning the position and cause of the first failure.
    pub(crate) fn evaluate(&self, resource: &mut T) -> Result<(), (usize, CheckFailure)> {
        for (index, check) in self.checks.iter().enumerate() {
            run_check(|r| check.check(r), resource).map_err(|failure| (index, failure))?;
        }
        Ok(())
    }
}

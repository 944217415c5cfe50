// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ambient "current request" scope.
//!
//! Passing a [`RequestContext`] explicitly is preferred. Code that cannot (log
//! bridges, deeply nested helpers) reads the scope installed here instead.
//!
//! A scope is installed on the current thread by a [`ContextGuard`] and removed
//! when the guard drops, on every exit path including unwinding. Guards must be
//! dropped in reverse order of creation. Async code uses [`WithContext`], which
//! re-installs the scope around every poll, so the scope follows the request
//! across worker threads; [`spawn`] hands the current scope to a child task.
//! Tasks that do not inherit a scope never observe one.

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tokio::task::JoinHandle;

use crate::context::RequestContext;
use crate::span::Span;

thread_local! {
    static CURRENT: RefCell<Scope> = const { RefCell::new(Scope(ScopeKind::Empty)) };
}

/// A captured ambient scope that can be installed elsewhere.
#[derive(Debug, Clone, Default)]
pub struct Scope(ScopeKind);

#[derive(Debug, Clone, Default)]
enum ScopeKind {
    #[default]
    Empty,
    Context(RequestContext),
    Span(Span),
    /// Work triggered by a recursive request: nothing is recorded.
    Suppressed,
}

impl Scope {
    pub fn empty() -> Self {
        Self(ScopeKind::Empty)
    }

    pub fn with_context(context: RequestContext) -> Self {
        Self(ScopeKind::Context(context))
    }

    pub fn with_span(span: Span) -> Self {
        Self(ScopeKind::Span(span))
    }

    pub fn suppressed() -> Self {
        Self(ScopeKind::Suppressed)
    }

    pub fn context(&self) -> Option<RequestContext> {
        match &self.0 {
            ScopeKind::Context(context) => Some(context.clone()),
            ScopeKind::Span(span) => Some(span.context().clone()),
            ScopeKind::Empty | ScopeKind::Suppressed => None,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match &self.0 {
            ScopeKind::Span(span) => Some(span.clone()),
            _ => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self.0, ScopeKind::Suppressed)
    }

    /// Installs this scope on the current thread until the guard drops.
    pub fn enter(&self) -> ContextGuard {
        let previous = CURRENT.with(|current| current.replace(self.clone()));
        ContextGuard {
            previous: Some(previous),
            _not_send: PhantomData,
        }
    }
}

/// Restores the previously installed scope when dropped.
#[must_use = "the scope is removed as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ContextGuard {
    previous: Option<Scope>,
    // the guard restores thread-local state, so it must stay on its thread
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            // try_with: the thread-local may already be gone during thread teardown
            let _ = CURRENT.try_with(|current| *current.borrow_mut() = previous);
        }
    }
}

/// Snapshot of the scope installed on the current thread.
pub fn capture() -> Scope {
    CURRENT.with(|current| current.borrow().clone())
}

pub fn current() -> Option<RequestContext> {
    CURRENT.with(|current| current.borrow().context())
}

pub fn current_span() -> Option<Span> {
    CURRENT.with(|current| current.borrow().span())
}

pub fn is_suppressed() -> bool {
    CURRENT.with(|current| current.borrow().is_suppressed())
}

/// Makes `context` current without a span, for adapters that cannot pass it
/// explicitly.
pub fn set_current(context: RequestContext) -> ContextGuard {
    Scope::with_context(context).enter()
}

/// Clears the current scope until the guard drops.
pub fn remove_current() -> ContextGuard {
    Scope::empty().enter()
}

/// Enters a suppressed scope: spans and logs recorded inside are discarded.
pub fn suppress() -> ContextGuard {
    Scope::suppressed().enter()
}

/// Runs `future` in a suppressed scope.
pub fn suppressed<F: Future>(future: F) -> WithContext<F> {
    WithContext::new(future, Scope::suppressed())
}

/// Runs `future` with `context` as the ambient context.
pub fn with_context<F: Future>(future: F, context: RequestContext) -> WithContext<F> {
    WithContext::new(future, Scope::with_context(context))
}

/// Spawns a tokio task that inherits the caller's scope.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(WithContext::new(future, capture()))
}

pin_project! {
    /// Future that installs a scope around every poll of the inner future.
    #[derive(Debug)]
    #[must_use = "futures do nothing unless polled"]
    pub struct WithContext<F> {
        #[pin]
        inner: F,
        scope: Scope,
    }
}

impl<F> WithContext<F> {
    pub fn new(inner: F, scope: Scope) -> Self {
        Self { inner, scope }
    }
}

impl<F: Future> Future for WithContext<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _guard = this.scope.enter();
        this.inner.poll(cx)
    }
}

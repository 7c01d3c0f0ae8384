//! Deferred resource values.
//!
//! An [`Output<T>`] is a value that becomes known only after the resources it
//! is derived from have been created. Outputs are cheap to clone: every clone
//! shares one underlying future, so a value consumed by several dependents is
//! computed exactly once.
//!
//! Each output also carries
//!
//! - the set of resource URNs it was derived from, used to build the
//!   deployment's dependency graph at declaration time, and
//! - a secret flag, which survives every combinator and decides whether the
//!   value is redacted when rendered as a stack output.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};

use super::Urn;
use crate::error::{Error, Result};

/// Result type carried by the shared future inside an output.
pub(crate) type SharedResult<T> = std::result::Result<T, Arc<Error>>;

/// Input values for resource arguments. Plain values convert via `From`.
pub type Input<T> = Output<T>;

/// A value resolved after its dependencies have been created.
pub struct Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    future: Shared<BoxFuture<'static, SharedResult<T>>>,
    dependencies: Arc<BTreeSet<Urn>>,
    secret: bool,
}

impl<T> Clone for Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
            dependencies: Arc::clone(&self.dependencies),
            secret: self.secret,
        }
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from_parts(
        future: BoxFuture<'static, SharedResult<T>>,
        dependencies: BTreeSet<Urn>,
        secret: bool,
    ) -> Self {
        Self {
            future: future.shared(),
            dependencies: Arc::new(dependencies),
            secret,
        }
    }

    /// An output whose value is already known.
    pub fn known(value: T) -> Self {
        Self::from_parts(
            futures::future::ready(Ok(value)).boxed(),
            BTreeSet::new(),
            false,
        )
    }

    /// A known value marked secret.
    pub fn secret(value: T) -> Self {
        Self::known(value).as_secret()
    }

    /// An output that resolves to an error.
    pub fn failed(error: Error) -> Self {
        Self::from_parts(
            futures::future::ready(Err(error.into_shared())).boxed(),
            BTreeSet::new(),
            false,
        )
    }

    /// An output driven by an arbitrary future.
    ///
    /// `dependencies` names the resources the value is derived from.
    pub fn from_future<F>(dependencies: impl IntoIterator<Item = Urn>, future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self::from_parts(
            future.map(|r| r.map_err(Error::into_shared)).boxed(),
            dependencies.into_iter().collect(),
            false,
        )
    }

    /// Marks this output as secret.
    pub fn as_secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Whether the value must be redacted when rendered.
    pub fn is_secret(&self) -> bool {
        self.secret
    }

    /// The resources this value is derived from.
    pub fn dependencies(&self) -> &BTreeSet<Urn> {
        &self.dependencies
    }

    /// Waits for the value.
    pub async fn resolve(&self) -> Result<T> {
        self.future.clone().await.map_err(Error::from_shared)
    }

    pub(crate) fn shared_future(&self) -> Shared<BoxFuture<'static, SharedResult<T>>> {
        self.future.clone()
    }

    /// Transforms the value once it is known.
    pub fn apply<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let future = self.future.clone();
        Output::from_parts(
            async move { future.await.map(f) }.boxed(),
            (*self.dependencies).clone(),
            self.secret,
        )
    }

    /// Transforms the value with a fallible function.
    pub fn try_apply<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let future = self.future.clone();
        Output::from_parts(
            async move {
                let value = future.await?;
                f(value).map_err(Error::into_shared)
            }
            .boxed(),
            (*self.dependencies).clone(),
            self.secret,
        )
    }

    /// Chains an asynchronous computation on the value, such as a provider
    /// invoke that needs a resolved identifier.
    pub fn apply_async<U, F, Fut>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U>> + Send + 'static,
    {
        let future = self.future.clone();
        Output::from_parts(
            async move {
                let value = future.await?;
                f(value).await.map_err(Error::into_shared)
            }
            .boxed(),
            (*self.dependencies).clone(),
            self.secret,
        )
    }

    /// Combines two outputs into a tuple.
    ///
    /// The result depends on both inputs and is secret if either is.
    pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = self.future.clone();
        let right = other.future.clone();
        let dependencies = self
            .dependencies
            .union(&other.dependencies)
            .cloned()
            .collect();
        Output::from_parts(
            async move { futures::future::try_join(left, right).await }.boxed(),
            dependencies,
            self.secret || other.secret,
        )
    }

    /// Combines many outputs, preserving order.
    pub fn all(outputs: impl IntoIterator<Item = Output<T>>) -> Output<Vec<T>> {
        let outputs: Vec<Output<T>> = outputs.into_iter().collect();
        let dependencies = outputs
            .iter()
            .flat_map(|o| o.dependencies.iter().cloned())
            .collect();
        let secret = outputs.iter().any(Output::is_secret);
        let futures: Vec<_> = outputs.iter().map(Output::shared_future).collect();
        Output::from_parts(
            async move { futures::future::try_join_all(futures).await }.boxed(),
            dependencies,
            secret,
        )
    }
}

impl Output<String> {
    /// Formats the value into a template, replacing every `{}`.
    pub fn format(&self, template: &'static str) -> Output<String> {
        self.apply(move |value| template.replace("{}", &value))
    }
}

impl<T> From<T> for Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(value: T) -> Self {
        Output::known(value)
    }
}

impl From<&str> for Output<String> {
    fn from(value: &str) -> Self {
        Output::known(value.to_string())
    }
}

impl<T> fmt::Debug for Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("dependencies", &self.dependencies)
            .field("secret", &self.secret)
            .finish_non_exhaustive()
    }
}

/// Unions the dependency sets of several outputs.
pub fn union_dependencies<'a>(sets: impl IntoIterator<Item = &'a BTreeSet<Urn>>) -> BTreeSet<Urn> {
    sets.into_iter().flat_map(|s| s.iter().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn urn(name: &str) -> Urn {
        Urn::new("test:Resource", name)
    }

    #[tokio::test]
    async fn test_known_output_resolves() {
        let output = Output::known(42u32);
        assert_eq!(output.resolve().await.unwrap(), 42);
        assert!(output.dependencies().is_empty());
        assert!(!output.is_secret());
    }

    #[tokio::test]
    async fn test_apply_keeps_dependencies_and_secret_flag() {
        let output = Output::from_future([urn("a")], async { Ok("key".to_string()) }).as_secret();
        let derived = output.apply(|v| format!("AccountKey={}", v));

        assert!(derived.is_secret());
        assert!(derived.dependencies().contains(&urn("a")));
        assert_eq!(derived.resolve().await.unwrap(), "AccountKey=key");
    }

    #[tokio::test]
    async fn test_zip_unions_dependencies() {
        let a = Output::from_future([urn("a")], async { Ok(1u8) });
        let b = Output::from_future([urn("b")], async { Ok(2u8) }).as_secret();
        let zipped = a.zip(&b);

        assert_eq!(zipped.dependencies().len(), 2);
        assert!(zipped.is_secret());
        assert_eq!(zipped.resolve().await.unwrap(), (1, 2));
    }

    #[tokio::test]
    async fn test_shared_future_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let output = Output::from_future([], async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok("created".to_string())
        });

        let first = output.apply(|v| v.len());
        let second = output.clone();
        assert_eq!(first.resolve().await.unwrap(), 7);
        assert_eq!(second.resolve().await.unwrap(), "created");
        assert_eq!(output.resolve().await.unwrap(), "created");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_message_survives_chaining() {
        let output: Output<String> = Output::failed(Error::Internal("quota exceeded".into()));
        let derived = output
            .apply(|v| v.to_uppercase())
            .apply_async(|v| async move { Ok(v.len()) });

        let error = derived.resolve().await.unwrap_err();
        assert_eq!(error.to_string(), "Internal error: quota exceeded");
    }

    #[tokio::test]
    async fn test_all_preserves_order() {
        let outputs = vec![Output::known(3), Output::known(1), Output::known(2)];
        assert_eq!(Output::all(outputs).resolve().await.unwrap(), vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_format_template() {
        let host = Output::known("app.azurewebsites.net".to_string());
        let url = host.format("https://{}/api/Hello");
        assert_eq!(
            url.resolve().await.unwrap(),
            "https://app.azurewebsites.net/api/Hello"
        );
    }

    #[test]
    fn test_debug_does_not_expose_value() {
        let output = Output::secret("hunter2".to_string());
        let debug = format!("{:?}", output);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("secret: true"));
    }
}

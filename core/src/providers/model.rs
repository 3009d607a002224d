use crate::error::ModelLoadError;
use crate::traits::{ChatRequest, Provider, ProviderEvent};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use futures_util::stream::BoxStream;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct ModelHandle {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
}

impl ModelHandle {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn stream(
        &self,
        request: ChatRequest<'_>,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        self.provider
            .chat_stream(request, &self.model, self.temperature)
            .await
    }
}

type LoadFuture = Shared<BoxFuture<'static, Result<ModelHandle, ModelLoadError>>>;

/// A pending (or finished) model load. Clones share the same future, so the
/// load runs once no matter how many sessions wait on it. A failed load stays
/// failed for the life of the process.
#[derive(Clone)]
pub struct SharedModel {
    model: String,
    load: LoadFuture,
}

impl SharedModel {
    pub fn load(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f64) -> Self {
        let model = model.into();
        let name = model.clone();

        let load = async move {
            info!(model = %model, provider = provider.name(), "Loading model");
            match provider.load_model(&model).await {
                Ok(()) => Ok(ModelHandle::new(provider, model, temperature)),
                Err(e) => Err(ModelLoadError {
                    model,
                    message: e.to_string(),
                }),
            }
        }
        .boxed()
        .shared();

        Self { model: name, load }
    }

    pub fn ready_with(handle: ModelHandle) -> Self {
        let model = handle.model().to_string();
        let load = futures_util::future::ready(Ok(handle)).boxed().shared();
        Self { model, load }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn ready(&self) -> Result<ModelHandle, ModelLoadError> {
        self.load.clone().await
    }

    pub fn spawn_load(&self) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            match this.ready().await {
                Ok(handle) => info!(model = handle.model(), "Model ready"),
                Err(e) => error!("{}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        loads: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn load_model(&self, _model: &str) -> anyhow::Result<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if self.fail {
                anyhow::bail!("model not found");
            }
            Ok(())
        }

        async fn chat_stream(
            &self,
            _request: ChatRequest<'_>,
            _model: &str,
            _temperature: f64,
        ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
            Ok(Box::pin(futures_util::stream::iter(vec![ProviderEvent::Done])))
        }
    }

    #[tokio::test]
    async fn every_waiter_shares_one_load() {
        let provider = Arc::new(CountingProvider {
            loads: AtomicUsize::new(0),
            fail: false,
        });
        let shared = SharedModel::load(provider.clone(), "qwen3-4b", 0.7);

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let s = shared.clone();
                tokio::spawn(async move { s.ready().await.map(|h| h.model().to_string()) })
            })
            .collect();

        for w in waiters {
            assert_eq!(w.await.unwrap().unwrap(), "qwen3-4b");
        }
        assert_eq!(provider.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_is_reported_to_every_waiter() {
        let provider = Arc::new(CountingProvider {
            loads: AtomicUsize::new(0),
            fail: true,
        });
        let shared = SharedModel::load(provider.clone(), "missing", 0.7);

        let first = shared.ready().await.err().unwrap();
        let second = shared.clone().ready().await.err().unwrap();
        assert!(first.message.contains("model not found"));
        assert_eq!(first.model, second.model);
        assert_eq!(provider.loads.load(Ordering::SeqCst), 1);
    }
}

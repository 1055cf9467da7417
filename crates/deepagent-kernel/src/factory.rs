//! Assembling an agent from [`Settings`].
//!
//! ```text
//! Settings ─► AgentFactory ─┬─ create_model()          OllamaClient
//!                           ├─ create_checkpointer()   Checkpointer over the store
//!                           ├─ create_entry_store()    same store, durable entries
//!                           ├─ backend_builder()       per-thread Backend recipe
//!                           ├─ create_tool_registry()  scraper + browser
//!                           └─ create_agent()          all of the above
//! ```
//!
//! The storage handle is opened once in [`AgentFactory::new`] and shared, so
//! checkpoints and durable entries land in the same SQLite file.

use std::sync::Arc;

use deepagent_types::CollectionId;
use tracing::{debug, info};

use crate::checkpoint::{Checkpointer, ThreadHandle};
use crate::config::{BackendKind, BackendSettings, RouteKind, Settings, StorageKind};
use crate::error::{AgentError, AgentResult};
use crate::llm::{ModelClient, OllamaClient, OllamaConfig};
use crate::session::AgentSession;
use crate::storage::{CheckpointStore, EntryStore, MemoryStore, SqliteStore};
use crate::tools::ToolRegistry;
use crate::vfs::{Backend, Router, StateBackend, StoreBackend};
use crate::web_tools::{BrowserLauncher, HttpBrowserLauncher, WebScraperEngine};

/// Where a route sends its paths.
#[derive(Debug, Clone)]
enum RouteTarget {
    /// The thread's own state backend.
    Thread,
    /// A durable collection, shared by every thread.
    Durable(Arc<Backend>),
}

/// Builds the backend for a thread.
///
/// Durable backends are created once, one per collection, and shared by
/// every thread and every route naming that collection.
#[derive(Debug, Clone)]
pub struct BackendBuilder {
    kind: BackendKind,
    routes: Vec<(String, RouteTarget)>,
}

impl BackendBuilder {
    /// Everything in thread state.
    pub fn state() -> Self {
        Self {
            kind: BackendKind::State,
            routes: Vec::new(),
        }
    }

    /// Turn validated backend settings into a builder.
    pub fn from_settings(settings: &BackendSettings, store: Arc<dyn EntryStore>) -> AgentResult<Self> {
        let kind = settings.kind()?;
        if kind == BackendKind::State {
            return Ok(Self::state());
        }

        let mut durable: Vec<(CollectionId, Arc<Backend>)> = Vec::new();
        let mut routes = Vec::new();
        for route in settings.effective_routes()? {
            let target = match route.kind {
                RouteKind::State => RouteTarget::Thread,
                RouteKind::Store => {
                    let collection = route.collection_id();
                    let backend = match durable.iter().find(|(c, _)| *c == collection) {
                        Some((_, backend)) => backend.clone(),
                        None => {
                            let backend: Arc<Backend> = Arc::new(
                                StoreBackend::new(store.clone(), collection.clone()).into(),
                            );
                            durable.push((collection, backend.clone()));
                            backend
                        }
                    };
                    RouteTarget::Durable(backend)
                }
            };
            routes.push((route.prefix, target));
        }
        Ok(Self { kind, routes })
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// The backend `thread`'s tools operate on.
    pub fn build(&self, thread: &ThreadHandle) -> AgentResult<Arc<Backend>> {
        let state: Arc<Backend> = Arc::new(StateBackend::new(thread.clone()).into());
        if self.kind == BackendKind::State {
            return Ok(state);
        }

        let mut router = Router::new(state.clone());
        for (prefix, target) in &self.routes {
            let backend = match target {
                RouteTarget::Thread => state.clone(),
                RouteTarget::Durable(backend) => backend.clone(),
            };
            router
                .add_route(prefix, backend)
                .map_err(|e| AgentError::config(format!("route {:?}: {}", prefix, e)))?;
        }
        Ok(Arc::new(router.into()))
    }
}

/// Creates every agent component from one [`Settings`].
pub struct AgentFactory {
    settings: Settings,
    entries: Arc<dyn EntryStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    browser_launcher: Option<Arc<dyn BrowserLauncher>>,
}

impl std::fmt::Debug for AgentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentFactory")
            .field("settings", &self.settings)
            .field("browser", &self.browser_launcher.is_some())
            .finish_non_exhaustive()
    }
}

impl AgentFactory {
    /// Validate settings and open storage.
    pub fn new(settings: Settings) -> AgentResult<Self> {
        settings.validate()?;

        let (entries, checkpoints): (Arc<dyn EntryStore>, Arc<dyn CheckpointStore>) =
            match settings.storage.kind {
                StorageKind::Memory => {
                    let store = Arc::new(MemoryStore::new());
                    (store.clone(), store)
                }
                StorageKind::Sqlite => {
                    let path = settings.storage.resolved_path()?.ok_or_else(|| {
                        AgentError::config("storage.kind = \"sqlite\" requires storage.path")
                    })?;
                    let store = Arc::new(SqliteStore::open(&path)?);
                    info!(path = %path.display(), "opened sqlite storage");
                    (store.clone(), store)
                }
            };

        let browser_launcher: Option<Arc<dyn BrowserLauncher>> = if settings.tools.browser {
            Some(Arc::new(HttpBrowserLauncher {
                timeout: settings.tools.timeout(),
                max_chars: settings.tools.scraper_max_chars,
            }))
        } else {
            None
        };

        Ok(Self {
            settings,
            entries,
            checkpoints,
            browser_launcher,
        })
    }

    /// Replace the browser launcher (`None` disables browser tools).
    pub fn with_browser_launcher(mut self, launcher: Option<Arc<dyn BrowserLauncher>>) -> Self {
        self.browser_launcher = launcher;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The model client named by `[model]`.
    pub fn create_model(&self) -> AgentResult<Arc<dyn ModelClient>> {
        let provider = self.settings.model.provider.as_str();
        if provider != "ollama" {
            return Err(AgentError::config(format!(
                "unsupported model provider {:?}",
                provider
            )));
        }

        let mut config = OllamaConfig::new(self.settings.model_name())
            .with_base_url(self.settings.ollama.base_url.as_str())
            .with_temperature(self.settings.temperature())
            .with_timeout(self.settings.model_timeout());
        if let Some(max_tokens) = self.settings.model.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        debug!(model = %config.model, base_url = %config.base_url, "creating ollama client");
        Ok(Arc::new(OllamaClient::new(config)?))
    }

    pub fn create_checkpointer(&self) -> Checkpointer {
        Checkpointer::new(self.checkpoints.clone())
    }

    pub fn create_entry_store(&self) -> Arc<dyn EntryStore> {
        self.entries.clone()
    }

    pub fn backend_builder(&self) -> AgentResult<BackendBuilder> {
        BackendBuilder::from_settings(&self.settings.backend, self.entries.clone())
    }

    /// External tools per `[tools]`. A browser that fails to launch is
    /// logged and left out.
    pub async fn create_tool_registry(&self) -> AgentResult<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        if self.settings.tools.web_scraper {
            let scraper = WebScraperEngine::new(self.settings.tools.scraper_config())
                .map_err(|e| AgentError::tool("web_scraper", e.to_string()))?;
            registry.register(Arc::new(scraper))?;
        }
        if let Some(launcher) = &self.browser_launcher {
            registry.attach_browser(launcher.as_ref()).await?;
        }
        Ok(registry)
    }

    /// An agent with the configured model.
    pub async fn create_agent(&self) -> AgentResult<AgentSession> {
        let model = self.create_model()?;
        self.create_agent_with_model(model).await
    }

    /// An agent with a caller-supplied model client.
    pub async fn create_agent_with_model(
        &self,
        model: Arc<dyn ModelClient>,
    ) -> AgentResult<AgentSession> {
        let tools = self.create_tool_registry().await?;
        let session = AgentSession::new(
            model,
            tools,
            Arc::new(self.create_checkpointer()),
            self.backend_builder()?,
        )
        .with_system_prompt(self.settings.agent.system_prompt.as_str())
        .with_max_iterations(self.settings.agent.max_iterations);

        info!(
            model = session.model_name(),
            backend = %self.settings.backend.backend_type,
            tools = session.tool_names().len(),
            "agent ready"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteSettings;
    use crate::vfs::FilesystemOps;
    use deepagent_types::ThreadId;

    fn composite(routes: Vec<RouteSettings>) -> BackendSettings {
        BackendSettings {
            backend_type: "composite".into(),
            routes,
        }
    }

    #[tokio::test]
    async fn state_backend_is_thread_scoped() {
        let builder = BackendBuilder::state();
        let a = ThreadHandle::detached(ThreadId::new("a"));
        let b = ThreadHandle::detached(ThreadId::new("b"));

        builder.build(&a).unwrap().write("/x.md", "a").await.unwrap();
        assert!(!builder.build(&b).unwrap().exists("/x.md").await.unwrap());
        assert_eq!(builder.build(&a).unwrap().read("/x.md").await.unwrap(), "a");
    }

    #[tokio::test]
    async fn composite_shares_durable_collections_across_threads() {
        let store = Arc::new(MemoryStore::new());
        let builder = BackendBuilder::from_settings(
            &composite(vec![RouteSettings::store("/shared/", "filesystem")]),
            store.clone(),
        )
        .unwrap();
        assert_eq!(builder.kind(), BackendKind::Composite);

        let a = builder.build(&ThreadHandle::detached(ThreadId::new("a"))).unwrap();
        let b = builder.build(&ThreadHandle::detached(ThreadId::new("b"))).unwrap();

        a.write("/memories/note.md", "kept").await.unwrap();
        a.write("/shared/team.md", "also kept").await.unwrap();
        a.write("/scratch.md", "mine").await.unwrap();

        assert_eq!(b.read("/memories/note.md").await.unwrap(), "kept");
        assert_eq!(b.read("/shared/team.md").await.unwrap(), "also kept");
        assert!(!b.exists("/scratch.md").await.unwrap());

        // Both prefixes hit one collection, and each path is listed once.
        assert_eq!(
            b.list("/").await.unwrap(),
            vec!["/memories/note.md", "/shared/team.md"]
        );
        assert!(
            store
                .get(&CollectionId::default(), "/memories/note.md")
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn state_routes_point_at_the_thread() {
        let builder = BackendBuilder::from_settings(
            &composite(vec![RouteSettings::state("/memories/tmp/")]),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        let a = builder.build(&ThreadHandle::detached(ThreadId::new("a"))).unwrap();
        let b = builder.build(&ThreadHandle::detached(ThreadId::new("b"))).unwrap();

        a.write("/memories/tmp/draft.md", "x").await.unwrap();
        assert!(!b.exists("/memories/tmp/draft.md").await.unwrap());
    }

    #[test]
    fn factory_rejects_unsupported_provider() {
        let mut settings = Settings::default();
        settings.model.provider = "openai".into();
        assert!(matches!(
            AgentFactory::new(settings).unwrap_err(),
            AgentError::Configuration(_)
        ));
    }

    #[tokio::test]
    async fn registry_follows_tool_settings() {
        let mut settings = Settings::default();
        settings.tools.browser = false;
        let factory = AgentFactory::new(settings).unwrap();
        let registry = factory.create_tool_registry().await.unwrap();
        assert_eq!(registry.external_names(), vec!["web_scraper"]);

        let mut settings = Settings::default();
        settings.tools.web_scraper = false;
        let factory = AgentFactory::new(settings).unwrap();
        let registry = factory.create_tool_registry().await.unwrap();
        assert_eq!(
            registry.external_names(),
            vec!["navigate_browser", "current_webpage", "extract_text"]
        );
        registry.shutdown().await;
    }

    #[test]
    fn model_comes_from_settings() {
        let mut settings = Settings::default();
        settings.model.model_name = Some("qwen3:8b".into());
        let factory = AgentFactory::new(settings).unwrap();
        assert_eq!(factory.create_model().unwrap().model_name(), "qwen3:8b");
    }
}

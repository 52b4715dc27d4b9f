// Widget layout store - Local cache of dashboard widgets, persisted through the backend
use crate::application::scada_api::{ApiError, ScadaApi};
use crate::domain::widget::{LayoutChange, LayoutPatch, Widget, WidgetDraft, WidgetLayout, WidgetPatch};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetState {
    pub widgets: Vec<Widget>,
    pub loading: bool,
    /// Message of the most recent failure; cleared when an operation starts
    pub error: Option<String>,
}

pub struct WidgetStore {
    api: Arc<dyn ScadaApi>,
    state: RwLock<WidgetState>,
}

impl WidgetStore {
    pub fn new(api: Arc<dyn ScadaApi>) -> Self {
        Self {
            api,
            state: RwLock::new(WidgetState::default()),
        }
    }

    pub fn snapshot(&self) -> WidgetState {
        self.read().clone()
    }

    #[cfg(test)]
    pub fn widgets(&self) -> Vec<Widget> {
        self.read().widgets.clone()
    }

    #[cfg(test)]
    pub fn widget(&self, id: &str) -> Option<Widget> {
        self.read().widgets.iter().find(|w| w.id == id).cloned()
    }

    #[cfg(test)]
    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    /// Replace the cache with the server's widget list. On failure the
    /// previous cache is kept, so widgets from an earlier successful fetch
    /// stay visible alongside the recorded error.
    pub async fn fetch_widgets(&self) -> Result<usize, ApiError> {
        {
            let mut state = self.write();
            state.loading = true;
            state.error = None;
        }

        let result = self.api.list_widgets().await;

        let mut state = self.write();
        state.loading = false;
        match result {
            Ok(widgets) => {
                let count = widgets.len();
                state.widgets = widgets;
                tracing::debug!("Fetched {} widgets", count);
                Ok(count)
            }
            Err(e) => {
                tracing::error!("Failed to fetch widgets: {}", e);
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Persist a draft; only the server-confirmed record enters the cache
    pub async fn add_widget(&self, draft: WidgetDraft) -> Result<Widget, ApiError> {
        self.clear_error();
        match self.api.create_widget(&draft).await {
            Ok(widget) => {
                tracing::info!("Added widget {} ({})", widget.id, widget.widget_type);
                self.write().widgets.push(widget.clone());
                Ok(widget)
            }
            Err(e) => Err(self.fail("add widget", e)),
        }
    }

    pub async fn update_widget(&self, id: &str, patch: WidgetPatch) -> Result<Widget, ApiError> {
        self.clear_error();
        match self.api.update_widget(id, &patch).await {
            Ok(widget) => {
                let mut state = self.write();
                if let Some(slot) = state.widgets.iter_mut().find(|w| w.id == widget.id) {
                    *slot = widget.clone();
                }
                Ok(widget)
            }
            Err(e) => Err(self.fail("update widget", e)),
        }
    }

    /// Removes locally first; if the delete fails the widget is put back
    /// where it was
    pub async fn remove_widget(&self, id: &str) -> Result<(), ApiError> {
        let removed = {
            let mut state = self.write();
            state.error = None;
            state
                .widgets
                .iter()
                .position(|w| w.id == id)
                .map(|index| (index, state.widgets.remove(index)))
        };

        match self.api.delete_widget(id).await {
            Ok(()) => {
                tracing::info!("Removed widget {}", id);
                Ok(())
            }
            Err(e) => {
                if let Some((index, widget)) = removed {
                    let mut state = self.write();
                    if !state.widgets.iter().any(|w| w.id == widget.id) {
                        let index = index.min(state.widgets.len());
                        state.widgets.insert(index, widget);
                    }
                }
                Err(self.fail("remove widget", e))
            }
        }
    }

    /// Persist layout changes in one request; the cache is not touched
    pub async fn update_layout(&self, changes: &[LayoutChange]) -> Result<(), ApiError> {
        self.clear_error();
        let patches: Vec<LayoutPatch<'_>> = changes.iter().map(LayoutChange::as_patch).collect();
        match self.api.update_layout(&patches).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail("update layout", e)),
        }
    }

    /// Apply a drag/resize locally, then persist it. Sizes are clamped to each
    /// widget's bounds; unknown ids are skipped. On failure the previous
    /// layouts are restored.
    pub async fn reposition(&self, changes: Vec<LayoutChange>) -> Result<Vec<LayoutChange>, ApiError> {
        let mut previous: Vec<(String, WidgetLayout)> = Vec::new();
        let mut applied: Vec<LayoutChange> = Vec::new();
        {
            let mut state = self.write();
            for change in changes {
                let Some(widget) = state.widgets.iter_mut().find(|w| w.id == change.widget_id) else {
                    tracing::warn!("Skipping layout change for unknown widget {}", change.widget_id);
                    continue;
                };
                previous.push((widget.id.clone(), widget.layout));
                widget.layout = widget.layout.with_rect(change.layout);
                applied.push(LayoutChange {
                    widget_id: change.widget_id,
                    layout: widget.layout.rect(),
                });
            }
        }

        if applied.is_empty() {
            return Ok(applied);
        }

        match self.update_layout(&applied).await {
            Ok(()) => Ok(applied),
            Err(e) => {
                let mut state = self.write();
                for (id, layout) in previous {
                    if let Some(widget) = state.widgets.iter_mut().find(|w| w.id == id) {
                        widget.layout = layout;
                    }
                }
                Err(e)
            }
        }
    }

    pub fn clear_error(&self) {
        self.write().error = None;
    }

    fn fail(&self, operation: &str, error: ApiError) -> ApiError {
        tracing::error!("Failed to {}: {}", operation, error);
        self.write().error = Some(error.to_string());
        error
    }

    fn read(&self) -> RwLockReadGuard<'_, WidgetState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, WidgetState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::FakeApi;
    use crate::domain::widget::GridRect;
    use serde_json::json;
    use tokio::sync::Notify;

    fn widget(id: &str, x: u32) -> Widget {
        Widget {
            id: id.to_string(),
            widget_type: "gauge".to_string(),
            layout: WidgetLayout::new(x, 0, 4, 3),
            config: json!({"tagId": "t1"}),
            title: format!("Widget {}", id),
            visible: true,
            refresh_interval: None,
        }
    }

    fn draft() -> WidgetDraft {
        WidgetDraft {
            widget_type: "line-chart".to_string(),
            layout: WidgetLayout::new(0, 4, 6, 4),
            config: json!({"tagIds": ["t1", "t2"]}),
            title: "Flow".to_string(),
            refresh_interval: Some(5),
        }
    }

    async fn loaded_store(widgets: Vec<Widget>) -> (Arc<FakeApi>, WidgetStore) {
        let api = Arc::new(FakeApi::with_widgets(widgets));
        let store = WidgetStore::new(api.clone());
        store.fetch_widgets().await.unwrap();
        (api, store)
    }

    #[tokio::test]
    async fn test_fetch_replaces_cache() {
        let (_, store) = loaded_store(vec![widget("w-1", 0), widget("w-2", 4)]).await;
        let state = store.snapshot();
        assert_eq!(state.widgets.len(), 2);
        assert!(!state.loading);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_fetch_sets_loading_while_pending() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(FakeApi {
            gate: Some(gate.clone()),
            ..FakeApi::with_widgets(vec![widget("w-1", 0)])
        });
        let store = Arc::new(WidgetStore::new(api));

        let task = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_widgets().await }
        });
        while !store.is_loading() {
            tokio::task::yield_now().await;
        }

        gate.notify_one();
        assert_eq!(task.await.unwrap().unwrap(), 1);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_fetch_failure_records_error() {
        let api = Arc::new(FakeApi::with_widgets(vec![widget("w-1", 0)]));
        api.set_failing(true);
        let store = WidgetStore::new(api);

        assert!(store.fetch_widgets().await.is_err());
        let state = store.snapshot();
        assert!(state.widgets.is_empty());
        assert!(!state.loading);
        assert!(state.error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_cache() {
        let (api, store) = loaded_store(vec![widget("w-1", 0), widget("w-2", 4)]).await;
        api.set_failing(true);

        assert!(store.fetch_widgets().await.is_err());
        let state = store.snapshot();
        assert_eq!(state.widgets.len(), 2);
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn test_add_appends_server_record() {
        let (_, store) = loaded_store(vec![widget("w-1", 0)]).await;

        let created = store.add_widget(draft()).await.unwrap();
        assert_eq!(created.id, "w-99");

        let widgets = store.widgets();
        assert_eq!(widgets.len(), 2);
        assert_eq!(widgets.iter().filter(|w| w.id == "w-99").count(), 1);
        assert_eq!(store.error(), None);
    }

    #[tokio::test]
    async fn test_add_failure_leaves_cache_unchanged() {
        let (api, store) = loaded_store(vec![widget("w-1", 0)]).await;
        let before = store.widgets();
        api.set_failing(true);

        assert!(store.add_widget(draft()).await.is_err());
        assert_eq!(store.widgets(), before);
        assert!(store.error().is_some());
    }

    #[tokio::test]
    async fn test_update_replaces_entry_with_server_record() {
        let (_, store) = loaded_store(vec![widget("w-1", 0), widget("w-2", 4)]).await;

        let patch = WidgetPatch {
            title: Some("Pressure".to_string()),
            ..Default::default()
        };
        store.update_widget("w-2", patch).await.unwrap();

        assert_eq!(store.widget("w-2").unwrap().title, "Pressure");
        assert_eq!(store.widget("w-1").unwrap().title, "Widget w-1");
    }

    #[tokio::test]
    async fn test_update_failure_keeps_entry() {
        let (api, store) = loaded_store(vec![widget("w-1", 0)]).await;
        api.set_failing(true);

        let patch = WidgetPatch {
            visible: Some(false),
            ..Default::default()
        };
        assert!(store.update_widget("w-1", patch).await.is_err());
        assert!(store.widget("w-1").unwrap().visible);
        assert!(store.error().is_some());
    }

    #[tokio::test]
    async fn test_remove_deletes_entry() {
        let (api, store) = loaded_store(vec![widget("w-1", 0), widget("w-2", 4)]).await;

        store.remove_widget("w-1").await.unwrap();
        assert_eq!(store.widgets().len(), 1);
        assert_eq!(api.widgets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_failure_restores_position() {
        let (api, store) = loaded_store(vec![widget("w-1", 0), widget("w-2", 4), widget("w-3", 8)]).await;
        api.set_failing(true);

        assert!(store.remove_widget("w-2").await.is_err());
        let ids: Vec<String> = store.widgets().into_iter().map(|w| w.id).collect();
        assert_eq!(ids, vec!["w-1", "w-2", "w-3"]);
        assert!(store.error().is_some());
    }

    #[tokio::test]
    async fn test_update_layout_persists_without_touching_cache() {
        let (api, store) = loaded_store(vec![widget("w-1", 0)]).await;
        let changes = vec![LayoutChange {
            widget_id: "w-1".to_string(),
            layout: GridRect { x: 6, y: 2, w: 3, h: 3 },
        }];

        store.update_layout(&changes).await.unwrap();
        assert_eq!(api.layout_calls.lock().unwrap().as_slice(), &[changes]);
        assert_eq!(store.widget("w-1").unwrap().layout.x, 0);
    }

    #[tokio::test]
    async fn test_reposition_applies_then_persists() {
        let mut bounded = widget("w-1", 0);
        bounded.layout.min_w = Some(3);
        let (api, store) = loaded_store(vec![bounded]).await;

        let applied = store
            .reposition(vec![
                LayoutChange {
                    widget_id: "w-1".to_string(),
                    layout: GridRect { x: 2, y: 1, w: 1, h: 5 },
                },
                LayoutChange {
                    widget_id: "missing".to_string(),
                    layout: GridRect { x: 0, y: 0, w: 1, h: 1 },
                },
            ])
            .await
            .unwrap();

        let expected = GridRect { x: 2, y: 1, w: 3, h: 5 };
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].layout, expected);
        assert_eq!(store.widget("w-1").unwrap().layout.rect(), expected);
        assert_eq!(api.layout_calls.lock().unwrap()[0], applied);
    }

    #[tokio::test]
    async fn test_reposition_failure_restores_layout() {
        let (api, store) = loaded_store(vec![widget("w-1", 0)]).await;
        api.set_failing(true);

        let result = store
            .reposition(vec![LayoutChange {
                widget_id: "w-1".to_string(),
                layout: GridRect { x: 9, y: 9, w: 2, h: 2 },
            }])
            .await;

        assert!(result.is_err());
        assert_eq!(store.widget("w-1").unwrap().layout, WidgetLayout::new(0, 0, 4, 3));
        assert!(store.error().is_some());
    }
}

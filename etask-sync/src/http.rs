use async_trait::async_trait;
use etask_core::{Task, TaskStatus};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::{NewTask, TaskBackend, TaskPatch, TaskQuery};
use crate::error::BackendError;

/// REST client for the eTask API.
///
/// Timeouts are left to reqwest's defaults; this layer adds none.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, token: Option<&str>) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| BackendError::InvalidConfig(format!("bad token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<reqwest::Response, BackendError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        what: &str,
    ) -> Result<T, BackendError> {
        Ok(self.send(req, what).await?.json().await?)
    }
}

#[derive(Serialize)]
struct StatusBody {
    status: TaskStatus,
}

#[derive(Serialize)]
struct ProgressBody {
    progress: u8,
}

#[derive(Serialize)]
struct SubtaskBody<'a> {
    title: &'a str,
}

#[async_trait]
impl TaskBackend for HttpBackend {
    fn backend_tag(&self) -> &'static str {
        "http"
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, BackendError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(user) = query.user_id {
            params.push(("userId", user.to_string()));
        }
        if let Some(q) = query.search.as_deref().filter(|q| !q.is_empty()) {
            params.push(("search", q.to_string()));
        }
        let req = self.client.get(self.url("/tasks")).query(&params);
        self.send_json(req, "task list").await
    }

    async fn get_task(&self, id: u64) -> Result<Task, BackendError> {
        let req = self.client.get(self.url(&format!("/tasks/{id}")));
        self.send_json(req, &format!("task {id}")).await
    }

    async fn create_task(&self, draft: &NewTask) -> Result<Task, BackendError> {
        let req = self.client.post(self.url("/tasks")).json(draft);
        self.send_json(req, "task collection").await
    }

    async fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<Task, BackendError> {
        let req = self.client.put(self.url(&format!("/tasks/{id}"))).json(patch);
        self.send_json(req, &format!("task {id}")).await
    }

    async fn delete_task(&self, id: u64) -> Result<(), BackendError> {
        let req = self.client.delete(self.url(&format!("/tasks/{id}")));
        self.send(req, &format!("task {id}")).await?;
        Ok(())
    }

    async fn patch_status(&self, id: u64, status: TaskStatus) -> Result<(), BackendError> {
        let req = self
            .client
            .patch(self.url(&format!("/tasks/{id}/status")))
            .json(&StatusBody { status });
        self.send(req, &format!("task {id}")).await?;
        Ok(())
    }

    async fn patch_progress(&self, id: u64, progress: u8) -> Result<(), BackendError> {
        let req = self
            .client
            .patch(self.url(&format!("/tasks/{id}/progress")))
            .json(&ProgressBody { progress });
        self.send(req, &format!("task {id}")).await?;
        Ok(())
    }

    async fn toggle_importance(&self, id: u64) -> Result<Task, BackendError> {
        let req = self.client.patch(self.url(&format!("/tasks/{id}/importance")));
        self.send_json(req, &format!("task {id}")).await
    }

    async fn toggle_subtask(&self, task_id: u64, subtask_id: u64) -> Result<Task, BackendError> {
        let req = self
            .client
            .patch(self.url(&format!("/tasks/{task_id}/subtasks/{subtask_id}/toggle")));
        self.send_json(req, &format!("subtask {subtask_id} of task {task_id}"))
            .await
    }

    async fn create_subtask(&self, task_id: u64, title: &str) -> Result<Task, BackendError> {
        let req = self
            .client
            .post(self.url(&format!("/tasks/{task_id}/subtasks")))
            .json(&SubtaskBody { title });
        self.send_json(req, &format!("task {task_id}")).await
    }

    async fn update_subtask(
        &self,
        task_id: u64,
        subtask_id: u64,
        title: &str,
    ) -> Result<Task, BackendError> {
        let req = self
            .client
            .put(self.url(&format!("/tasks/{task_id}/subtasks/{subtask_id}")))
            .json(&SubtaskBody { title });
        self.send_json(req, &format!("subtask {subtask_id} of task {task_id}"))
            .await
    }

    async fn delete_subtask(&self, task_id: u64, subtask_id: u64) -> Result<Task, BackendError> {
        let req = self
            .client
            .delete(self.url(&format!("/tasks/{task_id}/subtasks/{subtask_id}")));
        self.send_json(req, &format!("subtask {subtask_id} of task {task_id}"))
            .await
    }
}

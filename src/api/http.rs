//! HTTP implementation of the task API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::TaskApi;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::task::{Activity, Agent, NewTaskMessage, Task, TaskMessage, TaskPatch};

pub struct HttpTaskApi {
    client: Client,
    base_url: String,
}

impl HttpTaskApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Self::with_timeout(&config.base_url, config.timeout())
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(body));
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: body.chars().take(300).collect(),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Decode a response that may be bare or wrapped as `{"<key>": ...}`.
pub(crate) fn unwrap_key<T: DeserializeOwned>(value: Value, key: &str) -> Result<T> {
    let inner = match value {
        Value::Object(mut map) => match map.remove(key) {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    };
    Ok(serde_json::from_value(inner)?)
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let value = self.send(self.client.get(self.url("tasks"))).await?;
        unwrap_key(value, "tasks")
    }

    async fn get_task(&self, id: &str) -> Result<Task> {
        let value = self
            .send(self.client.get(self.url(&format!("tasks/{}", id))))
            .await?;
        unwrap_key(value, "task")
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        let value = self
            .send(self.client.patch(self.url(&format!("tasks/{}", id))).json(patch))
            .await?;
        if value.is_null() {
            return self.get_task(id).await;
        }
        unwrap_key(value, "task")
    }

    async fn create_task_message(
        &self,
        task_id: &str,
        message: &NewTaskMessage,
    ) -> Result<TaskMessage> {
        let value = self
            .send(
                self.client
                    .post(self.url(&format!("tasks/{}/messages", task_id)))
                    .json(message),
            )
            .await?;
        unwrap_key(value, "message")
    }

    async fn list_activities(&self) -> Result<Vec<Activity>> {
        let value = self.send(self.client.get(self.url("activities"))).await?;
        unwrap_key(value, "activities")
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        let value = self.send(self.client.get(self.url("agents"))).await?;
        unwrap_key(value, "agents")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use axum::{
        extract::Path,
        http::StatusCode as AxumStatus,
        routing::{get, patch, post},
        Json, Router,
    };
    use serde_json::json;

    fn task_json(id: &str, status: &str) -> Value {
        json!({
            "id": id,
            "title": format!("Task {}", id),
            "status": status,
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        })
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api", addr)
    }

    fn fake_api() -> Router {
        let api = Router::new()
            .route(
                "/tasks",
                get(|| async { Json(json!({"tasks": [task_json("task-a1", "inbox")]})) }),
            )
            .route(
                "/tasks/:id",
                patch(|Path(id): Path<String>, Json(body): Json<Value>| async move {
                    let status = body["status"].as_str().unwrap_or("inbox").to_string();
                    Json(task_json(&id, &status))
                })
                .get(|Path(id): Path<String>| async move {
                    if id == "missing" {
                        Err(AxumStatus::NOT_FOUND)
                    } else {
                        Ok(Json(json!({"task": task_json(&id, "done")})))
                    }
                }),
            )
            .route(
                "/tasks/:id/messages",
                post(|Path(id): Path<String>, Json(body): Json<Value>| async move {
                    Json(json!({"message": {
                        "taskId": id,
                        "author": body["author"],
                        "content": body["content"],
                        "createdAt": "2026-01-01T00:00:00Z"
                    }}))
                }),
            )
            .route(
                "/activities",
                get(|| async {
                    Json(json!([{
                        "id": "act-1",
                        "type": "task_updated",
                        "message": "moved",
                        "createdAt": "2026-01-01T00:00:00Z"
                    }]))
                }),
            )
            .route(
                "/agents",
                get(|| async { Err::<Json<Value>, _>(AxumStatus::INTERNAL_SERVER_ERROR) }),
            );
        Router::new().nest("/api", api)
    }

    #[test]
    fn unwraps_wrapped_and_bare_values() {
        let wrapped: Vec<String> = unwrap_key(json!({"tasks": ["a"]}), "tasks").unwrap();
        assert_eq!(wrapped, vec!["a".to_string()]);
        let bare: Vec<String> = unwrap_key(json!(["b"]), "tasks").unwrap();
        assert_eq!(bare, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn talks_to_rest_api() {
        let base = serve(fake_api()).await;
        let api = HttpTaskApi::with_timeout(format!("{}/", base), Duration::from_secs(5)).unwrap();
        assert_eq!(api.base_url(), base);

        let tasks = api.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "task-a1");

        let task = api.get_task("task-a1").await.unwrap();
        assert_eq!(task.status, TaskStatus::Done);

        let updated = api
            .update_task("task-a1", &TaskPatch::status(TaskStatus::Review))
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Review);

        let msg = api
            .create_task_message("task-a1", &NewTaskMessage::system("hi", None))
            .await
            .unwrap();
        assert_eq!(msg.task_id, "task-a1");
        assert_eq!(msg.content, "hi");

        let activities = api.list_activities().await.unwrap();
        assert_eq!(activities[0].kind, "task_updated");
    }

    #[tokio::test]
    async fn maps_error_statuses() {
        let base = serve(fake_api()).await;
        let api = HttpTaskApi::with_timeout(base, Duration::from_secs(5)).unwrap();

        assert!(matches!(api.get_task("missing").await, Err(Error::NotFound(_))));
        assert!(matches!(
            api.list_agents().await,
            Err(Error::Api { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let app = Router::new().route(
            "/api/tasks",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!([]))
            }),
        );
        let base = serve(app).await;
        let api = HttpTaskApi::with_timeout(base, Duration::from_millis(100)).unwrap();

        assert!(matches!(api.list_tasks().await, Err(Error::Timeout)));
    }
}

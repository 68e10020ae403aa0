use anyhow::{Context, Result};
use chrono::DateTime;
use log::info;
#[cfg(test)]
use mockall::automock;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::time_entry::TimeEntry;

/// プロジェクト情報。
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub allocated_time: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// プロジェクト配下のタスク情報。
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    #[serde(default)]
    pub allocated_time: Option<String>,
}

/// 実行ユーザーの情報。
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
}

/// エントリー作成のリクエストボディ。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewTimeEntry {
    pub user_id: i64,
    pub project_id: i64,
    pub task_name: String,
    pub description: String,
    pub start_time: String,
    pub end_time: String,
}

/// エントリー部分更新のリクエストボディ。未設定のフィールドは送信しない。
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TimeEntryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
}

/// タスク作成のリクエストボディ。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewTask {
    pub project_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// トラッカーAPIのタイムエントリーをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct ApiTimeEntry {
    id: i64,
    #[serde(default)]
    user_id: Option<i64>,
    #[serde(default)]
    employee_name: Option<String>,
    #[serde(default)]
    employee_email: Option<String>,
    #[serde(default)]
    project_id: Option<i64>,
    #[serde(default)]
    project_name: Option<String>,
    #[serde(default)]
    task_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    start_time: String,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    total_time: Option<i64>,
}

impl ApiTimeEntry {
    /// ワイヤー表現をドメインの`TimeEntry`へ変換する。
    fn into_domain(self) -> Result<TimeEntry> {
        let start_time = DateTime::parse_from_rfc3339(&self.start_time)
            .with_context(|| format!("Failed to parse start time: {}", self.start_time))?
            .to_utc();
        let end_time = self
            .end_time
            .map(|end| {
                DateTime::parse_from_rfc3339(&end)
                    .with_context(|| format!("Failed to parse end time: {}", end))
                    .map(|end| end.to_utc())
            })
            .transpose()?;

        Ok(TimeEntry {
            id: self.id,
            user_id: self.user_id,
            user_name: self.employee_name,
            user_email: self.employee_email,
            project_id: self.project_id,
            project_name: self.project_name,
            task_name: self.task_name,
            description: self.description,
            start_time,
            end_time,
            total_time: self.total_time,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ActiveEntryResponse {
    #[serde(default)]
    active_entry: Option<ApiTimeEntry>,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct StopResponse {
    total_time: i64,
}

/// トラッカーAPIへのアクセスを抽象化するためのtrait。
///
/// 呼び出し側はfutureをその場でawaitする。タスクへのspawnはしないため
/// Send境界は要求しない。
#[allow(async_fn_in_trait)]
#[cfg_attr(test, automock)]
pub trait TrackerRepository {
    /// 実行ユーザーから見えるタイムエントリーをすべて取得する。
    /// ロールによる絞り込みはサーバー側の責務。
    async fn read_time_entries(&self) -> Result<Vec<TimeEntry>>;

    /// プロジェクト一覧を取得する。
    async fn read_projects(&self) -> Result<Vec<Project>>;

    /// 指定プロジェクトのタスク一覧を取得する。
    async fn read_tasks(&self, project_id: i64) -> Result<Vec<Task>>;

    /// 実行ユーザーの情報を取得する。
    async fn read_current_user(&self) -> Result<User>;

    /// 計測中のタイムエントリーを取得する。
    async fn read_active_entry(&self) -> Result<Option<TimeEntry>>;

    /// タイムエントリーを作成する。
    async fn create_time_entry(&self, entry: &NewTimeEntry) -> Result<()>;

    /// タイムエントリーを部分更新する。
    async fn update_time_entry(&self, id: i64, update: &TimeEntryUpdate) -> Result<()>;

    /// タイムエントリーを削除する。
    async fn delete_time_entry(&self, id: i64) -> Result<()>;

    /// タスクを作成する。
    async fn create_task(&self, task: &NewTask) -> Result<Task>;

    /// 計測を開始し、作成されたエントリーのidを返す。
    async fn start_time(
        &self,
        project_id: i64,
        task_name: &str,
        description: Option<String>,
    ) -> Result<i64>;

    /// 計測を停止し、記録された分単位の作業時間を返す。
    async fn stop_time(&self, id: i64) -> Result<i64>;
}

/// トラッカーAPIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = TrackerClient::new(&config);
/// let time_entries = client.read_time_entries().await.unwrap();
/// ```
pub struct TrackerClient {
    client: Client,
    api_url: String,
    api_token: String,
}

impl TrackerClient {
    /// 新しい`TrackerClient`を返す。
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_url: config.api_url.clone(),
            api_token: config.api_token.clone(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(&self.api_token)
            .header(CONTENT_TYPE, "application/json")
    }
}

impl TrackerRepository for TrackerClient {
    async fn read_time_entries(&self) -> Result<Vec<TimeEntry>> {
        let api_entries = self
            .get("/time-entries")
            .send()
            .await
            .with_context(|| format!("Failed to send request to tracker API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<Vec<ApiTimeEntry>>()
            .await
            .context("Failed to deserialize response")?;
        info!("Retrieved {} time entries", api_entries.len());

        api_entries
            .into_iter()
            .map(ApiTimeEntry::into_domain)
            .collect()
    }

    async fn read_projects(&self) -> Result<Vec<Project>> {
        let projects = self
            .get("/projects")
            .send()
            .await
            .with_context(|| format!("Failed to send request to tracker API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<Vec<Project>>()
            .await
            .context("Failed to deserialize response")?;

        Ok(projects)
    }

    async fn read_tasks(&self, project_id: i64) -> Result<Vec<Task>> {
        let tasks = self
            .get(&format!("/projects/{}/tasks", project_id))
            .send()
            .await
            .with_context(|| format!("Failed to send request to tracker API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<Vec<Task>>()
            .await
            .context("Failed to deserialize response")?;

        Ok(tasks)
    }

    async fn read_current_user(&self) -> Result<User> {
        let user = self
            .get("/users/me")
            .send()
            .await
            .with_context(|| format!("Failed to send request to tracker API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<User>()
            .await
            .context("Failed to deserialize response")?;

        Ok(user)
    }

    async fn read_active_entry(&self) -> Result<Option<TimeEntry>> {
        let response = self
            .get("/time-entries/active")
            .send()
            .await
            .with_context(|| format!("Failed to send request to tracker API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<ActiveEntryResponse>()
            .await
            .context("Failed to deserialize response")?;

        response
            .active_entry
            .map(ApiTimeEntry::into_domain)
            .transpose()
    }

    async fn create_time_entry(&self, entry: &NewTimeEntry) -> Result<()> {
        self.client
            .post(format!("{}/time-entries", self.api_url))
            .bearer_auth(&self.api_token)
            .json(entry)
            .send()
            .await
            .with_context(|| format!("Failed to send request to tracker API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?;

        Ok(())
    }

    async fn update_time_entry(&self, id: i64, update: &TimeEntryUpdate) -> Result<()> {
        self.client
            .put(format!("{}/time-entries/{}", self.api_url, id))
            .bearer_auth(&self.api_token)
            .json(update)
            .send()
            .await
            .with_context(|| format!("Failed to send request to tracker API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?;

        Ok(())
    }

    async fn delete_time_entry(&self, id: i64) -> Result<()> {
        self.client
            .delete(format!("{}/time-entries/{}", self.api_url, id))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .with_context(|| format!("Failed to send request to tracker API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?;

        Ok(())
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task> {
        let created = self
            .client
            .post(format!("{}/tasks", self.api_url))
            .bearer_auth(&self.api_token)
            .json(task)
            .send()
            .await
            .with_context(|| format!("Failed to send request to tracker API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<Task>()
            .await
            .context("Failed to deserialize response")?;
        info!("Created task {} in project {}", created.title, created.project_id);

        Ok(created)
    }

    async fn start_time(
        &self,
        project_id: i64,
        task_name: &str,
        description: Option<String>,
    ) -> Result<i64> {
        let response = self
            .client
            .post(format!("{}/time-entries/start", self.api_url))
            .bearer_auth(&self.api_token)
            .json(&serde_json::json!({
                "project_id": project_id,
                "task_name": task_name,
                "description": description,
            }))
            .send()
            .await
            .with_context(|| format!("Failed to send request to tracker API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<StartResponse>()
            .await
            .context("Failed to deserialize response")?;

        Ok(response.id)
    }

    async fn stop_time(&self, id: i64) -> Result<i64> {
        let response = self
            .client
            .put(format!("{}/time-entries/{}/stop", self.api_url, id))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .with_context(|| format!("Failed to send request to tracker API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<StopResponse>()
            .await
            .context("Failed to deserialize response")?;

        Ok(response.total_time)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mockito::{Matcher, Server};

    use super::*;

    fn client_for(server: &Server) -> TrackerClient {
        TrackerClient::new(&Config {
            api_url: server.url(),
            api_token: "token123".to_string(),
        })
    }

    /// タイムエントリーの取得とドメイン変換を確認する。
    #[tokio::test]
    async fn test_read_time_entries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/time-entries")
            .match_header("authorization", "Bearer token123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!([{
                    "id": 1,
                    "user_id": 7,
                    "employee_name": "Alice",
                    "employee_email": "alice@example.com",
                    "project_id": 2,
                    "project_name": "A",
                    "task_name": "X",
                    "description": "work",
                    "start_time": "2024-03-11T09:00:00+00:00",
                    "end_time": "2024-03-11T10:30:00+00:00",
                    "total_time": 90
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let entries = client_for(&server).read_time_entries().await.unwrap();

        mock.assert_async().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].start_time,
            Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap()
        );
        assert_eq!(entries[0].measured_seconds(), 5400);
        assert_eq!(entries[0].user_name.as_deref(), Some("Alice"));
    }

    /// 欠けているフィールドがNoneとして読めることを確認する。
    #[tokio::test]
    async fn test_read_time_entries_sparse_fields() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/time-entries")
            .with_status(200)
            .with_body(
                serde_json::json!([{
                    "id": 5,
                    "start_time": "2024-03-11T09:00:00+00:00"
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let entries = client_for(&server).read_time_entries().await.unwrap();

        assert_eq!(entries[0].end_time, None);
        assert_eq!(entries[0].project_id, None);
        assert_eq!(entries[0].display_task(), "Unnamed Task");
    }

    /// 不正なタイムスタンプがエラーになることを確認する。
    #[tokio::test]
    async fn test_read_time_entries_invalid_timestamp() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/time-entries")
            .with_status(200)
            .with_body(
                serde_json::json!([{"id": 1, "start_time": "not-a-date"}]).to_string(),
            )
            .create_async()
            .await;

        let result = client_for(&server).read_time_entries().await;

        assert!(result.is_err());
    }

    /// エラーステータスがエラーとして返ることを確認する。
    #[tokio::test]
    async fn test_error_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/projects")
            .with_status(500)
            .create_async()
            .await;

        let result = client_for(&server).read_projects().await;

        assert!(result.is_err());
    }

    /// タスク一覧がプロジェクトのパスから取得されることを確認する。
    #[tokio::test]
    async fn test_read_tasks() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/projects/2/tasks")
            .with_status(200)
            .with_body(
                serde_json::json!([{
                    "id": 1,
                    "project_id": 2,
                    "title": "X",
                    "allocated_time": "01:00:00"
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let tasks = client_for(&server).read_tasks(2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(tasks[0].allocated_time.as_deref(), Some("01:00:00"));
    }

    /// エントリー作成のボディが期待通りであることを確認する。
    #[tokio::test]
    async fn test_create_time_entry() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/time-entries")
            .match_header("authorization", "Bearer token123")
            .match_body(Matcher::Json(serde_json::json!({
                "user_id": 7,
                "project_id": 2,
                "task_name": "X",
                "description": "",
                "start_time": "2024-03-11T09:00:00+00:00",
                "end_time": "2024-03-11T10:00:00+00:00"
            })))
            .with_status(201)
            .create_async()
            .await;

        let entry = NewTimeEntry {
            user_id: 7,
            project_id: 2,
            task_name: "X".to_string(),
            description: String::new(),
            start_time: "2024-03-11T09:00:00+00:00".to_string(),
            end_time: "2024-03-11T10:00:00+00:00".to_string(),
        };
        let result = client_for(&server).create_time_entry(&entry).await;

        mock.assert_async().await;
        assert!(result.is_ok());
    }

    /// 部分更新で未設定フィールドが送信されないことを確認する。
    #[tokio::test]
    async fn test_update_time_entry_partial() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/time-entries/9")
            .match_body(Matcher::Json(serde_json::json!({
                "end_time": "2024-03-11T10:00:00+00:00"
            })))
            .with_status(200)
            .create_async()
            .await;

        let update = TimeEntryUpdate {
            end_time: Some("2024-03-11T10:00:00+00:00".to_string()),
            ..Default::default()
        };
        let result = client_for(&server).update_time_entry(9, &update).await;

        mock.assert_async().await;
        assert!(result.is_ok());
    }

    /// 計測中エントリーが無い場合にNoneになることを確認する。
    #[tokio::test]
    async fn test_read_active_entry_none() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/time-entries/active")
            .with_status(200)
            .with_body(serde_json::json!({"active_entry": null}).to_string())
            .create_async()
            .await;

        let active = client_for(&server).read_active_entry().await.unwrap();

        assert!(active.is_none());
    }

    /// 計測の開始と停止のレスポンスを確認する。
    #[tokio::test]
    async fn test_start_and_stop_time() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/time-entries/start")
            .match_body(Matcher::Json(serde_json::json!({
                "project_id": 2,
                "task_name": "X",
                "description": "work"
            })))
            .with_status(201)
            .with_body(serde_json::json!({"id": 42}).to_string())
            .create_async()
            .await;
        server
            .mock("PUT", "/time-entries/42/stop")
            .with_status(200)
            .with_body(serde_json::json!({"total_time": 90}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let id = client
            .start_time(2, "X", Some("work".to_string()))
            .await
            .unwrap();
        let minutes = client.stop_time(id).await.unwrap();

        assert_eq!(id, 42);
        assert_eq!(minutes, 90);
    }
}
